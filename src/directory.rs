//! Workspace user directory with an on-disk cache.
//!
//! Assignees arrive as opaque user ids. The directory maps them to display
//! names and emails, backed by `<cache_dir>/users.json` which holds one entry
//! per workspace. A run fetches the member list at most once unless a forced
//! refresh is requested.

use crate::error::SyncResult;
use crate::fsutil::write_atomic;
use crate::plane::MemberSource;
use crate::types::Member;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cached member list for one workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceEntry {
    pub refreshed_at: DateTime<Utc>,
    pub members: Vec<Member>,
}

/// Whole cache file: workspace slug -> entry.
type CacheFile = BTreeMap<String, WorkspaceEntry>;

/// Resolved view of the directory handed to the pure pipeline stages.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    members: HashMap<String, Member>,
}

impl Roster {
    pub fn from_members(members: impl IntoIterator<Item = Member>) -> Self {
        Self {
            members: members.into_iter().map(|m| (m.id.clone(), m)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Member> {
        self.members.get(id)
    }

    /// Display name for `id`, or the id itself when unknown.
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.members
            .get(id)
            .map(|m| m.display_name.as_str())
            .unwrap_or(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Member directory for a single workspace.
#[derive(Debug)]
pub struct UserDirectory {
    path: PathBuf,
    workspace: String,
    max_age: Duration,
    members: HashMap<String, Member>,
    refreshed_at: Option<DateTime<Utc>>,
    fetched_this_run: bool,
}

impl UserDirectory {
    /// Read the cache file. A missing or unreadable file gives an empty
    /// directory.
    pub fn load(path: impl Into<PathBuf>, workspace: &str, max_age: Duration) -> Self {
        let path = path.into();
        let mut dir = Self {
            path,
            workspace: workspace.to_string(),
            max_age,
            members: HashMap::new(),
            refreshed_at: None,
            fetched_this_run: false,
        };

        match read_cache(&dir.path) {
            Ok(Some(mut file)) => {
                if let Some(entry) = file.remove(workspace) {
                    debug!(
                        workspace,
                        members = entry.members.len(),
                        refreshed_at = %entry.refreshed_at,
                        "Loaded user directory cache"
                    );
                    dir.refreshed_at = Some(entry.refreshed_at);
                    dir.members = index(entry.members);
                }
            }
            Ok(None) => debug!(path = %dir.path.display(), "No user directory cache yet"),
            Err(e) => warn!(
                path = %dir.path.display(),
                error = %e,
                "Ignoring unreadable user directory cache"
            ),
        }
        dir
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    /// Whether a remote fetch already happened during this run.
    pub fn fetched_this_run(&self) -> bool {
        self.fetched_this_run
    }

    /// Empty, never refreshed, or older than `max_age` at `now`.
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        match self.refreshed_at {
            _ if self.members.is_empty() => true,
            None => true,
            Some(at) => (now - at).to_std().is_ok_and(|age| age > self.max_age),
        }
    }

    /// Refetch the member list when forced or stale. Returns whether a fetch
    /// happened. Without `force`, at most one fetch per run.
    pub async fn refresh<S>(&mut self, source: &S, force: bool) -> SyncResult<bool>
    where
        S: MemberSource + ?Sized,
    {
        if !force && (self.fetched_this_run || !self.is_stale_at(Utc::now())) {
            return Ok(false);
        }
        self.fetch(source).await?;
        Ok(true)
    }

    /// Display name for `user_id`, refreshing once per run on a miss. Falls
    /// back to the raw id.
    pub async fn resolve<S>(&mut self, source: &S, user_id: &str) -> SyncResult<String>
    where
        S: MemberSource + ?Sized,
    {
        if !self.members.contains_key(user_id) && !self.fetched_this_run {
            debug!(user_id, "Unknown user id, refreshing directory");
            self.fetch(source).await?;
        }
        Ok(self
            .members
            .get(user_id)
            .map(|m| m.display_name.clone())
            .unwrap_or_else(|| user_id.to_string()))
    }

    /// Member with `email` (case-insensitive), refreshing once per run on a
    /// miss.
    pub async fn find_by_email<S>(&mut self, source: &S, email: &str) -> SyncResult<Option<Member>>
    where
        S: MemberSource + ?Sized,
    {
        if let Some(member) = self.lookup_email(email) {
            return Ok(Some(member));
        }
        if !self.fetched_this_run {
            debug!(email, "Email not in directory, refreshing");
            self.fetch(source).await?;
        }
        Ok(self.lookup_email(email))
    }

    /// Resolve every id in `ids` into a roster, with at most one refresh
    /// covering all misses.
    pub async fn roster<'a, S, I>(&mut self, source: &S, ids: I) -> SyncResult<Roster>
    where
        S: MemberSource + ?Sized,
        I: IntoIterator<Item = &'a str>,
    {
        let mut ids: Vec<&str> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        let missing = ids.iter().filter(|id| !self.members.contains_key(**id)).count();
        if missing > 0 && !self.fetched_this_run {
            debug!(missing, "Assignees missing from directory, refreshing");
            self.fetch(source).await?;
        }

        let members = ids.iter().filter_map(|id| self.members.get(*id).cloned());
        let roster = Roster::from_members(members);
        let unresolved = ids.len().saturating_sub(roster.len());
        if unresolved > 0 {
            debug!(unresolved, "Some assignees stay unresolved, showing raw ids");
        }
        Ok(roster)
    }

    fn lookup_email(&self, email: &str) -> Option<Member> {
        self.members.values().find(|m| m.email_matches(email)).cloned()
    }

    async fn fetch<S>(&mut self, source: &S) -> SyncResult<()>
    where
        S: MemberSource + ?Sized,
    {
        self.fetched_this_run = true;
        let members = source.list_members().await?;
        let now = Utc::now();
        info!(workspace = %self.workspace, members = members.len(), "Refreshed user directory");

        self.members = index(members);
        self.refreshed_at = Some(now);
        if let Err(e) = self.persist() {
            warn!(path = %self.path.display(), error = %e, "Failed to write user directory cache");
        }
        Ok(())
    }

    /// Rewrite the cache file with this workspace's entry, keeping the others.
    pub fn persist(&self) -> std::io::Result<()> {
        let Some(refreshed_at) = self.refreshed_at else {
            return Ok(());
        };
        let mut file = read_cache(&self.path).ok().flatten().unwrap_or_default();

        let mut members: Vec<Member> = self.members.values().cloned().collect();
        members.sort_by(|a, b| a.id.cmp(&b.id));
        file.insert(
            self.workspace.clone(),
            WorkspaceEntry {
                refreshed_at,
                members,
            },
        );

        let json = serde_json::to_vec_pretty(&file).map_err(std::io::Error::other)?;
        write_atomic(&self.path, &json)
    }
}

fn index(members: Vec<Member>) -> HashMap<String, Member> {
    members.into_iter().map(|m| (m.id.clone(), m)).collect()
}

fn read_cache(path: &Path) -> std::io::Result<Option<CacheFile>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let file = serde_json::from_slice(&bytes)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(Some(file))
}

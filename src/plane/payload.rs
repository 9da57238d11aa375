//! Deserialization boundary for Plane API payloads.
//!
//! Plane returns slightly different shapes depending on version and on the
//! `expand` parameter (a state may be an object or a bare id, assignees may be
//! objects or bare ids). Everything loose stays in this module; the rest of
//! the crate only sees [`Task`], [`ProjectMeta`] and [`Member`].

use crate::error::{SyncError, SyncResult};
use crate::types::{Member, Priority, ProjectMeta, Status, Task};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::debug;

/// Read a list that the server may send as `null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(deserialize_with = "null_as_empty")]
    pub results: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub next_page_results: Option<bool>,
}

impl<T> Page<T> {
    /// Cursor for the next page, or `None` when the listing is exhausted.
    ///
    /// Plane always echoes a `next_cursor`; `next_page_results` says whether
    /// following it yields anything. Servers that omit the flag are trusted
    /// on the cursor alone.
    pub fn continuation(&self) -> Option<&str> {
        let cursor = self.next_cursor.as_deref().filter(|c| !c.is_empty())?;
        match self.next_page_results {
            Some(false) => None,
            _ => Some(cursor),
        }
    }
}

/// Either an expanded object or a bare id.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Ref<T> {
    Expanded(T),
    Id(String),
}

#[derive(Debug, Deserialize)]
pub struct RawState {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawIdOnly {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct RawIssue {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description_stripped: Option<String>,
    #[serde(default)]
    pub description: Option<serde_json::Value>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub sequence_id: Option<u64>,
    #[serde(default)]
    pub state: Option<Ref<RawState>>,
    #[serde(default)]
    pub state_detail: Option<RawState>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub assignees: Vec<Ref<RawIdOnly>>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawProject {
    pub id: String,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawMember {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Workspace member rows come either flat or wrapped in `{ "member": ... }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawMemberEntry {
    Wrapped { member: RawMember },
    Flat(RawMember),
}

/// Listing endpoints answer with a cursor page or, on some deployments and
/// endpoints (`members/`), a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Page(Page<T>),
    List(Vec<T>),
}

impl<T> Listing<T> {
    /// Split into the rows and the cursor to follow, if any.
    pub fn into_parts(self) -> (Vec<T>, Option<String>) {
        match self {
            Listing::Page(page) => {
                let next = page.continuation().map(str::to_string);
                (page.results, next)
            }
            Listing::List(rows) => (rows, None),
        }
    }
}

/// Decode a JSON body, reporting shape errors as integrity violations.
pub fn decode<T: DeserializeOwned>(body: &str, what: &str) -> SyncResult<T> {
    serde_json::from_str(body).map_err(|e| {
        SyncError::integrity(format!("Malformed {} payload from Plane", what))
            .with_details(e.to_string())
    })
}

impl RawIssue {
    pub fn into_task(self, project: &ProjectMeta) -> Task {
        let (state_name, group) = match (self.state, self.state_detail) {
            (Some(Ref::Expanded(state)), _) | (_, Some(state)) => (state.name, state.group),
            _ => (None, None),
        };
        let status = state_name
            .as_deref()
            .and_then(Status::parse)
            .or_else(|| group.as_deref().and_then(Status::parse))
            .unwrap_or(Status::Unknown);

        let description = self
            .description_stripped
            .or_else(|| match self.description {
                Some(serde_json::Value::String(s)) => Some(s),
                _ => None,
            })
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let assignees = self
            .assignees
            .into_iter()
            .map(|a| match a {
                Ref::Expanded(obj) => obj.id,
                Ref::Id(id) => id,
            })
            .collect();

        let key = self
            .sequence_id
            .filter(|_| !project.identifier.is_empty())
            .map(|seq| format!("{}-{}", project.identifier, seq));

        Task {
            key,
            title: self
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            description,
            status,
            state_name,
            priority: self
                .priority
                .as_deref()
                .map(Priority::normalize)
                .unwrap_or(Priority::None),
            assignees,
            created_at: self.created_at.as_deref().and_then(parse_timestamp),
            updated_at: self.updated_at.as_deref().and_then(parse_timestamp),
            project_id: project.id.clone(),
            id: self.id,
        }
    }
}

impl From<RawProject> for ProjectMeta {
    fn from(raw: RawProject) -> Self {
        let identifier = raw.identifier.unwrap_or_default();
        ProjectMeta {
            name: raw
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| identifier.clone()),
            identifier,
            description: raw.description.filter(|d| !d.trim().is_empty()),
            id: raw.id,
        }
    }
}

impl From<RawMember> for Member {
    fn from(raw: RawMember) -> Self {
        let email = raw.email.filter(|e| !e.trim().is_empty());
        let full_name = [raw.first_name.as_deref(), raw.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let display_name = raw
            .display_name
            .filter(|n| !n.trim().is_empty())
            .or_else(|| (!full_name.is_empty()).then_some(full_name))
            .or_else(|| email.clone())
            .unwrap_or_else(|| raw.id.clone());
        Member {
            id: raw.id,
            display_name,
            email,
        }
    }
}

impl From<RawMemberEntry> for Member {
    fn from(entry: RawMemberEntry) -> Self {
        match entry {
            RawMemberEntry::Wrapped { member } | RawMemberEntry::Flat(member) => member.into(),
        }
    }
}

/// Parse the timestamp formats Plane has been seen to emit.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
    }
    debug!(value = %s, "Unparseable timestamp, treating as missing");
    None
}

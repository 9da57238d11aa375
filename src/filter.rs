//! Task filtering.
//!
//! Pure: `apply` takes the fetched tasks, the criteria and a resolved roster
//! and returns a new, ordered and truncated list. Anything that needs the
//! network (resolving `--my-tasks` to a user id) happens before this stage.

use crate::directory::Roster;
use crate::error::{SyncError, SyncResult};
use crate::types::{Priority, Status, Task};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::warn;

/// Tasks shown when no limit is given.
pub const DEFAULT_LIMIT: usize = 20;

/// Upper bound for `--limit`; larger values are clamped.
pub const MAX_LIMIT: usize = 100;

/// Who a task must be assigned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssigneeMatcher {
    /// The current user. `user_id` is `None` when their email is not in the
    /// workspace directory, in which case nothing matches.
    Me {
        email: String,
        user_id: Option<String>,
    },
    /// Free text: exact email, display-name substring or raw user id.
    Query(String),
}

impl AssigneeMatcher {
    fn matches(&self, task: &Task, roster: &Roster) -> bool {
        match self {
            AssigneeMatcher::Me { user_id, .. } => match user_id {
                Some(id) => task.assignees.iter().any(|a| a == id),
                None => false,
            },
            AssigneeMatcher::Query(query) => {
                let needle = query.trim().to_lowercase();
                if needle.is_empty() {
                    return false;
                }
                task.assignees.iter().any(|id| {
                    if id.eq_ignore_ascii_case(&needle) {
                        return true;
                    }
                    roster.get(id).is_some_and(|m| {
                        m.email_matches(&needle) || m.display_name.to_lowercase().contains(&needle)
                    })
                })
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            AssigneeMatcher::Me { email, .. } => format!("my tasks ({})", email),
            AssigneeMatcher::Query(q) => format!("assignee ~ \"{}\"", q.trim()),
        }
    }
}

/// Restrictions applied to the fetched task list. Absent fields mean no
/// restriction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCriteria {
    pub assignee: Option<AssigneeMatcher>,
    pub priorities: Option<BTreeSet<Priority>>,
    pub statuses: Option<BTreeSet<Status>>,
    pub limit: usize,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            assignee: None,
            priorities: None,
            statuses: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl FilterCriteria {
    /// Criteria with the given limit. Zero is rejected, values above
    /// `MAX_LIMIT` are clamped.
    pub fn new(limit: Option<usize>) -> SyncResult<Self> {
        let limit = match limit {
            None => DEFAULT_LIMIT,
            Some(0) => {
                return Err(SyncError::invalid_value("limit", "must be at least 1"));
            }
            Some(n) if n > MAX_LIMIT => {
                warn!(requested = n, max = MAX_LIMIT, "Clamping task limit");
                MAX_LIMIT
            }
            Some(n) => n,
        };
        Ok(Self {
            limit,
            ..Self::default()
        })
    }

    pub fn with_assignee(mut self, matcher: Option<AssigneeMatcher>) -> Self {
        self.assignee = matcher;
        self
    }

    /// Restrict to these priorities. An empty set means no restriction.
    pub fn with_priorities(mut self, priorities: impl IntoIterator<Item = Priority>) -> Self {
        let set: BTreeSet<Priority> = priorities.into_iter().collect();
        self.priorities = (!set.is_empty()).then_some(set);
        self
    }

    /// Restrict to these statuses. An empty set means no restriction.
    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = Status>) -> Self {
        let set: BTreeSet<Status> = statuses.into_iter().collect();
        self.statuses = (!set.is_empty()).then_some(set);
        self
    }

    /// Human description of the active restrictions.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(ref matcher) = self.assignee {
            parts.push(matcher.describe());
        }
        if let Some(ref priorities) = self.priorities {
            // Most important first
            let names: Vec<&str> = Priority::ALL
                .iter()
                .filter(|p| priorities.contains(p))
                .map(|p| p.as_str())
                .collect();
            parts.push(format!("priority: {}", names.join(", ")));
        }
        if let Some(ref statuses) = self.statuses {
            let names: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
            parts.push(format!("status: {}", names.join(", ")));
        }
        if parts.is_empty() {
            parts.push("all tasks".to_string());
        }
        parts.push(format!("limit: {}", self.limit));
        parts.join("; ")
    }
}

/// Parse a comma-separated `--priority` value.
pub fn parse_priorities(csv: &str) -> SyncResult<Vec<Priority>> {
    split_csv(csv)
        .map(|item| {
            Priority::parse(item).ok_or_else(|| {
                SyncError::invalid_value(
                    "priority",
                    format!("has unknown value '{}' (expected urgent, high, medium, low or none)", item),
                )
            })
        })
        .collect()
}

/// Parse a comma-separated `--status` value.
pub fn parse_statuses(csv: &str) -> SyncResult<Vec<Status>> {
    split_csv(csv)
        .map(|item| {
            Status::parse(item).ok_or_else(|| {
                let known: Vec<&str> = Status::ALL.iter().map(|s| s.as_str()).collect();
                SyncError::invalid_value(
                    "status",
                    format!("has unknown value '{}' (expected one of {})", item, known.join(", ")),
                )
            })
        })
        .collect()
}

fn split_csv(csv: &str) -> impl Iterator<Item = &str> {
    csv.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Filter, order and truncate `tasks`. The input is left untouched.
pub fn apply(tasks: &[Task], criteria: &FilterCriteria, roster: &Roster) -> Vec<Task> {
    let mut selected: Vec<Task> = tasks
        .iter()
        .filter(|task| {
            criteria
                .assignee
                .as_ref()
                .is_none_or(|m| m.matches(task, roster))
        })
        .filter(|task| {
            criteria
                .priorities
                .as_ref()
                .is_none_or(|set| set.contains(&task.priority))
        })
        .filter(|task| {
            criteria
                .statuses
                .as_ref()
                .is_none_or(|set| set.contains(&task.status))
        })
        .cloned()
        .collect();

    selected.sort_by(report_order);
    selected.truncate(criteria.limit);
    selected
}

/// Priority rank descending, then most recently updated, then key.
///
/// Keys compare by sequence number, so `MOB-9` sorts before `MOB-10`. Tasks
/// without a numbered key come after those with one.
pub fn report_order(a: &Task, b: &Task) -> Ordering {
    b.priority
        .rank()
        .cmp(&a.priority.rank())
        .then_with(|| match (a.updated_at, b.updated_at) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| match (a.sequence(), b.sequence()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.display_key().cmp(b.display_key()))
        .then_with(|| a.id.cmp(&b.id))
}

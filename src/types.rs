//! Core types for the Plane sync pipeline.

use chrono::{DateTime, Utc};
use heck::ToSnakeCase;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized task status.
///
/// Remote states are free-form per project; everything is folded into this
/// closed set and anything unrecognised lands in `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Backlog,
    Todo,
    InProgress,
    Review,
    Testing,
    Done,
    Blocked,
    Cancelled,
    Unknown,
}

impl Status {
    /// All statuses in report order.
    pub const ALL: [Status; 9] = [
        Status::Backlog,
        Status::Todo,
        Status::InProgress,
        Status::Review,
        Status::Testing,
        Status::Done,
        Status::Blocked,
        Status::Cancelled,
        Status::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Backlog => "backlog",
            Status::Todo => "todo",
            Status::InProgress => "in-progress",
            Status::Review => "review",
            Status::Testing => "testing",
            Status::Done => "done",
            Status::Blocked => "blocked",
            Status::Cancelled => "cancelled",
            Status::Unknown => "unknown",
        }
    }

    /// Human label used in report headings.
    pub fn label(&self) -> &'static str {
        match self {
            Status::Backlog => "Backlog",
            Status::Todo => "Todo",
            Status::InProgress => "In Progress",
            Status::Review => "Review",
            Status::Testing => "Testing",
            Status::Done => "Done",
            Status::Blocked => "Blocked",
            Status::Cancelled => "Cancelled",
            Status::Unknown => "Unknown",
        }
    }

    /// Identifier form used in template tokens (`in_progress`).
    pub fn token_key(&self) -> String {
        self.as_str().to_snake_case()
    }

    /// Parse a status name, accepting the aliases Plane projects commonly use.
    /// Returns `None` for anything outside the closed set.
    pub fn parse(s: &str) -> Option<Self> {
        let key = s.trim().to_snake_case();
        let status = match key.as_str() {
            "backlog" | "icebox" => Status::Backlog,
            "todo" | "to_do" | "unstarted" | "open" | "new" | "pending" => Status::Todo,
            "in_progress" | "started" | "doing" | "wip" | "active" => Status::InProgress,
            "review" | "in_review" | "code_review" | "reviewing" => Status::Review,
            "testing" | "in_testing" | "qa" | "test" => Status::Testing,
            "done" | "completed" | "complete" | "closed" | "resolved" => Status::Done,
            "blocked" | "on_hold" => Status::Blocked,
            "cancelled" | "canceled" | "wont_do" | "duplicate" => Status::Cancelled,
            "unknown" => Status::Unknown,
            _ => return None,
        };
        Some(status)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority, Plane's fixed five-level scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Urgent,
    High,
    Medium,
    Low,
    None,
}

impl Priority {
    /// All priorities, most important first.
    pub const ALL: [Priority; 5] = [
        Priority::Urgent,
        Priority::High,
        Priority::Medium,
        Priority::Low,
        Priority::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Urgent => "urgent",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::None => "none",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Priority::Urgent => "Urgent",
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
            Priority::None => "No priority",
        }
    }

    /// Sort rank, higher = more important.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Urgent => 4,
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
            Priority::None => 0,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "urgent" => Some(Priority::Urgent),
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            "none" | "" => Some(Priority::None),
            _ => None,
        }
    }

    /// Lenient form used at the payload boundary.
    pub fn normalize(s: &str) -> Self {
        Self::parse(s).unwrap_or(Priority::None)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Project metadata as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMeta {
    /// Remote primary key (UUID).
    pub id: String,
    /// Short key, e.g. `MOBILE`.
    pub identifier: String,
    pub name: String,
    pub description: Option<String>,
}

/// A task (Plane "issue") after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    /// Human key such as `MOBILE-42` when a sequence number is known.
    pub key: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub status: Status,
    /// Remote state name as shown in Plane, kept for display.
    pub state_name: Option<String>,
    pub priority: Priority,
    /// Assignee user ids, in remote order.
    pub assignees: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub project_id: String,
}

impl Task {
    /// First assignee, used for grouping.
    pub fn primary_assignee(&self) -> Option<&str> {
        self.assignees.first().map(|s| s.as_str())
    }

    /// Key if known, otherwise the raw id.
    pub fn display_key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.id)
    }

    /// Sequence number from the key (`42` for `MOB-42`).
    pub fn sequence(&self) -> Option<u64> {
        let (_, seq) = self.key.as_deref()?.rsplit_once('-')?;
        seq.parse().ok()
    }
}

/// A workspace member from the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Member {
    pub fn email_matches(&self, email: &str) -> bool {
        self.email
            .as_deref()
            .is_some_and(|e| e.trim().eq_ignore_ascii_case(email.trim()))
    }
}

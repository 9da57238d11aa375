//! Report model.
//!
//! Aggregates are computed over every fetched task so the headline numbers
//! describe the whole project. Lists and groupings cover only the filtered
//! selection, in filter order.

use crate::directory::Roster;
use crate::types::{Priority, ProjectMeta, Status, Task};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Group label for tasks without an assignee.
pub const UNASSIGNED: &str = "Unassigned";

/// One task, flattened for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskLine {
    pub id: String,
    /// `MOB-42`, or the raw id when the sequence is unknown.
    pub key: String,
    pub title: String,
    pub description: Option<String>,
    pub status: Status,
    /// Remote state name when it differs from the normalized label.
    pub state_name: Option<String>,
    pub priority: Priority,
    /// First assignee's display name, or `Unassigned`.
    pub assignee: String,
    /// Every assignee's display name, in remote order.
    pub assignees: Vec<String>,
    /// `YYYY-MM-DD` or `-`.
    pub updated: String,
}

impl TaskLine {
    pub fn from_task(task: &Task, roster: &Roster) -> Self {
        let assignees: Vec<String> = task
            .assignees
            .iter()
            .map(|id| roster.display_name(id).to_string())
            .collect();
        Self {
            id: task.id.clone(),
            key: task.display_key().to_string(),
            title: task.title.clone(),
            description: task
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            status: task.status,
            state_name: task
                .state_name
                .clone()
                .filter(|name| !name.eq_ignore_ascii_case(task.status.label())),
            priority: task.priority,
            assignee: assignees
                .first()
                .cloned()
                .unwrap_or_else(|| UNASSIGNED.to_string()),
            assignees,
            updated: task
                .updated_at
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }

    pub fn is_unassigned(&self) -> bool {
        self.assignees.is_empty()
    }

    /// All assignee names, comma separated.
    pub fn assignees_text(&self) -> String {
        if self.assignees.is_empty() {
            self.assignee.clone()
        } else {
            self.assignees.join(", ")
        }
    }

    /// Status text for display: remote state name if it adds information.
    pub fn status_text(&self) -> &str {
        self.state_name.as_deref().unwrap_or(self.status.label())
    }
}

/// Tasks sharing a first assignee.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssigneeGroup {
    pub name: String,
    pub tasks: Vec<TaskLine>,
}

/// Everything a template can refer to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportModel {
    pub project: ProjectMeta,
    pub generated_at: DateTime<Utc>,
    pub filter_summary: String,

    // Over all fetched tasks
    pub total_tasks: usize,
    pub status_counts: BTreeMap<Status, usize>,
    pub priority_counts: BTreeMap<Priority, usize>,
    pub done_count: usize,
    pub in_progress_count: usize,
    pub pending_count: usize,
    pub unassigned_count: usize,
    /// Fraction of done tasks in `[0.0, 1.0]`.
    pub completion_rate: f64,

    // Over the filtered selection
    pub tasks: Vec<TaskLine>,
    pub by_status: BTreeMap<Status, Vec<TaskLine>>,
    pub by_priority: BTreeMap<Priority, Vec<TaskLine>>,
    /// Named groups alphabetically, `Unassigned` last.
    pub by_assignee: Vec<AssigneeGroup>,
}

impl ReportModel {
    pub fn filtered_task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn status_count(&self, status: Status) -> usize {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }

    pub fn priority_count(&self, priority: Priority) -> usize {
        self.priority_counts.get(&priority).copied().unwrap_or(0)
    }

    pub fn tasks_with_status(&self, status: Status) -> &[TaskLine] {
        self.by_status.get(&status).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tasks_with_priority(&self, priority: Priority) -> &[TaskLine] {
        self.by_priority
            .get(&priority)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn unassigned_tasks(&self) -> Vec<&TaskLine> {
        self.tasks.iter().filter(|t| t.is_unassigned()).collect()
    }
}

/// Assemble the report model.
pub fn build(
    project: &ProjectMeta,
    all_tasks: &[Task],
    filtered: &[Task],
    roster: &Roster,
    filter_summary: &str,
    now: DateTime<Utc>,
) -> ReportModel {
    let mut status_counts: BTreeMap<Status, usize> = Status::ALL.iter().map(|s| (*s, 0)).collect();
    let mut priority_counts: BTreeMap<Priority, usize> =
        Priority::ALL.iter().map(|p| (*p, 0)).collect();
    let mut unassigned_count = 0;
    for task in all_tasks {
        *status_counts.entry(task.status).or_default() += 1;
        *priority_counts.entry(task.priority).or_default() += 1;
        if task.assignees.is_empty() {
            unassigned_count += 1;
        }
    }

    let total_tasks = all_tasks.len();
    let done_count = status_counts.get(&Status::Done).copied().unwrap_or(0);
    let in_progress_count = status_counts.get(&Status::InProgress).copied().unwrap_or(0);
    let completion_rate = if total_tasks == 0 {
        0.0
    } else {
        done_count as f64 / total_tasks as f64
    };

    let tasks: Vec<TaskLine> = filtered
        .iter()
        .map(|t| TaskLine::from_task(t, roster))
        .collect();

    let mut by_status: BTreeMap<Status, Vec<TaskLine>> =
        Status::ALL.iter().map(|s| (*s, Vec::new())).collect();
    let mut by_priority: BTreeMap<Priority, Vec<TaskLine>> =
        Priority::ALL.iter().map(|p| (*p, Vec::new())).collect();
    let mut named: BTreeMap<String, Vec<TaskLine>> = BTreeMap::new();
    let mut unassigned = Vec::new();

    for line in &tasks {
        by_status.entry(line.status).or_default().push(line.clone());
        by_priority.entry(line.priority).or_default().push(line.clone());
        if line.is_unassigned() {
            unassigned.push(line.clone());
        } else {
            named.entry(line.assignee.clone()).or_default().push(line.clone());
        }
    }

    let mut by_assignee: Vec<AssigneeGroup> = named
        .into_iter()
        .map(|(name, tasks)| AssigneeGroup { name, tasks })
        .collect();
    if !unassigned.is_empty() {
        by_assignee.push(AssigneeGroup {
            name: UNASSIGNED.to_string(),
            tasks: unassigned,
        });
    }

    ReportModel {
        project: project.clone(),
        generated_at: now,
        filter_summary: filter_summary.to_string(),
        total_tasks,
        status_counts,
        priority_counts,
        done_count,
        in_progress_count,
        pending_count: total_tasks - done_count - in_progress_count,
        unassigned_count,
        completion_rate,
        tasks,
        by_status,
        by_priority,
        by_assignee,
    }
}

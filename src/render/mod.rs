//! Template rendering.
//!
//! Templates are plain Markdown with `{{ token }}` placeholders. Each token
//! name maps onto one variant of [`Token`]; rendering is a single regex pass
//! that swaps every recognised placeholder for its value and leaves anything
//! else exactly as written.

pub mod templates;

pub use templates::{TemplateName, TemplateStore};

use crate::error::{SyncError, SyncResult};
use crate::format;
use crate::report::ReportModel;
use crate::types::{Priority, Status};
use chrono::SecondsFormat;
use regex_lite::{Captures, Regex};

/// `{{ name }}` with optional inner whitespace.
const TOKEN_PATTERN: &str = r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}";

/// Every placeholder a template may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    ProjectName,
    ProjectId,
    ProjectIdentifier,
    Date,
    Time,
    DateTime,
    GeneratedAt,
    Timestamp,
    TotalTasks,
    FilteredTaskCount,
    DoneCount,
    InProgressCount,
    PendingCount,
    UnassignedCount,
    CompletionRate,
    FilterSummary,
    TaskTable,
    TaskList,
    TaskNumbered,
    TaskDetails,
    TasksByAssignee,
    UnassignedTasks,
    StatusTasks(Status),
    StatusCount(Status),
    PriorityTasks(Priority),
    PriorityCount(Priority),
}

impl Token {
    pub fn from_str(name: &str) -> Option<Self> {
        let token = match name {
            "project_name" => Token::ProjectName,
            "project_id" => Token::ProjectId,
            "project_identifier" => Token::ProjectIdentifier,
            "date" => Token::Date,
            "time" => Token::Time,
            "datetime" => Token::DateTime,
            "generated_at" => Token::GeneratedAt,
            "timestamp" => Token::Timestamp,
            "total_tasks" => Token::TotalTasks,
            "filtered_task_count" => Token::FilteredTaskCount,
            "done_count" => Token::DoneCount,
            "in_progress_count" => Token::InProgressCount,
            "pending_count" => Token::PendingCount,
            "unassigned_count" => Token::UnassignedCount,
            "completion_rate" => Token::CompletionRate,
            "filter_summary" => Token::FilterSummary,
            "task_table" => Token::TaskTable,
            "task_list" => Token::TaskList,
            "task_numbered" => Token::TaskNumbered,
            "task_details" => Token::TaskDetails,
            "tasks_by_assignee" => Token::TasksByAssignee,
            "unassigned_tasks" => Token::UnassignedTasks,
            // Names used by older plane-sync templates
            "all_tasks_table" => Token::TaskTable,
            "all_tasks_bullet" => Token::TaskList,
            "all_tasks_numbered" => Token::TaskNumbered,
            "completed_tasks" => Token::DoneCount,
            "pending_tasks" => Token::PendingCount,
            "to_do_tasks" => Token::StatusTasks(Status::Todo),
            other => return Self::bucket(other),
        };
        Some(token)
    }

    /// `<status>_tasks`, `<status>_count`, `<priority>_priority_tasks`,
    /// `<priority>_priority_count`.
    fn bucket(name: &str) -> Option<Self> {
        if let Some(prefix) = name.strip_suffix("_priority_tasks") {
            return priority_by_key(prefix).map(Token::PriorityTasks);
        }
        if let Some(prefix) = name.strip_suffix("_priority_count") {
            return priority_by_key(prefix).map(Token::PriorityCount);
        }
        if let Some(prefix) = name.strip_suffix("_tasks") {
            return status_by_key(prefix).map(Token::StatusTasks);
        }
        if let Some(prefix) = name.strip_suffix("_count") {
            return status_by_key(prefix).map(Token::StatusCount);
        }
        None
    }

    /// Value of this token for `model`.
    pub fn value(&self, model: &ReportModel) -> String {
        let at = model.generated_at;
        match self {
            Token::ProjectName => model.project.name.clone(),
            Token::ProjectId => model.project.id.clone(),
            Token::ProjectIdentifier => model.project.identifier.clone(),
            Token::Date => at.format("%Y-%m-%d").to_string(),
            Token::Time => at.format("%H:%M:%S").to_string(),
            Token::DateTime => at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            Token::GeneratedAt => at.to_rfc3339_opts(SecondsFormat::Secs, true),
            Token::Timestamp => at.timestamp().to_string(),
            Token::TotalTasks => model.total_tasks.to_string(),
            Token::FilteredTaskCount => model.filtered_task_count().to_string(),
            Token::DoneCount => model.done_count.to_string(),
            Token::InProgressCount => model.in_progress_count.to_string(),
            Token::PendingCount => model.pending_count.to_string(),
            Token::UnassignedCount => model.unassigned_count.to_string(),
            Token::CompletionRate => format!("{:.1}%", model.completion_rate * 100.0),
            Token::FilterSummary => model.filter_summary.clone(),
            Token::TaskTable => format::task_table(&model.tasks),
            Token::TaskList => format::task_list(&model.tasks),
            Token::TaskNumbered => format::task_numbered(&model.tasks),
            Token::TaskDetails => format::task_details(&model.tasks),
            Token::TasksByAssignee => format::assignee_sections(&model.by_assignee),
            Token::UnassignedTasks => format::task_list(model.unassigned_tasks()),
            Token::StatusTasks(s) => format::task_list(model.tasks_with_status(*s)),
            Token::StatusCount(s) => model.status_count(*s).to_string(),
            Token::PriorityTasks(p) => format::task_list(model.tasks_with_priority(*p)),
            Token::PriorityCount(p) => model.priority_count(*p).to_string(),
        }
    }
}

fn status_by_key(key: &str) -> Option<Status> {
    Status::ALL.into_iter().find(|s| s.token_key() == key)
}

fn priority_by_key(key: &str) -> Option<Priority> {
    Priority::ALL.into_iter().find(|p| p.as_str() == key)
}

/// Compiled token matcher.
#[derive(Debug, Clone)]
pub struct Renderer {
    pattern: Regex,
}

impl Renderer {
    pub fn new() -> SyncResult<Self> {
        let pattern = Regex::new(TOKEN_PATTERN)
            .map_err(|e| SyncError::integrity(format!("Invalid token pattern: {}", e)))?;
        Ok(Self { pattern })
    }

    /// Substitute every known token in `template`. Unknown tokens stay as
    /// written.
    pub fn render(&self, template: &str, model: &ReportModel) -> String {
        self.pattern
            .replace_all(template, |caps: &Captures| {
                match caps.get(1).and_then(|m| Token::from_str(m.as_str())) {
                    Some(token) => token.value(model),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Placeholder names in `template` that no token matches.
    pub fn unknown_tokens(&self, template: &str) -> Vec<String> {
        self.pattern
            .captures_iter(template)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
            .filter(|name| Token::from_str(name).is_none())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Roster;
    use crate::filter::{self, AssigneeMatcher, FilterCriteria};
    use crate::report;
    use crate::types::{ProjectMeta, Task};
    use chrono::{TimeZone, Utc};

    fn task(id: &str, priority: Priority, status: Status) -> Task {
        Task {
            id: id.to_string(),
            key: Some(format!("MOB-{}", id)),
            title: format!("Task {}", id),
            description: None,
            status,
            state_name: None,
            priority,
            assignees: vec!["u1".to_string()],
            created_at: None,
            updated_at: None,
            project_id: "p1".to_string(),
        }
    }

    fn model_with(criteria: &FilterCriteria) -> ReportModel {
        let project = ProjectMeta {
            id: "p1".to_string(),
            identifier: "MOB".to_string(),
            name: "Mobile".to_string(),
            description: None,
        };
        let all = vec![
            task("1", Priority::Urgent, Status::InProgress),
            task("2", Priority::High, Status::Done),
            task("3", Priority::Low, Status::Todo),
        ];
        let roster = Roster::default();
        let filtered = filter::apply(&all, criteria, &roster);
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 8, 30, 5).unwrap();
        report::build(&project, &all, &filtered, &roster, &criteria.summary(), now)
    }

    fn model() -> ReportModel {
        model_with(&FilterCriteria::default())
    }

    fn renderer() -> Renderer {
        Renderer::new().unwrap()
    }

    #[test]
    fn test_token_names() {
        assert_eq!(Token::from_str("in_progress_tasks"), Some(Token::StatusTasks(Status::InProgress)));
        assert_eq!(Token::from_str("done_count"), Some(Token::DoneCount));
        assert_eq!(Token::from_str("blocked_count"), Some(Token::StatusCount(Status::Blocked)));
        assert_eq!(
            Token::from_str("none_priority_tasks"),
            Some(Token::PriorityTasks(Priority::None))
        );
        assert_eq!(
            Token::from_str("urgent_priority_count"),
            Some(Token::PriorityCount(Priority::Urgent))
        );
        assert_eq!(Token::from_str("technical_debt_tasks"), None);
        assert_eq!(Token::from_str("priority_tasks"), None);
    }

    #[test]
    fn test_legacy_token_names() {
        let cases = [
            ("all_tasks_table", Token::TaskTable),
            ("all_tasks_bullet", Token::TaskList),
            ("all_tasks_numbered", Token::TaskNumbered),
            ("completed_tasks", Token::DoneCount),
            ("pending_tasks", Token::PendingCount),
            ("timestamp", Token::Timestamp),
            ("to_do_tasks", Token::StatusTasks(Status::Todo)),
        ];
        for (name, token) in cases {
            assert_eq!(Token::from_str(name), Some(token), "{}", name);
        }

        let out = renderer().render(
            "{{completed_tasks}}/{{pending_tasks}} {{timestamp}}\n{{to_do_tasks}}",
            &model(),
        );
        assert_eq!(out, "1/1 1710059405\n- **MOB-3** Task 3 [Low · Todo · u1]");
    }

    #[test]
    fn test_scalar_tokens() {
        let out = renderer().render(
            "{{project_name}} ({{ project_identifier }}) {{date}} {{time}} {{generated_at}} \
             {{total_tasks}}/{{filtered_task_count}} {{completion_rate}}",
            &model(),
        );
        assert_eq!(
            out,
            "Mobile (MOB) 2024-03-10 08:30:05 2024-03-10T08:30:05Z 3/3 33.3%"
        );
    }

    #[test]
    fn test_unknown_tokens_left_untouched() {
        let template = "A {{ mystery }} B {{technical_debt_tasks}} C {{total_tasks}} {single}";
        let out = renderer().render(template, &model());
        assert_eq!(out, "A {{ mystery }} B {{technical_debt_tasks}} C 3 {single}");
        assert_eq!(
            renderer().unknown_tokens(template),
            vec!["mystery", "technical_debt_tasks"]
        );
    }

    #[test]
    fn test_render_is_idempotent() {
        let template = templates::TemplateName::AiContext.embedded();
        let model = model();
        let r = renderer();
        assert_eq!(r.render(template, &model), r.render(template, &model));
    }

    #[test]
    fn test_empty_sections_render_none() {
        let criteria = FilterCriteria::new(None)
            .unwrap()
            .with_assignee(Some(AssigneeMatcher::Me {
                email: "nobody@example.com".to_string(),
                user_id: None,
            }));
        let model = model_with(&criteria);
        assert!(model.tasks.is_empty());

        let out = renderer().render("## Mine\n{{task_list}}\n## Blocked\n{{blocked_tasks}}", &model);
        assert_eq!(out, "## Mine\n(none)\n## Blocked\n(none)");
        // Totals still describe the whole project
        assert_eq!(renderer().render("{{total_tasks}}", &model), "3");
    }

    #[test]
    fn test_bucket_lists_follow_filter() {
        let out = renderer().render("{{urgent_priority_tasks}}|{{low_priority_count}}", &model());
        assert_eq!(out, "- **MOB-1** Task 1 [Urgent · In Progress · u1]|1");
    }

    #[test]
    fn test_completion_rate_zero_tasks() {
        let project = ProjectMeta {
            id: "p".to_string(),
            identifier: "P".to_string(),
            name: "Empty".to_string(),
            description: None,
        };
        let model = report::build(&project, &[], &[], &Roster::default(), "all tasks", Utc::now());
        assert_eq!(renderer().render("{{completion_rate}}", &model), "0.0%");
    }

    #[test]
    fn test_every_embedded_template_uses_known_tokens() {
        let r = renderer();
        for name in templates::TemplateName::ALL {
            assert!(
                r.unknown_tokens(name.embedded()).is_empty(),
                "{} has unknown tokens: {:?}",
                name,
                r.unknown_tokens(name.embedded())
            );
        }
    }
}

//! The sync pipeline: fetch, resolve, filter, render, write.

use crate::config::{CONFIG_DIR_NAME, Config};
use crate::directory::UserDirectory;
use crate::error::{SyncError, SyncResult};
use crate::filter::{self, AssigneeMatcher, FilterCriteria};
use crate::fsutil::write_atomic;
use crate::plane::{MemberSource, TaskSource};
use crate::render::{Renderer, TemplateName, TemplateStore};
use crate::report;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What the user asked for on the command line.
#[derive(Debug, Clone, Default)]
pub struct SyncRequest {
    /// Project UUID, identifier or name.
    pub project: String,
    pub my_tasks: bool,
    pub assignee: Option<String>,
    /// Comma-separated priority names.
    pub priorities: Option<String>,
    /// Comma-separated status names.
    pub statuses: Option<String>,
    pub limit: Option<usize>,
    pub template: Option<String>,
    pub output: Option<PathBuf>,
    pub refresh_users: bool,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncOutcome {
    pub project_id: String,
    pub project_identifier: String,
    pub project_name: String,
    pub total_tasks: usize,
    pub filtered_tasks: usize,
    pub output_path: PathBuf,
    pub template: String,
    pub users_refreshed: bool,
    pub generated_at: DateTime<Utc>,
}

impl SyncOutcome {
    /// Human summary printed by the CLI.
    pub fn to_text(&self) -> String {
        format!(
            "Synced {} ({}): {} of {} tasks written to {} using the {} template",
            self.project_name,
            self.project_identifier,
            self.filtered_tasks,
            self.total_tasks,
            self.output_path.display(),
            self.template
        )
    }
}

/// Everything checked before the first network call.
#[derive(Debug)]
struct Plan {
    criteria: FilterCriteria,
    my_email: Option<String>,
    template: TemplateName,
    template_text: String,
    renderer: Renderer,
    output: PathBuf,
}

impl Plan {
    fn prepare(config: &Config, project_dir: &Path, request: &SyncRequest) -> SyncResult<Self> {
        config.validate()?;
        if request.project.trim().is_empty() {
            return Err(SyncError::invalid_value("project", "is required"));
        }

        let mut criteria = FilterCriteria::new(request.limit)?;
        if let Some(ref csv) = request.priorities {
            criteria = criteria.with_priorities(filter::parse_priorities(csv)?);
        }
        if let Some(ref csv) = request.statuses {
            criteria = criteria.with_statuses(filter::parse_statuses(csv)?);
        }

        let my_email = if request.my_tasks {
            let email = config.user_email().ok_or_else(|| {
                SyncError::invalid_value("user.email", "is required for --my-tasks (set MY_EMAIL)")
            })?;
            if request.assignee.is_some() {
                warn!("--my-tasks takes precedence over --assignee");
            }
            Some(email.to_string())
        } else {
            None
        };

        let template_name = request
            .template
            .as_deref()
            .unwrap_or(&config.report.default_template);
        let template = TemplateName::parse(template_name)?;

        let template_dir = config
            .report
            .template_dir
            .clone()
            .unwrap_or_else(|| project_dir.join(CONFIG_DIR_NAME).join("templates"));
        let store = TemplateStore::new(Some(template_dir), config.report.locale.clone());
        let template_text = store.load(template)?;
        let renderer = Renderer::new()?;
        let unknown = renderer.unknown_tokens(&template_text);
        if !unknown.is_empty() {
            warn!(template = %template, tokens = ?unknown, "Template has unknown tokens, left as written");
        }

        let output = request
            .output
            .clone()
            .unwrap_or_else(|| project_dir.join(&config.report.output_file));

        Ok(Self {
            criteria,
            my_email,
            template,
            template_text,
            renderer,
            output,
        })
    }
}

/// Run one sync against `source` and write the report.
///
/// Nothing is written unless every step succeeds.
pub async fn run<S>(
    config: &Config,
    project_dir: &Path,
    request: &SyncRequest,
    source: &S,
    now: DateTime<Utc>,
) -> SyncResult<SyncOutcome>
where
    S: TaskSource + MemberSource + ?Sized,
{
    let plan = Plan::prepare(config, project_dir, request)?;

    let project = source.fetch_project(&request.project).await?;
    let tasks = source.fetch_tasks(&project).await?;

    let mut directory = UserDirectory::load(
        config.cache.users_file(),
        &config.plane.workspace_slug,
        config.cache.max_age(),
    );
    directory.refresh(source, request.refresh_users).await?;

    let matcher = match plan.my_email {
        Some(email) => {
            let me = directory.find_by_email(source, &email).await?;
            if me.is_none() {
                warn!(email = %email, "Email not found in workspace members, no task will match");
            }
            Some(AssigneeMatcher::Me {
                email,
                user_id: me.map(|m| m.id),
            })
        }
        None => request
            .assignee
            .as_ref()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
            .map(|q| AssigneeMatcher::Query(q.to_string())),
    };
    let criteria = plan.criteria.with_assignee(matcher);

    let roster = directory
        .roster(source, tasks.iter().flat_map(|t| t.assignees.iter().map(String::as_str)))
        .await?;

    let filtered = filter::apply(&tasks, &criteria, &roster);
    info!(
        total = tasks.len(),
        selected = filtered.len(),
        filter = %criteria.summary(),
        "Filtered tasks"
    );

    let model = report::build(&project, &tasks, &filtered, &roster, &criteria.summary(), now);

    let rendered = plan.renderer.render(&plan.template_text, &model);

    write_atomic(&plan.output, rendered.as_bytes()).map_err(|e| {
        SyncError::io(&format!("Failed to write {}", plan.output.display()), e)
    })?;
    info!(path = %plan.output.display(), bytes = rendered.len(), "Report written");

    Ok(SyncOutcome {
        project_id: project.id,
        project_identifier: project.identifier,
        project_name: project.name,
        total_tasks: tasks.len(),
        filtered_tasks: filtered.len(),
        output_path: plan.output,
        template: plan.template.to_string(),
        users_refreshed: directory.fetched_this_run(),
        generated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::{Member, Priority, ProjectMeta, Status, Task};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// In-memory Plane with call counters.
    struct FakePlane {
        tasks: Vec<Task>,
        members: Vec<Member>,
        project_calls: AtomicUsize,
        member_calls: AtomicUsize,
    }

    impl FakePlane {
        fn new() -> Self {
            let task = |id: &str, priority, status, assignees: &[&str]| Task {
                id: id.to_string(),
                key: Some(format!("MOB-{}", id)),
                title: format!("Task {}", id),
                description: Some(format!("Description {}", id)),
                status,
                state_name: None,
                priority,
                assignees: assignees.iter().map(|s| s.to_string()).collect(),
                created_at: None,
                updated_at: None,
                project_id: "p1".to_string(),
            };
            Self {
                tasks: vec![
                    task("1", Priority::Urgent, Status::InProgress, &["u1"]),
                    task("2", Priority::High, Status::Done, &["u2"]),
                    task("3", Priority::Low, Status::Todo, &[]),
                ],
                members: vec![
                    Member {
                        id: "u1".to_string(),
                        display_name: "Ada".to_string(),
                        email: Some("ada@example.com".to_string()),
                    },
                    Member {
                        id: "u2".to_string(),
                        display_name: "Grace".to_string(),
                        email: Some("grace@example.com".to_string()),
                    },
                ],
                project_calls: AtomicUsize::new(0),
                member_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TaskSource for FakePlane {
        async fn fetch_project(&self, project: &str) -> SyncResult<ProjectMeta> {
            self.project_calls.fetch_add(1, Ordering::SeqCst);
            if !project.eq_ignore_ascii_case("mob") {
                return Err(SyncError::project_not_found(project));
            }
            Ok(ProjectMeta {
                id: "p1".to_string(),
                identifier: "MOB".to_string(),
                name: "Mobile".to_string(),
                description: None,
            })
        }

        async fn fetch_tasks(&self, _project: &ProjectMeta) -> SyncResult<Vec<Task>> {
            Ok(self.tasks.clone())
        }
    }

    #[async_trait]
    impl MemberSource for FakePlane {
        async fn list_members(&self) -> SyncResult<Vec<Member>> {
            self.member_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.members.clone())
        }
    }

    fn config(temp: &TempDir) -> Config {
        let mut config = Config::default();
        config.plane.api_key = "plane_api_test".to_string();
        config.plane.workspace_slug = "acme".to_string();
        config.cache.dir = temp.path().join("cache");
        config
    }

    fn request(project: &str) -> SyncRequest {
        SyncRequest {
            project: project.to_string(),
            ..SyncRequest::default()
        }
    }

    #[tokio::test]
    async fn test_full_run_writes_report() {
        let temp = TempDir::new().unwrap();
        let plane = FakePlane::new();
        let mut req = request("MOB");
        req.template = Some("brief".to_string());

        let outcome = run(&config(&temp), temp.path(), &req, &plane, Utc::now())
            .await
            .unwrap();

        assert_eq!(outcome.total_tasks, 3);
        assert_eq!(outcome.filtered_tasks, 3);
        assert_eq!(outcome.template, "brief");
        assert_eq!(outcome.output_path, temp.path().join("plane.md"));
        assert!(outcome.users_refreshed);
        assert_eq!(plane.member_calls.load(Ordering::SeqCst), 1);

        let md = std::fs::read_to_string(&outcome.output_path).unwrap();
        assert!(md.starts_with("# Mobile Brief"));
        assert!(md.contains("1/3 done (33.3%)"));
        let urgent = md.find("MOB-1").unwrap();
        let low = md.find("MOB-3").unwrap();
        assert!(urgent < low);
        assert!(md.contains("[Urgent · In Progress · Ada]"));
        assert!(temp.path().join("cache").join("users.json").exists());
    }

    #[tokio::test]
    async fn test_my_tasks_unknown_email_renders_none() {
        let temp = TempDir::new().unwrap();
        let plane = FakePlane::new();
        let mut config = config(&temp);
        config.user.email = Some("stranger@example.com".to_string());
        let mut req = request("mob");
        req.my_tasks = true;
        req.template = Some("brief".to_string());

        let outcome = run(&config, temp.path(), &req, &plane, Utc::now()).await.unwrap();

        assert_eq!(outcome.filtered_tasks, 0);
        assert_eq!(outcome.total_tasks, 3);
        let md = std::fs::read_to_string(&outcome.output_path).unwrap();
        assert!(md.contains("(none)"));
        assert_eq!(plane.member_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_priority_filter_and_custom_output() {
        let temp = TempDir::new().unwrap();
        let plane = FakePlane::new();
        let mut req = request("MOB");
        req.priorities = Some("high,urgent".to_string());
        req.output = Some(temp.path().join("out").join("report.md"));

        let outcome = run(&config(&temp), temp.path(), &req, &plane, Utc::now())
            .await
            .unwrap();

        assert_eq!(outcome.filtered_tasks, 2);
        assert_eq!(outcome.template, "ai-context");
        let md = std::fs::read_to_string(temp.path().join("out").join("report.md")).unwrap();
        assert!(md.contains("**Total tasks**: 3"));
        assert!(!md.contains("MOB-3"));
    }

    #[tokio::test]
    async fn test_validation_happens_before_network() {
        let temp = TempDir::new().unwrap();
        let plane = FakePlane::new();

        let mut req = request("MOB");
        req.limit = Some(0);
        let err = run(&config(&temp), temp.path(), &req, &plane, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        let mut req = request("MOB");
        req.my_tasks = true;
        let err = run(&config(&temp), temp.path(), &req, &plane, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.field.as_deref(), Some("user.email"));

        let mut req = request("MOB");
        req.template = Some("weekly".to_string());
        assert!(run(&config(&temp), temp.path(), &req, &plane, Utc::now()).await.is_err());

        let mut bad = config(&temp);
        bad.plane.api_key = "your-api-key".to_string();
        assert!(run(&bad, temp.path(), &request("MOB"), &plane, Utc::now()).await.is_err());

        assert_eq!(plane.project_calls.load(Ordering::SeqCst), 0);
        assert!(!temp.path().join("plane.md").exists());
    }

    #[tokio::test]
    async fn test_remote_error_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let plane = FakePlane::new();
        let err = run(&config(&temp), temp.path(), &request("OPS"), &plane, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert!(!temp.path().join("plane.md").exists());
    }

    #[tokio::test]
    async fn test_template_override_from_project_dir() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(CONFIG_DIR_NAME).join("templates");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("standup.md"), "{{project_name}}: {{in_progress_tasks}}").unwrap();

        let plane = FakePlane::new();
        let mut req = request("MOB");
        req.template = Some("standup".to_string());
        let outcome = run(&config(&temp), temp.path(), &req, &plane, Utc::now())
            .await
            .unwrap();

        let md = std::fs::read_to_string(outcome.output_path).unwrap();
        assert_eq!(md, "Mobile: - **MOB-1** Task 1 [Urgent · In Progress · Ada]");
    }

    #[tokio::test]
    async fn test_unreadable_template_fails_before_network() {
        let temp = TempDir::new().unwrap();
        // A directory where the override file should be cannot be read
        let dir = temp.path().join(CONFIG_DIR_NAME).join("templates");
        std::fs::create_dir_all(dir.join("standup.md")).unwrap();

        let plane = FakePlane::new();
        let mut req = request("MOB");
        req.template = Some("standup".to_string());
        let err = run(&config(&temp), temp.path(), &req, &plane, Utc::now())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Io);
        assert_eq!(plane.project_calls.load(Ordering::SeqCst), 0);
        assert_eq!(plane.member_calls.load(Ordering::SeqCst), 0);
        assert!(!temp.path().join("plane.md").exists());
    }

    #[test]
    fn test_outcome_text() {
        let outcome = SyncOutcome {
            project_id: "p1".to_string(),
            project_identifier: "MOB".to_string(),
            project_name: "Mobile".to_string(),
            total_tasks: 3,
            filtered_tasks: 2,
            output_path: PathBuf::from("plane.md"),
            template: "brief".to_string(),
            users_refreshed: false,
            generated_at: Utc::now(),
        };
        assert_eq!(
            outcome.to_text(),
            "Synced Mobile (MOB): 2 of 3 tasks written to plane.md using the brief template"
        );
    }
}

//! CLI definition for plane-sync.
//!
//! One command: fetch a Plane project's tasks and write a Markdown report.

use crate::sync::SyncRequest;
use clap::Parser;
use std::path::PathBuf;

/// Sync Plane tasks into a Markdown report for your editor or AI assistant
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Project UUID, identifier (e.g. MOBILE) or name
    pub project: String,

    /// Only tasks assigned to you (uses MY_EMAIL / user.email)
    #[arg(short = 'm', long)]
    pub my_tasks: bool,

    /// Only tasks assigned to this person (email, name fragment or user id)
    #[arg(short, long)]
    pub assignee: Option<String>,

    /// Comma-separated priorities: urgent,high,medium,low,none
    #[arg(short, long)]
    pub priority: Option<String>,

    /// Comma-separated statuses, e.g. todo,in-progress
    #[arg(short, long)]
    pub status: Option<String>,

    /// Maximum number of tasks in the report (1-100, default 20)
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Template: ai-context, brief, standup or development
    #[arg(short, long)]
    pub template: Option<String>,

    /// Output file (default: <project-dir>/plane.md)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Refetch the workspace member list even if the cache is fresh
    #[arg(long)]
    pub refresh_users: bool,

    /// Path to configuration file (replaces user and project config)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Project directory holding .env, .plane-sync/ and the report
    #[arg(long)]
    pub project_dir: Option<PathBuf>,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2")]
    pub log: String,
}

impl Cli {
    pub fn to_request(&self) -> SyncRequest {
        SyncRequest {
            project: self.project.clone(),
            my_tasks: self.my_tasks,
            assignee: self.assignee.clone(),
            priorities: self.priority.clone(),
            statuses: self.status.clone(),
            limit: self.limit,
            template: self.template.clone(),
            output: self.output.clone(),
            refresh_users: self.refresh_users,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_full_invocation() {
        let cli = Cli::try_parse_from([
            "plane-sync",
            "MOBILE",
            "--my-tasks",
            "--priority",
            "high,urgent",
            "--limit",
            "10",
            "--template",
            "standup",
            "--refresh-users",
            "--json",
        ])
        .unwrap();

        let req = cli.to_request();
        assert_eq!(req.project, "MOBILE");
        assert!(req.my_tasks);
        assert!(req.refresh_users);
        assert_eq!(req.priorities.as_deref(), Some("high,urgent"));
        assert_eq!(req.limit, Some(10));
        assert_eq!(req.template.as_deref(), Some("standup"));
        assert!(cli.json);
        assert_eq!(cli.log, "2");
    }

    #[test]
    fn test_project_is_required() {
        assert!(Cli::try_parse_from(["plane-sync"]).is_err());
    }
}

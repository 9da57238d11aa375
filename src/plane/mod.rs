//! Plane API client.
//!
//! Read-only access to the three endpoints the sync needs: project lookup,
//! cursor-paginated issue listing and the workspace member list. Every call
//! goes through one retry loop; every listing goes through one pagination
//! loop with a hard page cap.

pub mod payload;
pub mod retry;
pub mod transport;

use crate::config::{Config, HttpConfig};
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::types::{Member, ProjectMeta, Task};
use async_trait::async_trait;
use payload::{Listing, RawIssue, RawMemberEntry, RawProject, decode};
use retry::RetryPolicy;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};
use transport::{HttpResponse, HttpTransport, ReqwestTransport, TransportFailure};

/// Source of project metadata and tasks.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Look up a project by UUID, short identifier or name.
    async fn fetch_project(&self, project: &str) -> SyncResult<ProjectMeta>;

    /// All tasks of a project, in server order.
    async fn fetch_tasks(&self, project: &ProjectMeta) -> SyncResult<Vec<Task>>;
}

/// Source of the workspace member list.
#[async_trait]
pub trait MemberSource: Send + Sync {
    async fn list_members(&self) -> SyncResult<Vec<Member>>;
}

/// Issue fields expanded inline so state names and assignee ids arrive with
/// the issue instead of needing follow-up calls.
const ISSUE_EXPAND: &str = "assignees,state";

/// Longest slice of an error body echoed back to the user.
const MAX_DETAIL_CHARS: usize = 300;

/// HTTP client for one Plane workspace.
pub struct PlaneClient<T = ReqwestTransport> {
    transport: T,
    /// `{base_url}/api/v1/workspaces/{slug}`, no trailing slash.
    workspace_url: String,
    retry: RetryPolicy,
    page_size: u32,
    max_pages: u32,
}

impl PlaneClient<ReqwestTransport> {
    /// Build a client from validated configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let transport = ReqwestTransport::new(
            &config.plane.api_key,
            Duration::from_secs(config.http.timeout_secs),
        )?;
        Ok(Self::with_transport(
            transport,
            &config.plane.base_url,
            &config.plane.workspace_slug,
            &config.http,
        ))
    }
}

impl<T: HttpTransport> PlaneClient<T> {
    pub fn with_transport(transport: T, base_url: &str, workspace: &str, http: &HttpConfig) -> Self {
        Self {
            transport,
            workspace_url: format!(
                "{}/api/v1/workspaces/{}",
                base_url.trim_end_matches('/'),
                urlencoding::encode(workspace)
            ),
            retry: RetryPolicy::from_config(http),
            page_size: http.page_size.clamp(1, 1000),
            max_pages: http.max_pages.max(1),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.workspace_url, path)
    }

    /// GET with retries. Only transient failures are retried.
    async fn get_body(&self, path: &str, query: &[(String, String)]) -> SyncResult<String> {
        let url = self.endpoint(path);
        let mut retry = 0;
        loop {
            debug!(url = %url, attempt = retry + 1, "Plane request");
            let result = match self.transport.get(&url, query).await {
                Ok(response) => check_status(response),
                Err(failure) => Err(transport_error(failure)),
            };
            match result {
                Ok(body) => return Ok(body),
                Err(err) if err.kind.is_retryable() && retry + 1 < self.retry.max_attempts => {
                    let wait = self.retry.delay_for(retry, err.retry_after);
                    warn!(
                        url = %url,
                        error = %err,
                        attempt = retry + 1,
                        wait_ms = wait.as_millis() as u64,
                        "Transient Plane error, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    retry += 1;
                }
                Err(err) => {
                    if err.kind.is_retryable() {
                        warn!(url = %url, attempts = retry + 1, "Plane request failed, retries exhausted");
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn get_json<R: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
        what: &str,
    ) -> SyncResult<R> {
        let body = self.get_body(path, query).await?;
        decode(&body, what)
    }

    /// Follow cursors until the server reports no further page.
    async fn fetch_all<R: DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, &str)],
        what: &str,
    ) -> SyncResult<Vec<R>> {
        let mut rows = Vec::new();
        let mut cursor: Option<String> = None;

        for page_no in 1..=self.max_pages {
            let mut query: Vec<(String, String)> = extra
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            query.push(("per_page".to_string(), self.page_size.to_string()));
            if let Some(ref c) = cursor {
                query.push(("cursor".to_string(), c.clone()));
            }

            let listing: Listing<R> = self.get_json(path, &query, what).await?;
            let (page_rows, next) = listing.into_parts();
            debug!(what, page = page_no, rows = page_rows.len(), "Fetched page");
            rows.extend(page_rows);

            match next {
                Some(next) => cursor = Some(next),
                None => return Ok(rows),
            }
        }

        Err(SyncError::integrity(format!(
            "Plane kept returning {} pages past the limit of {}",
            what, self.max_pages
        )))
    }
}

#[async_trait]
impl<T: HttpTransport> TaskSource for PlaneClient<T> {
    async fn fetch_project(&self, project: &str) -> SyncResult<ProjectMeta> {
        let wanted = project.trim();
        if looks_like_uuid(wanted) {
            let path = format!("projects/{}/", urlencoding::encode(wanted));
            let raw: RawProject = self.get_json(&path, &[], "project").await?;
            return Ok(raw.into());
        }

        let projects: Vec<RawProject> = self.fetch_all("projects/", &[], "project").await?;
        let found = projects.into_iter().map(ProjectMeta::from).find(|p| {
            p.identifier.eq_ignore_ascii_case(wanted)
                || p.name.eq_ignore_ascii_case(wanted)
                || p.id == wanted
        });
        match found {
            Some(meta) => {
                info!(project = %meta.identifier, name = %meta.name, "Resolved project");
                Ok(meta)
            }
            None => Err(SyncError::project_not_found(wanted)),
        }
    }

    async fn fetch_tasks(&self, project: &ProjectMeta) -> SyncResult<Vec<Task>> {
        let path = format!("projects/{}/issues/", urlencoding::encode(&project.id));
        let raw: Vec<RawIssue> = self
            .fetch_all(&path, &[("expand", ISSUE_EXPAND)], "issue")
            .await?;
        let tasks: Vec<Task> = raw.into_iter().map(|r| r.into_task(project)).collect();
        info!(project = %project.identifier, count = tasks.len(), "Fetched tasks");
        Ok(tasks)
    }
}

#[async_trait]
impl<T: HttpTransport> MemberSource for PlaneClient<T> {
    async fn list_members(&self) -> SyncResult<Vec<Member>> {
        let rows: Vec<RawMemberEntry> = self.fetch_all("members/", &[], "member").await?;
        let members: Vec<Member> = rows.into_iter().map(Member::from).collect();
        info!(count = members.len(), "Fetched workspace members");
        Ok(members)
    }
}

/// Map an HTTP status onto the error taxonomy.
fn check_status(response: HttpResponse) -> SyncResult<String> {
    let status = response.status;
    let detail = error_detail(&response.body);
    match status {
        200..=299 => Ok(response.body),
        401 | 403 => Err(SyncError::auth(format!(
            "Plane rejected the API key (HTTP {})",
            status
        ))
        .with_details(detail)),
        404 => Err(SyncError::not_found("Plane resource not found (HTTP 404)").with_details(detail)),
        408 | 429 | 500..=599 => {
            let mut err = SyncError::transient(format!("Plane is unavailable (HTTP {})", status))
                .with_details(detail);
            if let Some(wait) = response.retry_after.filter(|_| status == 429) {
                err = err.with_retry_after(wait);
            }
            Err(err)
        }
        _ => Err(SyncError::integrity(format!(
            "Unexpected HTTP {} from Plane",
            status
        ))
        .with_details(detail)),
    }
}

fn transport_error(failure: TransportFailure) -> SyncError {
    SyncError::new(ErrorKind::Transient, failure.to_string())
}

/// Pull `detail`/`error` out of a JSON error body, else a prefix of the text.
fn error_detail(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "error", "message"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    body.chars().take(MAX_DETAIL_CHARS).collect()
}

fn looks_like_uuid(s: &str) -> bool {
    s.len() == 36
        && s.chars().filter(|c| *c == '-').count() == 4
        && s.chars().all(|c| c == '-' || c.is_ascii_hexdigit())
}

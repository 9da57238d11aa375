//! Configuration types and structures.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default Plane cloud endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.plane.so";

/// Connection settings for the Plane instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaneConfig {
    /// Instance root, without the `/api/v1` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub workspace_slug: String,
}

impl Default for PlaneConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            workspace_slug: String::new(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// The person running the sync, used for `--my-tasks`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub email: Option<String>,
}

/// HTTP behaviour: timeouts, retries and pagination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts per request, including the first (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay in milliseconds (default: 1000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff ceiling in milliseconds (default: 30000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// `per_page` sent on listings (default: 100).
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Hard cap on pages per listing (default: 50).
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_page_size() -> u32 {
    100
}

fn default_max_pages() -> u32 {
    50
}

/// User directory cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding `users.json` (default: `~/.plane-sync/cache`).
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    /// Entries older than this are refetched (default: 86400 = 24h).
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            max_age_secs: default_max_age_secs(),
        }
    }
}

impl CacheConfig {
    pub fn users_file(&self) -> PathBuf {
        self.dir.join("users.json")
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".plane-sync").join("cache"))
        .unwrap_or_else(|| PathBuf::from(".plane-sync/cache"))
}

fn default_max_age_secs() -> u64 {
    24 * 60 * 60
}

/// Report output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Template used when `--template` is not given (default: `ai-context`).
    #[serde(default = "default_template")]
    pub default_template: String,

    /// File name written under the project directory (default: `plane.md`).
    #[serde(default = "default_output_file")]
    pub output_file: String,

    /// Directory searched for template overrides before the embedded ones.
    #[serde(default)]
    pub template_dir: Option<PathBuf>,

    /// Locale suffix tried first when looking up overrides, e.g. `zh`.
    #[serde(default)]
    pub locale: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            default_template: default_template(),
            output_file: default_output_file(),
            template_dir: None,
            locale: None,
        }
    }
}

fn default_template() -> String {
    "ai-context".to_string()
}

fn default_output_file() -> String {
    "plane.md".to_string()
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub plane: PlaneConfig,

    #[serde(default)]
    pub user: UserConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

impl Config {
    /// Check everything a sync needs before any network call is made.
    pub fn validate(&self) -> SyncResult<()> {
        require("plane.base_url", &self.plane.base_url)?;
        require("plane.api_key", &self.plane.api_key)?;
        require("plane.workspace_slug", &self.plane.workspace_slug)?;

        let base = self.plane.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(SyncError::invalid_value(
                "plane.base_url",
                "must start with http:// or https://",
            ));
        }

        if let Some(ref email) = self.user.email
            && !email.trim().is_empty()
            && is_placeholder(email)
        {
            return Err(SyncError::invalid_value(
                "user.email",
                "still contains a placeholder value",
            ));
        }

        let positive = [
            ("http.timeout_secs", self.http.timeout_secs),
            ("http.max_attempts", u64::from(self.http.max_attempts)),
            ("http.page_size", u64::from(self.http.page_size)),
            ("http.max_pages", u64::from(self.http.max_pages)),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(SyncError::invalid_value(field, "must be greater than zero"));
            }
        }
        if self.http.max_delay_ms < self.http.base_delay_ms {
            return Err(SyncError::invalid_value(
                "http.max_delay_ms",
                "must not be smaller than http.base_delay_ms",
            ));
        }

        require("report.output_file", &self.report.output_file)?;
        Ok(())
    }

    /// Configured email, if set to something usable.
    pub fn user_email(&self) -> Option<&str> {
        self.user
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

fn require(field: &str, value: &str) -> SyncResult<()> {
    if value.trim().is_empty() {
        return Err(SyncError::invalid_value(field, "is not set"));
    }
    if is_placeholder(value) {
        return Err(SyncError::invalid_value(
            field,
            "still contains a placeholder value",
        ));
    }
    Ok(())
}

/// Values left over from an unedited sample `.env` or config file.
fn is_placeholder(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v.starts_with("your-")
        || v.starts_with("your_")
        || (v.starts_with('<') && v.ends_with('>'))
        || v.contains("changeme")
        || v.contains("change-me")
        || v.chars().all(|c| c == 'x')
}

//! Configuration loader with tier-based merging.
//!
//! Loads configuration from multiple tiers and merges them field-by-field.

use super::merge::deep_merge_all;
use super::types::Config;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the per-user and per-project config directory.
pub const CONFIG_DIR_NAME: &str = ".plane-sync";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Embedded defaults (lowest priority)
    Defaults = 0,
    /// User-level config (~/.plane-sync/)
    User = 1,
    /// Project-level config (<project>/.plane-sync/)
    Project = 2,
    /// `.env` file and environment variables (highest priority)
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Paths for each configuration tier.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Project root: holds `.env`, `.plane-sync/config.yaml` and the report.
    pub project_dir: PathBuf,
    /// User-level config directory
    pub user_dir: Option<PathBuf>,
    /// Explicit config file replacing the user and project tiers
    pub explicit: Option<PathBuf>,
}

impl ConfigPaths {
    /// Discover configuration paths from the environment and defaults.
    pub fn discover(project_dir: Option<PathBuf>) -> Self {
        let project_dir = project_dir.unwrap_or_else(|| PathBuf::from("."));

        // User dir: PLANE_SYNC_USER_DIR or ~/.plane-sync
        let user_dir = std::env::var("PLANE_SYNC_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME)));

        let explicit = std::env::var("PLANE_SYNC_CONFIG_PATH").ok().map(PathBuf::from);

        Self {
            project_dir,
            user_dir,
            explicit,
        }
    }

    /// Create paths with explicit directories.
    pub fn with_dirs(project_dir: PathBuf, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
            explicit: None,
        }
    }

    /// Use a single config file instead of the user and project tiers.
    pub fn with_explicit(mut self, path: Option<PathBuf>) -> Self {
        if path.is_some() {
            self.explicit = path;
        }
        self
    }

    pub fn project_config_file(&self) -> PathBuf {
        self.project_dir.join(CONFIG_DIR_NAME).join("config.yaml")
    }

    pub fn user_config_file(&self) -> Option<PathBuf> {
        self.user_dir.as_ref().map(|d| d.join("config.yaml"))
    }

    pub fn dotenv_file(&self) -> PathBuf {
        self.project_dir.join(".env")
    }
}

/// Configuration loader that handles tier-based merging.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Paths for each tier
    pub paths: ConfigPaths,
    /// Loaded configuration
    config: Config,
    /// Config files that contributed, lowest tier first
    sources: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Load configuration from all tiers, reading the process environment.
    pub fn load(paths: ConfigPaths) -> Result<Self> {
        Self::load_with_env(paths, |key| std::env::var(key).ok())
    }

    /// Load configuration with an explicit process environment lookup. The
    /// project's `.env` is consulted only for keys the environment leaves unset.
    pub fn load_with_env(paths: ConfigPaths, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut configs: Vec<Value> = Vec::new();
        let mut sources = Vec::new();

        // Tier 1: Defaults (embedded)
        configs.push(serde_json::to_value(Config::default())?);

        if let Some(ref explicit) = paths.explicit {
            configs.push(read_yaml(explicit)?);
            sources.push(explicit.clone());
        } else {
            // Tier 2: User config, Tier 3: Project config
            let tiers = [
                (ConfigTier::User, paths.user_config_file()),
                (ConfigTier::Project, Some(paths.project_config_file())),
            ];
            for (tier, file) in tiers {
                let Some(file) = file else { continue };
                if !file.exists() {
                    continue;
                }
                match read_yaml(&file) {
                    Ok(value) => {
                        debug!(tier = %tier, path = %file.display(), "Loaded config tier");
                        configs.push(value);
                        sources.push(file);
                    }
                    Err(e) => warn!(tier = %tier, error = %e, "Ignoring unreadable config file"),
                }
            }
        }

        let merged = deep_merge_all(configs);
        let mut config: Config =
            serde_json::from_value(merged).context("Invalid configuration structure")?;

        // Tier 4: Environment variable overrides, then .env
        let dotenv = read_dotenv(&paths.dotenv_file());
        let from_dotenv = |key: &str| dotenv.get(key).cloned();
        let lookups: [&dyn Fn(&str) -> Option<String>; 2] = [&env, &from_dotenv];
        Self::apply_env_overrides(&mut config, &lookups);

        Ok(Self {
            paths,
            config,
            sources,
        })
    }

    /// Apply environment variable overrides to config.
    ///
    /// Each setting takes the first non-empty value across all of its key
    /// aliases in one lookup before falling back to the next lookup.
    fn apply_env_overrides(config: &mut Config, lookups: &[&dyn Fn(&str) -> Option<String>]) {
        let first = |keys: &[&str]| {
            lookups.iter().find_map(|lookup| {
                keys.iter()
                    .filter_map(|&k| lookup(k))
                    .find(|v| !v.trim().is_empty())
            })
        };

        if let Some(base_url) = first(&["PLANE_BASE_URL"]) {
            config.plane.base_url = base_url;
        }

        if let Some(api_key) = first(&["PLANE_API_KEY"]) {
            config.plane.api_key = api_key;
        }

        if let Some(workspace) = first(&["PLANE_WORKSPACE_SLUG", "PLANE_WORKSPACE"]) {
            config.plane.workspace_slug = workspace;
        }

        if let Some(email) = first(&["PLANE_USER_EMAIL", "MY_EMAIL"]) {
            config.user.email = Some(email);
        }

        if let Some(cache_dir) = first(&["PLANE_SYNC_CACHE_DIR"]) {
            config.cache.dir = PathBuf::from(cache_dir);
        }

        if let Some(template_dir) = first(&["PLANE_SYNC_TEMPLATE_DIR"]) {
            config.report.template_dir = Some(PathBuf::from(template_dir));
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Config files that were merged, lowest tier first.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }
}

fn read_yaml(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let value: Value = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(value)
}

/// Read `KEY=value` pairs from a `.env` file without touching the process
/// environment. A missing file is not an error.
fn read_dotenv(path: &Path) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    let Ok(iter) = dotenvy::from_path_iter(path) else {
        return vars;
    };
    for item in iter {
        match item {
            Ok((key, value)) => {
                vars.insert(key, value);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping malformed .env line"),
        }
    }
    debug!(path = %path.display(), count = vars.len(), "Loaded .env");
    vars
}

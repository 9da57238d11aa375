//! Report templates.
//!
//! The four built-in templates are embedded at compile time using
//! `include_str!`. A template directory can override any of them, optionally
//! per locale (`standup.zh.md` before `standup.md`).

use crate::error::{SyncError, SyncResult};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Full context for an AI assistant: stats, table and every description.
pub const AI_CONTEXT_TEMPLATE: &str = include_str!("templates/ai-context.md");

/// Short overview.
pub const BRIEF_TEMPLATE: &str = include_str!("templates/brief.md");

/// Daily standup by status and person.
pub const STANDUP_TEMPLATE: &str = include_str!("templates/standup.md");

/// Development board view by status and priority.
pub const DEVELOPMENT_TEMPLATE: &str = include_str!("templates/development.md");

/// Built-in template names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateName {
    AiContext,
    Brief,
    Standup,
    Development,
}

impl TemplateName {
    pub const ALL: [TemplateName; 4] = [
        TemplateName::AiContext,
        TemplateName::Brief,
        TemplateName::Standup,
        TemplateName::Development,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateName::AiContext => "ai-context",
            TemplateName::Brief => "brief",
            TemplateName::Standup => "standup",
            TemplateName::Development => "development",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "ai-context" | "ai_context" | "ai" => Some(TemplateName::AiContext),
            "brief" => Some(TemplateName::Brief),
            "standup" => Some(TemplateName::Standup),
            "development" | "dev" => Some(TemplateName::Development),
            _ => None,
        }
    }

    /// Parse a configured template name.
    pub fn parse(s: &str) -> SyncResult<Self> {
        Self::from_str(s).ok_or_else(|| {
            let known: Vec<&str> = Self::ALL.iter().map(|t| t.as_str()).collect();
            SyncError::invalid_value(
                "template",
                format!("'{}' is not one of {}", s.trim(), known.join(", ")),
            )
        })
    }

    /// Built-in template text.
    pub fn embedded(&self) -> &'static str {
        match self {
            TemplateName::AiContext => AI_CONTEXT_TEMPLATE,
            TemplateName::Brief => BRIEF_TEMPLATE,
            TemplateName::Standup => STANDUP_TEMPLATE,
            TemplateName::Development => DEVELOPMENT_TEMPLATE,
        }
    }
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves template text from overrides or the embedded defaults.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    dir: Option<PathBuf>,
    locale: Option<String>,
}

impl TemplateStore {
    pub fn new(dir: Option<PathBuf>, locale: Option<String>) -> Self {
        Self {
            dir,
            locale: locale
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
        }
    }

    /// Candidate override files, most specific first.
    pub fn candidates(&self, name: TemplateName) -> Vec<PathBuf> {
        let Some(ref dir) = self.dir else {
            return Vec::new();
        };
        let mut paths = Vec::new();
        if let Some(ref locale) = self.locale {
            paths.push(dir.join(format!("{}.{}.md", name, locale)));
        }
        paths.push(dir.join(format!("{}.md", name)));
        paths
    }

    /// Template text for `name`. A missing override falls through to the
    /// next candidate; an override that exists but cannot be read is an error.
    pub fn load(&self, name: TemplateName) -> SyncResult<String> {
        for path in self.candidates(name) {
            if let Some(text) = read_override(&path)? {
                debug!(template = %name, path = %path.display(), "Using template override");
                return Ok(text);
            }
        }
        debug!(template = %name, "Using embedded template");
        Ok(name.embedded().to_string())
    }
}

fn read_override(path: &Path) -> SyncResult<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SyncError::io(
            &format!("Failed to read template {}", path.display()),
            e,
        )),
    }
}

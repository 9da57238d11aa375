//! Layered configuration.
//!
//! Consolidates configuration from four tiers with field-by-field YAML merging:
//! 1. **Defaults** - Built into the binary
//! 2. **User** - `~/.plane-sync/config.yaml`
//! 3. **Project** - `<project>/.plane-sync/config.yaml`
//! 4. **Environment** - process environment, then `<project>/.env`
//!
//! ## Environment Variables
//! - `PLANE_BASE_URL`, `PLANE_API_KEY` - Plane connection
//! - `PLANE_WORKSPACE_SLUG` / `PLANE_WORKSPACE` - Workspace slug
//! - `PLANE_USER_EMAIL` / `MY_EMAIL` - Email used by `--my-tasks`
//! - `PLANE_SYNC_CONFIG_PATH` - Explicit config file (replaces user and project tiers)
//! - `PLANE_SYNC_USER_DIR` - User config dir (default: `~/.plane-sync`)
//! - `PLANE_SYNC_CACHE_DIR` - User directory cache location
//! - `PLANE_SYNC_TEMPLATE_DIR` - Template override directory

mod loader;
mod merge;
mod types;

pub use loader::{CONFIG_DIR_NAME, ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::deep_merge;
pub use types::*;

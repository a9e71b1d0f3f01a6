//! Engine configuration
//!
//! The engine only needs to know where the automation tool keeps its
//! default overlay files, plus the resolution caps.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Explicit values (CLI flags)
//! 2. Environment variables (`OVERLAY_ENGINE_DEFAULTS_DIR`, `OVERLAY_ENGINE_ROOT`)
//! 3. Defaults (`./defaults/overlays`)

use std::path::{Path, PathBuf};

use crate::limits::ResolveLimits;

/// Install root of the automation tool
pub const ROOT_ENV: &str = "OVERLAY_ENGINE_ROOT";

/// Direct override of the defaults directory
pub const DEFAULTS_DIR_ENV: &str = "OVERLAY_ENGINE_DEFAULTS_DIR";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Directory holding `templates.yml` and the stock overlay files
    pub defaults_dir: PathBuf,

    pub limits: ResolveLimits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_root(".")
    }
}

impl EngineConfig {
    /// Conventional layout: `<root>/defaults/overlays`
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        Self {
            defaults_dir: root.as_ref().join("defaults").join("overlays"),
            limits: ResolveLimits::default(),
        }
    }

    /// Build from environment variables, falling back to the current directory.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let present = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = match present(ROOT_ENV) {
            Some(root) => Self::from_root(root),
            None => Self::default(),
        };
        if let Some(dir) = present(DEFAULTS_DIR_ENV) {
            config.defaults_dir = PathBuf::from(dir);
        }
        config
    }

    pub fn with_defaults_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.defaults_dir = dir.into();
        self
    }

    pub fn with_limits(mut self, limits: ResolveLimits) -> Self {
        self.limits = limits;
        self
    }
}

//! Configuration types for building scenes.
//!
//! All types implement [`serde::Deserialize`] with every field defaulted, so
//! a partial TOML file only overrides what it names.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining build and loader settings.
//! - [`BuildConfig`] - Controls how elements are turned into scene nodes.
//! - [`LoaderConfig`] - Controls how external templates are located and queued.
//!
//! # Example
//!
//! ```
//! # use canopy::config::AppConfig;
//! let config = AppConfig::default();
//! assert!(config.build().native_attribute_notifications());
//! assert_eq!(config.build().grouping_tag(), "metagroup");
//! assert_eq!(config.loader().max_pending_loads(), 64);
//! ```

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Build configuration section.
    #[serde(default)]
    build: BuildConfig,

    /// Loader configuration section.
    #[serde(default)]
    loader: LoaderConfig,
}

impl AppConfig {
    /// Creates a new [`AppConfig`] from its sections.
    pub fn new(build: BuildConfig, loader: LoaderConfig) -> Self {
        Self { build, loader }
    }

    /// Returns the build configuration.
    pub fn build(&self) -> &BuildConfig {
        &self.build
    }

    /// Returns the loader configuration.
    pub fn loader(&self) -> &LoaderConfig {
        &self.loader
    }
}

fn default_true() -> bool {
    true
}

fn default_grouping_tag() -> String {
    "metagroup".to_string()
}

fn default_scope_separator() -> String {
    "__".to_string()
}

fn default_max_pending_loads() -> usize {
    64
}

/// How elements are turned into scene nodes.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    /// Whether the host reports attribute mutations on its own. When it does
    /// not, attribute writes on built elements are routed to node fields.
    #[serde(default = "default_true")]
    native_attribute_notifications: bool,

    /// Tag whose children are built as children of its parent.
    #[serde(default = "default_grouping_tag")]
    grouping_tag: String,

    /// Separator between scope name and local name in qualified `USE` names.
    #[serde(default = "default_scope_separator")]
    scope_separator: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            native_attribute_notifications: default_true(),
            grouping_tag: default_grouping_tag(),
            scope_separator: default_scope_separator(),
        }
    }
}

impl BuildConfig {
    /// Returns whether the host reports attribute mutations natively.
    pub fn native_attribute_notifications(&self) -> bool {
        self.native_attribute_notifications
    }

    /// Returns a copy with native attribute notifications switched.
    pub fn with_native_attribute_notifications(mut self, native: bool) -> Self {
        self.native_attribute_notifications = native;
        self
    }

    /// Returns the grouping tag.
    pub fn grouping_tag(&self) -> &str {
        &self.grouping_tag
    }

    /// Returns the qualified-name separator.
    pub fn scope_separator(&self) -> &str {
        &self.scope_separator
    }
}

/// How external templates are located and queued.
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    /// Extra directories tried for relative template URLs.
    #[serde(default)]
    search_paths: Vec<PathBuf>,

    /// Upper bound on queued loads; further requests fail with a warning.
    #[serde(default = "default_max_pending_loads")]
    max_pending_loads: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            max_pending_loads: default_max_pending_loads(),
        }
    }
}

impl LoaderConfig {
    /// Creates a loader configuration.
    pub fn new(search_paths: Vec<PathBuf>, max_pending_loads: usize) -> Self {
        Self {
            search_paths,
            max_pending_loads,
        }
    }

    /// Returns the extra search directories.
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Returns the load queue bound.
    pub fn max_pending_loads(&self) -> usize {
        self.max_pending_loads
    }
}

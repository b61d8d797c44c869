//! Project configuration.
//!
//! Loaded from `sitewright.toml` in the project root. Stock defaults are the
//! base layer; the user file only needs the keys it wants to change.
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! out = "dist"                     # Output root, recreated on every build
//! public = "public"                # Copied verbatim into the output root first
//! temp_dir = ".sitewright-temp"    # Intermediate artifacts shared with the bundler
//! cache_dir = ".sitewright-cache"  # Image cache store and manifest
//!
//! [assets]
//! out_dir = "assets"
//!
//! [assets.bundle]
//! out_name = "bundle"              # -> assets/bundle.css
//!
//! [assets.partial]
//! out_name = "partial"             # -> assets/partial.js
//! root_attr_suffix = "partial-hydration"
//!
//! [beautify]
//! use_html = true
//! use_assets = false
//!
//! [delivery]
//! sort_by = "path"                 # or "title"
//!
//! [bundler]
//! command = "node"
//! args = ["node_modules/.bin/sitewright-bundle"]
//!
//! [enumerate]
//! command = "node"
//! args = ["node_modules/.bin/sitewright-enumerate"]
//!
//! [processing]
//! max_processes = 4                # Omit for auto = CPU cores
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::entry::{EntryDecl, ResolvedEntry, resolve_entries};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Name of the config file in the project root.
pub const CONFIG_FILENAME: &str = "sitewright.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Project configuration loaded from `sitewright.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Output root, relative to the project root.
    pub out: String,
    /// Static passthrough directory copied into the output root before
    /// pipeline files are written.
    pub public: String,
    /// Directory for intermediate artifacts (compiled static-render module,
    /// partial-hydration markers, image requests).
    pub temp_dir: String,
    /// Image cache directory (manifest + store files).
    pub cache_dir: String,
    /// Entry declarations, in any of the shapes [`EntryDecl`] accepts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntryDecl>,
    pub assets: AssetsConfig,
    pub beautify: BeautifyConfig,
    pub delivery: DeliveryConfig,
    pub bundler: CommandConfig,
    pub enumerate: CommandConfig,
    pub processing: ProcessingConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            out: "dist".to_string(),
            public: "public".to_string(),
            temp_dir: ".sitewright-temp".to_string(),
            cache_dir: ".sitewright-cache".to_string(),
            entry: None,
            assets: AssetsConfig::default(),
            beautify: BeautifyConfig::default(),
            delivery: DeliveryConfig::default(),
            bundler: CommandConfig {
                command: "node".to_string(),
                args: vec!["node_modules/.bin/sitewright-bundle".to_string()],
            },
            enumerate: CommandConfig {
                command: "node".to_string(),
                args: vec!["node_modules/.bin/sitewright-enumerate".to_string()],
            },
            processing: ProcessingConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.out.trim().is_empty() {
            return Err(ConfigError::Validation("out must not be empty".into()));
        }
        let out = normalize_dir(&self.out);
        if !out.components().any(|c| matches!(c, Component::Normal(_))) {
            return Err(ConfigError::Validation(format!(
                "out = {:?} would clear the project root",
                self.out
            )));
        }
        for (key, dir) in [
            ("public", &self.public),
            ("temp_dir", &self.temp_dir),
            ("cache_dir", &self.cache_dir),
        ] {
            let dir = normalize_dir(dir);
            if out.starts_with(&dir) || dir.starts_with(&out) {
                return Err(ConfigError::Validation(format!(
                    "out and {} must not overlap",
                    key
                )));
            }
        }
        if self.assets.bundle.out_name.is_empty() || self.assets.partial.out_name.is_empty() {
            return Err(ConfigError::Validation(
                "assets.bundle.out_name and assets.partial.out_name must not be empty".into(),
            ));
        }
        if self.assets.partial.root_attr_suffix.is_empty() {
            return Err(ConfigError::Validation(
                "assets.partial.root_attr_suffix must not be empty".into(),
            ));
        }
        if self.bundler.command.is_empty() || self.enumerate.command.is_empty() {
            return Err(ConfigError::Validation(
                "bundler.command and enumerate.command must not be empty".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Final bundle stylesheet name, e.g. `assets/bundle.css`.
    pub fn bundle_css_name(&self) -> String {
        join_name(&self.assets.out_dir, &format!("{}.css", self.assets.bundle.out_name))
    }

    /// Legacy bundle stylesheet name that older bundler plugins emit.
    pub fn legacy_bundle_css_name(&self) -> String {
        join_name(&self.assets.out_dir, "bundle.css")
    }

    /// Final partial-hydration script name, e.g. `assets/partial.js`.
    pub fn partial_js_name(&self) -> String {
        join_name(&self.assets.out_dir, &format!("{}.js", self.assets.partial.out_name))
    }

    /// The attribute that marks a partial-hydration root in rendered HTML.
    pub fn partial_root_attr(&self) -> String {
        format!("data-{}", self.assets.partial.root_attr_suffix)
    }
}

/// Join output-relative names with `/`, independent of the host separator.
fn join_name(dir: &str, file: &str) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        file.to_string()
    } else {
        format!("{}/{}", dir, file)
    }
}

/// Asset naming settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    /// Directory (inside the output root) for bundled assets.
    pub out_dir: String,
    pub bundle: BundleConfig,
    pub partial: PartialConfig,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            out_dir: "assets".to_string(),
            bundle: BundleConfig::default(),
            partial: PartialConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BundleConfig {
    /// File stem of the bundled stylesheet.
    pub out_name: String,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            out_name: "bundle".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PartialConfig {
    /// File stem of the partial-hydration script.
    pub out_name: String,
    /// Suffix of the `data-*` attribute marking a hydration root.
    pub root_attr_suffix: String,
}

impl Default for PartialConfig {
    fn default() -> Self {
        Self {
            out_name: "partial".to_string(),
            root_attr_suffix: "partial-hydration".to_string(),
        }
    }
}

/// Pretty-printing of emitted files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BeautifyConfig {
    /// Reformat HTML pages.
    pub use_html: bool,
    /// Reformat CSS and JS assets.
    pub use_assets: bool,
}

impl Default for BeautifyConfig {
    fn default() -> Self {
        Self {
            use_html: true,
            use_assets: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Path,
    Title,
}

/// Delivery list settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeliveryConfig {
    pub sort_by: SortBy,
}

/// An external command used as a collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandConfig {
    pub command: String,
    pub args: Vec<String>,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Lexically normalize a configured directory: drop `.` and fold `..` into
/// the preceding name. `"."` becomes the empty path (the project root).
fn normalize_dir(dir: &str) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in Path::new(dir).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// A loaded configuration together with the project root it applies to.
///
/// All directory settings are resolved against the root here, and entry
/// declarations are normalized once.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config: SiteConfig,
    pub entries: Vec<ResolvedEntry>,
}

impl Project {
    pub fn new(root: impl Into<PathBuf>, config: SiteConfig) -> Self {
        let root = root.into();
        let entries = config
            .entry
            .as_ref()
            .map(|decl| resolve_entries(decl, &root))
            .unwrap_or_default();
        Self {
            root,
            config,
            entries,
        }
    }

    /// Load `sitewright.toml` from `root` and build a project from it.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        let config = load_config(&root)?;
        Ok(Self::new(root, config))
    }

    pub fn out_dir(&self) -> PathBuf {
        self.root.join(&self.config.out)
    }

    pub fn public_dir(&self) -> PathBuf {
        self.root.join(&self.config.public)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join(&self.config.temp_dir)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(&self.config.cache_dir)
    }

    /// Sentinel directory the static-render pass creates when it meets a
    /// partial-hydration boundary.
    pub fn partials_marker_dir(&self) -> PathBuf {
        self.temp_dir().join("partials")
    }

    /// Image generation requests recorded by the rendering layer.
    pub fn image_requests_path(&self) -> PathBuf {
        self.temp_dir().join("images.json")
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `sitewright.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `sitewright.toml` in the given directory.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `sitewright.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# sitewright configuration
# ========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Output root. Cleared and recreated on every build.
out = "dist"

# Static passthrough directory, copied verbatim into the output root before
# the pipeline writes its own files (pipeline files win on name clashes).
public = "public"

# Intermediate artifacts shared with the bundler and the renderer.
temp_dir = ".sitewright-temp"

# Derived image cache (cache.json + one store file per image).
cache_dir = ".sitewright-cache"

# Entry scripts/stylesheets. Any of:
#   entry = "src/main.ts"
#   entry = ["src/main.ts", "src/print.css"]
#   entry = { app = "src/main.ts" }
#   entry = [{ input = "src/blog.ts", insert_pages = ["/blog/**", "!/blog/drafts/**"], position = "head", load_type = "defer" }]

# ---------------------------------------------------------------------------
# Asset naming
# ---------------------------------------------------------------------------
[assets]
out_dir = "assets"

[assets.bundle]
# Bundled stylesheet: <out_dir>/<out_name>.css
out_name = "bundle"

[assets.partial]
# Partial-hydration script: <out_dir>/<out_name>.js
out_name = "partial"
# Pages containing data-<root_attr_suffix> get the partial-hydration script.
root_attr_suffix = "partial-hydration"

# ---------------------------------------------------------------------------
# Pretty-printing
# ---------------------------------------------------------------------------
[beautify]
use_html = true
use_assets = false

# ---------------------------------------------------------------------------
# Delivery list (page index)
# ---------------------------------------------------------------------------
[delivery]
# "path" or "title"
sort_by = "path"

# ---------------------------------------------------------------------------
# Collaborators
# ---------------------------------------------------------------------------
[bundler]
# Invoked once per pass with `--pass <kind>`; reads a JSON request on stdin
# and prints a JSON array of build items.
command = "node"
args = ["node_modules/.bin/sitewright-bundle"]

[enumerate]
# Invoked with the compiled static-render module path as last argument;
# prints a JSON array of pages.
command = "node"
args = ["node_modules/.bin/sitewright-enumerate"]

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for write-out and image generation.
# Omit to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

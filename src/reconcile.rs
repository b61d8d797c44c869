//! Output reconciliation.
//!
//! Turns the raw pass outputs into the final file tree:
//!
//! 1. **Pages**: the static-render pass's `__sitewright_plugin_ssg.js` chunk is
//!    written to `<temp_dir>/ssg.mjs` and handed to the [`PageEnumerator`].
//!    Drafts and empty pages are dropped.
//! 2. **Assets**: asset items minus the bundler's JS shim, plus partial items
//!    that are the hydrate script. Sentinel names are canonicalized to their
//!    configured output names, `code` wins over `source`, and empty payloads
//!    (a lone newline counts as empty) are dropped.
//! 3. **Markers**: `has_bundle_css` is decided once over every asset before
//!    any page is touched, then each HTML file resolves its placeholders
//!    independently (see [`crate::markers`]).
//! 4. **Beautify**, when enabled.
//! 5. **Write-out**: the output root is recreated, `public/` is copied in,
//!    and every file is written atomically in parallel. Failures are
//!    collected per file and never abort the siblings.

use crate::beautify::Beautifier;
use crate::config::{Project, SiteConfig};
use crate::delivery;
use crate::enumerate::{EnumerateError, PageEnumerator};
use crate::markers;
use crate::orchestrate::PassOutputs;
use crate::types::{BuildItem, Page, Payload, ReconciledFile};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Component, Path};
use thiserror::Error;
use walkdir::WalkDir;

pub const SSG_SENTINEL: &str = "__sitewright_plugin_ssg.js";
pub const BUNDLE_JS_SENTINEL: &str = "__sitewright_plugin_bundle.js";
pub const BUNDLE_CSS_SENTINEL: &str = "__sitewright_plugin_bundle.css";
pub const HYDRATE_SENTINEL: &str = "__sitewright_plugin_hydrate.js";

/// File name of the compiled static-render module inside `temp_dir`.
pub const SSG_MODULE: &str = "ssg.mjs";

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Page enumeration failed: {0}")]
    Enumerate(#[from] EnumerateError),
    #[error("Failed to walk public directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Result of writing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { path: String, bytes: u64 },
    Failed { path: String, error: String },
}

impl WriteOutcome {
    pub fn path(&self) -> &str {
        match self {
            WriteOutcome::Written { path, .. } | WriteOutcome::Failed { path, .. } => path,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, WriteOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// Pages materialized by the enumerator.
    pub pages: usize,
    /// Files copied from the public directory.
    pub public_files: usize,
    /// One outcome per pipeline file, sorted by path.
    pub outcomes: Vec<WriteOutcome>,
}

impl ReconcileReport {
    pub fn failures(&self) -> impl Iterator<Item = &WriteOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }
}

/// Run every reconciliation step and write the output tree.
pub fn reconcile(
    outputs: &PassOutputs,
    project: &Project,
    enumerator: &dyn PageEnumerator,
    beautifier: &dyn Beautifier,
) -> Result<ReconcileReport, ReconcileError> {
    let config = &project.config;
    let pages = materialize_pages(&outputs.static_render, project, enumerator)?;
    let assets = canonical_assets(&outputs.asset, &outputs.partial, config);
    let files = assemble(&pages, assets, config, beautifier);

    let out_dir = project.out_dir();
    if out_dir.exists() {
        fs::remove_dir_all(&out_dir)?;
    }
    fs::create_dir_all(&out_dir)?;
    let public_files = copy_public(&project.public_dir(), &out_dir)?;
    let outcomes = write_files(&files, &out_dir);

    Ok(ReconcileReport {
        pages: pages.len(),
        public_files,
        outcomes,
    })
}

// =============================================================================
// Static pages
// =============================================================================

/// Materialize pages from the static-render output.
///
/// No ssg chunk, an empty chunk, or zero pages all yield an empty list.
pub fn materialize_pages(
    static_render: &[BuildItem],
    project: &Project,
    enumerator: &dyn PageEnumerator,
) -> Result<Vec<Page>, ReconcileError> {
    let Some(item) = static_render
        .iter()
        .find(|item| item.file_name.ends_with(SSG_SENTINEL))
    else {
        return Ok(Vec::new());
    };
    let payload = item.payload().normalized();
    if payload.is_empty() {
        return Ok(Vec::new());
    }

    let module = project.temp_dir().join(SSG_MODULE);
    write_atomic(&module, payload.as_bytes())?;

    let raw = enumerator.enumerate(&module, &project.config)?;
    let total = raw.len();
    let pages: Vec<Page> = raw.into_iter().filter_map(Page::from_raw).collect();
    tracing::debug!(
        enumerated = total,
        kept = pages.len(),
        "materialized static pages"
    );
    Ok(pages)
}

// =============================================================================
// Assets
// =============================================================================

/// Map sentinel and legacy names onto the configured output names.
///
/// Names that are neither pass through unchanged, so applying this twice is
/// the same as applying it once.
pub fn canonical_name(name: &str, config: &SiteConfig) -> String {
    if name.ends_with(BUNDLE_CSS_SENTINEL) || name == config.legacy_bundle_css_name() {
        config.bundle_css_name()
    } else if name.ends_with(HYDRATE_SENTINEL) {
        config.partial_js_name()
    } else {
        name.to_string()
    }
}

/// Filter, rename and normalize asset and partial items.
pub fn canonical_assets(
    asset: &[BuildItem],
    partial: &[BuildItem],
    config: &SiteConfig,
) -> Vec<ReconciledFile> {
    let assets = asset
        .iter()
        .filter(|item| !item.file_name.ends_with(BUNDLE_JS_SENTINEL));
    let partials = partial
        .iter()
        .filter(|item| item.file_name.ends_with(HYDRATE_SENTINEL));

    assets
        .chain(partials)
        .filter_map(|item| {
            let data = item.payload().normalized();
            (!data.is_empty()).then(|| ReconciledFile {
                file_name: canonical_name(&item.file_name, config),
                data,
            })
        })
        .collect()
}

// =============================================================================
// Assembly and markers
// =============================================================================

/// Merge pages and assets into the final file set and resolve markers.
///
/// Pages go first and assets after, so on a name clash the asset wins.
pub fn assemble(
    pages: &[Page],
    assets: Vec<ReconciledFile>,
    config: &SiteConfig,
    beautifier: &dyn Beautifier,
) -> Vec<ReconciledFile> {
    let page_files = pages.iter().map(|page| ReconciledFile {
        file_name: page.html_file_name.clone(),
        data: Payload::Text(page.html.clone()),
    });
    let merged = dedupe_last_wins(page_files.chain(assets));

    // Barrier: decided over every asset before any page is rewritten.
    let bundle_css = config.bundle_css_name();
    let has_bundle_css = merged.iter().any(|f| f.file_name == bundle_css);

    let delivery_html = if merged
        .iter()
        .any(|f| is_html(&f.file_name) && f.data.as_text().is_some_and(markers::has_delivery_slot))
    {
        let items = delivery::listing(pages, config.delivery.sort_by);
        Some(delivery::render_list(&items).into_string())
    } else {
        None
    };

    let root_attr = config.partial_root_attr();
    merged
        .into_par_iter()
        .filter_map(|file| {
            let data = match file.data {
                Payload::Text(text) => {
                    let text = if is_html(&file.file_name) {
                        resolve_markers(&text, &root_attr, has_bundle_css, delivery_html.as_deref())
                    } else {
                        text
                    };
                    Payload::Text(text)
                }
                bytes => bytes,
            };
            // Emptiness is settled before formatting.
            if data.is_empty() {
                return None;
            }
            let data = match data {
                Payload::Text(text) => Payload::Text(pretty_print(&file.file_name, text, config, beautifier)),
                bytes => bytes,
            };
            Some(ReconciledFile {
                file_name: file.file_name,
                data,
            })
        })
        .collect()
}

/// Resolve every placeholder in one HTML document.
pub fn resolve_markers(
    html: &str,
    root_attr: &str,
    has_bundle_css: bool,
    delivery_html: Option<&str>,
) -> String {
    let has_partial_js = markers::has_partial_root(html, root_attr);
    let html = markers::resolve_partial(html, has_partial_js);
    let html = markers::resolve_bundle(&html, has_bundle_css);
    match delivery_html {
        Some(list) => markers::fill_delivery(&html, list),
        None => html,
    }
}

/// Apply the enabled formatter for this file type. A file that formats to
/// nothing keeps its unformatted content.
fn pretty_print(
    file_name: &str,
    text: String,
    config: &SiteConfig,
    beautifier: &dyn Beautifier,
) -> String {
    let formatted = if is_html(file_name) && config.beautify.use_html {
        beautifier.html(&text)
    } else if config.beautify.use_assets && file_name.ends_with(".css") {
        beautifier.css(&text)
    } else if config.beautify.use_assets && file_name.ends_with(".js") {
        beautifier.js(&text)
    } else {
        return text;
    };
    if formatted.is_empty() { text } else { formatted }
}

fn is_html(name: &str) -> bool {
    name.ends_with(".html")
}

/// Keep one file per name. The last occurrence supplies the data; the first
/// occurrence fixes the position.
fn dedupe_last_wins(files: impl Iterator<Item = ReconciledFile>) -> Vec<ReconciledFile> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<ReconciledFile> = Vec::new();
    for file in files {
        match index.get(&file.file_name) {
            Some(&i) => out[i] = file,
            None => {
                index.insert(file.file_name.clone(), out.len());
                out.push(file);
            }
        }
    }
    out
}

// =============================================================================
// Write-out
// =============================================================================

/// Copy the public directory into `out_dir`. Returns the number of files.
fn copy_public(public: &Path, out_dir: &Path) -> Result<usize, ReconcileError> {
    if !public.is_dir() {
        return Ok(0);
    }
    let mut copied = 0;
    for entry in WalkDir::new(public).follow_links(true) {
        let entry = entry?;
        let Ok(rel) = entry.path().strip_prefix(public) else {
            continue;
        };
        let dest = out_dir.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
            copied += 1;
        }
    }
    tracing::debug!(files = copied, "copied public directory");
    Ok(copied)
}

fn write_files(files: &[ReconciledFile], out_dir: &Path) -> Vec<WriteOutcome> {
    let mut outcomes: Vec<WriteOutcome> = files
        .par_iter()
        .map(|file| match write_one(file, out_dir) {
            Ok(bytes) => WriteOutcome::Written {
                path: file.file_name.clone(),
                bytes,
            },
            Err(e) => {
                tracing::warn!(file = %file.file_name, error = %e, "failed to write output file");
                WriteOutcome::Failed {
                    path: file.file_name.clone(),
                    error: e.to_string(),
                }
            }
        })
        .collect();
    outcomes.sort_by(|a, b| a.path().cmp(b.path()));
    outcomes
}

fn write_one(file: &ReconciledFile, out_dir: &Path) -> std::io::Result<u64> {
    let rel = Path::new(&file.file_name);
    if !rel
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "file name escapes the output root",
        ));
    }
    let bytes = file.data.as_bytes();
    write_atomic(&out_dir.join(rel), bytes)?;
    Ok(bytes.len() as u64)
}

/// Write `data` to a temp file next to `dest`, then rename it into place.
pub(crate) fn write_atomic(dest: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = match dest.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

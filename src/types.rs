//! Shared types passed between the pipeline stages.
//!
//! Passes produce [`BuildItem`]s, the enumeration step produces [`Page`]s, and
//! the reconciler turns both into [`ReconciledFile`]s. None of these outlive a
//! single build.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which compilation pass produced a set of build items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PassKind {
    StaticRender,
    Asset,
    PartialHydration,
}

impl PassKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PassKind::StaticRender => "static-render",
            PassKind::Asset => "asset",
            PassKind::PartialHydration => "partial-hydration",
        }
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File contents, either text or raw bytes.
///
/// Deserializes from a JSON string or a JSON array of bytes, which is how
/// the bundler reports text assets and binary assets respectively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Bytes(Vec<u8>),
}

impl Payload {
    /// A lone newline counts as empty, same as zero length.
    pub fn normalized(self) -> Self {
        match self {
            Payload::Text(s) if s == "\n" => Payload::Text(String::new()),
            Payload::Bytes(b) if b == b"\n" => Payload::Bytes(Vec::new()),
            other => other,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Text(s) => s.is_empty(),
            Payload::Bytes(b) => b.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(s) => s.as_bytes(),
            Payload::Bytes(b) => b,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            Payload::Bytes(_) => None,
        }
    }
}

/// One artifact emitted by a compilation pass.
///
/// Asset-style items carry their content in `source`, chunk-style items in
/// `code`. When both are present, `code` wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildItem {
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Payload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl BuildItem {
    pub fn code(file_name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            source: None,
            code: Some(code.into()),
        }
    }

    pub fn asset(file_name: impl Into<String>, source: Payload) -> Self {
        Self {
            file_name: file_name.into(),
            source: Some(source),
            code: None,
        }
    }

    /// The item's content, preferring `code` over `source`. Missing content
    /// comes back as empty text.
    pub fn payload(&self) -> Payload {
        if let Some(code) = &self.code {
            return Payload::Text(code.clone());
        }
        self.source
            .clone()
            .unwrap_or_else(|| Payload::Text(String::new()))
    }
}

/// Page frontmatter. Only `draft`, `title` and `group` are interpreted; the
/// rest is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frontmatter {
    #[serde(default)]
    pub draft: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A page record as returned by the enumeration collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPage {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub frontmatter: Frontmatter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// A materialized route, ready to be written as an HTML file.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub route_path: String,
    pub html_file_name: String,
    pub html: String,
    pub frontmatter: Frontmatter,
    pub group: String,
    pub title: String,
}

impl Page {
    /// Materialize a raw page. Returns `None` for drafts and pages that
    /// rendered to nothing.
    pub fn from_raw(raw: RawPage) -> Option<Self> {
        if raw.frontmatter.draft || raw.html.is_empty() {
            return None;
        }
        let html_file_name = raw
            .file_name
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| html_path(&raw.path));
        let title = raw
            .title
            .or_else(|| raw.frontmatter.title.clone())
            .unwrap_or_default();
        let group = raw
            .group
            .or_else(|| raw.frontmatter.group.clone())
            .unwrap_or_default();
        Some(Self {
            route_path: raw.path,
            html_file_name,
            html: raw.html,
            frontmatter: raw.frontmatter,
            group,
            title,
        })
    }
}

/// Output file name for a route path.
///
/// - `/` → `index.html`
/// - `/about` → `about.html`
/// - `/docs/` → `docs/index.html`
pub fn html_path(route: &str) -> String {
    let trimmed = route.trim_start_matches('/');
    if trimmed.is_empty() {
        "index.html".to_string()
    } else if let Some(dir) = trimmed.strip_suffix('/') {
        format!("{}/index.html", dir)
    } else {
        format!("{}.html", trimmed)
    }
}

/// One file of the final output tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledFile {
    pub file_name: String,
    pub data: Payload,
}

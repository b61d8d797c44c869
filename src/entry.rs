//! Entry declarations: the scripts and stylesheets injected into pages.
//!
//! `entry` in `sitewright.toml` accepts several shapes:
//!
//! ```toml
//! entry = "src/main.ts"
//! entry = ["src/main.ts", "src/print.css"]
//! entry = { app = "src/main.ts", print = "src/print.css" }
//! entry = [
//!   { input = "src/blog.ts", insert_pages = ["/blog/**", "!/blog/drafts/**"] },
//!   { name = "home", input = "src/home.ts", insert_pages = { include = ["/"] }, position = "end" },
//! ]
//! ```
//!
//! They are all normalized into [`ResolvedEntry`] as soon as config is loaded,
//! so nothing downstream has to look at the declared shape again.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const ALL_PAGES: &str = "**/*";

/// Entry declaration as written in config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryDecl {
    Single(String),
    List(Vec<String>),
    Objects(Vec<EntryObject>),
    Named(BTreeMap<String, String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_pages: Option<InsertPages>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_type: Option<LoadType>,
}

/// Which pages an entry is inserted into. Patterns prefixed with `!` exclude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InsertPages {
    One(String),
    Many(Vec<String>),
    Split {
        include: Vec<String>,
        #[serde(default)]
        exclude: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    Head,
    Start,
    End,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadType {
    #[default]
    Defer,
    Async,
    None,
}

/// Canonical form of an entry declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEntry {
    pub name: String,
    pub input: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub position: Position,
    pub load: LoadType,
}

impl ResolvedEntry {
    fn for_all_pages(name: String, input: PathBuf) -> Self {
        Self {
            name,
            input,
            include: vec![ALL_PAGES.to_string()],
            exclude: Vec::new(),
            position: Position::default(),
            load: LoadType::default(),
        }
    }
}

/// Normalize a declaration into resolved entries, joining inputs onto `root`.
pub fn resolve_entries(decl: &EntryDecl, root: &Path) -> Vec<ResolvedEntry> {
    match decl {
        EntryDecl::Single(input) => vec![ResolvedEntry::for_all_pages(
            file_stem(input),
            root.join(input),
        )],
        EntryDecl::List(inputs) => inputs
            .iter()
            .map(|input| ResolvedEntry::for_all_pages(file_stem(input), root.join(input)))
            .collect(),
        EntryDecl::Named(map) => map
            .iter()
            .map(|(name, input)| ResolvedEntry::for_all_pages(name.clone(), root.join(input)))
            .collect(),
        EntryDecl::Objects(objects) => objects
            .iter()
            .map(|obj| {
                let (include, exclude) = split_insert_pages(obj.insert_pages.as_ref());
                ResolvedEntry {
                    name: obj
                        .name
                        .clone()
                        .filter(|n| !n.is_empty())
                        .unwrap_or_else(|| file_stem(&obj.input)),
                    input: root.join(&obj.input),
                    include,
                    exclude,
                    position: obj.position.unwrap_or_default(),
                    load: obj.load_type.unwrap_or_default(),
                }
            })
            .collect(),
    }
}

/// Split an `insert_pages` declaration into include and exclude patterns.
fn split_insert_pages(pages: Option<&InsertPages>) -> (Vec<String>, Vec<String>) {
    match pages {
        None => (vec![ALL_PAGES.to_string()], Vec::new()),
        Some(InsertPages::One(pattern)) => match pattern.strip_prefix('!') {
            Some(excluded) => (vec![ALL_PAGES.to_string()], vec![excluded.to_string()]),
            None => (vec![pattern.clone()], Vec::new()),
        },
        Some(InsertPages::Many(patterns)) => {
            let mut include = Vec::new();
            let mut exclude = Vec::new();
            for pattern in patterns {
                match pattern.strip_prefix('!') {
                    Some(excluded) => exclude.push(excluded.to_string()),
                    None => include.push(pattern.clone()),
                }
            }
            if include.is_empty() {
                include.push(ALL_PAGES.to_string());
            }
            (include, exclude)
        }
        Some(InsertPages::Split { include, exclude }) => (include.clone(), exclude.clone()),
    }
}

fn file_stem(input: &str) -> String {
    Path::new(input)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.to_string())
}

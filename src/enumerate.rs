//! Static-page enumeration collaborator.
//!
//! The static-render pass compiles to a module that knows every route of the
//! site. Executing it is the enumerator's job: given the path of the compiled
//! module, return one [`RawPage`] per route.

use crate::bundler::{CommandFailure, run_json_command};
use crate::config::{CommandConfig, SiteConfig};
use crate::types::RawPage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnumerateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid page list: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Page enumeration failed: {0}")]
    Failed(String),
}

pub trait PageEnumerator: Sync {
    fn enumerate(&self, module: &Path, config: &SiteConfig)
    -> Result<Vec<RawPage>, EnumerateError>;
}

/// Runs an external command with the module path as its last argument and
/// the site config as JSON on stdin; stdout is a JSON array of pages.
#[derive(Debug, Clone)]
pub struct CommandEnumerator {
    command: CommandConfig,
}

impl CommandEnumerator {
    pub fn new(command: CommandConfig) -> Self {
        Self { command }
    }
}

impl PageEnumerator for CommandEnumerator {
    fn enumerate(
        &self,
        module: &Path,
        config: &SiteConfig,
    ) -> Result<Vec<RawPage>, EnumerateError> {
        let input = serde_json::to_vec(config)?;
        let mut args = self.command.args.clone();
        args.push(module.to_string_lossy().into_owned());
        let stdout =
            run_json_command(&self.command.command, &args, &input).map_err(|e| match e {
                CommandFailure::Io(e) => EnumerateError::Io(e),
                CommandFailure::Exit(msg) => EnumerateError::Failed(msg),
            })?;
        Ok(serde_json::from_slice(&stdout)?)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Mock enumerator returning canned pages and recording module paths
    /// together with the module contents at call time.
    #[derive(Default)]
    pub struct MockEnumerator {
        pub pages: Vec<RawPage>,
        pub error: Option<String>,
        pub calls: Mutex<Vec<(PathBuf, String)>>,
    }

    impl MockEnumerator {
        pub fn with_pages(pages: Vec<RawPage>) -> Self {
            Self {
                pages,
                ..Default::default()
            }
        }

        pub fn failing(msg: &str) -> Self {
            Self {
                error: Some(msg.to_string()),
                ..Default::default()
            }
        }

        pub fn get_calls(&self) -> Vec<(PathBuf, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PageEnumerator for MockEnumerator {
        fn enumerate(
            &self,
            module: &Path,
            _config: &SiteConfig,
        ) -> Result<Vec<RawPage>, EnumerateError> {
            let contents = std::fs::read_to_string(module).unwrap_or_default();
            self.calls
                .lock()
                .unwrap()
                .push((module.to_path_buf(), contents));
            match &self.error {
                Some(msg) => Err(EnumerateError::Failed(msg.clone())),
                None => Ok(self.pages.clone()),
            }
        }
    }

    /// Build a raw page with html and an optional title.
    pub fn raw_page(path: &str, html: &str, title: Option<&str>) -> RawPage {
        RawPage {
            path: path.to_string(),
            html: html.to_string(),
            title: title.map(str::to_string),
            ..Default::default()
        }
    }

    #[cfg(unix)]
    #[test]
    fn command_enumerator_passes_module_path_last() {
        let enumerator = CommandEnumerator::new(CommandConfig {
            command: "sh".into(),
            args: vec![
                "-c".into(),
                r#"cat > /dev/null; printf '[{"path":"%s","html":"<p>x</p>"}]' "$1""#.into(),
                "enumerate".into(),
            ],
        });
        let pages = enumerator
            .enumerate(Path::new("/tmp/ssg.mjs"), &SiteConfig::default())
            .unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].path, "/tmp/ssg.mjs");
    }

    #[cfg(unix)]
    #[test]
    fn command_enumerator_rejects_garbage() {
        let enumerator = CommandEnumerator::new(CommandConfig {
            command: "sh".into(),
            args: vec!["-c".into(), "cat > /dev/null; echo not-json".into()],
        });
        let err = enumerator
            .enumerate(Path::new("/tmp/ssg.mjs"), &SiteConfig::default())
            .unwrap_err();
        assert!(matches!(err, EnumerateError::Json(_)));
    }
}

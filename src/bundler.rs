//! The module bundler collaborator.
//!
//! Each compilation pass hands a [`PassSpec`] (fixed plugin list and target
//! options for its [`PassKind`]) plus a [`CompileRequest`] to a [`Bundler`],
//! and gets back the list of [`BuildItem`]s it produced. The bundler itself
//! (module resolution, transpilation, minification) lives outside this crate.
//!
//! The production implementation, [`CommandBundler`], runs an external
//! command once per pass:
//!
//! ```text
//! <command> <args...> --pass <kind>
//!   stdin:  {"pass": {...}, "root": "...", "tempDir": "...", "entries": [...]}
//!   stdout: [{"fileName": "...", "code": "..."}, {"fileName": "...", "source": ...}]
//! ```

use crate::config::CommandConfig;
use crate::entry::ResolvedEntry;
use crate::types::{BuildItem, PassKind};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BundlerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid bundler output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Compilation failed: {0}")]
    CompilationFailed(String),
}

/// Target options a pass is compiled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetOptions {
    pub ssr: bool,
    pub minify: bool,
}

/// A pass: its kind, plugin list and target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassSpec {
    pub kind: PassKind,
    pub plugins: Vec<&'static str>,
    pub target: TargetOptions,
}

impl PassSpec {
    /// The fixed configuration for a pass kind.
    pub fn for_kind(kind: PassKind) -> Self {
        let (plugins, target): (&[&'static str], TargetOptions) = match kind {
            PassKind::StaticRender => (
                &["react", "mdx", "svgr", "sprite-ssr", "fetch", "ssg", "partial"],
                TargetOptions {
                    ssr: true,
                    minify: false,
                },
            ),
            PassKind::Asset => (
                &["react", "mdx", "svgr", "sprite", "bundle"],
                TargetOptions {
                    ssr: false,
                    minify: true,
                },
            ),
            PassKind::PartialHydration => (
                &["react", "preact", "mdx", "svgr", "sprite", "hydrate"],
                TargetOptions {
                    ssr: false,
                    minify: true,
                },
            ),
        };
        Self {
            kind,
            plugins: plugins.to_vec(),
            target,
        }
    }
}

/// Everything the bundler needs besides the pass itself.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileRequest {
    pub root: PathBuf,
    pub temp_dir: PathBuf,
    pub entries: Vec<ResolvedEntry>,
}

/// Compiles the project for one pass.
///
/// Implementations must be `Sync`: the static-render and asset passes are
/// compiled concurrently against the same bundler.
pub trait Bundler: Sync {
    fn compile(
        &self,
        pass: &PassSpec,
        request: &CompileRequest,
    ) -> Result<Vec<BuildItem>, BundlerError>;
}

/// Runs an external bundler command per pass, speaking JSON over stdio.
#[derive(Debug, Clone)]
pub struct CommandBundler {
    command: CommandConfig,
}

impl CommandBundler {
    pub fn new(command: CommandConfig) -> Self {
        Self { command }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    pass: &'a PassSpec,
    #[serde(flatten)]
    request: &'a CompileRequest,
}

impl Bundler for CommandBundler {
    fn compile(
        &self,
        pass: &PassSpec,
        request: &CompileRequest,
    ) -> Result<Vec<BuildItem>, BundlerError> {
        let input = serde_json::to_vec(&WireRequest { pass, request })?;
        let mut args = self.command.args.clone();
        args.push("--pass".to_string());
        args.push(pass.kind.to_string());
        let stdout = run_json_command(&self.command.command, &args, &input)
            .map_err(|e| match e {
                CommandFailure::Io(e) => BundlerError::Io(e),
                CommandFailure::Exit(msg) => BundlerError::CompilationFailed(msg),
            })?;
        Ok(serde_json::from_slice(&stdout)?)
    }
}

/// Failure modes of a collaborator command.
#[derive(Debug)]
pub(crate) enum CommandFailure {
    Io(std::io::Error),
    Exit(String),
}

/// Run `program args...`, feed `input` on stdin, and return stdout.
///
/// A non-zero exit becomes [`CommandFailure::Exit`] carrying the trimmed
/// stderr.
pub(crate) fn run_json_command(
    program: &str,
    args: &[String],
    input: &[u8],
) -> Result<Vec<u8>, CommandFailure> {
    tracing::debug!(program, ?args, "spawning collaborator");
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(CommandFailure::Io)?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input).map_err(CommandFailure::Io)?;
    }

    let output = child.wait_with_output().map_err(CommandFailure::Io)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let msg = if stderr.is_empty() {
            format!("{} exited with {}", program, output.status)
        } else {
            format!("{} exited with {}: {}", program, output.status, stderr)
        };
        return Err(CommandFailure::Exit(msg));
    }
    Ok(output.stdout)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock bundler returning canned items per pass and recording calls.
    /// Uses Mutex so it is Sync and works with rayon::join.
    #[derive(Default)]
    pub struct MockBundler {
        pub outputs: HashMap<PassKind, Vec<BuildItem>>,
        pub failures: HashMap<PassKind, String>,
        pub calls: Mutex<Vec<PassKind>>,
        pub requests: Mutex<Vec<CompileRequest>>,
    }

    impl MockBundler {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_output(mut self, kind: PassKind, items: Vec<BuildItem>) -> Self {
            self.outputs.insert(kind, items);
            self
        }

        pub fn failing(mut self, kind: PassKind, msg: &str) -> Self {
            self.failures.insert(kind, msg.to_string());
            self
        }

        pub fn get_calls(&self) -> Vec<PassKind> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Bundler for MockBundler {
        fn compile(
            &self,
            pass: &PassSpec,
            request: &CompileRequest,
        ) -> Result<Vec<BuildItem>, BundlerError> {
            self.calls.lock().unwrap().push(pass.kind);
            self.requests.lock().unwrap().push(request.clone());
            if let Some(msg) = self.failures.get(&pass.kind) {
                return Err(BundlerError::CompilationFailed(msg.clone()));
            }
            Ok(self.outputs.get(&pass.kind).cloned().unwrap_or_default())
        }
    }

    #[test]
    fn pass_specs_are_fixed_per_kind() {
        let ssr = PassSpec::for_kind(PassKind::StaticRender);
        assert_eq!(
            ssr.plugins,
            vec!["react", "mdx", "svgr", "sprite-ssr", "fetch", "ssg", "partial"]
        );
        assert!(ssr.target.ssr);
        assert!(!ssr.target.minify);

        let asset = PassSpec::for_kind(PassKind::Asset);
        assert_eq!(asset.plugins, vec!["react", "mdx", "svgr", "sprite", "bundle"]);
        assert!(!asset.target.ssr);
        assert!(asset.target.minify);

        let partial = PassSpec::for_kind(PassKind::PartialHydration);
        assert_eq!(
            partial.plugins,
            vec!["react", "preact", "mdx", "svgr", "sprite", "hydrate"]
        );
        assert!(partial.target.minify);
    }

    #[test]
    fn wire_request_serializes_flat() {
        let pass = PassSpec::for_kind(PassKind::Asset);
        let request = CompileRequest {
            root: "/p".into(),
            temp_dir: "/p/.tmp".into(),
            entries: Vec::new(),
        };
        let json = serde_json::to_value(WireRequest {
            pass: &pass,
            request: &request,
        })
        .unwrap();
        assert_eq!(json["pass"]["kind"], "asset");
        assert_eq!(json["tempDir"], "/p/.tmp");
        assert_eq!(json["entries"], serde_json::json!([]));
    }

    #[cfg(unix)]
    #[test]
    fn command_bundler_reads_items_from_stdout() {
        let bundler = CommandBundler::new(CommandConfig {
            command: "sh".into(),
            args: vec![
                "-c".into(),
                r#"cat > /dev/null; echo '[{"fileName":"a.js","code":"x"}]'"#.into(),
                "bundler".into(),
            ],
        });
        let request = CompileRequest {
            root: "/p".into(),
            temp_dir: "/p/.tmp".into(),
            entries: Vec::new(),
        };
        let items = bundler
            .compile(&PassSpec::for_kind(PassKind::Asset), &request)
            .unwrap();
        assert_eq!(items, vec![BuildItem::code("a.js", "x")]);
    }

    #[cfg(unix)]
    #[test]
    fn command_bundler_nonzero_exit_is_compilation_error() {
        let bundler = CommandBundler::new(CommandConfig {
            command: "sh".into(),
            args: vec!["-c".into(), "cat > /dev/null; echo boom >&2; exit 3".into()],
        });
        let request = CompileRequest {
            root: "/p".into(),
            temp_dir: "/p/.tmp".into(),
            entries: Vec::new(),
        };
        let err = bundler
            .compile(&PassSpec::for_kind(PassKind::Asset), &request)
            .unwrap_err();
        match err {
            BundlerError::CompilationFailed(msg) => assert!(msg.contains("boom")),
            other => panic!("unexpected error: {other}"),
        }
    }
}

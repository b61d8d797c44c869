//! Pass orchestration.
//!
//! Drives the three compilation passes against a [`Bundler`]:
//!
//! 1. **static-render** and **asset** run concurrently via `rayon::join`.
//! 2. Once both have finished, `<temp_dir>/partials` is checked. The
//!    static-render pass creates that directory when it meets a
//!    partial-hydration boundary; without it the **partial-hydration** pass
//!    is skipped and contributes nothing.
//!
//! Nothing here writes final output. A failing pass aborts the build with a
//! [`PassError`] naming the pass.

use crate::bundler::{Bundler, BundlerError, CompileRequest, PassSpec};
use crate::config::Project;
use crate::types::{BuildItem, PassKind};
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("{kind} pass failed: {source}")]
pub struct PassError {
    pub kind: PassKind,
    #[source]
    pub source: BundlerError,
}

/// Raw item lists produced by the passes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassOutputs {
    pub static_render: Vec<BuildItem>,
    pub asset: Vec<BuildItem>,
    pub partial: Vec<BuildItem>,
}

/// Run all passes and collect their outputs.
pub fn run_build(project: &Project, bundler: &dyn Bundler) -> Result<PassOutputs, PassError> {
    let request = CompileRequest {
        root: project.root.clone(),
        temp_dir: project.temp_dir(),
        entries: project.entries.clone(),
    };

    let (static_render, asset) = rayon::join(
        || run_pass(PassKind::StaticRender, bundler, &request),
        || run_pass(PassKind::Asset, bundler, &request),
    );
    // Static-render is checked first so it wins when both fail.
    let static_render = static_render?;
    let asset = asset?;

    let partial = if project.partials_marker_dir().is_dir() {
        run_pass(PassKind::PartialHydration, bundler, &request)?
    } else {
        tracing::debug!("no partial-hydration boundaries, skipping partial pass");
        Vec::new()
    };

    Ok(PassOutputs {
        static_render,
        asset,
        partial,
    })
}

fn run_pass(
    kind: PassKind,
    bundler: &dyn Bundler,
    request: &CompileRequest,
) -> Result<Vec<BuildItem>, PassError> {
    let spec = PassSpec::for_kind(kind);
    let start = Instant::now();
    tracing::info!(pass = %kind, "pass started");
    let items = bundler
        .compile(&spec, request)
        .map_err(|source| PassError { kind, source })?;
    tracing::info!(
        pass = %kind,
        items = items.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "pass finished"
    );
    Ok(items)
}

//! Top-level build: passes, then reconciliation, then images.
//!
//! Images run last because reconciliation recreates the output root.

use crate::beautify::Beautifier;
use crate::bundler::Bundler;
use crate::config::Project;
use crate::enumerate::PageEnumerator;
use crate::images::{self, ImageCodec, ImageError, ImageReport};
use crate::orchestrate::{self, PassError};
use crate::reconcile::{self, ReconcileError, ReconcileReport};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Pass(#[from] PassError),
    #[error("Reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),
    #[error("Image generation failed: {0}")]
    Image(#[from] ImageError),
}

/// The external collaborators a build delegates to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub bundler: &'a dyn Bundler,
    pub enumerator: &'a dyn PageEnumerator,
    pub codec: &'a dyn ImageCodec,
    pub beautifier: &'a dyn Beautifier,
}

#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// Reuse the image cache. `false` re-encodes every image.
    pub use_cache: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { use_cache: true }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub files: ReconcileReport,
    pub images: ImageReport,
}

/// Run a full build.
///
/// A pass or enumeration failure aborts before anything is written. Per-file
/// and per-image failures are carried in the report instead.
pub fn build(
    project: &Project,
    collaborators: Collaborators<'_>,
    options: BuildOptions,
) -> Result<BuildReport, BuildError> {
    let outputs = orchestrate::run_build(project, collaborators.bundler)?;
    let files = reconcile::reconcile(
        &outputs,
        project,
        collaborators.enumerator,
        collaborators.beautifier,
    )?;
    let images = build_images(project, collaborators.codec, options.use_cache)?;
    Ok(BuildReport { files, images })
}

/// Generate the images recorded in `<temp_dir>/images.json`.
pub fn build_images(
    project: &Project,
    codec: &dyn ImageCodec,
    use_cache: bool,
) -> Result<ImageReport, ImageError> {
    let requests = images::load_requests(&project.image_requests_path())?;
    Ok(images::generate(&requests, project, codec, use_cache))
}

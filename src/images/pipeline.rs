//! Cached image generation.
//!
//! ```text
//! load manifest ─▶ par_iter(requests) ─▶ merge results ─▶ save manifest
//!                    │
//!                    ├─ hash source + options
//!                    ├─ hit:  copy <cache_dir>/<name> → <out>/<name>
//!                    └─ miss: codec → output, then store, record entry
//! ```
//!
//! Tasks never touch the manifest. Each returns its outcome and, on a miss,
//! the new [`CacheEntry`]; the entries are merged into the manifest once all
//! tasks are done and the manifest is written once.

use super::cache::{CacheEntry, CacheManifest, CacheStats, MANIFEST_FILENAME};
use super::codec::{CodecError, ImageCodec};
use super::params::{ImageRequest, ImageRequests, hash_bytes};
use crate::config::Project;
use crate::reconcile::write_atomic;
use rayon::prelude::*;
use std::fs;
use std::path::{Component, Path};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("Invalid image request file: {0}")]
    Requests(#[from] serde_json::Error),
    #[error("Invalid output name: {0}")]
    InvalidName(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageStatus {
    /// Encoded fresh.
    Built { bytes: u64 },
    /// Served from the cache store.
    Skipped,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageOutcome {
    pub file_name: String,
    pub status: ImageStatus,
}

#[derive(Debug, Clone, Default)]
pub struct ImageReport {
    /// One outcome per request, sorted by file name.
    pub outcomes: Vec<ImageOutcome>,
    pub stats: CacheStats,
    /// Set when the manifest could not be persisted.
    pub manifest_error: Option<String>,
}

/// Read the request file written by the rendering layer. Missing → none.
pub fn load_requests(path: &Path) -> Result<ImageRequests, ImageError> {
    if !path.exists() {
        return Ok(ImageRequests::new());
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Generate every requested image, reusing cached store files when possible.
///
/// Individual failures end up in the report; they never stop other requests
/// or the manifest write.
pub fn generate(
    requests: &ImageRequests,
    project: &Project,
    codec: &dyn ImageCodec,
    use_cache: bool,
) -> ImageReport {
    let cache_dir = project.cache_dir();
    let out_dir = project.out_dir();
    let dirs = Dirs {
        root: &project.root,
        cache: &cache_dir,
        out: &out_dir,
    };
    let mut manifest = if use_cache {
        CacheManifest::load(&cache_dir)
    } else {
        CacheManifest::empty()
    };

    let results: Vec<(ImageOutcome, Option<CacheEntry>)> = {
        let manifest = &manifest;
        requests
            .par_iter()
            .map(|(file_name, request)| {
                match process_one(file_name, request, manifest, &dirs, codec) {
                    Ok((status, entry)) => (
                        ImageOutcome {
                            file_name: file_name.clone(),
                            status,
                        },
                        entry,
                    ),
                    Err(e) => {
                        tracing::warn!(image = %file_name, error = %e, "image generation failed");
                        (
                            ImageOutcome {
                                file_name: file_name.clone(),
                                status: ImageStatus::Failed {
                                    error: e.to_string(),
                                },
                            },
                            None,
                        )
                    }
                }
            })
            .collect()
    };

    let mut stats = CacheStats::default();
    let mut outcomes = Vec::with_capacity(results.len());
    for (outcome, entry) in results {
        match outcome.status {
            ImageStatus::Built { .. } => stats.misses += 1,
            ImageStatus::Skipped => stats.hits += 1,
            ImageStatus::Failed { .. } => stats.failures += 1,
        }
        if let Some(entry) = entry {
            manifest.insert(entry);
        }
        outcomes.push(outcome);
    }
    outcomes.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    let manifest_error = if requests.is_empty() {
        None
    } else {
        manifest.save(&cache_dir).err().map(|e| {
            tracing::warn!(error = %e, "failed to save image cache manifest");
            e.to_string()
        })
    };
    tracing::info!(%stats, "images processed");

    ImageReport {
        outcomes,
        stats,
        manifest_error,
    }
}

struct Dirs<'a> {
    root: &'a Path,
    cache: &'a Path,
    out: &'a Path,
}

fn process_one(
    file_name: &str,
    request: &ImageRequest,
    manifest: &CacheManifest,
    dirs: &Dirs<'_>,
    codec: &dyn ImageCodec,
) -> Result<(ImageStatus, Option<CacheEntry>), ImageError> {
    check_name(file_name)?;
    // Relative inputs are resolved against the project root.
    let source = fs::read(dirs.root.join(&request.input))?;
    let content_hash = hash_bytes(&source);
    let options_hash = request.options_hash();
    let output = dirs.out.join(file_name);

    if let Some(stored) = manifest.find_cached(file_name, &content_hash, &options_hash, dirs.cache) {
        let data = fs::read(&stored)?;
        write_atomic(&output, &data)?;
        return Ok((ImageStatus::Skipped, None));
    }

    let data = codec.resize_and_encode(&source, request)?;
    // Store last: it must only change when its manifest entry does.
    write_atomic(&output, &data)?;
    write_atomic(&dirs.cache.join(file_name), &data)?;
    Ok((
        ImageStatus::Built {
            bytes: data.len() as u64,
        },
        Some(CacheEntry {
            file_name: file_name.to_string(),
            content_hash,
            options_hash,
        }),
    ))
}

/// Output names must stay inside the output and cache roots.
fn check_name(file_name: &str) -> Result<(), ImageError> {
    let path = Path::new(file_name);
    let ok = !file_name.is_empty()
        && file_name != MANIFEST_FILENAME
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if ok {
        Ok(())
    } else {
        Err(ImageError::InvalidName(file_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::images::codec::tests::MockCodec;
    use crate::images::params::{ImageFormat, Quality, ResizeStrategy};
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        project: Project,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let project = Project::new(tmp.path(), SiteConfig::default());
        fs::create_dir_all(tmp.path().join("src")).unwrap();
        fs::write(tmp.path().join("src/hero.jpg"), b"hero-v1").unwrap();
        fs::write(tmp.path().join("src/logo.png"), b"logo").unwrap();
        Fixture { _tmp: tmp, project }
    }

    fn request(project: &Project, input: &str, width: u32) -> ImageRequest {
        ImageRequest {
            input: project.root.join(input),
            width: Some(width),
            height: None,
            resize: ResizeStrategy::Cover,
            format: ImageFormat::Webp,
            format_options: Default::default(),
        }
    }

    fn requests(project: &Project) -> ImageRequests {
        let mut r = ImageRequests::new();
        r.insert("img/hero-800.webp".into(), request(project, "src/hero.jpg", 800));
        r.insert("img/logo-64.webp".into(), request(project, "src/logo.png", 64));
        r
    }

    fn statuses(report: &ImageReport) -> Vec<&ImageStatus> {
        report.outcomes.iter().map(|o| &o.status).collect()
    }

    #[test]
    fn first_run_builds_everything() {
        let fx = fixture();
        let codec = MockCodec::new();

        let report = generate(&requests(&fx.project), &fx.project, &codec, true);

        assert_eq!(codec.call_count(), 2);
        assert_eq!(report.stats.misses, 2);
        assert!(fx.project.out_dir().join("img/hero-800.webp").exists());
        assert!(fx.project.cache_dir().join("img/hero-800.webp").exists());
        let manifest = CacheManifest::load(&fx.project.cache_dir());
        assert_eq!(manifest.entries.len(), 2);
    }

    #[test]
    fn identical_rerun_skips_codec_with_identical_bytes() {
        let fx = fixture();
        let reqs = requests(&fx.project);
        generate(&reqs, &fx.project, &MockCodec::new(), true);
        let first = fs::read(fx.project.out_dir().join("img/hero-800.webp")).unwrap();
        fs::remove_dir_all(fx.project.out_dir()).unwrap();

        let codec = MockCodec::new();
        let report = generate(&reqs, &fx.project, &codec, true);

        assert_eq!(codec.call_count(), 0);
        assert_eq!(report.stats.hits, 2);
        assert!(statuses(&report).iter().all(|s| **s == ImageStatus::Skipped));
        let second = fs::read(fx.project.out_dir().join("img/hero-800.webp")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn deleting_store_file_forces_regeneration() {
        let fx = fixture();
        let reqs = requests(&fx.project);
        generate(&reqs, &fx.project, &MockCodec::new(), true);
        fs::remove_file(fx.project.cache_dir().join("img/hero-800.webp")).unwrap();

        let codec = MockCodec::new();
        let report = generate(&reqs, &fx.project, &codec, true);

        assert_eq!(codec.call_count(), 1);
        assert_eq!(report.stats.hits, 1);
        assert_eq!(report.stats.misses, 1);
        assert!(fx.project.cache_dir().join("img/hero-800.webp").exists());
    }

    #[test]
    fn changed_option_rebuilds_and_updates_entry_in_place() {
        let fx = fixture();
        let mut reqs = requests(&fx.project);
        generate(&reqs, &fx.project, &MockCodec::new(), true);
        let before = CacheManifest::load(&fx.project.cache_dir());

        reqs.get_mut("img/hero-800.webp")
            .unwrap()
            .format_options
            .webp
            .lossless = false;
        let codec = MockCodec::new();
        generate(&reqs, &fx.project, &codec, true);

        assert_eq!(codec.call_count(), 1);
        let after = CacheManifest::load(&fx.project.cache_dir());
        assert_eq!(after.entries.len(), 2);
        let old = before.get("img/hero-800.webp").unwrap();
        let new = after.get("img/hero-800.webp").unwrap();
        assert_eq!(old.content_hash, new.content_hash);
        assert_ne!(old.options_hash, new.options_hash);
    }

    #[test]
    fn unrelated_format_option_keeps_cache() {
        let fx = fixture();
        let mut reqs = requests(&fx.project);
        generate(&reqs, &fx.project, &MockCodec::new(), true);

        reqs.get_mut("img/hero-800.webp")
            .unwrap()
            .format_options
            .jpg
            .quality = Quality::new(20);
        let codec = MockCodec::new();
        generate(&reqs, &fx.project, &codec, true);
        assert_eq!(codec.call_count(), 0);
    }

    #[test]
    fn changed_source_rebuilds() {
        let fx = fixture();
        let reqs = requests(&fx.project);
        generate(&reqs, &fx.project, &MockCodec::new(), true);
        fs::write(fx.project.root.join("src/hero.jpg"), b"hero-v2").unwrap();

        let codec = MockCodec::new();
        generate(&reqs, &fx.project, &codec, true);

        assert_eq!(codec.call_count(), 1);
        let out = fs::read(fx.project.out_dir().join("img/hero-800.webp")).unwrap();
        assert!(out.ends_with(b"hero-v2"));
    }

    #[test]
    fn no_cache_reencodes_everything() {
        let fx = fixture();
        let reqs = requests(&fx.project);
        generate(&reqs, &fx.project, &MockCodec::new(), true);

        let codec = MockCodec::new();
        let report = generate(&reqs, &fx.project, &codec, false);

        assert_eq!(codec.call_count(), 2);
        assert_eq!(report.stats.hits, 0);
        assert_eq!(CacheManifest::load(&fx.project.cache_dir()).entries.len(), 2);
    }

    #[test]
    fn failure_is_isolated_and_manifest_still_saved() {
        let fx = fixture();
        let mut reqs = requests(&fx.project);
        reqs.insert(
            "img/missing.webp".into(),
            request(&fx.project, "src/missing.jpg", 10),
        );
        let codec = MockCodec::failing_on("logo");

        let report = generate(&reqs, &fx.project, &codec, true);

        assert_eq!(report.stats.misses, 1);
        assert_eq!(report.stats.failures, 2);
        assert!(report.manifest_error.is_none());
        let manifest = CacheManifest::load(&fx.project.cache_dir());
        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(manifest.entries[0].file_name, "img/hero-800.webp");
    }

    #[test]
    fn failed_rebuild_keeps_previous_entry() {
        let fx = fixture();
        let reqs = requests(&fx.project);
        generate(&reqs, &fx.project, &MockCodec::new(), true);
        fs::write(fx.project.root.join("src/logo.png"), b"logo-v2").unwrap();

        generate(&reqs, &fx.project, &MockCodec::failing_on("logo"), true);

        let manifest = CacheManifest::load(&fx.project.cache_dir());
        assert_eq!(manifest.entries.len(), 2);
        assert_eq!(
            manifest.get("img/logo-64.webp").unwrap().content_hash,
            hash_bytes(b"logo")
        );
    }

    #[test]
    fn failed_output_write_leaves_store_untouched() {
        let fx = fixture();
        let name = "img/thumb.webp";
        let mut reqs = ImageRequests::new();
        reqs.insert(name.into(), request(&fx.project, "src/hero.jpg", 100));
        generate(&reqs, &fx.project, &MockCodec::new(), true);
        let w100 = fs::read(fx.project.out_dir().join(name)).unwrap();

        // A directory in the way makes the output write fail.
        let out = fx.project.out_dir().join(name);
        fs::remove_file(&out).unwrap();
        fs::create_dir_all(&out).unwrap();
        reqs.get_mut(name).unwrap().width = Some(200);
        let report = generate(&reqs, &fx.project, &MockCodec::new(), true);
        assert!(matches!(report.outcomes[0].status, ImageStatus::Failed { .. }));
        assert_eq!(fs::read(fx.project.cache_dir().join(name)).unwrap(), w100);

        fs::remove_dir_all(&out).unwrap();
        reqs.get_mut(name).unwrap().width = Some(100);
        let codec = MockCodec::new();
        let report = generate(&reqs, &fx.project, &codec, true);
        assert_eq!(report.outcomes[0].status, ImageStatus::Skipped);
        assert_eq!(codec.call_count(), 0);
        assert_eq!(fs::read(&out).unwrap(), w100);
    }

    #[test]
    fn escaping_names_fail() {
        let fx = fixture();
        let mut reqs = ImageRequests::new();
        reqs.insert("../x.webp".into(), request(&fx.project, "src/logo.png", 10));
        reqs.insert("cache.json".into(), request(&fx.project, "src/logo.png", 10));
        let codec = MockCodec::new();
        let report = generate(&reqs, &fx.project, &codec, true);
        assert_eq!(report.stats.failures, 2);
        assert_eq!(codec.call_count(), 0);
    }

    #[test]
    fn outcomes_sorted_by_name() {
        let fx = fixture();
        let report = generate(&requests(&fx.project), &fx.project, &MockCodec::new(), true);
        let names: Vec<&str> = report.outcomes.iter().map(|o| o.file_name.as_str()).collect();
        assert_eq!(names, vec!["img/hero-800.webp", "img/logo-64.webp"]);
    }

    #[test]
    fn load_requests_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(load_requests(&tmp.path().join("images.json")).unwrap().is_empty());
    }

    #[test]
    fn load_requests_parses_map() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("images.json");
        fs::write(
            &path,
            r#"{"img/a.png": {"input": "/src/a.jpg", "width": 100, "format": "png"}}"#,
        )
        .unwrap();
        let reqs = load_requests(&path).unwrap();
        assert_eq!(reqs["img/a.png"].format, ImageFormat::Png);
    }
}

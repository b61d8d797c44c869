//! CLI output formatting for build reports.
//!
//! Every file the build touches gets one line, labelled by what happened to
//! it. Paths are shown relative to the project root and padded to a common
//! width so sizes line up:
//!
//! ```text
//! BUILD   dist/index.html          1.42 KiB
//! BUILD   dist/assets/bundle.css   0.31 KiB
//! SKIPPED dist/img/hero-800.webp
//! ERROR   dist/blocked/app.js: Not a directory (os error 20)
//! ```
//!
//! Pure `format_*` functions return the lines; `print_*` wrappers write them
//! to stdout.

use crate::build::BuildReport;
use crate::images::{ImageReport, ImageStatus};
use crate::reconcile::{ReconcileReport, WriteOutcome};

/// Minimum gap between a padded path and its size.
const MIN_GAP: usize = 3;

/// Width of the widest label, so paths start in one column.
const LABEL_WIDTH: usize = "SKIPPED".len();

enum Detail {
    Size(u64),
    None,
    Error(String),
}

struct Line {
    label: &'static str,
    path: String,
    detail: Detail,
}

/// Format a byte count in KiB with two decimals.
pub fn format_kib(bytes: u64) -> String {
    format!("{:.2} KiB", bytes as f64 / 1024.0)
}

fn join_path(out: &str, name: &str) -> String {
    let out = out.trim_end_matches('/');
    if out.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", out, name)
    }
}

fn file_lines(report: &ReconcileReport, out: &str) -> Vec<Line> {
    report
        .outcomes
        .iter()
        .map(|outcome| match outcome {
            WriteOutcome::Written { path, bytes } => Line {
                label: "BUILD",
                path: join_path(out, path),
                detail: Detail::Size(*bytes),
            },
            WriteOutcome::Failed { path, error } => Line {
                label: "ERROR",
                path: join_path(out, path),
                detail: Detail::Error(error.clone()),
            },
        })
        .collect()
}

fn image_lines(report: &ImageReport, out: &str) -> Vec<Line> {
    report
        .outcomes
        .iter()
        .map(|outcome| {
            let path = join_path(out, &outcome.file_name);
            match &outcome.status {
                ImageStatus::Built { bytes } => Line {
                    label: "BUILD",
                    path,
                    detail: Detail::Size(*bytes),
                },
                ImageStatus::Skipped => Line {
                    label: "SKIPPED",
                    path,
                    detail: Detail::None,
                },
                ImageStatus::Failed { error } => Line {
                    label: "ERROR",
                    path,
                    detail: Detail::Error(error.clone()),
                },
            }
        })
        .collect()
}

fn render(lines: Vec<Line>) -> Vec<String> {
    let width = lines.iter().map(|l| l.path.len()).max().unwrap_or(0);
    lines
        .into_iter()
        .map(|line| {
            let label = format!("{:<LABEL_WIDTH$}", line.label);
            match line.detail {
                Detail::Size(bytes) => format!(
                    "{} {:<width$}{}{}",
                    label,
                    line.path,
                    " ".repeat(MIN_GAP),
                    format_kib(bytes),
                    width = width
                ),
                Detail::None => format!("{} {}", label, line.path),
                Detail::Error(msg) => format!("{} {}: {}", label, line.path, msg),
            }
        })
        .collect()
}

// ============================================================================
// Build
// ============================================================================

/// Format the full build report: written files, then images, then a summary.
pub fn format_build_report(report: &BuildReport, out: &str) -> Vec<String> {
    let mut lines = file_lines(&report.files, out);
    lines.extend(image_lines(&report.images, out));
    let mut rendered = render(lines);
    rendered.push(String::new());
    rendered.push(format!(
        "Pages: {}, public files: {}, written: {}",
        report.files.pages,
        report.files.public_files,
        report.files.outcomes.len() - report.files.failures().count()
    ));
    rendered.extend(cache_summary(&report.images));
    rendered
}

pub fn print_build_report(report: &BuildReport, out: &str) {
    for line in format_build_report(report, out) {
        println!("{}", line);
    }
}

// ============================================================================
// Images
// ============================================================================

pub fn format_image_report(report: &ImageReport, out: &str) -> Vec<String> {
    let mut rendered = render(image_lines(report, out));
    rendered.extend(cache_summary(report));
    rendered
}

pub fn print_image_report(report: &ImageReport, out: &str) {
    for line in format_image_report(report, out) {
        println!("{}", line);
    }
}

fn cache_summary(report: &ImageReport) -> Vec<String> {
    let mut lines = Vec::new();
    if report.stats.total() > 0 {
        lines.push(format!("Cache: {}", report.stats));
    }
    if let Some(err) = &report.manifest_error {
        lines.push(format!("Cache manifest not saved: {}", err));
    }
    lines
}

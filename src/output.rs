//! CLI output formatting.
//!
//! Output is **page-centric**: each transformed page is listed with the images
//! it rewrote, and what it cost is shown as indented context. Paths are
//! relative to the output directory.
//!
//! # Output Format
//!
//! ## Transform
//!
//! ```text
//! Pages
//! 001 blog/post.html (3 images)
//!     4 cached, 8 resized (12 total)
//! 002 index.html (1 image)
//!     4 cached, 0 resized (4 total)
//!
//! Skipped legacy/old.html
//! Transformed 2 of 14 pages
//! ```
//!
//! ## Finalize
//!
//! ```text
//! Promoted 16 files (2.4 MB) to dist
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::cache::CacheStats;
use crate::finalize::FinalizeReport;
use crate::pipeline::SiteReport;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{n} {}", if n == 1 { one } else { many })
}

/// Human byte size with one decimal above a kilobyte.
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

// ============================================================================
// Transform
// ============================================================================

/// Format the result of transforming every page of a site.
pub fn format_transform_output(report: &SiteReport) -> Vec<String> {
    let mut lines = Vec::new();

    if !report.pages.is_empty() {
        lines.push("Pages".to_string());
        for (i, page) in report.pages.iter().enumerate() {
            lines.push(format!(
                "{} {} ({})",
                format_index(i + 1),
                page.path.display(),
                plural(page.images, "image", "images")
            ));
            lines.push(format!("    {}", page.stats));
        }
        lines.push(String::new());
    }

    for path in &report.failed {
        lines.push(format!("Skipped {}", path.display()));
    }
    lines.push(format!(
        "Transformed {} of {}",
        report.pages.len(),
        plural(report.scanned, "page", "pages")
    ));
    lines
}

pub fn print_transform_output(report: &SiteReport) {
    for line in format_transform_output(report) {
        println!("{line}");
    }
}

// ============================================================================
// Finalize
// ============================================================================

pub fn format_finalize_output(report: Option<&FinalizeReport>, output_dir: &Path) -> String {
    match report {
        Some(r) if r.files == 0 => "Nothing staged".to_string(),
        Some(r) => format!(
            "Promoted {} ({}) to {}",
            plural(r.files, "file", "files"),
            format_bytes(r.bytes),
            output_dir.display()
        ),
        None => format!("Finalize failed, {} may be incomplete", output_dir.display()),
    }
}

pub fn print_finalize_output(report: Option<&FinalizeReport>, output_dir: &Path) {
    println!("{}", format_finalize_output(report, output_dir));
}

// ============================================================================
// Cache summary
// ============================================================================

pub fn format_cache_summary(stats: &CacheStats) -> String {
    if stats.total() == 0 {
        "Derivatives: none".to_string()
    } else {
        format!("Derivatives: {stats}")
    }
}

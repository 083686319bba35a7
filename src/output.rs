//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Layout
//!
//! ```text
//! Layout vertical:scale-aspect-fit
//!     Canvas: 200 × 300
//!     Base: (0, 0) 200 × 100
//!     Incoming: (0, 100) 200 × 200
//! ```
//!
//! ## Backends
//!
//! ```text
//! Backend software (primary, compatibility)
//!     auto: ready (primary)
//!     gpu:compatibility: ready (compatibility)
//!     cpu: not applicable
//! ```
//!
//! ## Written images
//!
//! ```text
//! Wrote out.gif
//!     Size: 64 × 64 pt (128 × 128 px @2x)
//!     Frames: 12 over 1200 ms
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure and do no I/O.

use crate::geometry::{Rect, Size};
use crate::imaging::{ContextStatus, GpuVariant, MergeLayout, MergingMode, RenderDestination, RichImage};
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Whole numbers print bare, everything else with two decimals.
fn number(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.2}")
    }
}

fn size(s: Size) -> String {
    format!("{} × {}", number(s.width), number(s.height))
}

fn rect(r: Rect) -> String {
    format!("({}, {}) {}", number(r.x()), number(r.y()), size(r.size))
}

// ============================================================================
// Layout
// ============================================================================

pub fn format_layout(mode: MergingMode, layout: &MergeLayout) -> Vec<String> {
    vec![
        format!("Layout {mode}"),
        format!("{}Canvas: {}", indent(1), size(layout.canvas)),
        format!("{}Base: {}", indent(1), rect(layout.base)),
        format!("{}Incoming: {}", indent(1), rect(layout.incoming)),
    ]
}

pub fn print_layout(mode: MergingMode, layout: &MergeLayout) {
    for line in format_layout(mode, layout) {
        println!("{}", line);
    }
}

// ============================================================================
// Backends
// ============================================================================

fn status(status: ContextStatus) -> String {
    match status {
        ContextStatus::Pending => "not built".to_string(),
        ContextStatus::Unavailable => "unavailable".to_string(),
        ContextStatus::Ready(v) => format!("ready ({})", v.name()),
        ContextStatus::NotApplicable => "not applicable".to_string(),
    }
}

pub fn format_backends(
    backend: &str,
    accelerators: &[GpuVariant],
    report: &[(RenderDestination, ContextStatus)],
) -> Vec<String> {
    let names: Vec<&str> = accelerators.iter().map(|v| v.name()).collect();
    let header = if names.is_empty() {
        format!("Backend {backend} (no accelerators)")
    } else {
        format!("Backend {backend} ({})", names.join(", "))
    };
    std::iter::once(header)
        .chain(
            report
                .iter()
                .map(|(dest, s)| format!("{}{dest}: {}", indent(1), status(*s))),
        )
        .collect()
}

pub fn print_backends(
    backend: &str,
    accelerators: &[GpuVariant],
    report: &[(RenderDestination, ContextStatus)],
) {
    for line in format_backends(backend, accelerators, report) {
        println!("{}", line);
    }
}

// ============================================================================
// Written images
// ============================================================================

pub fn format_written(path: &Path, image: &RichImage) -> Vec<String> {
    let mut lines = vec![format!("Wrote {}", path.display())];
    if let Some(first) = image.first() {
        lines.push(format!(
            "{}Size: {} pt ({} px @{}x)",
            indent(1),
            size(first.size()),
            size(first.pixel_size()),
            number(first.scale)
        ));
    }
    if image.is_animated() {
        let ms = image.duration.map(|d| d.as_millis()).unwrap_or(0);
        lines.push(format!(
            "{}Frames: {} over {} ms",
            indent(1),
            image.frames.len(),
            ms
        ));
    }
    lines
}

pub fn print_written(path: &Path, image: &RichImage) {
    for line in format_written(path, image) {
        println!("{}", line);
    }
}

//! Progress bars for byte streams
//!
//! Bars are passive: they count bytes that flow through a wrapped reader or
//! that a caller reports, and never drive any work themselves.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::Result;

const BYTES_TEMPLATE: &str =
    "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})";

/// Byte progress bar of `size` bytes.
///
/// When `visible` is false the bar still counts but draws nothing, which
/// keeps daemon logs clean.
pub fn byte_progress(size: u64, message: &str, visible: bool) -> Result<ProgressBar> {
    let pb = ProgressBar::new(size);
    if !visible {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    pb.set_style(
        ProgressStyle::default_bar()
            .template(BYTES_TEMPLATE)?
            .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    Ok(pb)
}

/// Format bytes into a human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

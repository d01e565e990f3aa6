
//! Utilities for creating and styling progress bars using the `indicatif` crate.
//!
//! Sketching reports progress per read file with a message showing reads processed
//! and the number of set bits, while comparison reports progress per sketch file.

use indicatif::{ProgressBar, ProgressStyle};

/// Create a progress bar of a specified length with desired styling.
pub fn progress_bar(len: u64) -> ProgressBar {
    let progress_bar = ProgressBar::new(len);
    progress_bar.set_style(ProgressStyle::default_bar().template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {percent}% [{human_pos}/{human_len}] [Remaining: {eta}]",
    ).expect("Invalid progress style."));

    progress_bar
}

/// Create a progress bar of a specified length and styling, with a terminal message.
pub fn progress_bar_msg(len: u64) -> ProgressBar {
    let progress_bar = ProgressBar::new(len);
    progress_bar.set_style(ProgressStyle::default_bar().template(
        "[{elapsed_precise}] {bar:20.cyan/blue} [{human_pos}/{human_len}] {prefix} [{msg}]",
    ).expect("Invalid progress style."));

    progress_bar
}

/// Format a count in millions, e.g. 1.5M.
pub fn to_millions(count: u64) -> String {
    format!("{:.1}M", count as f64 / 1_000_000.0)
}

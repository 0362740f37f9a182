//! Output helpers for the PCCT tools

use log::info;
use std::time::{Duration, Instant};

/// Format a duration as a human-readable string
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();

    if total_secs < 60 {
        format!("{}.{:03}s", total_secs, duration.subsec_millis())
    } else if total_secs < 3600 {
        format!("{}m {}s", total_secs / 60, total_secs % 60)
    } else {
        format!("{}h {}m {}s", total_secs / 3600, (total_secs % 3600) / 60, total_secs % 60)
    }
}

/// Format a byte size as a human-readable string
pub fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    }
}

/// Logs how long a command ran when dropped
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    pub fn new(operation: &'static str) -> Self {
        info!("Starting {}", operation);
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!(
            "{} completed in {}",
            self.operation,
            format_duration(self.start.elapsed())
        );
    }
}

/// Print a section header in the CLI output
pub fn print_header(title: &str) {
    println!("\n{}", title);
    println!("{}", "=".repeat(title.len()));
}

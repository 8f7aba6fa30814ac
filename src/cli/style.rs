//! Terminal styling helpers
//!
//! Output goes through `anstream`, which strips the ANSI codes when stdout
//! is not a terminal.

use indicatif::ProgressStyle;
use owo_colors::OwoColorize;
use std::fmt::Display;

/// Semantic colors for CLI output
pub trait Stylize {
    /// De-emphasized detail
    fn muted(&self) -> String;
    /// Headings and key words
    fn emphasis(&self) -> String;
    /// Names of tables, columns and ids
    fn accent(&self) -> String;
    /// Problems
    fn warn(&self) -> String;
    /// Good news
    fn success(&self) -> String;
}

impl<T: Display> Stylize for T {
    fn muted(&self) -> String {
        self.dimmed().to_string()
    }

    fn emphasis(&self) -> String {
        self.bold().to_string()
    }

    fn accent(&self) -> String {
        self.cyan().to_string()
    }

    fn warn(&self) -> String {
        self.yellow().to_string()
    }

    fn success(&self) -> String {
        self.green().to_string()
    }
}

/// Green check mark
pub fn check() -> String {
    "✓".green().to_string()
}

/// Red cross
pub fn cross() -> String {
    "✗".red().to_string()
}

/// Spinner used while scanning the schema
pub fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

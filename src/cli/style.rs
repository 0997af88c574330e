//! Terminal styling helpers
//!
//! Colors are always emitted; `anstream` strips them when stdout is not a
//! terminal.

use indicatif::ProgressStyle;
use owo_colors::OwoColorize;
use std::fmt::Display;

/// Check mark used in summaries
pub const CHECK: &str = "✓";

/// Styling shortcuts for anything printable
pub trait Stylize: Display {
    /// Bold text
    fn emphasis(&self) -> String {
        self.to_string().bold().to_string()
    }

    /// Highlighted value
    fn accent(&self) -> String {
        self.to_string().cyan().to_string()
    }

    /// Secondary text
    fn muted(&self) -> String {
        self.to_string().dimmed().to_string()
    }

    /// Success text
    fn success(&self) -> String {
        self.to_string().green().to_string()
    }

    /// Warning text
    fn warn(&self) -> String {
        self.to_string().yellow().to_string()
    }
}

impl<T: Display + ?Sized> Stylize for T {}

/// Green check mark
pub fn check() -> String {
    CHECK.success()
}

/// Arrow for list items
pub fn arrow() -> String {
    "→".muted()
}

/// Clickable link when the terminal supports it, plain text otherwise
pub fn link(text: &str, url: &str) -> String {
    if supports_hyperlinks::on(supports_hyperlinks::Stream::Stdout) {
        terminal_link::Link::new(text, url).to_string()
    } else {
        format!("{text} ({url})")
    }
}

/// Spinner shown while waiting on GitHub
pub fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", ""])
}

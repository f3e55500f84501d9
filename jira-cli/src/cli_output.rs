// ABOUTME: Centralized CLI output utilities for consistent user-facing messages
// ABOUTME: Errors, warnings and status lines go to stderr so stdout stays pipeable

use owo_colors::OwoColorize;
use std::io::IsTerminal;

/// Centralized CLI output utilities for consistent formatting
#[derive(Debug, Clone, Copy)]
pub struct CliOutput {
    use_color: bool,
}

impl CliOutput {
    /// Create new CLI output utility with TTY detection
    pub fn new() -> Self {
        Self {
            use_color: std::io::stderr().is_terminal(),
        }
    }

    /// Create CLI output utility with explicit color setting
    pub fn with_color(use_color: bool) -> Self {
        Self { use_color }
    }

    fn label(&self, label: &str, message: &str) -> String {
        if !self.use_color {
            return format!("{label} {message}");
        }
        let colored = match label {
            "error:" => label.red().bold().to_string(),
            "warning:" => label.yellow().bold().to_string(),
            "hint:" => label.cyan().to_string(),
            "dry run:" => label.magenta().bold().to_string(),
            _ => label.green().bold().to_string(),
        };
        format!("{colored} {message}")
    }

    pub fn error(&self, message: &str) {
        eprintln!("{}", self.label("error:", message));
    }

    pub fn warning(&self, message: &str) {
        eprintln!("{}", self.label("warning:", message));
    }

    /// Follow-up advice printed under an error
    pub fn hint(&self, message: &str) {
        eprintln!("{}", self.label("hint:", message));
    }

    pub fn success(&self, message: &str) {
        eprintln!("{}", self.label("success:", message));
    }

    pub fn dry_run(&self, message: &str) {
        eprintln!("{}", self.label("dry run:", message));
    }
}

impl Default for CliOutput {
    fn default() -> Self {
        Self::new()
    }
}

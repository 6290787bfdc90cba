//! Colored terminal output for build reports.

use std::path::Path;

use console::{Style, Term};

use crate::commands::build::BuildSummary;

/// Terminal output formatter.
pub(crate) struct Output {
    term: Term,
    green: Style,
    yellow: Style,
    red: Style,
    dim: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            dim: Style::new().dim(),
        }
    }

    /// Print a labelled path, e.g. `Source: /site`.
    pub(crate) fn path(&self, label: &str, path: &Path) {
        let _ = self.term.write_line(&format!(
            "{} {}",
            self.dim.apply_to(format!("{label:>12}:")),
            path.display()
        ));
    }

    /// Print a warning message (yellow).
    pub(crate) fn warning(&self, msg: &str) {
        let _ = self.term.write_line(&self.yellow.apply_to(msg).to_string());
    }

    /// Print an error message (red).
    pub(crate) fn error(&self, msg: &str) {
        let _ = self.term.write_line(&self.red.apply_to(msg).to_string());
    }

    /// Print one document that failed to build.
    pub(crate) fn failure(&self, document: &str, message: &str) {
        let _ = self.term.write_line(&format!(
            "  {} {message}",
            self.red.apply_to(format!("{document}:"))
        ));
    }

    /// Print the counts of a finished build (green).
    pub(crate) fn summary(&self, summary: &BuildSummary, destination: &Path) {
        let line = format!(
            "Built {} documents, {} generated files and {} static files into {}",
            summary.rendered,
            summary.generated,
            summary.copied,
            destination.display()
        );
        let _ = self.term.write_line(&self.green.apply_to(line).to_string());
    }
}

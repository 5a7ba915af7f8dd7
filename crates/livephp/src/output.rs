//! Startup banner and error output on stderr.

use std::fmt::Display;

use console::{Style, Term};

/// Styled stderr writer for the serve banner.
pub(crate) struct Output {
    term: Term,
    url: Style,
    label: Style,
    note: Style,
    error: Style,
}

impl Output {
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            url: Style::new().cyan().bold(),
            label: Style::new().dim(),
            note: Style::new().green(),
            error: Style::new().red(),
        }
    }

    /// Print the address the server listens on.
    pub(crate) fn listening(&self, host: &str, port: u16) {
        let url = format!("http://{host}:{port}");
        self.line(&format!("Serving on {}", self.url.apply_to(url)));
    }

    /// Print one `label: value` line of the banner.
    pub(crate) fn field(&self, label: &str, value: impl Display) {
        self.line(&format!("{} {value}", self.label.apply_to(format!("{label}:"))));
    }

    pub(crate) fn note(&self, msg: &str) {
        self.line(&self.note.apply_to(msg).to_string());
    }

    pub(crate) fn error(&self, err: impl Display) {
        self.line(&self.error.apply_to(format!("Error: {err}")).to_string());
    }

    fn line(&self, text: &str) {
        // Nothing useful to do if stderr is gone
        let _ = self.term.write_line(text);
    }
}

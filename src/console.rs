//! Plain stdout/stderr rendition of the form, used by `--url`

use crate::form::{FormView, InfoPanel, PanelKind};

pub struct ConsoleView {
    url: String,
    last_panel: Option<InfoPanel>,
}

impl ConsoleView {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            last_panel: None,
        }
    }

    /// Whether the last thing shown was a success panel
    pub fn succeeded(&self) -> bool {
        matches!(&self.last_panel, Some(p) if p.kind == PanelKind::Success)
    }
}

impl FormView for ConsoleView {
    fn url_value(&self) -> String {
        self.url.clone()
    }

    fn clear_url(&mut self) {
        self.url.clear();
    }

    fn set_controls_enabled(&mut self, _enabled: bool) {}

    fn set_progress_visible(&mut self, _visible: bool) {}

    fn set_status(&mut self, text: &str) {
        if !text.is_empty() {
            eprintln!("{}", text);
        }
    }

    fn show_info(&mut self, panel: InfoPanel) {
        match panel.kind {
            PanelKind::Success => {
                for line in &panel.lines {
                    println!("{}", line);
                }
            }
            PanelKind::Error => {
                for line in &panel.lines {
                    eprintln!("Error: {}", line);
                }
            }
        }
        self.last_panel = Some(panel);
    }

    fn hide_info(&mut self) {}
}

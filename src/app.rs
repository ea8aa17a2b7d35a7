use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::form::{self, FormController, FormView, InfoPanel, PanelKind, SubmitOutcome};

/// Braille spinner shown while a request is outstanding
pub const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    UrlInput,
    DownloadButton,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popup {
    None,
    Help,
}

pub struct App {
    pub focus: Focus,
    pub popup: Popup,

    // Form elements
    pub url_input: String,
    pub controls_enabled: bool,       // Input and button share one flag
    pub status_text: String,
    pub progress_visible: bool,
    pub info: Option<InfoPanel>,

    pub spinner_frame: usize,
    pub server_url: String,           // Shown in the title line
    pub should_quit: bool,
    pub quit_armed: bool,             // Esc pressed once while busy

    controller: FormController,
    pending: Option<oneshot::Receiver<SubmitOutcome>>,
    notifications: bool,
}

impl App {
    pub fn new(controller: FormController, server_url: impl Into<String>, notifications: bool) -> Self {
        Self {
            focus: Focus::UrlInput,
            popup: Popup::None,

            url_input: String::new(),
            controls_enabled: true,
            status_text: String::new(),
            progress_visible: false,
            info: None,

            spinner_frame: 0,
            server_url: server_url.into(),
            should_quit: false,
            quit_armed: false,

            controller,
            pending: None,
            notifications,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn spinner(&self) -> &'static str {
        SPINNER_FRAMES[self.spinner_frame % SPINNER_FRAMES.len()]
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.popup == Popup::Help {
            if matches!(key.code, KeyCode::Esc | KeyCode::F(1) | KeyCode::Enter | KeyCode::Char('?')) {
                self.popup = Popup::None;
            }
            return;
        }

        match key.code {
            KeyCode::Esc => self.request_quit(),
            KeyCode::F(1) => self.popup = Popup::Help,

            KeyCode::Tab | KeyCode::BackTab => {
                self.focus = match self.focus {
                    Focus::UrlInput => Focus::DownloadButton,
                    Focus::DownloadButton => Focus::UrlInput,
                };
            }

            // Enter in the URL field presses the button
            KeyCode::Enter => self.press_download(),

            _ => match self.focus {
                Focus::UrlInput => self.edit_url(key),
                Focus::DownloadButton => match key.code {
                    KeyCode::Char(' ') => self.press_download(),
                    KeyCode::Char('q') => self.request_quit(),
                    KeyCode::Char('?') => self.popup = Popup::Help,
                    _ => {}
                },
            },
        }
    }

    /// Quit, but ask twice while a request is outstanding
    fn request_quit(&mut self) {
        if self.is_busy() && !self.quit_armed {
            tracing::debug!("Quit requested with a download running");
            self.quit_armed = true;
            return;
        }
        self.should_quit = true;
    }

    /// Bracketed paste lands in the URL field
    pub fn handle_paste(&mut self, text: &str) {
        if !self.controls_enabled || self.popup != Popup::None {
            return;
        }
        self.focus = Focus::UrlInput;
        self.url_input.extend(text.chars().filter(|c| !c.is_control()));
    }

    fn edit_url(&mut self, key: KeyEvent) {
        // Disabled input takes no edits
        if !self.controls_enabled {
            return;
        }

        match key.code {
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.url_input.clear();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.url_input.push(c);
            }
            KeyCode::Backspace => {
                self.url_input.pop();
            }
            _ => {}
        }
    }

    /// Activate the download button
    fn press_download(&mut self) {
        if !self.controls_enabled || self.pending.is_some() {
            return;
        }

        let controller = self.controller.clone();
        if let Some(request) = form::begin(self) {
            tracing::info!("Submitting {}", request.url);
            self.pending = Some(controller.dispatch(request));
        }
    }

    /// Advance the spinner and pick up a finished request
    pub fn tick(&mut self) {
        if self.progress_visible {
            self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAMES.len();
        }

        let Some(rx) = self.pending.as_mut() else {
            return;
        };
        let outcome = match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Closed) => {
                SubmitOutcome::Unreachable("request task ended without a result".to_string())
            }
        };

        self.pending = None;
        self.quit_armed = false;
        form::finish(self, &outcome);

        if self.notifications {
            self.notify_outcome();
        }
    }

    fn notify_outcome(&self) {
        let Some(panel) = &self.info else { return };
        let summary = match panel.kind {
            PanelKind::Success => "Download finished",
            PanelKind::Error => "Download failed",
        };
        if let Err(e) = crate::notify(summary, &panel.lines.join("\n")) {
            tracing::warn!("Notification failed: {}", e);
        }
    }
}

impl FormView for App {
    fn url_value(&self) -> String {
        self.url_input.clone()
    }

    fn clear_url(&mut self) {
        self.url_input.clear();
    }

    fn set_controls_enabled(&mut self, enabled: bool) {
        self.controls_enabled = enabled;
    }

    fn set_progress_visible(&mut self, visible: bool) {
        self.progress_visible = visible;
        self.spinner_frame = 0;
    }

    fn set_status(&mut self, text: &str) {
        self.status_text = text.to_string();
    }

    fn show_info(&mut self, panel: InfoPanel) {
        self.info = Some(panel);
    }

    fn hide_info(&mut self) {
        self.info = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::testing::CannedApi;
    use crate::form::{VideoSummary, EMPTY_URL_MESSAGE, IN_PROGRESS_MESSAGE};
    use std::sync::Arc;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn downloaded() -> SubmitOutcome {
        SubmitOutcome::Downloaded(VideoSummary {
            title: "T".to_string(),
            quality: "Q".to_string(),
            size: "S".to_string(),
        })
    }

    fn app_with(api: &Arc<CannedApi>) -> App {
        App::new(FormController::new(api.clone()), "http://127.0.0.1:5000", false)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
    }

    /// Let the request task run, then let the app collect it
    async fn settle(app: &mut App) {
        for _ in 0..100 {
            tokio::task::yield_now().await;
            app.tick();
            if !app.is_busy() {
                return;
            }
        }
        panic!("request never completed");
    }

    #[tokio::test]
    async fn test_enter_in_url_field_submits_once() {
        let api = CannedApi::new(downloaded());
        let mut app = app_with(&api);
        type_text(&mut app, "https://example.com/v");

        app.handle_key(key(KeyCode::Enter));

        assert!(app.is_busy());
        assert!(!app.controls_enabled);
        assert!(app.progress_visible);
        assert_eq!(app.status_text, IN_PROGRESS_MESSAGE);

        // Button is disabled while the request is outstanding
        app.handle_key(key(KeyCode::Enter));
        settle(&mut app).await;

        assert_eq!(api.request_count(), 1);
        assert!(app.controls_enabled);
        assert!(!app.progress_visible);
        assert!(app.status_text.is_empty());
        assert!(app.url_input.is_empty());
        assert_eq!(app.info.as_ref().map(|p| p.kind), Some(PanelKind::Success));
    }

    #[tokio::test]
    async fn test_button_and_enter_send_the_same_request() {
        let via_enter = CannedApi::new(downloaded());
        let mut app = app_with(&via_enter);
        type_text(&mut app, "  https://example.com/v ");
        app.handle_key(key(KeyCode::Enter));
        settle(&mut app).await;

        let via_button = CannedApi::new(downloaded());
        let mut app = app_with(&via_button);
        type_text(&mut app, "  https://example.com/v ");
        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.focus, Focus::DownloadButton);
        app.handle_key(key(KeyCode::Char(' ')));
        settle(&mut app).await;

        assert_eq!(
            *via_enter.requests.lock().unwrap(),
            *via_button.requests.lock().unwrap()
        );
        assert_eq!(via_button.request_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_field_shows_validation_error() {
        let api = CannedApi::new(downloaded());
        let mut app = app_with(&api);
        type_text(&mut app, "   ");

        app.handle_key(key(KeyCode::Enter));

        assert!(!app.is_busy());
        assert_eq!(api.request_count(), 0);
        assert!(app.controls_enabled);
        assert_eq!(app.info, Some(InfoPanel::error(EMPTY_URL_MESSAGE)));
        assert_eq!(app.url_input, "   ");
    }

    #[tokio::test]
    async fn test_typing_is_ignored_while_busy() {
        let api = CannedApi::new(downloaded());
        let mut app = app_with(&api);
        type_text(&mut app, "u");
        app.handle_key(key(KeyCode::Enter));

        type_text(&mut app, "xyz");
        app.handle_paste("more");
        assert_eq!(app.url_input, "u");

        settle(&mut app).await;
        type_text(&mut app, "ab");
        assert_eq!(app.url_input, "ab");
    }

    #[tokio::test]
    async fn test_rejection_resets_form_and_shows_error() {
        let api = CannedApi::new(SubmitOutcome::Rejected {
            status: 400,
            error: Some("bad link".to_string()),
        });
        let mut app = app_with(&api);
        type_text(&mut app, "https://example.com/v");
        app.handle_key(key(KeyCode::Enter));
        settle(&mut app).await;

        assert_eq!(app.info, Some(InfoPanel::error("bad link")));
        assert!(app.controls_enabled);
        assert!(app.url_input.is_empty());
    }

    #[test]
    fn test_editing_keys() {
        let api = CannedApi::new(downloaded());
        let mut app = app_with(&api);
        type_text(&mut app, "abc");
        app.handle_key(key(KeyCode::Backspace));
        assert_eq!(app.url_input, "ab");

        app.handle_key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
        assert!(app.url_input.is_empty());

        app.handle_paste("https://example.com/\n");
        assert_eq!(app.url_input, "https://example.com/");
    }

    #[test]
    fn test_q_only_quits_from_the_button() {
        let api = CannedApi::new(downloaded());
        let mut app = app_with(&api);
        app.handle_key(key(KeyCode::Char('q')));
        assert!(!app.should_quit);
        assert_eq!(app.url_input, "q");

        app.handle_key(key(KeyCode::Tab));
        app.handle_key(key(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_esc_while_busy_needs_a_second_press() {
        let api = CannedApi::new(downloaded());
        let mut app = app_with(&api);
        type_text(&mut app, "https://example.com/v");
        app.handle_key(key(KeyCode::Enter));
        assert!(app.is_busy());

        app.handle_key(key(KeyCode::Esc));
        assert!(!app.should_quit);
        assert!(app.quit_armed);

        app.handle_key(key(KeyCode::Esc));
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_finished_request_disarms_quit() {
        let api = CannedApi::new(downloaded());
        let mut app = app_with(&api);
        type_text(&mut app, "https://example.com/v");
        app.handle_key(key(KeyCode::Enter));
        app.handle_key(key(KeyCode::Esc));
        assert!(app.quit_armed);

        settle(&mut app).await;
        assert!(!app.quit_armed);
        assert!(!app.should_quit);

        // Idle again, so one press is enough
        app.handle_key(key(KeyCode::Esc));
        assert!(app.should_quit);
    }

    #[test]
    fn test_help_popup_swallows_keys() {
        let api = CannedApi::new(downloaded());
        let mut app = app_with(&api);
        app.handle_key(key(KeyCode::F(1)));
        assert_eq!(app.popup, Popup::Help);

        app.handle_key(key(KeyCode::Char('x')));
        assert!(app.url_input.is_empty());

        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.popup, Popup::None);
        assert!(!app.should_quit);
    }
}

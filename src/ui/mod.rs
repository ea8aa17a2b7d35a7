mod components;

use std::sync::OnceLock;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, Focus, Popup};
use crate::form::PanelKind;
use crate::theme::Theme;
use components::{centered_fixed, centered_rect, key_hint};

static THEME: OnceLock<Theme> = OnceLock::new();

/// Install the theme; only the first call wins
pub fn init_theme(theme: Theme) {
    let _ = THEME.set(theme);
}

fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::default)
}

fn accent() -> Color { theme().accent }
fn success() -> Color { theme().success }
fn danger() -> Color { theme().danger }
fn warning() -> Color { theme().warning }
fn text() -> Color { theme().text }
fn text_dim() -> Color { theme().text_dim }
fn inactive() -> Color { theme().inactive }

pub fn draw(f: &mut Frame, app: &App) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([
            Constraint::Length(1),  // Title line
            Constraint::Length(3),  // URL input
            Constraint::Length(3),  // Download button
            Constraint::Length(1),  // Status text
            Constraint::Length(1),  // Progress indicator
            Constraint::Min(4),     // Info panel
            Constraint::Length(1),  // Footer
        ])
        .split(area);

    draw_title_line(f, app, chunks[0]);
    draw_url_input(f, app, chunks[1]);
    draw_download_button(f, app, chunks[2]);
    draw_status_line(f, app, chunks[3]);
    draw_progress(f, app, chunks[4]);
    draw_info_panel(f, app, chunks[5]);
    draw_footer(f, app, chunks[6]);

    if app.popup == Popup::Help {
        draw_help_popup(f);
    }
}

fn draw_title_line(f: &mut Frame, app: &App, area: Rect) {
    let line = Line::from(vec![
        Span::styled("vidfetch", Style::default().fg(accent()).add_modifier(Modifier::BOLD)),
        Span::styled(" │ ", Style::default().fg(inactive())),
        Span::styled(app.server_url.as_str(), Style::default().fg(text_dim())),
    ]);
    f.render_widget(Paragraph::new(line).alignment(Alignment::Center), area);
}

fn draw_url_input(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::UrlInput && app.controls_enabled;
    let border_color = if focused { accent() } else { inactive() };
    let text_color = if app.controls_enabled { text() } else { text_dim() };

    let content = if app.url_input.is_empty() && !focused {
        Line::styled("Paste a video link", Style::default().fg(text_dim()))
    } else {
        let cursor = if focused { "_" } else { "" };
        // Keep the tail visible when the url is wider than the box
        let visible = area.width.saturating_sub(3) as usize;
        let chars: Vec<char> = app.url_input.chars().collect();
        let start = chars.len().saturating_sub(visible);
        let shown: String = chars[start..].iter().collect();
        Line::from(vec![
            Span::styled(shown, Style::default().fg(text_color)),
            Span::styled(cursor, Style::default().fg(accent())),
        ])
    };

    let input = Paragraph::new(content).block(
        Block::default()
            .title(Span::styled(" Video URL ", Style::default().fg(border_color)))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color)),
    );
    f.render_widget(input, area);
}

fn draw_download_button(f: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::DownloadButton && app.controls_enabled;
    let (label_style, border_color) = if !app.controls_enabled {
        (Style::default().fg(inactive()), inactive())
    } else if focused {
        (
            Style::default().fg(accent()).add_modifier(Modifier::BOLD | Modifier::REVERSED),
            accent(),
        )
    } else {
        (Style::default().fg(text()), inactive())
    };

    let button_area = centered_fixed(16, 3, area);
    let button = Paragraph::new(Line::styled(" Download ", label_style))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border_color)),
        );
    f.render_widget(button, button_area);
}

fn draw_status_line(f: &mut Frame, app: &App, area: Rect) {
    let status = Paragraph::new(Line::styled(app.status_text.as_str(), Style::default().fg(warning())))
        .alignment(Alignment::Center);
    f.render_widget(status, area);
}

fn draw_progress(f: &mut Frame, app: &App, area: Rect) {
    if !app.progress_visible {
        return;
    }
    let line = Line::from(vec![
        Span::styled(app.spinner(), Style::default().fg(accent())),
        Span::styled(" working", Style::default().fg(text_dim())),
    ]);
    f.render_widget(Paragraph::new(line).alignment(Alignment::Center), area);
}

fn draw_info_panel(f: &mut Frame, app: &App, area: Rect) {
    let Some(panel) = &app.info else {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(inactive()));
        f.render_widget(block, area);
        return;
    };

    let (title, color) = match panel.kind {
        PanelKind::Success => (" Done ", success()),
        PanelKind::Error => (" Error ", danger()),
    };

    // Service text is drawn as-is, never interpreted
    let lines: Vec<Line> = panel
        .lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let style = if i == 0 {
                Style::default().fg(color).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(text())
            };
            Line::styled(line.as_str(), style)
        })
        .collect();

    let info = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(Span::styled(title, Style::default().fg(color).add_modifier(Modifier::BOLD)))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        );
    f.render_widget(info, area);
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = Vec::new();
    if app.quit_armed {
        spans.push(Span::styled("Download still running, ", Style::default().fg(warning())));
        spans.extend(key_hint("Esc", "again to quit", accent(), text_dim()));
    } else if app.is_busy() {
        spans.extend(key_hint("Esc", "quit", accent(), text_dim()));
    } else {
        spans.extend(key_hint("Enter", "download", accent(), text_dim()));
        spans.extend(key_hint("Tab", "focus", accent(), text_dim()));
        spans.extend(key_hint("F1", "help", accent(), text_dim()));
        spans.extend(key_hint("Esc", "quit", accent(), text_dim()));
    }
    f.render_widget(Paragraph::new(Line::from(spans)).alignment(Alignment::Center), area);
}

fn draw_help_popup(f: &mut Frame) {
    let area = f.area();
    let popup_area = centered_rect(
        if area.width < 80 { 95 } else { 60 },
        if area.height < 30 { 90 } else { 60 },
        area,
    );

    f.render_widget(Clear, popup_area);

    let section = |title: &'static str| {
        Line::from(Span::styled(title, Style::default().fg(accent()).add_modifier(Modifier::BOLD)))
    };
    let entry = |key: &'static str, what: &'static str| {
        Line::from(vec![
            Span::styled(format!("  {:<10}", key), Style::default().fg(accent())),
            Span::styled(what, Style::default().fg(text())),
        ])
    };

    let help_text = vec![
        section("═══ Form ═══"),
        entry("Enter", "Download the link in the URL field"),
        entry("Tab", "Switch between URL field and button"),
        entry("Space", "Press the button (when focused)"),
        entry("Ctrl-U", "Clear the URL field"),
        Line::from(""),
        section("═══ Service ═══"),
        entry("vidfetch --serve", "Run the download service"),
        entry("vidfetch --url URL", "Download once without the form"),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", Style::default().fg(text_dim())),
            Span::styled("F1", Style::default().fg(accent())),
            Span::styled("/", Style::default().fg(text_dim())),
            Span::styled("Esc", Style::default().fg(accent())),
            Span::styled(" to close", Style::default().fg(text_dim())),
        ]),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .title(Span::styled(" vidfetch Help ", Style::default().fg(accent())))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent())),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(help, popup_area);
}

mod app;
mod client;
mod config;
mod console;
mod error;
mod form;
mod server;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{
        self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEventKind, KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use app::App;
use client::HttpDownloadApi;
use config::AppConfig;
use console::ConsoleView;
use form::FormController;

#[derive(Parser, Debug)]
#[command(name = "vidfetch")]
#[command(version)]
#[command(about = "Paste a video link, get the video. Terminal form plus a yt-dlp download service")]
struct Args {
    /// Run the download service instead of the form
    #[arg(long)]
    serve: bool,

    /// Submit one link without the form and print the result
    #[arg(short, long, value_name = "URL")]
    url: Option<String>,

    /// Download service base url (overrides config)
    #[arg(long, value_name = "BASE_URL")]
    server: Option<String>,

    /// Address for --serve to listen on (overrides config)
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let tui = !args.serve && args.url.is_none();

    init_logging(tui);

    let mut config = AppConfig::load().unwrap_or_default();
    if let Some(server) = args.server {
        config.server_url = server;
    }
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    if args.serve {
        return server::serve(&config).await;
    }

    let api = HttpDownloadApi::new(&config.server_url)?;
    tracing::debug!("Download endpoint: {}", api.endpoint());
    let controller = FormController::new(Arc::new(api));

    if let Some(url) = args.url {
        return submit_once(&controller, &url).await;
    }

    ui::init_theme(theme::Theme::from_config(&config.theme));
    let app = App::new(controller, config.server_url.clone(), config.notifications);
    run_tui(app).await
}

/// Logs go to stderr, except under the form where they'd tear the screen;
/// then they go to `vidfetch.log` in the config directory
fn init_logging(tui: bool) {
    let filter = tracing_subscriber::EnvFilter::from_default_env();

    if tui {
        let file = AppConfig::config_dir()
            .and_then(|dir| Ok(std::fs::File::create(dir.join("vidfetch.log"))?));
        if let Ok(file) = file {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(std::sync::Mutex::new(file)),
                )
                .with(filter)
                .init();
        }
        return;
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

async fn submit_once(controller: &FormController, url: &str) -> Result<()> {
    let mut view = ConsoleView::new(url);
    controller.submit(&mut view).await;

    if !view.succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_tui(mut app: App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableBracketedPaste
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app)).context("Failed to draw")?;

        if event::poll(std::time::Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                        return Ok(());
                    }
                    app.handle_key(key);
                }
                Event::Paste(text) => app.handle_paste(&text),
                _ => {}
            }
        }

        if app.should_quit {
            return Ok(());
        }

        // Give the request task a chance to run, then collect it
        tokio::task::yield_now().await;
        app.tick();
    }
}

pub fn notify(summary: &str, body: &str) -> Result<()> {
    notify_rust::Notification::new()
        .summary(summary)
        .body(body)
        .icon("video-x-generic")
        .show()?;
    Ok(())
}

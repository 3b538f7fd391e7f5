//! Farmcast - 5-day farm weather outlook in the terminal
//!
//! A terminal UI that shows a cached, self-refreshing five-day forecast with
//! field-work advice, falling back to stored or estimated data when the
//! weather provider is unreachable.

use std::fs::{self, File};
use std::io;
use std::panic;
use std::path::Path;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use farmcast::app::{App, AppState};
use farmcast::cli::{Cli, StartupConfig};
use farmcast::data::{FileWeatherStore, MemoryWeatherStore, WeatherClient, WeatherStore};
use farmcast::report::forecast_table;
use farmcast::service::{Tier, WeatherService};
use farmcast::ui;

const DEFAULT_LOG_FILTER: &str = "farmcast=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Logs to stderr; used when the terminal is not taken over by the TUI
fn init_stderr_logging() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Logs to `path`, since anything written to the terminal would corrupt the TUI
fn init_file_logging(path: Option<&Path>) -> io::Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::options().create(true).append(true).open(path)?;

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

/// Sets up a panic hook that restores the terminal before printing the panic message.
/// This ensures the terminal is usable even if the application panics.
fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // Attempt to restore the terminal
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        // Call the original panic hook
        original_hook(panic_info);
    }));
}

fn build_service(startup: &StartupConfig) -> Result<Arc<WeatherService>, Box<dyn std::error::Error>> {
    let client = WeatherClient::new(&startup.weather)?;

    let store: Arc<dyn WeatherStore> = match startup.weather.resolved_store_path() {
        Some(path) => {
            info!(path = %path.display(), "Using weather record store");
            Arc::new(FileWeatherStore::new(path))
        }
        None => {
            warn!("No data directory available, stored weather will not survive restarts");
            Arc::new(MemoryWeatherStore::new())
        }
    };

    Ok(Arc::new(WeatherService::new(
        &startup.weather,
        Arc::new(client),
        store,
    )))
}

/// Prints the forecast once and exits
async fn run_once(startup: &StartupConfig) -> Result<(), Box<dyn std::error::Error>> {
    let service = build_service(startup)?;

    let (records, tier) = if startup.force_refresh {
        (service.force_refresh().await?, Tier::Remote)
    } else {
        let retrieved = service.retrieve().await;
        (retrieved.records, retrieved.tier)
    };
    service.dispose();

    print!("{}", forecast_table(&records, tier));
    Ok(())
}

/// Renders the UI based on the current application state
fn render_ui(frame: &mut ratatui::Frame, app: &App) {
    match &app.state {
        AppState::Loading => {
            render_loading(frame);
        }
        AppState::Forecast => {
            ui::render_forecast(frame, app);
        }
    }

    if app.show_help {
        ui::render_help_overlay(frame);
    }
}

/// Renders a loading message while data is being fetched
fn render_loading(frame: &mut ratatui::Frame) {
    use ratatui::{
        layout::{Alignment, Constraint, Direction, Layout},
        style::{Color, Style},
        widgets::Paragraph,
    };

    let area = frame.area();

    // Center the loading message vertically
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Length(3),
            Constraint::Percentage(45),
        ])
        .split(area);

    let loading_text = Paragraph::new("Loading forecast...")
        .style(Style::default().fg(Color::Green))
        .alignment(Alignment::Center);

    frame.render_widget(loading_text, chunks[1]);
}

async fn run_tui(startup: &StartupConfig) -> Result<(), Box<dyn std::error::Error>> {
    let service = build_service(startup)?;

    // Set up panic hook to restore terminal on crash
    setup_panic_hook();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(Arc::clone(&service));

    // Initial render to show loading state
    terminal.draw(|f| render_ui(f, &app))?;

    app.load_forecast().await;

    // Main event loop
    loop {
        app.drain_updates();

        terminal.draw(|f| render_ui(f, &app))?;

        // Poll for keyboard events with 100ms timeout
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key);
            }
        }

        if app.refresh_requested {
            app.refresh().await;
        }

        if app.should_quit {
            break;
        }
    }

    service.dispose();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    Ok(())
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let startup = StartupConfig::from_cli(&cli)?;

    if startup.once {
        init_stderr_logging();
        run_once(&startup).await
    } else {
        init_file_logging(startup.log_file.as_deref())?;
        run_tui(&startup).await
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

mod app;
mod cli;
mod config;
mod datasources;
mod db;
mod error;
mod logic;
mod models;
mod ui;

use anyhow::Context;
use app::{App, Screen};
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use db::Database;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use ui::screens::{DashboardScreen, HourlyScreen};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(&cli)?;

    match &cli.command {
        Some(Commands::Init) => cli::run_init(),
        Some(Commands::Check) => {
            cli::run_check(&load_config(&cli)?, &open_database(&cli)?).await
        }
        Some(Commands::Report { zone, place, json }) => {
            let config = load_config(&cli)?;
            let db = open_database(&cli)?;
            let target = match place {
                Some(text) => cli::ReportTarget::Place(text.as_str()),
                None => cli::ReportTarget::Zone(zone.as_deref()),
            };
            cli::run_report(&config, &db, target, *json).await
        }
        Some(Commands::ClearCache) => cli::run_clear_cache(&open_database(&cli)?),
        None => run_tui(load_config(&cli)?, open_database(&cli)?).await,
    }
}

/// Logs go to stderr for subcommands and to a file under the data dir for the
/// TUI, where stderr would draw over the screen.
fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_directive()));

    if cli.command.is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
        return Ok(());
    }

    let path = Config::log_path(cli.data_dir.as_ref())?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    if cli.config.is_none() && !Config::exists(None) {
        tracing::info!("No config file found; run `cacaowatch init` to create one");
    }
    Config::load(cli.config.as_ref()).context("Configuration error")
}

fn open_database(cli: &Cli) -> anyhow::Result<Database> {
    let path = Config::db_path(cli.data_dir.as_ref())?;
    Database::open(&path).with_context(|| format!("Failed to open {}", path.display()))
}

async fn run_tui(config: Config, db: Database) -> anyhow::Result<()> {
    let mut app = App::new(config, db)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
) -> anyhow::Result<()> {
    let tick_every = Duration::from_secs(app.config.cache.refresh_interval_secs.max(1));
    let mut last_tick = Instant::now();

    loop {
        app.run_pending().await;
        app.sync_state().await;

        terminal.draw(|f| {
            let area = f.area();

            match app.screen {
                Screen::Dashboard => {
                    let screen =
                        DashboardScreen::new(&app.config.zones, &app.fetch_state, app.report.as_ref())
                            .with_selection(app.zone_list.highlighted, app.selected_key())
                            .with_search(app.search_input.as_deref())
                            .with_status(app.status_message.as_deref());
                    f.render_widget(screen, area);
                }
                Screen::Hourly => {
                    let screen = HourlyScreen::new(&app.fetch_state, &app.hourly, &app.outlook);
                    f.render_widget(screen, area);
                }
            }
        })?;

        // Handle input with timeout so fetch results show up promptly
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(app, key);
                }
            }
        }

        if last_tick.elapsed() >= tick_every {
            app.tick();
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if app.is_searching() {
        handle_search_input(app, key);
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.quit(),
        KeyCode::Esc => app.switch_screen(Screen::Dashboard),
        KeyCode::Char('r') => app.request_refresh(),
        KeyCode::Char(c) if Screen::from_key(c).is_some() => {
            if let Some(screen) = Screen::from_key(c) {
                app.switch_screen(screen);
            }
        }
        _ if app.screen == Screen::Dashboard => handle_dashboard_input(app, key.code),
        _ => {}
    }
}

fn handle_dashboard_input(app: &mut App, code: KeyCode) {
    let count = app.config.zones.len();
    match code {
        KeyCode::Up | KeyCode::Char('k') => app.zone_list.prev(),
        KeyCode::Down | KeyCode::Char('j') => app.zone_list.next(count),
        KeyCode::Enter => app.select_highlighted(),
        KeyCode::Char('x') => app.clear_selection(),
        KeyCode::Char('/') => app.start_search(),
        _ => {}
    }
}

/// The search prompt owns the keyboard until submitted or cancelled.
fn handle_search_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.quit(),
        KeyCode::Esc => app.cancel_search(),
        KeyCode::Enter => app.submit_search(),
        KeyCode::Backspace => app.pop_search_char(),
        KeyCode::Char(c) => app.push_search_char(c),
        _ => {}
    }
}

use std::fs::OpenOptions;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ge_tracker::api::{ApiClient, PriceSource};
use ge_tracker::app::App;
use ge_tracker::config::{Config, UI_TICK_MS};
use ge_tracker::controller::Route;
use ge_tracker::error::Result;
use ge_tracker::state::PinnedItems;
use ge_tracker::storage::sqlite::SqliteStore;
use ge_tracker::storage::KeyValueStore;
use ge_tracker::ui;

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    // The terminal UI owns stdout, so logs go to a file.
    let log_file = match OpenOptions::new().create(true).append(true).open(&cfg.log_file) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Cannot open log file {}: {e}", cfg.log_file);
            std::process::exit(1);
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        eprintln!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Pinned item storage ---
    let store = Arc::new(SqliteStore::open(&cfg.db_path).await?);
    let pinned = PinnedItems::load(Arc::clone(&store)).await?;
    info!("Loaded {} pinned items", pinned.len());

    // --- Price API ---
    let api = Arc::new(ApiClient::new(&cfg)?);
    info!("Price API at {}", api.base_url());

    // `ge-tracker <item_id>` opens straight into the detail view
    let route = match std::env::args().nth(1) {
        Some(id) => Route::Detail(Some(id)),
        None => Route::List,
    };

    let mut app = App::new(api, pinned, cfg.page_limit, route);

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut app).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    drop(app);
    store.close().await;
    info!("Shut down cleanly");
    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop<A: PriceSource, S: KeyValueStore>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App<A, S>,
) -> Result<()> {
    let tick = Duration::from_millis(UI_TICK_MS);

    loop {
        terminal.draw(|f| ui::render(f, app))?;

        if event::poll(tick)? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key).await;
            }
        }

        app.tick();

        if app.should_quit {
            return Ok(());
        }
    }
}

//! Terminal dashboard that fires queries at a replica set and compares how
//! each dispatch strategy fares against the same replicas.

mod app;
mod dispatch;
mod env;
mod ui;

use std::{fs::File, sync::Mutex, time::Duration};

use app::{App, AppEvent};
use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use dispatch::spawn_call;
use env::build_client_from_env;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const TICK: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let (client, settings) = build_client_from_env()?;
    if let Some(path) = &settings.log_file {
        init_file_logging(path)?;
    }
    tracing::info!(
        replicas = settings.replicas.len(),
        strategy = %settings.strategy,
        timeout_ms = settings.timeout.as_millis() as u64,
        "dashboard starting"
    );

    let mut app = App::new(client, settings);
    let mut terminal = ratatui::init();
    let result = run(&mut terminal, &mut app).await;
    ratatui::restore();
    result
}

/// The terminal belongs to the UI, so tracing output goes to a file.
fn init_file_logging(path: &str) -> Result<()> {
    let file = File::create(path)?;
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "replica_dispatch=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

async fn run(terminal: &mut ratatui::DefaultTerminal, app: &mut App) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    loop {
        while let Ok(AppEvent::Finished(done)) = rx.try_recv() {
            app.finish(done);
        }

        while app.next_batch_call() {
            spawn_call(app, tx.clone(), true);
        }

        terminal.draw(|frame| ui::draw_ui(frame, app))?;

        if !event::poll(TICK)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press && !on_key(app, key.code, &tx) {
                return Ok(());
            }
        }
    }
}

/// Applies one key press. Returns `false` when the dashboard should exit.
fn on_key(app: &mut App, code: KeyCode, tx: &mpsc::UnboundedSender<AppEvent>) -> bool {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => return false,
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Tab => app.cycle_mode(),
        KeyCode::Enter | KeyCode::Char('r') => spawn_call(app, tx.clone(), false),
        KeyCode::Char('b') => app.toggle_batch(),
        KeyCode::Char('+') | KeyCode::Char('=') => app.adjust_timeout(true),
        KeyCode::Char('-') => app.adjust_timeout(false),
        KeyCode::Char(']') => app.adjust_batch_size(true),
        KeyCode::Char('[') => app.adjust_batch_size(false),
        KeyCode::Char('c') => app.clear_tallies(),
        _ => {}
    }
    true
}

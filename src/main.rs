mod app;
mod clock;
mod config;
mod error;
mod hub;
mod puzzle;
mod story;
mod ui;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::File;
use std::io;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

use app::App;
use config::{LogSettings, Settings, Variant};
use hub::HubSession;
use story::StoryGame;

/// Upper bound on how long the loop waits for a key before redrawing.
const FRAME: Duration = Duration::from_millis(250);

fn init_logging(settings: &LogSettings) -> Result<()> {
    let Some(path) = &settings.file else {
        return Ok(());
    };
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn build_app(settings: &Settings, variant: Variant) -> Result<App> {
    let content = settings.content_dir.as_deref();
    match variant {
        Variant::Hub => {
            let rooms = match content {
                Some(dir) => puzzle::load_floor(&dir.join("hub"))?,
                None => puzzle::builtin_rooms()?,
            };
            let session = HubSession::new(rooms, settings.hub.clone())?;
            Ok(App::hub(session))
        }
        Variant::Story => {
            let script = match content {
                Some(dir) => story::load_script(&dir.join("story.toml"))?,
                None => story::builtin_script()?,
            };
            Ok(App::story(StoryGame::new(script, settings.story.clone())))
        }
    }
}

fn main() -> Result<()> {
    let settings = config::resolve()?;
    let variant = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => settings.variant,
    };
    init_logging(&settings.logging)?;
    info!(?variant, "starting");

    let mut app = build_app(&settings, variant)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    info!("exiting");
    result
}

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    while app.running {
        app.poll(Instant::now());
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(FRAME)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key, Instant::now());
                }
            }
        }
    }
    Ok(())
}

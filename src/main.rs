use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::warn;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
use tokio::{
    sync::{broadcast, mpsc},
    time,
};

use boxbreathe::{
    session::state::{MAX_PHASE_SECS, MIN_PHASE_SECS},
    ui::App,
    ChimeEngine, NoopWakeLock, Preferences, SessionClock, SessionConfig, SessionEvent,
    SessionSnapshot, SettingsStore,
};

const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Guided box breathing in the terminal: inhale, hold, exhale, wait.
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Cli {
    /// total session length in minutes; the session finishes at the next
    /// cycle boundary after the limit, never mid-phase
    #[clap(short = 'm', long)]
    minutes: Option<u32>,

    /// seconds per phase (3-6)
    #[clap(short = 'p', long)]
    phase_secs: Option<u32>,

    /// start with the phase-change chime muted
    #[clap(long)]
    no_sound: bool,

    /// settings file location override
    #[clap(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = cli
        .config
        .clone()
        .or_else(SettingsStore::default_path)
        .context("could not determine a settings path")?;
    init_logging(&settings_path)?;

    let settings = SettingsStore::new(settings_path)?;
    let prefs = settings.preferences();

    let clock = SessionClock::new(Arc::new(ChimeEngine::new()), Arc::new(NoopWakeLock));
    clock
        .set_phase_secs(cli.phase_secs.unwrap_or(prefs.phase_secs))
        .await;
    clock.set_time_limit(cli.minutes).await;
    clock
        .set_sound_enabled(if cli.no_sound {
            false
        } else {
            prefs.sound_enabled
        })
        .await;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &clock, &settings).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// The TUI owns the terminal, so logs go to a file next to the settings
/// instead of stderr. Reads RUST_LOG, defaults to info.
fn init_logging(settings_path: &Path) -> Result<()> {
    let dir = settings_path.parent().context("settings path has no parent")?;
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let log_file = fs::File::create(dir.join("boxbreathe.log"))?;

    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();
    Ok(())
}

enum InputEvent {
    Key(KeyEvent),
    Resize,
}

/// Crossterm's event reader blocks, so it gets its own thread feeding a
/// channel the async loop can select on.
fn spawn_input_reader() -> mpsc::UnboundedReceiver<InputEvent> {
    let (tx, rx) = mpsc::unbounded_channel();

    thread::spawn(move || loop {
        let evt = match event::read() {
            Ok(Event::Key(key)) => Some(InputEvent::Key(key)),
            Ok(Event::Resize(_, _)) => Some(InputEvent::Resize),
            Ok(_) => None,
            Err(_) => break,
        };

        if let Some(evt) = evt {
            if tx.send(evt).is_err() {
                break;
            }
        }
    });

    rx
}

fn config_from(snapshot: &SessionSnapshot) -> SessionConfig {
    SessionConfig {
        phase_secs: snapshot.phase_secs,
        time_limit_mins: snapshot.time_limit_mins,
        sound_enabled: snapshot.sound_enabled,
    }
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    clock: &SessionClock,
    settings: &SettingsStore,
) -> Result<()> {
    let mut events = clock.subscribe();
    let mut input = spawn_input_reader();
    let mut frames = time::interval(FRAME_INTERVAL);
    let mut app = App::new(clock.snapshot().await);

    loop {
        terminal.draw(|f| app.draw(f))?;

        tokio::select! {
            event = events.recv() => match event {
                Ok(SessionEvent::Tick(snapshot)) => app.on_snapshot(snapshot),
                // chimes are the clock's business; the tick snapshot already
                // carries everything the screen needs
                Ok(SessionEvent::PhaseChange(_)) | Ok(SessionEvent::Complete { .. }) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    app.on_snapshot(clock.snapshot().await);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            Some(event) = input.recv() => match event {
                InputEvent::Resize => {}
                InputEvent::Key(key) => {
                    if !handle_key(key, clock, settings, &app).await? {
                        break;
                    }
                }
            },
            // the indicator only moves while the clock runs; stop sampling
            // otherwise
            _ = frames.tick(), if app.is_running() => {
                app.refresh_sample(Instant::now());
            }
        }
    }

    Ok(())
}

/// Returns false when the app should exit.
async fn handle_key(
    key: KeyEvent,
    clock: &SessionClock,
    settings: &SettingsStore,
    app: &App,
) -> Result<bool> {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => return Ok(false),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return Ok(false);
        }
        KeyCode::Char(' ') => {
            if app.is_running() {
                clock.pause().await;
            } else {
                let snapshot = clock.snapshot().await;
                if let Err(e) = clock.start(config_from(&snapshot)).await {
                    warn!("start rejected: {e}");
                }
            }
        }
        KeyCode::Char('r') => clock.reset().await,
        KeyCode::Char('s') => {
            let enabled = !clock.snapshot().await.sound_enabled;
            clock.set_sound_enabled(enabled).await;
            persist_prefs(clock, settings).await;
        }
        KeyCode::Up => {
            let current = clock.snapshot().await.phase_secs;
            clock.set_phase_secs((current + 1).min(MAX_PHASE_SECS)).await;
            persist_prefs(clock, settings).await;
        }
        KeyCode::Down => {
            let current = clock.snapshot().await.phase_secs;
            clock
                .set_phase_secs(current.saturating_sub(1).max(MIN_PHASE_SECS))
                .await;
            persist_prefs(clock, settings).await;
        }
        KeyCode::Char(digit @ '0'..='9') => {
            let mins = digit.to_digit(10).unwrap_or(0);
            clock
                .set_time_limit(if mins == 0 { None } else { Some(mins) })
                .await;
        }
        _ => {}
    }
    Ok(true)
}

async fn persist_prefs(clock: &SessionClock, settings: &SettingsStore) {
    let snapshot = clock.snapshot().await;
    let prefs = Preferences {
        phase_secs: snapshot.phase_secs,
        sound_enabled: snapshot.sound_enabled,
    };
    if let Err(e) = settings.update(prefs) {
        warn!("failed to persist settings: {e}");
    }
}

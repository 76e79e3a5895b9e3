mod app;
mod input;
mod ui;

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::info;
use tracing_subscriber::EnvFilter;

use app::AppState;
use loglens::config::{Config, config_dir};
use loglens::keywords::KeywordManager;
use loglens::sources::{LoadEvent, LogSource, file::FileSource};
use loglens::templates::TemplateStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: loglens <file_path>");
        std::process::exit(1);
    }
    let path = PathBuf::from(&args[1]);

    let dir = config_dir().context("no home or config directory")?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    init_logging(&dir);

    // Terminal rows are the unit of scrolling, and panes may be short
    let config = Config {
        line_height: 1,
        min_visible_lines: 1,
        ..Config::from_env()
    };
    info!(path = %path.display(), ?config, "starting");

    let templates = TemplateStore::open(&dir);
    let keywords = KeywordManager::open(&dir);
    let mut state = AppState::new(config.clone(), path.clone(), templates, keywords);

    // Load on a worker; the UI stays live while it runs
    let source = FileSource::new(path, config.chunk_size);
    let mut load_rx = source.stream().await;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal on panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
        original_hook(panic);
    }));

    let result = run_event_loop(&mut terminal, &mut state, &mut load_rx).await;

    source.cancel();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableMouseCapture, LeaveAlternateScreen)?;

    result
}

/// Log to `<config dir>/loglens.log`; the terminal belongs to the UI.
/// Filtered by `LOGLENS_LOG`, defaulting to warnings.
fn init_logging(dir: &Path) {
    let Ok(file) = File::create(dir.join("loglens.log")) else {
        return;
    };
    let filter = EnvFilter::try_from_env("LOGLENS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
}

async fn run_event_loop<'a>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut AppState<'a>,
    load_rx: &mut tokio::sync::mpsc::Receiver<LoadEvent>,
) -> Result<()> {
    loop {
        // Fire any due highlight or input debounce before drawing
        state.tick(Instant::now());

        let page_size = terminal.size()?.height.saturating_sub(ui::CHROME_HEIGHT);
        state.resize_view(u32::from(page_size));

        terminal.draw(|frame| {
            ui::draw(frame, state);
        })?;

        tokio::select! {
            // Check for terminal input events
            _ = tokio::time::sleep(Duration::from_millis(16)) => {
                if event::poll(Duration::ZERO)? {
                    match event::read()? {
                        Event::Key(key) => {
                            // Only handle key press events (not release)
                            if key.kind == KeyEventKind::Press {
                                input::handle_key(state, key, page_size as usize);
                            }
                        }
                        Event::Mouse(mouse) => input::handle_mouse(state, mouse),
                        _ => {}
                    }
                }
            }

            // Loader progress and the finished document
            Some(event) = load_rx.recv() => {
                state.handle_load_event(event);
            }
        }

        if state.should_quit {
            break;
        }
    }

    Ok(())
}

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::Event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sensorwatch::{
    events, ui, App, ConnectionDetails, Overrides, PayloadDecoder, Pipeline, PipelineConfig,
    SeriesWindow, Settings, TelemetrySource,
};

#[derive(Parser, Debug)]
#[command(name = "sensorwatch")]
#[command(about = "Terminal dashboard charting a live MQTT sensor topic")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Broker URI (ws://, wss://, mqtt:// or mqtts://)
    #[arg(short, long)]
    broker: Option<String>,

    /// Topic to subscribe to
    #[arg(short, long)]
    topic: Option<String>,

    /// Payload field to chart (e.g. "3T0")
    #[arg(short, long)]
    field: Option<String>,

    /// Number of readings kept in the window
    #[arg(short, long)]
    window: Option<usize>,

    /// MQTT client id
    #[arg(long)]
    client_id: Option<String>,

    /// Log file (the terminal is taken by the UI)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print the merged configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = Overrides {
        broker_uri: args.broker,
        topic: args.topic,
        field: args.field,
        window_size: args.window,
        client_id: args.client_id,
        log_file: args.log_file,
    };
    let settings = Settings::load(args.config.as_deref(), overrides)?;
    let config = settings.validate()?;

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    init_logging(&config.log_file)?;

    // The MQTT event loop runs on the runtime; the TUI keeps the main thread
    let rt = tokio::runtime::Runtime::new()?;
    let _guard = rt.enter();

    let source = open_source(&config)?;
    let pipeline = Pipeline::new(
        source,
        PayloadDecoder::new(config.field.clone()),
        SeriesWindow::new(config.window_size)?,
    );
    let details = ConnectionDetails {
        broker: config.broker_uri.clone(),
        topic: config.topic.clone(),
        field: config.field.clone(),
    };

    let reopen_config = config.clone();
    let app = App::new(pipeline, details).with_reopen(Box::new(
        move || -> Result<Box<dyn TelemetrySource>> { open_source(&reopen_config) },
    ));

    let result = run_tui(app, config.refresh);
    info!("shutting down");
    result
}

/// Send tracing output to `path`, filtered by `RUST_LOG` (default: info).
fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create log file {}", path.display()))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .init();
    Ok(())
}

fn open_source(config: &PipelineConfig) -> Result<Box<dyn TelemetrySource>> {
    let source = config.mqtt_builder().open()?;
    Ok(Box::new(source))
}

/// Run the TUI until the user quits
fn run_tui(mut app: App, refresh_interval: Duration) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    let result = run_app(&mut terminal, &mut app, refresh_interval);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    refresh_interval: Duration,
) -> Result<()> {
    let mut last_refresh = Instant::now();

    while app.running {
        terminal.draw(|frame| ui::render(frame, app))?;

        let timeout = refresh_interval.saturating_sub(last_refresh.elapsed());
        if let Some(event) = events::poll_event(timeout)? {
            match event {
                Event::Key(key) => events::handle_key_event(app, key),
                Event::Resize(_, _) => {
                    // Terminal will redraw on next iteration
                }
                _ => {}
            }
        }

        if last_refresh.elapsed() >= refresh_interval {
            app.tick();
            last_refresh = Instant::now();
        }
    }

    Ok(())
}

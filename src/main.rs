//! FLOORWARS - a falling-block duel
//!
//! Every line you clear raises your opponent's floor.

mod bag;
mod board;
mod collision;
mod controller;
mod error;
mod floor_raise;
mod game;
mod geometry;
mod input;
mod mirror;
mod mode;
mod multiplayer;
mod net;
mod piece;
mod protocol;
mod results;
mod scheduler;
mod score;
mod settings;
mod snapshot;
mod tetromino;
mod ui;

use anyhow::Context;
use clap::Parser;
use controller::{Config, Controller, Event};
use crossterm::{
    event::{self, Event as TermEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use floor_raise::Difficulty;
use input::{Command, KeyBindings};
use mode::PlayMode;
use net::{Connection, NetEvent};
use ratatui::{backend::CrosstermBackend, Terminal};
use results::{FileResultSink, ResultSink};
use settings::Settings;
use std::{
    io::{self, stdout},
    time::{Duration, Instant},
};

/// Time given to the network task to flush goodbye messages
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

#[derive(Debug, Parser)]
#[command(name = "floorwars", version, about = "Falling-block duel over a relay")]
struct Cli {
    /// Relay address (host:port)
    #[arg(long)]
    relay: Option<String>,

    /// Name shown to opponents
    #[arg(long)]
    name: Option<String>,

    /// Versus difficulty, 1 (4 lines per raise) to 4 (1 line per raise)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
    difficulty: Option<u8>,

    /// Start in versus mode instead of solo
    #[arg(long)]
    versus: bool,

    /// Fixed piece seed
    #[arg(long)]
    seed: Option<u64>,

    /// Write the effective settings back to the config file
    #[arg(long)]
    save_settings: bool,
}

/// Get the floorwars temp directory, creating it if needed
fn floorwars_temp_dir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join("floorwars");
    let _ = std::fs::create_dir_all(&dir);
    dir
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Generate session ID for this instance
    let session_id: u32 = rand::random();
    let log_dir = floorwars_temp_dir();
    let log_file = format!("{:08x}.log", session_id);

    // Setup tracing to log file
    let file_appender = tracing_appender::rolling::never(&log_dir, &log_file);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("floorwars=debug".parse().context("invalid log directive")?),
        )
        .with_ansi(false)
        .init();

    tracing::info!(
        "FLOORWARS starting up, session={:08x}, log={}",
        session_id,
        log_dir.join(&log_file).display()
    );

    let mut settings = Settings::load();
    if let Some(relay) = cli.relay {
        settings.versus.relay_addr = relay;
    }
    if let Some(name) = cli.name {
        settings.versus.player_name = name;
    }
    if let Some(level) = cli.difficulty {
        settings.versus.difficulty = Difficulty::new(level).context("difficulty out of range")?;
    }
    settings.validate().context("invalid settings")?;
    if cli.save_settings {
        settings.save().context("could not save settings")?;
    }

    let sink = FileResultSink::open_default().unwrap_or_else(|e| {
        tracing::warn!("Results will go to the temp dir: {}", e);
        FileResultSink::new(log_dir.join("results"))
    });
    tracing::info!("Results go to {}", sink.dir().display());

    // Create async runtime for networking
    let runtime = tokio::runtime::Runtime::new().context("failed to create async runtime")?;
    let connection = net::spawn_connect(runtime.handle(), settings.versus.relay_addr.clone());

    let config = Config {
        settings,
        mode: if cli.versus { PlayMode::Versus } else { PlayMode::Single },
        seed: cli.seed,
    };

    // Setup terminal
    enable_raw_mode()?;
    execute!(stdout(), EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_app(&mut terminal, config, sink, &connection);

    // Restore terminal
    disable_raw_mode()?;
    execute!(stdout(), LeaveAlternateScreen)?;

    connection.disconnect();
    std::thread::sleep(SHUTDOWN_GRACE);

    let (lines, level) = result.context("terminal error")?;
    println!("\nThanks for playing FLOORWARS!");
    println!("Level: {} | Lines: {}", level, lines);
    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    config: Config,
    sink: impl ResultSink,
    connection: &Connection,
) -> io::Result<(u32, u32)> {
    let keys = KeyBindings::from_settings(&config.settings.keys);
    let mut controller = Controller::init(config, sink, Instant::now());

    loop {
        let now = Instant::now();
        for event in controller.due_events(now) {
            controller.on_event(event, now);
        }

        for net_event in connection.poll_events() {
            let event = match net_event {
                NetEvent::Connected => Event::Connected,
                NetEvent::Message(msg) => Event::Net(msg),
                NetEvent::Disconnected { reason } => {
                    tracing::warn!("Relay: {}", reason);
                    Event::Disconnected
                }
            };
            controller.on_event(event, Instant::now());
        }

        flush(&mut controller, connection);
        if !controller.is_running() {
            break;
        }

        terminal.draw(|frame| ui::render(frame, &controller))?;

        if event::poll(controller.time_until_next(Instant::now()))? {
            if let TermEvent::Key(key) = event::read()? {
                let event = match keys.command_for(key) {
                    Some(Command::Quit) => Some(Event::Teardown),
                    Some(command) => Some(Event::Input(command)),
                    None => None,
                };
                if let Some(event) = event {
                    controller.on_event(event, Instant::now());
                }
            }
        }
    }

    flush(&mut controller, connection);
    Ok((controller.game.progress.lines, controller.game.progress.level))
}

/// Hand queued relay messages to the network task
fn flush<S: ResultSink>(controller: &mut Controller<S>, connection: &Connection) {
    for msg in controller.drain_outgoing() {
        if !controller.is_online() {
            tracing::debug!("Offline, dropping {}", msg.name());
            continue;
        }
        if let Err(e) = connection.send(msg) {
            tracing::debug!("Dropping message: {}", e);
            break;
        }
    }
}

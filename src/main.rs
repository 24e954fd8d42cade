use anyhow::{Context, Result};
use autoshutdown::host::sim::SimulatedHost;
use autoshutdown::{
    AutoShutdown, AutoShutdownConfig, CommandSource, Host, Player, PlayerKind, SystemProcess,
    TickPhase, TimerService,
};
use clap::Parser;
use crossbeam::channel::{self, Receiver, Sender};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "autoshutdown")]
#[command(about = "Scheduled shutdowns, shutdown votes and a hang watchdog for game servers")]
#[command(version)]
#[command(long_about = "Runs the auto shutdown components against a simulated server loop. \
Type console commands on stdin: `shutdown`, `shutdown yes|no`, `join [name]`, `leave [name]`, \
`freeze`, `lag MS` and `quit`.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "autoshutdown.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to a daily rotated file in this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Real players connected at startup
    #[arg(long, default_value_t = 0)]
    players: usize,

    /// Automated players connected at startup
    #[arg(long, default_value_t = 0)]
    bots: usize,

    /// Target duration of one simulated server tick
    #[arg(long, value_name = "MS", default_value_t = 50)]
    tick_ms: u64,
}

/// Input for the simulated server loop
#[derive(Debug)]
enum ConsoleEvent {
    Line(String),
    Signal(&'static str),
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let _log_guard = init_logging(&args)?;

    info!("Starting autoshutdown v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match AutoShutdownConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("autoshutdown-timer")
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let host = Arc::new(SimulatedHost::new());
    for i in 0..args.players {
        host.join(format!("player{}", i + 1), PlayerKind::Real);
    }
    for i in 0..args.bots {
        host.join(format!("bot{}", i + 1), PlayerKind::Automated);
    }

    let mut context = AutoShutdown::new(
        config,
        Arc::clone(&host) as Arc<dyn Host>,
        Arc::new(SystemProcess),
        TimerService::new(runtime.handle().clone()),
    );
    context.start().map_err(|e| {
        error!("Failed to start auto shutdown: {}", e);
        e
    })?;

    let (events_tx, events_rx) = channel::unbounded();
    spawn_console_reader(events_tx.clone())?;
    runtime.spawn(forward_signals(events_tx));

    run_server_loop(&mut context, &host, &events_rx, Duration::from_millis(args.tick_ms));

    context.stop();
    runtime.shutdown_timeout(Duration::from_secs(1));

    info!(
        "Simulated server stopped after {} ticks (reason: {:?})",
        host.tick_count(),
        context.shutdown_reason()
    );
    Ok(())
}

/// Drives the simulated server until something halts it
fn run_server_loop(
    context: &mut AutoShutdown,
    host: &Arc<SimulatedHost>,
    events: &Receiver<ConsoleEvent>,
    tick: Duration,
) {
    let mut frozen = false;
    let mut lag = Duration::ZERO;

    info!("Simulated server running at {:?} per tick", tick);

    while !host.is_halted() {
        let started = Instant::now();

        while let Ok(event) = events.try_recv() {
            match event {
                ConsoleEvent::Line(line) => {
                    handle_console_line(context, host, &line, &mut frozen, &mut lag)
                }
                ConsoleEvent::Signal(name) => {
                    info!("Received {} signal", name);
                    host.halt(false);
                }
            }
        }

        if host.is_halted() {
            break;
        }

        if frozen {
            thread::sleep(tick);
            continue;
        }

        context.on_server_tick(TickPhase::Start);
        if !lag.is_zero() {
            thread::sleep(lag);
        }
        context.on_server_tick(TickPhase::End);

        let elapsed = started.elapsed();
        host.record_tick(elapsed.as_secs_f64() * 1000.0);
        if let Some(remaining) = tick.checked_sub(elapsed) {
            thread::sleep(remaining);
        }
    }
}

fn handle_console_line(
    context: &mut AutoShutdown,
    host: &Arc<SimulatedHost>,
    line: &str,
    frozen: &mut bool,
    lag: &mut Duration,
) {
    let line = line.trim();
    let (name, arg) = line.split_once(' ').unwrap_or((line, ""));
    let arg = arg.trim();

    match name {
        "" => {}
        "join" => {
            let player_name = if arg.is_empty() {
                format!("player{}", host.roster().len() + 1)
            } else {
                arg.to_string()
            };
            host.join(player_name, PlayerKind::Real);
        }
        "leave" => {
            let roster = host.roster();
            let leaving = if arg.is_empty() {
                roster.last()
            } else {
                roster.iter().find(|p| p.name() == arg)
            };
            match leaving {
                Some(player) => {
                    host.leave(player.id());
                }
                None => warn!("No such player: {}", arg),
            }
        }
        "freeze" => {
            warn!("Server loop frozen; ticks stop advancing");
            *frozen = true;
        }
        "lag" => match arg.parse::<u64>() {
            Ok(ms) => {
                *lag = Duration::from_millis(ms);
                info!("Adding {} ms of work to every tick", ms);
            }
            Err(_) => warn!("Usage: lag MS"),
        },
        "quit" | "stop" => {
            info!("Stopping the server from the console");
            host.halt(false);
        }
        _ => {
            let source = host
                .roster()
                .into_iter()
                .find(|p| p.is_real())
                .map(|p| CommandSource::Player(p as Arc<dyn Player>))
                .unwrap_or(CommandSource::Console);

            match context.execute_command(&source, line) {
                Some(Ok(outcome)) => info!("{} -> {:?}", source.name(), outcome),
                Some(Err(e)) => info!("{} -> rejected: {}", source.name(), e),
                None => warn!("Unknown command: {}", name),
            }
        }
    }
}

fn spawn_console_reader(events: Sender<ConsoleEvent>) -> Result<()> {
    thread::Builder::new()
        .name("console".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if events.send(ConsoleEvent::Line(line)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to read console input: {}", e);
                        break;
                    }
                }
            }
        })
        .context("Failed to start console reader")?;
    Ok(())
}

/// Turns SIGINT and SIGTERM into halt requests for the server loop
async fn forward_signals(events: Sender<ConsoleEvent>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(terminate) => terminate,
            Err(e) => {
                error!("Failed to register SIGTERM handler: {}", e);
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = events.send(ConsoleEvent::Signal("SIGINT"));
                }
                return;
            }
        };

        let name = tokio::select! {
            _ = terminate.recv() => "SIGTERM",
            _ = tokio::signal::ctrl_c() => "SIGINT",
        };
        let _ = events.send(ConsoleEvent::Signal(name));
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = events.send(ConsoleEvent::Signal("SIGINT"));
        }
    }
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("autoshutdown={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match &args.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "autoshutdown.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Autoshutdown Configuration File");
    println!("# This is the default configuration with all available options");
    println!();
    println!("{}", AutoShutdownConfig::default().to_toml()?);
    Ok(())
}

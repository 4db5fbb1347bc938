use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use duofern_core::events::{DuofernEvent, DuofernObserver, LogLevel};
use duofern_core::session::{DuofernSession, SessionConfig};
use duofern_core::Command;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "duofern",
    author,
    version,
    about = "DuoFern transceiver tool (Pure Rust)",
    long_about = "Drives a Rademacher DuoFern USB stick: initializes the transceiver, \
                  monitors device status and sends shutter/blind commands."
)]
struct Args {
    /// Serial port of the USB stick (e.g. /dev/ttyUSB0)
    #[arg(long)]
    port: Option<String>,

    /// Dongle id: 6F followed by four hex digits
    #[arg(long)]
    code: Option<String>,

    /// Paired device code, repeatable
    #[arg(long = "device")]
    devices: Vec<String>,

    /// TOML configuration file; command-line flags override its values
    #[arg(long)]
    config: Option<String>,

    /// One-shot command to queue before the session starts
    /// (up, down, stop, toggle, status, position, slat-position, pair, unpair)
    #[arg(long)]
    command: Option<String>,

    /// Target device code for --command
    #[arg(long)]
    target: Option<String>,

    /// Percent value for position-style commands
    #[arg(long)]
    value: Option<u8>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// CLI observer that prints protocol activity to stderr.
struct CliObserver {
    verbose: bool,
}

impl DuofernObserver for CliObserver {
    fn on_event(&self, event: &DuofernEvent) {
        match event {
            DuofernEvent::Opened => eprintln!("✓ Port opened"),
            DuofernEvent::Initialized => eprintln!("✓ Transceiver initialized"),
            DuofernEvent::Closed => eprintln!("✗ Session closed"),
            DuofernEvent::StateChanged { from, to } => {
                if self.verbose {
                    eprintln!("→ State: {from} → {to}");
                }
            }
            DuofernEvent::FrameTx { hex } => {
                if self.verbose {
                    eprintln!("→ TX {hex}");
                }
            }
            DuofernEvent::FrameRx { hex } => {
                if self.verbose {
                    eprintln!("← RX {hex}");
                }
            }
            DuofernEvent::Paired { device } => {
                eprintln!("✓ Paired {device} ({})", device.class());
            }
            DuofernEvent::Unpaired { device } => {
                eprintln!("✗ Unpaired {device}");
            }
            DuofernEvent::Message { frame } => {
                if self.verbose {
                    eprintln!("← Message {frame}");
                }
            }
            DuofernEvent::Status { device, fields } => {
                let rendered: Vec<String> =
                    fields.iter().map(|(k, v)| format!("{k}={v}")).collect();
                eprintln!("● {device}: {}", rendered.join(" "));
            }
            DuofernEvent::Log { level, message } => match level {
                LogLevel::Error => eprintln!("ERROR: {message}"),
                LogLevel::Warn => eprintln!("WARN: {message}"),
                LogLevel::Info if self.verbose => eprintln!("INFO: {message}"),
                LogLevel::Debug if self.verbose => eprintln!("DEBUG: {message}"),
                _ => {}
            },
            DuofernEvent::Error { kind, detail } => {
                eprintln!("✗ Error [{kind}]: {detail}");
            }
        }
    }
}

fn parse_command(name: &str, value: Option<u8>) -> Result<Command> {
    let percent = value.context("this command needs --value <0-100>");
    let command = match name {
        "up" => Command::Up,
        "down" => Command::Down,
        "stop" => Command::Stop,
        "toggle" => Command::Toggle,
        "status" => Command::StatusRequest,
        "position" => Command::Position(percent?),
        "slat-position" => Command::SlatPosition(percent?),
        "pair" => Command::RemotePair,
        "unpair" => Command::RemoteUnpair,
        other => bail!("unknown command {other:?}"),
    };
    Ok(command)
}

fn build_config(args: &Args) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load_from_file(path)
            .with_context(|| format!("loading config from {path}"))?,
        None => SessionConfig::default(),
    };
    if let Some(port) = &args.port {
        config.port = port.clone();
    }
    if let Some(code) = &args.code {
        config.code = code.clone();
    }
    if !args.devices.is_empty() {
        config.devices = args.devices.clone();
    }
    Ok(config)
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(args) {
        error!("session failed: {e:#}");
        eprintln!("✗ FAILED: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = build_config(&args)?;
    info!(port = %config.port, "duofern starting");

    let observer = Arc::new(CliObserver {
        verbose: args.verbose,
    });
    let mut session = DuofernSession::with_observer(config, observer)?;

    if let Some(name) = &args.command {
        let command = parse_command(name, args.value)?;
        let target = args
            .target
            .as_deref()
            .context("--command needs --target <device code>")?
            .parse()?;
        // Queued now, transmitted once the handshake completes.
        session.send(command, target)?;
    }

    session.run()?;
    Ok(())
}

//! Patchbay control hub
//!
//! Headless binary that wires the control surface to the audio and visual
//! engines. Surface input arrives over USB serial, gets decoded and routed
//! through the active mode's bindings, and leaves as OSC over UDP. The hub
//! also owns the engine processes the active mode calls for.
//!
//! When no surface can be reached the hub falls back to an interactive
//! console that simulates one. The console is also reachable directly with
//! `--simulate`.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use patch_detect::PortScanner;
use patch_protocol::AdcResolution;
use patch_router::{
    run_router_actor, run_serial_source, ControlRouter, HubConfig, ModeRegistry, OscSender,
    ProcessSupervisor, RouterCommand, RouterEvent, SerialConfig, SourceCommand, SourceExit,
};
use patch_sim::{run_console_source, SimEvent, VirtualSurface};
use tokio::io::BufReader;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 64;

/// Command line options for the hub binary
#[derive(Parser)]
#[command(
    name = "patchbay",
    author,
    version,
    about = "Mode-driven hub between a control surface and audio/visual engines",
    long_about = None
)]
struct Cli {
    /// Path to the hub config file
    #[arg(short, long, default_value = "patchbay.toml")]
    config: PathBuf,

    /// Serial port to use, skipping auto-detection
    #[arg(short, long)]
    port: Option<String>,

    /// Read console commands instead of opening a serial port
    #[arg(long)]
    simulate: bool,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Include all our crates in the default filter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "patchbay=info,patch_protocol=info,patch_detect=info,patch_router=info,patch_sim=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    if cli.list_ports {
        return list_ports();
    }

    let mut config = HubConfig::load(&cli.config)?;
    if let Some(port) = cli.port {
        config.system.serial.port = Some(port);
    }
    let registry = ModeRegistry::from_config(&config)?;

    info!("Starting Patchbay control hub");
    info!(
        "{}: {} modes, starting in {}",
        cli.config.display(),
        registry.len(),
        registry.current().name
    );

    let serial = config.system.serial.clone();
    let sender = OscSender::from_config(&config.system)?;
    let supervisor = ProcessSupervisor::from_config(&config.system);
    let router = ControlRouter::new(registry);

    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
    let (source_tx, source_rx) = mpsc::channel(1);

    let actor = tokio::spawn(run_router_actor(
        router,
        sender,
        supervisor,
        cmd_rx,
        event_tx.clone(),
    ));
    let events = tokio::spawn(drain_events(event_rx));
    let mut input = tokio::spawn(run_input(
        cli.simulate,
        serial,
        cmd_tx.clone(),
        event_tx,
        source_rx,
    ));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            let _ = source_tx.send(SourceCommand::Shutdown).await;
        }
        _ = &mut input => {
            debug!("input source finished");
        }
    }

    let _ = cmd_tx.send(RouterCommand::Shutdown).await;
    drop(cmd_tx);
    let _ = actor.await;
    let _ = events.await;
    info!("hub stopped");

    // a console read pending on the blocking pool would stall runtime
    // shutdown, so leave through exit once everything above has finished
    std::process::exit(0)
}

/// Feed the router from the configured input source
///
/// Runs the serial source first unless `simulate` is set, then falls back
/// to the interactive console when the serial side gives up.
async fn run_input(
    simulate: bool,
    serial: SerialConfig,
    cmd_tx: mpsc::Sender<RouterCommand>,
    event_tx: mpsc::Sender<RouterEvent>,
    cmd_rx: mpsc::Receiver<SourceCommand>,
) {
    let resolution = serial.adc_resolution;
    if !simulate {
        match run_serial_source(serial, cmd_rx, cmd_tx.clone(), event_tx).await {
            SourceExit::Shutdown => return,
            SourceExit::Exhausted => {
                info!("no serial input, switching to the console");
            }
        }
    } else {
        drop(event_tx);
    }
    run_console_input(resolution, cmd_tx).await;
}

/// Drive the router from a simulated surface on stdin
async fn run_console_input(resolution: AdcResolution, cmd_tx: mpsc::Sender<RouterCommand>) {
    let surface = VirtualSurface::new(resolution);
    let (sim_tx, mut sim_rx) = mpsc::channel(COMMAND_BUFFER);
    tokio::spawn(run_console_source(
        BufReader::new(tokio::io::stdin()),
        surface,
        sim_tx,
    ));

    while let Some(event) = sim_rx.recv().await {
        let sent = match event {
            SimEvent::Sample(sample) => cmd_tx.send(RouterCommand::Sample(sample)).await,
            SimEvent::NextMode => cmd_tx.send(RouterCommand::AdvanceMode).await,
            SimEvent::StatusRequest => {
                print_status(&cmd_tx).await;
                Ok(())
            }
            SimEvent::Quit => break,
        };
        if sent.is_err() {
            break;
        }
    }
}

/// Ask the router for a snapshot and print it for the console user
async fn print_status(cmd_tx: &mpsc::Sender<RouterCommand>) {
    let (tx, rx) = oneshot::channel();
    if cmd_tx
        .send(RouterCommand::Status { response: tx })
        .await
        .is_err()
    {
        return;
    }
    if let Ok(status) = rx.await {
        println!(
            "mode {} [{}]  audio {}  visual {}",
            status.mode, status.mode_index, status.audio, status.visual
        );
    }
}

/// Drain the router's event stream
///
/// The routing layers log their own traffic, so the stream is only mirrored
/// at debug level here. Draining it keeps the actor from blocking on a full
/// channel.
async fn drain_events(mut events: mpsc::Receiver<RouterEvent>) {
    while let Some(event) = events.recv().await {
        if event.is_error() {
            debug!("error event: {:?}", event);
        } else {
            trace!("event: {:?}", event);
        }
    }
}

/// Print every serial port the scanner can see
fn list_ports() -> Result<()> {
    let ports = PortScanner::new().enumerate_ports()?;
    if ports.is_empty() {
        println!("no serial ports found");
        return Ok(());
    }
    println!("available serial ports:");
    for info in ports {
        let mut line = format!("  {}", info.port);
        if let (Some(vid), Some(pid)) = (info.vid, info.pid) {
            line.push_str(&format!(" [{:04x}:{:04x}]", vid, pid));
        }
        if let Some(product) = info.product.as_deref() {
            line.push_str(&format!(" {}", product));
        }
        if info.is_control_surface() {
            line.push_str(" <- control surface");
        }
        println!("{}", line);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["patchbay"]);
        assert_eq!(cli.config, PathBuf::from("patchbay.toml"));
        assert!(cli.port.is_none());
        assert!(!cli.simulate);
        assert!(!cli.list_ports);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "patchbay",
            "--config",
            "live.toml",
            "--port",
            "/dev/ttyACM1",
            "--simulate",
        ]);
        assert_eq!(cli.config, PathBuf::from("live.toml"));
        assert_eq!(cli.port.as_deref(), Some("/dev/ttyACM1"));
        assert!(cli.simulate);
    }
}

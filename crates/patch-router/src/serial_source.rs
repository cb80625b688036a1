//! Serial input source
//!
//! Reads raw bytes from the control surface in its own spawned task,
//! decodes them with the streaming codec, and feeds the decoded samples
//! into the router actor's command channel. Simulated input uses the same
//! channel, so real and virtual surfaces share one code path.
//!
//! The port is auto-detected by USB metadata when the config does not pin
//! one. Opening the port resets most boards, so a settle delay runs before
//! the first read. A lost connection is retried with bounded exponential
//! backoff; once the retries are exhausted the task exits and reports it,
//! so the hub can fall back to the console simulator.

use std::io::ErrorKind;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use patch_detect::PortScanner;
use patch_protocol::{AdcResolution, SurfaceCodec};

use crate::actor::RouterCommand;
use crate::config::SerialConfig;
use crate::events::RouterEvent;

/// Commands that can be sent to the serial source task
#[derive(Debug)]
pub enum SourceCommand {
    /// Shutdown the task
    Shutdown,
}

/// Why the serial source task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceExit {
    /// Shutdown was requested
    Shutdown,
    /// All reconnect attempts failed
    Exhausted,
}

enum LoopEnd {
    Shutdown,
    Disconnected(String),
}

/// Run the serial source until shutdown or reconnect exhaustion
pub async fn run_serial_source(
    config: SerialConfig,
    mut cmd_rx: mpsc::Receiver<SourceCommand>,
    sample_tx: mpsc::Sender<RouterCommand>,
    event_tx: mpsc::Sender<RouterEvent>,
) -> SourceExit {
    let mut attempts = 0u32;
    let mut backoff = Duration::from_millis(config.reconnect.backoff_ms);
    let max_backoff = Duration::from_millis(config.reconnect.max_backoff_ms);

    loop {
        let stream = match resolve_port(&config) {
            Some(port_name) => {
                match tokio_serial::new(&port_name, config.baud_rate)
                    .timeout(Duration::from_millis(100))
                    .open_native_async()
                {
                    Ok(stream) => Some((port_name, stream)),
                    Err(e) => {
                        warn!("failed to open {}: {}", port_name, e);
                        None
                    }
                }
            }
            None => None,
        };

        let Some((port_name, stream)) = stream else {
            attempts += 1;
            if attempts >= config.reconnect.max_retries {
                warn!(
                    "no control surface after {} attempts, giving up",
                    attempts
                );
                let _ = event_tx
                    .send(RouterEvent::SourceExhausted { attempts })
                    .await;
                return SourceExit::Exhausted;
            }
            debug!(
                "retrying in {:?} (attempt {}/{})",
                backoff, attempts, config.reconnect.max_retries
            );
            if wait_or_shutdown(&mut cmd_rx, backoff).await {
                return SourceExit::Shutdown;
            }
            backoff = (backoff * 2).min(max_backoff);
            continue;
        };

        info!("connected to control surface on {}", port_name);
        let _ = event_tx
            .send(RouterEvent::SourceConnected {
                port: port_name.clone(),
            })
            .await;
        attempts = 0;
        backoff = Duration::from_millis(config.reconnect.backoff_ms);

        // boards reset when the port opens; give the firmware time to boot
        if config.settle_ms > 0 {
            debug!("waiting {}ms for the board to settle", config.settle_ms);
            if wait_or_shutdown(&mut cmd_rx, Duration::from_millis(config.settle_ms)).await {
                return SourceExit::Shutdown;
            }
        }

        match read_loop(stream, &mut cmd_rx, &sample_tx, config.adc_resolution).await {
            LoopEnd::Shutdown => return SourceExit::Shutdown,
            LoopEnd::Disconnected(message) => {
                warn!("serial connection lost on {}: {}", port_name, message);
                let _ = event_tx
                    .send(RouterEvent::SourceLost {
                        port: port_name,
                        message,
                    })
                    .await;
            }
        }
    }
}

/// Main read loop; runs until the connection drops or shutdown is requested
async fn read_loop(
    mut stream: SerialStream,
    cmd_rx: &mut mpsc::Receiver<SourceCommand>,
    sample_tx: &mpsc::Sender<RouterCommand>,
    resolution: AdcResolution,
) -> LoopEnd {
    let mut codec = SurfaceCodec::new(resolution);
    let mut buffer = vec![0u8; 1024];

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SourceCommand::Shutdown) | None => {
                        info!("shutdown requested for serial source");
                        return LoopEnd::Shutdown;
                    }
                }
            }

            result = tokio::time::timeout(
                Duration::from_millis(100),
                stream.read(&mut buffer)
            ) => {
                match result {
                    Ok(Ok(n)) if n > 0 => {
                        codec.push_bytes(&buffer[..n]);
                        while let Some(sample) = codec.next_sample() {
                            if sample_tx
                                .send(RouterCommand::Sample(sample))
                                .await
                                .is_err()
                            {
                                // actor gone, nothing left to feed
                                return LoopEnd::Shutdown;
                            }
                        }
                    }
                    Ok(Ok(_)) => {} // 0 bytes
                    Ok(Err(e)) => {
                        if e.kind() == ErrorKind::WouldBlock {
                            continue;
                        }
                        return LoopEnd::Disconnected(e.to_string());
                    }
                    Err(_) => {} // timeout, keep polling
                }
            }
        }
    }
}

/// Pick the port to open: configured name first, then USB auto-detection
fn resolve_port(config: &SerialConfig) -> Option<String> {
    if let Some(port) = &config.port {
        return Some(port.clone());
    }
    match PortScanner::new().find_control_surface() {
        Ok(Some(info)) => {
            info!("auto-detected control surface on {}", info.port);
            Some(info.port)
        }
        Ok(None) => {
            debug!("no control surface among the enumerated ports");
            None
        }
        Err(e) => {
            warn!("port scan failed: {}", e);
            None
        }
    }
}

/// Sleep, returning true when shutdown arrives first
async fn wait_or_shutdown(cmd_rx: &mut mpsc::Receiver<SourceCommand>, wait: Duration) -> bool {
    tokio::select! {
        _ = cmd_rx.recv() => true,
        _ = tokio::time::sleep(wait) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconnectConfig;

    fn test_config(port: Option<&str>, max_retries: u32) -> SerialConfig {
        SerialConfig {
            port: port.map(|p| p.to_string()),
            baud_rate: 9600,
            adc_resolution: AdcResolution::TenBit,
            settle_ms: 0,
            reconnect: ReconnectConfig {
                max_retries,
                backoff_ms: 20,
                max_backoff_ms: 50,
            },
        }
    }

    #[tokio::test]
    async fn test_unopenable_port_exhausts_retries() {
        let (_cmd_tx, cmd_rx) = mpsc::channel(4);
        let (sample_tx, _sample_rx) = mpsc::channel(16);
        let (event_tx, mut event_rx) = mpsc::channel(16);

        let exit = run_serial_source(
            test_config(Some("/dev/nonexistent-surface-port"), 2),
            cmd_rx,
            sample_tx,
            event_tx,
        )
        .await;
        assert_eq!(exit, SourceExit::Exhausted);

        let mut saw_exhausted = false;
        while let Ok(event) = event_rx.try_recv() {
            if matches!(event, RouterEvent::SourceExhausted { attempts: 2 }) {
                saw_exhausted = true;
            }
        }
        assert!(saw_exhausted);
    }

    #[tokio::test]
    async fn test_shutdown_during_backoff() {
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let (sample_tx, _sample_rx) = mpsc::channel(16);
        let (event_tx, _event_rx) = mpsc::channel(16);

        let task = tokio::spawn(run_serial_source(
            test_config(Some("/dev/nonexistent-surface-port"), 1000),
            cmd_rx,
            sample_tx,
            event_tx,
        ));

        tokio::time::sleep(Duration::from_millis(30)).await;
        cmd_tx.send(SourceCommand::Shutdown).await.unwrap();

        let exit = task.await.unwrap();
        assert_eq!(exit, SourceExit::Shutdown);
    }
}

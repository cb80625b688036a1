//! Router actor
//!
//! All routing happens in one task: it owns the dispatcher core, the OSC
//! sender, and the process supervisor, consumes a command channel fed by
//! the input sources, and emits everything it does on a unified event
//! channel. A single consuming task means samples are handled strictly in
//! arrival order, so a mode switch always applies to the samples that
//! follow it.
//!
//! # Architecture
//!
//! Input sources (serial reader, console simulator) send `RouterCommand`s;
//! the hub logs the `RouterEvent` stream. A one-second health timer reaps
//! engines that died on their own.
//!
//! # Example
//!
//! ```rust,ignore
//! use patch_router::{run_router_actor, RouterCommand};
//! use tokio::sync::mpsc;
//!
//! let (cmd_tx, cmd_rx) = mpsc::channel(256);
//! let (event_tx, mut event_rx) = mpsc::channel(256);
//!
//! // Spawn the actor
//! tokio::spawn(run_router_actor(router, sender, supervisor, cmd_rx, event_tx));
//!
//! // Feed samples and consume events
//! ```

use patch_protocol::Sample;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::{ControlRouter, SampleOutcome};
use crate::events::RouterEvent;
use crate::osc::OscSender;
use crate::supervisor::{EngineKind, EngineStatus, ProcessSupervisor};

/// Commands sent to the router actor
#[derive(Debug)]
pub enum RouterCommand {
    /// Route one decoded sample
    Sample(Sample),

    /// Advance to the next mode, as if the mode button was pressed
    AdvanceMode,

    /// Snapshot the router state
    Status {
        /// Channel to send the snapshot back
        response: oneshot::Sender<RouterStatus>,
    },

    /// Stop all engines and exit the actor
    Shutdown,
}

/// Snapshot of the router state
#[derive(Debug, Clone)]
pub struct RouterStatus {
    /// Name of the active mode
    pub mode: String,
    /// Index of the active mode in the cycle
    pub mode_index: usize,
    /// Audio engine state
    pub audio: EngineStatus,
    /// Visual engine state
    pub visual: EngineStatus,
}

/// Run the router actor
///
/// Activates the initial mode's engines before consuming input, then
/// processes commands until `Shutdown` arrives or all command senders are
/// dropped. Both engines are stopped before the actor returns.
///
/// # Arguments
///
/// * `router` - Dispatcher core over a compiled registry
/// * `sender` - OSC output socket
/// * `supervisor` - Engine process owner
/// * `cmd_rx` - Receiver for commands sent to the actor
/// * `event_tx` - Sender for events emitted by the actor
pub async fn run_router_actor(
    mut router: ControlRouter,
    sender: OscSender,
    mut supervisor: ProcessSupervisor,
    mut cmd_rx: mpsc::Receiver<RouterCommand>,
    event_tx: mpsc::Sender<RouterEvent>,
) {
    info!("router actor started in mode {}", router.current_mode().name);

    activate_mode_engines(&router, &mut supervisor).await;
    forward_events(&mut supervisor, &event_tx).await;
    let _ = event_tx
        .send(RouterEvent::Started {
            mode: router.current_mode().name.clone(),
        })
        .await;

    // notices engines that died on their own
    let mut health_timer = interval(Duration::from_secs(1));
    health_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break; };
                match cmd {
                    RouterCommand::Sample(sample) => {
                        let outcome = router.process_sample(sample);
                        dispatch_outcome(&mut router, &sender, &mut supervisor, &event_tx, outcome)
                            .await;
                    }

                    RouterCommand::AdvanceMode => {
                        let change = router.advance_mode();
                        let outcome = SampleOutcome {
                            messages: Vec::new(),
                            mode_change: Some(change),
                        };
                        dispatch_outcome(&mut router, &sender, &mut supervisor, &event_tx, outcome)
                            .await;
                    }

                    RouterCommand::Status { response } => {
                        let _ = response.send(RouterStatus {
                            mode: router.current_mode().name.clone(),
                            mode_index: router.registry().current_index(),
                            audio: supervisor.status(EngineKind::Audio),
                            visual: supervisor.status(EngineKind::Visual),
                        });
                    }

                    RouterCommand::Shutdown => {
                        info!("router actor shutting down");
                        break;
                    }
                }
            }
            _ = health_timer.tick() => {
                supervisor.reap();
                forward_events(&mut supervisor, &event_tx).await;
            }
        }
    }

    supervisor.shutdown_all().await;
    forward_events(&mut supervisor, &event_tx).await;
    let _ = event_tx.send(RouterEvent::ShutdownComplete).await;
    info!("router actor stopped");
}

/// Send the outcome of one routed sample: core events, then messages, then
/// the engine switch when the mode changed
async fn dispatch_outcome(
    router: &mut ControlRouter,
    sender: &OscSender,
    supervisor: &mut ProcessSupervisor,
    event_tx: &mpsc::Sender<RouterEvent>,
    outcome: SampleOutcome,
) {
    for event in router.drain_events() {
        let _ = event_tx.send(event).await;
    }

    for message in &outcome.messages {
        match sender.send(message) {
            Ok(()) => {
                debug!("sent {} to {}", message.addr, message.target);
                let _ = event_tx
                    .send(RouterEvent::MessageSent {
                        target: message.target,
                        addr: message.addr.clone(),
                    })
                    .await;
            }
            Err(e) => {
                warn!("failed to send {} to {}: {}", message.addr, message.target, e);
                let _ = event_tx
                    .send(RouterEvent::SendFailed {
                        target: message.target,
                        addr: message.addr.clone(),
                        message: e.to_string(),
                    })
                    .await;
            }
        }
    }

    if outcome.mode_change.is_some() {
        activate_mode_engines(router, supervisor).await;
        forward_events(supervisor, event_tx).await;
    }
}

/// Bring both engine slots in line with the current mode's scripts
async fn activate_mode_engines(router: &ControlRouter, supervisor: &mut ProcessSupervisor) {
    for kind in EngineKind::ALL {
        let script = router.current_mode().script(kind);
        if let Err(e) = supervisor.activate(kind, script).await {
            warn!("failed to activate {} engine: {}", kind, e);
        }
    }
}

async fn forward_events(supervisor: &mut ProcessSupervisor, event_tx: &mpsc::Sender<RouterEvent>) {
    for event in supervisor.drain_events() {
        let _ = event_tx.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;
    use crate::registry::ModeRegistry;
    use rosc::{OscMessage, OscPacket, OscType};

    const CONFIG: &str = r#"
[system]
mode_button = "btn7"

[system.serial]
adc_resolution = "10-bit"

[[modes]]
name = "alpha"

[modes.controls.buttons.btn1]
actions = [{ target = "audio", command = "/trigger", params = [1] }]

[modes.controls.pots.pot1]
target = "audio"
command = "/cutoff"
range = { in_min = 0.0, in_max = 1023.0, out_min = 0.0, out_max = 1.0 }

[[modes]]
name = "beta"

[modes.controls.pots.pot1]
target = "visual"
command = "/speed"
"#;

    fn build_parts(
        audio_addr: String,
        visual_addr: String,
    ) -> (ControlRouter, OscSender, ProcessSupervisor) {
        let config: HubConfig = toml::from_str(CONFIG).unwrap();
        let registry = ModeRegistry::from_config(&config).unwrap();
        let router = ControlRouter::new(registry);
        let sender = OscSender::new(audio_addr, visual_addr).unwrap();
        let supervisor = ProcessSupervisor::from_config(&config.system);
        (router, sender, supervisor)
    }

    async fn bind_receiver() -> (tokio::net::UdpSocket, String) {
        let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap().to_string();
        (socket, addr)
    }

    async fn recv_osc(socket: &tokio::net::UdpSocket) -> OscMessage {
        let mut buf = [0u8; 1536];
        let (size, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .expect("timed out waiting for datagram")
            .unwrap();
        match rosc::decoder::decode_udp(&buf[..size]).unwrap().1 {
            OscPacket::Message(msg) => msg,
            other => panic!("expected message packet, got {:?}", other),
        }
    }

    async fn wait_for_event<F>(event_rx: &mut mpsc::Receiver<RouterEvent>, pred: F) -> RouterEvent
    where
        F: Fn(&RouterEvent) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let event = event_rx.recv().await.expect("event channel closed");
                if pred(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    #[tokio::test]
    async fn test_button_sample_reaches_audio_endpoint() {
        let (audio_rx, audio_addr) = bind_receiver().await;
        let (_visual_rx, visual_addr) = bind_receiver().await;
        let (router, sender, supervisor) = build_parts(audio_addr, visual_addr);

        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, mut event_rx) = mpsc::channel(64);
        let actor = tokio::spawn(run_router_actor(router, sender, supervisor, cmd_rx, event_tx));

        cmd_tx
            .send(RouterCommand::Sample(Sample::Button { id: 0, level: true }))
            .await
            .unwrap();

        wait_for_event(&mut event_rx, |e| {
            matches!(e, RouterEvent::MessageSent { addr, .. } if addr == "/trigger")
        })
        .await;

        let msg = recv_osc(&audio_rx).await;
        assert_eq!(msg.addr, "/trigger");
        assert_eq!(msg.args, vec![OscType::Int(1)]);

        cmd_tx.send(RouterCommand::Shutdown).await.unwrap();
        actor.await.unwrap();
    }

    #[tokio::test]
    async fn test_mode_button_switches_bindings() {
        let (_audio_rx, audio_addr) = bind_receiver().await;
        let (visual_rx, visual_addr) = bind_receiver().await;
        let (router, sender, supervisor) = build_parts(audio_addr, visual_addr);

        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, mut event_rx) = mpsc::channel(64);
        let actor = tokio::spawn(run_router_actor(router, sender, supervisor, cmd_rx, event_tx));

        // press and release the mode button, then move pot1
        cmd_tx
            .send(RouterCommand::Sample(Sample::Button { id: 6, level: true }))
            .await
            .unwrap();
        cmd_tx
            .send(RouterCommand::Sample(Sample::Button {
                id: 6,
                level: false,
            }))
            .await
            .unwrap();
        cmd_tx
            .send(RouterCommand::Sample(Sample::Pot { id: 0, raw: 512 }))
            .await
            .unwrap();

        let event = wait_for_event(&mut event_rx, |e| {
            matches!(e, RouterEvent::ModeChanged { .. })
        })
        .await;
        assert!(matches!(
            event,
            RouterEvent::ModeChanged { index: 1, name } if name == "beta"
        ));

        // pot1 is bound to the visual engine in beta
        let msg = recv_osc(&visual_rx).await;
        assert_eq!(msg.addr, "/speed");

        cmd_tx.send(RouterCommand::Shutdown).await.unwrap();
        actor.await.unwrap();
    }

    #[tokio::test]
    async fn test_advance_mode_command() {
        let (_audio_rx, audio_addr) = bind_receiver().await;
        let (_visual_rx, visual_addr) = bind_receiver().await;
        let (router, sender, supervisor) = build_parts(audio_addr, visual_addr);

        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, mut event_rx) = mpsc::channel(64);
        let actor = tokio::spawn(run_router_actor(router, sender, supervisor, cmd_rx, event_tx));

        cmd_tx.send(RouterCommand::AdvanceMode).await.unwrap();
        wait_for_event(&mut event_rx, |e| {
            matches!(e, RouterEvent::ModeChanged { index: 1, .. })
        })
        .await;

        cmd_tx.send(RouterCommand::Shutdown).await.unwrap();
        actor.await.unwrap();
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let (_audio_rx, audio_addr) = bind_receiver().await;
        let (_visual_rx, visual_addr) = bind_receiver().await;
        let (router, sender, supervisor) = build_parts(audio_addr, visual_addr);

        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, _event_rx) = mpsc::channel(64);
        let actor = tokio::spawn(run_router_actor(router, sender, supervisor, cmd_rx, event_tx));

        let (resp_tx, resp_rx) = oneshot::channel();
        cmd_tx
            .send(RouterCommand::Status { response: resp_tx })
            .await
            .unwrap();
        let status = resp_rx.await.unwrap();
        assert_eq!(status.mode, "alpha");
        assert_eq!(status.mode_index, 0);
        // no scripts in this config, so both engines stay down
        assert_eq!(status.audio, EngineStatus::Stopped);
        assert_eq!(status.visual, EngineStatus::Stopped);

        cmd_tx.send(RouterCommand::Shutdown).await.unwrap();
        actor.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_emits_complete() {
        let (_audio_rx, audio_addr) = bind_receiver().await;
        let (_visual_rx, visual_addr) = bind_receiver().await;
        let (router, sender, supervisor) = build_parts(audio_addr, visual_addr);

        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, mut event_rx) = mpsc::channel(64);
        let actor = tokio::spawn(run_router_actor(router, sender, supervisor, cmd_rx, event_tx));

        cmd_tx.send(RouterCommand::Shutdown).await.unwrap();
        wait_for_event(&mut event_rx, |e| {
            matches!(e, RouterEvent::ShutdownComplete)
        })
        .await;
        actor.await.unwrap();
    }

    #[tokio::test]
    async fn test_started_event_names_initial_mode() {
        let (_audio_rx, audio_addr) = bind_receiver().await;
        let (_visual_rx, visual_addr) = bind_receiver().await;
        let (router, sender, supervisor) = build_parts(audio_addr, visual_addr);

        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, mut event_rx) = mpsc::channel(64);
        let actor = tokio::spawn(run_router_actor(router, sender, supervisor, cmd_rx, event_tx));

        let event = wait_for_event(&mut event_rx, |e| {
            matches!(e, RouterEvent::Started { .. })
        })
        .await;
        assert!(matches!(event, RouterEvent::Started { mode } if mode == "alpha"));

        cmd_tx.send(RouterCommand::Shutdown).await.unwrap();
        actor.await.unwrap();
    }
}

//! OSC (Open Sound Control) output
//!
//! Outbound messages are OSC over UDP. One ephemeral socket serves both
//! engines; the destination is picked per message by engine kind
//! (SuperCollider listens on 57120 by default, Processing sketches on
//! 12000).

use std::net::UdpSocket;

use rosc::{encoder, OscMessage, OscPacket, OscType};

use crate::config::{ParamValue, SystemConfig};
use crate::error::RouterError;
use crate::supervisor::EngineKind;

/// One fully resolved outbound message
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Destination engine
    pub target: EngineKind,
    /// OSC address pattern
    pub addr: String,
    /// Message arguments
    pub args: Vec<OscType>,
}

/// UDP-based OSC sender with one destination per engine kind
#[derive(Debug)]
pub struct OscSender {
    socket: UdpSocket,
    audio_addr: String,
    visual_addr: String,
}

impl OscSender {
    /// Create a sender bound to an ephemeral port
    pub fn new(audio_addr: String, visual_addr: String) -> Result<Self, RouterError> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        Ok(Self {
            socket,
            audio_addr,
            visual_addr,
        })
    }

    /// Create a sender targeting the endpoints a config declares
    pub fn from_config(system: &SystemConfig) -> Result<Self, RouterError> {
        let (audio_host, audio_port) = system.audio.endpoint(EngineKind::Audio);
        let (visual_host, visual_port) = system.visual.endpoint(EngineKind::Visual);
        Self::new(
            format!("{}:{}", audio_host, audio_port),
            format!("{}:{}", visual_host, visual_port),
        )
    }

    /// Destination address for an engine kind
    pub fn target_addr(&self, kind: EngineKind) -> &str {
        match kind {
            EngineKind::Audio => &self.audio_addr,
            EngineKind::Visual => &self.visual_addr,
        }
    }

    /// Encode and send one message
    pub fn send(&self, message: &OutboundMessage) -> Result<(), RouterError> {
        let packet = OscPacket::Message(OscMessage {
            addr: message.addr.clone(),
            args: message.args.clone(),
        });
        let buf = encoder::encode(&packet)?;
        self.socket
            .send_to(&buf, self.target_addr(message.target))?;
        Ok(())
    }
}

/// Convert configured fixed params into OSC arguments
pub fn to_osc_args(params: &[ParamValue]) -> Vec<OscType> {
    params
        .iter()
        .map(|p| match p {
            ParamValue::Int(i) => OscType::Int(*i),
            ParamValue::Float(f) => OscType::Float(*f),
            ParamValue::Str(s) => OscType::String(s.clone()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn local_receiver() -> (UdpSocket, String) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let addr = socket.local_addr().unwrap().to_string();
        (socket, addr)
    }

    fn recv_message(socket: &UdpSocket) -> OscMessage {
        let mut buf = [0u8; 1536];
        let (size, _) = socket.recv_from(&mut buf).unwrap();
        let (_, packet) = rosc::decoder::decode_udp(&buf[..size]).unwrap();
        match packet {
            OscPacket::Message(msg) => msg,
            other => panic!("expected message packet, got {:?}", other),
        }
    }

    #[test]
    fn test_send_reaches_target_endpoint() {
        let (audio_rx, audio_addr) = local_receiver();
        let (_visual_rx, visual_addr) = local_receiver();
        let sender = OscSender::new(audio_addr, visual_addr).unwrap();

        sender
            .send(&OutboundMessage {
                target: EngineKind::Audio,
                addr: "/trigger".to_string(),
                args: vec![OscType::Int(1)],
            })
            .unwrap();

        let msg = recv_message(&audio_rx);
        assert_eq!(msg.addr, "/trigger");
        assert_eq!(msg.args, vec![OscType::Int(1)]);
    }

    #[test]
    fn test_targets_are_independent() {
        let (audio_rx, audio_addr) = local_receiver();
        let (visual_rx, visual_addr) = local_receiver();
        let sender = OscSender::new(audio_addr, visual_addr).unwrap();

        sender
            .send(&OutboundMessage {
                target: EngineKind::Visual,
                addr: "/flash".to_string(),
                args: vec![OscType::Float(0.5)],
            })
            .unwrap();

        let msg = recv_message(&visual_rx);
        assert_eq!(msg.addr, "/flash");

        audio_rx
            .set_read_timeout(Some(Duration::from_millis(50)))
            .unwrap();
        let mut buf = [0u8; 64];
        assert!(audio_rx.recv_from(&mut buf).is_err());
    }

    #[test]
    fn test_param_conversion() {
        let args = to_osc_args(&[
            ParamValue::Int(7),
            ParamValue::Float(2.5),
            ParamValue::Str("go".to_string()),
        ]);
        assert_eq!(
            args,
            vec![
                OscType::Int(7),
                OscType::Float(2.5),
                OscType::String("go".to_string())
            ]
        );
    }
}

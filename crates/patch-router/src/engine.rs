//! Dispatcher core
//!
//! The synchronous routing logic: one decoded `Sample` in, zero or more
//! outbound messages plus an optional mode-change directive out. No I/O
//! happens here. The actor owns the socket and the child processes; this
//! core owns the registry and the edge detector, so every routing rule is
//! testable without a serial port or a UDP socket.

use rosc::OscType;
use tracing::{debug, info};

use patch_protocol::{button_label, pot_label, EdgeDetector, Sample};

use crate::config::ValueFormat;
use crate::events::RouterEvent;
use crate::osc::{to_osc_args, OutboundMessage};
use crate::registry::{ModeDefinition, ModeRegistry};

/// Directive to switch engine processes after a mode advance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeChange {
    /// Index of the new mode in the cycle
    pub index: usize,
    /// Name of the new mode
    pub name: String,
}

/// Result of routing one sample
#[derive(Debug, Clone, Default)]
pub struct SampleOutcome {
    /// Messages to send, in order
    pub messages: Vec<OutboundMessage>,
    /// Mode switch requested by this sample
    pub mode_change: Option<ModeChange>,
}

/// The routing core
///
/// Button samples pass through the edge detector first, so only rising
/// edges fire. The mode-advance button is intercepted before binding
/// lookup; any binding on it never fires.
pub struct ControlRouter {
    registry: ModeRegistry,
    edges: EdgeDetector,
    event_buffer: Vec<RouterEvent>,
}

impl ControlRouter {
    /// Create a router over a compiled registry
    pub fn new(registry: ModeRegistry) -> Self {
        Self {
            registry,
            edges: EdgeDetector::new(),
            event_buffer: Vec::new(),
        }
    }

    /// The compiled registry
    pub fn registry(&self) -> &ModeRegistry {
        &self.registry
    }

    /// Currently active mode
    pub fn current_mode(&self) -> &ModeDefinition {
        self.registry.current()
    }

    /// Advance to the next mode in the cycle
    pub fn advance_mode(&mut self) -> ModeChange {
        let name = self.registry.advance().name.clone();
        let change = ModeChange {
            index: self.registry.current_index(),
            name,
        };
        info!("mode changed to {} ({})", change.name, change.index);
        self.event_buffer.push(RouterEvent::ModeChanged {
            index: change.index,
            name: change.name.clone(),
        });
        change
    }

    /// Route one sample
    pub fn process_sample(&mut self, sample: Sample) -> SampleOutcome {
        match sample {
            Sample::Button { id, level } => self.process_button(id, level),
            Sample::Pot { id, raw } => self.process_pot(id, raw),
        }
    }

    fn process_button(&mut self, id: u8, level: bool) -> SampleOutcome {
        if !self.edges.observe(id, level) {
            return SampleOutcome::default();
        }

        if id == self.registry.mode_button() {
            let change = self.advance_mode();
            return SampleOutcome {
                messages: Vec::new(),
                mode_change: Some(change),
            };
        }

        let Some(actions) = self.registry.resolve_button(id) else {
            debug!(
                "no binding for {} in mode {}",
                button_label(id),
                self.registry.current().name
            );
            return SampleOutcome::default();
        };

        let messages = actions
            .iter()
            .map(|action| OutboundMessage {
                target: action.target,
                addr: action.command.clone(),
                args: to_osc_args(&action.params),
            })
            .collect();

        SampleOutcome {
            messages,
            mode_change: None,
        }
    }

    fn process_pot(&mut self, id: u8, raw: u16) -> SampleOutcome {
        let Some(binding) = self.registry.resolve_pot(id) else {
            debug!(
                "no binding for {} in mode {}",
                pot_label(id),
                self.registry.current().name
            );
            return SampleOutcome::default();
        };

        let mapped = binding.range.map(raw as f32);
        let mut args = to_osc_args(&binding.action.params);
        args.push(match binding.format {
            ValueFormat::Float => OscType::Float(mapped),
            ValueFormat::Integer => OscType::Int(mapped.round() as i32),
        });

        SampleOutcome {
            messages: vec![OutboundMessage {
                target: binding.action.target,
                addr: binding.action.command.clone(),
                args,
            }],
            mode_change: None,
        }
    }

    /// Drain pending events
    pub fn drain_events(&mut self) -> Vec<RouterEvent> {
        std::mem::take(&mut self.event_buffer)
    }
}

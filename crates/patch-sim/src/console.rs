//! Interactive console source
//!
//! A line-oriented stand-in for the serial link, used when no control
//! surface is attached. Button commands use the zero-based wire numbering
//! of the surface (`b0`..`b6`, `m0`..`m15`); pot commands use the
//! one-based labels the configuration uses (`p1`..`p3`).

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::debug;

use patch_protocol::{Sample, MATRIX_BUTTONS, PANEL_BUTTONS, POT_COUNT};

use crate::surface::VirtualSurface;

/// Command reference printed at startup and by the `?` command
pub const HELP: &str = "\
commands:
  b0..b6       press a panel button (wire numbering)
  m0..m15      press a matrix button (wire numbering)
  p1 512       set a pot to a raw value
  p1 + / p1 -  nudge a pot one step
  n            next mode
  s            show status
  ?            this help
  q            quit";

/// A parse failure for one console line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// The line matched no known command shape
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),
    /// A button or pot number was outside the surface
    #[error("no such control: {0}")]
    NoSuchControl(String),
    /// A pot command without a usable value or direction
    #[error("bad pot value: {0:?}")]
    BadPotValue(String),
}

/// One parsed console command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Press a panel button (zero-based wire number)
    PressButton(u8),
    /// Press a matrix button (zero-based wire number)
    PressMatrix(u8),
    /// Set a pot to an absolute raw value
    SetPot {
        /// Pot id, zero-based
        id: u8,
        /// Raw value, clamped by the surface
        raw: u16,
    },
    /// Nudge a pot one step
    NudgePot {
        /// Pot id, zero-based
        id: u8,
        /// Direction, true = up
        up: bool,
    },
    /// Advance the mode cycle
    NextMode,
    /// Ask for the current router status
    Status,
    /// Print the command reference
    Help,
    /// Leave the console
    Quit,
}

/// What the console feeds into the router side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    /// A decoded input sample, identical to what the serial source produces
    Sample(Sample),
    /// Advance the mode cycle
    NextMode,
    /// The user asked for the current status
    StatusRequest,
    /// The console is done (quit command or end of input)
    Quit,
}

/// Parse one console line
pub fn parse_command(line: &str) -> Result<ConsoleCommand, SimError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err(SimError::UnknownCommand(line.to_string()));
    };
    let arg = words.next();

    match head {
        "n" | "next" => Ok(ConsoleCommand::NextMode),
        "s" | "status" => Ok(ConsoleCommand::Status),
        "?" | "help" => Ok(ConsoleCommand::Help),
        "q" | "quit" => Ok(ConsoleCommand::Quit),
        _ => parse_control(head, arg),
    }
}

fn parse_control(head: &str, arg: Option<&str>) -> Result<ConsoleCommand, SimError> {
    if let Some(digits) = head.strip_prefix('b') {
        return Ok(ConsoleCommand::PressButton(parse_wire_number(
            digits,
            PANEL_BUTTONS,
            head,
        )?));
    }
    if let Some(digits) = head.strip_prefix('m') {
        return Ok(ConsoleCommand::PressMatrix(parse_wire_number(
            digits,
            MATRIX_BUTTONS,
            head,
        )?));
    }
    if let Some(digits) = head.strip_prefix('p') {
        // one-based pot labels, like the configuration
        let n: u8 = digits
            .parse()
            .map_err(|_| SimError::UnknownCommand(head.to_string()))?;
        if !(1..=POT_COUNT).contains(&n) {
            return Err(SimError::NoSuchControl(head.to_string()));
        }
        let id = n - 1;
        return match arg {
            Some("+") => Ok(ConsoleCommand::NudgePot { id, up: true }),
            Some("-") => Ok(ConsoleCommand::NudgePot { id, up: false }),
            Some(value) => {
                let raw: u16 = value
                    .parse()
                    .map_err(|_| SimError::BadPotValue(value.to_string()))?;
                Ok(ConsoleCommand::SetPot { id, raw })
            }
            None => Err(SimError::BadPotValue(head.to_string())),
        };
    }
    Err(SimError::UnknownCommand(head.to_string()))
}

fn parse_wire_number(digits: &str, count: u8, head: &str) -> Result<u8, SimError> {
    let n: u8 = digits
        .parse()
        .map_err(|_| SimError::UnknownCommand(head.to_string()))?;
    if n < count {
        Ok(n)
    } else {
        Err(SimError::NoSuchControl(head.to_string()))
    }
}

/// Drive the router from an interactive line stream
///
/// Reads commands line by line, applies them to the virtual surface, and
/// forwards the resulting samples. Ends on `q`, end of input, or a closed
/// event channel; a final [`SimEvent::Quit`] marks the end either way.
pub async fn run_console_source<R>(
    mut reader: R,
    mut surface: VirtualSurface,
    event_tx: mpsc::Sender<SimEvent>,
) where
    R: AsyncBufRead + Unpin,
{
    println!("{}", HELP);

    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("console read failed: {}", e);
                break;
            }
        }
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Ok(ConsoleCommand::Help) => println!("{}", HELP),
            Ok(ConsoleCommand::Quit) => break,
            Ok(ConsoleCommand::NextMode) => {
                if event_tx.send(SimEvent::NextMode).await.is_err() {
                    return;
                }
            }
            Ok(ConsoleCommand::Status) => {
                println!("{}", surface.state_summary());
                if event_tx.send(SimEvent::StatusRequest).await.is_err() {
                    return;
                }
            }
            Ok(cmd) => {
                apply(&mut surface, cmd);
                while let Some(sample) = surface.take_sample() {
                    if event_tx.send(SimEvent::Sample(sample)).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => println!("{} (try '?')", e),
        }
    }

    let _ = event_tx.send(SimEvent::Quit).await;
}

fn apply(surface: &mut VirtualSurface, cmd: ConsoleCommand) {
    match cmd {
        ConsoleCommand::PressButton(n) => {
            surface.press_button(n);
        }
        ConsoleCommand::PressMatrix(n) => {
            surface.press_matrix(n);
        }
        ConsoleCommand::SetPot { id, raw } => {
            surface.set_pot(id, raw);
        }
        ConsoleCommand::NudgePot { id, up } => {
            surface.nudge_pot(id, up);
        }
        ConsoleCommand::NextMode
        | ConsoleCommand::Status
        | ConsoleCommand::Help
        | ConsoleCommand::Quit => {}
    }
}

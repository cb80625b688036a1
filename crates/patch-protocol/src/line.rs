//! Line protocol decoder for the control surface
//!
//! The firmware writes newline-terminated ASCII lines in three shapes:
//!
//! # Format
//! - Press token: `btn<0-6>` or `mbtn_<0-15>` — a firmware-debounced button
//!   press, zero-based wire numbering
//! - Pot token: `pot<1-3>:<raw>` — a single pot reading
//! - Snapshot record: `pot1,pot2,pot3,btn1,btn2,btn3` — six comma-separated
//!   fields, three raw pot readings followed by three button levels in
//!   `{0,1}`
//!
//! Raw pot readings are bounded by the declared [`AdcResolution`]. A press
//! token expands into a press/release level pair so that every button sample
//! takes the same edge-detection path; a snapshot record emits its button
//! levels before its pot readings, preserving the behavior that a mode
//! switch fired by a record applies to that record's own pot values.
//!
//! Malformed lines are a fact of life on a shared USB serial link (boot
//! banners, partial lines after reconnect). [`parse_line`] reports them as
//! typed [`ParseError`]s and the streaming [`SurfaceCodec`] logs, counts and
//! skips them; neither ever panics or aborts the stream.

use std::collections::VecDeque;

use tracing::debug;

use crate::error::ParseError;
use crate::sample::{
    matrix_button, AdcResolution, Sample, MATRIX_BUTTONS, PANEL_BUTTONS, POT_COUNT,
};

/// Longest line the firmware can legitimately produce
const MAX_LINE_LEN: usize = 128;

/// Parse one line (terminator already stripped) into samples, in wire order
///
/// An empty line parses to no samples. Errors identify what was wrong with
/// the line; callers are expected to log and continue.
pub fn parse_line(line: &str, resolution: AdcResolution) -> Result<Vec<Sample>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Vec::new());
    }

    if line.contains(',') {
        return parse_record(line, resolution);
    }
    if let Some((name, value)) = line.split_once(':') {
        return parse_pot_token(name.trim(), value.trim(), resolution).map(|s| vec![s]);
    }
    if let Some(n) = line.strip_prefix("mbtn_") {
        let id = parse_wire_button(n, MATRIX_BUTTONS)
            .ok_or_else(|| ParseError::UnknownControl(line.to_string()))?;
        return Ok(press_pulse(matrix_button(id)));
    }
    if let Some(n) = line.strip_prefix("btn") {
        let id = parse_wire_button(n, PANEL_BUTTONS)
            .ok_or_else(|| ParseError::UnknownControl(line.to_string()))?;
        return Ok(press_pulse(id));
    }

    Err(ParseError::UnrecognizedLine(line.to_string()))
}

/// Zero-based wire button number, bounded by the bank size
fn parse_wire_button(digits: &str, count: u8) -> Option<u8> {
    let n: u8 = digits.parse().ok()?;
    (n < count).then_some(n)
}

/// A firmware press token becomes a press/release pair
fn press_pulse(id: u8) -> Vec<Sample> {
    vec![
        Sample::Button { id, level: true },
        Sample::Button { id, level: false },
    ]
}

fn parse_pot_token(
    name: &str,
    value: &str,
    resolution: AdcResolution,
) -> Result<Sample, ParseError> {
    let id = name
        .strip_prefix("pot")
        .and_then(|n| n.parse::<u8>().ok())
        .filter(|n| (1..=POT_COUNT).contains(n))
        .map(|n| n - 1)
        .ok_or_else(|| ParseError::UnknownControl(name.to_string()))?;
    let raw = parse_raw(value, resolution)?;
    Ok(Sample::Pot { id, raw })
}

fn parse_raw(field: &str, resolution: AdcResolution) -> Result<u16, ParseError> {
    let raw: u16 = field
        .parse()
        .map_err(|_| ParseError::InvalidPotValue(field.to_string()))?;
    if raw > resolution.max_raw() {
        return Err(ParseError::PotOutOfRange {
            raw,
            max: resolution.max_raw(),
        });
    }
    Ok(raw)
}

/// Six-field snapshot record: three pot readings, then three button levels
///
/// Emission order is buttons first, matching how the surface is serviced.
fn parse_record(line: &str, resolution: AdcResolution) -> Result<Vec<Sample>, ParseError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 6 {
        return Err(ParseError::WrongFieldCount(fields.len()));
    }

    let mut pots = Vec::with_capacity(3);
    for (id, field) in fields[..3].iter().enumerate() {
        pots.push(Sample::Pot {
            id: id as u8,
            raw: parse_raw(field, resolution)?,
        });
    }

    let mut samples = Vec::with_capacity(6);
    for (id, field) in fields[3..].iter().enumerate() {
        let level = match *field {
            "0" => false,
            "1" => true,
            other => return Err(ParseError::InvalidButtonFlag(other.to_string())),
        };
        samples.push(Sample::Button {
            id: id as u8,
            level,
        });
    }
    samples.extend(pots);
    Ok(samples)
}

/// Streaming decoder over the raw serial byte stream
///
/// Feed chunks with [`push_bytes`](Self::push_bytes) and drain decoded
/// samples with [`next_sample`](Self::next_sample). Lines that fail to
/// parse are logged at debug, tallied, and skipped.
pub struct SurfaceCodec {
    buffer: Vec<u8>,
    pending: VecDeque<Sample>,
    resolution: AdcResolution,
    unparseable: u64,
}

impl SurfaceCodec {
    /// Create a codec for the declared ADC resolution
    pub fn new(resolution: AdcResolution) -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_LINE_LEN),
            pending: VecDeque::new(),
            resolution,
            unparseable: 0,
        }
    }

    /// Append raw bytes read from the transport
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        // Prevent buffer overflow if the stream carries no newlines
        if self.buffer.len() > MAX_LINE_LEN * 4 {
            let start = self.buffer.len() - MAX_LINE_LEN;
            self.buffer = self.buffer[start..].to_vec();
        }
    }

    /// Next decoded sample, if a complete line has arrived
    pub fn next_sample(&mut self) -> Option<Sample> {
        loop {
            if let Some(sample) = self.pending.pop_front() {
                return Some(sample);
            }

            let nl = self.buffer.iter().position(|&b| b == b'\n')?;
            let line_bytes: Vec<u8> = self.buffer.drain(..=nl).collect();
            let line = String::from_utf8_lossy(&line_bytes[..line_bytes.len() - 1]);

            match parse_line(&line, self.resolution) {
                Ok(samples) => self.pending.extend(samples),
                Err(e) => {
                    self.unparseable += 1;
                    debug!("skipping line: {}", e);
                }
            }
        }
    }

    /// How many lines failed to parse since creation
    pub fn unparseable_lines(&self) -> u64 {
        self.unparseable
    }

    /// Discard buffered bytes and pending samples
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.pending.clear();
    }
}

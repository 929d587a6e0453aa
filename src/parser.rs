//! Text line protocol decoding.
//!
//! Wire format: `"<sensor_id>,<temperature>,<flag>\n"`, e.g. `0,25.50,1`.
//! `flag == 0` means the hardware interlock has halted the device.
//! A line containing `ERROR` is a sensor fault sentinel, not a reading.

use serde::{Deserialize, Serialize};

pub const FAULT_SENTINEL: &str = "ERROR";

/// One parsed telemetry sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub sensor_id: u32,
    pub temperature: f32,
    /// `false` when the hardware interlock reports the device halted.
    pub running: bool,
}

impl Default for Reading {
    fn default() -> Self {
        Self {
            sensor_id: 0,
            temperature: 0.0,
            running: true,
        }
    }
}

/// Result of decoding one burst of bytes.
///
/// `fault` carries the most recent `ERROR` line seen before a usable reading,
/// so a burst can surface a fault and still yield an older valid sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFrame {
    pub reading: Option<Reading>,
    pub fault: Option<String>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryParser;

impl TelemetryParser {
    pub fn new() -> Self {
        Self
    }

    /// Decode a burst, newest line first. Lines older than the first usable
    /// reading are discarded, not queued.
    pub fn parse(&self, raw: &[u8]) -> ParsedFrame {
        // Invalid UTF-8 sequences are dropped rather than failing the burst
        let text: String = raw.utf8_chunks().map(|chunk| chunk.valid()).collect();

        let mut frame = ParsedFrame::default();
        for line in text.lines().rev().map(str::trim) {
            if line.is_empty() {
                continue;
            }
            if line.contains(FAULT_SENTINEL) {
                if frame.fault.is_none() {
                    frame.fault = Some(line.to_string());
                }
                continue;
            }
            if let Some(reading) = parse_line(line) {
                frame.reading = Some(reading);
                break;
            }
        }
        frame
    }

    /// Convenience for callers that only care about the reading.
    pub fn parse_reading(&self, raw: &[u8]) -> Option<Reading> {
        self.parse(raw).reading
    }
}

/// Parse a single `id,temperature,flag` line. Extra trailing fields are
/// tolerated; fewer fields or a non-numeric temperature or flag reject the
/// line. The id never rejects a line: anything that is not a `u32` reads as 0.
pub fn parse_line(line: &str) -> Option<Reading> {
    let mut fields = line.split(',').map(str::trim);
    let id = fields.next()?;
    let temperature = fields.next()?;
    let flag = fields.next()?;

    let sensor_id = id.parse::<u32>().unwrap_or(0);
    let temperature = temperature.parse::<f32>().ok().filter(|t| t.is_finite())?;
    let flag = flag.parse::<i64>().ok()?;

    Some(Reading {
        sensor_id,
        temperature,
        running: flag != 0,
    })
}

/// Render a reading in wire format, newline-terminated.
pub fn encode_line(reading: &Reading) -> String {
    format!(
        "{},{:.2},{}\n",
        reading.sensor_id,
        reading.temperature,
        u8::from(reading.running)
    )
}

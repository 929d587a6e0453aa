//! Telemetry byte sources.
//!
//! A [`TelemetrySource`] is selected once at start-up by [`open_with_fallback`]
//! and fixed for the lifetime of the process. A live transport that fails to
//! open is replaced by the simulator permanently; there is no re-attempt.

pub mod live;
pub mod simulated;

pub use live::LiveSource;
pub use simulated::SimulatedSource;

use crate::config::MonitorConfig;
use crate::error::{OpenError, TransportError};
use crate::event_log::{EventLog, LogLevel};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Live,
    Simulated,
}

/// Single-byte outbound command. No acknowledgement is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceCommand {
    Stop,
    Resume,
}

impl DeviceCommand {
    pub fn as_byte(self) -> u8 {
        match self {
            DeviceCommand::Stop => b'0',
            DeviceCommand::Resume => b'1',
        }
    }
}

pub trait TelemetrySource: Send {
    fn open(&mut self) -> Result<(), OpenError>;

    /// Read whatever is available right now. `Ok(None)` means no bytes
    /// arrived since the last poll.
    fn poll_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Best effort, fire and forget.
    fn send_command(&mut self, command: DeviceCommand) -> Result<(), TransportError>;

    fn kind(&self) -> SourceKind;
}

/// Pick the telemetry source for this session.
///
/// Honors `prefer_simulation`, otherwise tries the live transport once and
/// falls back to the simulator on failure. Outcome is recorded in `log`.
pub fn open_with_fallback(config: &MonitorConfig, log: &mut EventLog) -> Box<dyn TelemetrySource> {
    if config.prefer_simulation {
        info!("Simulation preferred, live transport skipped");
        return start_simulation(config, log);
    }

    let mut live = LiveSource::new(&config.transport_address, config.baud_rate);
    match live.open() {
        Ok(()) => {
            log.record(format!(
                "SYS: Port Open ({} @ {} baud)",
                config.transport_address, config.baud_rate
            ));
            Box::new(live)
        }
        Err(e) => {
            warn!("Live transport open failed: {}", e);
            log.record(format!("ERR: Port Fail ({})", config.transport_address));
            log.append("SYS: Switching to Sim (Fail)", LogLevel::Warning);
            start_simulation(config, log)
        }
    }
}

fn start_simulation(config: &MonitorConfig, log: &mut EventLog) -> Box<dyn TelemetrySource> {
    let mut simulated = SimulatedSource::new(config.simulation.clone());
    // The simulator cannot fail to open
    let _ = simulated.open();
    log.record("SYS: Sim Mode Active");
    Box::new(simulated)
}

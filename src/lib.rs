//! # Single-Sensor Safety Monitor
//!
//! Telemetry ingestion, safety state machine and event log for an industrial
//! cooling fan guarded by one temperature sensor.
//!
//! ## Features
//!
//! - **Telemetry ingestion**: text line protocol over a live byte stream, with a
//!   permanent fallback to a simulated plant when the transport is unavailable
//! - **Severity classification**: Normal / Warning / Danger / Critical bands
//! - **Auto-shutdown countdown**: sustained critical temperature engages a soft e-stop
//! - **Dual e-stop tracking**: operator toggle and hardware interlock, independent
//! - **Event log**: bounded, timestamped, keyword-classified
//!
//! ## Quick Start
//!
//! ```rust
//! use scadamon::{MonitorAgent, MonitorConfig};
//!
//! let config = MonitorConfig { prefer_simulation: true, ..MonitorConfig::default() };
//! let mut agent = MonitorAgent::new(&config).expect("valid config");
//!
//! // ~10 Hz telemetry poll
//! agent.poll_telemetry();
//!
//! // 1 Hz logic tick
//! let state = agent.tick();
//! println!("{} ({:.1}°C)", state.status_text(), state.temperature);
//! ```
//!
//! ## Architecture
//!
//! - [`transport`] - Live and simulated telemetry sources, start-up fallback
//! - [`parser`] - Line protocol decoding
//! - [`safety`] - Pure per-tick state machine
//! - [`event_log`] - Bounded operator log
//! - [`agent`] - Owner of the pipeline; poll, tick and operator commands
//! - [`protocol`] - JSON line protocol for the monitor daemon

#![deny(clippy::all)]

pub mod agent;
pub mod config;
pub mod error;
pub mod event_log;
pub mod parser;
pub mod protocol;
pub mod safety;
pub mod transport;
pub mod trend;

// Re-export main public types for convenience
pub use agent::MonitorAgent;
pub use config::MonitorConfig;
pub use error::{AgentError, ConfigError, OpenError, TransportError};
pub use event_log::{EventLog, LogEntry, LogLevel};
pub use parser::{Reading, TelemetryParser};
pub use safety::{SafetyStateMachine, Severity, SystemState};
pub use transport::{DeviceCommand, SourceKind, TelemetrySource};

//! Newline-delimited JSON protocol between the monitor daemon and operator
//! clients. One JSON object per line in each direction.

use crate::agent::{AgentStats, MonitorAgent};
use crate::event_log::LogEntry;
use crate::safety::SystemState;
use crate::transport::SourceKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_REQUEST_SIZE: usize = 512;
pub const DEFAULT_LOG_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    Ping,
    Status,
    Log { limit: Option<usize> },
    SetSoftEstop { engaged: bool },
    /// Stream a `State` per logic tick and a `LogEntry` per append.
    Subscribe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    Pong,
    Status(StatusReport),
    LogHistory { entries: Vec<LogEntry> },
    Ack { accepted: bool, message: Option<String> },
    Error { message: String },
    State(SystemState),
    LogEntry(LogEntry),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub state: SystemState,
    pub status_text: String,
    pub banner_text: String,
    pub headline: String,
    pub source: SourceKind,
    pub link_healthy: bool,
    pub sensor_fault: Option<String>,
    pub trend_min: Option<f32>,
    pub trend_max: Option<f32>,
    pub stats: AgentStats,
}

impl StatusReport {
    pub fn from_agent(agent: &MonitorAgent) -> Self {
        let state = agent.latest_state().clone();
        Self {
            status_text: state.status_text().to_string(),
            banner_text: state.banner_text().to_string(),
            headline: state.headline(),
            state,
            source: agent.source_kind(),
            link_healthy: agent.link_healthy(),
            sensor_fault: agent.sensor_fault().map(str::to_string),
            trend_min: agent.trend().min(),
            trend_max: agent.trend().max(),
            stats: *agent.stats(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("request exceeds {MAX_REQUEST_SIZE} bytes")]
    TooLarge,
    #[error("empty request")]
    Empty,
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn decode_request(line: &str) -> Result<Request, ProtocolError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(ProtocolError::Empty);
    }
    if trimmed.len() > MAX_REQUEST_SIZE {
        return Err(ProtocolError::TooLarge);
    }
    Ok(serde_json::from_str(trimmed)?)
}

/// Encode without the trailing newline.
pub fn encode_message(message: &Message) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}

/// Answer a request against the agent. `Subscribe` is acknowledged here;
/// the streaming itself belongs to the connection handler.
pub fn handle_request(agent: &mut MonitorAgent, request: &Request) -> Message {
    match request {
        Request::Ping => Message::Pong,
        Request::Status => Message::Status(StatusReport::from_agent(agent)),
        Request::Log { limit } => Message::LogHistory {
            entries: agent.event_log().recent(limit.unwrap_or(DEFAULT_LOG_LIMIT)),
        },
        Request::SetSoftEstop { engaged } => match agent.request_soft_estop(*engaged) {
            Ok(()) => Message::Ack {
                accepted: true,
                message: Some(format!(
                    "E-stop {} queued for next logic tick",
                    if *engaged { "engage" } else { "release" }
                )),
            },
            Err(e) => Message::Ack {
                accepted: false,
                message: Some(e.to_string()),
            },
        },
        Request::Subscribe => Message::Ack {
            accepted: true,
            message: Some("subscribed".to_string()),
        },
    }
}

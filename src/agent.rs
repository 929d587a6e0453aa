use crate::config::MonitorConfig;
use crate::error::{AgentError, TransportError};
use crate::event_log::{EventLog, LogEntry};
use crate::parser::{Reading, TelemetryParser};
use crate::safety::{
    OperatorCommand, SafetyActions, SafetyStateMachine, SystemState, TickCommands, MAX_COMMANDS_PER_TICK,
};
use crate::transport::{self, SourceKind, TelemetrySource};
use crate::trend::TrendBuffer;
use heapless::spsc::Queue;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Logic tick period. Runtime and countdown advance only here.
pub const LOGIC_TICK_PERIOD: Duration = Duration::from_secs(1);

// One slot of the spsc queue is reserved, so it holds exactly one tick's worth
const COMMAND_QUEUE_SIZE: usize = MAX_COMMANDS_PER_TICK + 1;

type CommandQueue = Queue<OperatorCommand, COMMAND_QUEUE_SIZE>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStats {
    pub polls: u64,
    pub frames_received: u64,
    pub readings_accepted: u64,
    pub frames_discarded: u64,
    pub sensor_faults: u64,
    pub read_errors: u64,
    pub ticks: u64,
    pub commands_sent: u64,
    pub command_failures: u64,
}

/// Owns the telemetry pipeline, the state machine and the event log.
///
/// All mutation goes through `&mut self`, so a single owner (or a mutex
/// around the agent) serializes polls, ticks and operator commands.
pub struct MonitorAgent {
    source: Box<dyn TelemetrySource>,
    parser: TelemetryParser,
    machine: SafetyStateMachine,
    log: EventLog,
    trend: TrendBuffer,

    latest_reading: Reading,
    state: SystemState,
    pending_commands: CommandQueue,

    sensor_fault: Option<String>,
    link_healthy: bool,
    last_status: Option<&'static str>,
    stats: AgentStats,
}

impl MonitorAgent {
    /// Validate `config`, pick the telemetry source (falling back to the
    /// simulator if the live transport is unavailable) and start logging.
    pub fn new(config: &MonitorConfig) -> Result<Self, AgentError> {
        config.validate()?;
        let mut log = EventLog::new(config.max_log_entries);
        let source = transport::open_with_fallback(config, &mut log);
        Self::assemble(config, source, log)
    }

    /// Use a caller-provided source, e.g. a scripted one in tests.
    pub fn with_source(config: &MonitorConfig, source: Box<dyn TelemetrySource>) -> Result<Self, AgentError> {
        config.validate()?;
        let log = EventLog::new(config.max_log_entries);
        Self::assemble(config, source, log)
    }

    fn assemble(config: &MonitorConfig, source: Box<dyn TelemetrySource>, mut log: EventLog) -> Result<Self, AgentError> {
        let machine = SafetyStateMachine::from_config(config)?;
        let state = machine.initial_state();
        log.record("SYS: Monitor Initialized & Loops Started");

        Ok(Self {
            source,
            parser: TelemetryParser::new(),
            machine,
            log,
            trend: TrendBuffer::new(),
            latest_reading: Reading::default(),
            state,
            pending_commands: Queue::new(),
            sensor_fault: None,
            link_healthy: true,
            last_status: None,
            stats: AgentStats::default(),
        })
    }

    /// Telemetry poll: read one frame, parse it, keep the newest reading.
    pub fn poll_telemetry(&mut self) {
        self.stats.polls += 1;

        match self.source.poll_frame() {
            Ok(Some(frame)) => {
                self.mark_link_healthy();
                self.stats.frames_received += 1;
                self.ingest_frame(&frame);
            }
            Ok(None) => self.mark_link_healthy(),
            Err(e) => self.handle_read_error(e),
        }

        self.trend.push(self.latest_reading.temperature);
    }

    fn ingest_frame(&mut self, frame: &[u8]) {
        let parsed = self.parser.parse(frame);
        let faulted = parsed.fault.is_some();

        if let Some(fault) = parsed.fault {
            self.stats.sensor_faults += 1;
            if self.sensor_fault.is_none() {
                self.log.record(format!("ERR: Sensor Fault ({})", fault));
            }
            self.sensor_fault = Some(fault);
        }

        match parsed.reading {
            Some(reading) => {
                self.stats.readings_accepted += 1;
                self.latest_reading = reading;
                // A fault line newer than the reading keeps the fault visible
                if !faulted {
                    self.sensor_fault = None;
                }
            }
            None => {
                // Previous reading retained
                self.stats.frames_discarded += 1;
            }
        }
    }

    fn handle_read_error(&mut self, error: TransportError) {
        self.stats.read_errors += 1;
        warn!("Telemetry poll failed: {}", error);
        if self.link_healthy {
            self.link_healthy = false;
            self.log.record("ERR: Connection Lost");
        }
    }

    fn mark_link_healthy(&mut self) {
        if !self.link_healthy {
            self.link_healthy = true;
            self.log.record("SYS: Connection Restored");
        }
    }

    /// Queue an operator e-stop request for the next logic tick.
    pub fn request_soft_estop(&mut self, engaged: bool) -> Result<(), AgentError> {
        self.pending_commands
            .enqueue(OperatorCommand::SetSoftEstop(engaged))
            .map_err(|_| AgentError::CommandQueueFull)
    }

    /// Logic tick: advance the state machine and carry out its actions.
    pub fn tick(&mut self) -> &SystemState {
        let commands: TickCommands = core::iter::from_fn(|| self.pending_commands.dequeue())
            .take(MAX_COMMANDS_PER_TICK)
            .collect();

        let transition = self.machine.next_state_with(
            &self.state,
            &self.latest_reading,
            &commands,
            LOGIC_TICK_PERIOD,
        );
        self.state = transition.state;
        self.stats.ticks += 1;
        self.execute_safety_actions(transition.actions);
        self.log_status_change();

        &self.state
    }

    fn execute_safety_actions(&mut self, actions: SafetyActions) {
        if !actions.has_actions() {
            return;
        }

        for notice in &actions.notices {
            self.log.record(notice.message());
        }

        for &command in &actions.transmit {
            match self.source.send_command(command) {
                Ok(()) => self.stats.commands_sent += 1,
                Err(e) => {
                    self.stats.command_failures += 1;
                    warn!("Failed to send {:?}: {}", command, e);
                    self.log.record("ERR: Command Send Failed");
                }
            }
        }

        if actions.require_acknowledgement {
            debug!("E-stop engaged, operator acknowledgement required");
        }
    }

    fn log_status_change(&mut self) {
        let status = self.state.status_text();
        match self.last_status {
            Some(previous) if previous != status => {
                self.log.record(format!("STATUS: {}", status));
            }
            _ => {}
        }
        self.last_status = Some(status);
    }

    pub fn latest_state(&self) -> &SystemState {
        &self.state
    }

    pub fn latest_reading(&self) -> &Reading {
        &self.latest_reading
    }

    pub fn subscribe_log(&mut self, subscriber: impl FnMut(&LogEntry) + Send + 'static) {
        self.log.subscribe(subscriber);
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    pub fn trend(&self) -> &TrendBuffer {
        &self.trend
    }

    pub fn sensor_fault(&self) -> Option<&str> {
        self.sensor_fault.as_deref()
    }

    pub fn link_healthy(&self) -> bool {
        self.link_healthy
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source.kind()
    }

    pub fn stats(&self) -> &AgentStats {
        &self.stats
    }

    pub fn pending_commands(&self) -> usize {
        self.pending_commands.len()
    }
}

impl core::fmt::Debug for MonitorAgent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MonitorAgent")
            .field("source", &self.source.kind())
            .field("state", &self.state)
            .field("latest_reading", &self.latest_reading)
            .field("stats", &self.stats)
            .finish()
    }
}

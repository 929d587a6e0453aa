//! Safety state machine.
//!
//! A Moore machine over two independent stop flags (`soft_estop`, `hard_paused`)
//! and the auto-shutdown countdown. [`Severity`] is the visible output and is
//! recomputed from the state on every tick, never stored as an input.
//!
//! Transitions are pure: [`SafetyStateMachine::next_state`] takes the previous
//! snapshot and returns a new one together with the [`SafetyActions`] the
//! caller must carry out (log notices, device commands, acknowledgement).

use crate::config::{MonitorConfig, DEFAULT_COUNTDOWN_START_S};
use crate::error::ConfigError;
use crate::parser::Reading;
use crate::transport::DeviceCommand;
use arrayvec::ArrayString;
use core::fmt::Write;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Remaining seconds at or below which the countdown escalates to Critical.
pub const COUNTDOWN_CRITICAL_WINDOW_S: u32 = 5;
/// Most operator commands one logic tick accepts.
pub const MAX_COMMANDS_PER_TICK: usize = 8;
// One effect per command, plus countdown expiry and the auto e-stop it engages
const MAX_ACTIONS: usize = MAX_COMMANDS_PER_TICK + 2;

static_assertions::const_assert!(COUNTDOWN_CRITICAL_WINDOW_S < DEFAULT_COUNTDOWN_START_S);

/// Operator commands for one tick, in arrival order.
pub type TickCommands = Vec<OperatorCommand, MAX_COMMANDS_PER_TICK>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Normal,
    Warning,
    Danger,
    Critical,
}

/// Snapshot handed to presentation once per logic tick. Replaced, never
/// mutated by outside code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemState {
    pub temperature: f32,
    pub severity: Severity,
    pub soft_estop: bool,
    pub hard_paused: bool,
    pub countdown_active: bool,
    pub countdown_remaining: u32,
    pub runtime_seconds: u64,
}

impl SystemState {
    pub fn initial(countdown_start: u32) -> Self {
        Self {
            temperature: 0.0,
            severity: Severity::Normal,
            soft_estop: false,
            hard_paused: false,
            countdown_active: false,
            countdown_remaining: countdown_start,
            runtime_seconds: 0,
        }
    }

    pub fn is_emergency(&self) -> bool {
        self.soft_estop || self.hard_paused
    }

    pub fn fan_running(&self) -> bool {
        !self.is_emergency()
    }

    /// Short status label. Soft e-stop outranks hard pause, which outranks
    /// the temperature-derived severity.
    pub fn status_text(&self) -> &'static str {
        if self.soft_estop {
            return "EMERGENCY STOP";
        }
        if self.hard_paused {
            return "FAN STOPPED";
        }
        match self.severity {
            Severity::Normal => "NORMAL",
            Severity::Warning => "HIGH TEMPERATURE",
            Severity::Danger | Severity::Critical => "DANGER",
        }
    }

    pub fn banner_text(&self) -> &'static str {
        if self.soft_estop {
            return "ALARM: EMERGENCY STOP";
        }
        if self.hard_paused {
            return "COOLING FAN - STOPPED";
        }
        match self.severity {
            Severity::Normal => "COOLING FAN - RUNNING",
            Severity::Warning => "WARNING: HIGH TEMPERATURE",
            Severity::Danger | Severity::Critical => "ALARM: VERY HIGH TEMP",
        }
    }

    /// Central operator message, including the countdown clock while armed.
    pub fn headline(&self) -> String {
        if self.soft_estop {
            return "EMERGENCY MODE ACTIVE - FAN STOPPED".to_string();
        }
        if self.hard_paused {
            return "FAN STOPPED".to_string();
        }
        if self.countdown_active {
            return format!(
                "CRITICAL TEMP - STOP FAN WITHIN {}",
                format_clock(u64::from(self.countdown_remaining))
            );
        }
        match self.severity {
            Severity::Normal => "TEMPERATURE LEVELS SAFE - MONITORING ACTIVE".to_string(),
            _ => "WARNING - HIGH TEMPERATURE".to_string(),
        }
    }
}

/// `HH:MM:SS`; hours are not wrapped.
pub fn format_clock(seconds: u64) -> ArrayString<32> {
    let mut out = ArrayString::new();
    let _ = write!(
        out,
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    );
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatorCommand {
    SetSoftEstop(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafetyNotice {
    EstopEngaged,
    EstopReleased,
    CountdownExpired,
}

impl SafetyNotice {
    pub fn message(self) -> &'static str {
        match self {
            SafetyNotice::EstopEngaged => "ALARM: E-STOP HALTED",
            SafetyNotice::EstopReleased => "OP: E-STOP RESUMED",
            SafetyNotice::CountdownExpired => "ALARM: TIMER EXPIRED - INITIATING AUTO E-STOP",
        }
    }
}

/// Side effects requested by one transition, in the order they occurred.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SafetyActions {
    pub notices: Vec<SafetyNotice, MAX_ACTIONS>,
    pub transmit: Vec<DeviceCommand, MAX_ACTIONS>,
    /// Presentation must surface a blocking acknowledgement.
    pub require_acknowledgement: bool,
}

impl SafetyActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_actions(&self) -> bool {
        !self.notices.is_empty() || !self.transmit.is_empty() || self.require_acknowledgement
    }

    fn emit(&mut self, notice: SafetyNotice, command: Option<DeviceCommand>) {
        let notice_kept = self.notices.push(notice).is_ok();
        let command_kept = match command {
            Some(command) => self.transmit.push(command).is_ok(),
            None => true,
        };
        debug_assert!(
            notice_kept && command_kept,
            "Safety actions exceeded {} entries",
            MAX_ACTIONS
        );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: SystemState,
    pub actions: SafetyActions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SafetyStateMachine {
    warning_threshold_c: f32,
    critical_threshold_c: f32,
    countdown_start_s: u32,
}

impl SafetyStateMachine {
    pub fn new(
        warning_threshold_c: f32,
        critical_threshold_c: f32,
        countdown_start_s: u32,
    ) -> Result<Self, ConfigError> {
        if !warning_threshold_c.is_finite() {
            return Err(ConfigError::NonFiniteThreshold("warning_threshold_c"));
        }
        if !critical_threshold_c.is_finite() {
            return Err(ConfigError::NonFiniteThreshold("critical_threshold_c"));
        }
        if warning_threshold_c >= critical_threshold_c {
            return Err(ConfigError::ThresholdOrder {
                warning: warning_threshold_c,
                critical: critical_threshold_c,
            });
        }
        if countdown_start_s == 0 {
            return Err(ConfigError::ZeroCountdown);
        }
        Ok(Self {
            warning_threshold_c,
            critical_threshold_c,
            countdown_start_s,
        })
    }

    pub fn from_config(config: &MonitorConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.warning_threshold_c,
            config.critical_threshold_c,
            config.countdown_start_s,
        )
    }

    pub fn countdown_start(&self) -> u32 {
        self.countdown_start_s
    }

    pub fn initial_state(&self) -> SystemState {
        SystemState::initial(self.countdown_start_s)
    }

    /// Severity as a pure function of temperature, countdown progress and
    /// the emergency flags. `countdown` is `Some(remaining)` while armed.
    pub fn classify(&self, temperature: f32, countdown: Option<u32>, emergency: bool) -> Severity {
        if emergency {
            return Severity::Critical;
        }
        if temperature < self.warning_threshold_c {
            return Severity::Normal;
        }
        if temperature < self.critical_threshold_c {
            return Severity::Warning;
        }
        match countdown {
            Some(remaining) if remaining <= COUNTDOWN_CRITICAL_WINDOW_S => Severity::Critical,
            _ => Severity::Danger,
        }
    }

    fn severity_of(&self, state: &SystemState) -> Severity {
        self.classify(
            state.temperature,
            state.countdown_active.then_some(state.countdown_remaining),
            state.is_emergency(),
        )
    }

    pub fn next_state(
        &self,
        prev: &SystemState,
        reading: &Reading,
        command: Option<OperatorCommand>,
        dt: Duration,
    ) -> Transition {
        self.transition(prev, reading, command.as_slice(), dt)
    }

    /// One logic tick. Commands are applied first, in order.
    pub fn next_state_with(
        &self,
        prev: &SystemState,
        reading: &Reading,
        commands: &TickCommands,
        dt: Duration,
    ) -> Transition {
        self.transition(prev, reading, commands, dt)
    }

    // `commands` holds at most MAX_COMMANDS_PER_TICK entries
    fn transition(
        &self,
        prev: &SystemState,
        reading: &Reading,
        commands: &[OperatorCommand],
        dt: Duration,
    ) -> Transition {
        let mut state = prev.clone();
        let mut actions = SafetyActions::new();

        state.temperature = reading.temperature;
        state.hard_paused = !reading.running;

        for &command in commands {
            self.apply_command(&mut state, command, &mut actions);
        }

        if state.is_emergency() {
            // Runtime frozen; countdown returns to its initial values
            state.countdown_active = false;
            state.countdown_remaining = self.countdown_start_s;
            state.severity = self.severity_of(&state);
            return self.finish(state, actions);
        }

        state.runtime_seconds = state.runtime_seconds.saturating_add(dt.as_secs());

        if state.temperature < self.critical_threshold_c {
            state.countdown_active = false;
            state.countdown_remaining = self.countdown_start_s;
        } else {
            if !state.countdown_active {
                state.countdown_active = true;
                state.countdown_remaining = self.countdown_start_s;
            }
            state.countdown_remaining = state.countdown_remaining.saturating_sub(1);

            if state.countdown_remaining == 0 {
                actions.emit(SafetyNotice::CountdownExpired, None);
                self.apply_command(&mut state, OperatorCommand::SetSoftEstop(true), &mut actions);
                // Countdown ends here; the next tick takes the emergency branch
                state.countdown_active = false;
            }
        }

        state.severity = self.severity_of(&state);
        self.finish(state, actions)
    }

    /// Redundant commands (flag already at the requested value) are ignored.
    fn apply_command(&self, state: &mut SystemState, command: OperatorCommand, actions: &mut SafetyActions) {
        match command {
            OperatorCommand::SetSoftEstop(true) if !state.soft_estop => {
                state.soft_estop = true;
                actions.emit(SafetyNotice::EstopEngaged, Some(DeviceCommand::Stop));
                actions.require_acknowledgement = true;
            }
            OperatorCommand::SetSoftEstop(false) if state.soft_estop => {
                state.soft_estop = false;
                state.countdown_active = false;
                state.countdown_remaining = self.countdown_start_s;
                actions.emit(SafetyNotice::EstopReleased, Some(DeviceCommand::Resume));
                actions.require_acknowledgement = false;
            }
            OperatorCommand::SetSoftEstop(_) => {}
        }
    }

    fn finish(&self, state: SystemState, actions: SafetyActions) -> Transition {
        debug_assert!(
            state.countdown_remaining <= self.countdown_start_s,
            "Countdown {} above start {}",
            state.countdown_remaining,
            self.countdown_start_s
        );
        debug_assert!(
            state.countdown_active
                == (state.temperature >= self.critical_threshold_c && !state.is_emergency()),
            "Countdown armed state inconsistent with temperature {} and stop flags",
            state.temperature
        );
        Transition { state, actions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_secs(1);

    fn machine() -> SafetyStateMachine {
        SafetyStateMachine::new(40.0, 50.0, 20).unwrap()
    }

    fn reading(temperature: f32) -> Reading {
        Reading { sensor_id: 0, temperature, running: true }
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        assert!(matches!(
            SafetyStateMachine::new(50.0, 40.0, 20),
            Err(ConfigError::ThresholdOrder { .. })
        ));
        assert!(SafetyStateMachine::new(40.0, 40.0, 20).is_err());
        assert!(matches!(
            SafetyStateMachine::new(40.0, 50.0, 0),
            Err(ConfigError::ZeroCountdown)
        ));
        assert!(SafetyStateMachine::new(f32::NAN, 50.0, 20).is_err());
    }

    #[test]
    fn test_band_boundaries() {
        let m = machine();
        assert_eq!(m.classify(39.99, None, false), Severity::Normal);
        assert_eq!(m.classify(40.0, None, false), Severity::Warning);
        assert_eq!(m.classify(49.99, None, false), Severity::Warning);
        assert_eq!(m.classify(50.0, Some(19), false), Severity::Danger);
        assert_eq!(m.classify(50.0, Some(6), false), Severity::Danger);
        assert_eq!(m.classify(50.0, Some(5), false), Severity::Critical);
        assert_eq!(m.classify(10.0, None, true), Severity::Critical);
    }

    #[test]
    fn test_countdown_starts_on_first_critical_tick() {
        let m = machine();
        let t = m.next_state(&m.initial_state(), &reading(50.0), None, TICK);
        assert!(t.state.countdown_active);
        assert_eq!(t.state.countdown_remaining, 19);
        assert_eq!(t.state.severity, Severity::Danger);
        assert_eq!(t.state.runtime_seconds, 1);
        assert!(!t.actions.has_actions());
    }

    #[test]
    fn test_operator_estop_and_release() {
        let m = machine();
        let armed = m.next_state(&m.initial_state(), &reading(55.0), None, TICK).state;

        let stopped = m.next_state(&armed, &reading(55.0), Some(OperatorCommand::SetSoftEstop(true)), TICK);
        assert!(stopped.state.soft_estop);
        assert!(!stopped.state.countdown_active);
        assert_eq!(stopped.state.countdown_remaining, 20);
        assert_eq!(stopped.state.runtime_seconds, 1);
        assert_eq!(stopped.actions.notices.as_slice(), &[SafetyNotice::EstopEngaged]);
        assert_eq!(stopped.actions.transmit.as_slice(), &[DeviceCommand::Stop]);
        assert!(stopped.actions.require_acknowledgement);
        assert_eq!(stopped.state.status_text(), "EMERGENCY STOP");

        let resumed = m.next_state(&stopped.state, &reading(30.0), Some(OperatorCommand::SetSoftEstop(false)), TICK);
        assert!(!resumed.state.soft_estop);
        assert_eq!(resumed.state.severity, Severity::Normal);
        assert_eq!(resumed.state.runtime_seconds, 2);
        assert_eq!(resumed.actions.notices.as_slice(), &[SafetyNotice::EstopReleased]);
        assert_eq!(resumed.actions.transmit.as_slice(), &[DeviceCommand::Resume]);
    }

    #[test]
    fn test_redundant_command_ignored() {
        let m = machine();
        let t = m.next_state(&m.initial_state(), &reading(20.0), Some(OperatorCommand::SetSoftEstop(false)), TICK);
        assert!(!t.actions.has_actions());
    }

    #[test]
    fn test_commands_applied_in_order() {
        let m = machine();
        let commands = TickCommands::from_slice(&[
            OperatorCommand::SetSoftEstop(true),
            OperatorCommand::SetSoftEstop(false),
        ])
        .unwrap();
        let t = m.next_state_with(&m.initial_state(), &reading(20.0), &commands, TICK);
        assert!(!t.state.soft_estop);
        assert_eq!(
            t.actions.notices.as_slice(),
            &[SafetyNotice::EstopEngaged, SafetyNotice::EstopReleased]
        );
        assert_eq!(t.state.runtime_seconds, 1);
    }

    #[test]
    fn test_full_tick_of_commands_keeps_every_effect() {
        // A one-second countdown expires on the same tick the last release lands
        let m = SafetyStateMachine::new(40.0, 50.0, 1).unwrap();
        let mut commands = TickCommands::new();
        while !commands.is_full() {
            let engage = commands.len() % 2 == 0;
            commands.push(OperatorCommand::SetSoftEstop(engage)).unwrap();
        }

        let t = m.next_state_with(&m.initial_state(), &reading(55.0), &commands, TICK);

        assert!(t.state.soft_estop);
        assert_eq!(t.actions.notices.len(), MAX_COMMANDS_PER_TICK + 2);
        assert_eq!(t.actions.transmit.len(), MAX_COMMANDS_PER_TICK + 1);
        assert_eq!(
            &t.actions.notices[MAX_COMMANDS_PER_TICK..],
            &[SafetyNotice::CountdownExpired, SafetyNotice::EstopEngaged]
        );
        // The device is left in the state the snapshot reports
        assert_eq!(t.actions.transmit.last(), Some(&DeviceCommand::Stop));
        assert!(t.actions.require_acknowledgement);
    }

    #[test]
    fn test_display_priority() {
        let mut state = SystemState::initial(20);
        state.severity = Severity::Danger;
        assert_eq!(state.status_text(), "DANGER");
        assert_eq!(state.banner_text(), "ALARM: VERY HIGH TEMP");

        state.hard_paused = true;
        assert_eq!(state.status_text(), "FAN STOPPED");
        assert_eq!(state.banner_text(), "COOLING FAN - STOPPED");

        state.soft_estop = true;
        assert_eq!(state.status_text(), "EMERGENCY STOP");
        assert_eq!(state.banner_text(), "ALARM: EMERGENCY STOP");
        assert!(!state.fan_running());
    }

    #[test]
    fn test_headline_shows_countdown_clock() {
        let mut state = SystemState::initial(20);
        assert_eq!(state.headline(), "TEMPERATURE LEVELS SAFE - MONITORING ACTIVE");
        state.severity = Severity::Danger;
        state.countdown_active = true;
        state.countdown_remaining = 15;
        assert_eq!(state.headline(), "CRITICAL TEMP - STOP FAN WITHIN 00:00:15");
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0).as_str(), "00:00:00");
        assert_eq!(format_clock(3725).as_str(), "01:02:05");
        assert_eq!(format_clock(360_000).as_str(), "100:00:00");
    }
}

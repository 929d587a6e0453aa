//! Deterministic-shape telemetry generator used when no hardware is present.

use super::{DeviceCommand, SourceKind, TelemetrySource};
use crate::config::SimulationConfig;
use crate::error::{OpenError, TransportError};
use crate::parser::{encode_line, Reading};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};
use tracing::debug;

const SIMULATED_SENSOR_ID: u32 = 0;

#[derive(Debug)]
pub struct SimulatedSource {
    config: SimulationConfig,
    started: Instant,
    rng: StdRng,
}

impl SimulatedSource {
    pub fn new(config: SimulationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            config,
            started: Instant::now(),
            rng,
        }
    }

    /// Sample the simulated plant `elapsed` after construction.
    ///
    /// `temp = base + amplitude * sin(2π * frequency * elapsed) + jitter`
    pub fn sample_at(&mut self, elapsed: Duration) -> Reading {
        let phase = 2.0 * core::f32::consts::PI * self.config.frequency_hz * elapsed.as_secs_f32();
        let jitter = if self.config.jitter_c > 0.0 {
            self.rng.random_range(0.0..self.config.jitter_c)
        } else {
            0.0
        };

        Reading {
            sensor_id: SIMULATED_SENSOR_ID,
            temperature: self.config.base_c + self.config.amplitude_c * phase.sin() + jitter,
            running: true,
        }
    }
}

impl TelemetrySource for SimulatedSource {
    fn open(&mut self) -> Result<(), OpenError> {
        Ok(())
    }

    fn poll_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let reading = self.sample_at(self.started.elapsed());
        Ok(Some(encode_line(&reading).into_bytes()))
    }

    fn send_command(&mut self, command: DeviceCommand) -> Result<(), TransportError> {
        debug!("Simulated device ignores {:?}", command);
        Ok(())
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Simulated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::TelemetryParser;

    fn quiet_config() -> SimulationConfig {
        SimulationConfig {
            base_c: 25.0,
            amplitude_c: 30.0,
            frequency_hz: 0.25,
            jitter_c: 0.0,
            seed: Some(1),
        }
    }

    #[test]
    fn test_waveform_without_jitter() {
        let mut source = SimulatedSource::new(quiet_config());
        assert!((source.sample_at(Duration::ZERO).temperature - 25.0).abs() < 1e-4);
        // Quarter period of a 0.25 Hz wave is one second
        assert!((source.sample_at(Duration::from_secs(1)).temperature - 55.0).abs() < 1e-3);
        assert!((source.sample_at(Duration::from_secs(3)).temperature + 5.0).abs() < 1e-3);
    }

    #[test]
    fn test_jitter_is_bounded() {
        let mut config = quiet_config();
        config.jitter_c = 0.2;
        let mut source = SimulatedSource::new(config);
        for _ in 0..500 {
            let t = source.sample_at(Duration::ZERO).temperature;
            assert!((25.0..=25.2).contains(&t), "jitter out of range: {}", t);
        }
    }

    #[test]
    fn test_frames_parse_and_report_running() {
        let mut source = SimulatedSource::new(quiet_config());
        source.open().unwrap();
        let frame = source.poll_frame().unwrap().unwrap();
        let reading = TelemetryParser::new().parse_reading(&frame).unwrap();
        assert!(reading.running);
        assert!(source.send_command(DeviceCommand::Stop).is_ok());
        assert_eq!(source.kind(), SourceKind::Simulated);
    }
}

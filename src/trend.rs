use heapless::HistoryBuffer;

/// Samples retained for the temperature trend.
pub const TREND_WINDOW: usize = 50;

/// Fixed-size ring of the most recent temperatures, one per telemetry poll.
#[derive(Debug, Clone)]
pub struct TrendBuffer {
    samples: HistoryBuffer<f32, TREND_WINDOW>,
}

impl Default for TrendBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TrendBuffer {
    pub fn new() -> Self {
        Self {
            samples: HistoryBuffer::new(),
        }
    }

    pub fn push(&mut self, temperature: f32) {
        self.samples.write(temperature);
    }

    /// Oldest first.
    pub fn recent(&self) -> Vec<f32> {
        self.samples.oldest_ordered().copied().collect()
    }

    pub fn latest(&self) -> Option<f32> {
        self.samples.recent().copied()
    }

    pub fn min(&self) -> Option<f32> {
        self.samples.oldest_ordered().copied().reduce(f32::min)
    }

    pub fn max(&self) -> Option<f32> {
        self.samples.oldest_ordered().copied().reduce(f32::max)
    }

    pub fn mean(&self) -> Option<f32> {
        if self.samples.len() == 0 {
            return None;
        }
        let sum: f32 = self.samples.oldest_ordered().sum();
        Some(sum / self.samples.len() as f32)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        let trend = TrendBuffer::new();
        assert!(trend.is_empty());
        assert_eq!(trend.min(), None);
        assert_eq!(trend.mean(), None);
    }

    #[test]
    fn test_window_keeps_latest_samples() {
        let mut trend = TrendBuffer::new();
        for i in 0..(TREND_WINDOW + 10) {
            trend.push(i as f32);
        }
        let recent = trend.recent();
        assert_eq!(recent.len(), TREND_WINDOW);
        assert_eq!(recent[0], 10.0);
        assert_eq!(trend.latest(), Some((TREND_WINDOW + 9) as f32));
        assert_eq!(trend.min(), Some(10.0));
        assert_eq!(trend.max(), Some(59.0));
    }

    #[test]
    fn test_mean() {
        let mut trend = TrendBuffer::new();
        for t in [20.0, 30.0, 40.0] {
            trend.push(t);
        }
        assert_eq!(trend.mean(), Some(30.0));
    }
}

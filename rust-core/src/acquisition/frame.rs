//! Acquired frames and their axes

use std::time::Duration;

/// One finite acquisition of the input channel
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Position in the session, starting at 0
    pub sequence: u64,

    /// Sample clock rate in Hz
    pub sample_rate: f64,

    /// Voltages in acquisition order
    pub samples: Vec<f64>,

    /// Time since the session was created when the read completed
    pub acquired_at: Duration,
}

/// Summary statistics of a frame, in volts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub rms: f64,
    /// `max - min`
    pub peak_to_peak: f64,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Time spanned by the frame in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate
    }

    /// Sample times in seconds relative to the first sample
    pub fn time_axis(&self) -> Vec<f64> {
        time_axis(self.samples.len(), self.sample_rate)
    }

    pub fn stats(&self) -> Option<FrameStats> {
        if self.samples.is_empty() {
            return None;
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for &s in &self.samples {
            min = min.min(s);
            max = max.max(s);
            sum += s;
            sum_sq += s * s;
        }

        let n = self.samples.len() as f64;
        Some(FrameStats {
            min,
            max,
            mean: sum / n,
            rms: (sum_sq / n).sqrt(),
            peak_to_peak: max - min,
        })
    }
}

/// Sample times t_i = i / rate for `n` samples
pub fn time_axis(n: usize, sample_rate: f64) -> Vec<f64> {
    (0..n).map(|i| i as f64 / sample_rate).collect()
}

/// Bin frequencies k · rate / n for k = 0..=n/2
pub fn frequency_axis(n: usize, sample_rate: f64) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    (0..=n / 2)
        .map(|k| k as f64 * sample_rate / n as f64)
        .collect()
}

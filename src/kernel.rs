//! The per-frame DOA kernel boundary.
//!
//! Spec-wise this is the opaque, externally supplied black box: given one
//! de-interleaved stereo frame it returns a single raw bearing in
//! `[0, 180]` degrees. This crate defines the boundary as a trait so the
//! rest of the pipeline is testable without a real embedded kernel, and
//! ships one reference implementation (a plain time-delay/cross-correlation
//! estimator) good enough to drive the conditioner and tracker in tests and
//! the demo binary.

use crate::config::KernelConfig;

/// One frame is 512 interleaved stereo pairs at 16 kHz (32 ms).
pub const SAMPLES_PER_FRAME: usize = 512;

/// Implemented by the per-frame DOA kernel. `process` is called once per
/// full frame on the pipeline's worker thread and must not block.
pub trait DoaKernel: Send {
    fn process(&mut self, left: &[i16; SAMPLES_PER_FRAME], right: &[i16; SAMPLES_PER_FRAME]) -> f32;
}

/// A simple two-microphone time-delay estimator.
///
/// Finds the lag (in samples, within the geometrically possible range for
/// the configured mic spacing) that maximizes the cross-correlation between
/// the two channels, then converts that lag to a bearing via
/// `acos(delay_seconds * sound_speed / mic_distance)`, which places
/// broadside (zero delay) at 90° and the two endfire directions at the
/// lag extremes — matching the `[0, 180]` convention this pipeline expects
/// upstream of it.
pub struct PhaseDifferenceKernel {
    sample_rate_hz: u32,
    sound_speed_mps: f32,
    mic_distance_m: f32,
    max_lag_samples: usize,
}

impl PhaseDifferenceKernel {
    pub fn new(config: &KernelConfig) -> Self {
        let mic_distance_m = config.resolved_mic_distance_m();
        let max_lag_samples = ((mic_distance_m / config.sound_speed_mps)
            * config.sample_rate_hz as f32)
            .ceil() as usize;

        PhaseDifferenceKernel {
            sample_rate_hz: config.sample_rate_hz,
            sound_speed_mps: config.sound_speed_mps,
            mic_distance_m,
            max_lag_samples: max_lag_samples.max(1),
        }
    }

    fn correlation_at_lag(&self, left: &[f32], right: &[f32], lag: isize) -> f32 {
        let n = left.len() as isize;
        let mut sum = 0.0f32;
        let mut count = 0usize;

        let start = lag.max(0);
        let end = n.min(n + lag);
        let mut i = start;
        while i < end {
            let j = i - lag;
            if j >= 0 && j < n {
                sum += left[i as usize] * right[j as usize];
                count += 1;
            }
            i += 1;
        }

        if count == 0 {
            0.0
        } else {
            sum / count as f32
        }
    }

    fn best_lag(&self, left: &[f32], right: &[f32]) -> isize {
        let max_lag = self.max_lag_samples as isize;
        let mut best_lag = 0isize;
        let mut best_corr = f32::MIN;

        for lag in -max_lag..=max_lag {
            let corr = self.correlation_at_lag(left, right, lag);
            if corr > best_corr {
                best_corr = corr;
                best_lag = lag;
            }
        }

        best_lag
    }
}

impl DoaKernel for PhaseDifferenceKernel {
    fn process(&mut self, left: &[i16; SAMPLES_PER_FRAME], right: &[i16; SAMPLES_PER_FRAME]) -> f32 {
        let left_f: Vec<f32> = left.iter().map(|&s| s as f32).collect();
        let right_f: Vec<f32> = right.iter().map(|&s| s as f32).collect();

        let lag = self.best_lag(&left_f, &right_f);
        let delay_seconds = lag as f32 / self.sample_rate_hz as f32;

        let cos_theta = (delay_seconds * self.sound_speed_mps / self.mic_distance_m).clamp(-1.0, 1.0);
        cos_theta.acos().to_degrees().clamp(0.0, 180.0)
    }
}

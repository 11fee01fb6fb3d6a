use serde::{Deserialize, Serialize};

use crate::kernel::DoaKernel;

/// A tuning profile bundling the tracker and kernel knobs, persisted as JSON
/// the same way the donor app round-trips its `ProjectManifest` through
/// `serde_json::to_string_pretty`/`from_str`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningProfile {
    pub tracker: TrackerConfig,
    pub kernel: KernelConfig,
}

impl TuningProfile {
    /// Serialize this profile to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a profile previously produced by [`TuningProfile::to_json`].
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for TuningProfile {
    fn default() -> Self {
        TuningProfile {
            tracker: TrackerConfig::default(),
            kernel: KernelConfig::default(),
        }
    }
}

/// Tuning knobs for [`crate::tracker::Tracker`]. Plain data so a caller can
/// persist/restore a tuning profile the way the donor app persists its own
/// project settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Minimum spacing between emitted outputs, in milliseconds.
    /// `0` means "emit every frame once the history buffer is full".
    pub output_interval_ms: u64,
    /// Minimum angular delta between consecutive outputs, in degrees.
    /// `0.0` disables the filter outright (see DESIGN.md for why this
    /// crate honors 0 literally rather than flooring it to the default).
    pub min_angle_change_threshold: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            output_interval_ms: 1000,
            min_angle_change_threshold: 15.0,
        }
    }
}

/// Parameters used to construct the reference [`crate::kernel::PhaseDifferenceKernel`].
/// Ignored when the caller supplies their own [`DoaKernel`] implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelConfig {
    pub sample_rate_hz: u32,
    pub sound_speed_mps: f32,
    pub mic_distance_m: f32,
    pub samples_per_frame: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        KernelConfig {
            sample_rate_hz: 16_000,
            sound_speed_mps: 343.0,
            mic_distance_m: 0.046,
            samples_per_frame: 512,
        }
    }
}

impl KernelConfig {
    /// Apply the source's documented default-substitution: a caller that
    /// passes `0.0` for the mic distance gets the reference array spacing.
    pub fn resolved_mic_distance_m(&self) -> f32 {
        if self.mic_distance_m <= 0.0 {
            0.046
        } else {
            self.mic_distance_m
        }
    }
}

/// Configuration accepted by [`crate::pipeline::Pipeline::new`].
///
/// `result_callback` is required; construction returns
/// [`crate::error::PipelineError::BadArg`] if it is absent. Both callbacks
/// run exclusively on the pipeline's worker thread and must be short and
/// non-blocking — a panicking or blocking callback stalls the pipeline by
/// design.
pub struct PipelineConfig {
    pub kernel_config: KernelConfig,
    pub tracker_config: TrackerConfig,
    /// Invoked with the calibrated (pre-tracker) angle after every frame.
    pub monitor_callback: Option<Box<dyn Fn(f32) + Send>>,
    /// Invoked with the tracker's stabilized output angle whenever one is
    /// emitted. Required.
    pub result_callback: Option<Box<dyn Fn(f32) + Send>>,
    /// A caller-supplied kernel implementation. When `None`, the pipeline
    /// builds the reference [`crate::kernel::PhaseDifferenceKernel`] from
    /// `kernel_config`.
    pub kernel: Option<Box<dyn DoaKernel>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            kernel_config: KernelConfig::default(),
            tracker_config: TrackerConfig::default(),
            monitor_callback: None,
            result_callback: None,
            kernel: None,
        }
    }
}

//! Real-time direction-of-arrival estimation for a two-microphone array.
//!
//! A [`Pipeline`] accepts interleaved 16-bit stereo PCM, runs it through a
//! pluggable [`DoaKernel`] to get a raw per-frame bearing, smooths and
//! calibrates that bearing, then feeds a stabilizing [`tracker::Tracker`]
//! state machine that only emits a bearing when it is confident one has
//! actually changed.

pub mod conditioner;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod kernel;
pub mod logging;
pub mod pipeline;
pub mod tracker;

pub use config::{KernelConfig, PipelineConfig, TrackerConfig, TuningProfile};
pub use error::PipelineError;
pub use kernel::{DoaKernel, PhaseDifferenceKernel};
pub use pipeline::Pipeline;

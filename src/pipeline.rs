//! The public façade: owns every pipeline resource and wires the frame
//! dispatcher's worker thread to the conditioner and tracker.
//!
//! Grounded in `MasterBus`'s start/stop-flag-over-a-stream shape and
//! `Track`'s prepare/stop-recording worker lifecycle, collapsed onto a
//! single owned worker thread since this pipeline has no audio device of
//! its own to open or close.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::dispatcher::{self, FrameWriter};
use crate::error::PipelineError;
use crate::kernel::PhaseDifferenceKernel;
use crate::tracker::Tracker;

/// Owns the worker thread and every resource that crosses the
/// caller/worker boundary. Dropping a `Pipeline` stops and joins its
/// worker before releasing anything else.
pub struct Pipeline {
    writer: Mutex<FrameWriter>,
    started: Arc<AtomicBool>,
    should_stop: Arc<AtomicBool>,
    vad_detect: Arc<AtomicBool>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl Pipeline {
    /// Build and spawn a pipeline in the stopped state. Fails with
    /// [`PipelineError::BadArg`] if `result_callback` is absent — it is
    /// the only required field in [`PipelineConfig`].
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let result_callback = config
            .result_callback
            .ok_or_else(|| PipelineError::bad_arg("result_callback is required"))?;
        let monitor_callback = config.monitor_callback;

        let kernel = match config.kernel {
            Some(kernel) => kernel,
            None => Box::new(PhaseDifferenceKernel::new(&config.kernel_config)),
        };

        let started = Arc::new(AtomicBool::new(false));
        let should_stop = Arc::new(AtomicBool::new(false));
        let vad_detect = Arc::new(AtomicBool::new(true));

        let mut tracker = Tracker::new(config.tracker_config);

        let on_angle = move |calibrated: f32| {
            if let Some(monitor) = &monitor_callback {
                monitor(calibrated);
            }
            if let Some(output) = tracker.feed(calibrated, Instant::now()) {
                result_callback(output);
            }
        };

        let (writer, worker) = dispatcher::spawn(
            kernel,
            Arc::clone(&started),
            Arc::clone(&should_stop),
            on_angle,
        );

        Ok(Pipeline {
            writer: Mutex::new(writer),
            started,
            should_stop,
            vad_detect,
            worker: Some(worker),
        })
    }

    /// Start (or resume) frame processing. Idempotent.
    pub fn start(&self) {
        self.started.store(true, Ordering::Relaxed);
    }

    /// Stop frame processing without dropping queued or in-flight state.
    /// Idempotent; does not drain the ring buffer.
    pub fn stop(&self) {
        self.started.store(false, Ordering::Relaxed);
    }

    /// Gate `data_write` on an externally computed voice-activity signal.
    /// `Relaxed` ordering is enough: at worst one frame is admitted or
    /// dropped around a VAD transition, which spec.md treats as
    /// acceptable rather than a correctness bug.
    pub fn set_vad_detect(&self, detect: bool) {
        self.vad_detect.store(detect, Ordering::Relaxed);
    }

    /// Enqueue raw PCM bytes. A closed VAD gate silently discards the
    /// write (reported as success); a full ring buffer after a short
    /// bounded wait is reported as [`PipelineError::QueueFull`].
    pub fn data_write(&self, bytes: &[u8]) -> Result<(), PipelineError> {
        if !self.vad_detect.load(Ordering::Relaxed) {
            return Ok(());
        }
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| PipelineError::failed("frame writer lock poisoned"))?;
        writer.write(bytes)
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.started.store(false, Ordering::Relaxed);
        self.should_stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("doa pipeline worker thread panicked during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;
    use crate::kernel::{DoaKernel, SAMPLES_PER_FRAME};
    use std::sync::mpsc;
    use std::time::Duration;

    struct ConstantKernel(f32);
    impl DoaKernel for ConstantKernel {
        fn process(&mut self, _left: &[i16; SAMPLES_PER_FRAME], _right: &[i16; SAMPLES_PER_FRAME]) -> f32 {
            self.0
        }
    }

    fn silent_frame() -> Vec<u8> {
        vec![0u8; dispatcher::FRAME_BYTES]
    }

    #[test]
    fn new_without_result_callback_is_bad_arg() {
        let config = PipelineConfig {
            kernel_config: KernelConfig::default(),
            tracker_config: Default::default(),
            monitor_callback: None,
            result_callback: None,
            kernel: None,
        };
        let err = Pipeline::new(config).unwrap_err();
        assert!(matches!(err, PipelineError::BadArg(_)));
    }

    #[test]
    fn stopped_pipeline_never_invokes_callbacks() {
        let (tx, rx) = mpsc::channel();
        let config = PipelineConfig {
            kernel_config: KernelConfig::default(),
            tracker_config: Default::default(),
            monitor_callback: None,
            result_callback: Some(Box::new(move |angle| {
                let _ = tx.send(angle);
            })),
            kernel: Some(Box::new(ConstantKernel(90.0))),
        };
        let pipeline = Pipeline::new(config).unwrap();
        pipeline.data_write(&silent_frame()).unwrap();
        std::thread::sleep(Duration::from_millis(60));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn started_pipeline_drives_monitor_callback() {
        let (tx, rx) = mpsc::channel();
        let config = PipelineConfig {
            kernel_config: KernelConfig::default(),
            tracker_config: Default::default(),
            monitor_callback: Some(Box::new(move |angle| {
                let _ = tx.send(angle);
            })),
            result_callback: Some(Box::new(|_angle| {})),
            kernel: Some(Box::new(ConstantKernel(45.0))),
        };
        let pipeline = Pipeline::new(config).unwrap();
        pipeline.start();
        pipeline.data_write(&silent_frame()).unwrap();

        let angle = rx.recv_timeout(Duration::from_millis(500)).expect("expected a monitor callback");
        assert!((0.0..=180.0).contains(&angle));
    }

    #[test]
    fn closed_vad_gate_drops_writes_silently() {
        let (tx, rx) = mpsc::channel();
        let config = PipelineConfig {
            kernel_config: KernelConfig::default(),
            tracker_config: Default::default(),
            monitor_callback: Some(Box::new(move |angle| {
                let _ = tx.send(angle);
            })),
            result_callback: Some(Box::new(|_angle| {})),
            kernel: Some(Box::new(ConstantKernel(45.0))),
        };
        let pipeline = Pipeline::new(config).unwrap();
        pipeline.start();
        pipeline.set_vad_detect(false);
        pipeline.data_write(&silent_frame()).unwrap();
        std::thread::sleep(Duration::from_millis(60));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn stop_then_start_resumes_processing() {
        let (tx, rx) = mpsc::channel();
        let config = PipelineConfig {
            kernel_config: KernelConfig::default(),
            tracker_config: Default::default(),
            monitor_callback: Some(Box::new(move |angle| {
                let _ = tx.send(angle);
            })),
            result_callback: Some(Box::new(|_angle| {})),
            kernel: Some(Box::new(ConstantKernel(45.0))),
        };
        let pipeline = Pipeline::new(config).unwrap();
        pipeline.start();
        pipeline.stop();
        pipeline.data_write(&silent_frame()).unwrap();
        std::thread::sleep(Duration::from_millis(60));
        assert!(rx.try_recv().is_err());

        pipeline.start();
        rx.recv_timeout(Duration::from_millis(500)).expect("expected processing to resume");
    }
}

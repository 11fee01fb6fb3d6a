//! The frame dispatcher: a lock-free byte ring buffer between the caller's
//! `data_write` thread and the pipeline's single worker thread, plus the
//! worker loop that turns whole PCM frames into raw kernel angles.
//!
//! Mirrors the teacher's `Track::prepare_recording` / `waveform_thread`
//! split: the public-facing side only ever touches a `HeapProd`, a
//! background thread owns the `HeapCons` and the "should stop" flag, and
//! the two communicate exclusively through the ring buffer and a shared
//! `Arc<AtomicBool>`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::conditioner::Conditioner;
use crate::error::PipelineError;
use crate::kernel::{DoaKernel, SAMPLES_PER_FRAME};

/// `512` interleaved stereo `i16` pairs, little-endian.
pub const FRAME_BYTES: usize = SAMPLES_PER_FRAME * 2 * 2;
const RING_CAPACITY: usize = FRAME_BYTES * 3;

const STARTED_POLL: Duration = Duration::from_millis(10);
const FRAME_WAIT: Duration = Duration::from_millis(10);
const ENQUEUE_WAIT: Duration = Duration::from_millis(10);

/// The caller-facing half of the dispatcher: just a byte producer and the
/// shared flags the worker thread watches. Lives inside `Pipeline`.
pub struct FrameWriter {
    producer: HeapProd<u8>,
}

impl FrameWriter {
    /// Append raw PCM bytes to the ring buffer. Never blocks longer than a
    /// short bounded wait for space; a buffer that stays full for that
    /// whole wait is reported as [`PipelineError::QueueFull`] rather than
    /// dropped silently.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), PipelineError> {
        if bytes.is_empty() {
            return Ok(());
        }

        let deadline = std::time::Instant::now() + ENQUEUE_WAIT;
        let mut offset = 0;
        while offset < bytes.len() {
            let pushed = self.producer.push_slice(&bytes[offset..]);
            offset += pushed;
            if offset == bytes.len() {
                break;
            }
            if std::time::Instant::now() >= deadline {
                tracing::debug!(
                    queued = offset,
                    requested = bytes.len(),
                    "ring buffer stayed full past the enqueue wait, rejecting write"
                );
                return Err(PipelineError::QueueFull);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok(())
    }
}

/// Spawn the worker thread and return the [`FrameWriter`] half plus the
/// shared `started` flag the façade toggles on `start`/`stop`.
///
/// `on_angle` is called with every calibrated angle the conditioner
/// produces (i.e. once per full frame while started) and is expected to
/// forward it into the tracker and the result callback; it runs entirely
/// on the worker thread, same as the teacher's waveform thread owns all
/// its own state.
pub fn spawn<F>(
    mut kernel: Box<dyn DoaKernel>,
    started: Arc<AtomicBool>,
    should_stop: Arc<AtomicBool>,
    mut on_angle: F,
) -> (FrameWriter, std::thread::JoinHandle<()>)
where
    F: FnMut(f32) + Send + 'static,
{
    let ring = HeapRb::<u8>::new(RING_CAPACITY);
    let (producer, mut consumer) = ring.split();

    let handle = std::thread::spawn(move || {
        let mut conditioner = Conditioner::new();
        let mut frame_buf = [0u8; FRAME_BYTES];
        let mut left = [0i16; SAMPLES_PER_FRAME];
        let mut right = [0i16; SAMPLES_PER_FRAME];

        loop {
            if should_stop.load(Ordering::Relaxed) {
                break;
            }

            if !started.load(Ordering::Relaxed) {
                std::thread::sleep(STARTED_POLL);
                continue;
            }

            if !fill_frame(&mut consumer, &mut frame_buf) {
                std::thread::sleep(FRAME_WAIT);
                continue;
            }

            deinterleave(&frame_buf, &mut left, &mut right);
            let raw_angle = kernel.process(&left, &right);
            let calibrated = conditioner.condition(raw_angle);
            on_angle(calibrated);
        }
    });

    (FrameWriter { producer }, handle)
}

/// Pull exactly one full frame out of the ring buffer, or leave it
/// untouched and report failure if fewer than `FRAME_BYTES` are available.
fn fill_frame(consumer: &mut HeapCons<u8>, out: &mut [u8; FRAME_BYTES]) -> bool {
    let occupied = consumer.occupied_len();
    if occupied < FRAME_BYTES {
        tracing::trace!(occupied, needed = FRAME_BYTES, "less than one full frame buffered, yielding");
        return false;
    }
    let n = consumer.pop_slice(out);
    debug_assert_eq!(n, FRAME_BYTES);
    true
}

fn deinterleave(
    frame: &[u8; FRAME_BYTES],
    left: &mut [i16; SAMPLES_PER_FRAME],
    right: &mut [i16; SAMPLES_PER_FRAME],
) {
    for i in 0..SAMPLES_PER_FRAME {
        let base = i * 4;
        left[i] = i16::from_le_bytes([frame[base], frame[base + 1]]);
        right[i] = i16::from_le_bytes([frame[base + 2], frame[base + 3]]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    struct ConstantKernel(f32);
    impl DoaKernel for ConstantKernel {
        fn process(&mut self, _left: &[i16; SAMPLES_PER_FRAME], _right: &[i16; SAMPLES_PER_FRAME]) -> f32 {
            self.0
        }
    }

    fn silent_frame() -> Vec<u8> {
        vec![0u8; FRAME_BYTES]
    }

    #[test]
    fn a_full_frame_triggers_exactly_one_angle_callback() {
        let started = Arc::new(AtomicBool::new(true));
        let should_stop = Arc::new(AtomicBool::new(false));
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = Arc::clone(&count);

        let (mut writer, handle) = spawn(
            Box::new(ConstantKernel(90.0)),
            Arc::clone(&started),
            Arc::clone(&should_stop),
            move |_angle| {
                count_clone.fetch_add(1, Ordering::Relaxed);
            },
        );

        writer.write(&silent_frame()).unwrap();
        std::thread::sleep(Duration::from_millis(100));

        should_stop.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn worker_ignores_frames_while_stopped() {
        let started = Arc::new(AtomicBool::new(false));
        let should_stop = Arc::new(AtomicBool::new(false));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let (mut writer, handle) = spawn(
            Box::new(ConstantKernel(45.0)),
            Arc::clone(&started),
            Arc::clone(&should_stop),
            move |angle| seen_clone.lock().unwrap().push(angle),
        );

        writer.write(&silent_frame()).unwrap();
        std::thread::sleep(Duration::from_millis(60));
        assert!(seen.lock().unwrap().is_empty());

        started.store(true, Ordering::Relaxed);
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(seen.lock().unwrap().len(), 1);

        should_stop.store(true, Ordering::Relaxed);
        handle.join().unwrap();
    }

    #[test]
    fn write_rejects_when_the_ring_stays_full() {
        let started = Arc::new(AtomicBool::new(false));
        let should_stop = Arc::new(AtomicBool::new(false));

        let (mut writer, handle) = spawn(
            Box::new(ConstantKernel(90.0)),
            Arc::clone(&started),
            Arc::clone(&should_stop),
            |_angle| {},
        );

        // Worker never starts, so the ring fills up and stays full.
        let big = vec![0u8; RING_CAPACITY + FRAME_BYTES];
        let result = writer.write(&big);
        assert!(matches!(result, Err(PipelineError::QueueFull)));

        should_stop.store(true, Ordering::Relaxed);
        handle.join().unwrap();
    }
}

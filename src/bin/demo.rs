//! Streams synthetic two-microphone PCM through a [`doa_tracker::Pipeline`]
//! and prints every stabilized bearing it emits. The donor app's
//! `src/bin/debug.rs` drives its processing pipeline from a WAV file; this
//! demo instead synthesizes frames directly (no `rand` dependency, so the
//! sweep is fully deterministic run to run).

use std::f32::consts::PI;
use std::sync::mpsc;
use std::time::Duration;

use doa_tracker::kernel::SAMPLES_PER_FRAME;
use doa_tracker::{KernelConfig, Pipeline, PipelineConfig};

/// Build one 2048-byte interleaved stereo frame for a source at `angle_deg`
/// off the array's broadside, as a fixed-frequency tone with the
/// inter-channel sample delay a phase-difference kernel expects.
fn synthetic_frame(angle_deg: f32, kernel_config: &KernelConfig, phase: &mut f32) -> Vec<u8> {
    const TONE_HZ: f32 = 500.0;
    let sample_rate = kernel_config.sample_rate_hz as f32;
    let mic_distance = kernel_config.resolved_mic_distance_m();

    let delay_seconds =
        (mic_distance / kernel_config.sound_speed_mps) * angle_deg.to_radians().cos();
    let delay_samples = (delay_seconds * sample_rate).round() as isize;

    let mut bytes = Vec::with_capacity(SAMPLES_PER_FRAME * 4);
    for i in 0..SAMPLES_PER_FRAME {
        let left_phase = *phase + 2.0 * PI * TONE_HZ * (i as f32) / sample_rate;
        let right_phase = *phase + 2.0 * PI * TONE_HZ * ((i as isize - delay_samples) as f32) / sample_rate;

        let left = (left_phase.sin() * 8000.0) as i16;
        let right = (right_phase.sin() * 8000.0) as i16;

        bytes.extend_from_slice(&left.to_le_bytes());
        bytes.extend_from_slice(&right.to_le_bytes());
    }
    *phase += 2.0 * PI * TONE_HZ * (SAMPLES_PER_FRAME as f32) / sample_rate;

    bytes
}

fn main() {
    doa_tracker::logging::init_tracing();

    let (tx, rx) = mpsc::channel();
    let kernel_config = KernelConfig::default();

    let config = PipelineConfig {
        kernel_config: kernel_config.clone(),
        result_callback: Some(Box::new(move |angle| {
            let _ = tx.send(angle);
        })),
        ..Default::default()
    };

    let pipeline = Pipeline::new(config).expect("pipeline configuration is valid");
    pipeline.start();

    // Sweep a source from one endfire extreme to the other, 10 degrees at
    // a time, holding each bearing for a handful of frames.
    let mut phase = 0.0f32;
    let mut angle = 10.0f32;
    while angle <= 170.0 {
        for _ in 0..8 {
            let frame = synthetic_frame(angle, &kernel_config, &mut phase);
            if let Err(err) = pipeline.data_write(&frame) {
                eprintln!("data_write failed: {err}");
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        angle += 10.0;
    }

    std::thread::sleep(Duration::from_millis(200));
    pipeline.stop();

    while let Ok(bearing) = rx.recv_timeout(Duration::from_millis(50)) {
        println!("tracked bearing: {bearing:.1} deg");
    }
}

//! The DOA tracker: a small state machine with a short circular history
//! that rejects spurious bearings, detects a "front-facing" mode,
//! quantizes angles, and rate-limits output. This is the largest single
//! component of the pipeline.

use std::time::Instant;

use crate::config::TrackerConfig;

const BUF_SIZE: usize = 6;
const SILENT_ANGLE: f32 = 90.0;
const SILENT_EPS: f32 = 6.0;
const QUANT_STEP: f32 = 20.0;
const INITIAL_SAMPLES: usize = 3;
const GRADUAL_THRESH: f32 = 20.0;
const MAJOR_CHANGE: f32 = 30.0;
const REASONABLE_CHANGE: f32 = 40.0;
const CONTINUOUS_90_MS: u64 = 1000;
const BUFFER_90_RATIO: f32 = 2.0 / 3.0;
const RECENT_WEIGHT: f32 = 3.0;

fn is_near_90(angle: f32) -> bool {
    (angle - SILENT_ANGLE).abs() < SILENT_EPS
}

fn edge_bias(avg: f32, min: f32, max: f32) -> f32 {
    if (110.0..=180.0).contains(&avg) {
        0.3 * avg + 0.7 * max
    } else if (0.0..=40.0).contains(&avg) {
        0.3 * avg + 0.7 * min
    } else {
        avg
    }
}

pub struct Tracker {
    buffer: [f32; BUF_SIZE],
    original_buffer: [f32; BUF_SIZE],
    valid_mask: [bool; BUF_SIZE],
    write_index: usize,
    valid_count: usize,

    is_front_facing_mode: bool,
    is_not_front_facing_detected: bool,
    probe_done: bool,

    last_valid_angle: Option<f32>,
    last_output_angle: Option<f32>,
    near_90_since: Option<Instant>,
    last_output_tick: Option<Instant>,

    enabled: bool,

    output_interval_ms: u64,
    min_angle_change_threshold: f32,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        Tracker {
            buffer: [0.0; BUF_SIZE],
            original_buffer: [0.0; BUF_SIZE],
            valid_mask: [false; BUF_SIZE],
            write_index: 0,
            valid_count: 0,
            is_front_facing_mode: false,
            is_not_front_facing_detected: false,
            probe_done: false,
            last_valid_angle: None,
            last_output_angle: None,
            near_90_since: None,
            last_output_tick: None,
            enabled: true,
            output_interval_ms: config.output_interval_ms,
            min_angle_change_threshold: config.min_angle_change_threshold,
        }
    }

    pub fn is_front_facing(&self) -> bool {
        self.is_front_facing_mode
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Resets all tracker state then sets (or clears) `enabled`.
    pub fn enable(&mut self, enabled: bool) {
        self.full_reset();
        self.enabled = enabled;
    }

    /// Feed one calibrated angle. Returns `Some(angle)` at most once per
    /// call, exactly when the tracker decides to emit a new stabilized
    /// bearing.
    pub fn feed(&mut self, angle: f32, now: Instant) -> Option<f32> {
        if !self.enabled || !angle.is_finite() {
            return None;
        }

        if !self.is_angle_valid(angle, now) {
            return None;
        }

        if self.valid_count == BUF_SIZE {
            let avg = self.weighted_avg();
            if (angle - avg).abs() > MAJOR_CHANGE {
                self.major_jump_reset();
            }
        }

        let q = quantize(angle);

        let idx = self.write_index;
        self.buffer[idx] = q;
        self.original_buffer[idx] = angle;
        if !self.valid_mask[idx] {
            self.valid_mask[idx] = true;
            self.valid_count += 1;
        }
        self.write_index = (idx + 1) % BUF_SIZE;

        self.last_valid_angle = Some(q);

        self.run_initial_probe();

        self.decide_output(now)
    }

    fn run_initial_probe(&mut self) {
        if self.probe_done || self.valid_count < INITIAL_SAMPLES {
            return;
        }

        let mut examined = 0;
        let mut all_near_90 = true;
        for i in 0..BUF_SIZE {
            if !self.valid_mask[i] {
                continue;
            }
            if !is_near_90(self.original_buffer[i]) {
                all_near_90 = false;
            }
            examined += 1;
            if examined == INITIAL_SAMPLES {
                break;
            }
        }

        if all_near_90 {
            self.is_front_facing_mode = true;
        } else {
            self.is_not_front_facing_detected = true;
        }
        self.probe_done = true;
    }

    fn is_angle_valid(&mut self, angle: f32, now: Instant) -> bool {
        if !is_near_90(angle) {
            self.near_90_since = None;
            return true;
        }

        if self.is_front_facing_mode {
            return true;
        }

        let started_at = *self.near_90_since.get_or_insert(now);
        let elapsed_ms = now.saturating_duration_since(started_at).as_millis() as u64;
        if elapsed_ms >= CONTINUOUS_90_MS {
            self.is_front_facing_mode = true;
            return true;
        }

        if self.valid_count < INITIAL_SAMPLES {
            return true;
        }

        match self.last_valid_angle {
            None => self.buffer_mostly_90(),
            Some(last) if is_near_90(last) => (angle - last).abs() < GRADUAL_THRESH,
            Some(last) => {
                // Note: the continuous-90 timer started above is *not*
                // reset here on a mere rejection — only an actual non-90
                // reading (the branch at the top of this function)
                // interrupts it. Otherwise a run of corroboration-failing
                // near-90 readings could never accumulate the
                // CONTINUOUS_90_MS window needed to promote.
                if self.check_gradual_change_to_90(angle, last) {
                    true
                } else if self.is_not_front_facing_detected {
                    false
                } else {
                    self.buffer_mostly_90()
                }
            }
        }
    }

    fn check_gradual_change_to_90(&self, angle: f32, last: f32) -> bool {
        if (angle - last).abs() >= GRADUAL_THRESH {
            return false;
        }
        if !((angle - 90.0).abs() < (last - 90.0).abs()) {
            return false;
        }

        let mut idx = (self.write_index + BUF_SIZE - 1) % BUF_SIZE;
        let mut recent = [0.0f32; 3];
        for slot in recent.iter_mut() {
            if !self.valid_mask[idx] {
                return false;
            }
            *slot = self.buffer[idx];
            idx = (idx + BUF_SIZE - 1) % BUF_SIZE;
        }

        let d0 = (recent[0] - 90.0).abs();
        let d1 = (recent[1] - 90.0).abs();
        let d2 = (recent[2] - 90.0).abs();
        d2 > d1 && d1 > d0
    }

    fn buffer_mostly_90(&self) -> bool {
        if self.valid_count == 0 {
            return false;
        }
        let near_count = (0..BUF_SIZE)
            .filter(|&i| self.valid_mask[i] && is_near_90(self.original_buffer[i]))
            .count();
        let threshold = (self.valid_count as f32 * BUFFER_90_RATIO).ceil() as usize;
        near_count >= threshold
    }

    fn weighted_avg(&self) -> f32 {
        let newest_idx = (self.write_index + BUF_SIZE - 1) % BUF_SIZE;
        let mut sum = 0.0f32;
        let mut weight_sum = 0.0f32;
        for i in 0..BUF_SIZE {
            if !self.valid_mask[i] {
                continue;
            }
            let w = if i == newest_idx { RECENT_WEIGHT } else { 1.0 };
            sum += self.buffer[i] * w;
            weight_sum += w;
        }
        sum / weight_sum
    }

    fn first_avg(&self) -> f32 {
        let mut sum = 0.0f32;
        let mut count = 0usize;
        for i in 0..BUF_SIZE {
            if self.valid_mask[i] {
                sum += self.buffer[i];
                count += 1;
            }
        }
        sum / count as f32
    }

    fn min_max(&self) -> (f32, f32) {
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        for i in 0..BUF_SIZE {
            if self.valid_mask[i] {
                min = min.min(self.buffer[i]);
                max = max.max(self.buffer[i]);
            }
        }
        (min, max)
    }

    fn should_allow_90_output(&self, now: Instant) -> bool {
        if !self.buffer_mostly_90() {
            return false;
        }
        if self.is_front_facing_mode {
            return true;
        }
        match self.near_90_since {
            Some(t) => now.saturating_duration_since(t).as_millis() as u64 >= CONTINUOUS_90_MS,
            None => false,
        }
    }

    fn decide_output(&mut self, now: Instant) -> Option<f32> {
        if self.valid_count < BUF_SIZE {
            return None;
        }

        if self.last_output_angle.is_none() {
            let (min, max) = self.min_max();
            let out = edge_bias(self.first_avg(), min, max);
            self.last_output_angle = Some(out);
            self.last_output_tick = Some(now);
            return Some(out);
        }

        let interval_elapsed = match (self.output_interval_ms, self.last_output_tick) {
            (0, _) => true,
            (_, None) => true,
            (interval, Some(last_tick)) => {
                now.saturating_duration_since(last_tick).as_millis() as u64 >= interval
            }
        };
        if !interval_elapsed {
            return None;
        }

        let (min, max) = self.min_max();
        let avg = edge_bias(self.weighted_avg(), min, max);

        if (avg - SILENT_ANGLE).abs() < 5.0 && !self.should_allow_90_output(now) {
            return None;
        }

        let last_output = self.last_output_angle.expect("checked above");
        let delta = (avg - last_output).abs();
        if delta > REASONABLE_CHANGE {
            return None;
        }
        if self.min_angle_change_threshold > 0.0 && delta < self.min_angle_change_threshold {
            return None;
        }

        self.last_output_angle = Some(avg);
        self.last_output_tick = Some(now);
        Some(avg)
    }

    /// Reset triggered by a major jump mid-stream. Resets the history
    /// buffer, timers, and mode flags, but leaves the one-shot initial
    /// probe marked as fired — it never re-arms after the first pass
    /// over a freshly constructed (or re-enabled) tracker. By the time a
    /// major jump can be detected, `valid_count` has already reached
    /// `BUF_SIZE`, so the probe has necessarily already run.
    fn major_jump_reset(&mut self) {
        self.buffer = [0.0; BUF_SIZE];
        self.original_buffer = [0.0; BUF_SIZE];
        self.valid_mask = [false; BUF_SIZE];
        self.write_index = 0;
        self.valid_count = 0;
        self.is_front_facing_mode = false;
        self.is_not_front_facing_detected = false;
        self.last_valid_angle = None;
        self.last_output_angle = None;
        self.last_output_tick = None;
        self.near_90_since = None;
    }

    /// Full reset to the just-constructed state, including the one-shot
    /// probe. Used by `enable`/`disable`.
    fn full_reset(&mut self) {
        self.major_jump_reset();
        self.probe_done = false;
    }
}

fn quantize(angle: f32) -> f32 {
    let clamped = angle.clamp(0.0, 180.0);
    let mut bin = (clamped / QUANT_STEP).floor() as i32;
    if bin >= 9 {
        bin = 8;
    }
    if bin < 0 {
        bin = 0;
    }
    bin as f32 * QUANT_STEP + 10.0
}

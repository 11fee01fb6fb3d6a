//! Gaussian-weighted moving average smoothing plus the non-linear
//! edge-bias calibration applied to every raw kernel angle before it
//! reaches the tracker.

const HISTORY_LEN: usize = 7;
const GAUSSIAN_SIGMA: f32 = 1.0;
const GAUSSIAN_CENTER: f32 = (HISTORY_LEN as f32 - 1.0) / 2.0;

fn gaussian_weights() -> [f32; HISTORY_LEN] {
    let mut weights = [0.0f32; HISTORY_LEN];
    let mut sum = 0.0f32;

    for (i, w) in weights.iter_mut().enumerate() {
        let d = i as f32 - GAUSSIAN_CENTER;
        *w = (-(d * d) / (2.0 * GAUSSIAN_SIGMA * GAUSSIAN_SIGMA)).exp();
        sum += *w;
    }

    for w in weights.iter_mut() {
        *w /= sum;
    }

    weights
}

/// Clamp a raw angle into `[0, 180]` and amplify its deviation from
/// broadside (90°) by up to 25% at the endfire extremes, compensating for
/// the sinusoidal compression a phase-difference kernel exhibits near its
/// own axial directions.
pub fn calibrate(filtered: f32) -> f32 {
    let filtered = filtered.clamp(0.0, 180.0);
    let off = filtered - 90.0;
    let k = 1.0 + (off.abs() / 90.0) * 0.25;
    (90.0 + off * k).clamp(0.0, 180.0)
}

/// Conditions a stream of raw kernel angles: a circular history buffer of
/// the last 7 readings plus a precomputed Gaussian weight vector.
pub struct Conditioner {
    history: [f32; HISTORY_LEN],
    idx: usize,
    weights: [f32; HISTORY_LEN],
}

impl Conditioner {
    pub fn new() -> Self {
        Conditioner {
            history: [0.0; HISTORY_LEN],
            idx: 0,
            weights: gaussian_weights(),
        }
    }

    /// Feed one raw kernel angle; returns the calibrated angle that should
    /// be forwarded to the monitor callback and the tracker.
    ///
    /// A kernel failure can surface as an out-of-range or NaN angle; both
    /// are clamped into `[0, 180]` before entering history so one bad
    /// reading from the kernel can't poison the smoothing window with NaN.
    pub fn condition(&mut self, raw_angle: f32) -> f32 {
        let raw_angle = if raw_angle.is_finite() {
            raw_angle.clamp(0.0, 180.0)
        } else {
            90.0
        };
        self.history[self.idx] = raw_angle;
        self.idx = (self.idx + 1) % HISTORY_LEN;

        let mut filtered = 0.0f32;
        let mut weight_sum = 0.0f32;
        for i in 0..HISTORY_LEN {
            let pos = (self.idx + HISTORY_LEN - 1 - i) % HISTORY_LEN;
            filtered += self.history[pos] * self.weights[i];
            weight_sum += self.weights[i];
        }
        filtered /= weight_sum;

        calibrate(filtered)
    }
}

impl Default for Conditioner {
    fn default() -> Self {
        Self::new()
    }
}

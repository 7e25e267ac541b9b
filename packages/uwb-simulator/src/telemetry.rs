//! telemetry.rs — Per-epoch ground-truth vs. estimate records and running stats

use serde::Serialize;
use uwb_types::{CalculationResult, ResultKind, Vec3};

/// One JSON line per epoch on stdout.
#[derive(Debug, Clone, Serialize)]
pub struct EpochTelemetry {
    pub epoch: u32,
    pub t_s: f32,
    pub truth: Vec3,
    pub result: CalculationResult,
    /// Distance from truth, when the result pins down a position
    pub error_m: Option<f32>,
    /// Same for the linear 4-anchor reference solve
    pub linear_error_m: Option<f32>,
    pub anchors_heard: usize,
    pub nlos: usize,
    /// Replies lost to random or scenario dropout
    pub dropped: usize,
    /// Anchors beyond radio range
    pub out_of_range: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ErrorStats {
    pub epochs: u32,
    pub resolved: u32,
    pub errored: u32,
    pub sum_error_m: f64,
    pub max_error_m: f32,
    /// Epochs per result kind: Empty, Single, Double, Trilinear, Quadlinear
    pub kinds: [u32; 5],
    pub dropped: u64,
    pub out_of_range: u64,
}

impl ErrorStats {
    pub fn record(&mut self, t: &EpochTelemetry) {
        self.epochs += 1;
        if t.result.is_errored() {
            self.errored += 1;
        }
        if let Some(e) = t.error_m {
            self.resolved += 1;
            self.sum_error_m += e as f64;
            self.max_error_m = self.max_error_m.max(e);
        }
        let slot = match t.result.kind() {
            ResultKind::Empty => 0,
            ResultKind::Single => 1,
            ResultKind::Double => 2,
            ResultKind::Trilinear => 3,
            ResultKind::Quadlinear => 4,
        };
        self.kinds[slot] += 1;
        self.dropped += t.dropped as u64;
        self.out_of_range += t.out_of_range as u64;
    }

    pub fn mean_error_m(&self) -> Option<f64> {
        (self.resolved > 0).then(|| self.sum_error_m / self.resolved as f64)
    }

    pub fn errored_fraction(&self) -> f64 {
        if self.epochs == 0 { 0.0 } else { self.errored as f64 / self.epochs as f64 }
    }
}

//! sparse.rs — Combination search used when five or more anchors are valid
//!
//! Every strictly increasing index quadruple `i < j < k < l` is a candidate
//! 4-anchor solve. The calculation level decides how many of them are tried:
//!
//! | level  | search                                              |
//! |--------|-----------------------------------------------------|
//! | Low    | first combination that resolves                     |
//! | Medium | same as Low (no separate strategy yet)              |
//! | High   | every combination, mean of all resolved positions   |
//!
//! `High` costs `C(n, 4)` three-sphere solves per calculation.

use tracing::{debug, trace};
use uwb_types::{AnchorSample, CalculationLevel, CalculationResult, Vec3};

use crate::solvers::resolve_combination;

// ── Combination enumeration ──────────────────────────────────────────────────

/// Index quadruples `[i, j, k, l]` with `i < j < k < l < n`, in nested-loop order.
#[derive(Debug, Clone)]
pub struct Combinations4 {
    n: usize,
    next: Option<[usize; 4]>,
}

impl Combinations4 {
    pub fn new(n: usize) -> Self {
        let next = if n >= 4 { Some([0, 1, 2, 3]) } else { None };
        Self { n, next }
    }

    /// `C(n, 4)`
    pub fn count_for(n: usize) -> usize {
        if n < 4 {
            return 0;
        }
        n * (n - 1) * (n - 2) * (n - 3) / 24
    }

    fn advance(&self, mut c: [usize; 4]) -> Option<[usize; 4]> {
        for pos in (0..4).rev() {
            if c[pos] < self.n - 4 + pos {
                c[pos] += 1;
                for k in pos + 1..4 {
                    c[k] = c[k - 1] + 1;
                }
                return Some(c);
            }
        }
        None
    }
}

impl Iterator for Combinations4 {
    type Item = [usize; 4];

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.advance(current);
        Some(current)
    }
}

fn pick(samples: &[AnchorSample], idx: [usize; 4]) -> [&AnchorSample; 4] {
    idx.map(|i| &samples[i])
}

// ── Policies ──────────────────────────────────────────────────────────────────

/// Resolve five or more valid anchors under the given level.
pub fn resolve(samples: &[AnchorSample], level: CalculationLevel) -> CalculationResult {
    match level {
        CalculationLevel::Low | CalculationLevel::Medium => first_resolved(samples),
        CalculationLevel::High => mean_of_resolved(samples),
    }
}

/// Low (and Medium): stop at the first combination that resolves.
/// Results are annotated `Low` whichever of the two was requested.
fn first_resolved(samples: &[AnchorSample]) -> CalculationResult {
    let n = samples.len();
    let found = Combinations4::new(n).find_map(|idx| {
        let position = resolve_combination(pick(samples, idx));
        trace!(?idx, resolved = position.is_some(), "combination");
        position
    });

    match found {
        Some(position) => CalculationResult::resolved(position, CalculationLevel::Low, n),
        None => {
            debug!(anchors = n, "no 4-anchor combination resolved");
            CalculationResult::resolved_failed(CalculationLevel::Low, n)
        }
    }
}

/// High: resolve every combination and average the positions.
/// A search that resolves nothing is reported as a failed `Low` result.
fn mean_of_resolved(samples: &[AnchorSample]) -> CalculationResult {
    let n = samples.len();
    let mut sum = Vec3::zero();
    let mut resolved = 0usize;

    for idx in Combinations4::new(n) {
        if let Some(position) = resolve_combination(pick(samples, idx)) {
            sum += position;
            resolved += 1;
        }
    }

    debug!(
        anchors = n,
        combinations = Combinations4::count_for(n),
        resolved,
        "high level search"
    );

    if resolved == 0 {
        return CalculationResult::resolved_failed(CalculationLevel::Low, n);
    }
    CalculationResult::resolved(sum / resolved as f32, CalculationLevel::High, n)
}

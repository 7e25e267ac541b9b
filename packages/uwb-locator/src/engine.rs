//! engine.rs — Per-receiver location engine
//!
//! Owns the anchor position and anchor distance maps for one tag and turns
//! them into a `CalculationResult` on demand:
//!
//! 1. pair up ids present in both maps (ordered by id)
//! 2. drop anchors whose range sphere cannot meet the others (`filter_valid`)
//! 3. dispatch on the surviving count: 0..=4 closed form, 5+ combination search
//!
//! The engine holds no locks. Callers that mutate and calculate from
//! different threads wrap it in a mutex.

use std::collections::BTreeMap;

use tracing::debug;
use uwb_types::{AnchorSample, CalculationLevel, CalculationResult, Vec3};

use crate::solvers::{disambiguate_four, three_sphere_intersection, two_sphere_intersection};
use crate::sparse;

#[derive(Debug, Clone, Default)]
pub struct LocationEngine {
    positions: BTreeMap<u32, Vec3>,
    distances: BTreeMap<u32, f32>,
    level: CalculationLevel,
}

impl LocationEngine {
    pub fn new() -> Self { Self::default() }

    pub fn with_level(level: CalculationLevel) -> Self {
        Self { level, ..Self::default() }
    }

    pub fn level(&self) -> CalculationLevel { self.level }
    pub fn set_level(&mut self, level: CalculationLevel) { self.level = level; }

    // ── Ingest ────────────────────────────────────────────────────────────────

    pub fn set_anchor_position(&mut self, id: u32, position: Vec3) {
        self.positions.insert(id, position);
    }

    pub fn unset_anchor_position(&mut self, id: u32) {
        self.positions.remove(&id);
    }

    /// Distance in meters. Validation happens in the ingest layer (`Receiver`).
    pub fn set_anchor_distance(&mut self, id: u32, distance: f32) {
        self.distances.insert(id, distance);
    }

    pub fn unset_anchor_distance(&mut self, id: u32) {
        self.distances.remove(&id);
    }

    pub fn clear_distances(&mut self) {
        self.distances.clear();
    }

    pub fn anchor_position(&self, id: u32) -> Option<Vec3> { self.positions.get(&id).copied() }
    pub fn anchor_distance(&self, id: u32) -> Option<f32> { self.distances.get(&id).copied() }

    // ── Query ─────────────────────────────────────────────────────────────────

    /// Anchors that have both a position and a distance, ordered by id.
    pub fn samples(&self) -> Vec<AnchorSample> {
        self.positions
            .iter()
            .filter_map(|(&id, &position)| {
                self.distances
                    .get(&id)
                    .map(|&distance| AnchorSample::new(id, position, distance))
            })
            .collect()
    }

    /// Calculate from the current maps. Does not modify the engine.
    pub fn calculate(&self) -> CalculationResult {
        Self::calculate_samples(self.level, &self.samples())
    }

    /// Filter, then dispatch on the number of valid anchors.
    pub fn calculate_samples(level: CalculationLevel, samples: &[AnchorSample]) -> CalculationResult {
        let valid = filter_valid(samples);
        debug!(
            offered = samples.len(),
            valid = valid.len(),
            ?level,
            "calculate"
        );

        match valid.as_slice() {
            [] => CalculationResult::empty(),
            [a] => CalculationResult::single_point(a),
            [a, b] => CalculationResult::circle(two_sphere_intersection(a, b)),
            [a, b, c] => match three_sphere_intersection(a, b, c) {
                Some((p, q)) => CalculationResult::two_candidate(p, q),
                None => CalculationResult::two_candidate_failed(),
            },
            [a, b, c, d] => disambiguate_four([a, b, c, d], level),
            _ => sparse::resolve(&valid, level),
        }
    }
}

// ── Outlier filter ────────────────────────────────────────────────────────────

/// Drop anchors whose range sphere cannot reach the others.
///
/// A pair fails when the anchors are further apart than the sum of their
/// ranges. With fewer than three samples one failure disqualifies an anchor;
/// with three or more an anchor is dropped at two failures. Best effort only:
/// a bad range can still pass if it is too short rather than too long.
pub fn filter_valid(samples: &[AnchorSample]) -> Vec<AnchorSample> {
    let n = samples.len();
    let mut failures = vec![0u32; n];

    for i in 0..n {
        for j in i + 1..n {
            let (a, b) = (&samples[i], &samples[j]);
            let reach = a.distance + b.distance;
            if a.position.sqr_distance(b.position) > reach * reach {
                failures[i] += 1;
                failures[j] += 1;
            }
        }
    }

    let tolerated = if n < 3 { 0 } else { 1 };
    samples
        .iter()
        .zip(&failures)
        .filter_map(|(sample, &count)| {
            if count > tolerated {
                debug!(anchor = sample.id, failures = count, "dropping inconsistent anchor");
                None
            } else {
                Some(*sample)
            }
        })
        .collect()
}

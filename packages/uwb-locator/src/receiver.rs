//! receiver.rs — Anchor bookkeeping for one receiving tag
//!
//! A `Receiver` sits between the transport (whatever delivers range packets)
//! and its `LocationEngine`. It:
//!   1. validates incoming range samples and converts them to meters
//!   2. remembers when each anchor was last heard from
//!   3. expires anchors older than the discard interval
//!   4. recalculates automatically according to its `UpdateLevel`
//!
//! Anchor positions are not carried by range packets; they are set out of
//! band with `set_anchor_position`.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uwb_types::{CalculationLevel, CalculationResult, UpdateLevel, Vec3};

use crate::config::LocatorConfig;
use crate::engine::LocationEngine;
use crate::error::IngestError;

// ── Samples & Events ──────────────────────────────────────────────────────────

/// One ranging measurement between the receiver and an anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeSample {
    pub anchor_id: u32,
    pub distance_m: f32,
}

impl RangeSample {
    pub fn new(anchor_id: u32, distance_m: f32) -> Self {
        Self { anchor_id, distance_m }
    }

    /// Radios report integer millimetres.
    pub fn from_millimeters(anchor_id: u32, distance_mm: i32) -> Self {
        Self { anchor_id, distance_m: distance_mm as f32 * 0.001 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorRecord {
    pub id: u32,
    /// Latest accepted range (m)
    pub distance_m: f32,
    pub last_seen: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnchorEvent {
    Appeared { id: u32, distance_m: f32 },
    Updated { id: u32, old_m: f32, new_m: f32 },
    Disappeared { id: u32 },
}

/// Outcome of one `Receiver::update` batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiverUpdate {
    pub events: Vec<AnchorEvent>,
    /// Samples refused by validation
    pub rejected: usize,
    /// Set when the batch triggered at least one recalculation
    pub result: Option<CalculationResult>,
}

// ── Receiver ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Receiver {
    serial: String,
    anchors: BTreeMap<u32, AnchorRecord>,
    engine: LocationEngine,
    update_level: UpdateLevel,
    discard_interval: Duration,
    latest: CalculationResult,
}

impl Receiver {
    pub fn new(serial: impl Into<String>, config: &LocatorConfig) -> Self {
        Self {
            serial: serial.into(),
            anchors: BTreeMap::new(),
            engine: LocationEngine::with_level(config.calculation_level),
            update_level: config.update_level,
            discard_interval: config.discard_interval(),
            latest: CalculationResult::empty(),
        }
    }

    pub fn serial(&self) -> &str { &self.serial }
    pub fn engine(&self) -> &LocationEngine { &self.engine }

    pub fn calculation_level(&self) -> CalculationLevel { self.engine.level() }
    pub fn set_calculation_level(&mut self, level: CalculationLevel) { self.engine.set_level(level); }

    pub fn update_level(&self) -> UpdateLevel { self.update_level }
    pub fn set_update_level(&mut self, level: UpdateLevel) { self.update_level = level; }

    pub fn set_anchor_position(&mut self, id: u32, position: Vec3) {
        self.engine.set_anchor_position(id, position);
    }

    pub fn unset_anchor_position(&mut self, id: u32) {
        self.engine.unset_anchor_position(id);
    }

    pub fn anchor(&self, id: u32) -> Option<&AnchorRecord> { self.anchors.get(&id) }
    pub fn anchors(&self) -> impl Iterator<Item = &AnchorRecord> { self.anchors.values() }
    pub fn anchor_ids(&self) -> impl Iterator<Item = u32> + '_ { self.anchors.keys().copied() }
    pub fn anchor_count(&self) -> usize { self.anchors.len() }

    /// Result of the most recent calculation (manual or automatic).
    pub fn latest_result(&self) -> &CalculationResult { &self.latest }

    /// Recalculate now, regardless of update level.
    pub fn calculate(&mut self) -> &CalculationResult {
        self.latest = self.engine.calculate();
        &self.latest
    }

    /// Record one sample. Returns the bookkeeping event it caused, if any.
    pub fn ingest(
        &mut self,
        sample: RangeSample,
        now: Instant,
    ) -> Result<Option<AnchorEvent>, IngestError> {
        let RangeSample { anchor_id: id, distance_m } = sample;
        if !distance_m.is_finite() {
            return Err(IngestError::NonFiniteDistance { anchor_id: id, distance: distance_m });
        }
        if distance_m < 0.0 {
            return Err(IngestError::NegativeDistance { anchor_id: id, distance: distance_m });
        }

        let event = match self.anchors.get_mut(&id) {
            Some(record) => {
                let old_m = record.distance_m;
                record.distance_m = distance_m;
                record.last_seen = now;
                (old_m != distance_m).then_some(AnchorEvent::Updated { id, old_m, new_m: distance_m })
            }
            None => {
                info!(receiver = %self.serial, anchor = id, distance_m, "anchor appeared");
                self.anchors.insert(id, AnchorRecord { id, distance_m, last_seen: now });
                Some(AnchorEvent::Appeared { id, distance_m })
            }
        };
        self.engine.set_anchor_distance(id, distance_m);

        if self.update_level == UpdateLevel::OnValueUpdate {
            self.latest = self.engine.calculate();
        }
        Ok(event)
    }

    /// Drop every anchor not heard from within the discard interval.
    pub fn expire(&mut self, now: Instant) -> Vec<AnchorEvent> {
        let stale: Vec<u32> = self
            .anchors
            .values()
            .filter(|r| now.saturating_duration_since(r.last_seen) > self.discard_interval)
            .map(|r| r.id)
            .collect();

        for &id in &stale {
            self.anchors.remove(&id);
            self.engine.unset_anchor_distance(id);
            info!(receiver = %self.serial, anchor = id, "anchor expired");
        }
        stale.into_iter().map(|id| AnchorEvent::Disappeared { id }).collect()
    }

    /// Process one batch of samples received at `now`.
    pub fn update<I>(&mut self, samples: I, now: Instant) -> ReceiverUpdate
    where
        I: IntoIterator<Item = RangeSample>,
    {
        let mut out = ReceiverUpdate::default();
        let mut recalculated = false;

        for sample in samples {
            match self.ingest(sample, now) {
                Ok(event) => {
                    out.events.extend(event);
                    recalculated |= self.update_level == UpdateLevel::OnValueUpdate;
                }
                Err(e) => {
                    warn!("receiver {}: rejected sample: {e}", self.serial);
                    out.rejected += 1;
                }
            }
        }

        out.events.extend(self.expire(now));

        if self.update_level == UpdateLevel::OnUpdate {
            self.latest = self.engine.calculate();
            recalculated = true;
        }
        if recalculated {
            out.result = Some(self.latest);
        }

        debug!(
            receiver = %self.serial,
            events = out.events.len(),
            rejected = out.rejected,
            anchors = self.anchors.len(),
            "update"
        );
        out
    }
}

//! scenarios.rs — Injectable fault scenarios for the UWB simulator
//!
//! Each scenario stresses one part of the locator: the outlier filter, the
//! staleness bookkeeping, or the combination search.

use serde::{Deserialize, Serialize};
use uwb_types::CalculationLevel;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioType {
    /// NLOS rate ×3.5 (people and racking in the ranging path)
    HighNlos,
    /// Silence some anchors periodically (power loss, blocked antenna)
    AnchorDropout,
    /// One anchor moves away from its surveyed position
    AnchorDrift,
    /// Every anchor in range, `High` level combination search
    SparseHigh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    pub active: Vec<ScenarioType>,
    pub dropout_anchor_ids: Vec<u32>,
    /// Silent epochs out of every `dropout_duration_epochs + dropout_gap_epochs`
    pub dropout_duration_epochs: u32,
    pub dropout_gap_epochs: u32,
    pub drift_anchor_id: u32,
    /// Final drift after `drift_epochs` (m)
    pub drift_m: f32,
    pub drift_epochs: u32,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            active: vec![],
            dropout_anchor_ids: vec![],
            dropout_duration_epochs: 0,
            dropout_gap_epochs: 10,
            drift_anchor_id: 0,
            drift_m: 0.0,
            drift_epochs: 1,
        }
    }
}

impl ScenarioConfig {
    pub fn has(&self, s: ScenarioType) -> bool {
        self.active.contains(&s)
    }

    pub fn is_anchor_dropped(&self, anchor_id: u32, epoch: u32) -> bool {
        if !self.has(ScenarioType::AnchorDropout) { return false; }
        if !self.dropout_anchor_ids.contains(&anchor_id) { return false; }
        let cycle = (self.dropout_duration_epochs + self.dropout_gap_epochs).max(1);
        epoch % cycle < self.dropout_duration_epochs
    }

    /// NLOS multiplier for HighNlos scenario
    pub fn nlos_multiplier(&self) -> f64 {
        if self.has(ScenarioType::HighNlos) { 3.5 } else { 1.0 }
    }

    /// Linear ramp from 0 to `drift_m` over `drift_epochs`, then held.
    pub fn drift_at(&self, epoch: u32) -> Option<(u32, f32)> {
        if !self.has(ScenarioType::AnchorDrift) { return None; }
        let progress = epoch.min(self.drift_epochs) as f32 / self.drift_epochs.max(1) as f32;
        Some((self.drift_anchor_id, self.drift_m * progress))
    }

    /// Calculation level forced by the scenario, if any
    pub fn level_override(&self) -> Option<CalculationLevel> {
        self.has(ScenarioType::SparseHigh).then_some(CalculationLevel::High)
    }

    /// Ignore the radio range limit so every anchor contributes
    pub fn unlimited_range(&self) -> bool {
        self.has(ScenarioType::SparseHigh)
    }
}

pub fn preset_high_nlos() -> ScenarioConfig {
    ScenarioConfig {
        name: "high_nlos".to_string(),
        active: vec![ScenarioType::HighNlos],
        ..Default::default()
    }
}

pub fn preset_anchor_dropout() -> ScenarioConfig {
    ScenarioConfig {
        name: "anchor_dropout".to_string(),
        active: vec![ScenarioType::AnchorDropout],
        dropout_anchor_ids: vec![2, 5],
        // Long enough to outlast the discard interval at 10 Hz
        dropout_duration_epochs: 40,
        dropout_gap_epochs: 60,
        ..Default::default()
    }
}

pub fn preset_anchor_drift() -> ScenarioConfig {
    ScenarioConfig {
        name: "anchor_drift".to_string(),
        active: vec![ScenarioType::AnchorDrift],
        drift_anchor_id: 3,
        drift_m: 0.50,
        drift_epochs: 300,
        ..Default::default()
    }
}

pub fn preset_sparse_high() -> ScenarioConfig {
    ScenarioConfig {
        name: "sparse_high".to_string(),
        active: vec![ScenarioType::SparseHigh],
        ..Default::default()
    }
}

/// Look up a preset by its CLI name.
pub fn preset(name: &str) -> Option<ScenarioConfig> {
    match name {
        "default" => Some(ScenarioConfig::default()),
        "high_nlos" => Some(preset_high_nlos()),
        "anchor_dropout" => Some(preset_anchor_dropout()),
        "anchor_drift" => Some(preset_anchor_drift()),
        "sparse_high" => Some(preset_sparse_high()),
        _ => None,
    }
}

//! uwb_physics.rs — UWB two-way-ranging radio model
//!
//! Per anchor, per epoch:
//! 1. True range from the anchor's *actual* position to the tag
//! 2. Range limit: anchors beyond `max_range_m` do not answer
//! 3. NLOS draw: base rate (scenario-scaled) plus a penalty past `max_los_range_m`
//! 4. Noise: Gaussian LOS, or wider Gaussian plus a positive NLOS bias
//! 5. Quantise to integer millimetres, as the radio reports them
//! 6. Random and scenario-driven dropouts

use rand::Rng;
use rand_distr::{Distribution, Normal, NormalError};
use serde::Deserialize;
use thiserror::Error;
use uwb_locator::RangeSample;
use uwb_types::Vec3;

use crate::scenarios::ScenarioConfig;
use crate::tag_sim::Anchor;

// ── Radio configuration ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct RadioConfig {
    pub sigma_los_m:        f64,
    pub sigma_nlos_m:       f64,
    pub nlos_base_rate:     f64,
    /// Mean extra path length of an NLOS reply (m)
    pub nlos_bias_mean_m:   f64,
    pub nlos_bias_sigma_m:  f64,
    /// Past this range NLOS becomes more likely
    pub max_los_range_m:    f64,
    /// Past this range the anchor does not answer at all
    pub max_range_m:        f64,
    /// Probability that a reply is lost
    pub dropout_rate:       f64,
}

#[derive(Debug, Error)]
pub enum RadioConfigError {
    #[error("{key} must be a finite, non-negative standard deviation, got {value}")]
    InvalidSigma { key: &'static str, value: f64 },

    #[error(transparent)]
    Distribution(#[from] NormalError),
}

fn checked_sigma(key: &'static str, value: f64) -> Result<f64, RadioConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(RadioConfigError::InvalidSigma { key, value })
    }
}

/// Distributions built once from a `RadioConfig`.
#[derive(Debug, Clone)]
pub struct RadioModel {
    cfg: RadioConfig,
    los: Normal<f64>,
    nlos: Normal<f64>,
    nlos_bias: Normal<f64>,
}

/// What one epoch of ranging produced.
#[derive(Debug, Clone, Default)]
pub struct EpochRanges {
    pub samples: Vec<RangeSample>,
    pub nlos: usize,
    pub dropped: usize,
    pub out_of_range: usize,
}

impl RadioModel {
    pub fn new(cfg: &RadioConfig) -> Result<Self, RadioConfigError> {
        let sigma_los = checked_sigma("sigma_los_m", cfg.sigma_los_m)?;
        let sigma_nlos = checked_sigma("sigma_nlos_m", cfg.sigma_nlos_m)?;
        let sigma_bias = checked_sigma("nlos_bias_sigma_m", cfg.nlos_bias_sigma_m)?;
        Ok(Self {
            cfg: cfg.clone(),
            los: Normal::new(0.0, sigma_los)?,
            nlos: Normal::new(0.0, sigma_nlos)?,
            nlos_bias: Normal::new(cfg.nlos_bias_mean_m, sigma_bias)?,
        })
    }

    fn nlos_probability(&self, range: f64, scenario: &ScenarioConfig) -> f64 {
        let mut prob = self.cfg.nlos_base_rate * scenario.nlos_multiplier();
        if range > self.cfg.max_los_range_m {
            prob += 0.10;
        }
        prob.clamp(0.0, 0.95)
    }

    /// Range every anchor from the tag for one epoch.
    pub fn generate_epoch(
        &self,
        tag: Vec3,
        anchors: &[Anchor],
        scenario: &ScenarioConfig,
        epoch: u32,
        rng: &mut impl Rng,
    ) -> EpochRanges {
        let mut out = EpochRanges::default();
        let dropout = self.cfg.dropout_rate.clamp(0.0, 1.0);

        for anchor in anchors {
            let true_range = anchor.actual.distance(tag) as f64;

            if true_range > self.cfg.max_range_m && !scenario.unlimited_range() {
                out.out_of_range += 1;
                continue;
            }
            if scenario.is_anchor_dropped(anchor.id, epoch) || rng.gen_bool(dropout) {
                out.dropped += 1;
                continue;
            }

            let nlos = rng.gen_bool(self.nlos_probability(true_range, scenario));
            let measured = if nlos {
                out.nlos += 1;
                true_range + self.nlos.sample(rng) + self.nlos_bias.sample(rng).max(0.0)
            } else {
                true_range + self.los.sample(rng)
            };

            let mm = (measured * 1000.0).round() as i32;
            out.samples.push(RangeSample::from_millimeters(anchor.id, mm));
        }
        out
    }
}

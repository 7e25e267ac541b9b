//! tag_sim.rs — Tag motion and anchor layout
//!
//! The tag walks a Lissajous figure over the arena floor while its height
//! bobs around a carry height (a tag worn on a person or a forklift mast).
//! Anchors are fixed at their surveyed positions unless a drift scenario
//! moves one of them physically.

use serde::{Deserialize, Serialize};
use uwb_types::Vec3;

// ── Config ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AnchorConfig {
    pub id: u32,
    /// Surveyed position (m)
    pub position: [f32; 3],
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArenaConfig {
    pub anchors: Vec<AnchorConfig>,
    /// Center of the tag path (m)
    pub path_center: [f32; 3],
    /// Half-extent of the path along x and y (m)
    pub path_amplitude: [f32; 2],
    /// Lissajous angular rates along x and y (rad/s)
    pub path_rate: [f32; 2],
    /// Vertical bob amplitude (m)
    pub bob_amplitude_m: f32,
    pub bob_period_s: f32,
}

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Anchor {
    pub id: u32,
    /// Where the locator believes the anchor is
    pub surveyed: Vec3,
    /// Where it actually is (differs under drift)
    pub actual: Vec3,
}

#[derive(Debug, Clone)]
pub struct TagSim {
    pub t_s: f32,
    pub position: Vec3,
    pub anchors: Vec<Anchor>,
    center: Vec3,
    amplitude: [f32; 2],
    rate: [f32; 2],
    bob_amplitude: f32,
    bob_period: f32,
}

impl TagSim {
    pub fn new(cfg: &ArenaConfig) -> Self {
        let anchors = cfg
            .anchors
            .iter()
            .map(|a| {
                let p = Vec3::new(a.position[0], a.position[1], a.position[2]);
                Anchor { id: a.id, surveyed: p, actual: p }
            })
            .collect();
        let center = Vec3::new(cfg.path_center[0], cfg.path_center[1], cfg.path_center[2]);

        let mut sim = Self {
            t_s: 0.0,
            position: center,
            anchors,
            center,
            amplitude: cfg.path_amplitude,
            rate: cfg.path_rate,
            bob_amplitude: cfg.bob_amplitude_m,
            bob_period: cfg.bob_period_s.max(0.1),
        };
        sim.position = sim.position_at(0.0);
        sim
    }

    /// Ground-truth tag position at time `t` (s).
    pub fn position_at(&self, t: f32) -> Vec3 {
        let x = self.amplitude[0] * (self.rate[0] * t).sin();
        // y leads by π/2: the path starts on the +y edge
        let y = self.amplitude[1] * (self.rate[1] * t + std::f32::consts::FRAC_PI_2).sin();
        let z = self.bob_amplitude * (std::f32::consts::TAU * t / self.bob_period).sin();
        self.center + Vec3::new(x, y, z)
    }

    /// Advance simulation by dt seconds.
    pub fn tick(&mut self, dt: f32) {
        self.t_s += dt;
        self.position = self.position_at(self.t_s);
    }

    /// Physically displace one anchor along +x relative to its surveyed spot.
    pub fn drift_anchor(&mut self, id: u32, offset_m: f32) {
        if let Some(a) = self.anchors.iter_mut().find(|a| a.id == id) {
            a.actual = a.surveyed + Vec3::new(offset_m, 0.0, 0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> ArenaConfig {
        ArenaConfig {
            anchors: vec![
                AnchorConfig { id: 1, position: [0.0, 0.0, 0.5] },
                AnchorConfig { id: 2, position: [12.0, 0.0, 2.8] },
            ],
            path_center: [6.0, 5.0, 1.2],
            path_amplitude: [4.0, 3.0],
            path_rate: [0.3, 0.2],
            bob_amplitude_m: 0.2,
            bob_period_s: 2.0,
        }
    }

    #[test]
    fn path_stays_inside_its_box() {
        let mut sim = TagSim::new(&arena());
        for _ in 0..500 {
            sim.tick(0.1);
            let p = sim.position;
            assert!((1.99..=10.01).contains(&p.x), "{p:?}");
            assert!((1.99..=8.01).contains(&p.y), "{p:?}");
            assert!((0.99..=1.41).contains(&p.z), "{p:?}");
        }
    }

    #[test]
    fn tick_follows_closed_form() {
        let mut sim = TagSim::new(&arena());
        sim.tick(0.5);
        sim.tick(0.25);
        assert!(sim.position.distance(sim.position_at(0.75)) < 1e-5);
    }

    #[test]
    fn drift_moves_actual_only() {
        let mut sim = TagSim::new(&arena());
        sim.drift_anchor(2, 0.5);
        let a = sim.anchors[1];
        assert_eq!(a.surveyed, Vec3::new(12.0, 0.0, 2.8));
        assert!((a.actual.x - 12.5).abs() < 1e-6);

        // Unknown id is ignored
        sim.drift_anchor(42, 1.0);
        assert_eq!(sim.anchors[0].actual, sim.anchors[0].surveyed);
    }
}

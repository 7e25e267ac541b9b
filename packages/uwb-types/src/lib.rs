//! # uwb-types
//!
//! Shared value types for the UWB multilateration engine.
//!
//! These types are used by:
//! - `uwb-locator`: solvers and the location engine produce them
//! - `uwb-simulator`: serializes results as JSON telemetry lines
//! - host applications: pattern-match `CalculationResult` for rendering or replication
//!
//! ## Coordinate Conventions
//!
//! - All positions are meters in one right-handed Cartesian frame shared by every anchor.
//! - All distances are meters, `f32`, non-negative and finite once they reach the engine.

use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── 3D Vector ─────────────────────────────────────────────────────────────────

/// 3D vector (meters)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self { Self { x, y, z } }
    pub const fn zero() -> Self { Self { x: 0.0, y: 0.0, z: 0.0 } }

    pub fn dot(&self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn sqr_magnitude(&self) -> f32 { self.dot(*self) }
    pub fn magnitude(&self) -> f32 { self.sqr_magnitude().sqrt() }

    /// Unit vector in the same direction. The zero vector stays zero.
    pub fn normalized(&self) -> Vec3 {
        let len = self.magnitude();
        if len > 0.0 { *self / len } else { Vec3::zero() }
    }

    pub fn sqr_distance(&self, other: Vec3) -> f32 { (*self - other).sqr_magnitude() }
    pub fn distance(&self, other: Vec3) -> f32 { (*self - other).magnitude() }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 { Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z) }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) { *self = *self + rhs; }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 { Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z) }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 { Vec3::new(-self.x, -self.y, -self.z) }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;
    fn mul(self, s: f32) -> Vec3 { Vec3::new(self.x * s, self.y * s, self.z * s) }
}

impl Div<f32> for Vec3 {
    type Output = Vec3;
    fn div(self, s: f32) -> Vec3 { Vec3::new(self.x / s, self.y / s, self.z / s) }
}

// ── Anchor Sample ─────────────────────────────────────────────────────────────

/// One anchor's known position paired with its latest measured range to the tag.
/// Built fresh for every calculation from the engine's current maps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorSample {
    /// Anchor ID as reported by the ranging radio
    pub id: u32,
    /// Surveyed anchor position (meters)
    pub position: Vec3,
    /// Measured tag range (meters)
    pub distance: f32,
}

impl AnchorSample {
    pub fn new(id: u32, position: Vec3, distance: f32) -> Self {
        Self { id, position, distance }
    }
}

// ── Levels ────────────────────────────────────────────────────────────────────

/// Returned when a level name from config or the environment is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseLevelError {
    pub kind: &'static str,
    pub value: String,
}

/// Search policy applied when five or more anchors survive filtering.
/// Has no effect on the 0–4 anchor cases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculationLevel {
    /// First resolvable 4-anchor combination wins
    #[default]
    Low,
    /// Currently behaves exactly like `Low`
    Medium,
    /// Mean of every resolvable 4-anchor combination
    High,
}

impl FromStr for CalculationLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(ParseLevelError { kind: "calculation level", value: s.to_string() }),
        }
    }
}

/// When a receiver recalculates on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateLevel {
    /// Only on explicit `calculate()` calls
    #[default]
    None,
    /// After every accepted distance sample
    OnValueUpdate,
    /// Once per processed batch, after stale anchors are expired
    OnUpdate,
}

impl FromStr for UpdateLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "none" => Ok(Self::None),
            "on_value_update" => Ok(Self::OnValueUpdate),
            "on_update" => Ok(Self::OnUpdate),
            _ => Err(ParseLevelError { kind: "update level", value: s.to_string() }),
        }
    }
}

// ── Calculation Result ────────────────────────────────────────────────────────

/// Two-anchor locus: the tag lies on this circle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    /// Circle center, on the line joining the two anchors
    pub center: Vec3,
    /// Unit normal of the circle's plane (points from the second anchor to the first)
    pub normal: Vec3,
    /// Circle radius (meters)
    pub radius: f32,
    /// The spheres did not intersect (or the anchors coincide); radius was clamped to 0
    pub degenerate: bool,
}

/// Coarse result category, for consumers that only need to branch on the case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Empty,
    Single,
    Double,
    Trilinear,
    Quadlinear,
}

/// Outcome of one engine calculation. A fresh value is produced per call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalculationResult {
    /// No usable anchor data
    Empty,
    /// One anchor: the tag lies on a sphere around `position`
    SinglePoint { position: Vec3, radius: f32 },
    /// Two anchors: the tag lies on a circle
    Circle(Circle),
    /// Three anchors (or an unresolvable fourth): mirror-image candidates about the anchor plane
    TwoCandidate { a: Vec3, b: Vec3, errored: bool },
    /// Four or more anchors: one disambiguated position
    Resolved {
        position: Vec3,
        level: CalculationLevel,
        source_count: usize,
        errored: bool,
    },
}

impl CalculationResult {
    pub fn empty() -> Self { Self::Empty }

    pub fn single_point(sample: &AnchorSample) -> Self {
        Self::SinglePoint { position: sample.position, radius: sample.distance }
    }

    pub fn circle(circle: Circle) -> Self { Self::Circle(circle) }

    pub fn two_candidate(a: Vec3, b: Vec3) -> Self {
        Self::TwoCandidate { a, b, errored: false }
    }

    /// Three-anchor solve that found no line intersection
    pub fn two_candidate_failed() -> Self {
        Self::TwoCandidate { a: Vec3::zero(), b: Vec3::zero(), errored: true }
    }

    pub fn resolved(position: Vec3, level: CalculationLevel, source_count: usize) -> Self {
        Self::Resolved { position, level, source_count, errored: false }
    }

    /// No combination resolved; `position` is zero and must not be used
    pub fn resolved_failed(level: CalculationLevel, source_count: usize) -> Self {
        Self::Resolved { position: Vec3::zero(), level, source_count, errored: true }
    }

    pub fn kind(&self) -> ResultKind {
        match self {
            Self::Empty => ResultKind::Empty,
            Self::SinglePoint { .. } => ResultKind::Single,
            Self::Circle(_) => ResultKind::Double,
            Self::TwoCandidate { .. } => ResultKind::Trilinear,
            Self::Resolved { .. } => ResultKind::Quadlinear,
        }
    }

    /// Number of anchors that fed this result
    pub fn anchor_count(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::SinglePoint { .. } => 1,
            Self::Circle(_) => 2,
            Self::TwoCandidate { .. } => 3,
            Self::Resolved { source_count, .. } => *source_count,
        }
    }

    pub fn is_errored(&self) -> bool {
        match self {
            Self::TwoCandidate { errored, .. } | Self::Resolved { errored, .. } => *errored,
            Self::Empty | Self::SinglePoint { .. } | Self::Circle(_) => false,
        }
    }

    /// The single tag position, when the result pins one down
    pub fn position(&self) -> Option<Vec3> {
        match self {
            Self::Resolved { position, errored: false, .. } => Some(*position),
            _ => None,
        }
    }
}

impl Default for CalculationResult {
    fn default() -> Self { Self::Empty }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_follows_right_hand_rule() {
        let x = Vec3::new(1.0, 0.0, 0.0);
        let y = Vec3::new(0.0, 1.0, 0.0);
        assert_eq!(x.cross(y), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(y.cross(x), Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn normalized_zero_stays_zero() {
        assert_eq!(Vec3::zero().normalized(), Vec3::zero());
        let n = Vec3::new(3.0, 0.0, 4.0).normalized();
        assert!((n.magnitude() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!("HIGH".parse::<CalculationLevel>(), Ok(CalculationLevel::High));
        assert_eq!(" medium ".parse::<CalculationLevel>(), Ok(CalculationLevel::Medium));
        assert!("ultra".parse::<CalculationLevel>().is_err());
        assert_eq!("on-update".parse::<UpdateLevel>(), Ok(UpdateLevel::OnUpdate));
        assert_eq!("On_Value_Update".parse::<UpdateLevel>(), Ok(UpdateLevel::OnValueUpdate));
    }

    #[test]
    fn anchor_count_per_variant() {
        let s = AnchorSample::new(7, Vec3::new(1.0, 2.0, 3.0), 4.5);
        assert_eq!(CalculationResult::empty().anchor_count(), 0);
        assert_eq!(CalculationResult::single_point(&s).anchor_count(), 1);
        assert_eq!(CalculationResult::two_candidate_failed().anchor_count(), 3);
        assert_eq!(
            CalculationResult::resolved(Vec3::zero(), CalculationLevel::High, 6).anchor_count(),
            6
        );
    }

    #[test]
    fn failed_results_have_no_position() {
        let r = CalculationResult::resolved_failed(CalculationLevel::Low, 5);
        assert!(r.is_errored());
        assert_eq!(r.position(), None);
        let ok = CalculationResult::resolved(Vec3::new(1.0, 1.0, 1.0), CalculationLevel::Low, 4);
        assert_eq!(ok.position(), Some(Vec3::new(1.0, 1.0, 1.0)));
    }

    #[test]
    fn result_serializes_with_kind_tag() {
        let s = AnchorSample::new(1, Vec3::new(0.0, 0.0, 0.0), 2.0);
        let json = serde_json::to_value(CalculationResult::single_point(&s)).unwrap();
        assert_eq!(json["kind"], "single_point");
        assert_eq!(json["radius"], 2.0);

        let circle = CalculationResult::circle(Circle {
            center: Vec3::zero(),
            normal: Vec3::new(1.0, 0.0, 0.0),
            radius: 1.5,
            degenerate: false,
        });
        let json = serde_json::to_value(circle).unwrap();
        assert_eq!(json["kind"], "circle");
        assert_eq!(json["radius"], 1.5);

        let json = serde_json::to_value(CalculationResult::empty()).unwrap();
        assert_eq!(json["kind"], "empty");
    }
}

//! solvers.rs — Closed-form sphere-intersection solvers for 2, 3 and 4 anchors
//!
//! Every function here is pure: anchor samples in, candidate geometry out.
//!
//! - 2 anchors: the two range spheres meet in a circle (Heron's formula on the
//!   anchor/anchor/tag triangle gives its radius)
//! - 3 anchors: the three spheres meet in two points mirrored about the anchor plane
//! - 4 anchors: the fourth range picks one of the two mirrored points
//!
//! Degenerate geometry is reported through the return value, never by panicking.

use tracing::trace;
use uwb_types::{AnchorSample, CalculationLevel, CalculationResult, Circle, Vec3};

/// Below this 2D determinant two projected lines are treated as parallel
pub const PARALLEL_TOLERANCE: f32 = 1e-4;
/// Squared-distance difference below which the fourth anchor cannot tell the candidates apart
pub const AMBIGUITY_TOLERANCE: f32 = 1e-6;
/// Determinant magnitude below which the linearized 4-anchor system is singular
pub const SINGULAR_TOLERANCE: f32 = 1e-6;

// ── Two spheres ───────────────────────────────────────────────────────────────

/// Intersect the range spheres of two anchors.
///
/// The anchor separation `c` and the two ranges form a triangle with the tag.
/// Heron's formula gives its area, and the circle radius is the triangle's
/// altitude onto side `c`. The circle center sits on the anchor axis at the
/// foot of that altitude, measured from `b` towards `a`.
///
/// Spheres that do not meet (or coincident anchors) yield a `degenerate`
/// circle with radius 0 instead of NaN.
pub fn two_sphere_intersection(a: &AnchorSample, b: &AnchorSample) -> Circle {
    let axis = a.position - b.position;
    let c = axis.magnitude();
    let normal = axis.normalized();

    if c <= 0.0 {
        return Circle { center: b.position, normal, radius: 0.0, degenerate: true };
    }

    let (da, db) = (a.distance, b.distance);
    let s = 0.5 * (da + db + c);
    let heron = s * (s - da) * (s - db) * (s - c);

    let degenerate = heron.is_nan() || heron < 0.0;
    let area = if degenerate { 0.0 } else { heron.sqrt() };
    let radius = 2.0 * area / c;

    // Signed so the center can fall behind `b` when the angle at `b` is obtuse
    let offset = (db * db - da * da + c * c) / (2.0 * c);

    Circle {
        center: b.position + normal * offset,
        normal,
        radius,
        degenerate,
    }
}

// ── Three spheres ─────────────────────────────────────────────────────────────

/// Line in 3D: `point + t * direction`
#[derive(Debug, Clone, Copy)]
struct Line {
    point: Vec3,
    direction: Vec3,
}

/// Coordinate pairs used to reduce a 3D line intersection to 2D
#[derive(Debug, Clone, Copy)]
enum AxisPair {
    XY,
    XZ,
    ZY,
}

impl AxisPair {
    const ALL: [AxisPair; 3] = [AxisPair::XY, AxisPair::XZ, AxisPair::ZY];

    fn project(self, v: Vec3) -> (f32, f32) {
        match self {
            AxisPair::XY => (v.x, v.y),
            AxisPair::XZ => (v.x, v.z),
            AxisPair::ZY => (v.z, v.y),
        }
    }
}

/// Radical line of two anchors inside the anchor plane.
///
/// The point is where the plane through the sphere intersection crosses the
/// segment `from → to`; the direction lies in the anchor plane, perpendicular
/// to the segment.
fn radical_line(from: Vec3, to: Vec3, d_from_sq: f32, d_to_sq: f32, plane_normal: Vec3) -> Line {
    let v = to - from;
    let len_sq = v.sqr_magnitude();
    let len = len_sq.sqrt();
    let along = (d_from_sq + len_sq - d_to_sq) / (2.0 * len);
    Line {
        point: from + v * (along / len),
        direction: plane_normal.cross(v),
    }
}

/// Parameter `t` along the second 2D line where it meets the first,
/// or `None` when the lines are (nearly) parallel.
fn intersect_2d(p1: (f32, f32), v1: (f32, f32), p2: (f32, f32), v2: (f32, f32)) -> Option<f32> {
    let div = v2.0 * v1.1 - v2.1 * v1.0;
    if div.abs() < PARALLEL_TOLERANCE {
        return None;
    }
    Some((v1.0 * (p2.1 - p1.1) + v1.1 * (p1.0 - p2.0)) / div)
}

/// Intersect two coplanar 3D lines using the first usable axis pair.
fn intersect_lines(first: &Line, second: &Line) -> Option<Vec3> {
    AxisPair::ALL.iter().find_map(|&axes| {
        let t = intersect_2d(
            axes.project(first.point),
            axes.project(first.direction),
            axes.project(second.point),
            axes.project(second.direction),
        )?;
        Some(second.point + second.direction * t)
    })
}

/// Intersect the range spheres of three anchors.
///
/// Returns the two candidates `(above, below)` mirrored about the anchor
/// plane, `above` lying on the side of `cross(p2 - p1, p3 - p2)`. `None` when
/// the anchors are collinear or every pair of radical lines is parallel in
/// every axis projection.
pub fn three_sphere_intersection(
    s1: &AnchorSample,
    s2: &AnchorSample,
    s3: &AnchorSample,
) -> Option<(Vec3, Vec3)> {
    let (p1, p2, p3) = (s1.position, s2.position, s3.position);
    let plane_normal = (p2 - p1).cross(p3 - p2);
    if plane_normal == Vec3::zero() {
        trace!(a = s1.id, b = s2.id, c = s3.id, "collinear anchors");
        return None;
    }

    let d1s = s1.distance * s1.distance;
    let d2s = s2.distance * s2.distance;
    let d3s = s3.distance * s3.distance;

    let l12 = radical_line(p1, p2, d1s, d2s, plane_normal);
    let l23 = radical_line(p2, p3, d2s, d3s, plane_normal);
    let l31 = radical_line(p3, p1, d3s, d1s, plane_normal);

    let foot = intersect_lines(&l12, &l23)
        .or_else(|| intersect_lines(&l12, &l31))
        .or_else(|| intersect_lines(&l23, &l31))?;

    // |·| keeps slightly inconsistent ranges from producing NaN
    let height = (d1s - p1.sqr_distance(foot)).abs().sqrt();
    let offset = plane_normal.normalized() * height;
    Some((foot + offset, foot - offset))
}

// ── Four spheres ──────────────────────────────────────────────────────────────

/// Outcome of using a fourth anchor to choose between two trilateration candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Disambiguation {
    /// The fourth range selected this candidate
    Resolved(Vec3),
    /// Both candidates are equally far from the fourth anchor
    Ambiguous(Vec3, Vec3),
    /// The three-anchor solve failed
    Failed,
}

/// Solve the first three samples, then keep the candidate whose squared
/// distance to the fourth anchor is closest to the fourth squared range.
pub fn disambiguate(samples: [&AnchorSample; 4]) -> Disambiguation {
    let [s1, s2, s3, s4] = samples;
    let Some((a, b)) = three_sphere_intersection(s1, s2, s3) else {
        return Disambiguation::Failed;
    };

    let da = s4.position.sqr_distance(a);
    let db = s4.position.sqr_distance(b);
    if (da - db).abs() < AMBIGUITY_TOLERANCE {
        return Disambiguation::Ambiguous(a, b);
    }

    let range_sq = s4.distance * s4.distance;
    if (da - range_sq).abs() < (db - range_sq).abs() {
        Disambiguation::Resolved(a)
    } else {
        Disambiguation::Resolved(b)
    }
}

/// Inner step shared by every combination search: a position only when the
/// combination resolves cleanly.
pub fn resolve_combination(samples: [&AnchorSample; 4]) -> Option<Vec3> {
    match disambiguate(samples) {
        Disambiguation::Resolved(p) => Some(p),
        Disambiguation::Ambiguous(..) | Disambiguation::Failed => None,
    }
}

/// Exactly four anchors. The level is only recorded on the result.
pub fn disambiguate_four(samples: [&AnchorSample; 4], level: CalculationLevel) -> CalculationResult {
    match disambiguate(samples) {
        Disambiguation::Resolved(p) => CalculationResult::resolved(p, level, 4),
        Disambiguation::Ambiguous(a, b) => CalculationResult::two_candidate(a, b),
        Disambiguation::Failed => CalculationResult::resolved_failed(level, 4),
    }
}

/// Linearized least-squares trilateration from four anchors.
///
/// Subtracting consecutive sphere equations removes the quadratic term and
/// leaves `A x = b` with
///   A_i = 2 (p_{i+1} - p_i),  b_i = |p_{i+1}|² - |p_i|² + r_i² - r_{i+1}²
/// solved here by Cramer's rule. `None` for coplanar anchors.
pub fn linear_four(samples: [&AnchorSample; 4]) -> Option<Vec3> {
    let mut rows = [Vec3::zero(); 3];
    let mut rhs = [0.0f32; 3];
    for i in 0..3 {
        let (cur, next) = (samples[i], samples[i + 1]);
        rows[i] = (next.position - cur.position) * 2.0;
        rhs[i] = next.position.sqr_magnitude() - cur.position.sqr_magnitude()
            + cur.distance * cur.distance
            - next.distance * next.distance;
    }

    let c12 = rows[1].cross(rows[2]);
    let c20 = rows[2].cross(rows[0]);
    let c01 = rows[0].cross(rows[1]);
    let det = rows[0].dot(c12);
    if det.abs() < SINGULAR_TOLERANCE {
        return None;
    }

    Some((c12 * rhs[0] + c20 * rhs[1] + c01 * rhs[2]) / det)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_at(id: u32, position: Vec3, truth: Vec3) -> AnchorSample {
        AnchorSample::new(id, position, position.distance(truth))
    }

    fn assert_close(actual: Vec3, expected: Vec3, tol: f32) {
        assert!(
            actual.distance(expected) < tol,
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn circle_touches_both_spheres() {
        let a = AnchorSample::new(1, Vec3::new(0.0, 0.0, 0.0), 3.0);
        let b = AnchorSample::new(2, Vec3::new(4.0, 0.0, 0.0), 2.5);
        let circle = two_sphere_intersection(&a, &b);

        assert!(!circle.degenerate);
        assert!(circle.radius.is_finite());
        let ta = circle.center.sqr_distance(a.position) + circle.radius * circle.radius;
        let tb = circle.center.sqr_distance(b.position) + circle.radius * circle.radius;
        assert!((ta - 9.0).abs() < 1e-3, "tangency with a: {ta}");
        assert!((tb - 6.25).abs() < 1e-3, "tangency with b: {tb}");
        assert_close(circle.normal, Vec3::new(-1.0, 0.0, 0.0), 1e-6);
    }

    #[test]
    fn circle_center_behind_obtuse_anchor() {
        // Tag at (-1, 1, 0): the foot of the altitude lies beyond `b` on the far side from `a`
        let truth = Vec3::new(-1.0, 1.0, 0.0);
        let a = sample_at(1, Vec3::new(3.0, 0.0, 0.0), truth);
        let b = sample_at(2, Vec3::new(0.0, 0.0, 0.0), truth);
        let circle = two_sphere_intersection(&a, &b);

        assert!(!circle.degenerate);
        assert_close(circle.center, Vec3::new(-1.0, 0.0, 0.0), 1e-4);
        assert!((circle.radius - 1.0).abs() < 1e-4);
    }

    #[test]
    fn separated_spheres_clamp_to_degenerate_circle() {
        let a = AnchorSample::new(1, Vec3::new(0.0, 0.0, 0.0), 1.0);
        let b = AnchorSample::new(2, Vec3::new(10.0, 0.0, 0.0), 1.0);
        let circle = two_sphere_intersection(&a, &b);

        assert!(circle.degenerate);
        assert_eq!(circle.radius, 0.0);
        assert!(circle.center.is_finite());
    }

    #[test]
    fn nested_spheres_clamp_to_degenerate_circle() {
        let a = AnchorSample::new(1, Vec3::new(0.0, 0.0, 0.0), 10.0);
        let b = AnchorSample::new(2, Vec3::new(1.0, 0.0, 0.0), 1.0);
        let circle = two_sphere_intersection(&a, &b);

        assert!(circle.degenerate);
        assert_eq!(circle.radius, 0.0);
    }

    #[test]
    fn coincident_anchors_are_degenerate() {
        let a = AnchorSample::new(1, Vec3::new(2.0, 2.0, 2.0), 1.0);
        let b = AnchorSample::new(2, Vec3::new(2.0, 2.0, 2.0), 1.0);
        let circle = two_sphere_intersection(&a, &b);

        assert!(circle.degenerate);
        assert_eq!(circle.normal, Vec3::zero());
        assert_eq!(circle.center, Vec3::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn three_spheres_contain_ground_truth() {
        let truth = Vec3::new(1.5, 2.0, 3.0);
        let s1 = sample_at(1, Vec3::new(0.0, 0.0, 0.0), truth);
        let s2 = sample_at(2, Vec3::new(6.0, 0.0, 0.0), truth);
        let s3 = sample_at(3, Vec3::new(0.0, 6.0, 0.0), truth);

        let (a, b) = three_sphere_intersection(&s1, &s2, &s3).expect("solvable");
        assert_close(a, truth, 1e-3);
        assert_close(b, Vec3::new(1.5, 2.0, -3.0), 1e-3);
    }

    #[test]
    fn three_spheres_in_tilted_plane() {
        let truth = Vec3::new(2.0, -1.0, 4.0);
        let s1 = sample_at(1, Vec3::new(0.0, 0.0, 1.0), truth);
        let s2 = sample_at(2, Vec3::new(5.0, 1.0, 0.0), truth);
        let s3 = sample_at(3, Vec3::new(1.0, 6.0, 2.0), truth);

        let (a, b) = three_sphere_intersection(&s1, &s2, &s3).expect("solvable");
        let hit = a.distance(truth).min(b.distance(truth));
        assert!(hit < 1e-3, "truth not among candidates: {a:?} {b:?}");
    }

    #[test]
    fn tag_in_anchor_plane_gives_identical_candidates() {
        let truth = Vec3::new(1.0, 1.0, 0.0);
        let s1 = sample_at(1, Vec3::new(0.0, 0.0, 0.0), truth);
        let s2 = sample_at(2, Vec3::new(4.0, 0.0, 0.0), truth);
        let s3 = sample_at(3, Vec3::new(0.0, 4.0, 0.0), truth);

        let (a, b) = three_sphere_intersection(&s1, &s2, &s3).expect("solvable");
        assert_close(a, truth, 5e-3);
        assert_close(b, truth, 5e-3);
    }

    #[test]
    fn collinear_anchors_fail() {
        let s1 = AnchorSample::new(1, Vec3::new(0.0, 0.0, 0.0), 2.0);
        let s2 = AnchorSample::new(2, Vec3::new(1.0, 0.0, 0.0), 2.0);
        let s3 = AnchorSample::new(3, Vec3::new(2.0, 0.0, 0.0), 2.0);
        assert!(three_sphere_intersection(&s1, &s2, &s3).is_none());
    }

    #[test]
    fn tiny_anchor_triangle_is_treated_as_parallel() {
        let s1 = AnchorSample::new(1, Vec3::new(0.0, 0.0, 0.0), 1.0);
        let s2 = AnchorSample::new(2, Vec3::new(0.01, 0.0, 0.0), 1.0);
        let s3 = AnchorSample::new(3, Vec3::new(0.0, 0.01, 0.0), 1.0);
        assert!(three_sphere_intersection(&s1, &s2, &s3).is_none());
    }

    #[test]
    fn fourth_anchor_resolves_unit_cube_corner() {
        let truth = Vec3::new(1.0, 1.0, 1.0);
        let s = [
            sample_at(1, Vec3::new(0.0, 0.0, 0.0), truth),
            sample_at(2, Vec3::new(5.0, 0.0, 0.0), truth),
            sample_at(3, Vec3::new(0.0, 5.0, 0.0), truth),
            sample_at(4, Vec3::new(0.0, 0.0, 5.0), truth),
        ];
        match disambiguate_four([&s[0], &s[1], &s[2], &s[3]], CalculationLevel::Medium) {
            CalculationResult::Resolved { position, level, source_count, errored } => {
                assert!(!errored);
                assert_eq!(level, CalculationLevel::Medium);
                assert_eq!(source_count, 4);
                assert_close(position, truth, 1e-3);
            }
            other => panic!("expected Resolved, got {other:?}"),
        }
    }

    #[test]
    fn fourth_anchor_picks_lower_candidate() {
        let truth = Vec3::new(1.0, 2.0, -2.0);
        let s = [
            sample_at(1, Vec3::new(0.0, 0.0, 0.0), truth),
            sample_at(2, Vec3::new(5.0, 0.0, 0.0), truth),
            sample_at(3, Vec3::new(0.0, 5.0, 0.0), truth),
            sample_at(4, Vec3::new(2.0, 2.0, -6.0), truth),
        ];
        assert_eq!(
            resolve_combination([&s[0], &s[1], &s[2], &s[3]]).map(|p| p.distance(truth) < 1e-3),
            Some(true)
        );
    }

    #[test]
    fn coplanar_fourth_anchor_is_ambiguous() {
        let truth = Vec3::new(1.0, 1.0, 2.0);
        let s = [
            sample_at(1, Vec3::new(0.0, 0.0, 0.0), truth),
            sample_at(2, Vec3::new(5.0, 0.0, 0.0), truth),
            sample_at(3, Vec3::new(0.0, 5.0, 0.0), truth),
            sample_at(4, Vec3::new(5.0, 5.0, 0.0), truth),
        ];
        let refs = [&s[0], &s[1], &s[2], &s[3]];
        assert!(matches!(disambiguate(refs), Disambiguation::Ambiguous(..)));
        assert!(resolve_combination(refs).is_none());
        match disambiguate_four(refs, CalculationLevel::Low) {
            CalculationResult::TwoCandidate { a, b, errored } => {
                assert!(!errored);
                assert_close(a, truth, 1e-3);
                assert_close(b, Vec3::new(1.0, 1.0, -2.0), 1e-3);
            }
            other => panic!("expected TwoCandidate, got {other:?}"),
        }
    }

    #[test]
    fn collinear_first_three_report_errored() {
        let s = [
            AnchorSample::new(1, Vec3::new(0.0, 0.0, 0.0), 2.0),
            AnchorSample::new(2, Vec3::new(1.0, 0.0, 0.0), 2.0),
            AnchorSample::new(3, Vec3::new(2.0, 0.0, 0.0), 2.0),
            AnchorSample::new(4, Vec3::new(0.0, 0.0, 3.0), 2.0),
        ];
        let result = disambiguate_four([&s[0], &s[1], &s[2], &s[3]], CalculationLevel::Low);
        assert!(result.is_errored());
        assert_eq!(result.anchor_count(), 4);
    }

    #[test]
    fn linear_four_recovers_truth() {
        let truth = Vec3::new(1.0, 1.0, 1.0);
        let s = [
            sample_at(1, Vec3::new(0.0, 0.0, 0.0), truth),
            sample_at(2, Vec3::new(5.0, 0.0, 0.0), truth),
            sample_at(3, Vec3::new(0.0, 5.0, 0.0), truth),
            sample_at(4, Vec3::new(0.0, 0.0, 5.0), truth),
        ];
        let p = linear_four([&s[0], &s[1], &s[2], &s[3]]).expect("non-singular");
        assert_close(p, truth, 1e-3);
    }

    #[test]
    fn linear_four_rejects_coplanar_anchors() {
        let truth = Vec3::new(1.0, 1.0, 1.0);
        let s = [
            sample_at(1, Vec3::new(0.0, 0.0, 0.0), truth),
            sample_at(2, Vec3::new(5.0, 0.0, 0.0), truth),
            sample_at(3, Vec3::new(0.0, 5.0, 0.0), truth),
            sample_at(4, Vec3::new(5.0, 5.0, 0.0), truth),
        ];
        assert!(linear_four([&s[0], &s[1], &s[2], &s[3]]).is_none());
    }
}

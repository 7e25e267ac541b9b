//! End-to-end scenarios through the public engine and receiver API.

use std::time::{Duration, Instant};

use uwb_locator::{
    AnchorEvent, CalculationLevel, CalculationResult, LocationEngine, LocatorConfig, RangeSample,
    Receiver, ResultKind, UpdateLevel, Vec3,
};

const TRUTH: Vec3 = Vec3::new(1.0, 1.0, 1.0);

fn tetrahedron() -> Vec<(u32, Vec3)> {
    vec![
        (1, Vec3::new(0.0, 0.0, 0.0)),
        (2, Vec3::new(5.0, 0.0, 0.0)),
        (3, Vec3::new(0.0, 5.0, 0.0)),
        (4, Vec3::new(0.0, 0.0, 5.0)),
    ]
}

/// Six anchors in general position (no four coplanar)
fn room() -> Vec<(u32, Vec3)> {
    vec![
        (10, Vec3::new(0.0, 0.0, 0.0)),
        (11, Vec3::new(8.0, 0.0, 0.5)),
        (12, Vec3::new(0.0, 8.0, 1.0)),
        (13, Vec3::new(0.5, 0.5, 3.0)),
        (14, Vec3::new(8.0, 8.0, 2.5)),
        (15, Vec3::new(7.0, 1.0, 3.5)),
    ]
}

fn engine(anchors: &[(u32, Vec3)], truth: Vec3) -> LocationEngine {
    let mut engine = LocationEngine::new();
    for &(id, p) in anchors {
        engine.set_anchor_position(id, p);
        engine.set_anchor_distance(id, p.distance(truth));
    }
    engine
}

#[test]
fn tetrahedron_resolves_ground_truth() {
    let result = engine(&tetrahedron(), TRUTH).calculate();
    assert_eq!(result.kind(), ResultKind::Quadlinear);
    assert_eq!(result.anchor_count(), 4);
    let position = result.position().expect("resolved");
    assert!(position.distance(TRUTH) < 1e-3, "{position:?}");
}

#[test]
fn result_kind_follows_anchor_count() {
    let anchors = tetrahedron();
    let kinds = [ResultKind::Empty, ResultKind::Single, ResultKind::Double, ResultKind::Trilinear];
    for (n, expected) in kinds.into_iter().enumerate() {
        let result = engine(&anchors[..n], TRUTH).calculate();
        assert_eq!(result.kind(), expected, "{n} anchors");
        assert_eq!(result.anchor_count(), n);
    }
}

#[test]
fn removing_anchors_never_adds_any() {
    let truth = Vec3::new(2.0, 3.0, 1.0);
    let mut engine = engine(&room(), truth);
    let mut previous = engine.calculate().anchor_count();
    assert_eq!(previous, 6);

    for (id, _) in room() {
        engine.unset_anchor_distance(id);
        let now = engine.calculate().anchor_count();
        assert!(now <= previous, "{now} > {previous} after removing {id}");
        previous = now;
    }
    assert_eq!(engine.calculate(), CalculationResult::Empty);
}

#[test]
fn every_level_finds_truth_in_room() {
    let truth = Vec3::new(2.0, 3.0, 1.0);
    let mut engine = engine(&room(), truth);
    for level in [CalculationLevel::Low, CalculationLevel::Medium, CalculationLevel::High] {
        engine.set_level(level);
        let position = engine.calculate().position().expect("resolved");
        assert!(position.distance(truth) < 1e-3, "{level:?}: {position:?}");
    }
}

#[test]
fn outlier_range_is_filtered_before_solving() {
    let mut engine = engine(&tetrahedron(), TRUTH);
    // A fifth anchor far away with an impossibly short range
    engine.set_anchor_position(99, Vec3::new(40.0, 40.0, 40.0));
    engine.set_anchor_distance(99, 0.5);

    let result = engine.calculate();
    assert_eq!(result.anchor_count(), 4);
    assert!(result.position().expect("resolved").distance(TRUTH) < 1e-3);
}

#[test]
fn receiver_tracks_tag_through_batches() {
    let config = LocatorConfig {
        discard_interval_ms: 1_000,
        calculation_level: CalculationLevel::High,
        update_level: UpdateLevel::OnUpdate,
    };
    let mut rx = Receiver::new("tag-7", &config);
    for (id, p) in room() {
        rx.set_anchor_position(id, p);
    }

    let truth = Vec3::new(2.0, 3.0, 1.0);
    let packets: Vec<RangeSample> = room()
        .iter()
        .map(|&(id, p)| RangeSample::from_millimeters(id, (p.distance(truth) * 1000.0).round() as i32))
        .collect();

    let t0 = Instant::now();
    let out = rx.update(packets.clone(), t0);
    assert_eq!(out.events.len(), 6);
    assert!(out.events.iter().all(|e| matches!(e, AnchorEvent::Appeared { .. })));
    let position = out.result.and_then(|r| r.position()).expect("resolved");
    // Millimetre quantisation limits accuracy
    assert!(position.distance(truth) < 1e-2, "{position:?}");

    // Two anchors go quiet; the other four keep reporting
    let t1 = t0 + Duration::from_millis(1_500);
    let out = rx.update(packets[..4].to_vec(), t1);
    let disappeared: Vec<u32> = out
        .events
        .iter()
        .filter_map(|e| match e {
            AnchorEvent::Disappeared { id } => Some(*id),
            _ => None,
        })
        .collect();
    assert_eq!(disappeared, vec![14, 15]);
    assert_eq!(rx.anchor_count(), 4);
    assert_eq!(rx.latest_result().anchor_count(), 4);
}

#[test]
fn results_serialize_with_kind_tag() {
    let result = engine(&tetrahedron(), TRUTH).calculate();
    let json = serde_json::to_value(result).unwrap();
    assert_eq!(json["kind"], "resolved");
    assert_eq!(json["source_count"], 4);
    assert_eq!(json["errored"], false);
}

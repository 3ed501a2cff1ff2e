use geo::{LineString, Polygon, line_string, polygon};
use parcel_map_engine::geometry::{
    SplitLineRejection, line_length_meters, validate_edited_polygon, validate_split_line,
};
use proptest::prelude::*;

// ── Fixtures ──

/// Roughly 143 m (east-west) by 222 m (north-south) near 50°N.
fn square() -> Polygon<f64> {
    polygon![
        (x: 8.0, y: 50.0),
        (x: 8.002, y: 50.0),
        (x: 8.002, y: 50.002),
        (x: 8.0, y: 50.002),
        (x: 8.0, y: 50.0),
    ]
}

fn line(from: (f64, f64), to: (f64, f64)) -> LineString<f64> {
    line_string![(x: from.0, y: from.1), (x: to.0, y: to.1)]
}

// ── Split line properties ──

proptest! {
    #[test]
    fn lines_under_ten_meters_are_too_short(
        x in 7.99f64..8.01,
        y in 49.99f64..50.01,
        dx in -0.00006f64..0.00006,
        dy in -0.00006f64..0.00006,
    ) {
        let short = line((x, y), (x + dx, y + dy));
        prop_assume!(line_length_meters(&short) < 10.0);
        let rejected = matches!(
            validate_split_line(&square(), &short),
            Err(SplitLineRejection::TooShort { .. })
        );
        prop_assert!(rejected);
    }

    #[test]
    fn one_boundary_crossing_is_rejected(
        end_x in 8.0025f64..8.01,
        end_y in 50.0005f64..50.0015,
    ) {
        let inside_out = line((8.001, 50.001), (end_x, end_y));
        prop_assert_eq!(
            validate_split_line(&square(), &inside_out),
            Err(SplitLineRejection::SingleCrossing { crossings: 1 })
        );
    }

    #[test]
    fn lines_through_the_parcel_are_accepted(
        west_y in 50.0002f64..50.0018,
        east_y in 50.0002f64..50.0018,
    ) {
        let through = line((7.999, west_y), (8.003, east_y));
        let crossing = validate_split_line(&square(), &through);
        prop_assert!(crossing.is_ok());
        let crossing = crossing.unwrap();
        prop_assert_eq!(crossing.crossings.len(), 2);
        prop_assert!(crossing.length_meters >= 10.0);
    }

    #[test]
    fn save_gate_follows_ring_size(len in 0usize..12) {
        let ring: Vec<[f64; 2]> = (0..len).map(|i| [8.0 + i as f64 * 0.001, 50.0]).collect();
        prop_assert_eq!(validate_edited_polygon(&ring), len >= 4);
    }
}

// ── Split line examples ──

#[test]
fn line_inside_the_parcel_misses_the_boundary() {
    let inside = line((8.0005, 50.0005), (8.0015, 50.0015));
    assert_eq!(
        validate_split_line(&square(), &inside),
        Err(SplitLineRejection::MissesBoundary)
    );
}

#[test]
fn line_far_away_misses_the_boundary() {
    let outside = line((8.01, 50.01), (8.02, 50.01));
    assert_eq!(
        validate_split_line(&square(), &outside),
        Err(SplitLineRejection::MissesBoundary)
    );
}

#[test]
fn rejection_messages_match_the_status_line() {
    assert_eq!(
        SplitLineRejection::TooShort { length_meters: 3.0 }.to_string(),
        "line too short"
    );
    assert_eq!(
        SplitLineRejection::MissesBoundary.to_string(),
        "line must intersect the boundary"
    );
    assert_eq!(
        SplitLineRejection::SingleCrossing { crossings: 1 }.to_string(),
        "line must cross the boundary at two points"
    );
}

#[test]
fn polyline_zigzag_counts_every_crossing() {
    let zigzag = line_string![
        (x: 7.999, y: 50.001),
        (x: 8.001, y: 50.001),
        (x: 8.001, y: 50.003)
    ];
    let crossing = validate_split_line(&square(), &zigzag).unwrap();
    assert_eq!(crossing.crossings.len(), 2);
}

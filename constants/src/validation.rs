/// Shortest split line accepted, measured along the great circle (metres).
pub const MIN_SPLIT_LINE_LENGTH_METERS: f64 = 10.0;

/// A split line has to cross the parcel boundary at least this many times.
pub const MIN_SPLIT_CROSSINGS: usize = 2;

/// A closed ring needs at least three distinct corners plus the closing position.
pub const MIN_EDITED_RING_POSITIONS: usize = 4;

/// Intersection points closer than this (degrees) count as one point.
/// Lines passing exactly through a vertex hit both adjacent edges.
pub const INTERSECTION_MERGE_EPSILON: f64 = 1e-9;

pub const SQUARE_METERS_PER_HECTARE: f64 = 10_000.0;

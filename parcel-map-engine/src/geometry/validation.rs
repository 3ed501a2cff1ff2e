//! Acceptance checks for user-drawn geometry.
//!
//! Split lines are checked in a fixed order (length, contact, crossings) so the
//! reported reason is always the first rule that fails. Edited polygons only
//! get a ring-size check; self-intersection is left to the backend.

use super::measure::line_length_meters;
use super::types::Position;
use constants::validation::{
    INTERSECTION_MERGE_EPSILON, MIN_EDITED_RING_POSITIONS, MIN_SPLIT_CROSSINGS,
    MIN_SPLIT_LINE_LENGTH_METERS,
};
use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{Coord, Intersects, LineString, Polygon};
use serde::Serialize;
use thiserror::Error;

/// Why a split line was refused.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SplitLineRejection {
    #[error("line too short")]
    TooShort { length_meters: f64 },

    #[error("line must intersect the boundary")]
    MissesBoundary,

    #[error("line must cross the boundary at two points")]
    SingleCrossing { crossings: usize },
}

/// Accepted split line with the points where it crosses the parcel boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitCrossing {
    pub length_meters: f64,
    pub crossings: Vec<Position>,
}

/// Check a drawn line against the parcel it is meant to split.
pub fn validate_split_line(
    parcel: &Polygon<f64>,
    line: &LineString<f64>,
) -> Result<SplitCrossing, SplitLineRejection> {
    let length_meters = line_length_meters(line);
    if length_meters < MIN_SPLIT_LINE_LENGTH_METERS {
        return Err(SplitLineRejection::TooShort { length_meters });
    }

    let rings: Vec<&LineString<f64>> = std::iter::once(parcel.exterior())
        .chain(parcel.interiors())
        .collect();

    if !rings.iter().any(|ring| line.intersects(*ring)) {
        return Err(SplitLineRejection::MissesBoundary);
    }

    let crossings = boundary_intersections(&rings, line);
    if crossings.len() < MIN_SPLIT_CROSSINGS {
        return Err(SplitLineRejection::SingleCrossing {
            crossings: crossings.len(),
        });
    }

    Ok(SplitCrossing {
        length_meters,
        crossings: crossings.iter().map(|c| [c.x, c.y]).collect(),
    })
}

/// Gate for the "save" action while vertices are dragged.
pub fn validate_edited_polygon(ring: &[Position]) -> bool {
    ring.len() >= MIN_EDITED_RING_POSITIONS
}

/// Distinct points where `line` meets any ring. Collinear overlaps are not
/// crossings and are ignored.
fn boundary_intersections(rings: &[&LineString<f64>], line: &LineString<f64>) -> Vec<Coord<f64>> {
    let mut points: Vec<Coord<f64>> = Vec::new();

    for segment in line.lines() {
        for ring in rings {
            for edge in ring.lines() {
                if let Some(LineIntersection::SinglePoint { intersection, .. }) =
                    line_intersection(segment, edge)
                {
                    let seen = points.iter().any(|p| {
                        (p.x - intersection.x).abs() < INTERSECTION_MERGE_EPSILON
                            && (p.y - intersection.y).abs() < INTERSECTION_MERGE_EPSILON
                    });
                    if !seen {
                        points.push(intersection);
                    }
                }
            }
        }
    }

    points
}

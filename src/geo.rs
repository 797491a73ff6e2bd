//! Spherical geometry for turn-angle computation.

use geo::HaversineDistance;
use geo::Point;

use crate::compressed::CompressedEdgeContainer;
use crate::graph::{EdgeId, NodeId};

/// Fixed-point coordinates are stored in microdegrees.
pub const COORDINATE_PRECISION: f64 = 1_000_000.0;

/// A coordinate in fixed-point microdegrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedCoordinate {
    pub lat: i32,
    pub lon: i32,
}

impl FixedCoordinate {
    pub fn new(lat: i32, lon: i32) -> Self {
        Self { lat, lon }
    }

    pub fn lat_deg(self) -> f64 {
        self.lat as f64 / COORDINATE_PRECISION
    }

    pub fn lon_deg(self) -> f64 {
        self.lon as f64 / COORDINATE_PRECISION
    }

    pub fn is_valid(self) -> bool {
        self.lat.unsigned_abs() <= 90 * COORDINATE_PRECISION as u32
            && self.lon.unsigned_abs() <= 180 * COORDINATE_PRECISION as u32
    }
}

/// A junction or shape node with its external id and coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryNode {
    pub node_id: u64,
    pub lat: i32,
    pub lon: i32,
}

impl QueryNode {
    pub fn coordinate(&self) -> FixedCoordinate {
        FixedCoordinate::new(self.lat, self.lon)
    }
}

/// Great-circle distance between two coordinates, in meters.
pub fn great_circle_distance(a: FixedCoordinate, b: FixedCoordinate) -> f64 {
    let p1 = Point::new(a.lon_deg(), a.lat_deg());
    let p2 = Point::new(b.lon_deg(), b.lat_deg());
    p1.haversine_distance(&p2)
}

/// Initial bearing from `from` to `to` in degrees, 0 = North, in [0, 360).
pub fn compute_bearing(from: FixedCoordinate, to: FixedCoordinate) -> f64 {
    let lat1 = from.lat_deg().to_radians();
    let lat2 = to.lat_deg().to_radians();
    let delta_lon = (to.lon_deg() - from.lon_deg()).to_radians();

    let y = delta_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();
    y.atan2(x).to_degrees().rem_euclid(360.0)
}

/// Interior angle at `via` between the roads toward `first` and `third`,
/// in degrees, in [0, 360). 180 means straight through; values below 180
/// lie to the right of straight, values above to the left.
pub fn compute_angle(
    first: FixedCoordinate,
    via: FixedCoordinate,
    third: FixedCoordinate,
) -> f64 {
    (compute_bearing(via, first) - compute_bearing(via, third)).rem_euclid(360.0)
}

/// A coordinate representing the direction of `edge` at the junction,
/// stable enough for angle computation: the geometry point nearest the
/// junction when the edge has intermediate shape points, the opposite
/// endpoint otherwise.
///
/// `invert` selects which endpoint of `(src, tgt)` is the junction: the
/// target when set (incoming edge), the source when clear (outgoing).
pub fn representative_coordinate(
    src: NodeId,
    tgt: NodeId,
    edge: EdgeId,
    invert: bool,
    geometry: &CompressedEdgeContainer,
    nodes: &[QueryNode],
) -> FixedCoordinate {
    let bucket = geometry.bucket(edge);
    let node_id = if bucket.len() > 1 {
        if invert {
            bucket[bucket.len() - 2].node_id
        } else {
            bucket[0].node_id
        }
    } else if invert {
        src
    } else {
        tgt
    };
    nodes[node_id as usize].coordinate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressed::SegmentEntry;

    fn coord(lat: i32, lon: i32) -> FixedCoordinate {
        FixedCoordinate::new(lat, lon)
    }

    #[test]
    fn test_straight_through_is_180() {
        let u = coord(0, 0);
        let v = coord(1000, 0);
        let w = coord(2000, 0);
        let angle = compute_angle(u, v, w);
        assert!((angle - 180.0).abs() < 1e-9, "expected 180, got {angle}");
    }

    #[test]
    fn test_right_turn_is_90() {
        // approach northbound, branch to the east
        let u = coord(0, 0);
        let v = coord(1000, 0);
        let east = coord(1000, 1000);
        let angle = compute_angle(u, v, east);
        assert!((angle - 90.0).abs() < 0.1, "expected ~90, got {angle}");
    }

    #[test]
    fn test_left_turn_is_270() {
        let u = coord(0, 0);
        let v = coord(1000, 0);
        let west = coord(1000, -1000);
        let angle = compute_angle(u, v, west);
        assert!((angle - 270.0).abs() < 0.1, "expected ~270, got {angle}");
    }

    #[test]
    fn test_uturn_is_0() {
        let u = coord(0, 0);
        let v = coord(1000, 0);
        assert_eq!(compute_angle(u, v, u), 0.0);
    }

    #[test]
    fn test_great_circle_distance_one_degree_lat() {
        let a = coord(0, 0);
        let b = coord(1_000_000, 0);
        let d = great_circle_distance(a, b);
        // one degree of latitude is ~111.2 km
        assert!((d - 111_195.0).abs() < 200.0, "got {d}");
    }

    #[test]
    fn test_representative_coordinate_uses_shape_points() {
        let nodes = vec![
            QueryNode { node_id: 10, lat: 0, lon: 0 },
            QueryNode { node_id: 11, lat: 1000, lon: 0 },
            QueryNode { node_id: 12, lat: 2000, lon: 0 },
            QueryNode { node_id: 13, lat: 3000, lon: 0 },
        ];
        let mut geometry = CompressedEdgeContainer::new();
        // edge 0: 0 -> 3 via shape points 1, 2
        geometry.insert(
            0,
            vec![
                SegmentEntry { node_id: 1, weight: 1 },
                SegmentEntry { node_id: 2, weight: 1 },
                SegmentEntry { node_id: 3, weight: 1 },
            ],
        );
        // edge 1: 0 -> 3 without shape points
        geometry.insert(1, vec![SegmentEntry { node_id: 3, weight: 3 }]);

        // outgoing at junction 0: nearest shape point
        let c = representative_coordinate(0, 3, 0, false, &geometry, &nodes);
        assert_eq!(c, nodes[1].coordinate());
        // incoming at junction 3: nearest shape point from the other end
        let c = representative_coordinate(0, 3, 0, true, &geometry, &nodes);
        assert_eq!(c, nodes[2].coordinate());
        // no shape points: opposite endpoint
        let c = representative_coordinate(0, 3, 1, false, &geometry, &nodes);
        assert_eq!(c, nodes[3].coordinate());
        let c = representative_coordinate(0, 3, 1, true, &geometry, &nodes);
        assert_eq!(c, nodes[0].coordinate());
    }
}

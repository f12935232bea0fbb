//! Axial hex coordinates and the vertex/edge lattice built on top of them.
//!
//! - `HexCoord`: identifies a tile
//! - `VertexCoord`: a corner where settlements and cities stand
//! - `EdgeCoord`: a side where roads run
//!
//! Vertices are named as the North or South corner of exactly one hex, which
//! makes every corner's representation unique. Edges have two possible
//! descriptions (one per touching hex) and are stored in canonical form.
//!
//! Direction names describe the lattice as if hexes were pointy-top. Tiles
//! are drawn flat-top (see [`HexCoord::to_pixel`]), which is the same
//! picture turned 30 degrees clockwise:
//!
//! | name | flat-top screen position |
//! |---|---|
//! | `EdgeDirection::NorthWest` | neighbour straight above |
//! | `EdgeDirection::NorthEast` | neighbour upper right |
//! | `EdgeDirection::East` | neighbour lower right |
//! | `EdgeDirection::SouthEast` | neighbour straight below |
//! | `EdgeDirection::SouthWest` | neighbour lower left |
//! | `EdgeDirection::West` | neighbour upper left |
//! | `VertexDirection::North` | upper-right corner (60 degrees) |
//! | `VertexDirection::South` | lower-left corner (240 degrees) |

use serde::{Deserialize, Serialize};

/// Which corner of a hex a vertex sits on.
///
/// Named for a pointy-top lattice; on the flat-top board `North` is the
/// upper-right corner and `South` the lower-left one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VertexDirection {
    North,
    South,
}

/// Side of a hex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeDirection {
    NorthEast,
    East,
    SouthEast,
    SouthWest,
    West,
    NorthWest,
}

impl EdgeDirection {
    /// All sides, clockwise from NorthEast
    pub const ALL: [EdgeDirection; 6] = [
        EdgeDirection::NorthEast,
        EdgeDirection::East,
        EdgeDirection::SouthEast,
        EdgeDirection::SouthWest,
        EdgeDirection::West,
        EdgeDirection::NorthWest,
    ];

    /// The same side seen from the neighbouring hex
    pub fn opposite(self) -> Self {
        match self {
            EdgeDirection::NorthEast => EdgeDirection::SouthWest,
            EdgeDirection::East => EdgeDirection::West,
            EdgeDirection::SouthEast => EdgeDirection::NorthWest,
            EdgeDirection::SouthWest => EdgeDirection::NorthEast,
            EdgeDirection::West => EdgeDirection::East,
            EdgeDirection::NorthWest => EdgeDirection::SouthEast,
        }
    }
}

/// Axial coordinate for the hex grid.
///
/// The implicit cube coordinate `s` satisfies `q + r + s = 0`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct HexCoord {
    pub q: i32,
    pub r: i32,
}

impl HexCoord {
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    pub const fn s(&self) -> i32 {
        -self.q - self.r
    }

    /// Every coordinate of a hexagon with the given radius around the origin,
    /// in column order (`q` ascending, then `r` ascending).
    pub fn within_radius(radius: u32) -> Vec<HexCoord> {
        let radius = radius as i32;
        let mut coords = Vec::new();
        for q in -radius..=radius {
            let r_min = (-radius).max(-q - radius);
            let r_max = radius.min(-q + radius);
            for r in r_min..=r_max {
                coords.push(HexCoord::new(q, r));
            }
        }
        coords
    }

    /// Neighbours clockwise from East
    pub fn neighbors(&self) -> [HexCoord; 6] {
        [
            self.neighbor(EdgeDirection::East),
            self.neighbor(EdgeDirection::NorthEast),
            self.neighbor(EdgeDirection::NorthWest),
            self.neighbor(EdgeDirection::West),
            self.neighbor(EdgeDirection::SouthWest),
            self.neighbor(EdgeDirection::SouthEast),
        ]
    }

    pub fn neighbor(&self, direction: EdgeDirection) -> HexCoord {
        match direction {
            EdgeDirection::East => HexCoord::new(self.q + 1, self.r),
            EdgeDirection::NorthEast => HexCoord::new(self.q + 1, self.r - 1),
            EdgeDirection::NorthWest => HexCoord::new(self.q, self.r - 1),
            EdgeDirection::West => HexCoord::new(self.q - 1, self.r),
            EdgeDirection::SouthWest => HexCoord::new(self.q - 1, self.r + 1),
            EdgeDirection::SouthEast => HexCoord::new(self.q, self.r + 1),
        }
    }

    /// Distance to another hex in hex steps
    pub fn distance_to(&self, other: &HexCoord) -> u32 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = (self.s() - other.s()).abs();
        ((dq + dr + ds) / 2) as u32
    }

    /// Distance from the origin
    pub fn ring(&self) -> u32 {
        self.distance_to(&HexCoord::default())
    }

    /// The six corners, clockwise from the top
    pub fn vertices(&self) -> [VertexCoord; 6] {
        [
            VertexCoord::new(*self, VertexDirection::North),
            VertexCoord::new(self.neighbor(EdgeDirection::NorthEast), VertexDirection::South),
            VertexCoord::new(self.neighbor(EdgeDirection::SouthEast), VertexDirection::North),
            VertexCoord::new(*self, VertexDirection::South),
            VertexCoord::new(self.neighbor(EdgeDirection::SouthWest), VertexDirection::North),
            VertexCoord::new(self.neighbor(EdgeDirection::NorthWest), VertexDirection::South),
        ]
    }

    /// The six sides in canonical form
    pub fn edges(&self) -> [EdgeCoord; 6] {
        EdgeDirection::ALL.map(|dir| EdgeCoord::new(*self, dir))
    }

    /// Tile centre in pixels for a flat-top layout with the given tile size.
    pub fn to_pixel(&self, tile_size: f64) -> (f64, f64) {
        let x = tile_size * 1.5 * self.q as f64;
        let y = tile_size * 3.0_f64.sqrt() * (self.r as f64 + self.q as f64 / 2.0);
        (x, y)
    }
}

/// A corner where three hexes meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexCoord {
    pub hex: HexCoord,
    pub direction: VertexDirection,
}

impl VertexCoord {
    pub const fn new(hex: HexCoord, direction: VertexDirection) -> Self {
        Self { hex, direction }
    }

    /// The three hexes that share this corner
    pub fn touching_hexes(&self) -> [HexCoord; 3] {
        match self.direction {
            VertexDirection::North => [
                self.hex,
                self.hex.neighbor(EdgeDirection::NorthWest),
                self.hex.neighbor(EdgeDirection::NorthEast),
            ],
            VertexDirection::South => [
                self.hex,
                self.hex.neighbor(EdgeDirection::SouthWest),
                self.hex.neighbor(EdgeDirection::SouthEast),
            ],
        }
    }

    /// The three edges that end at this corner
    pub fn touching_edges(&self) -> [EdgeCoord; 3] {
        match self.direction {
            VertexDirection::North => [
                EdgeCoord::new(self.hex, EdgeDirection::NorthWest),
                EdgeCoord::new(self.hex, EdgeDirection::NorthEast),
                EdgeCoord::new(self.hex.neighbor(EdgeDirection::NorthWest), EdgeDirection::East),
            ],
            VertexDirection::South => [
                EdgeCoord::new(self.hex, EdgeDirection::SouthWest),
                EdgeCoord::new(self.hex, EdgeDirection::SouthEast),
                EdgeCoord::new(self.hex.neighbor(EdgeDirection::SouthWest), EdgeDirection::East),
            ],
        }
    }

    /// Corners one edge away
    pub fn adjacent_vertices(&self) -> [VertexCoord; 3] {
        self.touching_edges().map(|edge| {
            let [a, b] = edge.endpoints();
            if a == *self {
                b
            } else {
                a
            }
        })
    }
}

/// A side shared by two hexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeCoord {
    pub hex: HexCoord,
    pub direction: EdgeDirection,
}

impl EdgeCoord {
    /// Create an edge in canonical form
    pub fn new(hex: HexCoord, direction: EdgeDirection) -> Self {
        Self { hex, direction }.canonical()
    }

    /// Canonical form: described from the touching hex with the smaller `(q, r)`.
    pub fn canonical(self) -> Self {
        let other = self.hex.neighbor(self.direction);
        if (self.hex.q, self.hex.r) <= (other.q, other.r) {
            self
        } else {
            Self {
                hex: other,
                direction: self.direction.opposite(),
            }
        }
    }

    /// The two hexes on either side
    pub fn touching_hexes(&self) -> [HexCoord; 2] {
        [self.hex, self.hex.neighbor(self.direction)]
    }

    /// The two corners at the ends of this edge
    pub fn endpoints(&self) -> [VertexCoord; 2] {
        let h = self.hex;
        match self.direction {
            EdgeDirection::NorthEast => [
                VertexCoord::new(h, VertexDirection::North),
                VertexCoord::new(h.neighbor(EdgeDirection::NorthEast), VertexDirection::South),
            ],
            EdgeDirection::East => [
                VertexCoord::new(h.neighbor(EdgeDirection::NorthEast), VertexDirection::South),
                VertexCoord::new(h.neighbor(EdgeDirection::SouthEast), VertexDirection::North),
            ],
            EdgeDirection::SouthEast => [
                VertexCoord::new(h.neighbor(EdgeDirection::SouthEast), VertexDirection::North),
                VertexCoord::new(h, VertexDirection::South),
            ],
            EdgeDirection::SouthWest => [
                VertexCoord::new(h, VertexDirection::South),
                VertexCoord::new(h.neighbor(EdgeDirection::SouthWest), VertexDirection::North),
            ],
            EdgeDirection::West => [
                VertexCoord::new(h.neighbor(EdgeDirection::SouthWest), VertexDirection::North),
                VertexCoord::new(h.neighbor(EdgeDirection::NorthWest), VertexDirection::South),
            ],
            EdgeDirection::NorthWest => [
                VertexCoord::new(h.neighbor(EdgeDirection::NorthWest), VertexDirection::South),
                VertexCoord::new(h, VertexDirection::North),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_within_radius_counts() {
        assert_eq!(HexCoord::within_radius(0).len(), 1);
        assert_eq!(HexCoord::within_radius(2).len(), 19);
        assert_eq!(HexCoord::within_radius(3).len(), 37);
    }

    #[test]
    fn test_within_radius_column_order() {
        let coords = HexCoord::within_radius(1);
        assert_eq!(coords.first(), Some(&HexCoord::new(-1, 0)));
        assert_eq!(coords.last(), Some(&HexCoord::new(1, 0)));
        assert!(coords.iter().all(|c| c.ring() <= 1));
    }

    #[test]
    fn test_hex_neighbors() {
        let center = HexCoord::new(0, 0);
        let unique: HashSet<_> = center.neighbors().into_iter().collect();
        assert_eq!(unique.len(), 6);
        for neighbor in &unique {
            assert_eq!(center.distance_to(neighbor), 1);
        }
    }

    #[test]
    fn test_hex_distance() {
        assert_eq!(HexCoord::new(0, 0).distance_to(&HexCoord::new(2, -1)), 2);
        assert_eq!(HexCoord::new(-3, 3).ring(), 3);
    }

    #[test]
    fn test_shared_vertex_is_the_same_value() {
        // upper-right corner of the origin is the bottom corner of its NE neighbour
        let origin = HexCoord::new(0, 0);
        let east = HexCoord::new(1, 0);
        let shared: Vec<_> = origin
            .vertices()
            .into_iter()
            .filter(|v| east.vertices().contains(v))
            .collect();
        assert_eq!(shared.len(), 2);
    }

    #[test]
    fn test_vertex_touching_hexes() {
        let v = VertexCoord::new(HexCoord::new(0, 0), VertexDirection::North);
        let unique: HashSet<_> = v.touching_hexes().into_iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_vertex_adjacent_vertices() {
        let v = VertexCoord::new(HexCoord::new(0, 0), VertexDirection::North);
        let adjacent = v.adjacent_vertices();
        let unique: HashSet<_> = adjacent.into_iter().collect();
        assert_eq!(unique.len(), 3);
        assert!(!unique.contains(&v));
    }

    #[test]
    fn test_edge_canonical_equality() {
        let e1 = EdgeCoord::new(HexCoord::new(0, 0), EdgeDirection::East);
        let e2 = EdgeCoord::new(HexCoord::new(1, 0), EdgeDirection::West);
        assert_eq!(e1, e2);
    }

    #[test]
    fn test_hex_edges_unique() {
        let unique: HashSet<_> = HexCoord::new(0, 0).edges().into_iter().collect();
        assert_eq!(unique.len(), 6);
    }

    #[test]
    fn test_vertex_edges_connection() {
        for hex in HexCoord::within_radius(1) {
            for v in hex.vertices() {
                for edge in v.touching_edges() {
                    assert!(edge.endpoints().contains(&v), "{:?} not on {:?}", v, edge);
                }
            }
        }
    }

    #[test]
    fn test_flat_top_pixel_layout() {
        let (x, y) = HexCoord::new(2, -1).to_pixel(40.0);
        assert!((x - 120.0).abs() < 1e-9);
        assert!(y.abs() < 1e-9);
    }

    #[test]
    fn test_vertex_names_on_flat_top_layout() {
        let size = 40.0;
        let corner = |v: VertexCoord| {
            let points = v.touching_hexes().map(|h| h.to_pixel(size));
            let x = points.iter().map(|p| p.0).sum::<f64>() / 3.0;
            let y = points.iter().map(|p| p.1).sum::<f64>() / 3.0;
            (x, y)
        };
        let close = |a: (f64, f64), b: (f64, f64)| (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9;

        // Screen y grows downward
        let angle = |deg: f64| {
            let rad = deg.to_radians();
            (size * rad.cos(), -size * rad.sin())
        };
        let origin = HexCoord::new(0, 0);
        assert!(close(corner(VertexCoord::new(origin, VertexDirection::North)), angle(60.0)));
        assert!(close(corner(VertexCoord::new(origin, VertexDirection::South)), angle(240.0)));

        let above = origin.neighbor(EdgeDirection::NorthWest).to_pixel(size);
        assert!(above.0.abs() < 1e-9 && above.1 < 0.0);
    }
}

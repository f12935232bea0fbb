//! Board generation: tiles, materials, number tokens and ports.
//!
//! A board is generated once per session from a [`BoardConfig`] and never
//! mutated afterwards. Everything that changes during play (structures, the
//! robber) lives on the session instead.

use crate::hex::{EdgeCoord, HexCoord, VertexCoord};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Index of a tile within its board
pub type TileId = usize;

/// Tile size used for the pixel layout
pub const DEFAULT_TILE_SIZE: f64 = 40.0;

/// The five tradeable resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Wood,
    Brick,
    Wheat,
    Sheep,
    Ore,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Wood,
        Resource::Brick,
        Resource::Wheat,
        Resource::Sheep,
        Resource::Ore,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Resource::Wood => "wood",
            Resource::Brick => "brick",
            Resource::Wheat => "wheat",
            Resource::Sheep => "sheep",
            Resource::Ore => "ore",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a tile is made of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Material {
    Wood,
    Brick,
    Wheat,
    Sheep,
    Ore,
    Desert,
}

impl Material {
    /// The resource this material produces, if any
    pub fn resource(&self) -> Option<Resource> {
        match self {
            Material::Wood => Some(Resource::Wood),
            Material::Brick => Some(Resource::Brick),
            Material::Wheat => Some(Resource::Wheat),
            Material::Sheep => Some(Resource::Sheep),
            Material::Ore => Some(Resource::Ore),
            Material::Desert => None,
        }
    }

    pub fn is_desert(&self) -> bool {
        matches!(self, Material::Desert)
    }
}

impl From<Resource> for Material {
    fn from(resource: Resource) -> Self {
        match resource {
            Resource::Wood => Material::Wood,
            Resource::Brick => Material::Brick,
            Resource::Wheat => Material::Wheat,
            Resource::Sheep => Material::Sheep,
            Resource::Ore => Material::Ore,
        }
    }
}

/// A single hex tile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HexTile {
    pub id: TileId,
    pub coord: HexCoord,
    pub material: Material,
    /// Production number (2-12), absent for desert
    pub number: Option<u8>,
    /// Layout position in pixels
    pub x: f64,
    pub y: f64,
}

impl HexTile {
    pub fn resource(&self) -> Option<Resource> {
        self.material.resource()
    }
}

/// Exchange ratio offered by a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortKind {
    /// 3:1 for any resource
    Generic,
    /// 2:1 for one resource
    Resource(Resource),
}

impl PortKind {
    pub fn ratio(&self) -> u32 {
        match self {
            PortKind::Generic => 3,
            PortKind::Resource(_) => 2,
        }
    }
}

/// A port on a coastal edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub edge: EdgeCoord,
    pub kind: PortKind,
}

/// Board generation failures. All of them are configuration faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("{pool} pool holds {available} entries but the layout needs {required}")]
    PoolMismatch {
        pool: &'static str,
        available: usize,
        required: usize,
    },

    #[error("{0} pool ran out during generation")]
    PoolExhausted(&'static str),

    #[error("invalid production number {0}")]
    InvalidNumber(u8),

    #[error("no standard layout for radius {0}")]
    UnsupportedRadius(u32),
}

/// Shape and content pools for a board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub radius: u32,
    pub tile_size: f64,
    pub materials: Vec<Material>,
    pub numbers: Vec<u8>,
    pub ports: Vec<PortKind>,
}

impl BoardConfig {
    /// Radius-3 board for larger tables: 37 tiles, 2 deserts, 12 ports.
    pub fn extended() -> Self {
        let mut materials = Vec::with_capacity(37);
        for resource in Resource::ALL {
            materials.extend(std::iter::repeat(Material::from(resource)).take(7));
        }
        materials.extend(std::iter::repeat(Material::Desert).take(2));

        let numbers = vec![
            2, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 6, 6, 6, 6, 6, 8, 8, 8, 8, 8, 9, 9, 9, 9, 9, 10,
            10, 10, 10, 11, 11, 11, 12,
        ];

        // 2 generic, 5 resource-tied, and 5 extra resource-tied
        let mut ports = vec![PortKind::Generic, PortKind::Generic];
        ports.extend(Resource::ALL.map(PortKind::Resource));
        ports.extend(Resource::ALL.map(PortKind::Resource));

        Self {
            radius: 3,
            tile_size: DEFAULT_TILE_SIZE,
            materials,
            numbers,
            ports,
        }
    }

    /// Radius-2 board: 19 tiles, 1 desert, 9 ports.
    pub fn classic() -> Self {
        let mut materials = Vec::with_capacity(19);
        materials.extend(std::iter::repeat(Material::Wood).take(4));
        materials.extend(std::iter::repeat(Material::Brick).take(3));
        materials.extend(std::iter::repeat(Material::Wheat).take(4));
        materials.extend(std::iter::repeat(Material::Sheep).take(4));
        materials.extend(std::iter::repeat(Material::Ore).take(3));
        materials.push(Material::Desert);

        let numbers = vec![2, 3, 3, 4, 4, 5, 5, 6, 6, 8, 8, 9, 9, 10, 10, 11, 11, 12];

        let mut ports = vec![PortKind::Generic; 4];
        ports.extend(Resource::ALL.map(PortKind::Resource));

        Self {
            radius: 2,
            tile_size: DEFAULT_TILE_SIZE,
            materials,
            numbers,
            ports,
        }
    }

    /// The standard layout for a radius
    pub fn for_radius(radius: u32) -> Result<Self, BoardError> {
        match radius {
            2 => Ok(Self::classic()),
            3 => Ok(Self::extended()),
            other => Err(BoardError::UnsupportedRadius(other)),
        }
    }

    /// Check that the pools exactly cover the layout.
    pub fn validate(&self) -> Result<(), BoardError> {
        let tiles = HexCoord::within_radius(self.radius).len();
        if self.materials.len() != tiles {
            return Err(BoardError::PoolMismatch {
                pool: "material",
                available: self.materials.len(),
                required: tiles,
            });
        }

        let producing = self.materials.iter().filter(|m| !m.is_desert()).count();
        if self.numbers.len() != producing {
            return Err(BoardError::PoolMismatch {
                pool: "number",
                available: self.numbers.len(),
                required: producing,
            });
        }

        if let Some(&bad) = self
            .numbers
            .iter()
            .find(|&&n| !(2..=12).contains(&n) || n == 7)
        {
            return Err(BoardError::InvalidNumber(bad));
        }

        let slots = perimeter_edges(self.radius).len();
        if self.ports.len() > slots {
            return Err(BoardError::PoolMismatch {
                pool: "port",
                available: slots,
                required: self.ports.len(),
            });
        }

        Ok(())
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self::extended()
    }
}

/// The generated, immutable board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    radius: u32,
    tiles: Vec<HexTile>,
    ports: Vec<Port>,
}

impl Board {
    /// Generate a board from a config with the provided RNG.
    ///
    /// Materials and numbers are shuffled independently and popped onto the
    /// tiles in column order. Desert tiles take no number token.
    pub fn generate<R: Rng>(config: &BoardConfig, rng: &mut R) -> Result<Self, BoardError> {
        config.validate()?;

        let mut materials = config.materials.clone();
        let mut numbers = config.numbers.clone();
        materials.shuffle(rng);
        numbers.shuffle(rng);

        let mut tiles = Vec::with_capacity(materials.len());
        for (id, coord) in HexCoord::within_radius(config.radius).into_iter().enumerate() {
            let material = materials.pop().ok_or(BoardError::PoolExhausted("material"))?;
            let number = if material.is_desert() {
                None
            } else {
                Some(numbers.pop().ok_or(BoardError::PoolExhausted("number"))?)
            };
            let (x, y) = coord.to_pixel(config.tile_size);
            tiles.push(HexTile {
                id,
                coord,
                material,
                number,
                x,
                y,
            });
        }

        let mut slots = port_slots(config.radius, config.ports.len());
        let mut kinds = config.ports.clone();
        slots.shuffle(rng);
        kinds.shuffle(rng);
        let ports = slots
            .into_iter()
            .zip(kinds)
            .map(|(edge, kind)| Port { edge, kind })
            .collect();

        Ok(Self {
            radius: config.radius,
            tiles,
            ports,
        })
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn tiles(&self) -> &[HexTile] {
        &self.tiles
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn tile(&self, id: TileId) -> Option<&HexTile> {
        self.tiles.get(id)
    }

    pub fn tile_at(&self, coord: &HexCoord) -> Option<&HexTile> {
        if coord.ring() > self.radius {
            return None;
        }
        self.tiles.iter().find(|t| t.coord == *coord)
    }

    pub fn contains(&self, coord: &HexCoord) -> bool {
        coord.ring() <= self.radius
    }

    /// First desert tile, where the robber starts
    pub fn first_desert(&self) -> Option<TileId> {
        self.tiles.iter().find(|t| t.material.is_desert()).map(|t| t.id)
    }

    /// Whether a vertex touches at least one tile of this board
    pub fn is_land_vertex(&self, vertex: &VertexCoord) -> bool {
        vertex.touching_hexes().iter().any(|h| self.contains(h))
    }

    /// Whether an edge touches at least one tile of this board
    pub fn is_land_edge(&self, edge: &EdgeCoord) -> bool {
        edge.touching_hexes().iter().any(|h| self.contains(h))
    }

    /// Tiles whose number matches a roll
    pub fn tiles_for_roll(&self, roll: u8) -> impl Iterator<Item = &HexTile> {
        self.tiles.iter().filter(move |t| t.number == Some(roll))
    }

    /// All vertices on the board, sorted
    pub fn land_vertices(&self) -> Vec<VertexCoord> {
        let set: HashSet<VertexCoord> = self.tiles.iter().flat_map(|t| t.coord.vertices()).collect();
        let mut vertices: Vec<_> = set.into_iter().collect();
        vertices.sort();
        vertices
    }

    /// All edges on the board, sorted
    pub fn land_edges(&self) -> Vec<EdgeCoord> {
        let set: HashSet<EdgeCoord> = self.tiles.iter().flat_map(|t| t.coord.edges()).collect();
        let mut edges: Vec<_> = set.into_iter().collect();
        edges.sort();
        edges
    }
}

/// Coastal edges of a hexagon, ordered by angle around the centre.
fn perimeter_edges(radius: u32) -> Vec<EdgeCoord> {
    let inside = |h: &HexCoord| h.ring() <= radius;
    let mut edges: Vec<(f64, EdgeCoord)> = HexCoord::within_radius(radius)
        .into_iter()
        .filter(|h| h.ring() == radius)
        .flat_map(|h| h.edges())
        .filter(|e| e.touching_hexes().iter().filter(|h| inside(h)).count() == 1)
        .map(|e| {
            let [a, b] = e.touching_hexes();
            let (ax, ay) = a.to_pixel(1.0);
            let (bx, by) = b.to_pixel(1.0);
            let angle = ((ay + by) / 2.0).atan2((ax + bx) / 2.0);
            (angle, e)
        })
        .collect();
    edges.sort_by(|(a, ea), (b, eb)| a.total_cmp(b).then(ea.cmp(eb)));
    edges.dedup_by(|(_, a), (_, b)| a == b);
    edges.into_iter().map(|(_, e)| e).collect()
}

/// Fixed, evenly spaced port positions along the coast
fn port_slots(radius: u32, count: usize) -> Vec<EdgeCoord> {
    let perimeter = perimeter_edges(radius);
    if count == 0 || perimeter.is_empty() {
        return Vec::new();
    }
    (0..count)
        .map(|i| perimeter[i * perimeter.len() / count])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    fn extended(seed: u64) -> Board {
        Board::generate(&BoardConfig::extended(), &mut ChaCha8Rng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn test_extended_board_material_counts() {
        let board = extended(1);
        assert_eq!(board.tiles().len(), 37);

        let mut counts: HashMap<Material, usize> = HashMap::new();
        for tile in board.tiles() {
            *counts.entry(tile.material).or_default() += 1;
        }
        for resource in Resource::ALL {
            assert_eq!(counts[&Material::from(resource)], 7, "{} tiles", resource);
        }
        assert_eq!(counts[&Material::Desert], 2);
    }

    #[test]
    fn test_classic_board_has_19_tiles() {
        let board =
            Board::generate(&BoardConfig::classic(), &mut ChaCha8Rng::seed_from_u64(9)).unwrap();
        assert_eq!(board.tiles().len(), 19);
        assert_eq!(board.tiles().iter().filter(|t| t.material.is_desert()).count(), 1);
        assert_eq!(board.ports().len(), 9);
    }

    #[test]
    fn test_numbers_only_on_producing_tiles() {
        for seed in 0..20 {
            let board = extended(seed);
            for tile in board.tiles() {
                match tile.material {
                    Material::Desert => assert_eq!(tile.number, None),
                    _ => {
                        let n = tile.number.expect("producing tile without number");
                        assert!((2..=12).contains(&n) && n != 7, "bad number {}", n);
                    }
                }
            }
        }
    }

    #[test]
    fn test_number_pool_fully_consumed() {
        let board = extended(3);
        let mut placed: Vec<u8> = board.tiles().iter().filter_map(|t| t.number).collect();
        let mut pool = BoardConfig::extended().numbers;
        placed.sort();
        pool.sort();
        assert_eq!(placed, pool);
    }

    #[test]
    fn test_same_seed_same_board() {
        assert_eq!(extended(42), extended(42));
    }

    #[test]
    fn test_different_seeds_differ() {
        let reference = extended(0);
        assert!((1..10).any(|seed| extended(seed) != reference));
    }

    #[test]
    fn test_tile_ids_and_positions() {
        let board = extended(5);
        for (i, tile) in board.tiles().iter().enumerate() {
            assert_eq!(tile.id, i);
            let (x, y) = tile.coord.to_pixel(DEFAULT_TILE_SIZE);
            assert_eq!((tile.x, tile.y), (x, y));
            assert_eq!(board.tile_at(&tile.coord).map(|t| t.id), Some(i));
        }
        assert!(board.tile_at(&HexCoord::new(4, 0)).is_none());
    }

    #[test]
    fn test_material_pool_mismatch_is_rejected() {
        let mut config = BoardConfig::extended();
        config.materials.pop();
        let err = Board::generate(&config, &mut ChaCha8Rng::seed_from_u64(0)).unwrap_err();
        assert_eq!(
            err,
            BoardError::PoolMismatch {
                pool: "material",
                available: 36,
                required: 37
            }
        );
    }

    #[test]
    fn test_number_pool_mismatch_is_rejected() {
        let mut config = BoardConfig::classic();
        config.numbers.push(5);
        assert!(matches!(
            config.validate(),
            Err(BoardError::PoolMismatch { pool: "number", .. })
        ));
    }

    #[test]
    fn test_seven_is_not_a_production_number() {
        let mut config = BoardConfig::classic();
        config.numbers[0] = 7;
        assert_eq!(config.validate(), Err(BoardError::InvalidNumber(7)));
    }

    #[test]
    fn test_unsupported_radius() {
        assert_eq!(
            BoardConfig::for_radius(5),
            Err(BoardError::UnsupportedRadius(5))
        );
        assert_eq!(BoardConfig::for_radius(3).unwrap().radius, 3);
    }

    #[test]
    fn test_extended_port_distribution() {
        let board = extended(8);
        assert_eq!(board.ports().len(), 12);
        let generic = board
            .ports()
            .iter()
            .filter(|p| p.kind == PortKind::Generic)
            .count();
        assert_eq!(generic, 2);
        for resource in Resource::ALL {
            let tied = board
                .ports()
                .iter()
                .filter(|p| p.kind == PortKind::Resource(resource))
                .count();
            assert_eq!(tied, 2, "{} ports", resource);
        }
    }

    #[test]
    fn test_ports_sit_on_distinct_coastal_edges() {
        let board = extended(11);
        let mut seen = HashSet::new();
        for port in board.ports() {
            let inside = port
                .edge
                .touching_hexes()
                .iter()
                .filter(|h| board.contains(h))
                .count();
            assert_eq!(inside, 1, "port edge must face the sea");
            assert!(seen.insert(port.edge));
        }
    }

    #[test]
    fn test_port_slots_are_fixed() {
        let a: HashSet<_> = extended(1).ports().iter().map(|p| p.edge).collect();
        let b: HashSet<_> = extended(2).ports().iter().map(|p| p.edge).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_perimeter_edge_count() {
        assert_eq!(perimeter_edges(2).len(), 30);
        assert_eq!(perimeter_edges(3).len(), 42);
    }
}

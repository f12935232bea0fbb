//! Roads, settlements and cities, and the rules for placing them.
//!
//! Structures are kept in flat lists so a snapshot serializes to JSON
//! without map keys. A city upgrade rewrites the settlement in place.

use crate::board::{Board, PortKind};
use crate::error::GameError;
use crate::hex::{EdgeCoord, HexCoord, VertexCoord};
use crate::player::PlayerId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildingKind {
    Settlement,
    City,
}

impl BuildingKind {
    /// Resource units produced per matching roll
    pub fn yield_amount(&self) -> u32 {
        match self {
            BuildingKind::Settlement => 1,
            BuildingKind::City => 2,
        }
    }
}

/// A settlement or city on a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub vertex: VertexCoord,
    pub owner: PlayerId,
    pub kind: BuildingKind,
}

/// A road on an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Road {
    pub edge: EdgeCoord,
    pub owner: PlayerId,
}

/// A structure that was just placed, as broadcast to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Structure {
    Road { edge: EdgeCoord, owner: PlayerId },
    Settlement { vertex: VertexCoord, owner: PlayerId },
    City { vertex: VertexCoord, owner: PlayerId },
}

/// Which placement rules are enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRules {
    /// Settlements may not sit next to another building
    pub distance_rule: bool,
    /// Roads must extend the player's network; settlements must touch it
    pub connectivity: bool,
    /// Free settlements (and as many free roads) each player starts with.
    /// Founding settlements don't need a road.
    pub founding_placements: u32,
}

impl Default for PlacementRules {
    fn default() -> Self {
        Self {
            distance_rule: true,
            connectivity: true,
            founding_placements: 2,
        }
    }
}

impl PlacementRules {
    /// Only the occupancy checks
    pub fn permissive() -> Self {
        Self {
            distance_rule: false,
            connectivity: false,
            founding_placements: 2,
        }
    }
}

/// Everything built on a board
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structures {
    buildings: Vec<Building>,
    roads: Vec<Road>,
}

fn invalid(reason: impl Into<String>) -> GameError {
    GameError::InvalidPosition(reason.into())
}

fn other_end(edge: &EdgeCoord, from: VertexCoord) -> VertexCoord {
    let [a, b] = edge.endpoints();
    if a == from {
        b
    } else {
        a
    }
}

impl Structures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    pub fn roads(&self) -> &[Road] {
        &self.roads
    }

    pub fn building_at(&self, vertex: &VertexCoord) -> Option<&Building> {
        self.buildings.iter().find(|b| b.vertex == *vertex)
    }

    pub fn road_at(&self, edge: &EdgeCoord) -> Option<&Road> {
        let edge = edge.canonical();
        self.roads.iter().find(|r| r.edge == edge)
    }

    fn owns_road_at(&self, player: PlayerId, vertex: &VertexCoord) -> bool {
        vertex
            .touching_edges()
            .iter()
            .any(|e| self.road_at(e).is_some_and(|r| r.owner == player))
    }

    fn opponent_building_at(&self, player: PlayerId, vertex: &VertexCoord) -> bool {
        self.building_at(vertex).is_some_and(|b| b.owner != player)
    }

    pub fn validate_road(
        &self,
        board: &Board,
        player: PlayerId,
        edge: &EdgeCoord,
        rules: &PlacementRules,
    ) -> Result<(), GameError> {
        if !board.is_land_edge(edge) {
            return Err(invalid("edge is off the board"));
        }
        if self.road_at(edge).is_some() {
            return Err(invalid("edge already has a road"));
        }
        if rules.connectivity {
            let connected = edge.endpoints().iter().any(|v| match self.building_at(v) {
                Some(b) => b.owner == player,
                None => self.owns_road_at(player, v),
            });
            if !connected {
                return Err(invalid("road must connect to your network"));
            }
        }
        Ok(())
    }

    /// Check a settlement. `founding` settlements skip the road requirement.
    pub fn validate_settlement(
        &self,
        board: &Board,
        player: PlayerId,
        vertex: &VertexCoord,
        rules: &PlacementRules,
        founding: bool,
    ) -> Result<(), GameError> {
        if !board.is_land_vertex(vertex) {
            return Err(invalid("vertex is off the board"));
        }
        if self.building_at(vertex).is_some() {
            return Err(invalid("vertex is occupied"));
        }
        if rules.distance_rule
            && vertex
                .adjacent_vertices()
                .iter()
                .any(|v| self.building_at(v).is_some())
        {
            return Err(invalid("too close to another building"));
        }
        if rules.connectivity && !founding && !self.owns_road_at(player, vertex) {
            return Err(invalid("settlement must touch one of your roads"));
        }
        Ok(())
    }

    pub fn validate_city(&self, player: PlayerId, vertex: &VertexCoord) -> Result<(), GameError> {
        match self.building_at(vertex) {
            Some(b) if b.owner != player => Err(invalid("settlement belongs to another player")),
            Some(b) if b.kind == BuildingKind::City => Err(invalid("already a city")),
            Some(_) => Ok(()),
            None => Err(invalid("no settlement to upgrade")),
        }
    }

    pub fn place_road(
        &mut self,
        board: &Board,
        player: PlayerId,
        edge: EdgeCoord,
        rules: &PlacementRules,
    ) -> Result<Structure, GameError> {
        self.validate_road(board, player, &edge, rules)?;
        let edge = edge.canonical();
        self.roads.push(Road { edge, owner: player });
        Ok(Structure::Road { edge, owner: player })
    }

    pub fn place_settlement(
        &mut self,
        board: &Board,
        player: PlayerId,
        vertex: VertexCoord,
        rules: &PlacementRules,
        founding: bool,
    ) -> Result<Structure, GameError> {
        self.validate_settlement(board, player, &vertex, rules, founding)?;
        self.buildings.push(Building {
            vertex,
            owner: player,
            kind: BuildingKind::Settlement,
        });
        Ok(Structure::Settlement {
            vertex,
            owner: player,
        })
    }

    /// Replace a settlement with a city
    pub fn upgrade_to_city(
        &mut self,
        player: PlayerId,
        vertex: VertexCoord,
    ) -> Result<Structure, GameError> {
        self.validate_city(player, &vertex)?;
        if let Some(building) = self.buildings.iter_mut().find(|b| b.vertex == vertex) {
            building.kind = BuildingKind::City;
        }
        Ok(Structure::City {
            vertex,
            owner: player,
        })
    }

    /// Buildings on the corners of a hex
    pub fn buildings_around(&self, hex: &HexCoord) -> impl Iterator<Item = &Building> {
        let corners = hex.vertices();
        self.buildings
            .iter()
            .filter(move |b| corners.contains(&b.vertex))
    }

    /// Distinct owners with a building on the corners of a hex
    pub fn owners_around(&self, hex: &HexCoord) -> Vec<PlayerId> {
        let mut owners: Vec<PlayerId> = self.buildings_around(hex).map(|b| b.owner).collect();
        owners.sort_unstable();
        owners.dedup();
        owners
    }

    /// Ports the player can use: those with one of the player's buildings on an end of the port edge
    pub fn ports_of(&self, board: &Board, player: PlayerId) -> Vec<PortKind> {
        board
            .ports()
            .iter()
            .filter(|port| {
                port.edge
                    .endpoints()
                    .iter()
                    .any(|v| self.building_at(v).is_some_and(|b| b.owner == player))
            })
            .map(|port| port.kind)
            .collect()
    }

    /// Length of the player's longest continuous road.
    ///
    /// A road may not pass through a vertex holding an opponent's building.
    pub fn longest_road(&self, player: PlayerId) -> u32 {
        let owned: HashSet<EdgeCoord> = self
            .roads
            .iter()
            .filter(|r| r.owner == player)
            .map(|r| r.edge)
            .collect();

        let mut best = 0;
        for start in &owned {
            for from in start.endpoints() {
                let mut visited = HashSet::from([*start]);
                let length = 1 + self.extend_road(player, &owned, other_end(start, from), &mut visited);
                best = best.max(length);
            }
        }
        best
    }

    fn extend_road(
        &self,
        player: PlayerId,
        owned: &HashSet<EdgeCoord>,
        at: VertexCoord,
        visited: &mut HashSet<EdgeCoord>,
    ) -> u32 {
        if self.opponent_building_at(player, &at) {
            return 0;
        }
        let mut best = 0;
        for edge in at.touching_edges() {
            if owned.contains(&edge) && visited.insert(edge) {
                let length = 1 + self.extend_road(player, owned, other_end(&edge, at), visited);
                best = best.max(length);
                visited.remove(&edge);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardConfig;
    use crate::hex::{EdgeDirection, VertexDirection};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn board() -> Board {
        Board::generate(&BoardConfig::classic(), &mut ChaCha8Rng::seed_from_u64(1)).unwrap()
    }

    fn origin() -> HexCoord {
        HexCoord::new(0, 0)
    }

    fn north() -> VertexCoord {
        VertexCoord::new(origin(), VertexDirection::North)
    }

    fn south() -> VertexCoord {
        VertexCoord::new(origin(), VertexDirection::South)
    }

    #[test]
    fn test_settlement_on_empty_vertex() {
        let board = board();
        let mut s = Structures::new();
        let placed = s
            .place_settlement(&board, 0, north(), &PlacementRules::default(), true)
            .unwrap();
        assert_eq!(placed, Structure::Settlement { vertex: north(), owner: 0 });
        assert_eq!(s.building_at(&north()).map(|b| b.kind), Some(BuildingKind::Settlement));
    }

    #[test]
    fn test_occupied_vertex_rejected() {
        let board = board();
        let rules = PlacementRules::permissive();
        let mut s = Structures::new();
        s.place_settlement(&board, 0, north(), &rules, true).unwrap();
        let err = s.place_settlement(&board, 1, north(), &rules, true).unwrap_err();
        assert!(matches!(err, GameError::InvalidPosition(_)));
        assert_eq!(s.buildings().len(), 1);
    }

    #[test]
    fn test_distance_rule() {
        let board = board();
        let mut s = Structures::new();
        s.place_settlement(&board, 0, north(), &PlacementRules::default(), true)
            .unwrap();
        let neighbor = north().adjacent_vertices()[0];

        assert!(s
            .validate_settlement(&board, 1, &neighbor, &PlacementRules::default(), true)
            .is_err());
        assert!(s
            .validate_settlement(&board, 1, &neighbor, &PlacementRules::permissive(), true)
            .is_ok());
    }

    #[test]
    fn test_off_board_rejected() {
        let board = board();
        let s = Structures::new();
        let far = VertexCoord::new(HexCoord::new(9, 0), VertexDirection::North);
        assert!(s
            .validate_settlement(&board, 0, &far, &PlacementRules::permissive(), true)
            .is_err());
        let far_edge = EdgeCoord::new(HexCoord::new(9, 0), EdgeDirection::East);
        assert!(s
            .validate_road(&board, 0, &far_edge, &PlacementRules::permissive())
            .is_err());
    }

    #[test]
    fn test_road_must_connect() {
        let board = board();
        let rules = PlacementRules::default();
        let mut s = Structures::new();
        let edge = north().touching_edges()[0];

        assert!(s.validate_road(&board, 0, &edge, &rules).is_err());
        s.place_settlement(&board, 0, north(), &rules, true).unwrap();
        assert!(s.validate_road(&board, 1, &edge, &rules).is_err());
        s.place_road(&board, 0, edge, &rules).unwrap();

        // Extending from the end of the road works
        let next = other_end(&edge, north())
            .touching_edges()
            .into_iter()
            .find(|e| *e != edge)
            .unwrap();
        s.place_road(&board, 0, next, &rules).unwrap();
        assert_eq!(s.roads().len(), 2);
    }

    #[test]
    fn test_settlement_needs_road_after_founding() {
        let board = board();
        let rules = PlacementRules::default();
        let mut s = Structures::new();
        assert!(s.validate_settlement(&board, 0, &south(), &rules, false).is_err());
        assert!(s.validate_settlement(&board, 0, &south(), &rules, true).is_ok());
    }

    #[test]
    fn test_city_upgrade_replaces_settlement() {
        let board = board();
        let mut s = Structures::new();
        s.place_settlement(&board, 0, north(), &PlacementRules::permissive(), true)
            .unwrap();
        s.upgrade_to_city(0, north()).unwrap();

        assert_eq!(s.buildings().len(), 1);
        assert_eq!(s.buildings()[0].kind, BuildingKind::City);
    }

    #[test]
    fn test_city_rules() {
        let board = board();
        let mut s = Structures::new();
        assert!(s.upgrade_to_city(0, north()).is_err());

        s.place_settlement(&board, 0, north(), &PlacementRules::permissive(), true)
            .unwrap();
        assert!(s.upgrade_to_city(1, north()).is_err());
        s.upgrade_to_city(0, north()).unwrap();
        assert!(s.upgrade_to_city(0, north()).is_err());
    }

    #[test]
    fn test_owners_around() {
        let board = board();
        let rules = PlacementRules::permissive();
        let mut s = Structures::new();
        s.place_settlement(&board, 2, north(), &rules, true).unwrap();
        s.place_settlement(&board, 1, south(), &rules, true).unwrap();

        assert_eq!(s.owners_around(&origin()), vec![1, 2]);
        assert!(s.owners_around(&HexCoord::new(2, 0)).is_empty());
    }

    #[test]
    fn test_longest_road_chain_and_block() {
        let board = board();
        let rules = PlacementRules::permissive();
        let mut s = Structures::new();

        // Walk four roads around the origin hex
        let corners = origin().vertices();
        let path: Vec<EdgeCoord> = origin().edges().into_iter().take(4).collect();
        for edge in &path {
            s.place_road(&board, 0, *edge, &rules).unwrap();
        }
        assert_eq!(s.longest_road(0), 4);
        assert_eq!(s.longest_road(1), 0);

        // An opponent building on an interior corner splits the chain
        let interior = corners
            .iter()
            .copied()
            .find(|v| {
                path.iter().filter(|e| e.endpoints().contains(v)).count() == 2
                    && s.building_at(v).is_none()
            })
            .unwrap();
        s.place_settlement(&board, 1, interior, &rules, true).unwrap();
        assert!(s.longest_road(0) < 4);
    }

    #[test]
    fn test_full_ring_counts_every_edge() {
        let board = board();
        let rules = PlacementRules::permissive();
        let mut s = Structures::new();
        for edge in origin().edges() {
            s.place_road(&board, 0, edge, &rules).unwrap();
        }
        assert_eq!(s.longest_road(0), 6);
    }

    #[test]
    fn test_ports_of_player() {
        let board = board();
        let rules = PlacementRules::permissive();
        let mut s = Structures::new();
        let port = board.ports()[0].clone();
        s.place_settlement(&board, 3, port.edge.endpoints()[0], &rules, true)
            .unwrap();

        assert_eq!(s.ports_of(&board, 3), vec![port.kind]);
        assert!(s.ports_of(&board, 0).is_empty());
    }
}

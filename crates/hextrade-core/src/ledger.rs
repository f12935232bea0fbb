//! Resource hands, building costs and the per-session ledger.
//!
//! The [`ResourceLedger`] is the only place resource counts change. Debits
//! check every resource before touching any of them, so a rejected spend
//! leaves the hand exactly as it was.

use crate::board::{Board, Resource, TileId};
use crate::error::{GameError, Shortfall};
use crate::player::PlayerId;
use crate::structures::Structures;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A multiset of resources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHand {
    pub wood: u32,
    pub brick: u32,
    pub wheat: u32,
    pub sheep: u32,
    pub ore: u32,
}

impl ResourceHand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_amounts(wood: u32, brick: u32, wheat: u32, sheep: u32, ore: u32) -> Self {
        Self {
            wood,
            brick,
            wheat,
            sheep,
            ore,
        }
    }

    /// A hand holding only one resource type
    pub fn single(resource: Resource, amount: u32) -> Self {
        let mut hand = Self::new();
        hand.add(resource, amount);
        hand
    }

    /// Number of cards held, saturating at `u32::MAX`
    pub fn total(&self) -> u32 {
        self.iter().fold(0u32, |acc, (_, n)| acc.saturating_add(n))
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn get(&self, resource: Resource) -> u32 {
        match resource {
            Resource::Wood => self.wood,
            Resource::Brick => self.brick,
            Resource::Wheat => self.wheat,
            Resource::Sheep => self.sheep,
            Resource::Ore => self.ore,
        }
    }

    fn slot(&mut self, resource: Resource) -> &mut u32 {
        match resource {
            Resource::Wood => &mut self.wood,
            Resource::Brick => &mut self.brick,
            Resource::Wheat => &mut self.wheat,
            Resource::Sheep => &mut self.sheep,
            Resource::Ore => &mut self.ore,
        }
    }

    pub fn add(&mut self, resource: Resource, amount: u32) {
        let slot = self.slot(resource);
        *slot = slot.saturating_add(amount);
    }

    pub fn add_hand(&mut self, other: &ResourceHand) {
        for (resource, amount) in other.iter() {
            self.add(resource, amount);
        }
    }

    /// Add `other`, failing on the first resource that would overflow
    pub fn checked_add(&self, other: &ResourceHand) -> Result<ResourceHand, GameError> {
        let mut out = *self;
        for (resource, amount) in other.iter() {
            let slot = out.slot(resource);
            *slot = slot
                .checked_add(amount)
                .ok_or(GameError::ResourceOverflow(resource))?;
        }
        Ok(out)
    }

    /// Non-zero entries in `Resource::ALL` order
    pub fn iter(&self) -> impl Iterator<Item = (Resource, u32)> + '_ {
        Resource::ALL
            .into_iter()
            .map(|r| (r, self.get(r)))
            .filter(|(_, n)| *n > 0)
    }

    /// Every resource in `cost` this hand cannot cover
    pub fn shortfall(&self, cost: &ResourceHand) -> Vec<Shortfall> {
        Resource::ALL
            .into_iter()
            .filter(|r| self.get(*r) < cost.get(*r))
            .map(|resource| Shortfall {
                resource,
                needed: cost.get(resource),
                available: self.get(resource),
            })
            .collect()
    }

    pub fn can_afford(&self, cost: &ResourceHand) -> bool {
        self.shortfall(cost).is_empty()
    }

    /// Subtract `cost` if every resource is covered
    pub fn checked_sub(&self, cost: &ResourceHand) -> Result<ResourceHand, GameError> {
        let missing = self.shortfall(cost);
        if !missing.is_empty() {
            return Err(GameError::InsufficientResources { missing });
        }
        let mut out = *self;
        for (resource, amount) in cost.iter() {
            *out.slot(resource) -= amount;
        }
        Ok(out)
    }

    /// Whether two hands share a resource type
    pub fn overlaps(&self, other: &ResourceHand) -> bool {
        Resource::ALL
            .into_iter()
            .any(|r| self.get(r) > 0 && other.get(r) > 0)
    }

    /// Pick one resource uniformly among the cards held
    fn pick_random<R: Rng>(&self, rng: &mut R) -> Option<Resource> {
        let cards: Vec<Resource> = self
            .iter()
            .flat_map(|(r, n)| std::iter::repeat(r).take(n as usize))
            .collect();
        cards.choose(rng).copied()
    }
}

impl FromIterator<(Resource, u32)> for ResourceHand {
    fn from_iter<I: IntoIterator<Item = (Resource, u32)>>(iter: I) -> Self {
        let mut hand = Self::new();
        for (resource, amount) in iter {
            hand.add(resource, amount);
        }
        hand
    }
}

/// Building costs
pub mod costs {
    use super::ResourceHand;

    /// 1 wood, 1 brick
    pub fn road() -> ResourceHand {
        ResourceHand::with_amounts(1, 1, 0, 0, 0)
    }

    /// 1 wood, 1 brick, 1 wheat, 1 sheep
    pub fn settlement() -> ResourceHand {
        ResourceHand::with_amounts(1, 1, 1, 1, 0)
    }

    /// 2 wheat, 3 ore
    pub fn city() -> ResourceHand {
        ResourceHand::with_amounts(0, 0, 2, 0, 3)
    }

    /// 1 wheat, 1 sheep, 1 ore
    pub fn development_card() -> ResourceHand {
        ResourceHand::with_amounts(0, 0, 1, 1, 1)
    }
}

/// One resource change, as broadcast to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDelta {
    pub player: PlayerId,
    pub resource: Resource,
    pub change: i64,
}

impl ResourceDelta {
    /// Deltas for crediting (`sign = 1`) or debiting (`sign = -1`) a hand
    pub fn from_hand(player: PlayerId, hand: &ResourceHand, sign: i64) -> Vec<ResourceDelta> {
        hand.iter()
            .map(|(resource, amount)| ResourceDelta {
                player,
                resource,
                change: sign * amount as i64,
            })
            .collect()
    }
}

/// What a roll produces.
///
/// Every tile showing `roll` that the robber is not on pays each building on
/// its corners: one unit for a settlement, two for a city. Deltas are
/// summed per player and resource.
pub fn production(
    board: &Board,
    structures: &Structures,
    roll: u8,
    robber: Option<TileId>,
) -> Vec<ResourceDelta> {
    let mut totals: BTreeMap<(PlayerId, Resource), u32> = BTreeMap::new();
    for tile in board.tiles_for_roll(roll).filter(|t| Some(t.id) != robber) {
        let Some(resource) = tile.resource() else {
            continue;
        };
        for building in structures.buildings_around(&tile.coord) {
            *totals.entry((building.owner, resource)).or_default() += building.kind.yield_amount();
        }
    }
    totals
        .into_iter()
        .map(|((player, resource), amount)| ResourceDelta {
            player,
            resource,
            change: amount as i64,
        })
        .collect()
}

/// Resource counts for every player of a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLedger {
    hands: Vec<ResourceHand>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an empty account; returns the id it was opened under
    pub fn open_account(&mut self) -> PlayerId {
        self.hands.push(ResourceHand::new());
        (self.hands.len() - 1) as PlayerId
    }

    pub fn hand(&self, player: PlayerId) -> Result<&ResourceHand, GameError> {
        self.hands
            .get(player as usize)
            .ok_or(GameError::UnknownPlayer(player))
    }

    fn hand_mut(&mut self, player: PlayerId) -> Result<&mut ResourceHand, GameError> {
        self.hands
            .get_mut(player as usize)
            .ok_or(GameError::UnknownPlayer(player))
    }

    pub fn credit(&mut self, player: PlayerId, amount: &ResourceHand) -> Result<(), GameError> {
        let hand = self.hand_mut(player)?;
        *hand = hand.checked_add(amount)?;
        Ok(())
    }

    /// Remove `amount` from a hand, all or nothing
    pub fn debit(&mut self, player: PlayerId, amount: &ResourceHand) -> Result<(), GameError> {
        let hand = self.hand_mut(player)?;
        *hand = hand.checked_sub(amount)?;
        Ok(())
    }

    /// Pay a cost. Rejected with the short resources if the hand can't cover it.
    pub fn spend(&mut self, player: PlayerId, cost: &ResourceHand) -> Result<(), GameError> {
        self.debit(player, cost)
    }

    /// Check a spend without applying it
    pub fn ensure_affordable(&self, player: PlayerId, cost: &ResourceHand) -> Result<(), GameError> {
        self.hand(player)?.checked_sub(cost).map(|_| ())
    }

    /// Exchange two hands between players. Both legs apply or neither does.
    pub fn swap(
        &mut self,
        a: PlayerId,
        a_gives: &ResourceHand,
        b: PlayerId,
        b_gives: &ResourceHand,
    ) -> Result<(), GameError> {
        let a_after = self.hand(a)?.checked_sub(a_gives)?.checked_add(b_gives)?;
        let b_after = self.hand(b)?.checked_sub(b_gives)?.checked_add(a_gives)?;

        *self.hand_mut(a)? = a_after;
        *self.hand_mut(b)? = b_after;
        Ok(())
    }

    /// Exchange with the bank: `gives` leaves the economy, `receives` enters it.
    pub fn exchange_with_bank(
        &mut self,
        player: PlayerId,
        gives: &ResourceHand,
        receives: &ResourceHand,
    ) -> Result<(), GameError> {
        let hand = self.hand_mut(player)?;
        *hand = hand.checked_sub(gives)?.checked_add(receives)?;
        Ok(())
    }

    /// Move one random card from `victim` to `thief`
    pub fn steal_random<R: Rng>(
        &mut self,
        thief: PlayerId,
        victim: PlayerId,
        rng: &mut R,
    ) -> Result<Option<Resource>, GameError> {
        self.hand(thief)?;
        let Some(resource) = self.hand(victim)?.pick_random(rng) else {
            return Ok(None);
        };
        let card = ResourceHand::single(resource, 1);
        self.debit(victim, &card)?;
        self.credit(thief, &card)?;
        Ok(Some(resource))
    }

    /// Credit a batch of production deltas, all or nothing
    pub fn apply_production(&mut self, deltas: &[ResourceDelta]) -> Result<(), GameError> {
        let mut hands = self.hands.clone();
        for delta in deltas {
            let hand = hands
                .get_mut(delta.player as usize)
                .ok_or(GameError::UnknownPlayer(delta.player))?;
            let amount = u32::try_from(delta.change.max(0))
                .map_err(|_| GameError::ResourceOverflow(delta.resource))?;
            *hand = hand.checked_add(&ResourceHand::single(delta.resource, amount))?;
        }
        self.hands = hands;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::board::BoardConfig;
    use crate::structures::PlacementRules;

    fn ledger_with(hands: &[ResourceHand]) -> ResourceLedger {
        let mut ledger = ResourceLedger::new();
        for hand in hands {
            let id = ledger.open_account();
            ledger.credit(id, hand).unwrap();
        }
        ledger
    }

    #[test]
    fn test_hand_total_and_get() {
        let hand = ResourceHand::with_amounts(1, 2, 3, 4, 5);
        assert_eq!(hand.total(), 15);
        assert_eq!(hand.get(Resource::Sheep), 4);
    }

    #[test]
    fn test_building_costs() {
        assert_eq!(costs::road().total(), 2);
        assert_eq!(costs::settlement().total(), 4);
        assert_eq!(costs::city().total(), 5);
        assert_eq!(costs::development_card().total(), 3);
    }

    #[test]
    fn test_spend_success() {
        let mut ledger = ledger_with(&[ResourceHand::with_amounts(2, 2, 0, 0, 0)]);
        ledger.spend(0, &costs::road()).unwrap();
        assert_eq!(*ledger.hand(0).unwrap(), ResourceHand::with_amounts(1, 1, 0, 0, 0));
    }

    #[test]
    fn test_spend_shortfall_is_all_or_nothing() {
        let before = ResourceHand::with_amounts(1, 0, 1, 0, 0);
        let mut ledger = ledger_with(&[before]);

        let err = ledger.spend(0, &costs::settlement()).unwrap_err();
        assert_eq!(err.short_resources(), vec![Resource::Brick, Resource::Sheep]);
        assert_eq!(*ledger.hand(0).unwrap(), before);
    }

    #[test]
    fn test_counts_never_go_negative() {
        let mut ledger = ledger_with(&[ResourceHand::with_amounts(3, 3, 0, 0, 0)]);
        let mut accepted = 0;
        for _ in 0..10 {
            if ledger.spend(0, &costs::road()).is_ok() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 3);
        assert!(ledger.hand(0).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_player() {
        let mut ledger = ResourceLedger::new();
        assert_eq!(
            ledger.credit(3, &ResourceHand::single(Resource::Ore, 1)),
            Err(GameError::UnknownPlayer(3))
        );
    }

    #[test]
    fn test_swap_preserves_totals() {
        let mut ledger = ledger_with(&[
            ResourceHand::with_amounts(3, 0, 0, 0, 0),
            ResourceHand::with_amounts(0, 0, 0, 0, 2),
        ]);
        ledger
            .swap(
                0,
                &ResourceHand::single(Resource::Wood, 2),
                1,
                &ResourceHand::single(Resource::Ore, 1),
            )
            .unwrap();
        assert_eq!(*ledger.hand(0).unwrap(), ResourceHand::with_amounts(1, 0, 0, 0, 1));
        assert_eq!(*ledger.hand(1).unwrap(), ResourceHand::with_amounts(2, 0, 0, 0, 1));
    }

    #[test]
    fn test_total_saturates() {
        let hand = ResourceHand::with_amounts(u32::MAX, 2, 0, 0, 0);
        assert_eq!(hand.total(), u32::MAX);
        assert!(!hand.is_empty());
    }

    #[test]
    fn test_credit_overflow_is_rejected() {
        let mut ledger = ResourceLedger::new();
        let id = ledger.open_account();
        ledger.credit(id, &ResourceHand::single(Resource::Wood, u32::MAX)).unwrap();
        let before = ledger.clone();

        assert_eq!(
            ledger.credit(id, &ResourceHand::with_amounts(1, 1, 0, 0, 0)),
            Err(GameError::ResourceOverflow(Resource::Wood))
        );
        assert_eq!(
            ledger.exchange_with_bank(id, &ResourceHand::new(), &ResourceHand::single(Resource::Wood, 1)),
            Err(GameError::ResourceOverflow(Resource::Wood))
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_swap_failure_changes_nothing() {
        let a = ResourceHand::with_amounts(3, 0, 0, 0, 0);
        let b = ResourceHand::with_amounts(0, 1, 0, 0, 0);
        let mut ledger = ledger_with(&[a, b]);
        let result = ledger.swap(
            0,
            &ResourceHand::single(Resource::Wood, 2),
            1,
            &ResourceHand::single(Resource::Ore, 1),
        );
        assert!(matches!(result, Err(GameError::InsufficientResources { .. })));
        assert_eq!(*ledger.hand(0).unwrap(), a);
        assert_eq!(*ledger.hand(1).unwrap(), b);
    }

    #[test]
    fn test_bank_exchange() {
        let mut ledger = ledger_with(&[ResourceHand::with_amounts(4, 0, 0, 0, 0)]);
        ledger
            .exchange_with_bank(
                0,
                &ResourceHand::single(Resource::Wood, 4),
                &ResourceHand::single(Resource::Ore, 1),
            )
            .unwrap();
        assert_eq!(*ledger.hand(0).unwrap(), ResourceHand::single(Resource::Ore, 1));
    }

    #[test]
    fn test_steal_random_moves_one_card() {
        let mut ledger = ledger_with(&[
            ResourceHand::new(),
            ResourceHand::with_amounts(0, 0, 1, 0, 0),
        ]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let stolen = ledger.steal_random(0, 1, &mut rng).unwrap();
        assert_eq!(stolen, Some(Resource::Wheat));
        assert!(ledger.hand(1).unwrap().is_empty());
        assert_eq!(ledger.hand(0).unwrap().wheat, 1);

        assert_eq!(ledger.steal_random(0, 1, &mut rng).unwrap(), None);
    }

    #[test]
    fn test_resource_delta_from_hand() {
        let deltas = ResourceDelta::from_hand(2, &ResourceHand::with_amounts(0, 1, 0, 0, 2), -1);
        assert_eq!(
            deltas,
            vec![
                ResourceDelta {
                    player: 2,
                    resource: Resource::Brick,
                    change: -1
                },
                ResourceDelta {
                    player: 2,
                    resource: Resource::Ore,
                    change: -2
                },
            ]
        );
    }

    fn producing_board() -> Board {
        Board::generate(&BoardConfig::classic(), &mut ChaCha8Rng::seed_from_u64(3)).unwrap()
    }

    #[test]
    fn test_production_settlement_and_city() {
        let board = producing_board();
        let tile = board.tiles().iter().find(|t| t.number.is_some()).unwrap().clone();
        let resource = tile.resource().unwrap();
        let roll = tile.number.unwrap();
        let corners = tile.coord.vertices();

        let rules = PlacementRules::permissive();
        let mut structures = Structures::new();
        structures.place_settlement(&board, 0, corners[0], &rules, true).unwrap();
        structures.place_settlement(&board, 1, corners[3], &rules, true).unwrap();
        structures.upgrade_to_city(1, corners[3]).unwrap();

        let deltas = production(&board, &structures, roll, None);
        let for_tile = |player: PlayerId| {
            deltas
                .iter()
                .filter(|d| d.player == player && d.resource == resource)
                .map(|d| d.change)
                .sum::<i64>()
        };
        // Other tiles with the same number may touch these corners too
        assert!(for_tile(0) >= 1);
        assert!(for_tile(1) >= 2);

        let mut ledger = ledger_with(&[ResourceHand::new(), ResourceHand::new()]);
        ledger.apply_production(&deltas).unwrap();
        assert_eq!(ledger.hand(1).unwrap().get(resource) as i64, for_tile(1));
    }

    #[test]
    fn test_robber_blocks_production() {
        let board = producing_board();
        let tile = board.tiles().iter().find(|t| t.number.is_some()).unwrap().clone();
        let roll = tile.number.unwrap();

        let mut structures = Structures::new();
        structures
            .place_settlement(&board, 0, tile.coord.vertices()[0], &PlacementRules::permissive(), true)
            .unwrap();

        let open = production(&board, &structures, roll, None);
        let blocked = production(&board, &structures, roll, Some(tile.id));
        let total = |d: &[ResourceDelta]| d.iter().map(|d| d.change).sum::<i64>();
        assert!(total(&blocked) < total(&open));
    }

    #[test]
    fn test_no_production_on_seven() {
        let board = producing_board();
        let mut structures = Structures::new();
        for (i, tile) in board.tiles().iter().take(3).enumerate() {
            structures
                .place_settlement(&board, i as PlayerId, tile.coord.vertices()[0], &PlacementRules::permissive(), true)
                .unwrap();
        }
        assert!(production(&board, &structures, 7, None).is_empty());
    }
}

//! Trade offers between players and exchanges with the bank.
//!
//! Offers live only while unresolved. Accepting one swaps both legs
//! through the ledger in a single step; a failed swap leaves every hand
//! and the offer untouched.

use crate::board::{PortKind, Resource};
use crate::error::GameError;
use crate::ledger::{ResourceHand, ResourceLedger};
use crate::player::PlayerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of a trade offer within a session
pub type OfferId = u64;

/// Default bank exchange ratio without a port
pub const BANK_RATIO: u32 = 4;

/// Largest count of one resource a single offer may name
pub const MAX_OFFER_AMOUNT: u32 = 99;

/// Who an offer is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "player", rename_all = "snake_case")]
pub enum TradeTarget {
    Bank,
    Player(PlayerId),
}

/// A trade offer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeOffer {
    pub id: OfferId,
    pub from: PlayerId,
    /// What the proposer hands over
    pub give: ResourceHand,
    /// What the proposer gets back
    pub receive: ResourceHand,
    pub to: TradeTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeResolution {
    Accepted,
    Rejected,
    Cancelled,
}

/// Per-resource exchange ratios with the bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankRates {
    rates: [u32; 5],
}

impl Default for BankRates {
    fn default() -> Self {
        Self {
            rates: [BANK_RATIO; 5],
        }
    }
}

impl BankRates {
    /// Best ratio per resource given the ports a player can use
    pub fn from_ports(ports: &[PortKind]) -> Self {
        let mut rates = Self::default();
        for port in ports {
            for (i, resource) in Resource::ALL.into_iter().enumerate() {
                let applies = match port {
                    PortKind::Generic => true,
                    PortKind::Resource(r) => *r == resource,
                };
                if applies {
                    rates.rates[i] = rates.rates[i].min(port.ratio());
                }
            }
        }
        rates
    }

    pub fn rate(&self, resource: Resource) -> u32 {
        let index = Resource::ALL
            .iter()
            .position(|r| *r == resource)
            .unwrap_or_default();
        self.rates[index]
    }

    /// Check that `give` buys exactly `receive` at these rates
    pub fn check(&self, give: &ResourceHand, receive: &ResourceHand) -> Result<(), GameError> {
        let mut credits: u64 = 0;
        for (resource, amount) in give.iter() {
            let rate = self.rate(resource);
            if amount % rate != 0 {
                return Err(GameError::InvalidTrade(format!(
                    "{resource} trades with the bank at {rate}:1"
                )));
            }
            credits += u64::from(amount / rate);
        }
        let wanted: u64 = receive.iter().map(|(_, n)| u64::from(n)).sum();
        if credits != wanted {
            return Err(GameError::InvalidTrade(format!(
                "offer buys {credits} resources from the bank, asked for {wanted}"
            )));
        }
        Ok(())
    }
}

fn check_shape(from: PlayerId, give: &ResourceHand, receive: &ResourceHand, to: TradeTarget) -> Result<(), GameError> {
    if let Some((resource, amount)) = give
        .iter()
        .chain(receive.iter())
        .find(|(_, n)| *n > MAX_OFFER_AMOUNT)
    {
        return Err(GameError::InvalidTrade(format!(
            "{amount} {resource} is more than one offer can carry (max {MAX_OFFER_AMOUNT})"
        )));
    }
    if give.is_empty() || receive.is_empty() {
        return Err(GameError::InvalidTrade("both sides must be non-empty".into()));
    }
    if give.overlaps(receive) {
        return Err(GameError::InvalidTrade(
            "cannot give and receive the same resource".into(),
        ));
    }
    if to == TradeTarget::Player(from) {
        return Err(GameError::InvalidTrade("cannot trade with yourself".into()));
    }
    Ok(())
}

/// Open offers of one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeNegotiator {
    offers: BTreeMap<OfferId, TradeOffer>,
    next_id: OfferId,
}

impl TradeNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> OfferId {
        self.next_id += 1;
        self.next_id
    }

    pub fn offer(&self, id: OfferId) -> Option<&TradeOffer> {
        self.offers.get(&id)
    }

    pub fn open_offers(&self) -> impl Iterator<Item = &TradeOffer> {
        self.offers.values()
    }

    /// Record an offer to another player.
    ///
    /// The proposer must currently hold everything in `give`.
    pub fn propose(
        &mut self,
        ledger: &ResourceLedger,
        from: PlayerId,
        give: ResourceHand,
        receive: ResourceHand,
        to: PlayerId,
    ) -> Result<TradeOffer, GameError> {
        let target = TradeTarget::Player(to);
        check_shape(from, &give, &receive, target)?;
        ledger.hand(to)?;
        ledger.ensure_affordable(from, &give)?;

        let offer = TradeOffer {
            id: self.allocate_id(),
            from,
            give,
            receive,
            to: target,
        };
        self.offers.insert(offer.id, offer.clone());
        Ok(offer)
    }

    /// Exchange with the bank. The bank accepts any offer at a valid ratio,
    /// so it settles at once and is never stored.
    pub fn settle_with_bank(
        &mut self,
        ledger: &mut ResourceLedger,
        rates: &BankRates,
        from: PlayerId,
        give: ResourceHand,
        receive: ResourceHand,
    ) -> Result<TradeOffer, GameError> {
        check_shape(from, &give, &receive, TradeTarget::Bank)?;
        rates.check(&give, &receive)?;
        ledger.exchange_with_bank(from, &give, &receive)?;
        Ok(TradeOffer {
            id: self.allocate_id(),
            from,
            give,
            receive,
            to: TradeTarget::Bank,
        })
    }

    /// Accept or reject an offer addressed to `responder`
    pub fn respond(
        &mut self,
        ledger: &mut ResourceLedger,
        id: OfferId,
        responder: PlayerId,
        accept: bool,
    ) -> Result<(TradeOffer, TradeResolution), GameError> {
        let offer = self.offers.get(&id).ok_or(GameError::UnknownOffer(id))?;
        if offer.to != TradeTarget::Player(responder) {
            return Err(GameError::InvalidTrade("offer is not addressed to you".into()));
        }

        let resolution = if accept {
            ledger.swap(offer.from, &offer.give, responder, &offer.receive)?;
            TradeResolution::Accepted
        } else {
            TradeResolution::Rejected
        };

        let offer = self.offers.remove(&id).ok_or(GameError::UnknownOffer(id))?;
        Ok((offer, resolution))
    }

    /// Withdraw an unresolved offer. Only the proposer may cancel.
    pub fn cancel(&mut self, id: OfferId, by: PlayerId) -> Result<TradeOffer, GameError> {
        match self.offers.get(&id) {
            None => Err(GameError::UnknownOffer(id)),
            Some(offer) if offer.from != by => {
                Err(GameError::InvalidTrade("only the proposer can cancel".into()))
            }
            Some(_) => self.offers.remove(&id).ok_or(GameError::UnknownOffer(id)),
        }
    }

    /// Drop every open offer, returning them in id order
    pub fn retire_all(&mut self) -> Vec<TradeOffer> {
        std::mem::take(&mut self.offers).into_values().collect()
    }

    /// Drop every open offer made by or to a player
    pub fn retire_involving(&mut self, player: PlayerId) -> Vec<TradeOffer> {
        let ids: Vec<OfferId> = self
            .offers
            .values()
            .filter(|o| o.from == player || o.to == TradeTarget::Player(player))
            .map(|o| o.id)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.offers.remove(&id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ledger_with(hands: &[ResourceHand]) -> ResourceLedger {
        let mut ledger = ResourceLedger::new();
        for hand in hands {
            let id = ledger.open_account();
            ledger.credit(id, hand).unwrap();
        }
        ledger
    }

    fn wood(n: u32) -> ResourceHand {
        ResourceHand::single(Resource::Wood, n)
    }

    fn ore(n: u32) -> ResourceHand {
        ResourceHand::single(Resource::Ore, n)
    }

    fn sum(ledger: &ResourceLedger, a: PlayerId, b: PlayerId) -> ResourceHand {
        let mut total = *ledger.hand(a).unwrap();
        total.add_hand(ledger.hand(b).unwrap());
        total
    }

    #[test]
    fn test_accepted_trade_swaps_both_legs() {
        let mut ledger = ledger_with(&[wood(3), ore(2)]);
        let mut trades = TradeNegotiator::new();
        let before = sum(&ledger, 0, 1);

        let offer = trades.propose(&ledger, 0, wood(2), ore(1), 1).unwrap();
        let (_, resolution) = trades.respond(&mut ledger, offer.id, 1, true).unwrap();

        assert_eq!(resolution, TradeResolution::Accepted);
        assert_eq!(*ledger.hand(0).unwrap(), ResourceHand::with_amounts(1, 0, 0, 0, 1));
        assert_eq!(*ledger.hand(1).unwrap(), ResourceHand::with_amounts(2, 0, 0, 0, 1));
        assert_eq!(sum(&ledger, 0, 1), before);
        assert!(trades.offer(offer.id).is_none());
    }

    #[test]
    fn test_rejected_trade_changes_nothing() {
        let mut ledger = ledger_with(&[wood(3), ore(2)]);
        let before = ledger.clone();
        let mut trades = TradeNegotiator::new();

        let offer = trades.propose(&ledger, 0, wood(2), ore(1), 1).unwrap();
        let (_, resolution) = trades.respond(&mut ledger, offer.id, 1, false).unwrap();

        assert_eq!(resolution, TradeResolution::Rejected);
        assert_eq!(ledger, before);
        assert_eq!(trades.respond(&mut ledger, offer.id, 1, true), Err(GameError::UnknownOffer(offer.id)));
    }

    #[test]
    fn test_failed_accept_keeps_offer_and_hands() {
        let mut ledger = ledger_with(&[wood(3), ResourceHand::new()]);
        let before = ledger.clone();
        let mut trades = TradeNegotiator::new();

        let offer = trades.propose(&ledger, 0, wood(2), ore(1), 1).unwrap();
        let err = trades.respond(&mut ledger, offer.id, 1, true).unwrap_err();

        assert_eq!(err.short_resources(), vec![Resource::Ore]);
        assert_eq!(ledger, before);
        assert!(trades.offer(offer.id).is_some());
    }

    #[test]
    fn test_only_target_responds() {
        let mut ledger = ledger_with(&[wood(3), ore(2), ore(2)]);
        let mut trades = TradeNegotiator::new();
        let offer = trades.propose(&ledger, 0, wood(2), ore(1), 1).unwrap();
        assert!(matches!(
            trades.respond(&mut ledger, offer.id, 2, true),
            Err(GameError::InvalidTrade(_))
        ));
    }

    #[test]
    fn test_propose_requires_goods() {
        let ledger = ledger_with(&[wood(1), ore(2)]);
        let mut trades = TradeNegotiator::new();
        assert!(matches!(
            trades.propose(&ledger, 0, wood(2), ore(1), 1),
            Err(GameError::InsufficientResources { .. })
        ));
        assert!(matches!(
            trades.propose(&ledger, 0, wood(1), ore(1), 0),
            Err(GameError::InvalidTrade(_))
        ));
        assert!(matches!(
            trades.propose(&ledger, 0, wood(1), wood(1), 1),
            Err(GameError::InvalidTrade(_))
        ));
        assert_eq!(
            trades.propose(&ledger, 0, wood(1), ore(1), 7),
            Err(GameError::UnknownPlayer(7))
        );
    }

    #[test]
    fn test_cancel() {
        let ledger = ledger_with(&[wood(3), ore(2)]);
        let mut trades = TradeNegotiator::new();
        let offer = trades.propose(&ledger, 0, wood(2), ore(1), 1).unwrap();

        assert!(matches!(trades.cancel(offer.id, 1), Err(GameError::InvalidTrade(_))));
        assert_eq!(trades.cancel(offer.id, 0).unwrap().id, offer.id);
        assert_eq!(trades.cancel(offer.id, 0), Err(GameError::UnknownOffer(offer.id)));
    }

    #[test]
    fn test_retire_all() {
        let ledger = ledger_with(&[wood(3), ore(2), ore(1)]);
        let mut trades = TradeNegotiator::new();
        trades.propose(&ledger, 0, wood(1), ore(1), 1).unwrap();
        trades.propose(&ledger, 0, wood(1), ore(1), 2).unwrap();

        assert_eq!(trades.retire_all().len(), 2);
        assert_eq!(trades.open_offers().count(), 0);
    }

    #[test]
    fn test_bank_trade_default_ratio() {
        let mut ledger = ledger_with(&[wood(4)]);
        let mut trades = TradeNegotiator::new();
        let offer = trades
            .settle_with_bank(&mut ledger, &BankRates::default(), 0, wood(4), ore(1))
            .unwrap();

        assert_eq!(offer.to, TradeTarget::Bank);
        assert_eq!(*ledger.hand(0).unwrap(), ore(1));
        assert_eq!(trades.open_offers().count(), 0);
    }

    #[test]
    fn test_oversized_offers_are_refused() {
        let mut ledger = ledger_with(&[ResourceHand::with_amounts(0, 0, 0, 4, 0), ore(2)]);
        let before = ledger.clone();
        let mut trades = TradeNegotiator::new();
        let huge = ResourceHand::with_amounts(u32::MAX, 2, 0, 0, 0);
        let sheep = ResourceHand::with_amounts(0, 0, 0, 4, 0);

        assert!(matches!(
            trades.settle_with_bank(&mut ledger, &BankRates::default(), 0, sheep, huge),
            Err(GameError::InvalidTrade(_))
        ));
        assert!(matches!(
            trades.propose(&ledger, 0, sheep, huge, 1),
            Err(GameError::InvalidTrade(_))
        ));
        assert!(matches!(
            trades.propose(&ledger, 1, ResourceHand::with_amounts(0, 0, 0, 0, u32::MAX), sheep, 0),
            Err(GameError::InvalidTrade(_))
        ));
        assert_eq!(ledger, before);
        assert_eq!(trades.open_offers().count(), 0);
    }

    #[test]
    fn test_bank_check_does_not_wrap() {
        // 2^32 - 1 + 2 wraps to 1 in u32
        let receive = ResourceHand::with_amounts(u32::MAX, 2, 0, 0, 0);
        let give = ResourceHand::with_amounts(0, 0, 0, 4, 0);
        assert!(BankRates::default().check(&give, &receive).is_err());
    }

    #[test]
    fn test_bank_trade_bad_ratio() {
        let mut ledger = ledger_with(&[wood(6)]);
        let before = ledger.clone();
        let mut trades = TradeNegotiator::new();
        let rates = BankRates::default();

        assert!(trades.settle_with_bank(&mut ledger, &rates, 0, wood(3), ore(1)).is_err());
        assert!(trades.settle_with_bank(&mut ledger, &rates, 0, wood(4), ore(2)).is_err());
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_port_rates() {
        let rates = BankRates::from_ports(&[PortKind::Generic, PortKind::Resource(Resource::Ore)]);
        assert_eq!(rates.rate(Resource::Ore), 2);
        assert_eq!(rates.rate(Resource::Wood), 3);

        let mut ledger = ledger_with(&[ResourceHand::with_amounts(3, 0, 0, 0, 2)]);
        let mut trades = TradeNegotiator::new();
        trades
            .settle_with_bank(
                &mut ledger,
                &rates,
                0,
                ResourceHand::with_amounts(3, 0, 0, 0, 2),
                ResourceHand::with_amounts(0, 2, 0, 0, 0),
            )
            .unwrap();
        assert_eq!(*ledger.hand(0).unwrap(), ResourceHand::single(Resource::Brick, 2));
    }
}

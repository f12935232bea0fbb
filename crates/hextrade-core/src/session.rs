//! The authoritative game session and its turn state machine.
//!
//! A [`Session`] owns the board, players, ledger, structures, open trade
//! offers and the robber. Every change goes through [`Session::apply`] (or
//! one of the lobby methods), which either returns the events describing
//! the change or a [`GameError`] with the session left untouched.
//!
//! Phases of a turn:
//!
//! ```text
//! WaitingForPlayers -> Rolling -> Acting -> EndedTurn -> Rolling (next player)
//!                         |          |  ^
//!                         v          v  |
//!                      RobberPending / RoadBuilding
//! ```

use crate::actions::{GameEvent, Intent, Outcome};
use crate::board::{Board, BoardConfig, BoardError, TileId};
use crate::dev_cards::{self, DevCard, Effect};
use crate::error::GameError;
use crate::hex::{EdgeCoord, VertexCoord};
use crate::ledger::{self, costs, ResourceDelta, ResourceHand, ResourceLedger};
use crate::player::{Player, PlayerId};
use crate::structures::{PlacementRules, Structures};
use crate::trade::{BankRates, OfferId, TradeNegotiator, TradeOffer, TradeResolution, TradeTarget};
use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Where play resumes once the robber has moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumePhase {
    Rolling,
    Acting,
}

impl From<ResumePhase> for GamePhase {
    fn from(resume: ResumePhase) -> Self {
        match resume {
            ResumePhase::Rolling => GamePhase::Rolling,
            ResumePhase::Acting => GamePhase::Acting,
        }
    }
}

/// Turn phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum GamePhase {
    /// Lobby: players join and get ready
    WaitingForPlayers,
    /// Active player must roll
    Rolling,
    /// Active player may build, trade, use cards or end the turn
    Acting,
    /// The robber must move before anything else happens
    RobberPending { resume: ResumePhase },
    /// Free roads from a road card
    RoadBuilding { remaining: u32 },
    /// Between the end-turn intent and the next player's roll
    EndedTurn,
}

/// Game rules for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub board: BoardConfig,
    pub placement: PlacementRules,
    pub min_players: usize,
    pub max_players: usize,
    /// Fixed seed for the board, dice and card draws
    pub seed: Option<u64>,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            board: BoardConfig::default(),
            placement: PlacementRules::default(),
            min_players: 2,
            max_players: 6,
            seed: None,
        }
    }
}

/// A player as seen by one viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    #[serde(flatten)]
    pub player: Player,
    pub resources: ResourceHand,
    pub hand_size: usize,
}

/// Full serializable view of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub phase: GamePhase,
    pub turn: u32,
    pub current_player: Option<PlayerId>,
    pub board: Board,
    pub robber: Option<TileId>,
    pub players: Vec<PlayerView>,
    pub structures: Structures,
    pub open_offers: Vec<TradeOffer>,
}

/// One game instance, identified by its room code
#[derive(Debug, Clone)]
pub struct Session {
    code: String,
    created_at: DateTime<Utc>,
    rules: RuleConfig,
    board: Board,
    players: Vec<Player>,
    ledger: ResourceLedger,
    structures: Structures,
    trades: TradeNegotiator,
    robber: Option<TileId>,
    current: usize,
    turn: u32,
    phase: GamePhase,
    rng: ChaCha8Rng,
}

impl Session {
    /// Create a session and generate its board.
    ///
    /// Fails only if the board config's pools don't match its shape.
    pub fn new(code: impl Into<String>, rules: RuleConfig) -> Result<Self, BoardError> {
        let mut rng = match rules.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let board = Board::generate(&rules.board, &mut rng)?;
        let robber = board.first_desert();

        Ok(Self {
            code: code.into(),
            created_at: Utc::now(),
            rules,
            board,
            players: Vec::new(),
            ledger: ResourceLedger::new(),
            structures: Structures::new(),
            trades: TradeNegotiator::new(),
            robber,
            current: 0,
            turn: 0,
            phase: GamePhase::WaitingForPlayers,
            rng,
        })
    }

    // ==================== Accessors ====================

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn rules(&self) -> &RuleConfig {
        &self.rules
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Result<&Player, GameError> {
        self.players
            .get(id as usize)
            .ok_or(GameError::UnknownPlayer(id))
    }

    fn player_mut(&mut self, id: PlayerId) -> Result<&mut Player, GameError> {
        self.players
            .get_mut(id as usize)
            .ok_or(GameError::UnknownPlayer(id))
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    pub fn resources(&self, id: PlayerId) -> Result<&ResourceHand, GameError> {
        self.ledger.hand(id)
    }

    pub fn structures(&self) -> &Structures {
        &self.structures
    }

    pub fn trades(&self) -> &TradeNegotiator {
        &self.trades
    }

    pub fn robber(&self) -> Option<TileId> {
        self.robber
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Turn number, starting at 1 once the game starts
    pub fn turn(&self) -> u32 {
        self.turn
    }

    /// The player whose turn it is, once the game has started
    pub fn current_player(&self) -> Option<PlayerId> {
        match self.phase {
            GamePhase::WaitingForPlayers => None,
            _ => Some(self.current as PlayerId),
        }
    }

    /// True when nobody is left in the session
    pub fn is_abandoned(&self) -> bool {
        self.players.iter().all(|p| !p.active)
    }

    fn name_of(&self, id: PlayerId) -> String {
        self.players
            .get(id as usize)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("player {id}"))
    }

    // ==================== Lobby ====================

    /// Seat a new player.
    ///
    /// A seat vacated in the lobby is handed to the next joiner, so only
    /// active players count toward the limit.
    pub fn add_player(&mut self, name: impl Into<String>) -> Result<(PlayerId, Outcome), GameError> {
        if self.phase != GamePhase::WaitingForPlayers {
            return Err(GameError::InvalidPhase);
        }

        let name = name.into();
        let id = match self.players.iter().position(|p| !p.active) {
            Some(vacant) => {
                let id = vacant as PlayerId;
                self.players[vacant] = Player::new(id, name.clone());
                id
            }
            None if self.players.len() >= self.rules.max_players => {
                return Err(GameError::SessionFull);
            }
            None => {
                let id = self.ledger.open_account();
                self.players.push(Player::new(id, name.clone()));
                id
            }
        };

        let mut outcome = Outcome::new();
        outcome.push(GameEvent::PlayerJoined {
            player: id,
            name: name.clone(),
        });
        outcome.narrate(format!("{name} joined"));
        Ok((id, outcome))
    }

    /// Toggle a player's ready flag. Starts the game once everyone seated is ready.
    pub fn set_ready(&mut self, id: PlayerId, ready: bool) -> Result<Outcome, GameError> {
        if self.phase != GamePhase::WaitingForPlayers {
            return Err(GameError::InvalidPhase);
        }
        self.player_mut(id)?.ready = ready;

        let mut outcome = Outcome::new();
        outcome.push(GameEvent::PlayerReady { player: id, ready });
        if ready && self.can_start() {
            let started = self.start()?;
            outcome.extend(started.public);
        }
        Ok(outcome)
    }

    fn seated(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.active)
    }

    fn can_start(&self) -> bool {
        self.seated().count() >= self.rules.min_players && self.seated().all(|p| p.ready)
    }

    /// Leave the lobby and begin the first turn
    pub fn start(&mut self) -> Result<Outcome, GameError> {
        if self.phase != GamePhase::WaitingForPlayers {
            return Err(GameError::InvalidPhase);
        }
        if self.seated().count() < self.rules.min_players {
            return Err(GameError::NotEnoughPlayers);
        }
        if !self.seated().all(|p| p.ready) {
            return Err(GameError::PlayersNotReady);
        }

        self.current = self
            .players
            .iter()
            .position(|p| p.active)
            .ok_or(GameError::NotEnoughPlayers)?;
        self.turn = 1;
        self.phase = GamePhase::Rolling;

        let first = self.current as PlayerId;
        let mut outcome = Outcome::new();
        outcome.push(GameEvent::BoardSnapshot {
            board: self.board.clone(),
            robber: self.robber,
        });
        outcome.push(GameEvent::TurnChanged {
            player: first,
            turn: self.turn,
        });
        outcome.push(GameEvent::PhaseChanged { phase: self.phase });
        outcome.narrate(format!("Game started. {} goes first", self.name_of(first)));
        Ok(outcome)
    }

    /// Mark a player as connected or gone.
    ///
    /// Offers made by or to an inactive player are withdrawn. If it was their
    /// turn, play passes to the next active player.
    pub fn set_active(&mut self, id: PlayerId, active: bool) -> Result<Outcome, GameError> {
        let player = self.player_mut(id)?;
        if player.active == active {
            return Ok(Outcome::new());
        }
        player.active = active;
        if !active {
            player.ready = false;
        }

        let mut outcome = Outcome::new();
        outcome.push(GameEvent::PlayerActivity { player: id, active });
        let verb = if active { "reconnected" } else { "left" };
        outcome.narrate(format!("{} {verb}", self.name_of(id)));

        if !active {
            for offer in self.trades.retire_involving(id) {
                outcome.push(GameEvent::TradeResolved {
                    offer,
                    resolution: TradeResolution::Cancelled,
                });
            }
            let in_game = self.phase != GamePhase::WaitingForPlayers;
            if in_game && self.current == id as usize && !self.is_abandoned() {
                outcome.extend(self.advance_turn().public);
            }
        }
        Ok(outcome)
    }

    // ==================== Intents ====================

    /// Apply one intent from a player.
    ///
    /// Only the active player may act, except that the target of a trade
    /// offer may answer it. While the robber is pending every other intent
    /// is rejected with [`GameError::InvalidPhase`], whoever sends it.
    /// On error nothing has changed.
    pub fn apply(&mut self, player: PlayerId, intent: Intent) -> Result<Outcome, GameError> {
        self.player(player)?;
        if self.phase == GamePhase::WaitingForPlayers {
            return Err(GameError::InvalidPhase);
        }

        // Nothing but the robber moves while it is pending
        let robber_pending = matches!(self.phase, GamePhase::RobberPending { .. });
        if robber_pending && !matches!(intent, Intent::MoveRobber { .. }) {
            return Err(GameError::InvalidPhase);
        }

        if let Intent::RespondTrade { offer, accept } = intent {
            return self.respond_trade(player, offer, accept);
        }
        if self.current_player() != Some(player) {
            return Err(GameError::OutOfTurn);
        }

        match intent {
            Intent::RollDice => {
                if self.phase != GamePhase::Rolling {
                    return Err(GameError::InvalidPhase);
                }
                let dice = (self.rng.gen_range(1..=6), self.rng.gen_range(1..=6));
                self.resolve_roll(player, dice)
            }
            Intent::BuildRoad(edge) => self.build_road(player, edge),
            Intent::BuildSettlement(vertex) => self.build_settlement(player, vertex),
            Intent::BuildCity(vertex) => self.build_city(player, vertex),
            Intent::BuyDevCard => self.buy_dev_card(player),
            Intent::UseDevCard(index) => self.use_dev_card(player, index),
            Intent::ProposeTrade { give, receive, to } => self.propose_trade(player, give, receive, to),
            Intent::RespondTrade { offer, accept } => self.respond_trade(player, offer, accept),
            Intent::CancelTrade(offer) => self.cancel_trade(player, offer),
            Intent::MoveRobber { tile, steal_from } => self.move_robber(player, tile, steal_from),
            Intent::EndTurn => self.end_turn(player),
        }
    }

    fn ensure_turn(&self, player: PlayerId) -> Result<(), GameError> {
        if self.current_player() != Some(player) {
            return Err(GameError::OutOfTurn);
        }
        Ok(())
    }

    fn ensure_acting(&self) -> Result<(), GameError> {
        if self.phase != GamePhase::Acting {
            return Err(GameError::InvalidPhase);
        }
        Ok(())
    }

    fn set_phase(&mut self, phase: GamePhase, outcome: &mut Outcome) {
        self.phase = phase;
        outcome.push(GameEvent::PhaseChanged { phase });
    }

    /// Resolve a roll with given dice. `RollDice` calls this with random dice.
    pub fn resolve_roll(&mut self, player: PlayerId, dice: (u8, u8)) -> Result<Outcome, GameError> {
        self.ensure_turn(player)?;
        if self.phase != GamePhase::Rolling {
            return Err(GameError::InvalidPhase);
        }
        if !(1..=6).contains(&dice.0) || !(1..=6).contains(&dice.1) {
            return Err(GameError::InvalidRoll(dice.0, dice.1));
        }

        let total = dice.0 + dice.1;
        let mut outcome = Outcome::new();
        outcome.push(GameEvent::DiceRolled {
            player,
            dice,
            total,
        });
        outcome.narrate(format!("{} rolled {total}", self.name_of(player)));

        if total == 7 {
            self.set_phase(
                GamePhase::RobberPending {
                    resume: ResumePhase::Acting,
                },
                &mut outcome,
            );
            outcome.narrate("The robber must move");
            return Ok(outcome);
        }

        let deltas = ledger::production(&self.board, &self.structures, total, self.robber);
        self.ledger.apply_production(&deltas)?;
        if !deltas.is_empty() {
            outcome.push(GameEvent::ResourcesChanged { deltas });
        }
        self.set_phase(GamePhase::Acting, &mut outcome);
        Ok(outcome)
    }

    fn pay(&mut self, player: PlayerId, cost: &ResourceHand, outcome: &mut Outcome) -> Result<(), GameError> {
        self.ledger.spend(player, cost)?;
        outcome.push(GameEvent::ResourcesChanged {
            deltas: ResourceDelta::from_hand(player, cost, -1),
        });
        Ok(())
    }

    fn build_road(&mut self, player: PlayerId, edge: EdgeCoord) -> Result<Outcome, GameError> {
        let free_roads = match self.phase {
            GamePhase::Acting => None,
            GamePhase::RoadBuilding { remaining } => Some(remaining),
            _ => return Err(GameError::InvalidPhase),
        };
        let p = self.player(player)?;
        if p.pieces.roads == 0 {
            return Err(GameError::NoPiecesRemaining("road".into()));
        }
        let founding = p.roads_built < self.rules.placement.founding_placements;
        let paid = free_roads.is_none() && !founding;

        self.structures
            .validate_road(&self.board, player, &edge, &self.rules.placement)?;
        if paid {
            self.ledger.ensure_affordable(player, &costs::road())?;
        }

        let mut outcome = Outcome::new();
        if paid {
            self.pay(player, &costs::road(), &mut outcome)?;
        }
        let structure = self
            .structures
            .place_road(&self.board, player, edge, &self.rules.placement)?;
        let p = self.player_mut(player)?;
        p.pieces.roads -= 1;
        p.roads_built += 1;

        outcome.push(GameEvent::StructureAdded { structure });
        outcome.narrate(format!("{} built a road", self.name_of(player)));
        outcome.extend(self.refresh_longest_roads());

        if let Some(remaining) = free_roads {
            let remaining = remaining.saturating_sub(1).min(self.player(player)?.pieces.roads);
            let next = if remaining == 0 {
                GamePhase::Acting
            } else {
                GamePhase::RoadBuilding { remaining }
            };
            self.set_phase(next, &mut outcome);
        }
        Ok(outcome)
    }

    fn build_settlement(&mut self, player: PlayerId, vertex: VertexCoord) -> Result<Outcome, GameError> {
        self.ensure_acting()?;
        let p = self.player(player)?;
        if p.pieces.settlements == 0 {
            return Err(GameError::NoPiecesRemaining("settlement".into()));
        }
        let founding = p.settlements_built < self.rules.placement.founding_placements;

        self.structures.validate_settlement(
            &self.board,
            player,
            &vertex,
            &self.rules.placement,
            founding,
        )?;
        if !founding {
            self.ledger.ensure_affordable(player, &costs::settlement())?;
        }

        let mut outcome = Outcome::new();
        if !founding {
            self.pay(player, &costs::settlement(), &mut outcome)?;
        }
        let structure = self.structures.place_settlement(
            &self.board,
            player,
            vertex,
            &self.rules.placement,
            founding,
        )?;
        let p = self.player_mut(player)?;
        p.pieces.settlements -= 1;
        p.settlements_built += 1;
        p.points += 1;
        let points = p.points;

        outcome.push(GameEvent::StructureAdded { structure });
        outcome.push(GameEvent::PointsChanged { player, points });
        outcome.narrate(format!("{} built a settlement", self.name_of(player)));
        // A new settlement can cut an opponent's road
        outcome.extend(self.refresh_longest_roads());
        Ok(outcome)
    }

    fn build_city(&mut self, player: PlayerId, vertex: VertexCoord) -> Result<Outcome, GameError> {
        self.ensure_acting()?;
        if self.player(player)?.pieces.cities == 0 {
            return Err(GameError::NoPiecesRemaining("city".into()));
        }
        self.structures.validate_city(player, &vertex)?;
        self.ledger.ensure_affordable(player, &costs::city())?;

        let mut outcome = Outcome::new();
        self.pay(player, &costs::city(), &mut outcome)?;
        let structure = self.structures.upgrade_to_city(player, vertex)?;
        let p = self.player_mut(player)?;
        p.pieces.cities -= 1;
        p.pieces.settlements += 1;
        p.points += 1;
        let points = p.points;

        outcome.push(GameEvent::StructureAdded { structure });
        outcome.push(GameEvent::PointsChanged { player, points });
        outcome.narrate(format!("{} upgraded to a city", self.name_of(player)));
        Ok(outcome)
    }

    fn refresh_longest_roads(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();
        for i in 0..self.players.len() {
            let id = i as PlayerId;
            let length = self.structures.longest_road(id);
            if self.players[i].longest_road != length {
                self.players[i].longest_road = length;
                events.push(GameEvent::LongestRoadChanged { player: id, length });
            }
        }
        events
    }

    fn buy_dev_card(&mut self, player: PlayerId) -> Result<Outcome, GameError> {
        self.ensure_acting()?;
        self.ledger.ensure_affordable(player, &costs::development_card())?;

        let mut outcome = Outcome::new();
        self.pay(player, &costs::development_card(), &mut outcome)?;
        let kind = dev_cards::draw(&mut self.rng);
        let turn = self.turn;
        let p = self.player_mut(player)?;
        p.dev_cards.push(DevCard::new(kind, turn));
        let hand_size = p.hand_size();

        outcome.push(GameEvent::DevCardBought { player, hand_size });
        outcome.whisper(
            player,
            GameEvent::DevCardDrawn {
                index: hand_size - 1,
                kind,
            },
        );
        outcome.narrate(format!("{} bought a development card", self.name_of(player)));
        Ok(outcome)
    }

    fn use_dev_card(&mut self, player: PlayerId, index: usize) -> Result<Outcome, GameError> {
        let kind = dev_cards::check_usable(self.player(player)?, index, self.turn)?;
        let resume = match (kind.effect(), self.phase) {
            (_, GamePhase::Acting) => ResumePhase::Acting,
            (Effect::RobberPlacement, GamePhase::Rolling) => ResumePhase::Rolling,
            _ => return Err(GameError::InvalidPhase),
        };

        let turn = self.turn;
        let p = self.player_mut(player)?;
        let effect = dev_cards::use_card(p, index, turn)?;
        let roads_left = p.pieces.roads;

        let mut outcome = Outcome::new();
        outcome.push(GameEvent::DevCardUsed {
            player,
            index,
            kind,
            effect,
        });
        let name = self.name_of(player);
        match effect {
            Effect::GrantPoint => {
                let p = self.player_mut(player)?;
                p.points += 1;
                let points = p.points;
                outcome.push(GameEvent::PointsChanged { player, points });
                outcome.narrate(format!("{name} revealed a point card"));
            }
            Effect::FreeRoads(count) => {
                outcome.narrate(format!("{name} played road building"));
                let remaining = count.min(roads_left);
                if remaining > 0 {
                    self.set_phase(GamePhase::RoadBuilding { remaining }, &mut outcome);
                }
            }
            Effect::RobberPlacement => {
                outcome.narrate(format!("{name} played a robber card"));
                self.set_phase(GamePhase::RobberPending { resume }, &mut outcome);
            }
        }
        Ok(outcome)
    }

    fn move_robber(
        &mut self,
        player: PlayerId,
        tile: TileId,
        steal_from: Option<PlayerId>,
    ) -> Result<Outcome, GameError> {
        let GamePhase::RobberPending { resume } = self.phase else {
            return Err(GameError::InvalidPhase);
        };
        let target = self
            .board
            .tile(tile)
            .ok_or_else(|| GameError::InvalidPosition(format!("no tile {tile}")))?;
        if self.robber == Some(tile) {
            return Err(GameError::InvalidPosition("the robber must move to a new tile".into()));
        }
        if let Some(victim) = steal_from {
            self.player(victim)?;
            if victim == player {
                return Err(GameError::InvalidTarget("cannot steal from yourself".into()));
            }
            if !self.structures.owners_around(&target.coord).contains(&victim) {
                return Err(GameError::InvalidTarget(format!(
                    "{} has no building on that tile",
                    self.name_of(victim)
                )));
            }
            if self.ledger.hand(victim)?.is_empty() {
                return Err(GameError::InvalidTarget(format!(
                    "{} has nothing to steal",
                    self.name_of(victim)
                )));
            }
        }

        let from = self.robber.replace(tile);
        let mut outcome = Outcome::new();
        outcome.push(GameEvent::RobberMoved {
            player,
            from,
            to: tile,
        });
        outcome.narrate(format!("{} moved the robber", self.name_of(player)));

        if let Some(victim) = steal_from {
            let stolen = self.ledger.steal_random(player, victim, &mut self.rng)?;
            outcome.push(GameEvent::ResourceStolen {
                thief: player,
                victim,
                resource: None,
            });
            if stolen.is_some() {
                outcome.push(GameEvent::HandSizeChanged {
                    player: victim,
                    change: -1,
                });
                outcome.push(GameEvent::HandSizeChanged { player, change: 1 });
            }
            let seen = GameEvent::ResourceStolen {
                thief: player,
                victim,
                resource: stolen,
            };
            outcome.whisper(player, seen.clone());
            outcome.whisper(victim, seen);
            outcome.narrate(format!(
                "{} stole from {}",
                self.name_of(player),
                self.name_of(victim)
            ));
        }

        self.set_phase(resume.into(), &mut outcome);
        Ok(outcome)
    }

    fn propose_trade(
        &mut self,
        player: PlayerId,
        give: ResourceHand,
        receive: ResourceHand,
        to: TradeTarget,
    ) -> Result<Outcome, GameError> {
        self.ensure_acting()?;
        let mut outcome = Outcome::new();
        match to {
            TradeTarget::Bank => {
                let rates = BankRates::from_ports(&self.structures.ports_of(&self.board, player));
                let offer = self
                    .trades
                    .settle_with_bank(&mut self.ledger, &rates, player, give, receive)?;
                let mut deltas = ResourceDelta::from_hand(player, &offer.give, -1);
                deltas.extend(ResourceDelta::from_hand(player, &offer.receive, 1));
                outcome.push(GameEvent::ResourcesChanged { deltas });
                outcome.push(GameEvent::TradeResolved {
                    offer,
                    resolution: TradeResolution::Accepted,
                });
                outcome.narrate(format!("{} traded with the bank", self.name_of(player)));
            }
            TradeTarget::Player(other) => {
                if !self.player(other)?.active {
                    return Err(GameError::InvalidTarget(format!(
                        "{} is not connected",
                        self.name_of(other)
                    )));
                }
                let offer = self.trades.propose(&self.ledger, player, give, receive, other)?;
                outcome.push(GameEvent::TradeProposed { offer });
                outcome.narrate(format!(
                    "{} offered a trade to {}",
                    self.name_of(player),
                    self.name_of(other)
                ));
            }
        }
        Ok(outcome)
    }

    fn respond_trade(&mut self, player: PlayerId, id: OfferId, accept: bool) -> Result<Outcome, GameError> {
        self.ensure_acting()?;
        let (offer, resolution) = self.trades.respond(&mut self.ledger, id, player, accept)?;

        let mut outcome = Outcome::new();
        if resolution == TradeResolution::Accepted {
            let mut deltas = ResourceDelta::from_hand(offer.from, &offer.give, -1);
            deltas.extend(ResourceDelta::from_hand(offer.from, &offer.receive, 1));
            deltas.extend(ResourceDelta::from_hand(player, &offer.receive, -1));
            deltas.extend(ResourceDelta::from_hand(player, &offer.give, 1));
            outcome.push(GameEvent::ResourcesChanged { deltas });
        }
        let verb = if accept { "accepted" } else { "rejected" };
        let line = format!("{} {verb} a trade from {}", self.name_of(player), self.name_of(offer.from));
        outcome.push(GameEvent::TradeResolved { offer, resolution });
        outcome.narrate(line);
        Ok(outcome)
    }

    fn cancel_trade(&mut self, player: PlayerId, id: OfferId) -> Result<Outcome, GameError> {
        let offer = self.trades.cancel(id, player)?;
        let mut outcome = Outcome::new();
        outcome.push(GameEvent::TradeResolved {
            offer,
            resolution: TradeResolution::Cancelled,
        });
        outcome.narrate(format!("{} withdrew a trade offer", self.name_of(player)));
        Ok(outcome)
    }

    fn end_turn(&mut self, player: PlayerId) -> Result<Outcome, GameError> {
        if !matches!(self.phase, GamePhase::Acting | GamePhase::RoadBuilding { .. }) {
            return Err(GameError::InvalidPhase);
        }
        let mut outcome = Outcome::new();
        outcome.narrate(format!("{} ended their turn", self.name_of(player)));
        let advanced = self.advance_turn();
        outcome.extend(advanced.public);
        Ok(outcome)
    }

    /// Retire open offers and pass play to the next active player
    fn advance_turn(&mut self) -> Outcome {
        let mut outcome = Outcome::new();
        for offer in self.trades.retire_all() {
            outcome.push(GameEvent::TradeResolved {
                offer,
                resolution: TradeResolution::Cancelled,
            });
        }
        self.set_phase(GamePhase::EndedTurn, &mut outcome);

        let count = self.players.len();
        if let Some(next) = (1..=count)
            .map(|step| (self.current + step) % count)
            .find(|&i| self.players[i].active)
        {
            self.current = next;
        }
        self.turn += 1;

        let player = self.current as PlayerId;
        outcome.push(GameEvent::TurnChanged {
            player,
            turn: self.turn,
        });
        self.set_phase(GamePhase::Rolling, &mut outcome);
        outcome.narrate(format!("It is {}'s turn", self.name_of(player)));
        outcome
    }

    // ==================== Views ====================

    /// Snapshot as seen by `viewer`. Other players' card contents are hidden;
    /// `None` hides every hand.
    pub fn snapshot(&self, viewer: Option<PlayerId>) -> SessionSnapshot {
        let players = self
            .players
            .iter()
            .map(|p| PlayerView {
                player: if viewer == Some(p.id) {
                    p.clone()
                } else {
                    p.redacted()
                },
                resources: self.ledger.hand(p.id).copied().unwrap_or_default(),
                hand_size: p.hand_size(),
            })
            .collect();

        SessionSnapshot {
            code: self.code.clone(),
            created_at: self.created_at,
            phase: self.phase,
            turn: self.turn,
            current_player: self.current_player(),
            board: self.board.clone(),
            robber: self.robber,
            players,
            structures: self.structures.clone(),
            open_offers: self.trades.open_offers().cloned().collect(),
        }
    }

    /// Give a player resources directly, outside any intent
    #[doc(hidden)]
    pub fn grant(&mut self, player: PlayerId, hand: &ResourceHand) -> Result<(), GameError> {
        self.ledger.credit(player, hand)
    }
}

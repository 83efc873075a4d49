use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cards::{card, CardId, Color, Effect, Rank};
use crate::deck::Shuffler;
use crate::errors::GameError;
use crate::registry::{PlayerId, PlayerRegistry, PlayerRoundState};

/// Lifecycle of one game. `Created` accepts players; `start()` freezes the
/// roster into a shuffled turn order; a terminal `start_round()` moves to
/// `Finished`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GamePhase {
    Created,
    Started,
    Finished,
}

/// A turn as submitted by the dispatch layer. Legality of the move (color
/// and rank matching, effect responses) is not checked here; a validation
/// component in front of the engine would own that.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedTurn {
    /// Cards the player drew from the draw pile.
    pub cards_taken: Vec<CardId>,
    /// Cards the player laid on the discard pile.
    pub cards_given: Vec<CardId>,
    /// Color announced by the player (jack play), if any.
    pub new_color: Option<Color>,
    /// Effect stack as it stands after this play.
    pub new_effects: Vec<Effect>,
}

/// Full state broadcast at every round start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    /// Face-down draw pile, front first.
    pub stack: Vec<CardId>,
    /// Face-up discard pile, top last.
    pub deck: Vec<CardId>,
    pub color: Color,
    pub rank: Rank,
    pub current_player: PlayerId,
    pub player_order: Vec<PlayerId>,
    pub effects: Vec<Effect>,
    /// 1-based display round number.
    pub round_number: u32,
    pub card_assignment: HashMap<PlayerId, Vec<CardId>>,
}

/// Incremental state broadcast after every committed turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnDiff {
    pub stack_removed: Vec<CardId>,
    pub deck_added: Vec<CardId>,
    pub effects: Vec<Effect>,
    pub color: Color,
    pub current_player: PlayerId,
    pub last_player: PlayerId,
    /// Discard-pile cards moved back into the draw pile this turn.
    pub reshuffled: Vec<CardId>,
}

/// Broadcast after a player departure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveDiff {
    pub id: PlayerId,
    /// The departing player's hand, appended to the draw pile. Absent when
    /// the game had not started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_added: Option<Vec<CardId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_player: Option<PlayerId>,
}

/// Final scoring, exposed once after the terminal round signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameReport {
    pub elapsed_ms: i64,
    pub round_count: u32,
    /// Aggregate points per player; the winner is whoever the caller deems
    /// highest, no winner field is computed here.
    pub scores: HashMap<PlayerId, u32>,
}

/// Server-authoritative core of one game: owns the deck piles, the effect
/// stack, the frozen turn order and the per-round score ledger, and applies
/// the turn/round/game state machine.
///
/// All operations are synchronous and must be serialized per game by the
/// caller; see the session layer for the per-game exclusion zone.
#[derive(Debug)]
pub struct RoundEngine {
    registry: PlayerRegistry,
    shuffler: Shuffler,
    seed: Option<u64>,

    /// Face-down pile, drawn from the front.
    draw_pile: Vec<CardId>,
    /// Face-up pile, most recent play last.
    discard_pile: Vec<CardId>,
    current_color: Option<Color>,
    current_rank: Option<Rank>,
    /// Pending effects, resolution order front to back; newest entry last.
    effect_stack: Vec<Effect>,

    /// Player ids in play order, frozen at `start()`, shrunk only by
    /// departures.
    turn_order: Vec<PlayerId>,
    current_index: usize,

    /// One finish-order entry per round, winner first, loser last.
    score_ledger: Vec<Vec<PlayerId>>,

    phase: GamePhase,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl RoundEngine {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            registry: PlayerRegistry::new(),
            shuffler: Shuffler::new(seed),
            seed,
            draw_pile: Vec::new(),
            discard_pile: Vec::new(),
            current_color: None,
            current_rank: None,
            effect_stack: Vec::new(),
            turn_order: Vec::new(),
            current_index: 0,
            score_ledger: Vec::new(),
            phase: GamePhase::Created,
            started_at: None,
            ended_at: None,
        }
    }

    /// Registers a player. Only possible before `start()`.
    pub fn add_player(&mut self, player: PlayerRoundState) -> Result<(), GameError> {
        if self.phase != GamePhase::Created {
            return Err(GameError::AlreadyStarted);
        }
        self.registry.add(player)
    }

    /// Freezes the roster into a randomized turn order and stamps the start
    /// time. No further `add_player` afterwards.
    pub fn start(&mut self) -> Result<(), GameError> {
        if self.phase != GamePhase::Created {
            return Err(GameError::AlreadyStarted);
        }
        self.turn_order = self.registry.ids();
        self.shuffler.shuffle(&mut self.turn_order);
        self.started_at = Some(Utc::now());
        self.phase = GamePhase::Started;
        Ok(())
    }

    /// Deals a new round, or returns `None` once at most one player is left
    /// in the game. The terminal signal stamps the end time; the caller must
    /// not call `start_round` again afterwards.
    pub fn start_round(&mut self) -> Result<Option<RoundSnapshot>, GameError> {
        match self.phase {
            GamePhase::Created => return Err(GameError::NotStarted),
            GamePhase::Finished => return Err(GameError::GameFinished),
            GamePhase::Started => {}
        }

        if self.registry.active_in_game().len() <= 1 {
            self.ended_at = Some(Utc::now());
            self.phase = GamePhase::Finished;
            return Ok(None);
        }

        self.score_ledger.push(Vec::new());
        self.current_index = 0;
        for player in self.registry.iter_mut() {
            player.cards.clear();
        }
        self.registry.recompute_active();

        self.draw_pile = self.shuffler.shuffled_deck();
        self.discard_pile.clear();
        for id in self.turn_order.clone() {
            let count = self
                .registry
                .get(&id)
                .map(|p| p.start_card_count as usize)
                .unwrap_or(0);
            let count = count.min(self.draw_pile.len());
            let hand: Vec<CardId> = self.draw_pile.drain(..count).collect();
            if let Some(player) = self.registry.get_mut(&id) {
                player.cards = hand;
            }
        }
        self.registry.recompute_active();

        let top = self.draw_pile.remove(0);
        self.discard_pile.push(top);
        let flipped = card(top);
        self.current_color = Some(flipped.color);
        self.current_rank = Some(flipped.rank);
        self.effect_stack.clear();

        // An eliminated player can sit at order position 0 with an empty
        // deal; the pointer must start on a round-active player.
        self.current_index = self.first_active_from(self.current_index)?;

        let snapshot = RoundSnapshot {
            stack: self.draw_pile.clone(),
            deck: self.discard_pile.clone(),
            color: flipped.color,
            rank: flipped.rank,
            current_player: self.turn_order[self.current_index].clone(),
            player_order: self.turn_order.clone(),
            effects: self.effect_stack.clone(),
            round_number: self.score_ledger.len() as u32,
            card_assignment: self
                .registry
                .iter()
                .map(|p| (p.id.clone(), p.cards.clone()))
                .collect(),
        };
        self.debug_assert_conservation();
        Ok(Some(snapshot))
    }

    /// Applies one turn. Returns `None` when the turn ended the round: the
    /// loser is recorded and penalized and the caller is expected to invoke
    /// [`RoundEngine::start_round`] next.
    pub fn commit_turn(&mut self, turn: CommittedTurn) -> Result<Option<TurnDiff>, GameError> {
        match self.phase {
            GamePhase::Created => return Err(GameError::NotStarted),
            GamePhase::Finished => return Err(GameError::GameFinished),
            GamePhase::Started => {}
        }
        if self.score_ledger.is_empty() {
            return Err(GameError::NoRoundInProgress);
        }

        let player_id = self
            .turn_order
            .get(self.current_index)
            .cloned()
            .ok_or(GameError::TurnOrderCorrupted)?;

        self.draw_pile.retain(|id| !turn.cards_taken.contains(id));
        self.discard_pile.extend(turn.cards_given.iter().copied());

        {
            let player = self
                .registry
                .get_mut(&player_id)
                .ok_or(GameError::TurnOrderCorrupted)?;
            player.cards.retain(|id| !turn.cards_given.contains(id));
            player.cards.extend(turn.cards_taken.iter().copied());
        }
        self.registry.recompute_active();

        if self
            .registry
            .get(&player_id)
            .is_some_and(|p| p.cards.is_empty())
        {
            self.current_ledger_entry().push(player_id.clone());
        }

        if self.registry.active_in_round().len() <= 1 {
            self.finish_looser();
            self.debug_assert_conservation();
            return Ok(None);
        }

        self.effect_stack = turn.new_effects;
        if let Some(color) = turn.new_color {
            self.current_color = Some(color);
        }

        // An ace chain cannot skip more players than are left in the round.
        while self.pending_effect() == Some(Effect::Ace)
            && self.effect_stack.len() >= self.registry.active_in_round().len()
        {
            self.effect_stack.pop();
        }

        let mut reshuffled = Vec::new();
        if self.draw_pile.len() < self.min_stack_count() {
            // Not even a reshuffle can cover the pending penalty: shed
            // effects until it can, rather than deadlock the round.
            while self.draw_pile.len() + self.discard_pile.len() + 1 < self.min_stack_count()
                && !self.effect_stack.is_empty()
            {
                self.effect_stack.pop();
            }
            reshuffled = self.reshuffle();
        }

        let last_player = player_id;
        let current_player = self.shift_player()?;

        let diff = TurnDiff {
            stack_removed: turn.cards_taken,
            deck_added: turn.cards_given,
            effects: self.effect_stack.clone(),
            color: self.current_color.ok_or(GameError::NoRoundInProgress)?,
            current_player,
            last_player,
            reshuffled,
        };
        self.debug_assert_conservation();
        Ok(Some(diff))
    }

    /// Removes a player at any point in the lifecycle. Returns `None` for an
    /// unknown id. After the game has started the departing hand goes to the
    /// back of the draw pile and the id is stripped from every ledger entry.
    ///
    /// Round/game finish conditions are deliberately not evaluated here; the
    /// caller re-checks them via [`RoundEngine::round_should_finish`] and
    /// [`RoundEngine::game_should_finish`].
    pub fn remove_player(&mut self, id: &str) -> Option<RemoveDiff> {
        self.registry.get(id)?;

        if self.phase == GamePhase::Created {
            self.registry.remove(id);
            return Some(RemoveDiff {
                id: id.to_string(),
                stack_added: None,
                current_player: None,
            });
        }

        for entry in &mut self.score_ledger {
            entry.retain(|p| p != id);
        }

        let hand = self
            .registry
            .get(id)
            .map(|p| p.cards.clone())
            .unwrap_or_default();
        self.draw_pile.extend(hand.iter().copied());
        self.registry.remove(id);

        // The departure shrinks the round; a pending ace chain must stay
        // below the holder count.
        while self.pending_effect() == Some(Effect::Ace)
            && self.effect_stack.len() >= self.registry.active_in_round().len()
        {
            self.effect_stack.pop();
        }

        if let Some(pos) = self.turn_order.iter().position(|p| p == id) {
            self.turn_order.remove(pos);
            if pos < self.current_index {
                self.current_index -= 1;
            } else if self.current_index >= self.turn_order.len() {
                self.current_index = 0;
            }
        }
        // The pointer may now rest on a finished player; settle it on a
        // round-active one while any remains.
        if !self.turn_order.is_empty() {
            if let Ok(idx) = self.first_active_from(self.current_index) {
                self.current_index = idx;
            }
        }

        let current_player = self
            .turn_order
            .get(self.current_index)
            .cloned()
            .filter(|_| self.phase == GamePhase::Started);

        self.debug_assert_conservation();
        Some(RemoveDiff {
            id: id.to_string(),
            stack_added: Some(hand),
            current_player,
        })
    }

    /// Records the loser of a round orphaned by a departure. Only legal once
    /// `round_should_finish()` holds; the regular path through
    /// [`RoundEngine::commit_turn`] finishes rounds on its own.
    pub fn finish_round(&mut self) -> Result<(), GameError> {
        if self.phase != GamePhase::Started {
            return Err(GameError::NotStarted);
        }
        if self.score_ledger.is_empty() {
            return Err(GameError::NoRoundInProgress);
        }
        if !self.round_should_finish() {
            return Err(GameError::RoundNotFinished);
        }
        self.finish_looser();
        Ok(())
    }

    /// Final report: per-round points `len - position - 1` summed per
    /// player, elapsed wall time, round count.
    pub fn report(&self) -> Result<GameReport, GameError> {
        if self.phase != GamePhase::Finished {
            return Err(GameError::NotFinished);
        }
        let (started, ended) = match (self.started_at, self.ended_at) {
            (Some(s), Some(e)) => (s, e),
            _ => return Err(GameError::NotStarted),
        };

        let mut scores: HashMap<PlayerId, u32> = HashMap::new();
        for player in self.registry.iter() {
            scores.entry(player.id.clone()).or_insert(0);
        }
        for entry in &self.score_ledger {
            for (pos, id) in entry.iter().enumerate() {
                *scores.entry(id.clone()).or_insert(0) += (entry.len() - pos - 1) as u32;
            }
        }

        Ok(GameReport {
            elapsed_ms: (ended - started).num_milliseconds(),
            round_count: self.score_ledger.len() as u32,
            scores,
        })
    }

    // --- read surface ---

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn draw_pile(&self) -> &[CardId] {
        &self.draw_pile
    }

    pub fn discard_pile(&self) -> &[CardId] {
        &self.discard_pile
    }

    pub fn current_color(&self) -> Option<Color> {
        self.current_color
    }

    pub fn current_rank(&self) -> Option<Rank> {
        self.current_rank
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effect_stack
    }

    /// The next effect to resolve, front of the stack.
    pub fn pending_effect(&self) -> Option<Effect> {
        self.effect_stack.first().copied()
    }

    pub fn turn_order(&self) -> &[PlayerId] {
        &self.turn_order
    }

    pub fn current_player_id(&self) -> Option<&PlayerId> {
        if self.phase != GamePhase::Started || self.score_ledger.is_empty() {
            return None;
        }
        self.turn_order.get(self.current_index)
    }

    /// 0-based round counter; `None` before the first deal.
    pub fn round_number(&self) -> Option<usize> {
        self.score_ledger.len().checked_sub(1)
    }

    pub fn score_ledger(&self) -> &[Vec<PlayerId>] {
        &self.score_ledger
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// True when at most one player still holds cards in the current round.
    pub fn round_should_finish(&self) -> bool {
        self.phase == GamePhase::Started
            && !self.score_ledger.is_empty()
            && self.registry.active_in_round().len() <= 1
    }

    /// True when at most one player still has a non-zero deal size.
    pub fn game_should_finish(&self) -> bool {
        self.registry.active_in_game().len() <= 1
    }

    /// Draw-pile size needed to safely resolve the pending effect: each
    /// stacked seven forces a three-card draw plus the follow-up draw,
    /// anything else needs a plain three.
    pub fn min_stack_count(&self) -> usize {
        match self.pending_effect() {
            Some(Effect::Seven) => {
                let sevens = self
                    .effect_stack
                    .iter()
                    .filter(|e| **e == Effect::Seven)
                    .count();
                3 * sevens + 1
            }
            _ => 3,
        }
    }

    // --- internals ---

    fn current_ledger_entry(&mut self) -> &mut Vec<PlayerId> {
        self.score_ledger
            .last_mut()
            .expect("round in progress checked by caller")
    }

    /// Appends the lone remaining holder to the ledger and docks their deal
    /// size. No-op when the round has no single holder left (possible after
    /// departures).
    fn finish_looser(&mut self) {
        let Some(looser_id) = self.registry.looser().map(|p| p.id.clone()) else {
            return;
        };
        self.current_ledger_entry().push(looser_id.clone());
        if let Some(player) = self.registry.get_mut(&looser_id) {
            player.start_card_count = player.start_card_count.saturating_sub(1);
        }
        self.registry.recompute_active();
    }

    /// Keeps the top discard in place and shuffles the rest back under the
    /// draw pile. Returns the moved cards for the turn diff.
    fn reshuffle(&mut self) -> Vec<CardId> {
        let Some(top) = self.discard_pile.pop() else {
            return Vec::new();
        };
        let mut rest = std::mem::take(&mut self.discard_pile);
        self.discard_pile.push(top);
        self.shuffler.shuffle(&mut rest);
        self.draw_pile.extend(rest.iter().copied());
        rest
    }

    /// Advances the turn pointer circularly, skipping players no longer in
    /// the round. Bounded at one full lap; running out means zero active
    /// players, which the round-end guard makes unreachable.
    fn shift_player(&mut self) -> Result<PlayerId, GameError> {
        for _ in 0..self.turn_order.len() {
            self.current_index = (self.current_index + 1) % self.turn_order.len();
            let id = &self.turn_order[self.current_index];
            if self.registry.is_active_in_round(id) {
                return Ok(id.clone());
            }
        }
        Err(GameError::TurnOrderCorrupted)
    }

    /// First round-active position at or after `start`, wrapping once.
    fn first_active_from(&self, start: usize) -> Result<usize, GameError> {
        let len = self.turn_order.len();
        for offset in 0..len {
            let idx = (start + offset) % len;
            if self.registry.is_active_in_round(&self.turn_order[idx]) {
                return Ok(idx);
            }
        }
        Err(GameError::TurnOrderCorrupted)
    }

    /// Card conservation: once a round has been dealt, the 32 catalog ids
    /// are partitioned exactly across draw pile, discard pile and hands.
    /// Also checks that a pending ace chain stays below the holder count
    /// while the round is live. A violation means a malformed payload
    /// slipped through; there is no recovery path, so it is a programming
    /// error.
    fn debug_assert_conservation(&self) {
        #[cfg(debug_assertions)]
        {
            use crate::cards::DECK_SIZE;
            if self.score_ledger.is_empty() {
                return;
            }
            let mut seen = std::collections::HashSet::new();
            let mut total = 0usize;
            let hands = self.registry.iter().flat_map(|p| p.cards.iter());
            for &id in self.draw_pile.iter().chain(&self.discard_pile).chain(hands) {
                total += 1;
                assert!(seen.insert(id), "card {} held in two places", id);
            }
            assert_eq!(total, DECK_SIZE, "card count diverged from catalog");

            let holders = self.registry.active_in_round().len();
            if holders > 1 && self.pending_effect() == Some(Effect::Ace) {
                assert!(
                    self.effect_stack.len() < holders,
                    "ace chain of {} not below holder count {}",
                    self.effect_stack.len(),
                    holders
                );
            }
        }
    }
}

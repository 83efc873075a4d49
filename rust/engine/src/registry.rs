use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::cards::CardId;
use crate::errors::GameError;

/// Player identifier. In a deployed server this is the connection id the
/// dispatch layer hands the engine; the engine never interprets it.
pub type PlayerId = String;

/// Cards dealt to a freshly registered player at every round start, until
/// round losses whittle the count down.
pub const START_CARD_COUNT: u32 = 5;

/// Per-player round state: the hand, and the deal size that carries the
/// escalating loss penalty across rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRoundState {
    pub id: PlayerId,
    pub name: String,
    /// Cards dealt to this player at round start. Decremented (floored at
    /// zero) each time the player loses a round; the only quantity carried
    /// across rounds.
    pub start_card_count: u32,
    /// Current hand. Replaced wholesale at round start, mutated per turn.
    pub cards: Vec<CardId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl PlayerRoundState {
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            start_card_count: START_CARD_COUNT,
            cards: Vec::new(),
            address: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

/// Ordered, id-indexed collection of [`PlayerRoundState`] with two derived
/// membership views:
///
/// - `active_in_round`: players whose hand is currently non-empty
/// - `active_in_game`: players whose `start_card_count` has not hit zero
///
/// The views are rebuilt by [`PlayerRegistry::recompute_active`], which every
/// mutating operation must invoke before the engine reads them again. A
/// player can leave `active_in_round` (hand emptied, ranked for scoring) and
/// still be `active_in_game` for the next deal.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    list: Vec<PlayerRoundState>,
    index: HashMap<PlayerId, usize>,
    active_in_round: HashSet<PlayerId>,
    active_in_game: HashSet<PlayerId>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a player. Fails if the id is already present.
    pub fn add(&mut self, player: PlayerRoundState) -> Result<(), GameError> {
        if self.index.contains_key(&player.id) {
            return Err(GameError::DuplicateId(player.id));
        }
        self.index.insert(player.id.clone(), self.list.len());
        self.list.push(player);
        self.recompute_active();
        Ok(())
    }

    /// Removes a player by id. Returns `false` if the id is unknown. Any
    /// round/game activity marks for the id vanish with the recompute.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(pos) = self.index.get(id).copied() else {
            return false;
        };
        self.list.remove(pos);
        self.index.clear();
        for (i, player) in self.list.iter().enumerate() {
            self.index.insert(player.id.clone(), i);
        }
        self.recompute_active();
        true
    }

    pub fn get(&self, id: &str) -> Option<&PlayerRoundState> {
        self.index.get(id).map(|&pos| &self.list[pos])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut PlayerRoundState> {
        self.index.get(id).copied().map(|pos| &mut self.list[pos])
    }

    pub fn get_at(&self, pos: usize) -> Option<&PlayerRoundState> {
        self.list.get(pos)
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerRoundState> {
        self.list.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PlayerRoundState> {
        self.list.iter_mut()
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.list.iter().map(|p| p.id.clone()).collect()
    }

    /// Rebuilds both derived membership views from the entry list. Must run
    /// at the end of every operation that touched `cards` or
    /// `start_card_count` so the views are never stale within the same
    /// synchronous step.
    pub fn recompute_active(&mut self) {
        self.active_in_round.clear();
        self.active_in_game.clear();
        for player in &self.list {
            if !player.cards.is_empty() {
                self.active_in_round.insert(player.id.clone());
            }
            if player.start_card_count > 0 {
                self.active_in_game.insert(player.id.clone());
            }
        }
    }

    pub fn active_in_round(&self) -> &HashSet<PlayerId> {
        &self.active_in_round
    }

    pub fn active_in_game(&self) -> &HashSet<PlayerId> {
        &self.active_in_game
    }

    pub fn is_active_in_round(&self, id: &str) -> bool {
        self.active_in_round.contains(id)
    }

    pub fn is_active_in_game(&self, id: &str) -> bool {
        self.active_in_game.contains(id)
    }

    /// The single player still holding cards, defined only when exactly one
    /// remains in the round.
    pub fn looser(&self) -> Option<&PlayerRoundState> {
        if self.active_in_round.len() != 1 {
            return None;
        }
        self.list.iter().find(|p| self.active_in_round.contains(&p.id))
    }
}

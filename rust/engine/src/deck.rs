use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::cards::{full_deck, CardId};

/// Source of every shuffle in one game: the initial turn order, the deal at
/// each round start, and mid-round reshuffles of the discard pile.
///
/// Seeded games replay identically; unseeded games draw from OS entropy.
#[derive(Debug)]
pub struct Shuffler {
    rng: ChaCha20Rng,
}

impl Shuffler {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_os_rng(),
        };
        Self { rng }
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }

    /// A freshly shuffled full 32-card deck.
    pub fn shuffled_deck(&mut self) -> Vec<CardId> {
        let mut deck = full_deck();
        deck.shuffle(&mut self.rng);
        deck
    }
}

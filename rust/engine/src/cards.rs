use serde::{Deserialize, Serialize};

/// Identifier of a catalog card, `1..=32`. Ids are what travel through
/// piles, hands and diffs; the immutable catalog entry is looked up via
/// [`card`].
pub type CardId = u8;

/// Number of cards in the full catalog.
pub const DECK_SIZE: usize = 32;

/// One of the four colors of the German-suited 32-card deck.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    /// Hearts (červeň)
    Red,
    /// Leaves (zeleň)
    Green,
    /// Bells (guľa)
    Ball,
    /// Acorns (žaluď)
    Acorn,
}

/// Rank (face value) of a card, Seven through Ace.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Miner,
    King,
    Ace,
}

/// A pending play modifier queued on the effect stack.
/// Sevens stack a draw penalty, aces chain a skip.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Seven,
    Ace,
}

/// An immutable catalog entry. The catalog itself carries no state; every
/// pile and hand holds [`CardId`]s only.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub color: Color,
    pub rank: Rank,
}

impl Card {
    /// The effect this card queues when played, if any.
    pub fn effect(&self) -> Option<Effect> {
        match self.rank {
            Rank::Seven => Some(Effect::Seven),
            Rank::Ace => Some(Effect::Ace),
            _ => None,
        }
    }
}

pub fn all_colors() -> [Color; 4] {
    [Color::Red, Color::Green, Color::Ball, Color::Acorn]
}

pub fn all_ranks() -> [Rank; 8] {
    [
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Miner,
        Rank::King,
        Rank::Ace,
    ]
}

/// Looks up the catalog entry for `id`.
///
/// Ids run `1..=32`; the color cycles with every id and the rank steps every
/// four ids, so id 1 is the red seven and id 32 the acorn ace.
pub fn card(id: CardId) -> Card {
    debug_assert!(
        (1..=DECK_SIZE as CardId).contains(&id),
        "card id {} out of catalog range",
        id
    );
    let idx = (id - 1) as usize;
    Card {
        color: all_colors()[idx % 4],
        rank: all_ranks()[idx / 4],
    }
}

/// The 32 card ids in catalog order.
pub fn full_deck() -> Vec<CardId> {
    (1..=DECK_SIZE as CardId).collect()
}

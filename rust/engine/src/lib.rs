//! # farao-engine: Faraó Card Game Core
//!
//! Server-authoritative engine for Faraó, a turn-based shedding card game
//! for 2–4 players played with the German-suited 32-card deck. The engine
//! owns the deck piles, turn order, effect stacking, round/game progression
//! and scoring; a dispatch layer in front of it handles transport and
//! broadcast.
//!
//! ## Core Modules
//!
//! - [`cards`] - The fixed 32-card catalog (Color, Rank, Effect)
//! - [`deck`] - Deterministic shuffling with ChaCha20 RNG
//! - [`registry`] - Ordered player collection with derived activity views
//! - [`engine`] - Round/turn state machine and player-lifecycle tracking
//! - [`logger`] - Finished-game JSONL records
//! - [`errors`] - Error types for game operations
//!
//! ## Quick Start
//!
//! ```rust
//! use farao_engine::engine::RoundEngine;
//! use farao_engine::registry::PlayerRoundState;
//!
//! let mut engine = RoundEngine::new(Some(42));
//! engine.add_player(PlayerRoundState::new("ada", "Ada")).unwrap();
//! engine.add_player(PlayerRoundState::new("bob", "Bob")).unwrap();
//! engine.start().unwrap();
//!
//! let snapshot = engine.start_round().unwrap().expect("game keeps going");
//! assert_eq!(snapshot.card_assignment.len(), 2);
//! assert_eq!(snapshot.deck.len(), 1);
//! ```
//!
//! ## Deterministic Games
//!
//! All shuffles flow from one seeded RNG, so a seed replays a whole game:
//!
//! ```rust
//! use farao_engine::deck::Shuffler;
//!
//! let deck1 = Shuffler::new(Some(7)).shuffled_deck();
//! let deck2 = Shuffler::new(Some(7)).shuffled_deck();
//! assert_eq!(deck1, deck2);
//! ```

pub mod cards;
pub mod deck;
pub mod engine;
pub mod errors;
pub mod logger;
pub mod registry;

//! Dispatch layer for Faraó games: user roster, game rooms, and event
//! fan-out around the synchronous [`farao_engine`] core.
//!
//! The engine is single-threaded by design; [`session::SessionManager`]
//! provides the per-game exclusion zone (one mutex per room) and pushes
//! every engine outcome through the [`events::EventBus`] so connected
//! clients see the same sequence of snapshots and diffs.
//!
//! ```
//! use farao_server::events::EventBus;
//! use farao_server::session::{LobbyConfig, SessionManager};
//!
//! let manager = SessionManager::with_config(
//!     EventBus::new(),
//!     LobbyConfig { player_limit: 4, seed: Some(42) },
//! );
//! manager.register_user("ada", "Ada", None).unwrap();
//! manager.register_user("bob", "Bob", None).unwrap();
//!
//! let game_id = manager.create_game("ada").unwrap();
//! manager.join_game("bob", &game_id).unwrap();
//! let mut updates = manager.event_bus().subscribe(game_id.clone());
//!
//! manager.start_game(&game_id).unwrap();
//! let view = manager.game_state(&game_id).unwrap();
//! assert!(view.started);
//! assert_eq!(view.hands.len(), 2);
//! ```

pub mod errors;
pub mod events;
pub mod logging;
pub mod session;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use farao_engine::cards::{CardId, Color, Effect, Rank};
use farao_engine::engine::{CommittedTurn, GamePhase, GameReport, RemoveDiff, RoundEngine};
use farao_engine::errors::GameError;
use farao_engine::logger::{GameLogger, GameRecord};
use farao_engine::registry::{PlayerId, PlayerRoundState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::SessionError;
use crate::events::{EventBus, GameEvent, PlayerInfo};

pub type GameId = String;

pub const DEFAULT_PLAYER_LIMIT: usize = 4;

/// Lobby-wide settings applied to every game the manager creates.
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    pub player_limit: usize,
    /// Fixed RNG seed for every engine; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            player_limit: DEFAULT_PLAYER_LIMIT,
            seed: None,
        }
    }
}

/// A connected client, keyed by its connection id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: PlayerId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub active_game: Option<GameId>,
}

/// One game room. The state mutex is the per-game exclusion zone: every
/// engine call happens under it, so concurrent turns against the same game
/// serialize while distinct games stay independent.
#[derive(Debug)]
pub struct GameRoom {
    id: GameId,
    created_by: PlayerId,
    state: Mutex<RoomState>,
}

#[derive(Debug)]
struct RoomState {
    members: Vec<PlayerInfo>,
    engine: Option<RoundEngine>,
}

impl GameRoom {
    fn new(id: GameId, creator: PlayerInfo) -> Self {
        Self {
            id,
            created_by: creator.id.clone(),
            state: Mutex::new(RoomState {
                members: vec![creator],
                engine: None,
            }),
        }
    }

    pub fn id(&self) -> &GameId {
        &self.id
    }

    pub fn created_by(&self) -> &PlayerId {
        &self.created_by
    }
}

/// Point-in-time view of one game, for state queries and reconnects.
#[derive(Debug, Clone, Serialize)]
pub struct GameStateView {
    pub game_id: GameId,
    pub players: Vec<PlayerInfo>,
    pub started: bool,
    pub finished: bool,
    pub round_number: Option<usize>,
    pub current_player: Option<PlayerId>,
    pub hands: HashMap<PlayerId, Vec<CardId>>,
    pub stack_size: usize,
    pub deck_size: usize,
    pub color: Option<Color>,
    pub rank: Option<Rank>,
    pub effects: Vec<Effect>,
}

/// Owns the user roster and the game rooms, and drives the engines through
/// their round lifecycle. Engine outcomes fan out through the event bus;
/// events are collected under the room lock and broadcast after it drops.
#[derive(Debug)]
pub struct SessionManager {
    users: RwLock<HashMap<PlayerId, UserRecord>>,
    games: RwLock<HashMap<GameId, Arc<GameRoom>>>,
    event_bus: EventBus,
    config: LobbyConfig,
    records: Option<Mutex<GameLogger>>,
}

impl SessionManager {
    pub fn new(event_bus: EventBus) -> Self {
        Self::with_config(event_bus, LobbyConfig::default())
    }

    pub fn with_config(event_bus: EventBus, config: LobbyConfig) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            games: RwLock::new(HashMap::new()),
            event_bus,
            config,
            records: None,
        }
    }

    /// Archives every finished game as a JSONL record.
    pub fn with_game_log(mut self, logger: GameLogger) -> Self {
        self.records = Some(Mutex::new(logger));
        self
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    // --- users ---

    /// Registers (or re-registers, on reconnect) a connected client.
    pub fn register_user(
        &self,
        id: &str,
        name: &str,
        address: Option<String>,
    ) -> Result<UserRecord, SessionError> {
        let record = UserRecord {
            id: id.to_string(),
            name: name.to_string(),
            address,
            active_game: None,
        };
        let mut users = self.users.write().map_err(|_| SessionError::StoragePoisoned)?;
        users.insert(record.id.clone(), record.clone());
        tracing::info!(user_id = %id, "connection established");
        Ok(record)
    }

    pub fn rename_user(&self, id: &str, name: &str) -> Result<(), SessionError> {
        let mut users = self.users.write().map_err(|_| SessionError::StoragePoisoned)?;
        let user = users
            .get_mut(id)
            .ok_or_else(|| SessionError::UserNotFound(id.to_string()))?;
        user.name = name.to_string();
        tracing::debug!(user_id = %id, name, "user renamed");
        Ok(())
    }

    pub fn user(&self, id: &str) -> Result<UserRecord, SessionError> {
        let users = self.users.read().map_err(|_| SessionError::StoragePoisoned)?;
        users
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::UserNotFound(id.to_string()))
    }

    /// Drops a client: leaves its active game first, then forgets the record.
    pub fn disconnect_user(&self, id: &str) -> Result<(), SessionError> {
        let active = {
            let users = self.users.read().map_err(|_| SessionError::StoragePoisoned)?;
            users.get(id).and_then(|u| u.active_game.clone())
        };
        if let Some(game_id) = active {
            if self.room(&game_id).is_ok() {
                self.leave_game(id, &game_id)?;
            }
        }
        let mut users = self.users.write().map_err(|_| SessionError::StoragePoisoned)?;
        users.remove(id);
        tracing::info!(user_id = %id, "connection closed");
        Ok(())
    }

    // --- lobby ---

    pub fn create_game(&self, user_id: &str) -> Result<GameId, SessionError> {
        let creator = {
            let users = self.users.read().map_err(|_| SessionError::StoragePoisoned)?;
            let user = users
                .get(user_id)
                .ok_or_else(|| SessionError::UserNotFound(user_id.to_string()))?;
            PlayerInfo {
                id: user.id.clone(),
                name: user.name.clone(),
            }
        };

        let game_id = Uuid::new_v4().to_string();
        let room = Arc::new(GameRoom::new(game_id.clone(), creator.clone()));
        {
            let mut games = self.games.write().map_err(|_| SessionError::StoragePoisoned)?;
            games.insert(game_id.clone(), room);
        }
        self.set_active_game(user_id, Some(game_id.clone()))?;

        tracing::info!(game_id = %game_id, user_id = %user_id, "game created");
        self.event_bus.broadcast(
            &game_id,
            GameEvent::PlayerAdded {
                game_id: game_id.clone(),
                player: creator,
            },
        );
        Ok(game_id)
    }

    /// Adds a user to a not-yet-started game. Returns the roster after the
    /// join.
    pub fn join_game(
        &self,
        user_id: &str,
        game_id: &GameId,
    ) -> Result<Vec<PlayerInfo>, SessionError> {
        let joiner = {
            let users = self.users.read().map_err(|_| SessionError::StoragePoisoned)?;
            let user = users
                .get(user_id)
                .ok_or_else(|| SessionError::UserNotFound(user_id.to_string()))?;
            if let Some(current) = &user.active_game {
                return Err(SessionError::AlreadyInGame(current.clone()));
            }
            PlayerInfo {
                id: user.id.clone(),
                name: user.name.clone(),
            }
        };

        let room = self.room(game_id)?;
        let roster = {
            let mut state = room.state.lock().map_err(|_| SessionError::StoragePoisoned)?;
            if state.engine.is_some() {
                return Err(SessionError::Engine(GameError::AlreadyStarted));
            }
            if state.members.len() >= self.config.player_limit {
                return Err(SessionError::GameFull(game_id.clone()));
            }
            state.members.push(joiner.clone());
            state.members.clone()
        };
        self.set_active_game(user_id, Some(game_id.clone()))?;

        tracing::info!(game_id = %game_id, user_id = %user_id, "player joined");
        self.event_bus.broadcast(
            game_id,
            GameEvent::PlayerAdded {
                game_id: game_id.clone(),
                player: joiner,
            },
        );
        Ok(roster)
    }

    /// Removes a member. When the departing member created the game, the
    /// whole room is torn down and remaining members are reset.
    pub fn leave_game(&self, user_id: &str, game_id: &GameId) -> Result<(), SessionError> {
        {
            let users = self.users.read().map_err(|_| SessionError::StoragePoisoned)?;
            let user = users
                .get(user_id)
                .ok_or_else(|| SessionError::UserNotFound(user_id.to_string()))?;
            if user.active_game.as_ref() != Some(game_id) {
                return Err(SessionError::NotInGame(game_id.clone()));
            }
        }

        let room = self.room(game_id)?;
        let creator_left = room.created_by() == user_id;
        let mut events = Vec::new();
        {
            let mut state = room.state.lock().map_err(|_| SessionError::StoragePoisoned)?;
            self.depart_locked(game_id, &mut state, user_id, &mut events)?;
        }
        self.set_active_game(user_id, None)?;

        tracing::info!(game_id = %game_id, user_id = %user_id, "player left");
        for event in events {
            self.event_bus.broadcast(game_id, event);
        }
        if creator_left {
            self.delete_game(game_id, "game_creator_left")?;
        }
        Ok(())
    }

    /// Tears a room down and resets its remaining members.
    pub fn delete_game(&self, game_id: &GameId, reason: &str) -> Result<(), SessionError> {
        let room = {
            let mut games = self.games.write().map_err(|_| SessionError::StoragePoisoned)?;
            games
                .remove(game_id)
                .ok_or_else(|| SessionError::GameNotFound(game_id.clone()))?
        };
        let members = {
            let state = room.state.lock().map_err(|_| SessionError::StoragePoisoned)?;
            state.members.clone()
        };
        {
            let mut users = self.users.write().map_err(|_| SessionError::StoragePoisoned)?;
            for member in &members {
                if let Some(user) = users.get_mut(&member.id) {
                    if user.active_game.as_ref() == Some(game_id) {
                        user.active_game = None;
                    }
                }
            }
        }

        tracing::info!(game_id = %game_id, reason, "game deleted");
        self.event_bus.broadcast(
            game_id,
            GameEvent::Reset {
                game_id: game_id.clone(),
                reason: reason.to_string(),
            },
        );
        self.event_bus.drop_game(game_id);
        Ok(())
    }

    pub fn active_games(&self) -> Result<Vec<GameId>, SessionError> {
        let games = self.games.read().map_err(|_| SessionError::StoragePoisoned)?;
        Ok(games.keys().cloned().collect())
    }

    // --- game lifecycle ---

    /// Builds the engine from the current roster and deals the first round.
    pub fn start_game(&self, game_id: &GameId) -> Result<(), SessionError> {
        let room = self.room(game_id)?;
        let mut events = Vec::new();
        {
            let mut state = room.state.lock().map_err(|_| SessionError::StoragePoisoned)?;
            if state.engine.is_some() {
                return Err(SessionError::Engine(GameError::AlreadyStarted));
            }

            let mut engine = RoundEngine::new(self.config.seed);
            {
                let users = self.users.read().map_err(|_| SessionError::StoragePoisoned)?;
                for member in &state.members {
                    let mut player = PlayerRoundState::new(member.id.clone(), member.name.clone());
                    if let Some(address) = users.get(&member.id).and_then(|u| u.address.clone()) {
                        player = player.with_address(address);
                    }
                    engine.add_player(player)?;
                }
            }
            engine.start()?;
            match engine.start_round()? {
                Some(snapshot) => events.push(GameEvent::RoundStarted {
                    game_id: game_id.clone(),
                    snapshot,
                }),
                // A lone member gets the terminal signal on the first deal.
                None => events.push(GameEvent::GameEnded {
                    game_id: game_id.clone(),
                    report: engine.report().ok(),
                    reason: "not_enough_players".to_string(),
                }),
            }
            tracing::info!(
                game_id = %game_id,
                players = state.members.len(),
                seed = ?engine.seed(),
                "game started"
            );
            state.engine = Some(engine);
        }
        for event in events {
            self.event_bus.broadcast(game_id, event);
        }
        Ok(())
    }

    /// Applies one turn to the game's engine. A round-ending turn rolls
    /// straight into the next round, or into the final report when the game
    /// is over.
    pub fn commit_turn(&self, game_id: &GameId, turn: CommittedTurn) -> Result<(), SessionError> {
        let room = self.room(game_id)?;
        let mut events = Vec::new();
        {
            let mut state = room.state.lock().map_err(|_| SessionError::StoragePoisoned)?;
            let engine = state
                .engine
                .as_mut()
                .ok_or(SessionError::Engine(GameError::NotStarted))?;
            match engine.commit_turn(turn)? {
                Some(diff) => events.push(GameEvent::TurnCommitted {
                    game_id: game_id.clone(),
                    diff,
                }),
                None => {
                    let finish_order = engine.score_ledger().last().cloned().unwrap_or_default();
                    events.push(GameEvent::RoundFinished {
                        game_id: game_id.clone(),
                        finish_order,
                    });
                    self.advance_round(game_id, engine, &mut events)?;
                }
            }
        }
        for event in events {
            self.event_bus.broadcast(game_id, event);
        }
        Ok(())
    }

    /// Removes a participant from a game at any point in its lifecycle,
    /// settling the round if the departure orphaned it. Unknown ids are a
    /// no-op, mirroring the engine.
    pub fn remove_player(&self, game_id: &GameId, player_id: &str) -> Result<(), SessionError> {
        let room = self.room(game_id)?;
        let mut events = Vec::new();
        {
            let mut state = room.state.lock().map_err(|_| SessionError::StoragePoisoned)?;
            self.depart_locked(game_id, &mut state, player_id, &mut events)?;
        }
        self.set_active_game(player_id, None).ok();

        tracing::info!(game_id = %game_id, player_id = %player_id, "player removed");
        for event in events {
            self.event_bus.broadcast(game_id, event);
        }
        Ok(())
    }

    pub fn game_state(&self, game_id: &GameId) -> Result<GameStateView, SessionError> {
        let room = self.room(game_id)?;
        let state = room.state.lock().map_err(|_| SessionError::StoragePoisoned)?;
        let view = match &state.engine {
            None => GameStateView {
                game_id: game_id.clone(),
                players: state.members.clone(),
                started: false,
                finished: false,
                round_number: None,
                current_player: None,
                hands: HashMap::new(),
                stack_size: 0,
                deck_size: 0,
                color: None,
                rank: None,
                effects: Vec::new(),
            },
            Some(engine) => GameStateView {
                game_id: game_id.clone(),
                players: state.members.clone(),
                started: true,
                finished: engine.phase() == GamePhase::Finished,
                round_number: engine.round_number(),
                current_player: engine.current_player_id().cloned(),
                hands: engine
                    .registry()
                    .iter()
                    .map(|p| (p.id.clone(), p.cards.clone()))
                    .collect(),
                stack_size: engine.draw_pile().len(),
                deck_size: engine.discard_pile().len(),
                color: engine.current_color(),
                rank: engine.current_rank(),
                effects: engine.effects().to_vec(),
            },
        };
        Ok(view)
    }

    // --- internals ---

    fn room(&self, game_id: &GameId) -> Result<Arc<GameRoom>, SessionError> {
        let games = self.games.read().map_err(|_| SessionError::StoragePoisoned)?;
        games
            .get(game_id)
            .cloned()
            .ok_or_else(|| SessionError::GameNotFound(game_id.clone()))
    }

    fn set_active_game(&self, user_id: &str, game: Option<GameId>) -> Result<(), SessionError> {
        let mut users = self.users.write().map_err(|_| SessionError::StoragePoisoned)?;
        if let Some(user) = users.get_mut(user_id) {
            user.active_game = game;
        }
        Ok(())
    }

    /// Shared departure path. Must run under the room lock; collected events
    /// are broadcast by the caller after the lock drops.
    fn depart_locked(
        &self,
        game_id: &GameId,
        state: &mut RoomState,
        player_id: &str,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), SessionError> {
        state.members.retain(|m| m.id != player_id);

        let Some(engine) = state.engine.as_mut() else {
            events.push(GameEvent::PlayerRemoved {
                game_id: game_id.clone(),
                diff: RemoveDiff {
                    id: player_id.to_string(),
                    stack_added: None,
                    current_player: None,
                },
            });
            return Ok(());
        };

        if let Some(diff) = engine.remove_player(player_id) {
            events.push(GameEvent::PlayerRemoved {
                game_id: game_id.clone(),
                diff,
            });
        }
        // A departure can leave a single holder behind; that settles the
        // round (the survivor ranks last) and may end the game.
        if engine.round_should_finish() {
            engine.finish_round()?;
            let finish_order = engine.score_ledger().last().cloned().unwrap_or_default();
            events.push(GameEvent::RoundFinished {
                game_id: game_id.clone(),
                finish_order,
            });
            self.advance_round(game_id, engine, events)?;
        }
        Ok(())
    }

    /// Deals the next round or, on the terminal signal, produces the report
    /// and archives the game.
    fn advance_round(
        &self,
        game_id: &GameId,
        engine: &mut RoundEngine,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), SessionError> {
        match engine.start_round()? {
            Some(snapshot) => events.push(GameEvent::RoundStarted {
                game_id: game_id.clone(),
                snapshot,
            }),
            None => {
                let report = engine.report()?;
                self.archive(game_id, engine, &report);
                tracing::info!(
                    game_id = %game_id,
                    rounds = report.round_count,
                    elapsed_ms = report.elapsed_ms,
                    "game finished"
                );
                events.push(GameEvent::GameEnded {
                    game_id: game_id.clone(),
                    report: Some(report),
                    reason: "game_finished".to_string(),
                });
            }
        }
        Ok(())
    }

    fn archive(&self, game_id: &GameId, engine: &RoundEngine, report: &GameReport) {
        let Some(records) = &self.records else {
            return;
        };
        let Ok(mut logger) = records.lock() else {
            tracing::warn!(game_id = %game_id, "record logger lock poisoned, game not archived");
            return;
        };
        let record = GameRecord {
            game_id: logger.next_id(),
            seed: engine.seed(),
            rounds: engine.score_ledger().to_vec(),
            scores: report.scores.clone(),
            elapsed_ms: report.elapsed_ms,
            ts: None,
            meta: Some(serde_json::json!({ "lobby": game_id })),
        };
        if let Err(e) = logger.write(&record) {
            tracing::warn!(game_id = %game_id, error = %e, "failed to archive game record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventSubscription;

    fn manager_with_seed(seed: u64) -> SessionManager {
        SessionManager::with_config(
            EventBus::new(),
            LobbyConfig {
                player_limit: 4,
                seed: Some(seed),
            },
        )
    }

    /// Registers `n` users and puts them in one game created by "ada".
    fn lobby(manager: &SessionManager, n: usize) -> GameId {
        let names = ["ada", "bob", "cyd", "dan"];
        for id in names.iter().take(n) {
            manager.register_user(id, id, None).unwrap();
        }
        let game_id = manager.create_game("ada").unwrap();
        for id in names.iter().take(n).skip(1) {
            manager.join_game(id, &game_id).unwrap();
        }
        game_id
    }

    fn drain(sub: &mut EventSubscription) -> Vec<GameEvent> {
        let mut out = Vec::new();
        while let Ok(event) = sub.receiver.try_recv() {
            out.push(event);
        }
        out
    }

    /// The current player sheds their whole hand, ending the round.
    fn dump_current(manager: &SessionManager, game_id: &GameId) {
        let view = manager.game_state(game_id).unwrap();
        let current = view.current_player.expect("round in progress");
        let hand = view.hands[&current].clone();
        manager
            .commit_turn(
                game_id,
                CommittedTurn {
                    cards_given: hand,
                    ..Default::default()
                },
            )
            .unwrap();
    }

    #[test]
    fn join_is_bounded_and_exclusive() {
        let manager = manager_with_seed(11);
        let game_id = lobby(&manager, 4);

        manager.register_user("eve", "Eve", None).unwrap();
        assert_eq!(
            manager.join_game("eve", &game_id),
            Err(SessionError::GameFull(game_id.clone()))
        );
        assert_eq!(
            manager.join_game("bob", &game_id),
            Err(SessionError::AlreadyInGame(game_id.clone()))
        );
        assert!(matches!(
            manager.join_game("ghost", &game_id),
            Err(SessionError::UserNotFound(_))
        ));
    }

    #[test]
    fn membership_is_tracked_on_the_user_record() {
        let manager = manager_with_seed(12);
        let game_id = lobby(&manager, 2);

        assert_eq!(manager.user("bob").unwrap().active_game, Some(game_id.clone()));
        manager.leave_game("bob", &game_id).unwrap();
        assert_eq!(manager.user("bob").unwrap().active_game, None);
        assert_eq!(
            manager.leave_game("bob", &game_id),
            Err(SessionError::NotInGame(game_id.clone()))
        );
    }

    #[test]
    fn rename_updates_the_record() {
        let manager = manager_with_seed(13);
        manager.register_user("ada", "ada", None).unwrap();
        manager.rename_user("ada", "Lady Lovelace").unwrap();
        assert_eq!(manager.user("ada").unwrap().name, "Lady Lovelace");
        assert!(matches!(
            manager.rename_user("ghost", "x"),
            Err(SessionError::UserNotFound(_))
        ));
    }

    #[test]
    fn joining_a_started_game_is_rejected() {
        let manager = manager_with_seed(14);
        let game_id = lobby(&manager, 2);
        manager.start_game(&game_id).unwrap();

        manager.register_user("cyd", "Cyd", None).unwrap();
        assert_eq!(
            manager.join_game("cyd", &game_id),
            Err(SessionError::Engine(GameError::AlreadyStarted))
        );
        assert_eq!(
            manager.start_game(&game_id),
            Err(SessionError::Engine(GameError::AlreadyStarted))
        );
    }

    #[test]
    fn start_deals_a_round_and_broadcasts_the_snapshot() {
        let manager = manager_with_seed(15);
        let game_id = lobby(&manager, 3);
        let mut sub = manager.event_bus().subscribe(game_id.clone());

        manager.start_game(&game_id).unwrap();

        let events = drain(&mut sub);
        let snapshot = events
            .iter()
            .find_map(|e| match e {
                GameEvent::RoundStarted { snapshot, .. } => Some(snapshot.clone()),
                _ => None,
            })
            .expect("round started event");
        assert_eq!(snapshot.round_number, 1);
        assert_eq!(snapshot.card_assignment.len(), 3);
        assert!(snapshot.card_assignment.values().all(|h| h.len() == 5));

        let view = manager.game_state(&game_id).unwrap();
        assert!(view.started && !view.finished);
        assert_eq!(view.current_player.as_ref(), Some(&snapshot.current_player));
        assert_eq!(view.hands.len(), 3);
    }

    #[test]
    fn a_game_plays_to_its_report_through_the_session_api() {
        let manager = manager_with_seed(16);
        let game_id = lobby(&manager, 2);
        let mut sub = manager.event_bus().subscribe(game_id.clone());
        manager.start_game(&game_id).unwrap();

        let mut all_events = drain(&mut sub);
        for _ in 0..30 {
            if manager.game_state(&game_id).unwrap().finished {
                break;
            }
            dump_current(&manager, &game_id);
            all_events.extend(drain(&mut sub));
        }

        let report = all_events
            .iter()
            .find_map(|e| match e {
                GameEvent::GameEnded { report, .. } => report.clone(),
                _ => None,
            })
            .expect("game ended with a report");
        // a fresh deal size of five means five lost rounds end the game
        assert_eq!(report.round_count, 5);
        assert_eq!(report.scores.values().sum::<u32>(), 5);

        let started = all_events
            .iter()
            .filter(|e| matches!(e, GameEvent::RoundStarted { .. }))
            .count();
        let finished = all_events
            .iter()
            .filter(|e| matches!(e, GameEvent::RoundFinished { .. }))
            .count();
        assert_eq!(started, 5);
        assert_eq!(finished, 5);

        assert_eq!(
            manager.commit_turn(&game_id, CommittedTurn::default()),
            Err(SessionError::Engine(GameError::GameFinished))
        );
    }

    #[test]
    fn creator_departure_tears_the_game_down() {
        let manager = manager_with_seed(17);
        let game_id = lobby(&manager, 2);
        let mut sub = manager.event_bus().subscribe(game_id.clone());

        manager.leave_game("ada", &game_id).unwrap();

        let events = drain(&mut sub);
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::PlayerRemoved { diff, .. } if diff.id == "ada")));
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::Reset { reason, .. } if reason == "game_creator_left")));
        assert!(manager.active_games().unwrap().is_empty());
        assert_eq!(manager.user("bob").unwrap().active_game, None);
    }

    #[test]
    fn mid_game_departure_settles_round_and_game() {
        let manager = manager_with_seed(18);
        let game_id = lobby(&manager, 2);
        let mut sub = manager.event_bus().subscribe(game_id.clone());
        manager.start_game(&game_id).unwrap();
        drain(&mut sub);

        manager.remove_player(&game_id, "bob").unwrap();

        let events = drain(&mut sub);
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::PlayerRemoved { diff, .. } if diff.id == "bob")));
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::RoundFinished { finish_order, .. }
                if finish_order.as_slice() == ["ada".to_string()])));
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::GameEnded { .. })));
        assert!(manager.game_state(&game_id).unwrap().finished);
    }

    #[test]
    fn unknown_participant_removal_is_a_no_op() {
        let manager = manager_with_seed(19);
        let game_id = lobby(&manager, 3);
        manager.start_game(&game_id).unwrap();
        let mut sub = manager.event_bus().subscribe(game_id.clone());

        manager.remove_player(&game_id, "nobody").unwrap();
        assert!(drain(&mut sub).is_empty());
        assert_eq!(manager.game_state(&game_id).unwrap().hands.len(), 3);
    }

    #[test]
    fn disconnect_leaves_the_active_game_first() {
        let manager = manager_with_seed(20);
        let game_id = lobby(&manager, 3);

        manager.disconnect_user("bob").unwrap();
        assert!(matches!(
            manager.user("bob"),
            Err(SessionError::UserNotFound(_))
        ));
        let view = manager.game_state(&game_id).unwrap();
        assert_eq!(view.players.len(), 2);
        assert!(view.players.iter().all(|p| p.id != "bob"));
    }

    #[test]
    fn lifecycle_operations_emit_structured_logs() {
        let logs = crate::logging::init_test_logging();
        let manager = manager_with_seed(22);
        let game_id = lobby(&manager, 2);
        manager.start_game(&game_id).unwrap();

        // other tests share the capturing subscriber, so match on this
        // game's unique id
        let entries = logs.entries();
        let for_this_game = |message: &str| {
            entries.iter().find(|e| {
                e.message.contains(message)
                    && e.fields
                        .iter()
                        .any(|(k, v)| k == "game_id" && v.contains(&game_id))
            })
        };

        let created = for_this_game("game created").expect("create_game logged");
        assert!(created
            .fields
            .iter()
            .any(|(k, v)| k == "user_id" && v.contains("ada")));

        let started = for_this_game("game started").expect("start_game logged");
        assert!(started
            .fields
            .iter()
            .any(|(k, v)| k == "players" && v.contains('2')));
    }

    #[test]
    fn finished_games_are_archived_as_jsonl() {
        let path = std::env::temp_dir().join("farao_test_session_archive.jsonl");
        let _ = std::fs::remove_file(&path);

        let manager = SessionManager::with_config(
            EventBus::new(),
            LobbyConfig {
                player_limit: 4,
                seed: Some(21),
            },
        )
        .with_game_log(GameLogger::create(&path).unwrap());
        let game_id = lobby(&manager, 2);
        manager.start_game(&game_id).unwrap();
        for _ in 0..30 {
            if manager.game_state(&game_id).unwrap().finished {
                break;
            }
            dump_current(&manager, &game_id);
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        let record: GameRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record.seed, Some(21));
        assert_eq!(record.rounds.len(), 5);
        assert_eq!(record.meta.unwrap()["lobby"], game_id);

        let _ = std::fs::remove_file(&path);
    }
}

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use farao_engine::engine::{GameReport, RemoveDiff, RoundSnapshot, TurnDiff};
use farao_engine::registry::PlayerId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::session::GameId;

// Bounded channels keep one slow subscriber from exhausting memory; events
// for a full subscriber are dropped instead.
const EVENT_CHANNEL_BUFFER: usize = 1000;

pub type EventSender = mpsc::Sender<GameEvent>;
pub type EventReceiver = mpsc::Receiver<GameEvent>;

/// Everything the dispatch layer fans out to the participants of one game.
/// The payloads are exactly the engine's outbound data shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    PlayerAdded {
        game_id: GameId,
        player: PlayerInfo,
    },
    PlayerRemoved {
        game_id: GameId,
        diff: RemoveDiff,
    },
    RoundStarted {
        game_id: GameId,
        snapshot: RoundSnapshot,
    },
    TurnCommitted {
        game_id: GameId,
        diff: TurnDiff,
    },
    RoundFinished {
        game_id: GameId,
        finish_order: Vec<PlayerId>,
    },
    GameEnded {
        game_id: GameId,
        report: Option<GameReport>,
        reason: String,
    },
    Reset {
        game_id: GameId,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
}

pub struct EventSubscription {
    bus: EventBus,
    game_id: GameId,
    subscriber_id: usize,
    pub receiver: EventReceiver,
}

impl EventSubscription {
    pub fn receiver(&mut self) -> &mut EventReceiver {
        &mut self.receiver
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.game_id, self.subscriber_id);
    }
}

/// Broadcast primitive: fans one game's events out to every subscriber of
/// that game.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

#[derive(Debug, Default)]
struct EventBusInner {
    subscribers: RwLock<HashMap<GameId, Vec<(usize, EventSender)>>>,
    next_id: AtomicUsize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, game_id: GameId) -> EventSubscription {
        let (subscriber_id, receiver) = self.subscribe_raw(game_id.clone());
        EventSubscription {
            bus: self.clone(),
            game_id,
            subscriber_id,
            receiver,
        }
    }

    fn subscribe_raw(&self, game_id: GameId) -> (usize, EventReceiver) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_BUFFER);
        let id = self.inner.next_id.fetch_add(1, Ordering::AcqRel);
        let mut guard = self
            .inner
            .subscribers
            .write()
            .expect("subscriber lock poisoned");
        guard.entry(game_id.clone()).or_default().push((id, tx));

        tracing::info!(
            game_id = %game_id,
            subscriber_id = id,
            "client subscribed to game events"
        );

        (id, rx)
    }

    pub fn broadcast(&self, game_id: &GameId, event: GameEvent) {
        tracing::debug!(
            game_id = %game_id,
            event = ?event,
            "broadcasting game event"
        );

        let subscribers = {
            let guard = self
                .inner
                .subscribers
                .read()
                .expect("subscriber lock poisoned");
            guard.get(game_id).cloned()
        };

        if let Some(list) = subscribers {
            let mut failed = Vec::new();
            for (id, sender) in list {
                // try_send drops events for full channels instead of
                // blocking the whole broadcast
                if let Err(e) = sender.try_send(event.clone()) {
                    tracing::warn!(
                        game_id = %game_id,
                        subscriber_id = id,
                        error = ?e,
                        "failed to deliver event to subscriber"
                    );
                    failed.push(id);
                }
            }
            if !failed.is_empty() {
                self.remove_subscribers(game_id, &failed);
            }
        }
    }

    pub fn unsubscribe(&self, game_id: &GameId, subscriber_id: usize) {
        self.remove_subscribers(game_id, &[subscriber_id]);
    }

    pub fn drop_game(&self, game_id: &GameId) {
        let mut guard = self
            .inner
            .subscribers
            .write()
            .expect("subscriber lock poisoned");
        guard.remove(game_id);
    }

    pub fn subscriber_count(&self) -> usize {
        let guard = self
            .inner
            .subscribers
            .read()
            .expect("subscriber lock poisoned");
        guard.values().map(|list| list.len()).sum()
    }

    fn remove_subscribers(&self, game_id: &GameId, ids: &[usize]) {
        let mut guard = self
            .inner
            .subscribers
            .write()
            .expect("subscriber lock poisoned");
        if let Some(list) = guard.get_mut(game_id) {
            list.retain(|(id, _)| !ids.contains(id));
            if list.is_empty() {
                guard.remove(game_id);
            }
        }
    }
}

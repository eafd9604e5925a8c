//! Per-tick event queue
//!
//! Systems push events while the tick runs; the simulation drains the queue
//! once at the end of the tick, delivering each event to every subscriber in
//! push order.

use serde::{Deserialize, Serialize};

use crate::game::state::{EntityId, KindTag, PlayerKey};
use crate::game::systems::ai::Strategy;

/// Game events produced during a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// An entity was eaten (flagged removed)
    Eaten {
        eater: EntityId,
        eaten: EntityId,
        eaten_kind: KindTag,
        mass: f64,
    },
    /// A cell split in two
    Split {
        player: PlayerKey,
        source: EntityId,
        sibling: EntityId,
    },
    /// A cell absorbed a thorn and burst into pieces
    ThornsSplit {
        player: PlayerKey,
        source: EntityId,
        pieces: usize,
    },
    Ejected {
        player: PlayerKey,
        cell: EntityId,
        spore: EntityId,
    },
    Merged {
        player: PlayerKey,
        survivor: EntityId,
        absorbed: EntityId,
    },
    /// Stale food retired by the cleanup sweep
    FoodRetired { count: usize },
    PlayerJoined { player: PlayerKey },
    /// A player lost its last cell
    PlayerEliminated { player: PlayerKey },
    PlayerRespawned { player: PlayerKey },
    StrategyChanged {
        player: PlayerKey,
        from: Strategy,
        to: Strategy,
    },
}

/// Event callback
pub type Subscriber = Box<dyn FnMut(&GameEvent) + Send>;

/// Queue of pending events plus the subscribers they are delivered to
#[derive(Default)]
pub struct EventQueue {
    pending: Vec<GameEvent>,
    subscribers: Vec<Subscriber>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: GameEvent) {
        self.pending.push(event);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> &[GameEvent] {
        &self.pending
    }

    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&GameEvent) + Send + 'static,
    {
        self.subscribers.push(Box::new(callback));
    }

    /// Deliver pending events to subscribers and return them
    pub fn drain(&mut self) -> Vec<GameEvent> {
        let events = std::mem::take(&mut self.pending);
        for event in &events {
            for subscriber in self.subscribers.iter_mut() {
                subscriber(event);
            }
        }
        events
    }
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("pending", &self.pending)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

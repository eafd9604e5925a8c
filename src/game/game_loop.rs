//! Fixed-order simulation tick
//!
//! One `tick()` runs, in order: actions and AI, physics, index rebuild,
//! collisions, lifecycle, spawner, removal sweep, event delivery.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{ArenaConfig, ConfigError};
use crate::game::action::{apply_action, Action};
use crate::game::events::{EventQueue, GameEvent};
use crate::game::input_buffer::{ActionQueue, ActionQueueError, ActionSender};
use crate::game::observation::{observe_all, observe_player, Observation, PlayerState};
use crate::game::performance::PerformanceMonitor;
use crate::game::policy::ModelPolicy;
use crate::game::spatial::{Aabb, Quadtree, QuadtreeStats, SpatialEntity};
use crate::game::state::{Border, Controller, GameState, PlayerKey};
use crate::game::systems::ai::{AiManager, Strategy};
use crate::game::systems::collision::{self, CollisionRules};
use crate::game::systems::lifecycle::{self, LifecycleSummary};
use crate::game::systems::physics;
use crate::game::systems::spawner::{self, SpawnSummary};
use crate::util::vec2::Vec2;

/// What happened during one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickSummary {
    /// Tick number that just ran
    pub tick: u64,
    pub external_actions: usize,
    pub ai_actions: usize,
    pub eaten: usize,
    pub lifecycle: LifecycleSummary,
    pub spawn: SpawnSummary,
    /// Entities deleted by the sweep
    pub removed: usize,
    pub events: Vec<GameEvent>,
    pub duration: Duration,
}

/// Owns the registry and every system; the only thing that mutates state
pub struct Simulation {
    config: ArenaConfig,
    state: GameState,
    tree: Quadtree,
    events: EventQueue,
    rng: StdRng,
    ai: AiManager,
    actions: ActionQueue,
    performance: PerformanceMonitor,
}

impl Simulation {
    /// Validate the config and spawn the initial food and thorns
    pub fn new(config: ArenaConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let border = Border::new(config.border_width, config.border_height);
        let mut state = GameState::new(border);
        let mut rng = StdRng::seed_from_u64(config.seed);
        spawner::spawn_initial(&mut state, &config, &mut rng);

        tracing::info!(
            "Simulation ready: {}x{} arena, {} Hz, seed {:#x}",
            border.width,
            border.height,
            config.tick_rate,
            config.seed
        );

        Ok(Self {
            tree: Quadtree::new(Aabb::new(Vec2::ZERO, Vec2::new(border.width, border.height))),
            events: EventQueue::new(),
            rng,
            ai: AiManager::new(),
            actions: ActionQueue::default(),
            performance: PerformanceMonitor::new(config.tick_rate),
            state,
            config,
        })
    }

    /// Add an externally controlled player with one starting cell
    pub fn add_player(&mut self, name: impl Into<String>, team_id: u32) -> PlayerKey {
        self.join(name.into(), team_id, Controller::External)
    }

    /// Add an AI-controlled player
    pub fn add_bot(&mut self, name: impl Into<String>, team_id: u32, strategy: Strategy) -> PlayerKey {
        let key = self.join(name.into(), team_id, Controller::Ai);
        self.ai.register_bot(key, strategy, self.config.ai_decision_interval);
        key
    }

    fn join(&mut self, name: String, team_id: u32, controller: Controller) -> PlayerKey {
        let key = self.state.add_player(team_id, name.clone(), controller);
        spawner::spawn_player(&mut self.state, key, &mut self.rng);
        self.events.push(GameEvent::PlayerJoined { player: key });
        tracing::info!("Player {} joined team {} as {:?} ({})", name, team_id, controller, key.owner_id);
        key
    }

    pub fn set_strategy(&mut self, player: PlayerKey, strategy: Strategy) -> bool {
        self.ai.set_strategy(player, strategy, &mut self.events)
    }

    pub fn set_model(&mut self, policy: ModelPolicy) {
        self.ai.set_model(policy);
    }

    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&GameEvent) + Send + 'static,
    {
        self.events.subscribe(callback);
    }

    /// Queue an action for the next tick
    pub fn submit(&self, player: PlayerKey, action: Action) -> Result<(), ActionQueueError> {
        self.actions.try_submit(player, action)
    }

    /// Sender for controllers on other threads
    pub fn action_sender(&self) -> ActionSender {
        self.actions.sender()
    }

    pub fn observe(&self, player: PlayerKey) -> Option<PlayerState> {
        observe_player(&self.state, player, &self.config)
    }

    pub fn observe_all(&self) -> Observation {
        observe_all(&self.state, &self.config)
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Direct registry access for scenario setup and tooling
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn ai(&self) -> &AiManager {
        &self.ai
    }

    pub fn performance(&self) -> &PerformanceMonitor {
        &self.performance
    }

    pub fn index_stats(&self) -> QuadtreeStats {
        self.tree.stats()
    }

    fn rebuild_index(&mut self) {
        self.tree.rebuild(self.state.live_entities().map(|e| SpatialEntity {
            id: e.id,
            position: e.position,
            radius: e.radius(),
        }));
    }

    /// Advance the arena by one tick
    pub fn tick(&mut self) -> TickSummary {
        self.performance.tick_start();
        let mut summary = TickSummary {
            tick: self.state.tick,
            ..Default::default()
        };

        // 1. External actions, then AI
        for message in self.actions.drain() {
            if self.state.get_player(message.player).is_none() {
                continue;
            }
            apply_action(&mut self.state, message.player, &message.action, &self.config, &mut self.events);
            summary.external_actions += 1;
        }
        if self.ai.bot_count() > 0 {
            self.rebuild_index();
            let decisions = self.ai.update(&self.state, &self.tree, &self.config, &mut self.rng);
            summary.ai_actions = decisions.len();
            for (player, action) in decisions {
                apply_action(&mut self.state, player, &action, &self.config, &mut self.events);
            }
        }

        // 2. Physics
        physics::update(&mut self.state, self.config.dt());

        // 3. Index
        self.rebuild_index();

        // 4. Collisions
        let outcome = collision::resolve(
            &mut self.state,
            &self.tree,
            CollisionRules::from(&self.config),
            &mut self.events,
        );
        summary.eaten = outcome.eaten;

        // 5. Lifecycle
        summary.lifecycle = lifecycle::update(
            &mut self.state,
            &outcome.thorn_splits,
            &outcome.merges,
            &self.config,
            &mut self.events,
        );

        // 6. Spawn, cleanup, respawn
        summary.spawn = spawner::update(&mut self.state, &self.config, &mut self.rng, &mut self.events);

        // 7. Sweep
        summary.removed = self.state.sweep();
        self.state.tick += 1;

        // 8. Events
        summary.events = self.events.drain();
        summary.duration = self.performance.tick_end(self.state.entities.len());

        tracing::debug!(
            tick = summary.tick,
            entities = self.state.entities.len(),
            events = summary.events.len(),
            "tick complete"
        );
        summary
    }
}

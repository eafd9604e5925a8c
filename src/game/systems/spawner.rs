//! Food / thorn spawning, stale food cleanup, player join and respawn

use rand::Rng;

use crate::config::ArenaConfig;
use crate::game::constants::mass::{CELL_INIT_MASS, FOOD_MASS};
use crate::game::constants::spawn::{MAX_SPAWN_ATTEMPTS, PLAYER_SAFE_DISTANCE, SAFE_MARGIN};
use crate::game::constants::{mass_to_radius, thorns};
use crate::game::events::{EventQueue, GameEvent};
use crate::game::state::{EntityId, EntityKind, GameState, KindTag, PlayerKey};
use crate::util::vec2::Vec2;

/// Counts of spawner work done in one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpawnSummary {
    pub food_spawned: usize,
    pub thorns_spawned: usize,
    pub food_retired: usize,
    pub eliminated: usize,
    pub respawned: usize,
}

/// Number of entities to add on a refresh: `ceil(percent * deficit)`, never past the max
pub fn refill_count(current: usize, max: usize, percent: f64) -> usize {
    let deficit = max.saturating_sub(current);
    if deficit == 0 {
        return 0;
    }
    ((percent * deficit as f64).ceil() as usize).min(deficit)
}

/// Random in-bounds position at least `clearance` clear of every live player
/// cell and thorn. Gives up after MAX_SPAWN_ATTEMPTS.
pub fn find_free_position<R: Rng>(
    state: &GameState,
    rng: &mut R,
    radius: f64,
    clearance: f64,
) -> Option<Vec2> {
    let occupied: Vec<(Vec2, f64)> = state
        .live_entities()
        .filter(|e| matches!(e.tag(), KindTag::PlayerCell | KindTag::Thorn))
        .map(|e| (e.position, e.radius()))
        .collect();

    for _ in 0..MAX_SPAWN_ATTEMPTS {
        let pos = state.border.random_position(rng, radius);
        let is_safe = occupied
            .iter()
            .all(|(p, r)| pos.distance_to(*p) >= r + radius + clearance);
        if is_safe {
            return Some(pos);
        }
    }
    None
}

fn spawn_food<R: Rng>(state: &mut GameState, rng: &mut R, count: usize) -> usize {
    let radius = mass_to_radius(FOOD_MASS);
    let mut spawned = 0;
    for _ in 0..count {
        // Starved spawns are skipped
        if let Some(pos) = find_free_position(state, rng, radius, SAFE_MARGIN) {
            state.add_food(pos);
            spawned += 1;
        }
    }
    spawned
}

fn spawn_thorns<R: Rng>(state: &mut GameState, rng: &mut R, count: usize) -> usize {
    let mut spawned = 0;
    for _ in 0..count {
        let mass = rng.gen_range(thorns::MIN_MASS..=thorns::MAX_MASS);
        if let Some(pos) = find_free_position(state, rng, mass_to_radius(mass), SAFE_MARGIN) {
            state.add_thorn(pos, mass);
            spawned += 1;
        }
    }
    spawned
}

/// Spawn the starting food and thorns
pub fn spawn_initial<R: Rng>(state: &mut GameState, config: &ArenaConfig, rng: &mut R) -> (usize, usize) {
    let food = spawn_food(state, rng, config.food_init.min(config.food_max));
    let thorns = spawn_thorns(state, rng, config.thorns_init.min(config.thorns_max));
    tracing::debug!("Spawned initial population: {} food, {} thorns", food, thorns);
    (food, thorns)
}

/// Retire at most `cleanup_batch` food older than `food_max_age`, oldest first
pub fn retire_stale_food(state: &mut GameState, config: &ArenaConfig) -> usize {
    let now = state.tick;
    let mut stale: Vec<(u64, EntityId)> = state
        .live_entities()
        .filter_map(|e| match &e.kind {
            EntityKind::Food(f) if now.saturating_sub(f.born_tick) > config.food_max_age => {
                Some((f.born_tick, e.id))
            }
            _ => None,
        })
        .collect();
    stale.sort_unstable();
    stale.truncate(config.cleanup_batch);
    for (_, id) in &stale {
        state.mark_removed(*id);
    }
    stale.len()
}

/// Give a player one starting cell at a position clear of other players
pub fn spawn_player<R: Rng>(state: &mut GameState, player: PlayerKey, rng: &mut R) -> EntityId {
    let radius = mass_to_radius(CELL_INIT_MASS);
    let pos = find_free_position(state, rng, radius, PLAYER_SAFE_DISTANCE)
        .or_else(|| find_free_position(state, rng, radius, 0.0))
        .unwrap_or_else(|| state.border.random_position(rng, radius));
    state.add_cell(player, pos, CELL_INIT_MASS, None)
}

/// Flag players whose group has no live cells and schedule their respawn
pub fn mark_eliminated(state: &mut GameState, config: &ArenaConfig, events: &mut EventQueue) -> usize {
    let now = state.tick;
    let mut eliminated = 0;
    for key in state.player_keys_sorted() {
        let empty = state.group_size(key) == 0;
        let Some(record) = state.get_player_mut(key) else {
            continue;
        };
        if empty && !record.eliminated {
            record.eliminated = true;
            record.respawn_at = config.respawn_delay.map(|d| now.saturating_add(d));
            tracing::info!("Player {} ({}) eliminated", record.name, key.owner_id);
            events.push(GameEvent::PlayerEliminated { player: key });
            eliminated += 1;
        }
    }
    eliminated
}

/// Respawn eliminated players whose timer has run out
pub fn respawn_due<R: Rng>(state: &mut GameState, rng: &mut R, events: &mut EventQueue) -> usize {
    let now = state.tick;
    let due: Vec<PlayerKey> = state
        .player_keys_sorted()
        .into_iter()
        .filter(|k| {
            state
                .get_player(*k)
                .is_some_and(|r| r.eliminated && r.respawn_at.is_some_and(|t| t <= now))
        })
        .collect();

    for key in &due {
        spawn_player(state, *key, rng);
        if let Some(record) = state.get_player_mut(*key) {
            record.eliminated = false;
            record.respawn_at = None;
            tracing::info!("Player {} ({}) respawned", record.name, key.owner_id);
        }
        events.push(GameEvent::PlayerRespawned { player: *key });
    }
    due.len()
}

/// Spawner phase of a tick
pub fn update<R: Rng>(
    state: &mut GameState,
    config: &ArenaConfig,
    rng: &mut R,
    events: &mut EventQueue,
) -> SpawnSummary {
    let tick = state.tick;
    let mut summary = SpawnSummary {
        eliminated: mark_eliminated(state, config, events),
        respawned: respawn_due(state, rng, events),
        ..Default::default()
    };

    if tick % config.food_refresh_frames.max(1) == 0 {
        let current = state.count_kind(KindTag::Food);
        let count = refill_count(current, config.food_max, config.food_refresh_percent);
        summary.food_spawned = spawn_food(state, rng, count);
    }

    if tick % config.thorns_refresh_frames.max(1) == 0 {
        let current = state.count_kind(KindTag::Thorn);
        let count = refill_count(current, config.thorns_max, config.thorns_refresh_percent);
        summary.thorns_spawned = spawn_thorns(state, rng, count);
    }

    if tick % config.cleanup_interval.max(1) == 0 {
        summary.food_retired = retire_stale_food(state, config);
        if summary.food_retired > 0 {
            events.push(GameEvent::FoodRetired {
                count: summary.food_retired,
            });
        }
    }

    if summary.food_spawned + summary.thorns_spawned + summary.food_retired > 0 {
        tracing::debug!(
            "Spawner tick {}: +{} food, +{} thorns, -{} stale food",
            tick,
            summary.food_spawned,
            summary.thorns_spawned,
            summary.food_retired
        );
    }
    summary
}

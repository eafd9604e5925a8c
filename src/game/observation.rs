//! Fixed-shape observations for external controllers
//!
//! Every list has a fixed capacity: entries are sorted by distance from the
//! player's mass centroid, truncated, then zero-padded. Positions are relative
//! to that centroid.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ArenaConfig;
use crate::game::constants::mass_to_radius;
use crate::game::constants::observation::{
    CLONE_CAP, FOOD_CAP, SPORE_CAP, THORNS_CAP, VIEW_BASE, VIEW_MASS_SCALE,
};
use crate::game::spatial::Aabb;
use crate::game::state::{Border, Entity, GameState, KindTag, PlayerKey};
use crate::game::systems::lifecycle::{can_eject, can_split};
use crate::util::vec2::Vec2;

/// Floats per food / thorn / spore entry: x, y, radius
pub const SMALL_ENTRY_LEN: usize = 3;
/// Floats per clone entry: x, y, radius, vx, vy, own, ally
pub const CLONE_ENTRY_LEN: usize = 7;
/// Length of `PlayerState::to_features`
pub const FEATURE_LEN: usize = 4
    + (FOOD_CAP + THORNS_CAP + SPORE_CAP) * SMALL_ENTRY_LEN
    + CLONE_CAP * CLONE_ENTRY_LEN
    + 3;

/// Arena-wide state shared by all players
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalState {
    pub border: Border,
    pub total_frame: u64,
    /// Team id to summed live mass
    pub leaderboard: BTreeMap<u32, f64>,
}

impl GlobalState {
    pub fn capture(state: &GameState) -> Self {
        Self {
            border: state.border,
            total_frame: state.tick,
            leaderboard: state.team_scores(),
        }
    }
}

/// One observed entity; all-zero when used as padding
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedEntity {
    /// Position relative to the observer's centroid
    pub position: Vec2,
    pub radius: f64,
    pub velocity: Vec2,
    /// Cell belongs to the observer
    pub own: bool,
    /// Cell belongs to a teammate
    pub ally: bool,
}

impl ObservedEntity {
    fn write_small(&self, out: &mut Vec<f32>) {
        out.extend([self.position.x as f32, self.position.y as f32, self.radius as f32]);
    }

    fn write_clone(&self, out: &mut Vec<f32>) {
        self.write_small(out);
        out.extend([
            self.velocity.x as f32,
            self.velocity.y as f32,
            f32::from(u8::from(self.own)),
            f32::from(u8::from(self.ally)),
        ]);
    }
}

/// Per-player observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub view_rectangle: Aabb,
    pub food: Vec<ObservedEntity>,
    pub thorns: Vec<ObservedEntity>,
    pub spore: Vec<ObservedEntity>,
    pub clone: Vec<ObservedEntity>,
    pub score: f64,
    pub can_eject: bool,
    pub can_split: bool,
}

impl PlayerState {
    /// Flatten into a feature vector of exactly `FEATURE_LEN` floats
    pub fn to_features(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(FEATURE_LEN);
        let rect = self.view_rectangle;
        out.extend([rect.min.x as f32, rect.min.y as f32, rect.max.x as f32, rect.max.y as f32]);
        for list in [&self.food, &self.thorns, &self.spore] {
            for entry in list {
                entry.write_small(&mut out);
            }
        }
        for entry in &self.clone {
            entry.write_clone(&mut out);
        }
        out.extend([
            self.score as f32,
            f32::from(u8::from(self.can_eject)),
            f32::from(u8::from(self.can_split)),
        ]);
        out
    }
}

/// Full observation for every player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub global: GlobalState,
    pub players: BTreeMap<PlayerKey, PlayerState>,
}

impl Observation {
    pub fn encode(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::error::DecodeError> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard()).map(|(obs, _)| obs)
    }
}

/// View rectangle around a group: spread plus a mass-dependent margin
fn view_rect(centroid: Vec2, cells: &[&Entity], total_mass: f64) -> Aabb {
    let spread = cells
        .iter()
        .map(|e| e.position.distance_to(centroid) + e.radius())
        .fold(0.0, f64::max);
    let half = spread + VIEW_BASE + VIEW_MASS_SCALE * mass_to_radius(total_mass);
    Aabb::from_circle(centroid, half)
}

fn sorted_padded(mut items: Vec<(f64, u64, ObservedEntity)>, cap: usize) -> Vec<ObservedEntity> {
    items.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    let mut out: Vec<ObservedEntity> = items.into_iter().take(cap).map(|(_, _, e)| e).collect();
    out.resize(cap, ObservedEntity::default());
    out
}

/// Observation for one player. `None` for an unknown player; an eliminated
/// player gets an empty view at the arena center.
pub fn observe_player(state: &GameState, player: PlayerKey, config: &ArenaConfig) -> Option<PlayerState> {
    state.get_player(player)?;
    let cells: Vec<&Entity> = state
        .group_cells(player)
        .iter()
        .filter_map(|id| state.get(*id))
        .collect();
    let score: f64 = cells.iter().map(|e| e.mass()).sum();
    let centroid = state.group_centroid(player).unwrap_or_else(|| state.border.center());
    let view = if cells.is_empty() {
        Aabb::from_circle(centroid, VIEW_BASE)
    } else {
        view_rect(centroid, &cells, score)
    };

    let mut food = Vec::new();
    let mut thorns = Vec::new();
    let mut spore = Vec::new();
    let mut clone = Vec::new();
    if !cells.is_empty() {
        for e in state.live_entities() {
            if !view.intersects(&Aabb::from_circle(e.position, e.radius())) {
                continue;
            }
            let relative = e.position - centroid;
            let mut observed = ObservedEntity {
                position: relative,
                radius: e.radius(),
                ..Default::default()
            };
            let key = (relative.length(), e.id);
            match e.tag() {
                KindTag::Food => food.push((key.0, key.1, observed)),
                KindTag::Thorn => thorns.push((key.0, key.1, observed)),
                KindTag::Spore => spore.push((key.0, key.1, observed)),
                KindTag::PlayerCell => {
                    let owner = e.player();
                    observed.velocity = e.velocity;
                    observed.own = owner == Some(player);
                    observed.ally = owner.is_some_and(|o| o != player && o.team_id == player.team_id);
                    clone.push((key.0, key.1, observed));
                }
            }
        }
    }

    Some(PlayerState {
        view_rectangle: view,
        food: sorted_padded(food, FOOD_CAP),
        thorns: sorted_padded(thorns, THORNS_CAP),
        spore: sorted_padded(spore, SPORE_CAP),
        clone: sorted_padded(clone, CLONE_CAP),
        score,
        can_eject: cells.iter().any(|e| can_eject(e, config)),
        can_split: cells.iter().any(|e| can_split(state, e.id, config)),
    })
}

/// Global state plus every player's observation
pub fn observe_all(state: &GameState, config: &ArenaConfig) -> Observation {
    let players = state
        .player_keys_sorted()
        .into_iter()
        .filter_map(|key| observe_player(state, key, config).map(|obs| (key, obs)))
        .collect();
    Observation {
        global: GlobalState::capture(state),
        players,
    }
}

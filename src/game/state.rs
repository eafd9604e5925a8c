//! Game state definitions and structures
//!
//! Contains the entity registry (player cells, food, spores, thorns), the
//! per-player records and the arena border. Every cross reference between
//! entities is an [`EntityId`] resolved through [`GameState`], so a removed
//! entity simply resolves to `None`.

use rand::Rng;
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

use crate::game::constants::{mass, mass_to_radius};
use crate::util::vec2::Vec2;

/// Entity identifier, monotonically assigned by the registry
pub type EntityId = u64;

/// Hash map with a fixed hasher so iteration order is reproducible across runs
pub type FxMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;

/// Inline storage for a player's cell ids
pub type CellIds = SmallVec<[EntityId; 16]>;

/// Identity of a controlled group of cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerKey {
    pub team_id: u32,
    pub owner_id: u32,
}

impl PlayerKey {
    pub const fn new(team_id: u32, owner_id: u32) -> Self {
        Self { team_id, owner_id }
    }
}

/// Velocity that decays linearly to zero over a fixed number of ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Drift {
    initial: Vec2,
    frames_total: u32,
    frames_left: u32,
}

impl Drift {
    pub fn new(initial: Vec2, frames: u32) -> Self {
        Self {
            initial,
            frames_total: frames,
            frames_left: frames,
        }
    }

    /// Velocity contributed this tick
    pub fn current(&self) -> Vec2 {
        if self.frames_total == 0 {
            return Vec2::ZERO;
        }
        self.initial * (self.frames_left as f64 / self.frames_total as f64)
    }

    pub fn is_active(&self) -> bool {
        self.frames_left > 0
    }

    /// Step one tick toward zero
    pub fn advance(&mut self) {
        self.frames_left = self.frames_left.saturating_sub(1);
    }
}

/// Per-cell split/merge state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SplitState {
    #[default]
    Unified,
    JustSplit,
    MergeEligible,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellData {
    pub player: PlayerKey,
    /// Current movement intent, unit length or zero
    pub direction: Vec2,
    pub boost: Drift,
    pub split_state: SplitState,
    /// Ticks since last split or merge
    pub merge_cooldown: u32,
    pub parent: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodData {
    pub born_tick: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SporeData {
    pub player: PlayerKey,
    /// Ticks since ejection
    pub age: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThornData {
    pub drift: Drift,
}

/// Kind-specific entity data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityKind {
    PlayerCell(CellData),
    Food(FoodData),
    Spore(SporeData),
    Thorn(ThornData),
}

/// Discriminant of [`EntityKind`], used to key the interaction table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KindTag {
    PlayerCell,
    Food,
    Spore,
    Thorn,
}

impl KindTag {
    pub const COUNT: usize = 4;

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Simulated entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub position: Vec2,
    pub velocity: Vec2,
    mass: f64,
    radius: f64,
    /// Soft-delete flag, cleared only by the end-of-tick sweep
    pub removed: bool,
}

impl Entity {
    pub fn new(id: EntityId, kind: EntityKind, position: Vec2, mass: f64) -> Self {
        let mass = mass.max(mass::MIN_MASS);
        Self {
            id,
            kind,
            position,
            velocity: Vec2::ZERO,
            mass,
            radius: mass_to_radius(mass),
            removed: false,
        }
    }

    #[inline]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Set mass (floored at MIN_MASS) and recompute radius
    pub fn set_mass(&mut self, mass: f64) {
        self.mass = if mass.is_finite() {
            mass.max(mass::MIN_MASS)
        } else {
            mass::MIN_MASS
        };
        self.radius = mass_to_radius(self.mass);
    }

    pub fn add_mass(&mut self, delta: f64) {
        self.set_mass(self.mass + delta);
    }

    pub fn tag(&self) -> KindTag {
        match self.kind {
            EntityKind::PlayerCell(_) => KindTag::PlayerCell,
            EntityKind::Food(_) => KindTag::Food,
            EntityKind::Spore(_) => KindTag::Spore,
            EntityKind::Thorn(_) => KindTag::Thorn,
        }
    }

    /// Owning player, for cells and spores
    pub fn player(&self) -> Option<PlayerKey> {
        match &self.kind {
            EntityKind::PlayerCell(c) => Some(c.player),
            EntityKind::Spore(s) => Some(s.player),
            _ => None,
        }
    }

    pub fn as_cell(&self) -> Option<&CellData> {
        match &self.kind {
            EntityKind::PlayerCell(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_cell_mut(&mut self) -> Option<&mut CellData> {
        match &mut self.kind {
            EntityKind::PlayerCell(c) => Some(c),
            _ => None,
        }
    }

    /// Whether this entity can move this tick and so initiates collision checks
    pub fn is_mover(&self) -> bool {
        match &self.kind {
            EntityKind::PlayerCell(_) | EntityKind::Spore(_) => true,
            EntityKind::Thorn(t) => t.drift.is_active(),
            EntityKind::Food(_) => false,
        }
    }
}

/// Who drives a player's actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Controller {
    External,
    Ai,
}

/// Per-player bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub key: PlayerKey,
    pub name: String,
    pub controller: Controller,
    /// Weak ids of this player's cells; pruned by the sweep
    pub cells: CellIds,
    pub eliminated: bool,
    /// Tick at which an eliminated player respawns
    pub respawn_at: Option<u64>,
}

impl PlayerRecord {
    pub fn new(key: PlayerKey, name: String, controller: Controller) -> Self {
        Self {
            key,
            name,
            controller,
            cells: CellIds::new(),
            eliminated: false,
            respawn_at: None,
        }
    }
}

/// Rectangular arena spanning [0, width] x [0, height]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Border {
    pub width: f64,
    pub height: f64,
}

impl Border {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= 0.0 && p.x <= self.width && p.y >= 0.0 && p.y <= self.height
    }

    /// Clamp a position into the arena; returns whether x and y were clamped
    pub fn clamp(&self, p: Vec2) -> (Vec2, bool, bool) {
        let x = p.x.clamp(0.0, self.width);
        let y = p.y.clamp(0.0, self.height);
        (Vec2::new(x, y), x != p.x, y != p.y)
    }

    /// Uniform random point keeping `margin` away from the edges when possible
    pub fn random_position<R: Rng>(&self, rng: &mut R, margin: f64) -> Vec2 {
        let mx = margin.min(self.width / 2.0).max(0.0);
        let my = margin.min(self.height / 2.0).max(0.0);
        let x = if self.width - mx > mx {
            rng.gen_range(mx..self.width - mx)
        } else {
            self.width / 2.0
        };
        let y = if self.height - my > my {
            rng.gen_range(my..self.height - my)
        } else {
            self.height / 2.0
        };
        Vec2::new(x, y)
    }
}

impl Default for Border {
    fn default() -> Self {
        Self::new(1000.0, 1000.0)
    }
}

/// Canonical entity registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameState {
    pub tick: u64,
    pub border: Border,
    pub entities: FxMap<EntityId, Entity>,
    pub players: FxMap<PlayerKey, PlayerRecord>,
    next_entity_id: EntityId,
    next_owner_id: u32,
}

impl GameState {
    pub fn new(border: Border) -> Self {
        Self {
            border,
            next_entity_id: 1,
            ..Default::default()
        }
    }

    /// Generate a new unique entity ID
    pub fn next_entity_id(&mut self) -> EntityId {
        // Default-constructed states start at 0; keep 0 unused
        self.next_entity_id = self.next_entity_id.max(1);
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    /// Live entity by id; removed entities resolve to None
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id).filter(|e| !e.removed)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id).filter(|e| !e.removed)
    }

    pub fn live_entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(|e| !e.removed)
    }

    /// Ids of live entities in ascending order
    pub fn live_ids_sorted(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.live_entities().map(|e| e.id).collect();
        ids.sort_unstable();
        ids
    }

    pub fn count_kind(&self, tag: KindTag) -> usize {
        self.live_entities().filter(|e| e.tag() == tag).count()
    }

    fn insert(&mut self, kind: EntityKind, position: Vec2, mass: f64) -> EntityId {
        let id = self.next_entity_id();
        let (position, _, _) = self.border.clamp(position);
        self.entities.insert(id, Entity::new(id, kind, position, mass));
        id
    }

    pub fn add_food(&mut self, position: Vec2) -> EntityId {
        let kind = EntityKind::Food(FoodData {
            born_tick: self.tick,
        });
        self.insert(kind, position, mass::FOOD_MASS)
    }

    pub fn add_thorn(&mut self, position: Vec2, mass: f64) -> EntityId {
        self.insert(EntityKind::Thorn(ThornData::default()), position, mass)
    }

    pub fn add_spore(&mut self, player: PlayerKey, position: Vec2, velocity: Vec2, mass: f64) -> EntityId {
        let id = self.insert(EntityKind::Spore(SporeData { player, age: 0 }), position, mass);
        if let Some(e) = self.entities.get_mut(&id) {
            e.velocity = velocity;
        }
        id
    }

    /// Add a player cell and link it into the player's cell list
    pub fn add_cell(&mut self, player: PlayerKey, position: Vec2, mass: f64, parent: Option<EntityId>) -> EntityId {
        let kind = EntityKind::PlayerCell(CellData {
            player,
            direction: Vec2::ZERO,
            boost: Drift::default(),
            split_state: SplitState::Unified,
            merge_cooldown: 0,
            parent,
        });
        let id = self.insert(kind, position, mass);
        if let Some(record) = self.players.get_mut(&player) {
            record.cells.push(id);
        }
        id
    }

    /// Register a player and return its key
    pub fn add_player(&mut self, team_id: u32, name: String, controller: Controller) -> PlayerKey {
        let key = PlayerKey::new(team_id, self.next_owner_id);
        self.next_owner_id += 1;
        self.players.insert(key, PlayerRecord::new(key, name, controller));
        key
    }

    pub fn get_player(&self, key: PlayerKey) -> Option<&PlayerRecord> {
        self.players.get(&key)
    }

    pub fn get_player_mut(&mut self, key: PlayerKey) -> Option<&mut PlayerRecord> {
        self.players.get_mut(&key)
    }

    /// Player keys in ascending order
    pub fn player_keys_sorted(&self) -> Vec<PlayerKey> {
        let mut keys: Vec<PlayerKey> = self.players.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Live cell ids of a player's group
    pub fn group_cells(&self, key: PlayerKey) -> CellIds {
        self.players
            .get(&key)
            .map(|r| r.cells.iter().copied().filter(|id| self.get(*id).is_some()).collect())
            .unwrap_or_default()
    }

    pub fn group_size(&self, key: PlayerKey) -> usize {
        self.group_cells(key).len()
    }

    /// Total mass of a player's live cells
    pub fn group_mass(&self, key: PlayerKey) -> f64 {
        self.group_cells(key)
            .iter()
            .filter_map(|id| self.get(*id))
            .map(|e| e.mass())
            .sum()
    }

    /// Mass-weighted centroid of a player's live cells
    pub fn group_centroid(&self, key: PlayerKey) -> Option<Vec2> {
        let mut total = 0.0;
        let mut acc = Vec2::ZERO;
        for e in self.group_cells(key).iter().filter_map(|id| self.get(*id)) {
            acc += e.position * e.mass();
            total += e.mass();
        }
        (total > 0.0).then(|| acc / total)
    }

    /// Heaviest live cell of a group; ties go to the lower id
    pub fn largest_cell(&self, key: PlayerKey) -> Option<EntityId> {
        self.group_cells(key)
            .iter()
            .filter_map(|id| self.get(*id))
            .max_by(|a, b| a.mass().total_cmp(&b.mass()).then(b.id.cmp(&a.id)))
            .map(|e| e.id)
    }

    /// Flag an entity removed; returns false if it was already gone
    pub fn mark_removed(&mut self, id: EntityId) -> bool {
        match self.entities.get_mut(&id) {
            Some(e) if !e.removed => {
                e.removed = true;
                true
            }
            _ => false,
        }
    }

    /// Physically delete removed entities and prune player cell lists.
    /// Returns the number of entities deleted.
    pub fn sweep(&mut self) -> usize {
        let before = self.entities.len();
        self.entities.retain(|_, e| !e.removed);
        let entities = &self.entities;
        for record in self.players.values_mut() {
            record.cells.retain(|id| entities.contains_key(id));
        }
        before - self.entities.len()
    }

    /// Score per team, summed over the team's live cells
    pub fn team_scores(&self) -> BTreeMap<u32, f64> {
        let mut scores = BTreeMap::new();
        for record in self.players.values() {
            *scores.entry(record.key.team_id).or_insert(0.0) += self.group_mass(record.key);
        }
        scores
    }

    /// Players ordered by group mass, heaviest first
    pub fn leaderboard(&self) -> Vec<(PlayerKey, f64)> {
        let mut board: Vec<(PlayerKey, f64)> = self
            .player_keys_sorted()
            .into_iter()
            .map(|k| (k, self.group_mass(k)))
            .collect();
        board.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        board
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::radius_to_mass;

    fn state() -> GameState {
        GameState::new(Border::new(1000.0, 1000.0))
    }

    #[test]
    fn test_entity_ids_monotonic() {
        let mut gs = state();
        let a = gs.next_entity_id();
        let b = gs.next_entity_id();
        assert!(a >= 1);
        assert_eq!(b, a + 1);
    }

    #[test]
    fn test_set_mass_recomputes_radius() {
        let mut e = Entity::new(1, EntityKind::Food(FoodData { born_tick: 0 }), Vec2::ZERO, 100.0);
        e.set_mass(2500.0);
        assert_eq!(e.radius(), mass_to_radius(2500.0));
        assert!((radius_to_mass(e.radius()) - 2500.0).abs() < 1e-6);
    }

    #[test]
    fn test_set_mass_floors_at_min() {
        let mut e = Entity::new(1, EntityKind::Food(FoodData { born_tick: 0 }), Vec2::ZERO, 100.0);
        e.set_mass(5.0);
        assert_eq!(e.mass(), mass::MIN_MASS);
        e.set_mass(f64::NAN);
        assert_eq!(e.mass(), mass::MIN_MASS);
        let fresh = Entity::new(2, EntityKind::Thorn(ThornData::default()), Vec2::ZERO, -3.0);
        assert_eq!(fresh.mass(), mass::MIN_MASS);
    }

    #[test]
    fn test_drift_decays_linearly() {
        let mut d = Drift::new(Vec2::new(100.0, 0.0), 4);
        assert_eq!(d.current(), Vec2::new(100.0, 0.0));
        d.advance();
        assert_eq!(d.current(), Vec2::new(75.0, 0.0));
        d.advance();
        d.advance();
        d.advance();
        assert!(!d.is_active());
        assert_eq!(d.current(), Vec2::ZERO);
        d.advance();
        assert_eq!(d.current(), Vec2::ZERO);
    }

    #[test]
    fn test_removed_entity_resolves_to_none() {
        let mut gs = state();
        let id = gs.add_food(Vec2::new(10.0, 10.0));
        assert!(gs.get(id).is_some());
        assert!(gs.mark_removed(id));
        assert!(gs.get(id).is_none());
        assert!(!gs.mark_removed(id));
        // Still physically present until the sweep
        assert!(gs.entities.contains_key(&id));
        assert_eq!(gs.sweep(), 1);
        assert!(!gs.entities.contains_key(&id));
    }

    #[test]
    fn test_add_cell_links_player() {
        let mut gs = state();
        let key = gs.add_player(3, "bot".into(), Controller::Ai);
        let a = gs.add_cell(key, Vec2::new(100.0, 100.0), 1000.0, None);
        let b = gs.add_cell(key, Vec2::new(110.0, 100.0), 500.0, Some(a));
        assert_eq!(gs.group_cells(key).as_slice(), &[a, b]);
        assert_eq!(gs.group_mass(key), 1500.0);
        assert_eq!(gs.largest_cell(key), Some(a));
        assert_eq!(gs.get(b).and_then(|e| e.as_cell()).and_then(|c| c.parent), Some(a));
    }

    #[test]
    fn test_sweep_prunes_cell_lists() {
        let mut gs = state();
        let key = gs.add_player(0, "p".into(), Controller::External);
        let a = gs.add_cell(key, Vec2::new(100.0, 100.0), 1000.0, None);
        let b = gs.add_cell(key, Vec2::new(200.0, 100.0), 1000.0, None);
        gs.mark_removed(a);
        // Removed but unswept cells are already excluded from the group
        assert_eq!(gs.group_cells(key).as_slice(), &[b]);
        gs.sweep();
        assert_eq!(gs.get_player(key).map(|r| r.cells.len()), Some(1));
    }

    #[test]
    fn test_group_centroid_is_mass_weighted() {
        let mut gs = state();
        let key = gs.add_player(0, "p".into(), Controller::External);
        gs.add_cell(key, Vec2::new(100.0, 100.0), 3000.0, None);
        gs.add_cell(key, Vec2::new(200.0, 100.0), 1000.0, None);
        let c = gs.group_centroid(key).unwrap();
        assert!(c.approx_eq(Vec2::new(125.0, 100.0), 1e-9));
    }

    #[test]
    fn test_border_clamp_reports_axes() {
        let border = Border::new(100.0, 50.0);
        let (p, cx, cy) = border.clamp(Vec2::new(-5.0, 20.0));
        assert_eq!(p, Vec2::new(0.0, 20.0));
        assert!(cx);
        assert!(!cy);
        assert!(border.contains(p));
    }

    #[test]
    fn test_insert_clamps_to_border() {
        let mut gs = state();
        let id = gs.add_food(Vec2::new(5000.0, -10.0));
        assert_eq!(gs.get(id).map(|e| e.position), Some(Vec2::new(1000.0, 0.0)));
    }

    #[test]
    fn test_team_scores_and_leaderboard() {
        let mut gs = state();
        let a = gs.add_player(1, "a".into(), Controller::Ai);
        let b = gs.add_player(1, "b".into(), Controller::Ai);
        let c = gs.add_player(2, "c".into(), Controller::Ai);
        gs.add_cell(a, Vec2::new(10.0, 10.0), 1000.0, None);
        gs.add_cell(b, Vec2::new(50.0, 10.0), 2000.0, None);
        gs.add_cell(c, Vec2::new(90.0, 10.0), 4000.0, None);
        let scores = gs.team_scores();
        assert_eq!(scores.get(&1), Some(&3000.0));
        assert_eq!(scores.get(&2), Some(&4000.0));
        let board = gs.leaderboard();
        assert_eq!(board[0].0, c);
        assert_eq!(board[2].0, a);
    }

    #[test]
    fn test_is_mover() {
        let mut gs = state();
        let food = gs.add_food(Vec2::new(1.0, 1.0));
        let thorn = gs.add_thorn(Vec2::new(1.0, 1.0), 10_000.0);
        assert!(!gs.get(food).unwrap().is_mover());
        assert!(!gs.get(thorn).unwrap().is_mover());
        if let Some(EntityKind::Thorn(t)) = gs.get_mut(thorn).map(|e| &mut e.kind) {
            t.drift = Drift::new(Vec2::new(1.0, 0.0), 10);
        }
        assert!(gs.get(thorn).unwrap().is_mover());
    }

    #[test]
    fn test_serialization() {
        let mut gs = state();
        let key = gs.add_player(0, "p".into(), Controller::External);
        gs.add_cell(key, Vec2::new(100.0, 100.0), 1000.0, None);
        gs.add_food(Vec2::new(5.0, 5.0));
        let encoded = bincode::serde::encode_to_vec(&gs, bincode::config::standard()).unwrap();
        let (decoded, _): (GameState, usize) =
            bincode::serde::decode_from_slice(&encoded, bincode::config::standard()).unwrap();
        assert_eq!(decoded.entities.len(), 2);
        assert_eq!(decoded.group_mass(key), 1000.0);
    }
}

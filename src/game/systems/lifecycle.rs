//! Split / merge / eject state machine
//!
//! Per cell: `Unified -> JustSplit -> MergeEligible -> Unified` (on merge).
//! Every transition is guarded by a `can_*` precondition; a failed check is a
//! no-op rather than an error.

use hashbrown::HashSet;
use rustc_hash::FxBuildHasher;

use crate::config::ArenaConfig;
use crate::game::constants::lifecycle::{RECOMBINE_RADIUS, SPLIT_BOOST_FRAMES, SPLIT_BOOST_SPEED};
use crate::game::constants::mass::MIN_MASS;
use crate::game::constants::spore::{EJECT_MARGIN, EJECT_PERCENT, SPORE_MASS, SPORE_SPEED};
use crate::game::constants::{mass_to_radius, thorns};
use crate::game::events::{EventQueue, GameEvent};
use crate::game::state::{Drift, Entity, EntityId, GameState, PlayerKey, SplitState};
use crate::util::vec2::Vec2;

/// Counts of lifecycle work done in one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleSummary {
    pub thorn_splits: usize,
    pub merges: usize,
    pub decayed: usize,
}

/// A cell that absorbed a thorn; the thorn's mass is the budget for the pieces
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThornSplit {
    pub cell: EntityId,
    pub budget: f64,
}

/// A cell may split when heavy enough and its group has room
pub fn can_split(state: &GameState, cell: EntityId, config: &ArenaConfig) -> bool {
    let Some(e) = state.get(cell) else {
        return false;
    };
    let Some(data) = e.as_cell() else {
        return false;
    };
    e.mass() >= config.split_min_mass
        && e.mass() / 2.0 >= MIN_MASS
        && state.group_size(data.player) < config.max_split_count
}

pub fn can_eject(cell: &Entity, config: &ArenaConfig) -> bool {
    cell.as_cell().is_some()
        && cell.mass() >= config.eject_min_mass
        && cell.mass() - eject_amount(cell.mass()) >= MIN_MASS
}

/// Mass carried away by one eject
#[inline]
pub fn eject_amount(mass: f64) -> f64 {
    (mass * EJECT_PERCENT).max(SPORE_MASS)
}

/// Same owner, both cooldowns elapsed, and within the recombine distance
pub fn can_merge_with(a: &Entity, b: &Entity, merge_delay: u32) -> bool {
    let (Some(ca), Some(cb)) = (a.as_cell(), b.as_cell()) else {
        return false;
    };
    a.id != b.id
        && ca.player == cb.player
        && ca.merge_cooldown >= merge_delay
        && cb.merge_cooldown >= merge_delay
        && a.position.distance_to(b.position) <= (a.radius() + b.radius()) * RECOMBINE_RADIUS
}

/// Direction to split/eject along: the requested one, else the cell's own heading
fn resolve_direction(requested: Vec2, cell: &Entity) -> Vec2 {
    let heading = cell
        .as_cell()
        .map(|c| c.direction)
        .unwrap_or(Vec2::ZERO)
        .normalize_or(cell.velocity.normalize_or(Vec2::RIGHT));
    requested.normalize_or(heading)
}

fn mark_just_split(cell: &mut Entity, boost: Vec2) {
    if let Some(data) = cell.as_cell_mut() {
        data.split_state = SplitState::JustSplit;
        data.merge_cooldown = 0;
        data.boost = Drift::new(boost, SPLIT_BOOST_FRAMES);
    }
}

/// Split one cell in two along `direction`. Returns the sibling id.
pub fn split_cell(
    state: &mut GameState,
    cell: EntityId,
    direction: Vec2,
    config: &ArenaConfig,
    events: &mut EventQueue,
) -> Option<EntityId> {
    if !can_split(state, cell, config) {
        return None;
    }
    let source = state.get(cell)?;
    let player = source.as_cell()?.player;
    let dir = resolve_direction(direction, source);
    let half = source.mass() / 2.0;
    let offset = dir * (2.0 * mass_to_radius(half));
    let (position, velocity) = (source.position, source.velocity);

    if let Some(e) = state.get_mut(cell) {
        e.set_mass(half);
        mark_just_split(e, -dir * SPLIT_BOOST_SPEED);
    }

    let sibling = state.add_cell(player, position + offset, half, Some(cell));
    if let Some(e) = state.get_mut(sibling) {
        e.velocity = velocity;
        mark_just_split(e, dir * SPLIT_BOOST_SPEED);
        if let Some(data) = e.as_cell_mut() {
            data.direction = dir;
        }
    }

    events.push(GameEvent::Split {
        player,
        source: cell,
        sibling,
    });
    Some(sibling)
}

/// Split every cell of a group, heaviest first, while the group has room
pub fn split_group(
    state: &mut GameState,
    player: PlayerKey,
    direction: Vec2,
    config: &ArenaConfig,
    events: &mut EventQueue,
) -> Vec<EntityId> {
    let mut cells: Vec<(EntityId, f64)> = state
        .group_cells(player)
        .iter()
        .filter_map(|id| state.get(*id).map(|e| (e.id, e.mass())))
        .collect();
    cells.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut created = Vec::new();
    for (id, _) in cells {
        if state.group_size(player) >= config.max_split_count {
            break;
        }
        if let Some(sibling) = split_cell(state, id, direction, config, events) {
            created.push(sibling);
        }
    }
    created
}

/// Burst a cell that absorbed a thorn into radially arranged pieces whose
/// combined mass comes out of `budget`. Budget left over by the piece cap stays
/// with the source. Returns the number of pieces created.
pub fn thorns_split(
    state: &mut GameState,
    cell: EntityId,
    budget: f64,
    config: &ArenaConfig,
    events: &mut EventQueue,
) -> usize {
    let Some(source) = state.get(cell) else {
        return 0;
    };
    let Some(player) = source.as_cell().map(|c| c.player) else {
        return 0;
    };
    let total = source.mass();
    // The source keeps at least the mass floor
    let budget = budget.min(total - MIN_MASS);
    if budget < MIN_MASS {
        return 0;
    }
    let room = config
        .max_split_count
        .saturating_sub(state.group_size(player));
    // No piece below the mass floor
    let n = thorns::SPLIT_MAX
        .min(room)
        .min((budget / MIN_MASS).floor() as usize);
    if n == 0 {
        return 0;
    }

    let piece = (budget / n as f64).min(thorns::SPLIT_MAX_SCORE);
    let remainder = total - piece * n as f64;
    let center = source.position;
    let base_angle = source.velocity.normalize_or(Vec2::RIGHT).angle();
    let reach = mass_to_radius(remainder) + mass_to_radius(piece);

    if let Some(e) = state.get_mut(cell) {
        e.set_mass(remainder);
        mark_just_split(e, Vec2::ZERO);
    }

    let step = std::f64::consts::TAU / n as f64;
    for i in 0..n {
        let dir = Vec2::from_angle(base_angle + step * i as f64);
        let id = state.add_cell(player, center + dir * reach, piece, Some(cell));
        if let Some(e) = state.get_mut(id) {
            mark_just_split(e, dir * thorns::SPLIT_BOOST_SPEED);
            if let Some(data) = e.as_cell_mut() {
                data.direction = dir;
            }
        }
    }

    events.push(GameEvent::ThornsSplit {
        player,
        source: cell,
        pieces: n,
    });
    n
}

/// Eject a spore from one cell. Returns the spore id.
pub fn eject_cell(
    state: &mut GameState,
    cell: EntityId,
    direction: Vec2,
    config: &ArenaConfig,
    events: &mut EventQueue,
) -> Option<EntityId> {
    let source = state.get(cell)?;
    if !can_eject(source, config) {
        return None;
    }
    let player = source.as_cell()?.player;
    let dir = resolve_direction(direction, source);
    let amount = eject_amount(source.mass());
    let position = source.position + dir * (source.radius() + EJECT_MARGIN);

    if let Some(e) = state.get_mut(cell) {
        e.add_mass(-amount);
    }
    let spore = state.add_spore(player, position, dir * SPORE_SPEED, amount);
    events.push(GameEvent::Ejected { player, cell, spore });
    Some(spore)
}

/// Eject from every cell of a group that can
pub fn eject_group(
    state: &mut GameState,
    player: PlayerKey,
    direction: Vec2,
    config: &ArenaConfig,
    events: &mut EventQueue,
) -> Vec<EntityId> {
    state
        .group_cells(player)
        .into_iter()
        .filter_map(|id| eject_cell(state, id, direction, config, events))
        .collect()
}

/// Merge `b` into `a` (or the reverse); the heavier survives, ties go to the lower id.
/// Returns the survivor.
pub fn merge(state: &mut GameState, a: EntityId, b: EntityId, events: &mut EventQueue) -> Option<EntityId> {
    let (ea, eb) = (state.get(a)?, state.get(b)?);
    let player = ea.as_cell()?.player;
    let a_survives = ea.mass() > eb.mass() || (ea.mass() == eb.mass() && a < b);
    let (survivor, absorbed) = if a_survives { (a, b) } else { (b, a) };

    let total = ea.mass() + eb.mass();
    let position = (ea.position * ea.mass() + eb.position * eb.mass()) / total;
    let velocity = (ea.velocity * ea.mass() + eb.velocity * eb.mass()) / total;

    state.mark_removed(absorbed);
    let border = state.border;
    if let Some(e) = state.get_mut(survivor) {
        e.set_mass(total);
        e.position = border.clamp(position).0;
        e.velocity = velocity;
        if let Some(data) = e.as_cell_mut() {
            data.split_state = SplitState::Unified;
            data.merge_cooldown = 0;
        }
    }
    events.push(GameEvent::Merged {
        player,
        survivor,
        absorbed,
    });
    Some(survivor)
}

/// Apply queued merges, at most one per cell per tick
pub fn apply_merges(
    state: &mut GameState,
    pairs: &[(EntityId, EntityId)],
    merge_delay: u32,
    events: &mut EventQueue,
) -> usize {
    let mut sorted = pairs.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut touched: HashSet<EntityId, FxBuildHasher> = HashSet::default();
    let mut merges = 0;
    for (a, b) in sorted {
        if touched.contains(&a) || touched.contains(&b) {
            continue;
        }
        let eligible = match (state.get(a), state.get(b)) {
            (Some(ea), Some(eb)) => can_merge_with(ea, eb, merge_delay),
            _ => false,
        };
        if eligible && merge(state, a, b, events).is_some() {
            touched.insert(a);
            touched.insert(b);
            merges += 1;
        }
    }
    merges
}

/// Advance merge cooldowns; JustSplit cells become MergeEligible once the delay passes
pub fn tick_cooldowns(state: &mut GameState, merge_delay: u32) {
    for e in state.entities.values_mut().filter(|e| !e.removed) {
        if let Some(data) = e.as_cell_mut() {
            data.merge_cooldown = data.merge_cooldown.saturating_add(1);
            if data.split_state == SplitState::JustSplit && data.merge_cooldown >= merge_delay {
                data.split_state = SplitState::MergeEligible;
            }
        }
    }
}

/// Shrink cells above the decay threshold; returns how many decayed
pub fn decay(state: &mut GameState, config: &ArenaConfig) -> usize {
    let mut decayed = 0;
    for e in state.entities.values_mut().filter(|e| !e.removed) {
        if e.as_cell().is_some() && e.mass() > config.decay_start_mass {
            let m = e.mass();
            e.set_mass(m - m * config.decay_rate);
            decayed += 1;
        }
    }
    decayed
}

/// Lifecycle phase of a tick: thorns splits, merges, cooldowns, decay
pub fn update(
    state: &mut GameState,
    thorn_splits: &[ThornSplit],
    merges: &[(EntityId, EntityId)],
    config: &ArenaConfig,
    events: &mut EventQueue,
) -> LifecycleSummary {
    let mut summary = LifecycleSummary::default();
    for split in thorn_splits {
        if thorns_split(state, split.cell, split.budget, config, events) > 0 {
            summary.thorn_splits += 1;
        }
    }
    summary.merges = apply_merges(state, merges, config.merge_delay, events);
    tick_cooldowns(state, config.merge_delay);
    summary.decayed = decay(state, config);
    summary
}

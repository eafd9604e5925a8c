//! Interaction resolver
//!
//! Movers (player cells, spores, drifting thorns) are visited in ascending id
//! order. Each true contact is dispatched through a table keyed by the ordered
//! `(KindTag, KindTag)` pair. Removals are only flagged here; the sweep at the
//! end of the tick deletes them.

use hashbrown::HashSet;
use rustc_hash::FxBuildHasher;

use crate::config::ArenaConfig;
use crate::game::constants::lifecycle::{EAT_DISTANCE_RATIO, RECOMBINE_RADIUS};
use crate::game::constants::spatial::QUERY_MARGIN;
use crate::game::constants::spore::SPORE_GRACE_FRAMES;
use crate::game::constants::thorns;
use crate::game::events::{EventQueue, GameEvent};
use crate::game::spatial::Quadtree;
use crate::game::state::{Drift, Entity, EntityId, EntityKind, GameState, KindTag};
use crate::game::systems::lifecycle::ThornSplit;
use crate::util::vec2::Vec2;

/// Rules the resolver needs from the arena config
#[derive(Debug, Clone, Copy)]
pub struct CollisionRules {
    pub eat_ratio: f64,
    pub merge_delay: u32,
}

impl From<&ArenaConfig> for CollisionRules {
    fn from(config: &ArenaConfig) -> Self {
        Self {
            eat_ratio: config.eat_ratio,
            merge_delay: config.merge_delay,
        }
    }
}

/// Work queued for the lifecycle phase
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionOutcome {
    /// Cells that absorbed a thorn this tick
    pub thorn_splits: Vec<ThornSplit>,
    /// Same-owner cell pairs eligible to merge, lower id first
    pub merges: Vec<(EntityId, EntityId)>,
    pub eaten: usize,
    pub rigid_pushes: usize,
}

/// Whether `a` may eat `b` by mass: `a / b >= eat_ratio`, and never a teammate's cell
pub fn can_eat(a: &Entity, b: &Entity, eat_ratio: f64) -> bool {
    if let (EntityKind::PlayerCell(ca), EntityKind::PlayerCell(cb)) = (&a.kind, &b.kind) {
        if ca.player.team_id == cb.player.team_id {
            return false;
        }
    }
    a.mass() / b.mass() >= eat_ratio
}

/// Spores are protected from their own team for a short grace window
pub fn spore_edible_by(spore: &Entity, cell: &Entity) -> bool {
    match (&spore.kind, cell.player()) {
        (EntityKind::Spore(s), Some(owner)) => {
            s.player.team_id != owner.team_id || s.age >= SPORE_GRACE_FRAMES
        }
        (EntityKind::Spore(_), None) => true,
        _ => false,
    }
}

/// Same-team cells push each other apart unless both belong to the same
/// owner and have waited out the merge delay
pub fn should_rigid_collide(a: &Entity, b: &Entity, merge_delay: u32) -> bool {
    match (a.as_cell(), b.as_cell()) {
        (Some(ca), Some(cb)) if ca.player.team_id == cb.player.team_id => {
            let mergeable = ca.player == cb.player
                && ca.merge_cooldown >= merge_delay
                && cb.merge_cooldown >= merge_delay;
            !mergeable
        }
        _ => false,
    }
}

fn within_eat_distance(a: &Entity, b: &Entity) -> bool {
    a.position.distance_to(b.position) <= (a.radius() + b.radius()) * EAT_DISTANCE_RATIO
}

/// Transfer `target`'s mass to `eater` and flag `target` removed
pub fn eat(state: &mut GameState, eater: EntityId, target: EntityId, events: &mut EventQueue) -> bool {
    if eater == target || state.get(eater).is_none() {
        return false;
    }
    let Some((mass, eaten_kind)) = state.get(target).map(|t| (t.mass(), t.tag())) else {
        return false;
    };
    state.mark_removed(target);
    if let Some(e) = state.get_mut(eater) {
        e.add_mass(mass);
    }
    events.push(GameEvent::Eaten {
        eater,
        eaten: target,
        eaten_kind,
        mass,
    });
    true
}

struct Ctx<'a> {
    state: &'a mut GameState,
    rules: CollisionRules,
    outcome: &'a mut CollisionOutcome,
    events: &'a mut EventQueue,
}

type Handler = for<'a, 'b> fn(&'a mut Ctx<'b>, EntityId, EntityId);

/// Interaction handlers indexed by `[first.index()][second.index()]`
static DISPATCH: [[Option<Handler>; KindTag::COUNT]; KindTag::COUNT] = [
    // PlayerCell vs ...
    [
        Some(cell_vs_cell as Handler),
        Some(cell_vs_food as Handler),
        Some(cell_vs_spore as Handler),
        Some(cell_vs_thorn as Handler),
    ],
    // Food vs ...
    [None, None, None, None],
    // Spore vs ...
    [None, None, None, None],
    // Thorn vs ...
    [None, None, Some(thorn_vs_spore as Handler), None],
];

fn dispatch(ctx: &mut Ctx<'_>, a: EntityId, ta: KindTag, b: EntityId, tb: KindTag) {
    if let Some(handler) = DISPATCH[ta.index()][tb.index()] {
        handler(ctx, a, b);
    } else if let Some(handler) = DISPATCH[tb.index()][ta.index()] {
        handler(ctx, b, a);
    }
}

fn pair<'s>(state: &'s GameState, a: EntityId, b: EntityId) -> Option<(&'s Entity, &'s Entity)> {
    Some((state.get(a)?, state.get(b)?))
}

fn eat_if_allowed(ctx: &mut Ctx<'_>, eater: EntityId, target: EntityId) -> bool {
    let allowed = pair(ctx.state, eater, target)
        .map(|(e, t)| can_eat(e, t, ctx.rules.eat_ratio) && within_eat_distance(e, t))
        .unwrap_or(false);
    if allowed && eat(ctx.state, eater, target, ctx.events) {
        ctx.outcome.eaten += 1;
        return true;
    }
    false
}

fn cell_vs_food(ctx: &mut Ctx<'_>, cell: EntityId, food: EntityId) {
    eat_if_allowed(ctx, cell, food);
}

fn cell_vs_spore(ctx: &mut Ctx<'_>, cell: EntityId, spore: EntityId) {
    let edible = pair(ctx.state, cell, spore)
        .map(|(c, s)| spore_edible_by(s, c))
        .unwrap_or(false);
    if edible {
        eat_if_allowed(ctx, cell, spore);
    }
}

fn cell_vs_cell(ctx: &mut Ctx<'_>, a: EntityId, b: EntityId) {
    let Some((ea, eb)) = pair(ctx.state, a, b) else {
        return;
    };
    let (Some(ca), Some(cb)) = (ea.as_cell(), eb.as_cell()) else {
        return;
    };

    if ca.player.team_id != cb.player.team_id {
        // Larger eats smaller
        let (eater, target) = if ea.mass() >= eb.mass() { (a, b) } else { (b, a) };
        eat_if_allowed(ctx, eater, target);
        return;
    }

    if should_rigid_collide(ea, eb, ctx.rules.merge_delay) {
        separate(ctx.state, a, b);
        ctx.outcome.rigid_pushes += 1;
    } else if ea.position.distance_to(eb.position) <= (ea.radius() + eb.radius()) * RECOMBINE_RADIUS {
        ctx.outcome.merges.push((a.min(b), a.max(b)));
    }
}

fn cell_vs_thorn(ctx: &mut Ctx<'_>, cell: EntityId, thorn: EntityId) {
    let budget = ctx.state.get(thorn).map(|t| t.mass()).unwrap_or(0.0);
    if eat_if_allowed(ctx, cell, thorn) {
        ctx.outcome.thorn_splits.push(ThornSplit { cell, budget });
    }
}

fn thorn_vs_spore(ctx: &mut Ctx<'_>, thorn: EntityId, spore: EntityId) {
    let Some((t, s)) = pair(ctx.state, thorn, spore) else {
        return;
    };
    let direction = s
        .velocity
        .normalize_or((t.position - s.position).normalize_or(Vec2::RIGHT));

    if !eat(ctx.state, thorn, spore, ctx.events) {
        return;
    }
    ctx.outcome.eaten += 1;
    if let Some(EntityKind::Thorn(data)) = ctx.state.get_mut(thorn).map(|e| &mut e.kind) {
        data.drift = Drift::new(direction * thorns::SPORE_HIT_SPEED, thorns::VEL_ZERO_FRAMES);
    }
}

/// Push two overlapping cells apart along the contact normal; each moves by
/// the other's share of the combined mass
fn separate(state: &mut GameState, a: EntityId, b: EntityId) {
    let Some((ea, eb)) = pair(state, a, b) else {
        return;
    };
    let (normal, dist) = (eb.position - ea.position).normalize_with_length();
    let normal = if dist > 0.0 { normal } else { Vec2::RIGHT };
    let overlap = ea.radius() + eb.radius() - dist;
    if overlap <= 0.0 {
        return;
    }
    let total = ea.mass() + eb.mass();
    let shift_a = normal * (-overlap * eb.mass() / total);
    let shift_b = normal * (overlap * ea.mass() / total);

    let border = state.border;
    for (id, shift) in [(a, shift_a), (b, shift_b)] {
        if let Some(e) = state.get_mut(id) {
            e.position = border.clamp(e.position + shift).0;
        }
    }
}

/// Resolve every contact this tick
pub fn resolve(
    state: &mut GameState,
    tree: &Quadtree,
    rules: CollisionRules,
    events: &mut EventQueue,
) -> CollisionOutcome {
    let mut outcome = CollisionOutcome::default();
    let mut handled: HashSet<(EntityId, EntityId), FxBuildHasher> = HashSet::default();

    let mut movers: Vec<EntityId> = state
        .live_entities()
        .filter(|e| e.is_mover())
        .map(|e| e.id)
        .collect();
    movers.sort_unstable();

    let mut ctx = Ctx {
        state,
        rules,
        outcome: &mut outcome,
        events,
    };

    for mover in movers {
        let Some((position, radius)) = ctx.state.get(mover).map(|e| (e.position, e.radius())) else {
            continue;
        };
        let mut candidates = tree.query_circle(position, radius, QUERY_MARGIN);
        candidates.sort_unstable_by_key(|c| c.id);

        for candidate in candidates {
            if candidate.id == mover {
                continue;
            }
            let key = (mover.min(candidate.id), mover.max(candidate.id));
            if handled.contains(&key) {
                continue;
            }
            let Some((m, c)) = pair(ctx.state, mover, candidate.id) else {
                // Mover itself may have been eaten
                if ctx.state.get(mover).is_none() {
                    break;
                }
                continue;
            };
            if m.position.distance_to(c.position) > m.radius() + c.radius() {
                continue;
            }
            let (tm, tc) = (m.tag(), c.tag());
            handled.insert(key);
            dispatch(&mut ctx, mover, tm, candidate.id, tc);
        }
    }

    tracing::debug!(
        eaten = outcome.eaten,
        rigid = outcome.rigid_pushes,
        merges = outcome.merges.len(),
        thorn_splits = outcome.thorn_splits.len(),
        "collisions resolved"
    );
    outcome
}

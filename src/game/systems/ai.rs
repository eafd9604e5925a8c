//! Heuristic bot decisions
//!
//! Each AI-controlled group is steered through its largest cell. Decisions are
//! computed from a read-only `NearbyView` and returned as `Action`s; the
//! caller applies them through the same path as external input.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::ArenaConfig;
use crate::game::action::{Action, ActionType};
use crate::game::constants::ai::*;
use crate::game::constants::max_speed;
use crate::game::constants::spatial::QUERY_MARGIN;
use crate::game::events::{EventQueue, GameEvent};
use crate::game::observation::observe_player;
use crate::game::policy::ModelPolicy;
use crate::game::spatial::Quadtree;
use crate::game::state::{Entity, EntityId, EntityKind, FxMap, GameState, PlayerKey};
use crate::game::systems::collision::spore_edible_by;
use crate::game::systems::lifecycle::{can_eject, can_split};
use crate::util::vec2::Vec2;

/// Bot behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Strategy {
    /// Eat food, avoid threats and hazards
    #[default]
    FoodHunter,
    /// Hunt smaller enemy cells, else behave as FoodHunter
    Aggressive,
    /// Wander
    Random,
    /// Ask the inference backend; FoodHunter on failure
    Model,
}

/// Snapshot of one entity as seen by a bot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seen {
    pub id: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub mass: f64,
    pub radius: f64,
}

/// Everything a bot can see around its controlled cell
#[derive(Debug, Clone)]
pub struct NearbyView {
    pub me: Seen,
    pub can_split: bool,
    pub can_eject: bool,
    pub eat_ratio: f64,
    pub food: Vec<Seen>,
    pub thorns: Vec<Seen>,
    /// Spores this cell is allowed to eat
    pub spores: Vec<Seen>,
    /// Cells of other teams
    pub enemies: Vec<Seen>,
    /// Teammates' cells; the bot's own group is left out
    pub allies: Vec<Seen>,
}

impl NearbyView {
    /// Gather the neighborhood of `cell` through the spatial index
    pub fn build(
        state: &GameState,
        tree: &Quadtree,
        player: PlayerKey,
        cell: EntityId,
        config: &ArenaConfig,
    ) -> Option<Self> {
        let me_entity = state.get(cell)?;
        let me = seen(me_entity);
        let mut view = NearbyView {
            me,
            can_split: can_split(state, cell, config),
            can_eject: can_eject(me_entity, config),
            eat_ratio: config.eat_ratio,
            food: Vec::new(),
            thorns: Vec::new(),
            spores: Vec::new(),
            enemies: Vec::new(),
            allies: Vec::new(),
        };

        let mut candidates = tree.query_circle(me.position, VIEW_RADIUS, QUERY_MARGIN);
        candidates.sort_unstable_by_key(|c| c.id);
        for candidate in candidates {
            if candidate.id == cell {
                continue;
            }
            // Index may predate this tick's removals
            let Some(e) = state.get(candidate.id) else {
                continue;
            };
            if e.position.distance_to(me.position) > VIEW_RADIUS + e.radius() {
                continue;
            }
            match &e.kind {
                EntityKind::Food(_) => view.food.push(seen(e)),
                EntityKind::Thorn(_) => view.thorns.push(seen(e)),
                EntityKind::Spore(_) => {
                    if spore_edible_by(e, me_entity) {
                        view.spores.push(seen(e));
                    }
                }
                EntityKind::PlayerCell(c) => {
                    if c.player == player {
                        continue;
                    }
                    if c.player.team_id == player.team_id {
                        view.allies.push(seen(e));
                    } else {
                        view.enemies.push(seen(e));
                    }
                }
            }
        }
        Some(view)
    }
}

fn seen(e: &Entity) -> Seen {
    Seen {
        id: e.id,
        position: e.position,
        velocity: e.velocity,
        mass: e.mass(),
        radius: e.radius(),
    }
}

/// Chosen action plus the entity it is aimed at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub action: Action,
    pub target: Option<EntityId>,
}

impl Decision {
    fn moving(direction: Vec2) -> Self {
        Self {
            action: Action::moving(direction),
            target: None,
        }
    }

    fn toward(direction: Vec2, action_type: ActionType, target: Option<EntityId>) -> Self {
        Self {
            action: Action::from_vec(direction, action_type),
            target,
        }
    }
}

/// Summed threat from larger enemies and the direction away from them
#[derive(Debug, Clone, Copy, Default)]
struct Threat {
    total: f64,
    away: Vec2,
}

fn assess_threat(view: &NearbyView) -> Threat {
    let mut threat = Threat::default();
    for enemy in &view.enemies {
        let distance = enemy.position.distance_to(view.me.position);
        if distance > THREAT_RADIUS || enemy.mass <= view.me.mass * THREAT_MASS_RATIO {
            continue;
        }
        let level = (enemy.mass / view.me.mass) / (distance / 100.0 + 1.0);
        let away = (view.me.position - enemy.position).normalize_or(Vec2::RIGHT);
        threat.total += level;
        threat.away += away * level;
    }
    threat
}

fn escape(view: &NearbyView, threat: &Threat) -> Decision {
    let direction = threat.away.normalize_or(Vec2::RIGHT);
    let action_type = if threat.total > ESCAPE_SPLIT_THREAT && view.can_split {
        ActionType::Split
    } else {
        ActionType::Move
    };
    Decision::toward(direction, action_type, None)
}

/// Nearest thorn too big to absorb, if close enough to matter
fn avoid_hazard(view: &NearbyView, heading: Vec2) -> Option<Decision> {
    let hazard = view
        .thorns
        .iter()
        .filter(|t| view.me.mass / t.mass < view.eat_ratio)
        .map(|t| (t, t.position.distance_to(view.me.position) - t.radius - view.me.radius))
        .filter(|(_, gap)| *gap <= HAZARD_RADIUS)
        .min_by(|a, b| a.1.total_cmp(&b.1))?;

    let away = (view.me.position - hazard.0.position).normalize_or(Vec2::RIGHT);
    let mut tangent = away.perpendicular();
    if tangent.dot(heading) < 0.0 {
        tangent = -tangent;
    }
    let direction = away * (1.0 - HAZARD_TANGENT_WEIGHT) + tangent * HAZARD_TANGENT_WEIGHT;
    Some(Decision::moving(direction))
}

fn food_centroid<'a>(items: impl Iterator<Item = &'a Seen>) -> Option<Vec2> {
    let mut acc = Vec2::ZERO;
    let mut total = 0.0;
    for item in items {
        acc += item.position * item.mass;
        total += item.mass;
    }
    (total > 0.0).then(|| acc / total)
}

/// Edible pellets: food plus spores small enough to eat
fn pellets(view: &NearbyView) -> impl Iterator<Item = &Seen> {
    view.food
        .iter()
        .chain(view.spores.iter())
        .filter(move |p| view.me.mass / p.mass >= view.eat_ratio)
}

fn is_dangerous(view: &NearbyView, pellet: &Seen) -> bool {
    view.enemies.iter().any(|e| {
        e.mass > view.me.mass * THREAT_MASS_RATIO && e.position.distance_to(pellet.position) <= DANGER_RADIUS
    })
}

/// A teammate that can eat the pellet is already closer to it
fn claimed_by_teammate(view: &NearbyView, pellet: &Seen) -> bool {
    let mine = pellet.position.distance_to(view.me.position);
    view.allies.iter().any(|a| {
        a.mass / pellet.mass >= view.eat_ratio && a.position.distance_to(pellet.position) < mine
    })
}

fn pellet_score(view: &NearbyView, pellet: &Seen) -> f64 {
    let neighbors = view
        .food
        .iter()
        .filter(|f| f.id != pellet.id && f.position.distance_to(pellet.position) <= CLUSTER_RADIUS)
        .count();
    let bonus = neighbors as f64 * CLUSTER_BONUS_PER_FOOD;
    let distance = pellet.position.distance_to(view.me.position);
    pellet.mass / (distance + 1.0) * (1.0 + bonus)
}

fn wander<R: Rng>(view: &NearbyView, rng: &mut R) -> Decision {
    let direction = Vec2::from_angle(rng.gen_range(0.0..std::f64::consts::TAU));
    let roll: f64 = rng.gen();
    let action_type = if roll < RANDOM_SPLIT_CHANCE && view.can_split {
        ActionType::Split
    } else if roll < RANDOM_SPLIT_CHANCE + RANDOM_EJECT_CHANCE && view.can_eject {
        ActionType::Eject
    } else {
        ActionType::Move
    };
    Decision::toward(direction, action_type, None)
}

/// Default strategy. `lock` is the previously chosen target, kept unless a
/// clearly better one shows up.
pub fn food_hunter<R: Rng>(view: &NearbyView, lock: Option<EntityId>, heading: Vec2, rng: &mut R) -> Decision {
    let threat = assess_threat(view);
    if threat.total > HIGH_THREAT_THRESHOLD {
        return escape(view, &threat);
    }

    if let Some(decision) = avoid_hazard(view, heading) {
        return decision;
    }

    if threat.total == 0.0 && view.can_split {
        let dense: Vec<&Seen> = view
            .food
            .iter()
            .filter(|f| f.position.distance_to(view.me.position) <= DENSITY_RADIUS)
            .collect();
        if dense.len() > DENSITY_THRESHOLD {
            if let Some(centroid) = food_centroid(dense.into_iter()) {
                return Decision::toward(centroid - view.me.position, ActionType::Split, None);
            }
        }
    }

    let mut best: Option<(&Seen, f64)> = None;
    let mut locked: Option<(&Seen, f64)> = None;
    for pellet in pellets(view).filter(|p| !is_dangerous(view, p) && !claimed_by_teammate(view, p)) {
        let score = pellet_score(view, pellet);
        if Some(pellet.id) == lock {
            locked = Some((pellet, score));
        }
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((pellet, score));
        }
    }
    let chosen = match (locked, best) {
        (Some(l), Some(b)) if b.1 <= l.1 * TARGET_SWITCH_FACTOR => Some(l),
        (_, b) => b,
    };
    if let Some((pellet, _)) = chosen {
        return Decision::toward(pellet.position - view.me.position, ActionType::Move, Some(pellet.id));
    }

    if let Some(centroid) = food_centroid(view.food.iter()) {
        return Decision::moving(centroid - view.me.position);
    }
    wander(view, rng)
}

/// Hunt the best smaller enemy cell; FoodHunter when there is none
pub fn aggressive<R: Rng>(view: &NearbyView, lock: Option<EntityId>, heading: Vec2, rng: &mut R) -> Decision {
    let threat = assess_threat(view);
    if threat.total > HIGH_THREAT_THRESHOLD {
        return escape(view, &threat);
    }

    let my_speed = max_speed(view.me.mass);
    let prey = view
        .enemies
        .iter()
        .filter(|e| view.me.mass / e.mass >= view.eat_ratio)
        .map(|e| {
            let distance = e.position.distance_to(view.me.position);
            let size_ratio = view.me.mass / e.mass;
            let speed_advantage = my_speed / max_speed(e.mass);
            let mut score = size_ratio / (distance / 100.0 + 1.0) * (1.0 + speed_advantage);
            if Some(e.id) == lock {
                score *= TARGET_SWITCH_FACTOR;
            }
            (e, distance, score)
        })
        .max_by(|a, b| a.2.total_cmp(&b.2).then(b.0.id.cmp(&a.0.id)));

    let Some((target, distance, _)) = prey else {
        return food_hunter(view, None, heading, rng);
    };

    let gap = distance - view.me.radius - target.radius;
    let half_still_eats = (view.me.mass / 2.0) / target.mass >= view.eat_ratio;
    if gap <= SPLIT_ATTACK_RANGE && half_still_eats && view.can_split {
        return Decision::toward(target.position - view.me.position, ActionType::Split, Some(target.id));
    }

    // Lead the target a little
    let lead = distance / (my_speed + 1.0);
    let predicted = target.position + target.velocity * (lead * 0.5);
    Decision::toward(predicted - view.me.position, ActionType::Move, Some(target.id))
}

/// Per-bot bookkeeping
#[derive(Debug, Clone, PartialEq)]
pub struct BotState {
    pub strategy: Strategy,
    /// Entity id the bot is heading for
    pub target: Option<EntityId>,
    /// Group has no live cells
    pub halted: bool,
    /// Offset spreading decisions across ticks
    pub stagger: u64,
    pub decisions: u64,
    /// Model decisions that fell back to FoodHunter
    pub fallbacks: u64,
}

/// Drives every AI-controlled player
#[derive(Debug, Default)]
pub struct AiManager {
    bots: FxMap<PlayerKey, BotState>,
    model: Option<ModelPolicy>,
}

impl AiManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_bot(&mut self, player: PlayerKey, strategy: Strategy, interval: u64) {
        let stagger = self.bots.len() as u64 % interval.max(1);
        self.bots.insert(
            player,
            BotState {
                strategy,
                target: None,
                halted: false,
                stagger,
                decisions: 0,
                fallbacks: 0,
            },
        );
    }

    pub fn get(&self, player: PlayerKey) -> Option<&BotState> {
        self.bots.get(&player)
    }

    pub fn bot_count(&self) -> usize {
        self.bots.len()
    }

    pub fn set_model(&mut self, policy: ModelPolicy) {
        self.model = Some(policy);
    }

    /// Switch a bot's strategy; emits `StrategyChanged` when it differs
    pub fn set_strategy(&mut self, player: PlayerKey, strategy: Strategy, events: &mut EventQueue) -> bool {
        let Some(bot) = self.bots.get_mut(&player) else {
            return false;
        };
        if bot.strategy == strategy {
            return false;
        }
        events.push(GameEvent::StrategyChanged {
            player,
            from: bot.strategy,
            to: strategy,
        });
        tracing::debug!("Bot {} strategy {:?} -> {:?}", player.owner_id, bot.strategy, strategy);
        bot.strategy = strategy;
        bot.target = None;
        true
    }

    /// Decide for every bot due this tick
    pub fn update<R: Rng>(
        &mut self,
        state: &GameState,
        tree: &Quadtree,
        config: &ArenaConfig,
        rng: &mut R,
    ) -> Vec<(PlayerKey, Action)> {
        let interval = config.ai_decision_interval.max(1);
        let mut keys: Vec<PlayerKey> = self.bots.keys().copied().collect();
        keys.sort_unstable();

        let mut actions = Vec::new();
        for key in keys {
            let Some(bot) = self.bots.get_mut(&key) else {
                continue;
            };
            if (state.tick + bot.stagger) % interval != 0 {
                continue;
            }

            let Some(cell) = state.largest_cell(key) else {
                if !bot.halted {
                    tracing::debug!("Bot {} halted: no live cells", key.owner_id);
                    bot.halted = true;
                    bot.target = None;
                }
                continue;
            };
            if bot.halted {
                tracing::debug!("Bot {} resumed", key.owner_id);
                bot.halted = false;
            }

            let Some(view) = NearbyView::build(state, tree, key, cell, config) else {
                continue;
            };
            let heading = state
                .get(cell)
                .and_then(|e| e.as_cell())
                .map(|c| c.direction)
                .unwrap_or(Vec2::ZERO);

            let decision = match bot.strategy {
                Strategy::FoodHunter => food_hunter(&view, bot.target, heading, rng),
                Strategy::Aggressive => aggressive(&view, bot.target, heading, rng),
                Strategy::Random => wander(&view, rng),
                Strategy::Model => {
                    let model_action = match self.model.as_mut() {
                        Some(model) => match observe_player(state, key, config) {
                            Some(obs) => model.decide(&obs).map_err(|e| e.to_string()),
                            None => Err("no observation".to_string()),
                        },
                        None => Err("no model configured".to_string()),
                    };
                    match model_action {
                        Ok(action) => Decision { action, target: None },
                        Err(reason) => {
                            tracing::warn!("Bot {} model decision failed ({}), using FoodHunter", key.owner_id, reason);
                            bot.fallbacks += 1;
                            food_hunter(&view, bot.target, heading, rng)
                        }
                    }
                }
            };

            bot.target = decision.target;
            bot.decisions += 1;
            actions.push((key, decision.action));
        }

        if !actions.is_empty() {
            tracing::debug!("AI tick {}: {} decisions", state.tick, actions.len());
        }
        actions
    }
}

/// Random bot name
pub fn generate_bot_name<R: Rng>(rng: &mut R) -> String {
    let prefixes = ["Blob", "Cell", "Spore", "Mite", "Proto", "Amoeba", "Goo", "Nucleus"];
    let suffixes = ["X", "Prime", "Alpha", "Beta", "One", "Zero", "Max", "Pro"];
    format!(
        "{}{}",
        prefixes[rng.gen_range(0..prefixes.len())],
        suffixes[rng.gen_range(0..suffixes.len())]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::policy::InferenceError;
    use crate::game::spatial::{Aabb, SpatialEntity};
    use crate::game::state::{Border, Controller};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn me(mass: f64) -> Seen {
        item(1, Vec2::new(500.0, 500.0), mass)
    }

    fn item(id: EntityId, position: Vec2, mass: f64) -> Seen {
        Seen {
            id,
            position,
            velocity: Vec2::ZERO,
            mass,
            radius: crate::game::constants::mass_to_radius(mass),
        }
    }

    fn view(mass: f64) -> NearbyView {
        NearbyView {
            me: me(mass),
            can_split: false,
            can_eject: false,
            eat_ratio: 1.3,
            food: Vec::new(),
            thorns: Vec::new(),
            spores: Vec::new(),
            enemies: Vec::new(),
            allies: Vec::new(),
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(3)
    }

    fn tree_for(state: &GameState) -> Quadtree {
        let mut tree = Quadtree::new(Aabb::new(
            Vec2::ZERO,
            Vec2::new(state.border.width, state.border.height),
        ));
        tree.rebuild(state.live_entities().map(|e| SpatialEntity {
            id: e.id,
            position: e.position,
            radius: e.radius(),
        }));
        tree
    }

    #[test]
    fn test_flees_from_double_mass_enemy() {
        let mut v = view(1000.0);
        v.enemies.push(item(2, Vec2::new(580.0, 500.0), 2000.0));
        let d = food_hunter(&v, None, Vec2::ZERO, &mut rng());
        assert_eq!(d.action.action_type, ActionType::Move);
        assert!(d.action.direction().x < -0.99);
    }

    #[test]
    fn test_escape_splits_under_heavy_threat() {
        let mut v = view(4000.0);
        v.can_split = true;
        v.enemies.push(item(2, Vec2::new(500.0, 540.0), 30_000.0));
        let d = food_hunter(&v, None, Vec2::ZERO, &mut rng());
        assert_eq!(d.action.action_type, ActionType::Split);
        assert!(d.action.direction().y < -0.99);
    }

    #[test]
    fn test_ignores_small_or_distant_enemies() {
        let mut v = view(1000.0);
        v.enemies.push(item(2, Vec2::new(520.0, 500.0), 1050.0));
        v.enemies.push(item(3, Vec2::new(780.0, 500.0), 5000.0));
        v.food.push(item(4, Vec2::new(500.0, 540.0), 100.0));
        let d = food_hunter(&v, None, Vec2::ZERO, &mut rng());
        assert_eq!(d.target, Some(4));
    }

    #[test]
    fn test_avoids_unabsorbable_thorn() {
        let mut v = view(1000.0);
        v.thorns.push(item(2, Vec2::new(540.0, 500.0), 10_000.0));
        v.food.push(item(3, Vec2::new(600.0, 500.0), 100.0));
        let d = food_hunter(&v, None, Vec2::new(0.0, 1.0), &mut rng());
        let dir = d.action.direction();
        assert!(dir.x < 0.0);
        assert!(dir.y > 0.0);
        assert!(d.target.is_none());
    }

    #[test]
    fn test_splits_into_dense_food() {
        let mut v = view(8000.0);
        v.can_split = true;
        for i in 0..12 {
            v.food.push(item(10 + i, Vec2::new(540.0 + i as f64, 500.0), 100.0));
        }
        let d = food_hunter(&v, None, Vec2::ZERO, &mut rng());
        assert_eq!(d.action.action_type, ActionType::Split);
        assert!(d.action.direction().x > 0.99);
    }

    #[test]
    fn test_prefers_clustered_food_and_keeps_lock() {
        let mut v = view(1000.0);
        // Lone pellet slightly closer than a cluster
        v.food.push(item(2, Vec2::new(440.0, 500.0), 100.0));
        for i in 0..5 {
            v.food.push(item(10 + i, Vec2::new(570.0, 490.0 + i as f64 * 5.0), 100.0));
        }
        let d = food_hunter(&v, None, Vec2::ZERO, &mut rng());
        assert!(matches!(d.target, Some(id) if id >= 10));

        // An existing lock on the lone pellet survives a modest improvement
        let d = food_hunter(&v, Some(2), Vec2::ZERO, &mut rng());
        assert_eq!(d.target, Some(2));
    }

    #[test]
    fn test_skips_food_near_large_enemy() {
        let mut v = view(1000.0);
        v.food.push(item(2, Vec2::new(520.0, 500.0), 100.0));
        v.food.push(item(3, Vec2::new(500.0, 620.0), 100.0));
        // Big enemy beyond threat range but guarding pellet 2
        v.enemies.push(item(9, Vec2::new(600.0, 500.0), 1200.0));
        let d = food_hunter(&v, None, Vec2::ZERO, &mut rng());
        assert_eq!(d.target, Some(3));
    }

    #[test]
    fn test_leaves_food_to_closer_teammate() {
        let mut v = view(1000.0);
        v.food.push(item(2, Vec2::new(540.0, 500.0), 100.0));
        v.food.push(item(3, Vec2::new(500.0, 440.0), 100.0));
        v.allies.push(item(7, Vec2::new(560.0, 500.0), 1000.0));
        let d = food_hunter(&v, None, Vec2::ZERO, &mut rng());
        assert_eq!(d.target, Some(3));

        // A teammate too small to eat it does not claim it
        v.allies[0].mass = 120.0;
        let d = food_hunter(&v, None, Vec2::ZERO, &mut rng());
        assert_eq!(d.target, Some(2));
    }

    #[test]
    fn test_wanders_without_food() {
        let v = view(1000.0);
        let d = food_hunter(&v, None, Vec2::ZERO, &mut rng());
        assert!((d.action.direction().length() - 1.0).abs() < 1e-3);
        assert!(d.target.is_none());
    }

    #[test]
    fn test_aggressive_split_attack_and_chase() {
        let mut v = view(10_000.0);
        v.can_split = true;
        v.enemies.push(item(2, Vec2::new(600.0, 500.0), 1000.0));
        let d = aggressive(&v, None, Vec2::ZERO, &mut rng());
        assert_eq!(d.action.action_type, ActionType::Split);
        assert_eq!(d.target, Some(2));

        // Half mass would no longer eat it: chase instead
        v.enemies[0].mass = 5000.0;
        let d = aggressive(&v, None, Vec2::ZERO, &mut rng());
        assert_eq!(d.action.action_type, ActionType::Move);
        assert!(d.action.direction().x > 0.99);
    }

    #[test]
    fn test_aggressive_falls_back_to_food() {
        let mut v = view(1000.0);
        v.food.push(item(3, Vec2::new(450.0, 500.0), 100.0));
        let d = aggressive(&v, None, Vec2::ZERO, &mut rng());
        assert_eq!(d.target, Some(3));
    }

    #[test]
    fn test_view_uses_index_and_skips_removed() {
        let mut state = GameState::new(Border::default());
        let bot = state.add_player(0, "bot".into(), Controller::Ai);
        let enemy = state.add_player(1, "e".into(), Controller::Ai);
        let cell = state.add_cell(bot, Vec2::new(500.0, 500.0), 1000.0, None);
        let near = state.add_food(Vec2::new(520.0, 500.0));
        let gone = state.add_food(Vec2::new(530.0, 500.0));
        state.add_food(Vec2::new(950.0, 950.0));
        state.add_cell(enemy, Vec2::new(450.0, 500.0), 1000.0, None);
        let mate = state.add_player(0, "mate".into(), Controller::Ai);
        let mate_cell = state.add_cell(mate, Vec2::new(500.0, 560.0), 1000.0, None);
        // Own sibling is not an ally
        state.add_cell(bot, Vec2::new(500.0, 440.0), 1000.0, None);
        let tree = tree_for(&state);
        state.mark_removed(gone);

        let v = NearbyView::build(&state, &tree, bot, cell, &ArenaConfig::default()).unwrap();
        assert_eq!(v.food.iter().map(|f| f.id).collect::<Vec<_>>(), vec![near]);
        assert_eq!(v.enemies.len(), 1);
        assert_eq!(v.allies.iter().map(|a| a.id).collect::<Vec<_>>(), vec![mate_cell]);
    }

    #[test]
    fn test_manager_cadence_halt_and_resume() {
        let mut state = GameState::new(Border::default());
        let config = ArenaConfig {
            ai_decision_interval: 3,
            ..Default::default()
        };
        let bot = state.add_player(0, "bot".into(), Controller::Ai);
        let cell = state.add_cell(bot, Vec2::new(500.0, 500.0), 1000.0, None);
        let mut ai = AiManager::new();
        ai.register_bot(bot, Strategy::FoodHunter, config.ai_decision_interval);
        let mut r = rng();

        state.tick = 1;
        assert!(ai.update(&state, &tree_for(&state), &config, &mut r).is_empty());
        state.tick = 3;
        assert_eq!(ai.update(&state, &tree_for(&state), &config, &mut r).len(), 1);

        state.mark_removed(cell);
        state.sweep();
        state.tick = 6;
        assert!(ai.update(&state, &tree_for(&state), &config, &mut r).is_empty());
        assert!(ai.get(bot).unwrap().halted);

        state.add_cell(bot, Vec2::new(100.0, 100.0), 1000.0, None);
        state.tick = 9;
        assert_eq!(ai.update(&state, &tree_for(&state), &config, &mut r).len(), 1);
        assert!(!ai.get(bot).unwrap().halted);
    }

    #[test]
    fn test_stagger_spreads_bots() {
        let mut ai = AiManager::new();
        for owner in 0..4 {
            ai.register_bot(PlayerKey::new(0, owner), Strategy::Random, 2);
        }
        let staggers: Vec<u64> = (0..4).map(|o| ai.get(PlayerKey::new(0, o)).unwrap().stagger).collect();
        assert_eq!(staggers, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_strategy_change_emits_event() {
        let mut ai = AiManager::new();
        let key = PlayerKey::new(0, 1);
        ai.register_bot(key, Strategy::FoodHunter, 6);
        let mut events = EventQueue::new();
        assert!(ai.set_strategy(key, Strategy::Aggressive, &mut events));
        assert!(!ai.set_strategy(key, Strategy::Aggressive, &mut events));
        assert_eq!(
            events.pending(),
            &[GameEvent::StrategyChanged {
                player: key,
                from: Strategy::FoodHunter,
                to: Strategy::Aggressive,
            }]
        );
    }

    #[test]
    fn test_model_failure_falls_back() {
        let mut state = GameState::new(Border::default());
        let config = ArenaConfig {
            ai_decision_interval: 1,
            ..Default::default()
        };
        let bot = state.add_player(0, "bot".into(), Controller::Ai);
        state.add_cell(bot, Vec2::new(500.0, 500.0), 1000.0, None);
        let mut ai = AiManager::new();
        ai.register_bot(bot, Strategy::Model, 1);
        let mut r = rng();

        // No model configured
        assert_eq!(ai.update(&state, &tree_for(&state), &config, &mut r).len(), 1);
        assert_eq!(ai.get(bot).unwrap().fallbacks, 1);

        fn failing(_: &[f32]) -> Result<Vec<f32>, InferenceError> {
            Err(InferenceError::Backend("boom".into()))
        }
        ai.set_model(ModelPolicy::new(failing));
        ai.update(&state, &tree_for(&state), &config, &mut r);
        assert_eq!(ai.get(bot).unwrap().fallbacks, 2);

        fn steer_up(_: &[f32]) -> Result<Vec<f32>, InferenceError> {
            Ok(vec![0.0, 1.0, 0.0])
        }
        ai.set_model(ModelPolicy::new(steer_up));
        let actions = ai.update(&state, &tree_for(&state), &config, &mut r);
        assert_eq!(actions[0].1, Action::new(0.0, 1.0, ActionType::Move));
        assert_eq!(ai.get(bot).unwrap().fallbacks, 2);
    }

    #[test]
    fn test_bot_name_generation() {
        let name = generate_bot_name(&mut rng());
        assert!(!name.is_empty());
    }
}

use crate::game::constants::physics::{
    ACCEL_FACTOR, CELL_DAMPING, CENTRIPETAL_RANGE, CENTRIPETAL_WEIGHT, DT, JITTER_GUARD,
};
use crate::game::constants::spore::{SPORE_DAMPING, SPORE_VEL_ZERO_FRAMES};
use crate::game::constants::max_speed;
use crate::game::state::{Entity, EntityKind, FxMap, GameState, PlayerKey};
use crate::util::vec2::Vec2;

/// Integrate every live entity by one tick, then clamp to the border
pub fn update(state: &mut GameState, dt: f64) {
    let groups = group_centroids(state);
    let border = state.border;

    for entity in state.entities.values_mut().filter(|e| !e.removed) {
        integrate(entity, &groups, dt);

        let (clamped, cx, cy) = border.clamp(entity.position);
        entity.position = clamped;
        if cx {
            entity.velocity.x = 0.0;
        }
        if cy {
            entity.velocity.y = 0.0;
        }
    }
}

/// Mass-weighted centroid and live cell count per player
fn group_centroids(state: &GameState) -> FxMap<PlayerKey, (Vec2, usize)> {
    let mut acc: FxMap<PlayerKey, (Vec2, f64, usize)> = FxMap::default();
    for e in state.live_entities() {
        if let EntityKind::PlayerCell(cell) = &e.kind {
            let slot = acc.entry(cell.player).or_insert((Vec2::ZERO, 0.0, 0));
            slot.0 += e.position * e.mass();
            slot.1 += e.mass();
            slot.2 += 1;
        }
    }
    acc.into_iter()
        .map(|(k, (sum, mass, n))| (k, (sum / mass, n)))
        .collect()
}

fn integrate(entity: &mut Entity, groups: &FxMap<PlayerKey, (Vec2, usize)>, dt: f64) {
    let mass = entity.mass();
    let Entity {
        kind,
        position,
        velocity,
        ..
    } = entity;

    match kind {
        EntityKind::PlayerCell(cell) => {
            let max = max_speed(mass);
            let mut target = cell.direction * max;

            if let Some(&(centroid, count)) = groups.get(&cell.player) {
                if count > 1 {
                    let (toward, dist) = (centroid - *position).normalize_with_length();
                    let strength = (dist / CENTRIPETAL_RANGE).min(1.0);
                    target += toward * (max * CENTRIPETAL_WEIGHT * strength);
                }
            }

            // Exact exponential approach so the response is the same at any tick rate
            let approach = 1.0 - (-ACCEL_FACTOR * dt).exp();
            // Jitter guard: bound the change over this step
            let delta = ((target - *velocity) * approach).clamp_length(JITTER_GUARD * max * dt);
            *velocity += delta;
            *velocity *= CELL_DAMPING.powf(dt / DT);
            *velocity = velocity.clamp_length(max);

            *position += (*velocity + cell.boost.current()) * dt;
            cell.boost.advance();
        }
        EntityKind::Spore(spore) => {
            spore.age = spore.age.saturating_add(1);
            // The ratios telescope to (window - age) / window: a linear ramp
            // that reaches zero exactly at the end of the window
            let remaining = SPORE_VEL_ZERO_FRAMES.saturating_sub(spore.age) as f64;
            *velocity *= SPORE_DAMPING * remaining / (remaining + 1.0);
            *position += *velocity * dt;
        }
        EntityKind::Thorn(thorn) => {
            if thorn.drift.is_active() {
                *velocity = thorn.drift.current();
                *position += *velocity * dt;
                thorn.drift.advance();
            } else {
                *velocity = Vec2::ZERO;
            }
        }
        EntityKind::Food(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::thorns;
    use crate::game::state::{Border, Controller, Drift};

    fn create_test_state() -> (GameState, PlayerKey) {
        let mut state = GameState::new(Border::new(1000.0, 1000.0));
        let key = state.add_player(0, "Test".into(), Controller::External);
        (state, key)
    }

    fn set_direction(state: &mut GameState, id: u64, dir: Vec2) {
        if let Some(cell) = state.get_mut(id).and_then(|e| e.as_cell_mut()) {
            cell.direction = dir;
        }
    }

    #[test]
    fn test_cell_moves_toward_direction() {
        let (mut state, key) = create_test_state();
        let id = state.add_cell(key, Vec2::new(500.0, 500.0), 1000.0, None);
        set_direction(&mut state, id, Vec2::RIGHT);
        for _ in 0..30 {
            update(&mut state, DT);
        }
        let e = state.get(id).unwrap();
        assert!(e.position.x > 500.0);
        assert!((e.position.y - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_cell_speed_never_exceeds_max() {
        let (mut state, key) = create_test_state();
        let id = state.add_cell(key, Vec2::new(100.0, 500.0), 1000.0, None);
        set_direction(&mut state, id, Vec2::RIGHT);
        let max = max_speed(1000.0);
        for _ in 0..300 {
            update(&mut state, DT);
            assert!(state.get(id).unwrap().velocity.length() <= max + 1e-9);
        }
    }

    #[test]
    fn test_jitter_guard_limits_delta() {
        let (mut state, key) = create_test_state();
        let id = state.add_cell(key, Vec2::new(500.0, 500.0), 100.0, None);
        set_direction(&mut state, id, Vec2::RIGHT);
        update(&mut state, DT);
        let v = state.get(id).unwrap().velocity.length();
        assert!(v <= JITTER_GUARD * max_speed(100.0) * DT + 1e-9);
        assert!(v > 0.0);
    }

    #[test]
    fn test_boost_moves_then_decays() {
        let (mut state, key) = create_test_state();
        let id = state.add_cell(key, Vec2::new(500.0, 500.0), 1000.0, None);
        if let Some(cell) = state.get_mut(id).and_then(|e| e.as_cell_mut()) {
            cell.boost = Drift::new(Vec2::new(300.0, 0.0), 3);
        }
        for _ in 0..3 {
            update(&mut state, DT);
        }
        let after_boost = state.get(id).unwrap().position;
        assert!(after_boost.x > 500.0);
        update(&mut state, DT);
        // Boost spent and no direction: nearly no motion
        let moved = state.get(id).unwrap().position.x - after_boost.x;
        assert!(moved.abs() < 1e-9);
    }

    #[test]
    fn test_split_group_pulls_together() {
        let (mut state, key) = create_test_state();
        let a = state.add_cell(key, Vec2::new(400.0, 500.0), 1000.0, None);
        let b = state.add_cell(key, Vec2::new(600.0, 500.0), 1000.0, None);
        let gap = |s: &GameState| s.get(a).unwrap().position.distance_to(s.get(b).unwrap().position);
        let before = gap(&state);
        for _ in 0..20 {
            update(&mut state, DT);
        }
        assert!(gap(&state) < before);
    }

    #[test]
    fn test_spore_damping_and_stop() {
        let (mut state, key) = create_test_state();
        let id = state.add_spore(key, Vec2::new(500.0, 500.0), Vec2::new(100.0, 0.0), 1400.0);
        let window = SPORE_VEL_ZERO_FRAMES as f64;
        update(&mut state, DT);
        let expected = 100.0 * SPORE_DAMPING * (window - 1.0) / window;
        assert!((state.get(id).unwrap().velocity.x - expected).abs() < 1e-9);
        for _ in 1..SPORE_VEL_ZERO_FRAMES {
            update(&mut state, DT);
        }
        let e = state.get(id).unwrap();
        assert_eq!(e.velocity, Vec2::ZERO);
        let resting = e.position;
        update(&mut state, DT);
        assert_eq!(state.get(id).unwrap().position, resting);
    }

    #[test]
    fn test_spore_slowdown_is_linear_ramp_to_zero() {
        let (mut state, key) = create_test_state();
        let id = state.add_spore(key, Vec2::new(500.0, 500.0), Vec2::new(100.0, 0.0), 1400.0);
        let window = SPORE_VEL_ZERO_FRAMES as f64;
        let mut previous = 100.0;
        for age in 1..SPORE_VEL_ZERO_FRAMES {
            update(&mut state, DT);
            let vx = state.get(id).unwrap().velocity.x;
            let ramp = (window - age as f64) / window;
            let expected = 100.0 * SPORE_DAMPING.powi(age as i32) * ramp;
            assert!((vx - expected).abs() < 1e-9, "age {age}: {vx} vs {expected}");
            assert!(vx < previous);
            previous = vx;
        }
        // Last step before the window closes is small, not a snap from full speed
        assert!(previous < 100.0 / window);
        update(&mut state, DT);
        assert_eq!(state.get(id).unwrap().velocity, Vec2::ZERO);
    }

    #[test]
    fn test_cell_response_independent_of_tick_rate() {
        let speed_after = |hz: u32| {
            let (mut state, key) = create_test_state();
            let id = state.add_cell(key, Vec2::new(100.0, 500.0), 1000.0, None);
            set_direction(&mut state, id, Vec2::RIGHT);
            let dt = 1.0 / hz as f64;
            // 0.1 s of simulated time
            for _ in 0..(hz / 10) {
                update(&mut state, dt);
            }
            state.get(id).unwrap().velocity.length()
        };
        let (fast, slow) = (speed_after(60), speed_after(20));
        assert!(fast > 0.0);
        assert!((fast - slow).abs() / fast < 0.03, "60Hz={fast} 20Hz={slow}");
    }

    #[test]
    fn test_thorn_drift_decays_over_window() {
        let (mut state, _) = create_test_state();
        let id = state.add_thorn(Vec2::new(500.0, 500.0), 10_000.0);
        if let Some(EntityKind::Thorn(t)) = state.get_mut(id).map(|e| &mut e.kind) {
            t.drift = Drift::new(Vec2::new(0.0, thorns::SPORE_HIT_SPEED), thorns::VEL_ZERO_FRAMES);
        }
        for _ in 0..thorns::VEL_ZERO_FRAMES {
            update(&mut state, DT);
        }
        let moved = state.get(id).unwrap().position;
        assert!(moved.y > 500.0);
        update(&mut state, DT);
        assert_eq!(state.get(id).unwrap().position, moved);
        assert!(!state.get(id).unwrap().is_mover());
    }

    #[test]
    fn test_border_clamp_zeroes_velocity_axis() {
        let (mut state, key) = create_test_state();
        let id = state.add_spore(key, Vec2::new(999.0, 500.0), Vec2::new(300.0, 10.0), 1400.0);
        update(&mut state, DT);
        let e = state.get(id).unwrap();
        assert_eq!(e.position.x, 1000.0);
        assert_eq!(e.velocity.x, 0.0);
        assert!(e.velocity.y > 0.0);
    }

    #[test]
    fn test_food_is_static() {
        let (mut state, _) = create_test_state();
        let id = state.add_food(Vec2::new(10.0, 10.0));
        update(&mut state, DT);
        assert_eq!(state.get(id).unwrap().position, Vec2::new(10.0, 10.0));
    }
}

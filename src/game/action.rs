//! Player actions and the single path that applies them
//!
//! External inputs and AI decisions both end up here. Input is clamped,
//! never rejected.

use serde::{Deserialize, Serialize};

use crate::config::ArenaConfig;
use crate::game::events::EventQueue;
use crate::game::state::{GameState, PlayerKey};
use crate::game::systems::lifecycle;
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ActionType {
    #[default]
    Move = 0,
    Split = 1,
    Eject = 2,
}

impl ActionType {
    /// Unknown codes decode to `Move`
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => ActionType::Split,
            2 => ActionType::Eject,
            _ => ActionType::Move,
        }
    }
}

/// Direction in `[-1, 1]` per axis plus an optional split/eject
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Action {
    pub direction_x: f32,
    pub direction_y: f32,
    pub action_type: ActionType,
}

#[inline]
fn sanitize(v: f32) -> f32 {
    if v.is_finite() {
        v.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

impl Action {
    pub fn new(direction_x: f32, direction_y: f32, action_type: ActionType) -> Self {
        Self {
            direction_x: sanitize(direction_x),
            direction_y: sanitize(direction_y),
            action_type,
        }
    }

    pub fn moving(direction: Vec2) -> Self {
        Self::from_vec(direction, ActionType::Move)
    }

    /// Build from a world-space vector, normalized first
    pub fn from_vec(direction: Vec2, action_type: ActionType) -> Self {
        let d = direction.normalize_or(Vec2::ZERO);
        Self::new(d.x as f32, d.y as f32, action_type)
    }

    pub fn direction(&self) -> Vec2 {
        Vec2::new(
            sanitize(self.direction_x) as f64,
            sanitize(self.direction_y) as f64,
        )
    }
}

impl From<[f32; 3]> for Action {
    fn from(raw: [f32; 3]) -> Self {
        let code = if raw[2].is_finite() { raw[2].round() as i64 } else { 0 };
        Action::new(raw[0], raw[1], ActionType::from_code(code))
    }
}

/// Apply one action to a player's group. Unknown or empty groups are a no-op.
pub fn apply_action(
    state: &mut GameState,
    player: PlayerKey,
    action: &Action,
    config: &ArenaConfig,
    events: &mut EventQueue,
) {
    let cells = state.group_cells(player);
    if cells.is_empty() {
        return;
    }

    // Direction magnitude above 1 would only be clamped by max speed again
    let direction = action.direction().clamp_length(1.0);
    for id in &cells {
        if let Some(cell) = state.get_mut(*id).and_then(|e| e.as_cell_mut()) {
            cell.direction = direction;
        }
    }

    match action.action_type {
        ActionType::Move => {}
        ActionType::Split => {
            lifecycle::split_group(state, player, direction, config, events);
        }
        ActionType::Eject => {
            lifecycle::eject_group(state, player, direction, config, events);
        }
    }
}

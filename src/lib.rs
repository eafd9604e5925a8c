//! Cell Arena simulation engine
//!
//! A tick-driven arena where player cells, food, spores and thorns move, eat,
//! split and merge. The engine is headless: controllers submit `Action`s and
//! read fixed-shape observations; AI bots use the same action path.

pub mod config;
pub mod game;
pub mod util;

pub use config::{ArenaConfig, ConfigError};
pub use game::action::{Action, ActionType};
pub use game::events::GameEvent;
pub use game::game_loop::{Simulation, TickSummary};
pub use game::state::PlayerKey;
pub use game::systems::ai::Strategy;

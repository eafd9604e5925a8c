pub mod action;
pub mod constants;
pub mod events;
pub mod game_loop;
pub mod input_buffer;
pub mod observation;
pub mod performance;
pub mod policy;
pub mod spatial;
pub mod state;
pub mod systems;

pub mod ai;
pub mod collision;
pub mod lifecycle;
pub mod physics;
pub mod spawner;

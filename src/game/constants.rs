/// Simulation timing
pub mod physics {
    /// Default tick rate in Hz
    pub const TICK_RATE: u32 = 60;
    /// Delta time per tick in seconds at the default tick rate
    pub const DT: f64 = 1.0 / 60.0;
    /// Max speed of a MIN_MASS cell, units/second
    pub const BASE_SPEED: f64 = 150.0;
    /// Rate (1/s) at which a cell closes the gap to its target velocity.
    /// Closes 20% of the gap per tick at 60 Hz.
    pub const ACCEL_FACTOR: f64 = 13.39;
    /// Max velocity change per second as a fraction of max speed
    pub const JITTER_GUARD: f64 = 15.0;
    /// Velocity retained by player cells per DT of simulated time
    pub const CELL_DAMPING: f64 = 0.99;
    /// Weight of the pull toward the group centroid, relative to max speed
    pub const CENTRIPETAL_WEIGHT: f64 = 0.3;
    /// Distance at which the centroid pull reaches full strength
    pub const CENTRIPETAL_RANGE: f64 = 100.0;
}

/// Mass and radius formula constants
pub mod mass {
    /// Floor for every entity's mass; also the food mass
    pub const MIN_MASS: f64 = 100.0;
    pub const FOOD_MASS: f64 = 100.0;
    /// Mass of a freshly joined player cell
    pub const CELL_INIT_MASS: f64 = 1000.0;
    /// radius = sqrt(mass / 100 * K1 + K2) * SCALE
    pub const RADIUS_K1: f64 = 0.042;
    pub const RADIUS_K2: f64 = 0.15;
    pub const RADIUS_SCALE: f64 = 10.0;
}

/// Split / merge / decay defaults
pub mod lifecycle {
    /// Minimum mass advantage multiple to eat
    pub const EAT_RATIO: f64 = 1.3;
    /// Contact distance scale applied when eating
    pub const EAT_DISTANCE_RATIO: f64 = 0.9;
    pub const SPLIT_MIN_MASS: f64 = 3600.0;
    pub const MAX_SPLIT_COUNT: usize = 16;
    /// Speed of the split boost at the moment of splitting, units/second
    pub const SPLIT_BOOST_SPEED: f64 = 300.0;
    /// Ticks for the split boost to decay to zero
    pub const SPLIT_BOOST_FRAMES: u32 = 30;
    /// Ticks after a split before a cell may merge again
    pub const MERGE_DELAY: u32 = 600;
    /// Merge distance scale on r1 + r2
    pub const RECOMBINE_RADIUS: f64 = 1.0;
    pub const DECAY_START_MASS: f64 = 26_000.0;
    /// Fraction of mass lost per tick above DECAY_START_MASS
    pub const DECAY_RATE: f64 = 0.00005;
}

/// Eject / spore constants
pub mod spore {
    pub const EJECT_MIN_MASS: f64 = 3200.0;
    /// Fraction of the cell's mass ejected, floored at SPORE_MASS
    pub const EJECT_PERCENT: f64 = 0.02;
    pub const SPORE_MASS: f64 = 1400.0;
    /// Gap between the cell edge and the spawned spore
    pub const EJECT_MARGIN: f64 = 2.0;
    /// Initial spore speed, units/second
    pub const SPORE_SPEED: f64 = 300.0;
    /// Per-tick damping, on top of the linear ramp to zero
    pub const SPORE_DAMPING: f64 = 0.98;
    /// Length of the spore slowdown window in ticks; velocity is zero at its end
    pub const SPORE_VEL_ZERO_FRAMES: u32 = 60;
    /// Ticks during which the ejecting team cannot eat its own spore
    pub const SPORE_GRACE_FRAMES: u32 = 30;
}

/// Thorn constants
pub mod thorns {
    pub const MIN_MASS: f64 = 10_000.0;
    pub const MAX_MASS: f64 = 15_000.0;
    /// Drift speed gained after eating a spore, units/second
    pub const SPORE_HIT_SPEED: f64 = 100.0;
    /// Ticks for the drift to decay to zero
    pub const VEL_ZERO_FRAMES: u32 = 60;
    /// Max pieces produced by a thorns split
    pub const SPLIT_MAX: usize = 10;
    /// Mass cap per piece produced by a thorns split
    pub const SPLIT_MAX_SCORE: f64 = 5000.0;
    /// Outward boost of thorns split pieces, units/second
    pub const SPLIT_BOOST_SPEED: f64 = 200.0;
}

/// Spawner defaults
pub mod spawn {
    pub const FOOD_INIT: usize = 800;
    pub const FOOD_MAX: usize = 900;
    pub const FOOD_REFRESH_FRAMES: u64 = 24;
    pub const FOOD_REFRESH_PERCENT: f64 = 0.01;
    pub const THORNS_INIT: usize = 9;
    pub const THORNS_MAX: usize = 12;
    pub const THORNS_REFRESH_FRAMES: u64 = 360;
    pub const THORNS_REFRESH_PERCENT: f64 = 0.2;
    /// Ticks before uneaten food is retired
    pub const FOOD_MAX_AGE: u64 = 60 * 60 * 3;
    pub const CLEANUP_INTERVAL: u64 = 300;
    pub const CLEANUP_BATCH: usize = 20;
    /// Maximum attempts to find a free spawn position
    pub const MAX_SPAWN_ATTEMPTS: u32 = 30;
    /// Extra clearance kept from live player cells when spawning
    pub const SAFE_MARGIN: f64 = 5.0;
    /// Clearance between a joining player and other players
    pub const PLAYER_SAFE_DISTANCE: f64 = 60.0;
    /// Ticks before an eliminated player respawns
    pub const RESPAWN_DELAY: u64 = 120;
}

/// Quadtree tuning
pub mod spatial {
    pub const MAX_PER_NODE: usize = 8;
    pub const MAX_DEPTH: u32 = 8;
    /// Slack added to collision queries for fast movers
    pub const QUERY_MARGIN: f64 = 10.0;
}

/// AI bot constants
pub mod ai {
    /// Ticks between AI decisions
    pub const DECISION_INTERVAL: u64 = 6;
    pub const VIEW_RADIUS: f64 = 300.0;
    pub const THREAT_RADIUS: f64 = 250.0;
    /// Enemies below this multiple of my mass are not threats
    pub const THREAT_MASS_RATIO: f64 = 1.1;
    pub const HIGH_THREAT_THRESHOLD: f64 = 0.8;
    /// Threat above which escape uses a split
    pub const ESCAPE_SPLIT_THREAT: f64 = 5.0;
    pub const HAZARD_RADIUS: f64 = 60.0;
    /// Weight of the tangential component when steering around hazards
    pub const HAZARD_TANGENT_WEIGHT: f64 = 0.6;
    pub const DENSITY_RADIUS: f64 = 80.0;
    pub const DENSITY_THRESHOLD: usize = 10;
    /// Food near an enemy this large is unsafe
    pub const DANGER_RADIUS: f64 = 100.0;
    pub const CLUSTER_RADIUS: f64 = 40.0;
    /// Bonus per neighbouring food item
    pub const CLUSTER_BONUS_PER_FOOD: f64 = 0.15;
    /// A new food target must beat the locked one by this factor
    pub const TARGET_SWITCH_FACTOR: f64 = 1.5;
    pub const SPLIT_ATTACK_RANGE: f64 = 120.0;
    pub const RANDOM_SPLIT_CHANCE: f64 = 0.01;
    pub const RANDOM_EJECT_CHANCE: f64 = 0.01;
}

/// Observation capacities
pub mod observation {
    pub const FOOD_CAP: usize = 50;
    pub const THORNS_CAP: usize = 20;
    pub const SPORE_CAP: usize = 10;
    pub const CLONE_CAP: usize = 30;
    /// Minimum half-extent of a view rectangle
    pub const VIEW_BASE: f64 = 180.0;
    /// Additional half-extent per unit of total-mass radius
    pub const VIEW_MASS_SCALE: f64 = 6.0;
}

/// Calculate radius from mass
#[inline]
pub fn mass_to_radius(mass: f64) -> f64 {
    (mass / 100.0 * mass::RADIUS_K1 + mass::RADIUS_K2).sqrt() * mass::RADIUS_SCALE
}

/// Calculate mass from radius (inverse of mass_to_radius)
#[inline]
pub fn radius_to_mass(radius: f64) -> f64 {
    let r = radius / mass::RADIUS_SCALE;
    (r * r - mass::RADIUS_K2) / mass::RADIUS_K1 * 100.0
}

/// Max speed for a cell of the given mass: BASE_SPEED at MIN_MASS, slower as it grows
#[inline]
pub fn max_speed(mass: f64) -> f64 {
    physics::BASE_SPEED / (mass.max(mass::MIN_MASS) / mass::MIN_MASS).sqrt()
}

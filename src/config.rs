use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::game::constants::{ai, lifecycle, physics, spawn, spore};

/// Arena configuration error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Arena border must be positive and finite, got {width}x{height}")]
    InvalidBorder { width: f64, height: f64 },
    #[error("{name} must be in {range}, got {value}")]
    OutOfRange {
        name: &'static str,
        range: &'static str,
        value: f64,
    },
    #[error("{init_name} ({init}) cannot exceed {max_name} ({max})")]
    InitExceedsMax {
        init_name: &'static str,
        init: usize,
        max_name: &'static str,
        max: usize,
    },
    #[error("{0} must be at least 1")]
    Zero(&'static str),
}

/// Arena configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Arena width; the arena spans [0, width] x [0, height]
    pub border_width: f64,
    pub border_height: f64,
    pub food_init: usize,
    pub food_max: usize,
    /// Ticks between food refreshes
    pub food_refresh_frames: u64,
    /// Fraction of the food deficit refilled per refresh
    pub food_refresh_percent: f64,
    pub thorns_init: usize,
    pub thorns_max: usize,
    pub thorns_refresh_frames: u64,
    pub thorns_refresh_percent: f64,
    pub eat_ratio: f64,
    pub split_min_mass: f64,
    pub eject_min_mass: f64,
    pub max_split_count: usize,
    /// Ticks after a split before merging is allowed
    pub merge_delay: u32,
    pub decay_start_mass: f64,
    pub decay_rate: f64,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Ticks before uneaten food is retired
    pub food_max_age: u64,
    pub cleanup_interval: u64,
    pub cleanup_batch: usize,
    /// Ticks before an eliminated player respawns; None disables respawn
    pub respawn_delay: Option<u64>,
    /// Ticks between AI decisions
    pub ai_decision_interval: u64,
    /// Seed for the simulation RNG
    pub seed: u64,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            border_width: 1000.0,
            border_height: 1000.0,
            food_init: spawn::FOOD_INIT,
            food_max: spawn::FOOD_MAX,
            food_refresh_frames: spawn::FOOD_REFRESH_FRAMES,
            food_refresh_percent: spawn::FOOD_REFRESH_PERCENT,
            thorns_init: spawn::THORNS_INIT,
            thorns_max: spawn::THORNS_MAX,
            thorns_refresh_frames: spawn::THORNS_REFRESH_FRAMES,
            thorns_refresh_percent: spawn::THORNS_REFRESH_PERCENT,
            eat_ratio: lifecycle::EAT_RATIO,
            split_min_mass: lifecycle::SPLIT_MIN_MASS,
            eject_min_mass: spore::EJECT_MIN_MASS,
            max_split_count: lifecycle::MAX_SPLIT_COUNT,
            merge_delay: lifecycle::MERGE_DELAY,
            decay_start_mass: lifecycle::DECAY_START_MASS,
            decay_rate: lifecycle::DECAY_RATE,
            tick_rate: physics::TICK_RATE,
            food_max_age: spawn::FOOD_MAX_AGE,
            cleanup_interval: spawn::CLEANUP_INTERVAL,
            cleanup_batch: spawn::CLEANUP_BATCH,
            respawn_delay: Some(spawn::RESPAWN_DELAY),
            ai_decision_interval: ai::DECISION_INTERVAL,
            seed: 0x00C0_FFEE,
        }
    }
}

/// Parse `name` from the environment into `target`, keeping the default on
/// parse failure or when `accept` rejects the value.
fn env_override<T>(name: &str, target: &mut T, accept: impl Fn(&T) -> bool)
where
    T: FromStr,
{
    let Ok(raw) = std::env::var(name) else {
        return;
    };
    match raw.parse::<T>() {
        Ok(parsed) if accept(&parsed) => *target = parsed,
        Ok(_) => tracing::warn!("{} '{}' out of range, using default", name, raw),
        Err(_) => tracing::warn!("Invalid {} '{}', using default", name, raw),
    }
}

fn positive(v: &f64) -> bool {
    v.is_finite() && *v > 0.0
}

fn fraction(v: &f64) -> bool {
    (0.0..=1.0).contains(v)
}

impl ArenaConfig {
    /// Load config from ARENA_* environment variables or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        env_override("ARENA_WIDTH", &mut config.border_width, positive);
        env_override("ARENA_HEIGHT", &mut config.border_height, positive);
        env_override("ARENA_FOOD_INIT", &mut config.food_init, |_| true);
        env_override("ARENA_FOOD_MAX", &mut config.food_max, |_| true);
        env_override("ARENA_FOOD_REFRESH_FRAMES", &mut config.food_refresh_frames, |v| *v > 0);
        env_override("ARENA_FOOD_REFRESH_PERCENT", &mut config.food_refresh_percent, fraction);
        env_override("ARENA_THORNS_INIT", &mut config.thorns_init, |_| true);
        env_override("ARENA_THORNS_MAX", &mut config.thorns_max, |_| true);
        env_override("ARENA_THORNS_REFRESH_FRAMES", &mut config.thorns_refresh_frames, |v| *v > 0);
        env_override("ARENA_THORNS_REFRESH_PERCENT", &mut config.thorns_refresh_percent, fraction);
        env_override("ARENA_EAT_RATIO", &mut config.eat_ratio, |v| v.is_finite() && *v >= 1.0);
        env_override("ARENA_SPLIT_MIN_MASS", &mut config.split_min_mass, positive);
        env_override("ARENA_EJECT_MIN_MASS", &mut config.eject_min_mass, positive);
        env_override("ARENA_MAX_SPLIT_COUNT", &mut config.max_split_count, |v| *v > 0);
        env_override("ARENA_MERGE_DELAY", &mut config.merge_delay, |_| true);
        env_override("ARENA_DECAY_START_MASS", &mut config.decay_start_mass, positive);
        env_override("ARENA_DECAY_RATE", &mut config.decay_rate, fraction);
        env_override("ARENA_TICK_RATE", &mut config.tick_rate, |v| (1..=1000).contains(v));
        env_override("ARENA_FOOD_MAX_AGE", &mut config.food_max_age, |_| true);
        env_override("ARENA_CLEANUP_INTERVAL", &mut config.cleanup_interval, |v| *v > 0);
        env_override("ARENA_CLEANUP_BATCH", &mut config.cleanup_batch, |_| true);
        env_override("ARENA_AI_DECISION_INTERVAL", &mut config.ai_decision_interval, |v| *v > 0);
        env_override("ARENA_SEED", &mut config.seed, |_| true);

        if let Ok(raw) = std::env::var("ARENA_RESPAWN_DELAY") {
            if raw.eq_ignore_ascii_case("off") {
                config.respawn_delay = None;
            } else if let Ok(parsed) = raw.parse::<u64>() {
                config.respawn_delay = Some(parsed);
            } else {
                tracing::warn!("Invalid ARENA_RESPAWN_DELAY '{}', using default", raw);
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !positive(&self.border_width) || !positive(&self.border_height) {
            return Err(ConfigError::InvalidBorder {
                width: self.border_width,
                height: self.border_height,
            });
        }
        if self.food_init > self.food_max {
            return Err(ConfigError::InitExceedsMax {
                init_name: "food_init",
                init: self.food_init,
                max_name: "food_max",
                max: self.food_max,
            });
        }
        if self.thorns_init > self.thorns_max {
            return Err(ConfigError::InitExceedsMax {
                init_name: "thorns_init",
                init: self.thorns_init,
                max_name: "thorns_max",
                max: self.thorns_max,
            });
        }
        for (name, value) in [
            ("food_refresh_percent", self.food_refresh_percent),
            ("thorns_refresh_percent", self.thorns_refresh_percent),
            ("decay_rate", self.decay_rate),
        ] {
            if !fraction(&value) {
                return Err(ConfigError::OutOfRange {
                    name,
                    range: "[0, 1]",
                    value,
                });
            }
        }
        if !(self.eat_ratio.is_finite() && self.eat_ratio >= 1.0) {
            return Err(ConfigError::OutOfRange {
                name: "eat_ratio",
                range: "[1, inf)",
                value: self.eat_ratio,
            });
        }
        for (name, value) in [
            ("split_min_mass", self.split_min_mass),
            ("eject_min_mass", self.eject_min_mass),
            ("decay_start_mass", self.decay_start_mass),
        ] {
            if !positive(&value) {
                return Err(ConfigError::OutOfRange {
                    name,
                    range: "(0, inf)",
                    value,
                });
            }
        }
        if self.max_split_count == 0 {
            return Err(ConfigError::Zero("max_split_count"));
        }
        if self.tick_rate == 0 {
            return Err(ConfigError::Zero("tick_rate"));
        }
        if self.food_refresh_frames == 0 {
            return Err(ConfigError::Zero("food_refresh_frames"));
        }
        if self.thorns_refresh_frames == 0 {
            return Err(ConfigError::Zero("thorns_refresh_frames"));
        }
        if self.cleanup_interval == 0 {
            return Err(ConfigError::Zero("cleanup_interval"));
        }
        if self.ai_decision_interval == 0 {
            return Err(ConfigError::Zero("ai_decision_interval"));
        }
        Ok(())
    }

    /// Seconds per tick
    #[inline]
    pub fn dt(&self) -> f64 {
        1.0 / self.tick_rate.max(1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ArenaConfig::default();
        assert_eq!(config.border_width, 1000.0);
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.max_split_count, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_or_default() {
        let config = ArenaConfig::load_or_default();
        assert!(config.tick_rate > 0);
    }

    #[test]
    fn test_validate_rejects_bad_border() {
        let config = ArenaConfig {
            border_width: -5.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBorder { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_init_over_max() {
        let config = ArenaConfig {
            food_init: 10,
            food_max: 5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InitExceedsMax { init: 10, max: 5, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_tick_rate() {
        let config = ArenaConfig {
            tick_rate: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::Zero("tick_rate")));
    }

    #[test]
    fn test_validate_rejects_eat_ratio_below_one() {
        let config = ArenaConfig {
            eat_ratio: 0.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dt() {
        let config = ArenaConfig {
            tick_rate: 20,
            ..Default::default()
        };
        assert!((config.dt() - 0.05).abs() < 1e-12);
    }
}

//! Single speed multiplier combining reliability, damage and active effects.
use crate::config::SpeedConfig;
use crate::effects::ActiveEffects;
use crate::numbers::{clamp_range, clamp_unit};

/// `1 - max_degradation * (1 - r)`: a dead engine keeps 40% by default.
#[must_use]
pub fn reliability_factor(cfg: &SpeedConfig, engine_reliability: f32) -> f32 {
    (1.0 - clamp_unit(engine_reliability)).mul_add(-cfg.speed_degradation_max, 1.0)
}

#[must_use]
pub fn damage_factor(cfg: &SpeedConfig, damage: f32) -> f32 {
    clamp_unit(damage).mul_add(-cfg.damage_weight, 1.0)
}

/// Speed multiplier for the host. Runaway replaces every other term.
#[must_use]
pub fn speed_multiplier(
    cfg: &SpeedConfig,
    engine_reliability: f32,
    damage: f32,
    effects: &ActiveEffects,
) -> f32 {
    if let Some(runaway) = effects.runaway_factor {
        return runaway.max(1.0);
    }
    let flat = if effects.flat_tire { cfg.flat_factor } else { 1.0 };
    let factor = reliability_factor(cfg, engine_reliability)
        * damage_factor(cfg, damage)
        * flat
        * clamp_unit(effects.drag_factor);
    clamp_range(factor, cfg.floor, 1.0)
}

//! Actuator commands and the aggregate physical effect of active malfunctions.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::config::ReliabilityConfig;
use crate::numbers::{clamp_range, clamp_unit, progress};
use crate::state::{ImplementSlot, MalfunctionKind, Timestamp, VehicleReliabilityState};
use crate::tires::flat_steering_bias;

/// Abstract instruction for the host's actuation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "command")]
pub enum ActuatorCommand {
    StopMotor,
    /// Refuse motor starts; `until: None` holds until released.
    BlockMotorStart { until: Option<Timestamp> },
    ReleaseMotorStart,
    CancelAiJob,
    SetImplementLowered { slot: ImplementSlot, lowered: bool },
    SetImplementPower { slot: ImplementSlot, on: bool },
    AllImplementsOff,
    DetachImplement { slot: ImplementSlot },
    PowerStutter,
    /// Freeze hydraulic actuation; holds until `ResumeHydraulics`.
    HaltHydraulics,
    ResumeHydraulics,
}

pub type CommandQueue = SmallVec<[ActuatorCommand; 8]>;

/// Steering modification: a signed bias and a cap on wheel travel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteeringEffect {
    /// Negative pulls left, positive pulls right.
    pub bias: f32,
    /// Fraction of full steering travel available.
    pub travel_limit: f32,
}

impl Default for SteeringEffect {
    fn default() -> Self {
        Self {
            bias: 0.0,
            travel_limit: 1.0,
        }
    }
}

/// Combined effect of every active malfunction at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActiveEffects {
    pub steering: SteeringEffect,
    pub power_multiplier: f32,
    pub drag_factor: f32,
    pub brake_multiplier: f32,
    /// Runaway speed factor; overrides the normal speed governor when set.
    pub runaway_factor: Option<f32>,
    pub flat_tire: bool,
}

impl Default for ActiveEffects {
    fn default() -> Self {
        Self {
            steering: SteeringEffect::default(),
            power_multiplier: 1.0,
            drag_factor: 1.0,
            brake_multiplier: 1.0,
            runaway_factor: None,
            flat_tire: false,
        }
    }
}

/// Runaway ramp: 1.0 at onset rising linearly to `max_factor` over `ramp_ms`.
#[must_use]
pub fn runaway_factor(cfg: &ReliabilityConfig, started_at: Timestamp, now: Timestamp) -> f32 {
    let runaway = &cfg.malfunctions.runaway;
    let t = progress(now.saturating_sub(started_at), runaway.ramp_ms);
    (runaway.max_factor - 1.0).mul_add(t, 1.0)
}

/// Surge bias fades out over the tail of its duration.
fn surge_fade(cfg: &ReliabilityConfig, started_at: Timestamp, end: Option<Timestamp>, now: Timestamp) -> f32 {
    let Some(end) = end else {
        return 1.0;
    };
    let total = end.saturating_sub(started_at);
    let fraction = clamp_unit(cfg.malfunctions.surge_fade_fraction);
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let tail = (total as f64 * f64::from(fraction)) as u64;
    if tail == 0 {
        return 1.0;
    }
    let remaining = end.saturating_sub(now);
    if remaining >= tail {
        1.0
    } else {
        progress(remaining, tail)
    }
}

/// Fold active malfunctions into one set of multipliers.
#[must_use]
pub fn aggregate(
    state: &VehicleReliabilityState,
    cfg: &ReliabilityConfig,
    now: Timestamp,
) -> ActiveEffects {
    let m = &cfg.malfunctions;
    let mut effects = ActiveEffects::default();

    for kind in state.active_kinds() {
        let Some(instance) = state.instance(kind) else {
            continue;
        };
        match kind {
            MalfunctionKind::Misfire => {
                effects.power_multiplier *= m.misfire_power_factor;
            }
            MalfunctionKind::Overheat => {
                effects.power_multiplier *= m.overheat.power_factor;
            }
            MalfunctionKind::HydraulicSurge => {
                effects.steering.bias += instance.direction_or_severity
                    * surge_fade(cfg, instance.started_at, instance.end_time, now);
            }
            MalfunctionKind::ImplementPull => {
                effects.steering.bias += instance.direction_or_severity;
            }
            MalfunctionKind::ImplementDrag => {
                effects.drag_factor = effects.drag_factor.min(m.drag_speed_factor);
            }
            MalfunctionKind::ReducedTurning => {
                effects.steering.travel_limit =
                    effects.steering.travel_limit.min(m.reduced_turning_limit);
            }
            MalfunctionKind::Runaway => {
                effects.runaway_factor = Some(runaway_factor(cfg, instance.started_at, now));
                effects.brake_multiplier *= m.runaway.brake_factor;
            }
            MalfunctionKind::FlatTire => {
                effects.flat_tire = true;
            }
            _ => {}
        }
    }

    if state.tire.has_flat {
        effects.flat_tire = true;
        effects.steering.bias += flat_steering_bias(&cfg.tires, &state.tire);
    }
    effects.steering.bias = clamp_range(effects.steering.bias, -1.0, 1.0);
    effects.steering.travel_limit = clamp_unit(effects.steering.travel_limit);
    effects.power_multiplier = clamp_unit(effects.power_multiplier);
    effects
}

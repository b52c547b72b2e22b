//! Oil, hydraulic fluid and fuel: depletion, leaks and low-level penalties.
use serde::{Deserialize, Serialize};

use crate::config::{DegradationConfig, FluidConfig};
use crate::numbers::clamp_unit;
use crate::state::{FluidKind, LeakSeverity, SubsystemKind, VehicleReliabilityState};

/// Anything that can spring a leak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeakTarget {
    Oil,
    Hydraulic,
    Fuel,
}

/// `1 + (1 - level) * weight`: low fluid makes everything worse.
#[must_use]
pub fn chance_multiplier(level: f32, weight: f32) -> f32 {
    (1.0 - clamp_unit(level)).mul_add(weight.max(0.0), 1.0)
}

/// Fluid that protects a subsystem, if any.
#[must_use]
pub const fn fluid_for(subsystem: SubsystemKind) -> Option<FluidKind> {
    match subsystem {
        SubsystemKind::Engine => Some(FluidKind::Oil),
        SubsystemKind::Hydraulic => Some(FluidKind::Hydraulic),
        SubsystemKind::Electrical => None,
    }
}

/// Trigger-chance multiplier for malfunctions charged to `subsystem`.
#[must_use]
pub fn subsystem_chance_multiplier(
    state: &VehicleReliabilityState,
    cfg: &FluidConfig,
    subsystem: SubsystemKind,
) -> f32 {
    fluid_for(subsystem).map_or(1.0, |fluid| {
        chance_multiplier(state.fluids.get(fluid).level, cfg.fluid_chance_multiplier)
    })
}

/// Severity multiplier (stronger effects) for malfunctions charged to `subsystem`.
#[must_use]
pub fn subsystem_severity_multiplier(
    state: &VehicleReliabilityState,
    cfg: &FluidConfig,
    subsystem: SubsystemKind,
) -> f32 {
    fluid_for(subsystem).map_or(1.0, |fluid| {
        chance_multiplier(state.fluids.get(fluid).level, cfg.fluid_severity_multiplier)
    })
}

/// Leak severity from how far reliability sits below the leak threshold.
#[must_use]
pub fn severity_for_depth(depth: f32) -> LeakSeverity {
    let depth = clamp_unit(depth);
    if depth < 0.33 {
        LeakSeverity::Minor
    } else if depth < 0.66 {
        LeakSeverity::Moderate
    } else {
        LeakSeverity::Severe
    }
}

/// Drain fluids for one tick.
pub fn deplete(
    state: &mut VehicleReliabilityState,
    cfg: &FluidConfig,
    running: bool,
    hours: f32,
    hydraulic_actions: u32,
) {
    let hours = if hours.is_finite() { hours.max(0.0) } else { 0.0 };
    if running {
        let oil = &mut state.fluids.oil;
        let leak = oil.leak_severity.pick(&cfg.leak_multipliers);
        oil.level = clamp_unit(oil.level - cfg.oil_drain_per_hour * hours * leak);
    }

    let hydraulic = &mut state.fluids.hydraulic;
    let leak = hydraulic.leak_severity.pick(&cfg.leak_multipliers);
    #[allow(clippy::cast_precision_loss)]
    let actions = hydraulic_actions as f32;
    let mut drain = cfg.hydraulic_drain_per_action * actions * leak;
    if hydraulic.has_leak {
        drain += cfg.hydraulic_passive_leak_per_hour * hours * leak;
    }
    hydraulic.level = clamp_unit(hydraulic.level - drain);
}

/// Track time spent at the critical level; sustained running dry wears the owner.
///
/// Returns the fluids that crossed into the ran-dry state this call.
pub fn track_critical(
    state: &mut VehicleReliabilityState,
    cfg: &FluidConfig,
    running: bool,
    secs: f32,
) -> Vec<FluidKind> {
    let secs = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
    let mut newly_dry = Vec::new();
    for kind in FluidKind::ALL {
        let fluid = state.fluids.get_mut(kind);
        if fluid.level >= cfg.critical_level {
            fluid.critical_seconds = 0.0;
            continue;
        }
        if !running {
            continue;
        }
        fluid.critical_seconds += secs;
        if !fluid.ran_dry && fluid.critical_seconds >= cfg.ran_dry_seconds {
            fluid.ran_dry = true;
            newly_dry.push(kind);
        }
        if fluid.ran_dry {
            let owner = state.subsystems.get_mut(kind.owner());
            owner.reliability = (owner.reliability - cfg.ran_dry_wear_per_second * secs).max(0.0);
        }
    }
    for kind in &newly_dry {
        log::warn!("{} ran dry; {} wearing", kind.key(), kind.owner().key());
    }
    newly_dry
}

/// One-time permanent durability cut when a malfunction fires on a dry subsystem.
pub fn apply_ran_dry_cut(
    state: &mut VehicleReliabilityState,
    cfg: &FluidConfig,
    degradation: &DegradationConfig,
    subsystem: SubsystemKind,
) -> bool {
    let Some(kind) = fluid_for(subsystem) else {
        return false;
    };
    let fluid = state.fluids.get_mut(kind);
    if !fluid.ran_dry || fluid.ran_dry_cut_applied {
        return false;
    }
    fluid.ran_dry_cut_applied = true;
    let target = state.subsystems.get_mut(subsystem);
    target.durability_ceiling =
        (target.durability_ceiling - cfg.ran_dry_ceiling_cut).max(degradation.ceiling_floor);
    state.enforce_invariants();
    true
}

/// Open a leak of the given severity.
pub fn start_leak(
    state: &mut VehicleReliabilityState,
    cfg: &FluidConfig,
    target: LeakTarget,
    severity: LeakSeverity,
) {
    let severity = if severity == LeakSeverity::None {
        LeakSeverity::Minor
    } else {
        severity
    };
    match target {
        LeakTarget::Oil | LeakTarget::Hydraulic => {
            let fluid = state.fluids.get_mut(leak_fluid(target));
            fluid.has_leak = true;
            fluid.leak_severity = severity;
        }
        LeakTarget::Fuel => {
            state.fuel.has_leak = true;
            state.fuel.leak_multiplier = severity.pick(&cfg.fuel_leak_multipliers);
        }
    }
}

const fn leak_fluid(target: LeakTarget) -> FluidKind {
    match target {
        LeakTarget::Hydraulic => FluidKind::Hydraulic,
        LeakTarget::Oil | LeakTarget::Fuel => FluidKind::Oil,
    }
}

/// Seal a leak. Returns `false` when there was nothing to fix.
pub fn fix_leak(state: &mut VehicleReliabilityState, target: LeakTarget) -> bool {
    match target {
        LeakTarget::Oil | LeakTarget::Hydraulic => {
            let fluid = state.fluids.get_mut(leak_fluid(target));
            let had = fluid.has_leak;
            fluid.has_leak = false;
            fluid.leak_severity = LeakSeverity::None;
            had
        }
        LeakTarget::Fuel => {
            let had = state.fuel.has_leak;
            state.fuel.has_leak = false;
            state.fuel.leak_multiplier = 1.0;
            had
        }
    }
}

/// Top a fluid back up. Clears the dry-run episode but never restores the ceiling cut.
pub fn refill(state: &mut VehicleReliabilityState, kind: FluidKind) {
    let fluid = state.fluids.get_mut(kind);
    fluid.level = 1.0;
    fluid.critical_seconds = 0.0;
    fluid.ran_dry = false;
    fluid.ran_dry_cut_applied = false;
}

/// Fuel-consumption multiplier the host should apply.
#[must_use]
pub fn fuel_usage_multiplier(state: &VehicleReliabilityState) -> f32 {
    if state.fuel.has_leak {
        state.fuel.leak_multiplier.max(1.0)
    } else {
        1.0
    }
}

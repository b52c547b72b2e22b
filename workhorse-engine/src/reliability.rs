//! Failure probability curve and ceiling degradation on repair and breakdown.
use serde::{Deserialize, Serialize};

use crate::config::{DegradationConfig, FailureCurveConfig};
use crate::numbers::{clamp_range, clamp_unit};
use crate::state::{SubsystemKind, VehicleReliabilityState};

/// Which part of the vehicle a repair call covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "subsystem")]
pub enum RepairScope {
    Full,
    Subsystem(SubsystemKind),
}

impl RepairScope {
    #[must_use]
    pub fn covers(self, kind: SubsystemKind) -> bool {
        match self {
            Self::Full => true,
            Self::Subsystem(target) => target == kind,
        }
    }
}

/// Per-second failure probability for one subsystem.
///
/// The result is always positive (the base floor keeps a perfect component
/// from being immortal) and never exceeds `cfg.probability_cap`.
#[must_use]
pub fn failure_probability(
    cfg: &FailureCurveConfig,
    reliability: f32,
    damage: f32,
    operating_hours: f32,
    load: f32,
    fluid_multiplier: f32,
) -> f32 {
    let wear = 1.0 - clamp_unit(reliability);
    let damage = clamp_unit(damage);
    let load = clamp_unit(load);
    let hours = if operating_hours.is_finite() {
        operating_hours.max(0.0)
    } else {
        0.0
    };
    let fluid = if fluid_multiplier.is_finite() {
        fluid_multiplier.max(0.0)
    } else {
        1.0
    };

    let base = wear
        .powf(cfg.progressive_failure_exponent)
        .mul_add(cfg.progressive_failure_multiplier, cfg.base_floor);
    let damage_term = cfg.damage_weight.mul_add(damage, 1.0);
    let hours_term = if cfg.hours_scale > 0.0 {
        1.0 + (hours / cfg.hours_scale).min(cfg.hours_cap)
    } else {
        1.0
    };
    let load_term = (load * wear).mul_add(cfg.load_weight, 1.0);

    clamp_range(
        base * damage_term * hours_term * load_term * fluid,
        0.0,
        cfg.probability_cap,
    )
}

/// Fractional ceiling loss for one breakdown given the quality trait.
#[must_use]
pub fn breakdown_factor(cfg: &DegradationConfig, quality_trait: f32) -> f32 {
    let lemon = 1.0 - clamp_unit(quality_trait);
    let degradation = lemon.mul_add(cfg.breakdown_lemon, cfg.breakdown_base);
    if quality_trait >= cfg.workhorse_trait {
        degradation * cfg.workhorse_factor
    } else {
        degradation
    }
}

/// Shrink ceilings after a breakdown and bump the breakdown counter.
///
/// `component` is the subsystem that failed; kinds without one (flat tires)
/// only cost lifetime ceiling. Returns the degradation fraction applied.
pub fn breakdown_degradation(
    state: &mut VehicleReliabilityState,
    cfg: &DegradationConfig,
    component: Option<SubsystemKind>,
) -> f32 {
    let degradation = breakdown_factor(cfg, state.quality_trait());
    state.reliability_ceiling =
        (state.reliability_ceiling * (1.0 - degradation)).max(cfg.ceiling_floor);
    if let Some(kind) = component {
        let subsystem = state.subsystems.get_mut(kind);
        let cut = clamp_unit(cfg.component_factor * degradation);
        subsystem.durability_ceiling =
            (subsystem.durability_ceiling * (1.0 - cut)).max(cfg.ceiling_floor);
    }
    state.counters.breakdown_count = state.counters.breakdown_count.saturating_add(1);
    state.enforce_invariants();
    degradation
}

/// Ceiling loss that accompanies a repair. Returns `false` for repair-immune vehicles.
pub fn repair_degradation(
    state: &mut VehicleReliabilityState,
    cfg: &DegradationConfig,
    scope: RepairScope,
) -> bool {
    let quality = state.quality_trait();
    if quality >= cfg.repair_immunity_trait {
        return false;
    }
    let lemon = 1.0 - quality;
    state.reliability_ceiling = (state.reliability_ceiling
        * lemon.mul_add(-cfg.repair_ceiling_rate, 1.0))
    .max(cfg.ceiling_floor);
    let durability_keep = lemon.mul_add(-cfg.repair_durability_rate, 1.0);
    for (kind, subsystem) in state.subsystems.iter_mut() {
        if scope.covers(kind) {
            subsystem.durability_ceiling =
                (subsystem.durability_ceiling * durability_keep).max(cfg.ceiling_floor);
        }
    }
    state.enforce_invariants();
    true
}

/// Repair: degrade ceilings, raise covered subsystems by the bonus and clear their seizures.
pub fn repair_bonus(state: &mut VehicleReliabilityState, cfg: &DegradationConfig, scope: RepairScope) {
    repair_degradation(state, cfg, scope);
    let global = state.reliability_ceiling;
    for (kind, subsystem) in state.subsystems.iter_mut() {
        if !scope.covers(kind) {
            continue;
        }
        let cap = global.min(subsystem.durability_ceiling);
        subsystem.reliability = (subsystem.reliability + cfg.repair_bonus).min(cap);
        subsystem.seized = false;
    }
    state.counters.repair_count = state.counters.repair_count.saturating_add(1);
    state.enforce_invariants();
}

/// Wear every subsystem for `hours` of running time; lemons wear faster.
pub fn apply_usage_wear(state: &mut VehicleReliabilityState, cfg: &DegradationConfig, hours: f32) {
    if hours.is_nan() || hours <= 0.0 {
        return;
    }
    let rate = cfg.usage_wear_per_hour * (1.5 - state.quality_trait());
    let loss = rate * hours;
    for (_, subsystem) in state.subsystems.iter_mut() {
        subsystem.reliability = (subsystem.reliability - loss).max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve() -> FailureCurveConfig {
        FailureCurveConfig::default()
    }

    #[test]
    fn failure_probability_is_positive_and_capped() {
        let cfg = curve();
        let perfect = failure_probability(&cfg, 1.0, 0.0, 0.0, 0.0, 1.0);
        assert!(perfect > 0.0);
        assert!((perfect - cfg.base_floor).abs() < 1e-9);

        let dead = failure_probability(&cfg, 0.0, 1.0, 50_000.0, 1.0, 3.0);
        assert!((dead - cfg.probability_cap).abs() < f32::EPSILON);

        let garbage = failure_probability(&cfg, f32::NAN, -4.0, f32::INFINITY, 9.0, f32::NAN);
        assert!((0.0..=cfg.probability_cap).contains(&garbage));
    }

    #[test]
    fn failure_probability_rises_as_reliability_falls() {
        let cfg = curve();
        let mut previous = 0.0;
        for step in (0..=10).rev() {
            let r = step as f32 / 10.0;
            let p = failure_probability(&cfg, r, 0.0, 0.0, 0.2, 1.0);
            assert!(p >= previous, "r={r} p={p} prev={previous}");
            previous = p;
        }
    }

    #[test]
    fn workhorse_breakdowns_cost_thirty_percent() {
        let cfg = DegradationConfig::default();
        let standard = cfg.breakdown_base + 0.05 * cfg.breakdown_lemon;
        let actual = breakdown_factor(&cfg, 0.95);
        assert!((actual - standard * 0.3).abs() < 1e-6);
        let lemon = breakdown_factor(&cfg, 0.2);
        assert!((lemon - (cfg.breakdown_base + 0.8 * cfg.breakdown_lemon)).abs() < 1e-6);
    }

    #[test]
    fn breakdown_shrinks_component_more_than_global() {
        let cfg = DegradationConfig::default();
        let mut state = VehicleReliabilityState::with_trait(0.5);
        let d = breakdown_degradation(&mut state, &cfg, Some(SubsystemKind::Hydraulic));
        assert!((state.reliability_ceiling - (1.0 - d)).abs() < 1e-6);
        assert!(
            (state.subsystems.hydraulic.durability_ceiling - (1.0 - 1.5 * d)).abs() < 1e-6
        );
        assert!((state.subsystems.engine.durability_ceiling - 1.0).abs() < f32::EPSILON);
        assert_eq!(state.counters.breakdown_count, 1);
        assert!(state.subsystems.hydraulic.reliability <= state.ceiling_for(SubsystemKind::Hydraulic));
    }

    #[test]
    fn repair_immunity_leaves_ceilings_untouched() {
        let cfg = DegradationConfig::default();
        let mut state = VehicleReliabilityState::with_trait(0.92);
        for _ in 0..25 {
            assert!(!repair_degradation(&mut state, &cfg, RepairScope::Full));
        }
        assert!((state.reliability_ceiling - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn repair_bonus_respects_ceilings_and_clears_seizure() {
        let cfg = DegradationConfig::default();
        let mut state = VehicleReliabilityState::with_trait(0.1);
        state.subsystems.engine.reliability = 0.95;
        state.subsystems.engine.seized = true;
        state.subsystems.electrical.reliability = 0.2;
        repair_bonus(&mut state, &cfg, RepairScope::Full);
        let cap = state.ceiling_for(SubsystemKind::Engine);
        assert!(cap < 1.0);
        assert!((state.subsystems.engine.reliability - cap).abs() < 1e-6);
        assert!(!state.subsystems.engine.seized);
        assert!((state.subsystems.electrical.reliability - 0.35).abs() < 1e-6);
        assert_eq!(state.counters.repair_count, 1);
    }

    #[test]
    fn subsystem_repair_touches_only_its_target() {
        let cfg = DegradationConfig::default();
        let mut state = VehicleReliabilityState::with_trait(0.5);
        state.subsystems.engine.reliability = 0.4;
        state.subsystems.hydraulic.reliability = 0.4;
        state.subsystems.hydraulic.seized = true;
        repair_bonus(
            &mut state,
            &cfg,
            RepairScope::Subsystem(SubsystemKind::Engine),
        );
        assert!((state.subsystems.engine.reliability - 0.55).abs() < 1e-6);
        assert!((state.subsystems.hydraulic.reliability - 0.4).abs() < 1e-6);
        assert!(state.subsystems.hydraulic.seized);
        assert!((state.subsystems.hydraulic.durability_ceiling - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn usage_wear_scales_with_trait() {
        let cfg = DegradationConfig::default();
        let mut lemon = VehicleReliabilityState::with_trait(0.0);
        let mut workhorse = VehicleReliabilityState::with_trait(1.0);
        apply_usage_wear(&mut lemon, &cfg, 10.0);
        apply_usage_wear(&mut workhorse, &cfg, 10.0);
        assert!(lemon.subsystems.engine.reliability < workhorse.subsystems.engine.reliability);
        assert!((1.0 - lemon.subsystems.engine.reliability - 0.03).abs() < 1e-5);
    }
}

//! Tread wear, flat risk and traction.
use serde::{Deserialize, Serialize};

use crate::config::{MalfunctionTuning, TireConfig};
use crate::numbers::{clamp_unit, lerp};
use crate::state::{FlatSide, TireState, TireTier, VehicleReliabilityState};

/// Ambient surface conditions reported by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weather {
    #[serde(default)]
    pub wet: bool,
    #[serde(default)]
    pub snow: bool,
}

/// Wear multiplier from the quality trait: lemons chew through tread.
#[must_use]
pub fn dna_wear_multiplier(cfg: &TireConfig, quality_trait: f32) -> f32 {
    lerp(cfg.dna_wear_worst, cfg.dna_wear_best, clamp_unit(quality_trait))
}

/// Wear the tread for `km` driven. Returns the condition lost.
pub fn apply_wear(state: &mut VehicleReliabilityState, cfg: &TireConfig, km: f32) -> f32 {
    if !km.is_finite() || km <= 0.0 {
        return 0.0;
    }
    let dna = dna_wear_multiplier(cfg, state.quality_trait());
    let tire = &mut state.tire;
    let wear = km * cfg.tire_wear_rate_per_km * tire.quality_tier.pick(&cfg.wear_multipliers) * dna;
    let before = tire.condition;
    tire.condition = clamp_unit(tire.condition - wear);
    tire.distance_km += km;
    before - tire.condition
}

/// Per-tick flat chance: zero above the threshold, rising with depth below it.
#[must_use]
pub fn flat_chance(
    cfg: &TireConfig,
    tuning: &MalfunctionTuning,
    condition: f32,
    tier: TireTier,
    quality_trait: f32,
) -> f32 {
    if tuning.threshold <= 0.0 {
        return 0.0;
    }
    let condition = clamp_unit(condition);
    if condition >= tuning.threshold {
        return 0.0;
    }
    let depth = (tuning.threshold - condition) / tuning.threshold;
    clamp_unit(
        tuning.base_chance
            * depth
            * tier.pick(&cfg.failure_multipliers)
            * dna_wear_multiplier(cfg, quality_trait),
    )
}

/// Grip multiplier from tier, tread, weather and flat state.
#[must_use]
pub fn traction_multiplier(cfg: &TireConfig, tire: &TireState, weather: Weather) -> f32 {
    let condition_term = lerp(cfg.traction_floor, 1.0, clamp_unit(tire.condition));
    let mut traction = tire.quality_tier.pick(&cfg.base_traction) * condition_term;
    if weather.wet {
        traction *= 1.0 - cfg.wet_penalty;
    }
    if weather.snow {
        traction *= 1.0 - cfg.snow_penalty;
    }
    if tire.has_flat {
        traction *= cfg.flat_traction_factor;
    }
    traction.max(0.0)
}

/// Steering pull from a flat, signed by side.
#[must_use]
pub fn flat_steering_bias(cfg: &TireConfig, tire: &TireState) -> f32 {
    if tire.has_flat {
        tire.flat_side.sign() * cfg.flat_steering_bias
    } else {
        0.0
    }
}

pub fn puncture(state: &mut VehicleReliabilityState, side: FlatSide) {
    state.tire.has_flat = true;
    state.tire.flat_side = side;
}

/// Patch a flat without touching tread.
pub fn repair_flat(state: &mut VehicleReliabilityState) -> bool {
    let had = state.tire.has_flat;
    state.tire.has_flat = false;
    had
}

/// Fit a new set of the given tier.
pub fn replace(state: &mut VehicleReliabilityState, tier: TireTier) {
    state.tire = TireState {
        condition: 1.0,
        quality_tier: tier,
        has_flat: false,
        flat_side: FlatSide::default(),
        distance_km: 0.0,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MalfunctionKind;

    #[test]
    fn dna_wear_runs_from_worst_to_best() {
        let cfg = TireConfig::default();
        assert!((dna_wear_multiplier(&cfg, 0.0) - 1.4).abs() < 1e-6);
        assert!((dna_wear_multiplier(&cfg, 1.0) - 0.6).abs() < 1e-6);
        assert!((dna_wear_multiplier(&cfg, 0.5) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn retreads_wear_three_times_faster_than_quality() {
        let cfg = TireConfig::default();
        let mut retread = VehicleReliabilityState::with_trait(0.5);
        retread.tire.quality_tier = TireTier::Retread;
        let mut quality = VehicleReliabilityState::with_trait(0.5);
        quality.tire.quality_tier = TireTier::Quality;
        let a = apply_wear(&mut retread, &cfg, 100.0);
        let b = apply_wear(&mut quality, &cfg, 100.0);
        assert!((a / b - 2.0 / 0.67).abs() < 1e-3);
        assert!((retread.tire.distance_km - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn flat_chance_zero_above_threshold() {
        let cfg = TireConfig::default();
        let tuning = MalfunctionTuning::stock(MalfunctionKind::FlatTire);
        assert!(flat_chance(&cfg, &tuning, 0.8, TireTier::Normal, 0.5).abs() < f32::EPSILON);
        let retread = flat_chance(&cfg, &tuning, 0.1, TireTier::Retread, 0.5);
        let quality = flat_chance(&cfg, &tuning, 0.1, TireTier::Quality, 0.5);
        assert!(retread > quality);
        assert!((retread / quality - 6.0).abs() < 1e-3);
    }

    #[test]
    fn traction_penalises_weather_wear_and_flats() {
        let cfg = TireConfig::default();
        let fresh = TireState::default();
        let dry = traction_multiplier(&cfg, &fresh, Weather::default());
        assert!((dry - 1.0).abs() < 1e-6);
        let wet = traction_multiplier(
            &cfg,
            &fresh,
            Weather {
                wet: true,
                snow: false,
            },
        );
        assert!((wet - 0.85).abs() < 1e-6);

        let mut bald = TireState {
            condition: 0.0,
            ..TireState::default()
        };
        assert!((traction_multiplier(&cfg, &bald, Weather::default()) - 0.6).abs() < 1e-6);
        bald.has_flat = true;
        assert!((traction_multiplier(&cfg, &bald, Weather::default()) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn replace_resets_tread_and_odometer() {
        let mut state = VehicleReliabilityState::default();
        state.tire.condition = 0.2;
        state.tire.distance_km = 4_000.0;
        puncture(&mut state, FlatSide::Right);
        assert!(state.tire.has_flat);
        replace(&mut state, TireTier::Quality);
        assert!(!state.tire.has_flat);
        assert!((state.tire.condition - 1.0).abs() < f32::EPSILON);
        assert_eq!(state.tire.quality_tier, TireTier::Quality);
        assert!(state.tire.distance_km.abs() < f32::EPSILON);
    }
}

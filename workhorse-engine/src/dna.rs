//! Quality-trait ("DNA") draws for fresh and pre-owned vehicles.
use num_traits::cast::cast;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::config::{DegradationConfig, DnaConfig};
use crate::numbers::{clamp_unit, lerp};
use crate::reliability::{RepairScope, repair_degradation};
use crate::rng::SimRng;
use crate::state::VehicleReliabilityState;

/// Upper bound on replayed prior repairs so absurd hour counts stay cheap.
const MAX_PRIOR_REPAIRS: u32 = 400;

/// Seller tier a pre-owned vehicle was bought from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SellerTier {
    Rough,
    #[default]
    Fair,
    Good,
    Premium,
}

impl SellerTier {
    pub const ALL: [Self; 4] = [Self::Rough, Self::Fair, Self::Good, Self::Premium];

    const fn index(self) -> usize {
        match self {
            Self::Rough => 0,
            Self::Fair => 1,
            Self::Good => 2,
            Self::Premium => 3,
        }
    }
}

/// What the host knows about a vehicle changing hands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PreOwnedProfile {
    pub tier: SellerTier,
    pub operating_hours: f32,
}

fn sample_trait(rng: &mut SimRng, mean: f32, spread: f32) -> f32 {
    Normal::new(mean, spread.max(0.0)).map_or(mean, |dist| dist.sample(rng))
}

/// Trait for a factory-fresh vehicle: a narrow bell around the fleet mean.
pub fn draw_fresh_trait(rng: &mut SimRng, cfg: &DnaConfig) -> f32 {
    clamp_unit(sample_trait(rng, cfg.fresh_mean, cfg.fresh_spread))
}

/// Trait for a pre-owned vehicle, correlated with the seller's tier.
pub fn draw_preowned_trait(rng: &mut SimRng, cfg: &DnaConfig, tier: SellerTier) -> f32 {
    let mean = cfg.tier_means[tier.index()];
    clamp_unit(sample_trait(rng, mean, cfg.preowned_spread))
}

/// Repairs the previous owners are assumed to have made.
#[must_use]
pub fn estimated_prior_repairs(cfg: &DnaConfig, profile: &PreOwnedProfile) -> u32 {
    if !profile.operating_hours.is_finite() || profile.operating_hours <= 0.0 {
        return 0;
    }
    if cfg.hours_per_repair <= 0.0 {
        return 0;
    }
    let raw = profile.operating_hours / cfg.hours_per_repair
        * cfg.tier_repair_factors[profile.tier.index()];
    cast::<f32, u32>(raw.floor())
        .unwrap_or(MAX_PRIOR_REPAIRS)
        .min(MAX_PRIOR_REPAIRS)
}

/// Brand-new vehicle with a freshly drawn trait and pristine subsystems.
pub fn fresh_state(rng: &mut SimRng, cfg: &DnaConfig) -> VehicleReliabilityState {
    VehicleReliabilityState::with_trait(draw_fresh_trait(rng, cfg))
}

/// Pre-owned vehicle: tier-correlated trait, ceilings worn by the estimated
/// repair history and reliabilities drawn from the tier's band.
pub fn pre_owned_state(
    rng: &mut SimRng,
    cfg: &DnaConfig,
    degradation: &DegradationConfig,
    profile: &PreOwnedProfile,
) -> VehicleReliabilityState {
    let quality = draw_preowned_trait(rng, cfg, profile.tier);
    let mut state = VehicleReliabilityState::with_trait(quality);
    let repairs = estimated_prior_repairs(cfg, profile);
    for _ in 0..repairs {
        if !repair_degradation(&mut state, degradation, RepairScope::Full) {
            break;
        }
    }
    state.counters.repair_count = repairs;

    let (lo, hi) = cfg.tier_reliability_bands[profile.tier.index()];
    for (_, subsystem) in state.subsystems.iter_mut() {
        subsystem.reliability = lerp(lo, hi, rng.unit());
    }
    state.enforce_invariants();
    log::debug!(
        "pre-owned vehicle drawn: tier={:?} repairs={} ceiling={:.3}",
        profile.tier,
        repairs,
        state.reliability_ceiling
    );
    state
}

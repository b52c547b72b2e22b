//! Injected source of reliability and tire readings.
//!
//! Hosts that run another wear system can implement [`ReliabilityProvider`]
//! to feed its numbers into the malfunction rolls; everyone else gets
//! [`NativeProvider`], which reads this crate's own state.
use crate::config::TireConfig;
use crate::state::{SubsystemKind, VehicleReliabilityState};
use crate::tires::{Weather, traction_multiplier};

pub trait ReliabilityProvider {
    /// Reliability used for trigger and seizure math.
    fn reliability(&self, state: &VehicleReliabilityState, kind: SubsystemKind) -> f32 {
        state.effective_reliability(kind)
    }

    /// Tread condition used for flat-tire rolls.
    fn tire_condition(&self, state: &VehicleReliabilityState) -> f32 {
        state.tire.condition
    }

    fn traction(&self, state: &VehicleReliabilityState, cfg: &TireConfig, weather: Weather) -> f32 {
        traction_multiplier(cfg, &state.tire, weather)
    }
}

/// Reads everything from [`VehicleReliabilityState`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NativeProvider;

impl ReliabilityProvider for NativeProvider {}

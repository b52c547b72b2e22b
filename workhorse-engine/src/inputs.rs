//! Per-tick readings the host hands to the engine.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::numbers::clamp_unit;
use crate::state::ImplementSlot;
use crate::tires::Weather;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementInput {
    pub slot: ImplementSlot,
    #[serde(default = "ImplementInput::default_attached")]
    pub attached: bool,
    #[serde(default)]
    pub lowered: bool,
    #[serde(default)]
    pub powered: bool,
}

impl ImplementInput {
    const fn default_attached() -> bool {
        true
    }

    #[must_use]
    pub const fn new(slot: u16) -> Self {
        Self {
            slot: ImplementSlot(slot),
            attached: true,
            lowered: false,
            powered: false,
        }
    }

    #[must_use]
    pub const fn lowered(mut self, lowered: bool) -> Self {
        self.lowered = lowered;
        self
    }

    #[must_use]
    pub const fn powered(mut self, powered: bool) -> Self {
        self.powered = powered;
        self
    }
}

pub type ImplementSet = SmallVec<[ImplementInput; 4]>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleInputs {
    #[serde(default)]
    pub motor_running: bool,
    /// Host-side body damage in `[0, 1]`.
    #[serde(default)]
    pub damage: f32,
    /// Cumulative operating hours on the vehicle.
    #[serde(default)]
    pub operating_hours: f32,
    /// Motor load in `[0, 1]`.
    #[serde(default)]
    pub motor_load: f32,
    #[serde(default)]
    pub speed_kph: f32,
    /// Distance covered since the previous tick.
    #[serde(default)]
    pub distance_km: f32,
    /// Hydraulic actuations since the previous tick.
    #[serde(default)]
    pub hydraulic_actions: u32,
    #[serde(default)]
    pub implements: ImplementSet,
    #[serde(default)]
    pub weather: Weather,
    /// The controlling player is looking at this vehicle.
    #[serde(default)]
    pub has_focus: bool,
    #[serde(default)]
    pub crash_detected: bool,
    #[serde(default)]
    pub ai_job_active: bool,
}

fn non_negative(value: f32) -> f32 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

impl VehicleInputs {
    /// Copy with every numeric reading clamped into its documented range.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let clean = Self {
            damage: clamp_unit(self.damage),
            operating_hours: non_negative(self.operating_hours),
            motor_load: clamp_unit(self.motor_load),
            speed_kph: non_negative(self.speed_kph),
            distance_km: non_negative(self.distance_km),
            ..self.clone()
        };
        if clean != *self {
            log::debug!("vehicle inputs clamped into range");
        }
        clean
    }

    pub fn attached(&self) -> impl Iterator<Item = &ImplementInput> + '_ {
        self.implements.iter().filter(|i| i.attached)
    }

    #[must_use]
    pub fn implement(&self, slot: ImplementSlot) -> Option<&ImplementInput> {
        self.implements.iter().find(|i| i.slot == slot)
    }

    #[must_use]
    pub fn is_moving(&self) -> bool {
        self.speed_kph > 0.0
    }
}

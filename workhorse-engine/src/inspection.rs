//! Mechanic's-eye view of a vehicle. Everything is banded so the hidden
//! quality trait never leaks to the host verbatim.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::state::{
    FluidKind, LeakSeverity, MalfunctionKind, SubsystemKind, TireTier, VehicleReliabilityState,
};

const BAND_EXCELLENT: f32 = 0.85;
const BAND_GOOD: f32 = 0.65;
const BAND_FAIR: f32 = 0.45;
const BAND_POOR: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionBand {
    Critical,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl ConditionBand {
    #[must_use]
    pub fn from_value(value: f32) -> Self {
        if value >= BAND_EXCELLENT {
            Self::Excellent
        } else if value >= BAND_GOOD {
            Self::Good
        } else if value >= BAND_FAIR {
            Self::Fair
        } else if value >= BAND_POOR {
            Self::Poor
        } else {
            Self::Critical
        }
    }
}

/// Coarse read on build quality, as an experienced mechanic would phrase it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityHint {
    Lemon,
    BelowAverage,
    Average,
    AboveAverage,
    Workhorse,
}

impl QualityHint {
    #[must_use]
    pub fn from_trait(quality_trait: f32) -> Self {
        match quality_trait {
            t if t < 0.30 => Self::Lemon,
            t if t < 0.50 => Self::BelowAverage,
            t if t < 0.70 => Self::Average,
            t if t < 0.90 => Self::AboveAverage,
            _ => Self::Workhorse,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsystemReport {
    pub kind: SubsystemKind,
    pub condition: ConditionBand,
    pub ceiling: ConditionBand,
    pub seized: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluidReport {
    pub kind: FluidKind,
    pub level: f32,
    pub leak: LeakSeverity,
    pub ran_dry: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TireReport {
    pub condition: ConditionBand,
    pub tier: TireTier,
    pub has_flat: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionReport {
    pub subsystems: SmallVec<[SubsystemReport; 3]>,
    pub ceiling: ConditionBand,
    pub fluids: SmallVec<[FluidReport; 2]>,
    pub fuel_leak: bool,
    pub tire: TireReport,
    pub active: Vec<MalfunctionKind>,
    pub quality: QualityHint,
    pub repair_count: u32,
    pub breakdown_count: u32,
}

impl InspectionReport {
    #[must_use]
    pub fn of(state: &VehicleReliabilityState) -> Self {
        let subsystems = SubsystemKind::ALL
            .into_iter()
            .map(|kind| {
                let subsystem = state.subsystem(kind);
                SubsystemReport {
                    kind,
                    condition: ConditionBand::from_value(subsystem.reliability),
                    ceiling: ConditionBand::from_value(state.ceiling_for(kind)),
                    seized: subsystem.seized,
                }
            })
            .collect();
        let fluids = FluidKind::ALL
            .into_iter()
            .map(|kind| {
                let fluid = state.fluids.get(kind);
                FluidReport {
                    kind,
                    level: fluid.level,
                    leak: fluid.leak_severity,
                    ran_dry: fluid.ran_dry,
                }
            })
            .collect();
        Self {
            subsystems,
            ceiling: ConditionBand::from_value(state.reliability_ceiling),
            fluids,
            fuel_leak: state.fuel.has_leak,
            tire: TireReport {
                condition: ConditionBand::from_value(state.tire.condition),
                tier: state.tire.quality_tier,
                has_flat: state.tire.has_flat,
            },
            active: state.active_kinds().collect(),
            quality: QualityHint::from_trait(state.quality_trait()),
            repair_count: state.counters.repair_count,
            breakdown_count: state.counters.breakdown_count,
        }
    }

    #[must_use]
    pub fn any_seized(&self) -> bool {
        self.subsystems.iter().any(|s| s.seized)
    }

    /// Worst subsystem band, the headline a mechanic would lead with.
    #[must_use]
    pub fn worst(&self) -> ConditionBand {
        self.subsystems
            .iter()
            .map(|s| if s.seized { ConditionBand::Critical } else { s.condition })
            .min()
            .unwrap_or(ConditionBand::Critical)
    }
}

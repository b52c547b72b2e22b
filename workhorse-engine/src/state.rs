//! Per-vehicle reliability state owned by the engine.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::CEILING_FLOOR;
use crate::numbers::{clamp_range, clamp_unit};

/// Monotonic simulation time in milliseconds, supplied by the host.
pub type Timestamp = u64;

/// Opaque handle the host uses to address a managed vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityHandle(pub u64);

/// Host-side implement slot identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImplementSlot(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsystemKind {
    Engine,
    Hydraulic,
    Electrical,
}

impl SubsystemKind {
    pub const ALL: [Self; 3] = [Self::Engine, Self::Hydraulic, Self::Electrical];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Engine => "engine",
            Self::Hydraulic => "hydraulic",
            Self::Electrical => "electrical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FluidKind {
    Oil,
    Hydraulic,
}

impl FluidKind {
    pub const ALL: [Self; 2] = [Self::Oil, Self::Hydraulic];

    /// Subsystem that wears when this fluid runs low.
    #[must_use]
    pub const fn owner(self) -> SubsystemKind {
        match self {
            Self::Oil => SubsystemKind::Engine,
            Self::Hydraulic => SubsystemKind::Hydraulic,
        }
    }

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Oil => "oil",
            Self::Hydraulic => "hydraulic_fluid",
        }
    }
}

/// Leak severity, serialized as its numeric level (0-3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", from = "u8")]
pub enum LeakSeverity {
    #[default]
    None,
    Minor,
    Moderate,
    Severe,
}

impl LeakSeverity {
    #[must_use]
    pub const fn level(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Minor => 1,
            Self::Moderate => 2,
            Self::Severe => 3,
        }
    }

    /// Pick a value from a `[minor, moderate, severe]` table; `None` yields 1.0.
    #[must_use]
    pub fn pick(self, table: &[f32; 3]) -> f32 {
        match self {
            Self::None => 1.0,
            Self::Minor => table[0],
            Self::Moderate => table[1],
            Self::Severe => table[2],
        }
    }
}

impl From<LeakSeverity> for u8 {
    fn from(value: LeakSeverity) -> Self {
        value.level()
    }
}

impl From<u8> for LeakSeverity {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Minor,
            2 => Self::Moderate,
            _ => Self::Severe,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TireTier {
    Retread,
    #[default]
    Normal,
    Quality,
}

impl TireTier {
    /// Pick a value from a `[retread, normal, quality]` table.
    #[must_use]
    pub const fn pick(self, table: &[f32; 3]) -> f32 {
        match self {
            Self::Retread => table[0],
            Self::Normal => table[1],
            Self::Quality => table[2],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlatSide {
    #[default]
    Left,
    Right,
}

impl FlatSide {
    /// Steering sign: a flat on the left pulls left (negative).
    #[must_use]
    pub const fn sign(self) -> f32 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
        }
    }
}

/// Every malfunction the engine can inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalfunctionKind {
    EngineStall,
    Misfire,
    Overheat,
    HydraulicSurge,
    Runaway,
    ImplementStuckUp,
    ImplementStuckDown,
    ImplementPull,
    ImplementDrag,
    ReducedTurning,
    PtoToggle,
    HitchFailure,
    ElectricalCutout,
    FlatTire,
    OilLeak,
    HydraulicLeak,
    FuelLeak,
}

impl MalfunctionKind {
    pub const ALL: [Self; 17] = [
        Self::EngineStall,
        Self::Misfire,
        Self::Overheat,
        Self::HydraulicSurge,
        Self::Runaway,
        Self::ImplementStuckUp,
        Self::ImplementStuckDown,
        Self::ImplementPull,
        Self::ImplementDrag,
        Self::ReducedTurning,
        Self::PtoToggle,
        Self::HitchFailure,
        Self::ElectricalCutout,
        Self::FlatTire,
        Self::OilLeak,
        Self::HydraulicLeak,
        Self::FuelLeak,
    ];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::EngineStall => "engine_stall",
            Self::Misfire => "misfire",
            Self::Overheat => "overheat",
            Self::HydraulicSurge => "hydraulic_surge",
            Self::Runaway => "runaway",
            Self::ImplementStuckUp => "implement_stuck_up",
            Self::ImplementStuckDown => "implement_stuck_down",
            Self::ImplementPull => "implement_pull",
            Self::ImplementDrag => "implement_drag",
            Self::ReducedTurning => "reduced_turning",
            Self::PtoToggle => "pto_toggle",
            Self::HitchFailure => "hitch_failure",
            Self::ElectricalCutout => "electrical_cutout",
            Self::FlatTire => "flat_tire",
            Self::OilLeak => "oil_leak",
            Self::HydraulicLeak => "hydraulic_leak",
            Self::FuelLeak => "fuel_leak",
        }
    }

    /// Subsystem charged with the breakdown when this kind fires.
    #[must_use]
    pub const fn subsystem(self) -> Option<SubsystemKind> {
        match self {
            Self::EngineStall | Self::Misfire | Self::Overheat | Self::Runaway => {
                Some(SubsystemKind::Engine)
            }
            Self::OilLeak | Self::FuelLeak => Some(SubsystemKind::Engine),
            Self::HydraulicSurge
            | Self::ImplementStuckUp
            | Self::ImplementStuckDown
            | Self::ImplementPull
            | Self::ImplementDrag
            | Self::ReducedTurning
            | Self::HitchFailure
            | Self::HydraulicLeak => Some(SubsystemKind::Hydraulic),
            Self::PtoToggle | Self::ElectricalCutout => Some(SubsystemKind::Electrical),
            Self::FlatTire => None,
        }
    }

    /// Temporary malfunctions may escalate into a seizure of their subsystem.
    #[must_use]
    pub const fn is_temporary(self) -> bool {
        matches!(
            self,
            Self::EngineStall
                | Self::Misfire
                | Self::Overheat
                | Self::HydraulicSurge
                | Self::ImplementStuckUp
                | Self::ImplementStuckDown
                | Self::ImplementPull
                | Self::ImplementDrag
                | Self::ReducedTurning
                | Self::PtoToggle
                | Self::ElectricalCutout
        )
    }

    /// Persistent malfunctions stay active until the vehicle is serviced.
    #[must_use]
    pub const fn is_persistent(self) -> bool {
        matches!(
            self,
            Self::FlatTire | Self::OilLeak | Self::HydraulicLeak | Self::FuelLeak
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Subsystem {
    pub reliability: f32,
    pub durability_ceiling: f32,
    #[serde(default)]
    pub seized: bool,
}

impl Default for Subsystem {
    fn default() -> Self {
        Self {
            reliability: 1.0,
            durability_ceiling: 1.0,
            seized: false,
        }
    }
}

/// The three subsystem records, addressable by [`SubsystemKind`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Subsystems {
    pub engine: Subsystem,
    pub hydraulic: Subsystem,
    pub electrical: Subsystem,
}

impl Subsystems {
    #[must_use]
    pub const fn get(&self, kind: SubsystemKind) -> &Subsystem {
        match kind {
            SubsystemKind::Engine => &self.engine,
            SubsystemKind::Hydraulic => &self.hydraulic,
            SubsystemKind::Electrical => &self.electrical,
        }
    }

    pub const fn get_mut(&mut self, kind: SubsystemKind) -> &mut Subsystem {
        match kind {
            SubsystemKind::Engine => &mut self.engine,
            SubsystemKind::Hydraulic => &mut self.hydraulic,
            SubsystemKind::Electrical => &mut self.electrical,
        }
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SubsystemKind, &mut Subsystem)> {
        let [engine, hydraulic, electrical] = SubsystemKind::ALL;
        [
            (engine, &mut self.engine),
            (hydraulic, &mut self.hydraulic),
            (electrical, &mut self.electrical),
        ]
        .into_iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FluidState {
    pub level: f32,
    #[serde(default)]
    pub has_leak: bool,
    #[serde(default)]
    pub leak_severity: LeakSeverity,
    /// Seconds spent continuously below the critical level.
    #[serde(default)]
    pub critical_seconds: f32,
    #[serde(default)]
    pub ran_dry: bool,
    /// The permanent ceiling cut for this dry-run episode has been taken.
    #[serde(default)]
    pub ran_dry_cut_applied: bool,
}

impl Default for FluidState {
    fn default() -> Self {
        Self {
            level: 1.0,
            has_leak: false,
            leak_severity: LeakSeverity::None,
            critical_seconds: 0.0,
            ran_dry: false,
            ran_dry_cut_applied: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Fluids {
    pub oil: FluidState,
    pub hydraulic: FluidState,
}

impl Fluids {
    #[must_use]
    pub const fn get(&self, kind: FluidKind) -> &FluidState {
        match kind {
            FluidKind::Oil => &self.oil,
            FluidKind::Hydraulic => &self.hydraulic,
        }
    }

    pub const fn get_mut(&mut self, kind: FluidKind) -> &mut FluidState {
        match kind {
            FluidKind::Oil => &mut self.oil,
            FluidKind::Hydraulic => &mut self.hydraulic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuelState {
    #[serde(default)]
    pub has_leak: bool,
    #[serde(default = "FuelState::default_leak_multiplier")]
    pub leak_multiplier: f32,
}

impl FuelState {
    const fn default_leak_multiplier() -> f32 {
        1.0
    }
}

impl Default for FuelState {
    fn default() -> Self {
        Self {
            has_leak: false,
            leak_multiplier: Self::default_leak_multiplier(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TireState {
    pub condition: f32,
    #[serde(default)]
    pub quality_tier: TireTier,
    #[serde(default)]
    pub has_flat: bool,
    #[serde(default)]
    pub flat_side: FlatSide,
    /// Kilometres driven on the current set.
    #[serde(default)]
    pub distance_km: f32,
}

impl Default for TireState {
    fn default() -> Self {
        Self {
            condition: 1.0,
            quality_tier: TireTier::Normal,
            has_flat: false,
            flat_side: FlatSide::Left,
            distance_km: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MalfunctionInstance {
    pub active: bool,
    #[serde(default)]
    pub started_at: Timestamp,
    /// `None` for malfunctions that persist until serviced.
    #[serde(default)]
    pub end_time: Option<Timestamp>,
    /// Steering direction (-1/+1) or a severity scalar, depending on the kind.
    #[serde(default)]
    pub direction_or_severity: f32,
    #[serde(default)]
    pub has_shown_warning: bool,
    /// Implement the malfunction is pinned to, if any.
    #[serde(default)]
    pub target: Option<ImplementSlot>,
    #[serde(default)]
    pub pulses_remaining: u8,
}

impl MalfunctionInstance {
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.active && self.end_time.is_some_and(|end| now >= end)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    #[serde(default)]
    pub repair_count: u32,
    #[serde(default)]
    pub breakdown_count: u32,
    #[serde(default)]
    pub seizure_count: u32,
}

/// Complete reliability record for one managed vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleReliabilityState {
    quality_trait: f32,
    pub reliability_ceiling: f32,
    #[serde(default)]
    pub subsystems: Subsystems,
    #[serde(default)]
    pub fluids: Fluids,
    #[serde(default)]
    pub fuel: FuelState,
    #[serde(default)]
    pub tire: TireState,
    #[serde(default)]
    pub malfunctions: BTreeMap<MalfunctionKind, MalfunctionInstance>,
    #[serde(default)]
    pub last_malfunction_time: Option<Timestamp>,
    #[serde(default)]
    pub counters: Counters,
    /// Normalised engine temperature; 1.0 forces a stall.
    #[serde(default)]
    pub engine_heat: f32,
    /// Motor held off after reaching maximum heat, until it cools to the restart heat.
    #[serde(default)]
    pub heat_lockout: bool,
    #[serde(default)]
    pub last_tick_at: Option<Timestamp>,
}

impl VehicleReliabilityState {
    /// Build a pristine state around an already-drawn quality trait.
    #[must_use]
    pub fn with_trait(quality_trait: f32) -> Self {
        Self {
            quality_trait: clamp_unit(quality_trait),
            reliability_ceiling: 1.0,
            subsystems: Subsystems::default(),
            fluids: Fluids::default(),
            fuel: FuelState::default(),
            tire: TireState::default(),
            malfunctions: BTreeMap::new(),
            last_malfunction_time: None,
            counters: Counters::default(),
            engine_heat: 0.0,
            heat_lockout: false,
            last_tick_at: None,
        }
    }

    /// Hidden quality trait. There is deliberately no setter.
    #[must_use]
    pub const fn quality_trait(&self) -> f32 {
        self.quality_trait
    }

    #[must_use]
    pub const fn subsystem(&self, kind: SubsystemKind) -> &Subsystem {
        self.subsystems.get(kind)
    }

    /// Effective cap for a subsystem: the lower of both ceilings.
    #[must_use]
    pub fn ceiling_for(&self, kind: SubsystemKind) -> f32 {
        self.reliability_ceiling
            .min(self.subsystems.get(kind).durability_ceiling)
    }

    /// Reliability used for probability math; seized subsystems count as zero.
    #[must_use]
    pub fn effective_reliability(&self, kind: SubsystemKind) -> f32 {
        let subsystem = self.subsystems.get(kind);
        if subsystem.seized {
            0.0
        } else {
            subsystem.reliability
        }
    }

    #[must_use]
    pub fn is_active(&self, kind: MalfunctionKind) -> bool {
        self.malfunctions.get(&kind).is_some_and(|m| m.active)
    }

    #[must_use]
    pub fn instance(&self, kind: MalfunctionKind) -> Option<&MalfunctionInstance> {
        self.malfunctions.get(&kind).filter(|m| m.active)
    }

    pub fn instance_mut(&mut self, kind: MalfunctionKind) -> &mut MalfunctionInstance {
        self.malfunctions.entry(kind).or_default()
    }

    pub fn active_kinds(&self) -> impl Iterator<Item = MalfunctionKind> + '_ {
        self.malfunctions
            .iter()
            .filter(|(_, m)| m.active)
            .map(|(kind, _)| *kind)
    }

    #[must_use]
    pub fn cooldown_clear(&self, now: Timestamp, cooldown_ms: u64) -> bool {
        self.last_malfunction_time
            .is_none_or(|last| now.saturating_sub(last) >= cooldown_ms)
    }

    /// Clamp every bounded field back into range and re-apply the ceiling cap.
    pub fn enforce_invariants(&mut self) {
        self.quality_trait = clamp_unit(self.quality_trait);
        self.reliability_ceiling = clamp_range(self.reliability_ceiling, CEILING_FLOOR, 1.0);
        let global = self.reliability_ceiling;
        for (_, subsystem) in self.subsystems.iter_mut() {
            subsystem.durability_ceiling =
                clamp_range(subsystem.durability_ceiling, CEILING_FLOOR, 1.0);
            let cap = global.min(subsystem.durability_ceiling);
            subsystem.reliability = clamp_range(subsystem.reliability, 0.0, cap);
        }
        for kind in FluidKind::ALL {
            let fluid = self.fluids.get_mut(kind);
            fluid.level = clamp_unit(fluid.level);
            fluid.critical_seconds = fluid.critical_seconds.max(0.0);
            if !fluid.has_leak {
                fluid.leak_severity = LeakSeverity::None;
            } else if fluid.leak_severity == LeakSeverity::None {
                fluid.leak_severity = LeakSeverity::Minor;
            }
        }
        if self.fuel.leak_multiplier.is_nan() || self.fuel.leak_multiplier < 1.0 {
            self.fuel.leak_multiplier = 1.0;
        }
        if !self.fuel.has_leak {
            self.fuel.leak_multiplier = 1.0;
        }
        self.tire.condition = clamp_unit(self.tire.condition);
        self.tire.distance_km = self.tire.distance_km.max(0.0);
        self.engine_heat = clamp_unit(self.engine_heat);
    }
}

impl Default for VehicleReliabilityState {
    fn default() -> Self {
        Self::with_trait(0.5)
    }
}

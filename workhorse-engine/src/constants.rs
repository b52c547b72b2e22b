//! Centralized default tuning for the reliability engine.
//!
//! Every value here seeds a `Default` in [`crate::config`]. Hosts that want to
//! retune the simulation do so through a `ReliabilityConfig`; these constants
//! only define what "stock" behaviour looks like.

// Message keys ---------------------------------------------------------------
pub(crate) const MSG_PREFIX: &str = "malfunction";
pub(crate) const MSG_SEIZED_PREFIX: &str = "seizure";

// Failure curve ----------------------------------------------------------------
pub(crate) const FAILURE_BASE_FLOOR: f32 = 1e-5;
pub(crate) const FAILURE_EXPONENT: f32 = 2.0;
pub(crate) const FAILURE_MULTIPLIER: f32 = 0.025;
pub(crate) const FAILURE_DAMAGE_WEIGHT: f32 = 2.0;
pub(crate) const FAILURE_HOURS_SCALE: f32 = 20_000.0;
pub(crate) const FAILURE_HOURS_CAP: f32 = 0.5;
pub(crate) const FAILURE_LOAD_WEIGHT: f32 = 3.0;
pub(crate) const FAILURE_PROBABILITY_CAP: f32 = 0.05;

// Ceilings and degradation -------------------------------------------------------
pub(crate) const CEILING_FLOOR: f32 = 0.30;
pub(crate) const REPAIR_BONUS: f32 = 0.15;
pub(crate) const REPAIR_IMMUNITY_TRAIT: f32 = 0.90;
pub(crate) const REPAIR_CEILING_RATE: f32 = 0.02;
pub(crate) const REPAIR_DURABILITY_RATE: f32 = 0.01;
pub(crate) const BREAKDOWN_BASE_DEGRADATION: f32 = 0.03;
pub(crate) const BREAKDOWN_LEMON_DEGRADATION: f32 = 0.05;
pub(crate) const BREAKDOWN_WORKHORSE_TRAIT: f32 = 0.95;
pub(crate) const BREAKDOWN_WORKHORSE_FACTOR: f32 = 0.3;
pub(crate) const BREAKDOWN_COMPONENT_FACTOR: f32 = 1.5;
pub(crate) const USAGE_WEAR_PER_HOUR: f32 = 0.002;

// Quality trait draws --------------------------------------------------------------
pub(crate) const DNA_FRESH_MEAN: f32 = 0.65;
pub(crate) const DNA_FRESH_SPREAD: f32 = 0.08;
pub(crate) const DNA_PREOWNED_SPREAD: f32 = 0.15;
pub(crate) const DNA_TIER_MEANS: [f32; 4] = [0.35, 0.50, 0.62, 0.75];
pub(crate) const DNA_TIER_REPAIR_FACTORS: [f32; 4] = [1.6, 1.2, 1.0, 0.7];
pub(crate) const DNA_TIER_RELIABILITY_BANDS: [(f32, f32); 4] =
    [(0.30, 0.55), (0.45, 0.70), (0.60, 0.85), (0.75, 0.95)];
pub(crate) const DNA_HOURS_PER_REPAIR: f32 = 250.0;

// Fluids -------------------------------------------------------------------------
pub(crate) const FLUID_CHANCE_WEIGHT: f32 = 2.0;
pub(crate) const FLUID_SEVERITY_WEIGHT: f32 = 1.5;
pub(crate) const OIL_DRAIN_PER_HOUR: f32 = 0.01;
pub(crate) const HYDRAULIC_DRAIN_PER_ACTION: f32 = 0.0005;
pub(crate) const HYDRAULIC_PASSIVE_LEAK_PER_HOUR: f32 = 0.02;
pub(crate) const LEAK_MULTIPLIERS: [f32; 3] = [2.0, 5.0, 10.0];
pub(crate) const FUEL_LEAK_MULTIPLIERS: [f32; 3] = [1.25, 1.5, 2.0];
pub(crate) const OIL_LEAK_THRESHOLD: f32 = 0.50;
pub(crate) const HYDRAULIC_LEAK_THRESHOLD: f32 = 0.50;
pub(crate) const FUEL_LEAK_THRESHOLD: f32 = 0.40;
pub(crate) const LEAK_BASE_CHANCE: f32 = 0.0008;
pub(crate) const FLUID_CRITICAL_LEVEL: f32 = 0.10;
pub(crate) const FLUID_RAN_DRY_SECONDS: f32 = 30.0;
pub(crate) const FLUID_RAN_DRY_WEAR_PER_SECOND: f32 = 0.0005;
pub(crate) const FLUID_RAN_DRY_CEILING_CUT: f32 = 0.10;

// Tires --------------------------------------------------------------------------
pub(crate) const TIRE_WEAR_RATE_PER_KM: f32 = 0.000_1;
pub(crate) const TIRE_WEAR_MULTIPLIERS: [f32; 3] = [2.0, 1.0, 0.67];
pub(crate) const TIRE_FAILURE_MULTIPLIERS: [f32; 3] = [3.0, 1.0, 0.5];
pub(crate) const TIRE_BASE_TRACTION: [f32; 3] = [0.9, 1.0, 1.1];
pub(crate) const TIRE_DNA_WEAR_WORST: f32 = 1.4;
pub(crate) const TIRE_DNA_WEAR_BEST: f32 = 0.6;
pub(crate) const TIRE_TRACTION_FLOOR: f32 = 0.6;
pub(crate) const TIRE_WET_PENALTY: f32 = 0.15;
pub(crate) const TIRE_SNOW_PENALTY: f32 = 0.30;
pub(crate) const TIRE_FLAT_TRACTION_FACTOR: f32 = 0.5;
pub(crate) const TIRE_FLAT_THRESHOLD: f32 = 0.30;
pub(crate) const TIRE_FLAT_BASE_CHANCE: f32 = 0.002;
pub(crate) const TIRE_FLAT_STEERING_BIAS: f32 = 0.15;

// Seizure ------------------------------------------------------------------------
pub(crate) const SEIZURE_BASE_THRESHOLD: f32 = 0.40;
pub(crate) const SEIZURE_DNA_REDUCTION: f32 = 0.30;
pub(crate) const SEIZURE_MIN_CHANCE: f32 = 0.05;
pub(crate) const SEIZURE_MAX_CHANCE: f32 = 0.35;
pub(crate) const SEIZURE_LEMON_PENALTY: f32 = 0.15;
pub(crate) const SEIZURE_CHANCE_CAP: f32 = 0.70;

// Malfunctions -------------------------------------------------------------------
pub(crate) const GLOBAL_COOLDOWN_MS: u64 = 30_000;
pub(crate) const STALL_COOLDOWN_MS: u64 = 3_000;
pub(crate) const STALL_RESTART_DELAY_MS: u64 = 2_000;
pub(crate) const MISFIRE_BURST_MAX: u8 = 3;
pub(crate) const MISFIRE_POWER_FACTOR: f32 = 0.3;
pub(crate) const OVERHEAT_HEAT_RATE: f32 = 0.01;
pub(crate) const OVERHEAT_COOL_RATE: f32 = 0.004;
pub(crate) const OVERHEAT_IDLE_COOL_RATE: f32 = 0.02;
pub(crate) const OVERHEAT_START_HEAT: f32 = 0.85;
pub(crate) const OVERHEAT_RESTART_HEAT: f32 = 0.60;
pub(crate) const OVERHEAT_POWER_FACTOR: f32 = 0.6;
pub(crate) const SURGE_MIN_SPEED_KPH: f32 = 5.0;
pub(crate) const SURGE_STEERING_BIAS: f32 = 0.35;
pub(crate) const SURGE_FADE_FRACTION: f32 = 0.25;
pub(crate) const RUNAWAY_FLUID_LEVEL: f32 = 0.10;
pub(crate) const RUNAWAY_MIN_SPEED_KPH: f32 = 1.0;
pub(crate) const RUNAWAY_MAX_FACTOR: f32 = 1.5;
pub(crate) const RUNAWAY_RAMP_MS: u64 = 10_000;
pub(crate) const RUNAWAY_BRAKE_FACTOR: f32 = 0.4;
pub(crate) const STUCK_DURATION_MS: u64 = 45_000;
pub(crate) const PULL_STEERING_BIAS: f32 = 0.2;
pub(crate) const DRAG_SPEED_FACTOR: f32 = 0.6;
pub(crate) const REDUCED_TURNING_LIMIT: f32 = 0.55;
pub(crate) const CUTOUT_DURATION_MS: u64 = 3_000;

// Speed --------------------------------------------------------------------------
pub(crate) const SPEED_DEGRADATION_MAX: f32 = 0.6;
pub(crate) const SPEED_DAMAGE_WEIGHT: f32 = 0.5;
pub(crate) const SPEED_FLOOR: f32 = 0.2;
pub(crate) const SPEED_FLAT_FACTOR: f32 = 0.5;

// Warnings and cadence -------------------------------------------------------------
pub(crate) const WARNING_STARTUP_GRACE_MS: u64 = 10_000;
pub(crate) const NOMINAL_TICK_MS: u64 = 1_000;
pub(crate) const MAX_TICK_MS: u64 = 5_000;

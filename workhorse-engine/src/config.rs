//! Tunable thresholds, rates and multiplier curves.
//!
//! A [`ReliabilityConfig`] is built once (from defaults or JSON), validated,
//! sanitized and then handed to the engine, which only ever reads it.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::constants as k;
use crate::state::MalfunctionKind;

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    #[serde(default)]
    pub failure: FailureCurveConfig,
    #[serde(default)]
    pub degradation: DegradationConfig,
    #[serde(default)]
    pub dna: DnaConfig,
    #[serde(default)]
    pub fluids: FluidConfig,
    #[serde(default)]
    pub tires: TireConfig,
    #[serde(default)]
    pub seizure: SeizureConfig,
    #[serde(default)]
    pub malfunctions: MalfunctionConfig,
    #[serde(default)]
    pub speed: SpeedConfig,
    #[serde(default)]
    pub warnings: WarningConfig,
}

/// Errors raised when configuration invariants are violated.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("{field} must be at least {min:.4} (got {value:.4})")]
    MinViolation {
        field: &'static str,
        min: f32,
        value: f32,
    },
    #[error("{field} must be between {min:.4} and {max:.4} (got {value:.4})")]
    RangeViolation {
        field: &'static str,
        min: f32,
        max: f32,
        value: f32,
    },
    #[error("{field} bounds inverted (min {min} > max {max})")]
    BoundsInverted {
        field: &'static str,
        min: f32,
        max: f32,
    },
}

fn check_range(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    if value.is_nan() || !(min..=max).contains(&value) {
        return Err(ConfigError::RangeViolation {
            field,
            min,
            max,
            value,
        });
    }
    Ok(())
}

fn check_min(field: &'static str, value: f32, min: f32) -> Result<(), ConfigError> {
    if value.is_nan() || value < min {
        return Err(ConfigError::MinViolation { field, min, value });
    }
    Ok(())
}

impl ReliabilityConfig {
    /// Parse, validate and sanitize a JSON configuration document.
    ///
    /// Missing sections fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the JSON is malformed or a value is out of bounds.
    pub fn from_json(json_str: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            serde_json::from_str(json_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        config.sanitize();
        Ok(config)
    }

    /// Validate configuration invariants before sanitization.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.failure.validate()?;
        self.degradation.validate()?;
        self.dna.validate()?;
        self.fluids.validate()?;
        self.tires.validate()?;
        self.seizure.validate()?;
        self.malfunctions.validate()?;
        self.speed.validate()?;
        Ok(())
    }

    /// Repair degenerate-but-legal values (zero durations, inverted bounds) in place.
    pub fn sanitize(&mut self) {
        self.malfunctions.sanitize();
        if self.failure.hours_scale <= 0.0 {
            log::warn!("failure.hours_scale was non-positive; restoring default");
            self.failure.hours_scale = k::FAILURE_HOURS_SCALE;
        }
        if self.dna.hours_per_repair <= 0.0 {
            log::warn!("dna.hours_per_repair was non-positive; restoring default");
            self.dna.hours_per_repair = k::DNA_HOURS_PER_REPAIR;
        }
        if self.seizure.min_chance > self.seizure.max_chance {
            std::mem::swap(&mut self.seizure.min_chance, &mut self.seizure.max_chance);
        }
    }
}

/// Progressive failure curve shared by every subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureCurveConfig {
    #[serde(default = "FailureCurveConfig::default_base_floor")]
    pub base_floor: f32,
    #[serde(default = "FailureCurveConfig::default_exponent")]
    pub progressive_failure_exponent: f32,
    #[serde(default = "FailureCurveConfig::default_multiplier")]
    pub progressive_failure_multiplier: f32,
    #[serde(default = "FailureCurveConfig::default_damage_weight")]
    pub damage_weight: f32,
    #[serde(default = "FailureCurveConfig::default_hours_scale")]
    pub hours_scale: f32,
    #[serde(default = "FailureCurveConfig::default_hours_cap")]
    pub hours_cap: f32,
    #[serde(default = "FailureCurveConfig::default_load_weight")]
    pub load_weight: f32,
    #[serde(default = "FailureCurveConfig::default_probability_cap")]
    pub probability_cap: f32,
}

impl FailureCurveConfig {
    const fn default_base_floor() -> f32 {
        k::FAILURE_BASE_FLOOR
    }
    const fn default_exponent() -> f32 {
        k::FAILURE_EXPONENT
    }
    const fn default_multiplier() -> f32 {
        k::FAILURE_MULTIPLIER
    }
    const fn default_damage_weight() -> f32 {
        k::FAILURE_DAMAGE_WEIGHT
    }
    const fn default_hours_scale() -> f32 {
        k::FAILURE_HOURS_SCALE
    }
    const fn default_hours_cap() -> f32 {
        k::FAILURE_HOURS_CAP
    }
    const fn default_load_weight() -> f32 {
        k::FAILURE_LOAD_WEIGHT
    }
    const fn default_probability_cap() -> f32 {
        k::FAILURE_PROBABILITY_CAP
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_range("failure.base_floor", self.base_floor, 0.0, 0.01)?;
        check_range(
            "failure.progressive_failure_exponent",
            self.progressive_failure_exponent,
            0.5,
            6.0,
        )?;
        check_range(
            "failure.progressive_failure_multiplier",
            self.progressive_failure_multiplier,
            0.0,
            1.0,
        )?;
        check_min("failure.damage_weight", self.damage_weight, 0.0)?;
        check_min("failure.hours_scale", self.hours_scale, 0.0)?;
        check_min("failure.hours_cap", self.hours_cap, 0.0)?;
        check_min("failure.load_weight", self.load_weight, 0.0)?;
        check_range("failure.probability_cap", self.probability_cap, 0.0, 0.99)?;
        Ok(())
    }
}

impl Default for FailureCurveConfig {
    fn default() -> Self {
        Self {
            base_floor: Self::default_base_floor(),
            progressive_failure_exponent: Self::default_exponent(),
            progressive_failure_multiplier: Self::default_multiplier(),
            damage_weight: Self::default_damage_weight(),
            hours_scale: Self::default_hours_scale(),
            hours_cap: Self::default_hours_cap(),
            load_weight: Self::default_load_weight(),
            probability_cap: Self::default_probability_cap(),
        }
    }
}

/// Ceiling degradation applied on repairs and breakdowns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationConfig {
    #[serde(default = "DegradationConfig::default_ceiling_floor")]
    pub ceiling_floor: f32,
    #[serde(default = "DegradationConfig::default_repair_bonus")]
    pub repair_bonus: f32,
    #[serde(default = "DegradationConfig::default_repair_immunity_trait")]
    pub repair_immunity_trait: f32,
    #[serde(default = "DegradationConfig::default_repair_ceiling_rate")]
    pub repair_ceiling_rate: f32,
    #[serde(default = "DegradationConfig::default_repair_durability_rate")]
    pub repair_durability_rate: f32,
    #[serde(default = "DegradationConfig::default_breakdown_base")]
    pub breakdown_base: f32,
    #[serde(default = "DegradationConfig::default_breakdown_lemon")]
    pub breakdown_lemon: f32,
    #[serde(default = "DegradationConfig::default_workhorse_trait")]
    pub workhorse_trait: f32,
    #[serde(default = "DegradationConfig::default_workhorse_factor")]
    pub workhorse_factor: f32,
    #[serde(default = "DegradationConfig::default_component_factor")]
    pub component_factor: f32,
    #[serde(default = "DegradationConfig::default_usage_wear_per_hour")]
    pub usage_wear_per_hour: f32,
}

impl DegradationConfig {
    const fn default_ceiling_floor() -> f32 {
        k::CEILING_FLOOR
    }
    const fn default_repair_bonus() -> f32 {
        k::REPAIR_BONUS
    }
    const fn default_repair_immunity_trait() -> f32 {
        k::REPAIR_IMMUNITY_TRAIT
    }
    const fn default_repair_ceiling_rate() -> f32 {
        k::REPAIR_CEILING_RATE
    }
    const fn default_repair_durability_rate() -> f32 {
        k::REPAIR_DURABILITY_RATE
    }
    const fn default_breakdown_base() -> f32 {
        k::BREAKDOWN_BASE_DEGRADATION
    }
    const fn default_breakdown_lemon() -> f32 {
        k::BREAKDOWN_LEMON_DEGRADATION
    }
    const fn default_workhorse_trait() -> f32 {
        k::BREAKDOWN_WORKHORSE_TRAIT
    }
    const fn default_workhorse_factor() -> f32 {
        k::BREAKDOWN_WORKHORSE_FACTOR
    }
    const fn default_component_factor() -> f32 {
        k::BREAKDOWN_COMPONENT_FACTOR
    }
    const fn default_usage_wear_per_hour() -> f32 {
        k::USAGE_WEAR_PER_HOUR
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_range("degradation.ceiling_floor", self.ceiling_floor, 0.0, 1.0)?;
        check_range("degradation.repair_bonus", self.repair_bonus, 0.0, 1.0)?;
        check_range(
            "degradation.repair_immunity_trait",
            self.repair_immunity_trait,
            0.0,
            1.0,
        )?;
        check_range(
            "degradation.repair_ceiling_rate",
            self.repair_ceiling_rate,
            0.0,
            0.5,
        )?;
        check_range(
            "degradation.repair_durability_rate",
            self.repair_durability_rate,
            0.0,
            0.5,
        )?;
        check_range("degradation.breakdown_base", self.breakdown_base, 0.0, 0.5)?;
        check_range("degradation.breakdown_lemon", self.breakdown_lemon, 0.0, 0.5)?;
        check_range("degradation.workhorse_trait", self.workhorse_trait, 0.0, 1.0)?;
        check_range(
            "degradation.workhorse_factor",
            self.workhorse_factor,
            0.0,
            1.0,
        )?;
        check_range(
            "degradation.component_factor",
            self.component_factor,
            0.0,
            10.0,
        )?;
        check_min(
            "degradation.usage_wear_per_hour",
            self.usage_wear_per_hour,
            0.0,
        )?;
        Ok(())
    }
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            ceiling_floor: Self::default_ceiling_floor(),
            repair_bonus: Self::default_repair_bonus(),
            repair_immunity_trait: Self::default_repair_immunity_trait(),
            repair_ceiling_rate: Self::default_repair_ceiling_rate(),
            repair_durability_rate: Self::default_repair_durability_rate(),
            breakdown_base: Self::default_breakdown_base(),
            breakdown_lemon: Self::default_breakdown_lemon(),
            workhorse_trait: Self::default_workhorse_trait(),
            workhorse_factor: Self::default_workhorse_factor(),
            component_factor: Self::default_component_factor(),
            usage_wear_per_hour: Self::default_usage_wear_per_hour(),
        }
    }
}

/// Distributions the hidden quality trait is drawn from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnaConfig {
    #[serde(default = "DnaConfig::default_fresh_mean")]
    pub fresh_mean: f32,
    #[serde(default = "DnaConfig::default_fresh_spread")]
    pub fresh_spread: f32,
    #[serde(default = "DnaConfig::default_preowned_spread")]
    pub preowned_spread: f32,
    /// Means per seller tier: rough, fair, good, premium.
    #[serde(default = "DnaConfig::default_tier_means")]
    pub tier_means: [f32; 4],
    /// Multipliers on the estimated prior repair count per seller tier.
    #[serde(default = "DnaConfig::default_tier_repair_factors")]
    pub tier_repair_factors: [f32; 4],
    /// Starting reliability band per seller tier.
    #[serde(default = "DnaConfig::default_tier_reliability_bands")]
    pub tier_reliability_bands: [(f32, f32); 4],
    #[serde(default = "DnaConfig::default_hours_per_repair")]
    pub hours_per_repair: f32,
}

impl DnaConfig {
    const fn default_fresh_mean() -> f32 {
        k::DNA_FRESH_MEAN
    }
    const fn default_fresh_spread() -> f32 {
        k::DNA_FRESH_SPREAD
    }
    const fn default_preowned_spread() -> f32 {
        k::DNA_PREOWNED_SPREAD
    }
    const fn default_tier_means() -> [f32; 4] {
        k::DNA_TIER_MEANS
    }
    const fn default_tier_repair_factors() -> [f32; 4] {
        k::DNA_TIER_REPAIR_FACTORS
    }
    const fn default_tier_reliability_bands() -> [(f32, f32); 4] {
        k::DNA_TIER_RELIABILITY_BANDS
    }
    const fn default_hours_per_repair() -> f32 {
        k::DNA_HOURS_PER_REPAIR
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_range("dna.fresh_mean", self.fresh_mean, 0.0, 1.0)?;
        check_range("dna.fresh_spread", self.fresh_spread, 0.0, 0.5)?;
        check_range("dna.preowned_spread", self.preowned_spread, 0.0, 0.5)?;
        for &mean in &self.tier_means {
            check_range("dna.tier_means", mean, 0.0, 1.0)?;
        }
        for &factor in &self.tier_repair_factors {
            check_min("dna.tier_repair_factors", factor, 0.0)?;
        }
        for &(lo, hi) in &self.tier_reliability_bands {
            check_range("dna.tier_reliability_bands", lo, 0.0, 1.0)?;
            check_range("dna.tier_reliability_bands", hi, 0.0, 1.0)?;
            if lo > hi {
                return Err(ConfigError::BoundsInverted {
                    field: "dna.tier_reliability_bands",
                    min: lo,
                    max: hi,
                });
            }
        }
        check_min("dna.hours_per_repair", self.hours_per_repair, 0.0)?;
        Ok(())
    }
}

impl Default for DnaConfig {
    fn default() -> Self {
        Self {
            fresh_mean: Self::default_fresh_mean(),
            fresh_spread: Self::default_fresh_spread(),
            preowned_spread: Self::default_preowned_spread(),
            tier_means: Self::default_tier_means(),
            tier_repair_factors: Self::default_tier_repair_factors(),
            tier_reliability_bands: Self::default_tier_reliability_bands(),
            hours_per_repair: Self::default_hours_per_repair(),
        }
    }
}

/// Oil, hydraulic fluid and fuel depletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluidConfig {
    #[serde(default = "FluidConfig::default_chance_weight")]
    pub fluid_chance_multiplier: f32,
    #[serde(default = "FluidConfig::default_severity_weight")]
    pub fluid_severity_multiplier: f32,
    #[serde(default = "FluidConfig::default_oil_drain_per_hour")]
    pub oil_drain_per_hour: f32,
    #[serde(default = "FluidConfig::default_hydraulic_drain_per_action")]
    pub hydraulic_drain_per_action: f32,
    #[serde(default = "FluidConfig::default_hydraulic_passive_leak_per_hour")]
    pub hydraulic_passive_leak_per_hour: f32,
    /// Depletion multipliers for minor, moderate and severe leaks.
    #[serde(default = "FluidConfig::default_leak_multipliers")]
    pub leak_multipliers: [f32; 3],
    /// Fuel-usage multipliers for minor, moderate and severe fuel leaks.
    #[serde(default = "FluidConfig::default_fuel_leak_multipliers")]
    pub fuel_leak_multipliers: [f32; 3],
    #[serde(default = "FluidConfig::default_critical_level")]
    pub critical_level: f32,
    #[serde(default = "FluidConfig::default_ran_dry_seconds")]
    pub ran_dry_seconds: f32,
    #[serde(default = "FluidConfig::default_ran_dry_wear_per_second")]
    pub ran_dry_wear_per_second: f32,
    #[serde(default = "FluidConfig::default_ran_dry_ceiling_cut")]
    pub ran_dry_ceiling_cut: f32,
}

impl FluidConfig {
    const fn default_chance_weight() -> f32 {
        k::FLUID_CHANCE_WEIGHT
    }
    const fn default_severity_weight() -> f32 {
        k::FLUID_SEVERITY_WEIGHT
    }
    const fn default_oil_drain_per_hour() -> f32 {
        k::OIL_DRAIN_PER_HOUR
    }
    const fn default_hydraulic_drain_per_action() -> f32 {
        k::HYDRAULIC_DRAIN_PER_ACTION
    }
    const fn default_hydraulic_passive_leak_per_hour() -> f32 {
        k::HYDRAULIC_PASSIVE_LEAK_PER_HOUR
    }
    const fn default_leak_multipliers() -> [f32; 3] {
        k::LEAK_MULTIPLIERS
    }
    const fn default_fuel_leak_multipliers() -> [f32; 3] {
        k::FUEL_LEAK_MULTIPLIERS
    }
    const fn default_critical_level() -> f32 {
        k::FLUID_CRITICAL_LEVEL
    }
    const fn default_ran_dry_seconds() -> f32 {
        k::FLUID_RAN_DRY_SECONDS
    }
    const fn default_ran_dry_wear_per_second() -> f32 {
        k::FLUID_RAN_DRY_WEAR_PER_SECOND
    }
    const fn default_ran_dry_ceiling_cut() -> f32 {
        k::FLUID_RAN_DRY_CEILING_CUT
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_min(
            "fluids.fluid_chance_multiplier",
            self.fluid_chance_multiplier,
            0.0,
        )?;
        check_min(
            "fluids.fluid_severity_multiplier",
            self.fluid_severity_multiplier,
            0.0,
        )?;
        check_min("fluids.oil_drain_per_hour", self.oil_drain_per_hour, 0.0)?;
        check_min(
            "fluids.hydraulic_drain_per_action",
            self.hydraulic_drain_per_action,
            0.0,
        )?;
        check_min(
            "fluids.hydraulic_passive_leak_per_hour",
            self.hydraulic_passive_leak_per_hour,
            0.0,
        )?;
        for &value in &self.leak_multipliers {
            check_min("fluids.leak_multipliers", value, 1.0)?;
        }
        for &value in &self.fuel_leak_multipliers {
            check_min("fluids.fuel_leak_multipliers", value, 1.0)?;
        }
        check_range("fluids.critical_level", self.critical_level, 0.0, 1.0)?;
        check_min("fluids.ran_dry_seconds", self.ran_dry_seconds, 0.0)?;
        check_min(
            "fluids.ran_dry_wear_per_second",
            self.ran_dry_wear_per_second,
            0.0,
        )?;
        check_range(
            "fluids.ran_dry_ceiling_cut",
            self.ran_dry_ceiling_cut,
            0.0,
            0.7,
        )?;
        Ok(())
    }
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            fluid_chance_multiplier: Self::default_chance_weight(),
            fluid_severity_multiplier: Self::default_severity_weight(),
            oil_drain_per_hour: Self::default_oil_drain_per_hour(),
            hydraulic_drain_per_action: Self::default_hydraulic_drain_per_action(),
            hydraulic_passive_leak_per_hour: Self::default_hydraulic_passive_leak_per_hour(),
            leak_multipliers: Self::default_leak_multipliers(),
            fuel_leak_multipliers: Self::default_fuel_leak_multipliers(),
            critical_level: Self::default_critical_level(),
            ran_dry_seconds: Self::default_ran_dry_seconds(),
            ran_dry_wear_per_second: Self::default_ran_dry_wear_per_second(),
            ran_dry_ceiling_cut: Self::default_ran_dry_ceiling_cut(),
        }
    }
}

/// Tread wear, traction and flat-tire tables. Tier tables are `[retread, normal, quality]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TireConfig {
    #[serde(default = "TireConfig::default_wear_rate_per_km")]
    pub tire_wear_rate_per_km: f32,
    #[serde(default = "TireConfig::default_wear_multipliers")]
    pub wear_multipliers: [f32; 3],
    #[serde(default = "TireConfig::default_failure_multipliers")]
    pub failure_multipliers: [f32; 3],
    #[serde(default = "TireConfig::default_base_traction")]
    pub base_traction: [f32; 3],
    #[serde(default = "TireConfig::default_dna_wear_worst")]
    pub dna_wear_worst: f32,
    #[serde(default = "TireConfig::default_dna_wear_best")]
    pub dna_wear_best: f32,
    #[serde(default = "TireConfig::default_traction_floor")]
    pub traction_floor: f32,
    #[serde(default = "TireConfig::default_wet_penalty")]
    pub wet_penalty: f32,
    #[serde(default = "TireConfig::default_snow_penalty")]
    pub snow_penalty: f32,
    #[serde(default = "TireConfig::default_flat_traction_factor")]
    pub flat_traction_factor: f32,
    #[serde(default = "TireConfig::default_flat_steering_bias")]
    pub flat_steering_bias: f32,
}

impl TireConfig {
    const fn default_wear_rate_per_km() -> f32 {
        k::TIRE_WEAR_RATE_PER_KM
    }
    const fn default_wear_multipliers() -> [f32; 3] {
        k::TIRE_WEAR_MULTIPLIERS
    }
    const fn default_failure_multipliers() -> [f32; 3] {
        k::TIRE_FAILURE_MULTIPLIERS
    }
    const fn default_base_traction() -> [f32; 3] {
        k::TIRE_BASE_TRACTION
    }
    const fn default_dna_wear_worst() -> f32 {
        k::TIRE_DNA_WEAR_WORST
    }
    const fn default_dna_wear_best() -> f32 {
        k::TIRE_DNA_WEAR_BEST
    }
    const fn default_traction_floor() -> f32 {
        k::TIRE_TRACTION_FLOOR
    }
    const fn default_wet_penalty() -> f32 {
        k::TIRE_WET_PENALTY
    }
    const fn default_snow_penalty() -> f32 {
        k::TIRE_SNOW_PENALTY
    }
    const fn default_flat_traction_factor() -> f32 {
        k::TIRE_FLAT_TRACTION_FACTOR
    }
    const fn default_flat_steering_bias() -> f32 {
        k::TIRE_FLAT_STEERING_BIAS
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_min("tires.tire_wear_rate_per_km", self.tire_wear_rate_per_km, 0.0)?;
        for &value in &self.wear_multipliers {
            check_min("tires.wear_multipliers", value, 0.0)?;
        }
        for &value in &self.failure_multipliers {
            check_min("tires.failure_multipliers", value, 0.0)?;
        }
        for &value in &self.base_traction {
            check_range("tires.base_traction", value, 0.1, 2.0)?;
        }
        check_min("tires.dna_wear_worst", self.dna_wear_worst, 0.0)?;
        check_min("tires.dna_wear_best", self.dna_wear_best, 0.0)?;
        check_range("tires.traction_floor", self.traction_floor, 0.0, 1.0)?;
        check_range("tires.wet_penalty", self.wet_penalty, 0.0, 0.9)?;
        check_range("tires.snow_penalty", self.snow_penalty, 0.0, 0.9)?;
        check_range(
            "tires.flat_traction_factor",
            self.flat_traction_factor,
            0.0,
            1.0,
        )?;
        check_range("tires.flat_steering_bias", self.flat_steering_bias, 0.0, 1.0)?;
        Ok(())
    }
}

impl Default for TireConfig {
    fn default() -> Self {
        Self {
            tire_wear_rate_per_km: Self::default_wear_rate_per_km(),
            wear_multipliers: Self::default_wear_multipliers(),
            failure_multipliers: Self::default_failure_multipliers(),
            base_traction: Self::default_base_traction(),
            dna_wear_worst: Self::default_dna_wear_worst(),
            dna_wear_best: Self::default_dna_wear_best(),
            traction_floor: Self::default_traction_floor(),
            wet_penalty: Self::default_wet_penalty(),
            snow_penalty: Self::default_snow_penalty(),
            flat_traction_factor: Self::default_flat_traction_factor(),
            flat_steering_bias: Self::default_flat_steering_bias(),
        }
    }
}

/// Escalation of temporary malfunctions into permanent seizures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeizureConfig {
    #[serde(default = "SeizureConfig::default_base_threshold")]
    pub seizure_base_threshold: f32,
    #[serde(default = "SeizureConfig::default_dna_reduction")]
    pub seizure_dna_reduction: f32,
    #[serde(default = "SeizureConfig::default_min_chance")]
    pub min_chance: f32,
    #[serde(default = "SeizureConfig::default_max_chance")]
    pub max_chance: f32,
    #[serde(default = "SeizureConfig::default_lemon_penalty")]
    pub lemon_penalty: f32,
    #[serde(default = "SeizureConfig::default_chance_cap")]
    pub chance_cap: f32,
}

impl SeizureConfig {
    const fn default_base_threshold() -> f32 {
        k::SEIZURE_BASE_THRESHOLD
    }
    const fn default_dna_reduction() -> f32 {
        k::SEIZURE_DNA_REDUCTION
    }
    const fn default_min_chance() -> f32 {
        k::SEIZURE_MIN_CHANCE
    }
    const fn default_max_chance() -> f32 {
        k::SEIZURE_MAX_CHANCE
    }
    const fn default_lemon_penalty() -> f32 {
        k::SEIZURE_LEMON_PENALTY
    }
    const fn default_chance_cap() -> f32 {
        k::SEIZURE_CHANCE_CAP
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "seizure.seizure_base_threshold",
            self.seizure_base_threshold,
            0.0,
            1.0,
        )?;
        check_range(
            "seizure.seizure_dna_reduction",
            self.seizure_dna_reduction,
            0.0,
            1.0,
        )?;
        check_range("seizure.min_chance", self.min_chance, 0.0, 1.0)?;
        check_range("seizure.max_chance", self.max_chance, 0.0, 1.0)?;
        check_range("seizure.lemon_penalty", self.lemon_penalty, 0.0, 1.0)?;
        check_range("seizure.chance_cap", self.chance_cap, 0.0, 1.0)?;
        Ok(())
    }
}

impl Default for SeizureConfig {
    fn default() -> Self {
        Self {
            seizure_base_threshold: Self::default_base_threshold(),
            seizure_dna_reduction: Self::default_dna_reduction(),
            min_chance: Self::default_min_chance(),
            max_chance: Self::default_max_chance(),
            lemon_penalty: Self::default_lemon_penalty(),
            chance_cap: Self::default_chance_cap(),
        }
    }
}

/// Trigger gate and duration for one malfunction kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MalfunctionTuning {
    #[serde(default = "MalfunctionTuning::default_enabled")]
    pub enabled: bool,
    /// Reliability (or tire condition) below which the kind may trigger.
    pub threshold: f32,
    /// Per-tick chance at full depth below the threshold.
    pub base_chance: f32,
    #[serde(default)]
    pub duration_min_ms: u64,
    #[serde(default)]
    pub duration_max_ms: u64,
}

impl MalfunctionTuning {
    const fn default_enabled() -> bool {
        true
    }

    const fn new(threshold: f32, base_chance: f32, duration_min_ms: u64, duration_max_ms: u64) -> Self {
        Self {
            enabled: true,
            threshold,
            base_chance,
            duration_min_ms,
            duration_max_ms,
        }
    }

    /// Stock tuning for a kind.
    #[must_use]
    pub const fn stock(kind: MalfunctionKind) -> Self {
        match kind {
            // Stall scales the progressive failure curve rather than a flat chance.
            MalfunctionKind::EngineStall => Self::new(0.50, 1.0, 0, 0),
            MalfunctionKind::Misfire => Self::new(0.60, 0.03, 100, 300),
            MalfunctionKind::Overheat => Self::new(0.55, 1.0, 0, 0),
            MalfunctionKind::HydraulicSurge => Self::new(0.45, 0.01, 5_000, 15_000),
            MalfunctionKind::Runaway => Self::new(1.0, 0.2, 0, 0),
            MalfunctionKind::ImplementStuckUp | MalfunctionKind::ImplementStuckDown => {
                Self::new(0.40, 0.004, k::STUCK_DURATION_MS, k::STUCK_DURATION_MS)
            }
            MalfunctionKind::ImplementPull | MalfunctionKind::ImplementDrag => {
                Self::new(0.45, 0.006, 20_000, 40_000)
            }
            MalfunctionKind::ReducedTurning => Self::new(0.40, 0.005, 15_000, 30_000),
            MalfunctionKind::PtoToggle => Self::new(0.45, 0.006, 0, 0),
            MalfunctionKind::HitchFailure => Self::new(0.25, 0.000_5, 0, 0),
            MalfunctionKind::ElectricalCutout => {
                Self::new(0.45, 0.008, k::CUTOUT_DURATION_MS, k::CUTOUT_DURATION_MS)
            }
            MalfunctionKind::FlatTire => {
                Self::new(k::TIRE_FLAT_THRESHOLD, k::TIRE_FLAT_BASE_CHANCE, 0, 0)
            }
            MalfunctionKind::OilLeak => Self::new(k::OIL_LEAK_THRESHOLD, k::LEAK_BASE_CHANCE, 0, 0),
            MalfunctionKind::HydraulicLeak => {
                Self::new(k::HYDRAULIC_LEAK_THRESHOLD, k::LEAK_BASE_CHANCE, 0, 0)
            }
            MalfunctionKind::FuelLeak => {
                Self::new(k::FUEL_LEAK_THRESHOLD, k::LEAK_BASE_CHANCE, 0, 0)
            }
        }
    }

    /// Kinds whose effect lasts for a drawn duration.
    const fn is_timed(kind: MalfunctionKind) -> bool {
        matches!(
            kind,
            MalfunctionKind::Misfire
                | MalfunctionKind::HydraulicSurge
                | MalfunctionKind::ImplementStuckUp
                | MalfunctionKind::ImplementStuckDown
                | MalfunctionKind::ImplementPull
                | MalfunctionKind::ImplementDrag
                | MalfunctionKind::ReducedTurning
                | MalfunctionKind::ElectricalCutout
        )
    }
}

/// Overheat heat-balance model; heat is normalised so 1.0 forces a stall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverheatConfig {
    #[serde(default = "OverheatConfig::default_heat_rate")]
    pub heat_rate: f32,
    #[serde(default = "OverheatConfig::default_cool_rate")]
    pub cool_rate: f32,
    #[serde(default = "OverheatConfig::default_idle_cool_rate")]
    pub idle_cool_rate: f32,
    #[serde(default = "OverheatConfig::default_start_heat")]
    pub start_heat: f32,
    #[serde(default = "OverheatConfig::default_restart_heat")]
    pub restart_heat: f32,
    #[serde(default = "OverheatConfig::default_power_factor")]
    pub power_factor: f32,
}

impl OverheatConfig {
    const fn default_heat_rate() -> f32 {
        k::OVERHEAT_HEAT_RATE
    }
    const fn default_cool_rate() -> f32 {
        k::OVERHEAT_COOL_RATE
    }
    const fn default_idle_cool_rate() -> f32 {
        k::OVERHEAT_IDLE_COOL_RATE
    }
    const fn default_start_heat() -> f32 {
        k::OVERHEAT_START_HEAT
    }
    const fn default_restart_heat() -> f32 {
        k::OVERHEAT_RESTART_HEAT
    }
    const fn default_power_factor() -> f32 {
        k::OVERHEAT_POWER_FACTOR
    }
}

impl Default for OverheatConfig {
    fn default() -> Self {
        Self {
            heat_rate: Self::default_heat_rate(),
            cool_rate: Self::default_cool_rate(),
            idle_cool_rate: Self::default_idle_cool_rate(),
            start_heat: Self::default_start_heat(),
            restart_heat: Self::default_restart_heat(),
            power_factor: Self::default_power_factor(),
        }
    }
}

/// Runaway trigger and ramp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunawayConfig {
    #[serde(default = "RunawayConfig::default_enabled")]
    pub runaway_enabled: bool,
    #[serde(default = "RunawayConfig::default_fluid_level")]
    pub fluid_level: f32,
    #[serde(default = "RunawayConfig::default_min_speed_kph")]
    pub min_speed_kph: f32,
    #[serde(default = "RunawayConfig::default_max_factor")]
    pub max_factor: f32,
    #[serde(default = "RunawayConfig::default_ramp_ms")]
    pub ramp_ms: u64,
    #[serde(default = "RunawayConfig::default_brake_factor")]
    pub brake_factor: f32,
}

impl RunawayConfig {
    const fn default_enabled() -> bool {
        true
    }
    const fn default_fluid_level() -> f32 {
        k::RUNAWAY_FLUID_LEVEL
    }
    const fn default_min_speed_kph() -> f32 {
        k::RUNAWAY_MIN_SPEED_KPH
    }
    const fn default_max_factor() -> f32 {
        k::RUNAWAY_MAX_FACTOR
    }
    const fn default_ramp_ms() -> u64 {
        k::RUNAWAY_RAMP_MS
    }
    const fn default_brake_factor() -> f32 {
        k::RUNAWAY_BRAKE_FACTOR
    }
}

impl Default for RunawayConfig {
    fn default() -> Self {
        Self {
            runaway_enabled: Self::default_enabled(),
            fluid_level: Self::default_fluid_level(),
            min_speed_kph: Self::default_min_speed_kph(),
            max_factor: Self::default_max_factor(),
            ramp_ms: Self::default_ramp_ms(),
            brake_factor: Self::default_brake_factor(),
        }
    }
}

/// Malfunction registry tuning and per-kind effect strengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MalfunctionConfig {
    #[serde(default = "MalfunctionConfig::default_global_cooldown_ms")]
    pub global_cooldown_ms: u64,
    /// Diagnostic override replacing every eligible trigger chance.
    #[serde(default)]
    pub force_chance: Option<f32>,
    #[serde(default)]
    pub tuning: HashMap<MalfunctionKind, MalfunctionTuning>,
    #[serde(default = "MalfunctionConfig::default_stall_cooldown_ms")]
    pub stall_cooldown_ms: u64,
    #[serde(default = "MalfunctionConfig::default_stall_restart_delay_ms")]
    pub stall_restart_delay_ms: u64,
    #[serde(default = "MalfunctionConfig::default_misfire_burst_max")]
    pub misfire_burst_max: u8,
    #[serde(default = "MalfunctionConfig::default_misfire_power_factor")]
    pub misfire_power_factor: f32,
    #[serde(default)]
    pub overheat: OverheatConfig,
    #[serde(default = "MalfunctionConfig::default_surge_min_speed_kph")]
    pub surge_min_speed_kph: f32,
    #[serde(default = "MalfunctionConfig::default_surge_steering_bias")]
    pub surge_steering_bias: f32,
    #[serde(default = "MalfunctionConfig::default_surge_fade_fraction")]
    pub surge_fade_fraction: f32,
    #[serde(default)]
    pub runaway: RunawayConfig,
    #[serde(default = "MalfunctionConfig::default_pull_steering_bias")]
    pub pull_steering_bias: f32,
    #[serde(default = "MalfunctionConfig::default_drag_speed_factor")]
    pub drag_speed_factor: f32,
    #[serde(default = "MalfunctionConfig::default_reduced_turning_limit")]
    pub reduced_turning_limit: f32,
}

impl MalfunctionConfig {
    const fn default_global_cooldown_ms() -> u64 {
        k::GLOBAL_COOLDOWN_MS
    }
    const fn default_stall_cooldown_ms() -> u64 {
        k::STALL_COOLDOWN_MS
    }
    const fn default_stall_restart_delay_ms() -> u64 {
        k::STALL_RESTART_DELAY_MS
    }
    const fn default_misfire_burst_max() -> u8 {
        k::MISFIRE_BURST_MAX
    }
    const fn default_misfire_power_factor() -> f32 {
        k::MISFIRE_POWER_FACTOR
    }
    const fn default_surge_min_speed_kph() -> f32 {
        k::SURGE_MIN_SPEED_KPH
    }
    const fn default_surge_steering_bias() -> f32 {
        k::SURGE_STEERING_BIAS
    }
    const fn default_surge_fade_fraction() -> f32 {
        k::SURGE_FADE_FRACTION
    }
    const fn default_pull_steering_bias() -> f32 {
        k::PULL_STEERING_BIAS
    }
    const fn default_drag_speed_factor() -> f32 {
        k::DRAG_SPEED_FACTOR
    }
    const fn default_reduced_turning_limit() -> f32 {
        k::REDUCED_TURNING_LIMIT
    }

    /// Tuning for a kind, falling back to stock values when not overridden.
    #[must_use]
    pub fn tuning(&self, kind: MalfunctionKind) -> MalfunctionTuning {
        self.tuning
            .get(&kind)
            .copied()
            .unwrap_or_else(|| MalfunctionTuning::stock(kind))
    }

    /// Replace one kind's tuning, keeping the rest.
    pub fn set_tuning(&mut self, kind: MalfunctionKind, tuning: MalfunctionTuning) {
        self.tuning.insert(kind, tuning);
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(force) = self.force_chance {
            check_range("malfunctions.force_chance", force, 0.0, 1.0)?;
        }
        for tuning in self.tuning.values() {
            check_range("malfunctions.tuning.threshold", tuning.threshold, 0.0, 1.0)?;
            check_min("malfunctions.tuning.base_chance", tuning.base_chance, 0.0)?;
        }
        check_range(
            "malfunctions.misfire_power_factor",
            self.misfire_power_factor,
            0.0,
            1.0,
        )?;
        check_range(
            "malfunctions.overheat.restart_heat",
            self.overheat.restart_heat,
            0.0,
            1.0,
        )?;
        check_range(
            "malfunctions.overheat.start_heat",
            self.overheat.start_heat,
            0.0,
            1.0,
        )?;
        if self.overheat.restart_heat > self.overheat.start_heat {
            return Err(ConfigError::BoundsInverted {
                field: "malfunctions.overheat",
                min: self.overheat.restart_heat,
                max: self.overheat.start_heat,
            });
        }
        check_range(
            "malfunctions.surge_fade_fraction",
            self.surge_fade_fraction,
            0.0,
            1.0,
        )?;
        check_range(
            "malfunctions.runaway.max_factor",
            self.runaway.max_factor,
            1.0,
            3.0,
        )?;
        check_range(
            "malfunctions.runaway.brake_factor",
            self.runaway.brake_factor,
            0.0,
            1.0,
        )?;
        check_range(
            "malfunctions.drag_speed_factor",
            self.drag_speed_factor,
            0.0,
            1.0,
        )?;
        check_range(
            "malfunctions.reduced_turning_limit",
            self.reduced_turning_limit,
            0.0,
            1.0,
        )?;
        Ok(())
    }

    fn sanitize(&mut self) {
        for (kind, tuning) in &mut self.tuning {
            if tuning.duration_min_ms > tuning.duration_max_ms {
                std::mem::swap(&mut tuning.duration_min_ms, &mut tuning.duration_max_ms);
            }
            if MalfunctionTuning::is_timed(*kind) && tuning.duration_max_ms == 0 {
                let stock = MalfunctionTuning::stock(*kind);
                log::warn!(
                    "{} configured with zero duration; using stock {}..{} ms",
                    kind.key(),
                    stock.duration_min_ms,
                    stock.duration_max_ms
                );
                tuning.duration_min_ms = stock.duration_min_ms;
                tuning.duration_max_ms = stock.duration_max_ms;
            }
        }
        if self.misfire_burst_max == 0 {
            self.misfire_burst_max = 1;
        }
        if self.runaway.ramp_ms == 0 {
            self.runaway.ramp_ms = k::RUNAWAY_RAMP_MS;
        }
    }
}

impl Default for MalfunctionConfig {
    fn default() -> Self {
        Self {
            global_cooldown_ms: Self::default_global_cooldown_ms(),
            force_chance: None,
            tuning: HashMap::new(),
            stall_cooldown_ms: Self::default_stall_cooldown_ms(),
            stall_restart_delay_ms: Self::default_stall_restart_delay_ms(),
            misfire_burst_max: Self::default_misfire_burst_max(),
            misfire_power_factor: Self::default_misfire_power_factor(),
            overheat: OverheatConfig::default(),
            surge_min_speed_kph: Self::default_surge_min_speed_kph(),
            surge_steering_bias: Self::default_surge_steering_bias(),
            surge_fade_fraction: Self::default_surge_fade_fraction(),
            runaway: RunawayConfig::default(),
            pull_steering_bias: Self::default_pull_steering_bias(),
            drag_speed_factor: Self::default_drag_speed_factor(),
            reduced_turning_limit: Self::default_reduced_turning_limit(),
        }
    }
}

/// Speed multiplier terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedConfig {
    #[serde(default = "SpeedConfig::default_degradation_max")]
    pub speed_degradation_max: f32,
    #[serde(default = "SpeedConfig::default_damage_weight")]
    pub damage_weight: f32,
    #[serde(default = "SpeedConfig::default_floor")]
    pub floor: f32,
    #[serde(default = "SpeedConfig::default_flat_factor")]
    pub flat_factor: f32,
}

impl SpeedConfig {
    const fn default_degradation_max() -> f32 {
        k::SPEED_DEGRADATION_MAX
    }
    const fn default_damage_weight() -> f32 {
        k::SPEED_DAMAGE_WEIGHT
    }
    const fn default_floor() -> f32 {
        k::SPEED_FLOOR
    }
    const fn default_flat_factor() -> f32 {
        k::SPEED_FLAT_FACTOR
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "speed.speed_degradation_max",
            self.speed_degradation_max,
            0.0,
            0.8,
        )?;
        check_range("speed.damage_weight", self.damage_weight, 0.0, 0.8)?;
        check_range("speed.floor", self.floor, 0.0, 1.0)?;
        check_range("speed.flat_factor", self.flat_factor, 0.0, 1.0)?;
        Ok(())
    }
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            speed_degradation_max: Self::default_degradation_max(),
            damage_weight: Self::default_damage_weight(),
            floor: Self::default_floor(),
            flat_factor: Self::default_flat_factor(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningConfig {
    #[serde(default = "WarningConfig::default_startup_grace_ms")]
    pub startup_grace_ms: u64,
}

impl WarningConfig {
    const fn default_startup_grace_ms() -> u64 {
        k::WARNING_STARTUP_GRACE_MS
    }
}

impl Default for WarningConfig {
    fn default() -> Self {
        Self {
            startup_grace_ms: Self::default_startup_grace_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert_eq!(ReliabilityConfig::default().validate(), Ok(()));
    }

    #[test]
    fn empty_json_yields_defaults() {
        let cfg = ReliabilityConfig::from_json("{}").unwrap();
        assert_eq!(cfg, ReliabilityConfig::default());
        assert!((cfg.failure.progressive_failure_exponent - 2.0).abs() < f32::EPSILON);
        assert!((cfg.failure.progressive_failure_multiplier - 0.025).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_json_overrides_single_field() {
        let cfg = ReliabilityConfig::from_json(
            r#"{ "malfunctions": { "global_cooldown_ms": 5000, "force_chance": 1.0 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.malfunctions.global_cooldown_ms, 5_000);
        assert_eq!(cfg.malfunctions.force_chance, Some(1.0));
        assert_eq!(cfg.malfunctions.stall_cooldown_ms, k::STALL_COOLDOWN_MS);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = ReliabilityConfig::from_json(r#"{ "seizure": { "chance_cap": 1.5 } }"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::RangeViolation {
                field: "seizure.chance_cap",
                ..
            }
        ));
        let parse = ReliabilityConfig::from_json("not json").unwrap_err();
        assert!(matches!(parse, ConfigError::Parse(_)));
    }

    #[test]
    fn inverted_overheat_band_is_rejected() {
        let mut cfg = ReliabilityConfig::default();
        cfg.malfunctions.overheat.restart_heat = 0.95;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::BoundsInverted { .. })
        ));
    }

    #[test]
    fn sanitize_restores_zero_durations_and_swaps_bounds() {
        let json = r#"{ "malfunctions": { "tuning": {
            "hydraulic_surge": { "threshold": 0.4, "base_chance": 0.1, "duration_min_ms": 0, "duration_max_ms": 0 },
            "implement_pull": { "threshold": 0.4, "base_chance": 0.1, "duration_min_ms": 9000, "duration_max_ms": 3000 }
        } } }"#;
        let cfg = ReliabilityConfig::from_json(json).unwrap();
        let surge = cfg.malfunctions.tuning(MalfunctionKind::HydraulicSurge);
        assert_eq!(surge.duration_min_ms, 5_000);
        assert_eq!(surge.duration_max_ms, 15_000);
        let pull = cfg.malfunctions.tuning(MalfunctionKind::ImplementPull);
        assert_eq!((pull.duration_min_ms, pull.duration_max_ms), (3_000, 9_000));
    }

    #[test]
    fn stock_tuning_used_when_not_overridden() {
        let cfg = MalfunctionConfig::default();
        let stuck = cfg.tuning(MalfunctionKind::ImplementStuckDown);
        assert_eq!(stuck.duration_min_ms, 45_000);
        assert_eq!(stuck.duration_max_ms, 45_000);
        assert!(stuck.enabled);
    }
}

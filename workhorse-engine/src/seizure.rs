//! Escalation of temporary malfunctions into permanent subsystem seizures.
//!
//! Low-trait vehicles both degrade faster and seize more readily; the two
//! penalties stack and are kept as-is.
use crate::config::SeizureConfig;
use crate::effects::{ActuatorCommand, CommandQueue};
use crate::inputs::VehicleInputs;
use crate::numbers::clamp_unit;
use crate::rng::SimRng;
use crate::state::{SubsystemKind, VehicleReliabilityState};

/// Reliability below which a subsystem may seize: 0.40 for lemons down to 0.10 for workhorses.
#[must_use]
pub fn seizure_threshold(cfg: &SeizureConfig, quality_trait: f32) -> f32 {
    clamp_unit(
        clamp_unit(quality_trait).mul_add(-cfg.seizure_dna_reduction, cfg.seizure_base_threshold),
    )
}

/// Escalation chance, or `None` when reliability is not below the threshold.
#[must_use]
pub fn seizure_chance(cfg: &SeizureConfig, quality_trait: f32, reliability: f32) -> Option<f32> {
    let threshold = seizure_threshold(cfg, quality_trait);
    let reliability = clamp_unit(reliability);
    if threshold <= 0.0 || reliability >= threshold {
        return None;
    }
    let depth = (threshold - reliability) / threshold;
    let lemon = 1.0 - clamp_unit(quality_trait);
    let chance = depth.mul_add(cfg.max_chance - cfg.min_chance, cfg.min_chance)
        + lemon * cfg.lemon_penalty;
    Some(chance.min(cfg.chance_cap).max(0.0))
}

/// Roll for seizure of `subsystem` at the given reliability; on success the
/// subsystem is marked seized and the seizure counter advances.
pub fn roll_for_seizure(
    state: &mut VehicleReliabilityState,
    cfg: &SeizureConfig,
    rng: &mut SimRng,
    subsystem: SubsystemKind,
    reliability: f32,
) -> bool {
    let Some(chance) = seizure_chance(cfg, state.quality_trait(), reliability) else {
        return false;
    };
    if !rng.roll(chance) {
        return false;
    }
    state.subsystems.get_mut(subsystem).seized = true;
    state.counters.seizure_count = state.counters.seizure_count.saturating_add(1);
    log::info!(
        "{} seized (reliability {:.3}, chance {:.3})",
        subsystem.key(),
        reliability,
        chance
    );
    true
}

/// Commands that halt the actuator a seized subsystem drives.
pub fn halt_commands(subsystem: SubsystemKind, ai_job_active: bool, out: &mut CommandQueue) {
    match subsystem {
        SubsystemKind::Engine => {
            out.push(ActuatorCommand::StopMotor);
            out.push(ActuatorCommand::BlockMotorStart { until: None });
        }
        SubsystemKind::Electrical => {
            out.push(ActuatorCommand::AllImplementsOff);
        }
        SubsystemKind::Hydraulic => {
            out.push(ActuatorCommand::HaltHydraulics);
        }
    }
    if ai_job_active && subsystem != SubsystemKind::Hydraulic {
        out.push(ActuatorCommand::CancelAiJob);
    }
}

/// Re-assert the halt of every seized subsystem against what the host reports.
pub fn hold_commands(
    state: &VehicleReliabilityState,
    inputs: &VehicleInputs,
    out: &mut CommandQueue,
) {
    let seized = |kind: SubsystemKind| state.subsystem(kind).seized;
    if seized(SubsystemKind::Engine) && inputs.motor_running {
        out.push(ActuatorCommand::StopMotor);
    }
    if seized(SubsystemKind::Electrical) && inputs.attached().any(|i| i.powered) {
        out.push(ActuatorCommand::AllImplementsOff);
    }
    if seized(SubsystemKind::Hydraulic) && inputs.hydraulic_actions > 0 {
        out.push(ActuatorCommand::HaltHydraulics);
    }
}

/// Undo the standing halt of a subsystem whose seizure a repair cleared.
pub fn release_commands(subsystem: SubsystemKind, out: &mut CommandQueue) {
    let release = match subsystem {
        SubsystemKind::Engine => ActuatorCommand::ReleaseMotorStart,
        SubsystemKind::Hydraulic => ActuatorCommand::ResumeHydraulics,
        SubsystemKind::Electrical => return,
    };
    if !out.contains(&release) {
        out.push(release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_spans_lemon_to_workhorse() {
        let cfg = SeizureConfig::default();
        assert!((seizure_threshold(&cfg, 0.0) - 0.40).abs() < 1e-6);
        assert!((seizure_threshold(&cfg, 1.0) - 0.10).abs() < 1e-6);
    }

    #[test]
    fn chance_absent_above_threshold_and_capped_below() {
        let cfg = SeizureConfig::default();
        assert_eq!(seizure_chance(&cfg, 0.5, 0.9), None);
        let shallow = seizure_chance(&cfg, 0.5, 0.24).unwrap();
        let deep = seizure_chance(&cfg, 0.5, 0.0).unwrap();
        assert!(deep > shallow);
        let lemon = seizure_chance(&cfg, 0.0, 0.0).unwrap();
        assert!((lemon - (0.35 + 0.15)).abs() < 1e-6);
        assert!(lemon <= cfg.chance_cap);
    }

    #[test]
    fn successful_roll_seizes_and_counts() {
        let cfg = SeizureConfig {
            min_chance: 1.0,
            max_chance: 1.0,
            ..SeizureConfig::default()
        };
        let mut state = VehicleReliabilityState::with_trait(0.2);
        let mut rng = SimRng::from_user_seed(1);
        assert!(roll_for_seizure(
            &mut state,
            &cfg,
            &mut rng,
            SubsystemKind::Hydraulic,
            0.05
        ));
        assert!(state.subsystems.hydraulic.seized);
        assert_eq!(state.counters.seizure_count, 1);
        assert!(!roll_for_seizure(
            &mut state,
            &cfg,
            &mut rng,
            SubsystemKind::Engine,
            0.95
        ));
    }

    #[test]
    fn engine_halt_stops_motor_and_cancels_ai() {
        let mut out = CommandQueue::new();
        halt_commands(SubsystemKind::Engine, true, &mut out);
        assert!(out.contains(&ActuatorCommand::StopMotor));
        assert!(out.contains(&ActuatorCommand::CancelAiJob));
        let mut hydraulic = CommandQueue::new();
        halt_commands(SubsystemKind::Hydraulic, true, &mut hydraulic);
        assert_eq!(hydraulic.as_slice(), &[ActuatorCommand::HaltHydraulics]);
    }

    #[test]
    fn seized_subsystems_keep_pushing_back() {
        let mut state = VehicleReliabilityState::with_trait(0.5);
        state.subsystems.electrical.seized = true;
        state.subsystems.hydraulic.seized = true;
        let inputs = VehicleInputs {
            motor_running: true,
            hydraulic_actions: 3,
            implements: smallvec::smallvec![crate::inputs::ImplementInput::new(1).powered(true)],
            ..VehicleInputs::default()
        };
        let mut out = CommandQueue::new();
        hold_commands(&state, &inputs, &mut out);
        assert!(out.contains(&ActuatorCommand::AllImplementsOff));
        assert!(out.contains(&ActuatorCommand::HaltHydraulics));
        assert!(!out.contains(&ActuatorCommand::StopMotor));

        let mut idle = CommandQueue::new();
        hold_commands(&state, &VehicleInputs::default(), &mut idle);
        assert!(idle.is_empty());
    }

    #[test]
    fn releases_are_not_duplicated() {
        let mut out = CommandQueue::new();
        release_commands(SubsystemKind::Engine, &mut out);
        release_commands(SubsystemKind::Engine, &mut out);
        release_commands(SubsystemKind::Hydraulic, &mut out);
        release_commands(SubsystemKind::Electrical, &mut out);
        assert_eq!(
            out.as_slice(),
            &[
                ActuatorCommand::ReleaseMotorStart,
                ActuatorCommand::ResumeHydraulics
            ]
        );
    }
}

use workhorse_engine::config::ReliabilityConfig;
use workhorse_engine::reliability::{self, RepairScope, breakdown_factor, repair_degradation};
use workhorse_engine::tires::{apply_wear, dna_wear_multiplier};
use workhorse_engine::{
    ActuatorCommand, EndReason, EntityHandle, EventPhase, ImplementInput, ImplementSlot,
    MalfunctionKind, ReliabilityEngine, ServiceAction, SubsystemKind, TireTier, VehicleInputs,
    VehicleReliabilityState,
};

const TRACTOR: EntityHandle = EntityHandle(42);

fn only(cfg: &mut ReliabilityConfig, kind: MalfunctionKind) {
    for other in MalfunctionKind::ALL {
        let mut tuning = cfg.malfunctions.tuning(other);
        tuning.enabled = other == kind;
        cfg.malfunctions.set_tuning(other, tuning);
    }
}

#[test]
fn dry_fluids_at_speed_run_away_until_the_motor_stops() {
    let mut cfg = ReliabilityConfig::default();
    cfg.malfunctions.force_chance = Some(1.0);
    cfg.malfunctions.runaway.runaway_enabled = true;
    let mut engine = ReliabilityEngine::new(cfg, 77);
    let mut state = VehicleReliabilityState::with_trait(0.6);
    state.fluids.oil.level = 0.05;
    state.fluids.hydraulic.level = 0.05;
    engine.insert_state(TRACTOR, state);

    let driving = VehicleInputs {
        motor_running: true,
        speed_kph: 20.0,
        ..VehicleInputs::default()
    };
    assert!(engine.check_runaway_condition(TRACTOR, &driving, 0));

    let governed = engine.tick(TRACTOR, &driving, 1_000);
    assert!(governed.effects.runaway_factor.is_some());
    assert!(governed.speed_multiplier >= 1.0);
    assert!(
        governed
            .events
            .iter()
            .any(|e| e.kind == MalfunctionKind::Runaway && e.phase == EventPhase::Started)
    );

    let stopped = VehicleInputs {
        motor_running: false,
        ..driving
    };
    let outcome = engine.tick(TRACTOR, &stopped, 2_000);
    let ended = outcome
        .events
        .iter()
        .find(|e| e.kind == MalfunctionKind::Runaway && e.phase == EventPhase::Ended)
        .expect("runaway ended");
    assert_eq!(ended.end_reason, Some(EndReason::EngineOff));
    assert!(!engine.state(TRACTOR).unwrap().is_active(MalfunctionKind::Runaway));
}

#[test]
fn workhorse_breakdowns_cost_three_tenths_of_the_standard_loss() {
    let cfg = ReliabilityConfig::default();
    let degradation = &cfg.degradation;
    let quality: f32 = 0.95;
    let standard = (1.0 - quality).mul_add(degradation.breakdown_lemon, degradation.breakdown_base);
    let mut state = VehicleReliabilityState::with_trait(quality);

    for _ in 0..10 {
        let before = state.reliability_ceiling;
        let applied =
            reliability::breakdown_degradation(&mut state, degradation, Some(SubsystemKind::Engine));
        assert!((applied - standard * 0.3).abs() < 1e-6);
        assert!((state.reliability_ceiling - before * (1.0 - standard * 0.3)).abs() < 1e-6);
        let engine = state.subsystem(SubsystemKind::Engine);
        assert!(engine.reliability <= state.ceiling_for(SubsystemKind::Engine) + f32::EPSILON);
    }
    assert_eq!(state.counters.breakdown_count, 10);
    assert!((breakdown_factor(degradation, 0.94) - (0.06f32.mul_add(0.05, 0.03))).abs() < 1e-6);
}

#[test]
fn quality_tires_wear_at_two_thirds_rate() {
    let cfg = ReliabilityConfig::default();
    for quality in [0.0, 0.35, 0.8, 1.0] {
        let mut state = VehicleReliabilityState::with_trait(quality);
        state.tire.quality_tier = TireTier::Quality;
        state.tire.condition = 1.0;
        for _ in 0..100 {
            apply_wear(&mut state, &cfg.tires, 10.0);
        }
        let expected = 1.0
            - 1_000.0 * cfg.tires.tire_wear_rate_per_km * 0.67 * dna_wear_multiplier(&cfg.tires, quality);
        assert!(
            (state.tire.condition - expected).abs() < 1e-4,
            "trait {quality}: {} vs {expected}",
            state.tire.condition
        );
        assert!((state.tire.distance_km - 1_000.0).abs() < 1e-3);
    }
}

#[test]
fn stuck_down_implement_is_forced_back_down() {
    let mut cfg = ReliabilityConfig::default();
    only(&mut cfg, MalfunctionKind::ImplementStuckDown);
    let mut tuning = cfg.malfunctions.tuning(MalfunctionKind::ImplementStuckDown);
    tuning.base_chance = 1.0;
    cfg.malfunctions
        .set_tuning(MalfunctionKind::ImplementStuckDown, tuning);
    cfg.seizure.min_chance = 0.0;
    cfg.seizure.max_chance = 0.0;
    cfg.seizure.lemon_penalty = 0.0;
    let mut engine = ReliabilityEngine::new(cfg, 5);
    let mut state = VehicleReliabilityState::with_trait(0.5);
    state.subsystems.hydraulic.reliability = 0.05;
    state.fluids.hydraulic.level = 0.05;
    engine.insert_state(TRACTOR, state);

    let lowered = VehicleInputs {
        motor_running: true,
        implements: smallvec::smallvec![ImplementInput::new(2).lowered(true)],
        ..VehicleInputs::default()
    };
    let first = engine.tick(TRACTOR, &lowered, 0);
    assert_eq!(first.fired, Some(MalfunctionKind::ImplementStuckDown));
    let stuck = engine.state(TRACTOR).unwrap();
    assert!(stuck.is_active(MalfunctionKind::ImplementStuckDown));
    assert_eq!(
        stuck.instance(MalfunctionKind::ImplementStuckDown).unwrap().target,
        Some(ImplementSlot(2))
    );

    let raised = VehicleInputs {
        implements: smallvec::smallvec![ImplementInput::new(2)],
        ..lowered
    };
    let next = engine.tick(TRACTOR, &raised, 1_000);
    assert!(next.commands.contains(&ActuatorCommand::SetImplementLowered {
        slot: ImplementSlot(2),
        lowered: true,
    }));
}

#[test]
fn workhorse_ceilings_survive_any_number_of_repairs() {
    let cfg = ReliabilityConfig::default();
    for quality in [0.90, 0.93, 1.0] {
        let mut state = VehicleReliabilityState::with_trait(quality);
        state.reliability_ceiling = 0.8;
        for _ in 0..500 {
            assert!(!repair_degradation(&mut state, &cfg.degradation, RepairScope::Full));
        }
        assert!((state.reliability_ceiling - 0.8).abs() < f32::EPSILON);
        reliability::repair_bonus(&mut state, &cfg.degradation, RepairScope::Full);
        assert!((state.reliability_ceiling - 0.8).abs() < f32::EPSILON);
    }

    let mut lemon = VehicleReliabilityState::with_trait(0.2);
    for _ in 0..500 {
        repair_degradation(&mut lemon, &cfg.degradation, RepairScope::Full);
    }
    assert!((lemon.reliability_ceiling - cfg.degradation.ceiling_floor).abs() < 1e-6);
}

#[test]
fn subsystem_repair_leaves_other_seizures_alone() {
    let mut engine = ReliabilityEngine::new(ReliabilityConfig::default(), 8);
    let mut state = VehicleReliabilityState::with_trait(0.5);
    state.subsystems.engine.seized = true;
    state.subsystems.hydraulic.seized = true;
    engine.insert_state(TRACTOR, state);

    engine.repair(TRACTOR, RepairScope::Subsystem(SubsystemKind::Hydraulic), 0);
    let after = engine.state(TRACTOR).unwrap();
    assert!(after.subsystems.engine.seized);
    assert!(!after.subsystems.hydraulic.seized);
}

#[test]
fn dry_oil_cuts_the_engine_ceiling_once_and_refill_keeps_the_cut() {
    let mut cfg = ReliabilityConfig::default();
    cfg.malfunctions.force_chance = Some(1.0);
    only(&mut cfg, MalfunctionKind::EngineStall);
    let dry_cut = cfg.fluids.ran_dry_ceiling_cut;
    let keep = 1.0
        - (cfg.degradation.component_factor * breakdown_factor(&cfg.degradation, 0.95)).clamp(0.0, 1.0);
    let mut engine = ReliabilityEngine::new(cfg, 31);
    let mut state = VehicleReliabilityState::with_trait(0.95);
    state.subsystems.engine.reliability = 0.45;
    state.fluids.oil.level = 0.05;
    engine.insert_state(TRACTOR, state);

    let inputs = VehicleInputs {
        motor_running: true,
        motor_load: 0.2,
        ..VehicleInputs::default()
    };
    let mut fires = 0;
    let mut dry_fires = 0;
    for second in 0..=90 {
        let before = engine.state(TRACTOR).unwrap();
        let ceiling = before.subsystems.engine.durability_ceiling;
        let cut_before = before.fluids.oil.ran_dry_cut_applied;
        let outcome = engine.tick(TRACTOR, &inputs, second * 1_000);
        if outcome.fired != Some(MalfunctionKind::EngineStall) {
            continue;
        }
        fires += 1;
        let after = engine.state(TRACTOR).unwrap();
        let expected = if after.fluids.oil.ran_dry_cut_applied && !cut_before {
            dry_fires += 1;
            (ceiling - dry_cut) * keep
        } else {
            ceiling * keep
        };
        assert!(
            (after.subsystems.engine.durability_ceiling - expected).abs() < 1e-5,
            "second {second}: {} vs {expected}",
            after.subsystems.engine.durability_ceiling
        );
    }
    assert!(fires >= 3, "only {fires} stalls");
    assert_eq!(dry_fires, 1);
    let dry = engine.state(TRACTOR).unwrap();
    assert!(dry.fluids.oil.ran_dry);
    assert!(dry.fluids.oil.ran_dry_cut_applied);

    let ceiling = dry.subsystems.engine.durability_ceiling;
    assert!(engine.service(TRACTOR, ServiceAction::RefillOil, 91_000));
    let refilled = engine.state(TRACTOR).unwrap();
    assert!(!refilled.fluids.oil.ran_dry);
    assert!(!refilled.fluids.oil.ran_dry_cut_applied);
    assert!((refilled.fluids.oil.level - 1.0).abs() < f32::EPSILON);
    assert!((refilled.subsystems.engine.durability_ceiling - ceiling).abs() < f32::EPSILON);
}

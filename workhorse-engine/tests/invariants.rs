use proptest::prelude::*;
use workhorse_engine::reliability::{self, RepairScope};
use workhorse_engine::{
    EntityHandle, ImplementInput, MalfunctionKind, ReliabilityConfig, ReliabilityEngine,
    SubsystemKind, VehicleInputs, VehicleReliabilityState, Weather,
};

#[derive(Debug, Clone)]
struct Step {
    running: bool,
    load: f32,
    speed: f32,
    km: f32,
    actions: u32,
    damage: f32,
    lowered: bool,
    dt_ms: u64,
}

fn step() -> impl Strategy<Value = Step> {
    (
        any::<bool>(),
        -0.5f32..1.5,
        -5.0f32..60.0,
        0.0f32..0.5,
        0u32..20,
        -0.2f32..1.2,
        any::<bool>(),
        0u64..8_000,
    )
        .prop_map(
            |(running, load, speed, km, actions, damage, lowered, dt_ms)| Step {
                running,
                load,
                speed,
                km,
                actions,
                damage,
                lowered,
                dt_ms,
            },
        )
}

fn assert_bounded(state: &VehicleReliabilityState) {
    assert!((0.0..=1.0).contains(&state.quality_trait()));
    assert!((0.30..=1.0).contains(&state.reliability_ceiling));
    for kind in SubsystemKind::ALL {
        let subsystem = state.subsystem(kind);
        assert!((0.30..=1.0).contains(&subsystem.durability_ceiling));
        assert!(subsystem.reliability >= 0.0);
        assert!(subsystem.reliability <= state.ceiling_for(kind) + f32::EPSILON);
    }
    assert!((0.0..=1.0).contains(&state.fluids.oil.level));
    assert!((0.0..=1.0).contains(&state.fluids.hydraulic.level));
    assert!(state.fuel.leak_multiplier >= 1.0);
    assert!((0.0..=1.0).contains(&state.tire.condition));
    assert!((0.0..=1.0).contains(&state.engine_heat));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn random_tick_sequences_keep_fields_in_range(
        seed in any::<u64>(),
        quality in 0.0f32..=1.0,
        force in prop::option::of(0.0f32..=1.0),
        steps in prop::collection::vec(step(), 1..120),
    ) {
        let mut cfg = ReliabilityConfig::default();
        cfg.malfunctions.force_chance = force;
        let mut engine = ReliabilityEngine::new(cfg, seed);
        let handle = EntityHandle(1);
        engine.insert_state(handle, VehicleReliabilityState::with_trait(quality));
        let mut now = 0u64;
        for step in steps {
            now += step.dt_ms;
            let inputs = VehicleInputs {
                motor_running: step.running,
                motor_load: step.load,
                speed_kph: step.speed,
                distance_km: step.km,
                hydraulic_actions: step.actions,
                damage: step.damage,
                implements: smallvec::smallvec![ImplementInput::new(0).lowered(step.lowered)],
                weather: Weather { wet: step.lowered, snow: false },
                ..VehicleInputs::default()
            };
            let outcome = engine.tick(handle, &inputs, now);
            prop_assert!(outcome.speed_multiplier > 0.0);
            prop_assert!(outcome.traction_multiplier > 0.0);
            prop_assert!(outcome.fuel_usage_multiplier >= 1.0);
            engine.frame(handle, &inputs, now + 16);
            assert_bounded(engine.state(handle).expect("registered"));
        }
    }

    #[test]
    fn ceilings_cap_reliability_after_repairs_and_breakdowns(
        quality in 0.0f32..=1.0,
        ops in prop::collection::vec(0u8..5, 1..200),
    ) {
        let cfg = ReliabilityConfig::default();
        let mut state = VehicleReliabilityState::with_trait(quality);
        for op in ops {
            match op {
                0 => reliability::repair_bonus(&mut state, &cfg.degradation, RepairScope::Full),
                1 => reliability::repair_bonus(
                    &mut state,
                    &cfg.degradation,
                    RepairScope::Subsystem(SubsystemKind::Electrical),
                ),
                2 => {
                    reliability::breakdown_degradation(&mut state, &cfg.degradation, None);
                }
                3 => {
                    reliability::breakdown_degradation(
                        &mut state,
                        &cfg.degradation,
                        Some(SubsystemKind::Hydraulic),
                    );
                }
                _ => {
                    reliability::repair_degradation(&mut state, &cfg.degradation, RepairScope::Full);
                }
            }
            assert_bounded(&state);
        }
    }

    #[test]
    fn immune_traits_never_lose_ceiling_to_repairs(
        quality in 0.90f32..=1.0,
        repairs in 1usize..300,
    ) {
        let cfg = ReliabilityConfig::default();
        let mut state = VehicleReliabilityState::with_trait(quality);
        let ceiling = state.reliability_ceiling;
        for _ in 0..repairs {
            reliability::repair_degradation(&mut state, &cfg.degradation, RepairScope::Full);
        }
        prop_assert!((state.reliability_ceiling - ceiling).abs() < f32::EPSILON);
    }
}

#[test]
fn seized_subsystems_block_their_temporary_kinds() {
    let mut cfg = ReliabilityConfig::default();
    cfg.malfunctions.force_chance = Some(1.0);
    let mut engine = ReliabilityEngine::new(cfg, 12);
    let mut state = VehicleReliabilityState::with_trait(0.5);
    state.subsystems.engine.seized = true;
    state.subsystems.hydraulic.seized = true;
    state.subsystems.electrical.seized = true;
    for kind in SubsystemKind::ALL {
        state.subsystems.get_mut(kind).reliability = 0.2;
    }
    engine.insert_state(EntityHandle(3), state);
    let inputs = VehicleInputs {
        motor_running: true,
        speed_kph: 10.0,
        implements: smallvec::smallvec![ImplementInput::new(1).lowered(true)],
        ..VehicleInputs::default()
    };
    for second in 0..600 {
        let outcome = engine.tick(EntityHandle(3), &inputs, second * 1_000);
        if let Some(kind) = outcome.fired {
            assert!(!kind.is_temporary(), "{kind:?} started on a seized subsystem");
        }
    }
    let state = engine.state(EntityHandle(3)).expect("registered");
    assert!(!state.is_active(MalfunctionKind::EngineStall));
}

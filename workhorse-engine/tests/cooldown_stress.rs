use workhorse_engine::{
    EntityHandle, EventPhase, ImplementInput, ReliabilityConfig, ReliabilityEngine, SubsystemKind,
    VehicleInputs, VehicleReliabilityState,
};

const TICKS: u64 = 10_000;

fn busy_inputs() -> VehicleInputs {
    VehicleInputs {
        motor_running: true,
        motor_load: 0.8,
        speed_kph: 18.0,
        distance_km: 0.005,
        hydraulic_actions: 2,
        implements: smallvec::smallvec![
            ImplementInput::new(1).lowered(true).powered(true),
            ImplementInput::new(2),
        ],
        has_focus: true,
        ..VehicleInputs::default()
    }
}

#[test]
fn forced_failures_never_start_inside_the_cooldown() {
    let mut cfg = ReliabilityConfig::default();
    cfg.malfunctions.force_chance = Some(1.0);
    let cooldown = cfg.malfunctions.global_cooldown_ms;
    let mut engine = ReliabilityEngine::new(cfg, 0x5EED);
    let fleet = [EntityHandle(1), EntityHandle(2)];
    for handle in fleet {
        let mut worn = VehicleReliabilityState::with_trait(0.6);
        for kind in SubsystemKind::ALL {
            worn.subsystems.get_mut(kind).reliability = 0.35;
        }
        engine.insert_state(handle, worn);
    }
    let inputs = busy_inputs();

    for handle in fleet {
        let mut starts = Vec::new();
        for second in 0..TICKS {
            let now = second * 1_000;
            let outcome = engine.tick(handle, &inputs, now);
            starts.extend(
                outcome
                    .events
                    .iter()
                    .filter(|e| matches!(e.phase, EventPhase::Started | EventPhase::Seized))
                    .map(|e| e.started_at),
            );
            let state = engine.state(handle).expect("registered");
            for kind in SubsystemKind::ALL {
                let subsystem = state.subsystem(kind);
                assert!(subsystem.reliability <= state.ceiling_for(kind) + f32::EPSILON);
            }
        }
        assert!(starts.len() > 50, "forced run produced only {} starts", starts.len());
        for pair in starts.windows(2) {
            assert!(
                pair[1] - pair[0] >= cooldown,
                "starts at {} and {} inside cooldown",
                pair[0],
                pair[1]
            );
        }
    }
}

use workhorse_engine::{
    EntityHandle, FleetSnapshot, PreOwnedProfile, ReliabilityConfig, ReliabilityEngine,
    SellerTier, SnapshotError, VehicleInputs, state_fingerprint,
};

fn drive(engine: &mut ReliabilityEngine, from: u64, to: u64) -> Vec<u64> {
    let inputs = VehicleInputs {
        motor_running: true,
        motor_load: 0.7,
        speed_kph: 12.0,
        distance_km: 0.003,
        ..VehicleInputs::default()
    };
    let mut prints = Vec::new();
    for second in from..to {
        for handle in engine.handles() {
            engine.tick(handle, &inputs, second * 1_000);
            prints.push(state_fingerprint(engine.state(handle).expect("registered")));
        }
    }
    prints
}

fn fleet(seed: u64) -> ReliabilityEngine {
    let mut cfg = ReliabilityConfig::default();
    cfg.malfunctions.force_chance = Some(0.2);
    let mut engine = ReliabilityEngine::new(cfg, seed);
    engine.register_new(EntityHandle(1));
    engine.register_pre_owned(
        EntityHandle(2),
        &PreOwnedProfile {
            tier: SellerTier::Rough,
            operating_hours: 2_500.0,
        },
    );
    engine
}

#[test]
fn same_seed_same_history() {
    let mut a = fleet(404);
    let mut b = fleet(404);
    assert_eq!(drive(&mut a, 0, 300), drive(&mut b, 0, 300));
    assert_eq!(a.snapshot().fingerprint(), b.snapshot().fingerprint());
}

#[test]
fn json_snapshot_resumes_mid_run() {
    let mut original = fleet(9);
    drive(&mut original, 0, 120);
    let json = original.snapshot().to_json().expect("serialize");

    let mut restored = ReliabilityEngine::new(original.config().clone(), 1);
    restored
        .restore(FleetSnapshot::from_json(&json).expect("parse"))
        .expect("restore");
    assert_eq!(restored.rng_draws(), original.rng_draws());
    assert_eq!(drive(&mut original, 120, 240), drive(&mut restored, 120, 240));
}

#[test]
fn corrupt_snapshot_values_are_sanitized_on_restore() {
    let mut engine = fleet(3);
    let mut snapshot = engine.snapshot();
    snapshot.vehicles[0].state.subsystems.engine.reliability = 7.0;
    snapshot.vehicles[0].state.tire.condition = -3.0;
    engine.restore(snapshot).expect("restore");
    let state = engine.state(EntityHandle(1)).expect("restored");
    assert!(state.subsystems.engine.reliability <= 1.0);
    assert!(state.tire.condition.abs() < f32::EPSILON);
}

#[test]
fn future_versions_are_refused() {
    let mut engine = fleet(3);
    let mut snapshot = engine.snapshot();
    snapshot.version += 1;
    assert!(matches!(
        engine.restore(snapshot),
        Err(SnapshotError::UnsupportedVersion { .. })
    ));
    assert_eq!(engine.len(), 2);
}

use anyhow::{Result, ensure};

use crate::logic::{DriveProfile, SimulationPlan, SimulationSummary, VehicleSetup};
use workhorse_engine::{
    EndReason, LeakSeverity, MalfunctionKind, PreOwnedProfile, QualityHint, SellerTier, TireTier,
    VehicleReliabilityState, Weather,
};

pub struct CatalogEntry {
    pub key: &'static str,
    pub title: &'static str,
    pub aliases: &'static [&'static str],
    pub build: fn() -> SimulationPlan,
}

pub const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        key: "fresh",
        title: "Fresh Vehicle Shakedown",
        aliases: &["smoke"],
        build: fresh_plan,
    },
    CatalogEntry {
        key: "lemon",
        title: "Lemon Under Load",
        aliases: &[],
        build: lemon_plan,
    },
    CatalogEntry {
        key: "workhorse",
        title: "Workhorse Repair Immunity",
        aliases: &[],
        build: workhorse_plan,
    },
    CatalogEntry {
        key: "pre-owned",
        title: "Pre-Owned From A Rough Seller",
        aliases: &["used"],
        build: pre_owned_plan,
    },
    CatalogEntry {
        key: "neglected-fluids",
        title: "Neglected Fluids Run Dry",
        aliases: &["dry"],
        build: neglected_fluids_plan,
    },
    CatalogEntry {
        key: "serviced-fluids",
        title: "Serviced Fluids Stay Topped Up",
        aliases: &[],
        build: serviced_fluids_plan,
    },
    CatalogEntry {
        key: "runaway",
        title: "Runaway Until Engine Off",
        aliases: &[],
        build: runaway_plan,
    },
    CatalogEntry {
        key: "worn-tires",
        title: "Worn Retreads In The Wet",
        aliases: &["tires"],
        build: worn_tires_plan,
    },
    CatalogEntry {
        key: "electrical-cutout",
        title: "Electrical Cutouts Kill Implements",
        aliases: &["cutout"],
        build: electrical_cutout_plan,
    },
    CatalogEntry {
        key: "stuck-implement",
        title: "Implement Stuck Down",
        aliases: &["stuck"],
        build: stuck_implement_plan,
    },
    CatalogEntry {
        key: "cooldown-stress",
        title: "Forced Failure Cooldown Stress",
        aliases: &["stress"],
        build: cooldown_stress_plan,
    },
    CatalogEntry {
        key: "determinism",
        title: "Snapshot Replay Determinism",
        aliases: &["deterministic", "replay"],
        build: determinism_plan,
    },
];

fn preset(quality_trait: f32, tweak: impl FnOnce(&mut VehicleReliabilityState)) -> VehicleSetup {
    let mut state = VehicleReliabilityState::with_trait(quality_trait);
    tweak(&mut state);
    VehicleSetup::Preset(Box::new(state))
}

fn worn_to(state: &mut VehicleReliabilityState, reliability: f32) {
    for (_, subsystem) in state.subsystems.iter_mut() {
        subsystem.reliability = reliability;
    }
}

fn dry_fluids(state: &mut VehicleReliabilityState, leaking: bool) {
    for fluid in [&mut state.fluids.oil, &mut state.fluids.hydraulic] {
        fluid.level = 0.05;
        if leaking {
            fluid.has_leak = true;
            fluid.leak_severity = LeakSeverity::Moderate;
        }
    }
}

fn no_violations(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.violations.is_empty(),
        "{} invariant violations, first: {}",
        summary.violation_count,
        summary.violations.first().map_or("-", String::as_str)
    );
    Ok(())
}

fn fresh_plan() -> SimulationPlan {
    SimulationPlan::new(VehicleSetup::Fresh, DriveProfile::Mixed)
        .with_auto_service()
        .with_expectation(no_violations)
        .with_expectation(|summary: &SimulationSummary| -> Result<()> {
            ensure!(
                summary.reports.iter().all(|r| !r.any_seized()),
                "a fresh vehicle seized inside its first hour"
            );
            ensure!(summary.seizures == 0, "{} seizure events", summary.seizures);
            Ok(())
        })
}

fn lemon_plan() -> SimulationPlan {
    SimulationPlan::new(preset(0.15, |s| worn_to(s, 0.35)), DriveProfile::Fieldwork)
        .with_expectation(no_violations)
        .with_expectation(|summary: &SimulationSummary| -> Result<()> {
            ensure!(
                summary.reports.iter().all(|r| r.quality == QualityHint::Lemon),
                "inspection did not read the vehicle as a lemon"
            );
            ensure!(summary.total_starts() > 0, "a worn lemon never faulted");
            Ok(())
        })
}

fn workhorse_plan() -> SimulationPlan {
    SimulationPlan::new(preset(0.95, |s| worn_to(s, 0.5)), DriveProfile::Fieldwork)
        .with_repairs_every(300)
        .with_expectation(no_violations)
        .with_expectation(|summary: &SimulationSummary| -> Result<()> {
            ensure!(
                summary.repair_ceiling_loss == 0.0,
                "repairs cost a workhorse {} ceiling",
                summary.repair_ceiling_loss
            );
            ensure!(
                summary.final_states.iter().all(|s| s.counters.repair_count >= 11),
                "expected a repair every 300 ticks"
            );
            Ok(())
        })
}

fn pre_owned_plan() -> SimulationPlan {
    let profile = PreOwnedProfile {
        tier: SellerTier::Rough,
        operating_hours: 6_000.0,
    };
    SimulationPlan::new(VehicleSetup::PreOwned(profile), DriveProfile::Road)
        .with_auto_service()
        .with_expectation(no_violations)
        .with_expectation(|summary: &SimulationSummary| -> Result<()> {
            ensure!(
                summary.reports.iter().all(|r| r.repair_count > 0),
                "pre-owned history carried no prior repairs"
            );
            Ok(())
        })
}

fn neglected_fluids_plan() -> SimulationPlan {
    SimulationPlan::new(preset(0.5, |s| dry_fluids(s, true)), DriveProfile::Fieldwork)
        .with_ticks(600)
        .with_expectation(no_violations)
        .with_expectation(|summary: &SimulationSummary| -> Result<()> {
            ensure!(summary.any_ran_dry(), "neglected fluids never ran dry");
            Ok(())
        })
}

fn serviced_fluids_plan() -> SimulationPlan {
    SimulationPlan::new(preset(0.5, |s| dry_fluids(s, true)), DriveProfile::Fieldwork)
        .with_ticks(600)
        .with_auto_service()
        .with_expectation(no_violations)
        .with_expectation(|summary: &SimulationSummary| -> Result<()> {
            ensure!(!summary.any_ran_dry(), "serviced fluids still ran dry");
            ensure!(summary.services >= 2, "only {} services", summary.services);
            Ok(())
        })
}

fn runaway_plan() -> SimulationPlan {
    SimulationPlan::new(preset(0.6, |s| dry_fluids(s, false)), DriveProfile::Road)
        .only(MalfunctionKind::Runaway)
        .with_force_chance(1.0)
        .with_runaway_checks()
        .with_motor_off_at(120)
        .with_ticks(240)
        .with_expectation(no_violations)
        .with_expectation(|summary: &SimulationSummary| -> Result<()> {
            ensure!(
                summary.started(MalfunctionKind::Runaway) >= 1,
                "dry fluids at speed never ran away"
            );
            ensure!(
                summary.ended_by(EndReason::EngineOff) >= 1,
                "runaway did not end when the engine stopped"
            );
            ensure!(
                summary.max_speed_multiplier >= 1.0,
                "runaway never lifted the speed governor"
            );
            Ok(())
        })
}

fn worn_tires_plan() -> SimulationPlan {
    let setup = preset(0.5, |s| {
        s.tire.quality_tier = TireTier::Retread;
        s.tire.condition = 0.25;
    });
    SimulationPlan::new(setup, DriveProfile::Road)
        .with_weather(Weather {
            wet: true,
            snow: false,
        })
        .only(MalfunctionKind::FlatTire)
        .with_force_chance(1.0)
        .with_auto_service()
        .with_ticks(1_800)
        .with_expectation(no_violations)
        .with_expectation(|summary: &SimulationSummary| -> Result<()> {
            ensure!(
                summary.started(MalfunctionKind::FlatTire) >= 2,
                "expected repeated flats"
            );
            ensure!(
                summary.ended_by(EndReason::Serviced) >= 1,
                "no flat was ever serviced"
            );
            ensure!(
                summary.min_traction < 1.0,
                "wet retreads kept full traction"
            );
            Ok(())
        })
}

fn electrical_cutout_plan() -> SimulationPlan {
    let setup = preset(0.6, |s| s.subsystems.electrical.reliability = 0.3);
    SimulationPlan::new(setup, DriveProfile::Fieldwork)
        .only(MalfunctionKind::ElectricalCutout)
        .with_force_chance(1.0)
        .with_ticks(900)
        .with_expectation(no_violations)
        .with_expectation(|summary: &SimulationSummary| -> Result<()> {
            ensure!(
                summary.started(MalfunctionKind::ElectricalCutout) >= 2,
                "expected repeated cutouts"
            );
            ensure!(
                summary.command_count("all_implements_off") >= 1,
                "cutouts never cut implement power"
            );
            ensure!(
                summary.ended_by(EndReason::Expired) >= 1,
                "no cutout ever expired"
            );
            Ok(())
        })
}

fn stuck_implement_plan() -> SimulationPlan {
    let setup = preset(0.6, |s| s.subsystems.hydraulic.reliability = 0.3);
    SimulationPlan::new(setup, DriveProfile::Fieldwork)
        .only(MalfunctionKind::ImplementStuckDown)
        .with_force_chance(1.0)
        .with_ticks(900)
        .with_expectation(no_violations)
        .with_expectation(|summary: &SimulationSummary| -> Result<()> {
            ensure!(
                summary.started(MalfunctionKind::ImplementStuckDown) >= 1,
                "a lowered implement never stuck"
            );
            ensure!(
                summary.ended_by(EndReason::Expired) >= 1,
                "a stuck implement never freed itself"
            );
            Ok(())
        })
}

fn cooldown_stress_plan() -> SimulationPlan {
    SimulationPlan::new(preset(0.5, |s| worn_to(s, 0.3)), DriveProfile::Mixed)
        .with_fleet(3)
        .with_force_chance(1.0)
        .with_repairs_every(300)
        .with_expectation(no_violations)
        .with_expectation(|summary: &SimulationSummary| -> Result<()> {
            ensure!(
                summary.total_starts() >= 30,
                "forced run produced only {} starts",
                summary.total_starts()
            );
            let gap = summary.min_start_gap_ms.unwrap_or(u64::MAX);
            ensure!(
                gap >= summary.cooldown_ms,
                "two starts {gap} ms apart inside a {} ms cooldown",
                summary.cooldown_ms
            );
            Ok(())
        })
}

fn determinism_plan() -> SimulationPlan {
    SimulationPlan::new(VehicleSetup::Fresh, DriveProfile::Mixed)
        .with_fleet(3)
        .with_force_chance(0.05)
        .with_ticks(2_400)
        .with_replay_check()
        .with_expectation(no_violations)
        .with_expectation(|summary: &SimulationSummary| -> Result<()> {
            ensure!(
                summary.replay_consistent == Some(true),
                "snapshot replay diverged from the live run"
            );
            ensure!(summary.trace.len() == 40, "trace has {} samples", summary.trace.len());
            Ok(())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::SimulationRunner;
    use workhorse_engine::ReliabilityConfig;

    fn run(key: &str, seed: u64) -> SimulationSummary {
        let entry = CATALOG.iter().find(|e| e.key == key).expect("catalog entry");
        let plan = (entry.build)();
        let summary = SimulationRunner::new(ReliabilityConfig::default()).run_plan(&plan, seed);
        for expectation in &plan.expectations {
            expectation
                .evaluate(&summary)
                .unwrap_or_else(|err| panic!("{key} seed {seed}: {err:#}"));
        }
        summary
    }

    #[test]
    fn keys_are_unique() {
        let mut keys: Vec<&str> = CATALOG
            .iter()
            .flat_map(|e| std::iter::once(e.key).chain(e.aliases.iter().copied()))
            .collect();
        let total = keys.len();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), total);
    }

    #[test]
    fn runaway_scenario_passes() {
        run("runaway", 1337);
    }

    #[test]
    fn cutout_scenario_passes() {
        run("electrical-cutout", 1337);
    }

    #[test]
    fn neglected_and_serviced_fluids_diverge() {
        let neglected = run("neglected-fluids", 8);
        let serviced = run("serviced-fluids", 8);
        assert!(neglected.any_ran_dry());
        assert!(!serviced.any_ran_dry());
    }
}

use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use workhorse_engine::inputs::ImplementSet;
use workhorse_engine::{
    ActuatorCommand, EndReason, EntityHandle, EventPhase, FleetSnapshot, FluidKind, ImplementInput,
    InspectionReport, LeakTarget, MalfunctionEvent, MalfunctionKind, PreOwnedProfile,
    ReliabilityConfig, ReliabilityEngine, RepairScope, ServiceAction, SubsystemKind, Timestamp,
    VehicleInputs, VehicleReliabilityState, Weather,
};

/// Wall-clock length of one simulated tick.
pub const TICK_MS: u64 = 1_000;
pub const DEFAULT_TICKS: u64 = 3_600;
const DEFAULT_FRAMES_PER_TICK: u32 = 3;
const MIXED_PHASE_TICKS: u64 = 300;
/// How often the simulated operator re-applies their implement intentions.
const DRIVER_REACTION_TICKS: u64 = 30;
const TRACE_EVERY_TICKS: u64 = 60;
const MAX_RECORDED_VIOLATIONS: usize = 25;
const SERVICE_FLUID_LEVEL: f32 = 0.3;
const SERVICE_TIRE_CONDITION: f32 = 0.1;
const EPS: f32 = 1e-5;

/// How each simulated vehicle enters the fleet.
#[derive(Debug, Clone)]
pub enum VehicleSetup {
    Fresh,
    PreOwned(PreOwnedProfile),
    Preset(Box<VehicleReliabilityState>),
}

/// What the simulated operator is doing with the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveProfile {
    Idle,
    Fieldwork,
    Road,
    /// Alternates fieldwork and road legs.
    Mixed,
}

impl DriveProfile {
    const fn phase(self, tick: u64) -> Self {
        match self {
            Self::Mixed => {
                if (tick / MIXED_PHASE_TICKS) % 2 == 0 {
                    Self::Fieldwork
                } else {
                    Self::Road
                }
            }
            other => other,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fieldwork => "fieldwork",
            Self::Road => "road",
            Self::Mixed => "mixed",
        }
    }
}

#[derive(Clone)]
pub struct SimulationExpectation(Arc<dyn Fn(&SimulationSummary) -> Result<()> + Send + Sync>);

impl SimulationExpectation {
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(check))
    }

    /// # Errors
    ///
    /// Returns the expectation's failure.
    pub fn evaluate(&self, summary: &SimulationSummary) -> Result<()> {
        (self.0)(summary)
    }
}

impl<F> From<F> for SimulationExpectation
where
    F: Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static,
{
    fn from(check: F) -> Self {
        Self::new(check)
    }
}

impl fmt::Debug for SimulationExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SimulationExpectation(..)")
    }
}

#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub setup: VehicleSetup,
    pub fleet_size: u64,
    pub drive: DriveProfile,
    pub weather: Weather,
    pub ticks: u64,
    pub frames_per_tick: u32,
    pub force_chance: Option<f32>,
    /// Disable every malfunction but this one.
    pub only: Option<MalfunctionKind>,
    pub repair_every: Option<u64>,
    pub auto_service: bool,
    pub motor_off_at: Option<u64>,
    pub runaway_checks: bool,
    /// Snapshot halfway through and check a JSON-restored copy finishes identically.
    pub replay_check: bool,
    pub expectations: Vec<SimulationExpectation>,
}

impl SimulationPlan {
    #[must_use]
    pub fn new(setup: VehicleSetup, drive: DriveProfile) -> Self {
        Self {
            setup,
            fleet_size: 1,
            drive,
            weather: Weather::default(),
            ticks: DEFAULT_TICKS,
            frames_per_tick: DEFAULT_FRAMES_PER_TICK,
            force_chance: None,
            only: None,
            repair_every: None,
            auto_service: false,
            motor_off_at: None,
            runaway_checks: false,
            replay_check: false,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_ticks(mut self, ticks: u64) -> Self {
        self.ticks = ticks;
        self
    }

    #[must_use]
    pub const fn with_fleet(mut self, size: u64) -> Self {
        self.fleet_size = size;
        self
    }

    #[must_use]
    pub const fn with_weather(mut self, weather: Weather) -> Self {
        self.weather = weather;
        self
    }

    #[must_use]
    pub const fn with_force_chance(mut self, chance: f32) -> Self {
        self.force_chance = Some(chance);
        self
    }

    #[must_use]
    pub const fn only(mut self, kind: MalfunctionKind) -> Self {
        self.only = Some(kind);
        self
    }

    #[must_use]
    pub const fn with_repairs_every(mut self, ticks: u64) -> Self {
        self.repair_every = Some(ticks);
        self
    }

    #[must_use]
    pub const fn with_auto_service(mut self) -> Self {
        self.auto_service = true;
        self
    }

    #[must_use]
    pub const fn with_motor_off_at(mut self, tick: u64) -> Self {
        self.motor_off_at = Some(tick);
        self
    }

    #[must_use]
    pub const fn with_runaway_checks(mut self) -> Self {
        self.runaway_checks = true;
        self
    }

    #[must_use]
    pub const fn with_replay_check(mut self) -> Self {
        self.replay_check = true;
        self
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: impl Into<SimulationExpectation>) -> Self {
        self.expectations.push(expectation.into());
        self
    }
}

/// Everything one run observed.
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub seed: u64,
    pub ticks_run: u64,
    pub cooldown_ms: u64,
    pub starts: BTreeMap<MalfunctionKind, usize>,
    pub ended: HashMap<EndReason, usize>,
    pub seizures: usize,
    pub reminders: usize,
    pub surfaced: usize,
    pub commands: BTreeMap<&'static str, usize>,
    pub services: usize,
    pub blocked_start_attempts: usize,
    pub violations: Vec<String>,
    pub violation_count: usize,
    /// Smallest gap between two starts on the same vehicle.
    pub min_start_gap_ms: Option<u64>,
    pub min_traction: f32,
    pub max_speed_multiplier: f32,
    pub repair_ceiling_loss: f32,
    pub trace: Vec<u64>,
    pub fingerprint: u64,
    pub replay_consistent: Option<bool>,
    pub reports: Vec<InspectionReport>,
    pub final_states: Vec<VehicleReliabilityState>,
}

impl SimulationSummary {
    fn new(seed: u64, cooldown_ms: u64) -> Self {
        Self {
            seed,
            ticks_run: 0,
            cooldown_ms,
            starts: BTreeMap::new(),
            ended: HashMap::new(),
            seizures: 0,
            reminders: 0,
            surfaced: 0,
            commands: BTreeMap::new(),
            services: 0,
            blocked_start_attempts: 0,
            violations: Vec::new(),
            violation_count: 0,
            min_start_gap_ms: None,
            min_traction: f32::INFINITY,
            max_speed_multiplier: 0.0,
            repair_ceiling_loss: 0.0,
            trace: Vec::new(),
            fingerprint: 0,
            replay_consistent: None,
            reports: Vec::new(),
            final_states: Vec::new(),
        }
    }

    #[must_use]
    pub fn started(&self, kind: MalfunctionKind) -> usize {
        self.starts.get(&kind).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total_starts(&self) -> usize {
        self.starts.values().sum()
    }

    #[must_use]
    pub fn ended_by(&self, reason: EndReason) -> usize {
        self.ended.get(&reason).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn command_count(&self, label: &str) -> usize {
        self.commands.get(label).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn any_ran_dry(&self) -> bool {
        self.reports
            .iter()
            .flat_map(|r| r.fluids.iter())
            .any(|f| f.ran_dry)
    }

    /// One-line digest used in failure messages.
    #[must_use]
    pub fn headline(&self) -> String {
        format!(
            "seed {} ticks {} starts {} seizures {} reminders {} surfaced {} services {} blocked starts {} violations {}",
            self.seed,
            self.ticks_run,
            self.total_starts(),
            self.seizures,
            self.reminders,
            self.surfaced,
            self.services,
            self.blocked_start_attempts,
            self.violation_count
        )
    }

    fn violation(&mut self, message: String) {
        self.violation_count += 1;
        if self.violations.len() < MAX_RECORDED_VIOLATIONS {
            self.violations.push(message);
        }
    }
}

/// The host side of one vehicle: motor, implements and the operator's intentions.
#[derive(Debug, Clone)]
struct HostVehicle {
    handle: EntityHandle,
    focused: bool,
    motor_running: bool,
    wants_running: bool,
    /// `Some(None)` holds until released.
    start_block: Option<Option<Timestamp>>,
    implements: ImplementSet,
    ai_job_active: bool,
    operating_hours: f32,
}

impl HostVehicle {
    fn new(handle: EntityHandle, focused: bool, operating_hours: f32) -> Self {
        Self {
            handle,
            focused,
            motor_running: true,
            wants_running: true,
            start_block: None,
            implements: [ImplementInput::new(1), ImplementInput::new(2)]
                .into_iter()
                .collect(),
            ai_job_active: true,
            operating_hours,
        }
    }

    fn motor_blocked(&self, now: Timestamp) -> bool {
        match self.start_block {
            None => false,
            Some(None) => true,
            Some(Some(until)) => now < until,
        }
    }

    fn apply(&mut self, command: ActuatorCommand) {
        match command {
            ActuatorCommand::StopMotor => self.motor_running = false,
            ActuatorCommand::BlockMotorStart { until } => self.start_block = Some(until),
            ActuatorCommand::ReleaseMotorStart => self.start_block = None,
            ActuatorCommand::CancelAiJob => self.ai_job_active = false,
            ActuatorCommand::SetImplementLowered { slot, lowered } => {
                if let Some(implement) = self.implements.iter_mut().find(|i| i.slot == slot) {
                    implement.lowered = lowered;
                }
            }
            ActuatorCommand::SetImplementPower { slot, on } => {
                if let Some(implement) = self.implements.iter_mut().find(|i| i.slot == slot) {
                    implement.powered = on;
                }
            }
            ActuatorCommand::AllImplementsOff => {
                for implement in &mut self.implements {
                    implement.powered = false;
                }
            }
            ActuatorCommand::DetachImplement { slot } => {
                if let Some(implement) = self.implements.iter_mut().find(|i| i.slot == slot) {
                    implement.attached = false;
                    implement.powered = false;
                }
            }
            ActuatorCommand::PowerStutter
            | ActuatorCommand::HaltHydraulics
            | ActuatorCommand::ResumeHydraulics => {}
        }
    }

    fn operate(&mut self, phase: DriveProfile) {
        let working = phase == DriveProfile::Fieldwork;
        for implement in self.implements.iter_mut().filter(|i| i.attached) {
            implement.lowered = working;
            implement.powered = working;
        }
    }

    fn reattach(&mut self) {
        for implement in &mut self.implements {
            implement.attached = true;
        }
    }

    fn inputs(&self, phase: DriveProfile, weather: Weather) -> VehicleInputs {
        let (speed_kph, motor_load, hydraulic_actions) = if self.motor_running {
            match phase {
                DriveProfile::Idle => (0.0, 0.1, 0),
                DriveProfile::Fieldwork | DriveProfile::Mixed => (8.0, 0.8, 2),
                DriveProfile::Road => (30.0, 0.45, 0),
            }
        } else {
            (0.0, 0.0, 0)
        };
        VehicleInputs {
            motor_running: self.motor_running,
            damage: 0.0,
            operating_hours: self.operating_hours,
            motor_load,
            speed_kph,
            distance_km: speed_kph / 3_600.0,
            hydraulic_actions,
            implements: self.implements.clone(),
            weather,
            has_focus: self.focused,
            crash_detected: false,
            ai_job_active: self.ai_job_active,
        }
    }
}

/// Drives a [`ReliabilityEngine`] through a [`SimulationPlan`] with a scripted host.
#[derive(Debug, Clone)]
pub struct SimulationRunner {
    base: ReliabilityConfig,
}

impl SimulationRunner {
    #[must_use]
    pub const fn new(base: ReliabilityConfig) -> Self {
        Self { base }
    }

    #[must_use]
    pub fn config_for(&self, plan: &SimulationPlan) -> ReliabilityConfig {
        let mut cfg = self.base.clone();
        if let Some(chance) = plan.force_chance {
            cfg.malfunctions.force_chance = Some(chance);
        }
        if let Some(kind) = plan.only {
            for other in MalfunctionKind::ALL {
                let mut tuning = cfg.malfunctions.tuning(other);
                tuning.enabled = other == kind;
                cfg.malfunctions.set_tuning(other, tuning);
            }
        }
        cfg
    }

    #[must_use]
    pub fn run_plan(&self, plan: &SimulationPlan, seed: u64) -> SimulationSummary {
        let cfg = self.config_for(plan);
        let mut engine = ReliabilityEngine::new(cfg.clone(), seed);
        let mut summary = SimulationSummary::new(seed, engine.config().malfunctions.global_cooldown_ms);
        let mut hosts = register_fleet(&mut engine, plan);
        let mut last_start: HashMap<EntityHandle, Timestamp> = HashMap::new();
        let checkpoint_at = plan.replay_check.then_some(plan.ticks / 2);
        let mut replay: Option<(ReliabilityEngine, Vec<HostVehicle>)> = None;

        for tick in 0..plan.ticks {
            if checkpoint_at == Some(tick) {
                match fork(&mut engine, cfg.clone(), seed) {
                    Ok(copy) => replay = Some((copy, hosts.clone())),
                    Err(err) => summary.violation(format!("snapshot fork failed: {err:#}")),
                }
            }
            step(&mut engine, &mut hosts, plan, tick, &mut summary, &mut last_start);
            if tick % TRACE_EVERY_TICKS == 0 {
                summary.trace.push(engine.snapshot().fingerprint());
            }
        }
        summary.ticks_run = plan.ticks;
        summary.fingerprint = engine.snapshot().fingerprint();

        if let (Some((mut copy, mut copy_hosts)), Some(from)) = (replay, checkpoint_at) {
            let mut scratch = SimulationSummary::new(seed, summary.cooldown_ms);
            let mut scratch_starts = HashMap::new();
            for tick in from..plan.ticks {
                step(&mut copy, &mut copy_hosts, plan, tick, &mut scratch, &mut scratch_starts);
            }
            let consistent = copy.snapshot().fingerprint() == summary.fingerprint;
            if !consistent {
                log::warn!("seed {seed}: replay from snapshot diverged");
            }
            summary.replay_consistent = Some(consistent);
        }

        summary.reports = hosts
            .iter()
            .filter_map(|h| engine.inspect(h.handle))
            .collect();
        summary.final_states = hosts
            .iter()
            .filter_map(|h| engine.state(h.handle).cloned())
            .collect();
        log::info!("run finished: {}", summary.headline());
        summary
    }
}

/// Round-trip the live engine through JSON and return an independent copy.
/// Both sides are restored from the same snapshot so they resume from equal footing.
fn fork(
    engine: &mut ReliabilityEngine,
    cfg: ReliabilityConfig,
    seed: u64,
) -> Result<ReliabilityEngine> {
    let snapshot = engine.snapshot();
    let json = snapshot.to_json()?;
    engine.restore(snapshot)?;
    let mut copy = ReliabilityEngine::new(cfg, seed);
    copy.restore(FleetSnapshot::from_json(&json)?)?;
    Ok(copy)
}

fn register_fleet(engine: &mut ReliabilityEngine, plan: &SimulationPlan) -> Vec<HostVehicle> {
    (0..plan.fleet_size.max(1))
        .map(|index| {
            let handle = EntityHandle(index + 1);
            let hours = match &plan.setup {
                VehicleSetup::Fresh => {
                    engine.register_new(handle);
                    0.0
                }
                VehicleSetup::PreOwned(profile) => {
                    engine.register_pre_owned(handle, profile);
                    profile.operating_hours
                }
                VehicleSetup::Preset(state) => {
                    engine.insert_state(handle, (**state).clone());
                    0.0
                }
            };
            HostVehicle::new(handle, index == 0, hours)
        })
        .collect()
}

fn step(
    engine: &mut ReliabilityEngine,
    hosts: &mut [HostVehicle],
    plan: &SimulationPlan,
    tick: u64,
    summary: &mut SimulationSummary,
    last_start: &mut HashMap<EntityHandle, Timestamp>,
) {
    let now = tick * TICK_MS;
    for host in hosts.iter_mut() {
        if plan.motor_off_at == Some(tick) {
            host.wants_running = false;
            host.motor_running = false;
        }
        if host.wants_running && !host.motor_running {
            if host.motor_blocked(now) {
                summary.blocked_start_attempts += 1;
            } else {
                host.motor_running = true;
            }
        }

        let phase = plan.drive.phase(tick);
        if tick % DRIVER_REACTION_TICKS == 0 {
            host.operate(phase);
        }
        if host.motor_running {
            host.operating_hours += ms_to_hours(TICK_MS);
        }
        let inputs = host.inputs(phase, plan.weather);
        if plan.runaway_checks && host.motor_running {
            engine.check_runaway_condition(host.handle, &inputs, now);
        }
        let outcome = engine.tick(host.handle, &inputs, now);
        record_events(summary, last_start, &outcome.events);
        apply_commands(summary, host, &outcome.commands);
        for (label, value) in [
            ("speed multiplier", outcome.speed_multiplier),
            ("traction multiplier", outcome.traction_multiplier),
            ("fuel multiplier", outcome.fuel_usage_multiplier),
        ] {
            if !value.is_finite() || value < 0.0 {
                summary.violation(format!("tick {tick} {:?}: {label} {value}", host.handle));
            }
        }
        summary.min_traction = summary.min_traction.min(outcome.traction_multiplier);
        summary.max_speed_multiplier = summary.max_speed_multiplier.max(outcome.speed_multiplier);

        let frames = u64::from(plan.frames_per_tick);
        for frame in 1..=frames {
            let at = now + frame * TICK_MS / (frames + 1);
            let inputs = host.inputs(phase, plan.weather);
            let outcome = engine.frame(host.handle, &inputs, at);
            record_events(summary, last_start, &outcome.events);
            apply_commands(summary, host, &outcome.commands);
        }

        if let Some(state) = engine.state(host.handle) {
            for problem in check_invariants(state) {
                summary.violation(format!("tick {tick} {:?}: {problem}", host.handle));
            }
        }

        if let Some(every) = plan.repair_every
            && tick > 0
            && tick % every == 0
        {
            let before = ceiling(engine, host.handle);
            engine.repair(host.handle, RepairScope::Full, now);
            summary.repair_ceiling_loss += (before - ceiling(engine, host.handle)).max(0.0);
            host.reattach();
        }
        if plan.auto_service {
            summary.services += auto_service(engine, host.handle, now);
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn ms_to_hours(ms: u64) -> f32 {
    ms as f32 / 3_600_000.0
}

fn ceiling(engine: &ReliabilityEngine, handle: EntityHandle) -> f32 {
    engine
        .state(handle)
        .map_or(0.0, |state| state.reliability_ceiling)
}

fn record_events(
    summary: &mut SimulationSummary,
    last_start: &mut HashMap<EntityHandle, Timestamp>,
    events: &[MalfunctionEvent],
) {
    for event in events {
        if event.surfaced {
            summary.surfaced += 1;
        }
        match event.phase {
            EventPhase::Started | EventPhase::Seized => {
                if event.phase == EventPhase::Seized {
                    summary.seizures += 1;
                }
                *summary.starts.entry(event.kind).or_default() += 1;
                log::debug!("{:?} {} at {}", event.entity, event.message_key, event.started_at);
                if let Some(previous) = last_start.insert(event.entity, event.started_at) {
                    let gap = event.started_at.saturating_sub(previous);
                    summary.min_start_gap_ms =
                        Some(summary.min_start_gap_ms.map_or(gap, |min| min.min(gap)));
                }
            }
            EventPhase::Ended => {
                if let Some(reason) = event.end_reason {
                    *summary.ended.entry(reason).or_default() += 1;
                }
            }
            EventPhase::Reminder => summary.reminders += 1,
        }
    }
}

fn apply_commands(summary: &mut SimulationSummary, host: &mut HostVehicle, commands: &[ActuatorCommand]) {
    for &command in commands {
        *summary.commands.entry(command_label(command)).or_default() += 1;
        host.apply(command);
    }
}

#[must_use]
pub const fn command_label(command: ActuatorCommand) -> &'static str {
    match command {
        ActuatorCommand::StopMotor => "stop_motor",
        ActuatorCommand::BlockMotorStart { .. } => "block_motor_start",
        ActuatorCommand::ReleaseMotorStart => "release_motor_start",
        ActuatorCommand::CancelAiJob => "cancel_ai_job",
        ActuatorCommand::SetImplementLowered { .. } => "set_implement_lowered",
        ActuatorCommand::SetImplementPower { .. } => "set_implement_power",
        ActuatorCommand::AllImplementsOff => "all_implements_off",
        ActuatorCommand::DetachImplement { .. } => "detach_implement",
        ActuatorCommand::PowerStutter => "power_stutter",
        ActuatorCommand::HaltHydraulics => "halt_hydraulics",
        ActuatorCommand::ResumeHydraulics => "resume_hydraulics",
    }
}

/// Bounds every reliability state must hold between calls.
#[must_use]
pub fn check_invariants(state: &VehicleReliabilityState) -> Vec<String> {
    let mut problems = Vec::new();
    if !(0.0..=1.0).contains(&state.reliability_ceiling) {
        problems.push(format!("ceiling {} out of range", state.reliability_ceiling));
    }
    for kind in SubsystemKind::ALL {
        let subsystem = state.subsystem(kind);
        if !(0.0..=1.0).contains(&subsystem.reliability) {
            problems.push(format!("{kind:?} reliability {} out of range", subsystem.reliability));
        }
        if subsystem.reliability > state.ceiling_for(kind) + EPS {
            problems.push(format!(
                "{kind:?} reliability {} above its ceiling {}",
                subsystem.reliability,
                state.ceiling_for(kind)
            ));
        }
        if subsystem.seized
            && let Some(active) = state
                .active_kinds()
                .find(|m| m.is_temporary() && m.subsystem() == Some(kind))
        {
            problems.push(format!("{active:?} active on seized {kind:?}"));
        }
    }
    for kind in FluidKind::ALL {
        let level = state.fluids.get(kind).level;
        if !(0.0..=1.0).contains(&level) {
            problems.push(format!("{kind:?} level {level} out of range"));
        }
    }
    if !(0.0..=1.0).contains(&state.tire.condition) {
        problems.push(format!("tire condition {} out of range", state.tire.condition));
    }
    problems
}

/// Workshop visit: fix leaks, top up low fluids, mend flats, swap bald tires.
fn auto_service(engine: &mut ReliabilityEngine, handle: EntityHandle, now: Timestamp) -> usize {
    let actions = {
        let Some(state) = engine.state(handle) else {
            return 0;
        };
        let mut actions = Vec::new();
        for (leaking, target) in [
            (state.fluids.oil.has_leak, LeakTarget::Oil),
            (state.fluids.hydraulic.has_leak, LeakTarget::Hydraulic),
            (state.fuel.has_leak, LeakTarget::Fuel),
        ] {
            if leaking {
                actions.push(ServiceAction::FixLeak { target });
            }
        }
        if state.fluids.oil.level < SERVICE_FLUID_LEVEL {
            actions.push(ServiceAction::RefillOil);
        }
        if state.fluids.hydraulic.level < SERVICE_FLUID_LEVEL {
            actions.push(ServiceAction::RefillHydraulic);
        }
        if state.tire.has_flat {
            actions.push(ServiceAction::RepairFlat);
        }
        if state.tire.condition < SERVICE_TIRE_CONDITION {
            actions.push(ServiceAction::ReplaceTires {
                tier: state.tire.quality_tier,
            });
        }
        actions
    };
    actions
        .into_iter()
        .filter(|&action| engine.service(handle, action, now))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use workhorse_engine::SellerTier;

    fn runner() -> SimulationRunner {
        SimulationRunner::new(ReliabilityConfig::default())
    }

    #[test]
    fn same_seed_same_trace() {
        let plan = SimulationPlan::new(VehicleSetup::Fresh, DriveProfile::Mixed)
            .with_ticks(900)
            .with_fleet(2)
            .with_force_chance(0.05);
        let a = runner().run_plan(&plan, 99);
        let b = runner().run_plan(&plan, 99);
        assert_eq!(a.trace, b.trace);
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.starts, b.starts);
        assert_eq!(a.trace.len(), 15);
    }

    fn worn(quality_trait: f32, reliability: f32) -> VehicleSetup {
        let mut state = VehicleReliabilityState::with_trait(quality_trait);
        for (_, subsystem) in state.subsystems.iter_mut() {
            subsystem.reliability = reliability;
        }
        VehicleSetup::Preset(Box::new(state))
    }

    #[test]
    fn forced_run_respects_the_cooldown_without_violations() {
        let plan = SimulationPlan::new(worn(0.5, 0.3), DriveProfile::Fieldwork)
            .with_ticks(1_800)
            .with_force_chance(1.0)
            .with_repairs_every(300);
        let summary = runner().run_plan(&plan, 7);
        assert!(summary.violations.is_empty(), "{:?}", summary.violations);
        assert!(summary.total_starts() > 5);
        let gap = summary.min_start_gap_ms.expect("several starts");
        assert!(gap >= summary.cooldown_ms);
    }

    #[test]
    fn replay_from_snapshot_matches() {
        let plan = SimulationPlan::new(VehicleSetup::Fresh, DriveProfile::Mixed)
            .with_ticks(600)
            .with_force_chance(0.1)
            .with_replay_check();
        let summary = runner().run_plan(&plan, 3);
        assert_eq!(summary.replay_consistent, Some(true));
    }

    #[test]
    fn only_restricts_the_enabled_kinds() {
        let plan = SimulationPlan::new(worn(0.6, 0.3), DriveProfile::Fieldwork)
            .only(MalfunctionKind::ElectricalCutout)
            .with_force_chance(1.0)
            .with_ticks(300);
        let cfg = runner().config_for(&plan);
        assert!(cfg.malfunctions.tuning(MalfunctionKind::ElectricalCutout).enabled);
        assert!(!cfg.malfunctions.tuning(MalfunctionKind::Misfire).enabled);

        let summary = runner().run_plan(&plan, 11);
        assert!(summary.started(MalfunctionKind::ElectricalCutout) >= 1);
        assert_eq!(summary.total_starts(), summary.started(MalfunctionKind::ElectricalCutout));
        assert!(summary.command_count("all_implements_off") >= 1);
    }

    #[test]
    fn host_obeys_motor_commands() {
        let mut host = HostVehicle::new(EntityHandle(1), true, 0.0);
        host.apply(ActuatorCommand::StopMotor);
        host.apply(ActuatorCommand::BlockMotorStart { until: Some(5_000) });
        assert!(!host.motor_running);
        assert!(host.motor_blocked(4_999));
        assert!(!host.motor_blocked(5_000));
        host.apply(ActuatorCommand::BlockMotorStart { until: None });
        assert!(host.motor_blocked(u64::MAX));
        host.apply(ActuatorCommand::ReleaseMotorStart);
        assert!(!host.motor_blocked(0));
    }

    #[test]
    fn host_tracks_implement_commands() {
        let mut host = HostVehicle::new(EntityHandle(1), false, 0.0);
        host.operate(DriveProfile::Fieldwork);
        assert!(host.implements.iter().all(|i| i.lowered && i.powered));
        host.apply(ActuatorCommand::AllImplementsOff);
        assert!(host.implements.iter().all(|i| !i.powered));
        let slot = host.implements[1].slot;
        host.apply(ActuatorCommand::DetachImplement { slot });
        assert!(!host.implements[1].attached);
        host.reattach();
        assert!(host.implements[1].attached);
    }

    #[test]
    fn pre_owned_hours_carry_into_the_host() {
        let plan = SimulationPlan::new(
            VehicleSetup::PreOwned(PreOwnedProfile {
                tier: SellerTier::Rough,
                operating_hours: 4_000.0,
            }),
            DriveProfile::Idle,
        )
        .with_ticks(10);
        let summary = runner().run_plan(&plan, 5);
        assert_eq!(summary.reports.len(), 1);
        assert!(summary.reports[0].repair_count > 0);
    }

    #[test]
    fn invariant_check_flags_broken_states() {
        let mut state = VehicleReliabilityState::with_trait(0.5);
        assert!(check_invariants(&state).is_empty());
        state.subsystems.engine.durability_ceiling = 0.5;
        state.subsystems.engine.reliability = 0.9;
        state.tire.condition = 1.5;
        let problems = check_invariants(&state);
        assert_eq!(problems.len(), 2, "{problems:?}");
    }
}

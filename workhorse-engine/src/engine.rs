//! Fleet arena and the per-vehicle update cadences.
//!
//! [`ReliabilityEngine`] owns the configuration, the single RNG stream, the
//! provider, the malfunction registry and every managed vehicle's state keyed
//! by [`EntityHandle`]. Hosts drive it with [`ReliabilityEngine::tick`] about
//! once a second and [`ReliabilityEngine::frame`] every rendered frame.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;

use crate::config::ReliabilityConfig;
use crate::constants::{MAX_TICK_MS, NOMINAL_TICK_MS};
use crate::dna::{self, PreOwnedProfile};
use crate::effects::{self, ActiveEffects, CommandQueue};
use crate::event::{EndReason, EventPhase, MalfunctionEvent};
use crate::fluids::{self, LeakTarget};
use crate::inputs::VehicleInputs;
use crate::inspection::InspectionReport;
use crate::malfunctions::{self, MalfunctionContext, Registry};
use crate::numbers::{ms_to_hours, ms_to_secs};
use crate::provider::{NativeProvider, ReliabilityProvider};
use crate::reliability::{self, RepairScope};
use crate::rng::SimRng;
use crate::seizure;
use crate::snapshot::{FleetSnapshot, SNAPSHOT_VERSION, SnapshotError, VehicleRecord};
use crate::speed;
use crate::state::{
    EntityHandle, FluidKind, MalfunctionKind, SubsystemKind, TireTier, Timestamp,
    VehicleReliabilityState,
};
use crate::tires;
use crate::warning::WarningGate;

/// Workshop jobs short of a full repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ServiceAction {
    RefillOil,
    RefillHydraulic,
    FixLeak { target: LeakTarget },
    RepairFlat,
    ReplaceTires { tier: TireTier },
}

/// Everything the host should apply after a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub events: Vec<MalfunctionEvent>,
    pub commands: CommandQueue,
    pub effects: ActiveEffects,
    pub speed_multiplier: f32,
    pub traction_multiplier: f32,
    pub fuel_usage_multiplier: f32,
    /// Kind that started this tick, if any.
    pub fired: Option<MalfunctionKind>,
}

impl Default for TickOutcome {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            commands: CommandQueue::new(),
            effects: ActiveEffects::default(),
            speed_multiplier: 1.0,
            traction_multiplier: 1.0,
            fuel_usage_multiplier: 1.0,
            fired: None,
        }
    }
}

impl TickOutcome {
    #[must_use]
    pub fn started(&self) -> impl Iterator<Item = &MalfunctionEvent> + '_ {
        self.events.iter().filter(|e| e.phase == EventPhase::Started)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameOutcome {
    pub events: Vec<MalfunctionEvent>,
    pub commands: CommandQueue,
    pub effects: ActiveEffects,
}

/// Events and commands produced outside a cadence (repair, service, runaway
/// check); handed out with the next tick or frame.
#[derive(Debug, Default)]
struct Outbox {
    events: Vec<MalfunctionEvent>,
    commands: CommandQueue,
}

pub struct ReliabilityEngine<P: ReliabilityProvider = NativeProvider> {
    cfg: ReliabilityConfig,
    seed: u64,
    rng: SimRng,
    provider: P,
    registry: Registry,
    fleet: HashMap<EntityHandle, VehicleReliabilityState>,
    frame_clock: HashMap<EntityHandle, Timestamp>,
    outbox: HashMap<EntityHandle, Outbox>,
    gate: WarningGate,
}

impl<P: ReliabilityProvider> std::fmt::Debug for ReliabilityEngine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReliabilityEngine")
            .field("seed", &self.seed)
            .field("vehicles", &self.fleet.len())
            .field("rng_draws", &self.rng.draws())
            .finish_non_exhaustive()
    }
}

impl ReliabilityEngine<NativeProvider> {
    #[must_use]
    pub fn new(cfg: ReliabilityConfig, seed: u64) -> Self {
        Self::with_provider(cfg, seed, NativeProvider)
    }
}

impl<P: ReliabilityProvider> ReliabilityEngine<P> {
    #[must_use]
    pub fn with_provider(mut cfg: ReliabilityConfig, seed: u64, provider: P) -> Self {
        cfg.sanitize();
        let gate = WarningGate::new(cfg.warnings.startup_grace_ms);
        Self {
            cfg,
            seed,
            rng: SimRng::from_user_seed(seed),
            provider,
            registry: Registry::standard(),
            fleet: HashMap::new(),
            frame_clock: HashMap::new(),
            outbox: HashMap::new(),
            gate,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ReliabilityConfig {
        &self.cfg
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub const fn rng_draws(&self) -> u64 {
        self.rng.draws()
    }

    #[must_use]
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fleet.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fleet.is_empty()
    }

    /// Handles in ascending order.
    #[must_use]
    pub fn handles(&self) -> Vec<EntityHandle> {
        let mut handles: Vec<EntityHandle> = self.fleet.keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    #[must_use]
    pub fn state(&self, handle: EntityHandle) -> Option<&VehicleReliabilityState> {
        self.fleet.get(&handle)
    }

    /// Factory-fresh vehicle with a newly drawn quality trait.
    pub fn register_new(&mut self, handle: EntityHandle) -> &VehicleReliabilityState {
        let state = dna::fresh_state(&mut self.rng, &self.cfg.dna);
        log::debug!("{handle:?} registered fresh");
        self.store(handle, state)
    }

    /// Vehicle bought second-hand; its history is estimated from the profile.
    pub fn register_pre_owned(
        &mut self,
        handle: EntityHandle,
        profile: &PreOwnedProfile,
    ) -> &VehicleReliabilityState {
        let state =
            dna::pre_owned_state(&mut self.rng, &self.cfg.dna, &self.cfg.degradation, profile);
        self.store(handle, state)
    }

    /// Adopt an externally built or imported state; it is sanitized first.
    pub fn insert_state(
        &mut self,
        handle: EntityHandle,
        mut state: VehicleReliabilityState,
    ) -> &VehicleReliabilityState {
        state.enforce_invariants();
        self.store(handle, state)
    }

    fn store(
        &mut self,
        handle: EntityHandle,
        state: VehicleReliabilityState,
    ) -> &VehicleReliabilityState {
        self.frame_clock.remove(&handle);
        self.outbox.remove(&handle);
        if self.fleet.insert(handle, state).is_some() {
            log::warn!("{handle:?} re-registered; previous state replaced");
        }
        &self.fleet[&handle]
    }

    pub fn remove(&mut self, handle: EntityHandle) -> Option<VehicleReliabilityState> {
        self.frame_clock.remove(&handle);
        self.outbox.remove(&handle);
        self.fleet.remove(&handle)
    }

    /// One simulation step (about a second): wear, fluids, tires, heat,
    /// malfunction timers and trigger rolls, then the host-facing multipliers.
    pub fn tick(
        &mut self,
        handle: EntityHandle,
        inputs: &VehicleInputs,
        now: Timestamp,
    ) -> TickOutcome {
        self.gate.observe(now);
        let Some(state) = self.fleet.get_mut(&handle) else {
            log::warn!("tick for unknown vehicle {handle:?}");
            return TickOutcome::default();
        };
        let inputs = inputs.sanitized();
        let cfg = &self.cfg;
        let running = inputs.motor_running;

        let elapsed = state
            .last_tick_at
            .map_or(NOMINAL_TICK_MS, |last| now.saturating_sub(last))
            .min(MAX_TICK_MS);
        state.last_tick_at = Some(now);
        let secs = ms_to_secs(elapsed);
        let hours = ms_to_hours(elapsed);

        if running {
            reliability::apply_usage_wear(state, &cfg.degradation, hours);
        }
        fluids::deplete(state, &cfg.fluids, running, hours, inputs.hydraulic_actions);
        fluids::track_critical(state, &cfg.fluids, running, secs);
        tires::apply_wear(state, &cfg.tires, inputs.distance_km);
        if running {
            let engine = self.provider.reliability(state, SubsystemKind::Engine);
            malfunctions::update_heat(state, cfg, inputs.motor_load, engine, secs);
        } else if !self.frame_clock.contains_key(&handle) {
            malfunctions::cool_idle(state, cfg, secs);
        }

        let Outbox {
            mut events,
            mut commands,
        } = self.outbox.remove(&handle).unwrap_or_default();
        let ctx = MalfunctionContext {
            cfg,
            provider: &self.provider,
            inputs: &inputs,
            entity: handle,
            now,
        };
        self.registry
            .advance(state, &ctx, &mut self.rng, &mut events, &mut commands);
        seizure::hold_commands(state, &inputs, &mut commands);
        malfunctions::enforce_heat_limit(state, cfg, running, &mut commands);
        let fired = self
            .registry
            .roll(state, &ctx, &mut self.rng, &mut events, &mut commands);
        state.enforce_invariants();

        let active = effects::aggregate(state, cfg, now);
        let engine = self.provider.reliability(state, SubsystemKind::Engine);
        let speed_multiplier = speed::speed_multiplier(&cfg.speed, engine, inputs.damage, &active);
        let traction_multiplier = self.provider.traction(state, &cfg.tires, inputs.weather);
        let fuel_usage_multiplier = fluids::fuel_usage_multiplier(state);
        surface(&self.gate, state, handle, now, inputs.has_focus, &mut events);

        TickOutcome {
            events,
            commands,
            effects: active,
            speed_multiplier,
            traction_multiplier,
            fuel_usage_multiplier,
            fired,
        }
    }

    /// Per-frame bookkeeping: timers, stuck-implement enforcement and idle
    /// cooling. Never rolls for new malfunctions.
    pub fn frame(
        &mut self,
        handle: EntityHandle,
        inputs: &VehicleInputs,
        now: Timestamp,
    ) -> FrameOutcome {
        self.gate.observe(now);
        let Some(state) = self.fleet.get_mut(&handle) else {
            log::warn!("frame for unknown vehicle {handle:?}");
            return FrameOutcome::default();
        };
        let inputs = inputs.sanitized();
        let cfg = &self.cfg;

        let last = self.frame_clock.insert(handle, now);
        let elapsed = last.map_or(0, |l| now.saturating_sub(l)).min(MAX_TICK_MS);
        if !inputs.motor_running {
            malfunctions::cool_idle(state, cfg, ms_to_secs(elapsed));
        }

        let Outbox {
            mut events,
            mut commands,
        } = self.outbox.remove(&handle).unwrap_or_default();
        let ctx = MalfunctionContext {
            cfg,
            provider: &self.provider,
            inputs: &inputs,
            entity: handle,
            now,
        };
        self.registry
            .advance(state, &ctx, &mut self.rng, &mut events, &mut commands);
        seizure::hold_commands(state, &inputs, &mut commands);
        malfunctions::enforce_heat_limit(state, cfg, inputs.motor_running, &mut commands);
        state.enforce_invariants();
        let active = effects::aggregate(state, cfg, now);
        surface(&self.gate, state, handle, now, inputs.has_focus, &mut events);
        FrameOutcome {
            events,
            commands,
            effects: active,
        }
    }

    /// Explicit runaway roll, outside the regular tick order. Returns whether
    /// the vehicle is in runaway afterwards.
    pub fn check_runaway_condition(
        &mut self,
        handle: EntityHandle,
        inputs: &VehicleInputs,
        now: Timestamp,
    ) -> bool {
        let Some(state) = self.fleet.get_mut(&handle) else {
            log::warn!("runaway check for unknown vehicle {handle:?}");
            return false;
        };
        let inputs = inputs.sanitized();
        let ctx = MalfunctionContext {
            cfg: &self.cfg,
            provider: &self.provider,
            inputs: &inputs,
            entity: handle,
            now,
        };
        let outbox = self.outbox.entry(handle).or_default();
        self.registry.roll_kind(
            MalfunctionKind::Runaway,
            state,
            &ctx,
            &mut self.rng,
            &mut outbox.events,
            &mut outbox.commands,
        );
        state.is_active(MalfunctionKind::Runaway)
    }

    /// Workshop repair. Ends covered temporary malfunctions and clears seizures.
    pub fn repair(&mut self, handle: EntityHandle, scope: RepairScope, now: Timestamp) -> bool {
        let Some(state) = self.fleet.get_mut(&handle) else {
            log::warn!("repair for unknown vehicle {handle:?}");
            return false;
        };
        let inputs = VehicleInputs::default();
        let ctx = MalfunctionContext {
            cfg: &self.cfg,
            provider: &self.provider,
            inputs: &inputs,
            entity: handle,
            now,
        };
        let outbox = self.outbox.entry(handle).or_default();
        let serviced: SmallVec<[MalfunctionKind; 8]> = state
            .active_kinds()
            .filter(|k| k.is_temporary() && k.subsystem().is_some_and(|s| scope.covers(s)))
            .collect();
        for kind in serviced {
            self.registry.end(
                kind,
                state,
                &ctx,
                EndReason::Serviced,
                &mut outbox.events,
                &mut outbox.commands,
            );
        }
        let unseized: SmallVec<[SubsystemKind; 3]> = SubsystemKind::ALL
            .into_iter()
            .filter(|&kind| scope.covers(kind) && state.subsystem(kind).seized)
            .collect();
        reliability::repair_bonus(state, &self.cfg.degradation, scope);
        for kind in unseized {
            seizure::release_commands(kind, &mut outbox.commands);
        }
        log::info!(
            "{handle:?} repaired ({scope:?}); ceiling now {:.3}",
            state.reliability_ceiling
        );
        true
    }

    /// Apply a service job. Returns `false` when there was nothing to do.
    pub fn service(&mut self, handle: EntityHandle, action: ServiceAction, now: Timestamp) -> bool {
        let Some(state) = self.fleet.get_mut(&handle) else {
            log::warn!("service for unknown vehicle {handle:?}");
            return false;
        };
        let (applied, resolves) = match action {
            ServiceAction::RefillOil => {
                fluids::refill(state, FluidKind::Oil);
                (true, None)
            }
            ServiceAction::RefillHydraulic => {
                fluids::refill(state, FluidKind::Hydraulic);
                (true, None)
            }
            ServiceAction::FixLeak { target } => {
                let kind = match target {
                    LeakTarget::Oil => MalfunctionKind::OilLeak,
                    LeakTarget::Hydraulic => MalfunctionKind::HydraulicLeak,
                    LeakTarget::Fuel => MalfunctionKind::FuelLeak,
                };
                (fluids::fix_leak(state, target), Some(kind))
            }
            ServiceAction::RepairFlat => {
                (tires::repair_flat(state), Some(MalfunctionKind::FlatTire))
            }
            ServiceAction::ReplaceTires { tier } => {
                tires::replace(state, tier);
                (true, Some(MalfunctionKind::FlatTire))
            }
        };
        if let Some(kind) = resolves {
            let inputs = VehicleInputs::default();
            let ctx = MalfunctionContext {
                cfg: &self.cfg,
                provider: &self.provider,
                inputs: &inputs,
                entity: handle,
                now,
            };
            let outbox = self.outbox.entry(handle).or_default();
            self.registry.end(
                kind,
                state,
                &ctx,
                EndReason::Serviced,
                &mut outbox.events,
                &mut outbox.commands,
            );
        }
        state.enforce_invariants();
        if applied {
            log::info!("{handle:?} serviced: {action:?}");
        }
        applied
    }

    #[must_use]
    pub fn inspect(&self, handle: EntityHandle) -> Option<InspectionReport> {
        self.fleet.get(&handle).map(InspectionReport::of)
    }

    /// Capture the fleet and RNG position.
    #[must_use]
    pub fn snapshot(&self) -> FleetSnapshot {
        let vehicles = self
            .handles()
            .into_iter()
            .filter_map(|handle| {
                self.fleet.get(&handle).map(|state| VehicleRecord {
                    handle,
                    state: state.clone(),
                })
            })
            .collect();
        FleetSnapshot {
            version: SNAPSHOT_VERSION,
            seed: self.seed,
            rng_word_pos: self.rng.word_pos(),
            rng_draws: self.rng.draws(),
            session_start: self.gate.session_start(),
            vehicles,
        }
    }

    /// Replace the fleet and RNG position with a snapshot's. Every state is
    /// sanitized on the way in.
    ///
    /// # Errors
    ///
    /// Returns an error for an unsupported version or duplicate handles.
    pub fn restore(&mut self, snapshot: FleetSnapshot) -> Result<(), SnapshotError> {
        snapshot.check()?;
        self.seed = snapshot.seed;
        self.rng = SimRng::resume(snapshot.seed, snapshot.rng_word_pos, snapshot.rng_draws);
        self.gate = WarningGate::new(self.cfg.warnings.startup_grace_ms);
        if let Some(start) = snapshot.session_start {
            self.gate.observe(start);
        }
        self.fleet.clear();
        self.frame_clock.clear();
        self.outbox.clear();
        for VehicleRecord { handle, mut state } in snapshot.vehicles {
            state.enforce_invariants();
            self.fleet.insert(handle, state);
        }
        log::info!("restored {} vehicles", self.fleet.len());
        Ok(())
    }
}

/// Mark events the gate lets through and emit reminders for active
/// malfunctions whose start the player has not seen yet.
fn surface(
    gate: &WarningGate,
    state: &mut VehicleReliabilityState,
    handle: EntityHandle,
    now: Timestamp,
    has_focus: bool,
    events: &mut Vec<MalfunctionEvent>,
) {
    let open = gate.is_open(now, has_focus);
    for event in events.iter_mut() {
        event.surfaced = open;
        if open
            && event.phase == EventPhase::Started
            && let Some(instance) = state.malfunctions.get_mut(&event.kind)
        {
            instance.has_shown_warning = true;
        }
    }
    if !open {
        return;
    }
    for (kind, instance) in &mut state.malfunctions {
        if instance.active && !instance.has_shown_warning {
            instance.has_shown_warning = true;
            let mut reminder = MalfunctionEvent::reminder(handle, *kind, instance.started_at);
            reminder.surfaced = true;
            events.push(reminder);
        }
    }
}

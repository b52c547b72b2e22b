//! Malfunction state machines behind one behaviour trait.
//!
//! Every kind is an `Idle -> Active -> Idle` automaton. The [`Registry`] owns
//! one behaviour per kind, advances active ones, and on each tick offers the
//! idle ones a trigger roll until one fires or the global cooldown blocks.

mod electrical;
mod engine;
mod hydraulic;
mod wear;

pub use engine::{cool_idle, enforce_heat_limit, update_heat};

use smallvec::SmallVec;

use crate::config::{MalfunctionTuning, ReliabilityConfig};
use crate::effects::CommandQueue;
use crate::event::{EndReason, MalfunctionEvent};
use crate::fluids;
use crate::inputs::VehicleInputs;
use crate::numbers::clamp_unit;
use crate::provider::ReliabilityProvider;
use crate::reliability;
use crate::rng::SimRng;
use crate::seizure;
use crate::state::{
    EntityHandle, MalfunctionInstance, MalfunctionKind, SubsystemKind, Timestamp,
    VehicleReliabilityState,
};

/// Everything a behaviour may read while deciding or applying its effect.
pub struct MalfunctionContext<'a> {
    pub cfg: &'a ReliabilityConfig,
    pub provider: &'a dyn ReliabilityProvider,
    pub inputs: &'a VehicleInputs,
    pub entity: EntityHandle,
    pub now: Timestamp,
}

impl MalfunctionContext<'_> {
    #[must_use]
    pub fn tuning(&self, kind: MalfunctionKind) -> MalfunctionTuning {
        self.cfg.malfunctions.tuning(kind)
    }

    #[must_use]
    pub fn reliability(&self, state: &VehicleReliabilityState, kind: SubsystemKind) -> f32 {
        clamp_unit(self.provider.reliability(state, kind))
    }

    /// How far the kind's subsystem sits below the kind's threshold, in `[0, 1]`.
    #[must_use]
    pub fn depth(&self, state: &VehicleReliabilityState, kind: MalfunctionKind) -> f32 {
        kind.subsystem().map_or(0.0, |subsystem| {
            depth_below(
                self.reliability(state, subsystem),
                self.tuning(kind).threshold,
            )
        })
    }

    /// Draw a duration from the kind's configured range.
    pub fn duration(&self, kind: MalfunctionKind, rng: &mut SimRng) -> u64 {
        let tuning = self.tuning(kind);
        rng.duration_ms(tuning.duration_min_ms, tuning.duration_max_ms)
    }
}

/// `(threshold - value) / threshold` when below, otherwise zero. Zero thresholds never trigger.
#[must_use]
pub fn depth_below(value: f32, threshold: f32) -> f32 {
    if threshold <= 0.0 || value >= threshold {
        return 0.0;
    }
    clamp_unit((threshold - value) / threshold)
}

/// Reliability-gated chance shared by most kinds: base x depth x fluid multiplier.
#[must_use]
pub fn standard_chance(
    kind: MalfunctionKind,
    state: &VehicleReliabilityState,
    ctx: &MalfunctionContext<'_>,
) -> f32 {
    let Some(subsystem) = kind.subsystem() else {
        return 0.0;
    };
    let depth = ctx.depth(state, kind);
    if depth <= 0.0 {
        return 0.0;
    }
    let fluid = fluids::subsystem_chance_multiplier(state, &ctx.cfg.fluids, subsystem);
    clamp_unit(ctx.tuning(kind).base_chance * depth * fluid)
}

/// Expiry check shared by every timed kind.
#[must_use]
pub fn expired(state: &VehicleReliabilityState, kind: MalfunctionKind, now: Timestamp) -> bool {
    state.instance(kind).is_some_and(|m| m.is_expired(now))
}

pub trait MalfunctionBehavior {
    fn kind(&self) -> MalfunctionKind;

    /// Host conditions allow this kind at all (motor running, implement attached...).
    fn is_eligible(&self, state: &VehicleReliabilityState, ctx: &MalfunctionContext<'_>) -> bool;

    fn trigger_chance(&self, state: &VehicleReliabilityState, ctx: &MalfunctionContext<'_>) -> f32 {
        standard_chance(self.kind(), state, ctx)
    }

    /// A forced chance only replaces the probability; a kind whose natural
    /// chance is zero (above its threshold) still never fires.
    fn roll_trigger(
        &self,
        state: &VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        rng: &mut SimRng,
    ) -> bool {
        let natural = self.trigger_chance(state, ctx);
        if natural.is_nan() || natural <= 0.0 {
            return false;
        }
        rng.roll(ctx.cfg.malfunctions.force_chance.unwrap_or(natural))
    }

    /// Called with a fresh active instance already in place.
    fn on_start(
        &self,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        rng: &mut SimRng,
        out: &mut CommandQueue,
    );

    /// Enforce the effect; return a reason to end the malfunction.
    fn on_tick(
        &self,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        _rng: &mut SimRng,
        _out: &mut CommandQueue,
    ) -> Option<EndReason> {
        expired(state, self.kind(), ctx.now).then_some(EndReason::Expired)
    }

    fn on_end(
        &self,
        _state: &mut VehicleReliabilityState,
        _ctx: &MalfunctionContext<'_>,
        _reason: EndReason,
        _out: &mut CommandQueue,
    ) {
    }
}

/// Homogeneous collection of behaviours, one per kind, in roll order.
pub struct Registry {
    behaviors: Vec<Box<dyn MalfunctionBehavior>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.behaviors.iter().map(|b| b.kind()))
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}

impl Registry {
    /// Every built-in kind. Runaway rolls first so a qualifying vehicle is never
    /// pre-empted by a milder fault inside the same cooldown window.
    #[must_use]
    pub fn standard() -> Self {
        let behaviors: Vec<Box<dyn MalfunctionBehavior>> = vec![
            Box::new(engine::Runaway),
            Box::new(engine::EngineStall),
            Box::new(engine::Misfire),
            Box::new(engine::Overheat),
            Box::new(hydraulic::HydraulicSurge),
            Box::new(hydraulic::ImplementStuck::UP),
            Box::new(hydraulic::ImplementStuck::DOWN),
            Box::new(hydraulic::ImplementPull),
            Box::new(hydraulic::ImplementDrag),
            Box::new(hydraulic::ReducedTurning),
            Box::new(hydraulic::HitchFailure),
            Box::new(electrical::PtoToggle),
            Box::new(electrical::ElectricalCutout),
            Box::new(wear::FlatTire),
            Box::new(wear::Leak::OIL),
            Box::new(wear::Leak::HYDRAULIC),
            Box::new(wear::Leak::FUEL),
        ];
        Self { behaviors }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    fn behavior(&self, kind: MalfunctionKind) -> Option<&dyn MalfunctionBehavior> {
        self.behaviors
            .iter()
            .find(|b| b.kind() == kind)
            .map(|b| &**b)
    }

    /// Whether `kind` could start right now, ignoring the dice.
    #[must_use]
    pub fn can_start(
        &self,
        kind: MalfunctionKind,
        state: &VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
    ) -> bool {
        let Some(behavior) = self.behavior(kind) else {
            return false;
        };
        self.startable(behavior, state, ctx)
    }

    fn startable(
        &self,
        behavior: &dyn MalfunctionBehavior,
        state: &VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
    ) -> bool {
        let kind = behavior.kind();
        if !ctx.tuning(kind).enabled || state.is_active(kind) {
            return false;
        }
        if kind.is_temporary()
            && kind
                .subsystem()
                .is_some_and(|subsystem| state.subsystem(subsystem).seized)
        {
            return false;
        }
        state.cooldown_clear(ctx.now, ctx.cfg.malfunctions.global_cooldown_ms)
            && behavior.is_eligible(state, ctx)
    }

    /// Run `on_tick` for every active kind and end those that ask to.
    pub fn advance(
        &self,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        rng: &mut SimRng,
        events: &mut Vec<MalfunctionEvent>,
        out: &mut CommandQueue,
    ) {
        let active: SmallVec<[MalfunctionKind; 8]> = state.active_kinds().collect();
        for kind in active {
            let Some(behavior) = self.behavior(kind) else {
                continue;
            };
            if !state.is_active(kind) {
                continue;
            }
            if let Some(reason) = behavior.on_tick(state, ctx, rng, out) {
                Self::finish(behavior, state, ctx, reason, events, out);
            }
        }
    }

    /// Offer each idle kind a trigger roll; at most one fires.
    pub fn roll(
        &self,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        rng: &mut SimRng,
        events: &mut Vec<MalfunctionEvent>,
        out: &mut CommandQueue,
    ) -> Option<MalfunctionKind> {
        if !state.cooldown_clear(ctx.now, ctx.cfg.malfunctions.global_cooldown_ms) {
            return None;
        }
        for behavior in &self.behaviors {
            if !self.startable(behavior.as_ref(), state, ctx) {
                continue;
            }
            if behavior.roll_trigger(state, ctx, rng) {
                self.fire(behavior.as_ref(), state, ctx, rng, events, out);
                return Some(behavior.kind());
            }
        }
        None
    }

    /// Roll a single kind; used for the explicit runaway check.
    pub fn roll_kind(
        &self,
        kind: MalfunctionKind,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        rng: &mut SimRng,
        events: &mut Vec<MalfunctionEvent>,
        out: &mut CommandQueue,
    ) -> bool {
        let Some(behavior) = self.behavior(kind) else {
            return false;
        };
        if !self.startable(behavior, state, ctx) || !behavior.roll_trigger(state, ctx, rng) {
            return false;
        }
        self.fire(behavior, state, ctx, rng, events, out);
        true
    }

    /// End an active kind from outside (repair, service).
    pub fn end(
        &self,
        kind: MalfunctionKind,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        reason: EndReason,
        events: &mut Vec<MalfunctionEvent>,
        out: &mut CommandQueue,
    ) -> bool {
        if !state.is_active(kind) {
            return false;
        }
        let Some(behavior) = self.behavior(kind) else {
            return false;
        };
        Self::finish(behavior, state, ctx, reason, events, out);
        true
    }

    fn fire(
        &self,
        behavior: &dyn MalfunctionBehavior,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        rng: &mut SimRng,
        events: &mut Vec<MalfunctionEvent>,
        out: &mut CommandQueue,
    ) {
        let kind = behavior.kind();
        let subsystem = kind.subsystem();
        state.last_malfunction_time = Some(ctx.now);

        let escalated = match subsystem {
            Some(target) if kind.is_temporary() => {
                let reliability = ctx.reliability(state, target);
                seizure::roll_for_seizure(state, &ctx.cfg.seizure, rng, target, reliability)
            }
            _ => false,
        };

        if let (true, Some(target)) = (escalated, subsystem) {
            seizure::halt_commands(target, ctx.inputs.ai_job_active, out);
            events.push(MalfunctionEvent::seized(ctx.entity, kind, target, ctx.now));
            let superseded: SmallVec<[MalfunctionKind; 8]> = state
                .active_kinds()
                .filter(|k| k.is_temporary() && k.subsystem() == Some(target))
                .collect();
            for victim in superseded {
                self.end(victim, state, ctx, EndReason::Seized, events, out);
            }
        } else {
            *state.instance_mut(kind) = MalfunctionInstance {
                active: true,
                started_at: ctx.now,
                ..MalfunctionInstance::default()
            };
            behavior.on_start(state, ctx, rng, out);
            events.push(MalfunctionEvent::started(ctx.entity, kind, ctx.now));
            log::debug!("{:?} {} started at {}", ctx.entity, kind.key(), ctx.now);
            if expired(state, kind, ctx.now) {
                Self::finish(behavior, state, ctx, EndReason::Expired, events, out);
            }
        }

        if let Some(target) = subsystem
            && fluids::apply_ran_dry_cut(state, &ctx.cfg.fluids, &ctx.cfg.degradation, target)
        {
            log::info!("{} fired while dry; durability ceiling cut", kind.key());
        }
        reliability::breakdown_degradation(state, &ctx.cfg.degradation, subsystem);
    }

    fn finish(
        behavior: &dyn MalfunctionBehavior,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        reason: EndReason,
        events: &mut Vec<MalfunctionEvent>,
        out: &mut CommandQueue,
    ) {
        let kind = behavior.kind();
        let started_at = state.instance(kind).map_or(ctx.now, |m| m.started_at);
        behavior.on_end(state, ctx, reason, out);
        state.malfunctions.remove(&kind);
        events.push(MalfunctionEvent::ended(
            ctx.entity, kind, started_at, ctx.now, reason,
        ));
        log::debug!("{:?} {} ended: {:?}", ctx.entity, kind.key(), reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventPhase;
    use crate::inputs::ImplementInput;
    use crate::provider::NativeProvider;

    fn ctx<'a>(
        cfg: &'a ReliabilityConfig,
        inputs: &'a VehicleInputs,
        now: Timestamp,
    ) -> MalfunctionContext<'a> {
        MalfunctionContext {
            cfg,
            provider: &NativeProvider,
            inputs,
            entity: EntityHandle(1),
            now,
        }
    }

    fn forced() -> ReliabilityConfig {
        let mut cfg = ReliabilityConfig::default();
        cfg.malfunctions.force_chance = Some(1.0);
        cfg
    }

    #[test]
    fn registry_covers_every_kind_once() {
        let registry = Registry::standard();
        assert_eq!(registry.len(), MalfunctionKind::ALL.len());
        for kind in MalfunctionKind::ALL {
            assert!(registry.behavior(kind).is_some(), "{kind:?}");
        }
    }

    #[test]
    fn depth_guards_zero_threshold() {
        assert!(depth_below(0.0, 0.0).abs() < f32::EPSILON);
        assert!(depth_below(0.6, 0.5).abs() < f32::EPSILON);
        assert!((depth_below(0.25, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn healthy_vehicle_never_rolls_without_force() {
        let cfg = ReliabilityConfig::default();
        let inputs = VehicleInputs {
            motor_running: true,
            speed_kph: 20.0,
            ..VehicleInputs::default()
        };
        let registry = Registry::standard();
        let mut state = VehicleReliabilityState::with_trait(0.7);
        let mut rng = SimRng::from_user_seed(4);
        let mut events = Vec::new();
        let mut out = CommandQueue::new();
        for second in 0..200 {
            let c = ctx(&cfg, &inputs, second * 1_000);
            assert_eq!(
                registry.roll(&mut state, &c, &mut rng, &mut events, &mut out),
                None
            );
        }
        assert!(events.is_empty());
    }

    #[test]
    fn forcing_keeps_the_reliability_threshold() {
        let cfg = forced();
        let inputs = VehicleInputs {
            motor_running: true,
            motor_load: 0.5,
            implements: smallvec::smallvec![ImplementInput::new(1).lowered(true).powered(true)],
            ..VehicleInputs::default()
        };
        let registry = Registry::standard();
        let mut state = VehicleReliabilityState::with_trait(0.95);
        let mut rng = SimRng::from_user_seed(12);
        let mut events = Vec::new();
        let mut out = CommandQueue::new();
        for second in 0..300 {
            let c = ctx(&cfg, &inputs, second * 1_000);
            assert_eq!(
                registry.roll(&mut state, &c, &mut rng, &mut events, &mut out),
                None
            );
        }
        assert!(events.is_empty());
        assert_eq!(state.counters.breakdown_count, 0);
    }

    #[test]
    fn forced_roll_fires_once_then_cooldown_blocks() {
        let cfg = forced();
        let inputs = VehicleInputs {
            motor_running: true,
            ..VehicleInputs::default()
        };
        let registry = Registry::standard();
        let mut state = VehicleReliabilityState::with_trait(0.95);
        state.subsystems.engine.reliability = 0.3;
        let mut rng = SimRng::from_user_seed(8);
        let mut events = Vec::new();
        let mut out = CommandQueue::new();

        let first = registry.roll(&mut state, &ctx(&cfg, &inputs, 0), &mut rng, &mut events, &mut out);
        assert_eq!(first, Some(MalfunctionKind::EngineStall));
        assert_eq!(state.counters.breakdown_count, 1);
        assert_eq!(state.last_malfunction_time, Some(0));

        let blocked =
            registry.roll(&mut state, &ctx(&cfg, &inputs, 1_000), &mut rng, &mut events, &mut out);
        assert_eq!(blocked, None);
        assert_eq!(
            events
                .iter()
                .filter(|e| e.phase == EventPhase::Started)
                .count(),
            1
        );
    }

    #[test]
    fn instant_kinds_end_in_the_same_pass() {
        let mut cfg = forced();
        for kind in MalfunctionKind::ALL {
            if kind != MalfunctionKind::HitchFailure {
                let mut tuning = cfg.malfunctions.tuning(kind);
                tuning.enabled = false;
                cfg.malfunctions.set_tuning(kind, tuning);
            }
        }
        let inputs = VehicleInputs {
            implements: smallvec::smallvec![ImplementInput::new(3)],
            ..VehicleInputs::default()
        };
        let registry = Registry::standard();
        let mut state = VehicleReliabilityState::with_trait(0.95);
        state.subsystems.hydraulic.reliability = 0.1;
        let mut rng = SimRng::from_user_seed(2);
        let mut events = Vec::new();
        let mut out = CommandQueue::new();
        let fired = registry.roll(&mut state, &ctx(&cfg, &inputs, 500), &mut rng, &mut events, &mut out);
        assert_eq!(fired, Some(MalfunctionKind::HitchFailure));
        assert!(!state.is_active(MalfunctionKind::HitchFailure));
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].end_reason, Some(EndReason::Expired));
        assert!(out.contains(&crate::effects::ActuatorCommand::DetachImplement {
            slot: crate::state::ImplementSlot(3)
        }));
    }

    #[test]
    fn seizure_replaces_the_temporary_effect() {
        let mut cfg = forced();
        cfg.seizure.min_chance = 1.0;
        cfg.seizure.max_chance = 1.0;
        cfg.seizure.chance_cap = 1.0;
        let inputs = VehicleInputs {
            motor_running: true,
            ai_job_active: true,
            ..VehicleInputs::default()
        };
        let registry = Registry::standard();
        let mut state = VehicleReliabilityState::with_trait(0.3);
        state.subsystems.engine.reliability = 0.05;
        let mut rng = SimRng::from_user_seed(6);
        let mut events = Vec::new();
        let mut out = CommandQueue::new();
        let fired = registry.roll(&mut state, &ctx(&cfg, &inputs, 0), &mut rng, &mut events, &mut out);
        assert_eq!(fired, Some(MalfunctionKind::EngineStall));
        assert!(state.subsystems.engine.seized);
        assert!(!state.is_active(MalfunctionKind::EngineStall));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].phase, EventPhase::Seized);
        assert!(out.contains(&crate::effects::ActuatorCommand::StopMotor));
        assert!(out.contains(&crate::effects::ActuatorCommand::CancelAiJob));
        assert_eq!(state.counters.seizure_count, 1);
    }
}

//! Motor faults: stall, misfire, overheat and runaway.
use rand::Rng;

use super::{MalfunctionBehavior, MalfunctionContext, depth_below, expired, standard_chance};
use crate::config::ReliabilityConfig;
use crate::effects::{ActuatorCommand, CommandQueue};
use crate::event::EndReason;
use crate::fluids;
use crate::numbers::clamp_unit;
use crate::reliability::failure_probability;
use crate::rng::SimRng;
use crate::state::{MalfunctionKind, SubsystemKind, VehicleReliabilityState};

/// Heat balance while the motor runs: load and wear heat it, the radiator cools it.
pub fn update_heat(
    state: &mut VehicleReliabilityState,
    cfg: &ReliabilityConfig,
    load: f32,
    engine_reliability: f32,
    secs: f32,
) {
    let overheat = &cfg.malfunctions.overheat;
    let severity = fluids::subsystem_severity_multiplier(state, &cfg.fluids, SubsystemKind::Engine);
    let wear = 1.0 - clamp_unit(engine_reliability);
    let heating = overheat.heat_rate * clamp_unit(load) * (0.5 + wear) * severity;
    state.engine_heat = clamp_unit(state.engine_heat + (heating - overheat.cool_rate) * secs);
}

/// Faster cooling with the motor off.
pub fn cool_idle(state: &mut VehicleReliabilityState, cfg: &ReliabilityConfig, secs: f32) {
    let rate = cfg.malfunctions.overheat.idle_cool_rate;
    state.engine_heat = clamp_unit(state.engine_heat - rate * secs.max(0.0));
}

/// Maximum heat stops the motor whether or not an overheat malfunction was
/// rolled. The start block holds until the engine cools to the restart heat.
pub fn enforce_heat_limit(
    state: &mut VehicleReliabilityState,
    cfg: &ReliabilityConfig,
    motor_running: bool,
    out: &mut CommandQueue,
) {
    if state.heat_lockout {
        if state.engine_heat < cfg.malfunctions.overheat.restart_heat {
            state.heat_lockout = false;
            out.push(ActuatorCommand::ReleaseMotorStart);
        } else if motor_running {
            out.push(ActuatorCommand::StopMotor);
        }
        return;
    }
    let overheat_forced = state
        .instance(MalfunctionKind::Overheat)
        .is_some_and(|m| m.direction_or_severity >= 1.0);
    if state.engine_heat >= 1.0 && !overheat_forced {
        state.heat_lockout = true;
        out.push(ActuatorCommand::StopMotor);
        out.push(ActuatorCommand::BlockMotorStart { until: None });
        log::debug!("engine at maximum heat; motor held off");
    }
}

pub struct EngineStall;

impl MalfunctionBehavior for EngineStall {
    fn kind(&self) -> MalfunctionKind {
        MalfunctionKind::EngineStall
    }

    fn is_eligible(&self, _state: &VehicleReliabilityState, ctx: &MalfunctionContext<'_>) -> bool {
        ctx.inputs.motor_running
    }

    fn trigger_chance(&self, state: &VehicleReliabilityState, ctx: &MalfunctionContext<'_>) -> f32 {
        let kind = self.kind();
        if ctx.depth(state, kind) <= 0.0 {
            return 0.0;
        }
        let reliability = ctx.reliability(state, SubsystemKind::Engine);
        let fluid = fluids::subsystem_chance_multiplier(state, &ctx.cfg.fluids, SubsystemKind::Engine);
        let inputs = ctx.inputs;
        clamp_unit(
            failure_probability(
                &ctx.cfg.failure,
                reliability,
                inputs.damage,
                inputs.operating_hours,
                inputs.motor_load,
                fluid,
            ) * ctx.tuning(kind).base_chance,
        )
    }

    fn on_start(
        &self,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        _rng: &mut SimRng,
        out: &mut CommandQueue,
    ) {
        let m = &ctx.cfg.malfunctions;
        let until = ctx
            .now
            .saturating_add(m.stall_cooldown_ms)
            .saturating_add(m.stall_restart_delay_ms);
        state.instance_mut(self.kind()).end_time = Some(until);
        out.push(ActuatorCommand::StopMotor);
        out.push(ActuatorCommand::BlockMotorStart { until: Some(until) });
        if ctx.inputs.ai_job_active {
            out.push(ActuatorCommand::CancelAiJob);
        }
    }

    fn on_tick(
        &self,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        _rng: &mut SimRng,
        out: &mut CommandQueue,
    ) -> Option<EndReason> {
        if expired(state, self.kind(), ctx.now) {
            return Some(EndReason::Expired);
        }
        if ctx.inputs.motor_running {
            out.push(ActuatorCommand::StopMotor);
        }
        None
    }

    fn on_end(
        &self,
        _state: &mut VehicleReliabilityState,
        _ctx: &MalfunctionContext<'_>,
        reason: EndReason,
        out: &mut CommandQueue,
    ) {
        if reason == EndReason::Serviced {
            out.push(ActuatorCommand::ReleaseMotorStart);
        }
    }
}

pub struct Misfire;

impl MalfunctionBehavior for Misfire {
    fn kind(&self) -> MalfunctionKind {
        MalfunctionKind::Misfire
    }

    fn is_eligible(&self, _state: &VehicleReliabilityState, ctx: &MalfunctionContext<'_>) -> bool {
        ctx.inputs.motor_running
    }

    fn trigger_chance(&self, state: &VehicleReliabilityState, ctx: &MalfunctionContext<'_>) -> f32 {
        clamp_unit(standard_chance(self.kind(), state, ctx) * (0.5 + ctx.inputs.motor_load))
    }

    fn on_start(
        &self,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        rng: &mut SimRng,
        out: &mut CommandQueue,
    ) {
        let burst = rng.gen_range(1..=ctx.cfg.malfunctions.misfire_burst_max.max(1));
        let end = ctx.now.saturating_add(ctx.duration(self.kind(), rng));
        let instance = state.instance_mut(self.kind());
        instance.end_time = Some(end);
        instance.pulses_remaining = burst - 1;
        out.push(ActuatorCommand::PowerStutter);
    }

    fn on_tick(
        &self,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        rng: &mut SimRng,
        out: &mut CommandQueue,
    ) -> Option<EndReason> {
        if !ctx.inputs.motor_running {
            return Some(EndReason::EngineOff);
        }
        if !expired(state, self.kind(), ctx.now) {
            return None;
        }
        if state.instance(self.kind()).is_some_and(|m| m.pulses_remaining > 0) {
            let end = ctx.now.saturating_add(ctx.duration(self.kind(), rng));
            let instance = state.instance_mut(self.kind());
            instance.pulses_remaining -= 1;
            instance.end_time = Some(end);
            out.push(ActuatorCommand::PowerStutter);
            return None;
        }
        Some(EndReason::Expired)
    }
}

/// Heat-driven. `direction_or_severity` reaches 1.0 once the forced stall engaged.
pub struct Overheat;

impl MalfunctionBehavior for Overheat {
    fn kind(&self) -> MalfunctionKind {
        MalfunctionKind::Overheat
    }

    fn is_eligible(&self, state: &VehicleReliabilityState, ctx: &MalfunctionContext<'_>) -> bool {
        ctx.inputs.motor_running && state.engine_heat >= ctx.cfg.malfunctions.overheat.start_heat
    }

    fn trigger_chance(&self, state: &VehicleReliabilityState, ctx: &MalfunctionContext<'_>) -> f32 {
        let tuning = ctx.tuning(self.kind());
        let reliability = ctx.reliability(state, SubsystemKind::Engine);
        if depth_below(reliability, tuning.threshold) > 0.0 {
            clamp_unit(tuning.base_chance)
        } else {
            0.0
        }
    }

    fn on_start(
        &self,
        state: &mut VehicleReliabilityState,
        _ctx: &MalfunctionContext<'_>,
        _rng: &mut SimRng,
        _out: &mut CommandQueue,
    ) {
        state.instance_mut(self.kind()).direction_or_severity = state.engine_heat;
    }

    fn on_tick(
        &self,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        _rng: &mut SimRng,
        out: &mut CommandQueue,
    ) -> Option<EndReason> {
        let heat = state.engine_heat;
        if heat < ctx.cfg.malfunctions.overheat.restart_heat {
            return Some(EndReason::Cooled);
        }
        let instance = state.instance_mut(self.kind());
        let forced = instance.direction_or_severity >= 1.0;
        if heat >= 1.0 && !forced {
            instance.direction_or_severity = 1.0;
            out.push(ActuatorCommand::StopMotor);
            out.push(ActuatorCommand::BlockMotorStart { until: None });
            log::debug!("{:?} overheated; motor forced off", ctx.entity);
        } else if forced && ctx.inputs.motor_running {
            out.push(ActuatorCommand::StopMotor);
        } else if !forced {
            instance.direction_or_severity = instance.direction_or_severity.max(heat);
        }
        None
    }

    fn on_end(
        &self,
        state: &mut VehicleReliabilityState,
        _ctx: &MalfunctionContext<'_>,
        _reason: EndReason,
        out: &mut CommandQueue,
    ) {
        if state
            .instance(self.kind())
            .is_some_and(|m| m.direction_or_severity >= 1.0)
        {
            out.push(ActuatorCommand::ReleaseMotorStart);
        }
    }
}

/// Both fluids gone while moving: the governor fails open.
pub struct Runaway;

impl Runaway {
    fn fluids_critical(state: &VehicleReliabilityState, cfg: &ReliabilityConfig) -> bool {
        let level = cfg.malfunctions.runaway.fluid_level;
        state.fluids.oil.level < level && state.fluids.hydraulic.level < level
    }
}

impl MalfunctionBehavior for Runaway {
    fn kind(&self) -> MalfunctionKind {
        MalfunctionKind::Runaway
    }

    fn is_eligible(&self, state: &VehicleReliabilityState, ctx: &MalfunctionContext<'_>) -> bool {
        let runaway = &ctx.cfg.malfunctions.runaway;
        runaway.runaway_enabled
            && ctx.inputs.motor_running
            && ctx.inputs.speed_kph > runaway.min_speed_kph
            && Self::fluids_critical(state, ctx.cfg)
    }

    fn trigger_chance(&self, _state: &VehicleReliabilityState, ctx: &MalfunctionContext<'_>) -> f32 {
        clamp_unit(ctx.tuning(self.kind()).base_chance)
    }

    fn on_start(
        &self,
        _state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        _rng: &mut SimRng,
        out: &mut CommandQueue,
    ) {
        if ctx.inputs.ai_job_active {
            out.push(ActuatorCommand::CancelAiJob);
        }
        log::warn!("{:?} runaway at {:.1} kph", ctx.entity, ctx.inputs.speed_kph);
    }

    fn on_tick(
        &self,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        _rng: &mut SimRng,
        _out: &mut CommandQueue,
    ) -> Option<EndReason> {
        if !ctx.inputs.motor_running {
            Some(EndReason::EngineOff)
        } else if ctx.inputs.crash_detected {
            Some(EndReason::Crash)
        } else if !Self::fluids_critical(state, ctx.cfg) {
            Some(EndReason::FluidsRestored)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heat_builds_under_load_and_sheds_when_idle() {
        let cfg = ReliabilityConfig::default();
        let mut state = VehicleReliabilityState::default();
        for _ in 0..100 {
            update_heat(&mut state, &cfg, 1.0, 0.2, 1.0);
        }
        let hot = state.engine_heat;
        assert!(hot > 0.5);
        cool_idle(&mut state, &cfg, 10.0);
        assert!(state.engine_heat < hot);
        cool_idle(&mut state, &cfg, 1_000.0);
        assert!(state.engine_heat.abs() < f32::EPSILON);
    }

    #[test]
    fn maximum_heat_holds_the_motor_until_cooled() {
        let cfg = ReliabilityConfig::default();
        let mut state = VehicleReliabilityState::default();
        state.engine_heat = 1.0;
        let mut out = CommandQueue::new();
        enforce_heat_limit(&mut state, &cfg, true, &mut out);
        assert!(state.heat_lockout);
        assert!(out.contains(&ActuatorCommand::StopMotor));
        assert!(out.contains(&ActuatorCommand::BlockMotorStart { until: None }));

        state.engine_heat = 0.7;
        let mut held = CommandQueue::new();
        enforce_heat_limit(&mut state, &cfg, true, &mut held);
        assert_eq!(held.as_slice(), &[ActuatorCommand::StopMotor]);

        state.engine_heat = 0.5;
        let mut released = CommandQueue::new();
        enforce_heat_limit(&mut state, &cfg, false, &mut released);
        assert!(!state.heat_lockout);
        assert_eq!(released.as_slice(), &[ActuatorCommand::ReleaseMotorStart]);
    }

    #[test]
    fn light_load_on_healthy_engine_stays_cool() {
        let cfg = ReliabilityConfig::default();
        let mut state = VehicleReliabilityState::default();
        for _ in 0..600 {
            update_heat(&mut state, &cfg, 0.3, 1.0, 1.0);
        }
        assert!(state.engine_heat.abs() < f32::EPSILON);
    }
}

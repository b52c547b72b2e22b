//! Hydraulic faults: surge, stuck implements, pull, drag, reduced turning and hitch failure.
use smallvec::SmallVec;

use super::{MalfunctionBehavior, MalfunctionContext, expired};
use crate::effects::{ActuatorCommand, CommandQueue};
use crate::event::EndReason;
use crate::fluids;
use crate::inputs::ImplementInput;
use crate::numbers::clamp_unit;
use crate::rng::SimRng;
use crate::state::{ImplementSlot, MalfunctionKind, SubsystemKind, VehicleReliabilityState};

fn pick_slot(
    rng: &mut SimRng,
    ctx: &MalfunctionContext<'_>,
    filter: impl Fn(&ImplementInput) -> bool,
) -> Option<ImplementSlot> {
    let candidates: SmallVec<[ImplementSlot; 4]> = ctx
        .inputs
        .attached()
        .filter(|i| filter(i))
        .map(|i| i.slot)
        .collect();
    rng.pick(&candidates).copied()
}

/// End pinned malfunctions whose implement is gone.
fn target_detached(state: &VehicleReliabilityState, kind: MalfunctionKind, ctx: &MalfunctionContext<'_>) -> bool {
    state
        .instance(kind)
        .and_then(|m| m.target)
        .is_some_and(|slot| ctx.inputs.implement(slot).is_none_or(|i| !i.attached))
}

fn start_timed(
    state: &mut VehicleReliabilityState,
    kind: MalfunctionKind,
    ctx: &MalfunctionContext<'_>,
    rng: &mut SimRng,
) {
    let end = ctx.now.saturating_add(ctx.duration(kind, rng));
    state.instance_mut(kind).end_time = Some(end);
}

pub struct HydraulicSurge;

impl MalfunctionBehavior for HydraulicSurge {
    fn kind(&self) -> MalfunctionKind {
        MalfunctionKind::HydraulicSurge
    }

    fn is_eligible(&self, _state: &VehicleReliabilityState, ctx: &MalfunctionContext<'_>) -> bool {
        ctx.inputs.motor_running && ctx.inputs.speed_kph >= ctx.cfg.malfunctions.surge_min_speed_kph
    }

    fn on_start(
        &self,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        rng: &mut SimRng,
        _out: &mut CommandQueue,
    ) {
        start_timed(state, self.kind(), ctx, rng);
        let severity =
            fluids::subsystem_severity_multiplier(state, &ctx.cfg.fluids, SubsystemKind::Hydraulic);
        let magnitude = clamp_unit(ctx.cfg.malfunctions.surge_steering_bias * severity);
        let direction = rng.direction();
        state.instance_mut(self.kind()).direction_or_severity = direction * magnitude;
    }
}

/// Implement frozen in its current position; attempts to move it are reverted.
pub struct ImplementStuck {
    lowered: bool,
}

impl ImplementStuck {
    pub const UP: Self = Self { lowered: false };
    pub const DOWN: Self = Self { lowered: true };
}

impl MalfunctionBehavior for ImplementStuck {
    fn kind(&self) -> MalfunctionKind {
        if self.lowered {
            MalfunctionKind::ImplementStuckDown
        } else {
            MalfunctionKind::ImplementStuckUp
        }
    }

    fn is_eligible(&self, _state: &VehicleReliabilityState, ctx: &MalfunctionContext<'_>) -> bool {
        ctx.inputs.attached().any(|i| i.lowered == self.lowered)
    }

    fn on_start(
        &self,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        rng: &mut SimRng,
        _out: &mut CommandQueue,
    ) {
        start_timed(state, self.kind(), ctx, rng);
        let target = pick_slot(rng, ctx, |i| i.lowered == self.lowered);
        state.instance_mut(self.kind()).target = target;
    }

    fn on_tick(
        &self,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        _rng: &mut SimRng,
        out: &mut CommandQueue,
    ) -> Option<EndReason> {
        let kind = self.kind();
        if expired(state, kind, ctx.now) {
            return Some(EndReason::Expired);
        }
        if target_detached(state, kind, ctx) {
            return Some(EndReason::Detached);
        }
        let slot = state.instance(kind).and_then(|m| m.target)?;
        if ctx
            .inputs
            .implement(slot)
            .is_some_and(|i| i.lowered != self.lowered)
        {
            out.push(ActuatorCommand::SetImplementLowered {
                slot,
                lowered: self.lowered,
            });
        }
        None
    }
}

pub struct ImplementPull;

impl MalfunctionBehavior for ImplementPull {
    fn kind(&self) -> MalfunctionKind {
        MalfunctionKind::ImplementPull
    }

    fn is_eligible(&self, _state: &VehicleReliabilityState, ctx: &MalfunctionContext<'_>) -> bool {
        ctx.inputs.is_moving() && ctx.inputs.attached().next().is_some()
    }

    fn on_start(
        &self,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        rng: &mut SimRng,
        _out: &mut CommandQueue,
    ) {
        start_timed(state, self.kind(), ctx, rng);
        let target = pick_slot(rng, ctx, |_| true);
        let bias = rng.direction() * ctx.cfg.malfunctions.pull_steering_bias;
        let instance = state.instance_mut(self.kind());
        instance.target = target;
        instance.direction_or_severity = bias;
    }

    fn on_tick(
        &self,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        _rng: &mut SimRng,
        _out: &mut CommandQueue,
    ) -> Option<EndReason> {
        if expired(state, self.kind(), ctx.now) {
            Some(EndReason::Expired)
        } else if target_detached(state, self.kind(), ctx) {
            Some(EndReason::Detached)
        } else {
            None
        }
    }
}

pub struct ImplementDrag;

impl MalfunctionBehavior for ImplementDrag {
    fn kind(&self) -> MalfunctionKind {
        MalfunctionKind::ImplementDrag
    }

    fn is_eligible(&self, _state: &VehicleReliabilityState, ctx: &MalfunctionContext<'_>) -> bool {
        ctx.inputs.attached().any(|i| i.lowered)
    }

    fn on_start(
        &self,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        rng: &mut SimRng,
        _out: &mut CommandQueue,
    ) {
        start_timed(state, self.kind(), ctx, rng);
        let target = pick_slot(rng, ctx, |i| i.lowered);
        let instance = state.instance_mut(self.kind());
        instance.target = target;
        instance.direction_or_severity = ctx.cfg.malfunctions.drag_speed_factor;
    }

    fn on_tick(
        &self,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        _rng: &mut SimRng,
        _out: &mut CommandQueue,
    ) -> Option<EndReason> {
        if expired(state, self.kind(), ctx.now) {
            Some(EndReason::Expired)
        } else if target_detached(state, self.kind(), ctx) {
            Some(EndReason::Detached)
        } else {
            None
        }
    }
}

pub struct ReducedTurning;

impl MalfunctionBehavior for ReducedTurning {
    fn kind(&self) -> MalfunctionKind {
        MalfunctionKind::ReducedTurning
    }

    fn is_eligible(&self, _state: &VehicleReliabilityState, ctx: &MalfunctionContext<'_>) -> bool {
        ctx.inputs.motor_running
    }

    fn on_start(
        &self,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        rng: &mut SimRng,
        _out: &mut CommandQueue,
    ) {
        start_timed(state, self.kind(), ctx, rng);
        state.instance_mut(self.kind()).direction_or_severity =
            ctx.cfg.malfunctions.reduced_turning_limit;
    }
}

/// Instantaneous: the implement drops off the hitch.
pub struct HitchFailure;

impl MalfunctionBehavior for HitchFailure {
    fn kind(&self) -> MalfunctionKind {
        MalfunctionKind::HitchFailure
    }

    fn is_eligible(&self, _state: &VehicleReliabilityState, ctx: &MalfunctionContext<'_>) -> bool {
        ctx.inputs.attached().next().is_some()
    }

    fn on_start(
        &self,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        rng: &mut SimRng,
        out: &mut CommandQueue,
    ) {
        let target = pick_slot(rng, ctx, |_| true);
        let instance = state.instance_mut(self.kind());
        instance.target = target;
        instance.end_time = Some(ctx.now);
        if let Some(slot) = target {
            out.push(ActuatorCommand::DetachImplement { slot });
        }
    }
}

//! Electrical faults: PTO toggles and cutouts.
use smallvec::SmallVec;

use super::{MalfunctionBehavior, MalfunctionContext, expired};
use crate::effects::{ActuatorCommand, CommandQueue};
use crate::event::EndReason;
use crate::inputs::ImplementInput;
use crate::rng::SimRng;
use crate::state::{MalfunctionKind, VehicleReliabilityState};

/// Instantaneous: a random implement's power flips.
pub struct PtoToggle;

impl MalfunctionBehavior for PtoToggle {
    fn kind(&self) -> MalfunctionKind {
        MalfunctionKind::PtoToggle
    }

    fn is_eligible(&self, _state: &VehicleReliabilityState, ctx: &MalfunctionContext<'_>) -> bool {
        ctx.inputs.motor_running && ctx.inputs.attached().next().is_some()
    }

    fn on_start(
        &self,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        rng: &mut SimRng,
        out: &mut CommandQueue,
    ) {
        let attached: SmallVec<[ImplementInput; 4]> = ctx.inputs.attached().copied().collect();
        let picked = rng.pick(&attached).copied();
        let instance = state.instance_mut(self.kind());
        instance.end_time = Some(ctx.now);
        if let Some(implement) = picked {
            instance.target = Some(implement.slot);
            out.push(ActuatorCommand::SetImplementPower {
                slot: implement.slot,
                on: !implement.powered,
            });
        }
    }
}

pub struct ElectricalCutout;

impl MalfunctionBehavior for ElectricalCutout {
    fn kind(&self) -> MalfunctionKind {
        MalfunctionKind::ElectricalCutout
    }

    fn is_eligible(&self, _state: &VehicleReliabilityState, ctx: &MalfunctionContext<'_>) -> bool {
        ctx.inputs.motor_running
    }

    fn on_start(
        &self,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        rng: &mut SimRng,
        out: &mut CommandQueue,
    ) {
        let end = ctx.now.saturating_add(ctx.duration(self.kind(), rng));
        state.instance_mut(self.kind()).end_time = Some(end);
        out.push(ActuatorCommand::AllImplementsOff);
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
        if ctx.inputs.attached().any(|i| i.powered) {
            out.push(ActuatorCommand::AllImplementsOff);
        }
        None
    }
}

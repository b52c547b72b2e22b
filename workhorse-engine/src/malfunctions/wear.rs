//! Persistent faults that last until serviced: flat tires and leaks.
use super::{MalfunctionBehavior, MalfunctionContext};
use crate::effects::CommandQueue;
use crate::event::EndReason;
use crate::fluids::{self, LeakTarget};
use crate::rng::SimRng;
use crate::state::{FlatSide, MalfunctionKind, VehicleReliabilityState};
use crate::tires;

pub struct FlatTire;

impl MalfunctionBehavior for FlatTire {
    fn kind(&self) -> MalfunctionKind {
        MalfunctionKind::FlatTire
    }

    fn is_eligible(&self, state: &VehicleReliabilityState, ctx: &MalfunctionContext<'_>) -> bool {
        !state.tire.has_flat && (ctx.inputs.is_moving() || ctx.inputs.distance_km > 0.0)
    }

    fn trigger_chance(&self, state: &VehicleReliabilityState, ctx: &MalfunctionContext<'_>) -> f32 {
        tires::flat_chance(
            &ctx.cfg.tires,
            &ctx.tuning(self.kind()),
            ctx.provider.tire_condition(state),
            state.tire.quality_tier,
            state.quality_trait(),
        )
    }

    fn on_start(
        &self,
        state: &mut VehicleReliabilityState,
        _ctx: &MalfunctionContext<'_>,
        rng: &mut SimRng,
        _out: &mut CommandQueue,
    ) {
        let side = if rng.direction() < 0.0 {
            FlatSide::Left
        } else {
            FlatSide::Right
        };
        tires::puncture(state, side);
        state.instance_mut(self.kind()).direction_or_severity = side.sign();
    }

    fn on_tick(
        &self,
        state: &mut VehicleReliabilityState,
        _ctx: &MalfunctionContext<'_>,
        _rng: &mut SimRng,
        _out: &mut CommandQueue,
    ) -> Option<EndReason> {
        (!state.tire.has_flat).then_some(EndReason::Serviced)
    }
}

/// One behaviour per leaking system; severity follows reliability depth.
pub struct Leak {
    target: LeakTarget,
}

impl Leak {
    pub const OIL: Self = Self {
        target: LeakTarget::Oil,
    };
    pub const HYDRAULIC: Self = Self {
        target: LeakTarget::Hydraulic,
    };
    pub const FUEL: Self = Self {
        target: LeakTarget::Fuel,
    };

    fn leaking(&self, state: &VehicleReliabilityState) -> bool {
        match self.target {
            LeakTarget::Oil => state.fluids.oil.has_leak,
            LeakTarget::Hydraulic => state.fluids.hydraulic.has_leak,
            LeakTarget::Fuel => state.fuel.has_leak,
        }
    }
}

impl MalfunctionBehavior for Leak {
    fn kind(&self) -> MalfunctionKind {
        match self.target {
            LeakTarget::Oil => MalfunctionKind::OilLeak,
            LeakTarget::Hydraulic => MalfunctionKind::HydraulicLeak,
            LeakTarget::Fuel => MalfunctionKind::FuelLeak,
        }
    }

    fn is_eligible(&self, state: &VehicleReliabilityState, ctx: &MalfunctionContext<'_>) -> bool {
        ctx.inputs.motor_running && !self.leaking(state)
    }

    fn on_start(
        &self,
        state: &mut VehicleReliabilityState,
        ctx: &MalfunctionContext<'_>,
        _rng: &mut SimRng,
        _out: &mut CommandQueue,
    ) {
        let severity = fluids::severity_for_depth(ctx.depth(state, self.kind()));
        fluids::start_leak(state, &ctx.cfg.fluids, self.target, severity);
        state.instance_mut(self.kind()).direction_or_severity = f32::from(severity.level());
    }

    fn on_tick(
        &self,
        state: &mut VehicleReliabilityState,
        _ctx: &MalfunctionContext<'_>,
        _rng: &mut SimRng,
        _out: &mut CommandQueue,
    ) -> Option<EndReason> {
        (!self.leaking(state)).then_some(EndReason::Serviced)
    }
}

pub mod reports;
pub mod seeds;
pub mod simulation;
pub mod tester;

pub use seeds::resolve_seed_inputs;
pub use simulation::{DriveProfile, SimulationPlan, SimulationRunner, SimulationSummary, VehicleSetup};
pub use tester::*;

//! Workhorse Reliability Engine
//!
//! Platform-agnostic reliability and fault-injection core for simulated
//! vehicles: hidden build quality, subsystem wear, fluids, tires, seizures and
//! a registry of malfunction state machines. Hosts feed readings in and apply
//! the returned actuator commands and multipliers; nothing here touches a
//! renderer, physics engine or save file directly.

pub mod config;
pub mod constants;
pub mod dna;
pub mod effects;
pub mod engine;
pub mod event;
pub mod fluids;
pub mod inputs;
pub mod inspection;
pub mod malfunctions;
pub mod numbers;
pub mod provider;
pub mod reliability;
pub mod rng;
pub mod seizure;
pub mod snapshot;
pub mod speed;
pub mod state;
pub mod tires;
pub mod warning;

// Re-export commonly used types
pub use config::{ConfigError, MalfunctionTuning, ReliabilityConfig};
pub use dna::{PreOwnedProfile, SellerTier};
pub use effects::{ActiveEffects, ActuatorCommand, CommandQueue, SteeringEffect};
pub use engine::{FrameOutcome, ReliabilityEngine, ServiceAction, TickOutcome};
pub use event::{EndReason, EventPhase, EventSeverity, MalfunctionEvent};
pub use fluids::LeakTarget;
pub use inputs::{ImplementInput, VehicleInputs};
pub use inspection::{ConditionBand, InspectionReport, QualityHint};
pub use malfunctions::{MalfunctionBehavior, MalfunctionContext, Registry};
pub use provider::{NativeProvider, ReliabilityProvider};
pub use reliability::RepairScope;
pub use rng::SimRng;
pub use snapshot::{FleetSnapshot, SnapshotError, state_fingerprint};
pub use state::{
    EntityHandle, FlatSide, FluidKind, ImplementSlot, LeakSeverity, MalfunctionKind,
    SubsystemKind, TireTier, Timestamp, VehicleReliabilityState,
};
pub use tires::Weather;

/// Name under which [`Workshop`] asks its loader for the engine configuration.
pub const RELIABILITY_CONFIG: &str = "reliability";

/// Trait for abstracting configuration loading
/// Platform-specific implementations should provide this
pub trait ConfigLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load a named configuration document
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or parsed.
    fn load_config<T>(&self, config_name: &str) -> Result<T, Self::Error>
    where
        T: serde::de::DeserializeOwned;
}

/// Trait for abstracting snapshot persistence
/// Platform-specific implementations should provide this
pub trait StateStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Save a fleet snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be saved.
    fn save_snapshot(&self, save_name: &str, snapshot: &FleetSnapshot) -> Result<(), Self::Error>;

    /// Load a fleet snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be loaded.
    fn load_snapshot(&self, save_name: &str) -> Result<Option<FleetSnapshot>, Self::Error>;

    /// Delete a saved snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be deleted.
    fn delete_snapshot(&self, save_name: &str) -> Result<(), Self::Error>;
}

/// Builds engines from loaded configuration and moves their state in and out of a store
pub struct Workshop<L, S>
where
    L: ConfigLoader,
    S: StateStore,
{
    loader: L,
    store: S,
}

impl<L, S> Workshop<L, S>
where
    L: ConfigLoader,
    S: StateStore,
{
    pub const fn new(loader: L, store: S) -> Self {
        Self { loader, store }
    }

    /// Load, validate and sanitize the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or fails validation.
    pub fn load_config(&self) -> anyhow::Result<ReliabilityConfig>
    where
        L::Error: Into<anyhow::Error>,
    {
        let mut cfg: ReliabilityConfig = self
            .loader
            .load_config(RELIABILITY_CONFIG)
            .map_err(Into::into)?;
        cfg.validate()?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Create an empty engine seeded with `seed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or is invalid.
    pub fn create_engine(&self, seed: u64) -> anyhow::Result<ReliabilityEngine>
    where
        L::Error: Into<anyhow::Error>,
    {
        Ok(ReliabilityEngine::new(self.load_config()?, seed))
    }

    /// Save an engine's fleet
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be saved.
    pub fn save<P: ReliabilityProvider>(
        &self,
        save_name: &str,
        engine: &ReliabilityEngine<P>,
    ) -> Result<(), S::Error> {
        self.store.save_snapshot(save_name, &engine.snapshot())
    }

    /// Rebuild an engine from a saved snapshot, `None` when nothing was saved under the name.
    ///
    /// # Errors
    ///
    /// Returns an error if loading, configuration or the snapshot itself fails.
    pub fn load(&self, save_name: &str) -> anyhow::Result<Option<ReliabilityEngine>>
    where
        L::Error: Into<anyhow::Error>,
        S::Error: Into<anyhow::Error>,
    {
        let Some(snapshot) = self.store.load_snapshot(save_name).map_err(Into::into)? else {
            return Ok(None);
        };
        let mut engine = self.create_engine(snapshot.seed)?;
        engine.restore(snapshot)?;
        Ok(Some(engine))
    }

    /// Delete a saved snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot delete it.
    pub fn delete(&self, save_name: &str) -> Result<(), S::Error> {
        self.store.delete_snapshot(save_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::DeserializeOwned;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct FixtureLoader {
        json: Option<&'static str>,
    }

    impl ConfigLoader for FixtureLoader {
        type Error = serde_json::Error;

        fn load_config<T>(&self, _config_name: &str) -> Result<T, Self::Error>
        where
            T: DeserializeOwned,
        {
            serde_json::from_str(self.json.unwrap_or("{}"))
        }
    }

    #[derive(Clone, Default)]
    struct MemoryStorage {
        saves: Rc<RefCell<HashMap<String, FleetSnapshot>>>,
    }

    impl StateStore for MemoryStorage {
        type Error = Infallible;

        fn save_snapshot(&self, save_name: &str, snapshot: &FleetSnapshot) -> Result<(), Self::Error> {
            self.saves
                .borrow_mut()
                .insert(save_name.to_string(), snapshot.clone());
            Ok(())
        }

        fn load_snapshot(&self, save_name: &str) -> Result<Option<FleetSnapshot>, Self::Error> {
            Ok(self.saves.borrow().get(save_name).cloned())
        }

        fn delete_snapshot(&self, save_name: &str) -> Result<(), Self::Error> {
            self.saves.borrow_mut().remove(save_name);
            Ok(())
        }
    }

    #[test]
    fn workshop_creates_and_roundtrips_engines() {
        let workshop = Workshop::new(FixtureLoader::default(), MemoryStorage::default());
        let mut engine = workshop.create_engine(0xABCD).unwrap();
        engine.register_new(EntityHandle(1));
        engine.register_new(EntityHandle(2));
        let inputs = VehicleInputs {
            motor_running: true,
            ..VehicleInputs::default()
        };
        for second in 0..30 {
            engine.tick(EntityHandle(1), &inputs, second * 1_000);
        }
        workshop.save("slot-one", &engine).unwrap();

        let loaded = workshop.load("slot-one").unwrap().expect("save exists");
        assert_eq!(loaded.snapshot(), engine.snapshot());
        assert_eq!(loaded.seed(), 0xABCD);
        assert!(workshop.load("missing-slot").unwrap().is_none());

        workshop.delete("slot-one").unwrap();
        assert!(workshop.load("slot-one").unwrap().is_none());
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let loader = FixtureLoader {
            json: Some(r#"{ "failure": { "probability_cap": 4.0 } }"#),
        };
        let workshop = Workshop::new(loader, MemoryStorage::default());
        let err = workshop.create_engine(1).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());

        let broken = Workshop::new(
            FixtureLoader {
                json: Some("{ nope"),
            },
            MemoryStorage::default(),
        );
        assert!(broken.create_engine(1).is_err());
    }
}

//! Serializable capture of a whole fleet plus the RNG position, so a save
//! resumes exactly where it left off.
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use thiserror::Error;
use twox_hash::XxHash64;

use crate::state::{EntityHandle, Timestamp, VehicleReliabilityState};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("duplicate vehicle handle {0:?} in snapshot")]
    DuplicateHandle(EntityHandle),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub handle: EntityHandle,
    pub state: VehicleReliabilityState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub version: u32,
    pub seed: u64,
    #[serde(default)]
    pub rng_word_pos: u128,
    #[serde(default)]
    pub rng_draws: u64,
    #[serde(default)]
    pub session_start: Option<Timestamp>,
    /// Sorted by handle.
    #[serde(default)]
    pub vehicles: Vec<VehicleRecord>,
}

impl FleetSnapshot {
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and check the version. States are sanitized on import by the engine.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON, an unknown version or duplicate handles.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.check()?;
        Ok(snapshot)
    }

    pub(crate) fn check(&self) -> Result<(), SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: self.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        let mut seen: Vec<EntityHandle> = self.vehicles.iter().map(|v| v.handle).collect();
        seen.sort_unstable();
        if let Some(pair) = seen.windows(2).find(|w| w[0] == w[1]) {
            return Err(SnapshotError::DuplicateHandle(pair[0]));
        }
        Ok(())
    }

    /// Stable 64-bit digest of the fleet's states, for determinism checks.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        for record in &self.vehicles {
            hasher.write_u64(record.handle.0);
            hasher.write(&state_bytes(&record.state));
        }
        hasher.finish()
    }
}

/// Digest of one vehicle state.
#[must_use]
pub fn state_fingerprint(state: &VehicleReliabilityState) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(&state_bytes(state));
    hasher.finish()
}

fn state_bytes(state: &VehicleReliabilityState) -> Vec<u8> {
    serde_json::to_vec(state).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FleetSnapshot {
        FleetSnapshot {
            version: SNAPSHOT_VERSION,
            seed: 5,
            rng_word_pos: 0,
            rng_draws: 0,
            session_start: Some(0),
            vehicles: vec![
                VehicleRecord {
                    handle: EntityHandle(1),
                    state: VehicleReliabilityState::with_trait(0.4),
                },
                VehicleRecord {
                    handle: EntityHandle(2),
                    state: VehicleReliabilityState::with_trait(0.8),
                },
            ],
        }
    }

    #[test]
    fn json_round_trip_keeps_fingerprint() {
        let snapshot = sample();
        let json = snapshot.to_json().unwrap();
        let parsed = FleetSnapshot::from_json(&json).unwrap();
        assert_eq!(parsed, snapshot);
        assert_eq!(parsed.fingerprint(), snapshot.fingerprint());
    }

    #[test]
    fn fingerprint_tracks_state_changes() {
        let snapshot = sample();
        let mut changed = snapshot.clone();
        changed.vehicles[1].state.subsystems.engine.reliability = 0.5;
        assert_ne!(snapshot.fingerprint(), changed.fingerprint());
    }

    #[test]
    fn rejects_unknown_version_and_duplicates() {
        let mut future = sample();
        future.version = 99;
        let err = FleetSnapshot::from_json(&future.to_json().unwrap()).unwrap_err();
        assert!(matches!(err, SnapshotError::UnsupportedVersion { found: 99, .. }));

        let mut dup = sample();
        dup.vehicles[1].handle = EntityHandle(1);
        let err = FleetSnapshot::from_json(&dup.to_json().unwrap()).unwrap_err();
        assert!(matches!(err, SnapshotError::DuplicateHandle(EntityHandle(1))));

        assert!(matches!(
            FleetSnapshot::from_json("{not json").unwrap_err(),
            SnapshotError::Json(_)
        ));
    }
}

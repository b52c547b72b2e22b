//! Structured events emitted for the host to present.
//!
//! The engine never renders anything; `message_key` is a presentation hint the
//! host maps to its own localisation tables.

use serde::{Deserialize, Serialize};

use crate::constants::{MSG_PREFIX, MSG_SEIZED_PREFIX};
use crate::state::{EntityHandle, MalfunctionKind, SubsystemKind, Timestamp};

/// Severity tier for a malfunction event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    Info,
    Warning,
    Critical,
}

/// Where in a malfunction's life the event was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPhase {
    Started,
    Ended,
    /// Re-announcement of a malfunction whose start the player never saw.
    Reminder,
    Seized,
}

impl EventPhase {
    const fn suffix(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Ended => "ended",
            Self::Reminder => "reminder",
            Self::Seized => "seized",
        }
    }
}

/// Why an active malfunction stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Expired,
    Cooled,
    EngineOff,
    Crash,
    FluidsRestored,
    Serviced,
    /// Superseded by a seizure of the same subsystem.
    Seized,
    /// The implement it was pinned to went away.
    Detached,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MalfunctionEvent {
    pub entity: EntityHandle,
    pub kind: MalfunctionKind,
    pub phase: EventPhase,
    pub message_key: String,
    pub severity: EventSeverity,
    pub started_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<EndReason>,
    /// Whether the warning gate let this event through to the player.
    #[serde(default)]
    pub surfaced: bool,
}

impl MalfunctionEvent {
    #[must_use]
    pub fn started(entity: EntityHandle, kind: MalfunctionKind, at: Timestamp) -> Self {
        Self::new(entity, kind, EventPhase::Started, start_severity(kind), at)
    }

    #[must_use]
    pub fn reminder(entity: EntityHandle, kind: MalfunctionKind, started_at: Timestamp) -> Self {
        Self::new(
            entity,
            kind,
            EventPhase::Reminder,
            start_severity(kind),
            started_at,
        )
    }

    #[must_use]
    pub fn ended(
        entity: EntityHandle,
        kind: MalfunctionKind,
        started_at: Timestamp,
        ended_at: Timestamp,
        reason: EndReason,
    ) -> Self {
        Self {
            ended_at: Some(ended_at),
            end_reason: Some(reason),
            ..Self::new(entity, kind, EventPhase::Ended, EventSeverity::Info, started_at)
        }
    }

    /// Permanent seizure of `subsystem`, escalated from `kind`.
    #[must_use]
    pub fn seized(
        entity: EntityHandle,
        kind: MalfunctionKind,
        subsystem: SubsystemKind,
        at: Timestamp,
    ) -> Self {
        Self {
            message_key: format!("{MSG_SEIZED_PREFIX}.{}", subsystem.key()),
            ..Self::new(entity, kind, EventPhase::Seized, EventSeverity::Critical, at)
        }
    }

    fn new(
        entity: EntityHandle,
        kind: MalfunctionKind,
        phase: EventPhase,
        severity: EventSeverity,
        started_at: Timestamp,
    ) -> Self {
        Self {
            entity,
            kind,
            phase,
            message_key: format!("{MSG_PREFIX}.{}.{}", kind.key(), phase.suffix()),
            severity,
            started_at,
            ended_at: None,
            end_reason: None,
            surfaced: false,
        }
    }
}

const fn start_severity(kind: MalfunctionKind) -> EventSeverity {
    match kind {
        MalfunctionKind::Runaway | MalfunctionKind::HitchFailure => EventSeverity::Critical,
        MalfunctionKind::Misfire | MalfunctionKind::PtoToggle => EventSeverity::Info,
        _ => EventSeverity::Warning,
    }
}

//! Structured events emitted by the registry on every state transition.
//!
//! Consumers read the event stream to drive dialogs, answer-service
//! callbacks or audit logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{ChallengeId, ResultType, SkipScope, SolverId};

/// A structured event emitted by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence number. Consumers can detect gaps.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    ChallengeRegistered {
        id: ChallengeId,
        result_type: ResultType,
        host: Option<String>,
    },
    ResponseAccepted {
        id: ChallengeId,
        solver: SolverId,
    },
    ResponseRejected {
        id: ChallengeId,
        solver: SolverId,
        reason: String,
    },
    ChallengeSolved {
        id: ChallengeId,
    },
    /// `origin` is the challenge the skip intent was raised against; equal
    /// to `id` for the active challenge itself.
    ChallengeSkipped {
        id: ChallengeId,
        origin: ChallengeId,
        scope: Option<SkipScope>,
    },
    ChallengeTimedOut {
        id: ChallengeId,
    },
    SkipRuleRecorded {
        origin: ChallengeId,
        scope: SkipScope,
    },
    SkipRulesCleared {
        count: usize,
    },
}

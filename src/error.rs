//! Error types for captcha-skip.

use thiserror::Error;

use crate::model::{ChallengeId, ChallengeState, ResultType, SolverId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("challenge not found: {0}")]
    NotFound(ChallengeId),

    #[error("invalid state transition for challenge {id}: {from} -> {to}")]
    InvalidTransition {
        id: ChallengeId,
        from: ChallengeState,
        to: ChallengeState,
    },

    /// A challenge reached correlation or domain resolution without an owning
    /// plugin. Always a caller bug.
    #[error("challenge {0} has no owning plugin")]
    MissingProvenance(ChallengeId),

    /// The owning plugin is bound but neither its link nor its host yields
    /// domain metadata.
    #[error("no domain info for challenge {id} (host {host:?})")]
    DomainInfoUnavailable { id: ChallengeId, host: String },

    #[error("challenge {id} does not accept external {result_type} answers")]
    UnsupportedAnswer { id: ChallengeId, result_type: ResultType },

    #[error("response from {solver} rejected by challenge {id}")]
    ResponseRejected { id: ChallengeId, solver: SolverId },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("scenario error: {0}")]
    Scenario(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Invariant violations that must not be downgraded to a skip decision.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::MissingProvenance(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

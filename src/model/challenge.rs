//! The challenge entity.
//!
//! A `Challenge<T>` is created by exactly one worker, which may still flip
//! `account_login` while it owns the value. Once submitted to the registry
//! it is only reachable through [`AnyChallenge`], which exposes provenance
//! read-only.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use super::answer::{ChallengeAnswer, Response, ResponseList, ResultType, SolverId};
use super::plugin::Plugin;
use crate::error::{Error, Result};

/// Timeout value meaning "never expires".
pub const NO_TIMEOUT: i64 = -1;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

static NEXT_CHALLENGE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide challenge id. Assigned in creation order, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChallengeId(pub u64);

impl ChallengeId {
    fn next() -> Self {
        Self(NEXT_CHALLENGE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the creating worker is doing. Declared by the caller, not inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreatorRole {
    DownloadWorker,
    CrawlWorker,
    /// Verifying account credentials; its challenges are login challenges.
    AccountChecker,
    Other,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle state of a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeState {
    /// Waiting for an answer.
    Pending,
    /// Answered. Terminal.
    Solved,
    /// Cancelled by a skip intent. Terminal.
    Skipped,
    /// Timeout elapsed without an answer. Terminal.
    TimedOut,
}

impl ChallengeState {
    pub fn can_transition_to(self, to: ChallengeState) -> bool {
        self == ChallengeState::Pending && to.is_terminal()
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ChallengeState::Pending)
    }
}

impl std::fmt::Display for ChallengeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChallengeState::Pending => "pending",
            ChallengeState::Solved => "solved",
            ChallengeState::Skipped => "skipped",
            ChallengeState::TimedOut => "timed_out",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// Per-kind solving policy for a challenge answered by `T`.
pub trait ChallengeKind<T>: std::fmt::Debug + Send + Sync {
    /// Whether the collected responses settle the challenge.
    fn is_solved(&self, result: Option<&ResponseList<T>>) -> bool;

    /// Checked before a response is stored.
    fn validate_response(&self, _response: &Response<T>) -> bool {
        true
    }

    /// Turn an externally sourced answer into a response. `None` when this
    /// kind cannot be answered from outside.
    fn parse_api_answer(&self, _raw: &str, _solver: &SolverId) -> Option<Response<T>> {
        None
    }
}

// ---------------------------------------------------------------------------
// Challenge
// ---------------------------------------------------------------------------

/// One captcha instance.
#[derive(Debug)]
pub struct Challenge<T: ChallengeAnswer> {
    id: ChallengeId,
    result_type: ResultType,
    created: DateTime<Utc>,
    timeout: i64,
    account_login: bool,
    created_inside_account_checker: bool,
    challenge_type: String,
    explain: String,
    result: Option<ResponseList<T>>,
    plugin: Option<Plugin>,
    kind: Box<dyn ChallengeKind<T>>,
}

impl<T: ChallengeAnswer> Challenge<T> {
    /// Create a challenge. The result type comes from `T`; the creator role
    /// decides whether this is an account-check challenge.
    pub fn new(
        kind: impl ChallengeKind<T> + 'static,
        challenge_type: impl Into<String>,
        explain: impl Into<String>,
        role: CreatorRole,
        plugin: Option<Plugin>,
    ) -> Self {
        Self {
            id: ChallengeId::next(),
            result_type: T::RESULT_TYPE,
            created: Utc::now(),
            timeout: NO_TIMEOUT,
            account_login: false,
            created_inside_account_checker: role == CreatorRole::AccountChecker,
            challenge_type: challenge_type.into(),
            explain: explain.into(),
            result: None,
            plugin,
            kind: Box::new(kind),
        }
    }

    /// Mark this as a login challenge. Only possible before submission,
    /// while the creating worker still owns the challenge.
    pub fn set_account_login(&mut self, account_login: bool) {
        self.account_login = account_login;
    }

    pub fn with_account_login(mut self, account_login: bool) -> Self {
        self.account_login = account_login;
        self
    }

    /// Timeout in milliseconds; [`NO_TIMEOUT`] disables expiry.
    pub fn with_timeout(mut self, timeout_ms: i64) -> Self {
        self.timeout = timeout_ms;
        self
    }

    pub fn set_challenge_type(&mut self, challenge_type: impl Into<String>) {
        self.challenge_type = challenge_type.into();
    }

    pub fn set_explain(&mut self, explain: impl Into<String>) {
        self.explain = explain.into();
    }

    pub fn explain(&self) -> &str {
        &self.explain
    }

    pub fn result(&self) -> Option<&ResponseList<T>> {
        self.result.as_ref()
    }

    pub fn refresh_trigger(&self) -> Option<T> {
        T::refresh_trigger()
    }

    /// Store a response after the kind validates it. Returns whether the
    /// challenge is now solved.
    pub fn add_response(&mut self, response: Response<T>) -> Result<bool> {
        if !self.kind.validate_response(&response) {
            return Err(Error::ResponseRejected {
                id: self.id,
                solver: response.solver,
            });
        }
        self.result
            .get_or_insert_with(ResponseList::new)
            .push(response);
        Ok(self.kind.is_solved(self.result.as_ref()))
    }
}

/// API view of a challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeSummary {
    pub id: ChallengeId,
    pub challenge_type: String,
    pub explain: String,
    pub result_type: ResultType,
    pub host: Option<String>,
    pub created: DateTime<Utc>,
    pub timeout: i64,
    pub account_login: bool,
    pub created_inside_account_checker: bool,
}

// ---------------------------------------------------------------------------
// Type-erased view
// ---------------------------------------------------------------------------

/// A challenge of any answer type, as seen by the registry and correlator.
pub trait AnyChallenge: std::fmt::Debug + Send + Sync {
    fn id(&self) -> ChallengeId;
    fn result_type(&self) -> ResultType;
    fn created(&self) -> DateTime<Utc>;
    fn timeout(&self) -> i64;
    fn set_timeout(&mut self, timeout_ms: i64);
    fn challenge_type(&self) -> &str;
    fn plugin(&self) -> Option<&Plugin>;
    fn is_account_login(&self) -> bool;
    fn is_created_inside_account_checker(&self) -> bool;
    fn is_solved(&self) -> bool;

    /// Feed an externally sourced answer. Returns whether the challenge is
    /// now solved.
    fn accept_answer(&mut self, raw: &str, solver: &SolverId) -> Result<bool>;

    fn summary(&self) -> ChallengeSummary;

    /// Whether the timeout elapsed at `now`. A deadline past the
    /// representable range never elapses.
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let timeout = self.timeout();
        if timeout < 0 {
            return false;
        }
        TimeDelta::try_milliseconds(timeout)
            .and_then(|delta| self.created().checked_add_signed(delta))
            .is_some_and(|deadline| now >= deadline)
    }
}

impl<T: ChallengeAnswer> AnyChallenge for Challenge<T> {
    fn id(&self) -> ChallengeId {
        self.id
    }

    fn result_type(&self) -> ResultType {
        self.result_type
    }

    fn created(&self) -> DateTime<Utc> {
        self.created
    }

    fn timeout(&self) -> i64 {
        self.timeout
    }

    fn set_timeout(&mut self, timeout_ms: i64) {
        self.timeout = timeout_ms;
    }

    fn challenge_type(&self) -> &str {
        &self.challenge_type
    }

    fn plugin(&self) -> Option<&Plugin> {
        self.plugin.as_ref()
    }

    fn is_account_login(&self) -> bool {
        self.account_login
    }

    fn is_created_inside_account_checker(&self) -> bool {
        self.created_inside_account_checker
    }

    fn is_solved(&self) -> bool {
        self.kind.is_solved(self.result.as_ref())
    }

    fn accept_answer(&mut self, raw: &str, solver: &SolverId) -> Result<bool> {
        let response =
            self.kind
                .parse_api_answer(raw, solver)
                .ok_or(Error::UnsupportedAnswer {
                    id: self.id,
                    result_type: self.result_type,
                })?;
        self.add_response(response)
    }

    fn summary(&self) -> ChallengeSummary {
        ChallengeSummary {
            id: self.id,
            challenge_type: self.challenge_type.clone(),
            explain: self.explain.clone(),
            result_type: self.result_type,
            host: self.plugin.as_ref().map(|p| p.host().to_string()),
            created: self.created,
            timeout: self.timeout,
            account_login: self.account_login,
            created_inside_account_checker: self.created_inside_account_checker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::kinds::{ConfirmChallenge, TextCaptcha};
    use crate::model::plugin::HostPlugin;

    fn text(role: CreatorRole) -> Challenge<String> {
        Challenge::new(
            TextCaptcha::default(),
            "recaptcha",
            "type the letters",
            role,
            Some(HostPlugin::new("alpha.example").into()),
        )
    }

    #[test]
    fn ids_are_monotonic() {
        let a = text(CreatorRole::DownloadWorker);
        let b = text(CreatorRole::DownloadWorker);
        assert!(b.id() > a.id());
    }

    #[test]
    fn result_type_follows_answer_type() {
        assert_eq!(text(CreatorRole::Other).result_type(), ResultType::Text);
        let confirm: Challenge<bool> =
            Challenge::new(ConfirmChallenge, "confirm", "", CreatorRole::Other, None);
        assert_eq!(confirm.result_type(), ResultType::Confirm);
    }

    #[test]
    fn account_checker_role_is_captured() {
        assert!(text(CreatorRole::AccountChecker).is_created_inside_account_checker());
        assert!(!text(CreatorRole::DownloadWorker).is_created_inside_account_checker());
    }

    #[test]
    fn defaults() {
        let c = text(CreatorRole::DownloadWorker);
        assert_eq!(c.timeout(), NO_TIMEOUT);
        assert!(!c.is_account_login());
        assert!(c.result().is_none());
        assert!(!c.is_solved());
        assert_eq!(c.refresh_trigger().as_deref(), Some(""));
    }

    #[test]
    fn expiry_respects_no_timeout() {
        let c = text(CreatorRole::Other);
        assert!(!c.is_expired(Utc::now() + TimeDelta::days(365)));

        let c = text(CreatorRole::Other).with_timeout(1_000);
        assert!(!c.is_expired(c.created()));
        assert!(c.is_expired(c.created() + TimeDelta::milliseconds(1_000)));
    }

    #[test]
    fn huge_timeout_never_expires() {
        let c = text(CreatorRole::Other).with_timeout(i64::MAX);
        assert!(!c.is_expired(Utc::now()));
        assert!(!c.is_expired(DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn only_pending_moves_to_terminal() {
        use ChallengeState::*;
        assert!(Pending.can_transition_to(Skipped));
        assert!(Pending.can_transition_to(TimedOut));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Solved.can_transition_to(Skipped));
        assert!(!Skipped.can_transition_to(Solved));
    }

    #[test]
    fn summary_carries_host() {
        let c = text(CreatorRole::DownloadWorker).with_account_login(true);
        let s = c.summary();
        assert_eq!(s.host.as_deref(), Some("alpha.example"));
        assert!(s.account_login);
        assert_eq!(s.result_type, ResultType::Text);
    }
}

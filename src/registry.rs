//! Challenge registry. The job runner that owns every pending challenge.
//!
//! All state transitions go through here. A skip intent raised against one
//! challenge is correlated against every other pending challenge in a single
//! pass, and remembered as a skip rule so challenges raised later in the
//! session are matched too.

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::correlate::can_be_skipped_by;
use crate::error::{Error, Result};
use crate::event::{Event, EventKind};
use crate::model::*;
use crate::storage::Storage;
use crate::telemetry::challenge::{record_skip_matches, record_state_transition, start_skip_span};
use crate::telemetry::metrics;

/// A recorded skip intent, applied to challenges submitted later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipRule {
    /// The challenge the intent was raised against.
    pub origin: ChallengeId,
    pub scope: SkipScope,
}

/// What happened when a challenge was submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResult {
    /// Registered and waiting for an answer.
    Pending(ChallengeId),
    /// Cancelled on arrival by an earlier skip intent.
    Skipped { id: ChallengeId, rule: SkipRule },
}

impl SubmitResult {
    pub fn id(&self) -> ChallengeId {
        match self {
            SubmitResult::Pending(id) | SubmitResult::Skipped { id, .. } => *id,
        }
    }
}

/// Result of one skip pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipOutcome {
    /// The challenge the intent was raised against. Always skipped.
    pub active: ChallengeId,
    pub scope: Option<SkipScope>,
    /// Other challenges cancelled along with `active`, in creation order.
    pub also_skipped: Vec<ChallengeId>,
}

/// The challenge registry.
#[derive(Debug)]
pub struct Registry {
    storage: Storage,
    skip_rules: Vec<SkipRule>,
    /// Timeout applied to submitted challenges that have none.
    pub default_timeout_ms: i64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            storage: Storage::new(),
            skip_rules: Vec::new(),
            default_timeout_ms: NO_TIMEOUT,
        }
    }

    pub fn with_default_timeout(mut self, timeout_ms: i64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    /// Keep at most `capacity` events in the log.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.storage = Storage::with_event_capacity(capacity);
        self
    }

    /// Register a challenge. The creating worker must have finished setting
    /// `account_login` before this call.
    ///
    /// A challenge matched by a recorded skip rule is skipped immediately.
    pub fn submit(&mut self, mut challenge: Box<dyn AnyChallenge>) -> Result<SubmitResult> {
        let id = challenge.id();
        if self.storage.contains(id) {
            return Err(Error::Other(format!("challenge {id} already registered")));
        }
        if challenge.timeout() == NO_TIMEOUT && self.default_timeout_ms != NO_TIMEOUT {
            challenge.set_timeout(self.default_timeout_ms);
        }

        let mut matched = None;
        for rule in &self.skip_rules {
            let origin = self.storage.challenge(rule.origin)?;
            if can_be_skipped_by(origin, challenge.as_ref(), rule.scope, None)? {
                matched = Some(*rule);
                break;
            }
        }

        let result_type = challenge.result_type();
        let host = challenge.plugin().map(|p| p.host().to_string());
        self.storage.insert(challenge, ChallengeState::Pending);
        self.storage.record_event(EventKind::ChallengeRegistered {
            id,
            result_type,
            host: host.clone(),
        });
        metrics::challenges_submitted().add(
            1,
            &[KeyValue::new("result_type", result_type.to_string())],
        );
        debug!(challenge = %id, %result_type, host = host.as_deref(), "challenge registered");

        let Some(rule) = matched else {
            return Ok(SubmitResult::Pending(id));
        };
        self.transition(id, ChallengeState::Skipped)?;
        self.storage.record_event(EventKind::ChallengeSkipped {
            id,
            origin: rule.origin,
            scope: Some(rule.scope),
        });
        info!(
            challenge = %id,
            origin = %rule.origin,
            scope = %rule.scope,
            "challenge skipped on arrival"
        );
        Ok(SubmitResult::Skipped { id, rule })
    }

    /// Feed an externally sourced answer. Returns the resulting state.
    pub fn answer(
        &mut self,
        id: ChallengeId,
        solver: &SolverId,
        raw: &str,
    ) -> Result<ChallengeState> {
        let state = self.storage.state(id)?;
        if state.is_terminal() {
            return Err(Error::InvalidTransition {
                id,
                from: state,
                to: ChallengeState::Solved,
            });
        }

        let challenge = self.storage.challenge_mut(id)?;
        let result_type = challenge.result_type();
        let solved = match challenge.accept_answer(raw, solver) {
            Ok(solved) => solved,
            Err(e @ (Error::ResponseRejected { .. } | Error::UnsupportedAnswer { .. })) => {
                warn!(challenge = %id, %solver, error = %e, "answer rejected");
                metrics::answers_rejected().add(
                    1,
                    &[KeyValue::new("result_type", result_type.to_string())],
                );
                self.storage.record_event(EventKind::ResponseRejected {
                    id,
                    solver: solver.clone(),
                    reason: e.to_string(),
                });
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        self.storage.record_event(EventKind::ResponseAccepted {
            id,
            solver: solver.clone(),
        });
        if !solved {
            return Ok(ChallengeState::Pending);
        }
        self.transition(id, ChallengeState::Solved)?;
        self.storage
            .record_event(EventKind::ChallengeSolved { id });
        Ok(ChallengeState::Solved)
    }

    /// Skip `id` and, with a scope, every other pending challenge the
    /// correlator matches. The scope is recorded as a skip rule.
    ///
    /// Decisions are computed before anything changes, so an error leaves
    /// the registry untouched.
    pub fn skip(
        &mut self,
        id: ChallengeId,
        scope: Option<SkipScope>,
        solver: Option<&SolverId>,
    ) -> Result<SkipOutcome> {
        let state = self.storage.state(id)?;
        if state.is_terminal() {
            return Err(Error::InvalidTransition {
                id,
                from: state,
                to: ChallengeState::Skipped,
            });
        }

        // A rule without provenance would fail every later submit.
        if scope.is_some() && self.storage.challenge(id)?.plugin().is_none() {
            return Err(Error::MissingProvenance(id));
        }

        let span = start_skip_span(id, scope);
        let _entered = span.enter();

        let mut also_skipped = Vec::new();
        if let Some(scope) = scope {
            let active = self.storage.challenge(id)?;
            for target in self.storage.pending().filter(|c| c.id() != id) {
                let skippable = can_be_skipped_by(active, target, scope, solver)?;
                metrics::skip_decisions().add(
                    1,
                    &[
                        KeyValue::new("scope", scope.as_str()),
                        KeyValue::new("skippable", skippable.to_string()),
                    ],
                );
                if skippable {
                    also_skipped.push(target.id());
                }
            }
        }

        self.transition(id, ChallengeState::Skipped)?;
        self.storage.record_event(EventKind::ChallengeSkipped {
            id,
            origin: id,
            scope,
        });
        record_state_transition(&span, id, "pending", "skipped");

        for &other in &also_skipped {
            self.transition(other, ChallengeState::Skipped)?;
            self.storage.record_event(EventKind::ChallengeSkipped {
                id: other,
                origin: id,
                scope,
            });
            record_state_transition(&span, other, "pending", "skipped");
        }
        record_skip_matches(&span, also_skipped.len());

        if let Some(scope) = scope {
            self.skip_rules.push(SkipRule { origin: id, scope });
            self.storage
                .record_event(EventKind::SkipRuleRecorded { origin: id, scope });
        }

        info!(
            challenge = %id,
            scope = scope.map_or("none", SkipScope::as_str),
            also_skipped = also_skipped.len(),
            "skip pass finished"
        );

        Ok(SkipOutcome {
            active: id,
            scope,
            also_skipped,
        })
    }

    /// Like [`skip`](Self::skip) with a textual scope. Unknown scopes skip
    /// only the active challenge.
    pub fn skip_named(
        &mut self,
        id: ChallengeId,
        raw_scope: &str,
        solver: Option<&SolverId>,
    ) -> Result<SkipOutcome> {
        let scope = SkipScope::parse_lenient(raw_scope);
        if scope.is_none() {
            debug!(challenge = %id, raw_scope, "unrecognized skip scope, skipping single challenge");
        }
        self.skip(id, scope, solver)
    }

    /// Time out every pending challenge whose timeout elapsed at `now`.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<Vec<ChallengeId>> {
        let expired: Vec<ChallengeId> = self
            .storage
            .pending()
            .filter(|c| c.is_expired(now))
            .map(|c| c.id())
            .collect();

        for &id in &expired {
            self.transition(id, ChallengeState::TimedOut)?;
            self.storage
                .record_event(EventKind::ChallengeTimedOut { id });
        }
        if !expired.is_empty() {
            info!(count = expired.len(), "challenges timed out");
        }
        Ok(expired)
    }

    /// Drop all recorded skip rules. Returns how many there were.
    pub fn clear_skip_rules(&mut self) -> usize {
        let count = self.skip_rules.len();
        self.skip_rules.clear();
        self.storage
            .record_event(EventKind::SkipRulesCleared { count });
        count
    }

    /// Drop terminal challenges that settled before `cutoff`. Origins of
    /// recorded skip rules are kept. Returns the dropped ids.
    pub fn prune(&mut self, cutoff: DateTime<Utc>) -> Vec<ChallengeId> {
        let keep: HashSet<ChallengeId> = self.skip_rules.iter().map(|r| r.origin).collect();
        let removed = self.storage.prune_terminal(cutoff, &keep);
        if !removed.is_empty() {
            debug!(count = removed.len(), "terminal challenges pruned");
        }
        removed
    }

    /// Drop events up to and including `through_seq`, e.g. once a consumer
    /// has processed them.
    pub fn prune_events(&mut self, through_seq: u64) -> usize {
        self.storage.prune_events(through_seq)
    }

    /// Number of challenges held, terminal ones included.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn skip_rules(&self) -> &[SkipRule] {
        &self.skip_rules
    }

    pub fn get(&self, id: ChallengeId) -> Result<&dyn AnyChallenge> {
        self.storage.challenge(id)
    }

    pub fn state(&self, id: ChallengeId) -> Result<ChallengeState> {
        self.storage.state(id)
    }

    pub fn list_by_state(&self, state: ChallengeState) -> Vec<ChallengeSummary> {
        self.storage.list_by_state(state)
    }

    pub fn events_since(&self, since_seq: u64) -> Vec<Event> {
        self.storage.events_since(since_seq)
    }

    fn transition(&mut self, id: ChallengeId, to: ChallengeState) -> Result<()> {
        let from = self.storage.update_state(id, to)?;
        metrics::challenge_state_transitions()
            .add(1, &[KeyValue::new("to", to.to_string())]);
        debug!(challenge = %id, %from, %to, "state transition");
        Ok(())
    }
}

//! Challenge span helpers.

use tracing::Span;

use crate::model::{ChallengeId, SkipScope};

/// Start a span covering one skip pass raised against `origin`.
///
/// `skip.matched` is declared empty and filled in by [`record_skip_matches`].
pub fn start_skip_span(origin: ChallengeId, scope: Option<SkipScope>) -> Span {
    tracing::info_span!(
        "challenge.skip",
        "challenge.id" = %origin,
        "skip.scope" = scope.map_or("none", SkipScope::as_str),
        "skip.matched" = tracing::field::Empty,
    )
}

/// Record how many other challenges a skip pass cancelled.
pub fn record_skip_matches(span: &Span, matched: usize) {
    span.record("skip.matched", matched);
}

/// Record a state transition event on the given span.
pub fn record_state_transition(span: &Span, id: ChallengeId, from: &str, to: &str) {
    span.in_scope(|| {
        tracing::info!(challenge = %id, from = from, to = to, "state_transition");
    });
}

//! Metric instrument factories for captcha-skip.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"captcha-skip"` meter.

use opentelemetry::metrics::{Counter, Meter};

/// Returns the shared meter for captcha-skip instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("captcha-skip")
}

/// Counter: challenges registered.
/// Labels: `result_type`.
pub fn challenges_submitted() -> Counter<u64> {
    meter()
        .u64_counter("captcha.challenges.submitted")
        .with_description("Number of challenges registered")
        .build()
}

/// Counter: challenges leaving the pending state.
/// Labels: `to` ("solved" | "skipped" | "timed_out").
pub fn challenge_state_transitions() -> Counter<u64> {
    meter()
        .u64_counter("captcha.challenges.state_transitions")
        .with_description("Number of challenge state transitions")
        .build()
}

/// Counter: correlation decisions made during skip passes.
/// Labels: `scope`, `skippable` ("true" | "false").
pub fn skip_decisions() -> Counter<u64> {
    meter()
        .u64_counter("captcha.skip.decisions")
        .with_description("Number of skip correlation decisions")
        .build()
}

/// Counter: answers rejected by a challenge.
/// Labels: `result_type`.
pub fn answers_rejected() -> Counter<u64> {
    meter()
        .u64_counter("captcha.answers.rejected")
        .with_description("Answers rejected by validation or parsing")
        .build()
}

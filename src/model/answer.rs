//! Answer types and the solver responses that carry them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Result type tag
// ---------------------------------------------------------------------------

/// Tag describing what kind of value answers a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    /// Free text typed from an image.
    Text,
    /// A single position clicked inside an image.
    Click,
    /// A yes/no confirmation.
    Confirm,
}

impl std::fmt::Display for ResultType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResultType::Text => "text",
            ResultType::Click => "click",
            ResultType::Confirm => "confirm",
        };
        write!(f, "{s}")
    }
}

/// A value type that can answer a challenge.
///
/// The tag is an associated constant so a `Challenge<T>` knows its result
/// type at compile time.
pub trait ChallengeAnswer: Clone + std::fmt::Debug + Send + Sync + 'static {
    const RESULT_TYPE: ResultType;

    /// Value a solver submits to request a fresh challenge instead of an
    /// answer. Only text answers have one.
    fn refresh_trigger() -> Option<Self> {
        None
    }

    /// Parse an externally sourced answer.
    fn parse_answer(raw: &str) -> Option<Self>;
}

impl ChallengeAnswer for String {
    const RESULT_TYPE: ResultType = ResultType::Text;

    fn refresh_trigger() -> Option<Self> {
        Some(String::new())
    }

    fn parse_answer(raw: &str) -> Option<Self> {
        // Answer services wrap text in a JSON string; bare text is accepted too.
        match serde_json::from_str::<String>(raw) {
            Ok(s) => Some(s),
            Err(_) => Some(raw.trim().to_string()),
        }
    }
}

impl ChallengeAnswer for bool {
    const RESULT_TYPE: ResultType = ResultType::Confirm;

    fn parse_answer(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

/// Pixel position inside a challenge image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickPoint {
    pub x: u32,
    pub y: u32,
}

impl ChallengeAnswer for ClickPoint {
    const RESULT_TYPE: ResultType = ResultType::Click;

    /// Accepts `{"x":..,"y":..}` or `x,y`.
    fn parse_answer(raw: &str) -> Option<Self> {
        if let Ok(point) = serde_json::from_str::<ClickPoint>(raw) {
            return Some(point);
        }
        let (x, y) = raw.trim().split_once(',')?;
        Some(ClickPoint {
            x: x.trim().parse().ok()?,
            y: y.trim().parse().ok()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

/// Identity of a solver (local dialog, OCR backend, answer service).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SolverId(pub String);

impl SolverId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl std::fmt::Display for SolverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Highest trust a solver can attach to a response.
pub const MAX_TRUST: u8 = 100;

/// One answer from one solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response<T> {
    pub value: T,
    pub solver: SolverId,
    /// Confidence in `0..=100`.
    pub trust: u8,
    pub received_at: DateTime<Utc>,
}

impl<T> Response<T> {
    pub fn new(value: T, solver: SolverId, trust: u8) -> Self {
        Self {
            value,
            solver,
            trust: trust.min(MAX_TRUST),
            received_at: Utc::now(),
        }
    }
}

/// Responses collected for a challenge, in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseList<T> {
    responses: Vec<Response<T>>,
}

impl<T> Default for ResponseList<T> {
    fn default() -> Self {
        Self {
            responses: Vec::new(),
        }
    }
}

impl<T> ResponseList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, response: Response<T>) {
        self.responses.push(response);
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Response<T>> {
        self.responses.iter()
    }

    /// Highest-trust response; the earliest wins a tie.
    pub fn best(&self) -> Option<&Response<T>> {
        self.responses
            .iter()
            .fold(None, |best: Option<&Response<T>>, r| match best {
                Some(b) if b.trust >= r.trust => Some(b),
                _ => Some(r),
            })
    }

    pub fn max_trust(&self) -> u8 {
        self.best().map_or(0, |r| r.trust)
    }
}

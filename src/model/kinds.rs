//! Concrete challenge kinds.

use super::answer::{ChallengeAnswer, ClickPoint, MAX_TRUST, Response, ResponseList, SolverId};
use super::challenge::ChallengeKind;

/// Trust a text response needs before the challenge counts as solved.
pub const DEFAULT_REQUIRED_TRUST: u8 = 50;

/// Text typed from a distorted image.
#[derive(Debug, Clone)]
pub struct TextCaptcha {
    pub required_trust: u8,
}

impl Default for TextCaptcha {
    fn default() -> Self {
        Self {
            required_trust: DEFAULT_REQUIRED_TRUST,
        }
    }
}

impl ChallengeKind<String> for TextCaptcha {
    fn is_solved(&self, result: Option<&ResponseList<String>>) -> bool {
        result.is_some_and(|r| r.max_trust() >= self.required_trust)
    }

    fn validate_response(&self, response: &Response<String>) -> bool {
        !response.value.trim().is_empty()
    }

    fn parse_api_answer(&self, raw: &str, solver: &SolverId) -> Option<Response<String>> {
        String::parse_answer(raw).map(|value| Response::new(value, solver.clone(), MAX_TRUST))
    }
}

/// Click a position inside an image of the given size.
#[derive(Debug, Clone)]
pub struct ClickCaptcha {
    pub width: u32,
    pub height: u32,
}

impl ChallengeKind<ClickPoint> for ClickCaptcha {
    fn is_solved(&self, result: Option<&ResponseList<ClickPoint>>) -> bool {
        result.is_some_and(|r| !r.is_empty())
    }

    fn validate_response(&self, response: &Response<ClickPoint>) -> bool {
        response.value.x < self.width && response.value.y < self.height
    }

    fn parse_api_answer(&self, raw: &str, solver: &SolverId) -> Option<Response<ClickPoint>> {
        ClickPoint::parse_answer(raw).map(|value| Response::new(value, solver.clone(), MAX_TRUST))
    }
}

/// A yes/no prompt answered locally; external answers are not accepted.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmChallenge;

impl ChallengeKind<bool> for ConfirmChallenge {
    fn is_solved(&self, result: Option<&ResponseList<bool>>) -> bool {
        result.is_some_and(|r| !r.is_empty())
    }
}

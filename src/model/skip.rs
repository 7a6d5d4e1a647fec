//! Skip scopes: how far a user's "stop asking me" intent reaches.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Breadth of a skip intent, narrowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipScope {
    /// Stop the action that raised the challenge (e.g. the running crawl).
    StopCurrentAction,
    /// Every challenge from the same host.
    BlockHoster,
    /// Every challenge from the same package or crawl origin.
    BlockPackage,
    /// Every challenge for the rest of the session.
    BlockAllCaptchas,
}

impl SkipScope {
    pub const ALL: [SkipScope; 4] = [
        SkipScope::StopCurrentAction,
        SkipScope::BlockHoster,
        SkipScope::BlockPackage,
        SkipScope::BlockAllCaptchas,
    ];

    /// Lenient parse for intents arriving as text. Anything unknown means
    /// "skip nothing else".
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SkipScope::StopCurrentAction => "stop_current_action",
            SkipScope::BlockHoster => "block_hoster",
            SkipScope::BlockPackage => "block_package",
            SkipScope::BlockAllCaptchas => "block_all_captchas",
        }
    }
}

impl std::fmt::Display for SkipScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SkipScope {
    type Err = String;

    /// Accepts snake_case, kebab-case and SCREAMING_CASE spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        SkipScope::ALL
            .into_iter()
            .find(|scope| scope.as_str() == normalized)
            .ok_or_else(|| format!("unknown skip scope: {s}"))
    }
}

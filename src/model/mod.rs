//! Core data model.
//!
//! A challenge is one captcha awaiting an answer. It has identity (a
//! process-wide id), provenance (the plugin that raised it), an answer type
//! and lifecycle state.

pub mod answer;
pub mod challenge;
pub mod kinds;
pub mod plugin;
pub mod skip;

pub use answer::{ChallengeAnswer, ClickPoint, Response, ResponseList, ResultType, SolverId};
pub use challenge::{
    AnyChallenge, Challenge, ChallengeId, ChallengeKind, ChallengeState, ChallengeSummary,
    CreatorRole, NO_TIMEOUT,
};
pub use kinds::{ClickCaptcha, ConfirmChallenge, TextCaptcha};
pub use plugin::{
    CrawlPlugin, CrawlSessionId, CrawledLink, DomainInfo, DownloadLink, FilePackage, HostPlugin,
    Plugin, PluginKind,
};
pub use skip::SkipScope;

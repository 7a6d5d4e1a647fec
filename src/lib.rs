//! # captcha-skip
//!
//! Skip correlation for captcha challenges raised concurrently by download,
//! crawl and account-check workers.
//!
//! When a user skips one challenge with a broad intent ("block this hoster",
//! "block this package", ...), [`correlate::can_be_skipped_by`] decides for
//! every other challenge whether it goes too. The [`registry::Registry`]
//! owns pending challenges and runs those passes; the
//! [`coordinator::SkipCoordinator`] shares it across tasks.

pub mod config;
pub mod coordinator;
pub mod correlate;
pub mod error;
pub mod event;
pub mod model;
pub mod provenance;
pub mod registry;
pub mod scenario;
pub mod storage;
pub mod telemetry;

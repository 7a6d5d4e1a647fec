//! Skip correlation.
//!
//! When a user skips one challenge with a broadened scope, every other
//! pending challenge is run through [`can_be_skipped_by`] against it. The
//! decision only reads immutable provenance and never mutates anything.
//!
//! Any ambiguity about matching context resolves to "keep the challenge".
//! The only error is a `current` challenge without a plugin, which is a
//! caller bug.

use std::sync::Arc;

use tracing::trace;

use crate::error::{Error, Result};
use crate::model::{AnyChallenge, CrawlPlugin, HostPlugin, Plugin, SkipScope, SolverId};
use crate::provenance;

/// Should `target` be cancelled along with `current` under `scope`?
///
/// `solver` is the solver the intent came through. No policy depends on it
/// yet.
///
/// # Errors
///
/// [`Error::MissingProvenance`] if `current` has no owning plugin.
pub fn can_be_skipped_by(
    current: &dyn AnyChallenge,
    target: &dyn AnyChallenge,
    scope: SkipScope,
    _solver: Option<&SolverId>,
) -> Result<bool> {
    let plugin = current
        .plugin()
        .ok_or(Error::MissingProvenance(current.id()))?;

    let skippable = match plugin {
        Plugin::FileDownload(host) => file_download_skippable(current, host, target, scope),
        Plugin::LinkCrawl(crawl) => link_crawl_skippable(crawl, target, scope),
    };

    trace!(
        current = %current.id(),
        target = %target.id(),
        %scope,
        kind = %plugin.kind(),
        skippable,
        "skip correlation"
    );

    Ok(skippable)
}

fn file_download_skippable(
    current: &dyn AnyChallenge,
    current_plugin: &HostPlugin,
    target: &dyn AnyChallenge,
    scope: SkipScope,
) -> bool {
    // Login challenges are never skipped along with others.
    if current.is_account_login() || current.is_created_inside_account_checker() {
        return false;
    }
    let Some(target_link) = provenance::download_link(target) else {
        return false;
    };
    let target_host = match target.plugin() {
        Some(Plugin::FileDownload(p)) => p.host(),
        _ => return false,
    };

    match scope {
        // Only meaningful for crawls.
        SkipScope::StopCurrentAction => false,
        SkipScope::BlockAllCaptchas => true,
        SkipScope::BlockHoster => current_plugin.host() == target_host,
        SkipScope::BlockPackage => {
            if target_link.default_plugin().is_none() {
                return false;
            }
            let Some(current_link) = current_plugin.download_link() else {
                return false;
            };
            let package = current_link.file_package();
            !package.is_default() && Arc::ptr_eq(package, target_link.file_package())
        }
    }
}

fn link_crawl_skippable(
    current_plugin: &CrawlPlugin,
    target: &dyn AnyChallenge,
    scope: SkipScope,
) -> bool {
    let Some(Plugin::LinkCrawl(target_plugin)) = target.plugin() else {
        return false;
    };
    if current_plugin.crawl_session() != target_plugin.crawl_session() {
        return false;
    }

    match scope {
        SkipScope::StopCurrentAction | SkipScope::BlockAllCaptchas => true,
        SkipScope::BlockHoster => current_plugin.host() == target_plugin.host(),
        SkipScope::BlockPackage => {
            match (current_plugin.current_link(), target_plugin.current_link()) {
                (Some(current_link), Some(target_link)) => {
                    Arc::ptr_eq(&current_link.origin_link(), &target_link.origin_link())
                }
                _ => false,
            }
        }
    }
}

//! Resolve contextual keys from a challenge's owning plugin.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::{AnyChallenge, DomainInfo, DownloadLink, Plugin};

/// Host of the owning plugin.
pub fn host(challenge: &dyn AnyChallenge) -> Option<&str> {
    challenge.plugin().map(Plugin::host)
}

/// Download link of a file-download plugin; `None` for crawl plugins and
/// challenges without provenance.
pub fn download_link(challenge: &dyn AnyChallenge) -> Option<&Arc<DownloadLink>> {
    match challenge.plugin()? {
        Plugin::FileDownload(plugin) => plugin.download_link(),
        Plugin::LinkCrawl(_) => None,
    }
}

/// Domain metadata for display and grouping: the bound link's first, the
/// plugin host's otherwise.
///
/// # Errors
///
/// [`Error::MissingProvenance`] when the challenge has no plugin at all, and
/// [`Error::DomainInfoUnavailable`] when a plugin is bound but neither source
/// resolves.
pub fn domain_info(challenge: &dyn AnyChallenge) -> Result<DomainInfo> {
    let plugin = challenge
        .plugin()
        .ok_or(Error::MissingProvenance(challenge.id()))?;

    download_link(challenge)
        .and_then(|link| link.domain_info())
        .or_else(|| DomainInfo::for_host(plugin.host()))
        .ok_or_else(|| Error::DomainInfoUnavailable {
            id: challenge.id(),
            host: plugin.host().to_string(),
        })
}

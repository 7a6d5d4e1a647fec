//! Provenance of a challenge: the plugin that raised it and the links,
//! packages and crawl sessions hanging off that plugin.
//!
//! Links and packages are shared between plugins and compared by identity
//! (`Arc::ptr_eq`), never by value. Two packages with the same name are
//! still different groupings.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

/// Which side of the platform a plugin belongs to. The two kinds never
/// cross-match during skip correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    FileDownload,
    LinkCrawl,
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PluginKind::FileDownload => "file_download",
            PluginKind::LinkCrawl => "link_crawl",
        };
        write!(f, "{s}")
    }
}

/// The plugin instance that owns a challenge.
#[derive(Debug, Clone)]
pub enum Plugin {
    FileDownload(HostPlugin),
    LinkCrawl(CrawlPlugin),
}

impl Plugin {
    pub fn host(&self) -> &str {
        match self {
            Plugin::FileDownload(p) => &p.host,
            Plugin::LinkCrawl(p) => &p.host,
        }
    }

    pub fn kind(&self) -> PluginKind {
        match self {
            Plugin::FileDownload(_) => PluginKind::FileDownload,
            Plugin::LinkCrawl(_) => PluginKind::LinkCrawl,
        }
    }
}

impl From<HostPlugin> for Plugin {
    fn from(plugin: HostPlugin) -> Self {
        Plugin::FileDownload(plugin)
    }
}

impl From<CrawlPlugin> for Plugin {
    fn from(plugin: CrawlPlugin) -> Self {
        Plugin::LinkCrawl(plugin)
    }
}

/// A file-download plugin working on one download link.
#[derive(Debug, Clone)]
pub struct HostPlugin {
    host: String,
    download_link: Option<Arc<DownloadLink>>,
}

impl HostPlugin {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            download_link: None,
        }
    }

    pub fn with_link(mut self, link: Arc<DownloadLink>) -> Self {
        self.download_link = Some(link);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn download_link(&self) -> Option<&Arc<DownloadLink>> {
        self.download_link.as_ref()
    }
}

/// A link-crawl (decrypt) plugin running inside one crawl session.
#[derive(Debug, Clone)]
pub struct CrawlPlugin {
    host: String,
    session: CrawlSessionId,
    current_link: Option<Arc<CrawledLink>>,
}

impl CrawlPlugin {
    pub fn new(host: impl Into<String>, session: CrawlSessionId) -> Self {
        Self {
            host: host.into(),
            session,
            current_link: None,
        }
    }

    pub fn with_link(mut self, link: Arc<CrawledLink>) -> Self {
        self.current_link = Some(link);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn crawl_session(&self) -> CrawlSessionId {
        self.session
    }

    pub fn current_link(&self) -> Option<&Arc<CrawledLink>> {
        self.current_link.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Crawl sessions and crawled links
// ---------------------------------------------------------------------------

/// Identity of one crawler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CrawlSessionId(pub Uuid);

impl CrawlSessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CrawlSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CrawlSessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// A link visited during a crawl. Children keep their source link so the
/// link that started a branch can be recovered.
#[derive(Debug)]
pub struct CrawledLink {
    url: String,
    source: Option<Arc<CrawledLink>>,
}

impl CrawledLink {
    /// A link handed to the crawler directly.
    pub fn root(url: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            url: url.into(),
            source: None,
        })
    }

    /// A link discovered while crawling `parent`.
    pub fn child(parent: &Arc<Self>, url: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            url: url.into(),
            source: Some(Arc::clone(parent)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The root ancestor of this link, or the link itself when it has none.
    pub fn origin_link(self: &Arc<Self>) -> Arc<Self> {
        let mut link = Arc::clone(self);
        while let Some(source) = link.source.clone() {
            link = source;
        }
        link
    }
}

// ---------------------------------------------------------------------------
// Packages and download links
// ---------------------------------------------------------------------------

/// A user-visible grouping of download links.
#[derive(Debug)]
pub struct FilePackage {
    name: String,
    is_default: bool,
}

static DEFAULT_PACKAGE: OnceLock<Arc<FilePackage>> = OnceLock::new();

impl FilePackage {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            is_default: false,
        })
    }

    /// The implicit package holding every ungrouped link.
    pub fn default_package() -> Arc<Self> {
        Arc::clone(DEFAULT_PACKAGE.get_or_init(|| {
            Arc::new(Self {
                name: "ungrouped".to_string(),
                is_default: true,
            })
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }
}

/// A remote file queued for download.
#[derive(Debug)]
pub struct DownloadLink {
    url: String,
    file_package: Arc<FilePackage>,
    default_plugin: Option<String>,
    domain_info: Option<DomainInfo>,
}

impl DownloadLink {
    pub fn new(url: impl Into<String>, file_package: Arc<FilePackage>) -> Self {
        Self {
            url: url.into(),
            file_package,
            default_plugin: None,
            domain_info: None,
        }
    }

    /// Bind the link to the host plugin that normally handles it.
    pub fn with_default_plugin(mut self, host: impl Into<String>) -> Self {
        self.default_plugin = Some(host.into());
        self
    }

    pub fn with_domain_info(mut self, info: DomainInfo) -> Self {
        self.domain_info = Some(info);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn file_package(&self) -> &Arc<FilePackage> {
        &self.file_package
    }

    pub fn default_plugin(&self) -> Option<&str> {
        self.default_plugin.as_deref()
    }

    /// Explicit domain info, else the one derived from the default plugin.
    pub fn domain_info(&self) -> Option<DomainInfo> {
        self.domain_info
            .clone()
            .or_else(|| self.default_plugin.as_deref().and_then(DomainInfo::for_host))
    }
}

// ---------------------------------------------------------------------------
// Domain info
// ---------------------------------------------------------------------------

/// Display metadata for a host: the host itself and its registrable domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainInfo {
    pub host: String,
    pub domain: String,
}

impl DomainInfo {
    /// Derive domain info from a host name. Returns `None` for anything that
    /// does not look like a dotted host.
    pub fn for_host(host: &str) -> Option<Self> {
        let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() || host.contains(['/', ' ', ':']) {
            return None;
        }
        let labels: Vec<&str> = host.split('.').collect();
        if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
            return None;
        }
        let domain = labels[labels.len() - 2..].join(".");
        Some(Self { host, domain })
    }
}

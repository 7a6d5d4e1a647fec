//! Scenario files: a TOML description of plugins, links and challenges used
//! to replay skip decisions offline.
//!
//! ```toml
//! [[download_links]]
//! name = "movie-1"
//! url = "https://alpha.example/f/1"
//! package = "movies"            # omitted: the default package
//! default_plugin = "alpha.example"
//!
//! [[crawled_links]]
//! name = "folder"
//! url = "https://folder.example/f/9"
//!
//! [[challenges]]
//! name = "c1"
//! kind = "text"
//! role = "download_worker"
//! plugin = { type = "file_download", host = "alpha.example", link = "movie-1" }
//! ```
//!
//! Packages and crawl sessions are created on first mention and shared by
//! name. Crawled links must be declared after their parent.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::*;
use crate::registry::{Registry, SubmitResult};

/// Image size assumed for click challenges in scenario files.
const SCENARIO_CLICK_SIZE: u32 = 300;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioFile {
    #[serde(default)]
    crawled_links: Vec<CrawledLinkSpec>,
    #[serde(default)]
    download_links: Vec<DownloadLinkSpec>,
    #[serde(default)]
    challenges: Vec<ChallengeSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CrawledLinkSpec {
    name: String,
    url: String,
    parent: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DownloadLinkSpec {
    name: String,
    url: String,
    package: Option<String>,
    default_plugin: Option<String>,
    domain: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChallengeSpec {
    name: String,
    #[serde(default = "default_kind")]
    kind: ResultType,
    #[serde(default = "default_role")]
    role: CreatorRole,
    #[serde(default)]
    account_login: bool,
    timeout_ms: Option<i64>,
    plugin: Option<PluginSpec>,
}

fn default_kind() -> ResultType {
    ResultType::Text
}

fn default_role() -> CreatorRole {
    CreatorRole::Other
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
enum PluginSpec {
    FileDownload {
        host: String,
        link: Option<String>,
    },
    LinkCrawl {
        host: String,
        session: String,
        link: Option<String>,
    },
}

/// A challenge and the name it was given in the scenario file.
#[derive(Debug)]
pub struct NamedChallenge {
    pub name: String,
    pub challenge: Box<dyn AnyChallenge>,
}

/// A loaded scenario, challenges in file order.
#[derive(Debug)]
pub struct Scenario {
    challenges: Vec<NamedChallenge>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| Error::Scenario(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: ScenarioFile =
            toml::from_str(content).map_err(|e| Error::Scenario(e.to_string()))?;
        Builder::default().build(file)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.challenges.iter().map(|c| c.name.as_str())
    }

    pub fn challenge(&self, name: &str) -> Result<&dyn AnyChallenge> {
        self.challenges
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.challenge.as_ref())
            .ok_or_else(|| Error::Scenario(format!("unknown challenge {name:?}")))
    }

    /// Submit every challenge to `registry` in file order. Returns the name
    /// and submit result of each.
    pub fn submit_all(self, registry: &mut Registry) -> Result<Vec<(String, SubmitResult)>> {
        let mut results = Vec::with_capacity(self.challenges.len());
        for c in self.challenges {
            let result = registry.submit(c.challenge)?;
            results.push((c.name, result));
        }
        Ok(results)
    }
}

#[derive(Default)]
struct Builder {
    packages: HashMap<String, Arc<FilePackage>>,
    sessions: HashMap<String, CrawlSessionId>,
    crawled: HashMap<String, Arc<CrawledLink>>,
    downloads: HashMap<String, Arc<DownloadLink>>,
}

impl Builder {
    fn build(mut self, file: ScenarioFile) -> Result<Scenario> {
        for spec in file.crawled_links {
            let link = match &spec.parent {
                Some(parent) => {
                    CrawledLink::child(lookup(&self.crawled, parent, "crawled link")?, spec.url)
                }
                None => CrawledLink::root(spec.url),
            };
            self.insert_unique_crawled(spec.name, link)?;
        }

        for spec in file.download_links {
            let package = match spec.package {
                Some(name) => Arc::clone(
                    self.packages
                        .entry(name)
                        .or_insert_with_key(|name| FilePackage::new(name.clone())),
                ),
                None => FilePackage::default_package(),
            };
            let mut link = DownloadLink::new(spec.url, package);
            if let Some(host) = spec.default_plugin {
                link = link.with_default_plugin(host);
            }
            if let Some(domain) = spec.domain {
                let info = DomainInfo::for_host(&domain)
                    .ok_or_else(|| Error::Scenario(format!("invalid domain {domain:?}")))?;
                link = link.with_domain_info(info);
            }
            if self.downloads.contains_key(&spec.name) {
                return Err(Error::Scenario(format!(
                    "duplicate download link {:?}",
                    spec.name
                )));
            }
            self.downloads.insert(spec.name, Arc::new(link));
        }

        let mut challenges = Vec::with_capacity(file.challenges.len());
        for spec in file.challenges {
            if challenges.iter().any(|c: &NamedChallenge| c.name == spec.name) {
                return Err(Error::Scenario(format!(
                    "duplicate challenge {:?}",
                    spec.name
                )));
            }
            let plugin = spec.plugin.map(|p| self.plugin(p)).transpose()?;
            let challenge = build_challenge(
                spec.kind,
                spec.role,
                plugin,
                spec.account_login,
                spec.timeout_ms,
            );
            challenges.push(NamedChallenge {
                name: spec.name,
                challenge,
            });
        }

        Ok(Scenario { challenges })
    }

    fn insert_unique_crawled(&mut self, name: String, link: Arc<CrawledLink>) -> Result<()> {
        if self.crawled.contains_key(&name) {
            return Err(Error::Scenario(format!("duplicate crawled link {name:?}")));
        }
        self.crawled.insert(name, link);
        Ok(())
    }

    fn plugin(&mut self, spec: PluginSpec) -> Result<Plugin> {
        Ok(match spec {
            PluginSpec::FileDownload { host, link } => {
                let mut plugin = HostPlugin::new(host);
                if let Some(name) = link {
                    let link = lookup(&self.downloads, &name, "download link")?;
                    plugin = plugin.with_link(Arc::clone(link));
                }
                plugin.into()
            }
            PluginSpec::LinkCrawl {
                host,
                session,
                link,
            } => {
                let session = *self.sessions.entry(session).or_default();
                let mut plugin = CrawlPlugin::new(host, session);
                if let Some(name) = link {
                    let link = lookup(&self.crawled, &name, "crawled link")?;
                    plugin = plugin.with_link(Arc::clone(link));
                }
                plugin.into()
            }
        })
    }
}

fn lookup<'a, V>(map: &'a HashMap<String, V>, name: &str, what: &str) -> Result<&'a V> {
    map.get(name)
        .ok_or_else(|| Error::Scenario(format!("unknown {what} {name:?}")))
}

fn build_challenge(
    kind: ResultType,
    role: CreatorRole,
    plugin: Option<Plugin>,
    account_login: bool,
    timeout_ms: Option<i64>,
) -> Box<dyn AnyChallenge> {
    let timeout = timeout_ms.unwrap_or(NO_TIMEOUT);
    match kind {
        ResultType::Text => Box::new(
            Challenge::<String>::new(TextCaptcha::default(), "text", "", role, plugin)
                .with_account_login(account_login)
                .with_timeout(timeout),
        ),
        ResultType::Click => Box::new(
            Challenge::<ClickPoint>::new(
                ClickCaptcha {
                    width: SCENARIO_CLICK_SIZE,
                    height: SCENARIO_CLICK_SIZE,
                },
                "click",
                "",
                role,
                plugin,
            )
            .with_account_login(account_login)
            .with_timeout(timeout),
        ),
        ResultType::Confirm => Box::new(
            Challenge::<bool>::new(ConfirmChallenge, "confirm", "", role, plugin)
                .with_account_login(account_login)
                .with_timeout(timeout),
        ),
    }
}

//! Minimal robots.txt handling, cached per host.
//!
//! Only the `User-agent: *` group is honoured and only `Disallow` prefix
//! rules are applied. Fetch failures, timeouts, and non-200 responses fail
//! open: the host is treated as fully allowed.
//!
//! The rules map is only locked for lookups and inserts; the robots.txt
//! fetch itself runs outside the lock so one unresponsive host cannot stall
//! checks for any other host.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use url::Url;

use super::fetch::PageFetcher;

#[derive(Debug, Clone, Default)]
struct HostRules {
    disallow: Vec<String>,
}

impl HostRules {
    fn allows(&self, path: &str) -> bool {
        !self
            .disallow
            .iter()
            .any(|prefix| !prefix.is_empty() && path.starts_with(prefix.as_str()))
    }
}

/// Parse the `User-agent: *` group of a robots.txt body into disallow
/// prefixes. Unknown directives and other agent groups are ignored.
fn parse_rules(body: &str) -> HostRules {
    let mut rules = HostRules::default();
    let mut in_wildcard_group = false;

    for line in body.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((directive, value)) = line.split_once(':') else {
            continue;
        };
        let directive = directive.trim().to_lowercase();
        let value = value.trim();

        match directive.as_str() {
            "user-agent" => in_wildcard_group = value == "*",
            "disallow" if in_wildcard_group => {
                if !value.is_empty() {
                    rules.disallow.push(value.to_owned());
                }
            }
            _ => {}
        }
    }

    rules
}

/// The robots.txt location for a target URL, on the same scheme and port.
fn robots_url_for(target: &Url) -> Url {
    let mut robots = target.clone();
    robots.set_path("/robots.txt");
    robots.set_query(None);
    robots.set_fragment(None);
    robots
}

/// Per-host robots.txt cache.
pub struct RobotsCache {
    fetcher: Arc<dyn PageFetcher>,
    fetch_timeout: Duration,
    hosts: Mutex<HashMap<String, HostRules>>,
}

impl RobotsCache {
    pub fn new(fetcher: Arc<dyn PageFetcher>, fetch_timeout: Duration) -> Self {
        Self {
            fetcher,
            fetch_timeout,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `url` may be scraped. Anything short of a parsed 200
    /// response within the fetch deadline allows everything.
    ///
    /// Concurrent first checks against the same host may each fetch its
    /// robots.txt; the first inserted ruleset wins and later checks reuse
    /// it.
    pub async fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return true;
        };
        let Some(host) = parsed.host_str() else {
            return true;
        };
        let host = host.to_lowercase();
        let path = parsed.path().to_owned();

        {
            let hosts = self.hosts.lock().await;
            if let Some(rules) = hosts.get(&host) {
                return rules.allows(&path);
            }
        }

        let robots_url = robots_url_for(&parsed);
        let fetched = tokio::time::timeout(
            self.fetch_timeout,
            self.fetcher.fetch(robots_url.as_str()),
        )
        .await;
        let rules = match fetched {
            Ok(Ok(page)) if page.status == 200 => parse_rules(&page.body),
            Ok(Ok(page)) => {
                tracing::debug!(host, status = page.status, "robots.txt unavailable, allowing");
                HostRules::default()
            }
            Ok(Err(err)) => {
                tracing::debug!(host, error = %err, "robots.txt fetch failed, allowing");
                HostRules::default()
            }
            Err(_) => {
                tracing::debug!(host, "robots.txt fetch timed out, allowing");
                HostRules::default()
            }
        };

        let mut hosts = self.hosts.lock().await;
        let rules = hosts.entry(host).or_insert(rules);
        rules.allows(&path)
    }
}

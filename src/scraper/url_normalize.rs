//! Scrape-target URL canonicalisation.
//!
//! Two URLs that fetch the same page should map to the same key: fragments
//! and tracking parameters are dropped, default ports elided, query pairs
//! sorted, and the trailing path slash trimmed.

use url::Url;

/// Tracking parameters dropped alongside the whole `utm_` family.
const DROPPED_PARAMS: &[&str] = &[
    "fbclid", "gclid", "msclkid", "mc_cid", "mc_eid", "ref", "si", "feature",
];

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_lowercase();
    key.starts_with("utm_") || DROPPED_PARAMS.contains(&key.as_str())
}

/// Canonical form of `raw` for deduplication. The `url` crate already
/// lowercases scheme and host on parse; unparsable input comes back
/// untouched.
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_owned();
    };

    url.set_fragment(None);
    strip_default_port(&mut url);
    rebuild_query(&mut url);
    trim_trailing_slash(&mut url);
    url.into()
}

/// Lowercased host of `raw`, when it parses and has one.
pub fn host_of(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    Some(url.host_str()?.to_lowercase())
}

fn strip_default_port(url: &mut Url) {
    let default = match url.scheme() {
        "http" => 80,
        "https" => 443,
        _ => return,
    };
    if url.port() == Some(default) {
        let _ = url.set_port(None);
    }
}

/// Drop tracking parameters and order the survivors, keys first with the
/// value as a tiebreak.
fn rebuild_query(url: &mut Url) {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if pairs.is_empty() {
        url.set_query(None);
        return;
    }

    pairs.sort();
    let query = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    url.set_query(Some(&query));
}

fn trim_trailing_slash(url: &mut Url) {
    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_owned();
        url.set_path(&trimmed);
    }
}

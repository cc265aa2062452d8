//! Canonical identity resolution.
//!
//! A story is identified, in strict priority order, by:
//!
//! 1. **GitHub repository** - `github:<owner>/<repo>` for any URL under a repo.
//! 2. **CVE** - `cve:<CVE-YYYY-NNNN>` for the first CVE id found in URL + text.
//! 3. **Canonical URL** - https, lowercased host, no fragment, tracking
//!    parameters removed and the rest sorted.
//!
//! Resolution never fails. A URL that cannot be canonicalized is used as is.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Query parameters that only carry attribution and never change the target.
const TRACKING_PARAMS: &[&str] = &["ref", "source", "fbclid", "gclid", "mc_cid", "mc_eid"];

static GITHUB_REPO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^https?://(?:www\.)?github\.com/([^/]+)/([^/]+)")
        .expect("compile github repo pattern")
});

static CVE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)CVE-\d{4}-\d{4,}")
        .expect("compile cve pattern")
});

/// Deduplication key of a story.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalIdentity(String);

/// Which rule produced an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    GithubRepo,
    Cve,
    Url,
}

impl CanonicalIdentity {
    /// Resolve the identity of an item from its URL and free text.
    #[must_use]
    pub fn resolve(url: &str, text: &str) -> Self {
        if let Some(repo) = extract_github_repo(url) {
            return Self(format!("github:{repo}"));
        }
        if let Some(cve) = extract_cve(&format!("{url} {text}")) {
            return Self(format!("cve:{cve}"));
        }
        Self(canonicalize_url(url))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn kind(&self) -> IdentityKind {
        if self.0.starts_with("github:") {
            IdentityKind::GithubRepo
        } else if self.0.starts_with("cve:") {
            IdentityKind::Cve
        } else {
            IdentityKind::Url
        }
    }
}

impl fmt::Display for CanonicalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CanonicalIdentity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CanonicalIdentity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for CanonicalIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

/// Canonicalize a URL for clustering.
///
/// Non-http(s) or unparsable input is returned unchanged.
#[must_use]
pub fn canonicalize_url(raw: &str) -> String {
    let Ok(parsed) = Url::parse(raw.trim()) else {
        return raw.to_string();
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return raw.to_string();
    }
    let Some(host) = parsed.host_str() else {
        return raw.to_string();
    };

    let mut canonical = format!("https://{}", host.to_lowercase());
    if let Some(port) = parsed.port() {
        canonical.push(':');
        canonical.push_str(&port.to_string());
    }

    let path = parsed.path().trim_end_matches('/');
    canonical.push_str(if path.is_empty() { "/" } else { path });

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, value)| !value.is_empty() && !is_tracking_param(key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if !params.is_empty() {
        params.sort();
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        canonical.push('?');
        canonical.push_str(&query);
    }

    canonical
}

/// `owner/repo` of any GitHub URL scoped to a repository.
#[must_use]
pub fn extract_github_repo(url: &str) -> Option<String> {
    let captures = GITHUB_REPO_RE.captures(url.trim())?;
    let owner = captures.get(1)?.as_str();
    let repo = captures.get(2)?.as_str();
    let repo = repo
        .split(".git")
        .next()
        .and_then(|r| r.split(['?', '#']).next())
        .unwrap_or_default();
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some(format!("{owner}/{repo}"))
}

/// First CVE id in `text`, uppercased.
#[must_use]
pub fn extract_cve(text: &str) -> Option<String> {
    CVE_RE.find(text).map(|m| m.as_str().to_uppercase())
}

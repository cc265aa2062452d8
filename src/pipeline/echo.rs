//! Cross-platform echo index.
//!
//! Maps each identity to the distinct social accounts that posted about it in
//! the trailing window. Built once per run in `O(n)`, queried in `O(1)`.

use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet};

use super::identity::CanonicalIdentity;
use crate::model::ContentItem;
use crate::util::time::cutoff_hours;

#[derive(Debug, Clone, Default)]
pub struct EchoIndex {
    authors: FxHashMap<CanonicalIdentity, FxHashSet<String>>,
}

impl EchoIndex {
    /// Index social items published within `window_hours` of `now`.
    ///
    /// Non-social sources and items without an author are ignored.
    #[must_use]
    pub fn build(social_items: &[ContentItem], now: DateTime<Utc>, window_hours: u32) -> Self {
        let cutoff = cutoff_hours(now, window_hours);
        let mut authors: FxHashMap<CanonicalIdentity, FxHashSet<String>> = FxHashMap::default();

        for item in social_items {
            if !item.source.is_social() || item.published_at < cutoff {
                continue;
            }
            let Some(author) = item.author.as_deref().map(str::trim).filter(|a| !a.is_empty())
            else {
                continue;
            };
            let identity = CanonicalIdentity::resolve(&item.url, item.text_or_empty());
            authors
                .entry(identity)
                .or_default()
                .insert(author.to_string());
        }

        Self { authors }
    }

    /// Number of distinct authors that mentioned `identity`.
    #[must_use]
    pub fn echo_count(&self, identity: &CanonicalIdentity) -> usize {
        self.authors.get(identity).map_or(0, FxHashSet::len)
    }

    /// Number of identities with at least one mention.
    #[must_use]
    pub fn len(&self) -> usize {
        self.authors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
    }
}

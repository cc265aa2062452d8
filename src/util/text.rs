//! Keyword matching over item text.
//!
//! Practical-boost keywords and politics keywords are both plain substring
//! lists matched case-insensitively, so they share one Aho-Corasick automaton.
//! Keywords and text are both Unicode-lowercased before matching.
use aho_corasick::{AhoCorasick, AhoCorasickBuilder, BuildError, MatchKind};

/// Case-insensitive multi-keyword substring matcher.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    automaton: Option<AhoCorasick>,
    keywords: Vec<String>,
}

impl KeywordMatcher {
    /// Compile a matcher. Blank keywords are dropped since they would match everything.
    ///
    /// # Errors
    /// Returns the automaton build error when the keyword set is too large.
    pub fn new<I, S>(keywords: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|keyword| keyword.as_ref().trim().to_string())
            .filter(|keyword| !keyword.is_empty())
            .collect();

        if keywords.is_empty() {
            return Ok(Self {
                automaton: None,
                keywords,
            });
        }

        let automaton = AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostFirst)
            .build(keywords.iter().map(|keyword| keyword.to_lowercase()))?;

        Ok(Self {
            automaton: Some(automaton),
            keywords,
        })
    }

    /// A matcher that never matches.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            automaton: None,
            keywords: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.automaton
            .as_ref()
            .is_some_and(|automaton| automaton.is_match(&text.to_lowercase()))
    }

    /// The first keyword found in `text`, if any.
    #[must_use]
    pub fn find(&self, text: &str) -> Option<&str> {
        let automaton = self.automaton.as_ref()?;
        let found = automaton.find(&text.to_lowercase())?;
        self.keywords
            .get(found.pattern().as_usize())
            .map(String::as_str)
    }

    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

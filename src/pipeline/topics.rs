//! Topic detection from canonical identities.

use serde::{Deserialize, Serialize};

use super::identity::{CanonicalIdentity, IdentityKind};

const SECURITY_KEYWORDS: &[&str] = &["security", "cve", "exploit", "vulnerability"];
const AI_KEYWORDS: &[&str] = &["openai", "anthropic", "llm", "gpt", "claude"];

/// Topic of a ranked cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// Viral story, regardless of subject.
    Sauce,
    Security,
    Oss,
    Ai,
    Dev,
}

/// Topic as persisted with a published cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DominantTopic {
    Sauce,
    Security,
    Oss,
    Dev,
}

impl Topic {
    #[must_use]
    pub fn detect(identity: &CanonicalIdentity, is_viral: bool) -> Self {
        if is_viral {
            return Topic::Sauce;
        }

        let lowered = identity.as_str().to_lowercase();
        let mentions = |keywords: &[&str]| keywords.iter().any(|kw| lowered.contains(kw));

        match identity.kind() {
            IdentityKind::Cve => Topic::Security,
            _ if mentions(SECURITY_KEYWORDS) => Topic::Security,
            IdentityKind::GithubRepo => Topic::Oss,
            _ if mentions(AI_KEYWORDS) => Topic::Ai,
            _ => Topic::Dev,
        }
    }

    /// AI stories are persisted as dev.
    #[must_use]
    pub fn dominant(self) -> DominantTopic {
        match self {
            Topic::Sauce => DominantTopic::Sauce,
            Topic::Security => DominantTopic::Security,
            Topic::Oss => DominantTopic::Oss,
            Topic::Ai | Topic::Dev => DominantTopic::Dev,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Sauce => "sauce",
            Topic::Security => "security",
            Topic::Oss => "oss",
            Topic::Ai => "ai",
            Topic::Dev => "dev",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("cve:CVE-2024-1234", false, Topic::Security)]
    #[case("https://example.com/exploit-chain", false, Topic::Security)]
    #[case("github:acme/security-scanner", false, Topic::Security)]
    #[case("github:tokio-rs/tokio", false, Topic::Oss)]
    #[case("github:openai/whisper", false, Topic::Oss)]
    #[case("https://blog.example.com/llm-inference", false, Topic::Ai)]
    #[case("https://example.com/rust-2024", false, Topic::Dev)]
    #[case("cve:CVE-2024-1234", true, Topic::Sauce)]
    fn detects_topic(#[case] identity: &str, #[case] viral: bool, #[case] expected: Topic) {
        assert_eq!(Topic::detect(&CanonicalIdentity::from(identity), viral), expected);
    }

    #[test]
    fn ai_persists_as_dev() {
        assert_eq!(Topic::Ai.dominant(), DominantTopic::Dev);
        assert_eq!(Topic::Oss.dominant(), DominantTopic::Oss);
    }
}

use std::collections::BTreeSet;

/// Keywords used when no profile is configured.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "bear", "queer", "gay", "lgbtq", "pride", "drag", "rainbow", "daddy", "cub", "woof", "otter",
    "pup", "leather", "muscle", "beefy", "chub", "hunk", "wolf", "bara", "stud",
];

/// Keyword interest profile. An account is ICP-aligned when any keyword
/// appears, case-insensitively, in `"{username} {full_name}"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    // Lowercased, non-blank, deduplicated.
    keywords: Vec<String>,
}

impl Classifier {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: BTreeSet<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            keywords: keywords.into_iter().collect(),
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn is_icp_aligned(&self, username: &str, full_name: &str) -> bool {
        if self.keywords.is_empty() {
            return false;
        }
        let text = format!("{username} {full_name}").to_lowercase();
        self.keywords.iter().any(|kw| text.contains(kw.as_str()))
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS)
    }
}

/// One-shot form of [`Classifier::is_icp_aligned`].
pub fn classify(username: &str, full_name: &str, keywords: &BTreeSet<String>) -> bool {
    Classifier::new(keywords).is_icp_aligned(username, full_name)
}

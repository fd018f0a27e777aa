//! Deterministic pre-checks that run before the backend is asked anything.
//!
//! - [`ScopeGuard`] catches obviously personal questions and routes them
//!   straight to the refusal template.
//! - [`ToneLint`] catches casual phrasing in a draft and fails it without an
//!   evaluation call.
//!
//! Both match whole words, case-insensitively. Anything they miss is left to
//! the backend prompts.

/// Phrase matcher over word boundaries.
#[derive(Debug, Clone)]
struct PhraseSet {
    phrases: Vec<String>,
}

impl PhraseSet {
    fn new(phrases: &[String]) -> Self {
        Self {
            phrases: phrases
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Every phrase that occurs in `text`, in configuration order.
    fn find_all(&self, text: &str) -> Vec<&str> {
        let haystack = text.to_lowercase();
        self.phrases
            .iter()
            .filter(|p| contains_word(&haystack, p))
            .map(String::as_str)
            .collect()
    }
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

/// Decides whether a question is plainly outside professional scope.
#[derive(Debug, Clone)]
pub struct ScopeGuard {
    topics: PhraseSet,
}

impl ScopeGuard {
    pub fn new(personal_topics: &[String]) -> Self {
        Self {
            topics: PhraseSet::new(personal_topics),
        }
    }

    /// The first personal topic the question touches, if any.
    pub fn out_of_scope<'a>(&'a self, question: &str) -> Option<&'a str> {
        self.topics.find_all(question).into_iter().next()
    }
}

/// Flags casual register in a draft.
#[derive(Debug, Clone)]
pub struct ToneLint {
    markers: PhraseSet,
}

impl ToneLint {
    pub fn new(casual_markers: &[String]) -> Self {
        Self {
            markers: PhraseSet::new(casual_markers),
        }
    }

    pub fn violations<'a>(&'a self, draft: &str) -> Vec<&'a str> {
        self.markers.find_all(draft)
    }
}

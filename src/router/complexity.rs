use serde::{Deserialize, Serialize};
use std::fmt;

const FACTUAL_KEYWORDS: [&str; 5] = ["what is", "who is", "when did", "define", "meaning"];
const REASONING_KEYWORDS: [&str; 5] = ["explain", "analyze", "compare", "evaluate", "design"];

const SHORT_PROMPT_TOKENS: usize = 50;
const LONG_PROMPT_TOKENS: usize = 200;

/// Prompt complexity bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    /// Expected output length relative to the input
    pub fn output_multiplier(self) -> u64 {
        match self {
            Complexity::Simple => 1,
            Complexity::Moderate => 2,
            Complexity::Complex => 3,
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Complexity::Simple => write!(f, "simple"),
            Complexity::Moderate => write!(f, "moderate"),
            Complexity::Complex => write!(f, "complex"),
        }
    }
}

/// Whitespace token count, the estimate every routing heuristic uses
pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Keyword and length heuristic for prompt complexity.
///
/// Short factual questions are SIMPLE even if they also contain a reasoning keyword.
/// Anything over 200 tokens is COMPLEX. Otherwise a reasoning keyword makes it
/// COMPLEX and everything else is MODERATE.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexityClassifier;

impl ComplexityClassifier {
    pub fn classify(prompt: &str) -> Complexity {
        let tokens = token_count(prompt);
        let lowered = prompt.to_lowercase();

        if tokens < SHORT_PROMPT_TOKENS && contains_any(&lowered, &FACTUAL_KEYWORDS) {
            return Complexity::Simple;
        }

        if tokens > LONG_PROMPT_TOKENS {
            return Complexity::Complex;
        }

        if contains_any(&lowered, &REASONING_KEYWORDS) {
            return Complexity::Complex;
        }

        Complexity::Moderate
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

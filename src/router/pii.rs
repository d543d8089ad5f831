//! Pattern-based PII detection. Runs entirely in-process; nothing is sent anywhere.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiKind {
    Ssn,
    CreditCard,
    Email,
    Phone,
}

impl PiiKind {
    pub const ALL: [PiiKind; 4] = [
        PiiKind::Ssn,
        PiiKind::CreditCard,
        PiiKind::Email,
        PiiKind::Phone,
    ];

    fn pattern(self) -> &'static Regex {
        match self {
            PiiKind::Ssn => &SSN,
            PiiKind::CreditCard => &CREDIT_CARD,
            PiiKind::Email => &EMAIL,
            PiiKind::Phone => &PHONE,
        }
    }
}

impl fmt::Display for PiiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PiiKind::Ssn => "ssn",
            PiiKind::CreditCard => "credit_card",
            PiiKind::Email => "email",
            PiiKind::Phone => "phone",
        };
        write!(f, "{}", label)
    }
}

static SSN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("valid ssn pattern"));
static CREDIT_CARD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}\b").expect("valid credit card pattern")
});
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b").expect("valid email pattern")
});
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b").expect("valid phone pattern"));

/// Stateless PII scanner over a fixed pattern set
#[derive(Debug, Clone, Copy, Default)]
pub struct PiiScanner;

impl PiiScanner {
    /// True if any pattern matches at least once
    pub fn has_pii(text: &str) -> bool {
        PiiKind::ALL.iter().any(|kind| kind.pattern().is_match(text))
    }

    /// All literal matches per kind; kinds without matches are omitted
    pub fn detect(text: &str) -> BTreeMap<PiiKind, Vec<String>> {
        let mut found = BTreeMap::new();
        for kind in PiiKind::ALL {
            let matches: Vec<String> = kind
                .pattern()
                .find_iter(text)
                .map(|m| m.as_str().to_string())
                .collect();
            if !matches.is_empty() {
                found.insert(kind, matches);
            }
        }
        found
    }
}

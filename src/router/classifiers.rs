use crate::router::pii::PiiScanner;
use crate::router::policy::{Classification, Classifier, Request};

/// RESTRICTED when the prompt carries PII, PUBLIC otherwise
#[derive(Debug, Clone, Copy, Default)]
pub struct PrivacyClassifier;

impl Classifier for PrivacyClassifier {
    fn classify(&self, request: &Request) -> Classification {
        if PiiScanner::has_pii(&request.prompt) {
            Classification::restricted()
        } else {
            Classification::public()
        }
    }

    fn name(&self) -> &str {
        "privacy"
    }
}

/// Case-insensitive keyword match yielding a fixed classification
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    name: String,
    keywords: Vec<String>,
    on_match: Classification,
    otherwise: Classification,
}

impl KeywordClassifier {
    pub fn new<I, S>(keywords: I, on_match: impl Into<Classification>, otherwise: impl Into<Classification>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: "keyword".to_string(),
            keywords: keywords
                .into_iter()
                .map(|k| Into::<String>::into(k).to_lowercase())
                .collect(),
            on_match: on_match.into(),
            otherwise: otherwise.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, request: &Request) -> Classification {
        let prompt = request.prompt.to_lowercase();
        if self.keywords.iter().any(|k| prompt.contains(k.as_str())) {
            self.on_match.clone()
        } else {
            self.otherwise.clone()
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

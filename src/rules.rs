use crate::error::LoadError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk shape of the rule source. All three lists are required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSource {
    pub keywords: Vec<String>,
    #[serde(rename = "suspiciousTLDs")]
    pub suspicious_tlds: Vec<String>,
    #[serde(rename = "sensitiveData")]
    pub sensitive_data: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct KeywordRule {
    pub keyword: String,
    lowered: String,
    pattern: Regex,
    highlight: Regex,
}

impl KeywordRule {
    fn new(keyword: &str) -> Self {
        let escaped = regex::escape(keyword);
        let pattern = Regex::new(&format!(r"(?i)\b{escaped}\b"))
            .expect("escaped keyword is a valid pattern");
        let highlight =
            Regex::new(&format!("(?i){escaped}")).expect("escaped keyword is a valid pattern");
        Self {
            keyword: keyword.to_string(),
            lowered: keyword.to_lowercase(),
            pattern,
            highlight,
        }
    }

    /// Whole-word, case-insensitive match. `lowered_text` is the caller's
    /// lowercased copy of `text`, used as a cheap containment pre-filter.
    pub fn matches(&self, text: &str, lowered_text: &str) -> bool {
        lowered_text.contains(&self.lowered) && self.pattern.is_match(text)
    }

    /// Byte ranges of every case-insensitive occurrence, boundaries ignored.
    pub fn occurrences(&self, text: &str) -> Vec<std::ops::Range<usize>> {
        self.highlight.find_iter(text).map(|m| m.range()).collect()
    }
}

/// Immutable detection rules for one page session.
#[derive(Debug, Clone)]
pub struct RuleSet {
    keywords: Vec<KeywordRule>,
    suspicious_tlds: Vec<String>,
    sensitive_field_names: Vec<String>,
}

impl RuleSet {
    pub fn from_source(source: RuleSource) -> Self {
        let keywords = clean_entries("keywords", source.keywords)
            .iter()
            .map(|k| KeywordRule::new(k))
            .collect();
        let mut suspicious_tlds = clean_entries("suspiciousTLDs", source.suspicious_tlds);
        suspicious_tlds.dedup();
        let mut sensitive_field_names: Vec<String> =
            clean_entries("sensitiveData", source.sensitive_data)
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect();
        sensitive_field_names.dedup();

        Self {
            keywords,
            suspicious_tlds,
            sensitive_field_names,
        }
    }

    pub fn from_json(content: &str) -> Result<Self, LoadError> {
        let source: RuleSource = serde_json::from_str(content)?;
        Ok(Self::from_source(source))
    }

    pub fn from_yaml(content: &str) -> Result<Self, LoadError> {
        let source: RuleSource = serde_yaml::from_str(content)?;
        Ok(Self::from_source(source))
    }

    fn from_content(path: &Path, content: &str) -> Result<Self, LoadError> {
        let yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);
        let rules = if yaml {
            Self::from_yaml(content)?
        } else {
            Self::from_json(content)?
        };
        log::info!(
            "Loaded rule set from {}: {} keywords, {} suspicious TLDs, {} sensitive field names",
            path.display(),
            rules.keywords.len(),
            rules.suspicious_tlds.len(),
            rules.sensitive_field_names.len()
        );
        Ok(rules)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_content(path, &content)
    }

    pub async fn load_async(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_content(path, &content)
    }

    /// Seed rules written by `--generate-rules`.
    pub fn default_source() -> RuleSource {
        let strings = |items: &[&str]| -> Vec<String> { items.iter().map(|s| s.to_string()).collect() };
        RuleSource {
            keywords: strings(&[
                "verify your account",
                "account suspended",
                "urgent action required",
                "confirm your identity",
                "unusual activity",
                "update your payment",
                "your password has expired",
                "you have won",
                "claim your prize",
                "gift card",
                "wire transfer",
                "bitcoin",
                "limited time",
                "act now",
            ]),
            suspicious_tlds: strings(&[
                ".xyz", ".top", ".tk", ".ml", ".ga", ".cf", ".gq", ".buzz", ".zip", ".click",
            ]),
            sensitive_data: strings(&[
                "password", "passwd", "ssn", "social", "card", "cvv", "cvc", "pin", "routing",
                "account",
            ]),
        }
    }

    pub fn keywords(&self) -> &[KeywordRule] {
        &self.keywords
    }

    pub fn suspicious_tlds(&self) -> &[String] {
        &self.suspicious_tlds
    }

    pub fn sensitive_field_names(&self) -> &[String] {
        &self.sensitive_field_names
    }

    /// First suspicious TLD that occurs anywhere in `url`.
    pub fn matching_tld(&self, url: &str) -> Option<&str> {
        self.suspicious_tlds
            .iter()
            .find(|tld| url.contains(tld.as_str()))
            .map(|s| s.as_str())
    }

    /// First sensitive substring contained in the (lowercased) field name.
    pub fn matching_sensitive_name(&self, lowered_name: &str) -> Option<&str> {
        self.sensitive_field_names
            .iter()
            .find(|needle| lowered_name.contains(needle.as_str()))
            .map(|s| s.as_str())
    }
}

fn clean_entries(list: &str, entries: Vec<String>) -> Vec<String> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let trimmed = entry.trim();
            if trimmed.is_empty() {
                log::warn!("Dropping blank entry from {list}");
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

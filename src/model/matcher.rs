//! Label matchers
//!
//! A matcher set is an implicit AND; the order of matchers carries no meaning.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::labels::Labels;

/// Matcher operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchType {
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "=~")]
    Regex,
    #[serde(rename = "!~")]
    NotRegex,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Equal => "=",
            MatchType::NotEqual => "!=",
            MatchType::Regex => "=~",
            MatchType::NotRegex => "!~",
        }
    }
}

/// A predicate on a single label.
///
/// Regex patterns are fully anchored, so `job=~"api"` does not match `api-2`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "MatcherSpec", into = "MatcherSpec")]
pub struct Matcher {
    match_type: MatchType,
    name: String,
    value: String,
    re: Option<Regex>,
}

#[derive(Serialize, Deserialize)]
struct MatcherSpec {
    #[serde(rename = "type")]
    match_type: MatchType,
    name: String,
    value: String,
}

impl TryFrom<MatcherSpec> for Matcher {
    type Error = MatcherError;

    fn try_from(spec: MatcherSpec) -> Result<Self, Self::Error> {
        Matcher::new(spec.match_type, spec.name, spec.value)
    }
}

impl From<Matcher> for MatcherSpec {
    fn from(m: Matcher) -> Self {
        MatcherSpec {
            match_type: m.match_type,
            name: m.name,
            value: m.value,
        }
    }
}

impl Matcher {
    pub fn new(
        match_type: MatchType,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, MatcherError> {
        let name = name.into();
        let value = value.into();

        let re = match match_type {
            MatchType::Regex | MatchType::NotRegex => Some(
                Regex::new(&format!("^(?:{})$", value))
                    .map_err(|e| MatcherError::InvalidRegex(e.to_string()))?,
            ),
            _ => None,
        };

        Ok(Self {
            match_type,
            name,
            value,
            re,
        })
    }

    /// Shorthand for an equality matcher, which cannot fail
    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            match_type: MatchType::Equal,
            name: name.into(),
            value: value.into(),
            re: None,
        }
    }

    pub fn match_type(&self) -> MatchType {
        self.match_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Check a label value. A missing label is matched as the empty string.
    pub fn matches(&self, value: &str) -> bool {
        match (self.match_type, &self.re) {
            (MatchType::Equal, _) => self.value == value,
            (MatchType::NotEqual, _) => self.value != value,
            (MatchType::Regex, Some(re)) => re.is_match(value),
            (MatchType::NotRegex, Some(re)) => !re.is_match(value),
            _ => false,
        }
    }

    pub fn matches_labels(&self, labels: &Labels) -> bool {
        self.matches(labels.get(&self.name).unwrap_or(""))
    }
}

/// Check whether every matcher in the set accepts the labels
pub fn matches_all(matchers: &[Matcher], labels: &Labels) -> bool {
    matchers.iter().all(|m| m.matches_labels(labels))
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        self.match_type == other.match_type && self.name == other.name && self.value == other.value
    }
}

impl Eq for Matcher {}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{:?}", self.name, self.match_type.as_str(), self.value)
    }
}

impl FromStr for Matcher {
    type Err = MatcherError;

    /// Parse `name<op>value`, where the value may be double quoted
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let op_start = s
            .find(|c| c == '=' || c == '!')
            .ok_or_else(|| MatcherError::Syntax(s.to_string()))?;

        let name = s[..op_start].trim();
        if name.is_empty() {
            return Err(MatcherError::Syntax(s.to_string()));
        }

        let rest = &s[op_start..];
        let (match_type, value) = if let Some(v) = rest.strip_prefix("=~") {
            (MatchType::Regex, v)
        } else if let Some(v) = rest.strip_prefix("!~") {
            (MatchType::NotRegex, v)
        } else if let Some(v) = rest.strip_prefix("!=") {
            (MatchType::NotEqual, v)
        } else if let Some(v) = rest.strip_prefix('=') {
            (MatchType::Equal, v)
        } else {
            return Err(MatcherError::Syntax(s.to_string()));
        };

        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);

        Matcher::new(match_type, name, value)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatcherError {
    #[error("Invalid matcher syntax: {0}")]
    Syntax(String),

    #[error("Invalid regex: {0}")]
    InvalidRegex(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operators() {
        let m: Matcher = "job=\"api\"".parse().unwrap();
        assert_eq!(m.match_type(), MatchType::Equal);
        assert_eq!(m.name(), "job");
        assert_eq!(m.value(), "api");

        let m: Matcher = "job!=api".parse().unwrap();
        assert_eq!(m.match_type(), MatchType::NotEqual);

        let m: Matcher = "job=~\"api|web\"".parse().unwrap();
        assert_eq!(m.match_type(), MatchType::Regex);
        assert_eq!(m.value(), "api|web");

        let m: Matcher = "job!~web.*".parse().unwrap();
        assert_eq!(m.match_type(), MatchType::NotRegex);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!("job".parse::<Matcher>(), Err(MatcherError::Syntax(_))));
        assert!(matches!("=api".parse::<Matcher>(), Err(MatcherError::Syntax(_))));
        assert!(matches!(
            "job=~\"(\"".parse::<Matcher>(),
            Err(MatcherError::InvalidRegex(_))
        ));
    }

    #[test]
    fn test_regex_is_anchored() {
        let m = Matcher::new(MatchType::Regex, "job", "api").unwrap();
        assert!(m.matches("api"));
        assert!(!m.matches("api-2"));
        assert!(!m.matches("my-api"));

        let m = Matcher::new(MatchType::NotRegex, "job", "a.*").unwrap();
        assert!(!m.matches("api"));
        assert!(m.matches("web"));
    }

    #[test]
    fn test_missing_label_matches_empty() {
        let labels = Labels::from_pairs([("__name__", "up")]);

        assert!(Matcher::equal("job", "").matches_labels(&labels));
        assert!(!Matcher::equal("job", "api").matches_labels(&labels));
        assert!(matches_all(
            &[
                Matcher::equal("__name__", "up"),
                Matcher::new(MatchType::NotEqual, "job", "api").unwrap(),
            ],
            &labels
        ));
    }

    #[test]
    fn test_serde_recompiles_regex() {
        let m = Matcher::new(MatchType::Regex, "job", "a.+").unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"type":"=~","name":"job","value":"a.+"}"#);

        let back: Matcher = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
        assert!(back.matches("api"));
    }
}

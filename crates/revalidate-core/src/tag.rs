use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::event::ChangeEvent;

/// Logical name of a cached resource family on the presentation tier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InvalidationTag(String);

impl InvalidationTag {
    pub const USER_DATA: &'static str = "user-data";

    pub fn new(tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        Self::validate(&tag)?;
        Ok(Self(tag))
    }

    pub fn user_data() -> Self {
        Self(Self::USER_DATA.to_string())
    }

    fn validate(tag: &str) -> Result<()> {
        if tag.is_empty() {
            return Err(Error::InvalidTag("tag cannot be empty".to_string()));
        }
        if tag.len() > 256 {
            return Err(Error::InvalidTag("tag too long".to_string()));
        }
        if tag.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(Error::InvalidTag(
                "tag cannot contain whitespace".to_string(),
            ));
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvalidationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InvalidationTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for InvalidationTag {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<InvalidationTag> for String {
    fn from(tag: InvalidationTag) -> Self {
        tag.0
    }
}

impl AsRef<str> for InvalidationTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Routes cache keys starting with `prefix` to `tag`. Parsed from `prefix=tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRule {
    pub prefix: String,
    pub tag: InvalidationTag,
}

impl TagRule {
    pub fn new(prefix: impl Into<String>, tag: InvalidationTag) -> Result<Self> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(Error::InvalidTagRule("prefix cannot be empty".to_string()));
        }
        Ok(Self { prefix, tag })
    }

    pub fn matches(&self, cache_key: &str) -> bool {
        cache_key.starts_with(&self.prefix)
    }
}

impl FromStr for TagRule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (prefix, tag) = s
            .split_once('=')
            .ok_or_else(|| Error::InvalidTagRule(format!("expected prefix=tag, got '{}'", s)))?;
        let tag = InvalidationTag::new(tag.trim())
            .map_err(|e| Error::InvalidTagRule(format!("{}: {}", s, e)))?;
        Self::new(prefix.trim(), tag)
    }
}

/// Static cache-key to tag mapping. Rules are checked in order; keys that
/// match none fall back to the default tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMapping {
    rules: Vec<TagRule>,
    default_tag: InvalidationTag,
}

impl TagMapping {
    pub fn new(default_tag: InvalidationTag) -> Self {
        Self {
            rules: Vec::new(),
            default_tag,
        }
    }

    pub fn with_rule(mut self, rule: TagRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_rules(mut self, rules: impl IntoIterator<Item = TagRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn tag_for_key(&self, cache_key: &str) -> &InvalidationTag {
        self.rules
            .iter()
            .find(|rule| rule.matches(cache_key))
            .map(|rule| &rule.tag)
            .unwrap_or(&self.default_tag)
    }

    pub fn tag_for(&self, event: &ChangeEvent) -> &InvalidationTag {
        self.tag_for_key(event.cache_key())
    }

    pub fn default_tag(&self) -> &InvalidationTag {
        &self.default_tag
    }

    pub fn rules(&self) -> &[TagRule] {
        &self.rules
    }
}

impl Default for TagMapping {
    fn default() -> Self {
        Self::new(InvalidationTag::user_data())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_new() {
        let tag = InvalidationTag::new("user-data").unwrap();
        assert_eq!(tag.as_str(), "user-data");
        assert_eq!(tag, InvalidationTag::user_data());
    }

    #[test]
    fn test_tag_invalid() {
        assert!(InvalidationTag::new("").is_err());
        assert!(InvalidationTag::new("user data").is_err());
        assert!(InvalidationTag::new("x".repeat(257)).is_err());
    }

    #[test]
    fn test_tag_serde_transparent() {
        let tag = InvalidationTag::user_data();
        assert_eq!(serde_json::to_string(&tag).unwrap(), r#""user-data""#);

        let parsed: InvalidationTag = serde_json::from_str(r#""orders""#).unwrap();
        assert_eq!(parsed.as_str(), "orders");

        assert!(serde_json::from_str::<InvalidationTag>(r#""""#).is_err());
    }

    #[test]
    fn test_tag_rule_parse() {
        let rule: TagRule = "orders:=order-list".parse().unwrap();
        assert_eq!(rule.prefix, "orders:");
        assert_eq!(rule.tag.as_str(), "order-list");
        assert!(rule.matches("orders:17"));
        assert!(!rule.matches("usuario:17"));
    }

    #[test]
    fn test_tag_rule_parse_errors() {
        assert!(matches!(
            "no-separator".parse::<TagRule>(),
            Err(Error::InvalidTagRule(_))
        ));
        assert!("=tag".parse::<TagRule>().is_err());
        assert!("prefix=".parse::<TagRule>().is_err());
    }

    #[test]
    fn test_mapping_default() {
        let mapping = TagMapping::default();
        assert_eq!(mapping.tag_for_key("anything").as_str(), "user-data");
        assert!(mapping.rules().is_empty());
    }

    #[test]
    fn test_mapping_first_match_wins() {
        let mapping = TagMapping::default()
            .with_rule("orders:=orders".parse().unwrap())
            .with_rule("orders:archived=archive".parse().unwrap());

        assert_eq!(mapping.tag_for_key("orders:archived:1").as_str(), "orders");
    }

    #[test]
    fn test_mapping_tag_for_event() {
        let mapping = TagMapping::new(InvalidationTag::new("fallback").unwrap())
            .with_rules(vec!["usuario:=user-data".parse().unwrap()]);

        let event = ChangeEvent::new("usuario:9").unwrap();
        assert_eq!(mapping.tag_for(&event).as_str(), "user-data");

        let event = ChangeEvent::new("orders:9").unwrap();
        assert_eq!(mapping.tag_for(&event).as_str(), "fallback");
        assert_eq!(mapping.default_tag().as_str(), "fallback");
    }
}

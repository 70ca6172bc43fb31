use std::{collections::BTreeMap, fmt, str::FromStr};

use crate::error::NetworkingError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Rule {
    Equal(String, String),
    Exists(String),
}

/// Extra tag selector applied to endpoint security groups.
///
/// Parsed from `key=value,key2=,key3`. A key with an empty or missing value
/// only requires the tag to be present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    rules: Vec<Rule>,
}

impl TagFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    #[must_use]
    pub fn matches(&self, tags: &BTreeMap<String, String>) -> bool {
        for rule in &self.rules {
            match rule {
                Rule::Equal(key, value) => {
                    if tags.get(key) != Some(value) {
                        return false;
                    }
                }
                Rule::Exists(key) => {
                    if !tags.contains_key(key) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

impl From<BTreeMap<String, String>> for TagFilter {
    fn from(tags: BTreeMap<String, String>) -> Self {
        let rules = tags
            .into_iter()
            .map(|(key, value)| {
                if value.is_empty() {
                    Rule::Exists(key)
                } else {
                    Rule::Equal(key, value)
                }
            })
            .collect();
        Self { rules }
    }
}

impl FromStr for TagFilter {
    type Err = NetworkingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tags = BTreeMap::new();
        for rule in s.split(',').map(str::trim).filter(|r| !r.is_empty()) {
            let parts = rule.split('=').collect::<Vec<_>>();
            match *parts.as_slice() {
                [key] | [key, ""] if !key.is_empty() => {
                    tags.insert(key.to_string(), String::new());
                }
                [key, value] if !key.is_empty() => {
                    tags.insert(key.to_string(), value.to_string());
                }
                _ => return Err(NetworkingError::InvalidTagFilter(rule.to_string())),
            }
        }
        Ok(Self::from(tags))
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .rules
            .iter()
            .map(|rule| match rule {
                Rule::Equal(key, value) => format!("{key}={value}"),
                Rule::Exists(key) => format!("{key}="),
            })
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{{{rendered}}}")
    }
}

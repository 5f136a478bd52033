use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-invocation context: the attributes templates read from and the place
/// output attributes are written to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message {
    attributes: BTreeMap<String, String>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn put(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.attributes.remove(name)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Attributes whose name starts with `prefix`.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.iter().filter(move |(name, _)| name.starts_with(prefix))
    }
}

impl<K, V> FromIterator<(K, V)> for Message
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            attributes: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

/// Names of the attributes an invocation writes, all sharing one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNames {
    prefix: String,
}

pub const DEFAULT_OUTPUT_PREFIX: &str = "aws.secretsmanager";

impl Default for OutputNames {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_PREFIX)
    }
}

impl OutputNames {
    /// A blank prefix falls back to [`DEFAULT_OUTPUT_PREFIX`]; a trailing dot
    /// is dropped.
    pub fn new(prefix: &str) -> Self {
        let trimmed = prefix.trim().trim_end_matches('.');
        let prefix = if trimmed.is_empty() {
            DEFAULT_OUTPUT_PREFIX
        } else {
            trimmed
        };
        Self {
            prefix: prefix.to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn name(&self, suffix: &str) -> String {
        format!("{}.{suffix}", self.prefix)
    }

    pub fn value(&self) -> String {
        self.name("value")
    }

    pub fn value_type(&self) -> String {
        self.name("value.type")
    }

    pub fn status_code(&self) -> String {
        self.name("status.code")
    }

    pub fn error(&self) -> String {
        self.name("error")
    }

    pub fn arn(&self) -> String {
        self.name("arn")
    }

    pub fn secret_name(&self) -> String {
        self.name("name")
    }

    pub fn version_id(&self) -> String {
        self.name("version.id")
    }

    pub fn version_stages(&self) -> String {
        self.name("version.stages")
    }

    /// Every attribute name this adapter may write.
    pub fn all(&self) -> [String; 8] {
        [
            self.value(),
            self.value_type(),
            self.status_code(),
            self.error(),
            self.arn(),
            self.secret_name(),
            self.version_id(),
            self.version_stages(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names_use_prefix() {
        let names = OutputNames::new("vault.");
        assert_eq!(names.prefix(), "vault");
        assert_eq!(names.status_code(), "vault.status.code");
        assert_eq!(names.version_stages(), "vault.version.stages");
    }

    #[test]
    fn blank_prefix_uses_default() {
        let names = OutputNames::new("  ");
        assert_eq!(names.value(), "aws.secretsmanager.value");
    }

    #[test]
    fn message_collects_and_filters_by_prefix() {
        let message: Message = [("a.one", "1"), ("a.two", "2"), ("b.one", "3")]
            .into_iter()
            .collect();
        let names: Vec<_> = message.with_prefix("a.").map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a.one", "a.two"]);
        assert_eq!(message.get("b.one"), Some("3"));
        assert!(message.get("missing").is_none());
    }
}

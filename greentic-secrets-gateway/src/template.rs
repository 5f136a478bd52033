//! Field selectors: literal configuration values or `${attribute}` templates
//! evaluated against the inbound message.

use crate::message::Message;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Attribute(String),
}

/// A configured field value that is either fixed or resolved per invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct Selector {
    raw: String,
    segments: Vec<Segment>,
}

impl Selector {
    /// Parse a raw field value. Parsing never fails: text that does not form a
    /// complete `${...}` placeholder is kept literally.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let segments = parse_segments(&raw);
        Self { raw, segments }
    }

    /// A selector for an absent field; resolves to the empty string.
    pub fn empty() -> Self {
        Self::parse(String::new())
    }

    /// The value when the selector holds no placeholders.
    pub fn literal(&self) -> Option<&str> {
        if self.is_dynamic() {
            None
        } else {
            Some(&self.raw)
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| matches!(segment, Segment::Attribute(_)))
    }

    /// Resolve against `message`. Missing attributes contribute nothing.
    pub fn substitute(&self, message: &Message) -> String {
        if !self.is_dynamic() {
            return self.raw.clone();
        }
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Attribute(name) => {
                    if let Some(value) = message.get(name) {
                        out.push_str(value);
                    }
                }
            }
        }
        out
    }

    /// Attach-time evaluation: literal text as-is, templates against an empty
    /// message.
    pub fn attach_value(&self) -> String {
        self.literal()
            .map(str::to_string)
            .unwrap_or_else(|| self.substitute(&Message::new()))
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.raw).finish()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dynamic() {
            write!(f, "{} (dynamic)", self.raw)
        } else {
            f.write_str(&self.raw)
        }
    }
}

fn parse_segments(raw: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        let name = after[..end].trim();
        text.push_str(&rest[..start]);
        if name.is_empty() {
            text.push_str(&rest[start..start + 2 + end + 1]);
        } else {
            if !text.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut text)));
            }
            segments.push(Segment::Attribute(name.to_string()));
        }
        rest = &after[end + 1..];
    }

    text.push_str(rest);
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> Message {
        [
            ("http.querystring.secret", "db/password"),
            ("region", "eu-west-1"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn literal_values_are_static() {
        let selector = Selector::parse("prod/api-key");
        assert_eq!(selector.literal(), Some("prod/api-key"));
        assert!(!selector.is_dynamic());
        assert_eq!(selector.substitute(&message()), "prod/api-key");
    }

    #[test]
    fn placeholders_resolve_against_message() {
        let selector = Selector::parse("app/${http.querystring.secret}@${ region }");
        assert!(selector.is_dynamic());
        assert_eq!(selector.literal(), None);
        assert_eq!(selector.substitute(&message()), "app/db/password@eu-west-1");
    }

    #[test]
    fn missing_attribute_resolves_to_empty() {
        let selector = Selector::parse("${does.not.exist}");
        assert_eq!(selector.substitute(&message()), "");
        assert_eq!(selector.attach_value(), "");
    }

    #[test]
    fn unterminated_and_empty_placeholders_stay_literal() {
        let selector = Selector::parse("a${b");
        assert_eq!(selector.literal(), Some("a${b"));

        let selector = Selector::parse("x${}y");
        assert!(!selector.is_dynamic());
        assert_eq!(selector.substitute(&message()), "x${}y");
    }

    #[test]
    fn empty_selector_is_blank() {
        let selector = Selector::empty();
        assert_eq!(selector.substitute(&message()), "");
        assert_eq!(selector.to_string(), "");
    }
}

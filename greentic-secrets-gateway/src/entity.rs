//! Loosely-typed configuration entity.
//!
//! Gateway configuration arrives as a bag of named fields whose types are not
//! guaranteed: integers may be written as strings, tables may be missing, and
//! a field may hold something unexpected. Accessors here never fail; callers
//! decide what "absent" or "malformed" means for each field.

use crate::errors::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Result of reading a typed field from a [`ConfigEntity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue<T> {
    Absent,
    Present(T),
    /// The field exists but could not be read as the requested type; holds a
    /// rendering of the raw value for diagnostics.
    Malformed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigEntity {
    fields: Map<String, Value>,
}

impl ConfigEntity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(GatewayError::NotATable),
        }
    }

    pub fn from_toml_str(data: &str) -> Result<Self> {
        toml::from_str::<Self>(data).map_err(|err| GatewayError::ParseConfig {
            format: "toml",
            origin: "<inline>".into(),
            message: err.to_string(),
        })
    }

    pub fn from_json_str(data: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(data).map_err(|err| GatewayError::ParseConfig {
                format: "json",
                origin: "<inline>".into(),
                message: err.to_string(),
            })?;
        Self::from_value(value)
    }

    /// Parse inline text, accepting JSON when it looks like an object and TOML
    /// otherwise.
    pub fn from_text(data: &str) -> Result<Self> {
        if data.trim_start().starts_with('{') {
            Self::from_json_str(data)
        } else {
            Self::from_toml_str(data)
        }
    }

    /// Load a document from disk, choosing the format from the extension.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|source| GatewayError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = if path.extension().map(|ext| ext == "json").unwrap_or(false) {
            Self::from_json_str(&data)
        } else {
            Self::from_toml_str(&data)
        };
        parsed.map_err(|err| match err {
            GatewayError::ParseConfig {
                format, message, ..
            } => GatewayError::ParseConfig {
                format,
                origin: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|value| !value.is_null())
    }

    /// String view of a scalar field. Numbers and booleans are rendered;
    /// tables, arrays and nulls are treated as absent.
    pub fn string_value(&self, name: &str) -> Option<String> {
        match self.raw(name)? {
            Value::String(value) => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            Value::Bool(value) => Some(value.to_string()),
            _ => None,
        }
    }

    /// Like [`string_value`](Self::string_value) but blank strings are absent.
    pub fn non_blank_string(&self, name: &str) -> Option<String> {
        self.string_value(name)
            .filter(|value| !value.trim().is_empty())
    }

    /// Integer view of a field. Numeric strings are accepted.
    pub fn integer_value(&self, name: &str) -> FieldValue<i64> {
        match self.raw(name) {
            None => FieldValue::Absent,
            Some(Value::Number(number)) => match number.as_i64() {
                Some(value) => FieldValue::Present(value),
                None => FieldValue::Malformed(number.to_string()),
            },
            Some(Value::String(text)) if text.trim().is_empty() => FieldValue::Absent,
            Some(Value::String(text)) => match text.trim().parse::<i64>() {
                Ok(value) => FieldValue::Present(value),
                Err(_) => FieldValue::Malformed(text.clone()),
            },
            Some(other) => FieldValue::Malformed(other.to_string()),
        }
    }

    /// Nested table field.
    pub fn entity(&self, name: &str) -> Option<ConfigEntity> {
        match self.raw(name)? {
            Value::Object(fields) => Some(ConfigEntity {
                fields: fields.clone(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn scalar_fields_render_as_strings() {
        let entity = ConfigEntity::from_value(json!({
            "name": "prod/db",
            "retries": 4,
            "enabled": true,
            "list": ["a"],
            "nothing": null,
        }))
        .unwrap();

        assert_eq!(entity.string_value("name").as_deref(), Some("prod/db"));
        assert_eq!(entity.string_value("retries").as_deref(), Some("4"));
        assert_eq!(entity.string_value("enabled").as_deref(), Some("true"));
        assert_eq!(entity.string_value("list"), None);
        assert_eq!(entity.string_value("nothing"), None);
        assert!(entity.raw("nothing").is_none());
        assert_eq!(entity.string_value("missing"), None);
    }

    #[test]
    fn integer_fields_accept_numbers_and_numeric_strings() {
        let entity = ConfigEntity::from_value(json!({
            "a": 10,
            "b": " 25 ",
            "c": "ten",
            "d": 1.5,
            "e": "",
        }))
        .unwrap();

        assert_eq!(entity.integer_value("a"), FieldValue::Present(10));
        assert_eq!(entity.integer_value("b"), FieldValue::Present(25));
        assert_eq!(entity.integer_value("c"), FieldValue::Malformed("ten".into()));
        assert!(matches!(entity.integer_value("d"), FieldValue::Malformed(_)));
        assert_eq!(entity.integer_value("e"), FieldValue::Absent);
        assert_eq!(entity.integer_value("z"), FieldValue::Absent);
    }

    #[test]
    fn parses_toml_with_nested_tables() {
        let entity = ConfigEntity::from_toml_str(
            r#"
secretName = "prod/api"

[clientConfiguration]
connectionTimeout = 2000
"#,
        )
        .unwrap();

        let nested = entity.entity("clientConfiguration").expect("nested table");
        assert_eq!(nested.integer_value("connectionTimeout"), FieldValue::Present(2000));
        assert!(entity.entity("secretName").is_none());
    }

    #[test]
    fn inline_text_detects_json() {
        let entity = ConfigEntity::from_text(r#"{"userAgent": "gw/1.0"}"#).unwrap();
        assert_eq!(entity.string_value("userAgent").as_deref(), Some("gw/1.0"));

        let err = ConfigEntity::from_text("[not toml").unwrap_err();
        assert!(matches!(err, GatewayError::ParseConfig { format: "toml", .. }));
    }

    #[test]
    fn json_arrays_are_not_entities() {
        assert!(matches!(
            ConfigEntity::from_json_str("[1, 2]"),
            Err(GatewayError::NotATable)
        ));
    }

    #[test]
    fn loads_json_file_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"secretName": "from-json"}}"#).unwrap();

        let entity = ConfigEntity::load_from_file(file.path()).unwrap();
        assert_eq!(entity.string_value("secretName").as_deref(), Some("from-json"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ConfigEntity::load_from_file(Path::new("/nonexistent/filter.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/filter.toml"));
    }
}

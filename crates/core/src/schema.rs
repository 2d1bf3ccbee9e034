//! Parameter Schemas
//!
//! A small JSON-Schema subset used to declare operation parameters.
//! The same value is sent to the reasoning service (serialized as JSON
//! Schema) and used to validate arguments before an operation runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

const SUPPORTED_TYPES: [&str; 6] = ["string", "integer", "number", "boolean", "array", "object"];

/// JSON Schema for operation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, ParameterSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ParameterSchema>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl ParameterSchema {
    fn scalar(schema_type: &str, description: Option<&str>) -> Self {
        Self {
            schema_type: schema_type.to_string(),
            description: description.map(|s| s.to_string()),
            properties: None,
            required: None,
            items: None,
            enum_values: None,
        }
    }

    /// Create a string schema
    pub fn string(description: Option<&str>) -> Self {
        Self::scalar("string", description)
    }

    /// Create an integer schema
    pub fn integer(description: Option<&str>) -> Self {
        Self::scalar("integer", description)
    }

    /// Create a number schema
    pub fn number(description: Option<&str>) -> Self {
        Self::scalar("number", description)
    }

    /// Create a boolean schema
    pub fn boolean(description: Option<&str>) -> Self {
        Self::scalar("boolean", description)
    }

    /// Create an object schema
    pub fn object(
        description: Option<&str>,
        properties: BTreeMap<String, ParameterSchema>,
        required: Vec<String>,
    ) -> Self {
        Self {
            properties: Some(properties),
            required: Some(required),
            ..Self::scalar("object", description)
        }
    }

    /// Create an array schema
    pub fn array(description: Option<&str>, items: ParameterSchema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::scalar("array", description)
        }
    }

    /// Restrict a string schema to a fixed set of values.
    pub fn with_enum(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }

    /// Names of required properties (empty for non-objects).
    pub fn required_names(&self) -> &[String] {
        self.required.as_deref().unwrap_or(&[])
    }

    /// Check that the declaration itself is well formed.
    pub fn validate_declaration(&self) -> CoreResult<()> {
        self.validate_declaration_at("$")
    }

    fn validate_declaration_at(&self, path: &str) -> CoreResult<()> {
        if !SUPPORTED_TYPES.contains(&self.schema_type.as_str()) {
            return Err(CoreError::validation(format!(
                "{}: unsupported schema type '{}'",
                path, self.schema_type
            )));
        }
        if self.enum_values.is_some() && self.schema_type != "string" {
            return Err(CoreError::validation(format!(
                "{}: enum is only supported on strings",
                path
            )));
        }
        match self.schema_type.as_str() {
            "object" => {
                let empty = BTreeMap::new();
                let props = self.properties.as_ref().unwrap_or(&empty);
                for name in self.required_names() {
                    if !props.contains_key(name) {
                        return Err(CoreError::validation(format!(
                            "{}: required property '{}' is not declared",
                            path, name
                        )));
                    }
                }
                for (name, prop) in props {
                    prop.validate_declaration_at(&format!("{}.{}", path, name))?;
                }
            }
            "array" => match &self.items {
                Some(items) => items.validate_declaration_at(&format!("{}[]", path))?,
                None => {
                    return Err(CoreError::validation(format!(
                        "{}: array schema must declare items",
                        path
                    )))
                }
            },
            _ => {}
        }
        Ok(())
    }

    /// Validate a concrete argument value against this schema.
    pub fn validate_arguments(&self, value: &Value) -> CoreResult<()> {
        self.validate_value("arguments", value)
    }

    fn validate_value(&self, path: &str, value: &Value) -> CoreResult<()> {
        let type_ok = match self.schema_type.as_str() {
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            _ => false,
        };
        if !type_ok {
            return Err(CoreError::validation(format!(
                "{} must be of type {}",
                path, self.schema_type
            )));
        }

        if let (Some(allowed), Some(s)) = (&self.enum_values, value.as_str()) {
            if !allowed.iter().any(|a| a == s) {
                return Err(CoreError::validation(format!(
                    "{} must be one of [{}], got '{}'",
                    path,
                    allowed.join(", "),
                    s
                )));
            }
        }

        if let Some(map) = value.as_object() {
            let empty = BTreeMap::new();
            let props = self.properties.as_ref().unwrap_or(&empty);
            for name in self.required_names() {
                match map.get(name) {
                    None | Some(Value::Null) => {
                        return Err(CoreError::validation(format!(
                            "missing required parameter '{}'",
                            name
                        )))
                    }
                    Some(_) => {}
                }
            }
            for (key, v) in map {
                let Some(prop) = props.get(key) else {
                    return Err(CoreError::validation(format!("unknown parameter '{}'", key)));
                };
                // Optional parameters may be passed as explicit null.
                if v.is_null() && !self.required_names().contains(key) {
                    continue;
                }
                prop.validate_value(key, v)?;
            }
        }

        if let (Some(items), Some(arr)) = (&self.items, value.as_array()) {
            for (i, v) in arr.iter().enumerate() {
                items.validate_value(&format!("{}[{}]", path, i), v)?;
            }
        }

        Ok(())
    }
}

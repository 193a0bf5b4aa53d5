//! Normalization of provider-supplied tool metadata into typed descriptors,
//! and local validation of call arguments against them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use super::types::{json_kind, FunctionSchema, ToolSchema};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Null,
    Any,
}

impl FieldType {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(FieldType::String),
            "number" => Some(FieldType::Number),
            "integer" => Some(FieldType::Integer),
            "boolean" => Some(FieldType::Boolean),
            "array" => Some(FieldType::Array),
            "object" => Some(FieldType::Object),
            "null" => Some(FieldType::Null),
            _ => None,
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Integer => match value {
                Value::Number(n) => {
                    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
                }
                _ => false,
            },
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
            FieldType::Null => value.is_null(),
            FieldType::Any => true,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Null => "null",
            FieldType::Any => "any",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSpec {
    pub field_type: FieldType,
    pub required: bool,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputSchema {
    pub fields: BTreeMap<String, FieldSpec>,
    pub additional_properties: bool,
    /// Normalized JSON schema as handed to the model.
    pub raw: Value,
}

impl InputSchema {
    pub fn empty() -> Self {
        Self {
            fields: BTreeMap::new(),
            additional_properties: true,
            raw: json!({ "type": "object", "properties": {} }),
        }
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

impl ToolDescriptor {
    pub fn to_schema(&self) -> ToolSchema {
        ToolSchema {
            schema_type: "function".to_string(),
            function: FunctionSchema {
                name: self.name.clone(),
                description: self.description.clone(),
                parameters: self.input_schema.raw.clone(),
            },
        }
    }
}

/// Tool metadata as a provider reports it, before any checking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawToolMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(
        rename = "inputSchema",
        alias = "input_schema",
        alias = "parameters",
        default
    )]
    pub input_schema: Option<Value>,
}

impl RawToolMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>, schema: Value) -> Self {
        Self {
            name: Some(name.into()),
            description: Some(description.into()),
            input_schema: Some(schema),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("tool metadata has no name")]
    MissingName,

    #[error("tool '{tool}' has a malformed input schema: {reason}")]
    MalformedSchema { tool: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("field '{field}' expects {expected}, got {actual}")]
    WrongType {
        field: String,
        expected: FieldType,
        actual: &'static str,
    },

    #[error("field '{0}' must not be null")]
    NullValue(String),

    #[error("unknown field '{0}'")]
    UnknownField(String),
}

pub fn normalize(raw: RawToolMetadata) -> Result<ToolDescriptor, SchemaError> {
    let name = raw
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or(SchemaError::MissingName)?;

    let malformed = |reason: String| SchemaError::MalformedSchema {
        tool: name.clone(),
        reason,
    };

    let input_schema = match raw.input_schema {
        None | Some(Value::Null) => InputSchema::empty(),
        Some(Value::Object(object)) => normalize_object_schema(object).map_err(malformed)?,
        Some(other) => {
            return Err(malformed(format!(
                "expected an object schema, got {}",
                json_kind(&other)
            )))
        }
    };

    Ok(ToolDescriptor {
        name,
        description: raw.description.unwrap_or_default(),
        input_schema,
    })
}

fn normalize_object_schema(mut object: Map<String, Value>) -> Result<InputSchema, String> {
    match object.get("type") {
        None => {}
        Some(Value::String(kind)) if kind == "object" => {}
        Some(other) => return Err(format!("top-level type must be \"object\", got {other}")),
    }

    let properties = match object.get("properties") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(properties)) => properties.clone(),
        Some(other) => {
            return Err(format!(
                "\"properties\" must be an object, got {}",
                json_kind(other)
            ))
        }
    };

    let required: Vec<String> = match object.get("required") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| "\"required\" must list field names".to_string())
            })
            .collect::<Result<_, _>>()?,
        Some(_) => return Err("\"required\" must be an array".to_string()),
    };

    let additional_properties = !matches!(object.get("additionalProperties"), Some(Value::Bool(false)));

    let mut fields = BTreeMap::new();
    for (field, definition) in &properties {
        let Value::Object(definition) = definition else {
            return Err(format!("property '{field}' must be an object"));
        };
        let (field_type, nullable) = field_type_of(field, definition.get("type"))?;
        fields.insert(
            field.clone(),
            FieldSpec {
                field_type,
                required: required.contains(field),
                nullable,
                description: definition
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
        );
    }

    for field in &required {
        fields.entry(field.clone()).or_insert(FieldSpec {
            field_type: FieldType::Any,
            required: true,
            nullable: false,
            description: None,
        });
    }

    object.insert("type".to_string(), json!("object"));
    object.insert("properties".to_string(), Value::Object(properties));

    Ok(InputSchema {
        fields,
        additional_properties,
        raw: Value::Object(object),
    })
}

fn field_type_of(field: &str, declared: Option<&Value>) -> Result<(FieldType, bool), String> {
    let parse = |name: &str| {
        FieldType::parse(name).ok_or_else(|| format!("property '{field}' has unknown type '{name}'"))
    };

    match declared {
        None => Ok((FieldType::Any, true)),
        Some(Value::String(name)) => {
            let field_type = parse(name)?;
            Ok((field_type, field_type == FieldType::Null))
        }
        Some(Value::Array(names)) => {
            let mut nullable = false;
            let mut types = Vec::new();
            for name in names {
                let name = name
                    .as_str()
                    .ok_or_else(|| format!("property '{field}' has a non-string type entry"))?;
                match parse(name)? {
                    FieldType::Null => nullable = true,
                    other => types.push(other),
                }
            }
            let field_type = match types.as_slice() {
                [] => FieldType::Null,
                [single] => *single,
                _ => FieldType::Any,
            };
            Ok((field_type, nullable))
        }
        Some(other) => Err(format!(
            "property '{field}' has a {} type declaration",
            json_kind(other)
        )),
    }
}

pub fn validate_arguments(
    descriptor: &ToolDescriptor,
    arguments: &Map<String, Value>,
) -> Result<(), ArgumentError> {
    let schema = &descriptor.input_schema;

    for (name, spec) in &schema.fields {
        match arguments.get(name) {
            None if spec.required => return Err(ArgumentError::MissingField(name.clone())),
            None => {}
            Some(Value::Null) => {
                if spec.required && !spec.nullable && spec.field_type != FieldType::Any {
                    return Err(ArgumentError::NullValue(name.clone()));
                }
            }
            Some(value) => {
                if !spec.field_type.accepts(value) {
                    return Err(ArgumentError::WrongType {
                        field: name.clone(),
                        expected: spec.field_type,
                        actual: json_kind(value),
                    });
                }
            }
        }
    }

    if !schema.additional_properties {
        if let Some(unknown) = arguments.keys().find(|key| !schema.fields.contains_key(*key)) {
            return Err(ArgumentError::UnknownField(unknown.clone()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price_update_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "product id" },
                "price": { "type": "number" },
                "stock": { "type": ["integer", "null"] }
            },
            "required": ["id", "price"],
            "additionalProperties": false
        })
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn normalizes_fields_and_requirements() {
        let descriptor = normalize(RawToolMetadata::new(
            "update_price",
            "Update a product price",
            price_update_schema(),
        ))
        .unwrap();

        let fields = &descriptor.input_schema.fields;
        assert_eq!(fields["id"].field_type, FieldType::String);
        assert!(fields["id"].required);
        assert_eq!(fields["id"].description.as_deref(), Some("product id"));
        assert_eq!(fields["stock"].field_type, FieldType::Integer);
        assert!(fields["stock"].nullable);
        assert!(!fields["stock"].required);
        assert!(!descriptor.input_schema.additional_properties);
    }

    #[test]
    fn absent_schema_becomes_empty_object() {
        let descriptor = normalize(RawToolMetadata {
            name: Some("ping".to_string()),
            description: None,
            input_schema: None,
        })
        .unwrap();

        assert!(descriptor.input_schema.fields.is_empty());
        assert_eq!(
            descriptor.to_schema().function.parameters,
            json!({ "type": "object", "properties": {} })
        );
    }

    #[test]
    fn missing_or_blank_name_is_rejected() {
        assert_eq!(
            normalize(RawToolMetadata::default()),
            Err(SchemaError::MissingName)
        );
        assert_eq!(
            normalize(RawToolMetadata::new("  ", "", json!({}))),
            Err(SchemaError::MissingName)
        );
    }

    #[test]
    fn malformed_schemas_are_rejected() {
        let cases = [
            json!("object"),
            json!({ "type": "array" }),
            json!({ "properties": [] }),
            json!({ "properties": { "id": "string" } }),
            json!({ "properties": { "id": { "type": "uuid" } } }),
            json!({ "required": "id" }),
        ];

        for schema in cases {
            let result = normalize(RawToolMetadata::new("broken", "", schema.clone()));
            assert!(
                matches!(result, Err(SchemaError::MalformedSchema { ref tool, .. }) if tool == "broken"),
                "accepted {schema}"
            );
        }
    }

    #[test]
    fn accepts_snake_case_and_openai_schema_keys() {
        let snake: RawToolMetadata =
            serde_json::from_str(r#"{"name":"a","input_schema":{"type":"object"}}"#).unwrap();
        let openai: RawToolMetadata =
            serde_json::from_str(r#"{"name":"b","parameters":{"type":"object"}}"#).unwrap();
        assert!(snake.input_schema.is_some());
        assert!(openai.input_schema.is_some());
    }

    #[test]
    fn validates_arguments_against_descriptor() {
        let descriptor = normalize(RawToolMetadata::new(
            "update_price",
            "",
            price_update_schema(),
        ))
        .unwrap();

        assert!(validate_arguments(&descriptor, &args(json!({ "id": "P", "price": 10 }))).is_ok());
        assert!(validate_arguments(
            &descriptor,
            &args(json!({ "id": "P", "price": 10.5, "stock": null }))
        )
        .is_ok());

        assert_eq!(
            validate_arguments(&descriptor, &args(json!({ "price": 10 }))),
            Err(ArgumentError::MissingField("id".to_string()))
        );
        assert_eq!(
            validate_arguments(&descriptor, &args(json!({ "id": 7, "price": 10 }))),
            Err(ArgumentError::WrongType {
                field: "id".to_string(),
                expected: FieldType::String,
                actual: "integer",
            })
        );
        assert_eq!(
            validate_arguments(&descriptor, &args(json!({ "id": null, "price": 1 }))),
            Err(ArgumentError::NullValue("id".to_string()))
        );
        assert_eq!(
            validate_arguments(
                &descriptor,
                &args(json!({ "id": "P", "price": 1, "colour": "red" }))
            ),
            Err(ArgumentError::UnknownField("colour".to_string()))
        );
    }

    #[test]
    fn integer_fields_reject_fractions() {
        let descriptor = normalize(RawToolMetadata::new(
            "page",
            "",
            json!({ "properties": { "n": { "type": "integer" } } }),
        ))
        .unwrap();

        assert!(validate_arguments(&descriptor, &args(json!({ "n": 3 }))).is_ok());
        assert!(validate_arguments(&descriptor, &args(json!({ "n": 3.5 }))).is_err());
    }
}

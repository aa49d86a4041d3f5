//! Message schema descriptors consumed by the redaction engine.
//!
//! Schemas are loaded once (from config or built in code) into a
//! [`SchemaRegistry`] and shared read-only afterwards.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Declared type of a message field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Bool,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Float,
    Double,
    String,
    Bytes,
    Enum,
    Message,
}

/// Descriptor for a single field of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name as declared in the schema.
    pub name: String,

    /// JSON name, when it differs from `name` (e.g. camelCase).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_name: Option<String>,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Fully qualified type of a `message` field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,

    /// Loggable annotation; absent means loggable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loggable: Option<bool>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            json_name: None,
            field_type,
            message_type: None,
            loggable: None,
        }
    }

    pub fn scalar(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn message(name: impl Into<String>, message_type: impl Into<String>) -> Self {
        Self {
            message_type: Some(message_type.into()),
            ..Self::new(name, FieldType::Message)
        }
    }

    pub fn with_json_name(mut self, json_name: impl Into<String>) -> Self {
        self.json_name = Some(json_name.into());
        self
    }

    pub fn loggable(mut self, loggable: bool) -> Self {
        self.loggable = Some(loggable);
        self
    }

    /// False only when the field is explicitly annotated non-loggable.
    pub fn is_loggable(&self) -> bool {
        self.loggable.unwrap_or(true)
    }

    fn matches(&self, key: &str) -> bool {
        self.name == key || self.json_name.as_deref() == Some(key)
    }
}

/// Descriptor for a message type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSchema {
    /// Fully qualified message name, e.g. `greeter.v1.HelloRequest`.
    pub name: String,

    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl MessageSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Find a field by schema name or JSON name.
    pub fn find_field(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.matches(key))
    }
}

/// Duplicate message names are rejected when building a registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("duplicate message schema: {0}")]
    Duplicate(String),
}

/// Immutable lookup table of message schemas by fully qualified name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    messages: HashMap<String, MessageSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry, rejecting duplicate names.
    pub fn from_schemas(
        schemas: impl IntoIterator<Item = MessageSchema>,
    ) -> Result<Self, SchemaError> {
        let mut messages = HashMap::new();
        for schema in schemas {
            if messages.contains_key(&schema.name) {
                return Err(SchemaError::Duplicate(schema.name));
            }
            messages.insert(schema.name.clone(), schema);
        }
        Ok(Self { messages })
    }

    pub fn get(&self, name: &str) -> Option<&MessageSchema> {
        self.messages.get(name)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

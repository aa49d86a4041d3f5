//! Schema-driven redaction of call payloads before they reach the logs.
//!
//! # Data Flow
//! ```text
//! typed message
//!     → serde_json::Value (generic structured form)
//!     → RedactionEngine::redact (prune non-loggable subtrees)
//!     → RedactedPayload (safe to log)
//! ```
//!
//! # Design Decisions
//! - Redaction is schema-driven, never value-driven: a non-loggable field
//!   is removed even when it holds a default or empty value
//! - Pure tree transform; neither the input nor the schema is mutated
//! - Unknown fields and unknown message types pass through unfiltered so
//!   newer senders can talk to older schemas

pub mod schema;

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

pub use schema::{FieldDescriptor, FieldType, MessageSchema, SchemaError, SchemaRegistry};

/// Field name → value mapping with every non-loggable field removed.
pub type RedactedPayload = Map<String, Value>;

/// A message type the redaction engine can look up in the registry.
pub trait Message: Serialize {
    /// Fully qualified schema name, e.g. `greeter.v1.HelloRequest`.
    const TYPE_NAME: &'static str;
}

/// Applies loggable annotations from a shared schema registry.
#[derive(Debug, Clone)]
pub struct RedactionEngine {
    registry: Arc<SchemaRegistry>,
}

impl RedactionEngine {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Redact a typed message using the schema registered for its type.
    ///
    /// A message that does not serialize to a JSON object yields an empty
    /// payload.
    pub fn redact_message<M: Message>(&self, message: &M) -> RedactedPayload {
        match serde_json::to_value(message) {
            Ok(Value::Object(fields)) => self.redact(&fields, self.registry.get(M::TYPE_NAME)),
            Ok(other) => {
                tracing::warn!(
                    message_type = M::TYPE_NAME,
                    kind = value_kind(&other),
                    "Message is not a structured object, nothing to log"
                );
                RedactedPayload::new()
            }
            Err(e) => {
                tracing::warn!(message_type = M::TYPE_NAME, error = %e, "Failed to serialize message for logging");
                RedactedPayload::new()
            }
        }
    }

    /// Redact a named message type given its generic structured form.
    pub fn redact_named(&self, type_name: &str, fields: &Map<String, Value>) -> RedactedPayload {
        self.redact(fields, self.registry.get(type_name))
    }

    /// Drop every field annotated non-loggable, recursing into messages.
    pub fn redact(&self, fields: &Map<String, Value>, schema: Option<&MessageSchema>) -> RedactedPayload {
        let Some(schema) = schema else {
            return fields.clone();
        };

        fields
            .iter()
            .filter_map(|(name, value)| {
                let Some(descriptor) = schema.find_field(name) else {
                    return Some((name.clone(), value.clone()));
                };
                if !descriptor.is_loggable() {
                    return None;
                }
                Some((name.clone(), self.redact_field(descriptor, value)))
            })
            .collect()
    }

    fn redact_field(&self, descriptor: &FieldDescriptor, value: &Value) -> Value {
        if descriptor.field_type != FieldType::Message {
            return value.clone();
        }
        let nested = descriptor
            .message_type
            .as_deref()
            .and_then(|name| self.registry.get(name));

        match value {
            Value::Object(fields) => Value::Object(self.redact(fields, nested)),
            // repeated message field
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Object(fields) => Value::Object(self.redact(fields, nested)),
                        other => other.clone(),
                    })
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> Arc<SchemaRegistry> {
        Arc::new(
            SchemaRegistry::from_schemas([
                MessageSchema::new("greeter.v1.HelloRequest")
                    .field(FieldDescriptor::scalar("name"))
                    .field(FieldDescriptor::new("age", FieldType::Int32).loggable(false))
                    .field(FieldDescriptor::scalar("email").loggable(false))
                    .field(FieldDescriptor::message("address", "greeter.v1.Address"))
                    .field(FieldDescriptor::message("previous", "greeter.v1.Address"))
                    .field(FieldDescriptor::message("secret", "greeter.v1.Address").loggable(false)),
                MessageSchema::new("greeter.v1.Address")
                    .field(FieldDescriptor::scalar("street").loggable(false))
                    .field(FieldDescriptor::scalar("city"))
                    .field(FieldDescriptor::scalar("state").loggable(false))
                    .field(FieldDescriptor::new("zipcode", FieldType::Int64).with_json_name("zipCode")),
            ])
            .unwrap(),
        )
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[derive(Serialize)]
    struct HelloRequest {
        name: String,
        age: u32,
        email: String,
    }

    impl Message for HelloRequest {
        const TYPE_NAME: &'static str = "greeter.v1.HelloRequest";
    }

    #[test]
    fn test_populated_message_is_filtered() {
        let engine = RedactionEngine::new(registry());
        let input = object(json!({
            "name": "TestName",
            "age": 53,
            "email": "test@test.com",
            "address": { "street": "123 Main St", "city": "Seattle", "state": "WA", "zipCode": 98101 }
        }));

        let redacted = engine.redact_named("greeter.v1.HelloRequest", &input);

        assert_eq!(
            Value::Object(redacted),
            json!({ "name": "TestName", "address": { "city": "Seattle", "zipCode": 98101 } })
        );
    }

    #[test]
    fn test_default_values_are_still_removed() {
        let engine = RedactionEngine::new(registry());
        let input = object(json!({
            "name": "TestName",
            "email": "",
            "address": { "street": "", "city": "", "zipCode": 0 }
        }));

        let redacted = engine.redact_named("greeter.v1.HelloRequest", &input);

        assert_eq!(
            Value::Object(redacted),
            json!({ "name": "TestName", "address": { "city": "", "zipCode": 0 } })
        );
    }

    #[test]
    fn test_non_loggable_message_drops_subtree() {
        let engine = RedactionEngine::new(registry());
        let input = object(json!({
            "name": "n",
            "secret": { "city": "Hidden" }
        }));

        let redacted = engine.redact_named("greeter.v1.HelloRequest", &input);
        assert_eq!(Value::Object(redacted), json!({ "name": "n" }));
    }

    #[test]
    fn test_repeated_messages_are_redacted() {
        let engine = RedactionEngine::new(registry());
        let input = object(json!({
            "previous": [
                { "street": "1 A St", "city": "Austin" },
                { "street": "2 B St", "city": "Boston" }
            ]
        }));

        let redacted = engine.redact_named("greeter.v1.HelloRequest", &input);
        assert_eq!(
            Value::Object(redacted),
            json!({ "previous": [ { "city": "Austin" }, { "city": "Boston" } ] })
        );
    }

    #[test]
    fn test_unknown_fields_and_missing_schema_pass_through() {
        let engine = RedactionEngine::new(registry());
        let input = object(json!({ "name": "n", "nickname": "nn", "email": "e", "extra": { "street": "s" } }));

        let redacted = engine.redact_named("greeter.v1.HelloRequest", &input);
        assert_eq!(
            Value::Object(redacted),
            json!({ "name": "n", "nickname": "nn", "extra": { "street": "s" } })
        );

        let untouched = engine.redact_named("unknown.Type", &input);
        assert_eq!(untouched, input);
        assert_eq!(engine.redact(&input, None), input);
    }

    #[test]
    fn test_null_values_are_kept() {
        let engine = RedactionEngine::new(registry());
        let input = object(json!({ "name": null, "address": null, "email": null }));

        let redacted = engine.redact_named("greeter.v1.HelloRequest", &input);
        assert_eq!(Value::Object(redacted), json!({ "name": null, "address": null }));
    }

    #[test]
    fn test_redaction_is_idempotent() {
        let engine = RedactionEngine::new(registry());
        let input = object(json!({
            "name": "TestName",
            "age": 1,
            "address": { "street": "x", "city": "y" },
            "previous": [ { "state": "WA", "city": "z" } ]
        }));
        let schema = engine.registry().get("greeter.v1.HelloRequest");

        let once = engine.redact(&input, schema);
        let twice = engine.redact(&once, schema);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_redact_typed_message() {
        let engine = RedactionEngine::new(registry());
        let request = HelloRequest {
            name: "TestName".into(),
            age: 53,
            email: "test@test.com".into(),
        };

        let redacted = engine.redact_message(&request);
        assert_eq!(Value::Object(redacted), json!({ "name": "TestName" }));
    }
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (message fields reference known schemas)
//! - Validate value ranges (retry bounds, jitter ratio, addresses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: InterceptorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::InterceptorConfig;
use crate::redact::FieldType;
use crate::status::Code;

/// Upper bound on configured retries.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &InterceptorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("server.bind_address", "not a socket address"));
    }

    let retry = &config.retry;
    if retry.max_retries > MAX_RETRIES_LIMIT {
        errors.push(ValidationError::new(
            "retry.max_retries",
            format!("must be at most {}", MAX_RETRIES_LIMIT),
        ));
    }
    if retry.base_delay_ms == 0 {
        errors.push(ValidationError::new("retry.base_delay_ms", "must be greater than 0"));
    }
    if retry.max_delay_ms < retry.base_delay_ms {
        errors.push(ValidationError::new("retry.max_delay_ms", "must not be below base_delay_ms"));
    }
    if !(0.0..=1.0).contains(&retry.jitter_ratio) {
        errors.push(ValidationError::new("retry.jitter_ratio", "must be within 0.0..=1.0"));
    }
    for name in &retry.retryable_codes {
        match name.parse::<Code>() {
            Ok(Code::Ok) => errors.push(ValidationError::new("retry.retryable_codes", "OK is not a failure")),
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::new("retry.retryable_codes", e.to_string())),
        }
    }

    let classifier = &config.classifier;
    for token in &classifier.resource_types {
        if token.is_empty() {
            errors.push(ValidationError::new("classifier.resource_types", "empty resource type"));
        } else if *token != token.to_lowercase() {
            errors.push(ValidationError::new(
                "classifier.resource_types",
                format!("'{}' must be lower-case", token),
            ));
        }
    }
    if classifier.lifecycle_marker.is_empty() {
        errors.push(ValidationError::new("classifier.lifecycle_marker", "must not be empty"));
    }
    if classifier.action_prefix.is_empty() {
        errors.push(ValidationError::new("classifier.action_prefix", "must not be empty"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new("observability.metrics_address", "not a socket address"));
    }

    validate_schemas(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_schemas(config: &InterceptorConfig, errors: &mut Vec<ValidationError>) {
    let mut names = HashSet::new();
    for schema in &config.schemas {
        if !names.insert(schema.name.as_str()) {
            errors.push(ValidationError::new(
                "schemas",
                format!("duplicate message schema '{}'", schema.name),
            ));
        }
    }

    for schema in &config.schemas {
        for field in &schema.fields {
            if field.field_type != FieldType::Message {
                continue;
            }
            let location = format!("schemas.{}.{}", schema.name, field.name);
            match field.message_type.as_deref() {
                None => errors.push(ValidationError::new(location, "message field needs message_type")),
                Some(target) if !names.contains(target) => errors.push(ValidationError::new(
                    location,
                    format!("unknown message type '{}'", target),
                )),
                Some(_) => {}
            }
        }
    }
}

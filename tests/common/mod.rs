//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::fmt::MakeWriter;

use rpc_interceptors::interceptor::{InterceptorFactory, Validate};
use rpc_interceptors::lifecycle::BackgroundTasks;
use rpc_interceptors::redact::{FieldDescriptor, FieldType, Message, MessageSchema, RedactionEngine, SchemaRegistry};
use rpc_interceptors::resilience::RetryPolicy;

pub const SAY_HELLO: &str = "/greeter.v1.Greeter/SayHello";

/// Collects JSON log lines written while installed as the thread default.
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install as the default subscriber for the current thread.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(self.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines(&self) -> Vec<Value> {
        let buf = self.buf.lock().unwrap();
        String::from_utf8_lossy(&buf)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Per-call `finished call` records.
    pub fn records(&self) -> Vec<Value> {
        self.lines()
            .into_iter()
            .filter(|line| line["target"] == "api_request_log")
            .collect()
    }

    /// Lines whose message contains `text`.
    pub fn messages_containing(&self, text: &str) -> Vec<Value> {
        self.lines()
            .into_iter()
            .filter(|line| line["message"].as_str().is_some_and(|m| m.contains(text)))
            .collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Address {
    pub street: String,
    pub city: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HelloRequest {
    pub name: String,
    pub email: String,
    pub address: Option<Address>,
}

impl HelloRequest {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            email: format!("{}@example.com", name),
            address: Some(Address {
                street: "1 Main St".to_string(),
                city: "Springfield".to_string(),
            }),
        }
    }
}

impl Message for HelloRequest {
    const TYPE_NAME: &'static str = "greeter.v1.HelloRequest";
}

impl Validate for HelloRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        if self.name.is_empty() {
            return Err(vec!["name: value is required".to_string()]);
        }
        Ok(())
    }
}

/// Registry hiding `email` and the street of the address.
pub fn registry() -> SchemaRegistry {
    SchemaRegistry::from_schemas([
        MessageSchema::new("greeter.v1.HelloRequest")
            .field(FieldDescriptor::scalar("name"))
            .field(FieldDescriptor::new("email", FieldType::String).loggable(false))
            .field(FieldDescriptor::message("address", "greeter.v1.Address")),
        MessageSchema::new("greeter.v1.Address")
            .field(FieldDescriptor::new("street", FieldType::String).loggable(false))
            .field(FieldDescriptor::scalar("city")),
    ])
    .unwrap()
}

pub fn factory(tasks: BackgroundTasks) -> InterceptorFactory {
    InterceptorFactory::new(RedactionEngine::new(Arc::new(registry())), RetryPolicy::default(), tasks)
}

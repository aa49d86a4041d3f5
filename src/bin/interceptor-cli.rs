use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::Value;

use rpc_interceptors::config::{load_config, InterceptorConfig};
use rpc_interceptors::correlation::generate_id;
use rpc_interceptors::http::{trim_url, RequestClassifier};
use rpc_interceptors::redact::{RedactionEngine, SchemaRegistry};

#[derive(Parser)]
#[command(name = "interceptor-cli")]
#[command(about = "Inspect the behaviour of the call interceptors", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify an HTTP request into its operation label
    Classify {
        verb: String,
        url: String,
        /// Config file providing the classifier allow-lists
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Reduce a URL to scheme, host, path and api-version
    TrimUrl { url: String },
    /// Generate a correlation id
    RequestId,
    /// Redact a JSON message using the schemas of a config file
    Redact {
        #[arg(short, long)]
        config: PathBuf,
        /// Fully qualified message type, e.g. greeter.v1.HelloRequest
        #[arg(short = 't', long = "type")]
        type_name: String,
        json: String,
    },
    /// Validate a config file
    CheckConfig { path: PathBuf },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Classify { verb, url, config } => {
            let config = match config {
                Some(path) => load_config(&path)?,
                None => InterceptorConfig::default(),
            };
            let classifier = RequestClassifier::new(Arc::new(config.classifier));
            println!("{}", classifier.classify(&verb, &url));
        }
        Commands::TrimUrl { url } => {
            println!("{}", trim_url(&url));
        }
        Commands::RequestId => {
            println!("{}", generate_id());
        }
        Commands::Redact {
            config,
            type_name,
            json,
        } => {
            let config = load_config(&config)?;
            let registry = SchemaRegistry::from_schemas(config.schemas)?;
            if registry.get(&type_name).is_none() {
                eprintln!("Warning: no schema named {}, nothing will be redacted", type_name);
            }
            let engine = RedactionEngine::new(Arc::new(registry));

            let fields = match serde_json::from_str::<Value>(&json)? {
                Value::Object(fields) => fields,
                other => return Err(format!("expected a JSON object, got {}", other).into()),
            };
            let redacted = engine.redact_named(&type_name, &fields);
            println!("{}", serde_json::to_string_pretty(&redacted)?);
        }
        Commands::CheckConfig { path } => {
            let config = load_config(&path)?;
            println!(
                "{}: ok ({} schemas, {} resource types)",
                path.display(),
                config.schemas.len(),
                config.classifier.resource_types.len()
            );
        }
    }

    Ok(())
}

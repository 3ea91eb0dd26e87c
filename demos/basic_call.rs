//! Basic example: validate a connection and list a page of workspaces.
//!
//! Run with:
//!
//! ```text
//! MQM_LOCATION=https://mqm.example.com MQM_SHARED_SPACE=1001 \
//! MQM_USER=admin MQM_PASSWORD=secret RUST_LOG=mqm_rest=debug \
//! cargo run --example basic_call
//! ```

use mqm_rest::model::TaxonomyType;
use mqm_rest::query::condition;
use mqm_rest::response::serde_factory;
use mqm_rest::uri::EntityQuery;
use mqm_rest::{Client, ConnectionConfig, Error};
use serde::Deserialize;
use std::env;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Workspace {
    id: u64,
    name: String,
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut builder = ConnectionConfig::builder()
        .location(env_or("MQM_LOCATION", "http://localhost:8080"))
        .shared_space(env_or("MQM_SHARED_SPACE", "1001"))
        .client_type("basic-call-demo");
    if let (Ok(user), Ok(password)) = (env::var("MQM_USER"), env::var("MQM_PASSWORD")) {
        builder = builder.credentials(user, password);
    }
    let client = Client::new(builder.build()?)?;

    println!("=== Validating configuration ===");
    match client.validate_configuration().await {
        Ok(()) => println!("Connected to shared space {}", client.config().shared_space()),
        Err(e) if e.is_auth_error() => {
            eprintln!("Check credentials: {}", e);
            return Err(e);
        }
        Err(e) => return Err(e),
    }

    println!("\n=== Listing workspaces ===");
    let query = EntityQuery::new("workspaces")
        .fields(["id", "name"])
        .page(0, 10)
        .order_by("name");
    let workspaces = client
        .query_entities(&query, &serde_factory::<Workspace>())
        .await?;
    for workspace in workspaces.iter() {
        println!("  {} {}", workspace.id, workspace.name);
    }
    println!("Showing {} of {}", workspaces.len(), workspaces.total_count);

    if let Some(workspace) = workspaces.first() {
        println!("\n=== Browser taxonomy in workspace {} ===", workspace.id);
        let query = EntityQuery::new("taxonomy_nodes")
            .workspace(workspace.id)
            .condition(condition("name", "Browser"))
            .fields(["id", "name"]);
        match client.query_entities(&query, &serde_factory::<TaxonomyType>()).await {
            Ok(types) => types.iter().for_each(|t| println!("  {:?}", t)),
            Err(Error::Request(e)) => {
                eprintln!("HTTP {} ({}): {:?} {:?}", e.status, e.reason, e.error_code, e.description);
            }
            Err(e) => return Err(e),
        }
    }

    client.logout();
    Ok(())
}

//! # mqm-rest - A session-authenticated MQM REST client
//!
//! `mqm-rest` talks to MQM/ALM servers over their REST API. It logs in
//! transparently, keeps the session cookie, re-authenticates once when the
//! server rejects the session, and translates failures into a typed
//! [`Error`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use mqm_rest::{query::condition, response::serde_factory, uri::EntityQuery};
//! use mqm_rest::{Client, ConnectionConfig};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Workspace {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mqm_rest::Error> {
//!     let config = ConnectionConfig::builder()
//!         .location("https://mqm.example.com")
//!         .shared_space("1001")
//!         .client_type("my-plugin")
//!         .credentials("admin", "secret")
//!         .build()?;
//!     let client = Client::new(config)?;
//!
//!     // Log in and check access to the shared space
//!     client.validate_configuration().await?;
//!
//!     let query = EntityQuery::new("workspaces")
//!         .condition(condition("name", "Default"))
//!         .page(0, 10);
//!     let page = client.query_entities(&query, &serde_factory::<Workspace>()).await?;
//!     println!("{} of {} workspaces", page.len(), page.total_count);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Transparent sessions** - login on first use, single-flight under contention
//! - **One re-authentication** - a `401` triggers a fresh login and exactly one resend
//! - **URI templates** - shared-space and workspace scoped URIs with encoded parameters
//! - **Paged decoding** - `{"data": [...], "total_count": N}` into [`PagedList`] via an [`EntityFactory`]
//! - **Typed errors** - server error codes, descriptions and reconstructed stack traces
//! - **Automatic logging** - structured logging with `tracing`
//!
//! ## Error Handling
//!
//! ```no_run
//! use mqm_rest::{Client, Error};
//!
//! # async fn example(client: Client, uri: url::Url) {
//! match client.get_entities(uri, 0, &mqm_rest::response::serde_factory::<serde_json::Value>()).await {
//!     Ok(page) => println!("{} items", page.len()),
//!     Err(Error::Request(e)) => {
//!         eprintln!("HTTP {} ({}): {:?}", e.status, e.reason, e.error_code);
//!     }
//!     Err(e) if e.is_auth_error() => eprintln!("Check credentials: {}", e),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! # }
//! ```

mod client;
mod config;
mod error;
pub mod model;
pub mod query;
pub mod response;
mod session;
pub mod stack_trace;
pub mod uri;

pub use client::{Client, Response, MAX_CONNECTIONS};
pub use config::{
    ConnectionConfig, ConnectionConfigBuilder, ProxyConfig, ProxyCredentials,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_SOCKET_TIMEOUT,
};
pub use error::{Error, RequestError, Result, ServerError};
pub use response::{EntityFactory, PagedList};
pub use session::{SessionManager, CLIENT_TYPE_HEADER, SESSION_COOKIE_NAME};

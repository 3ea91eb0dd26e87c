//! Error types for MQM REST calls.
//!
//! Every public operation either returns a fully decoded result or exactly one
//! [`Error`]. Server-side failures keep the structured details the server sent
//! (error code, description, reconstructed stack trace) alongside the raw HTTP
//! status, so callers can tell "bad credentials" apart from "server unreachable"
//! apart from "the server rejected this request".

use crate::stack_trace::{self, RemoteException};
use http::StatusCode;
use serde::Deserialize;
use std::sync::Arc;

/// The main error type for MQM REST calls.
///
/// # Examples
///
/// ```no_run
/// use mqm_rest::{Client, ConnectionConfig, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let config = ConnectionConfig::builder()
///     .location("https://mqm.example.com")
///     .shared_space("1001")
///     .client_type("my-plugin")
///     .build()?;
/// let client = Client::new(config)?;
///
/// match client.validate_configuration().await {
///     Ok(()) => println!("Connected"),
///     Err(Error::LoginFailed(e)) => eprintln!("Server unreachable: {}", e),
///     Err(Error::AuthenticationFailed { message, .. }) => eprintln!("Bad credentials: {}", message),
///     Err(Error::SharedSpaceNotFound(message)) => eprintln!("{}", message),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// The server refused the credentials, or accepted them without issuing a
    /// session token.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// Human readable reason
        message: String,
        /// The status of the rejecting response, when there was one
        status: Option<StatusCode>,
    },

    /// A network-level error occurred while logging in.
    ///
    /// This is never used for rejected credentials; it means the sign-in
    /// request did not complete.
    #[error("Error occurred during authentication: {0}")]
    LoginFailed(#[source] Arc<reqwest::Error>),

    /// The session is valid but lacks rights for the requested resource.
    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    /// The configured shared space does not exist on the server.
    #[error("Shared space not found: {0}")]
    SharedSpaceNotFound(String),

    /// The server answered a data operation with a non-success status.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// A network-level error occurred during a data operation.
    #[error("{context}: {source}")]
    RequestFailed {
        /// What the client was doing
        context: String,
        /// The underlying transport error
        #[source]
        source: Arc<reqwest::Error>,
    },

    /// A success response did not have the expected shape.
    #[error("Failed to deserialize response: {serde_error}")]
    Deserialization {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The decoder's error message
        serde_error: String,
    },

    /// The caller broke an API contract (empty required configuration,
    /// non-repeatable request body, unresolved URI placeholder, ...).
    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    /// A URI could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    pub(crate) fn request_failed(context: impl Into<String>, source: reqwest::Error) -> Self {
        Error::RequestFailed {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::AuthenticationFailed { status, .. } => *status,
            Error::Request(e) => Some(e.status),
            Error::LoginFailed(e) => e.status(),
            Error::RequestFailed { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Returns the server supplied error code, if any.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Error::Request(e) => e.error_code.as_deref(),
            _ => None,
        }
    }

    /// Returns the server supplied error description, if any.
    pub fn description(&self) -> Option<&str> {
        match self {
            Error::Request(e) => e.description.as_deref(),
            _ => None,
        }
    }

    /// Returns `true` for credential and permission problems.
    ///
    /// ```
    /// use mqm_rest::Error;
    ///
    /// let err = Error::AuthorizationFailed("no access".to_string());
    /// assert!(err.is_auth_error());
    /// assert!(!Error::IllegalArgument("x".to_string()).is_auth_error());
    /// ```
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Error::AuthenticationFailed { .. }
                | Error::AuthorizationFailed(_)
                | Error::SharedSpaceNotFound(_)
        )
    }
}

/// A non-success response to a data operation.
///
/// Carries whatever structured error body the server sent. When the body held
/// a parseable stack trace, [`std::error::Error::source`] yields a
/// [`ServerError`] wrapping the reconstructed remote exception chain.
#[derive(thiserror::Error, Debug, Clone)]
#[error("{message}")]
pub struct RequestError {
    /// Full message including the operation context
    pub message: String,
    /// Server supplied description
    pub description: Option<String>,
    /// Server supplied error code
    pub error_code: Option<String>,
    /// HTTP status of the response
    pub status: StatusCode,
    /// HTTP reason phrase of the status
    pub reason: String,
    /// Reconstructed server-side exception
    #[source]
    pub cause: Option<ServerError>,
}

/// Error body as sent by the server.
#[derive(Deserialize)]
struct ErrorBody {
    error_code: Option<serde_json::Value>,
    description: Option<serde_json::Value>,
    stack_trace: Option<serde_json::Value>,
}

impl RequestError {
    /// Builds a request error from a failed response's status and body.
    ///
    /// `context` describes the operation, e.g. `"Entity retrieval failed"`.
    /// The body is parsed best-effort: an unparseable body leaves only the
    /// status and reason, and a stack trace that cannot be reconstructed is
    /// logged and dropped.
    ///
    /// ```
    /// use http::StatusCode;
    /// use mqm_rest::RequestError;
    ///
    /// let err = RequestError::from_parts(
    ///     "Entity retrieval failed",
    ///     StatusCode::BAD_REQUEST,
    ///     r#"{"error_code":"E1","description":"bad"}"#,
    /// );
    /// assert_eq!(err.error_code.as_deref(), Some("E1"));
    /// assert_eq!(err.description.as_deref(), Some("bad"));
    /// assert_eq!(err.reason, "Bad Request");
    /// ```
    pub fn from_parts(context: &str, status: StatusCode, body: &str) -> Self {
        let reason = status.canonical_reason().unwrap_or_default().to_string();
        Self::with_reason(context, status, reason, body)
    }

    fn with_reason(context: &str, status: StatusCode, reason: String, body: &str) -> Self {
        let mut description = None;
        let mut error_code = None;
        let mut trace = None;

        match serde_json::from_str::<ErrorBody>(body) {
            Ok(ErrorBody {
                error_code: Some(code),
                description: Some(desc),
                stack_trace,
            }) => {
                error_code = Some(json_text(code));
                description = Some(json_text(desc));
                // not sent by production servers
                trace = stack_trace.map(json_text);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    status = status.as_u16(),
                    "Unable to determine failure message"
                );
            }
        }

        let cause = trace.filter(|t| !t.is_empty()).and_then(|t| {
            let parsed = stack_trace::parse_remote_exception(&t);
            if parsed.is_none() {
                tracing::error!(stack_trace = %t, "Unable to parse server stack trace");
            }
            parsed.map(ServerError::new)
        });

        let message = match error_code.as_deref().filter(|c| !c.is_empty()) {
            Some(code) => format!(
                "{}; error code: {}; description: {}",
                context,
                code,
                description.as_deref().unwrap_or_default()
            ),
            None => format!(
                "{}; status code {}; reason {}",
                context,
                status.as_u16(),
                reason
            ),
        };

        Self {
            message,
            description,
            error_code,
            status,
            reason,
            cause,
        }
    }

    /// Consumes a failed response and translates it.
    ///
    /// The reason is the one on the server's status line, falling back to the
    /// canonical phrase of the status code.
    pub async fn from_response(context: &str, response: reqwest::Response) -> Self {
        let status = response.status();
        let reason = reason_phrase(&response);
        let body = response.text().await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Unable to read error response body");
            String::new()
        });
        Self::with_reason(context, status, reason, &body)
    }
}

/// Reason phrase of a response's status line.
///
/// The HTTP stack only records the phrase when it differs from the canonical
/// one.
pub(crate) fn reason_phrase(response: &reqwest::Response) -> String {
    match response.extensions().get::<hyper::ext::ReasonPhrase>() {
        Some(reason) => String::from_utf8_lossy(reason.as_bytes()).into_owned(),
        None => response
            .status()
            .canonical_reason()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Error codes and descriptions are usually strings, but some servers send
/// numbers.
fn json_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// An exception thrown on the server, attached as the cause of a
/// [`RequestError`].
#[derive(thiserror::Error, Debug, Clone)]
#[error("Exception thrown on server, see cause")]
pub struct ServerError {
    #[source]
    remote: RemoteException,
}

impl ServerError {
    fn new(remote: RemoteException) -> Self {
        Self { remote }
    }

    /// The reconstructed remote exception chain.
    pub fn remote(&self) -> &RemoteException {
        &self.remote
    }
}

/// A specialized `Result` type for MQM REST calls.
pub type Result<T> = std::result::Result<T, Error>;

//! The session-authenticated MQM REST client.
//!
//! [`Client`] is the main entry point. Every request it sends goes through
//! [`Client::execute`], which makes sure a session exists, attaches it, and
//! re-authenticates once if the server answers `401 Unauthorized`.

use crate::{
    config::ConnectionConfig,
    error::RequestError,
    response::{decode_paged_list, EntityFactory, PagedList},
    session::SessionManager,
    uri::{EntityQuery, Params, UriBuilder},
    Error, Result,
};
use http::{HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// Maximum number of requests in flight per client.
pub const MAX_CONNECTIONS: usize = 20;

const AUTHENTICATION_URI: &str = "authentication/sign_in";
const CONNECTIVITY_URI: &str = "analytics/ci/servers/connectivity/status";

/// A client for the MQM REST API.
///
/// The client is cheap to clone and designed to be shared: all clones use the
/// same connection pool and the same session.
///
/// # Examples
///
/// ```no_run
/// use mqm_rest::{query::condition, response::serde_factory, uri::EntityQuery};
/// use mqm_rest::{Client, ConnectionConfig};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Release {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), mqm_rest::Error> {
/// let config = ConnectionConfig::builder()
///     .location("https://mqm.example.com")
///     .shared_space("1001")
///     .client_type("ci-plugin")
///     .credentials("admin", "secret")
///     .build()?;
/// let client = Client::new(config)?;
///
/// let query = EntityQuery::new("releases")
///     .workspace(1002)
///     .condition(condition("name", "R1"))
///     .page(0, 50);
/// let releases = client.query_entities(&query, &serde_factory::<Release>()).await?;
/// for release in releases.iter() {
///     println!("{} {}", release.id, release.name);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    config: ConnectionConfig,
    uris: UriBuilder,
    session: SessionManager,
    permits: Arc<Semaphore>,
}

/// The two states of a request: sent once, or re-sent after re-authenticating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    First,
    Retried,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attempt::First => f.write_str("first"),
            Attempt::Retried => f.write_str("retried"),
        }
    }
}

/// A response returned by [`Client::execute`].
///
/// Occupies one of the client's [`MAX_CONNECTIONS`] slots until its body has
/// been read or it is dropped.
#[derive(Debug)]
pub struct Response {
    response: reqwest::Response,
    _permit: OwnedSemaphorePermit,
}

impl Response {
    /// HTTP status of the response.
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    /// Final URL of the response.
    pub fn url(&self) -> &Url {
        self.response.url()
    }

    /// Reads the body as text.
    pub async fn text(self) -> Result<String> {
        self.response
            .text()
            .await
            .map_err(|e| Error::request_failed("Cannot read response body", e))
    }

    /// Reads the body and deserializes it as JSON.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let body = self.text().await?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            raw_response: body,
            serde_error: e.to_string(),
        })
    }

    /// Releases the connection slot and returns the underlying response.
    pub fn into_inner(self) -> reqwest::Response {
        self.response
    }
}

impl Client {
    /// Creates a client. No network activity happens until the first request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalArgument`] if the client type is not a valid
    /// header value, the proxy cannot be configured, or the HTTP client
    /// cannot be built.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.socket_timeout())
            .pool_max_idle_per_host(MAX_CONNECTIONS);

        if let Some(proxy) = config.proxy() {
            builder = builder.proxy(proxy.to_reqwest()?);
        }

        let http_client = builder.build().map_err(|e| {
            Error::IllegalArgument(format!("Failed to build HTTP client: {}", e))
        })?;

        let uris = UriBuilder::new(config.location(), config.shared_space());
        let permits = Arc::new(Semaphore::new(MAX_CONNECTIONS));
        let session = SessionManager::new(
            http_client.clone(),
            permits.clone(),
            uris.base_uri(AUTHENTICATION_URI, &Params::new())?,
            &config,
        )?;

        Ok(Client {
            inner: Arc::new(ClientInner {
                http_client,
                config,
                uris,
                session,
                permits,
            }),
        })
    }

    /// The configuration this client was created with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// URI builder scoped to this client's location and shared space.
    pub fn uris(&self) -> &UriBuilder {
        &self.inner.uris
    }

    /// The session used by every request of this client.
    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    /// Starts building a request to hand to [`execute`](Self::execute).
    pub fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.inner.http_client.request(method, url)
    }

    /// Logs in, replacing any existing session.
    pub async fn login(&self) -> Result<()> {
        self.inner.session.login().await
    }

    /// Forgets the current session.
    pub fn logout(&self) {
        self.inner.session.invalidate();
    }

    /// Logs in and checks that the credentials grant access to the shared
    /// space.
    ///
    /// # Errors
    ///
    /// Login errors, [`Error::SharedSpaceNotFound`] when the shared space
    /// does not exist, [`Error::AuthorizationFailed`] when access is denied.
    pub async fn validate_configuration(&self) -> Result<()> {
        self.login().await?;
        self.check_authorization().await
    }

    /// Checks access to the shared space, logging in only if needed.
    pub async fn validate_configuration_without_login(&self) -> Result<()> {
        self.check_authorization().await
    }

    async fn check_authorization(&self) -> Result<()> {
        const CONTEXT: &str = "Shared space check failed";

        let uri = self
            .inner
            .uris
            .shared_space_internal_api_uri(CONNECTIVITY_URI, &Params::new())?;
        let request = self.build(Method::GET, uri, CONTEXT)?;
        let exchange = self.send(request, CONTEXT).await?;

        match exchange.response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => Err(Error::SharedSpaceNotFound(
                "Cannot connect to given shared space.".to_string(),
            )),
            StatusCode::FORBIDDEN => Err(Error::AuthorizationFailed(
                "Provided credentials are not sufficient for requested resource".to_string(),
            )),
            status => Err(Error::AuthorizationFailed(format!(
                "Authorization failed with unexpected response {}",
                status.as_u16()
            ))),
        }
    }

    /// Sends a request within the session.
    ///
    /// Logs in first if no session is held. If the server answers
    /// `401 Unauthorized`, the session is replaced and the same request is
    /// sent exactly once more; whatever the second attempt returns is the
    /// result.
    ///
    /// # Errors
    ///
    /// [`Error::IllegalArgument`] if the request body cannot be sent twice
    /// (a streaming body), login errors, and [`Error::RequestFailed`] when
    /// the request does not complete. Non-success statuses are *not* errors
    /// here; they are returned for the caller to inspect.
    pub async fn execute(&self, request: reqwest::Request) -> Result<Response> {
        self.send(request, "Request execution failed").await
    }

    async fn send(&self, request: reqwest::Request, context: &str) -> Result<Response> {
        let retry = request.try_clone().ok_or_else(|| {
            Error::IllegalArgument("Request body must be repeatable".to_string())
        })?;

        self.inner.session.ensure_session().await?;

        let (epoch, exchange) = self.dispatch(request, Attempt::First, context).await?;
        if exchange.response.status() != StatusCode::UNAUTHORIZED {
            return Ok(exchange);
        }
        drop(exchange);

        tracing::info!(url = %retry.url(), "Session rejected, re-authenticating");
        self.inner.session.relogin(epoch).await?;

        let (_, exchange) = self.dispatch(retry, Attempt::Retried, context).await?;
        Ok(exchange)
    }

    async fn dispatch(
        &self,
        mut request: reqwest::Request,
        attempt: Attempt,
        context: &str,
    ) -> Result<(Option<u64>, Response)> {
        let epoch = self.inner.session.attach(&mut request);

        tracing::debug!(
            method = %request.method(),
            url = %request.url(),
            attempt = %attempt,
            "Executing HTTP request"
        );

        let permit = self
            .inner
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::IllegalArgument("Client has been disposed".to_string()))?;

        let response = self
            .inner
            .http_client
            .execute(request)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, attempt = %attempt, "Request failed");
                Error::request_failed(context, e)
            })?;

        tracing::debug!(
            status = response.status().as_u16(),
            attempt = %attempt,
            "Received HTTP response"
        );

        Ok((
            epoch,
            Response {
                response,
                _permit: permit,
            },
        ))
    }

    /// Retrieves one page of entities from a collection URI.
    ///
    /// `offset` is recorded in the returned [`PagedList`]; it should match
    /// the offset encoded in `uri`.
    pub async fn get_entities<E, F>(&self, uri: Url, offset: u32, factory: &F) -> Result<PagedList<E>>
    where
        F: EntityFactory<E> + ?Sized,
    {
        const CONTEXT: &str = "Cannot retrieve entities";

        let request = self.build(Method::GET, uri, CONTEXT)?;
        let exchange = self.send(request, CONTEXT).await?;
        read_paged(exchange, offset, factory, "Entity retrieval failed", CONTEXT).await
    }

    /// Retrieves the page of entities described by `query`.
    pub async fn query_entities<E, F>(&self, query: &EntityQuery, factory: &F) -> Result<PagedList<E>>
    where
        F: EntityFactory<E> + ?Sized,
    {
        let uri = self.inner.uris.entity_uri(query)?;
        self.get_entities(uri, query.offset(), factory).await
    }

    /// Deletes the entities selected by a collection URI, returning the
    /// deleted entities as reported by the server.
    pub async fn delete_entities<E, F>(&self, uri: Url, factory: &F) -> Result<PagedList<E>>
    where
        F: EntityFactory<E> + ?Sized,
    {
        const CONTEXT: &str = "Cannot delete entities";

        let request = self.build(Method::DELETE, uri, CONTEXT)?;
        let exchange = self.send(request, CONTEXT).await?;
        read_paged(exchange, 0, factory, "Entity delete failed", CONTEXT).await
    }

    fn build(&self, method: Method, uri: Url, context: &str) -> Result<reqwest::Request> {
        self.inner
            .http_client
            .request(method, uri)
            .build()
            .map_err(|e| Error::request_failed(context, e))
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("location", &self.inner.config.location())
            .field("shared_space", &self.inner.config.shared_space())
            .field("session", &self.inner.session)
            .finish()
    }
}

async fn read_paged<E, F>(
    exchange: Response,
    offset: u32,
    factory: &F,
    failure: &str,
    context: &str,
) -> Result<PagedList<E>>
where
    F: EntityFactory<E> + ?Sized,
{
    let Response { response, _permit } = exchange;

    if response.status() != StatusCode::OK {
        return Err(translate_failure(failure, response).await);
    }

    let body = response
        .text()
        .await
        .map_err(|e| Error::request_failed(context, e))?;
    decode_paged_list(&body, offset, factory)
}

/// Maps a failed data response onto the error taxonomy.
///
/// A 401 here means the session was rejected even after re-authenticating.
async fn translate_failure(context: &str, response: reqwest::Response) -> Error {
    let error = RequestError::from_response(context, response).await;

    match error.status {
        StatusCode::UNAUTHORIZED => {
            tracing::error!(message = %error.message, "Session rejected after re-authentication");
            Error::AuthenticationFailed {
                message: error.message,
                status: Some(error.status),
            }
        }
        StatusCode::FORBIDDEN => Error::AuthorizationFailed(error.message),
        status => {
            if status.is_server_error() {
                tracing::warn!(status = status.as_u16(), message = %error.message, "Server error (5xx)");
            } else {
                tracing::error!(status = status.as_u16(), message = %error.message, "Client error (4xx)");
            }
            Error::Request(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        let config = ConnectionConfig::builder()
            .location("http://localhost:1")
            .shared_space("1001")
            .client_type("test-client")
            .build()
            .unwrap();
        Client::new(config).unwrap()
    }

    #[test]
    fn test_new_does_not_log_in() {
        let client = client();
        assert!(!client.session().is_authenticated());
        assert_eq!(client.config().shared_space(), "1001");
    }

    #[test]
    fn test_attempt_display() {
        assert_eq!(Attempt::First.to_string(), "first");
        assert_eq!(Attempt::Retried.to_string(), "retried");
    }

    #[tokio::test]
    async fn test_executed_response_holds_connection_until_read() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authentication/sign_in"))
            .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "LWSSO_COOKIE_KEY=t1; Path=/"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/shared_spaces/1001/workspaces"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":[],"total_count":0}"#))
            .mount(&mock_server)
            .await;

        let config = ConnectionConfig::builder()
            .location(mock_server.uri())
            .shared_space("1001")
            .client_type("test-client")
            .build()
            .unwrap();
        let client = Client::new(config).unwrap();
        let uri = client.uris().shared_space_api_uri("workspaces", &Params::new()).unwrap();
        let request = client.request(Method::GET, uri).build().unwrap();

        let response = client.execute(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(client.inner.permits.available_permits(), MAX_CONNECTIONS - 1);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["total_count"], 0);
        assert_eq!(client.inner.permits.available_permits(), MAX_CONNECTIONS);
    }

    #[tokio::test]
    async fn test_streaming_body_rejected_before_network() {
        let client = client();
        let stream = tokio_stream::iter(vec![Ok::<_, std::io::Error>(&b"chunk"[..])]);
        let request = client
            .request(Method::POST, Url::parse("http://localhost:1/x").unwrap())
            .body(reqwest::Body::wrap_stream(stream))
            .build()
            .unwrap();

        let result = client.execute(request).await;
        assert!(matches!(result, Err(Error::IllegalArgument(_))));
        assert!(!client.session().is_authenticated());
    }
}

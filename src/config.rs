//! Connection configuration.
//!
//! A [`ConnectionConfig`] is validated once when it is built and is immutable
//! afterwards; a [`Client`](crate::Client) owns its configuration for its
//! whole lifetime.

use crate::{Error, Result};
use std::time::Duration;

/// Connect timeout used when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Socket (read) timeout used when none is configured.
pub const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// Credentials presented to an HTTP proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProxyCredentials {
    /// The proxy does not require authentication.
    #[default]
    None,
    /// Basic authentication.
    UsernamePassword {
        /// Proxy user name
        username: String,
        /// Proxy password
        password: String,
    },
}

/// Proxy settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy host name
    pub host: String,
    /// Proxy port
    pub port: u16,
    /// Proxy credentials
    pub credentials: ProxyCredentials,
}

impl ProxyConfig {
    /// Translates the settings into a `reqwest` proxy.
    pub(crate) fn to_reqwest(&self) -> Result<reqwest::Proxy> {
        let proxy = reqwest::Proxy::all(format!("http://{}:{}", self.host, self.port))
            .map_err(|e| Error::IllegalArgument(format!("Invalid proxy: {}", e)))?;

        Ok(match &self.credentials {
            ProxyCredentials::None => proxy,
            ProxyCredentials::UsernamePassword { username, password } => {
                proxy.basic_auth(username, password)
            }
        })
    }
}

/// Immutable connection settings for a [`Client`](crate::Client).
///
/// # Examples
///
/// ```
/// use mqm_rest::{ConnectionConfig, ProxyCredentials};
/// use std::time::Duration;
///
/// let config = ConnectionConfig::builder()
///     .location("https://mqm.example.com/")
///     .shared_space("1001")
///     .client_type("ci-plugin")
///     .credentials("admin", "secret")
///     .proxy("proxy.local", 8080, ProxyCredentials::None)
///     .connect_timeout(Duration::from_secs(5))
///     .build()
///     .unwrap();
///
/// assert_eq!(config.location(), "https://mqm.example.com");
/// assert_eq!(config.socket_timeout(), Duration::from_secs(120));
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    location: String,
    shared_space: String,
    client_type: String,
    username: Option<String>,
    password: Option<String>,
    proxy: Option<ProxyConfig>,
    connect_timeout: Duration,
    socket_timeout: Duration,
}

impl ConnectionConfig {
    /// Creates a new builder.
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default()
    }

    /// Server base location, without a trailing slash.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Shared space identifier.
    pub fn shared_space(&self) -> &str {
        &self.shared_space
    }

    /// Value of the client type header.
    pub fn client_type(&self) -> &str {
        &self.client_type
    }

    /// Login user name.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Login password.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Proxy settings.
    pub fn proxy(&self) -> Option<&ProxyConfig> {
        self.proxy.as_ref()
    }

    /// Connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Socket (read) timeout.
    pub fn socket_timeout(&self) -> Duration {
        self.socket_timeout
    }
}

/// Builder for [`ConnectionConfig`].
#[derive(Debug, Default)]
pub struct ConnectionConfigBuilder {
    location: Option<String>,
    shared_space: Option<String>,
    client_type: Option<String>,
    username: Option<String>,
    password: Option<String>,
    proxy: Option<ProxyConfig>,
    connect_timeout: Option<Duration>,
    socket_timeout: Option<Duration>,
}

impl ConnectionConfigBuilder {
    /// Sets the server base location, e.g. `https://mqm.example.com`.
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Sets the shared space identifier.
    pub fn shared_space(mut self, shared_space: impl ToString) -> Self {
        self.shared_space = Some(shared_space.to_string());
        self
    }

    /// Sets the value sent in the client type header.
    pub fn client_type(mut self, client_type: impl Into<String>) -> Self {
        self.client_type = Some(client_type.into());
        self
    }

    /// Sets the login credentials.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Routes all traffic through an HTTP proxy.
    pub fn proxy(mut self, host: impl Into<String>, port: u16, credentials: ProxyCredentials) -> Self {
        self.proxy = Some(ProxyConfig {
            host: host.into(),
            port,
            credentials,
        });
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the socket (read) timeout.
    pub fn socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = Some(timeout);
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllegalArgument`] if `location`, `shared_space` or
    /// `client_type` is missing or empty, or if the proxy host is empty.
    pub fn build(self) -> Result<ConnectionConfig> {
        let location = require(
            "location",
            self.location.map(|l| l.trim_end_matches('/').to_string()),
        )?;
        let shared_space = require("sharedSpace", self.shared_space)?;
        let client_type = require("clientType", self.client_type)?;

        if let Some(proxy) = &self.proxy {
            if proxy.host.is_empty() {
                return Err(Error::IllegalArgument(
                    "Parameter 'proxyHost' must not be empty.".to_string(),
                ));
            }
        }

        Ok(ConnectionConfig {
            location,
            shared_space,
            client_type,
            username: self.username,
            password: self.password,
            proxy: self.proxy,
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            socket_timeout: self.socket_timeout.unwrap_or(DEFAULT_SOCKET_TIMEOUT),
        })
    }
}

fn require(name: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(Error::IllegalArgument(format!(
            "Parameter '{}' must not be null or empty.",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ConnectionConfigBuilder {
        ConnectionConfig::builder()
            .location("http://localhost:8080")
            .shared_space(1001)
            .client_type("test-client")
    }

    #[test]
    fn test_defaults() {
        let config = valid().build().unwrap();
        assert_eq!(config.shared_space(), "1001");
        assert_eq!(config.connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.socket_timeout(), DEFAULT_SOCKET_TIMEOUT);
        assert!(config.username().is_none());
        assert!(config.proxy().is_none());
    }

    #[test]
    fn test_required_fields() {
        let missing_location = ConnectionConfig::builder()
            .shared_space("1")
            .client_type("c")
            .build();
        assert!(matches!(missing_location, Err(Error::IllegalArgument(m)) if m.contains("location")));

        let empty_shared_space = valid().shared_space("").build();
        assert!(matches!(empty_shared_space, Err(Error::IllegalArgument(m)) if m.contains("sharedSpace")));

        let empty_client_type = valid().client_type("").build();
        assert!(matches!(empty_client_type, Err(Error::IllegalArgument(m)) if m.contains("clientType")));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = valid().location("http://localhost:8080/qcbin/").build().unwrap();
        assert_eq!(config.location(), "http://localhost:8080/qcbin");
    }

    #[test]
    fn test_slash_only_location_rejected() {
        for location in ["/", "//"] {
            let result = valid().location(location).build();
            assert!(matches!(result, Err(Error::IllegalArgument(m)) if m.contains("location")));
        }
    }

    #[test]
    fn test_proxy_mapping() {
        let config = valid()
            .proxy(
                "proxy.local",
                3128,
                ProxyCredentials::UsernamePassword {
                    username: "u".to_string(),
                    password: "p".to_string(),
                },
            )
            .build()
            .unwrap();

        assert!(config.proxy().unwrap().to_reqwest().is_ok());
        assert!(valid().proxy("", 3128, ProxyCredentials::None).build().is_err());
    }
}

//! Transport configuration
//!
//! Where the configuration service lives and how to talk to it. Built once
//! and shared read-only by every call.

use super::error::{Error, Result};
use reqwest::Client;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// User agent sent with every request
const USER_AGENT: &str = concat!("keptn-utils/", env!("CARGO_PKG_VERSION"));

/// URL scheme used to reach the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(format!("unsupported scheme: {}", other)),
        }
    }
}

/// Strip a leading scheme and trailing slashes from a base URL
fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim();
    let without_scheme = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .unwrap_or(trimmed);
    without_scheme.trim_end_matches('/').to_string()
}

/// Connection settings for the configuration service
#[derive(Clone)]
pub struct TransportConfig {
    base_url: String,
    scheme: Scheme,
    auth_token: String,
    auth_header: String,
    insecure_skip_verify: bool,
    http: Client,
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Security: never print the token
        f.debug_struct("TransportConfig")
            .field("base_url", &self.base_url)
            .field("scheme", &self.scheme)
            .field("auth_header", &self.auth_header)
            .field("authenticated", &!self.auth_token.is_empty())
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .finish()
    }
}

impl TransportConfig {
    /// Plain HTTP without authentication
    pub fn anonymous(base_url: &str) -> Result<Self> {
        Self::builder(base_url).build()
    }

    /// Authenticate every request with `auth_token` in the `auth_header` header
    ///
    /// A `None` client gets a default one.
    pub fn authenticated(
        base_url: &str,
        auth_token: &str,
        auth_header: &str,
        http_client: Option<Client>,
        scheme: Scheme,
    ) -> Result<Self> {
        let mut builder = Self::builder(base_url)
            .scheme(scheme)
            .auth(auth_token, auth_header);
        if let Some(client) = http_client {
            builder = builder.http_client(client);
        }
        builder.build()
    }

    pub fn builder(base_url: &str) -> TransportBuilder {
        TransportBuilder::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn insecure_skip_verify(&self) -> bool {
        self.insecure_skip_verify
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// Absolute URL for a path starting with `/`
    pub fn url(&self, path: &str) -> String {
        format!("{}://{}{}", self.scheme, self.base_url, path)
    }

    /// Auth header to attach, if a token is configured
    pub(crate) fn auth(&self) -> Option<(&str, &str)> {
        if self.auth_token.is_empty() || self.auth_header.is_empty() {
            None
        } else {
            Some((self.auth_header.as_str(), self.auth_token.as_str()))
        }
    }
}

/// Builder for [`TransportConfig`]
#[derive(Debug)]
pub struct TransportBuilder {
    base_url: String,
    scheme: Scheme,
    auth_token: String,
    auth_header: String,
    insecure_skip_verify: bool,
    timeout: Option<Duration>,
    http: Option<Client>,
}

impl TransportBuilder {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            scheme: Scheme::Http,
            auth_token: String::new(),
            auth_header: String::new(),
            insecure_skip_verify: false,
            timeout: None,
            http: None,
        }
    }

    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn auth(mut self, token: &str, header: &str) -> Self {
        self.auth_token = token.to_string();
        self.auth_header = header.to_string();
        self
    }

    /// Use a caller-configured client. Its TLS and timeout settings win over
    /// [`insecure_skip_verify`](Self::insecure_skip_verify) and
    /// [`timeout`](Self::timeout).
    pub fn http_client(mut self, client: Client) -> Self {
        self.http = Some(client);
        self
    }

    /// Accept any server certificate. Applies only to the client built here.
    pub fn insecure_skip_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_verify = skip;
        self
    }

    /// Deadline for each individual request
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<TransportConfig> {
        let http = match self.http {
            Some(client) => {
                if self.insecure_skip_verify {
                    tracing::warn!("insecure_skip_verify ignored for caller-supplied HTTP client");
                }
                client
            }
            None => {
                let mut builder = Client::builder()
                    .user_agent(USER_AGENT)
                    .danger_accept_invalid_certs(self.insecure_skip_verify);
                if let Some(timeout) = self.timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build().map_err(Error::ClientBuild)?
            }
        };

        if self.insecure_skip_verify {
            tracing::warn!("TLS certificate verification disabled for {}", self.base_url);
        }

        Ok(TransportConfig {
            base_url: self.base_url,
            scheme: self.scheme,
            auth_token: self.auth_token,
            auth_header: self.auth_header,
            insecure_skip_verify: self.insecure_skip_verify,
            http,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_strips_scheme() {
        let config = TransportConfig::anonymous("http://localhost:8080/").unwrap();
        assert_eq!(config.base_url(), "localhost:8080");
        assert_eq!(config.scheme(), Scheme::Http);
        assert!(config.auth().is_none());
        assert_eq!(config.url("/v1/x"), "http://localhost:8080/v1/x");
    }

    #[test]
    fn test_authenticated_keeps_scheme_choice() {
        let config = TransportConfig::authenticated(
            "https://api.keptn.example",
            "secret",
            "x-token",
            None,
            Scheme::Https,
        )
        .unwrap();
        assert_eq!(config.base_url(), "api.keptn.example");
        assert_eq!(config.url("/v1"), "https://api.keptn.example/v1");
        assert_eq!(config.auth(), Some(("x-token", "secret")));
    }

    #[test]
    fn test_empty_token_sends_no_header() {
        let config =
            TransportConfig::authenticated("localhost", "", "x-token", None, Scheme::Http).unwrap();
        assert!(config.auth().is_none());
    }

    #[test]
    fn test_insecure_is_instance_scoped() {
        let insecure = TransportConfig::builder("a")
            .insecure_skip_verify(true)
            .build()
            .unwrap();
        let strict = TransportConfig::anonymous("b").unwrap();
        assert!(insecure.insecure_skip_verify());
        assert!(!strict.insecure_skip_verify());
    }

    #[test]
    fn test_debug_hides_token() {
        let config =
            TransportConfig::authenticated("h", "topsecret", "x-token", None, Scheme::Http).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("topsecret"));
    }

    #[test]
    fn test_scheme_from_str() {
        assert_eq!("HTTPS".parse::<Scheme>(), Ok(Scheme::Https));
        assert!("ftp".parse::<Scheme>().is_err());
    }
}

//! HTTP exchange types and the blocking client seam.
//!
//! # Design
//! Requests and responses are plain data. The transport layer decides which
//! headers go out and reads the ones that come back; the `HttpClient` only
//! moves bytes. Tests substitute a recording client, production uses
//! `UreqClient`.
//!
//! Non-2xx statuses are returned as `HttpResponse` values, not errors, so the
//! transport sees the status code and the `Set-Cookie` headers of failed
//! exchanges as well.
//!
//! The client receives the whole `ProxyConfig`, not just an address, because
//! proxy credentials belong to the hop to the proxy. A client that tunnels
//! through the proxy must present them there and must not forward the
//! `Proxy-Authorization` header to the tracker.

use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::transport::ProxyConfig;

/// An outbound POST described as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpRequest {
    /// First value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replace any existing `name` header with a single `value`.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }
}

/// A received response described as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// All values of header `name` in arrival order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure to complete an HTTP exchange at all.
#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("invalid proxy address {0}")]
    InvalidProxy(String),

    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

/// Executes one blocking HTTP exchange.
pub trait HttpClient: Send + Sync {
    /// Send `request`, through `proxy` when one is given.
    fn execute(
        &self,
        request: &HttpRequest,
        proxy: Option<&ProxyConfig>,
    ) -> Result<HttpResponse, HttpClientError>;
}

/// Timeouts and default headers for outbound requests.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpSettings {
    /// Time allowed to establish the TCP (and TLS) connection.
    pub connect_timeout: Duration,

    /// Time allowed between sending the request and the response head.
    pub response_timeout: Duration,

    /// Upper bound for the whole exchange.
    pub global_timeout: Duration,

    pub user_agent: String,

    /// Send `Pragma: no-cache` and `Cache-Control: no-cache` so caching
    /// proxies always forward to the tracker.
    pub no_cache: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(1),
            response_timeout: Duration::from_secs(5),
            global_timeout: Duration::from_secs(10),
            user_agent: format!("bugzilla-core/{}", env!("CARGO_PKG_VERSION")),
            no_cache: true,
        }
    }
}

impl HttpSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn global_timeout(mut self, timeout: Duration) -> Self {
        self.global_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn no_cache(mut self, enabled: bool) -> Self {
        self.no_cache = enabled;
        self
    }
}

/// `HttpClient` backed by a fresh `ureq` agent per exchange.
///
/// ureq's own cookie handling is not enabled; cookies are managed by the
/// transport layer so their scope stays explicit.
#[derive(Debug, Clone, Default)]
pub struct UreqClient {
    settings: HttpSettings,
}

impl UreqClient {
    pub fn new(settings: HttpSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &HttpSettings {
        &self.settings
    }
}

impl HttpClient for UreqClient {
    fn execute(
        &self,
        request: &HttpRequest,
        proxy: Option<&ProxyConfig>,
    ) -> Result<HttpResponse, HttpClientError> {
        let proxy = proxy.map(ureq_proxy).transpose()?;

        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_connect(Some(self.settings.connect_timeout))
            .timeout_recv_response(Some(self.settings.response_timeout))
            .timeout_global(Some(self.settings.global_timeout))
            .proxy(proxy)
            .build()
            .new_agent();

        let mut builder = agent.post(request.url.as_str());
        for (name, value) in forwarded_headers(request) {
            builder = builder.header(name, value);
        }

        let mut response = builder
            .send(request.body.as_bytes())
            .map_err(|e| HttpClientError::Backend(Box::new(e)))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| HttpClientError::Backend(Box::new(e)))?;

        Ok(HttpResponse { status, headers, body })
    }
}

/// ureq tunnels through HTTP proxies with `CONNECT` and only authenticates
/// that hop with credentials embedded in the proxy URL.
fn ureq_proxy(proxy: &ProxyConfig) -> Result<ureq::Proxy, HttpClientError> {
    ureq::Proxy::new(proxy_url(proxy)?.as_str())
        .map_err(|_| HttpClientError::InvalidProxy(proxy.address.to_string()))
}

/// Proxy address with the credentials as percent-encoded userinfo.
fn proxy_url(proxy: &ProxyConfig) -> Result<Url, HttpClientError> {
    let mut address = proxy.address.clone();
    if let Some(credentials) = &proxy.credentials {
        let invalid = |()| HttpClientError::InvalidProxy(proxy.address.to_string());
        address.set_username(&credentials.user).map_err(invalid)?;
        address
            .set_password(Some(&credentials.password))
            .map_err(invalid)?;
    }
    Ok(address)
}

/// Request headers minus `Proxy-Authorization`, which only the proxy may see.
fn forwarded_headers(request: &HttpRequest) -> impl Iterator<Item = (&str, &str)> {
    request
        .headers
        .iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case("Proxy-Authorization"))
        .map(|(name, value)| (name.as_str(), value.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;

    #[test]
    fn header_lookup_ignores_case() {
        let mut request = HttpRequest {
            url: "http://localhost/xmlrpc.cgi".to_string(),
            headers: vec![("content-type".to_string(), "text/xml".to_string())],
            body: String::new(),
        };
        assert_eq!(request.header("Content-Type"), Some("text/xml"));

        request.set_header("Content-Type", "application/xml");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("content-type"), Some("application/xml"));
    }

    #[test]
    fn response_collects_repeated_headers() {
        let response = HttpResponse {
            status: 200,
            headers: vec![
                ("Set-Cookie".to_string(), "a=1".to_string()),
                ("Content-Type".to_string(), "text/xml".to_string()),
                ("set-cookie".to_string(), "b=2".to_string()),
            ],
            body: String::new(),
        };
        let cookies: Vec<&str> = response.header_values("Set-Cookie").collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
        assert!(response.is_success());
    }

    #[test]
    fn default_settings_match_tracker_client_defaults() {
        let settings = HttpSettings::default();
        assert_eq!(settings.connect_timeout, Duration::from_secs(1));
        assert_eq!(settings.response_timeout, Duration::from_secs(5));
        assert_eq!(settings.global_timeout, Duration::from_secs(10));
        assert!(settings.no_cache);
    }

    fn proxy(credentials: Option<Credentials>) -> ProxyConfig {
        ProxyConfig {
            address: Url::parse("http://proxy.local:3128").unwrap(),
            credentials,
        }
    }

    #[test]
    fn proxy_credentials_move_into_the_proxy_url() {
        let plain = proxy_url(&proxy(None)).unwrap();
        assert_eq!(plain.as_str(), "http://proxy.local:3128/");

        let authed = proxy_url(&proxy(Some(Credentials::new("u", "p")))).unwrap();
        assert_eq!(authed.as_str(), "http://u:p@proxy.local:3128/");

        let reserved = proxy_url(&proxy(Some(Credentials::new("ops@corp", "a:b/c")))).unwrap();
        assert_eq!(reserved.username(), "ops%40corp");
        assert_eq!(reserved.password(), Some("a%3Ab%2Fc"));
        assert!(ureq_proxy(&proxy(Some(Credentials::new("ops@corp", "a:b/c")))).is_ok());
    }

    #[test]
    fn proxy_authorization_is_not_forwarded_to_the_tracker() {
        let request = HttpRequest {
            url: "http://bugs.local/xmlrpc.cgi".to_string(),
            headers: vec![
                ("Content-Type".to_string(), "text/xml".to_string()),
                ("Proxy-Authorization".to_string(), "Basic dTpw".to_string()),
                ("Authorization".to_string(), "Basic YTpi".to_string()),
            ],
            body: String::new(),
        };
        let names: Vec<&str> = forwarded_headers(&request).map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Content-Type", "Authorization"]);
    }

    #[test]
    fn settings_builder_overrides() {
        let settings = HttpSettings::new()
            .global_timeout(Duration::from_secs(30))
            .user_agent("tests")
            .no_cache(false);
        assert_eq!(settings.global_timeout, Duration::from_secs(30));
        assert_eq!(settings.user_agent, "tests");
        assert!(!settings.no_cache);
    }
}

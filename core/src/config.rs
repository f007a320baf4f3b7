//! Connection options and credentials.
//!
//! `ConnectOptions` can be built in code or deserialized from a config file:
//!
//! ```toml
//! http_user = "build-bot"
//! http_password = "..."
//! proxy = "http://proxy.internal:3128"
//! proxy_user = "build-bot"
//! proxy_password = "..."
//! ```

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

/// A user name and password for HTTP Basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// `Basic base64(user:password)`, as sent in `Authorization` and
    /// `Proxy-Authorization` headers.
    pub fn basic_header_value(&self) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:{}", self.user, self.password)))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Optional authentication and proxy settings for `BugzillaConnector::connect`.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    /// Basic-auth user for the tracker host itself. This is not the tracker
    /// login; use `LogIn` for that.
    pub http_user: Option<String>,
    pub http_password: Option<String>,

    /// Upstream proxy, either a URL or `host:port`.
    pub proxy: Option<String>,
    pub proxy_user: Option<String>,
    pub proxy_password: Option<String>,
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn http_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.http_user = Some(user.into());
        self.http_password = Some(password.into());
        self
    }

    pub fn proxy(mut self, address: impl Into<String>) -> Self {
        self.proxy = Some(address.into());
        self
    }

    pub fn proxy_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.proxy_user = Some(user.into());
        self.proxy_password = Some(password.into());
        self
    }

    /// Target-host credentials. A user without a password authenticates
    /// with an empty password.
    pub fn http_credentials(&self) -> Option<Credentials> {
        let user = self.http_user.as_ref()?;
        Some(Credentials::new(user.as_str(), self.http_password.clone().unwrap_or_default()))
    }

    /// Proxy credentials; present only when both user and password are set.
    pub fn proxy_credentials(&self) -> Option<Credentials> {
        proxy_credentials(self.proxy_user.clone(), self.proxy_password.clone())
    }
}

pub(crate) fn proxy_credentials(
    user: Option<String>,
    password: Option<String>,
) -> Option<Credentials> {
    match (user, password) {
        (Some(user), Some(password)) => Some(Credentials::new(user, password)),
        _ => None,
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |secret: &Option<String>| secret.as_ref().map(|_| "<redacted>");
        f.debug_struct("ConnectOptions")
            .field("http_user", &self.http_user)
            .field("http_password", &redact(&self.http_password))
            .field("proxy", &self.proxy)
            .field("proxy_user", &self.proxy_user)
            .field("proxy_password", &redact(&self.proxy_password))
            .finish()
    }
}

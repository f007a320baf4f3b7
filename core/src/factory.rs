//! Per-call transport construction.
//!
//! The factory holds everything that outlives a single call: the HTTP client,
//! the target configuration, the current proxy settings and the session
//! cookie jar. Proxy changes take effect for the next `get_transport`.

use std::sync::Arc;

use url::Url;

use crate::config::{proxy_credentials, Credentials};
use crate::cookies::CookieJar;
use crate::http::HttpClient;
use crate::transport::{ProxyConfig, Transport, TransportConfig};

pub struct TransportFactory {
    client: Arc<dyn HttpClient>,
    config: Arc<TransportConfig>,
    proxy: Option<Url>,
    proxy_credentials: Option<Credentials>,
    jar: CookieJar,
}

impl TransportFactory {
    pub fn new(client: Arc<dyn HttpClient>, config: TransportConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
            proxy: None,
            proxy_credentials: None,
            jar: CookieJar::new(),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn set_proxy(&mut self, proxy: Option<Url>) {
        self.proxy = proxy;
    }

    pub fn proxy(&self) -> Option<&Url> {
        self.proxy.as_ref()
    }

    /// Credentials are kept only when both parts are present.
    pub fn set_proxy_credentials(&mut self, user: Option<String>, password: Option<String>) {
        self.proxy_credentials = proxy_credentials(user, password);
    }

    /// The jar shared by every transport this factory creates.
    pub fn cookie_jar(&self) -> &CookieJar {
        &self.jar
    }

    /// A new transport for exactly one call.
    ///
    /// Proxy credentials are only attached when a proxy is configured.
    pub fn get_transport(&self) -> Transport {
        let proxy = self.proxy.clone().map(|address| ProxyConfig {
            address,
            credentials: self.proxy_credentials.clone(),
        });
        Transport::new(self.client.clone(), self.config.clone(), proxy, self.jar.clone())
    }
}

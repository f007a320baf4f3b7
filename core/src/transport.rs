//! One XML-RPC exchange over HTTP.
//!
//! # Design
//! A `Transport` wraps an `HttpClient` and adds two concerns around it:
//!
//! - before send: target Basic auth, proxy Basic auth, and replay of the
//!   session cookies. The proxy credentials also travel to the client inside
//!   `ProxyConfig`, so a tunnelling client can present them on `CONNECT`.
//! - after receive: capture of `Set-Cookie` headers into the shared jar.
//!
//! A transport serves exactly one call and walks through
//! `Created -> Connected -> HeadersInitialized -> Succeeded | Faulted -> Closed`.
//! Closing harvests cookies and happens on the fault path as well, because a
//! response that carries a fault (or an error status) may still set cookies.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::codec::{self, MethodResponse};
use crate::config::Credentials;
use crate::cookies::CookieJar;
use crate::error::RemoteFault;
use crate::fault::{Fault, StatusError};
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use crate::value::{Params, Value};

/// Target-side settings shared by every transport of one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub endpoint: Url,
    pub credentials: Option<Credentials>,
    pub user_agent: String,
    pub no_cache: bool,
}

/// An upstream proxy and, optionally, its Basic credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyConfig {
    pub address: Url,
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Created,
    Connected,
    HeadersInitialized,
    Succeeded,
    Faulted,
    Closed,
}

/// Configuration or usage problems detected before any bytes are sent.
#[derive(Debug, Error)]
pub enum TransportSetupError {
    /// Authenticating to a proxy while tunnelling TLS to the target is not
    /// supported. The call fails instead of dropping either the credentials
    /// or the encryption.
    #[error("proxy authentication is not supported for https targets ({endpoint})")]
    ProxyAuthOverTls { endpoint: String },

    #[error("transport already used; obtain a new one from the factory")]
    AlreadyUsed,
}

/// Upper bound on the response text quoted in status errors.
const MAX_REASON_CHARS: usize = 200;

pub struct Transport {
    client: Arc<dyn HttpClient>,
    config: Arc<TransportConfig>,
    proxy: Option<ProxyConfig>,
    jar: CookieJar,
    state: TransportState,
    response: Option<HttpResponse>,
}

impl Transport {
    pub fn new(
        client: Arc<dyn HttpClient>,
        config: Arc<TransportConfig>,
        proxy: Option<ProxyConfig>,
        jar: CookieJar,
    ) -> Self {
        Self {
            client,
            config,
            proxy,
            jar,
            state: TransportState::Created,
            response: None,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn proxy(&self) -> Option<&ProxyConfig> {
        self.proxy.as_ref()
    }

    /// Perform the call and close the transport.
    pub fn send(&mut self, method_name: &str, params: &Params) -> Result<Value, Fault> {
        let outcome = self.exchange(method_name, params);
        if self.state != TransportState::Closed {
            self.state = match outcome {
                Ok(_) => TransportState::Succeeded,
                Err(_) => TransportState::Faulted,
            };
        }
        self.close();
        outcome
    }

    /// Harvest cookies from the last response. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.state == TransportState::Closed {
            return;
        }
        if let Some(response) = self.response.take() {
            self.after_receive(&response);
        }
        self.state = TransportState::Closed;
    }

    fn exchange(&mut self, method_name: &str, params: &Params) -> Result<Value, Fault> {
        self.open()?;

        let mut request = HttpRequest {
            url: self.config.endpoint.to_string(),
            headers: Vec::new(),
            body: codec::encode_call(method_name, &[Value::Struct(params.clone())])
                .map_err(|e| Fault::network(None, e))?,
        };
        self.before_send(&mut request);

        let response = self
            .client
            .execute(&request, self.proxy.as_ref())
            .map_err(|e| Fault::network(None, e))?;

        let outcome = interpret(&response);
        self.response = Some(response);
        outcome
    }

    fn open(&mut self) -> Result<(), Fault> {
        if self.state != TransportState::Created {
            return Err(Fault::network(None, TransportSetupError::AlreadyUsed));
        }
        self.state = TransportState::Connected;

        let authenticated_proxy = self.proxy.as_ref().is_some_and(|p| p.credentials.is_some());
        if authenticated_proxy && self.config.endpoint.scheme() == "https" {
            return Err(Fault::network(
                None,
                TransportSetupError::ProxyAuthOverTls {
                    endpoint: self.config.endpoint.to_string(),
                },
            ));
        }
        Ok(())
    }

    fn before_send(&mut self, request: &mut HttpRequest) {
        request.set_header("Content-Type", "text/xml");
        request.set_header("User-Agent", self.config.user_agent.as_str());
        if self.config.no_cache {
            request.set_header("Pragma", "no-cache");
            request.set_header("Cache-Control", "no-cache");
        }
        if let Some(credentials) = &self.config.credentials {
            request.set_header("Authorization", credentials.basic_header_value());
        }
        if let Some(credentials) = self.proxy.as_ref().and_then(|p| p.credentials.as_ref()) {
            request.set_header("Proxy-Authorization", credentials.basic_header_value());
        }
        if let Some(cookies) = self.jar.header_value() {
            request.set_header("Cookie", cookies);
        }
        self.state = TransportState::HeadersInitialized;
    }

    fn after_receive(&self, response: &HttpResponse) {
        if self.jar.capture(response.header_values("Set-Cookie")) {
            debug!(count = self.jar.len(), "captured session cookies");
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}

fn interpret(response: &HttpResponse) -> Result<Value, Fault> {
    if !response.is_success() {
        let reason: String = response.body.trim().chars().take(MAX_REASON_CHARS).collect();
        return Err(Fault::network(
            Some(response.status),
            StatusError {
                status: response.status,
                reason,
            },
        ));
    }

    match codec::decode_response(&response.body) {
        Ok(MethodResponse::Success(value)) => Ok(value),
        Ok(MethodResponse::Fault { code, message }) => {
            Err(Fault::Protocol(RemoteFault { code, message }))
        }
        Err(e) => Err(Fault::network(None, e)),
    }
}

//! Entry point for talking to a tracker installation.
//!
//! # Design
//! `BugzillaConnector` owns the session: the token from the last login and,
//! through its transport factory, the cookie jar. It is a plain value with no
//! interior locking. Callers that share one connector across threads wrap it
//! in their own `Mutex`; otherwise the token is last-writer-wins.
//!
//! `connect` only validates and stores configuration. The first network
//! round trip happens in `execute`.

use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use crate::config::ConnectOptions;
use crate::cookies::CookieJar;
use crate::error::BugzillaError;
use crate::factory::TransportFactory;
use crate::fault::classify;
use crate::http::{HttpClient, HttpSettings, UreqClient};
use crate::method::Method;
use crate::transport::TransportConfig;
use crate::value::{Params, ResultMap, Value};

/// Path of the XML-RPC endpoint below the installation root.
pub const RPC_PATH: &str = "xmlrpc.cgi";

/// Parameter carrying the session token on every call after login.
pub const TOKEN_PARAM: &str = "Bugzilla_token";

pub struct BugzillaConnector {
    client: Arc<dyn HttpClient>,
    settings: HttpSettings,
    factory: Option<TransportFactory>,
    token: Option<String>,
}

impl Default for BugzillaConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl BugzillaConnector {
    pub fn new() -> Self {
        Self::with_settings(HttpSettings::default())
    }

    pub fn with_settings(settings: HttpSettings) -> Self {
        let client = Arc::new(UreqClient::new(settings.clone()));
        Self {
            client,
            settings,
            factory: None,
            token: None,
        }
    }

    /// Use a custom HTTP client. `settings` still supplies the user agent and
    /// cache headers.
    pub fn with_client(client: Arc<dyn HttpClient>, settings: HttpSettings) -> Self {
        Self {
            client,
            settings,
            factory: None,
            token: None,
        }
    }

    /// Connect without HTTP authentication or proxy.
    pub fn connect_to(&mut self, endpoint: &str) -> Result<(), BugzillaError> {
        self.connect(endpoint, ConnectOptions::default())
    }

    /// Designate the installation to talk to.
    ///
    /// `endpoint` may be the installation root or the full `xmlrpc.cgi` URL.
    /// Fails with `BugzillaError::Connection` if it (or the proxy address)
    /// is not a usable URL; nothing is sent either way. Reconnecting starts
    /// a fresh cookie jar but keeps the session token.
    pub fn connect(
        &mut self,
        endpoint: &str,
        options: ConnectOptions,
    ) -> Result<(), BugzillaError> {
        let endpoint = normalize_endpoint(endpoint)?;
        let proxy = options.proxy.as_deref().map(parse_proxy).transpose()?;

        let config = TransportConfig {
            endpoint,
            credentials: options.http_credentials(),
            user_agent: self.settings.user_agent.clone(),
            no_cache: self.settings.no_cache,
        };
        let mut factory = TransportFactory::new(self.client.clone(), config);
        factory.set_proxy(proxy);
        factory.set_proxy_credentials(options.proxy_user, options.proxy_password);

        info!(
            host = factory.config().endpoint.host_str().unwrap_or_default(),
            path = factory.config().endpoint.path(),
            proxy = ?factory.proxy().and_then(Url::host_str),
            "connector configured"
        );
        self.factory = Some(factory);
        Ok(())
    }

    /// Execute `method` against the connected installation.
    ///
    /// On success the method receives its result; a login-kind method also
    /// replaces the stored session token. On failure the method is left
    /// untouched and the call had no effect.
    pub fn execute<M: Method + ?Sized>(&mut self, method: &mut M) -> Result<(), BugzillaError> {
        let factory = self
            .factory
            .as_ref()
            .ok_or(BugzillaError::IllegalState("cannot execute a method without connecting"))?;

        let span = tracing::debug_span!("execute", method = method.name());
        let _enter = span.enter();

        let params = self.outbound_parameters(method.parameters());
        let mut transport = factory.get_transport();
        let value = transport.send(method.name(), &params).map_err(|fault| {
            let err = classify(fault);
            warn!(error = %err, "call failed");
            err
        })?;

        method.set_result(ResultMap::from_response(value));

        if let Some(login) = method.as_login() {
            let token = login.token().map(str::to_string);
            debug!(has_token = token.is_some(), "session token refreshed");
            self.token = token;
        }
        Ok(())
    }

    /// Override the session token without logging in.
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.factory.is_some()
    }

    /// The normalized endpoint, once connected.
    pub fn endpoint(&self) -> Option<&Url> {
        self.factory.as_ref().map(|f| &f.config().endpoint)
    }

    /// Session cookies captured so far, once connected.
    pub fn cookie_jar(&self) -> Option<&CookieJar> {
        self.factory.as_ref().map(TransportFactory::cookie_jar)
    }

    /// Change the proxy for subsequent calls. `None` disables it.
    pub fn set_proxy(&mut self, proxy: Option<&str>) -> Result<(), BugzillaError> {
        let proxy = proxy.map(parse_proxy).transpose()?;
        self.factory_mut()?.set_proxy(proxy);
        Ok(())
    }

    /// Change the proxy credentials for subsequent calls.
    pub fn set_proxy_credentials(
        &mut self,
        user: Option<String>,
        password: Option<String>,
    ) -> Result<(), BugzillaError> {
        self.factory_mut()?.set_proxy_credentials(user, password);
        Ok(())
    }

    fn factory_mut(&mut self) -> Result<&mut TransportFactory, BugzillaError> {
        self.factory
            .as_mut()
            .ok_or(BugzillaError::IllegalState("cannot configure a proxy without connecting"))
    }

    /// Token first, then the method's own parameters, which win on collision.
    fn outbound_parameters(&self, method_params: Params) -> Params {
        let mut params = Params::new();
        if let Some(token) = &self.token {
            params.insert(TOKEN_PARAM.to_string(), Value::from(token.as_str()));
        }
        params.extend(method_params);
        params
    }
}

/// Append the XML-RPC path unless `host` already ends with it, then parse.
pub fn normalize_endpoint(host: &str) -> Result<Url, BugzillaError> {
    let mut endpoint = host.to_string();
    if !endpoint.ends_with(&format!("/{RPC_PATH}")) {
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        endpoint.push_str(RPC_PATH);
    }

    let url = Url::parse(&endpoint).map_err(|e| BugzillaError::Connection {
        message: format!("host URL is malformed; URL supplied was {endpoint}"),
        source: Some(e),
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(BugzillaError::Connection {
            message: format!("host URL must be an http(s) URL; URL supplied was {endpoint}"),
            source: None,
        });
    }
    Ok(url)
}

/// Parse a proxy address; a bare `host:port` is taken as an HTTP proxy.
fn parse_proxy(address: &str) -> Result<Url, BugzillaError> {
    let candidate = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    };
    Url::parse(&candidate)
        .ok()
        .filter(|url| url.host_str().is_some())
        .ok_or_else(|| BugzillaError::Connection {
            message: format!("proxy address is malformed: {address}"),
            source: Url::parse(&candidate).err(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::http::HttpResponse;
    use crate::transport::tests::{ok_response, xml_ok, RecordingClient};
    use crate::types::{LogIn, RawMethod};

    fn unconnected() -> BugzillaConnector {
        BugzillaConnector::with_client(
            RecordingClient::with_responses(Vec::new()),
            HttpSettings::default(),
        )
    }

    fn connected(client: Arc<RecordingClient>) -> BugzillaConnector {
        let mut connector = BugzillaConnector::with_client(client, HttpSettings::default());
        connector.connect_to("http://bugs.local").unwrap();
        connector
    }

    fn login_response(token: &str) -> HttpResponse {
        ok_response(
            &format!(
                "<member><name>id</name><value><int>1</int></value></member>\
                 <member><name>token</name><value><string>{token}</string></value></member>"
            ),
            &[],
        )
    }

    #[test]
    fn normalize_appends_path_once() {
        for host in ["http://bugs.local", "http://bugs.local/", "http://bugs.local/xmlrpc.cgi"] {
            assert_eq!(
                normalize_endpoint(host).unwrap().as_str(),
                "http://bugs.local/xmlrpc.cgi",
                "{host}"
            );
        }
        assert_eq!(
            normalize_endpoint("https://example.org/bugzilla").unwrap().as_str(),
            "https://example.org/bugzilla/xmlrpc.cgi"
        );
    }

    #[test]
    fn malformed_endpoint_is_connection_error() {
        for host in ["not a url", "bugs.local", "ftp://bugs.local", "mailto:ops@bugs.local"] {
            let err = normalize_endpoint(host).unwrap_err();
            assert!(matches!(err, BugzillaError::Connection { .. }), "{host}: {err:?}");
        }
    }

    #[test]
    fn connect_with_bad_endpoint_sends_nothing() {
        let client = RecordingClient::with_responses(Vec::new());
        let mut connector = BugzillaConnector::with_client(client.clone(), HttpSettings::default());
        assert!(matches!(
            connector.connect_to("::nonsense::"),
            Err(BugzillaError::Connection { .. })
        ));
        assert!(!connector.is_connected());
        assert!(client.requests().is_empty());
    }

    #[test]
    fn connect_with_bad_proxy_is_connection_error() {
        let mut connector = unconnected();
        let err = connector
            .connect("http://bugs.local", ConnectOptions::new().proxy("http://"))
            .unwrap_err();
        assert!(matches!(err, BugzillaError::Connection { .. }));
    }

    #[test]
    fn connect_does_no_io() {
        let client = RecordingClient::with_responses(Vec::new());
        let connector = connected(client.clone());
        assert!(connector.is_connected());
        assert_eq!(connector.endpoint().unwrap().as_str(), "http://bugs.local/xmlrpc.cgi");
        assert!(client.requests().is_empty());
    }

    #[test]
    fn execute_before_connect_is_illegal_state() {
        let mut connector = unconnected();
        let err = connector.execute(&mut RawMethod::new("Bugzilla.version")).unwrap_err();
        assert!(matches!(err, BugzillaError::IllegalState(_)));
        let err = connector.execute(&mut LogIn::new("a", "b")).unwrap_err();
        assert!(matches!(err, BugzillaError::IllegalState(_)));
    }

    #[test]
    fn login_token_is_stored_and_replayed() {
        let client =
            RecordingClient::with_responses(vec![login_response("T"), ok_response("", &[])]);
        let mut connector = connected(client.clone());

        let mut login = LogIn::new("alice", "pw");
        connector.execute(&mut login).unwrap();
        assert_eq!(connector.token(), Some("T"));

        connector.execute(&mut RawMethod::new("Bug.get").param("ids", 1)).unwrap();
        let requests = client.requests();
        assert!(!requests[0].0.body.contains(TOKEN_PARAM));
        assert!(requests[1].0.body.contains(
            "<member><name>Bugzilla_token</name><value><string>T</string></value></member>"
        ));
    }

    #[test]
    fn method_parameters_win_over_token() {
        let client = RecordingClient::with_responses(vec![ok_response("", &[])]);
        let mut connector = connected(client.clone());
        connector.set_token("session");

        connector
            .execute(&mut RawMethod::new("Bug.get").param(TOKEN_PARAM, "override"))
            .unwrap();
        let body = &client.requests()[0].0.body;
        assert!(body.contains("<string>override</string>"));
        assert!(!body.contains("<string>session</string>"));
    }

    #[test]
    fn non_struct_result_becomes_empty_map() {
        let client = RecordingClient::with_responses(vec![HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: "<methodResponse><params><param>\
                <value><string>ok</string></value>\
                </param></params></methodResponse>"
                .to_string(),
        }]);
        let mut connector = connected(client);
        let mut method = RawMethod::new("Test.scalar");
        connector.execute(&mut method).unwrap();
        assert!(method.result().unwrap().is_empty());
    }

    #[test]
    fn repeated_execution_yields_independent_results() {
        let client = RecordingClient::with_responses(vec![
            ok_response("<member><name>n</name><value><int>1</int></value></member>", &[]),
            ok_response("<member><name>n</name><value><int>2</int></value></member>", &[]),
        ]);
        let mut connector = connected(client);
        let mut method = RawMethod::new("Test.counter");

        connector.execute(&mut method).unwrap();
        let first = method.result().unwrap().clone();
        connector.execute(&mut method).unwrap();
        let second = method.result().unwrap().clone();

        assert_eq!(first.get("n"), Some(&Value::Int(1)));
        assert_eq!(second.get("n"), Some(&Value::Int(2)));
        assert!(!first.ptr_eq(&second));
    }

    #[test]
    fn failed_call_leaves_method_and_token_untouched() {
        let client = RecordingClient::with_responses(vec![HttpResponse {
            status: 503,
            headers: Vec::new(),
            body: String::new(),
        }]);
        let mut connector = connected(client);
        connector.set_token("keep");

        let mut login = LogIn::new("alice", "pw");
        let err = connector.execute(&mut login).unwrap_err();
        assert!(matches!(err, BugzillaError::Transport { status: Some(503), .. }));
        assert!(login.result().is_none());
        assert_eq!(connector.token(), Some("keep"));
    }

    #[test]
    fn protocol_fault_is_protocol_error() {
        let body = "<methodResponse><fault><value><struct>\
            <member><name>faultCode</name><value><int>300</int></value></member>\
            <member><name>faultString</name>\
            <value><string>Invalid login or password.</string></value></member>\
            </struct></value></fault></methodResponse>";
        let client = RecordingClient::with_responses(vec![HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        }]);
        let mut connector = connected(client);
        let err = connector.execute(&mut LogIn::new("alice", "wrong")).unwrap_err();
        assert_eq!(err.fault_code(), Some(300));
        assert!(connector.token().is_none());
    }

    #[test]
    fn refused_connection_is_transport_error_without_status() {
        let mut connector = connected(RecordingClient::with_responses(Vec::new()));
        let err = connector.execute(&mut RawMethod::new("Bugzilla.version")).unwrap_err();
        assert!(matches!(err, BugzillaError::Transport { status: None, .. }));
    }

    #[test]
    fn proxy_settings_reach_the_wire() {
        let client =
            RecordingClient::with_responses(vec![ok_response("", &[]), ok_response("", &[])]);
        let mut connector = BugzillaConnector::with_client(client.clone(), HttpSettings::default());
        connector
            .connect(
                "http://bugs.local",
                ConnectOptions::new().proxy("proxy.local:3128").proxy_auth("u", "p"),
            )
            .unwrap();
        connector.execute(&mut RawMethod::new("Bugzilla.version")).unwrap();

        connector.set_proxy(None).unwrap();
        connector.execute(&mut RawMethod::new("Bugzilla.version")).unwrap();

        let requests = client.requests();
        assert_eq!(requests[0].0.header("Proxy-Authorization"), Some("Basic dTpw"));
        let proxy = requests[0].1.as_ref().unwrap();
        assert_eq!(proxy.address.as_str(), "http://proxy.local:3128/");
        assert_eq!(proxy.credentials, Some(Credentials::new("u", "p")));
        assert!(requests[1].0.header("Proxy-Authorization").is_none());
        assert!(requests[1].1.is_none());
    }

    #[test]
    fn https_target_with_proxy_auth_fails_explicitly() {
        let client = RecordingClient::with_responses(vec![ok_response("", &[])]);
        let mut connector = BugzillaConnector::with_client(client.clone(), HttpSettings::default());
        connector
            .connect(
                "https://bugs.local",
                ConnectOptions::new().proxy("proxy.local:3128").proxy_auth("u", "p"),
            )
            .unwrap();
        let err = connector.execute(&mut RawMethod::new("Bugzilla.version")).unwrap_err();
        assert!(err.requires_reconnect());
        assert!(err.to_string().contains("proxy authentication"));
        assert!(client.requests().is_empty());
    }

    #[test]
    fn cookies_from_login_are_replayed() {
        let client = RecordingClient::with_responses(vec![
            ok_response(
                "<member><name>token</name><value><string>1-x</string></value></member>",
                &["a=1", "b=2"],
            ),
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: xml_ok(""),
            },
        ]);
        let mut connector = connected(client.clone());
        connector.execute(&mut LogIn::new("alice", "pw")).unwrap();
        connector.execute(&mut RawMethod::new("Bug.get")).unwrap();

        assert_eq!(client.requests()[1].0.header("Cookie"), Some("a=1,b=2"));
        assert_eq!(connector.cookie_jar().unwrap().len(), 2);
    }

    #[test]
    fn proxy_mutators_require_connection() {
        let mut connector = BugzillaConnector::new();
        assert!(matches!(
            connector.set_proxy(Some("proxy:1")),
            Err(BugzillaError::IllegalState(_))
        ));
        assert!(matches!(
            connector.set_proxy_credentials(None, None),
            Err(BugzillaError::IllegalState(_))
        ));
    }
}

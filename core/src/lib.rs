//! Blocking XML-RPC client core for Bugzilla installations.
//!
//! # Overview
//! `BugzillaConnector` turns `Method` values into XML-RPC calls, carries the
//! session (login token and cookies) from one call to the next, and reports
//! every failure as one `BugzillaError` variant.
//!
//! # Design
//! - `connect` validates and stores configuration; it never touches the
//!   network.
//! - Each `execute` gets a fresh `Transport` from the `TransportFactory`.
//!   The transport owns one HTTP exchange; the factory owns what outlives it
//!   (proxy settings and the session cookie jar).
//! - The transport reports failures as a raw `Fault`; the connector
//!   classifies each one exactly once.
//! - Actual HTTP I/O sits behind the `HttpClient` trait. `UreqClient` is the
//!   default; tests plug in a recording stub.
//!
//! ```no_run
//! use bugzilla_core::{BugzillaConnector, LogIn, RawMethod, Value};
//!
//! # fn main() -> Result<(), bugzilla_core::BugzillaError> {
//! let mut connector = BugzillaConnector::new();
//! connector.connect_to("https://bugzilla.example.org")?;
//! connector.execute(&mut LogIn::new("bot@example.org", "secret"))?;
//!
//! let mut bug = RawMethod::new("Bug.get").param("ids", vec![Value::Int(1)]);
//! connector.execute(&mut bug)?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod connector;
pub mod cookies;
pub mod error;
pub mod factory;
pub mod fault;
pub mod http;
pub mod method;
pub mod transport;
pub mod types;
pub mod value;

pub use config::{ConnectOptions, Credentials};
pub use connector::{normalize_endpoint, BugzillaConnector, RPC_PATH, TOKEN_PARAM};
pub use cookies::CookieJar;
pub use error::{BugzillaError, RemoteFault};
pub use factory::TransportFactory;
pub use fault::{classify, Fault};
pub use http::{HttpClient, HttpClientError, HttpRequest, HttpResponse, HttpSettings, UreqClient};
pub use method::{LoginMethod, Method};
pub use transport::{ProxyConfig, Transport, TransportConfig, TransportState};
pub use types::{LogIn, LogOut, RawMethod};
pub use value::{Params, ResultMap, Value};

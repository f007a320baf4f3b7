//! Error types surfaced to callers of the connector.
//!
//! # Design
//! Every failure leaves the crate as exactly one `BugzillaError` variant. The
//! variant tells the caller what to do next: fix the endpoint
//! (`Connection`), fix the request (`Protocol`), reconnect (`Transport`), or
//! fix the calling code (`IllegalState`). Nothing in this crate retries.

use thiserror::Error;

/// Boxed underlying cause of a transport-level failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A fault reported by the tracker inside a well-formed XML-RPC response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fault {code}: {message}")]
pub struct RemoteFault {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum BugzillaError {
    /// The endpoint (or proxy address) could not be turned into a URL. No
    /// network request was attempted.
    #[error("{message}")]
    Connection {
        message: String,
        #[source]
        source: Option<url::ParseError>,
    },

    /// The tracker rejected the request. The call had no effect and may be
    /// retried once the request is corrected.
    #[error("the tracker rejected the call ({code}): {message}")]
    Protocol {
        code: i32,
        message: String,
        #[source]
        source: RemoteFault,
    },

    /// The HTTP exchange failed. `status` is `None` when no HTTP status was
    /// received at all. The session should be considered broken.
    #[error("{}", transport_message(*status, source))]
    Transport {
        status: Option<u16>,
        #[source]
        source: BoxError,
    },

    /// The connector was used out of order.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),
}

fn transport_message(status: Option<u16>, source: &BoxError) -> String {
    match status {
        Some(status) => format!("HTTP {status} from tracker: {source}"),
        None => format!("transport failure: {source}"),
    }
}

impl BugzillaError {
    /// HTTP status of a transport failure, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            BugzillaError::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Fault code of a protocol failure.
    pub fn fault_code(&self) -> Option<i32> {
        match self {
            BugzillaError::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether repeating the call can succeed without reconnecting.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BugzillaError::Protocol { .. })
    }

    /// Whether the caller should reconnect before issuing further calls.
    pub fn requires_reconnect(&self) -> bool {
        matches!(self, BugzillaError::Transport { .. })
    }
}

//! Raw call failures and their classification.
//!
//! `Transport::send` reports failures as a `Fault`. The connector classifies
//! each one exactly once, at its boundary, into the public `BugzillaError`.

use std::fmt;

use thiserror::Error;

use crate::error::{BoxError, BugzillaError, RemoteFault};

/// A failed call as observed by the transport.
#[derive(Debug)]
pub enum Fault {
    /// The exchange failed below the XML-RPC layer.
    Network { status: Option<u16>, cause: BoxError },

    /// The tracker answered with an XML-RPC fault.
    Protocol(RemoteFault),
}

impl Fault {
    pub fn network(status: Option<u16>, cause: impl Into<BoxError>) -> Self {
        Fault::Network {
            status,
            cause: cause.into(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Network { status: Some(status), cause } => write!(f, "HTTP {status}: {cause}"),
            Fault::Network { status: None, cause } => write!(f, "network failure: {cause}"),
            Fault::Protocol(fault) => write!(f, "{fault}"),
        }
    }
}

/// The tracker answered with a non-2xx status.
#[derive(Debug, Error)]
#[error("unexpected HTTP status {status}: {reason}")]
pub struct StatusError {
    pub status: u16,
    pub reason: String,
}

/// Map a raw failure onto the caller-facing error taxonomy.
pub fn classify(fault: Fault) -> BugzillaError {
    match fault {
        Fault::Network { status, cause } => BugzillaError::Transport { status, source: cause },
        Fault::Protocol(remote) => BugzillaError::Protocol {
            code: remote.code,
            message: remote.message.clone(),
            source: remote,
        },
    }
}

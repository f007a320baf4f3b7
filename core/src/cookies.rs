//! Session-scoped cookie jar.
//!
//! # Design
//! The jar is a shared handle. The transport factory owns one and hands a
//! clone to every transport it creates, so cookies captured during the login
//! call are replayed on every later call made through the same connector.
//! Values are stored and replayed verbatim; attributes such as `Path` or
//! `Expires` are not interpreted.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `values` if the jar is still empty.
    ///
    /// Returns `true` when something was captured. Once populated the jar is
    /// never refreshed.
    pub fn capture<I, S>(&self, values: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entries = self.lock();
        if !entries.is_empty() {
            return false;
        }
        entries.extend(values.into_iter().map(Into::into));
        !entries.is_empty()
    }

    /// The outbound `Cookie` header value, or `None` when nothing was captured.
    pub fn header_value(&self) -> Option<String> {
        let entries = self.lock();
        if entries.is_empty() {
            None
        } else {
            Some(entries.join(","))
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        // every write completes before the guard drops, so poisoning is ignored
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//! Contract between the connector and the remote methods it executes.
//!
//! A method supplies its name and request parameters, and receives the
//! result mapping after a successful call. Login-style methods additionally
//! expose the session token extracted from their result, which the connector
//! stores and sends with every later call.

use crate::value::{Params, ResultMap};

pub trait Method {
    /// Remote procedure name, e.g. `Bug.get`.
    fn name(&self) -> &str;

    /// Request parameters for the next call.
    fn parameters(&self) -> Params;

    /// Called once per successful execution with the call's result.
    fn set_result(&mut self, result: ResultMap);

    /// `Some` for methods whose result establishes a session.
    fn as_login(&self) -> Option<&dyn LoginMethod> {
        None
    }
}

pub trait LoginMethod: Method {
    /// Session token from the most recent result, if any.
    fn token(&self) -> Option<&str>;
}

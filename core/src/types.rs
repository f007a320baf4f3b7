//! Ready-made methods for session handling and ad-hoc calls.
//!
//! # Design
//! Individual tracker methods (search, create, comment, ...) are thin
//! wrappers over a parameter map and live with the caller. Only the methods
//! the connector's session handling depends on are provided here, plus
//! `RawMethod` for anything else.

use crate::method::{LoginMethod, Method};
use crate::value::{Params, ResultMap, Value};

/// `User.login`: authenticates and yields the session token.
#[derive(Debug, Clone)]
pub struct LogIn {
    login: String,
    password: String,
    remember: Option<bool>,
    result: Option<ResultMap>,
}

impl LogIn {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
            remember: None,
            result: None,
        }
    }

    /// Ask the tracker to keep the login valid across browser sessions.
    pub fn remember(mut self, remember: bool) -> Self {
        self.remember = Some(remember);
        self
    }

    /// Numeric id of the authenticated user.
    pub fn user_id(&self) -> Option<i32> {
        self.result.as_ref()?.get("id").and_then(Value::as_i32)
    }

    pub fn result(&self) -> Option<&ResultMap> {
        self.result.as_ref()
    }
}

impl Method for LogIn {
    fn name(&self) -> &str {
        "User.login"
    }

    fn parameters(&self) -> Params {
        let mut params = Params::new();
        params.insert("login".to_string(), Value::from(self.login.as_str()));
        params.insert("password".to_string(), Value::from(self.password.as_str()));
        if let Some(remember) = self.remember {
            params.insert("remember".to_string(), Value::from(remember));
        }
        params
    }

    fn set_result(&mut self, result: ResultMap) {
        self.result = Some(result);
    }

    fn as_login(&self) -> Option<&dyn LoginMethod> {
        Some(self)
    }
}

impl LoginMethod for LogIn {
    fn token(&self) -> Option<&str> {
        self.result.as_ref()?.get("token").and_then(Value::as_str)
    }
}

/// `User.logout`: ends the session on the tracker side.
#[derive(Debug, Clone, Default)]
pub struct LogOut {
    result: Option<ResultMap>,
}

impl LogOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self) -> bool {
        self.result.is_some()
    }
}

impl Method for LogOut {
    fn name(&self) -> &str {
        "User.logout"
    }

    fn parameters(&self) -> Params {
        Params::new()
    }

    fn set_result(&mut self, result: ResultMap) {
        self.result = Some(result);
    }
}

/// Any method, described by name and parameters.
#[derive(Debug, Clone)]
pub struct RawMethod {
    name: String,
    params: Params,
    result: Option<ResultMap>,
}

impl RawMethod {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Params::new(),
            result: None,
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn result(&self) -> Option<&ResultMap> {
        self.result.as_ref()
    }
}

impl Method for RawMethod {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> Params {
        self.params.clone()
    }

    fn set_result(&mut self, result: ResultMap) {
        self.result = Some(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_parameters() {
        let login = LogIn::new("alice@example.com", "hunter2").remember(true);
        let params = login.parameters();
        assert_eq!(params["login"], Value::from("alice@example.com"));
        assert_eq!(params["password"], Value::from("hunter2"));
        assert_eq!(params["remember"], Value::Boolean(true));
        assert_eq!(login.name(), "User.login");
    }

    #[test]
    fn login_token_is_read_from_result() {
        let mut login = LogIn::new("alice", "pw");
        assert!(login.token().is_none());

        let mut result = Params::new();
        result.insert("id".to_string(), Value::Int(4));
        result.insert("token".to_string(), Value::from("4-Zx9"));
        login.set_result(ResultMap::new(result));

        assert_eq!(login.token(), Some("4-Zx9"));
        assert_eq!(login.user_id(), Some(4));
        assert!(login.as_login().is_some());
    }

    #[test]
    fn non_login_methods_are_not_login_kind() {
        assert!(LogOut::new().as_login().is_none());
        assert!(RawMethod::new("Bug.get").as_login().is_none());
    }

    #[test]
    fn raw_method_collects_params() {
        let method = RawMethod::new("Bug.get")
            .param("ids", vec![Value::Int(1)])
            .param("permissive", true);
        assert_eq!(method.name(), "Bug.get");
        let params = method.parameters();
        assert_eq!(params.len(), 2);
        assert_eq!(params["permissive"], Value::Boolean(true));
    }
}

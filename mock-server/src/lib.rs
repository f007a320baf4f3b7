use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use quick_xml::{escape::escape, events::Event, Reader};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Password accepted for every known account.
pub const PASSWORD: &str = "secret";

/// Known accounts: login name and user id.
pub const USERS: &[(&str, i32)] = &[("alice@example.com", 1), ("bob@example.com", 2)];

/// Session tokens issued by `User.login`, mapped to the user id.
pub type Sessions = Arc<RwLock<HashMap<String, i32>>>;

/// A decoded `<methodCall>`: the method name and the scalar members of the
/// first struct parameter, as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub method: String,
    pub params: HashMap<String, String>,
}

pub fn app() -> Router {
    let sessions: Sessions = Arc::new(RwLock::new(HashMap::new()));
    Router::new().route("/xmlrpc.cgi", post(rpc)).with_state(sessions)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn rpc(State(sessions): State<Sessions>, headers: HeaderMap, body: String) -> Response {
    let Some(call) = parse_call(&body) else {
        return xml(fault(-32700, "parse error: not well formed"));
    };
    tracing::debug!(method = %call.method, "rpc call");

    match call.method.as_str() {
        "User.login" => login(&sessions, &call).await,
        "User.logout" => {
            if let Some(token) = call.params.get("Bugzilla_token") {
                sessions.write().await.remove(token);
            }
            xml(success(""))
        }
        "Bugzilla.version" => xml(success(&member_str("version", "5.0.4"))),
        "Bug.get" => {
            let known = match call.params.get("Bugzilla_token") {
                Some(token) => sessions.read().await.contains_key(token),
                None => false,
            };
            if !known {
                return xml(fault(410, "You must log in before using this part of Bugzilla."));
            }
            let bug = format!("{}{}", member_int("id", 1), member_str("summary", "Mock bug"));
            xml(success(&format!(
                "<member><name>bugs</name><value><array><data>\
                 <value><struct>{bug}</struct></value>\
                 </data></array></value></member>"
            )))
        }
        "Test.echo" => {
            let mut members: Vec<_> = call.params.iter().collect();
            members.sort();
            let mut out: String = members.iter().map(|(k, v)| member_str(k, v)).collect();
            let cookie = headers
                .get(header::COOKIE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            out.push_str(&member_str("cookie", cookie));
            xml(success(&out))
        }
        "Test.scalar" => xml(
            "<methodResponse><params><param>\
             <value><string>ok</string></value>\
             </param></params></methodResponse>"
                .to_string(),
        ),
        "Test.unavailable" => {
            (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response()
        }
        other => xml(fault(-32601, &format!("Can't locate object method \"{other}\""))),
    }
}

async fn login(sessions: &Sessions, call: &Call) -> Response {
    let login = call.params.get("login").map(String::as_str).unwrap_or_default();
    let password = call.params.get("password").map(String::as_str).unwrap_or_default();
    let user = USERS.iter().find(|(name, _)| *name == login);

    let Some((_, id)) = user.filter(|_| password == PASSWORD) else {
        return xml(fault(300, "The username or password you entered is not valid."));
    };

    let secret = Uuid::new_v4().simple().to_string();
    let token = format!("{id}-{secret}");
    sessions.write().await.insert(token.clone(), *id);

    let members = format!("{}{}", member_int("id", *id), member_str("token", &token));
    let mut response = xml(success(&members));
    for cookie in [format!("Bugzilla_login={id}"), format!("Bugzilla_logincookie={secret}")] {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

/// Extract the method name and top-level struct members from a call body.
pub fn parse_call(body: &str) -> Option<Call> {
    let mut reader = Reader::from_str(body);
    let mut stack: Vec<String> = Vec::new();
    let mut struct_depth = 0usize;
    let mut method = None;
    let mut name: Option<String> = None;
    let mut params = HashMap::new();

    loop {
        match reader.read_event().ok()? {
            Event::Start(start) => {
                let tag = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                if tag == "struct" {
                    struct_depth += 1;
                }
                stack.push(tag);
            }
            Event::End(_) => match stack.pop().as_deref() {
                Some("struct") => struct_depth = struct_depth.saturating_sub(1),
                Some("member") if struct_depth == 1 => name = None,
                _ => {}
            },
            Event::Text(text) => {
                let text = text.unescape().ok()?.into_owned();
                if text.trim().is_empty() {
                    continue;
                }
                match stack.last().map(String::as_str) {
                    Some("methodName") => method = Some(text.trim().to_string()),
                    Some("name") if struct_depth == 1 => name = Some(text),
                    Some(_) if struct_depth == 1 => {
                        if let Some(key) = &name {
                            params.insert(key.clone(), text);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    method.map(|method| Call { method, params })
}

fn xml(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/xml")], body).into_response()
}

fn success(members: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?><methodResponse><params><param>\
         <value><struct>{members}</struct></value>\
         </param></params></methodResponse>"
    )
}

fn fault(code: i32, message: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?><methodResponse><fault>\
         <value><struct>{}{}</struct></value>\
         </fault></methodResponse>",
        member_int("faultCode", code),
        member_str("faultString", message)
    )
}

fn member_int(name: &str, value: i32) -> String {
    format!("<member><name>{}</name><value><int>{value}</int></value></member>", escape(name))
}

fn member_str(name: &str, value: &str) -> String {
    format!(
        "<member><name>{}</name><value><string>{}</string></value></member>",
        escape(name),
        escape(value)
    )
}

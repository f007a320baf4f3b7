//! XML-RPC request encoding and response decoding.
//!
//! # Design
//! Requests are rendered straight into a `String`; the value model is small
//! enough that a writer abstraction would add nothing. Responses are first
//! read into a minimal element tree with `quick-xml` and then interpreted,
//! which keeps the type dispatch in one place instead of spreading it across
//! a streaming state machine.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

use crate::value::{Params, Value};

/// Errors raised while encoding a call or decoding a response body.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("unexpected document structure: {0}")]
    Structure(String),

    #[error("invalid <{tag}> value {text:?}")]
    InvalidScalar { tag: String, text: String },

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// XML-RPC doubles have no spelling for NaN or infinity.
    #[error("cannot encode non-finite double {0}")]
    NonFiniteDouble(f64),
}

/// A decoded `<methodResponse>`.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    Success(Value),
    Fault { code: i32, message: String },
}

/// Render a `<methodCall>` document.
pub fn encode_call(method_name: &str, params: &[Value]) -> Result<String, CodecError> {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
    out.push_str("<methodCall><methodName>");
    out.push_str(&escape(method_name));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        write_value(&mut out, param)?;
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    Ok(out)
}

fn write_value(out: &mut String, value: &Value) -> Result<(), CodecError> {
    out.push_str("<value>");
    match value {
        Value::Int(i) => out.push_str(&format!("<int>{i}</int>")),
        Value::Boolean(true) => out.push_str("<boolean>1</boolean>"),
        Value::Boolean(false) => out.push_str("<boolean>0</boolean>"),
        Value::String(s) => {
            out.push_str("<string>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</string>");
        }
        Value::Double(d) if !d.is_finite() => return Err(CodecError::NonFiniteDouble(*d)),
        Value::Double(d) => out.push_str(&format!("<double>{d}</double>")),
        Value::DateTime(s) => {
            out.push_str("<dateTime.iso8601>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</dateTime.iso8601>");
        }
        Value::Base64(bytes) => {
            out.push_str("<base64>");
            out.push_str(&STANDARD.encode(bytes));
            out.push_str("</base64>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name.as_str()));
                out.push_str("</name>");
                write_value(out, member)?;
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item)?;
            }
            out.push_str("</data></array>");
        }
        Value::Nil => out.push_str("<nil/>"),
    }
    out.push_str("</value>");
    Ok(())
}

/// Parse a `<methodResponse>` document.
pub fn decode_response(body: &str) -> Result<MethodResponse, CodecError> {
    let root = parse_tree(body)?;
    if root.name != "methodResponse" {
        return Err(CodecError::Structure(format!(
            "expected <methodResponse>, found <{}>",
            root.name
        )));
    }

    if let Some(fault) = root.child("fault") {
        let value = fault.required("value")?;
        let members = match parse_value(value)? {
            Value::Struct(members) => members,
            _ => return Err(CodecError::Structure("fault value is not a struct".to_string())),
        };
        let code = members.get("faultCode").and_then(Value::as_i32).unwrap_or_default();
        let message = members
            .get("faultString")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Ok(MethodResponse::Fault { code, message });
    }

    let value = root
        .child("params")
        .and_then(|params| params.child("param"))
        .and_then(|param| param.child("value"));
    match value {
        Some(value) => Ok(MethodResponse::Success(parse_value(value)?)),
        None => Ok(MethodResponse::Success(Value::Nil)),
    }
}

#[derive(Debug, Default)]
struct Node {
    name: String,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn named(name: String) -> Self {
        Self { name, ..Self::default() }
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    fn required(&self, name: &str) -> Result<&Node, CodecError> {
        self.child(name)
            .ok_or_else(|| CodecError::Structure(format!("<{}> has no <{name}>", self.name)))
    }
}

fn parse_tree(xml: &str) -> Result<Node, CodecError> {
    let mut reader = Reader::from_str(xml);
    let mut stack = vec![Node::default()];

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                stack.push(Node::named(name));
            }
            Event::Empty(empty) => {
                let name = String::from_utf8_lossy(empty.local_name().as_ref()).into_owned();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::named(name));
                }
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| CodecError::Structure("unbalanced end tag".to_string()))?;
                let parent = stack
                    .last_mut()
                    .ok_or_else(|| CodecError::Structure("unbalanced end tag".to_string()))?;
                parent.children.push(node);
            }
            Event::Text(text) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text.unescape().map_err(quick_xml::Error::from)?);
                }
            }
            Event::CData(data) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(CodecError::Structure("document ended inside an element".to_string()));
    }
    let mut document = stack.remove(0);
    if document.children.len() != 1 {
        return Err(CodecError::Structure("expected exactly one root element".to_string()));
    }
    Ok(document.children.remove(0))
}

fn parse_value(node: &Node) -> Result<Value, CodecError> {
    let Some(typed) = node.children.first() else {
        // untyped <value> defaults to string
        return Ok(Value::String(node.text.clone()));
    };
    let text = typed.text.trim();

    match typed.name.as_str() {
        "int" | "i4" => text.parse().map(Value::Int).map_err(|_| invalid(typed)),
        "i8" => text
            .parse::<i64>()
            .ok()
            .and_then(|wide| i32::try_from(wide).ok())
            .map(Value::Int)
            .ok_or_else(|| invalid(typed)),
        "boolean" => match text {
            "1" | "true" => Ok(Value::Boolean(true)),
            "0" | "false" => Ok(Value::Boolean(false)),
            _ => Err(invalid(typed)),
        },
        "string" => Ok(Value::String(typed.text.clone())),
        "double" => text.parse().map(Value::Double).map_err(|_| invalid(typed)),
        "dateTime.iso8601" => Ok(Value::DateTime(text.to_string())),
        "base64" => {
            let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            Ok(Value::Base64(STANDARD.decode(compact)?))
        }
        "nil" => Ok(Value::Nil),
        "struct" => {
            let mut members = Params::new();
            for member in typed.children.iter().filter(|c| c.name == "member") {
                let name = member.required("name")?.text.clone();
                let value = parse_value(member.required("value")?)?;
                members.insert(name, value);
            }
            Ok(Value::Struct(members))
        }
        "array" => {
            let data = typed.required("data")?;
            let items = data
                .children
                .iter()
                .filter(|c| c.name == "value")
                .map(parse_value)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(items))
        }
        other => Err(CodecError::Structure(format!("unknown value type <{other}>"))),
    }
}

fn invalid(node: &Node) -> CodecError {
    CodecError::InvalidScalar {
        tag: node.name.clone(),
        text: node.text.clone(),
    }
}

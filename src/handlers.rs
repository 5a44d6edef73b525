//! Response strategies and the chain that picks one.

pub mod chain;
pub mod dynamic_file;
pub mod redirect;
pub mod static_file;

pub use chain::HandlerChain;

use crate::data_capture::types::CapturedRequest;
use crate::data_capture::InboundRequest;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// What a strategy wants sent back: status, headers in order, body.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HandlerResponse {
    pub fn new(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body,
        }
    }

    pub fn redirect(location: &str) -> Self {
        Self {
            status: 302,
            headers: vec![("Location".to_string(), location.to_string())],
            body: Vec::new(),
        }
    }

    /// The captured request echoed back as JSON.
    pub fn json_echo(captured: &CapturedRequest) -> Self {
        // serializing plain data into memory cannot fail
        let body = serde_json::to_vec(captured).unwrap_or_default();
        Self::new(200, JSON_CONTENT_TYPE, body)
    }

    pub fn with_header(mut self, name: &str, value: String) -> Self {
        self.headers.push((name.to_string(), value));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// One response strategy.
///
/// A strategy that is not applicable must return `None` from `handle` without doing anything
/// else; the chain then asks the next one.
pub trait RequestHandler {
    fn name(&self) -> &'static str;

    /// Cheap applicability check on the captured request.
    fn can_handle(&self, captured: &CapturedRequest) -> bool;

    fn handle(&self, inbound: &InboundRequest, captured: &CapturedRequest) -> Option<HandlerResponse>;
}

//! Request normalization: wire-level HTTP request in, `CapturedRequest` out.
//!
//! The body is held as a [`Bytes`] buffer, so every later stage (form parsing, JSON parsing,
//! the probe handlers, the sinks) reads the same bytes without consuming anything.

use std::net::SocketAddr;

use bytes::Bytes;
use chrono::Utc;
use log::{debug, trace};

use super::types::{CapturedRequest, MultiMap, ROOT_BIN};
use crate::error_handling::types::NormalizeError;

/// Scheme written into reconstructed URLs. The scheme the client used is not reliably known
/// behind a proxy, so it is never inferred.
pub const URL_SCHEME: &str = "http";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A request as handed over by the HTTP surface, before normalization.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub method: String,
    /// Raw path, percent-encoded as received.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    pub host: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub remote_addr: Option<SocketAddr>,
}

impl InboundRequest {
    /// First value of a header, looked up case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The bin a path is addressed to: its first segment, or the root bin.
    pub fn bin_id(&self) -> String {
        self.path
            .split('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(ROOT_BIN)
            .to_string()
    }

    /// `scheme://host` prefix shared by every URL rebuilt from this request.
    pub fn origin(&self) -> String {
        format!("{}://{}", URL_SCHEME, self.host)
    }
}

/// Builds the capture entity for `inbound`, addressed to `bin_id`.
///
/// Malformed form data (in the query, or in a url-encoded body) fails the call. A body that is
/// not JSON just leaves `json` empty.
pub fn normalize(inbound: &InboundRequest, bin_id: &str) -> Result<CapturedRequest, NormalizeError> {
    let query = match inbound.query {
        Some(ref q) => parse_form(q.as_bytes())?,
        None => MultiMap::new(),
    };

    let post_form = if carries_form_body(inbound) {
        parse_form(&inbound.body)?
    } else {
        MultiMap::new()
    };

    // body values first, then the query, as form decoders conventionally merge them
    let mut form = post_form.clone();
    for (key, values) in &query {
        form.entry(key.clone()).or_default().extend(values.iter().cloned());
    }

    let json = serde_json::from_slice::<serde_json::Value>(&inbound.body).ok();
    if json.is_none() && !inbound.body.is_empty() {
        trace!("[{}] body is not JSON ({} bytes)", bin_id, inbound.body.len());
    }

    let mut headers = MultiMap::new();
    for (name, value) in &inbound.headers {
        headers
            .entry(canonical_header_name(name))
            .or_default()
            .push(value.clone());
    }

    let request = CapturedRequest {
        bin_id: bin_id.to_string(),
        path: inbound.path.clone(),
        full_url: full_url(inbound, &query),
        method: inbound.method.clone(),
        host: inbound.host.clone(),
        remote_addr: inbound
            .remote_addr
            .map(|a| a.to_string())
            .unwrap_or_default(),
        headers,
        body: inbound.body.clone(),
        post_form,
        form,
        json,
        time: Utc::now(),
    };

    debug!(
        "[{}] captured {} {} from {} ({} body bytes)",
        request.bin_id,
        request.method,
        request.path,
        request.remote_addr,
        request.body.len()
    );
    Ok(request)
}

fn carries_form_body(inbound: &InboundRequest) -> bool {
    let method = inbound.method.to_ascii_uppercase();
    if method != "POST" && method != "PUT" && method != "PATCH" {
        return false;
    }
    inbound
        .header("content-type")
        .map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or("")
                .trim()
                .eq_ignore_ascii_case(FORM_CONTENT_TYPE)
        })
        .unwrap_or(false)
}

/// Canonical URL: fixed scheme, incoming host, raw path, query re-encoded with sorted keys.
fn full_url(inbound: &InboundRequest, query: &MultiMap) -> String {
    let mut url = format!("{}{}", inbound.origin(), inbound.path);
    if !query.is_empty() {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, values) in query {
            for value in values {
                serializer.append_pair(key, value);
            }
        }
        url.push('?');
        url.push_str(&serializer.finish());
    }
    url
}

/// Decodes `application/x-www-form-urlencoded` data, rejecting broken percent escapes.
pub fn parse_form(input: &[u8]) -> Result<MultiMap, NormalizeError> {
    let mut i = 0;
    while i < input.len() {
        if input[i] == b'%' {
            let valid = input.len() > i + 2
                && input[i + 1].is_ascii_hexdigit()
                && input[i + 2].is_ascii_hexdigit();
            if !valid {
                let end = (i + 3).min(input.len());
                return Err(NormalizeError::MalformedForm(format!(
                    "invalid escape {:?}",
                    String::from_utf8_lossy(&input[i..end])
                )));
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    let mut values = MultiMap::new();
    for (key, value) in url::form_urlencoded::parse(input) {
        values.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    Ok(values)
}

/// `content-type` -> `Content-Type`.
fn canonical_header_name(name: &str) -> String {
    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}

//! Common data types used across the data_capture subsystem.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Decoded `key -> values` pairs (headers, query and form data).
pub type MultiMap = BTreeMap<String, Vec<String>>;

/// Bin used for requests addressed to the server root.
pub const ROOT_BIN: &str = "root";

/// One inbound HTTP exchange, as captured.
///
/// Created once by the normalizer and never mutated afterwards; handlers and sinks only ever
/// see it through a shared reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedRequest {
    pub bin_id: String,
    /// Raw request path, still percent-encoded.
    pub path: String,
    pub full_url: String,
    pub method: String,
    pub host: String,
    pub remote_addr: String,
    pub headers: MultiMap,
    /// Exact body bytes as received.
    #[serde(with = "raw_bytes")]
    pub body: Bytes,
    pub post_form: MultiMap,
    pub form: MultiMap,
    /// Body parsed as JSON, when it is JSON.
    pub json: Option<serde_json::Value>,
    pub time: DateTime<Utc>,
}

impl CapturedRequest {
    /// Extension of the last path segment, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let last = self.path.rsplit('/').next().unwrap_or("");
        last.rsplit_once('.').map(|(_, ext)| ext)
    }
}

/// Everything read from one raw TCP connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedTcpRequest {
    pub remote_addr: String,
    pub time: DateTime<Utc>,
    #[serde(with = "raw_bytes")]
    pub content: Bytes,
}

/// A captured entity on its way to the storage sinks.
#[derive(Debug, Clone)]
pub enum Capture {
    Http(Arc<CapturedRequest>),
    Tcp(Arc<CapturedTcpRequest>),
}

impl Capture {
    /// Document kind used by the indexed sinks.
    pub fn kind(&self) -> &'static str {
        match self {
            Capture::Http(_) => "http",
            Capture::Tcp(_) => "tcp",
        }
    }

    pub fn remote_addr(&self) -> &str {
        match self {
            Capture::Http(r) => &r.remote_addr,
            Capture::Tcp(r) => &r.remote_addr,
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Capture::Http(r) => serde_json::to_value(r.as_ref()),
            Capture::Tcp(r) => serde_json::to_value(r.as_ref()),
        }
    }
}

/// Coordinates attached to indexed documents, in the `{ "lat", "lon" }` shape of an
/// Elasticsearch `geo_point`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
}

/// Serialises raw bytes as a JSON string when they are UTF-8 and as `{ "base64": … }`
/// otherwise, so that every byte survives a round trip through the JSON sinks.
mod raw_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Encoded {
        Text(String),
        Binary { base64: String },
    }

    pub fn serialize<S, T>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        match std::str::from_utf8(bytes.as_ref()) {
            Ok(text) => serializer.serialize_str(text),
            Err(_) => Encoded::Binary {
                base64: STANDARD.encode(bytes.as_ref()),
            }
            .serialize(serializer),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: From<Vec<u8>>,
    {
        match Encoded::deserialize(deserializer)? {
            Encoded::Text(text) => Ok(T::from(text.into_bytes())),
            Encoded::Binary { base64 } => STANDARD
                .decode(base64)
                .map(T::from)
                .map_err(serde::de::Error::custom),
        }
    }
}

//! Enriched document store: every capture becomes a new Elasticsearch document.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use reqwest::Client;
use serde_json::{json, Value};
use uuid::Uuid;

use super::geoip::GeoLocator;
use super::storage_trait::{RequestWriter, StorageFuture};
use crate::data_capture::types::{Capture, CapturedRequest, CapturedTcpRequest, GeoPoint};
use crate::error_handling::types::StorageError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Document body for `capture`: `{ kind, request, location? }`.
pub fn enriched_document(capture: &Capture, location: Option<GeoPoint>) -> Result<Value, StorageError> {
    let mut document = json!({
        "kind": capture.kind(),
        "request": capture.to_json()?,
    });
    if let Some(point) = location {
        document["location"] = serde_json::to_value(point)?;
    }
    Ok(document)
}

pub struct ElasticsearchWriter {
    client: Client,
    base_url: String,
    index: String,
    geo: Option<Arc<dyn GeoLocator>>,
}

impl ElasticsearchWriter {
    pub fn new(
        base_url: &str,
        index: &str,
        geo: Option<Arc<dyn GeoLocator>>,
    ) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
            geo,
        })
    }

    /// Indexes under a fresh id; repeated captures never overwrite each other.
    async fn index(&self, capture: &Capture) -> Result<(), StorageError> {
        let location = self
            .geo
            .as_ref()
            .and_then(|geo| geo.locate(capture.remote_addr()));
        let document = enriched_document(capture, location)?;

        let id = Uuid::new_v4();
        let url = format!("{}/{}/_doc/{}", self.base_url, self.index, id);
        let response = self.client.put(&url).json(&document).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::WriteFailed(format!(
                "elasticsearch answered {} for {}: {}",
                status, id, body
            )));
        }
        debug!("Indexed {} capture from {} as {}", capture.kind(), capture.remote_addr(), id);
        Ok(())
    }
}

impl RequestWriter for ElasticsearchWriter {
    fn name(&self) -> &'static str {
        "elasticsearch"
    }

    fn write_http<'a>(&'a self, request: &'a CapturedRequest) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            self.index(&Capture::Http(Arc::new(request.clone()))).await
        })
    }

    fn write_tcp<'a>(&'a self, request: &'a CapturedTcpRequest) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            self.index(&Capture::Tcp(Arc::new(request.clone()))).await
        })
    }

    fn write<'a>(&'a self, capture: &'a Capture) -> StorageFuture<'a, ()> {
        Box::pin(self.index(capture))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_capture::{normalize, InboundRequest};
    use bytes::Bytes;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedLocator(Option<GeoPoint>);

    impl GeoLocator for FixedLocator {
        fn locate(&self, _remote_addr: &str) -> Option<GeoPoint> {
            self.0
        }
    }

    fn http_capture() -> Capture {
        let inbound = InboundRequest {
            method: "POST".to_string(),
            path: "/bin3/x".to_string(),
            host: "h".to_string(),
            body: Bytes::from_static(b"hello"),
            remote_addr: Some("203.0.113.9:4000".parse().unwrap()),
            ..Default::default()
        };
        Capture::Http(Arc::new(normalize(&inbound, "bin3").unwrap()))
    }

    #[test]
    fn test_document_layout() {
        let point = GeoPoint {
            latitude: 1.5,
            longitude: -2.5,
        };
        let document = enriched_document(&http_capture(), Some(point)).unwrap();
        assert_eq!(document["kind"], "http");
        assert_eq!(document["request"]["bin_id"], "bin3");
        assert_eq!(document["request"]["body"], "hello");
        assert_eq!(document["location"], json!({ "lat": 1.5, "lon": -2.5 }));

        let document = enriched_document(&http_capture(), None).unwrap();
        assert!(document.get("location").is_none());
    }

    #[tokio::test]
    async fn test_each_write_is_a_new_document() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path_regex(r"^/captures/_doc/[0-9a-f-]{36}$"))
            .respond_with(ResponseTemplate::new(201))
            .expect(2)
            .mount(&server)
            .await;

        let locator: Arc<dyn GeoLocator> = Arc::new(FixedLocator(Some(GeoPoint {
            latitude: 10.0,
            longitude: 20.0,
        })));
        let writer = ElasticsearchWriter::new(&server.uri(), "captures", Some(locator)).unwrap();
        let capture = http_capture();
        writer.write(&capture).await.unwrap();
        writer.write(&capture).await.unwrap();

        let received = server.received_requests().await.unwrap();
        assert_ne!(received[0].url.path(), received[1].url.path());
        let body: Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(body["location"]["lat"], 10.0);
    }

    #[tokio::test]
    async fn test_tcp_capture_is_indexed_without_location() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let locator: Arc<dyn GeoLocator> = Arc::new(FixedLocator(None));
        let writer = ElasticsearchWriter::new(&server.uri(), "requestbin", Some(locator)).unwrap();
        let tcp = Capture::Tcp(Arc::new(CapturedTcpRequest {
            remote_addr: "198.51.100.2:9000".to_string(),
            time: chrono::Utc::now(),
            content: Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]),
        }));
        writer.write(&tcp).await.unwrap();

        let received = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(body["kind"], "tcp");
        assert_eq!(body["request"]["content"]["base64"], "3q2+7w==");
        assert!(body.get("location").is_none());
    }

    #[tokio::test]
    async fn test_rejected_write_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(400).set_body_string("mapper_parsing_exception"))
            .mount(&server)
            .await;

        let writer = ElasticsearchWriter::new(&server.uri(), "requestbin", None).unwrap();
        let err = writer.write(&http_capture()).await.unwrap_err();
        assert!(matches!(err, StorageError::WriteFailed(ref m) if m.contains("mapper_parsing_exception")));
    }
}

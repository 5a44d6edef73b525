use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use log::{error, info};
use warp::http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use warp::http::{Method, StatusCode};
use warp::host::Authority;
use warp::path::FullPath;
use warp::{Filter, Rejection, Reply};

use crate::data_capture::InboundRequest;
use crate::handlers::HandlerResponse;
use crate::pipeline::CapturePipeline;

/// HTTP capture surface: every method on every path goes through the capture pipeline.
pub struct WebServer {
    pipeline: Arc<CapturePipeline>,
}

impl WebServer {
    /// Create a new WebServer instance
    pub fn new(pipeline: Arc<CapturePipeline>) -> Self {
        Self { pipeline }
    }

    /// The single catch-all route.
    pub fn routes(&self) -> impl Filter<Extract = (warp::reply::Response,), Error = Rejection> + Clone {
        let pipeline = self.pipeline.clone();

        let raw_query = warp::query::raw()
            .map(Some)
            .or(warp::any().map(|| None))
            .unify();

        warp::method()
            .and(warp::path::full())
            .and(raw_query)
            .and(warp::host::optional())
            .and(warp::header::headers_cloned())
            .and(warp::addr::remote())
            .and(warp::body::bytes())
            .and_then(
                move |method: Method,
                      path: FullPath,
                      query: Option<String>,
                      authority: Option<Authority>,
                      headers: HeaderMap,
                      remote: Option<SocketAddr>,
                      body: Bytes| {
                    let pipeline = pipeline.clone();
                    async move {
                        let inbound = inbound_request(
                            method, path.as_str(), query, authority, &headers, remote, body,
                        );
                        let response = respond_blocking(pipeline, inbound).await;
                        Ok::<_, Rejection>(into_reply(response))
                    }
                },
            )
    }

    /// Start the web server on the given address
    pub async fn start(&self, addr: SocketAddr) {
        info!("HTTP capture listening on {}", addr);
        warp::serve(self.routes()).run(addr).await;
    }
}

/// Runs the pipeline on the blocking pool: responding reads document templates from disk.
pub async fn respond_blocking(pipeline: Arc<CapturePipeline>, inbound: InboundRequest) -> HandlerResponse {
    match tokio::task::spawn_blocking(move || pipeline.respond(&inbound)).await {
        Ok(response) => response,
        Err(e) => {
            error!("capture task failed: {}", e);
            HandlerResponse::new(500, "text/plain; charset=utf-8", Vec::new())
        }
    }
}

/// Wire request to the core's view of it. Header values that are not valid UTF-8 are kept
/// lossily; the body is never touched.
pub fn inbound_request(
    method: Method,
    path: &str,
    query: Option<String>,
    authority: Option<Authority>,
    headers: &HeaderMap,
    remote_addr: Option<SocketAddr>,
    body: Bytes,
) -> InboundRequest {
    let host = authority
        .map(|a| a.as_str().to_string())
        .or_else(|| {
            headers
                .get("host")
                .map(|h| String::from_utf8_lossy(h.as_bytes()).into_owned())
        })
        .unwrap_or_default();

    InboundRequest {
        method: method.as_str().to_string(),
        path: path.to_string(),
        query: query.filter(|q| !q.is_empty()),
        host,
        headers: headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect(),
        body,
        remote_addr,
    }
}

/// Core response to a warp reply. Headers the HTTP layer cannot represent are dropped with an
/// error line.
pub fn into_reply(response: HandlerResponse) -> warp::reply::Response {
    let mut reply = response.body.into_response();
    *reply.status_mut() = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let headers = reply.headers_mut();
    headers.remove(CONTENT_TYPE);
    for (name, value) in response.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => error!("dropping unrepresentable response header {}: {:?}", name, value),
        }
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::DocumentRoot;
    use crate::handlers::HandlerChain;
    use crate::storage::StorageFanout;
    use crate::targets::TargetRegistry;

    #[tokio::test]
    async fn test_respond_blocking_serves_documents() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("file.m3u"), "#EXTM3U\n{{ url }}\n").unwrap();
        let chain = HandlerChain::new(
            DocumentRoot::new(dir.path().to_path_buf()),
            Arc::new(TargetRegistry::new("localhost", 9999)),
        );
        let pipeline = Arc::new(CapturePipeline::new(
            Arc::new(StorageFanout::new(Vec::new(), 4, 1)),
            chain,
        ));

        let inbound = InboundRequest {
            method: "GET".to_string(),
            path: "/bin5/list.m3u".to_string(),
            host: "h".to_string(),
            ..Default::default()
        };
        let response = respond_blocking(pipeline, inbound).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"#EXTM3U\nhttp://h/bin5/list.mp3\n");
    }

    #[test]
    fn test_inbound_request_conversion() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("fallback.example"));
        headers.insert("x-probe", HeaderValue::from_bytes(b"caf\xe9").unwrap());

        let inbound = inbound_request(
            Method::POST,
            "/bin1/a%20b.svg",
            Some("x=1".to_string()),
            None,
            &headers,
            Some("192.0.2.5:1234".parse().unwrap()),
            Bytes::from_static(b"\x00raw"),
        );

        assert_eq!(inbound.method, "POST");
        assert_eq!(inbound.path, "/bin1/a%20b.svg");
        assert_eq!(inbound.query.as_deref(), Some("x=1"));
        assert_eq!(inbound.host, "fallback.example");
        assert_eq!(inbound.header("X-Probe"), Some("caf\u{fffd}"));
        assert_eq!(&inbound.body[..], b"\x00raw");

        let inbound = inbound_request(
            Method::GET,
            "/",
            Some(String::new()),
            Some(Authority::from_static("bin.example:8000")),
            &headers,
            None,
            Bytes::new(),
        );
        assert_eq!(inbound.host, "bin.example:8000");
        assert_eq!(inbound.query, None);
    }

    #[test]
    fn test_reply_conversion() {
        let response = HandlerResponse::new(200, "application/x-bittorrent", b"d4:spame".to_vec())
            .with_header("Content-Disposition", "attachment; filename=\"a.odt\"".to_string())
            .with_header("Bad Header", "x".to_string());
        let reply = into_reply(response);

        assert_eq!(reply.status(), StatusCode::OK);
        assert_eq!(reply.headers()["content-type"], "application/x-bittorrent");
        assert_eq!(
            reply.headers()["content-disposition"],
            "attachment; filename=\"a.odt\""
        );
        assert!(reply.headers().get("bad header").is_none());

        let reply = into_reply(HandlerResponse::redirect("http://h/bin/postredirect"));
        assert_eq!(reply.status(), StatusCode::FOUND);
        assert!(reply.headers().get("content-type").is_none());
        assert_eq!(reply.headers()["location"], "http://h/bin/postredirect");
    }
}

use log::debug;

use super::{HandlerResponse, RequestHandler};
use crate::data_capture::types::CapturedRequest;
use crate::data_capture::InboundRequest;
use crate::documents::templates::read_document;
use crate::documents::DocumentRoot;

const STATIC_EXTENSIONS: &[&str] = &[
    "avi", "bmp", "css", "flv", "gif", "jpg", "mp3", "mp4", "png", "txt", "webm", "wmv", "xml",
];

/// Serves the operator's canned `static/file.{ext}` for media and text extensions.
///
/// The answer depends on the extension only. Captured bytes are never sent back under a type a
/// browser or tool would interpret.
pub struct StaticFileHandler {
    documents: DocumentRoot,
}

impl StaticFileHandler {
    pub fn new(documents: DocumentRoot) -> Self {
        Self { documents }
    }
}

impl RequestHandler for StaticFileHandler {
    fn name(&self) -> &'static str {
        "static-file"
    }

    fn can_handle(&self, captured: &CapturedRequest) -> bool {
        captured
            .extension()
            .map(|ext| STATIC_EXTENSIONS.contains(&ext))
            .unwrap_or(false)
    }

    fn handle(&self, _inbound: &InboundRequest, captured: &CapturedRequest) -> Option<HandlerResponse> {
        if !self.can_handle(captured) {
            return None;
        }
        let ext = captured.extension()?;
        let path = self.documents.path(&format!("static/file.{}", ext));

        let body = match read_document(&path) {
            Ok(body) => body,
            Err(e) => {
                debug!("[{}] no canned file for .{}: {}", captured.bin_id, ext, e);
                return None;
            }
        };

        let content_type = mime_guess::from_ext(ext).first_or_octet_stream();
        Some(HandlerResponse::new(200, content_type.essence_str(), body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_capture::normalize;

    fn request(path: &str) -> (InboundRequest, CapturedRequest) {
        let inbound = InboundRequest {
            method: "GET".to_string(),
            path: path.to_string(),
            host: "h".to_string(),
            body: bytes::Bytes::from_static(b"<script>alert(1)</script>"),
            ..Default::default()
        };
        let captured = normalize(&inbound, &inbound.bin_id()).unwrap();
        (inbound, captured)
    }

    fn root_with(files: &[(&str, &[u8])]) -> (tempfile::TempDir, StaticFileHandler) {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("static")).unwrap();
        for (name, content) in files {
            std::fs::write(dir.path().join("static").join(name), content).unwrap();
        }
        let handler = StaticFileHandler::new(DocumentRoot::new(dir.path().to_path_buf()));
        (dir, handler)
    }

    #[test]
    fn test_serves_canned_file_not_capture() {
        let (_dir, handler) = root_with(&[("file.css", b"body { color: red }")]);
        let (inbound, captured) = request("/bin1/evil.css");

        let response = handler.handle(&inbound, &captured).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.header("Content-Type"), Some("text/css"));
        assert_eq!(response.body, b"body { color: red }");
    }

    #[test]
    fn test_declines_without_canned_file() {
        let (_dir, handler) = root_with(&[]);
        let (inbound, captured) = request("/bin1/a.png");
        assert!(handler.can_handle(&captured));
        assert!(handler.handle(&inbound, &captured).is_none());
    }

    #[test]
    fn test_declines_other_extensions() {
        let (_dir, handler) = root_with(&[("file.txt", b"x")]);
        for path in ["/bin1/a.html", "/bin1/a", "/bin1/a.svg"] {
            let (inbound, captured) = request(path);
            assert!(handler.handle(&inbound, &captured).is_none(), "{}", path);
        }
    }
}

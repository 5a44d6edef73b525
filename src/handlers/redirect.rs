use std::sync::Arc;

use log::debug;

use super::{HandlerResponse, RequestHandler};
use crate::data_capture::types::CapturedRequest;
use crate::data_capture::InboundRequest;
use crate::targets::TargetRegistry;

/// `/{bin}/redirect/{type}`: 302 to this bin's `postredirect` path (`self`) or to a registry
/// target. Probes fetchers that follow redirects into places a direct URL would not reach.
pub struct RedirectHandler {
    registry: Arc<TargetRegistry>,
}

impl RedirectHandler {
    pub fn new(registry: Arc<TargetRegistry>) -> Self {
        Self { registry }
    }

    /// `(bin, type)` for a redirect path.
    fn split(path: &str) -> Option<(&str, &str)> {
        let parts: Vec<&str> = path.splitn(4, '/').collect();
        if parts.len() < 4 || parts[2] != "redirect" {
            return None;
        }
        Some((parts[1], parts[3]))
    }
}

impl RequestHandler for RedirectHandler {
    fn name(&self) -> &'static str {
        "redirect"
    }

    fn can_handle(&self, captured: &CapturedRequest) -> bool {
        Self::split(&captured.path).is_some()
    }

    fn handle(&self, inbound: &InboundRequest, captured: &CapturedRequest) -> Option<HandlerResponse> {
        let (bin, kind) = Self::split(&captured.path)?;

        let location = if kind == "self" {
            let mut url = format!("{}/{}/postredirect", inbound.origin(), bin);
            if let Some(ref query) = inbound.query {
                if !query.is_empty() {
                    url.push('?');
                    url.push_str(query);
                }
            }
            url
        } else {
            self.registry.get(kind)?.to_string()
        };

        debug!("[{}] redirecting to {}", captured.bin_id, location);
        Some(HandlerResponse::redirect(&location))
    }
}

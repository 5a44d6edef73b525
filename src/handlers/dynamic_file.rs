use std::sync::Arc;

use log::{debug, error};

use super::{HandlerResponse, RequestHandler};
use crate::data_capture::types::CapturedRequest;
use crate::data_capture::InboundRequest;
use crate::documents::rewrite::callback_url;
use crate::documents::xml::{write_xml, XmlProbe, XML_CONTENT_TYPE};
use crate::documents::{DocumentRoot, ProbeFormat};
use crate::targets::TargetRegistry;

/// Synthesizes probe documents: XML/DTD, ODT, jspdf, SVG, playlists and torrents.
///
/// Synthesis errors are logged and the partial document is served as is.
pub struct DynamicFileHandler {
    documents: DocumentRoot,
    registry: Arc<TargetRegistry>,
}

impl DynamicFileHandler {
    pub fn new(documents: DocumentRoot, registry: Arc<TargetRegistry>) -> Self {
        Self {
            documents,
            registry,
        }
    }

    fn handle_xml(
        &self,
        probe: &XmlProbe,
        inbound: &InboundRequest,
        captured: &CapturedRequest,
    ) -> Option<HandlerResponse> {
        let template = match probe.template_in(self.documents.dir()) {
            Some(template) => template,
            None => {
                debug!("[{}] no XML template among {:?}", captured.bin_id, probe.templates);
                return None;
            }
        };

        let tracker = callback_url(inbound, "dtd");
        let target = match self.registry.get_segments(&probe.key_segments()) {
            Some(url) => url.to_string(),
            None => callback_url(inbound, "txt"),
        };

        let mut body = Vec::new();
        if let Err(e) = write_xml(&template, &tracker, &target, &mut body) {
            error!("[{}] XML probe synthesis failed: {}", captured.bin_id, e);
        }
        debug!("[{}] XML probe fetching {}", captured.bin_id, target);
        Some(HandlerResponse::new(200, XML_CONTENT_TYPE, body))
    }

    fn handle_format(
        &self,
        format: ProbeFormat,
        inbound: &InboundRequest,
        captured: &CapturedRequest,
    ) -> HandlerResponse {
        let url = callback_url(inbound, format.callback_extension());

        let mut body = Vec::new();
        if let Err(e) = self.documents.synthesize(format, &url, &mut body) {
            error!(
                "[{}] {} probe synthesis failed: {}",
                captured.bin_id,
                format.extension(),
                e
            );
        }

        let mut response = HandlerResponse::new(200, format.content_type(), body);
        if let Some(filename) = format.attachment_name(&inbound.path) {
            response = response.with_header(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", filename),
            );
        }
        debug!("[{}] {} probe calling back {}", captured.bin_id, format.extension(), url);
        response
    }
}

impl RequestHandler for DynamicFileHandler {
    fn name(&self) -> &'static str {
        "dynamic-file"
    }

    fn can_handle(&self, captured: &CapturedRequest) -> bool {
        captured
            .extension()
            .and_then(ProbeFormat::from_extension)
            .is_some()
            || XmlProbe::from_path(&captured.path).is_some()
    }

    fn handle(&self, inbound: &InboundRequest, captured: &CapturedRequest) -> Option<HandlerResponse> {
        if let Some(probe) = XmlProbe::from_path(&captured.path) {
            return self.handle_xml(&probe, inbound, captured);
        }
        let format = captured.extension().and_then(ProbeFormat::from_extension)?;
        Some(self.handle_format(format, inbound, captured))
    }
}

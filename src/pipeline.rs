//! HTTP capture path: normalize, submit to storage, then dispatch.
//!
//! Storage never sees anything the handlers did, and the handlers never wait for storage.

use std::sync::Arc;

use log::warn;
use serde::Serialize;

use crate::data_capture::types::{Capture, CapturedRequest};
use crate::data_capture::{normalize, InboundRequest};
use crate::error_handling::types::NormalizeError;
use crate::handlers::{HandlerChain, HandlerResponse, JSON_CONTENT_TYPE};
use crate::storage::StorageFanout;

#[derive(Serialize)]
struct ApiError {
    message: String,
}

pub struct CapturePipeline {
    fanout: Arc<StorageFanout>,
    chain: HandlerChain,
}

impl CapturePipeline {
    pub fn new(fanout: Arc<StorageFanout>, chain: HandlerChain) -> Self {
        Self { fanout, chain }
    }

    /// Captures `inbound` and computes its response.
    ///
    /// The capture is handed to storage before any strategy runs. Malformed form data fails
    /// the call and nothing is stored.
    pub fn process(&self, inbound: &InboundRequest) -> Result<(Arc<CapturedRequest>, HandlerResponse), NormalizeError> {
        let bin_id = inbound.bin_id();
        let captured = Arc::new(normalize(inbound, &bin_id)?);
        self.fanout.submit(Capture::Http(captured.clone()));
        let response = self.chain.dispatch(inbound, &captured);
        Ok((captured, response))
    }

    /// Like [`process`](Self::process), answering `400` with a JSON message on malformed input.
    pub fn respond(&self, inbound: &InboundRequest) -> HandlerResponse {
        match self.process(inbound) {
            Ok((_, response)) => response,
            Err(e) => {
                warn!("[{}] rejected {} {}: {}", inbound.bin_id(), inbound.method, inbound.path, e);
                let body = serde_json::to_vec(&ApiError {
                    message: e.to_string(),
                })
                .unwrap_or_default();
                HandlerResponse::new(400, JSON_CONTENT_TYPE, body)
            }
        }
    }
}

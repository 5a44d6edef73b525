use std::sync::Arc;

use log::trace;

use super::dynamic_file::DynamicFileHandler;
use super::redirect::RedirectHandler;
use super::static_file::StaticFileHandler;
use super::{HandlerResponse, RequestHandler};
use crate::data_capture::types::CapturedRequest;
use crate::data_capture::InboundRequest;
use crate::documents::DocumentRoot;
use crate::targets::TargetRegistry;

/// The closed set of response strategies.
pub enum Strategy {
    Redirect(RedirectHandler),
    DynamicFile(DynamicFileHandler),
    StaticFile(StaticFileHandler),
}

impl Strategy {
    fn handler(&self) -> &dyn RequestHandler {
        match self {
            Strategy::Redirect(h) => h,
            Strategy::DynamicFile(h) => h,
            Strategy::StaticFile(h) => h,
        }
    }
}

/// Strategies in priority order, with a JSON echo when none of them answers.
///
/// Probe synthesis is consulted before the static strategy: `.xml` is both a canned file and an
/// XXE probe, and the probe must win.
pub struct HandlerChain {
    strategies: Vec<Strategy>,
}

impl HandlerChain {
    pub fn new(documents: DocumentRoot, registry: Arc<TargetRegistry>) -> Self {
        Self::with_strategies(vec![
            Strategy::Redirect(RedirectHandler::new(registry.clone())),
            Strategy::DynamicFile(DynamicFileHandler::new(documents.clone(), registry)),
            Strategy::StaticFile(StaticFileHandler::new(documents)),
        ])
    }

    pub fn with_strategies(strategies: Vec<Strategy>) -> Self {
        Self { strategies }
    }

    /// Asks each strategy in turn; the first answer wins and ends dispatch.
    pub fn dispatch(&self, inbound: &InboundRequest, captured: &CapturedRequest) -> HandlerResponse {
        for strategy in &self.strategies {
            let handler = strategy.handler();
            if let Some(response) = handler.handle(inbound, captured) {
                trace!("[{}] answered by {}", captured.bin_id, handler.name());
                return response;
            }
        }
        trace!("[{}] answered by json echo", captured.bin_id);
        HandlerResponse::json_echo(captured)
    }
}

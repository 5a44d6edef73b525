use std::time::Duration;

use bytes::{Bytes, BytesMut};
use chrono::Utc;
use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

use super::types::CapturedTcpRequest;
use crate::error_handling::types::CaptureError;

const READ_CHUNK: usize = 16 * 1024;
const PREVIEW_LEN: usize = 64;

/// Why the read phase of a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEnd {
    IdleTimeout,
    Closed,
    Failed,
}

/// Read side of one raw TCP connection.
///
/// Bytes are concatenated as they arrive, with no framing. Each read gets its own idle deadline,
/// so a peer that keeps trickling data keeps the connection in the reading state.
#[derive(Debug)]
pub struct TcpCapture {
    pub(crate) remote_addr: String,
    pub(crate) idle_timeout: Duration,
    pub(crate) max_bytes: usize,
}

impl TcpCapture {
    pub fn new(remote_addr: String, idle_timeout: Duration, max_bytes: usize) -> Self {
        Self {
            remote_addr,
            idle_timeout,
            max_bytes,
        }
    }

    /// Reads `stream` until idle timeout, EOF or a read error, and returns what was captured.
    ///
    /// A read error only ends the read phase: the bytes received before it are still returned.
    pub async fn record<S>(&self, stream: &mut S) -> (CapturedTcpRequest, ReadEnd)
    where
        S: AsyncRead + Unpin,
    {
        let mut content = BytesMut::new();
        let mut buf = vec![0u8; READ_CHUNK];
        let mut discarded = 0usize;

        trace!("[{}] tcp capture started", self.remote_addr);

        let end = loop {
            let n = match timeout(self.idle_timeout, stream.read(&mut buf)).await {
                Err(_) => break ReadEnd::IdleTimeout,
                Ok(Ok(0)) => break ReadEnd::Closed,
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    let e = CaptureError::TcpStreamError(e);
                    debug!("[{}] {}", self.remote_addr, e);
                    break ReadEnd::Failed;
                }
            };

            let room = self.max_bytes.saturating_sub(content.len());
            let kept = n.min(room);
            content.extend_from_slice(&buf[..kept]);
            discarded += n - kept;

            let preview = &buf[..n.min(PREVIEW_LEN)];
            trace!(
                "[{}] captured {} bytes: {}{}",
                self.remote_addr,
                n,
                String::from_utf8_lossy(preview),
                if n > PREVIEW_LEN { " ..." } else { "" }
            );
        };

        if discarded > 0 {
            debug!(
                "[{}] capture bound reached, {} bytes discarded",
                self.remote_addr, discarded
            );
        }
        debug!(
            "[{}] tcp capture finished ({:?}, {} bytes)",
            self.remote_addr,
            end,
            content.len()
        );

        let captured = CapturedTcpRequest {
            remote_addr: self.remote_addr.clone(),
            time: Utc::now(),
            content: Bytes::from(content),
        };
        (captured, end)
    }
}

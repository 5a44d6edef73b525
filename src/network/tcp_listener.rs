//! # TCP Capture Listener
//!
//! Accepts raw TCP connections and records whatever the peer sends, with no protocol
//! assumption. Nothing is ever written back.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐    ┌──────────────────┐    ┌────────────┐    ┌────────────────┐
//! │ Incoming    │───▶│ TcpCaptureServer │───▶│ TcpCapture │───▶│ StorageFanout  │
//! │ Connections │    │ (accept loop)    │    │ (per conn) │    │ (Capture::Tcp) │
//! └─────────────┘    └──────────────────┘    └────────────┘    └────────────────┘
//! ```
//!
//! Every connection runs in its own task: `Accepted → Reading → (idle timeout | EOF) →
//! Captured → Closed`. There is no ceiling on concurrent connections.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use requestbin::network::tcp_listener::TcpCaptureServer;
//! use requestbin::storage::StorageFanout;
//!
//! #[tokio::main]
//! async fn main() {
//!     let fanout = Arc::new(StorageFanout::new(Vec::new(), 16, 1));
//!     let server = TcpCaptureServer::new(fanout, Duration::from_secs(4), 1024 * 1024);
//!     let listener = TcpCaptureServer::bind("0.0.0.0:9999".parse().unwrap()).await.unwrap();
//!     server.serve(listener).await;
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use crate::data_capture::tcp_capture::TcpCapture;
use crate::data_capture::types::Capture;
use crate::error_handling::types::NetworkError;
use crate::storage::StorageFanout;

/// Accept loop of the TCP capture port.
#[derive(Clone)]
pub struct TcpCaptureServer {
    /// Shared sinks every finished capture is submitted to
    fanout: Arc<StorageFanout>,

    /// Per-read idle deadline
    idle_timeout: Duration,

    /// Bytes kept per connection
    max_capture_bytes: usize,
}

impl TcpCaptureServer {
    pub fn new(fanout: Arc<StorageFanout>, idle_timeout: Duration, max_capture_bytes: usize) -> Self {
        Self {
            fanout,
            idle_timeout,
            max_capture_bytes,
        }
    }

    /// Binds the capture port.
    ///
    /// # Errors
    ///
    /// `NetworkError::BindError` if the address is in use or not permitted.
    pub async fn bind(addr: SocketAddr) -> Result<TcpListener, NetworkError> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            error!("[!] Cannot bind TCP capture port {}: {}", addr, e);
            NetworkError::BindError(e)
        })?;
        info!("TCP capture listening on {}", addr);
        Ok(listener)
    }

    /// Runs the accept loop forever. A failed accept is logged and the loop goes on.
    pub async fn serve(self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        server.handle_connection(stream, peer).await;
                    });
                }
                Err(e) => {
                    error!("[!] {}", NetworkError::AcceptError(e));
                }
            }
        }
    }

    /// Reads one connection to its end, submits the capture, then closes the socket.
    pub async fn handle_connection(&self, mut stream: TcpStream, peer: SocketAddr) {
        debug!("[{}] TCP connection accepted", peer);

        let capture = TcpCapture::new(peer.to_string(), self.idle_timeout, self.max_capture_bytes);
        let (captured, end) = capture.record(&mut stream).await;
        info!(
            "[{}] TCP capture of {} bytes ({:?})",
            peer,
            captured.content.len(),
            end
        );

        self.fanout.submit(Capture::Tcp(Arc::new(captured)));

        if let Err(e) = stream.shutdown().await {
            debug!("[{}] shutdown failed: {}", peer, e);
        }
    }
}

//! Fire-and-forget fan-out of captures to every configured sink.
//!
//! Each sink gets its own bounded queue drained by its own task, and at most `workers` writes
//! in flight. A slow or failing sink never delays the response path nor the other sinks: a full
//! queue drops the capture for that sink, and write errors are logged.

use std::sync::Arc;

use log::{error, trace, warn};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Semaphore};

use super::storage_trait::RequestWriter;
use crate::data_capture::types::Capture;
use crate::error_handling::types::StorageError;

struct SinkWorker {
    name: &'static str,
    queue: mpsc::Sender<Capture>,
}

impl SinkWorker {
    fn spawn(writer: Arc<dyn RequestWriter>, queue_depth: usize, workers: usize) -> Self {
        let (queue, mut rx) = mpsc::channel::<Capture>(queue_depth);
        let name = writer.name();
        let permits = Arc::new(Semaphore::new(workers));

        tokio::spawn(async move {
            while let Some(capture) = rx.recv().await {
                let permit = match permits.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let writer = writer.clone();
                tokio::spawn(async move {
                    if let Err(e) = writer.write(&capture).await {
                        error!(
                            "[{}] {} sink failed for capture from {}: {}",
                            capture_label(&capture),
                            writer.name(),
                            capture.remote_addr(),
                            e
                        );
                    }
                    drop(permit);
                });
            }
            trace!("{} sink queue closed", name);
        });

        Self { name, queue }
    }

    fn enqueue(&self, capture: Capture) -> Result<(), StorageError> {
        self.queue.try_send(capture).map_err(|e| match e {
            TrySendError::Full(_) => StorageError::QueueFull(self.name),
            TrySendError::Closed(_) => StorageError::QueueClosed(self.name),
        })
    }
}

fn capture_label(capture: &Capture) -> &str {
    match capture {
        Capture::Http(request) => &request.bin_id,
        Capture::Tcp(_) => "tcp",
    }
}

pub struct StorageFanout {
    sinks: Vec<SinkWorker>,
}

impl StorageFanout {
    /// Starts one drain task per writer. Must be called from within the runtime.
    pub fn new(writers: Vec<Arc<dyn RequestWriter>>, queue_depth: usize, workers: usize) -> Self {
        let sinks = writers
            .into_iter()
            .map(|writer| SinkWorker::spawn(writer, queue_depth.max(1), workers.max(1)))
            .collect();
        Self { sinks }
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name).collect()
    }

    /// Hands `capture` to every sink, in sink order, without waiting for any write.
    ///
    /// Returns how many sinks accepted it.
    pub fn submit(&self, capture: Capture) -> usize {
        let mut accepted = 0;
        for sink in &self.sinks {
            match sink.enqueue(capture.clone()) {
                Ok(()) => accepted += 1,
                Err(e) => warn!(
                    "[{}] capture from {} dropped: {}",
                    capture_label(&capture),
                    capture.remote_addr(),
                    e
                ),
            }
        }
        accepted
    }
}

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use log::{debug, trace};
use tokio::time::Instant;

use super::storage_trait::{BinReader, RequestWriter, StorageFuture};
use crate::data_capture::types::CapturedRequest;
use crate::error_handling::types::StorageError;

struct Bin {
    /// Serialized captures, newest first.
    entries: VecDeque<String>,
    expires_at: Instant,
}

struct Inner {
    bins: BTreeMap<String, Bin>,
    next_sweep: Instant,
}

/// Expired bins are dropped by the first write after this much time since the last sweep.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// In-process ring store with the same semantics as the Redis one: the newest `capacity`
/// captures per bin, and a TTL reset on every write.
///
/// Used when no Redis address is configured. Unlike the Redis `bins` set, bins disappear from
/// [`list_bins`](BinReader::list_bins) once expired, and their memory is released.
pub struct MemoryRingStore {
    capacity: usize,
    ttl: Duration,
    inner: Mutex<Inner>,
}

impl MemoryRingStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            inner: Mutex::new(Inner {
                bins: BTreeMap::new(),
                next_sweep: Instant::now(),
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StorageError> {
        self.inner
            .lock()
            .map_err(|_| StorageError::WriteFailed("memory store lock poisoned".to_string()))
    }

    fn push(&self, bin_id: &str, serialized: String) -> Result<(), StorageError> {
        let mut inner = self.lock()?;

        let now = Instant::now();
        if now >= inner.next_sweep {
            let before = inner.bins.len();
            inner.bins.retain(|_, bin| bin.expires_at > now);
            inner.next_sweep = now + SWEEP_INTERVAL;
            if inner.bins.len() < before {
                debug!("memory store evicted {} expired bins", before - inner.bins.len());
            }
        }

        let expires_at = now + self.ttl;
        let bin = inner.bins.entry(bin_id.to_string()).or_insert_with(|| Bin {
            entries: VecDeque::new(),
            expires_at,
        });
        if bin.expires_at <= now {
            bin.entries.clear();
        }
        bin.entries.push_front(serialized);
        bin.entries.truncate(self.capacity);
        bin.expires_at = expires_at;

        trace!("[{}] memory store holds {} entries", bin_id, bin.entries.len());
        Ok(())
    }
}

impl RequestWriter for MemoryRingStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn write_http<'a>(&'a self, request: &'a CapturedRequest) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            let serialized = serde_json::to_string(request)?;
            self.push(&request.bin_id, serialized)
        })
    }
}

impl BinReader for MemoryRingStore {
    fn list_bins(&self) -> StorageFuture<'_, Vec<String>> {
        Box::pin(async move {
            let inner = self.lock()?;
            let now = Instant::now();
            Ok(inner
                .bins
                .iter()
                .filter(|(_, bin)| bin.expires_at > now)
                .map(|(id, _)| id.clone())
                .collect())
        })
    }

    fn list_requests<'a>(&'a self, bin_id: &'a str, limit: usize) -> StorageFuture<'a, Vec<CapturedRequest>> {
        Box::pin(async move {
            let raw: Vec<String> = {
                let inner = self.lock()?;
                match inner.bins.get(bin_id) {
                    Some(bin) if bin.expires_at > Instant::now() => {
                        bin.entries.iter().take(limit).cloned().collect()
                    }
                    _ => Vec::new(),
                }
            };
            raw.iter()
                .map(|entry| serde_json::from_str(entry).map_err(StorageError::from))
                .collect()
        })
    }
}

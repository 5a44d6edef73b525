use std::time::Duration;

use log::{debug, info};
use redis::aio::MultiplexedConnection;

use super::storage_trait::{BinReader, RequestWriter, StorageFuture};
use crate::data_capture::types::CapturedRequest;
use crate::error_handling::types::StorageError;

/// Set of every bin id ever written.
pub const BINS_KEY: &str = "bins";

pub fn bin_key(bin_id: &str) -> String {
    format!("{}:{}", BINS_KEY, bin_id)
}

/// One atomic ring write: register the bin, push the capture, keep the newest `capacity`
/// entries, and restart the bin's TTL.
pub fn ring_write(bin_id: &str, payload: &str, capacity: usize, ttl: Duration) -> redis::Pipeline {
    let key = bin_key(bin_id);
    let last = capacity.saturating_sub(1) as isize;

    let mut pipe = redis::pipe();
    pipe.atomic()
        .cmd("SADD")
        .arg(BINS_KEY)
        .arg(bin_id)
        .ignore()
        .cmd("LPUSH")
        .arg(&key)
        .arg(payload)
        .ignore()
        .cmd("LTRIM")
        .arg(&key)
        .arg(0)
        .arg(last)
        .ignore()
        .cmd("EXPIRE")
        .arg(&key)
        .arg(ttl.as_secs() as i64)
        .ignore();
    pipe
}

/// Ring store in Redis: one list per bin, newest first, trimmed to `capacity`, with the TTL
/// reset on each write.
pub struct RedisRingStore {
    conn: MultiplexedConnection,
    capacity: usize,
    ttl: Duration,
}

impl RedisRingStore {
    pub async fn connect(url: &str, capacity: usize, ttl: Duration) -> Result<Self, StorageError> {
        let client = redis::Client::open(url)
            .map_err(|e| StorageError::ConnectionFailed(format!("{}: {}", url, e)))?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!("Connected to Redis at {}", url);
        Ok(Self {
            conn,
            capacity,
            ttl,
        })
    }
}

impl RequestWriter for RedisRingStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn write_http<'a>(&'a self, request: &'a CapturedRequest) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            let serialized = serde_json::to_string(request)?;
            let mut conn = self.conn.clone();
            let _: () = ring_write(&request.bin_id, &serialized, self.capacity, self.ttl)
                .query_async(&mut conn)
                .await?;

            debug!("[{}] stored in redis", request.bin_id);
            Ok(())
        })
    }
}

impl BinReader for RedisRingStore {
    fn list_bins(&self) -> StorageFuture<'_, Vec<String>> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            let mut bins: Vec<String> = redis::cmd("SMEMBERS")
                .arg(BINS_KEY)
                .query_async(&mut conn)
                .await
                .map_err(|e| StorageError::ReadFailed(e.to_string()))?;
            bins.sort();
            Ok(bins)
        })
    }

    fn list_requests<'a>(&'a self, bin_id: &'a str, limit: usize) -> StorageFuture<'a, Vec<CapturedRequest>> {
        Box::pin(async move {
            if limit == 0 {
                return Ok(Vec::new());
            }
            let mut conn = self.conn.clone();
            let raw: Vec<String> = redis::cmd("LRANGE")
                .arg(bin_key(bin_id))
                .arg(0)
                .arg(limit as isize - 1)
                .query_async(&mut conn)
                .await
                .map_err(|e| StorageError::ReadFailed(e.to_string()))?;
            raw.iter()
                .map(|entry| serde_json::from_str(entry).map_err(StorageError::from))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// RESP encoding of one command, as sent on the wire.
    fn resp(args: &[&str]) -> Vec<u8> {
        let mut out = format!("*{}\r\n", args.len()).into_bytes();
        for arg in args {
            out.extend_from_slice(format!("${}\r\n{}\r\n", arg.len(), arg).as_bytes());
        }
        out
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(bin_key("bin42"), "bins:bin42");
    }

    #[test]
    fn test_ring_write_commands() {
        let packed = ring_write("bin42", "{\"a\":1}", 20, Duration::from_secs(86400)).get_packed_pipeline();

        let expected = [
            resp(&["MULTI"]),
            resp(&["SADD", "bins", "bin42"]),
            resp(&["LPUSH", "bins:bin42", "{\"a\":1}"]),
            resp(&["LTRIM", "bins:bin42", "0", "19"]),
            resp(&["EXPIRE", "bins:bin42", "86400"]),
            resp(&["EXEC"]),
        ]
        .concat();
        assert_eq!(String::from_utf8_lossy(&packed), String::from_utf8_lossy(&expected));
    }

    #[test]
    fn test_ring_write_single_slot() {
        let packed = ring_write("b", "x", 1, Duration::from_secs(10)).get_packed_pipeline();
        let packed = String::from_utf8(packed).unwrap();

        let ltrim = String::from_utf8(resp(&["LTRIM", "bins:b", "0", "0"])).unwrap();
        let expire = String::from_utf8(resp(&["EXPIRE", "bins:b", "10"])).unwrap();
        assert!(packed.contains(&ltrim));
        assert!(packed.contains(&expire));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        // nothing listens on port 1
        let result = RedisRingStore::connect("redis://127.0.0.1:1/", 20, Duration::from_secs(60)).await;
        assert!(matches!(result, Err(StorageError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let result = RedisRingStore::connect("not a url", 20, Duration::from_secs(60)).await;
        assert!(matches!(result, Err(StorageError::ConnectionFailed(_))));
    }
}

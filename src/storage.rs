//! Storage subsystem
//!
//! Captures are fanned out to independent sinks; none of them is on the response path.
//!
//! Components:
//! - `storage_trait`: the `RequestWriter` and `BinReader` traits shared by every sink.
//! - `memory_storage`: in-process ring store, used when Redis is not configured.
//! - `redis_storage`: ring store in Redis (`bins` set, `bins:{id}` lists with sliding TTL).
//! - `document_storage`: Elasticsearch index of every capture, enriched with a location.
//! - `geoip`: MaxMind lookup used for that enrichment.
//! - `fanout`: per-sink bounded queues and workers.

pub mod document_storage;
pub mod fanout;
pub mod geoip;
pub mod memory_storage;
pub mod redis_storage;
pub mod storage_trait;

pub use fanout::StorageFanout;
pub use storage_trait::{BinReader, RequestWriter};

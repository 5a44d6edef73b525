//! Storage Traits
//!
//! Sinks are shared by every capture path and called from inside the runtime, so their
//! operations return boxed futures instead of blocking.
//!
//! - [`RequestWriter`]: write side, implemented by every sink
//! - [`BinReader`]: read side of the ring stores, used to inspect bins

use std::future::Future;
use std::pin::Pin;

use crate::data_capture::types::{Capture, CapturedRequest, CapturedTcpRequest};
use crate::error_handling::types::StorageError;

pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

/// A destination for captured entities.
pub trait RequestWriter: Send + Sync {
    /// Short sink name used in log lines.
    fn name(&self) -> &'static str;

    fn write_http<'a>(&'a self, request: &'a CapturedRequest) -> StorageFuture<'a, ()>;

    /// TCP captures are ignored unless a sink opts in.
    fn write_tcp<'a>(&'a self, _request: &'a CapturedTcpRequest) -> StorageFuture<'a, ()> {
        Box::pin(async { Ok(()) })
    }

    fn write<'a>(&'a self, capture: &'a Capture) -> StorageFuture<'a, ()> {
        match capture {
            Capture::Http(request) => self.write_http(request),
            Capture::Tcp(request) => self.write_tcp(request),
        }
    }
}

/// Read access to bins, newest capture first.
pub trait BinReader: Send + Sync {
    fn list_bins(&self) -> StorageFuture<'_, Vec<String>>;

    fn list_requests<'a>(&'a self, bin_id: &'a str, limit: usize) -> StorageFuture<'a, Vec<CapturedRequest>>;
}

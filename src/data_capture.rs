pub mod http_capture;
pub mod tcp_capture;
pub mod types;

pub use http_capture::{normalize, InboundRequest};
pub use tcp_capture::TcpCapture;
pub use types::{Capture, CapturedRequest, CapturedTcpRequest, GeoPoint};

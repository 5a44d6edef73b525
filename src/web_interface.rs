// Web Interface module root
pub mod web_server;

// Re-export commonly used items
pub use web_server::*;

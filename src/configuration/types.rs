use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
    /// No data for this long ends the read phase of a connection.
    pub idle_timeout_secs: u64,
    /// Bytes kept per connection; anything beyond is read and discarded.
    pub max_capture_bytes: usize,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0".to_string(),
            port: 9999,
            idle_timeout_secs: 4,
            max_capture_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    /// Operator root; templates are read from `<root>/documents`.
    pub root: PathBuf,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

impl DocumentsConfig {
    pub fn documents_dir(&self) -> PathBuf {
        self.root.join("documents")
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self { url: None }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct ElasticsearchConfig {
    pub url: Option<String>,
    pub index: String,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: None,
            index: "requestbin".to_string(),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Entries kept per bin, newest first.
    pub bin_capacity: usize,
    /// Sliding expiration of a bin, reset on every write.
    pub bin_ttl_secs: u64,
    pub queue_depth: usize,
    pub workers: usize,
    pub redis: RedisConfig,
    pub elasticsearch: ElasticsearchConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bin_capacity: 20,
            bin_ttl_secs: 3600 * 24,
            queue_depth: 1024,
            workers: 4,
            redis: RedisConfig::default(),
            elasticsearch: ElasticsearchConfig::default(),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GeoIpConfig {
    pub database: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct TargetsConfig {
    /// Host advertised in the `sftp` registry entry.
    pub hostname: String,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
        }
    }
}

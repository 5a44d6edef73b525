use super::types::*;
use crate::error_handling::types::ConfigError;
use clap::Parser;
use log::{debug, info};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

/// Application configuration structure that defines all runtime parameters.
///
/// The configuration is read from a TOML file, then the command-line/environment overrides in
/// [`Overrides`] are applied on top. Every field has a default, so an empty file is a valid
/// configuration.
///
/// # Examples
///
/// ```
/// use requestbin::configuration::config::Config;
///
/// let config = Config::from_toml_str("[http]\nport = 8080\n").unwrap();
/// assert_eq!(config.http.port, 8080);
/// assert_eq!(config.tcp.port, 9999);
/// ```
///
/// # Fields Overview
///
/// - `http`: where the capture server listens
/// - `tcp`: the raw TCP capture listener, its idle timeout and capture bound
/// - `documents`: operator root holding the probe document templates and canned files
/// - `storage`: bin retention, fan-out queue sizing, and the optional Redis/Elasticsearch sinks
/// - `geoip`: optional MaxMind city database used to enrich indexed documents
/// - `targets`: values substituted into the target registry
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub tcp: TcpConfig,
    pub documents: DocumentsConfig,
    pub storage: StorageConfig,
    pub geoip: GeoIpConfig,
    pub targets: TargetsConfig,
}

/// Command-line arguments. Each override can also come from the environment variable the
/// deployment scripts already export.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "requestbin")]
#[command(version)]
#[command(about = "Capture HTTP/TCP requests and serve out-of-band probe documents")]
pub struct Overrides {
    /// Optional TOML configuration file
    pub config_file: Option<PathBuf>,

    /// Operator root containing `documents/`
    #[arg(long, env = "ROOT")]
    pub root: Option<PathBuf>,

    /// HTTP capture port
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// TCP capture port
    #[arg(long, env = "TCP_PORT")]
    pub tcp_port: Option<u16>,

    /// Redis address, `host:port` or a `redis://` URL
    #[arg(long, env = "REDIS")]
    pub redis: Option<String>,

    /// Elasticsearch address, `host:port` or an `http://` URL
    #[arg(long, env = "ELASTICSEARCH")]
    pub elasticsearch: Option<String>,

    /// Host name advertised in the `sftp` target
    #[arg(long, env = "HOSTNAME")]
    pub hostname: Option<String>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file named in `overrides` (if any), then applies the remaining overrides.
    pub fn load(overrides: &Overrides) -> Result<Self, ConfigError> {
        let mut config = match overrides.config_file {
            Some(ref path) => Self::from_file(path)?,
            None => {
                debug!("No configuration file given, using defaults");
                Config::default()
            }
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(ref root) = overrides.root {
            self.documents.root = root.clone();
        }
        if let Some(port) = overrides.port {
            self.http.port = port;
        }
        if let Some(port) = overrides.tcp_port {
            self.tcp.port = port;
        }
        if let Some(ref redis) = overrides.redis {
            self.storage.redis.url = Some(with_scheme(redis, "redis"));
        }
        if let Some(ref es) = overrides.elasticsearch {
            self.storage.elasticsearch.url = Some(with_scheme(es, "http"));
        }
        if let Some(ref hostname) = overrides.hostname {
            self.targets.hostname = hostname.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.http_addr()?;
        if self.tcp.enabled {
            self.tcp_addr()?;
        }
        if self.tcp.idle_timeout_secs == 0 {
            return Err(ConfigError::NotInRange(
                "tcp.idle_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.tcp.max_capture_bytes == 0 {
            return Err(ConfigError::NotInRange(
                "tcp.max_capture_bytes must be greater than 0".to_string(),
            ));
        }
        if self.storage.bin_capacity == 0 {
            return Err(ConfigError::NotInRange(
                "storage.bin_capacity must be greater than 0".to_string(),
            ));
        }
        if self.storage.queue_depth == 0 || self.storage.workers == 0 {
            return Err(ConfigError::NotInRange(
                "storage.queue_depth and storage.workers must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Checks that the document root exists; called at start-up, not by `validate`, so that
    /// configurations can be parsed on machines without the operator files.
    pub fn check_document_root(&self) -> Result<(), ConfigError> {
        let dir = self.documents.documents_dir();
        if !dir.is_dir() {
            return Err(ConfigError::DirectoryDoesNotExist(dir.display().to_string()));
        }
        Ok(())
    }

    pub fn http_addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr(&self.http.bind_address, self.http.port)
    }

    pub fn tcp_addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr(&self.tcp.bind_address, self.tcp.port)
    }
}

fn socket_addr(address: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    let ip: IpAddr = address
        .parse()
        .map_err(|_| ConfigError::BadAddress(format!("invalid bind address {}", address)))?;
    Ok(SocketAddr::new(ip, port))
}

fn with_scheme(address: &str, scheme: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("{}://{}", scheme, address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.storage.bin_ttl_secs, 86400);
        assert_eq!(config.tcp.idle_timeout_secs, 4);
        assert_eq!(config.storage.elasticsearch.index, "requestbin");
    }

    #[test]
    fn test_sections_are_parsed() {
        let config = Config::from_toml_str(
            r#"
            [http]
            port = 8080

            [tcp]
            enabled = false
            idle_timeout_secs = 10

            [documents]
            root = "/srv/requestbin"

            [storage]
            bin_capacity = 5

            [storage.redis]
            url = "redis://127.0.0.1:6379"

            [storage.elasticsearch]
            url = "http://127.0.0.1:9200"
            index = "captures"

            [targets]
            hostname = "bin.example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.http.port, 8080);
        assert!(!config.tcp.enabled);
        assert_eq!(config.tcp.idle_timeout_secs, 10);
        assert_eq!(
            config.documents.documents_dir(),
            PathBuf::from("/srv/requestbin/documents")
        );
        assert_eq!(config.storage.bin_capacity, 5);
        assert_eq!(config.storage.redis.url.as_deref(), Some("redis://127.0.0.1:6379"));
        assert_eq!(config.storage.elasticsearch.index, "captures");
        assert_eq!(config.targets.hostname, "bin.example.com");
    }

    #[test]
    fn test_sample_file_matches_defaults() {
        let sample = include_str!("../../requestbin.toml");
        assert_eq!(Config::from_toml_str(sample).unwrap(), Config::default());
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let err = Config::from_toml_str("[storage]\nbin_capacity = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::NotInRange(_)));
    }

    #[test]
    fn test_bad_bind_address_is_rejected() {
        let err = Config::from_toml_str("[http]\nbind_address = \"nowhere\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::BadAddress(_)));
    }

    #[test]
    fn test_malformed_toml_is_reported() {
        let err = Config::from_toml_str("[http\nport = 1").unwrap_err();
        assert!(matches!(err, ConfigError::TomlError(_)));
    }

    #[test]
    fn test_overrides_add_missing_schemes() {
        let mut config = Config::default();
        config.apply(&Overrides {
            redis: Some("redis-host:6379".to_string()),
            elasticsearch: Some("https://es.internal:9200".to_string()),
            port: Some(9000),
            ..Default::default()
        });
        assert_eq!(config.storage.redis.url.as_deref(), Some("redis://redis-host:6379"));
        assert_eq!(
            config.storage.elasticsearch.url.as_deref(),
            Some("https://es.internal:9200")
        );
        assert_eq!(config.http.port, 9000);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("requestbin.toml");
        std::fs::write(&path, "[tcp]\nport = 7777\n").unwrap();

        let config = Config::load(&Overrides {
            config_file: Some(path),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(config.tcp.port, 7777);
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        std::env::set_var("TCP_PORT", "6000");
        std::env::set_var("ROOT", "/opt/bin");
        let overrides = Overrides::try_parse_from(["requestbin"]).unwrap();
        std::env::remove_var("TCP_PORT");
        std::env::remove_var("ROOT");

        let config = Config::load(&overrides).unwrap();
        assert_eq!(config.tcp.port, 6000);
        assert_eq!(config.documents.root, PathBuf::from("/opt/bin"));
    }

    #[test]
    #[serial]
    fn test_flags_win_over_environment() {
        std::env::set_var("PORT", "1111");
        let overrides = Overrides::try_parse_from(["requestbin", "--port", "2222"]).unwrap();
        std::env::remove_var("PORT");

        assert_eq!(overrides.port, Some(2222));
    }

    #[test]
    fn test_missing_document_root() {
        let mut config = Config::default();
        config.documents.root = PathBuf::from("/definitely/not/here");
        assert!(matches!(
            config.check_document_root(),
            Err(ConfigError::DirectoryDoesNotExist(_))
        ));
    }
}

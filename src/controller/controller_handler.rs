use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::configuration::config::Config;
use crate::documents::DocumentRoot;
use crate::error_handling::types::*;
use crate::handlers::HandlerChain;
use crate::network::TcpCaptureServer;
use crate::pipeline::CapturePipeline;
use crate::storage::document_storage::ElasticsearchWriter;
use crate::storage::geoip::{GeoLocator, MaxMindLocator};
use crate::storage::memory_storage::MemoryRingStore;
use crate::storage::redis_storage::RedisRingStore;
use crate::storage::{RequestWriter, StorageFanout};
use crate::targets::TargetRegistry;
use crate::web_interface::WebServer;

/// Owns the configuration and wires every component together at start-up.
pub struct Controller {
    pub config: Config,
}

impl Controller {
    /// Fails when the document root is missing, before anything is bound.
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        config.check_document_root()?;
        Ok(Self { config })
    }

    pub fn registry(&self) -> Arc<TargetRegistry> {
        Arc::new(TargetRegistry::new(
            &self.config.targets.hostname,
            self.config.tcp.port,
        ))
    }

    pub fn handler_chain(&self) -> HandlerChain {
        let documents = DocumentRoot::new(self.config.documents.documents_dir());
        HandlerChain::new(documents, self.registry())
    }

    fn geo_locator(&self) -> Result<Option<Arc<dyn GeoLocator>>, ControllerError> {
        match self.config.geoip.database {
            Some(ref path) => {
                let locator: Arc<dyn GeoLocator> = Arc::new(MaxMindLocator::open(path)?);
                Ok(Some(locator))
            }
            None => Ok(None),
        }
    }

    /// The ring store (Redis when configured, in-process otherwise), then the optional index.
    pub async fn sinks(&self) -> Result<Vec<Arc<dyn RequestWriter>>, ControllerError> {
        let storage = &self.config.storage;
        let ttl = Duration::from_secs(storage.bin_ttl_secs);

        let ring: Arc<dyn RequestWriter> = match storage.redis.url {
            Some(ref url) => Arc::new(RedisRingStore::connect(url, storage.bin_capacity, ttl).await?),
            None => {
                warn!("No Redis configured, bins are kept in memory only");
                Arc::new(MemoryRingStore::new(storage.bin_capacity, ttl))
            }
        };
        let mut sinks = vec![ring];

        if let Some(ref url) = storage.elasticsearch.url {
            let geo = self.geo_locator()?;
            let writer = ElasticsearchWriter::new(url, &storage.elasticsearch.index, geo)?;
            sinks.push(Arc::new(writer));
        } else if self.config.geoip.database.is_some() {
            warn!("GeoIP database configured without Elasticsearch, ignoring it");
        }
        Ok(sinks)
    }

    /// Only the index keeps TCP captures; the ring stores hold HTTP bins.
    pub fn stores_tcp_captures(&self) -> bool {
        self.config.storage.elasticsearch.url.is_some()
    }

    /// Starts the TCP listener (when enabled) and serves HTTP until the process ends.
    pub async fn run(self) -> Result<(), ControllerError> {
        let sinks = self.sinks().await?;
        let fanout = Arc::new(StorageFanout::new(
            sinks,
            self.config.storage.queue_depth,
            self.config.storage.workers,
        ));
        info!("Storage sinks: {}", fanout.sink_names().join(", "));

        if self.config.tcp.enabled {
            if !self.stores_tcp_captures() {
                warn!("TCP capture enabled without Elasticsearch, TCP captures will only be logged");
            }
            let listener = TcpCaptureServer::bind(self.config.tcp_addr()?).await?;
            let server = TcpCaptureServer::new(
                fanout.clone(),
                Duration::from_secs(self.config.tcp.idle_timeout_secs),
                self.config.tcp.max_capture_bytes,
            );
            tokio::spawn(server.serve(listener));
        } else {
            info!("TCP capture disabled");
        }

        let pipeline = Arc::new(CapturePipeline::new(fanout, self.handler_chain()));
        WebServer::new(pipeline).start(self.config.http_addr()?).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config_with_root(root: PathBuf) -> Config {
        let mut config = Config::default();
        config.documents.root = root;
        config
    }

    #[test]
    fn test_missing_document_root_is_fatal() {
        let result = Controller::new(config_with_root(PathBuf::from("/definitely/not/here")));
        assert!(matches!(
            result,
            Err(ControllerError::ConfigurationError(ConfigError::DirectoryDoesNotExist(_)))
        ));
    }

    #[tokio::test]
    async fn test_memory_ring_store_without_redis() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("documents")).unwrap();

        let controller = Controller::new(config_with_root(dir.path().to_path_buf())).unwrap();
        let names: Vec<&str> = controller
            .sinks()
            .await
            .unwrap()
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, vec!["memory"]);
    }

    #[tokio::test]
    async fn test_index_sink_is_added_when_configured() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("documents")).unwrap();

        let mut config = config_with_root(dir.path().to_path_buf());
        config.storage.elasticsearch.url = Some("http://127.0.0.1:9200".to_string());
        let controller = Controller::new(config).unwrap();
        let names: Vec<&str> = controller
            .sinks()
            .await
            .unwrap()
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, vec!["memory", "elasticsearch"]);
    }

    #[test]
    fn test_tcp_captures_need_the_index() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("documents")).unwrap();

        let mut config = config_with_root(dir.path().to_path_buf());
        assert!(!Controller::new(config.clone()).unwrap().stores_tcp_captures());

        config.storage.elasticsearch.url = Some("http://127.0.0.1:9200".to_string());
        assert!(Controller::new(config).unwrap().stores_tcp_captures());
    }

    #[test]
    fn test_registry_uses_configured_host_and_port() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("documents")).unwrap();

        let mut config = config_with_root(dir.path().to_path_buf());
        config.targets.hostname = "bin.example.com".to_string();
        config.tcp.port = 4444;
        let registry = Controller::new(config).unwrap().registry();
        assert_eq!(registry.get("sftp"), Some("sftp://bin.example.com:4444"));
    }
}

use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    BadAddress(String),
    NotInRange(String),
    DirectoryDoesNotExist(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::BadAddress(e) => write!(f, "Address formatting error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
            ConfigError::DirectoryDoesNotExist(e) => write!(f, "Directory error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::TomlError(err.to_string())
    }
}

/// Failures while turning a wire request into a `CapturedRequest`.
#[derive(Debug)]
pub enum NormalizeError {
    MalformedForm(String),
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::MalformedForm(e) => write!(f, "Malformed form data: {}", e),
        }
    }
}

impl std::error::Error for NormalizeError {}

#[derive(Debug)]
pub enum DocumentError {
    IoError(std::io::Error),
    TemplateError(tera::Error),
    ArchiveError(zip::result::ZipError),
    BencodeError(serde_bencode::Error),
    TemplateNotFound(String),
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentError::IoError(e) => write!(f, "Document IO error: {}", e),
            DocumentError::TemplateError(e) => write!(f, "Template error: {}", e),
            DocumentError::ArchiveError(e) => write!(f, "Archive error: {}", e),
            DocumentError::BencodeError(e) => write!(f, "Bencode error: {}", e),
            DocumentError::TemplateNotFound(e) => write!(f, "Template not found: {}", e),
        }
    }
}

impl std::error::Error for DocumentError {}

impl From<std::io::Error> for DocumentError {
    fn from(err: std::io::Error) -> Self {
        DocumentError::IoError(err)
    }
}

impl From<tera::Error> for DocumentError {
    fn from(err: tera::Error) -> Self {
        DocumentError::TemplateError(err)
    }
}

impl From<zip::result::ZipError> for DocumentError {
    fn from(err: zip::result::ZipError) -> Self {
        DocumentError::ArchiveError(err)
    }
}

impl From<serde_bencode::Error> for DocumentError {
    fn from(err: serde_bencode::Error) -> Self {
        DocumentError::BencodeError(err)
    }
}

#[derive(Debug)]
pub enum StorageError {
    ConnectionFailed(String),
    WriteFailed(String),
    ReadFailed(String),
    SerializationFailed(serde_json::Error),
    QueueFull(&'static str),
    QueueClosed(&'static str),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(e) => write!(f, "Storage connection failed: {}", e),
            StorageError::WriteFailed(e) => write!(f, "Storage write failed: {}", e),
            StorageError::ReadFailed(e) => write!(f, "Storage read failed: {}", e),
            StorageError::SerializationFailed(e) => write!(f, "Storage serialization failed: {}", e),
            StorageError::QueueFull(sink) => write!(f, "Storage queue full for sink {}", sink),
            StorageError::QueueClosed(sink) => write!(f, "Storage queue closed for sink {}", sink),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationFailed(err)
    }
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() {
            StorageError::ConnectionFailed(err.to_string())
        } else {
            StorageError::WriteFailed(err.to_string())
        }
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            StorageError::ConnectionFailed(err.to_string())
        } else {
            StorageError::WriteFailed(err.to_string())
        }
    }
}

/// GeoIP database failures. Only surfaced when opening the database; lookups
/// swallow their errors.
#[derive(Debug)]
pub enum GeoError {
    DatabaseError(maxminddb::MaxMindDBError),
}

impl fmt::Display for GeoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeoError::DatabaseError(e) => write!(f, "GeoIP database error: {}", e),
        }
    }
}

impl std::error::Error for GeoError {}

impl From<maxminddb::MaxMindDBError> for GeoError {
    fn from(err: maxminddb::MaxMindDBError) -> Self {
        GeoError::DatabaseError(err)
    }
}

#[derive(Debug)]
pub enum CaptureError {
    TcpStreamError(std::io::Error),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::TcpStreamError(e) => write!(f, "TCP stream capture error: {}", e),
        }
    }
}

impl std::error::Error for CaptureError {}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::TcpStreamError(err)
    }
}

#[derive(Debug)]
pub enum NetworkError {
    BindError(std::io::Error),
    AcceptError(std::io::Error),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::BindError(e) => write!(f, "Network bind error: {}", e),
            NetworkError::AcceptError(e) => write!(f, "Accept failed: {}", e),
        }
    }
}

impl std::error::Error for NetworkError {}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    NetworkError(NetworkError),
    StorageError(StorageError),
    GeoError(GeoError),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::NetworkError(e) => write!(f, "Network error: {}", e),
            ControllerError::StorageError(e) => write!(f, "Storage error: {}", e),
            ControllerError::GeoError(e) => write!(f, "GeoIP error: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<NetworkError> for ControllerError {
    fn from(err: NetworkError) -> Self {
        ControllerError::NetworkError(err)
    }
}

impl From<StorageError> for ControllerError {
    fn from(err: StorageError) -> Self {
        ControllerError::StorageError(err)
    }
}

impl From<GeoError> for ControllerError {
    fn from(err: GeoError) -> Self {
        ControllerError::GeoError(err)
    }
}

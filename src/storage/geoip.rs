use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use log::{info, trace};
use maxminddb::{geoip2, Reader};

use crate::data_capture::types::GeoPoint;
use crate::error_handling::types::GeoError;

/// Address to coordinates. Lookups never fail loudly: no answer means no enrichment.
pub trait GeoLocator: Send + Sync {
    fn locate(&self, remote_addr: &str) -> Option<GeoPoint>;
}

/// Locator backed by a MaxMind City database.
pub struct MaxMindLocator {
    reader: Reader<Vec<u8>>,
}

impl MaxMindLocator {
    pub fn open(path: &Path) -> Result<Self, GeoError> {
        let reader = Reader::open_readfile(path)?;
        info!("Loaded GeoIP database {}", path.display());
        Ok(Self { reader })
    }
}

impl GeoLocator for MaxMindLocator {
    fn locate(&self, remote_addr: &str) -> Option<GeoPoint> {
        let ip = parse_ip(remote_addr)?;
        let city: geoip2::City = match self.reader.lookup(ip) {
            Ok(city) => city,
            Err(e) => {
                trace!("GeoIP lookup for {} failed: {}", ip, e);
                return None;
            }
        };
        let location = city.location?;
        Some(GeoPoint {
            latitude: location.latitude?,
            longitude: location.longitude?,
        })
    }
}

/// Accepts `ip:port`, `[v6]:port` and bare addresses.
pub fn parse_ip(remote_addr: &str) -> Option<IpAddr> {
    remote_addr
        .parse::<SocketAddr>()
        .map(|addr| addr.ip())
        .or_else(|_| remote_addr.parse::<IpAddr>())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote_addresses() {
        assert_eq!(parse_ip("203.0.113.9:51234"), Some("203.0.113.9".parse().unwrap()));
        assert_eq!(parse_ip("[2001:db8::1]:443"), Some("2001:db8::1".parse().unwrap()));
        assert_eq!(parse_ip("2001:db8::1"), Some("2001:db8::1".parse().unwrap()));
        assert_eq!(parse_ip(""), None);
        assert_eq!(parse_ip("unix-socket"), None);
    }

    #[test]
    fn test_missing_database() {
        let result = MaxMindLocator::open(Path::new("/nonexistent/GeoLite2-City.mmdb"));
        assert!(matches!(result, Err(GeoError::DatabaseError(_))));
    }
}

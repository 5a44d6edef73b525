use serde::{Deserialize, Serialize};

use crate::error_handling::types::DocumentError;

/// Placeholder single-file info dictionary; only the tracker and seed URLs matter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub length: i64,
    #[serde(rename = "piece length")]
    pub piece_length: i64,
    pub pieces: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Torrent {
    pub announce: String,
    #[serde(rename = "announce-list")]
    pub announce_list: Vec<Vec<String>>,
    pub httpseeds: Vec<String>,
    pub info: FileInfo,
}

impl Torrent {
    /// A torrent whose tracker and only HTTP seed are both `url`.
    pub fn probe(url: &str) -> Self {
        Torrent {
            announce: url.to_string(),
            announce_list: vec![vec![url.to_string()]],
            httpseeds: vec![url.to_string()],
            info: FileInfo {
                name: "file.mp3".to_string(),
                length: 1024,
                piece_length: 1024,
                pieces: "01234567890123456789".to_string(),
            },
        }
    }
}

pub fn write_torrent(url: &str, out: &mut Vec<u8>) -> Result<(), DocumentError> {
    let encoded = serde_bencode::to_bytes(&Torrent::probe(url))?;
    out.extend_from_slice(&encoded);
    Ok(())
}

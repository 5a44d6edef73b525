//! XXE probe documents.
//!
//! Two request shapes select an XML or DTD probe:
//!
//! - `/{bin}/{key…}/{name}.xml` (or `.dtd`): template `xml/{name}`, falling back to
//!   `xml/file.xml`; the registry key is made of the segments between the bin and the file.
//! - `/{bin}/xml/{key…}` (or `/dtd/`): template `xml/file.xml` (or `file.dtd`); the registry key
//!   is made of the segments after the selector. A `.xml` or `.dtd` suffix on the last segment is
//!   stripped from the key and picks the template, so the `.dtd` tracker of a path-form document
//!   resolves to the DTD for the same key.
//!
//! Templates get `url`, the DTD tracker, and `target`, the resource the entity should fetch.

use std::io::Write;
use std::path::Path;

use tera::Context;

use super::templates::render_file;
use crate::error_handling::types::DocumentError;

pub const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Template directory below the document root.
const XML_DIR: &str = "xml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlProbe {
    /// Candidate templates relative to the document root, tried in order.
    pub templates: Vec<String>,
    /// Registry key segments; empty when the probe targets this server.
    pub key: Vec<String>,
}

impl XmlProbe {
    /// Recognizes the XML/DTD probe shapes; `None` for any other path.
    pub fn from_path(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 2 {
            return None;
        }

        let selector = segments[1];
        if selector == "xml" || selector == "dtd" {
            // a `.xml`/`.dtd` suffix on the last key segment selects the template
            let mut key = to_owned(&segments[2..]);
            let mut kind = selector;
            if let Some(last) = key.last_mut() {
                if let Some((stem, ext)) = last.rsplit_once('.') {
                    if ext == "xml" || ext == "dtd" {
                        kind = if ext == "xml" { "xml" } else { "dtd" };
                        *last = stem.to_string();
                    }
                }
            }
            return Some(XmlProbe {
                templates: vec![format!("{}/file.{}", XML_DIR, kind)],
                key,
            });
        }

        let name = segments[segments.len() - 1];
        let ext = name.rsplit_once('.').map(|(_, ext)| ext)?;
        if ext != "xml" && ext != "dtd" {
            return None;
        }
        let mut templates = vec![format!("{}/{}", XML_DIR, name)];
        let fallback = format!("{}/file.{}", XML_DIR, ext);
        if templates[0] != fallback {
            templates.push(fallback);
        }
        Some(XmlProbe {
            templates,
            key: to_owned(&segments[1..segments.len() - 1]),
        })
    }

    /// First candidate template present under `documents_dir`.
    pub fn template_in(&self, documents_dir: &Path) -> Option<std::path::PathBuf> {
        self.templates
            .iter()
            .map(|t| documents_dir.join(t))
            .find(|p| p.is_file())
    }

    pub fn key_segments(&self) -> Vec<&str> {
        self.key.iter().map(String::as_str).collect()
    }
}

fn to_owned(segments: &[&str]) -> Vec<String> {
    segments.iter().map(|s| s.to_string()).collect()
}

pub fn write_xml<W: Write>(
    template: &Path,
    tracker: &str,
    target: &str,
    out: W,
) -> Result<(), DocumentError> {
    let mut context = Context::new();
    context.insert("url", tracker);
    context.insert("target", target);
    render_file(template, &context, out)
}

//! Probe document synthesis.
//!
//! Each format embeds a callback URL derived from the request path (see [`rewrite`]) and is
//! rendered from operator templates under the document root. XML/DTD probes live in [`xml`]
//! since they also consult the target registry.

pub mod odt;
pub mod pdf;
pub mod rewrite;
pub mod templates;
pub mod torrent;
pub mod xml;

use std::path::{Path, PathBuf};

use tera::Context;

use crate::error_handling::types::DocumentError;

/// Formats synthesized from the request extension alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFormat {
    Odt,
    JsPdf,
    Svg,
    Pls,
    M3u,
    Asx,
    Xspf,
    Torrent,
}

impl ProbeFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "odt" => Some(ProbeFormat::Odt),
            "jspdf" => Some(ProbeFormat::JsPdf),
            "svg" => Some(ProbeFormat::Svg),
            "pls" => Some(ProbeFormat::Pls),
            "m3u" => Some(ProbeFormat::M3u),
            "asx" => Some(ProbeFormat::Asx),
            "xspf" => Some(ProbeFormat::Xspf),
            "torrent" => Some(ProbeFormat::Torrent),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ProbeFormat::Odt => "odt",
            ProbeFormat::JsPdf => "jspdf",
            ProbeFormat::Svg => "svg",
            ProbeFormat::Pls => "pls",
            ProbeFormat::M3u => "m3u",
            ProbeFormat::Asx => "asx",
            ProbeFormat::Xspf => "xspf",
            ProbeFormat::Torrent => "torrent",
        }
    }

    /// Extension the embedded callback URL is rewritten to.
    pub fn callback_extension(&self) -> &'static str {
        match self {
            ProbeFormat::Odt | ProbeFormat::JsPdf => "jpg",
            ProbeFormat::Svg => "css",
            ProbeFormat::Pls
            | ProbeFormat::M3u
            | ProbeFormat::Asx
            | ProbeFormat::Xspf
            | ProbeFormat::Torrent => "mp3",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ProbeFormat::Odt => "application/vnd.oasis.opendocument.text",
            ProbeFormat::JsPdf => "application/pdf",
            ProbeFormat::Svg => "image/svg+xml",
            ProbeFormat::Pls => "audio/x-scpls",
            ProbeFormat::M3u => "audio/mpegurl",
            ProbeFormat::Asx => "video/x-ms-asf",
            ProbeFormat::Xspf => "application/xspf+xml",
            ProbeFormat::Torrent => "application/x-bittorrent",
        }
    }

    /// File name offered for download, for the formats served as attachments.
    pub fn attachment_name(&self, path: &str) -> Option<String> {
        match self {
            ProbeFormat::Odt => Some(rewrite::basename(path).to_string()),
            ProbeFormat::JsPdf => Some(rewrite::basename(&rewrite::rewrite_extension(path, "pdf")).to_string()),
            _ => None,
        }
    }
}

/// The operator's `documents/` directory.
#[derive(Debug, Clone)]
pub struct DocumentRoot {
    dir: PathBuf,
}

impl DocumentRoot {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.join(relative)
    }

    /// Writes `format` for callback `url` into `out`.
    ///
    /// On error `out` keeps the partial document; callers log the error and serve it anyway.
    pub fn synthesize(
        &self,
        format: ProbeFormat,
        url: &str,
        out: &mut Vec<u8>,
    ) -> Result<(), DocumentError> {
        match format {
            ProbeFormat::Odt => odt::write_odt(&self.path("odt"), url, out),
            ProbeFormat::Torrent => torrent::write_torrent(url, out),
            ProbeFormat::JsPdf => {
                let (script, length) = pdf::script_payload(url);
                let mut context = Context::new();
                context.insert("url", url);
                context.insert("script", &script);
                context.insert("length", &length);
                templates::render_file(&self.path("file.jspdf"), &context, out)
            }
            ProbeFormat::Svg | ProbeFormat::Pls | ProbeFormat::M3u | ProbeFormat::Asx | ProbeFormat::Xspf => {
                let template = self.path(&format!("file.{}", format.extension()));
                templates::render_file(&template, &templates::url_context(url), out)
            }
        }
    }
}

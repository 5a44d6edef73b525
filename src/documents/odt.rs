//! OpenDocument text probe.
//!
//! An ODT file is a ZIP archive. `mimetype` must be the first entry and stored uncompressed;
//! all three entries are stored here, with a fixed timestamp, so the archive is byte-stable.

use std::io::{Cursor, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use super::templates::{read_document, render_to, url_context};
use crate::error_handling::types::DocumentError;

pub const MIMETYPE_ENTRY: &str = "mimetype";
pub const MANIFEST_ENTRY: &str = "META-INF/manifest.xml";
pub const CONTENT_ENTRY: &str = "content.xml";

/// Writes the archive for `url` into `out`, taking the parts from `source_dir`.
///
/// On error `out` keeps whatever was written so far.
pub fn write_odt(source_dir: &Path, url: &str, out: &mut Vec<u8>) -> Result<(), DocumentError> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(DateTime::default());

    let mut archive = ZipWriter::new(Cursor::new(out));

    for entry in [MIMETYPE_ENTRY, MANIFEST_ENTRY] {
        let bytes = read_document(&source_dir.join(entry))?;
        archive.start_file(entry, options)?;
        archive.write_all(&bytes)?;
    }

    let template = read_document(&source_dir.join(CONTENT_ENTRY))?;
    archive.start_file(CONTENT_ENTRY, options)?;
    render_to(
        CONTENT_ENTRY,
        &String::from_utf8_lossy(&template),
        &url_context(url),
        &mut archive,
    )?;

    archive.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn odt_source(content: &str) -> tempfile::TempDir {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("META-INF")).unwrap();
        std::fs::write(
            dir.path().join(MIMETYPE_ENTRY),
            "application/vnd.oasis.opendocument.text",
        )
        .unwrap();
        std::fs::write(dir.path().join(MANIFEST_ENTRY), "<manifest:manifest/>").unwrap();
        std::fs::write(dir.path().join(CONTENT_ENTRY), content).unwrap();
        dir
    }

    fn entries(bytes: Vec<u8>) -> Vec<(String, CompressionMethod, Vec<u8>)> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut data = Vec::new();
                file.read_to_end(&mut data).unwrap();
                (file.name().to_string(), file.compression(), data)
            })
            .collect()
    }

    #[test]
    fn test_three_stored_entries_in_order() {
        let source = odt_source("<text:p><draw:image xlink:href=\"{{ url }}\"/></text:p>");
        let mut out = Vec::new();
        write_odt(source.path(), "http://h/bin1/doc.jpg", &mut out).unwrap();

        let entries = entries(out);
        let names: Vec<&str> = entries.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(names, vec![MIMETYPE_ENTRY, MANIFEST_ENTRY, CONTENT_ENTRY]);
        assert!(entries.iter().all(|(_, m, _)| *m == CompressionMethod::Stored));
        assert_eq!(entries[0].2, b"application/vnd.oasis.opendocument.text");
        assert_eq!(
            entries[2].2,
            b"<text:p><draw:image xlink:href=\"http://h/bin1/doc.jpg\"/></text:p>"
        );
    }

    #[test]
    fn test_large_content_stays_valid() {
        let filler = "<text:p>lorem ipsum</text:p>".repeat(20_000);
        let source = odt_source(&format!("{}{{{{ url }}}}", filler));
        let mut out = Vec::new();
        write_odt(source.path(), "http://h/x.jpg", &mut out).unwrap();

        let entries = entries(out);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].2.len(), filler.len() + "http://h/x.jpg".len());
    }

    #[test]
    fn test_missing_part_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut out = Vec::new();
        let err = write_odt(dir.path(), "http://h/x.jpg", &mut out).unwrap_err();
        assert!(matches!(err, DocumentError::TemplateNotFound(_)));
    }
}

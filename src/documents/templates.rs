use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use tera::{Context, Tera, Value};

use crate::error_handling::types::DocumentError;

/// Reads a template or canned file, reporting a missing file as `TemplateNotFound`.
pub fn read_document(path: &Path) -> Result<Vec<u8>, DocumentError> {
    std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DocumentError::TemplateNotFound(path.display().to_string()),
        _ => DocumentError::IoError(e),
    })
}

/// Renders `source` into `out`.
///
/// Autoescaping is off for every template: the documents are XML, playlists and PDF, and the
/// callback URLs must come out exactly as built. XML templates escape per context instead, with
/// tera's `escape_xml` for element and attribute text and `entity_value` inside DTD entity values.
pub fn render_to<W: Write>(
    name: &str,
    source: &str,
    context: &Context,
    out: W,
) -> Result<(), DocumentError> {
    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);
    tera.register_filter("entity_value", entity_value);
    tera.add_raw_template(name, source)?;
    tera.render_to(name, context, out)?;
    Ok(())
}

/// Character references for the characters that are markup inside a DTD entity value. They are
/// expanded when the entity is declared, so the replacement text carries the original string.
pub fn entity_value(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("entity_value expects a string"))?;

    let mut output = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => output.push_str("&#38;"),
            '%' => output.push_str("&#37;"),
            '"' => output.push_str("&#34;"),
            '\'' => output.push_str("&#39;"),
            _ => output.push(c),
        }
    }
    Ok(Value::String(output))
}

/// Loads the template at `path` and renders it into `out`.
pub fn render_file<W: Write>(path: &Path, context: &Context, out: W) -> Result<(), DocumentError> {
    let raw = read_document(path)?;
    let source = String::from_utf8_lossy(&raw);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    render_to(&name, &source, context, out)
}

/// Context holding the single `url` variable most templates use.
pub fn url_context(url: &str) -> Context {
    let mut context = Context::new();
    context.insert("url", url);
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_are_not_escaped() {
        let mut out = Vec::new();
        render_to(
            "content.xml",
            "<a href=\"{{ url }}\"/>",
            &url_context("http://h/b/x.jpg?a=1&b=<2>"),
            &mut out,
        )
        .unwrap();
        assert_eq!(out, b"<a href=\"http://h/b/x.jpg?a=1&b=<2>\"/>");
    }

    #[test]
    fn test_xml_escaping_filters() {
        let context = url_context("http://h/b/x.dtd?a=1&b=%41");

        let mut out = Vec::new();
        render_to("a.svg", "<image href=\"{{ url | escape_xml }}\"/>", &context, &mut out).unwrap();
        assert_eq!(out, b"<image href=\"http://h/b/x.dtd?a=1&amp;b=%41\"/>");

        let mut out = Vec::new();
        render_to("a.dtd", "<!ENTITY % w \"{{ url | entity_value }}\">", &context, &mut out).unwrap();
        assert_eq!(out, b"<!ENTITY % w \"http://h/b/x.dtd?a=1&#38;b=&#37;41\">");
    }

    #[test]
    fn test_missing_template() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = render_file(&dir.path().join("file.svg"), &url_context("x"), Vec::<u8>::new()).unwrap_err();
        assert!(matches!(err, DocumentError::TemplateNotFound(_)));
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let err = render_to("bad", "{{ url ", &url_context("x"), Vec::<u8>::new()).unwrap_err();
        assert!(matches!(err, DocumentError::TemplateError(_)));
    }
}

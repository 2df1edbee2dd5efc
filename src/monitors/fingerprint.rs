//! Content fingerprinting for change detection
//!
//! A fingerprint is a SHA-256 hex digest of the *visible* text of a page:
//! script/style/meta/noscript/iframe blocks and all remaining markup are
//! stripped and whitespace runs are collapsed before hashing, so cosmetic
//! markup churn does not register as a content change.
//!
//! Fingerprinting must never abort a check: input that cannot be treated as
//! markup (non-UTF-8 bytes) is hashed as-is, and empty input maps to the
//! reserved empty-string sentinel which is never used as a prior value for
//! change detection.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

/// Elements whose contents change independent of substantive content.
static NOISE_ELEMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>|<iframe\b.*?</iframe\s*>",
    )
    .expect("invalid noise element pattern")
});

static COMMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("invalid comment pattern"));

/// Any remaining tag, including void elements like `<meta>` and `<br>`.
static TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("invalid tag pattern"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("invalid whitespace pattern"));

/// Compute a stable fingerprint for a raw response body.
///
/// Returns the empty string for empty input. Deterministic for all inputs.
pub fn fingerprint(raw_body: &[u8]) -> String {
    if raw_body.is_empty() {
        return String::new();
    }

    match std::str::from_utf8(raw_body) {
        Ok(body) => {
            let text = visible_text(body);
            hex::encode(Sha256::digest(text.as_bytes()))
        }
        // not parseable as markup, hash the raw bytes instead of failing
        Err(_) => hex::encode(Sha256::digest(raw_body)),
    }
}

fn visible_text(body: &str) -> String {
    let stripped = NOISE_ELEMENTS.replace_all(body, "");
    let stripped = COMMENTS.replace_all(&stripped, "");
    let stripped = TAGS.replace_all(&stripped, "");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let body = b"<html><body>Hello World</body></html>";
        assert_eq!(fingerprint(body), fingerprint(body));
    }

    #[test]
    fn test_empty_input_maps_to_sentinel() {
        assert_eq!(fingerprint(b""), "");
    }

    #[test]
    fn test_whitespace_runs_are_collapsed() {
        let a = b"<p>Hello   World</p>";
        let b = b"<p>Hello\n\t World</p>";
        assert_eq!(fingerprint(a), fingerprint(b));
    }

    #[test]
    fn test_noise_elements_are_ignored() {
        let plain = b"<html><body> Status: operational </body></html>";
        let noisy = b"<html><head><meta charset=\"utf-8\"><style>body { color: red; }</style></head>\
            <body> <script>var cacheBust = 12345;</script> Status: operational \
            <noscript>enable js</noscript><iframe src=\"/ad\"></iframe> </body></html>";
        assert_eq!(fingerprint(plain), fingerprint(noisy));
    }

    #[test]
    fn test_comments_are_ignored() {
        let a = b"<p>stable</p>";
        let b = b"<p>stable</p> <!-- generated at 10:32:01 -->";
        assert_eq!(fingerprint(a), fingerprint(b));
    }

    #[test]
    fn test_visible_text_changes_fingerprint() {
        let a = fingerprint(b"<p>price: 10</p>");
        let b = fingerprint(b"<p>price: 11</p>");
        assert_ne!(a, b);
    }

    #[test]
    fn test_non_utf8_falls_back_to_raw_hash() {
        let raw = [0x80u8, 0xff, 0x00, 0x41];
        let digest = fingerprint(&raw);
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hex::encode(Sha256::digest(raw)));
    }

    #[test]
    fn test_plain_text_body() {
        // non-markup bodies hash their collapsed text
        let digest = fingerprint(b"ok");
        assert_eq!(digest, hex::encode(Sha256::digest(b"ok")));
    }
}

//! Text capabilities injected at mount time.
//!
//! Filenames are stored as raw bytes; how those bytes map to strings and how
//! two names compare is up to the caller. The defaults are UTF-8 and plain
//! codepoint ordering.

use std::cmp::Ordering;
use std::fmt::Debug;

use crate::error::CodecError;

pub trait TextCodec: Debug + Send + Sync {
    fn encode(&self, text: &str) -> Vec<u8>;

    fn decode(&self, bytes: &[u8]) -> Result<String, CodecError>;
}

pub trait Collator: Debug + Send + Sync {
    fn compare(&self, a: &str, b: &str) -> Ordering;
}

/// UTF-8 text. A strict codec rejects malformed input, a lossy one
/// substitutes U+FFFD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Utf8 {
    fatal: bool,
}

impl Utf8 {
    pub fn strict() -> Self {
        Self { fatal: true }
    }

    pub fn lossy() -> Self {
        Self { fatal: false }
    }
}

impl Default for Utf8 {
    fn default() -> Self {
        Self::strict()
    }
}

impl TextCodec for Utf8 {
    fn encode(&self, text: &str) -> Vec<u8> {
        text.as_bytes().to_vec()
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, CodecError> {
        if self.fatal {
            std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|e| CodecError::TextDecode(e.to_string()))
        } else {
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodepointOrder;

impl Collator for CodepointOrder {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.cmp(b)
    }
}

/// ASCII case-insensitive ordering, for volumes written by hosts that do not
/// distinguish case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AsciiCaseInsensitive;

impl Collator for AsciiCaseInsensitive {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        let a = a.bytes().map(|c| c.to_ascii_lowercase());
        let b = b.bytes().map(|c| c.to_ascii_lowercase());
        a.cmp(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_rejects_malformed_bytes() {
        let err = Utf8::strict().decode(&[0x66, 0xff, 0x6f]).unwrap_err();
        assert!(matches!(err, CodecError::TextDecode(_)));
    }

    #[test]
    fn lossy_replaces_malformed_bytes() {
        let text = Utf8::lossy().decode(&[0x66, 0xff, 0x6f]).unwrap();
        assert_eq!(text, "f\u{fffd}o");
    }

    #[test]
    fn collators() {
        assert_eq!(CodepointOrder.compare("a", "a"), Ordering::Equal);
        assert_eq!(CodepointOrder.compare("A", "a"), Ordering::Less);
        assert_eq!(AsciiCaseInsensitive.compare("README.md", "readme.MD"), Ordering::Equal);
        assert_eq!(AsciiCaseInsensitive.compare("a", "B"), Ordering::Less);
    }
}

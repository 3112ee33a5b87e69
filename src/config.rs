use std::num::ParseIntError;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::text::{CodepointOrder, Collator, TextCodec, Utf8};

// -----------------------------------------------------------------------------
// Format constants
// -----------------------------------------------------------------------------

pub const MAGIC: u32 = 0xEEF5_1234;
pub const VERSION: u32 = 1;

/// Allocation table slots. Removed files keep their slot.
pub const MAX_FILES: usize = 64;
/// Size of the descriptor pool of one mounted volume.
pub const MAX_OPEN_FILES: usize = 20;
pub const MAX_FILENAME_SIZE: usize = 40;

/// Slack reserved past the written bytes when a new file is closed.
pub const DEFAULT_SPARE_BYTES: u32 = 512;

// -----------------------------------------------------------------------------
// Runtime options
// -----------------------------------------------------------------------------

/// Knobs handed to [`crate::Eefs::mount`].
#[derive(Clone, Debug)]
pub struct MountOptions {
    pub spare_bytes: u32,
    /// Every mutating call fails with `ReadOnlyFileSystem` when set.
    pub write_protected: bool,
    pub codec: Arc<dyn TextCodec>,
    pub collator: Arc<dyn Collator>,
    /// Source of the epoch seconds stamped into file headers.
    pub clock: fn() -> u32,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            spare_bytes: DEFAULT_SPARE_BYTES,
            write_protected: false,
            codec: Arc::new(Utf8::strict()),
            collator: Arc::new(CodepointOrder),
            clock: epoch_seconds,
        }
    }
}

impl MountOptions {
    pub fn with_spare_bytes(mut self, spare_bytes: u32) -> Self {
        self.spare_bytes = spare_bytes;
        self
    }

    pub fn with_write_protected(mut self, write_protected: bool) -> Self {
        self.write_protected = write_protected;
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn TextCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_collator(mut self, collator: Arc<dyn Collator>) -> Self {
        self.collator = collator;
        self
    }

    pub fn with_clock(mut self, clock: fn() -> u32) -> Self {
        self.clock = clock;
        self
    }
}

/// Wall clock in whole seconds, saturating at `u32::MAX`.
pub fn epoch_seconds() -> u32 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    u32::try_from(secs).unwrap_or(u32::MAX)
}

/// Sizes and base addresses on the command line: decimal, or hex with `0x`.
pub fn parse_u32(arg: &str) -> Result<u32, ParseIntError> {
    match arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => arg.parse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_and_hex() {
        assert_eq!(parse_u32("4096"), Ok(4096));
        assert_eq!(parse_u32("0x400"), Ok(1024));
        assert_eq!(parse_u32("0XFF"), Ok(255));
        assert!(parse_u32("0x").is_err());
        assert!(parse_u32("-1").is_err());
        assert!(parse_u32("4294967296").is_err());
    }
}

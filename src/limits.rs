use crate::model::Ms;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_NOTES_LEN: usize = 2048;
pub const MAX_REASON_LEN: usize = 512;
pub const MAX_TIMEZONE_LEN: usize = 64;

/// 1970-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;
/// 3000-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 32_503_680_000_000;

/// Longest span accepted for a block or availability row (one year).
pub const MAX_SPAN_DURATION_MS: Ms = 366 * 24 * 3_600_000;

pub const MAX_SERVICE_DURATION_MIN: u32 = 12 * 60;
pub const MIN_SLOT_GRANULARITY_MIN: u32 = 5;

pub const MAX_CATALOG_ENTRIES: usize = 100_000;
pub const MAX_INTERVALS_PER_LANE: usize = 100_000;
pub const MAX_LIST_RESULTS: usize = 10_000;

pub const DEFAULT_SHORT_CODE_LEN: usize = 6;
pub const MIN_SHORT_CODE_LEN: usize = 4;
pub const MAX_SHORT_CODE_LEN: usize = 12;
pub const SHORT_CODE_MAX_ATTEMPTS: u32 = 8;

/// Max length of a booking label in bytes.
pub const MAX_LABEL_LEN: usize = 1024;

/// Max resources a single booking may claim.
pub const MAX_RESOURCES_PER_BOOKING: usize = 64;

/// Max length of a resource name in bytes.
pub const MAX_NAME_LEN: usize = 256;

/// Earliest accepted instant (2000-01-01T00:00:00Z), in Unix ms.
pub const MIN_VALID_TIMESTAMP_MS: i64 = 946_684_800_000;

/// Latest accepted instant (2100-01-01T00:00:00Z), in Unix ms.
pub const MAX_VALID_TIMESTAMP_MS: i64 = 4_102_444_800_000;

/// Max rows accepted from one submission sheet.
pub const MAX_SUBMISSION_ROWS: usize = 100_000;

/// Shortest bookable window, in minutes.
pub const MIN_DURATION_MINUTES: i64 = 15;

/// Longest bookable window (24 hours), in minutes.
pub const MAX_DURATION_MINUTES: i64 = 24 * 60;

/// Upper bound on the free-text info attached to a reservation.
pub const MAX_INFO_LEN: usize = 256;

/// Longest request line accepted on the wire.
pub const MAX_LINE_LEN: usize = 8 * 1024;

/// Latest timestamp a stored reservation may carry (9999-12-31T23:59:59Z).
pub const MAX_TIMESTAMP: i64 = 253_402_300_799;

/// Session cookie name.
pub const COOKIE_NAME: &str = "bookit_sid";

/// Cookie lifetime: six weeks, refreshed on every response.
pub const COOKIE_MAX_AGE_SECS: i64 = 6 * 7 * 24 * 60 * 60;

/// Random bytes behind a freshly issued session token.
pub const SESSION_TOKEN_BYTES: usize = 64;

/// Group assigned to catalog records without one.
pub const DEFAULT_GROUP: &str = "Other";

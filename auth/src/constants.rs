//! Ticket guard constants.
//!
//! Fixed lengths and sentinels shared by the hash engine, the auxiliary-data
//! packing and the analyzers.

/// Number of bytes produced by the ticket digest (SHA-512).
pub const HASH_BYTE_LENGTH: usize = 64;

/// Number of lowercase hex characters in a rendered ticket hash.
pub const HASH_HEX_LENGTH: usize = HASH_BYTE_LENGTH * 2;

/// Length of a hyphenated UUID string.
pub const KEY_LENGTH: usize = 36;

/// Separator between hash and key in packed auxiliary data.
pub const AUXILIARY_SEPARATOR: char = ';';

/// Exact length of well-formed packed auxiliary data.
pub const AUXILIARY_DATA_LENGTH: usize = HASH_HEX_LENGTH + 1 + KEY_LENGTH;

/// The only credential ticket protocol version accepted.
pub const SUPPORTED_TICKET_VERSION: u8 = 2;

/// Issue dates at or before this Unix timestamp (2006-01-22T00:00:00Z) are
/// rejected as clock-rollback forgeries.
pub const ISSUE_DATE_FLOOR_UNIX: i64 = 1_137_888_000;

/// The example hash salt shipped in sample configuration files.
///
/// A deployment still using it is refused at startup.
pub const EXAMPLE_HASH_SALT: &str = "S%OV6O7L7Dtuq@EEzS&Vfu9uWO&Wrn5DejYxakxcSeMW*JlS!X@hsfEJroei!L7@Z80LQ5^z8RbYRE1M@bwJGFnZSvikZtpvNVHcoDFl*$oY7%XNDBxvh6JbAIS93RI^j";

/// Upper bound on the configured ticket lifetime (100 years).
pub const MAX_TICKET_TIMEOUT_SECONDS: i64 = 100 * 365 * 24 * 60 * 60;

/// Default credential cookie name.
pub const DEFAULT_COOKIE_NAME: &str = ".TGAUTH";

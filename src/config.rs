/// Return code the server uses for a successful action
pub const SUCCESS_RESPONSE: u8 = 1;

/// Digests are SHA-256
pub const DIGEST_LEN: usize = 32;

/// Payloads are hashed in chunks of this size
pub const HASH_CHUNK: usize = 1024;

/// Downloaded files are written in chunks of this size
pub const WRITE_CHUNK: usize = 1024;

/// RETURN_CODE, RESERVED, SESSION_ID, PAYLOAD_LEN
pub const RESPONSE_HEADER_LEN: usize = 1 + 1 + 4 + 8;

/// Responses advertising a larger payload are refused before any
/// buffer is allocated for them.
// Large enough for any file the server will hand out.
pub const MAX_RESPONSE_PAYLOAD: u64 = 4 * 1024 * 1024 * 1024;

/// Longest string that a `u16` length prefix can frame
pub const MAX_SHORT_STRING: usize = u16::MAX as usize;

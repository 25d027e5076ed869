//! Storage key generation.
//!
//! Keys look like `1718036312345-9f86d081884c7d65.jpg`:
//!
//! - a 13-digit, zero-padded unix timestamp in milliseconds, so keys sort
//!   lexically in creation order (until the year 2286);
//! - 64 bits from a cryptographically secure RNG, hex encoded;
//! - the extension of the uploaded file name, when it has a usable one.
//!
//! Two keys can only collide when minted in the same millisecond with the
//! same 64-bit token. For `n` keys minted within one millisecond that
//! probability is about `n^2 / 2^65`, i.e. below `3e-10` even for 100 000
//! keys, so no collision check against the store is made.

use chrono::Utc;
use rand::RngCore;

/// Random bytes per key.
const TOKEN_BYTES: usize = 8;

/// Longest extension carried over into a key.
const MAX_EXTENSION_LEN: usize = 16;

/// Generate a fresh storage key for a file called `original_name`.
pub fn generate(original_name: &str) -> String {
    generate_at(original_name, Utc::now().timestamp_millis())
}

/// Like [`generate`] with an explicit timestamp (milliseconds since epoch).
pub fn generate_at(original_name: &str, millis: i64) -> String {
    let mut token = [0u8; TOKEN_BYTES];
    // ThreadRng is a ChaCha-based CSPRNG reseeded from the OS.
    rand::rng().fill_bytes(&mut token);

    let stem = format!("{:013}-{}", millis.max(0), hex::encode(token));
    match extension(original_name) {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

/// The substring after the last `.` of the file's base name.
///
/// Directory components are ignored. Extensions that are empty, too long, or
/// contain anything but ASCII alphanumerics are dropped so keys stay
/// URL-safe.
pub fn extension(original_name: &str) -> Option<&str> {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    let (_, ext) = base.rsplit_once('.')?;

    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.bytes().all(|b| b.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext)
}

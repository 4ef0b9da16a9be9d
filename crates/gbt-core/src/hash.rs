//! SHA256 double-hashing and hash byte-order helpers.

use sha2::{Digest, Sha256};

/// Bitcoin's double SHA256: SHA256(SHA256(data)).
///
/// This is what transaction ids and block hashes are computed with. The
/// output is in internal byte order (reversed relative to display hex).
#[inline]
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut result = [0u8; 32];
    result.copy_from_slice(&second);
    result
}

/// Reverse the byte order of a 32-byte array.
///
/// Bitcoin displays hashes in reverse byte order, so this converts between
/// the display form and the internal form.
#[inline]
pub fn reverse_bytes(bytes: &[u8; 32]) -> [u8; 32] {
    let mut reversed = [0u8; 32];
    for i in 0..32 {
        reversed[i] = bytes[31 - i];
    }
    reversed
}

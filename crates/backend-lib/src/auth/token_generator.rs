// ============================
// crates/backend-lib/src/auth/token_generator.rs
// ============================
/** Secure random identifiers for authentication
This module provides cryptographically secure random values
for session ids, OAuth CSRF state and username suffixes. */
use rand::RngCore;

/// Session id size in bytes (32 bytes = 256 bits of entropy)
pub const SESSION_ID_BYTES: usize = 32;

/// OAuth CSRF state size in bytes
pub const CSRF_STATE_BYTES: usize = 24;

/** Generate a random session identifier
# Returns
A lowercase hex string of 64 characters */
pub fn generate_session_id() -> String {
    random_hex(SESSION_ID_BYTES)
}

/** Generate a cryptographically secure random hex string
The thread-local generator is a CSPRNG reseeded from OS entropy.
# Arguments
* `bytes` - The amount of entropy in bytes; the output has twice as many characters */
pub fn random_hex(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];
    rand::rng().fill_bytes(&mut buffer);
    hex::encode(buffer)
}

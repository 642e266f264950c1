//! Email verification codes.

use rand::{rngs::OsRng, Rng};

pub const CODE_LENGTH: usize = 6;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Draw a fresh code, each character uniform over `A-Z0-9`.
#[must_use]
pub fn generate_code() -> String {
    let mut rng = OsRng;
    (0..CODE_LENGTH)
        .map(|_| char::from(CHARSET[rng.gen_range(0..CHARSET.len())]))
        .collect()
}

/// Inbound codes are compared trimmed and uppercased.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

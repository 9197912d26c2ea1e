use std::fmt::Write as _;

use rand::RngCore;

/// `len` random bytes from the thread RNG, as lowercase hex.
#[must_use]
pub fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    let mut hex = String::with_capacity(len * 2);
    for b in &bytes {
        let _ = write!(hex, "{b:02x}");
    }
    hex
}

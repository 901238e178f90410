//! Random salt generation.

use rand::rngs::OsRng;
use rand::RngCore;

/// Returns `size` bytes from the operating system CSPRNG.
///
/// Also used for token signatures and initialization vectors; "salt" is
/// the historical name for any opaque random block handed out by the
/// security core.
pub fn random_salt(size: usize) -> Vec<u8> {
    let mut salt = vec![0u8; size];
    OsRng.fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salts_have_the_requested_size() {
        assert_eq!(random_salt(0).len(), 0);
        assert_eq!(random_salt(16).len(), 16);
        assert_eq!(random_salt(64).len(), 64);
    }

    #[test]
    fn consecutive_salts_differ() {
        // Sixteen random bytes colliding means a broken RNG, not bad luck.
        assert_ne!(random_salt(16), random_salt(16));
    }
}

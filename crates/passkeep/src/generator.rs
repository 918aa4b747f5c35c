//! Strong password generation
//!
//! Passwords are drawn uniformly, with replacement, from a fixed alphabet.
//! The caller supplies the random source; it must be a CSPRNG.

use rand::{CryptoRng, Rng};

/// Characters a generated password may contain (76 in total)
pub const ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*()-_=+";

/// Length of every generated password
pub const PASSWORD_LENGTH: usize = 16;

/// Generate a new strong password from `rng`
pub fn generate_password<R>(rng: &mut R) -> String
where
    R: Rng + CryptoRng,
{
    (0..PASSWORD_LENGTH)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Check whether `candidate` has the shape of a generated password
pub fn is_generated_shape(candidate: &str) -> bool {
    candidate.len() == PASSWORD_LENGTH && candidate.bytes().all(|b| ALPHABET.contains(&b))
}

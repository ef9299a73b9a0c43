//! Functions relating hashes and byte conversions.
//!
//! We are using SHA-256 from SHA-2 for every digest in this crate: the
//! random oracles of [`oracle`](crate::utilities::oracle) expand it, the
//! commitments of [`commits`](crate::utilities::commits) are built on it and
//! the random OT hashes its channel secrets with it.
//!
//! Different uses should hash different transcripts. For this purpose, the
//! hash function has a "salt" parameter, which is prepended to the message.

use bitcoin_hashes::{sha256, Hash};

use crate::utilities::ring::Poly;
use crate::HASH_SIZE;

/// Represents the output of the hash function.
///
/// We are using SHA-256, so the hash values have 256 bits.
pub type HashOutput = [u8; HASH_SIZE];

/// Hash with result in bytes.
#[must_use]
pub fn hash(msg: &[u8], salt: &[u8]) -> HashOutput {
    let concatenation = [salt, msg].concat();
    sha256::Hash::hash(&concatenation).to_byte_array()
}

/// Hashes the coefficients of a polynomial.
///
/// Each coefficient is written as two bytes in little-endian order, in
/// the order they appear in the polynomial.
#[must_use]
pub fn hash_poly(poly: &Poly) -> HashOutput {
    hash(&poly.to_bytes(), &[])
}

/// XOR of two byte strings of the same length.
#[must_use]
pub fn xor_bytes<const N: usize>(left: &[u8; N], right: &[u8; N]) -> [u8; N] {
    let mut result = [0u8; N];
    for ((r, l), x) in result.iter_mut().zip(left).zip(right) {
        *r = l ^ x;
    }
    result
}

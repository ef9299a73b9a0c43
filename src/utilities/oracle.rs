//! Random oracles.
//!
//! Both oracles first compute `d = H(transcript)` and then read from the
//! stream `H(d || 0), H(d || 1), ...`, where the counter is written as four
//! little-endian bytes and `H` is [`hash`].
//!
//! - [`hash_to_ring`] splits each block into words of [`MODULUS_BITS`] bits and
//!   keeps a word only if it is smaller than the modulus (rejection sampling),
//!   so the coefficients are uniform in `[0, q)` without modulo bias.
//! - [`hash_to_bytes`] keeps every byte.
//!
//! The same transcript always produces the same output. The protocols put
//! the session id at the start of their transcripts, so different sessions
//! query different points of the oracles.

use crate::utilities::hashes::{hash, HashOutput};
use crate::utilities::ring::{Domain, Poly};
use crate::{DEGREE, HASH_SIZE, MODULUS, MODULUS_BITS};

/// Number of coefficient-sized words extracted from one block.
pub const WORDS_PER_BLOCK: usize = 8 * HASH_SIZE / MODULUS_BITS;

// Produces the blocks H(d || counter).
struct Expander {
    digest: HashOutput,
    counter: u32,
}

impl Expander {
    fn new(transcript: &[u8]) -> Expander {
        Expander {
            digest: hash(transcript, &[]),
            counter: 0,
        }
    }

    fn next_block(&mut self) -> HashOutput {
        let block = hash(&self.counter.to_le_bytes(), &self.digest);
        self.counter += 1;
        block
    }
}

// Bits are read starting from the least significant bit of the first byte.
fn split_words(block: &HashOutput) -> [u16; WORDS_PER_BLOCK] {
    let mut words = [0u16; WORDS_PER_BLOCK];
    for (i, word) in words.iter_mut().enumerate() {
        let offset = i * MODULUS_BITS;
        for l in 0..MODULUS_BITS {
            let position = offset + l;
            let bit = (block[position >> 3] >> (position & 7)) & 1;
            *word |= u16::from(bit) << l;
        }
    }
    words
}

/// Hashes a transcript into a ring element with uniform coefficients.
///
/// The result is tagged as being in the evaluation representation, where
/// the protocols combine it with the public RLWE samples. Being uniform, it
/// is equally valid in the standard one.
#[must_use]
pub fn hash_to_ring(transcript: &[u8]) -> Poly {
    let mut expander = Expander::new(transcript);
    let mut coeffs: Vec<u16> = Vec::with_capacity(DEGREE);

    while coeffs.len() < DEGREE {
        let words = split_words(&expander.next_block());
        for word in words {
            if coeffs.len() == DEGREE {
                break;
            }
            if word < MODULUS {
                coeffs.push(word);
            }
        }
    }

    Poly::from_coefficients(coeffs, Domain::Evaluation)
}

/// Hashes a transcript into `output_len` bytes.
#[must_use]
pub fn hash_to_bytes(transcript: &[u8], output_len: usize) -> Vec<u8> {
    let mut expander = Expander::new(transcript);
    let mut output: Vec<u8> = Vec::with_capacity(output_len + HASH_SIZE);

    while output.len() < output_len {
        output.extend_from_slice(&expander.next_block());
    }
    output.truncate(output_len);

    output
}

/// Same as [`hash_to_bytes`], with the length fixed by the type.
#[must_use]
pub fn hash_to_array<const N: usize>(transcript: &[u8]) -> [u8; N] {
    let mut output = [0u8; N];
    output.copy_from_slice(&hash_to_bytes(transcript, N));
    output
}

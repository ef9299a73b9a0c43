//! Symmetric encryption of fixed-size payloads.
//!
//! [`SymEnc`] encrypts a plaintext of `PBYTES` bytes concatenated with
//! `RBYTES` auxiliary random bytes, zero-padded to a whole number of blocks,
//! with AES in CBC mode under a key of `KBYTES` bytes. The key size selects
//! AES-128, AES-192 or AES-256.
//!
//! There is no authentication tag: decrypting with the wrong key or IV gives
//! garbage instead of an error. The protocols using this module detect
//! tampering with their own consistency checks.

use aes::cipher::consts::U16;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::{Aes128, Aes192, Aes256};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::IV_BYTES;

pub const AES_BLOCK_SIZE: usize = 16;

pub type Iv = [u8; IV_BYTES];

/// Ciphertext together with the IV used to produce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cipher {
    #[serde(with = "serde_bytes")]
    pub buf: Vec<u8>,
    pub iv: Iv,
}

#[derive(Clone, Copy)]
enum KeySize {
    Aes128,
    Aes192,
    Aes256,
}

impl KeySize {
    fn of(key: &[u8]) -> KeySize {
        match key.len() {
            16 => KeySize::Aes128,
            24 => KeySize::Aes192,
            32 => KeySize::Aes256,
            other => panic!("AES keys have 16, 24 or 32 bytes, not {other}"),
        }
    }
}

// The chaining state lives in the mode, so the blocks must be fed in order.
fn encrypt_blocks(mut mode: impl BlockEncryptMut<BlockSize = U16>, data: &mut [u8]) {
    for chunk in data.chunks_exact_mut(AES_BLOCK_SIZE) {
        mode.encrypt_block_mut(GenericArray::from_mut_slice(chunk));
    }
}

fn decrypt_blocks(mut mode: impl BlockDecryptMut<BlockSize = U16>, data: &mut [u8]) {
    for chunk in data.chunks_exact_mut(AES_BLOCK_SIZE) {
        mode.decrypt_block_mut(GenericArray::from_mut_slice(chunk));
    }
}

// The length of `data` must be a multiple of the block size.
fn encrypt_cbc(key: &[u8], iv: &Iv, data: &mut [u8]) {
    let iv = GenericArray::from_slice(iv);
    match KeySize::of(key) {
        KeySize::Aes128 => {
            let mode = cbc::Encryptor::<Aes128>::new(GenericArray::from_slice(key), iv);
            encrypt_blocks(mode, data);
        }
        KeySize::Aes192 => {
            let mode = cbc::Encryptor::<Aes192>::new(GenericArray::from_slice(key), iv);
            encrypt_blocks(mode, data);
        }
        KeySize::Aes256 => {
            let mode = cbc::Encryptor::<Aes256>::new(GenericArray::from_slice(key), iv);
            encrypt_blocks(mode, data);
        }
    }
}

fn decrypt_cbc(key: &[u8], iv: &Iv, data: &mut [u8]) {
    let iv = GenericArray::from_slice(iv);
    match KeySize::of(key) {
        KeySize::Aes128 => {
            let mode = cbc::Decryptor::<Aes128>::new(GenericArray::from_slice(key), iv);
            decrypt_blocks(mode, data);
        }
        KeySize::Aes192 => {
            let mode = cbc::Decryptor::<Aes192>::new(GenericArray::from_slice(key), iv);
            decrypt_blocks(mode, data);
        }
        KeySize::Aes256 => {
            let mode = cbc::Decryptor::<Aes256>::new(GenericArray::from_slice(key), iv);
            decrypt_blocks(mode, data);
        }
    }
}

/// Encryption engine for plaintexts of `PBYTES` bytes, auxiliary randomness
/// of `RBYTES` bytes and keys of `KBYTES` bytes.
pub struct SymEnc<const PBYTES: usize, const RBYTES: usize, const KBYTES: usize>;

impl<const PBYTES: usize, const RBYTES: usize, const KBYTES: usize> SymEnc<PBYTES, RBYTES, KBYTES> {
    /// Size of the ciphertext buffer.
    pub const OUTPUT_LENGTH: usize = (PBYTES + RBYTES).div_ceil(AES_BLOCK_SIZE) * AES_BLOCK_SIZE;

    /// Encrypts `plaintext || aux` under `key` with a fresh random IV.
    pub fn encrypt(
        plaintext: &[u8; PBYTES],
        aux: &[u8; RBYTES],
        key: &[u8; KBYTES],
        rng: &mut (impl RngCore + CryptoRng),
    ) -> Cipher {
        let mut iv = [0u8; IV_BYTES];
        rng.fill_bytes(&mut iv);
        Self::encrypt_with_iv(plaintext, aux, key, &iv)
    }

    /// Encrypts `plaintext || aux` under `key` with the given IV.
    ///
    /// Running this with the IV of a received ciphertext checks whether the
    /// ciphertext was produced from some claimed plaintext, auxiliary bytes and key.
    #[must_use]
    pub fn encrypt_with_iv(
        plaintext: &[u8; PBYTES],
        aux: &[u8; RBYTES],
        key: &[u8; KBYTES],
        iv: &Iv,
    ) -> Cipher {
        let mut buf = vec![0u8; Self::OUTPUT_LENGTH];
        buf[..PBYTES].copy_from_slice(plaintext);
        buf[PBYTES..PBYTES + RBYTES].copy_from_slice(aux);

        encrypt_cbc(key, iv, &mut buf);

        Cipher { buf, iv: *iv }
    }

    /// Decrypts and keeps only the plaintext, dropping the auxiliary bytes
    /// and the padding.
    ///
    /// # Panics
    ///
    /// Panics if the ciphertext does not have [`Self::OUTPUT_LENGTH`] bytes.
    /// Received ciphertexts should pass [`Self::is_well_formed`] first.
    #[must_use]
    pub fn decrypt(cipher: &Cipher, key: &[u8; KBYTES]) -> [u8; PBYTES] {
        assert!(Self::is_well_formed(cipher), "ciphertext has the wrong size");

        let mut buf = cipher.buf.clone();
        decrypt_cbc(key, &cipher.iv, &mut buf);

        let mut plaintext = [0u8; PBYTES];
        plaintext.copy_from_slice(&buf[..PBYTES]);
        plaintext
    }

    #[must_use]
    pub fn is_well_formed(cipher: &Cipher) -> bool {
        cipher.buf.len() == Self::OUTPUT_LENGTH
    }
}

//! RLWE key exchange with reconciliation.
//!
//! This file implements the key exchange of Ding, Xie and Lin
//! (<https://eprint.iacr.org/2012/688.pdf>). Both parties publish a noisy
//! sample `p = m * s + e1` of the common element `m`. Multiplying the other
//! party's sample by its own secret, each of them gets an approximation of
//! `m * s_A * s_B`. The responder publishes a signal (one bit per coefficient)
//! that tells both sides how to round, and the key is the parity of the
//! rounded coefficients.
//!
//! The errors are sampled as twice a Gaussian, so the two approximations differ
//! by an even, small polynomial and their parities agree after reconciliation.
//!
//! Signal cases: the responder picks one random bit per signal. Case 0 rounds
//! with the thresholds `±q/4`, case 1 with `±(q+1)/4`. Mixing both cases
//! prevents the signal from biasing the key bits towards zero.

use rand::{CryptoRng, Rng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::protocols::{PublicParameters, SessionId};
use crate::utilities::oracle::hash_to_array;
use crate::utilities::ring::{Domain, Poly};
use crate::{BBYTES, DEGREE, MODULUS};

/// Computes the signal of `k` for the given case.
///
/// # Panics
///
/// Panics if `k` is not in the standard representation.
#[must_use]
pub fn signal(k: &Poly, case: bool) -> Poly {
    assert_eq!(k.domain(), Domain::Coefficient, "the signal needs standard coefficients");

    let threshold = if case {
        i32::from((MODULUS + 1) / 4)
    } else {
        i32::from(MODULUS / 4)
    };

    let mut sig = Poly::zero(Domain::Coefficient);
    for i in 0..DEGREE {
        let ki = Poly::centered(k.coefficient(i));
        if ki < -threshold || ki > threshold {
            sig.set_coefficient(i, 1);
        }
    }
    sig
}

/// Extracts the key bits of `k` with the help of the signal.
///
/// Where the signal is set, `q/2` is added to the coefficient before taking
/// the parity of its centered representative.
///
/// # Panics
///
/// Panics if `k` is not in the standard representation.
#[must_use]
pub fn extract(k: &Poly, sig: &Poly) -> Poly {
    assert_eq!(k.domain(), Domain::Coefficient, "the extractor needs standard coefficients");

    let mut sk = Poly::zero(Domain::Coefficient);
    for i in 0..DEGREE {
        let mut value = i64::from(k.coefficient(i));
        if sig.coefficient(i) == 1 {
            value += i64::from(MODULUS / 2);
        }
        let centered = Poly::centered(Poly::reduce(value));
        sk.set_coefficient(i, (centered & 1) as u16);
    }
    sk
}

/// Turns a shared key into symmetric key material.
///
/// The binary coefficients are packed into bytes and hashed into [`BBYTES`]
/// bytes with the random oracle.
#[must_use]
pub fn key_bytes(sk: &Poly) -> [u8; BBYTES] {
    hash_to_array::<BBYTES>(&sk.pack_bits())
}

/// Same as [`key_bytes`], but bound to a session.
///
/// This is the oracle applied to `sid || bits`, so it never coincides with
/// [`key_bytes`] of the same key.
#[must_use]
pub fn session_key_bytes(sid: SessionId, sk: &Poly) -> [u8; BBYTES] {
    let transcript = [sid.to_le_bytes().as_slice(), sk.pack_bits().as_slice()].concat();
    hash_to_array::<BBYTES>(&transcript)
}

// Samples s, e1 and e2 and computes p = m * s + e1.
// The secret s is returned in the evaluation representation, e2 in the standard one.
fn sample_rlwe(
    rng: &mut (impl RngCore + CryptoRng),
    params: &PublicParameters,
) -> (Poly, Poly, Poly) {
    let mut s = params.noise.sample_poly(rng, 1);
    let mut e1 = params.noise.sample_poly(rng, 2);
    let e2 = params.noise.sample_poly(rng, 2);
    s.ntt();
    e1.ntt();

    let p = &(&params.m * &s) + &e1;
    e1.zeroize();

    (s, e2, p)
}

// k = (p * s) back in the standard representation, plus e2.
fn raw_key(p: &Poly, s: &Poly, e2: &Poly) -> Poly {
    let mut k = p * s;
    k.inverse_ntt();
    k += e2;
    k
}

/// Initiator of the key exchange.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct AliceKE {
    s: Poly,
    e2: Poly,
}

impl AliceKE {
    /// Samples the ephemeral secrets and returns the public sample to send.
    pub fn init(rng: &mut (impl RngCore + CryptoRng), params: &PublicParameters) -> (AliceKE, Poly) {
        let (s, e2, p) = sample_rlwe(rng, params);
        (AliceKE { s, e2 }, p)
    }

    /// Combines the responder's sample and signal into the shared key.
    #[must_use]
    pub fn reconcile(&self, p_b: &Poly, sig: &Poly) -> Poly {
        let mut k = raw_key(p_b, &self.s, &self.e2);
        let sk = extract(&k, sig);
        k.zeroize();
        sk
    }
}

/// Responder of the key exchange.
///
/// The same responder can answer several initiator samples with its
/// single secret, which is what the oblivious transfers do with their two
/// channels. Each answer gets its own signal.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct BobKE {
    s: Poly,
    e2: Poly,
}

impl BobKE {
    /// Samples the ephemeral secrets and returns the public sample to send.
    pub fn init(rng: &mut (impl RngCore + CryptoRng), params: &PublicParameters) -> (BobKE, Poly) {
        let (s, e2, p) = sample_rlwe(rng, params);
        (BobKE { s, e2 }, p)
    }

    /// Answers the initiator's sample. Returns the signal to publish and the shared key.
    pub fn respond(&self, rng: &mut (impl RngCore + CryptoRng), p_a: &Poly) -> (Poly, Poly) {
        let mut k = raw_key(p_a, &self.s, &self.e2);
        let sig = signal(&k, rng.gen::<bool>());
        let sk = extract(&k, &sig);
        k.zeroize();
        (sig, sk)
    }
}

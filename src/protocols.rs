//! Two-party protocols built from the RLWE key exchange.
//!
//! # Phases
//!
//! As in the rest of the crate, each party executes its protocol in phases.
//! A phase consists of all steps that can be executed in order without the
//! need of communication. A phase receives the message sent by the other
//! party and returns the message to be sent next, together with the data
//! the party must keep for its following phase.
//!
//! Each session is identified by a [`SessionId`], which is included in every
//! message and in every transcript given to the random oracles. A party
//! aborts if it receives a message from a different session. After an abort,
//! the session must be discarded; the parties may start over with a new id.

use std::fmt;

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::utilities::gaussian::GaussianSampler;
use crate::utilities::oracle::hash_to_ring;
use crate::utilities::ring::{Domain, Poly};

pub mod key_exchange;
pub mod ot;
pub mod rot;

pub type SessionId = u32;

/// Size of `r_sid`: the session id followed by `RBYTES` random bytes.
pub const R_SID_BYTES: usize = 4 + crate::RBYTES;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorOT {
    pub description: String,
}

impl ErrorOT {
    #[must_use]
    pub fn new(description: &str) -> ErrorOT {
        ErrorOT {
            description: String::from(description),
        }
    }
}

impl fmt::Display for ErrorOT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OT aborted: {}", self.description)
    }
}

impl std::error::Error for ErrorOT {}

/// Data both parties must agree on before running a protocol.
///
/// The common ring element `m` is in the evaluation representation. The
/// noise distribution is a fixed parameter of the crate and is not sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicParameters {
    pub m: Poly,
    #[serde(skip)]
    pub noise: GaussianSampler,
}

impl PublicParameters {
    /// Samples `m` uniformly. It should be generated once and distributed
    /// to both parties out of band.
    pub fn generate(rng: &mut (impl RngCore + CryptoRng)) -> PublicParameters {
        PublicParameters {
            m: Poly::sample_uniform(rng, Domain::Evaluation),
            noise: GaussianSampler::default(),
        }
    }

    /// Derives `m` from a public seed with the random oracle, so that
    /// neither party can choose it.
    #[must_use]
    pub fn from_seed(seed: &[u8]) -> PublicParameters {
        let transcript = ["PublicParameters".as_bytes(), seed].concat();
        PublicParameters {
            m: hash_to_ring(&transcript),
            noise: GaussianSampler::default(),
        }
    }
}

/// Verifies that a received message belongs to the current session.
///
/// # Errors
///
/// Will return `Err` if the session ids are different.
pub fn check_session(expected: SessionId, received: SessionId) -> Result<(), ErrorOT> {
    if expected != received {
        tracing::warn!(expected, received, "message from another session");
        return Err(ErrorOT::new("Received a message from another session!"));
    }
    Ok(())
}

/// Verifies that a received RLWE sample is in the evaluation representation.
///
/// # Errors
///
/// Will return `Err` if the sample is in the standard representation.
pub fn check_sample(sample: &Poly) -> Result<(), ErrorOT> {
    if sample.domain() != Domain::Evaluation {
        tracing::warn!("RLWE sample in the wrong representation");
        return Err(ErrorOT::new("Received an RLWE sample in the wrong representation!"));
    }
    Ok(())
}

/// Builds `r_sid`: the session id in little-endian followed by fresh random bytes.
pub fn sample_r_sid(sid: SessionId, rng: &mut (impl RngCore + CryptoRng)) -> [u8; R_SID_BYTES] {
    let mut r_sid = [0u8; R_SID_BYTES];
    r_sid[..4].copy_from_slice(&sid.to_le_bytes());
    rng.fill_bytes(&mut r_sid[4..]);
    r_sid
}

/// Verifies that `r_sid` was built for the given session.
///
/// # Errors
///
/// Will return `Err` if the prefix of `r_sid` is not the session id.
pub fn check_r_sid(sid: SessionId, r_sid: &[u8; R_SID_BYTES]) -> Result<(), ErrorOT> {
    if r_sid[..4] != sid.to_le_bytes() {
        tracing::warn!(sid, "r_sid was built for another session");
        return Err(ErrorOT::new("The value r_sid does not contain the session id!"));
    }
    Ok(())
}

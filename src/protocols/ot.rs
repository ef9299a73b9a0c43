//! Oblivious transfer from the RLWE key exchange.
//!
//! This file implements the oblivious transfer (OT) of Branco, Ding, Goulão
//! and Mateus, "A framework for universally composable oblivious transfer from
//! one-round key-exchange" (IMACC 2019), instantiated with the key exchange of
//! [`key_exchange`](crate::protocols::key_exchange).
//!
//! The receiver (Alice) holds a bit `b` and the sender (Bob) holds two
//! messages. Alice sends one RLWE sample `p0`. Bob derives a second sample
//! `p1 = p0 + h`, where `h` comes from the random oracle on a value chosen by
//! Alice, and answers both samples. Alice only knows the secret of the sample
//! on channel `b` (she shifted `p0` by `-h` when `b = 1`), so she can only
//! complete the key exchange there. Bob cannot tell which one it is.
//!
//! Before sending the messages, Bob proves that both channels were built
//! honestly: he encrypts random pairs `(w_i, z_i)` under the channel keys and
//! links the channels with the masks `u_i`. Alice opens her channel, walks to
//! the other one through the masks, re-encrypts and compares. She answers the
//! challenge only if everything is consistent.
//!
//! # Phases
//!
//! | phase | party    | receives | sends    |
//! |-------|----------|----------|----------|
//! | 1     | receiver |          | `OTMsg1` |
//! | 1     | sender   | `OTMsg1` | `OTMsg2` |
//! | 2     | receiver | `OTMsg2` | `OTMsg3` |
//! | 2     | sender   | `OTMsg3` | `OTMsg4` |
//! | 3     | receiver | `OTMsg4` | (output) |

use rand::{CryptoRng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::protocols::key_exchange::{key_bytes, session_key_bytes, AliceKE, BobKE};
use crate::protocols::{
    check_r_sid, check_sample, check_session, sample_r_sid, ErrorOT, PublicParameters, SessionId,
    R_SID_BYTES,
};
use crate::utilities::hashes::xor_bytes;
use crate::utilities::oracle::{hash_to_array, hash_to_ring};
use crate::utilities::ring::Poly;
use crate::utilities::symenc::{Cipher, SymEnc};
use crate::{BBYTES, RBYTES};

/// Size of the masks `u0` and `u1`: they hide a triple `(w, key, z)`.
pub const UBYTES: usize = 2 * RBYTES + BBYTES;

/// Encryption used for the challenge and for the transferred messages.
pub type OTEnc = SymEnc<RBYTES, RBYTES, BBYTES>;

/// A message transferred by the OT.
pub type Payload = [u8; RBYTES];

// MESSAGES

/// Receiver to sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OTMsg1 {
    pub sid: SessionId,
    pub p0: Poly,
    #[serde(with = "serde_bytes")]
    pub r_sid: [u8; R_SID_BYTES],
}

/// Sender to receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OTMsg2 {
    pub sid: SessionId,
    pub p_s: Poly,
    pub signal0: Poly,
    pub signal1: Poly,
    pub a0: Cipher,
    pub a1: Cipher,
    #[serde(with = "serde_bytes")]
    pub u0: [u8; UBYTES],
    #[serde(with = "serde_bytes")]
    pub u1: [u8; UBYTES],
}

/// Receiver to sender: the answer to the challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OTMsg3 {
    pub sid: SessionId,
    #[serde(with = "serde_bytes")]
    pub ch: [u8; RBYTES],
}

/// Sender to receiver: the encrypted messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OTMsg4 {
    pub sid: SessionId,
    pub c0: Cipher,
    pub c1: Cipher,
}

// HELPERS

// H(sid || w), long enough to hide (w, key, z).
fn challenge_mask(sid: SessionId, w: &Payload) -> [u8; UBYTES] {
    let transcript = [sid.to_le_bytes().as_slice(), w.as_slice()].concat();
    hash_to_array::<UBYTES>(&transcript)
}

// H(sid || w0 || w1 || z0 || z1).
fn challenge(sid: SessionId, w0: &Payload, w1: &Payload, z0: &Payload, z1: &Payload) -> Payload {
    let sid_bytes = sid.to_le_bytes();
    let transcript = [&sid_bytes[..], &w0[..], &w1[..], &z0[..], &z1[..]].concat();
    hash_to_array::<RBYTES>(&transcript)
}

fn join_triple(w: &Payload, key: &[u8; BBYTES], z: &Payload) -> [u8; UBYTES] {
    let mut joined = [0u8; UBYTES];
    joined[..RBYTES].copy_from_slice(w);
    joined[RBYTES..RBYTES + BBYTES].copy_from_slice(key);
    joined[RBYTES + BBYTES..].copy_from_slice(z);
    joined
}

fn split_triple(joined: &[u8; UBYTES]) -> (Payload, [u8; BBYTES], Payload) {
    let mut w = [0u8; RBYTES];
    let mut key = [0u8; BBYTES];
    let mut z = [0u8; RBYTES];
    w.copy_from_slice(&joined[..RBYTES]);
    key.copy_from_slice(&joined[RBYTES..RBYTES + BBYTES]);
    z.copy_from_slice(&joined[RBYTES + BBYTES..]);
    (w, key, z)
}

fn check_ciphers(ciphers: [&Cipher; 2]) -> Result<(), ErrorOT> {
    if !ciphers.iter().all(|cipher| OTEnc::is_well_formed(cipher)) {
        return Err(ErrorOT::new("Received a ciphertext of the wrong size!"));
    }
    Ok(())
}

// RECEIVER

/// Receiver after Phase 1.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct AliceOT {
    sid: SessionId,
    b: bool,
    ke: AliceKE,
}

/// Receiver after Phase 2. Only the key of the chosen channel is kept.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct AliceOTKeep {
    sid: SessionId,
    b: bool,
    key: [u8; BBYTES],
}

impl AliceOT {
    /// Phase 1 - We start the key exchange and hide which channel we are going to use.
    pub fn run_phase1(
        rng: &mut (impl RngCore + CryptoRng),
        params: &PublicParameters,
        sid: SessionId,
        b: bool,
    ) -> (AliceOT, OTMsg1) {
        let (ke, mut p0) = AliceKE::init(rng, params);

        // The sender will compute p1 = p0 + h. If we want channel 1,
        // our honest sample must be p1, so we shift p0 by -h.
        let r_sid = sample_r_sid(sid, rng);
        if b {
            let h = hash_to_ring(&r_sid);
            p0 -= &h;
        }

        debug!(sid, "OT receiver: phase 1 done");

        (AliceOT { sid, b, ke }, OTMsg1 { sid, p0, r_sid })
    }

    /// Phase 2 - We verify the sender's data and answer the challenge.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the message belongs to another session, is malformed
    /// or if the sender's data is not consistent. The state is consumed either
    /// way: after an abort, the session must start over.
    pub fn run_phase2(self, msg2: &OTMsg2) -> Result<(AliceOTKeep, OTMsg3), ErrorOT> {
        let sid = self.sid;
        check_session(sid, msg2.sid)?;
        check_sample(&msg2.p_s)?;
        check_ciphers([&msg2.a0, &msg2.a1])?;

        // "Own" is our channel b, "other" is 1 - b.
        let (signal_own, a_own, a_other, u_own, u_other) = if self.b {
            (&msg2.signal1, &msg2.a1, &msg2.a0, &msg2.u1, &msg2.u0)
        } else {
            (&msg2.signal0, &msg2.a0, &msg2.a1, &msg2.u0, &msg2.u1)
        };

        // We finish the key exchange on our channel.
        let mut sk = self.ke.reconcile(&msg2.p_s, signal_own);
        let bsk = session_key_bytes(sid, &sk);

        // This should be the sender's w_b.
        let x_own = OTEnc::decrypt(a_own, &bsk);

        // The mask of our channel hides the triple of the other channel.
        let (x_other, bsk_other, y_other) =
            split_triple(&xor_bytes(u_own, &challenge_mask(sid, &x_own)));
        let other_matches =
            OTEnc::encrypt_with_iv(&x_other, &y_other, &bsk_other, &a_other.iv).buf == a_other.buf;

        // From the other channel, we must come back to what we already know.
        let (x_back, bsk_back, y_own) =
            split_triple(&xor_bytes(u_other, &challenge_mask(sid, &x_other)));
        let keys_match = x_back == x_own && bsk_back == bsk;
        let own_matches =
            OTEnc::encrypt_with_iv(&x_back, &y_own, &bsk_back, &a_own.iv).buf == a_own.buf;

        if !(other_matches & keys_match & own_matches) {
            warn!(sid, other_matches, keys_match, own_matches, "OT receiver: consistency check failed");
            sk.zeroize();
            return Err(ErrorOT::new("Sender cheated in OT: the channels are not consistent!"));
        }

        // The answer orders everything by channel.
        let ch = if self.b {
            challenge(sid, &x_other, &x_own, &y_other, &y_own)
        } else {
            challenge(sid, &x_own, &x_other, &y_own, &y_other)
        };

        let keep = AliceOTKeep {
            sid,
            b: self.b,
            key: key_bytes(&sk),
        };
        sk.zeroize();

        debug!(sid, "OT receiver: phase 2 done");

        Ok((keep, OTMsg3 { sid, ch }))
    }
}

impl AliceOTKeep {
    /// Phase 3 - We decrypt the message of our channel.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the message belongs to another session or is malformed.
    pub fn run_phase3(self, msg4: &OTMsg4) -> Result<Payload, ErrorOT> {
        check_session(self.sid, msg4.sid)?;
        check_ciphers([&msg4.c0, &msg4.c1])?;

        let c_own = if self.b { &msg4.c1 } else { &msg4.c0 };

        debug!(sid = self.sid, "OT receiver: phase 3 done");

        Ok(OTEnc::decrypt(c_own, &self.key))
    }
}

// SENDER

/// Sender after Phase 1.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct BobOT {
    sid: SessionId,
    key0: [u8; BBYTES],
    key1: [u8; BBYTES],
    ch: Payload,
}

impl BobOT {
    /// Phase 1 - We answer both channels and build the challenge.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the receiver's message is malformed.
    pub fn run_phase1(
        rng: &mut (impl RngCore + CryptoRng),
        params: &PublicParameters,
        msg1: &OTMsg1,
    ) -> Result<(BobOT, OTMsg2), ErrorOT> {
        let sid = msg1.sid;
        check_r_sid(sid, &msg1.r_sid)?;
        check_sample(&msg1.p0)?;

        // Key exchange on both channels, with a single secret.
        let (ke, p_s) = BobKE::init(rng, params);

        let h = hash_to_ring(&msg1.r_sid);
        let p1 = &msg1.p0 + &h;

        let (signal0, mut sk0) = ke.respond(rng, &msg1.p0);
        let (signal1, mut sk1) = ke.respond(rng, &p1);

        // Challenge.
        let w0: Payload = rng.gen();
        let w1: Payload = rng.gen();
        let z0: Payload = rng.gen();
        let z1: Payload = rng.gen();

        let bsk0 = session_key_bytes(sid, &sk0);
        let bsk1 = session_key_bytes(sid, &sk1);

        let a0 = OTEnc::encrypt(&w0, &z0, &bsk0, rng);
        let a1 = OTEnc::encrypt(&w1, &z1, &bsk1, rng);

        // Knowing w_i reveals everything about the other channel.
        let u0 = xor_bytes(&challenge_mask(sid, &w0), &join_triple(&w1, &bsk1, &z1));
        let u1 = xor_bytes(&challenge_mask(sid, &w1), &join_triple(&w0, &bsk0, &z0));

        let ch = challenge(sid, &w0, &w1, &z0, &z1);

        let bob = BobOT {
            sid,
            key0: key_bytes(&sk0),
            key1: key_bytes(&sk1),
            ch,
        };
        sk0.zeroize();
        sk1.zeroize();

        debug!(sid, "OT sender: phase 1 done");

        let msg2 = OTMsg2 {
            sid,
            p_s,
            signal0,
            signal1,
            a0,
            a1,
            u0,
            u1,
        };

        Ok((bob, msg2))
    }

    /// Phase 2 - If the challenge was answered correctly, we encrypt our messages.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the message belongs to another session or if the
    /// answer to the challenge is wrong.
    ///
    /// The state is consumed, so the keys of a session encrypt a single pair
    /// of messages and nothing can be retried after an abort:
    ///
    /// ```compile_fail
    /// # use rlwe_ot::protocols::ot::{AliceOT, BobOT};
    /// # use rlwe_ot::protocols::PublicParameters;
    /// # use rlwe_ot::utilities::rng;
    /// # let mut rng = rng::get_rng();
    /// # let params = PublicParameters::generate(&mut rng);
    /// # let (alice, msg1) = AliceOT::run_phase1(&mut rng, &params, 1, false);
    /// # let (bob, msg2) = BobOT::run_phase1(&mut rng, &params, &msg1).unwrap();
    /// # let (_, msg3) = alice.run_phase2(&msg2).unwrap();
    /// let first = bob.run_phase2(&mut rng, &msg3, &[0; 16], &[1; 16]);
    /// let second = bob.run_phase2(&mut rng, &msg3, &[2; 16], &[3; 16]);
    /// ```
    pub fn run_phase2(
        self,
        rng: &mut (impl RngCore + CryptoRng),
        msg3: &OTMsg3,
        msg0: &Payload,
        msg1: &Payload,
    ) -> Result<OTMsg4, ErrorOT> {
        check_session(self.sid, msg3.sid)?;

        if msg3.ch != self.ch {
            warn!(sid = self.sid, "OT sender: wrong answer to the challenge");
            return Err(ErrorOT::new("Receiver cheated in OT: wrong answer to the challenge!"));
        }

        let z0: Payload = rng.gen();
        let z1: Payload = rng.gen();

        let c0 = OTEnc::encrypt(msg0, &z0, &self.key0, rng);
        let c1 = OTEnc::encrypt(msg1, &z1, &self.key1, rng);

        debug!(sid = self.sid, "OT sender: phase 2 done");

        Ok(OTMsg4 {
            sid: self.sid,
            c0,
            c1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utilities::ring::Domain;
    use crate::utilities::rng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn run_ot(sid: SessionId, b: bool, msg0: &Payload, msg1: &Payload) -> Result<Payload, ErrorOT> {
        let mut rng = rng::get_rng();
        let params = PublicParameters::generate(&mut rng);

        let (alice, msg_1) = AliceOT::run_phase1(&mut rng, &params, sid, b);
        let (bob, msg_2) = BobOT::run_phase1(&mut rng, &params, &msg_1)?;
        let (alice_keep, msg_3) = alice.run_phase2(&msg_2)?;
        let msg_4 = bob.run_phase2(&mut rng, &msg_3, msg0, msg1)?;
        alice_keep.run_phase3(&msg_4)
    }

    // Runs until the receiver gets the second message.
    fn start(b: bool) -> (AliceOT, BobOT, OTMsg2) {
        let mut rng = rng::get_rng();
        let params = PublicParameters::generate(&mut rng);

        let (alice, msg_1) = AliceOT::run_phase1(&mut rng, &params, 7, b);
        let (bob, msg_2) = BobOT::run_phase1(&mut rng, &params, &msg_1).unwrap();
        (alice, bob, msg_2)
    }

    #[test]
    fn test_ot() {
        let mut rng = rng::get_rng();
        for i in 0..200u32 {
            let b = i % 2 == 1;
            let msg0: Payload = rng.gen();
            let msg1: Payload = rng.gen();

            let result = run_ot(i, b, &msg0, &msg1);
            if let Err(error) = &result {
                panic!("OT error: {:?}", error.description);
            }

            let received = result.unwrap();
            if b {
                assert_eq!(received, msg1);
            } else {
                assert_eq!(received, msg0);
            }
        }
    }

    #[test]
    fn test_ot_session_42() {
        let mut rng = rng::get_rng();
        let msg0: Payload = rng.gen();
        let msg1: Payload = rng.gen();

        let received = run_ot(42, true, &msg0, &msg1).unwrap();
        assert_eq!(received, msg1);
    }

    /// Every byte of the challenge ciphertexts is protected.
    #[test]
    fn test_ot_tampered_challenge_ciphertext() {
        for b in [false, true] {
            for channel in 0..2 {
                for position in (0..OTEnc::OUTPUT_LENGTH).step_by(5) {
                    let (alice, _, mut msg_2) = start(b);
                    let cipher = if channel == 0 { &mut msg_2.a0 } else { &mut msg_2.a1 };
                    cipher.buf[position] ^= 0x01;

                    assert!(alice.run_phase2(&msg_2).is_err());
                }

                let (alice, _, mut msg_2) = start(b);
                let cipher = if channel == 0 { &mut msg_2.a0 } else { &mut msg_2.a1 };
                cipher.iv[3] ^= 0x80;
                assert!(alice.run_phase2(&msg_2).is_err());
            }
        }
    }

    #[test]
    fn test_ot_tampered_masks() {
        for b in [false, true] {
            let (alice, _, mut msg_2) = start(b);
            msg_2.u0[0] ^= 0x01;
            assert!(alice.run_phase2(&msg_2).is_err());

            let (alice, _, mut msg_2) = start(b);
            msg_2.u1[UBYTES - 1] ^= 0x01;
            assert!(alice.run_phase2(&msg_2).is_err());
        }
    }

    /// A sender who encrypts a different key on one channel is caught.
    #[test]
    fn test_ot_inconsistent_sender() {
        let mut rng = rng::get_rng();
        for b in [false, true] {
            let (alice, _, mut msg_2) = start(b);
            let w: Payload = rng.gen();
            let z: Payload = rng.gen();
            let key: [u8; BBYTES] = rng.gen();
            msg_2.a1 = OTEnc::encrypt(&w, &z, &key, &mut rng);
            assert!(alice.run_phase2(&msg_2).is_err());
        }
    }

    #[test]
    fn test_ot_wrong_challenge_answer() {
        let mut rng = rng::get_rng();
        let (alice, bob, msg_2) = start(false);
        let (_, mut msg_3) = alice.run_phase2(&msg_2).unwrap();
        msg_3.ch[0] ^= 0x01;

        let result = bob.run_phase2(&mut rng, &msg_3, &[0; RBYTES], &[1; RBYTES]);
        assert!(result.is_err());
    }

    #[test]
    fn test_ot_other_session() {
        let mut rng = rng::get_rng();

        let (alice, _, mut msg_2) = start(true);
        msg_2.sid += 1;
        assert!(alice.run_phase2(&msg_2).is_err());

        let (alice, bob, msg_2) = start(true);
        let (_, mut msg_3) = alice.run_phase2(&msg_2).unwrap();
        msg_3.sid = 0;
        assert!(bob.run_phase2(&mut rng, &msg_3, &[0; RBYTES], &[1; RBYTES]).is_err());

        let (alice, bob, msg_2) = start(true);
        let (alice_keep, msg_3) = alice.run_phase2(&msg_2).unwrap();
        let mut msg_4 = bob.run_phase2(&mut rng, &msg_3, &[0; RBYTES], &[1; RBYTES]).unwrap();
        msg_4.sid = 8;
        assert!(alice_keep.run_phase3(&msg_4).is_err());
    }

    /// After the sender aborts, the receiver's answer is useless: a new
    /// session gives new keys and a new challenge.
    #[test]
    fn test_ot_abort_ends_session() {
        let mut rng = rng::get_rng();
        let params = PublicParameters::generate(&mut rng);

        let (alice, msg_1) = AliceOT::run_phase1(&mut rng, &params, 7, true);
        let (bob, msg_2) = BobOT::run_phase1(&mut rng, &params, &msg_1).unwrap();
        let (_, msg_3) = alice.run_phase2(&msg_2).unwrap();

        let mut wrong_msg_3 = msg_3.clone();
        wrong_msg_3.ch[0] ^= 0x01;
        assert!(bob.run_phase2(&mut rng, &wrong_msg_3, &[0; RBYTES], &[1; RBYTES]).is_err());

        // The sender starts over with the same first message.
        let (new_bob, _) = BobOT::run_phase1(&mut rng, &params, &msg_1).unwrap();
        assert!(new_bob.run_phase2(&mut rng, &msg_3, &[0; RBYTES], &[1; RBYTES]).is_err());
    }

    #[test]
    fn test_ot_malformed_first_message() {
        let mut rng = rng::get_rng();
        let params = PublicParameters::generate(&mut rng);
        let (_, msg_1) = AliceOT::run_phase1(&mut rng, &params, 11, false);

        let mut wrong_r_sid = msg_1.clone();
        wrong_r_sid.r_sid[0] ^= 0x01;
        assert!(BobOT::run_phase1(&mut rng, &params, &wrong_r_sid).is_err());

        let mut wrong_domain = msg_1.clone();
        wrong_domain.p0 = Poly::zero(Domain::Coefficient);
        assert!(BobOT::run_phase1(&mut rng, &params, &wrong_domain).is_err());
    }

    #[test]
    fn test_ot_malformed_ciphertext() {
        let (alice, _, mut msg_2) = start(false);
        msg_2.a1.buf.pop();
        assert!(alice.run_phase2(&msg_2).is_err());
    }

    /// With the sender's randomness fixed, its messages have the same shape for both choices.
    #[test]
    fn test_ot_sender_view_shape() {
        let params = PublicParameters::from_seed(b"shape");
        let mut shapes = Vec::new();

        for b in [false, true] {
            let mut alice_rng = StdRng::seed_from_u64(1);
            let mut bob_rng = StdRng::seed_from_u64(2);

            let (alice, msg_1) = AliceOT::run_phase1(&mut alice_rng, &params, 3, b);
            let (_, msg_2) = BobOT::run_phase1(&mut bob_rng, &params, &msg_1).unwrap();
            assert!(alice.run_phase2(&msg_2).is_ok());

            let encoded = bincode::serialize(&msg_2).unwrap();
            shapes.push((
                encoded.len(),
                msg_2.a0.buf.len(),
                msg_2.a1.buf.len(),
                msg_2.u0.len(),
                msg_2.u1.len(),
            ));
        }

        assert_eq!(shapes[0], shapes[1]);
    }
}

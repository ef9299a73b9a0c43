//! Random oblivious transfer from the RLWE key exchange.
//!
//! Same channel trick as in [`ot`](crate::protocols::ot): the receiver (Alice)
//! sends `p0`, the sender (Bob) answers `p0` and `p0 + h`, and Alice only
//! completes the key exchange on the channel `b1` she picked. Here, however,
//! nobody chooses the messages nor the final bit.
//!
//! Bob publishes the hashes of both channel keys in an order given by a
//! random bit `a1`. Alice finds her key among them, which tells her the
//! position `b = b1 xor a1`, without Bob learning it. Both messages are
//! derived from the channel keys, masks `S0` and `S1` that Alice committed to
//! in her first message and a random value `u` chosen by Bob.
//!
//! At the end, the sender gets two random messages `(M0, M1)` and the receiver
//! gets a uniform bit `b` together with `Mb`.

use rand::{CryptoRng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::protocols::key_exchange::{key_bytes, AliceKE, BobKE};
use crate::protocols::{
    check_r_sid, check_sample, check_session, sample_r_sid, ErrorOT, PublicParameters, SessionId,
    R_SID_BYTES,
};
use crate::utilities::commits::{commit, verify_commitment};
use crate::utilities::hashes::{hash, hash_poly, xor_bytes, HashOutput};
use crate::utilities::oracle::hash_to_ring;
use crate::utilities::ring::Poly;
use crate::BBYTES;

/// Mask chosen by the receiver.
pub type Mask = [u8; BBYTES];

// MESSAGES

/// Receiver to sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ROTMsg1 {
    pub sid: SessionId,
    pub p0: Poly,
    #[serde(with = "serde_bytes")]
    pub r_sid: [u8; R_SID_BYTES],
    pub h_s0: HashOutput,
    pub h_s1: HashOutput,
}

/// Sender to receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ROTMsg2 {
    pub sid: SessionId,
    pub p_s: Poly,
    pub signal0: Poly,
    pub signal1: Poly,
    #[serde(with = "serde_bytes")]
    pub u: [u8; BBYTES],
    pub hma0: HashOutput,
    pub hma1: HashOutput,
}

/// Receiver to sender: the opening of the masks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ROTMsg3 {
    pub sid: SessionId,
    #[serde(with = "serde_bytes")]
    pub s0: Mask,
    #[serde(with = "serde_bytes")]
    pub s1: Mask,
}

// OUTPUTS

/// Output of the sender: both random messages.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ROTSenderOutput {
    pub m0: HashOutput,
    pub m1: HashOutput,
}

/// Output of the receiver: a random position and the message at that position.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ROTReceiverOutput {
    pub b: bool,
    pub mb: HashOutput,
}

// M = H(key xor S xor u), salted with the session id.
fn derive_message(sid: SessionId, key: &[u8; BBYTES], mask: &Mask, u: &[u8; BBYTES]) -> HashOutput {
    let mut masked = xor_bytes(&xor_bytes(key, mask), u);
    let message = hash(&masked, &sid.to_le_bytes());
    masked.zeroize();
    message
}

// RECEIVER

/// Receiver after Phase 1.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct AliceROT {
    sid: SessionId,
    b1: bool,
    s0: Mask,
    s1: Mask,
    ke: AliceKE,
}

impl AliceROT {
    /// Phase 1 - We pick a hidden channel and commit to our masks.
    pub fn run_phase1(
        rng: &mut (impl RngCore + CryptoRng),
        params: &PublicParameters,
        sid: SessionId,
    ) -> (AliceROT, ROTMsg1) {
        let b1: bool = rng.gen();
        let (ke, mut p0) = AliceKE::init(rng, params);

        let r_sid = sample_r_sid(sid, rng);
        if b1 {
            let h = hash_to_ring(&r_sid);
            p0 -= &h;
        }

        let s0: Mask = rng.gen();
        let s1: Mask = rng.gen();

        let msg1 = ROTMsg1 {
            sid,
            p0,
            r_sid,
            h_s0: commit(&s0),
            h_s1: commit(&s1),
        };

        debug!(sid, "ROT receiver: phase 1 done");

        (
            AliceROT {
                sid,
                b1,
                s0,
                s1,
                ke,
            },
            msg1,
        )
    }

    /// Phase 2 - We find our position, compute our message and open the masks.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the message belongs to another session, is malformed
    /// or if our key is not among the sender's hashes.
    pub fn run_phase2(self, msg2: &ROTMsg2) -> Result<(ROTReceiverOutput, ROTMsg3), ErrorOT> {
        let sid = self.sid;
        check_session(sid, msg2.sid)?;
        check_sample(&msg2.p_s)?;

        let (signal, mask) = if self.b1 {
            (&msg2.signal1, &self.s1)
        } else {
            (&msg2.signal0, &self.s0)
        };

        let mut sk = self.ke.reconcile(&msg2.p_s, signal);
        let hashed_key = hash_poly(&sk);

        let b = if hashed_key == msg2.hma0 {
            false
        } else if hashed_key == msg2.hma1 {
            true
        } else {
            warn!(sid, "ROT receiver: the key is not among the sender's hashes");
            sk.zeroize();
            return Err(ErrorOT::new("Sender cheated in ROT: our key was not found!"));
        };

        let mut key = key_bytes(&sk);
        let mb = derive_message(sid, &key, mask, &msg2.u);
        key.zeroize();
        sk.zeroize();

        debug!(sid, "ROT receiver: phase 2 done");

        let msg3 = ROTMsg3 {
            sid,
            s0: self.s0,
            s1: self.s1,
        };

        Ok((ROTReceiverOutput { b, mb }, msg3))
    }
}

// SENDER

/// Sender after Phase 1.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct BobROT {
    sid: SessionId,
    a1: bool,
    key0: [u8; BBYTES],
    key1: [u8; BBYTES],
    u: [u8; BBYTES],
    h_s0: HashOutput,
    h_s1: HashOutput,
}

impl BobROT {
    /// Phase 1 - We answer both channels and publish the hashes of the keys in a random order.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the receiver's message is malformed.
    pub fn run_phase1(
        rng: &mut (impl RngCore + CryptoRng),
        params: &PublicParameters,
        msg1: &ROTMsg1,
    ) -> Result<(BobROT, ROTMsg2), ErrorOT> {
        let sid = msg1.sid;
        check_r_sid(sid, &msg1.r_sid)?;
        check_sample(&msg1.p0)?;

        let (ke, p_s) = BobKE::init(rng, params);

        let h = hash_to_ring(&msg1.r_sid);
        let p1 = &msg1.p0 + &h;

        let (signal0, mut sk0) = ke.respond(rng, &msg1.p0);
        let (signal1, mut sk1) = ke.respond(rng, &p1);

        let a1: bool = rng.gen();
        let u: [u8; BBYTES] = rng.gen();

        let (hma0, hma1) = if a1 {
            (hash_poly(&sk1), hash_poly(&sk0))
        } else {
            (hash_poly(&sk0), hash_poly(&sk1))
        };

        let bob = BobROT {
            sid,
            a1,
            key0: key_bytes(&sk0),
            key1: key_bytes(&sk1),
            u,
            h_s0: msg1.h_s0,
            h_s1: msg1.h_s1,
        };
        sk0.zeroize();
        sk1.zeroize();

        debug!(sid, "ROT sender: phase 1 done");

        let msg2 = ROTMsg2 {
            sid,
            p_s,
            signal0,
            signal1,
            u,
            hma0,
            hma1,
        };

        Ok((bob, msg2))
    }

    /// Phase 2 - We verify the masks and compute both messages.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the message belongs to another session or if the
    /// masks do not match the commitments. The state is consumed either way,
    /// so the masks of a session cannot be tried twice:
    ///
    /// ```compile_fail
    /// # use rlwe_ot::protocols::rot::{AliceROT, BobROT};
    /// # use rlwe_ot::protocols::PublicParameters;
    /// # use rlwe_ot::utilities::rng;
    /// # let mut rng = rng::get_rng();
    /// # let params = PublicParameters::generate(&mut rng);
    /// # let (alice, msg1) = AliceROT::run_phase1(&mut rng, &params, 1);
    /// # let (bob, msg2) = BobROT::run_phase1(&mut rng, &params, &msg1).unwrap();
    /// # let (_, msg3) = alice.run_phase2(&msg2).unwrap();
    /// let first = bob.run_phase2(&msg3);
    /// let second = bob.run_phase2(&msg3);
    /// ```
    pub fn run_phase2(self, msg3: &ROTMsg3) -> Result<ROTSenderOutput, ErrorOT> {
        check_session(self.sid, msg3.sid)?;

        if !verify_commitment(&msg3.s0, &self.h_s0) || !verify_commitment(&msg3.s1, &self.h_s1) {
            warn!(sid = self.sid, "ROT sender: masks do not match the commitments");
            return Err(ErrorOT::new("Receiver cheated in ROT: the masks were not committed!"));
        }

        // Position j of the output belongs to the key hashed at position j.
        let (first, second) = if self.a1 {
            ((&self.key1, &msg3.s1), (&self.key0, &msg3.s0))
        } else {
            ((&self.key0, &msg3.s0), (&self.key1, &msg3.s1))
        };

        let m0 = derive_message(self.sid, first.0, first.1, &self.u);
        let m1 = derive_message(self.sid, second.0, second.1, &self.u);

        debug!(sid = self.sid, "ROT sender: phase 2 done");

        Ok(ROTSenderOutput { m0, m1 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utilities::ring::Domain;
    use crate::utilities::rng;

    fn run_rot(sid: SessionId) -> Result<(ROTSenderOutput, ROTReceiverOutput), ErrorOT> {
        let mut rng = rng::get_rng();
        let params = PublicParameters::generate(&mut rng);

        let (alice, msg_1) = AliceROT::run_phase1(&mut rng, &params, sid);
        let (bob, msg_2) = BobROT::run_phase1(&mut rng, &params, &msg_1)?;
        let (receiver_output, msg_3) = alice.run_phase2(&msg_2)?;
        let sender_output = bob.run_phase2(&msg_3)?;

        Ok((sender_output, receiver_output))
    }

    fn start() -> (AliceROT, BobROT, ROTMsg2) {
        let mut rng = rng::get_rng();
        let params = PublicParameters::generate(&mut rng);

        let (alice, msg_1) = AliceROT::run_phase1(&mut rng, &params, 5);
        let (bob, msg_2) = BobROT::run_phase1(&mut rng, &params, &msg_1).unwrap();
        (alice, bob, msg_2)
    }

    #[test]
    fn test_rot() {
        let mut counts = [0usize; 2];

        for i in 0..1000u32 {
            let result = run_rot(i);
            if let Err(error) = &result {
                panic!("ROT error: {:?}", error.description);
            }

            let (sender_output, receiver_output) = result.unwrap();
            if receiver_output.b {
                assert_eq!(receiver_output.mb, sender_output.m1);
                assert_ne!(receiver_output.mb, sender_output.m0);
            } else {
                assert_eq!(receiver_output.mb, sender_output.m0);
                assert_ne!(receiver_output.mb, sender_output.m1);
            }
            counts[usize::from(receiver_output.b)] += 1;
        }

        // The bit is uniform: each value appears about 500 times.
        assert!(counts[0] > 400 && counts[1] > 400);
    }

    // Runs until the sender gets the opening of the masks.
    fn open() -> (BobROT, ROTMsg3) {
        let (alice, bob, msg_2) = start();
        let (_, msg_3) = alice.run_phase2(&msg_2).unwrap();
        (bob, msg_3)
    }

    #[test]
    fn test_rot_tampered_masks() {
        let (bob, mut msg_3) = open();
        msg_3.s0[0] ^= 0x01;
        assert!(bob.run_phase2(&msg_3).is_err());

        let (bob, mut msg_3) = open();
        msg_3.s1[BBYTES - 1] ^= 0x80;
        assert!(bob.run_phase2(&msg_3).is_err());

        // The masks cannot be swapped either.
        let (bob, mut msg_3) = open();
        std::mem::swap(&mut msg_3.s0, &mut msg_3.s1);
        assert!(bob.run_phase2(&msg_3).is_err());

        let (bob, msg_3) = open();
        assert!(bob.run_phase2(&msg_3).is_ok());
    }

    /// After an abort, the opening of the masks only fits the old session.
    #[test]
    fn test_rot_abort_ends_session() {
        let mut rng = rng::get_rng();
        let params = PublicParameters::generate(&mut rng);

        let (alice, msg_1) = AliceROT::run_phase1(&mut rng, &params, 5);
        let (bob, msg_2) = BobROT::run_phase1(&mut rng, &params, &msg_1).unwrap();
        let (receiver_output, msg_3) = alice.run_phase2(&msg_2).unwrap();

        let mut tampered = msg_3.clone();
        tampered.s0[0] ^= 0x01;
        assert!(bob.run_phase2(&tampered).is_err());

        // A new sender for the same first message draws new keys and a new u.
        let (new_bob, _) = BobROT::run_phase1(&mut rng, &params, &msg_1).unwrap();
        let output = new_bob.run_phase2(&msg_3).unwrap();
        assert_ne!(output.m0, receiver_output.mb);
        assert_ne!(output.m1, receiver_output.mb);
    }

    #[test]
    fn test_rot_unknown_key() {
        let (alice, _, mut msg_2) = start();
        msg_2.hma0[0] ^= 0x01;
        msg_2.hma1[0] ^= 0x01;
        assert!(alice.run_phase2(&msg_2).is_err());
    }

    #[test]
    fn test_rot_other_session() {
        let (alice, _, mut msg_2) = start();
        msg_2.sid = 6;
        assert!(alice.run_phase2(&msg_2).is_err());

        let (bob, mut msg_3) = open();
        msg_3.sid = 4;
        assert!(bob.run_phase2(&msg_3).is_err());
    }

    #[test]
    fn test_rot_malformed_first_message() {
        let mut rng = rng::get_rng();
        let params = PublicParameters::generate(&mut rng);
        let (_, msg_1) = AliceROT::run_phase1(&mut rng, &params, 9);

        let mut wrong_r_sid = msg_1.clone();
        wrong_r_sid.r_sid[2] ^= 0x01;
        assert!(BobROT::run_phase1(&mut rng, &params, &wrong_r_sid).is_err());

        let mut wrong_domain = msg_1.clone();
        wrong_domain.p0 = Poly::zero(Domain::Coefficient);
        assert!(BobROT::run_phase1(&mut rng, &params, &wrong_domain).is_err());
    }

    #[test]
    fn test_derive_message_depends_on_session() {
        let key = [1u8; BBYTES];
        let mask = [2u8; BBYTES];
        let u = [3u8; BBYTES];

        assert_eq!(derive_message(1, &key, &mask, &u), derive_message(1, &key, &mask, &u));
        assert_ne!(derive_message(1, &key, &mask, &u), derive_message(2, &key, &mask, &u));
    }
}

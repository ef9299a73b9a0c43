//! Commit and decommit.
//!
//! The random OT commits to the receiver's masks before they are used and
//! opens them in the last message. The masks are uniformly random, so we
//! commit by hashing them directly, without an extra salt: the commitment
//! is `H(msg)` and the opening is `msg` itself.
use crate::utilities::hashes::{hash, HashOutput};

/// Commits to a given message.
///
/// The sender should first communicate the commitment. When he wants to decommit,
/// he sends the message.
#[must_use]
pub fn commit(msg: &[u8]) -> HashOutput {
    hash(msg, &[])
}

/// Verifies a commitment for a message.
///
/// After having received the commitment and later the message, the receiver
/// verifies if these data are compatible.
#[must_use]
pub fn verify_commitment(msg: &[u8], commitment: &HashOutput) -> bool {
    let expected_commitment = commit(msg);
    *commitment == expected_commitment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utilities::rng;
    use rand::Rng;

    #[test]
    fn test_commit_decommit() {
        let msg = rng::get_rng().gen::<[u8; 16]>();
        let commitment = commit(&msg);
        assert!(verify_commitment(&msg, &commitment));
    }

    #[test]
    fn test_commit_decommit_fail_msg() {
        let msg = rng::get_rng().gen::<[u8; 16]>();
        let commitment = commit(&msg);
        let msg = rng::get_rng().gen::<[u8; 16]>(); //We change the message
        assert!(!(verify_commitment(&msg, &commitment))); //The test can fail but with very low probability
    }

    #[test]
    fn test_commit_decommit_fail_commitment() {
        let msg = rng::get_rng().gen::<[u8; 16]>();
        let commitment = rng::get_rng().gen::<HashOutput>(); //We change the commitment
        assert!(!(verify_commitment(&msg, &commitment))); //The test can fail but with very low probability
    }

    #[test]
    fn test_commit_single_bit_flip() {
        let msg = rng::get_rng().gen::<[u8; 16]>();
        let commitment = commit(&msg);
        for i in 0..msg.len() {
            let mut tampered = msg;
            tampered[i] ^= 1;
            assert!(!(verify_commitment(&tampered, &commitment)));
        }
    }
}

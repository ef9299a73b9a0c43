//! The random number generator handed to the protocols.
//!
//! Every sampling step of the crate receives its generator explicitly, so a
//! session can run on its own generator and several sessions can run on
//! different threads. [`get_rng`] is the generator we use by default.
//!
//! With the feature `insecure-rng`, the generator is deterministic: each thread
//! derives its generators from a fixed seed. This is only meant for
//! reproducing test runs.

#[cfg(feature = "insecure-rng")]
use rand::rngs::StdRng;
#[cfg(not(feature = "insecure-rng"))]
use rand::rngs::ThreadRng;
#[cfg(feature = "insecure-rng")]
use rand::{Rng, SeedableRng};
#[cfg(feature = "insecure-rng")]
use std::cell::RefCell;

pub const DEFAULT_SEED: u64 = 42;

#[cfg(feature = "insecure-rng")]
thread_local! {
    static SEED_SOURCE: RefCell<StdRng> = RefCell::new(StdRng::seed_from_u64(DEFAULT_SEED));
}

#[cfg(not(feature = "insecure-rng"))]
#[must_use]
pub fn get_rng() -> ThreadRng {
    rand::thread_rng()
}

// Consecutive calls return different streams.
#[cfg(feature = "insecure-rng")]
#[must_use]
pub fn get_rng() -> StdRng {
    SEED_SOURCE.with(|source| StdRng::seed_from_u64(source.borrow_mut().gen()))
}

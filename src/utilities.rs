//! Building blocks needed in `protocols`.

pub mod commits;
pub mod gaussian;
pub mod hashes;
pub mod oracle;
pub mod ring;
pub mod rng;
pub mod symenc;

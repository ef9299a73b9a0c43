pub mod protocols;
pub mod utilities;

// Ring Z_q[X]/(X^DEGREE + 1). MODULUS is 1 mod 2*DEGREE so the negacyclic NTT exists.
pub const DEGREE: usize = 512;
pub const MODULUS: u16 = 12289;
pub const MODULUS_BITS: usize = 14;

// Standard deviation of the noise, sqrt(8/2).
pub const SIGMA: f64 = 2.0;

// Size of the random values exchanged during OT (and of the transferred messages).
pub const RBYTES: usize = 16;
// Size of the symmetric keys derived through the random oracle (AES-128).
pub const BBYTES: usize = 16;
// Output of the digest (SHA-256).
pub const HASH_SIZE: usize = 32;
pub const IV_BYTES: usize = 16;

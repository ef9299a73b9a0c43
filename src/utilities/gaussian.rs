//! Discrete Gaussian noise for the RLWE samples.
//!
//! The sampler inverts a cumulative distribution table (CDT) of the
//! distribution centered at zero, cut at [`TAIL_CUT`] standard deviations.
//! It is not constant time.

use rand::{CryptoRng, Rng, RngCore};

use crate::utilities::ring::{Domain, Poly};
use crate::{DEGREE, SIGMA};

pub const TAIL_CUT: f64 = 12.0;

#[derive(Debug, Clone)]
pub struct GaussianSampler {
    sigma: f64,
    // cdt[k] = P(|x| <= k).
    cdt: Vec<f64>,
}

impl Default for GaussianSampler {
    fn default() -> Self {
        GaussianSampler::new(SIGMA)
    }
}

impl GaussianSampler {
    /// # Panics
    ///
    /// Panics if `sigma` is not positive.
    #[must_use]
    pub fn new(sigma: f64) -> GaussianSampler {
        assert!(sigma > 0.0, "the standard deviation must be positive");

        let bound = (TAIL_CUT * sigma).ceil() as usize;

        // Zero appears once, every other magnitude twice (one for each sign).
        let weights: Vec<f64> = (0..=bound)
            .map(|k| {
                let density = (-((k * k) as f64) / (2.0 * sigma * sigma)).exp();
                if k == 0 {
                    density
                } else {
                    2.0 * density
                }
            })
            .collect();
        let total: f64 = weights.iter().sum();

        let mut cdt = Vec::with_capacity(weights.len());
        let mut accumulated = 0.0;
        for weight in weights {
            accumulated += weight / total;
            cdt.push(accumulated);
        }

        GaussianSampler { sigma, cdt }
    }

    #[must_use]
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Samples one integer.
    pub fn sample(&self, rng: &mut (impl RngCore + CryptoRng)) -> i32 {
        let u: f64 = rng.gen();
        let magnitude = self
            .cdt
            .iter()
            .position(|&c| u < c)
            .unwrap_or(self.cdt.len() - 1) as i32;

        if magnitude != 0 && rng.gen::<bool>() {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Samples a ring element whose coefficients are `factor` times independent
    /// Gaussian integers. The result is in the standard representation.
    pub fn sample_poly(&self, rng: &mut (impl RngCore + CryptoRng), factor: i64) -> Poly {
        let coeffs = (0..DEGREE)
            .map(|_| Poly::reduce(factor * i64::from(self.sample(rng))))
            .collect();
        Poly::from_coefficients(coeffs, Domain::Coefficient)
    }
}

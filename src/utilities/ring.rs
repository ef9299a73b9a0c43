//! Arithmetic in the ring `Z_q[X]/(X^n + 1)`.
//!
//! This is the polynomial capability the protocols run on: ring operations,
//! the negacyclic number-theoretic transform (NTT), coefficient access and
//! uniform sampling. Here `n` = [`DEGREE`] and `q` = [`MODULUS`].
//!
//! A [`Poly`] remembers whether its coefficients are in the standard
//! representation or in the evaluation (NTT) representation. Multiplication
//! is only defined for two elements in the evaluation representation, while
//! addition and subtraction require both operands to be in the same one.
//! Mixing representations is a programming error and panics.

use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::sync::OnceLock;

use rand::{CryptoRng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::{DEGREE, MODULUS};

const Q: u32 = MODULUS as u32;

/// Representation of the coefficients of a [`Poly`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Domain {
    Coefficient,
    Evaluation,
}

/// An element of the ring, with every coefficient in `[0, q)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
#[serde(try_from = "PolyData")]
pub struct Poly {
    coeffs: Vec<u16>,
    #[zeroize(skip)]
    domain: Domain,
}

// Unchecked form used when deserializing. Elements coming from the wire are
// validated before they become a `Poly`.
#[derive(Deserialize)]
struct PolyData {
    coeffs: Vec<u16>,
    domain: Domain,
}

impl TryFrom<PolyData> for Poly {
    type Error = String;

    fn try_from(data: PolyData) -> Result<Poly, String> {
        if data.coeffs.len() != DEGREE {
            return Err(format!(
                "Ring element has {} coefficients instead of {}!",
                data.coeffs.len(),
                DEGREE
            ));
        }
        if data.coeffs.iter().any(|&c| c >= MODULUS) {
            return Err(String::from("Ring element has a coefficient out of range!"));
        }

        Ok(Poly {
            coeffs: data.coeffs,
            domain: data.domain,
        })
    }
}

impl Poly {
    #[must_use]
    pub fn zero(domain: Domain) -> Poly {
        Poly {
            coeffs: vec![0; DEGREE],
            domain,
        }
    }

    /// Builds a ring element from its coefficients.
    ///
    /// # Panics
    ///
    /// Panics if there are not exactly [`DEGREE`] coefficients or if one of
    /// them is not smaller than [`MODULUS`].
    #[must_use]
    pub fn from_coefficients(coeffs: Vec<u16>, domain: Domain) -> Poly {
        assert_eq!(coeffs.len(), DEGREE, "wrong number of coefficients");
        assert!(
            coeffs.iter().all(|&c| c < MODULUS),
            "coefficient out of range"
        );
        Poly { coeffs, domain }
    }

    /// Samples every coefficient uniformly in `[0, q)`.
    ///
    /// The result is uniform in both representations, so the caller chooses
    /// how it should be tagged.
    pub fn sample_uniform(rng: &mut (impl RngCore + CryptoRng), domain: Domain) -> Poly {
        let coeffs = (0..DEGREE).map(|_| rng.gen_range(0..MODULUS)).collect();
        Poly { coeffs, domain }
    }

    #[must_use]
    pub fn domain(&self) -> Domain {
        self.domain
    }

    #[must_use]
    pub fn coefficients(&self) -> &[u16] {
        &self.coeffs
    }

    #[must_use]
    pub fn coefficient(&self, index: usize) -> u16 {
        self.coeffs[index]
    }

    /// # Panics
    ///
    /// Panics if `value` is not smaller than [`MODULUS`].
    pub fn set_coefficient(&mut self, index: usize, value: u16) {
        assert!(value < MODULUS, "coefficient out of range");
        self.coeffs[index] = value;
    }

    /// Moves the element to the evaluation representation.
    ///
    /// # Panics
    ///
    /// Panics if the element is already in the evaluation representation.
    pub fn ntt(&mut self) {
        assert_eq!(self.domain, Domain::Coefficient, "element is already transformed");
        let tables = ntt_tables();

        // The negacyclic transform is the cyclic one applied to a_j * psi^j.
        for (c, &psi_j) in self.coeffs.iter_mut().zip(&tables.psi_powers) {
            *c = mul_mod(u32::from(*c), psi_j) as u16;
        }
        cyclic_ntt(&mut self.coeffs, tables.omega);

        self.domain = Domain::Evaluation;
    }

    /// Moves the element back to the standard representation.
    ///
    /// # Panics
    ///
    /// Panics if the element is already in the standard representation.
    pub fn inverse_ntt(&mut self) {
        assert_eq!(self.domain, Domain::Evaluation, "element is not transformed");
        let tables = ntt_tables();

        cyclic_ntt(&mut self.coeffs, tables.omega_inv);
        // This factor also contains the division by n.
        for (c, &factor) in self.coeffs.iter_mut().zip(&tables.inv_psi_powers) {
            *c = mul_mod(u32::from(*c), factor) as u16;
        }

        self.domain = Domain::Coefficient;
    }

    /// Coefficients as bytes, two little-endian bytes each.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.coeffs.iter().flat_map(|c| c.to_le_bytes()).collect()
    }

    /// Packs the parity of each coefficient into `n/8` bytes.
    ///
    /// Coefficient `i` goes to bit `i % 8` of byte `i / 8`. For the binary
    /// polynomials produced by the key exchange, this is a lossless encoding.
    #[must_use]
    pub fn pack_bits(&self) -> Vec<u8> {
        let mut packed = vec![0u8; DEGREE.div_ceil(8)];
        for (i, c) in self.coeffs.iter().enumerate() {
            packed[i / 8] |= ((c & 1) as u8) << (i & 7);
        }
        packed
    }

    /// Maps a coefficient to its representative in `[-q/2, q/2]`.
    #[must_use]
    pub fn centered(value: u16) -> i32 {
        let value = i32::from(value);
        if value <= i32::from(MODULUS / 2) {
            value
        } else {
            value - i32::from(MODULUS)
        }
    }

    /// Maps any integer to `[0, q)`.
    #[must_use]
    pub fn reduce(value: i64) -> u16 {
        value.rem_euclid(i64::from(MODULUS)) as u16
    }
}

impl Add<&Poly> for &Poly {
    type Output = Poly;

    fn add(self, rhs: &Poly) -> Poly {
        let mut result = self.clone();
        result += rhs;
        result
    }
}

impl AddAssign<&Poly> for Poly {
    fn add_assign(&mut self, rhs: &Poly) {
        assert_eq!(self.domain, rhs.domain, "representations do not match");
        for (a, b) in self.coeffs.iter_mut().zip(&rhs.coeffs) {
            *a = ((u32::from(*a) + u32::from(*b)) % Q) as u16;
        }
    }
}

impl Sub<&Poly> for &Poly {
    type Output = Poly;

    fn sub(self, rhs: &Poly) -> Poly {
        let mut result = self.clone();
        result -= rhs;
        result
    }
}

impl SubAssign<&Poly> for Poly {
    fn sub_assign(&mut self, rhs: &Poly) {
        assert_eq!(self.domain, rhs.domain, "representations do not match");
        for (a, b) in self.coeffs.iter_mut().zip(&rhs.coeffs) {
            *a = ((u32::from(*a) + Q - u32::from(*b)) % Q) as u16;
        }
    }
}

impl Mul<&Poly> for &Poly {
    type Output = Poly;

    fn mul(self, rhs: &Poly) -> Poly {
        assert!(
            self.domain == Domain::Evaluation && rhs.domain == Domain::Evaluation,
            "multiplication needs both operands in the evaluation representation"
        );
        let coeffs = self
            .coeffs
            .iter()
            .zip(&rhs.coeffs)
            .map(|(&a, &b)| mul_mod(u32::from(a), u32::from(b)) as u16)
            .collect();

        Poly {
            coeffs,
            domain: Domain::Evaluation,
        }
    }
}

// NTT

struct NttTables {
    omega: u32,
    omega_inv: u32,
    psi_powers: Vec<u32>,
    inv_psi_powers: Vec<u32>,
}

fn ntt_tables() -> &'static NttTables {
    static TABLES: OnceLock<NttTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let psi = primitive_root_of_unity(2 * DEGREE as u32);
        let psi_inv = inverse_mod(psi);
        let n_inv = inverse_mod(DEGREE as u32);

        let mut psi_powers = Vec::with_capacity(DEGREE);
        let mut inv_psi_powers = Vec::with_capacity(DEGREE);
        let mut power = 1;
        let mut inv_power = n_inv;
        for _ in 0..DEGREE {
            psi_powers.push(power);
            inv_psi_powers.push(inv_power);
            power = mul_mod(power, psi);
            inv_power = mul_mod(inv_power, psi_inv);
        }

        let omega = mul_mod(psi, psi);
        NttTables {
            omega,
            omega_inv: inverse_mod(omega),
            psi_powers,
            inv_psi_powers,
        }
    })
}

fn mul_mod(a: u32, b: u32) -> u32 {
    a * b % Q
}

fn pow_mod(base: u32, mut exponent: u32) -> u32 {
    let mut result = 1;
    let mut base = base % Q;
    while exponent > 0 {
        if exponent & 1 == 1 {
            result = mul_mod(result, base);
        }
        base = mul_mod(base, base);
        exponent >>= 1;
    }
    result
}

fn inverse_mod(a: u32) -> u32 {
    pow_mod(a, Q - 2)
}

// q - 1 = 2^12 * 3, so g generates Z_q^* when g^((q-1)/2) and g^((q-1)/3) differ from 1.
fn primitive_root_of_unity(order: u32) -> u32 {
    let generator = (2..Q)
        .find(|&g| pow_mod(g, (Q - 1) / 2) != 1 && pow_mod(g, (Q - 1) / 3) != 1)
        .unwrap_or(11);
    pow_mod(generator, (Q - 1) / order)
}

// Iterative Cooley-Tukey transform of length n with a primitive n-th root of unity.
fn cyclic_ntt(values: &mut [u16], root: u32) {
    let n = values.len();

    let bits = n.trailing_zeros();
    for i in 0..n {
        let j = i.reverse_bits() >> (usize::BITS - bits);
        if i < j {
            values.swap(i, j);
        }
    }

    let mut len = 2;
    while len <= n {
        let step = pow_mod(root, (n / len) as u32);
        for start in (0..n).step_by(len) {
            let mut w = 1;
            for k in 0..len / 2 {
                let u = u32::from(values[start + k]);
                let v = mul_mod(u32::from(values[start + k + len / 2]), w);
                values[start + k] = ((u + v) % Q) as u16;
                values[start + k + len / 2] = ((u + Q - v) % Q) as u16;
                w = mul_mod(w, step);
            }
        }
        len <<= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utilities::rng;

    // Schoolbook multiplication in Z_q[X]/(X^n + 1).
    fn negacyclic_product(a: &[u16], b: &[u16]) -> Vec<u16> {
        let mut result = vec![0i64; DEGREE];
        for i in 0..DEGREE {
            for j in 0..DEGREE {
                let product = i64::from(a[i]) * i64::from(b[j]);
                if i + j < DEGREE {
                    result[i + j] += product;
                } else {
                    result[i + j - DEGREE] -= product;
                }
            }
        }
        result.into_iter().map(Poly::reduce).collect()
    }

    #[test]
    fn test_root_of_unity() {
        let psi = primitive_root_of_unity(2 * DEGREE as u32);
        assert_eq!(pow_mod(psi, DEGREE as u32), Q - 1);
        assert_eq!(pow_mod(psi, 2 * DEGREE as u32), 1);
    }

    #[test]
    fn test_ntt_inverse() {
        let mut rng = rng::get_rng();
        for _ in 0..20 {
            let original = Poly::sample_uniform(&mut rng, Domain::Coefficient);
            let mut poly = original.clone();
            poly.ntt();
            assert_eq!(poly.domain(), Domain::Evaluation);
            poly.inverse_ntt();
            assert_eq!(poly, original);
        }
    }

    #[test]
    fn test_ntt_multiplication() {
        let mut rng = rng::get_rng();
        let a = Poly::sample_uniform(&mut rng, Domain::Coefficient);
        let b = Poly::sample_uniform(&mut rng, Domain::Coefficient);
        let expected = negacyclic_product(a.coefficients(), b.coefficients());

        let mut a_hat = a.clone();
        let mut b_hat = b.clone();
        a_hat.ntt();
        b_hat.ntt();
        let mut product = &a_hat * &b_hat;
        product.inverse_ntt();

        assert_eq!(product.coefficients(), &expected[..]);
    }

    // X^(n-1) * X = X^n = -1.
    #[test]
    fn test_wraparound_sign() {
        let mut x_last = Poly::zero(Domain::Coefficient);
        x_last.set_coefficient(DEGREE - 1, 1);
        let mut x = Poly::zero(Domain::Coefficient);
        x.set_coefficient(1, 1);

        x_last.ntt();
        x.ntt();
        let mut product = &x_last * &x;
        product.inverse_ntt();

        let mut expected = Poly::zero(Domain::Coefficient);
        expected.set_coefficient(0, MODULUS - 1);
        assert_eq!(product, expected);
    }

    #[test]
    fn test_add_sub() {
        let mut rng = rng::get_rng();
        let a = Poly::sample_uniform(&mut rng, Domain::Evaluation);
        let b = Poly::sample_uniform(&mut rng, Domain::Evaluation);
        let sum = &a + &b;
        assert_eq!(&sum - &b, a);
        assert!(sum.coefficients().iter().all(|&c| c < MODULUS));
    }

    #[test]
    #[should_panic(expected = "representations do not match")]
    fn test_mismatched_representations() {
        let a = Poly::zero(Domain::Evaluation);
        let b = Poly::zero(Domain::Coefficient);
        let _ = &a + &b;
    }

    #[test]
    #[should_panic]
    fn test_multiplication_needs_evaluation() {
        let a = Poly::zero(Domain::Coefficient);
        let _ = &a * &a;
    }

    #[test]
    fn test_centered() {
        assert_eq!(Poly::centered(0), 0);
        assert_eq!(Poly::centered(MODULUS / 2), i32::from(MODULUS / 2));
        assert_eq!(Poly::centered(MODULUS / 2 + 1), -i32::from(MODULUS / 2));
        assert_eq!(Poly::centered(MODULUS - 1), -1);
        assert_eq!(Poly::reduce(-1), MODULUS - 1);
    }

    #[test]
    fn test_pack_bits() {
        let mut poly = Poly::zero(Domain::Coefficient);
        poly.set_coefficient(0, 1);
        poly.set_coefficient(9, 1);
        poly.set_coefficient(DEGREE - 1, 1);

        let packed = poly.pack_bits();
        assert_eq!(packed.len(), DEGREE / 8);
        assert_eq!(packed[0], 0b0000_0001);
        assert_eq!(packed[1], 0b0000_0010);
        assert_eq!(packed[DEGREE / 8 - 1], 0b1000_0000);
    }

    #[test]
    fn test_deserialization_rejects_out_of_range() {
        let mut poly = Poly::zero(Domain::Coefficient);
        poly.set_coefficient(3, 7);
        let mut encoded = bincode::serialize(&poly).unwrap();
        assert_eq!(bincode::deserialize::<Poly>(&encoded).unwrap(), poly);

        // The coefficient with index 3 comes after the 8-byte length prefix.
        encoded[8 + 6..8 + 8].copy_from_slice(&MODULUS.to_le_bytes());
        assert!(bincode::deserialize::<Poly>(&encoded).is_err());

        let short = PolyData {
            coeffs: vec![0; DEGREE - 1],
            domain: Domain::Coefficient,
        };
        assert!(Poly::try_from(short).is_err());
    }
}

//! Hadamard Construction - Deterministic ±1 Orthogonal Matrices
//!
//! Sizes `2^k` use the Sylvester construction, whose entries are
//! `(-1)^popcount(i & j)`. Sizes `2^k * (q + 1)` with `q` prime and
//! `q = 3 (mod 4)` use Paley's first construction for the `q + 1` factor,
//! expanded by a Kronecker product with the Sylvester matrix of order `2^k`.
//!
//! Every returned matrix `H` of order `n` satisfies `H * H^T = n * I`.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use rayon::prelude::*;

use compressa_core::{DType, Device};
use compressa_tensor::Tensor;

use crate::error::{TransformError, TransformResult};

// =============================================================================
// Size Factorization
// =============================================================================

/// How a supported order decomposes into construction factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Factorization {
    /// Order of the Sylvester factor, a power of two.
    sylvester: usize,
    /// Paley prime `q`, when a Paley factor of order `q + 1` is present.
    paley_prime: Option<usize>,
}

fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

fn factorize(size: usize) -> Option<Factorization> {
    if size == 0 {
        return None;
    }
    if size.is_power_of_two() {
        return Some(Factorization {
            sylvester: size,
            paley_prime: None,
        });
    }
    let mut sylvester = 1;
    while size % sylvester == 0 {
        let m = size / sylvester;
        let q = m - 1;
        if m >= 4 && is_prime(q) && q % 4 == 3 {
            return Some(Factorization {
                sylvester,
                paley_prime: Some(q),
            });
        }
        sylvester *= 2;
    }
    None
}

/// True if a deterministic Hadamard matrix of this order can be built.
pub fn is_supported_size(size: usize) -> bool {
    factorize(size).is_some()
}

// =============================================================================
// Factors
// =============================================================================

fn sylvester_entry(i: usize, j: usize) -> f64 {
    if (i & j).count_ones() % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

/// Paley construction I of order `q + 1`, row-major.
fn paley_matrix(q: usize) -> Vec<f64> {
    let mut residue = vec![false; q];
    for x in 1..q {
        residue[(x * x) % q] = true;
    }
    let chi = |x: usize| -> f64 {
        if x == 0 {
            0.0
        } else if residue[x] {
            1.0
        } else {
            -1.0
        }
    };

    // H = I + S with S = [[0, 1^T], [-1, Q]] and Q[i][j] = chi(j - i).
    let m = q + 1;
    let mut h = vec![0.0; m * m];
    for c in 1..m {
        h[c] = 1.0;
        h[c * m] = -1.0;
    }
    for i in 0..q {
        for j in 0..q {
            h[(i + 1) * m + (j + 1)] = chi((j + q - i) % q);
        }
    }
    for d in 0..m {
        h[d * m + d] += 1.0;
    }
    h
}

/// Row-major `±1` entries of the deterministic Hadamard matrix of `size`.
pub fn hadamard_values(size: usize) -> TransformResult<Vec<f64>> {
    let factors = factorize(size).ok_or(TransformError::UnsupportedSize(size))?;
    let (m, paley) = match factors.paley_prime {
        Some(q) => (q + 1, Some(paley_matrix(q))),
        None => (1, None),
    };

    let mut values = vec![0.0; size * size];
    values
        .par_chunks_mut(size)
        .enumerate()
        .for_each(|(row, out)| {
            let (a, b) = (row / m, row % m);
            for (col, value) in out.iter_mut().enumerate() {
                let (c, d) = (col / m, col % m);
                let base = paley.as_ref().map_or(1.0, |p| p[b * m + d]);
                *value = sylvester_entry(a, c) * base;
            }
        });
    Ok(values)
}

/// Builds the deterministic Hadamard matrix of `size` as a `dtype` tensor on `device`.
///
/// The result is identical for equal `(size, dtype)` regardless of device.
pub fn deterministic_hadamard_matrix(
    size: usize,
    dtype: DType,
    device: Device,
) -> TransformResult<Tensor> {
    let values = hadamard_values(size)?;
    Ok(Tensor::from_f64_slice(&values, &[size, size], dtype, device)?)
}

/// Multiplies column `j` of a row-major square matrix by `signs[j]`.
pub fn scale_columns(values: &mut [f64], signs: &[f64]) {
    let n = signs.len();
    if n == 0 {
        return;
    }
    values.par_chunks_mut(n).for_each(|row| {
        for (value, sign) in row.iter_mut().zip(signs) {
            *value *= sign;
        }
    });
}

// =============================================================================
// Tests
// =============================================================================

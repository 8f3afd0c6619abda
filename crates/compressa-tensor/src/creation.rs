//! Tensor Creation Functions
//!
//! Random tensor factories driven by an explicit generator, so callers that
//! need reproducibility can seed a `StdRng` and thread it through.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use rand::seq::SliceRandom;
use rand::Rng;

use compressa_core::{DType, Device, Storage};

use crate::tensor::Tensor;

// =============================================================================
// Random Initialization
// =============================================================================

/// Creates a random permutation of `0..n` as an `i64` tensor.
///
/// # Example
/// ```rust
/// use compressa_tensor::randperm;
/// use compressa_core::Device;
/// use rand::SeedableRng;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(0);
/// let perm = randperm(8, &mut rng, Device::Cpu);
/// let mut sorted = perm.to_index_vec().unwrap();
/// sorted.sort_unstable();
/// assert_eq!(sorted, (0..8).collect::<Vec<_>>());
/// ```
pub fn randperm<R: Rng + ?Sized>(n: usize, rng: &mut R, device: Device) -> Tensor {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    let values: Vec<f64> = indices.into_iter().map(|i| i as f64).collect();
    Tensor::from_parts(Storage::from_f64_slice(&values, DType::I64, device), &[n])
}

/// Creates a tensor with values drawn uniformly from `[low, high)`.
pub fn uniform<R: Rng + ?Sized>(
    shape: &[usize],
    low: f64,
    high: f64,
    dtype: DType,
    device: Device,
    rng: &mut R,
) -> Tensor {
    let numel: usize = shape.iter().product();
    let values: Vec<f64> = (0..numel).map(|_| rng.gen_range(low..high)).collect();
    Tensor::from_parts(Storage::from_f64_slice(&values, dtype, device), shape)
}

/// Creates a vector of `n` random signs, each `1.0` or `-1.0`.
pub fn random_signs<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<f64> {
    (0..n)
        .map(|_| if rng.gen_bool(0.5) { 1.0 } else { -1.0 })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_randperm_is_permutation() {
        let mut rng = StdRng::seed_from_u64(42);
        let perm = randperm(64, &mut rng, Device::Cpu);
        assert_eq!(perm.dtype(), DType::I64);
        let mut values = perm.to_index_vec().unwrap();
        values.sort_unstable();
        assert_eq!(values, (0..64).collect::<Vec<_>>());
    }

    #[test]
    fn test_randperm_seeded_reproducible() {
        let a = randperm(32, &mut StdRng::seed_from_u64(7), Device::Cpu);
        let b = randperm(32, &mut StdRng::seed_from_u64(7), Device::Cpu);
        assert_eq!(a.to_index_vec().unwrap(), b.to_index_vec().unwrap());
    }

    #[test]
    fn test_uniform_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let t = uniform(&[4, 4], -0.5, 0.5, DType::F32, Device::Cpu, &mut rng);
        assert!(t.to_f64_vec().iter().all(|&v| (-0.5..0.5).contains(&v)));
    }

    #[test]
    fn test_random_signs() {
        let mut rng = StdRng::seed_from_u64(3);
        let signs = random_signs(100, &mut rng);
        assert!(signs.iter().all(|&s| s == 1.0 || s == -1.0));
        assert!(signs.iter().any(|&s| s < 0.0));
    }
}

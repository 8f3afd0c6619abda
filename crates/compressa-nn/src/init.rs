//! Weight Initialization - Parameter Initialization Strategies
//!
//! Random initializers for freshly constructed layers. Layers built from
//! existing checkpoints bypass these entirely.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use compressa_core::{DType, Device};
use compressa_tensor::{uniform, Tensor};

// =============================================================================
// Basic Initializers
// =============================================================================

/// Creates an f32 tensor filled with zeros.
pub fn zeros(shape: &[usize]) -> Tensor {
    Tensor::zeros(shape, DType::F32, Device::Cpu)
}

/// Creates an f32 tensor filled with ones.
pub fn ones(shape: &[usize]) -> Tensor {
    Tensor::full(shape, 1.0, DType::F32, Device::Cpu)
}

/// Creates an f32 tensor with uniform random values in `[low, high)`.
pub fn uniform_range(shape: &[usize], low: f64, high: f64) -> Tensor {
    let mut rng = rand::thread_rng();
    uniform(shape, low, high, DType::F32, Device::Cpu, &mut rng)
}

// =============================================================================
// Kaiming/He Initialization
// =============================================================================

/// Kaiming uniform initialization of a `(fan_out, fan_in)` matrix.
///
/// Samples from U(-bound, bound) where bound = sqrt(6 / fan_in).
pub fn kaiming_uniform(fan_out: usize, fan_in: usize) -> Tensor {
    let bound = (6.0 / fan_in.max(1) as f64).sqrt();
    uniform_range(&[fan_out, fan_in], -bound, bound)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kaiming_uniform_bounds() {
        let t = kaiming_uniform(16, 24);
        assert_eq!(t.shape(), &[16, 24]);
        let bound = (6.0f64 / 24.0).sqrt();
        assert!(t.to_f64_vec().iter().all(|v| v.abs() <= bound));
    }

    #[test]
    fn test_constant_initializers() {
        assert!(zeros(&[3]).to_f64_vec().iter().all(|&v| v == 0.0));
        assert!(ones(&[2, 2]).to_f64_vec().iter().all(|&v| v == 1.0));
    }
}

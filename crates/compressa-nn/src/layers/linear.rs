//! Linear Layer - Fully Connected Layer
//!
//! Applies a linear transformation: y = xW^T + b
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use compressa_core::{Error, Result};
use compressa_tensor::Tensor;

use crate::init::{kaiming_uniform, zeros};
use crate::module::{Module, ModuleCapabilities, ModuleKind};
use crate::parameter::Parameter;
use crate::placement::Placement;
use crate::state::ModuleState;

// =============================================================================
// Linear
// =============================================================================

/// Applies a linear transformation to the input.
///
/// y = xW^T + b
///
/// # Shape
/// - Input: (*, in_features) where * means any number of dimensions
/// - Output: (*, out_features)
pub struct Linear {
    state: ModuleState,
    /// Input features.
    in_features: usize,
    /// Output features.
    out_features: usize,
}

impl Linear {
    /// Creates a new Linear layer with bias.
    pub fn new(in_features: usize, out_features: usize) -> Self {
        Self::with_bias(in_features, out_features, true)
    }

    /// Creates a new Linear layer with optional bias.
    pub fn with_bias(in_features: usize, out_features: usize, bias: bool) -> Self {
        let mut state = ModuleState::default();
        state.parameters.insert(
            "weight",
            Parameter::named("weight", kaiming_uniform(out_features, in_features), true),
        );
        if bias {
            state
                .parameters
                .insert("bias", Parameter::named("bias", zeros(&[out_features]), true));
        }

        Self {
            state,
            in_features,
            out_features,
        }
    }

    /// Creates a Linear layer from an existing `(out, in)` weight and optional bias.
    pub fn from_weights(weight: Tensor, bias: Option<Tensor>) -> Result<Self> {
        let (out_features, in_features) = match weight.shape() {
            [out, inp] => (*out, *inp),
            other => {
                return Err(Error::invalid_operation(format!(
                    "Linear weight must be 2D, got shape {other:?}"
                )))
            }
        };
        if let Some(b) = &bias {
            if b.shape() != [out_features] {
                return Err(Error::shape_mismatch(&[out_features], b.shape()));
            }
        }

        let mut state = ModuleState::default();
        state
            .parameters
            .insert("weight", Parameter::named("weight", weight, true));
        if let Some(b) = bias {
            state.parameters.insert("bias", Parameter::named("bias", b, true));
        }

        Ok(Self {
            state,
            in_features,
            out_features,
        })
    }

    /// Sets the layer placement, moving parameters to the offload device.
    #[must_use]
    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.state.set_placement(placement);
        self
    }

    /// Returns the input feature dimension.
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    /// Returns the output feature dimension.
    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// Returns the bias parameter, if any.
    pub fn bias(&self) -> Option<Parameter> {
        self.get_parameter("bias")
    }
}

impl Module for Linear {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let input_shape = input.shape().to_vec();
        match input_shape.last() {
            Some(&last) if last == self.in_features => {}
            _ => return Err(Error::shape_mismatch(&[self.in_features], &input_shape)),
        }
        let batch: usize = input_shape[..input_shape.len() - 1].iter().product();
        let input_2d = input.reshape(&[batch as isize, self.in_features as isize])?;

        let weight = self
            .get_parameter("weight")
            .ok_or_else(|| Error::internal("Linear layer lost its weight"))?
            .data()
            .to_device(input.device())
            .to_dtype(input.dtype());
        let output = input_2d.matmul(&weight.t()?)?;

        let output = match self.bias() {
            Some(bias) => {
                let bias = bias.data().to_f64_vec();
                let mut values = output.to_f64_vec();
                for row in values.chunks_mut(self.out_features.max(1)) {
                    for (v, b) in row.iter_mut().zip(&bias) {
                        *v += b;
                    }
                }
                Tensor::from_f64_slice(&values, output.shape(), output.dtype(), output.device())?
            }
            None => output,
        };

        let mut output_shape: Vec<isize> = input_shape[..input_shape.len() - 1]
            .iter()
            .map(|&d| d as isize)
            .collect();
        output_shape.push(self.out_features as isize);
        output.reshape(&output_shape)
    }

    fn name(&self) -> &'static str {
        "Linear"
    }

    fn capabilities(&self) -> ModuleCapabilities {
        ModuleCapabilities::weighted(ModuleKind::Linear, true)
    }

    fn state(&self) -> &ModuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModuleState {
        &mut self.state
    }
}

impl std::fmt::Debug for Linear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Linear")
            .field("in_features", &self.in_features)
            .field("out_features", &self.out_features)
            .field("bias", &self.state.parameters.contains("bias"))
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use compressa_core::{DType, Device};

    #[test]
    fn test_linear_creation() {
        let linear = Linear::new(10, 5);
        assert_eq!(linear.in_features(), 10);
        assert_eq!(linear.out_features(), 5);
        assert!(linear.bias().is_some());
        assert_eq!(linear.weight_shape(), Some((5, 10)));
    }

    #[test]
    fn test_linear_no_bias() {
        let linear = Linear::with_bias(10, 5, false);
        assert!(linear.bias().is_none());
        assert_eq!(linear.parameters().len(), 1);
    }

    #[test]
    fn test_linear_forward_values() {
        let weight = Tensor::from_vec(vec![1.0f32, 0.0, 0.0, 2.0, 1.0, 1.0], &[2, 3]).unwrap();
        let bias = Tensor::from_vec(vec![0.5f32, -1.0], &[2]).unwrap();
        let linear = Linear::from_weights(weight, Some(bias)).unwrap();

        let input = Tensor::from_vec(vec![1.0f32, 2.0, 3.0], &[1, 3]).unwrap();
        let output = linear.forward(&input).unwrap();
        assert_eq!(output.shape(), &[1, 2]);
        assert_eq!(output.to_f64_vec(), vec![1.5, 6.0]);
    }

    #[test]
    fn test_linear_batched_forward_shape() {
        let linear = Linear::new(4, 2);
        let input = Tensor::full(&[2, 3, 4], 1.0, DType::F32, Device::Cpu);
        let output = linear.forward(&input).unwrap();
        assert_eq!(output.shape(), &[2, 3, 2]);
    }

    #[test]
    fn test_linear_rejects_bad_input() {
        let linear = Linear::new(4, 2);
        let input = Tensor::full(&[1, 3], 1.0, DType::F32, Device::Cpu);
        assert!(linear.forward(&input).is_err());
        assert!(Linear::from_weights(Tensor::zeros(&[4], DType::F32, Device::Cpu), None).is_err());
    }

    #[test]
    fn test_linear_num_parameters() {
        let linear = Linear::new(10, 5);
        assert_eq!(linear.num_parameters(), 55);
    }
}

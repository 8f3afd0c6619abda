//! Normalization Layers - Layer Normalization
//!
//! Carries the affine weight and bias that quantization setup inspects.
//! The weight is one-dimensional, so it never exposes a matrix shape.
//! Normalization itself runs in the runtime that consumes the prepared
//! layer; `forward` only checks the trailing dimension.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use compressa_core::{Error, Result};
use compressa_tensor::Tensor;

use crate::init::{ones, zeros};
use crate::module::{Module, ModuleCapabilities, ModuleKind};
use crate::parameter::Parameter;
use crate::placement::Placement;
use crate::state::ModuleState;

// =============================================================================
// LayerNorm
// =============================================================================

/// Layer Normalization parameters over the trailing dimension.
pub struct LayerNorm {
    state: ModuleState,
    /// Size of the normalized (last) dimension.
    normalized_size: usize,
    /// Epsilon for numerical stability.
    eps: f64,
}

impl LayerNorm {
    /// Creates a new LayerNorm layer.
    pub fn new(normalized_size: usize) -> Self {
        Self::with_eps(normalized_size, 1e-5)
    }

    /// Creates a LayerNorm with custom epsilon.
    pub fn with_eps(normalized_size: usize, eps: f64) -> Self {
        let mut state = ModuleState::default();
        state.parameters.insert(
            "weight",
            Parameter::named("weight", ones(&[normalized_size]), true),
        );
        state.parameters.insert(
            "bias",
            Parameter::named("bias", zeros(&[normalized_size]), true),
        );
        Self {
            state,
            normalized_size,
            eps,
        }
    }

    /// Returns the epsilon used by the normalization.
    pub fn eps(&self) -> f64 {
        self.eps
    }

    /// Sets the layer placement, moving parameters to the offload device.
    #[must_use]
    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.state.set_placement(placement);
        self
    }
}

impl Module for LayerNorm {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        if input.shape().last() != Some(&self.normalized_size) {
            return Err(Error::shape_mismatch(&[self.normalized_size], input.shape()));
        }
        Ok(input.clone())
    }

    fn name(&self) -> &'static str {
        "LayerNorm"
    }

    fn capabilities(&self) -> ModuleCapabilities {
        ModuleCapabilities::weighted(ModuleKind::Norm, false)
    }

    fn state(&self) -> &ModuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModuleState {
        &mut self.state
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Dropout Layer - Parameter-Free Pass-Through
//!
//! Models are prepared for compressed inference, so dropout always runs in
//! evaluation mode and returns its input unchanged. Quantization treats it
//! as a layer with nothing to quantize.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use compressa_core::{Error, Result};
use compressa_tensor::Tensor;

use crate::module::{Module, ModuleCapabilities, ModuleKind};
use crate::state::ModuleState;

// =============================================================================
// Dropout
// =============================================================================

/// Dropout in evaluation mode. Holds no parameters.
pub struct Dropout {
    state: ModuleState,
    /// Dropout probability recorded for the training configuration.
    p: f64,
}

impl Dropout {
    /// Creates a new Dropout layer with the given probability.
    pub fn new(p: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&p) {
            return Err(Error::invalid_operation(format!(
                "Dropout probability must be in [0, 1), got {p}"
            )));
        }
        Ok(Self {
            state: ModuleState::default(),
            p,
        })
    }

    /// Returns the dropout probability.
    pub fn p(&self) -> f64 {
        self.p
    }
}

impl Module for Dropout {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        Ok(input.clone())
    }

    fn name(&self) -> &'static str {
        "Dropout"
    }

    fn capabilities(&self) -> ModuleCapabilities {
        ModuleCapabilities::plain(ModuleKind::Other)
    }

    fn state(&self) -> &ModuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModuleState {
        &mut self.state
    }
}

impl std::fmt::Debug for Dropout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dropout").field("p", &self.p).finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

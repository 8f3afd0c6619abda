//! Embedding Layer - Lookup Table for Indices
//!
//! Maps discrete indices to dense vectors.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use compressa_core::{Error, Result};
use compressa_tensor::Tensor;

use crate::init::uniform_range;
use crate::module::{Module, ModuleCapabilities, ModuleKind};
use crate::parameter::Parameter;
use crate::placement::Placement;
use crate::state::ModuleState;

// =============================================================================
// Embedding
// =============================================================================

/// A lookup table that stores embeddings of a fixed dictionary.
///
/// # Shape
/// - Input: (*) - integer tensor of arbitrary shape containing indices
/// - Output: (*, H) - where H = embedding_dim
pub struct Embedding {
    state: ModuleState,
    /// Number of embeddings in the dictionary.
    num_embeddings: usize,
    /// Dimension of each embedding vector.
    embedding_dim: usize,
}

impl Embedding {
    /// Creates a new Embedding layer with weights drawn from U(-1, 1).
    pub fn new(num_embeddings: usize, embedding_dim: usize) -> Self {
        let weight = uniform_range(&[num_embeddings, embedding_dim], -1.0, 1.0);
        Self::build(weight, true, num_embeddings, embedding_dim)
    }

    /// Creates an Embedding from pretrained `(num_embeddings, embedding_dim)` weights.
    pub fn from_pretrained(weights: Tensor, freeze: bool) -> Result<Self> {
        match weights.shape() {
            [num, dim] => {
                let (num, dim) = (*num, *dim);
                Ok(Self::build(weights, !freeze, num, dim))
            }
            other => Err(Error::invalid_operation(format!(
                "Embedding weight must be 2D, got shape {other:?}"
            ))),
        }
    }

    fn build(weight: Tensor, trainable: bool, num_embeddings: usize, embedding_dim: usize) -> Self {
        let mut state = ModuleState::default();
        state
            .parameters
            .insert("weight", Parameter::named("weight", weight, trainable));
        Self {
            state,
            num_embeddings,
            embedding_dim,
        }
    }

    /// Sets the layer placement, moving parameters to the offload device.
    #[must_use]
    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.state.set_placement(placement);
        self
    }

    /// Returns the number of embeddings.
    pub fn num_embeddings(&self) -> usize {
        self.num_embeddings
    }

    /// Returns the embedding dimension.
    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }
}

impl Module for Embedding {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let weight = self
            .get_parameter("weight")
            .ok_or_else(|| Error::internal("Embedding layer lost its weight"))?
            .data();
        let flat = input.reshape(&[-1])?;
        let rows = weight.index_select(0, &flat)?;

        let mut output_shape: Vec<isize> = input.shape().iter().map(|&d| d as isize).collect();
        output_shape.push(self.embedding_dim as isize);
        rows.reshape(&output_shape)
    }

    fn name(&self) -> &'static str {
        "Embedding"
    }

    fn capabilities(&self) -> ModuleCapabilities {
        ModuleCapabilities::weighted(ModuleKind::Embedding, false)
    }

    fn state(&self) -> &ModuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModuleState {
        &mut self.state
    }
}

impl std::fmt::Debug for Embedding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedding")
            .field("num_embeddings", &self.num_embeddings)
            .field("embedding_dim", &self.embedding_dim)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Attention - Self-Attention Projections
//!
//! Self-attention built from `Linear` projections, either separate
//! query/key/value projections or a single fused qkv projection. The
//! projection layout is advertised through the layer's capabilities so
//! key/value cache quantization can find it.
//!
//! The score computation belongs to the runtime that consumes the prepared
//! layer. `forward` runs the value and output projections only, which is
//! the path a key/value cache scale observes.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use compressa_core::{Error, Result};
use compressa_tensor::Tensor;

use crate::layers::Linear;
use crate::module::{AttentionCapability, Module, ModuleCapabilities, ModuleKind};
use crate::placement::Placement;
use crate::state::ModuleState;

// =============================================================================
// Projections
// =============================================================================

enum Projections {
    Separate { q: Linear, k: Linear, v: Linear },
    Fused { qkv: Linear },
}

// =============================================================================
// SelfAttention
// =============================================================================

/// Multi-head self-attention projections.
///
/// # Shape
/// - Input: (L, E) or (N, L, E)
/// - Output: same as input
pub struct SelfAttention {
    state: ModuleState,
    projections: Projections,
    o_proj: Linear,
    embed_dim: usize,
    num_heads: usize,
}

impl SelfAttention {
    /// Creates attention with separate q/k/v projections.
    pub fn new(embed_dim: usize, num_heads: usize) -> Result<Self> {
        Self::check_heads(embed_dim, num_heads)?;
        Ok(Self {
            state: ModuleState::default(),
            projections: Projections::Separate {
                q: Linear::new(embed_dim, embed_dim),
                k: Linear::new(embed_dim, embed_dim),
                v: Linear::new(embed_dim, embed_dim),
            },
            o_proj: Linear::new(embed_dim, embed_dim),
            embed_dim,
            num_heads,
        })
    }

    /// Creates attention with a single fused qkv projection.
    pub fn fused(embed_dim: usize, num_heads: usize) -> Result<Self> {
        Self::check_heads(embed_dim, num_heads)?;
        Ok(Self {
            state: ModuleState::default(),
            projections: Projections::Fused {
                qkv: Linear::new(embed_dim, 3 * embed_dim),
            },
            o_proj: Linear::new(embed_dim, embed_dim),
            embed_dim,
            num_heads,
        })
    }

    fn check_heads(embed_dim: usize, num_heads: usize) -> Result<()> {
        if num_heads == 0 || embed_dim % num_heads != 0 {
            return Err(Error::invalid_operation(format!(
                "embed_dim {embed_dim} must be divisible by num_heads {num_heads}"
            )));
        }
        Ok(())
    }

    /// Sets the placement of this layer and all projections.
    #[must_use]
    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.state.set_placement(placement);
        self.projections = match self.projections {
            Projections::Separate { q, k, v } => Projections::Separate {
                q: q.with_placement(placement),
                k: k.with_placement(placement),
                v: v.with_placement(placement),
            },
            Projections::Fused { qkv } => Projections::Fused {
                qkv: qkv.with_placement(placement),
            },
        };
        self.o_proj = self.o_proj.with_placement(placement);
        self
    }

    /// Returns the embedding dimension.
    pub fn embed_dim(&self) -> usize {
        self.embed_dim
    }

    /// Returns the number of heads.
    pub fn num_heads(&self) -> usize {
        self.num_heads
    }

    fn value_projection(&self, input: &Tensor) -> Result<Tensor> {
        match &self.projections {
            Projections::Separate { v, .. } => v.forward(input),
            Projections::Fused { qkv } => {
                let e = self.embed_dim;
                let columns: Vec<i64> = (2 * e..3 * e).map(|c| c as i64).collect();
                let index = Tensor::from_vec(columns, &[e])?;
                qkv.forward(input)?.index_select(-1, &index)
            }
        }
    }
}

impl Module for SelfAttention {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        if input.shape().last() != Some(&self.embed_dim) || !matches!(input.ndim(), 2 | 3) {
            return Err(Error::shape_mismatch(&[0, 0, self.embed_dim], input.shape()));
        }
        self.o_proj.forward(&self.value_projection(input)?)
    }

    fn name(&self) -> &'static str {
        "SelfAttention"
    }

    fn capabilities(&self) -> ModuleCapabilities {
        let fused = matches!(self.projections, Projections::Fused { .. });
        let mut caps = ModuleCapabilities::plain(ModuleKind::Attention);
        caps.attention = AttentionCapability {
            attention_like: true,
            has_k_proj: !fused,
            has_v_proj: !fused,
            has_qkv_proj: fused,
        };
        caps
    }

    fn state(&self) -> &ModuleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModuleState {
        &mut self.state
    }

    fn children(&self) -> Vec<(&'static str, &dyn Module)> {
        let mut children: Vec<(&'static str, &dyn Module)> = match &self.projections {
            Projections::Separate { q, k, v } => {
                vec![
                    ("q_proj", q as &dyn Module),
                    ("k_proj", k as &dyn Module),
                    ("v_proj", v as &dyn Module),
                ]
            }
            Projections::Fused { qkv } => vec![("qkv_proj", qkv as &dyn Module)],
        };
        children.push(("o_proj", &self.o_proj as &dyn Module));
        children
    }
}

impl std::fmt::Debug for SelfAttention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelfAttention")
            .field("embed_dim", &self.embed_dim)
            .field("num_heads", &self.num_heads)
            .field(
                "fused_qkv",
                &matches!(self.projections, Projections::Fused { .. }),
            )
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

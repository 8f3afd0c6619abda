//! Transforms - Per-Layer Handles onto Shared Matrices
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use compressa_nn::{ModuleKind, Parameter};
use compressa_tensor::Tensor;

use crate::apply::apply_transform_weight;
use crate::args::TransformArgs;
use crate::error::TransformResult;

/// A transform bound to one layer and one location.
pub trait Transform: Send + Sync {
    /// Application arguments.
    fn args(&self) -> &TransformArgs;

    /// Applies the transform to `value`, leaving shared state untouched.
    fn forward(&self, value: &Tensor) -> TransformResult<Tensor>;
}

/// Normalized Hadamard rotation of one layer.
///
/// Holds shared handles to the cached matrix and, when randomized, the
/// cached permutation of that matrix.
#[derive(Debug, Clone)]
pub struct HadamardTransform {
    weight: Parameter,
    perm: Option<Parameter>,
    args: TransformArgs,
    module_kind: ModuleKind,
    scale: f64,
}

impl HadamardTransform {
    /// Creates a transform over a square `weight` for a layer of `module_kind`.
    pub fn new(
        weight: Parameter,
        perm: Option<Parameter>,
        args: TransformArgs,
        module_kind: ModuleKind,
    ) -> Self {
        let size = weight.shape().first().copied().unwrap_or(0);
        Self {
            weight,
            perm,
            args,
            module_kind,
            scale: (size as f64).sqrt(),
        }
    }

    /// Shared matrix handle.
    pub fn weight(&self) -> &Parameter {
        &self.weight
    }

    /// Shared permutation handle.
    pub fn perm(&self) -> Option<&Parameter> {
        self.perm.as_ref()
    }

    /// Layer type the transform was created for.
    pub fn module_kind(&self) -> ModuleKind {
        self.module_kind
    }

    /// Normalization divisor, `sqrt(n)`.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Matrix actually applied: permuted symmetrically, then transposed if inverse.
    pub fn effective_matrix(&self) -> TransformResult<Tensor> {
        let mut matrix = self.weight.data();
        if let Some(perm) = &self.perm {
            let index = perm.data();
            matrix = matrix.index_select(0, &index)?.index_select(1, &index)?;
        }
        if self.args.is_inverse() {
            matrix = matrix.t()?;
        }
        Ok(matrix)
    }
}

impl Transform for HadamardTransform {
    fn args(&self) -> &TransformArgs {
        &self.args
    }

    fn forward(&self, value: &Tensor) -> TransformResult<Tensor> {
        let matrix = self.effective_matrix()?;
        let out = apply_transform_weight(&matrix, value, self.args.location(), self.module_kind)?;
        Ok(out.div_scalar(self.scale))
    }
}

// =============================================================================
// Tests
// =============================================================================

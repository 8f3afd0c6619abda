//! Transform Application - Per-Layer Axis and Orientation Rules
//!
//! Which axis a transform acts on depends on both the location and the
//! layer type. For a linear layer the weight is `(out, in)`, so an input
//! side rotation multiplies the weight from the right and an output side
//! rotation from the left. An embedding weight is `(num, dim)` and the
//! roles are swapped.
//!
//! A matrix smaller than the transformed axis is applied per head, i.e. as
//! a block-diagonal matrix repeated along the axis.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use compressa_nn::{Module, ModuleKind};
use compressa_tensor::Tensor;

use crate::args::TransformLocation;
use crate::error::{TransformError, TransformResult};

fn kind_name(kind: ModuleKind) -> &'static str {
    match kind {
        ModuleKind::Linear => "Linear",
        ModuleKind::Embedding => "Embedding",
        ModuleKind::Attention => "Attention",
        ModuleKind::Norm => "Norm",
        ModuleKind::Other => "Other",
    }
}

fn unsupported(kind: ModuleKind, location: TransformLocation) -> TransformError {
    TransformError::UnsupportedModule {
        module: kind_name(kind),
        location: location.to_string(),
    }
}

// =============================================================================
// Transform Size
// =============================================================================

/// Returns the order of the matrix needed to transform `module` at `location`.
///
/// Linear layers use `in_features` on the input side and `out_features`
/// otherwise; embeddings use `num_embeddings` and `embedding_dim`. With a
/// `head_dim` the order is `head_dim`, which must divide the full size.
pub fn transform_size(
    module: &dyn Module,
    location: TransformLocation,
    head_dim: Option<usize>,
) -> TransformResult<usize> {
    let kind = module.capabilities().kind;
    let weight = module
        .weight()
        .ok_or(TransformError::MissingWeight(module.name()))?;
    let (rows, cols) = match weight.shape().as_slice() {
        [rows, cols] => (*rows, *cols),
        _ => return Err(unsupported(kind, location)),
    };

    let size = match kind {
        ModuleKind::Linear if location.is_input_side() => cols,
        ModuleKind::Linear => rows,
        ModuleKind::Embedding if location.is_input_side() => rows,
        ModuleKind::Embedding => cols,
        _ => return Err(unsupported(kind, location)),
    };

    match head_dim {
        Some(head_dim) if head_dim == 0 || size % head_dim != 0 => {
            Err(TransformError::InvalidHeadDim { head_dim, size })
        }
        Some(head_dim) => Ok(head_dim),
        None => Ok(size),
    }
}

// =============================================================================
// Multi-Head Products
// =============================================================================

/// Expands a square `matrix` to block-diagonal form covering `axis` elements.
fn expand_to_axis(matrix: &Tensor, axis: usize) -> TransformResult<Tensor> {
    let n = matrix.shape()[0];
    if n == axis {
        return Ok(matrix.clone());
    }
    if n == 0 || axis % n != 0 {
        return Err(TransformError::InvalidHeadDim {
            head_dim: n,
            size: axis,
        });
    }
    Ok(matrix.block_diag(axis / n)?)
}

/// `value @ matrix` over the last axis of `value`, any leading dimensions.
fn matmul_last_axis(value: &Tensor, matrix: &Tensor) -> TransformResult<Tensor> {
    let shape = value.shape().to_vec();
    let Some(&last) = shape.last() else {
        return Err(TransformError::InvalidConfig(
            "cannot transform a scalar value".to_string(),
        ));
    };
    let matrix = expand_to_axis(matrix, last)?;
    let flat = value.reshape(&[-1, last as isize])?;
    let out = flat.matmul(&matrix)?;
    let dims: Vec<isize> = shape.iter().map(|&d| d as isize).collect();
    Ok(out.reshape(&dims)?)
}

/// `matrix @ value` over the first axis of a 2D `value`.
fn matmul_first_axis(matrix: &Tensor, value: &Tensor) -> TransformResult<Tensor> {
    let rows = match value.shape() {
        [rows, _] => *rows,
        other => {
            return Err(TransformError::InvalidConfig(format!(
                "weight transforms need a 2D value, got shape {other:?}"
            )))
        }
    };
    let matrix = expand_to_axis(matrix, rows)?;
    Ok(matrix.matmul(value)?)
}

// =============================================================================
// Application
// =============================================================================

/// Applies a square transform `weight` to `value` following the rules for
/// `location` on a layer of `kind`.
///
/// | location | layer | result |
/// |---|---|---|
/// | online (input, output, k_cache, q_attn) | any | `value @ W` |
/// | weight_input | Linear | `value @ W^T` |
/// | weight_output | Linear | `W^T @ value` |
/// | weight_input | Embedding | `W @ value` |
/// | weight_output | Embedding | `value @ W` |
///
/// The transform is cast to the dtype and device of `value` first.
pub fn apply_transform_weight(
    weight: &Tensor,
    value: &Tensor,
    location: TransformLocation,
    kind: ModuleKind,
) -> TransformResult<Tensor> {
    match weight.shape() {
        [rows, cols] if rows == cols => {}
        other => {
            return Err(TransformError::InvalidConfig(format!(
                "transform weight must be square, got shape {other:?}"
            )))
        }
    }
    let weight = weight.to_dtype(value.dtype()).to_device(value.device());

    if location.is_online() {
        return matmul_last_axis(value, &weight);
    }
    match (kind, location) {
        (ModuleKind::Linear, TransformLocation::WeightInput) => {
            matmul_last_axis(value, &weight.t()?)
        }
        (ModuleKind::Linear, TransformLocation::WeightOutput) => {
            matmul_first_axis(&weight.t()?, value)
        }
        (ModuleKind::Embedding, TransformLocation::WeightInput) => {
            matmul_first_axis(&weight, value)
        }
        (ModuleKind::Embedding, TransformLocation::WeightOutput) => {
            matmul_last_axis(value, &weight)
        }
        _ => Err(unsupported(kind, location)),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use compressa_core::{DType, Device};
    use compressa_nn::{Dropout, Embedding, LayerNorm, Linear};

    fn tensor(values: &[f64], shape: &[usize]) -> Tensor {
        Tensor::from_f64_slice(values, shape, DType::F64, Device::Cpu).unwrap()
    }

    // Non-symmetric so that transposes are observable.
    fn w2() -> Tensor {
        tensor(&[1.0, 2.0, 3.0, 4.0], &[2, 2])
    }

    #[test]
    fn test_transform_size_linear() {
        let linear = Linear::new(64, 32);
        assert_eq!(transform_size(&linear, TransformLocation::Input, None).unwrap(), 64);
        assert_eq!(transform_size(&linear, TransformLocation::WeightInput, None).unwrap(), 64);
        assert_eq!(transform_size(&linear, TransformLocation::WeightOutput, None).unwrap(), 32);
        assert_eq!(transform_size(&linear, TransformLocation::Output, None).unwrap(), 32);
        assert_eq!(transform_size(&linear, TransformLocation::QAttn, None).unwrap(), 32);
    }

    #[test]
    fn test_transform_size_embedding() {
        let embedding = Embedding::new(100, 16);
        assert_eq!(transform_size(&embedding, TransformLocation::WeightInput, None).unwrap(), 100);
        assert_eq!(transform_size(&embedding, TransformLocation::WeightOutput, None).unwrap(), 16);
    }

    #[test]
    fn test_transform_size_head_dim() {
        let linear = Linear::new(64, 32);
        assert_eq!(transform_size(&linear, TransformLocation::Input, Some(16)).unwrap(), 16);
        assert!(matches!(
            transform_size(&linear, TransformLocation::Input, Some(24)),
            Err(TransformError::InvalidHeadDim { head_dim: 24, size: 64 })
        ));
    }

    #[test]
    fn test_transform_size_unsupported_modules() {
        let dropout = Dropout::new(0.1).unwrap();
        assert!(matches!(
            transform_size(&dropout, TransformLocation::Input, None),
            Err(TransformError::MissingWeight("Dropout"))
        ));
        let norm = LayerNorm::new(8);
        assert!(transform_size(&norm, TransformLocation::Input, None).is_err());
    }

    #[test]
    fn test_online_is_value_times_weight() {
        let value = tensor(&[1.0, 1.0, 2.0, 0.0, 0.0, 1.0], &[3, 2]);
        let out =
            apply_transform_weight(&w2(), &value, TransformLocation::Input, ModuleKind::Linear)
                .unwrap();
        assert_eq!(out.shape(), &[3, 2]);
        assert_eq!(out.to_f64_vec(), vec![4.0, 6.0, 2.0, 4.0, 3.0, 4.0]);
    }

    #[test]
    fn test_online_keeps_leading_dims() {
        let value = tensor(&[1.0; 12], &[2, 3, 2]);
        let out =
            apply_transform_weight(&w2(), &value, TransformLocation::Output, ModuleKind::Other)
                .unwrap();
        assert_eq!(out.shape(), &[2, 3, 2]);
        assert_eq!(&out.to_f64_vec()[..2], &[4.0, 6.0]);
    }

    #[test]
    fn test_linear_weight_orientations() {
        let value = tensor(&[1.0, 0.0, 0.0, 1.0], &[2, 2]);
        // value @ W^T with value = I is W^T.
        let input = apply_transform_weight(
            &w2(),
            &value,
            TransformLocation::WeightInput,
            ModuleKind::Linear,
        )
        .unwrap();
        assert_eq!(input.to_f64_vec(), vec![1.0, 3.0, 2.0, 4.0]);

        let value = tensor(&[1.0, 1.0, 0.0, 0.0], &[2, 2]);
        // W^T @ value
        let output = apply_transform_weight(
            &w2(),
            &value,
            TransformLocation::WeightOutput,
            ModuleKind::Linear,
        )
        .unwrap();
        assert_eq!(output.to_f64_vec(), vec![1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_embedding_weight_orientations() {
        let value = tensor(&[1.0, 1.0, 0.0, 0.0], &[2, 2]);
        // W @ value
        let input = apply_transform_weight(
            &w2(),
            &value,
            TransformLocation::WeightInput,
            ModuleKind::Embedding,
        )
        .unwrap();
        assert_eq!(input.to_f64_vec(), vec![1.0, 1.0, 3.0, 3.0]);

        // value @ W
        let output = apply_transform_weight(
            &w2(),
            &value,
            TransformLocation::WeightOutput,
            ModuleKind::Embedding,
        )
        .unwrap();
        assert_eq!(output.to_f64_vec(), vec![4.0, 6.0, 0.0, 0.0]);
    }

    #[test]
    fn test_per_head_application() {
        let value = tensor(&[1.0, 1.0, 1.0, 0.0], &[1, 4]);
        let out =
            apply_transform_weight(&w2(), &value, TransformLocation::Input, ModuleKind::Linear)
                .unwrap();
        assert_eq!(out.to_f64_vec(), vec![4.0, 6.0, 1.0, 2.0]);

        let ragged = tensor(&[1.0, 1.0, 1.0], &[1, 3]);
        assert!(
            apply_transform_weight(&w2(), &ragged, TransformLocation::Input, ModuleKind::Linear)
                .is_err()
        );
    }

    #[test]
    fn test_cast_to_value_dtype_and_device() {
        let value = Tensor::from_f64_slice(&[1.0, 0.0], &[1, 2], DType::F16, Device::Cuda(0))
            .unwrap();
        let out =
            apply_transform_weight(&w2(), &value, TransformLocation::Input, ModuleKind::Linear)
                .unwrap();
        assert_eq!(out.dtype(), DType::F16);
        assert_eq!(out.device(), Device::Cuda(0));
        assert_eq!(out.to_f64_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_unsupported_weight_location() {
        let value = tensor(&[1.0, 0.0, 0.0, 1.0], &[2, 2]);
        assert!(matches!(
            apply_transform_weight(
                &w2(),
                &value,
                TransformLocation::WeightInput,
                ModuleKind::Norm
            ),
            Err(TransformError::UnsupportedModule { module: "Norm", .. })
        ));
        let non_square = tensor(&[1.0, 2.0], &[1, 2]);
        assert!(apply_transform_weight(
            &non_square,
            &value,
            TransformLocation::Input,
            ModuleKind::Linear
        )
        .is_err());
    }
}

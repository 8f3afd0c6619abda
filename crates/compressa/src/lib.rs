//! # Compressa - Quantization Setup and Hadamard Rotations in Rust
//!
//! Compressa prepares neural network layers for compressed inference. It
//! validates declarative quantization settings, allocates correctly shaped
//! quantization parameters on each layer, and builds the cached orthogonal
//! rotations that are fused into weights before quantization.
//!
//! ## Crates
//!
//! - **core**: dtypes (including `bf16` and `f8e4m3`), devices, storage
//! - **tensor**: runtime-typed tensors with shared storage
//! - **nn**: layers with capability descriptors and execution/offload placement
//! - **quant**: arguments, schemes, presets, shape inference, initialization
//! - **transform**: Hadamard construction, factories and cached transforms
//!
//! # Quick Start
//!
//! ```rust
//! use compressa::prelude::*;
//!
//! // Allocate W4A16 parameters on a linear layer
//! let mut linear = Linear::new(2048, 512);
//! let scheme = preset_name_to_scheme("W4A16", ["Linear"]).unwrap();
//! initialize_module_for_quantization(&mut linear, Some(&scheme), &InitializeOptions::default())
//!     .unwrap();
//! assert_eq!(linear.get_parameter("weight_scale").unwrap().shape(), vec![512, 16]);
//!
//! // Rotate its input side with a cached Hadamard matrix
//! let factory = factory_from_scheme("R1", TransformScheme::new("hadamard"), Some(0)).unwrap();
//! let args = TransformArgs::new(["Linear"], TransformLocation::WeightInput).unwrap();
//! assert!(factory.apply_to_module(&mut linear, &args).unwrap().is_none());
//! ```
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

// =============================================================================
// Core Re-exports
// =============================================================================

pub use compressa_core as core;

pub use compressa_tensor as tensor;

pub use compressa_nn as nn;

// =============================================================================
// Compression Re-exports
// =============================================================================

#[cfg(feature = "quant")]
pub use compressa_quant as quant;

#[cfg(feature = "transform")]
pub use compressa_transform as transform;

// =============================================================================
// Prelude
// =============================================================================

/// Common imports for quantization and transform setup.
///
/// ```rust
/// use compressa::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use compressa_core::{DType, Device, Error, Result};

    // Tensors
    pub use compressa_tensor::Tensor;

    // Layers
    pub use compressa_nn::{
        Dropout, Embedding, LayerNorm, Linear, Module, ModuleKind, Parameter, Placement,
        SelfAttention,
    };

    // Quantization
    #[cfg(feature = "quant")]
    pub use compressa_quant::{
        initialize_module_for_quantization, is_preset_scheme, preset_name_to_scheme,
        quantization_status, ActivationOrdering, DiagnosticCode, Diagnostics, DynamicType,
        InitializeOptions, QuantError, QuantizationArgs, QuantizationRole, QuantizationScheme,
        QuantizationStatus, QuantizationStrategy, QuantizationType,
    };

    // Transforms
    #[cfg(feature = "transform")]
    pub use compressa_transform::{
        factory_from_scheme, HadamardFactory, HadamardTransform, Transform, TransformArgs,
        TransformError, TransformFactory, TransformLocation, TransformScheme,
    };
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_exports() {
        let linear = Linear::new(4, 4);
        assert_eq!(linear.name(), "Linear");
        assert_eq!(DType::default(), DType::F32);
    }

    #[cfg(all(feature = "quant", feature = "transform"))]
    #[test]
    fn test_sub_crates_reachable() {
        assert!(crate::quant::preset_names().contains(&"FP8_BLOCK"));
        assert!(crate::transform::is_supported_size(4096));
    }
}

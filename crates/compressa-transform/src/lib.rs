//! Compressa Transform - Cached Hadamard Rotations
//!
//! Builds orthogonal rotations that are fused into layer weights or applied
//! to activations ahead of quantization:
//!
//! - **TransformArgs / TransformScheme**: where and how rotations apply
//! - **Construction**: deterministic Sylvester and Paley Hadamard matrices
//! - **Factories**: shared matrix and permutation caches per scheme
//! - **HadamardTransform**: normalized, optionally permuted or inverted
//!
//! # Example
//! ```rust
//! use compressa_nn::Linear;
//! use compressa_transform::prelude::*;
//!
//! let scheme = TransformScheme::new("hadamard");
//! let factory = factory_from_scheme("R1", scheme, Some(0)).unwrap();
//! let args = TransformArgs::new(["Linear"], TransformLocation::Input).unwrap();
//! let transform = factory.create_transform(&Linear::new(64, 64), &args).unwrap();
//! assert_eq!(transform.args().location(), TransformLocation::Input);
//! ```
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod apply;
pub mod args;
pub mod cache;
pub mod construct;
pub mod error;
pub mod factory;
pub mod scheme;
pub mod transform;

pub use apply::{apply_transform_weight, transform_size};
pub use args::{OneOrMany, RawTransformArgs, TransformArgs, TransformLocation};
pub use cache::{CacheStats, ParameterizedCache};
pub use construct::{deterministic_hadamard_matrix, hadamard_values, is_supported_size};
pub use error::{TransformError, TransformResult};
pub use factory::{
    factory_from_scheme, HadamardFactory, MatrixKey, TransformFactory, TRANSFORM_TYPES,
};
pub use scheme::{RawTransformScheme, TransformScheme};
pub use transform::{HadamardTransform, Transform};

// =============================================================================
// Prelude
// =============================================================================

/// Common imports for building and applying transforms.
pub mod prelude {
    pub use crate::args::{TransformArgs, TransformLocation};
    pub use crate::error::{TransformError, TransformResult};
    pub use crate::factory::{factory_from_scheme, HadamardFactory, TransformFactory};
    pub use crate::scheme::TransformScheme;
    pub use crate::transform::{HadamardTransform, Transform};
}

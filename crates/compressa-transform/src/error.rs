//! Transform Error Types
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use thiserror::Error;

/// Result type for transform operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Errors that can occur while building or applying transforms.
#[derive(Error, Debug)]
pub enum TransformError {
    /// No Hadamard construction is known for this size.
    #[error("Unsupported Hadamard size {0}: expected 2^k or 2^k * (q + 1) with q prime and q = 3 mod 4")]
    UnsupportedSize(usize),

    /// Transform type name not present in the registry.
    #[error("Unknown transform type {name}, available types: {available:?}")]
    UnknownTransformType {
        /// Requested type name.
        name: String,
        /// Registered type names.
        available: Vec<&'static str>,
    },

    /// The module type has no application rule for the location.
    #[error("Cannot apply {location} transform to {module} module")]
    UnsupportedModule {
        /// Module type name.
        module: &'static str,
        /// Requested location.
        location: String,
    },

    /// The head dimension does not evenly divide the transformed size.
    #[error("head_dim {head_dim} does not divide transform size {size}")]
    InvalidHeadDim {
        /// Requested head dimension.
        head_dim: usize,
        /// Full size of the transformed axis.
        size: usize,
    },

    /// The module has no weight to size or fuse the transform with.
    #[error("Module {0} has no weight")]
    MissingWeight(&'static str),

    /// A transform configuration field is invalid.
    #[error("Invalid transform config: {0}")]
    InvalidConfig(String),

    /// Underlying tensor error.
    #[error("Tensor error: {0}")]
    Tensor(#[from] compressa_core::Error),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = TransformError::UnknownTransformType {
            name: "spinquant".to_string(),
            available: vec!["hadamard", "random-hadamard"],
        };
        assert!(err.to_string().contains("random-hadamard"));

        let err = TransformError::InvalidHeadDim {
            head_dim: 48,
            size: 128,
        };
        assert_eq!(err.to_string(), "head_dim 48 does not divide transform size 128");
    }

    #[test]
    fn test_tensor_error_converts() {
        let inner = compressa_core::Error::invalid_operation("bad");
        let err: TransformError = inner.into();
        assert!(matches!(err, TransformError::Tensor(_)));
    }
}

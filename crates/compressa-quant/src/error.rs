//! Quantization Error Types
//!
//! Error types for argument validation, preset lookup and module
//! initialization.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use thiserror::Error;

/// Result type for quantization operations.
pub type QuantResult<T> = Result<T, QuantError>;

/// Errors that can occur while configuring or initializing quantization.
#[derive(Error, Debug)]
pub enum QuantError {
    /// A configuration field holds an invalid value or combination.
    #[error("Invalid {field} '{value}': {reason}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// Offending value, rendered for display.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Cross-role scheme validation failed.
    #[error("Invalid quantization scheme: {0}")]
    InvalidScheme(String),

    /// Unknown preset scheme name.
    #[error("Unknown preset scheme name {name}, available names: {available:?}")]
    UnknownPreset {
        /// Requested name, upper-cased.
        name: String,
        /// Every registered preset name.
        available: Vec<&'static str>,
    },

    /// Bit-width and type combination has no numeric representation.
    #[error("Unsupported quantization format: {0}")]
    UnsupportedFormat(String),

    /// BLOCK strategy reached initialization without a block structure.
    #[error("Block quantization requires block_structure to be specified")]
    MissingBlockStructure,

    /// A shape-dependent parameter was requested for a module without a matrix weight.
    #[error("Module {module} has no (out, in) weight shape required for {what}")]
    MissingWeightShape {
        /// Module type name.
        module: &'static str,
        /// Parameter that needed the shape.
        what: String,
    },

    /// The module has no parameter to derive dtype and device from.
    #[error("Module {0} has no parameters to derive scale dtype and device from")]
    MissingParameter(&'static str),

    /// Underlying tensor error.
    #[error("Tensor error: {0}")]
    Tensor(#[from] compressa_core::Error),
}

impl QuantError {
    /// Creates an invalid field error.
    pub fn invalid_field(
        field: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

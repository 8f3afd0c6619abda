//! Transform Scheme - A Named Family of Transforms
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use serde::{Deserialize, Serialize};

use crate::args::TransformArgs;
use crate::error::{TransformError, TransformResult};

/// Wire form of [`TransformScheme`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransformScheme {
    /// Factory type name, e.g. `"hadamard"`.
    #[serde(rename = "type")]
    pub transform_type: String,
    /// Where the transforms are applied.
    #[serde(default)]
    pub apply: Vec<TransformArgs>,
    /// Apply a random symmetric permutation to each matrix.
    #[serde(default)]
    pub randomize: bool,
    /// Whether the shared matrices are trainable.
    #[serde(default)]
    pub requires_grad: bool,
    /// Per-head transform size.
    #[serde(default)]
    pub head_dim: Option<i64>,
}

/// Validated transform scheme.
///
/// Every application in `apply` shares the factory built from this scheme,
/// and therefore its matrix cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTransformScheme", into = "RawTransformScheme")]
pub struct TransformScheme {
    transform_type: String,
    apply: Vec<TransformArgs>,
    randomize: bool,
    requires_grad: bool,
    head_dim: Option<usize>,
}

impl TransformScheme {
    /// Creates a scheme of `transform_type` with no applications.
    pub fn new(transform_type: impl Into<String>) -> Self {
        Self {
            transform_type: transform_type.into(),
            apply: Vec::new(),
            randomize: false,
            requires_grad: false,
            head_dim: None,
        }
    }

    /// Adds an application.
    #[must_use]
    pub fn with_apply(mut self, args: TransformArgs) -> Self {
        self.apply.push(args);
        self
    }

    /// Enables random permutation of the matrices.
    #[must_use]
    pub fn randomize(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }

    /// Marks the shared matrices as trainable.
    #[must_use]
    pub fn requires_grad(mut self, requires_grad: bool) -> Self {
        self.requires_grad = requires_grad;
        self
    }

    /// Sets the per-head transform size.
    pub fn head_dim(mut self, head_dim: usize) -> TransformResult<Self> {
        if head_dim == 0 {
            return Err(TransformError::InvalidConfig(
                "head_dim must be positive".to_string(),
            ));
        }
        self.head_dim = Some(head_dim);
        Ok(self)
    }

    /// Factory type name.
    pub fn transform_type(&self) -> &str {
        &self.transform_type
    }

    /// Applications of this scheme.
    pub fn applications(&self) -> &[TransformArgs] {
        &self.apply
    }

    /// True if matrices are randomly permuted.
    pub fn is_randomized(&self) -> bool {
        self.randomize
    }

    /// True if matrices are trainable.
    pub fn is_trainable(&self) -> bool {
        self.requires_grad
    }

    /// Per-head transform size.
    pub fn per_head_dim(&self) -> Option<usize> {
        self.head_dim
    }
}

impl TryFrom<RawTransformScheme> for TransformScheme {
    type Error = TransformError;

    fn try_from(raw: RawTransformScheme) -> TransformResult<Self> {
        if raw.transform_type.trim().is_empty() {
            return Err(TransformError::InvalidConfig(
                "transform type must not be empty".to_string(),
            ));
        }
        let head_dim = match raw.head_dim {
            None => None,
            Some(dim) if dim > 0 => Some(dim as usize),
            Some(dim) => {
                return Err(TransformError::InvalidConfig(format!(
                    "head_dim must be positive, got {dim}"
                )))
            }
        };
        Ok(Self {
            transform_type: raw.transform_type,
            apply: raw.apply,
            randomize: raw.randomize,
            requires_grad: raw.requires_grad,
            head_dim,
        })
    }
}

impl From<TransformScheme> for RawTransformScheme {
    fn from(scheme: TransformScheme) -> Self {
        Self {
            transform_type: scheme.transform_type,
            apply: scheme.apply,
            randomize: scheme.randomize,
            requires_grad: scheme.requires_grad,
            head_dim: scheme.head_dim.map(|dim| dim as i64),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::TransformLocation;

    #[test]
    fn test_scheme_defaults_from_json() {
        let scheme: TransformScheme = serde_json::from_str(
            r#"{
                "type": "hadamard",
                "apply": [
                    {"targets": ["Linear"], "location": "weight_input"},
                    {"targets": ["Linear"], "location": "input", "inverse": true}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(scheme.transform_type(), "hadamard");
        assert_eq!(scheme.applications().len(), 2);
        assert!(scheme.applications()[1].is_inverse());
        assert!(!scheme.is_randomized());
        assert!(!scheme.is_trainable());
        assert_eq!(scheme.per_head_dim(), None);
    }

    #[test]
    fn test_head_dim_must_be_positive() {
        assert!(TransformScheme::new("hadamard").head_dim(0).is_err());
        assert_eq!(
            TransformScheme::new("hadamard").head_dim(64).unwrap().per_head_dim(),
            Some(64)
        );
        let json = r#"{"type": "hadamard", "head_dim": -8}"#;
        assert!(serde_json::from_str::<TransformScheme>(json).is_err());
    }

    #[test]
    fn test_scheme_round_trip() {
        let scheme = TransformScheme::new("random-hadamard")
            .randomize(true)
            .with_apply(TransformArgs::new(["Linear"], TransformLocation::WeightOutput).unwrap());
        let text = serde_json::to_string(&scheme).unwrap();
        assert!(text.contains("\"type\":\"random-hadamard\""));
        let back: TransformScheme = serde_json::from_str(&text).unwrap();
        assert_eq!(back, scheme);
    }

    #[test]
    fn test_empty_type_rejected() {
        assert!(serde_json::from_str::<TransformScheme>(r#"{"type": " "}"#).is_err());
    }
}

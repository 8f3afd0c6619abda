//! Quantization Scheme - Per-Role Arguments for a Set of Targets
//!
//! Groups up to three [`QuantizationArgs`] (weights, input activations,
//! output activations) with the target selectors they apply to, and checks
//! the roles against each other.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::args::{QuantizationArgs, QuantizationStrategy};
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::error::{QuantError, QuantResult};

/// Target sets that mark a scheme as key/value cache quantization.
pub const KV_CACHE_TARGETS: [&[&str]; 2] = [
    &["re:.*self_attn$"],
    &["re:.*k_proj", "re:.*v_proj"],
];

// =============================================================================
// Raw Scheme
// =============================================================================

/// Wire form of [`QuantizationScheme`] before cross-role validation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawQuantizationScheme {
    /// Target selectors.
    pub targets: Vec<String>,
    /// Weight arguments.
    #[serde(default)]
    pub weights: Option<QuantizationArgs>,
    /// Input activation arguments.
    #[serde(default)]
    pub input_activations: Option<QuantizationArgs>,
    /// Output activation arguments.
    #[serde(default)]
    pub output_activations: Option<QuantizationArgs>,
}

// =============================================================================
// QuantizationScheme
// =============================================================================

/// Validated quantization scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawQuantizationScheme", into = "RawQuantizationScheme")]
pub struct QuantizationScheme {
    targets: Vec<String>,
    weights: Option<QuantizationArgs>,
    input_activations: Option<QuantizationArgs>,
    output_activations: Option<QuantizationArgs>,
}

impl QuantizationScheme {
    /// Starts a builder for the given targets.
    pub fn builder<I, S>(targets: I) -> QuantizationSchemeBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QuantizationSchemeBuilder {
            raw: RawQuantizationScheme {
                targets: targets.into_iter().map(Into::into).collect(),
                ..RawQuantizationScheme::default()
            },
        }
    }

    /// Validates a raw scheme, recording warnings into `diagnostics`.
    pub fn from_raw(
        raw: RawQuantizationScheme,
        diagnostics: &mut Diagnostics,
    ) -> QuantResult<Self> {
        if raw
            .input_activations
            .as_ref()
            .is_some_and(|args| args.actorder().is_some())
        {
            return Err(QuantError::InvalidScheme(
                "cannot apply actorder to input activations".to_string(),
            ));
        }
        if raw
            .output_activations
            .as_ref()
            .is_some_and(|args| args.actorder().is_some())
        {
            return Err(QuantError::InvalidScheme(
                "cannot apply actorder to output activations".to_string(),
            ));
        }

        if let (Some(weights), Some(inputs)) = (&raw.weights, &raw.input_activations) {
            if weights.strategy() == QuantizationStrategy::Group
                && inputs.strategy() == QuantizationStrategy::Group
                && weights.group_size() != inputs.group_size()
            {
                diagnostics.warn(
                    DiagnosticCode::MismatchedGroupSizes,
                    format!(
                        "GROUP strategy for weights and input_activations with different group sizes \
                         ({:?} vs {:?}) may complicate fused kernels; consider TENSOR_GROUP or matching sizes",
                        weights.group_size(),
                        inputs.group_size()
                    ),
                );
            }
        }

        Ok(Self {
            targets: raw.targets,
            weights: raw.weights,
            input_activations: raw.input_activations,
            output_activations: raw.output_activations,
        })
    }

    /// Target selectors.
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Weight arguments.
    pub fn weights(&self) -> Option<&QuantizationArgs> {
        self.weights.as_ref()
    }

    /// Input activation arguments.
    pub fn input_activations(&self) -> Option<&QuantizationArgs> {
        self.input_activations.as_ref()
    }

    /// Output activation arguments.
    pub fn output_activations(&self) -> Option<&QuantizationArgs> {
        self.output_activations.as_ref()
    }

    /// True when no role is quantized.
    pub fn is_unquantized(&self) -> bool {
        self.weights.is_none()
            && self.input_activations.is_none()
            && self.output_activations.is_none()
    }
}

impl TryFrom<RawQuantizationScheme> for QuantizationScheme {
    type Error = QuantError;

    fn try_from(raw: RawQuantizationScheme) -> QuantResult<Self> {
        Self::from_raw(raw, &mut Diagnostics::new())
    }
}

impl From<QuantizationScheme> for RawQuantizationScheme {
    fn from(scheme: QuantizationScheme) -> Self {
        Self {
            targets: scheme.targets,
            weights: scheme.weights,
            input_activations: scheme.input_activations,
            output_activations: scheme.output_activations,
        }
    }
}

/// Builder for [`QuantizationScheme`].
#[derive(Debug, Clone)]
pub struct QuantizationSchemeBuilder {
    raw: RawQuantizationScheme,
}

impl QuantizationSchemeBuilder {
    /// Sets the weight arguments.
    pub fn weights(mut self, args: QuantizationArgs) -> Self {
        self.raw.weights = Some(args);
        self
    }

    /// Sets the input activation arguments.
    pub fn input_activations(mut self, args: QuantizationArgs) -> Self {
        self.raw.input_activations = Some(args);
        self
    }

    /// Sets the output activation arguments.
    pub fn output_activations(mut self, args: QuantizationArgs) -> Self {
        self.raw.output_activations = Some(args);
        self
    }

    /// Validates and builds.
    pub fn build(self) -> QuantResult<QuantizationScheme> {
        QuantizationScheme::from_raw(self.raw, &mut Diagnostics::new())
    }

    /// Validates and builds, recording warnings into `diagnostics`.
    pub fn build_with(self, diagnostics: &mut Diagnostics) -> QuantResult<QuantizationScheme> {
        QuantizationScheme::from_raw(self.raw, diagnostics)
    }
}

/// True when the scheme quantizes the key/value cache.
///
/// Output activations must be quantized and the targets must be exactly one
/// of [`KV_CACHE_TARGETS`].
pub fn is_kv_cache_quant_scheme(scheme: &QuantizationScheme) -> bool {
    if scheme.output_activations.is_none() {
        return false;
    }
    let targets: BTreeSet<&str> = scheme.targets.iter().map(String::as_str).collect();
    KV_CACHE_TARGETS
        .iter()
        .any(|set| set.iter().copied().collect::<BTreeSet<&str>>() == targets)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{ActivationOrdering, DynamicType};

    fn group(size: i64) -> QuantizationArgs {
        QuantizationArgs::builder().group_size(size).build().unwrap()
    }

    #[test]
    fn test_actorder_rejected_on_activations() {
        let ordered = QuantizationArgs::builder()
            .group_size(128)
            .actorder(ActivationOrdering::Group)
            .build()
            .unwrap();

        let err = QuantizationScheme::builder(["Linear"])
            .input_activations(ordered.clone())
            .build()
            .unwrap_err();
        assert!(matches!(err, QuantError::InvalidScheme(_)));

        assert!(QuantizationScheme::builder(["Linear"])
            .output_activations(ordered.clone())
            .build()
            .is_err());

        assert!(QuantizationScheme::builder(["Linear"]).weights(ordered).build().is_ok());
    }

    #[test]
    fn test_mismatched_group_sizes_warn_only() {
        let mut diags = Diagnostics::new();
        let scheme = QuantizationScheme::builder(["Linear"])
            .weights(group(128))
            .input_activations(group(64))
            .build_with(&mut diags)
            .unwrap();
        assert!(scheme.weights().is_some());
        assert!(diags.contains(DiagnosticCode::MismatchedGroupSizes));

        let mut quiet = Diagnostics::new();
        QuantizationScheme::builder(["Linear"])
            .weights(group(128))
            .input_activations(group(128))
            .build_with(&mut quiet)
            .unwrap();
        assert!(quiet.is_empty());
    }

    #[test]
    fn test_kv_cache_scheme_detection() {
        let output = QuantizationArgs::default();
        let kv = QuantizationScheme::builder(["re:.*self_attn$"])
            .output_activations(output.clone())
            .build()
            .unwrap();
        assert!(is_kv_cache_quant_scheme(&kv));

        let kv_split = QuantizationScheme::builder(["re:.*v_proj", "re:.*k_proj"])
            .output_activations(output.clone())
            .build()
            .unwrap();
        assert!(is_kv_cache_quant_scheme(&kv_split));

        let linear = QuantizationScheme::builder(["Linear"])
            .output_activations(output)
            .build()
            .unwrap();
        assert!(!is_kv_cache_quant_scheme(&linear));

        let no_output = QuantizationScheme::builder(["re:.*self_attn$"]).build().unwrap();
        assert!(!is_kv_cache_quant_scheme(&no_output));
    }

    #[test]
    fn test_scheme_json_round_trip() {
        let json = r#"{
            "targets": ["Linear"],
            "weights": {"num_bits": 4, "group_size": 128, "symmetric": false},
            "input_activations": {"num_bits": 8, "strategy": "token", "dynamic": true}
        }"#;
        let scheme: QuantizationScheme = serde_json::from_str(json).unwrap();
        assert_eq!(scheme.targets(), ["Linear".to_string()]);
        assert_eq!(
            scheme.weights().map(QuantizationArgs::strategy),
            Some(QuantizationStrategy::Group)
        );
        assert_eq!(
            scheme.input_activations().map(QuantizationArgs::dynamic),
            Some(DynamicType::Dynamic)
        );
        assert!(scheme.output_activations().is_none());

        let text = serde_json::to_string(&scheme).unwrap();
        let back: QuantizationScheme = serde_json::from_str(&text).unwrap();
        assert_eq!(back, scheme);
    }

    #[test]
    fn test_invalid_nested_args_fail_scheme() {
        let json = r#"{"targets": ["Linear"], "weights": {"strategy": "group"}}"#;
        assert!(serde_json::from_str::<QuantizationScheme>(json).is_err());
    }
}

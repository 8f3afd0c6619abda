//! Transform Arguments - Where and How a Transform Is Applied
//!
//! A [`TransformArgs`] names the modules a transform targets, the location
//! it is applied at, and whether the inverse (transposed) matrix is used.
//! Weight locations are fused into the module weight once; every other
//! location is applied online to activations at call time.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TransformError, TransformResult};

// =============================================================================
// TransformLocation
// =============================================================================

/// Point in a module's computation where a transform is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformLocation {
    /// Module input activations.
    Input,
    /// Input side of the weight, fused ahead of time.
    WeightInput,
    /// Output side of the weight, fused ahead of time.
    WeightOutput,
    /// Module output activations.
    Output,
    /// Attention key cache.
    KCache,
    /// Attention queries.
    QAttn,
}

impl TransformLocation {
    /// Every location, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Input,
        Self::WeightInput,
        Self::WeightOutput,
        Self::Output,
        Self::KCache,
        Self::QAttn,
    ];

    /// Returns the snake_case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::WeightInput => "weight_input",
            Self::WeightOutput => "weight_output",
            Self::Output => "output",
            Self::KCache => "k_cache",
            Self::QAttn => "q_attn",
        }
    }

    /// True for locations applied to activations at call time.
    pub const fn is_online(self) -> bool {
        !matches!(self, Self::WeightInput | Self::WeightOutput)
    }

    /// True for locations on the input side of a module.
    pub const fn is_input_side(self) -> bool {
        matches!(self, Self::Input | Self::WeightInput)
    }
}

impl FromStr for TransformLocation {
    type Err = TransformError;

    fn from_str(s: &str) -> TransformResult<Self> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|location| location.as_str() == lower)
            .ok_or_else(|| {
                TransformError::InvalidConfig(format!("unknown transform location '{s}'"))
            })
    }
}

impl fmt::Display for TransformLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Raw Arguments
// =============================================================================

/// A single selector or a list of selectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    /// Single selector.
    One(String),
    /// Selector list.
    Many(Vec<String>),
}

impl Default for OneOrMany {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(single) => vec![single],
            OneOrMany::Many(many) => many,
        }
    }
}

/// Wire form of [`TransformArgs`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransformArgs {
    /// Target selectors.
    pub targets: OneOrMany,
    /// Application location.
    pub location: TransformLocation,
    /// Use the transposed matrix.
    #[serde(default)]
    pub inverse: bool,
    /// Selectors excluded from the targets.
    #[serde(default)]
    pub ignore: OneOrMany,
}

// =============================================================================
// TransformArgs
// =============================================================================

/// Validated transform application arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTransformArgs", into = "RawTransformArgs")]
pub struct TransformArgs {
    targets: Vec<String>,
    location: TransformLocation,
    inverse: bool,
    ignore: Vec<String>,
}

impl TransformArgs {
    /// Creates arguments for `targets` at `location`.
    pub fn new<I, S>(targets: I, location: TransformLocation) -> TransformResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::try_from(RawTransformArgs {
            targets: OneOrMany::Many(targets.into_iter().map(Into::into).collect()),
            location,
            inverse: false,
            ignore: OneOrMany::default(),
        })
    }

    /// Uses the transposed matrix.
    #[must_use]
    pub fn inverse(mut self, inverse: bool) -> Self {
        self.inverse = inverse;
        self
    }

    /// Excludes selectors from the targets.
    #[must_use]
    pub fn ignore<I, S>(mut self, ignore: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore = ignore.into_iter().map(Into::into).collect();
        self
    }

    /// Target selectors.
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Application location.
    pub fn location(&self) -> TransformLocation {
        self.location
    }

    /// True if the transposed matrix is applied.
    pub fn is_inverse(&self) -> bool {
        self.inverse
    }

    /// Excluded selectors.
    pub fn ignored(&self) -> &[String] {
        &self.ignore
    }

    /// True if the transform runs on activations at call time.
    pub fn is_online(&self) -> bool {
        self.location.is_online()
    }
}

impl TryFrom<RawTransformArgs> for TransformArgs {
    type Error = TransformError;

    fn try_from(raw: RawTransformArgs) -> TransformResult<Self> {
        let targets: Vec<String> = raw.targets.into();
        if targets.is_empty() {
            return Err(TransformError::InvalidConfig(
                "transform args need at least one target".to_string(),
            ));
        }
        Ok(Self {
            targets,
            location: raw.location,
            inverse: raw.inverse,
            ignore: raw.ignore.into(),
        })
    }
}

impl From<TransformArgs> for RawTransformArgs {
    fn from(args: TransformArgs) -> Self {
        Self {
            targets: OneOrMany::Many(args.targets),
            location: args.location,
            inverse: args.inverse,
            ignore: OneOrMany::Many(args.ignore),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_online_locations() {
        assert!(TransformLocation::Input.is_online());
        assert!(TransformLocation::Output.is_online());
        assert!(TransformLocation::KCache.is_online());
        assert!(TransformLocation::QAttn.is_online());
        assert!(!TransformLocation::WeightInput.is_online());
        assert!(!TransformLocation::WeightOutput.is_online());
    }

    #[test]
    fn test_location_parse() {
        assert_eq!(
            "Weight_Input".parse::<TransformLocation>().unwrap(),
            TransformLocation::WeightInput
        );
        assert_eq!("k_cache".parse::<TransformLocation>().unwrap(), TransformLocation::KCache);
        assert!("middle".parse::<TransformLocation>().is_err());
    }

    #[test]
    fn test_single_target_string_is_wrapped() {
        let args: TransformArgs =
            serde_json::from_str(r#"{"targets": "Linear", "location": "weight_output"}"#).unwrap();
        assert_eq!(args.targets(), ["Linear".to_string()]);
        assert_eq!(args.location(), TransformLocation::WeightOutput);
        assert!(!args.is_inverse());
        assert!(args.ignored().is_empty());
    }

    #[test]
    fn test_empty_targets_rejected() {
        assert!(TransformArgs::new(Vec::<String>::new(), TransformLocation::Input).is_err());
        assert!(
            serde_json::from_str::<TransformArgs>(r#"{"targets": [], "location": "input"}"#)
                .is_err()
        );
    }

    #[test]
    fn test_args_json_round_trip() {
        let args = TransformArgs::new(["Linear"], TransformLocation::Input)
            .unwrap()
            .inverse(true)
            .ignore(["lm_head"]);
        let text = serde_json::to_string(&args).unwrap();
        let back: TransformArgs = serde_json::from_str(&text).unwrap();
        assert_eq!(back, args);
        assert!(back.is_inverse());
        assert_eq!(back.ignored(), ["lm_head".to_string()]);
    }
}

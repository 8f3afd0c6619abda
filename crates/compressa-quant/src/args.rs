//! Quantization Arguments - Validated Per-Role Quantization Settings
//!
//! [`QuantizationArgs`] describes how one tensor role (weights, input
//! activations or output activations) is quantized. Construction is two
//! phase: raw fields are coerced into typed values (strings to enums,
//! aliases resolved, compact block structures parsed), then a single
//! normalization pass infers the strategy, rejects invalid combinations and
//! defaults the observer. Every path that produces a `QuantizationArgs`,
//! including deserialization, goes through both phases.
//!
//! # Example
//!
//! ```rust
//! use compressa_quant::{QuantizationArgs, QuantizationStrategy};
//!
//! let args = QuantizationArgs::builder().num_bits(4).group_size(128).build().unwrap();
//! assert_eq!(args.strategy(), QuantizationStrategy::Group);
//! assert_eq!(args.observer(), Some("minmax"));
//! ```
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use compressa_core::DType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::error::{QuantError, QuantResult};
use crate::float::{FloatFormat, FP4_E2M1, FP8_E4M3};

/// Observer used when none is given for static quantization.
pub const DEFAULT_OBSERVER: &str = "minmax";

/// Observer name that is silently dropped for dynamic quantization.
pub const MEMORYLESS_OBSERVER: &str = "memoryless";

// =============================================================================
// Enumerations
// =============================================================================

/// Numeric family of the quantized values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantizationType {
    /// Integer quantization.
    #[default]
    Int,
    /// Floating point quantization.
    Float,
}

impl QuantizationType {
    /// Returns the canonical lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
        }
    }
}

impl FromStr for QuantizationType {
    type Err = QuantError;

    fn from_str(s: &str) -> QuantResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "int" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            _ => Err(QuantError::invalid_field("type", s, "expected 'int' or 'float'")),
        }
    }
}

impl fmt::Display for QuantizationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Granularity at which one scale/zero-point pair applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantizationStrategy {
    /// One scale for the whole tensor.
    Tensor,
    /// One scale per output channel.
    Channel,
    /// One scale per group of input features per output channel.
    Group,
    /// One scale per 2D block.
    Block,
    /// One scale per token, computed at call time.
    Token,
    /// Per-tensor global scale composed with per-group scales.
    TensorGroup,
}

impl QuantizationStrategy {
    /// Returns the canonical snake_case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tensor => "tensor",
            Self::Channel => "channel",
            Self::Group => "group",
            Self::Block => "block",
            Self::Token => "token",
            Self::TensorGroup => "tensor_group",
        }
    }

    /// Strategies that allow dynamic quantization.
    pub const fn supports_dynamic(self) -> bool {
        matches!(
            self,
            Self::Token | Self::Tensor | Self::TensorGroup | Self::Group
        )
    }
}

impl FromStr for QuantizationStrategy {
    type Err = QuantError;

    fn from_str(s: &str) -> QuantResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tensor" => Ok(Self::Tensor),
            "channel" => Ok(Self::Channel),
            "group" => Ok(Self::Group),
            "block" => Ok(Self::Block),
            "token" => Ok(Self::Token),
            "tensor_group" => Ok(Self::TensorGroup),
            _ => Err(QuantError::invalid_field(
                "strategy",
                s,
                "expected one of tensor, channel, group, block, token, tensor_group",
            )),
        }
    }
}

impl fmt::Display for QuantizationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When scale and zero-point are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DynamicType {
    /// Calibrated ahead of time.
    #[default]
    Static,
    /// Computed on every call.
    Dynamic,
    /// Per-group component computed on every call, global component static.
    Local,
}

impl DynamicType {
    /// True for `Dynamic` and `Local`.
    pub const fn is_dynamic(self) -> bool {
        !matches!(self, Self::Static)
    }

    /// True only for `Dynamic`.
    pub const fn is_fully_dynamic(self) -> bool {
        matches!(self, Self::Dynamic)
    }

    /// True only for `Local`.
    pub const fn is_local(self) -> bool {
        matches!(self, Self::Local)
    }
}

impl From<bool> for DynamicType {
    fn from(dynamic: bool) -> Self {
        if dynamic {
            Self::Dynamic
        } else {
            Self::Static
        }
    }
}

impl FromStr for DynamicType {
    type Err = QuantError;

    fn from_str(s: &str) -> QuantResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "true" => Ok(Self::Dynamic),
            "false" => Ok(Self::Static),
            _ => Err(QuantError::invalid_field(
                "dynamic",
                s,
                "expected true, false or 'local'",
            )),
        }
    }
}

impl fmt::Display for DynamicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Static => "false",
            Self::Dynamic => "true",
            Self::Local => "local",
        })
    }
}

/// Activation ordering applied before group quantization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationOrdering {
    /// Reorder the weight columns and the groups.
    Group,
    /// Reorder the weight columns only.
    Weight,
}

impl ActivationOrdering {
    /// Returns the canonical lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Weight => "weight",
        }
    }
}

impl FromStr for ActivationOrdering {
    type Err = QuantError;

    fn from_str(s: &str) -> QuantResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "group" | "dynamic" => Ok(Self::Group),
            "weight" | "static" => Ok(Self::Weight),
            _ => Err(QuantError::invalid_field(
                "actorder",
                s,
                "expected group, weight, dynamic or static",
            )),
        }
    }
}

impl fmt::Display for ActivationOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Raw Fields
// =============================================================================

/// A value given either as a boolean flag or by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagOrName {
    /// Boolean form.
    Flag(bool),
    /// Named form.
    Name(String),
}

/// Block structure as `[rows, cols]` or compact `"RxC"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawBlockStructure {
    /// `[rows, cols]`.
    Pair(Vec<i64>),
    /// `"RxC"`.
    Compact(String),
}

/// Unvalidated mirror of [`QuantizationArgs`] used as the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawQuantizationArgs {
    /// Bit depth.
    pub num_bits: u32,
    /// `"int"` or `"float"`, any case.
    #[serde(rename = "type")]
    pub quant_type: String,
    /// Symmetric about zero.
    pub symmetric: bool,
    /// Group length, `-1` for per-channel.
    pub group_size: Option<i64>,
    /// Strategy name, inferred when absent.
    pub strategy: Option<String>,
    /// Block structure for BLOCK.
    pub block_structure: Option<RawBlockStructure>,
    /// `true`, `false` or `"local"`.
    pub dynamic: FlagOrName,
    /// Activation ordering.
    pub actorder: Option<FlagOrName>,
    /// Observer name.
    pub observer: Option<String>,
    /// Observer constructor arguments.
    pub observer_kwargs: BTreeMap<String, Value>,
}

impl Default for RawQuantizationArgs {
    fn default() -> Self {
        Self {
            num_bits: 8,
            quant_type: QuantizationType::Int.as_str().to_string(),
            symmetric: true,
            group_size: None,
            strategy: None,
            block_structure: None,
            dynamic: FlagOrName::Flag(false),
            actorder: None,
            observer: None,
            observer_kwargs: BTreeMap::new(),
        }
    }
}

/// Typed fields after coercion, before cross-field normalization.
#[derive(Debug, Clone, PartialEq)]
struct Fields {
    num_bits: u32,
    quant_type: QuantizationType,
    symmetric: bool,
    group_size: Option<i64>,
    strategy: Option<QuantizationStrategy>,
    block_structure: Option<[usize; 2]>,
    dynamic: DynamicType,
    actorder: Option<ActivationOrdering>,
    observer: Option<String>,
    observer_kwargs: BTreeMap<String, Value>,
}

impl Default for Fields {
    fn default() -> Self {
        Self {
            num_bits: 8,
            quant_type: QuantizationType::Int,
            symmetric: true,
            group_size: None,
            strategy: None,
            block_structure: None,
            dynamic: DynamicType::Static,
            actorder: None,
            observer: None,
            observer_kwargs: BTreeMap::new(),
        }
    }
}

fn check_group_size(group_size: Option<i64>) -> QuantResult<Option<i64>> {
    match group_size {
        Some(g) if g < -1 => Err(QuantError::invalid_field(
            "group_size",
            g,
            "use group_size > 0 for strategy 'group' and group_size = -1 for 'channel'",
        )),
        other => Ok(other),
    }
}

fn block_dims(field: &str, values: &[i64]) -> QuantResult<[usize; 2]> {
    match values {
        [rows, cols] if *rows > 0 && *cols > 0 => Ok([*rows as usize, *cols as usize]),
        _ => Err(QuantError::invalid_field(
            "block_structure",
            field,
            "must be two positive integers [rows, cols]",
        )),
    }
}

/// Parses a block structure from its raw form.
pub fn parse_block_structure(raw: &RawBlockStructure) -> QuantResult<[usize; 2]> {
    match raw {
        RawBlockStructure::Pair(values) => block_dims(&format!("{values:?}"), values),
        RawBlockStructure::Compact(text) => {
            let parts: Vec<i64> = text
                .split(['x', 'X'])
                .map(|part| part.trim().parse::<i64>())
                .collect::<Result<_, _>>()
                .map_err(|_| {
                    QuantError::invalid_field(
                        "block_structure",
                        text,
                        "must be two positive integers [rows, cols]",
                    )
                })?;
            block_dims(text, &parts)
        }
    }
}

fn coerce(raw: RawQuantizationArgs) -> QuantResult<Fields> {
    let dynamic = match &raw.dynamic {
        FlagOrName::Flag(flag) => DynamicType::from(*flag),
        FlagOrName::Name(name) => name.parse()?,
    };
    let actorder = match &raw.actorder {
        None | Some(FlagOrName::Flag(false)) => None,
        Some(FlagOrName::Flag(true)) => Some(ActivationOrdering::Group),
        Some(FlagOrName::Name(name)) => Some(name.parse()?),
    };
    Ok(Fields {
        num_bits: raw.num_bits,
        quant_type: raw.quant_type.parse()?,
        symmetric: raw.symmetric,
        group_size: check_group_size(raw.group_size)?,
        strategy: raw.strategy.as_deref().map(str::parse).transpose()?,
        block_structure: raw
            .block_structure
            .as_ref()
            .map(parse_block_structure)
            .transpose()?,
        dynamic,
        actorder,
        observer: raw.observer,
        observer_kwargs: raw.observer_kwargs,
    })
}

fn describe(group_size: Option<i64>) -> String {
    group_size.map_or_else(|| "none".to_string(), |g| g.to_string())
}

fn normalize(fields: Fields, diagnostics: &mut Diagnostics) -> QuantResult<QuantizationArgs> {
    let Fields {
        num_bits,
        quant_type,
        symmetric,
        group_size,
        strategy,
        block_structure,
        dynamic,
        actorder,
        mut observer,
        observer_kwargs,
    } = fields;

    let strategy = match strategy {
        Some(strategy) => strategy,
        None => match group_size {
            None => QuantizationStrategy::Tensor,
            Some(g) if g > 0 => QuantizationStrategy::Group,
            Some(-1) => QuantizationStrategy::Channel,
            Some(g) => {
                return Err(QuantError::invalid_field(
                    "group_size",
                    g,
                    "use group_size > 0 for strategy 'group' and group_size = -1 for 'channel'",
                ))
            }
        },
    };

    let positive_group = matches!(group_size, Some(g) if g > 0);
    if matches!(
        strategy,
        QuantizationStrategy::Group | QuantizationStrategy::TensorGroup
    ) && !positive_group
    {
        return Err(QuantError::invalid_field(
            "group_size",
            describe(group_size),
            format!("strategy '{strategy}' requires group_size to be set to a positive value"),
        ));
    }
    if positive_group
        && !matches!(
            strategy,
            QuantizationStrategy::Group | QuantizationStrategy::TensorGroup
        )
    {
        return Err(QuantError::invalid_field(
            "group_size",
            describe(group_size),
            format!("group_size requires strategy 'group' or 'tensor_group', got '{strategy}'"),
        ));
    }

    if let Some(order) = actorder {
        if strategy != QuantizationStrategy::Group {
            return Err(QuantError::invalid_field(
                "actorder",
                order,
                format!("activation ordering requires strategy 'group', got '{strategy}'"),
            ));
        }
    }

    if dynamic.is_dynamic() {
        if !strategy.supports_dynamic() {
            return Err(QuantError::invalid_field(
                "dynamic",
                dynamic,
                format!(
                    "dynamic quantization requires one of token, tensor, tensor_group, group; got '{strategy}'"
                ),
            ));
        }
        if dynamic.is_local() && strategy != QuantizationStrategy::TensorGroup {
            return Err(QuantError::invalid_field(
                "dynamic",
                dynamic,
                format!("local is only supported for strategy 'tensor_group', got '{strategy}'"),
            ));
        }
        match observer.as_deref() {
            Some(name) if dynamic.is_fully_dynamic() => {
                if name != MEMORYLESS_OBSERVER {
                    diagnostics.warn(
                        DiagnosticCode::DynamicObserverIgnored,
                        format!("no observer is used for dynamic quantization, ignoring '{name}'"),
                    );
                }
                observer = None;
            }
            None if dynamic.is_local() => observer = Some(DEFAULT_OBSERVER.to_string()),
            _ => {}
        }
    } else if observer.is_none() {
        observer = Some(DEFAULT_OBSERVER.to_string());
    }

    Ok(QuantizationArgs {
        num_bits,
        quant_type,
        symmetric,
        group_size,
        strategy,
        block_structure,
        dynamic,
        actorder,
        observer,
        observer_kwargs,
    })
}

// =============================================================================
// QuantizationArgs
// =============================================================================

/// Validated quantization settings for one tensor role.
///
/// Instances always satisfy the validation rules: `strategy` is resolved
/// and `observer` is defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawQuantizationArgs", into = "RawQuantizationArgs")]
pub struct QuantizationArgs {
    num_bits: u32,
    quant_type: QuantizationType,
    symmetric: bool,
    group_size: Option<i64>,
    strategy: QuantizationStrategy,
    block_structure: Option<[usize; 2]>,
    dynamic: DynamicType,
    actorder: Option<ActivationOrdering>,
    observer: Option<String>,
    observer_kwargs: BTreeMap<String, Value>,
}

impl Default for QuantizationArgs {
    /// 8-bit symmetric static per-tensor integer quantization.
    fn default() -> Self {
        Self {
            num_bits: 8,
            quant_type: QuantizationType::Int,
            symmetric: true,
            group_size: None,
            strategy: QuantizationStrategy::Tensor,
            block_structure: None,
            dynamic: DynamicType::Static,
            actorder: None,
            observer: Some(DEFAULT_OBSERVER.to_string()),
            observer_kwargs: BTreeMap::new(),
        }
    }
}

impl QuantizationArgs {
    /// Starts a builder with default field values.
    pub fn builder() -> QuantizationArgsBuilder {
        QuantizationArgsBuilder::default()
    }

    /// Validates raw fields, recording warnings into `diagnostics`.
    pub fn from_raw(raw: RawQuantizationArgs, diagnostics: &mut Diagnostics) -> QuantResult<Self> {
        normalize(coerce(raw)?, diagnostics)
    }

    /// Bit depth.
    pub fn num_bits(&self) -> u32 {
        self.num_bits
    }

    /// Numeric family.
    pub fn quant_type(&self) -> QuantizationType {
        self.quant_type
    }

    /// Symmetric about zero.
    pub fn symmetric(&self) -> bool {
        self.symmetric
    }

    /// Group length as given, `-1` meaning per-channel.
    pub fn group_size(&self) -> Option<i64> {
        self.group_size
    }

    /// Group length when positive.
    pub fn positive_group_size(&self) -> Option<usize> {
        self.group_size.filter(|&g| g > 0).map(|g| g as usize)
    }

    /// Resolved strategy.
    pub fn strategy(&self) -> QuantizationStrategy {
        self.strategy
    }

    /// Block `[rows, cols]` for BLOCK strategy.
    pub fn block_structure(&self) -> Option<[usize; 2]> {
        self.block_structure
    }

    /// Dynamic behavior.
    pub fn dynamic(&self) -> DynamicType {
        self.dynamic
    }

    /// Activation ordering.
    pub fn actorder(&self) -> Option<ActivationOrdering> {
        self.actorder
    }

    /// Resolved observer name.
    pub fn observer(&self) -> Option<&str> {
        self.observer.as_deref()
    }

    /// Observer constructor arguments.
    pub fn observer_kwargs(&self) -> &BTreeMap<String, Value> {
        &self.observer_kwargs
    }

    /// True for 4-bit float quantization.
    pub fn is_fp4(&self) -> bool {
        self.quant_type == QuantizationType::Float && self.num_bits == 4
    }

    /// Float format for float quantization with a known layout.
    pub fn float_format(&self) -> Option<&'static FloatFormat> {
        match (self.quant_type, self.num_bits) {
            (QuantizationType::Float, 8) => Some(&FP8_E4M3),
            (QuantizationType::Float, 4) => Some(&FP4_E2M1),
            _ => None,
        }
    }

    /// Container dtype for quantized values.
    ///
    /// FLOAT/8 maps to `F8E4M3`; INT maps to the smallest signed container
    /// of 8, 16 or 32 bits.
    pub fn storage_dtype(&self) -> QuantResult<DType> {
        match self.quant_type {
            QuantizationType::Float if self.num_bits == 8 => Ok(DType::F8E4M3),
            QuantizationType::Float => Err(QuantError::UnsupportedFormat(format!(
                "float quantization with num_bits={} has no storage dtype, only 8 is supported",
                self.num_bits
            ))),
            QuantizationType::Int => Ok(match self.num_bits {
                0..=8 => DType::I8,
                9..=16 => DType::I16,
                _ => DType::I32,
            }),
        }
    }
}

impl TryFrom<RawQuantizationArgs> for QuantizationArgs {
    type Error = QuantError;

    fn try_from(raw: RawQuantizationArgs) -> QuantResult<Self> {
        Self::from_raw(raw, &mut Diagnostics::new())
    }
}

impl From<QuantizationArgs> for RawQuantizationArgs {
    fn from(args: QuantizationArgs) -> Self {
        Self {
            num_bits: args.num_bits,
            quant_type: args.quant_type.as_str().to_string(),
            symmetric: args.symmetric,
            group_size: args.group_size,
            strategy: Some(args.strategy.as_str().to_string()),
            block_structure: args
                .block_structure
                .map(|[rows, cols]| RawBlockStructure::Pair(vec![rows as i64, cols as i64])),
            dynamic: match args.dynamic {
                DynamicType::Static => FlagOrName::Flag(false),
                DynamicType::Dynamic => FlagOrName::Flag(true),
                DynamicType::Local => FlagOrName::Name("local".to_string()),
            },
            actorder: args
                .actorder
                .map(|order| FlagOrName::Name(order.as_str().to_string())),
            observer: args.observer,
            observer_kwargs: args.observer_kwargs,
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`QuantizationArgs`].
#[derive(Debug, Clone, Default)]
pub struct QuantizationArgsBuilder {
    fields: Fields,
}

impl QuantizationArgsBuilder {
    /// Sets the bit depth.
    pub fn num_bits(mut self, num_bits: u32) -> Self {
        self.fields.num_bits = num_bits;
        self
    }

    /// Sets the numeric family.
    pub fn quant_type(mut self, quant_type: QuantizationType) -> Self {
        self.fields.quant_type = quant_type;
        self
    }

    /// Sets symmetry.
    pub fn symmetric(mut self, symmetric: bool) -> Self {
        self.fields.symmetric = symmetric;
        self
    }

    /// Sets the group length; `-1` selects per-channel.
    pub fn group_size(mut self, group_size: i64) -> Self {
        self.fields.group_size = Some(group_size);
        self
    }

    /// Sets the strategy explicitly.
    pub fn strategy(mut self, strategy: QuantizationStrategy) -> Self {
        self.fields.strategy = Some(strategy);
        self
    }

    /// Sets the block structure for BLOCK.
    pub fn block_structure(mut self, rows: usize, cols: usize) -> Self {
        self.fields.block_structure = Some([rows, cols]);
        self
    }

    /// Sets the dynamic behavior.
    pub fn dynamic(mut self, dynamic: DynamicType) -> Self {
        self.fields.dynamic = dynamic;
        self
    }

    /// Sets activation ordering.
    pub fn actorder(mut self, actorder: ActivationOrdering) -> Self {
        self.fields.actorder = Some(actorder);
        self
    }

    /// Sets the observer name.
    pub fn observer(mut self, observer: impl Into<String>) -> Self {
        self.fields.observer = Some(observer.into());
        self
    }

    /// Adds one observer constructor argument.
    pub fn observer_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.observer_kwargs.insert(key.into(), value);
        self
    }

    /// Validates and builds.
    pub fn build(self) -> QuantResult<QuantizationArgs> {
        self.build_with(&mut Diagnostics::new())
    }

    /// Validates and builds, recording warnings into `diagnostics`.
    pub fn build_with(self, diagnostics: &mut Diagnostics) -> QuantResult<QuantizationArgs> {
        if let Some([rows, cols]) = self.fields.block_structure {
            if rows == 0 || cols == 0 {
                return Err(QuantError::invalid_field(
                    "block_structure",
                    format!("[{rows}, {cols}]"),
                    "must be two positive integers [rows, cols]",
                ));
            }
        }
        check_group_size(self.fields.group_size)?;
        normalize(self.fields, diagnostics)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_inferred_from_group_size() {
        let tensor = QuantizationArgs::builder().build().unwrap();
        assert_eq!(tensor.strategy(), QuantizationStrategy::Tensor);

        let channel = QuantizationArgs::builder().group_size(-1).build().unwrap();
        assert_eq!(channel.strategy(), QuantizationStrategy::Channel);

        let group = QuantizationArgs::builder().group_size(64).build().unwrap();
        assert_eq!(group.strategy(), QuantizationStrategy::Group);
        assert_eq!(group.positive_group_size(), Some(64));
    }

    #[test]
    fn test_group_strategy_requires_group_size() {
        let err = QuantizationArgs::builder()
            .strategy(QuantizationStrategy::Group)
            .build()
            .unwrap_err();
        assert!(matches!(err, QuantError::InvalidField { field: "group_size", .. }));

        assert!(QuantizationArgs::builder()
            .strategy(QuantizationStrategy::TensorGroup)
            .build()
            .is_err());
    }

    #[test]
    fn test_group_size_rejected_outside_group() {
        assert!(QuantizationArgs::builder()
            .strategy(QuantizationStrategy::Channel)
            .group_size(128)
            .build()
            .is_err());
        assert!(QuantizationArgs::builder().group_size(-2).build().is_err());
        assert!(QuantizationArgs::builder().group_size(0).build().is_err());
    }

    #[test]
    fn test_actorder_requires_group() {
        let err = QuantizationArgs::builder()
            .strategy(QuantizationStrategy::Tensor)
            .actorder(ActivationOrdering::Group)
            .build()
            .unwrap_err();
        assert!(matches!(err, QuantError::InvalidField { field: "actorder", .. }));

        let ok = QuantizationArgs::builder()
            .group_size(128)
            .actorder(ActivationOrdering::Weight)
            .build()
            .unwrap();
        assert_eq!(ok.actorder(), Some(ActivationOrdering::Weight));
    }

    #[test]
    fn test_dynamic_strategy_rules() {
        assert!(QuantizationArgs::builder()
            .strategy(QuantizationStrategy::Channel)
            .dynamic(DynamicType::Dynamic)
            .build()
            .is_err());

        let token = QuantizationArgs::builder()
            .strategy(QuantizationStrategy::Token)
            .dynamic(DynamicType::Dynamic)
            .build()
            .unwrap();
        assert_eq!(token.observer(), None);
    }

    #[test]
    fn test_local_dynamic_requires_tensor_group() {
        assert!(QuantizationArgs::builder()
            .group_size(16)
            .dynamic(DynamicType::Local)
            .build()
            .is_err());

        let local = QuantizationArgs::builder()
            .strategy(QuantizationStrategy::TensorGroup)
            .group_size(16)
            .dynamic(DynamicType::Local)
            .build()
            .unwrap();
        assert_eq!(local.observer(), Some(DEFAULT_OBSERVER));
        assert!(local.dynamic().is_dynamic());
        assert!(!local.dynamic().is_fully_dynamic());
    }

    #[test]
    fn test_dynamic_observer_dropped_with_diagnostic() {
        let mut diags = Diagnostics::new();
        let args = QuantizationArgs::builder()
            .strategy(QuantizationStrategy::Token)
            .dynamic(DynamicType::Dynamic)
            .observer("mse")
            .build_with(&mut diags)
            .unwrap();
        assert_eq!(args.observer(), None);
        assert!(diags.contains(DiagnosticCode::DynamicObserverIgnored));

        let mut quiet = Diagnostics::new();
        let args = QuantizationArgs::builder()
            .strategy(QuantizationStrategy::Token)
            .dynamic(DynamicType::Dynamic)
            .observer(MEMORYLESS_OBSERVER)
            .build_with(&mut quiet)
            .unwrap();
        assert_eq!(args.observer(), None);
        assert!(quiet.is_empty());
    }

    #[test]
    fn test_explicit_observer_kept_for_static() {
        let args = QuantizationArgs::builder().observer("mse").build().unwrap();
        assert_eq!(args.observer(), Some("mse"));
    }

    #[test]
    fn test_block_structure_parsing() {
        let compact = RawBlockStructure::Compact("128x64".to_string());
        assert_eq!(parse_block_structure(&compact).unwrap(), [128, 64]);

        let pair = RawBlockStructure::Pair(vec![2, 4]);
        assert_eq!(parse_block_structure(&pair).unwrap(), [2, 4]);

        for bad in ["128x", "1x2x3", "0x4", "axb"] {
            let raw = RawBlockStructure::Compact(bad.to_string());
            assert!(parse_block_structure(&raw).is_err(), "{bad} should fail");
        }
        assert!(parse_block_structure(&RawBlockStructure::Pair(vec![128])).is_err());
        assert!(QuantizationArgs::builder().block_structure(0, 4).build().is_err());
    }

    #[test]
    fn test_string_coercion_is_case_insensitive() {
        assert_eq!("FLOAT".parse::<QuantizationType>().unwrap(), QuantizationType::Float);
        assert_eq!(
            "Tensor_Group".parse::<QuantizationStrategy>().unwrap(),
            QuantizationStrategy::TensorGroup
        );
        assert_eq!("LOCAL".parse::<DynamicType>().unwrap(), DynamicType::Local);
        assert!("bogus".parse::<QuantizationStrategy>().is_err());
    }

    #[test]
    fn test_actorder_aliases() {
        assert_eq!("dynamic".parse::<ActivationOrdering>().unwrap(), ActivationOrdering::Group);
        assert_eq!("Static".parse::<ActivationOrdering>().unwrap(), ActivationOrdering::Weight);

        let raw = RawQuantizationArgs {
            group_size: Some(128),
            actorder: Some(FlagOrName::Flag(true)),
            ..RawQuantizationArgs::default()
        };
        let args = QuantizationArgs::try_from(raw).unwrap();
        assert_eq!(args.actorder(), Some(ActivationOrdering::Group));

        let raw = RawQuantizationArgs {
            actorder: Some(FlagOrName::Flag(false)),
            ..RawQuantizationArgs::default()
        };
        assert_eq!(QuantizationArgs::try_from(raw).unwrap().actorder(), None);
    }

    #[test]
    fn test_deserialize_validates() {
        let args: QuantizationArgs = serde_json::from_str(
            r#"{"num_bits": 4, "type": "INT", "group_size": 128, "actorder": "static"}"#,
        )
        .unwrap();
        assert_eq!(args.strategy(), QuantizationStrategy::Group);
        assert_eq!(args.actorder(), Some(ActivationOrdering::Weight));
        assert_eq!(args.observer(), Some(DEFAULT_OBSERVER));

        let local: QuantizationArgs = serde_json::from_str(
            r#"{"num_bits": 4, "type": "float", "strategy": "tensor_group", "group_size": 16, "dynamic": "local"}"#,
        )
        .unwrap();
        assert_eq!(local.dynamic(), DynamicType::Local);

        let bad = serde_json::from_str::<QuantizationArgs>(r#"{"strategy": "group"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_serialize_is_canonical() {
        let args = QuantizationArgs::builder()
            .strategy(QuantizationStrategy::Block)
            .block_structure(128, 128)
            .quant_type(QuantizationType::Float)
            .observer_kwarg("averaging_constant", serde_json::json!(0.01))
            .build()
            .unwrap();
        let json = serde_json::to_value(&args).unwrap();
        assert_eq!(json["type"], "float");
        assert_eq!(json["strategy"], "block");
        assert_eq!(json["block_structure"], serde_json::json!([128, 128]));
        assert_eq!(json["dynamic"], false);

        let back: QuantizationArgs = serde_json::from_value(json).unwrap();
        assert_eq!(back, args);
    }

    #[test]
    fn test_storage_dtype() {
        let int = |bits| {
            QuantizationArgs::builder()
                .num_bits(bits)
                .build()
                .unwrap()
                .storage_dtype()
                .unwrap()
        };
        assert_eq!(int(4), DType::I8);
        assert_eq!(int(8), DType::I8);
        assert_eq!(int(12), DType::I16);
        assert_eq!(int(32), DType::I32);

        let fp8 = QuantizationArgs::builder()
            .quant_type(QuantizationType::Float)
            .build()
            .unwrap();
        assert_eq!(fp8.storage_dtype().unwrap(), DType::F8E4M3);

        let fp4 = QuantizationArgs::builder()
            .quant_type(QuantizationType::Float)
            .num_bits(4)
            .build()
            .unwrap();
        assert!(fp4.is_fp4());
        assert!(matches!(fp4.storage_dtype(), Err(QuantError::UnsupportedFormat(_))));
        assert_eq!(fp4.float_format().unwrap().max, 6.0);
    }

    #[test]
    fn test_default_matches_built_default() {
        assert_eq!(QuantizationArgs::default(), QuantizationArgs::builder().build().unwrap());
    }
}

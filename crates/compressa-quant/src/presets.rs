//! Preset Schemes - Named Quantization Templates
//!
//! A fixed, immutable registry from upper-case preset name to a template of
//! role arguments. Lookup is case-insensitive and every lookup builds fresh
//! arguments, so a preset is never altered by its users.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::args::{DynamicType, QuantizationArgs, QuantizationStrategy, QuantizationType};
use crate::error::{QuantError, QuantResult};
use crate::scheme::QuantizationScheme;

// =============================================================================
// Templates
// =============================================================================

/// Role arguments of a preset, before targets are bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresetTemplate {
    /// Weight arguments.
    pub weights: Option<QuantizationArgs>,
    /// Input activation arguments.
    pub input_activations: Option<QuantizationArgs>,
}

type TemplateFn = fn() -> QuantResult<PresetTemplate>;

const PRESET_SCHEMES: &[(&str, TemplateFn)] = &[
    ("UNQUANTIZED", unquantized),
    ("W8A16", w8a16),
    ("W4A16", w4a16),
    ("W4A16_ASYM", w4a16_asym),
    ("W8A8", int8_w8a8),
    ("INT8", int8_w8a8),
    ("W4A8", int8_w4a8),
    ("FP8", fp8),
    ("FP8_DYNAMIC", fp8_dynamic),
    ("FP8_BLOCK", fp8_block),
    ("NVFP4A16", nvfp4a16),
    ("NVFP4", nvfp4),
];

fn int(bits: u32) -> crate::args::QuantizationArgsBuilder {
    QuantizationArgs::builder()
        .num_bits(bits)
        .quant_type(QuantizationType::Int)
        .symmetric(true)
}

fn float(bits: u32) -> crate::args::QuantizationArgsBuilder {
    QuantizationArgs::builder()
        .num_bits(bits)
        .quant_type(QuantizationType::Float)
        .symmetric(true)
}

fn dynamic_token(builder: crate::args::QuantizationArgsBuilder) -> QuantResult<QuantizationArgs> {
    builder
        .strategy(QuantizationStrategy::Token)
        .dynamic(DynamicType::Dynamic)
        .build()
}

fn unquantized() -> QuantResult<PresetTemplate> {
    Ok(PresetTemplate::default())
}

fn w8a16() -> QuantResult<PresetTemplate> {
    Ok(PresetTemplate {
        weights: Some(int(8).strategy(QuantizationStrategy::Channel).build()?),
        input_activations: None,
    })
}

fn w4a16() -> QuantResult<PresetTemplate> {
    Ok(PresetTemplate {
        weights: Some(
            int(4)
                .strategy(QuantizationStrategy::Group)
                .group_size(128)
                .build()?,
        ),
        input_activations: None,
    })
}

fn w4a16_asym() -> QuantResult<PresetTemplate> {
    Ok(PresetTemplate {
        weights: Some(
            int(4)
                .strategy(QuantizationStrategy::Group)
                .group_size(128)
                .symmetric(false)
                .build()?,
        ),
        input_activations: None,
    })
}

fn int8_w8a8() -> QuantResult<PresetTemplate> {
    Ok(PresetTemplate {
        weights: Some(int(8).strategy(QuantizationStrategy::Channel).build()?),
        input_activations: Some(dynamic_token(int(8))?),
    })
}

fn int8_w4a8() -> QuantResult<PresetTemplate> {
    Ok(PresetTemplate {
        weights: Some(
            int(4)
                .strategy(QuantizationStrategy::Group)
                .group_size(128)
                .build()?,
        ),
        input_activations: Some(dynamic_token(int(8))?),
    })
}

fn fp8() -> QuantResult<PresetTemplate> {
    Ok(PresetTemplate {
        weights: Some(float(8).strategy(QuantizationStrategy::Tensor).build()?),
        input_activations: Some(float(8).strategy(QuantizationStrategy::Tensor).build()?),
    })
}

fn fp8_dynamic() -> QuantResult<PresetTemplate> {
    Ok(PresetTemplate {
        weights: Some(float(8).strategy(QuantizationStrategy::Channel).build()?),
        input_activations: Some(dynamic_token(float(8))?),
    })
}

/// Static 128x128 block weights with dynamic per-token-group activations.
fn fp8_block() -> QuantResult<PresetTemplate> {
    Ok(PresetTemplate {
        weights: Some(
            float(8)
                .strategy(QuantizationStrategy::Block)
                .block_structure(128, 128)
                .build()?,
        ),
        input_activations: Some(
            float(8)
                .strategy(QuantizationStrategy::Group)
                .group_size(128)
                .dynamic(DynamicType::Dynamic)
                .build()?,
        ),
    })
}

fn nvfp4_weights() -> QuantResult<QuantizationArgs> {
    float(4)
        .strategy(QuantizationStrategy::TensorGroup)
        .group_size(16)
        .build()
}

fn nvfp4a16() -> QuantResult<PresetTemplate> {
    Ok(PresetTemplate {
        weights: Some(nvfp4_weights()?),
        input_activations: None,
    })
}

fn nvfp4() -> QuantResult<PresetTemplate> {
    Ok(PresetTemplate {
        weights: Some(nvfp4_weights()?),
        input_activations: Some(
            float(4)
                .strategy(QuantizationStrategy::TensorGroup)
                .group_size(16)
                .dynamic(DynamicType::Local)
                .build()?,
        ),
    })
}

// =============================================================================
// Lookup
// =============================================================================

/// Registered preset names in registry order.
pub fn preset_names() -> Vec<&'static str> {
    PRESET_SCHEMES.iter().map(|(name, _)| *name).collect()
}

/// True if `name` (any case) is a registered preset.
pub fn is_preset_scheme(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    PRESET_SCHEMES.iter().any(|(preset, _)| *preset == upper)
}

/// Returns a fresh template for a preset name (any case).
pub fn preset_template(name: &str) -> QuantResult<PresetTemplate> {
    let upper = name.to_ascii_uppercase();
    match PRESET_SCHEMES.iter().find(|(preset, _)| *preset == upper) {
        Some((_, template)) => template(),
        None => Err(QuantError::UnknownPreset {
            name: upper,
            available: preset_names(),
        }),
    }
}

/// Builds the scheme for a preset name (any case), bound to `targets`.
pub fn preset_name_to_scheme<I, S>(name: &str, targets: I) -> QuantResult<QuantizationScheme>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let template = preset_template(name)?;
    let mut builder = QuantizationScheme::builder(targets);
    if let Some(weights) = template.weights {
        builder = builder.weights(weights);
    }
    if let Some(inputs) = template.input_activations {
        builder = builder.input_activations(inputs);
    }
    builder.build()
}

// =============================================================================
// Tests
// =============================================================================

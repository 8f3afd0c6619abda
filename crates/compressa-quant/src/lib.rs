//! Compressa Quant - Quantization Configuration and Initialization
//!
//! Validates declarative quantization settings and turns them into concrete,
//! correctly shaped parameters attached to layers:
//!
//! - **QuantizationArgs**: per-role settings with self-normalizing validation
//! - **QuantizationScheme**: weights / input / output roles for a target set
//! - **Presets**: W8A16, W4A16, W8A8, FP8, FP8_BLOCK, NVFP4 and more
//! - **Initialization**: scale, zero point, global scale and g_idx allocation
//!
//! # Example
//! ```rust
//! use compressa_nn::{Linear, Module};
//! use compressa_quant::prelude::*;
//!
//! let mut linear = Linear::new(2048, 512);
//! let scheme = preset_name_to_scheme("w4a16", ["Linear"]).unwrap();
//! let options = InitializeOptions::default();
//! let diagnostics =
//!     initialize_module_for_quantization(&mut linear, Some(&scheme), &options).unwrap();
//! assert!(diagnostics.is_empty());
//! assert_eq!(linear.get_parameter("weight_scale").unwrap().shape(), vec![512, 16]);
//! ```
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod args;
pub mod diagnostics;
pub mod error;
pub mod float;
pub mod lifecycle;
pub mod presets;
pub mod scheme;
pub mod status;

pub use args::{
    parse_block_structure, ActivationOrdering, DynamicType, FlagOrName, QuantizationArgs,
    QuantizationArgsBuilder, QuantizationStrategy, QuantizationType, RawBlockStructure,
    RawQuantizationArgs, DEFAULT_OBSERVER, MEMORYLESS_OBSERVER,
};
pub use diagnostics::{Diagnostic, DiagnosticCode, Diagnostics, Severity};
pub use error::{QuantError, QuantResult};
pub use float::{cast_to_fp4, round_to_quantized_type, FloatFormat, FP4_E2M1, FP8_E4M3};
pub use lifecycle::{
    infer_scale_shape, initialize_module_for_quantization,
    initialize_module_for_quantization_with, is_attention_module, is_forward_wrapped,
    resolve_scale_dtypes, ForwardWrapped, ForwardWrapper, InitializeOptions, KvCacheScaleType,
    MarkForwardWrapped, QuantizationRole,
};
pub use presets::{
    is_preset_scheme, preset_name_to_scheme, preset_names, preset_template, PresetTemplate,
};
pub use scheme::{
    is_kv_cache_quant_scheme, QuantizationScheme, QuantizationSchemeBuilder,
    RawQuantizationScheme, KV_CACHE_TARGETS,
};
pub use status::{
    quantization_scheme, quantization_status, set_quantization_scheme, QuantizationStatus,
};

// =============================================================================
// Prelude
// =============================================================================

/// Common imports for configuring and initializing quantization.
pub mod prelude {
    pub use crate::args::{
        ActivationOrdering, DynamicType, QuantizationArgs, QuantizationStrategy, QuantizationType,
    };
    pub use crate::diagnostics::{DiagnosticCode, Diagnostics};
    pub use crate::error::{QuantError, QuantResult};
    pub use crate::lifecycle::{
        initialize_module_for_quantization, InitializeOptions, QuantizationRole,
    };
    pub use crate::presets::{is_preset_scheme, preset_name_to_scheme};
    pub use crate::scheme::QuantizationScheme;
    pub use crate::status::QuantizationStatus;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_covers_common_flow() {
        use crate::prelude::*;
        let scheme = preset_name_to_scheme("fp8_dynamic", ["Linear"]).unwrap();
        assert_eq!(
            scheme.weights().map(QuantizationArgs::strategy),
            Some(QuantizationStrategy::Channel)
        );
        assert!(is_preset_scheme("FP8_DYNAMIC"));
        assert_eq!(DEFAULT_OBSERVER, "minmax");
    }
}

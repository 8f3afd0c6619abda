//! Lifecycle - Module Initialization for Quantization
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

pub mod forward;
pub mod initialize;

pub use forward::{is_forward_wrapped, ForwardWrapped, ForwardWrapper, MarkForwardWrapped};
pub use initialize::{
    infer_scale_shape, initialize_module_for_quantization,
    initialize_module_for_quantization_with, is_attention_module, resolve_scale_dtypes,
    InitializeOptions, KvCacheScaleType, QuantizationRole, FALLBACK_SCALE_DTYPE,
    GLOBAL_SCALE_DTYPE, G_IDX_DTYPE, SCALE_DTYPES,
};

//! compressa-nn - Layer Abstraction for Quantization and Transforms
//!
//! Provides the layers that quantization initialization and Hadamard
//! transforms operate on, together with the collaborators they rely on:
//! parameter registration, execution/offload placement, and typed
//! per-layer extension slots.
//!
//! # Key Components
//!
//! - **Module trait**: forward pass, parameter enumeration and registration
//! - **ModuleCapabilities**: static descriptor of what a layer offers
//! - **Parameter**: shared, named tensor handle
//! - **Placement**: execution vs. offload device, `register_offload_parameter`
//! - **Layers**: Linear, Embedding, LayerNorm, Dropout, SelfAttention
//!
//! # Example
//!
//! ```rust
//! use compressa_nn::prelude::*;
//!
//! let linear = Linear::new(16, 8);
//! assert_eq!(linear.weight_shape(), Some((8, 16)));
//! assert!(linear.capabilities().matrix_weight);
//! ```
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// ML/tensor-specific allowances
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::ptr_arg)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::not_unsafe_ptr_arg_deref)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::if_same_then_else)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::trivially_copy_pass_by_ref)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::unused_self)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::single_match_else)]
#![allow(clippy::fn_params_excessive_bools)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::format_push_string)]
#![allow(clippy::erasing_op)]
#![allow(clippy::type_repetition_in_bounds)]
#![allow(clippy::iter_without_into_iter)]
#![allow(clippy::should_implement_trait)]
#![allow(clippy::use_debug)]
#![allow(clippy::case_sensitive_file_extension_comparisons)]
#![allow(clippy::large_enum_variant)]
#![allow(clippy::panic)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::assigning_clones)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::explicit_iter_loop)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::only_used_in_recursion)]
#![allow(clippy::manual_clamp)]
#![allow(clippy::ref_option)]
#![allow(clippy::multiple_bound_locations)]
#![allow(clippy::comparison_chain)]
#![allow(clippy::manual_assert)]
#![allow(clippy::unnecessary_debug_formatting)]

// =============================================================================
// Modules
// =============================================================================

pub mod init;
pub mod layers;
pub mod module;
pub mod parameter;
pub mod placement;
pub mod state;

// =============================================================================
// Re-exports
// =============================================================================

pub use layers::{Dropout, Embedding, LayerNorm, Linear, SelfAttention};
pub use module::{AttentionCapability, Module, ModuleCapabilities, ModuleKind};
pub use parameter::Parameter;
pub use placement::{
    get_execution_device, get_offloaded_device, register_offload_parameter, Placement,
};
pub use state::{Extensions, ModuleState, ParameterStore};

// =============================================================================
// Prelude
// =============================================================================

/// Common imports for building and inspecting layers.
pub mod prelude {
    pub use crate::layers::{Dropout, Embedding, LayerNorm, Linear, SelfAttention};
    pub use crate::module::{AttentionCapability, Module, ModuleCapabilities, ModuleKind};
    pub use crate::parameter::Parameter;
    pub use crate::placement::{register_offload_parameter, Placement};
    pub use crate::state::ModuleState;
    pub use compressa_core::{DType, Device};
    pub use compressa_tensor::Tensor;
}

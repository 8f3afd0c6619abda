//! Initialization - Attaching Quantization Parameters to Modules
//!
//! Given a module and a resolved [`QuantizationScheme`], infers the storage
//! shape and dtype of every auxiliary quantization parameter (scale, zero
//! point, global scale, group index), allocates it on the module's execution
//! device and registers it through the offload-aware collaborator. Attention
//! modules only receive key/value cache scales.
//!
//! # Example
//!
//! ```rust
//! use compressa_nn::{Linear, Module};
//! use compressa_quant::{
//!     initialize_module_for_quantization, preset_name_to_scheme, InitializeOptions,
//! };
//!
//! let mut linear = Linear::new(256, 64);
//! let scheme = preset_name_to_scheme("W4A16", ["Linear"]).unwrap();
//! let options = InitializeOptions::default();
//! initialize_module_for_quantization(&mut linear, Some(&scheme), &options).unwrap();
//! assert_eq!(linear.get_parameter("weight_scale").unwrap().shape(), vec![64, 2]);
//! ```
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use std::fmt;

use compressa_core::{DType, Device};
use compressa_nn::{get_execution_device, register_offload_parameter, Module, Parameter};
use compressa_tensor::Tensor;

use crate::args::{ActivationOrdering, QuantizationArgs, QuantizationStrategy};
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::error::{QuantError, QuantResult};
use crate::lifecycle::forward::{ForwardWrapper, MarkForwardWrapped};
use crate::scheme::{is_kv_cache_quant_scheme, QuantizationScheme};
use crate::status::{quantization_scheme, QuantizationStatus};

/// Float dtypes accepted for scales.
pub const SCALE_DTYPES: [DType; 4] = [DType::F16, DType::BF16, DType::F32, DType::F64];

/// Scale dtype used when the requested one is not in [`SCALE_DTYPES`].
pub const FALLBACK_SCALE_DTYPE: DType = DType::F16;

/// Dtype of the per-tensor global scale.
pub const GLOBAL_SCALE_DTYPE: DType = DType::F32;

/// Dtype of the group index.
pub const G_IDX_DTYPE: DType = DType::I32;

// =============================================================================
// Roles and Options
// =============================================================================

/// Tensor role a set of quantization arguments applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantizationRole {
    /// Layer weights.
    Weight,
    /// Input activations.
    Input,
    /// Output activations.
    Output,
}

impl QuantizationRole {
    /// Prefix used for this role's parameter names.
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Weight => "weight",
            Self::Input => "input",
            Self::Output => "output",
        }
    }

    /// Full parameter name, e.g. `weight_scale`.
    pub fn param_name(self, suffix: &str) -> String {
        format!("{}_{suffix}", self.prefix())
    }
}

impl fmt::Display for QuantizationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Key/value cache scale parameter names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KvCacheScaleType {
    /// `k_scale`.
    Key,
    /// `v_scale`.
    Value,
}

impl KvCacheScaleType {
    /// Parameter name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Key => "k_scale",
            Self::Value => "v_scale",
        }
    }
}

/// Options for [`initialize_module_for_quantization`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitializeOptions {
    /// Allocate a zero point even for symmetric quantization.
    pub force_zero_point: bool,
    /// Scale dtype overriding the module's weight dtype.
    pub scale_dtype: Option<DType>,
}

impl Default for InitializeOptions {
    fn default() -> Self {
        Self {
            force_zero_point: true,
            scale_dtype: None,
        }
    }
}

// =============================================================================
// Shape and Dtype Inference
// =============================================================================

/// Returns true for attention modules exposing key, value or qkv projections.
pub fn is_attention_module(module: &dyn Module) -> bool {
    module.capabilities().attention.has_kv_projection()
}

/// Infers the scale and zero-point shape for one role.
///
/// `weight_shape` is the `(out, in)` shape of a matrix weight; it is only
/// consulted for the weight role. Ragged blocks and BLOCK on anything other
/// than a matrix weight are recorded in `diagnostics`.
pub fn infer_scale_shape(
    role: QuantizationRole,
    args: &QuantizationArgs,
    weight_shape: Option<(usize, usize)>,
    diagnostics: &mut Diagnostics,
) -> QuantResult<Vec<usize>> {
    let strategy = args.strategy();
    if strategy == QuantizationStrategy::Token {
        return Ok(vec![1, 1]);
    }

    match (role, weight_shape) {
        (QuantizationRole::Weight, Some((rows, cols))) => match strategy {
            QuantizationStrategy::Channel => Ok(vec![rows, 1]),
            QuantizationStrategy::Group | QuantizationStrategy::TensorGroup => {
                let group_size = args.positive_group_size().ok_or_else(|| {
                    QuantError::invalid_field(
                        "group_size",
                        format!("{:?}", args.group_size()),
                        format!("strategy '{strategy}' requires a positive group_size"),
                    )
                })?;
                Ok(vec![rows, cols.div_ceil(group_size).max(1)])
            }
            QuantizationStrategy::Block => {
                let [block_rows, block_cols] = args
                    .block_structure()
                    .ok_or(QuantError::MissingBlockStructure)?;
                if rows % block_rows != 0 || cols % block_cols != 0 {
                    diagnostics.warn(
                        DiagnosticCode::RaggedBlockDivision,
                        format!(
                            "weight shape ({rows}, {cols}) does not divide evenly by block structure \
                             [{block_rows}, {block_cols}]; trailing blocks are incomplete"
                        ),
                    );
                }
                Ok(vec![rows.div_ceil(block_rows), cols.div_ceil(block_cols)])
            }
            QuantizationStrategy::Tensor | QuantizationStrategy::Token => Ok(vec![1]),
        },
        _ if strategy == QuantizationStrategy::Block => {
            diagnostics.warn(
                DiagnosticCode::BlockActivationFallback,
                format!("BLOCK quantization not supported for {role}, falling back to per-tensor"),
            );
            Ok(vec![1])
        }
        _ => Ok(vec![1]),
    }
}

/// Resolves `(scale_dtype, zero_point_dtype)` for one role.
///
/// FP4 stores both in `F8E4M3`. Otherwise a requested scale dtype outside
/// [`SCALE_DTYPES`] falls back to [`FALLBACK_SCALE_DTYPE`] with a
/// diagnostic, and the zero point uses the quantized storage dtype.
pub fn resolve_scale_dtypes(
    args: &QuantizationArgs,
    requested: DType,
    diagnostics: &mut Diagnostics,
) -> QuantResult<(DType, DType)> {
    if args.is_fp4() {
        return Ok((DType::F8E4M3, DType::F8E4M3));
    }
    let scale_dtype = if SCALE_DTYPES.contains(&requested) {
        requested
    } else {
        diagnostics.warn(
            DiagnosticCode::UnsupportedScaleDtype,
            format!(
                "scale dtype {requested} is not a supported float type, \
                 using {FALLBACK_SCALE_DTYPE}"
            ),
        );
        FALLBACK_SCALE_DTYPE
    };
    Ok((scale_dtype, args.storage_dtype()?))
}

// =============================================================================
// Initialization
// =============================================================================

/// Attaches quantization parameters to `module` and stamps it as initialized.
///
/// When `scheme` is `None` the scheme already stamped on the module is used;
/// without either the call is a no-op. Returns the diagnostics recorded for
/// best-effort fallbacks.
pub fn initialize_module_for_quantization(
    module: &mut dyn Module,
    scheme: Option<&QuantizationScheme>,
    options: &InitializeOptions,
) -> QuantResult<Diagnostics> {
    initialize_module_for_quantization_with(module, scheme, options, &MarkForwardWrapped)
}

/// Same as [`initialize_module_for_quantization`] with a custom forward wrapper.
pub fn initialize_module_for_quantization_with(
    module: &mut dyn Module,
    scheme: Option<&QuantizationScheme>,
    options: &InitializeOptions,
    wrapper: &dyn ForwardWrapper,
) -> QuantResult<Diagnostics> {
    let mut diagnostics = Diagnostics::new();
    let Some(scheme) = scheme
        .cloned()
        .or_else(|| quantization_scheme(&*module).cloned())
    else {
        return Ok(diagnostics);
    };

    if is_attention_module(module) {
        initialize_attention_scales(module)?;
        return Ok(diagnostics);
    }

    // Every role is resolved before anything is attached, so a failing
    // role leaves the module untouched.
    let mut plans = Vec::with_capacity(3);
    if let Some(weights) = scheme.weights() {
        if module.weight().is_some() {
            let weight_shape = module.weight_shape();
            plans.extend(plan_scale_zero_point(
                &*module,
                QuantizationRole::Weight,
                weights,
                weight_shape,
                options,
                &mut diagnostics,
            )?);
        } else {
            diagnostics.warn(
                DiagnosticCode::MissingWeight,
                format!(
                    "module type {} targeted for weight quantization but has no weight, \
                     skipping weight quantization",
                    module.name()
                ),
            );
        }
    }

    if let Some(inputs) = scheme.input_activations() {
        plans.extend(plan_scale_zero_point(
            &*module,
            QuantizationRole::Input,
            inputs,
            None,
            options,
            &mut diagnostics,
        )?);
    }

    if let Some(outputs) = scheme.output_activations() {
        if !is_kv_cache_quant_scheme(&scheme) {
            plans.extend(plan_scale_zero_point(
                &*module,
                QuantizationRole::Output,
                outputs,
                None,
                options,
                &mut diagnostics,
            )?);
        }
    }

    for plan in plans {
        plan.register(module);
    }

    tracing::debug!(
        module = module.name(),
        parameters = module.state().parameters.len(),
        "initialized module for quantization"
    );
    module.extensions_mut().insert(QuantizationStatus::Initialized);
    module.extensions_mut().insert(scheme.clone());
    wrapper.wrap(module, &scheme)?;

    Ok(diagnostics)
}

fn register_empty(module: &mut dyn Module, name: &str, tensor: Tensor) {
    register_offload_parameter(module, name, Parameter::new(tensor, false));
}

/// Parameters resolved for one role, ready to attach.
#[derive(Debug)]
struct RolePlan {
    role: QuantizationRole,
    device: Device,
    shape: Vec<usize>,
    scale_dtype: Option<DType>,
    zero_point_dtype: Option<DType>,
    global_scale: bool,
    g_idx_len: Option<usize>,
}

impl RolePlan {
    fn register(self, module: &mut dyn Module) {
        let role = self.role;
        if self.global_scale {
            register_empty(
                module,
                &role.param_name("global_scale"),
                Tensor::empty(&[1], GLOBAL_SCALE_DTYPE, self.device),
            );
        }
        if let Some(dtype) = self.scale_dtype {
            register_empty(
                module,
                &role.param_name("scale"),
                Tensor::empty(&self.shape, dtype, self.device),
            );
        }
        if let Some(dtype) = self.zero_point_dtype {
            register_empty(
                module,
                &role.param_name("zero_point"),
                Tensor::zeros(&self.shape, dtype, self.device),
            );
        }
        if let Some(cols) = self.g_idx_len {
            register_empty(
                module,
                &role.param_name("g_idx"),
                Tensor::full(&[cols], -1.0, G_IDX_DTYPE, self.device),
            );
        }
    }
}

fn plan_scale_zero_point(
    module: &dyn Module,
    role: QuantizationRole,
    args: &QuantizationArgs,
    weight_shape: Option<(usize, usize)>,
    options: &InitializeOptions,
    diagnostics: &mut Diagnostics,
) -> QuantResult<Option<RolePlan>> {
    if args.dynamic().is_fully_dynamic() {
        return Ok(None);
    }

    let shape = infer_scale_shape(role, args, weight_shape, diagnostics)?;
    let requested = options
        .scale_dtype
        .or_else(|| module.weight().map(|w| w.dtype()))
        .unwrap_or_else(DType::default_float);
    let (scale_dtype, zp_dtype) = resolve_scale_dtypes(args, requested, diagnostics)?;

    let g_idx_len = if args.actorder() == Some(ActivationOrdering::Group) {
        let (_, cols) = weight_shape.ok_or_else(|| QuantError::MissingWeightShape {
            module: module.name(),
            what: role.param_name("g_idx"),
        })?;
        Some(cols)
    } else {
        None
    };

    Ok(Some(RolePlan {
        role,
        device: get_execution_device(module),
        shape,
        // LOCAL keeps only the global scale static
        scale_dtype: (!args.dynamic().is_dynamic()).then_some(scale_dtype),
        zero_point_dtype: (options.force_zero_point || !args.symmetric()).then_some(zp_dtype),
        global_scale: args.strategy() == QuantizationStrategy::TensorGroup,
        g_idx_len,
    }))
}

fn initialize_attention_scales(module: &mut dyn Module) -> QuantResult<()> {
    let reference = module
        .parameters()
        .into_iter()
        .next()
        .ok_or(QuantError::MissingParameter(module.name()))?;
    let (dtype, device) = (reference.dtype(), reference.device());

    for kind in [KvCacheScaleType::Key, KvCacheScaleType::Value] {
        register_empty(module, kind.name(), Tensor::empty(&[1], dtype, device));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

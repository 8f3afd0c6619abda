//! Module Trait - Layer Interface and Capability Descriptors
//!
//! Defines the `Module` trait every layer implements. Besides the forward
//! pass and parameter enumeration, each layer type declares a static
//! [`ModuleCapabilities`] descriptor so that quantization and transform code
//! can dispatch on what a layer *is* (weight-bearing, matrix-shaped weight,
//! attention-like with key/value projections) without inspecting names.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use compressa_core::Result;
use compressa_tensor::Tensor;

use crate::parameter::Parameter;
use crate::placement::Placement;
use crate::state::{Extensions, ModuleState};

// =============================================================================
// Capabilities
// =============================================================================

/// Broad layer family, used where application rules differ per layer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// Fully connected layer, weight is `(out_features, in_features)`.
    Linear,
    /// Lookup table, weight is `(num_embeddings, embedding_dim)`.
    Embedding,
    /// Attention block built from projection sub-layers.
    Attention,
    /// Normalization layer.
    Norm,
    /// Anything else.
    Other,
}

/// Attention-related capabilities of a layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttentionCapability {
    /// The layer belongs to the attention family.
    pub attention_like: bool,
    /// A separate key projection is present.
    pub has_k_proj: bool,
    /// A separate value projection is present.
    pub has_v_proj: bool,
    /// A fused query/key/value projection is present.
    pub has_qkv_proj: bool,
}

impl AttentionCapability {
    /// Returns true if the layer is attention-like and exposes a key, value
    /// or fused qkv projection.
    pub const fn has_kv_projection(&self) -> bool {
        self.attention_like && (self.has_k_proj || self.has_v_proj || self.has_qkv_proj)
    }
}

/// Static description of what a layer offers to quantization and transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleCapabilities {
    /// Layer family.
    pub kind: ModuleKind,
    /// The layer owns a parameter named `weight`.
    pub has_weight: bool,
    /// The weight's first two dimensions are `(out_features, in_features)`.
    pub matrix_weight: bool,
    /// Attention capabilities.
    pub attention: AttentionCapability,
}

impl ModuleCapabilities {
    /// Capabilities of a layer with no parameters of interest.
    pub const fn plain(kind: ModuleKind) -> Self {
        Self {
            kind,
            has_weight: false,
            matrix_weight: false,
            attention: AttentionCapability {
                attention_like: false,
                has_k_proj: false,
                has_v_proj: false,
                has_qkv_proj: false,
            },
        }
    }

    /// Capabilities of a weight-bearing layer.
    pub const fn weighted(kind: ModuleKind, matrix_weight: bool) -> Self {
        let mut caps = Self::plain(kind);
        caps.has_weight = true;
        caps.matrix_weight = matrix_weight;
        caps
    }
}

// =============================================================================
// Module Trait
// =============================================================================

/// Core trait for all layers.
///
/// Implementors provide their capability descriptor and access to a
/// [`ModuleState`]; parameter enumeration, registration and placement are
/// provided on top of that.
pub trait Module: Send + Sync {
    /// Performs the forward pass.
    fn forward(&self, input: &Tensor) -> Result<Tensor>;

    /// Returns the layer type name, e.g. `"Linear"`.
    fn name(&self) -> &'static str;

    /// Returns the capability descriptor for this layer.
    fn capabilities(&self) -> ModuleCapabilities;

    /// Returns the layer's own state.
    fn state(&self) -> &ModuleState;

    /// Returns the layer's own state mutably.
    fn state_mut(&mut self) -> &mut ModuleState;

    /// Returns named child layers.
    fn children(&self) -> Vec<(&'static str, &dyn Module)> {
        Vec::new()
    }

    /// Returns all parameters, own parameters first, then each child's.
    fn parameters(&self) -> Vec<Parameter> {
        self.named_parameters().into_iter().map(|(_, p)| p).collect()
    }

    /// Returns all parameters with dotted names relative to this layer.
    fn named_parameters(&self) -> Vec<(String, Parameter)> {
        let mut params: Vec<(String, Parameter)> = self
            .state()
            .parameters
            .iter()
            .map(|(name, p)| (name.to_string(), p.clone()))
            .collect();
        for (child_name, child) in self.children() {
            for (name, param) in child.named_parameters() {
                params.push((format!("{child_name}.{name}"), param));
            }
        }
        params
    }

    /// Looks up one of this layer's own parameters by name.
    fn get_parameter(&self, name: &str) -> Option<Parameter> {
        self.state().parameters.get(name).cloned()
    }

    /// Attaches a parameter under `name`, returning any parameter it replaced.
    fn register_parameter(&mut self, name: &str, mut param: Parameter) -> Option<Parameter> {
        param.set_name(name);
        self.state_mut().parameters.insert(name, param)
    }

    /// Returns the `weight` parameter if the layer declares and holds one.
    fn weight(&self) -> Option<Parameter> {
        if self.capabilities().has_weight {
            self.get_parameter("weight")
        } else {
            None
        }
    }

    /// Returns the weight's `(rows, cols)` when the weight is a matrix.
    fn weight_shape(&self) -> Option<(usize, usize)> {
        if !self.capabilities().matrix_weight {
            return None;
        }
        match self.weight()?.shape().as_slice() {
            [rows, cols, ..] => Some((*rows, *cols)),
            _ => None,
        }
    }

    /// Returns the execution and offload placement of this layer.
    fn placement(&self) -> Placement {
        self.state().placement
    }

    /// Returns the typed extension slots of this layer.
    fn extensions(&self) -> &Extensions {
        &self.state().extensions
    }

    /// Returns the typed extension slots of this layer mutably.
    fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.state_mut().extensions
    }

    /// Returns the number of elements across all parameters.
    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(Parameter::numel).sum()
    }
}

// =============================================================================
// Tests
// =============================================================================

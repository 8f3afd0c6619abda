//! Module State - Parameter Store and Typed Extensions
//!
//! Every layer embeds a `ModuleState`: an insertion-ordered parameter store,
//! its placement, and a typed extension map where other crates stamp
//! per-layer metadata (quantization scheme, status, transform markers)
//! without the layer type knowing about them.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use std::any::{Any, TypeId};

use rustc_hash::FxHashMap;

use crate::parameter::Parameter;
use crate::placement::Placement;

// =============================================================================
// ParameterStore
// =============================================================================

/// Insertion-ordered map of a layer's own parameters.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    entries: Vec<(String, Parameter)>,
}

impl ParameterStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a parameter, returning the replaced one.
    pub fn insert(&mut self, name: &str, param: Parameter) -> Option<Parameter> {
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| n == name) {
            return Some(std::mem::replace(&mut slot.1, param));
        }
        self.entries.push((name.to_string(), param));
        None
    }

    /// Returns the parameter registered under `name`.
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, p)| p)
    }

    /// Returns true if a parameter is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Removes and returns the parameter registered under `name`.
    pub fn remove(&mut self, name: &str) -> Option<Parameter> {
        let idx = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(idx).1)
    }

    /// Iterates over `(name, parameter)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.entries.iter().map(|(n, p)| (n.as_str(), p))
    }

    /// Returns the registered names in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Returns the number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Extensions
// =============================================================================

/// Map holding at most one value per type.
#[derive(Default)]
pub struct Extensions {
    slots: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value, returning the previous value of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.slots
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok().map(|boxed| *boxed))
    }

    /// Returns the stored value of type `T`.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.slots
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    /// Returns the stored value of type `T` mutably.
    pub fn get_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.slots
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut::<T>())
    }

    /// Returns true if a value of type `T` is stored.
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.slots.contains_key(&TypeId::of::<T>())
    }

    /// Removes and returns the stored value of type `T`.
    pub fn remove<T: Any + Send + Sync>(&mut self) -> Option<T> {
        self.slots
            .remove(&TypeId::of::<T>())
            .and_then(|old| old.downcast::<T>().ok().map(|boxed| *boxed))
    }

    /// Returns the number of stored values.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.slots.len())
            .finish()
    }
}

// =============================================================================
// ModuleState
// =============================================================================

/// Per-layer state shared by all layer types.
#[derive(Debug, Default)]
pub struct ModuleState {
    /// The layer's own parameters.
    pub parameters: ParameterStore,
    /// Where the layer computes and where its idle storage lives.
    pub placement: Placement,
    /// Typed metadata attached by other crates.
    pub extensions: Extensions,
}

impl ModuleState {
    /// Creates state with the given placement.
    pub fn with_placement(placement: Placement) -> Self {
        Self {
            placement,
            ..Self::default()
        }
    }

    /// Changes placement and moves every own parameter to the offload device.
    pub fn set_placement(&mut self, placement: Placement) {
        self.placement = placement;
        for (_, param) in self.parameters.iter() {
            if param.device() != placement.offload {
                param.update_data(param.data().to_device(placement.offload));
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

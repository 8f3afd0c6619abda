//! Parameter - Shared Module Parameter Handle
//!
//! A `Parameter` is a named, reference-counted handle to a tensor that a
//! module owns. Clones share the same slot, so replacing the data through
//! one handle is visible through every other, and identity can be compared
//! with [`Parameter::ptr_eq`].
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use std::sync::Arc;

use compressa_core::{DType, Device};
use compressa_tensor::Tensor;
use parking_lot::RwLock;

// =============================================================================
// Parameter
// =============================================================================

/// A tensor registered on a module.
#[derive(Clone)]
pub struct Parameter {
    /// The underlying tensor slot.
    data: Arc<RwLock<Tensor>>,
    /// Parameter name (for debugging and lookup).
    name: String,
    /// Whether an optimizer may update this parameter.
    requires_grad: bool,
}

impl Parameter {
    /// Creates a new unnamed parameter from a tensor.
    pub fn new(data: Tensor, requires_grad: bool) -> Self {
        Self::named("", data, requires_grad)
    }

    /// Creates a new parameter with a name.
    pub fn named(name: impl Into<String>, data: Tensor, requires_grad: bool) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            name: name.into(),
            requires_grad,
        }
    }

    /// Returns the parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the parameter name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Returns a handle to the current tensor data (shares storage).
    pub fn data(&self) -> Tensor {
        self.data.read().clone()
    }

    /// Returns the shape of the parameter.
    pub fn shape(&self) -> Vec<usize> {
        self.data.read().shape().to_vec()
    }

    /// Returns the number of elements.
    pub fn numel(&self) -> usize {
        self.data.read().numel()
    }

    /// Returns the element dtype.
    pub fn dtype(&self) -> DType {
        self.data.read().dtype()
    }

    /// Returns the device holding the data.
    pub fn device(&self) -> Device {
        self.data.read().device()
    }

    /// Returns whether this parameter is trainable.
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Returns true if both handles refer to the same parameter slot.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Returns an identifier for the parameter slot, shared by all clones.
    ///
    /// Stable for as long as any handle to the slot is alive.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.data) as usize
    }

    /// Replaces the parameter data.
    pub fn update_data(&self, new_data: Tensor) {
        *self.data.write() = new_data;
    }

    /// Applies a function to the parameter data and stores the result.
    pub fn apply_update<F, E>(&self, f: F) -> Result<(), E>
    where
        F: FnOnce(&Tensor) -> Result<Tensor, E>,
    {
        let mut guard = self.data.write();
        let updated = f(&guard)?;
        *guard = updated;
        Ok(())
    }
}

impl std::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("shape", &self.shape())
            .field("dtype", &self.dtype())
            .field("device", &self.device())
            .field("requires_grad", &self.requires_grad)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_creation() {
        let data = Tensor::from_vec(vec![1.0f32, 2.0, 3.0], &[3]).unwrap();
        let param = Parameter::new(data, true);
        assert!(param.requires_grad());
        assert_eq!(param.shape(), vec![3]);
        assert_eq!(param.numel(), 3);
        assert_eq!(param.dtype(), DType::F32);
    }

    #[test]
    fn test_parameter_named() {
        let data = Tensor::zeros(&[2], DType::F16, Device::Cpu);
        let param = Parameter::named("weight", data, false);
        assert_eq!(param.name(), "weight");
        assert!(!param.requires_grad());
    }

    #[test]
    fn test_parameter_update_visible_through_clone() {
        let param = Parameter::new(Tensor::from_vec(vec![1.0f32, 2.0], &[2]).unwrap(), true);
        let alias = param.clone();
        param.update_data(Tensor::from_vec(vec![4.0f32, 5.0], &[2]).unwrap());

        assert!(param.ptr_eq(&alias));
        assert_eq!(alias.data().to_vec::<f32>().unwrap(), vec![4.0, 5.0]);
    }

    #[test]
    fn test_parameter_apply_update() {
        let param = Parameter::new(Tensor::from_vec(vec![1.0f32, 2.0, 3.0], &[3]).unwrap(), true);
        param
            .apply_update(|d| Ok::<_, ()>(d.mul_scalar(2.0)))
            .unwrap();
        assert_eq!(param.data().to_vec::<f32>().unwrap(), vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_distinct_parameters_not_ptr_eq() {
        let a = Parameter::new(Tensor::zeros(&[1], DType::F32, Device::Cpu), false);
        let b = Parameter::new(Tensor::zeros(&[1], DType::F32, Device::Cpu), false);
        assert!(!a.ptr_eq(&b));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a.clone().id());
    }
}

//! Placement - Execution and Offload Devices
//!
//! A layer computes on its execution device but may keep idle parameters on
//! a different offload device (typically CPU while computing on a GPU).
//! Newly attached parameters must follow the same rule, which is what
//! [`register_offload_parameter`] enforces.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use compressa_core::Device;

use crate::module::Module;
use crate::parameter::Parameter;

// =============================================================================
// Placement
// =============================================================================

/// Where a layer computes and where its idle storage lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Placement {
    /// Device that forward computation runs on.
    pub execution: Device,
    /// Device that parameters are kept on between calls.
    pub offload: Device,
}

impl Placement {
    /// Placement with computation and storage on the same device.
    pub const fn on(device: Device) -> Self {
        Self {
            execution: device,
            offload: device,
        }
    }

    /// Placement that computes on `execution` but stores on `offload`.
    pub const fn offloaded(execution: Device, offload: Device) -> Self {
        Self { execution, offload }
    }

    /// Returns true if idle storage lives on a different device.
    pub fn is_offloaded(&self) -> bool {
        self.execution != self.offload
    }
}

// =============================================================================
// Placement Collaborator
// =============================================================================

/// Returns the device a layer computes on.
pub fn get_execution_device(module: &dyn Module) -> Device {
    module.placement().execution
}

/// Returns the device a layer's idle parameters live on.
pub fn get_offloaded_device(module: &dyn Module) -> Device {
    module.placement().offload
}

/// Attaches `param` under `name`, moving its data to the offload device when
/// the layer is offloaded.
pub fn register_offload_parameter(module: &mut dyn Module, name: &str, param: Parameter) {
    let placement = module.placement();
    if placement.is_offloaded() && param.device() != placement.offload {
        param.update_data(param.data().to_device(placement.offload));
    }
    module.register_parameter(name, param);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::Linear;
    use compressa_core::DType;
    use compressa_tensor::Tensor;

    #[test]
    fn test_placement_constructors() {
        assert!(!Placement::on(Device::Cuda(0)).is_offloaded());
        let p = Placement::offloaded(Device::Cuda(0), Device::Cpu);
        assert!(p.is_offloaded());
        assert_eq!(Placement::default(), Placement::on(Device::Cpu));
    }

    #[test]
    fn test_register_offload_parameter_moves_data() {
        let mut linear = Linear::new(4, 2)
            .with_placement(Placement::offloaded(Device::Cuda(0), Device::Cpu));
        assert_eq!(get_execution_device(&linear), Device::Cuda(0));
        assert_eq!(get_offloaded_device(&linear), Device::Cpu);

        let scale = Tensor::empty(&[1], DType::F32, Device::Cuda(0));
        register_offload_parameter(&mut linear, "weight_scale", Parameter::new(scale, false));
        let stored = linear.get_parameter("weight_scale").unwrap();
        assert_eq!(stored.device(), Device::Cpu);
        assert_eq!(stored.name(), "weight_scale");
    }

    #[test]
    fn test_register_without_offload_keeps_device() {
        let mut linear = Linear::new(4, 2).with_placement(Placement::on(Device::Cuda(1)));
        let scale = Tensor::empty(&[1], DType::F32, Device::Cuda(1));
        register_offload_parameter(&mut linear, "input_scale", Parameter::new(scale, false));
        assert_eq!(
            linear.get_parameter("input_scale").unwrap().device(),
            Device::Cuda(1)
        );
    }
}

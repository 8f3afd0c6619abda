//! Device Abstraction - Parameter Placement Identifiers
//!
//! Identifies where a parameter's data lives. Compressa never launches
//! kernels itself; devices are placement tags that travel with storage so
//! that newly created parameters land next to the weights they describe and
//! cached transform matrices can be keyed by the device they were moved to.
//!
//! # Example
//! ```rust
//! use compressa_core::Device;
//!
//! let device = Device::default();
//! assert_eq!(device, Device::Cpu);
//! assert_eq!(Device::Cuda(1).to_string(), "cuda:1");
//! ```
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use core::fmt;

// =============================================================================
// Device Enum
// =============================================================================

/// A compute or storage location for tensor data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Device {
    /// Host memory.
    Cpu,
    /// NVIDIA CUDA GPU with device index.
    Cuda(usize),
    /// Apple Metal GPU with device index.
    Metal(usize),
}

impl Device {
    /// Returns true if this is a CPU device.
    #[must_use]
    pub const fn is_cpu(self) -> bool {
        matches!(self, Self::Cpu)
    }

    /// Returns true if this is a GPU device.
    #[must_use]
    pub const fn is_gpu(self) -> bool {
        !self.is_cpu()
    }

    /// Returns the device index for GPU devices, or 0 for CPU.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Cpu => 0,
            Self::Cuda(idx) | Self::Metal(idx) => idx,
        }
    }

    /// Returns the name of this device type.
    #[must_use]
    pub const fn device_type(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Cuda(_) => "cuda",
            Self::Metal(_) => "metal",
        }
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::Cpu
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(idx) => write!(f, "cuda:{idx}"),
            Self::Metal(idx) => write!(f, "metal:{idx}"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

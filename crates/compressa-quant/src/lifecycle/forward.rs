//! Forward Wrapping - Hand-Off to Call-Time Quantization
//!
//! Initialization ends by asking a [`ForwardWrapper`] to install call-time
//! behavior on the module. The default wrapper only records that the module
//! was wrapped and with which scheme.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use compressa_nn::Module;

use crate::error::QuantResult;
use crate::scheme::QuantizationScheme;

/// Installs call-time quantization behavior on a module.
pub trait ForwardWrapper {
    /// Wraps `module` so its forward pass honors `scheme`.
    fn wrap(&self, module: &mut dyn Module, scheme: &QuantizationScheme) -> QuantResult<()>;
}

/// Marker left on a module by [`MarkForwardWrapped`].
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardWrapped {
    /// Scheme the forward pass was wrapped with.
    pub scheme: QuantizationScheme,
}

/// Default wrapper: records a [`ForwardWrapped`] marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkForwardWrapped;

impl ForwardWrapper for MarkForwardWrapped {
    fn wrap(&self, module: &mut dyn Module, scheme: &QuantizationScheme) -> QuantResult<()> {
        module.extensions_mut().insert(ForwardWrapped {
            scheme: scheme.clone(),
        });
        Ok(())
    }
}

/// Returns true if the module carries a [`ForwardWrapped`] marker.
pub fn is_forward_wrapped(module: &dyn Module) -> bool {
    module.extensions().contains::<ForwardWrapped>()
}

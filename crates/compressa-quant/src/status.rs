//! Quantization Status - Module Lifecycle Marker
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use std::fmt;

use compressa_nn::Module;
use serde::{Deserialize, Serialize};

use crate::scheme::QuantizationScheme;

/// Lifecycle stage of a quantized module, ordered from earliest to latest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantizationStatus {
    /// Parameters allocated, not yet calibrated.
    Initialized,
    /// Observers are collecting statistics.
    Calibration,
    /// Scales are fixed.
    Frozen,
    /// Weights are stored in their compressed form.
    Compressed,
}

impl QuantizationStatus {
    /// Returns the lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Calibration => "calibration",
            Self::Frozen => "frozen",
            Self::Compressed => "compressed",
        }
    }
}

impl fmt::Display for QuantizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the status stamped on a module, if any.
pub fn quantization_status(module: &dyn Module) -> Option<QuantizationStatus> {
    module.extensions().get::<QuantizationStatus>().copied()
}

/// Returns the scheme stamped on a module, if any.
pub fn quantization_scheme(module: &dyn Module) -> Option<&QuantizationScheme> {
    module.extensions().get::<QuantizationScheme>()
}

/// Stamps a scheme onto a module, replacing any previous one.
pub fn set_quantization_scheme(module: &mut dyn Module, scheme: QuantizationScheme) {
    module.extensions_mut().insert(scheme);
}

// =============================================================================
// Tests
// =============================================================================

//! Diagnostics - Structured Warnings for Best-Effort Degradations
//!
//! Validation and initialization never swallow a fallback silently. Each
//! degradation is recorded as a [`Diagnostic`] in a [`Diagnostics`]
//! collection handed back to the caller and is also emitted as a
//! `tracing` warning.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use std::fmt;

use serde::Serialize;

// =============================================================================
// Codes
// =============================================================================

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational.
    Info,
    /// A fallback behavior was applied.
    Warning,
}

/// Machine-readable diagnostic code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticCode {
    /// An observer was requested for fully dynamic quantization and dropped.
    DynamicObserverIgnored,
    /// Weights and inputs both use GROUP with different group sizes.
    MismatchedGroupSizes,
    /// Weight dimensions do not divide evenly by the block structure.
    RaggedBlockDivision,
    /// BLOCK strategy requested where it is unsupported; per-tensor used.
    BlockActivationFallback,
    /// Requested scale dtype is not a float type; f16 used.
    UnsupportedScaleDtype,
    /// Weight quantization requested for a module without a weight.
    MissingWeight,
}

impl DiagnosticCode {
    /// Returns the code name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DynamicObserverIgnored => "DynamicObserverIgnored",
            Self::MismatchedGroupSizes => "MismatchedGroupSizes",
            Self::RaggedBlockDivision => "RaggedBlockDivision",
            Self::BlockActivationFallback => "BlockActivationFallback",
            Self::UnsupportedScaleDtype => "UnsupportedScaleDtype",
            Self::MissingWeight => "MissingWeight",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Diagnostic
// =============================================================================

/// A single recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Severity.
    pub severity: Severity,
    /// Code.
    pub code: DiagnosticCode,
    /// Human-readable message.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Ordered collection of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a warning and emits it through `tracing`.
    pub fn warn(&mut self, code: DiagnosticCode, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(code = %code, "{}", message);
        self.entries.push(Diagnostic {
            severity: Severity::Warning,
            code,
            message,
        });
    }

    /// Records an informational entry.
    pub fn info(&mut self, code: DiagnosticCode, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(code = %code, "{}", message);
        self.entries.push(Diagnostic {
            severity: Severity::Info,
            code,
            message,
        });
    }

    /// Returns true if any entry carries `code`.
    pub fn contains(&self, code: DiagnosticCode) -> bool {
        self.entries.iter().any(|d| d.code == code)
    }

    /// Returns the codes in recording order.
    pub fn codes(&self) -> Vec<DiagnosticCode> {
        self.entries.iter().map(|d| d.code).collect()
    }

    /// Appends all entries of `other`.
    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    /// Returns the entries.
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Iterates over the entries.
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

// =============================================================================
// Tests
// =============================================================================

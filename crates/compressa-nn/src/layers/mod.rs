//! Layers
//!
//! Concrete layers exposed to quantization and transform passes.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

pub mod attention;
pub mod dropout;
pub mod embedding;
pub mod linear;
pub mod norm;

// Re-exports
pub use attention::SelfAttention;
pub use dropout::Dropout;
pub use embedding::Embedding;
pub use linear::Linear;
pub use norm::LayerNorm;

//! Transform Factories - Registry and Cached Hadamard Construction
//!
//! A factory turns a [`TransformScheme`] into per-layer transforms. The
//! Hadamard factory keeps two caches for its whole lifetime:
//!
//! 1. `(size, dtype, storage device)` to the shared matrix, built on the
//!    layer's execution device and then moved to its offload device.
//! 2. matrix slot id to the shared permutation of that matrix, drawn from
//!    the factory's seeded generator.
//!
//! Layers that resolve to the same key therefore share one matrix, and with
//! `randomize` one permutation as well.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use compressa_core::{DType, Device};
use compressa_nn::{get_execution_device, get_offloaded_device, Module, Parameter};
use compressa_tensor::{random_signs, randperm, Tensor};

use crate::apply::transform_size;
use crate::args::TransformArgs;
use crate::cache::{CacheStats, ParameterizedCache};
use crate::construct::{hadamard_values, scale_columns};
use crate::error::{TransformError, TransformResult};
use crate::scheme::TransformScheme;
use crate::transform::{HadamardTransform, Transform};

/// Registered transform type names.
pub const TRANSFORM_TYPES: &[&str] = &["hadamard", "random-hadamard"];

// =============================================================================
// TransformFactory Trait
// =============================================================================

/// Creates transforms for layers from one scheme.
pub trait TransformFactory: Send + Sync {
    /// Name given to this factory's scheme.
    fn name(&self) -> &str;

    /// The scheme this factory was built from.
    fn scheme(&self) -> &TransformScheme;

    /// Creates the transform for `module` described by `args`.
    fn create_transform(
        &self,
        module: &dyn Module,
        args: &TransformArgs,
    ) -> TransformResult<Box<dyn Transform>>;

    /// Applies one application of the scheme to `module`.
    ///
    /// Weight locations are fused into the module weight in place and
    /// return `None`. Online locations return the transform so the caller
    /// can install it around the module's computation.
    fn apply_to_module(
        &self,
        module: &mut dyn Module,
        args: &TransformArgs,
    ) -> TransformResult<Option<Box<dyn Transform>>> {
        let transform = self.create_transform(&*module, args)?;
        if args.is_online() {
            return Ok(Some(transform));
        }
        let weight = module
            .weight()
            .ok_or(TransformError::MissingWeight(module.name()))?;
        weight.apply_update(|data| transform.forward(data))?;
        Ok(None)
    }
}

/// Builds the factory registered for the scheme's transform type.
pub fn factory_from_scheme(
    name: impl Into<String>,
    scheme: TransformScheme,
    seed: Option<u64>,
) -> TransformResult<Box<dyn TransformFactory>> {
    let name = name.into();
    match scheme.transform_type() {
        "hadamard" => Ok(Box::new(HadamardFactory::new(name, scheme, seed))),
        "random-hadamard" => Ok(Box::new(HadamardFactory::random(name, scheme, seed))),
        other => Err(TransformError::UnknownTransformType {
            name: other.to_string(),
            available: TRANSFORM_TYPES.to_vec(),
        }),
    }
}

// =============================================================================
// HadamardFactory
// =============================================================================

/// Cache key of a shared Hadamard matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatrixKey {
    /// Matrix order.
    pub size: usize,
    /// Element dtype, taken from the layer weight.
    pub dtype: DType,
    /// Device the cached matrix is stored on.
    pub device: Device,
}

/// Factory for normalized Hadamard rotations.
#[derive(Debug)]
pub struct HadamardFactory {
    name: String,
    scheme: TransformScheme,
    random_signs: bool,
    rng: Mutex<StdRng>,
    weights: ParameterizedCache<MatrixKey, Parameter>,
    perms: ParameterizedCache<usize, Parameter>,
}

impl HadamardFactory {
    /// Creates a factory of deterministic Hadamard matrices.
    pub fn new(name: impl Into<String>, scheme: TransformScheme, seed: Option<u64>) -> Self {
        Self::build(name.into(), scheme, seed, false)
    }

    /// Creates a factory whose matrices have randomly signed columns.
    pub fn random(name: impl Into<String>, scheme: TransformScheme, seed: Option<u64>) -> Self {
        Self::build(name.into(), scheme, seed, true)
    }

    fn build(name: String, scheme: TransformScheme, seed: Option<u64>, random_signs: bool) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            name,
            scheme,
            random_signs,
            rng: Mutex::new(rng),
            weights: ParameterizedCache::new(),
            perms: ParameterizedCache::new(),
        }
    }

    /// Creates the concrete Hadamard transform for `module`.
    pub fn create_hadamard(
        &self,
        module: &dyn Module,
        args: &TransformArgs,
    ) -> TransformResult<HadamardTransform> {
        let weight = module
            .weight()
            .ok_or(TransformError::MissingWeight(module.name()))?;
        let key = MatrixKey {
            size: transform_size(module, args.location(), self.scheme.per_head_dim())?,
            dtype: weight.dtype(),
            device: get_offloaded_device(module),
        };
        let construct_device = get_execution_device(module);

        let matrix = self
            .weights
            .get_or_try_insert_with(key, |key| self.create_weight(key, construct_device))?;
        let perm = if self.scheme.is_randomized() {
            Some(self.perms.get_or_try_insert_with(matrix.id(), |_| {
                Ok::<_, TransformError>(self.create_permutation(&matrix))
            })?)
        } else {
            None
        };
        Ok(HadamardTransform::new(
            matrix,
            perm,
            args.clone(),
            module.capabilities().kind,
        ))
    }

    fn create_weight(
        &self,
        key: &MatrixKey,
        construct_device: Device,
    ) -> TransformResult<Parameter> {
        let mut values = hadamard_values(key.size)?;
        if self.random_signs {
            let signs = random_signs(key.size, &mut *self.rng.lock());
            scale_columns(&mut values, &signs);
        }
        let shape = [key.size, key.size];
        let data = Tensor::from_f64_slice(&values, &shape, key.dtype, construct_device)?
            .to_device(key.device);
        debug!(
            factory = %self.name,
            size = key.size,
            dtype = %key.dtype,
            device = %key.device,
            "constructed hadamard matrix"
        );
        Ok(Parameter::named(
            self.name.clone(),
            data,
            self.scheme.is_trainable(),
        ))
    }

    fn create_permutation(&self, matrix: &Parameter) -> Parameter {
        let size = matrix.shape().first().copied().unwrap_or(0);
        let data = randperm(size, &mut *self.rng.lock(), matrix.device());
        debug!(factory = %self.name, size, "constructed hadamard permutation");
        Parameter::new(data, false)
    }

    /// Returns the cached matrix for a key, if constructed.
    pub fn cached_matrix(&self, key: &MatrixKey) -> Option<Parameter> {
        self.weights.get(key)
    }

    /// Statistics of the matrix cache.
    pub fn matrix_stats(&self) -> CacheStats {
        self.weights.stats()
    }

    /// Statistics of the permutation cache.
    pub fn permutation_stats(&self) -> CacheStats {
        self.perms.stats()
    }
}

impl TransformFactory for HadamardFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn scheme(&self) -> &TransformScheme {
        &self.scheme
    }

    fn create_transform(
        &self,
        module: &dyn Module,
        args: &TransformArgs,
    ) -> TransformResult<Box<dyn Transform>> {
        Ok(Box::new(self.create_hadamard(module, args)?))
    }
}

// =============================================================================
// Tests
// =============================================================================

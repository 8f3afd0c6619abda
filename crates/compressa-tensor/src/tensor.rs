//! Tensor - Dtype-Tagged N-Dimensional Array
//!
//! The `Tensor` struct pairs shared [`Storage`] with a shape. Tensors are
//! always contiguous and row-major. Element types are resolved at runtime
//! from the storage dtype, so one tensor type can hold `bf16` weights,
//! `f8e4m3` scales and `i32` group indices alike.
//!
//! Arithmetic is limited to what parameter initialization and transform
//! application need: casts, device moves, reshapes, 2D transposes, row and
//! column gathers, matrix products and scalar division. Products are
//! accumulated in `f64` and narrowed back to the operand dtype.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use rayon::prelude::*;

use compressa_core::dtype::{DType, Scalar};
use compressa_core::error::{Error, Result};
use compressa_core::storage::{Storage, StorageReadGuard};
use compressa_core::Device;

use crate::shape::{normalize_dim, numel, reshape, Shape};

// =============================================================================
// Tensor Struct
// =============================================================================

/// A contiguous N-dimensional array with a runtime dtype.
///
/// Cloning a tensor is cheap and shares storage; use [`Tensor::clone_deep`]
/// for an independent copy.
#[derive(Debug, Clone)]
pub struct Tensor {
    storage: Storage,
    shape: Shape,
}

impl Tensor {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Creates a tensor over existing storage.
    pub fn from_storage(storage: Storage, shape: &[usize]) -> Result<Self> {
        let total = numel(shape);
        if total != storage.len() {
            return Err(Error::shape_mismatch(&[storage.len()], shape));
        }
        Ok(Self {
            storage,
            shape: Shape::from_slice(shape),
        })
    }

    /// Pairs storage with a shape already known to match its length.
    pub(crate) fn from_parts(storage: Storage, shape: &[usize]) -> Self {
        debug_assert_eq!(storage.len(), numel(shape));
        Self {
            storage,
            shape: Shape::from_slice(shape),
        }
    }

    /// Creates a CPU tensor from a vector, taking the dtype from `T`.
    pub fn from_vec<T: Scalar>(data: Vec<T>, shape: &[usize]) -> Result<Self> {
        Self::from_storage(Storage::from_vec(data, Device::Cpu), shape)
    }

    /// Creates a tensor of `dtype` on `device` from `f64` values.
    pub fn from_f64_slice(
        values: &[f64],
        shape: &[usize],
        dtype: DType,
        device: Device,
    ) -> Result<Self> {
        Self::from_storage(Storage::from_f64_slice(values, dtype, device), shape)
    }

    /// Allocates an uninitialized-by-contract tensor.
    ///
    /// Contents are zero in practice, but callers must not rely on that;
    /// use [`Tensor::zeros`] when zeros are required.
    #[must_use]
    pub fn empty(shape: &[usize], dtype: DType, device: Device) -> Self {
        Self::zeros(shape, dtype, device)
    }

    /// Creates a zero-filled tensor.
    #[must_use]
    pub fn zeros(shape: &[usize], dtype: DType, device: Device) -> Self {
        Self {
            storage: Storage::zeros(numel(shape), dtype, device),
            shape: Shape::from_slice(shape),
        }
    }

    /// Creates a tensor with every element set to `value`.
    #[must_use]
    pub fn full(shape: &[usize], value: f64, dtype: DType, device: Device) -> Self {
        let values = vec![value; numel(shape)];
        Self::from_parts(Storage::from_f64_slice(&values, dtype, device), shape)
    }

    /// Creates an `n x n` identity matrix.
    #[must_use]
    pub fn eye(n: usize, dtype: DType, device: Device) -> Self {
        let mut values = vec![0.0; n * n];
        for i in 0..n {
            values[i * n + i] = 1.0;
        }
        Self::from_parts(Storage::from_f64_slice(&values, dtype, device), &[n, n])
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Returns the shape of the tensor.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Returns the total number of elements.
    #[must_use]
    pub fn numel(&self) -> usize {
        numel(&self.shape)
    }

    /// Returns true if the tensor has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.numel() == 0
    }

    /// Returns the size of a dimension, accepting negative indices.
    pub fn size(&self, dim: i64) -> Result<usize> {
        let idx = normalize_dim(dim, self.ndim())?;
        Ok(self.shape[idx])
    }

    /// Returns the element dtype.
    #[must_use]
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// Returns the device holding the data.
    #[must_use]
    pub fn device(&self) -> Device {
        self.storage.device()
    }

    /// Returns the underlying storage.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Returns true if both tensors share the same storage.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.storage.ptr_eq(&other.storage)
    }

    // =========================================================================
    // Data Access
    // =========================================================================

    /// Returns a typed read view of the elements.
    pub fn read<T: Scalar>(&self) -> Result<StorageReadGuard<'_, T>> {
        self.storage.read::<T>()
    }

    /// Copies the elements out as a vector of `T`.
    pub fn to_vec<T: Scalar>(&self) -> Result<Vec<T>> {
        self.storage.to_vec::<T>()
    }

    /// Widens every element to `f64`.
    #[must_use]
    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.storage.to_f64_vec()
    }

    /// Reads the indices held by an integer tensor.
    pub fn to_index_vec(&self) -> Result<Vec<usize>> {
        if !self.dtype().is_integer() {
            return Err(Error::invalid_operation(format!(
                "index tensor must have an integer dtype, got {}",
                self.dtype()
            )));
        }
        self.to_f64_vec()
            .into_iter()
            .map(|v| {
                if v < 0.0 {
                    Err(Error::invalid_operation(format!("negative index {v}")))
                } else {
                    Ok(v as usize)
                }
            })
            .collect()
    }

    /// Overwrites this tensor's elements in place, keeping its identity.
    pub fn copy_from(&self, other: &Self) -> Result<()> {
        if self.shape != other.shape {
            return Err(Error::shape_mismatch(&self.shape, &other.shape));
        }
        let source = other.to_dtype(self.dtype());
        self.storage.copy_from(&source.storage)
    }

    // =========================================================================
    // Conversion
    // =========================================================================

    /// Converts to `dtype`, sharing storage when already that dtype.
    #[must_use]
    pub fn to_dtype(&self, dtype: DType) -> Self {
        Self {
            storage: self.storage.cast(dtype),
            shape: self.shape.clone(),
        }
    }

    /// Moves to `device`, sharing storage when already there.
    #[must_use]
    pub fn to_device(&self, device: Device) -> Self {
        Self {
            storage: self.storage.to_device(device),
            shape: self.shape.clone(),
        }
    }

    /// Returns an independent copy of the tensor.
    #[must_use]
    pub fn clone_deep(&self) -> Self {
        Self {
            storage: self.storage.deep_copy(),
            shape: self.shape.clone(),
        }
    }

    // =========================================================================
    // Shape Operations
    // =========================================================================

    /// Returns a tensor with a new shape over the same storage.
    pub fn reshape(&self, new_shape: &[isize]) -> Result<Self> {
        let shape = reshape(&self.shape, new_shape)?;
        Ok(Self {
            storage: self.storage.clone(),
            shape,
        })
    }

    /// Transposes a 2D tensor into new storage.
    pub fn t(&self) -> Result<Self> {
        let (rows, cols) = self.matrix_dims()?;
        let data = self.to_f64_vec();
        let mut out = vec![0.0; data.len()];
        for r in 0..rows {
            for c in 0..cols {
                out[c * rows + r] = data[r * cols + c];
            }
        }
        Self::from_f64_slice(&out, &[cols, rows], self.dtype(), self.device())
    }

    /// Gathers slices along `dim` in the order given by an integer `index` tensor.
    pub fn index_select(&self, dim: i64, index: &Self) -> Result<Self> {
        let dim = normalize_dim(dim, self.ndim())?;
        let indices = index.to_index_vec()?;
        let extent = self.shape[dim];
        if let Some(&bad) = indices.iter().find(|&&i| i >= extent) {
            return Err(Error::IndexOutOfBounds {
                index: bad,
                size: extent,
            });
        }

        let outer: usize = self.shape[..dim].iter().product();
        let inner: usize = self.shape[dim + 1..].iter().product();
        let data = self.to_f64_vec();
        let mut out = Vec::with_capacity(outer * indices.len() * inner);
        for o in 0..outer {
            for &i in &indices {
                let start = (o * extent + i) * inner;
                out.extend_from_slice(&data[start..start + inner]);
            }
        }

        let mut shape = self.shape.clone();
        shape[dim] = indices.len();
        Self::from_f64_slice(&out, &shape, self.dtype(), self.device())
    }

    /// Builds a block-diagonal matrix repeating this square matrix `repeats` times.
    pub fn block_diag(&self, repeats: usize) -> Result<Self> {
        let (n, cols) = self.matrix_dims()?;
        if n != cols {
            return Err(Error::invalid_operation(format!(
                "block_diag requires a square matrix, got {n}x{cols}"
            )));
        }
        let size = n * repeats;
        let data = self.to_f64_vec();
        let mut out = vec![0.0; size * size];
        for block in 0..repeats {
            let offset = block * n;
            for r in 0..n {
                let row = (offset + r) * size + offset;
                out[row..row + n].copy_from_slice(&data[r * n..(r + 1) * n]);
            }
        }
        Self::from_f64_slice(&out, &[size, size], self.dtype(), self.device())
    }

    fn matrix_dims(&self) -> Result<(usize, usize)> {
        match self.shape.as_slice() {
            [rows, cols] => Ok((*rows, *cols)),
            _ => Err(Error::invalid_operation(format!(
                "expected a 2D tensor, got shape {:?}",
                self.shape.as_slice()
            ))),
        }
    }

    // =========================================================================
    // Arithmetic
    // =========================================================================

    /// Applies `f` to every element, computed in `f64`.
    #[must_use]
    pub fn map_f64<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64 + Sync + Send,
    {
        let out: Vec<f64> = self.to_f64_vec().into_par_iter().map(f).collect();
        Self::from_parts(
            Storage::from_f64_slice(&out, self.dtype(), self.device()),
            &self.shape,
        )
    }

    /// Multiplies every element by a scalar.
    #[must_use]
    pub fn mul_scalar(&self, scalar: f64) -> Self {
        self.map_f64(|v| v * scalar)
    }

    /// Divides every element by a scalar.
    #[must_use]
    pub fn div_scalar(&self, scalar: f64) -> Self {
        self.map_f64(|v| v / scalar)
    }

    /// Matrix product of two 2D tensors: `[m, k] @ [k, n] -> [m, n]`.
    ///
    /// Both operands must share dtype and device.
    pub fn matmul(&self, other: &Self) -> Result<Self> {
        let (m, k1) = self.matrix_dims()?;
        let (k2, n) = other.matrix_dims()?;
        if k1 != k2 {
            return Err(Error::invalid_operation(format!(
                "matmul inner dimensions must match: {k1} vs {k2}"
            )));
        }
        if self.dtype() != other.dtype() {
            return Err(Error::DTypeMismatch {
                expected: self.dtype(),
                actual: other.dtype(),
            });
        }
        if self.device() != other.device() {
            return Err(Error::DeviceMismatch {
                expected: self.device(),
                actual: other.device(),
            });
        }

        let a = self.to_f64_vec();
        let b = other.to_f64_vec();
        let mut c = vec![0.0f64; m * n];
        if n > 0 {
            c.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
                for p in 0..k1 {
                    let a_ip = a[i * k1 + p];
                    if a_ip == 0.0 {
                        continue;
                    }
                    let b_row = &b[p * n..(p + 1) * n];
                    for (out, &b_pj) in row.iter_mut().zip(b_row) {
                        *out += a_ip * b_pj;
                    }
                }
            });
        }

        Self::from_f64_slice(&c, &[m, n], self.dtype(), self.device())
    }

    /// Returns the largest absolute elementwise difference.
    pub fn max_abs_diff(&self, other: &Self) -> Result<f64> {
        if self.shape != other.shape {
            return Err(Error::shape_mismatch(&self.shape, &other.shape));
        }
        Ok(self
            .to_f64_vec()
            .iter()
            .zip(other.to_f64_vec())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use compressa_core::bf16;

    fn matrix(values: &[f64], rows: usize, cols: usize) -> Tensor {
        Tensor::from_f64_slice(values, &[rows, cols], DType::F32, Device::Cpu).unwrap()
    }

    #[test]
    fn test_from_vec_shape_check() {
        assert!(Tensor::from_vec(vec![1.0f32, 2.0, 3.0], &[2, 2]).is_err());
        let t = Tensor::from_vec(vec![1.0f32; 6], &[2, 3]).unwrap();
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.dtype(), DType::F32);
        assert_eq!(t.size(-1).unwrap(), 3);
    }

    #[test]
    fn test_empty_and_full() {
        let t = Tensor::empty(&[1], DType::BF16, Device::Cuda(0));
        assert_eq!(t.numel(), 1);
        assert_eq!(t.dtype(), DType::BF16);
        assert_eq!(t.device(), Device::Cuda(0));

        let t = Tensor::full(&[3], -1.0, DType::I32, Device::Cpu);
        assert_eq!(t.to_vec::<i32>().unwrap(), vec![-1, -1, -1]);
    }

    #[test]
    fn test_transpose() {
        let t = matrix(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3).t().unwrap();
        assert_eq!(t.shape(), &[3, 2]);
        assert_eq!(t.to_f64_vec(), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_index_select_rows_and_columns() {
        let t = matrix(&[1.0, 2.0, 3.0, 4.0], 2, 2);
        let perm = Tensor::from_vec(vec![1i64, 0], &[2]).unwrap();
        let rows = t.index_select(0, &perm).unwrap();
        assert_eq!(rows.to_f64_vec(), vec![3.0, 4.0, 1.0, 2.0]);
        let both = rows.index_select(1, &perm).unwrap();
        assert_eq!(both.to_f64_vec(), vec![4.0, 3.0, 2.0, 1.0]);

        let bad = Tensor::from_vec(vec![2i64], &[1]).unwrap();
        assert!(t.index_select(0, &bad).is_err());
    }

    #[test]
    fn test_matmul() {
        let a = matrix(&[1.0, 2.0, 3.0, 4.0], 2, 2);
        let b = matrix(&[5.0, 6.0, 7.0, 8.0], 2, 2);
        let c = a.matmul(&b).unwrap();
        assert_eq!(c.to_f64_vec(), vec![19.0, 22.0, 43.0, 50.0]);

        let wrong = matrix(&[1.0, 2.0, 3.0], 3, 1);
        assert!(a.matmul(&wrong).is_err());
        assert!(a.matmul(&b.to_dtype(DType::F64)).is_err());
    }

    #[test]
    fn test_block_diag() {
        let t = matrix(&[1.0, 2.0, 3.0, 4.0], 2, 2).block_diag(2).unwrap();
        assert_eq!(t.shape(), &[4, 4]);
        assert_eq!(
            t.to_f64_vec(),
            vec![
                1.0, 2.0, 0.0, 0.0, //
                3.0, 4.0, 0.0, 0.0, //
                0.0, 0.0, 1.0, 2.0, //
                0.0, 0.0, 3.0, 4.0,
            ]
        );
    }

    #[test]
    fn test_copy_from_keeps_identity() {
        let t = matrix(&[0.0; 4], 2, 2);
        let alias = t.clone();
        t.copy_from(&matrix(&[1.0, 2.0, 3.0, 4.0], 2, 2)).unwrap();
        assert!(t.ptr_eq(&alias));
        assert_eq!(alias.to_f64_vec(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_dtype_preserved_through_arithmetic() {
        let t = Tensor::from_vec(vec![bf16::from_f32(4.0); 4], &[2, 2]).unwrap();
        let halved = t.div_scalar(2.0);
        assert_eq!(halved.dtype(), DType::BF16);
        assert_eq!(halved.to_f64_vec(), vec![2.0; 4]);
        assert_eq!(t.reshape(&[-1]).unwrap().shape(), &[4]);
    }
}

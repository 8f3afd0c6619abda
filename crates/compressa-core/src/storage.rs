//! Storage - Type-Erased Parameter Memory
//!
//! Storage owns a contiguous buffer of elements of a single runtime dtype on
//! a single device. The buffer is reference-counted and guarded by a
//! `parking_lot::RwLock`, so clones share the same memory and identity can
//! be checked with [`Storage::ptr_eq`].
//!
//! Elements are kept in a word-aligned `u64` buffer and reinterpreted with
//! `bytemuck` on access, which lets every [`Scalar`] type share one storage
//! type while typed views stay safe.
//!
//! # Example
//! ```rust
//! use compressa_core::{DType, Device, Storage};
//!
//! let storage = Storage::zeros(100, DType::F32, Device::Cpu);
//! assert_eq!(storage.len(), 100);
//! assert_eq!(storage.read::<f32>().unwrap()[0], 0.0);
//! ```
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use std::sync::Arc;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use crate::device::Device;
use crate::dtype::{DType, Scalar};
use crate::error::{Error, Result};
use crate::match_dtype;

// =============================================================================
// Storage Struct
// =============================================================================

/// Read guard over a typed view of storage data.
pub type StorageReadGuard<'a, T> = MappedRwLockReadGuard<'a, [T]>;

/// Write guard over a typed view of storage data.
pub type StorageWriteGuard<'a, T> = MappedRwLockWriteGuard<'a, [T]>;

/// Shared, dtype-tagged memory for tensor data.
#[derive(Debug, Clone)]
pub struct Storage {
    inner: Arc<RwLock<StorageInner>>,
}

#[derive(Debug)]
struct StorageInner {
    words: Vec<u64>,
    len: usize,
    dtype: DType,
    device: Device,
}

fn word_count(len: usize, dtype: DType) -> usize {
    (len * dtype.size_of()).div_ceil(8)
}

fn typed<T: Scalar>(words: &[u64], len: usize) -> &[T] {
    &bytemuck::cast_slice::<u64, T>(words)[..len]
}

fn typed_mut<T: Scalar>(words: &mut [u64], len: usize) -> &mut [T] {
    &mut bytemuck::cast_slice_mut::<u64, T>(words)[..len]
}

impl Storage {
    /// Allocates `len` zero-filled elements of `dtype` on `device`.
    #[must_use]
    pub fn zeros(len: usize, dtype: DType, device: Device) -> Self {
        Self::from_inner(StorageInner {
            words: vec![0; word_count(len, dtype)],
            len,
            dtype,
            device,
        })
    }

    /// Creates storage from an existing vector, taking the dtype from `T`.
    #[must_use]
    pub fn from_vec<T: Scalar>(data: Vec<T>, device: Device) -> Self {
        let storage = Self::zeros(data.len(), T::DTYPE, device);
        {
            let mut inner = storage.inner.write();
            let len = inner.len;
            typed_mut::<T>(&mut inner.words, len).copy_from_slice(&data);
        }
        storage
    }

    /// Creates storage of `dtype` by narrowing each `f64` value.
    #[must_use]
    pub fn from_f64_slice(values: &[f64], dtype: DType, device: Device) -> Self {
        match_dtype!(dtype, T => {
            let data: Vec<T> = values.iter().map(|&v| T::from_f64(v)).collect();
            Self::from_vec(data, device)
        })
    }

    fn from_inner(inner: StorageInner) -> Self {
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len
    }

    /// Returns true if the storage holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the element dtype.
    #[must_use]
    pub fn dtype(&self) -> DType {
        self.inner.read().dtype
    }

    /// Returns the device this storage is on.
    #[must_use]
    pub fn device(&self) -> Device {
        self.inner.read().device
    }

    /// Returns the size in bytes of the stored elements.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        let inner = self.inner.read();
        inner.len * inner.dtype.size_of()
    }

    /// Returns true if both handles refer to the same memory.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns a typed read view, failing if `T` is not the storage dtype.
    pub fn read<T: Scalar>(&self) -> Result<StorageReadGuard<'_, T>> {
        let guard = self.inner.read();
        if guard.dtype != T::DTYPE {
            return Err(Error::DTypeMismatch {
                expected: guard.dtype,
                actual: T::DTYPE,
            });
        }
        Ok(RwLockReadGuard::map(guard, |inner| {
            typed::<T>(&inner.words, inner.len)
        }))
    }

    /// Returns a typed write view, failing if `T` is not the storage dtype.
    pub fn write<T: Scalar>(&self) -> Result<StorageWriteGuard<'_, T>> {
        let guard = self.inner.write();
        if guard.dtype != T::DTYPE {
            return Err(Error::DTypeMismatch {
                expected: guard.dtype,
                actual: T::DTYPE,
            });
        }
        Ok(RwLockWriteGuard::map(guard, |inner| {
            let len = inner.len;
            typed_mut::<T>(&mut inner.words, len)
        }))
    }

    /// Copies the elements out as a vector of `T`.
    pub fn to_vec<T: Scalar>(&self) -> Result<Vec<T>> {
        Ok(self.read::<T>()?.to_vec())
    }

    /// Widens every element to `f64`.
    #[must_use]
    pub fn to_f64_vec(&self) -> Vec<f64> {
        let inner = self.inner.read();
        match_dtype!(inner.dtype, T => typed::<T>(&inner.words, inner.len)
            .iter()
            .map(|v| v.to_f64())
            .collect())
    }

    /// Overwrites this storage with the contents of `other`.
    pub fn copy_from(&self, other: &Self) -> Result<()> {
        if self.ptr_eq(other) {
            return Ok(());
        }
        let src = other.inner.read();
        let mut dst = self.inner.write();
        if src.len != dst.len {
            return Err(Error::shape_mismatch(&[dst.len], &[src.len]));
        }
        if src.dtype != dst.dtype {
            return Err(Error::DTypeMismatch {
                expected: dst.dtype,
                actual: src.dtype,
            });
        }
        dst.words.copy_from_slice(&src.words);
        Ok(())
    }

    /// Makes a deep copy of this storage.
    #[must_use]
    pub fn deep_copy(&self) -> Self {
        let inner = self.inner.read();
        Self::from_inner(StorageInner {
            words: inner.words.clone(),
            len: inner.len,
            dtype: inner.dtype,
            device: inner.device,
        })
    }

    /// Returns storage on `device`, sharing memory when already there.
    #[must_use]
    pub fn to_device(&self, device: Device) -> Self {
        if self.device() == device {
            return self.clone();
        }
        let copy = self.deep_copy();
        copy.inner.write().device = device;
        copy
    }

    /// Converts every element to `dtype`, sharing memory when already that dtype.
    #[must_use]
    pub fn cast(&self, dtype: DType) -> Self {
        if self.dtype() == dtype {
            return self.clone();
        }
        Self::from_f64_slice(&self.to_f64_vec(), dtype, self.device())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::{bf16, F8E4M3};

    #[test]
    fn test_storage_zeros() {
        let storage = Storage::zeros(10, DType::I32, Device::Cpu);
        assert_eq!(storage.len(), 10);
        assert_eq!(storage.size_bytes(), 40);
        assert!(storage.read::<i32>().unwrap().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_storage_odd_width_lengths() {
        let storage = Storage::from_vec(vec![1i8, -2, 3], Device::Cpu);
        assert_eq!(storage.len(), 3);
        assert_eq!(storage.to_vec::<i8>().unwrap(), vec![1, -2, 3]);

        let storage = Storage::from_vec(vec![bf16::from_f32(1.5); 5], Device::Cpu);
        assert_eq!(storage.to_f64_vec(), vec![1.5; 5]);
    }

    #[test]
    fn test_storage_dtype_mismatch() {
        let storage = Storage::zeros(4, DType::F16, Device::Cpu);
        assert!(matches!(
            storage.read::<f32>(),
            Err(Error::DTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_storage_write_visible_through_clone() {
        let storage = Storage::from_vec(vec![1.0f32, 2.0, 3.0], Device::Cpu);
        let alias = storage.clone();
        alias.write::<f32>().unwrap()[0] = 9.0;
        assert_eq!(storage.read::<f32>().unwrap()[0], 9.0);
        assert!(storage.ptr_eq(&alias));
    }

    #[test]
    fn test_storage_deep_copy() {
        let storage1 = Storage::from_vec(vec![1.0_f32, 2.0, 3.0], Device::Cpu);
        let storage2 = storage1.deep_copy();
        storage2.write::<f32>().unwrap()[0] = 99.0;

        assert!(!storage1.ptr_eq(&storage2));
        assert_eq!(storage1.read::<f32>().unwrap()[0], 1.0);
    }

    #[test]
    fn test_storage_to_device() {
        let storage = Storage::from_vec(vec![1.0_f32, 2.0], Device::Cpu);
        assert!(storage.to_device(Device::Cpu).ptr_eq(&storage));

        let moved = storage.to_device(Device::Cuda(0));
        assert_eq!(moved.device(), Device::Cuda(0));
        assert!(!moved.ptr_eq(&storage));
        assert_eq!(moved.to_vec::<f32>().unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_storage_cast() {
        let storage = Storage::from_vec(vec![0.3f32, -500.0], Device::Cpu);
        let fp8 = storage.cast(DType::F8E4M3);
        let values = fp8.to_vec::<F8E4M3>().unwrap();
        assert_eq!(values[0].to_f32(), 0.3125);
        assert!(values[1].is_nan());
    }

    #[test]
    fn test_storage_copy_from() {
        let src = Storage::from_vec(vec![1.0_f32, 2.0, 3.0], Device::Cpu);
        let dst = Storage::zeros(3, DType::F32, Device::Cpu);
        dst.copy_from(&src).unwrap();
        assert_eq!(dst.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0]);

        let short = Storage::zeros(2, DType::F32, Device::Cpu);
        assert!(short.copy_from(&src).is_err());
    }
}

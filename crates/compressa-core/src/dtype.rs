//! Data Types - Compressa Type System
//!
//! Defines the runtime data types that parameter storage can hold and the
//! `Scalar` trait that maps each one to a concrete Rust element type.
//! Besides the usual floating point and integer types this includes
//! `bfloat16` and the 8-bit `E4M3` float used for quantized weights and
//! for the scales of 4-bit float formats.
//!
//! # Key Features
//! - Runtime dtype information via `DType` enum
//! - Half-precision (f16, bf16) support via the `half` crate
//! - Software `F8E4M3` float with round-to-nearest-even encoding
//! - `match_dtype!` dispatch from a runtime dtype to a static element type
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use core::fmt::Debug;

pub use half::{bf16, f16};

// =============================================================================
// DType Enum
// =============================================================================

/// Runtime representation of tensor data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// 16-bit floating point (half precision).
    F16,
    /// 16-bit brain floating point.
    BF16,
    /// 32-bit floating point (single precision).
    F32,
    /// 64-bit floating point (double precision).
    F64,
    /// 8-bit floating point, 4 exponent bits and 3 mantissa bits, finite only.
    F8E4M3,
    /// 8-bit signed integer.
    I8,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 8-bit unsigned integer.
    U8,
}

impl DType {
    /// Returns the size in bytes of this data type.
    #[must_use]
    pub const fn size_of(self) -> usize {
        match self {
            Self::F8E4M3 | Self::I8 | Self::U8 => 1,
            Self::F16 | Self::BF16 | Self::I16 => 2,
            Self::F32 | Self::I32 => 4,
            Self::F64 | Self::I64 => 8,
        }
    }

    /// Returns true if this is a floating point type.
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(
            self,
            Self::F16 | Self::BF16 | Self::F32 | Self::F64 | Self::F8E4M3
        )
    }

    /// Returns true if this is an integer type.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::U8)
    }

    /// Returns true if this type can represent negative values.
    #[must_use]
    pub const fn is_signed(self) -> bool {
        !matches!(self, Self::U8)
    }

    /// Returns the name of this data type as a string.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::F16 => "f16",
            Self::BF16 => "bf16",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::F8E4M3 => "f8e4m3",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
        }
    }

    /// Returns the default floating point type (f32).
    #[must_use]
    pub const fn default_float() -> Self {
        Self::F32
    }
}

impl Default for DType {
    fn default() -> Self {
        Self::F32
    }
}

impl core::fmt::Display for DType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Scalar Trait
// =============================================================================

/// Trait for all scalar types that can be stored in a tensor.
///
/// Every element type round-trips through `f64`, which is the common
/// currency for casts and for the small amount of arithmetic this crate
/// family performs (matrix construction and application).
pub trait Scalar: Copy + Clone + Debug + Default + Send + Sync + Pod + Zeroable + 'static {
    /// The runtime dtype for this scalar type.
    const DTYPE: DType;

    /// Returns the dtype for this type.
    #[must_use]
    fn dtype() -> DType {
        Self::DTYPE
    }

    /// Widens this value to `f64`.
    fn to_f64(self) -> f64;

    /// Narrows an `f64` to this type using the type's native conversion rules.
    fn from_f64(value: f64) -> Self;
}

macro_rules! impl_scalar_primitive {
    ($ty:ty, $dtype:expr) => {
        impl Scalar for $ty {
            const DTYPE: DType = $dtype;

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(value: f64) -> Self {
                value as $ty
            }
        }
    };
}

impl_scalar_primitive!(f32, DType::F32);
impl_scalar_primitive!(f64, DType::F64);
impl_scalar_primitive!(i8, DType::I8);
impl_scalar_primitive!(i16, DType::I16);
impl_scalar_primitive!(i32, DType::I32);
impl_scalar_primitive!(i64, DType::I64);
impl_scalar_primitive!(u8, DType::U8);

impl Scalar for f16 {
    const DTYPE: DType = DType::F16;

    fn to_f64(self) -> f64 {
        f16::to_f64(self)
    }

    fn from_f64(value: f64) -> Self {
        f16::from_f64(value)
    }
}

impl Scalar for bf16 {
    const DTYPE: DType = DType::BF16;

    fn to_f64(self) -> f64 {
        bf16::to_f64(self)
    }

    fn from_f64(value: f64) -> Self {
        bf16::from_f64(value)
    }
}

// =============================================================================
// F8E4M3
// =============================================================================

/// 8-bit float with 1 sign bit, 4 exponent bits (bias 7) and 3 mantissa bits.
///
/// There are no infinities; `0x7F` and `0xFF` encode NaN, which leaves a
/// finite range of `[-448, 448]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct F8E4M3(u8);

// F8E4M3 is a transparent wrapper over u8, every bit pattern is valid
unsafe impl Zeroable for F8E4M3 {}
unsafe impl Pod for F8E4M3 {}

/// f32 bit pattern of 480.0, the first magnitude that encodes as NaN.
const F8E4M3_NAN_THRESHOLD: u32 = 1087 << 20;
/// f32 bit pattern of 2^-6, the smallest normal E4M3 magnitude.
const F8E4M3_MIN_NORMAL: u32 = 121 << 23;
/// f32 bit pattern of 2^14, used to align subnormals for rounding.
const F8E4M3_DENORM_MAGIC: u32 = 141 << 23;

impl F8E4M3 {
    /// Largest finite value.
    pub const MAX: f32 = 448.0;
    /// Smallest finite value.
    pub const MIN: f32 = -448.0;
    /// Canonical NaN encoding.
    pub const NAN: Self = Self(0x7F);
    /// Positive zero.
    pub const ZERO: Self = Self(0x00);

    /// Creates a value from its raw bit pattern.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Returns the raw bit pattern.
    #[must_use]
    pub const fn to_bits(self) -> u8 {
        self.0
    }

    /// Returns true if this value is NaN.
    #[must_use]
    pub const fn is_nan(self) -> bool {
        self.0 & 0x7F == 0x7F
    }

    /// Encodes an `f32` with round-to-nearest-even.
    ///
    /// Magnitudes of 480 and above (and infinities) become NaN, magnitudes
    /// in `(448, 480)` round down to 448.
    #[must_use]
    pub fn from_f32(value: f32) -> Self {
        if value.is_nan() {
            return Self::NAN;
        }

        let mut bits = value.to_bits();
        let sign = bits & 0x8000_0000;
        bits ^= sign;

        let magnitude = if bits >= F8E4M3_NAN_THRESHOLD {
            0x7F
        } else if bits < F8E4M3_MIN_NORMAL {
            // subnormal range, let the FPU round against a fixed exponent
            let aligned = f32::from_bits(bits) + f32::from_bits(F8E4M3_DENORM_MAGIC);
            (aligned.to_bits() - F8E4M3_DENORM_MAGIC) as u8
        } else {
            let mantissa_odd = (bits >> 20) & 1;
            // rebias the exponent from 127 to 7 and round half to even
            bits = bits.wrapping_add(((7i32 - 127) as u32) << 23);
            bits = bits.wrapping_add(0x7FFFF).wrapping_add(mantissa_odd);
            (bits >> 20) as u8
        };

        Self(magnitude | (sign >> 24) as u8)
    }

    /// Decodes to `f32`.
    #[must_use]
    pub fn to_f32(self) -> f32 {
        if self.is_nan() {
            return f32::NAN;
        }
        let sign = if self.0 & 0x80 != 0 { -1.0 } else { 1.0 };
        let exponent = i32::from((self.0 >> 3) & 0x0F);
        let mantissa = f32::from(self.0 & 0x07);

        if exponent == 0 {
            sign * 2.0f32.powi(-6) * (mantissa / 8.0)
        } else {
            sign * 2.0f32.powi(exponent - 7) * (1.0 + mantissa / 8.0)
        }
    }
}

impl Scalar for F8E4M3 {
    const DTYPE: DType = DType::F8E4M3;

    fn to_f64(self) -> f64 {
        f64::from(self.to_f32())
    }

    fn from_f64(value: f64) -> Self {
        Self::from_f32(value as f32)
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Binds a type alias to the element type of a runtime [`DType`] and
/// evaluates the body once for the matching arm.
///
/// ```rust
/// use compressa_core::{match_dtype, DType, Scalar};
///
/// let width = match_dtype!(DType::BF16, T => core::mem::size_of::<T>());
/// assert_eq!(width, 2);
/// ```
#[macro_export]
macro_rules! match_dtype {
    ($dtype:expr, $T:ident => $body:expr) => {
        match $dtype {
            $crate::DType::F16 => {
                type $T = $crate::dtype::f16;
                $body
            }
            $crate::DType::BF16 => {
                type $T = $crate::dtype::bf16;
                $body
            }
            $crate::DType::F32 => {
                type $T = f32;
                $body
            }
            $crate::DType::F64 => {
                type $T = f64;
                $body
            }
            $crate::DType::F8E4M3 => {
                type $T = $crate::dtype::F8E4M3;
                $body
            }
            $crate::DType::I8 => {
                type $T = i8;
                $body
            }
            $crate::DType::I16 => {
                type $T = i16;
                $body
            }
            $crate::DType::I32 => {
                type $T = i32;
                $body
            }
            $crate::DType::I64 => {
                type $T = i64;
                $body
            }
            $crate::DType::U8 => {
                type $T = u8;
                $body
            }
        }
    };
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_size() {
        assert_eq!(DType::F32.size_of(), 4);
        assert_eq!(DType::BF16.size_of(), 2);
        assert_eq!(DType::F8E4M3.size_of(), 1);
        assert_eq!(DType::I64.size_of(), 8);
    }

    #[test]
    fn test_dtype_is_float() {
        assert!(DType::F8E4M3.is_float());
        assert!(DType::BF16.is_float());
        assert!(!DType::I32.is_float());
        assert!(DType::I16.is_integer());
    }

    #[test]
    fn test_dtype_serde_names() {
        let json = serde_json::to_string(&DType::F8E4M3).unwrap();
        assert_eq!(json, "\"f8e4m3\"");
        let parsed: DType = serde_json::from_str("\"bf16\"").unwrap();
        assert_eq!(parsed, DType::BF16);
    }

    #[test]
    fn test_match_dtype_binds_element_type() {
        for dtype in [DType::F16, DType::F32, DType::F8E4M3, DType::I32, DType::I64] {
            let (size, bound) = match_dtype!(dtype, T => (core::mem::size_of::<T>(), T::DTYPE));
            assert_eq!(size, dtype.size_of());
            assert_eq!(bound, dtype);
        }
    }

    #[test]
    fn test_f8e4m3_exact_values() {
        assert_eq!(F8E4M3::from_f32(1.0).to_bits(), 0x38);
        assert_eq!(F8E4M3::from_f32(2.0).to_bits(), 0x40);
        assert_eq!(F8E4M3::from_f32(-1.0).to_bits(), 0xB8);
        assert_eq!(F8E4M3::from_f32(448.0).to_bits(), 0x7E);
        assert_eq!(F8E4M3::from_f32(0.0), F8E4M3::ZERO);
        assert!((F8E4M3::from_bits(0x38).to_f32() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_f8e4m3_saturation_and_nan() {
        assert_eq!(F8E4M3::from_f32(460.0).to_f32(), 448.0);
        assert!(F8E4M3::from_f32(480.0).is_nan());
        assert!(F8E4M3::from_f32(f32::INFINITY).is_nan());
        assert!(F8E4M3::from_f32(f32::NAN).to_f32().is_nan());
    }

    #[test]
    fn test_f8e4m3_rounding() {
        // representable neighbours of 0.3 are 0.28125 and 0.3125
        assert_eq!(F8E4M3::from_f32(0.3).to_f32(), 0.3125);
        // halfway between 1.0 and 1.125 rounds to even mantissa
        assert_eq!(F8E4M3::from_f32(1.0625).to_f32(), 1.0);
        // subnormal: smallest positive is 2^-9
        assert_eq!(F8E4M3::from_f32(2.0f32.powi(-9)).to_bits(), 0x01);
    }

    #[test]
    fn test_scalar_roundtrip_through_f64() {
        assert_eq!(f16::from_f64(0.5).to_f64(), 0.5);
        assert_eq!(<i8 as Scalar>::from_f64(-1.0), -1);
        assert_eq!(<i8 as Scalar>::from_f64(300.0), i8::MAX);
        assert_eq!(<F8E4M3 as Scalar>::from_f64(6.0).to_f64(), 6.0);
    }
}

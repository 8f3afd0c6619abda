//! Float Formats - Low-Precision Float Layouts and Simulated Rounding
//!
//! Describes the FP8 (E4M3) and FP4 (E2M1) layouts and rounds values to the
//! nearest representable quantized value while keeping the tensor's dtype.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use compressa_core::DType;
use compressa_tensor::Tensor;

use crate::args::{QuantizationArgs, QuantizationType};
use crate::error::{QuantError, QuantResult};

// =============================================================================
// Float Formats
// =============================================================================

/// Bit layout and range of a small float format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatFormat {
    /// Exponent bits.
    pub exponent: u32,
    /// Mantissa bits.
    pub mantissa: u32,
    /// Total bits.
    pub bits: u32,
    /// Largest finite value.
    pub max: f64,
    /// Smallest finite value.
    pub min: f64,
    /// Native dtype, if one exists.
    pub dtype: Option<DType>,
}

/// FP8 E4M3: finite range ±448.
pub const FP8_E4M3: FloatFormat = FloatFormat {
    exponent: 4,
    mantissa: 3,
    bits: 8,
    max: 448.0,
    min: -448.0,
    dtype: Some(DType::F8E4M3),
};

/// FP4 E2M1: levels {0, 0.5, 1, 1.5, 2, 3, 4, 6}.
pub const FP4_E2M1: FloatFormat = FloatFormat {
    exponent: 2,
    mantissa: 1,
    bits: 4,
    max: 6.0,
    min: -6.0,
    dtype: None,
};

/// Rounds one value onto the FP4 E2M1 grid, keeping its sign.
pub fn cast_to_fp4(x: f64) -> f64 {
    if x.is_nan() {
        return x;
    }
    let magnitude = x.abs();
    let level = if magnitude <= 0.25 {
        0.0
    } else if magnitude < 0.75 {
        0.5
    } else if magnitude <= 1.25 {
        1.0
    } else if magnitude < 1.75 {
        1.5
    } else if magnitude <= 2.5 {
        2.0
    } else if magnitude < 3.5 {
        3.0
    } else if magnitude <= 5.0 {
        4.0
    } else {
        6.0
    };
    if x < 0.0 {
        -level
    } else {
        level
    }
}

// =============================================================================
// Rounding
// =============================================================================

/// Rounds every element to the nearest value representable by `args`.
///
/// The result keeps the input's dtype and device; only the values change.
/// FLOAT/8 goes through `F8E4M3`, FLOAT/4 through the FP4 grid, and INT
/// rounds half to even.
pub fn round_to_quantized_type(tensor: &Tensor, args: &QuantizationArgs) -> QuantResult<Tensor> {
    let original = tensor.dtype();
    match (args.quant_type(), args.num_bits()) {
        (QuantizationType::Float, 8) => Ok(tensor.to_dtype(DType::F8E4M3).to_dtype(original)),
        (QuantizationType::Float, 4) => Ok(tensor.map_f64(cast_to_fp4)),
        (QuantizationType::Float, bits) => Err(QuantError::UnsupportedFormat(format!(
            "float rounding with num_bits={bits}, only 4 and 8 are supported"
        ))),
        (QuantizationType::Int, _) => Ok(tensor.map_f64(f64::round_ties_even)),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use compressa_core::Device;
    use proptest::prelude::*;

    fn fp4_args() -> QuantizationArgs {
        QuantizationArgs::builder()
            .num_bits(4)
            .quant_type(QuantizationType::Float)
            .build()
            .unwrap()
    }

    #[test]
    fn test_cast_to_fp4_levels() {
        let cases = [
            (0.25, 0.0),
            (0.3, 0.5),
            (0.75, 1.0),
            (1.25, 1.0),
            (1.5, 1.5),
            (1.9, 2.0),
            (2.5, 2.0),
            (3.0, 3.0),
            (5.0, 4.0),
            (5.5, 6.0),
            (100.0, 6.0),
        ];
        for (input, expected) in cases {
            assert_eq!(cast_to_fp4(input), expected, "{input}");
            assert_eq!(cast_to_fp4(-input), -expected, "-{input}");
        }
        assert!(cast_to_fp4(f64::NAN).is_nan());
    }

    #[test]
    fn test_round_fp4_keeps_dtype() {
        let t = Tensor::from_vec(vec![0.3f32, -1.9, 5.5], &[3]).unwrap();
        let rounded = round_to_quantized_type(&t, &fp4_args()).unwrap();
        assert_eq!(rounded.dtype(), DType::F32);
        assert_eq!(rounded.to_f64_vec(), vec![0.5, -2.0, 6.0]);
    }

    #[test]
    fn test_round_fp8_saturates_to_grid() {
        let args = QuantizationArgs::builder()
            .quant_type(QuantizationType::Float)
            .build()
            .unwrap();
        let t = Tensor::from_f64_slice(&[0.3, 1.0, 460.0], &[3], DType::F32, Device::Cpu).unwrap();
        let rounded = round_to_quantized_type(&t, &args).unwrap();
        assert_eq!(rounded.dtype(), DType::F32);
        assert_eq!(rounded.to_f64_vec(), vec![0.3125, 1.0, 448.0]);
    }

    #[test]
    fn test_round_int_half_to_even() {
        let args = QuantizationArgs::default();
        let t = Tensor::from_vec(vec![0.5f64, 1.5, 2.5, -0.5, 2.4], &[5]).unwrap();
        let rounded = round_to_quantized_type(&t, &args).unwrap();
        assert_eq!(rounded.dtype(), DType::F64);
        assert_eq!(rounded.to_f64_vec(), vec![0.0, 2.0, 2.0, -0.0, 2.0]);
    }

    #[test]
    fn test_round_unsupported_float_bits() {
        let args = QuantizationArgs::builder()
            .num_bits(6)
            .quant_type(QuantizationType::Float)
            .build()
            .unwrap();
        let t = Tensor::from_vec(vec![1.0f32], &[1]).unwrap();
        assert!(round_to_quantized_type(&t, &args).is_err());
    }

    fn fp8_args() -> QuantizationArgs {
        QuantizationArgs::builder()
            .quant_type(QuantizationType::Float)
            .build()
            .unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_fp4_rounding_is_elementwise_and_stable(
            values in prop::collection::vec(-10.0f64..10.0, 1..64),
        ) {
            let t = Tensor::from_vec(values.clone(), &[values.len()]).unwrap();
            let once = round_to_quantized_type(&t, &fp4_args()).unwrap();
            let twice = round_to_quantized_type(&once, &fp4_args()).unwrap();

            let expected: Vec<f64> = values.iter().map(|&v| cast_to_fp4(v)).collect();
            prop_assert_eq!(once.to_f64_vec(), expected);
            prop_assert_eq!(twice.to_f64_vec(), once.to_f64_vec());
            prop_assert!(once.to_f64_vec().iter().all(|v| v.abs() <= FP4_E2M1.max));
        }

        #[test]
        fn test_fp8_rounding_is_bounded_and_stable(
            values in prop::collection::vec(-448.0f64..448.0, 1..64),
        ) {
            let t = Tensor::from_vec(values.clone(), &[values.len()]).unwrap();
            let once = round_to_quantized_type(&t, &fp8_args()).unwrap();
            let twice = round_to_quantized_type(&once, &fp8_args()).unwrap();

            prop_assert_eq!(once.dtype(), DType::F64);
            prop_assert_eq!(twice.to_f64_vec(), once.to_f64_vec());
            for (rounded, original) in once.to_f64_vec().iter().zip(&values) {
                prop_assert!(rounded.abs() <= FP8_E4M3.max);
                // three mantissa bits: half an ulp is 1/16 of the magnitude
                if original.abs() >= 1.0 / 64.0 {
                    prop_assert!((rounded - original).abs() <= original.abs() / 16.0);
                }
            }
        }

        #[test]
        fn test_int_rounding_is_nearest_integer(
            values in prop::collection::vec(-1000.0f64..1000.0, 1..64),
        ) {
            let t = Tensor::from_vec(values.clone(), &[values.len()]).unwrap();
            let rounded = round_to_quantized_type(&t, &QuantizationArgs::default()).unwrap();
            for (r, v) in rounded.to_f64_vec().iter().zip(&values) {
                prop_assert_eq!(r.fract(), 0.0);
                prop_assert!((r - v).abs() <= 0.5);
            }
        }
    }
}

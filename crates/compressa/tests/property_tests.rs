//! Property-based tests for quantization shapes and Hadamard transforms.
//!
//! Key invariants:
//! - Every constructed Hadamard matrix H of order n satisfies H * H^T = n * I
//! - GROUP scale shapes are (rows, ceil(cols / group_size))
//! - Seeded permutations are valid and reproducible
//! - A transform followed by its inverse is the identity
//! - FP4 rounding lands on the E2M1 grid and is idempotent

use compressa::prelude::{
    DType, Device, Diagnostics, HadamardFactory, Linear, QuantizationArgs, QuantizationRole,
    Tensor, Transform, TransformArgs, TransformLocation, TransformScheme,
};
use compressa::quant::{cast_to_fp4, infer_scale_shape};
use compressa::transform::deterministic_hadamard_matrix;
use proptest::prelude::*;

const PALEY_PRIMES: [usize; 7] = [3, 7, 11, 19, 23, 31, 43];
const FP4_GRID: [f64; 8] = [0.0, 0.5, 1.0, 1.5, 2.0, 3.0, 4.0, 6.0];

fn hadamard_order() -> impl Strategy<Value = usize> {
    prop_oneof![
        (0u32..8).prop_map(|k| 1usize << k),
        (0u32..3, prop::sample::select(PALEY_PRIMES.to_vec()))
            .prop_map(|(k, q)| (1usize << k) * (q + 1)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Hadamard matrices are orthogonal up to scale n.
    #[test]
    fn hadamard_is_orthogonal(n in hadamard_order()) {
        let h = deterministic_hadamard_matrix(n, DType::F64, Device::Cpu).unwrap();
        let gram = h.matmul(&h.t().unwrap()).unwrap();
        let expected = Tensor::eye(n, DType::F64, Device::Cpu).mul_scalar(n as f64);
        prop_assert!(gram.max_abs_diff(&expected).unwrap() < 1e-9);
    }

    /// GROUP weight scales have one column per (possibly partial) group.
    #[test]
    fn group_scale_shape_formula(
        rows in 1usize..256,
        cols in 1usize..8192,
        group in 1i64..1024,
    ) {
        let args = QuantizationArgs::builder().group_size(group).build().unwrap();
        let mut diags = Diagnostics::new();
        let shape = infer_scale_shape(
            QuantizationRole::Weight,
            &args,
            Some((rows, cols)),
            &mut diags,
        ).unwrap();
        let groups = (cols + group as usize - 1) / group as usize;
        prop_assert_eq!(shape, vec![rows, groups]);
        prop_assert!(diags.is_empty());
    }

    /// Randomized factories draw valid permutations that a seed reproduces.
    #[test]
    fn seeded_permutation_is_reproducible(seed in any::<u64>(), k in 1u32..7) {
        let n = 1usize << k;
        let draw = || {
            let scheme = TransformScheme::new("hadamard").randomize(true);
            let factory = HadamardFactory::new("R1", scheme, Some(seed));
            let args = TransformArgs::new(["Linear"], TransformLocation::Input).unwrap();
            let t = factory.create_hadamard(&Linear::new(n, 2), &args).unwrap();
            t.perm().unwrap().data().to_index_vec().unwrap()
        };
        let first = draw();
        let mut sorted = first.clone();
        sorted.sort_unstable();
        prop_assert_eq!(sorted, (0..n).collect::<Vec<_>>());
        prop_assert_eq!(first, draw());
    }

    /// Applying a transform and then its inverse returns the input.
    #[test]
    fn inverse_undoes_forward(
        values in prop::collection::vec(-10.0f64..10.0, 24),
        randomize in any::<bool>(),
    ) {
        let scheme = TransformScheme::new("random-hadamard").randomize(randomize);
        let factory = HadamardFactory::random("R1", scheme, Some(1));
        let layer = Linear::from_weights(Tensor::zeros(&[4, 12], DType::F64, Device::Cpu), None)
            .unwrap();
        let args = TransformArgs::new(["Linear"], TransformLocation::Input).unwrap();
        let forward = factory.create_hadamard(&layer, &args).unwrap();
        let inverse = factory.create_hadamard(&layer, &args.clone().inverse(true)).unwrap();

        let x = Tensor::from_f64_slice(&values, &[2, 12], DType::F64, Device::Cpu).unwrap();
        let back = inverse.forward(&forward.forward(&x).unwrap()).unwrap();
        prop_assert!(back.max_abs_diff(&x).unwrap() < 1e-9);
    }

    /// FP4 rounding keeps the sign, lands on the grid and is idempotent.
    #[test]
    fn fp4_rounding_on_grid(x in -8.0f64..8.0) {
        let rounded = cast_to_fp4(x);
        prop_assert!(FP4_GRID.contains(&rounded.abs()));
        prop_assert!(rounded == 0.0 || rounded.signum() == x.signum());
        prop_assert_eq!(cast_to_fp4(rounded), rounded);
    }
}

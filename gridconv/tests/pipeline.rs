/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

// This integration test drives the whole partition-compute-assemble pipeline
// inside a single process: the plan's slabs are cut from the input with row
// spans exactly as the coordinator cuts them for the wire, each band is
// convolved independently, and the bands are blitted back in rank order. The
// result must not depend on how many ranks the plan was cut for.
use approx::assert_abs_diff_eq;
use gridconv::kernel::{conv2d_slab, output_dims, KernelSpec};
use gridconv::partition::plan;
use gridconv_utils::{
    create_rnd_from_seed, create_rnd_in_tests, create_thread_pool_for_test, random_matrix, Matrix,
};

/// Convolve `input` as a `ranks`-way job, returning the assembled output and
/// the summed FLOP count.
fn run_pipeline(
    input: &Matrix<f32>,
    weights: &Matrix<f32>,
    spec: &KernelSpec,
    ranks: usize,
) -> (Matrix<f32>, i64) {
    let pool = create_thread_pool_for_test();
    let (out_h, out_w) = output_dims(input.nrows(), input.ncols(), spec);
    let mut output = Matrix::<f32>::zeros(out_h, out_w);
    let mut total_flops = 0;

    for a in plan(input.nrows(), spec, ranks).unwrap() {
        if a.is_noop() {
            continue;
        }
        let slab = input.row_span(a.input_row_start, a.input_row_count);
        let (band, flops) = conv2d_slab(
            &pool,
            slab,
            weights.as_view(),
            spec,
            a.stride_align_offset,
            a.output_row_count,
        );
        output
            .row_span_mut(a.output_row_start, a.output_row_count)
            .as_mut_slice()
            .copy_from_slice(band.as_slice());
        total_flops += flops;
    }
    (output, total_flops)
}

fn assert_outputs_close(reference: &Matrix<f32>, candidate: &Matrix<f32>, tolerance: f32) {
    assert_eq!(reference.nrows(), candidate.nrows());
    assert_eq!(reference.ncols(), candidate.ncols());
    for (a, b) in reference.as_slice().iter().zip(candidate.as_slice()) {
        assert_abs_diff_eq!(*a, *b, epsilon = tolerance);
    }
}

#[test]
fn output_is_invariant_under_rank_count() {
    let mut rng = create_rnd_from_seed(7);
    let input = random_matrix(33, 17, &mut rng);
    let weights = random_matrix(5, 3, &mut rng);
    let spec = KernelSpec::new(5, 3, 1, 1).unwrap();

    let (reference, reference_flops) = run_pipeline(&input, &weights, &spec, 1);
    for ranks in [4, 8] {
        let (output, flops) = run_pipeline(&input, &weights, &spec, ranks);
        assert_outputs_close(&reference, &output, 1e-4);
        assert_eq!(flops, reference_flops, "tap census depends on {ranks} ranks");
    }
}

#[test]
fn strided_output_is_invariant_under_rank_count() {
    let mut rng = create_rnd_from_seed(11);
    let input = random_matrix(29, 14, &mut rng);
    let weights = random_matrix(3, 3, &mut rng);
    let spec = KernelSpec::new(3, 3, 2, 3).unwrap();

    let (reference, reference_flops) = run_pipeline(&input, &weights, &spec, 1);
    for ranks in [4, 8] {
        let (output, flops) = run_pipeline(&input, &weights, &spec, ranks);
        assert_outputs_close(&reference, &output, 1e-4);
        assert_eq!(flops, reference_flops);
    }
}

#[test]
fn zero_kernel_zeroes_output_but_still_counts_flops() {
    let mut rng = create_rnd_in_tests();
    let input = random_matrix(6, 5, &mut rng);
    let weights = Matrix::<f32>::zeros(3, 3);
    let spec = KernelSpec::new(3, 3, 1, 1).unwrap();

    let (output, flops) = run_pipeline(&input, &weights, &spec, 2);
    assert!(output.as_slice().iter().all(|&v| v == 0.0));
    // Taps are counted by position, not by value.
    assert!(flops > 0);
}

#[test]
fn flop_count_matches_tap_census() {
    // 4x4 input, 3x3 kernel of ones: the four corner cells see 4 taps each,
    // the eight edge cells 6, the four interior cells 9. Two FLOPs per tap
    // gives 2 * (4*4 + 8*6 + 4*9) = 200, and every output value is its
    // clipped 3x3 neighborhood sum.
    let input = Matrix::from_fn(4, 4, |r, c| (r * 4 + c) as f32 + 1.0);
    let weights = Matrix::from_fn(3, 3, |_, _| 1.0);
    let spec = KernelSpec::new(3, 3, 1, 1).unwrap();

    let expected = [
        [14.0, 24.0, 30.0, 22.0],
        [33.0, 54.0, 63.0, 45.0],
        [57.0, 90.0, 99.0, 69.0],
        [46.0, 72.0, 78.0, 54.0],
    ];

    for ranks in [1, 3] {
        let (output, flops) = run_pipeline(&input, &weights, &spec, ranks);
        assert_eq!(flops, 200);
        for (r, row) in expected.iter().enumerate() {
            for (c, &want) in row.iter().enumerate() {
                assert!(
                    (output[r][c] - want).abs() < 1e-5,
                    "cell ({r}, {c}) is {} not {want}",
                    output[r][c]
                );
            }
        }
    }
}

#[test]
fn stride_two_keeps_every_other_row_and_column() {
    // A 1x1 unit kernel under stride 2 is pure sampling of rows and columns
    // 0, 2, 4.
    let input = Matrix::from_fn(5, 6, |r, c| (r * 10 + c) as f32);
    let weights = Matrix::from_fn(1, 1, |_, _| 1.0);
    let spec = KernelSpec::new(1, 1, 2, 2).unwrap();

    for ranks in [1, 2] {
        let (output, flops) = run_pipeline(&input, &weights, &spec, ranks);
        assert_eq!((output.nrows(), output.ncols()), (3, 3));
        assert_eq!(flops, 18);
        for r in 0..3 {
            for c in 0..3 {
                assert_eq!(output[r][c], (r * 2 * 10 + c * 2) as f32);
            }
        }
    }
}

#[test]
fn surplus_ranks_complete_with_empty_bands() {
    let mut rng = create_rnd_in_tests();
    let input = random_matrix(3, 4, &mut rng);
    let weights = random_matrix(3, 3, &mut rng);
    let spec = KernelSpec::new(3, 3, 1, 1).unwrap();

    let (reference, reference_flops) = run_pipeline(&input, &weights, &spec, 1);
    // Eight ranks for three output rows: five ranks sit the job out.
    let (output, flops) = run_pipeline(&input, &weights, &spec, 8);
    assert_outputs_close(&reference, &output, 1e-4);
    assert_eq!(flops, reference_flops);
}

#[test]
fn kernel_taller_than_input_clips_to_the_whole_map() {
    // With a 5x5 kernel over a 2x2 input every window clips down to the full
    // map, so each output cell is the sum of all four inputs.
    let input = Matrix::from_vec(vec![1.0, 2.0, 3.0, 4.0], 2, 2).unwrap();
    let weights = Matrix::from_fn(5, 5, |_, _| 1.0);
    let spec = KernelSpec::new(5, 5, 1, 1).unwrap();

    for ranks in [1, 2] {
        let (output, flops) = run_pipeline(&input, &weights, &spec, ranks);
        for &v in output.as_slice() {
            assert_abs_diff_eq!(v, 10.0, epsilon = 1e-5);
        }
        // Four cells, four surviving taps each.
        assert_eq!(flops, 32);
    }
}

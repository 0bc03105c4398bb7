/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The convolution compute kernel.
//!
//! `conv2d_slab` runs a strided 2D cross-correlation over one horizontal slab
//! of the feature map. Output cell `(r, c)` is centered on slab cell
//! `(offset + r * stride_h, c * stride_w)`; taps that fall outside the slab
//! or outside the kernel are skipped, which is equivalent to zero padding at
//! the array edges. Every multiply-accumulate counts as two floating point
//! operations, skipped taps count nothing.

use gridconv_utils::{Matrix, MatrixView, RayonThreadPool};
use rayon::prelude::*;

use crate::error::conv_error::{ConvError, ConvResult};

/// Kernel geometry shared by every rank: dimensions plus strides.
///
/// Half-extents truncate (`height / 2`, `width / 2`), so an even kernel has
/// an asymmetric window; the tap clip in [`conv2d_slab`] drops the would-be
/// `+half` row and column, biasing the window toward the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelSpec {
    kernel_h: usize,
    kernel_w: usize,
    stride_h: usize,
    stride_w: usize,
}

impl KernelSpec {
    pub fn new(
        kernel_h: usize,
        kernel_w: usize,
        stride_h: usize,
        stride_w: usize,
    ) -> ConvResult<Self> {
        if kernel_h == 0 || kernel_w == 0 {
            return Err(ConvError::invalid_dimension(format!(
                "kernel must be at least 1 x 1, got {kernel_h} x {kernel_w}"
            )));
        }
        if stride_h == 0 || stride_w == 0 {
            return Err(ConvError::invalid_dimension(format!(
                "strides must be at least 1, got {stride_h} x {stride_w}"
            )));
        }
        Ok(Self {
            kernel_h,
            kernel_w,
            stride_h,
            stride_w,
        })
    }

    pub fn kernel_h(&self) -> usize {
        self.kernel_h
    }

    pub fn kernel_w(&self) -> usize {
        self.kernel_w
    }

    pub fn stride_h(&self) -> usize {
        self.stride_h
    }

    pub fn stride_w(&self) -> usize {
        self.stride_w
    }

    /// Rows of the window above (and nominally below) the center.
    pub fn half_height(&self) -> usize {
        self.kernel_h / 2
    }

    /// Columns of the window left of (and nominally right of) the center.
    pub fn half_width(&self) -> usize {
        self.kernel_w / 2
    }

    /// The broadcast header layout: `[kernel_h, kernel_w, stride_h, stride_w]`.
    pub fn wire_header(&self) -> [u64; 4] {
        [
            self.kernel_h as u64,
            self.kernel_w as u64,
            self.stride_h as u64,
            self.stride_w as u64,
        ]
    }

    pub fn from_wire_header(header: [u64; 4]) -> ConvResult<Self> {
        Self::new(
            header[0] as usize,
            header[1] as usize,
            header[2] as usize,
            header[3] as usize,
        )
    }
}

/// Dimensions of the full output for an `input_h x input_w` feature map.
pub fn output_dims(input_h: usize, input_w: usize, spec: &KernelSpec) -> (usize, usize) {
    (
        input_h.div_ceil(spec.stride_h),
        input_w.div_ceil(spec.stride_w),
    )
}

/// Convolve one slab, producing exactly `output_rows` rows and the FLOP count.
///
/// `offset` is the slab-local row of the first output center; callers obtain
/// it from the work assignment. The slab must contain the last center row,
/// `offset + (output_rows - 1) * stride_h`. A slab's trailing halo may hold
/// further stride-aligned rows beyond that; they belong to the next rank and
/// are not computed here.
///
/// The outer loop runs one task per output row on `pool`; rows write disjoint
/// output spans and the per-row FLOP counts are summed by the reduction.
pub fn conv2d_slab(
    pool: &RayonThreadPool,
    slab: MatrixView<'_, f32>,
    weights: MatrixView<'_, f32>,
    spec: &KernelSpec,
    offset: usize,
    output_rows: usize,
) -> (Matrix<f32>, i64) {
    assert_eq!(
        (weights.nrows(), weights.ncols()),
        (spec.kernel_h, spec.kernel_w),
        "kernel data does not match the kernel header"
    );
    assert!(output_rows > 0, "cannot convolve into zero output rows");
    let local_h = slab.nrows();
    let local_w = slab.ncols();
    let last_center = offset + (output_rows - 1) * spec.stride_h;
    assert!(
        last_center < local_h,
        "output row {} centers on slab row {last_center}, past a slab of {local_h} rows",
        output_rows - 1
    );

    let diff_h = spec.half_height();
    let diff_w = spec.half_width();
    let output_cols = local_w.div_ceil(spec.stride_w);

    let mut output = Matrix::<f32>::zeros(output_rows, output_cols);
    let flops = pool.install(|| {
        output
            .par_row_iter_mut()
            .enumerate()
            .map(|(out_row, row_values)| {
                let center_row = offset + out_row * spec.stride_h;
                let row_lo = center_row - center_row.min(diff_h);
                let row_hi = (center_row + diff_h)
                    .min(local_h - 1)
                    .min(center_row + spec.kernel_h - 1 - diff_h);
                let mut row_flops = 0i64;
                for (out_col, value) in row_values.iter_mut().enumerate() {
                    let center_col = out_col * spec.stride_w;
                    let col_lo = center_col - center_col.min(diff_w);
                    let col_hi = (center_col + diff_w)
                        .min(local_w - 1)
                        .min(center_col + spec.kernel_w - 1 - diff_w);
                    let mut acc = 0.0f32;
                    for r in row_lo..=row_hi {
                        let slab_row = slab.row(r);
                        let weight_row = weights.row(r + diff_h - center_row);
                        for c in col_lo..=col_hi {
                            acc += slab_row[c] * weight_row[c + diff_w - center_col];
                        }
                    }
                    *value = acc;
                    let taps = (row_hi - row_lo + 1) * (col_hi - col_lo + 1);
                    row_flops += 2 * (taps as i64);
                }
                row_flops
            })
            .sum::<i64>()
    });

    (output, flops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::conv_error::ConvErrorKind;
    use gridconv_utils::pool::create_thread_pool_for_test;
    use gridconv_utils::views::Matrix;
    use rstest::rstest;

    fn iota(nrows: usize, ncols: usize) -> Matrix<f32> {
        Matrix::from_fn(nrows, ncols, |r, c| (r * ncols + c + 1) as f32)
    }

    fn ones(nrows: usize, ncols: usize) -> Matrix<f32> {
        Matrix::from_fn(nrows, ncols, |_, _| 1.0)
    }

    #[rstest]
    #[case(0, 3, 1, 1)]
    #[case(3, 0, 1, 1)]
    #[case(3, 3, 0, 1)]
    #[case(3, 3, 1, 0)]
    fn spec_rejects_zero_dimensions(
        #[case] kh: usize,
        #[case] kw: usize,
        #[case] sh: usize,
        #[case] sw: usize,
    ) {
        let err = KernelSpec::new(kh, kw, sh, sw).unwrap_err();
        assert_eq!(err.kind(), ConvErrorKind::InvalidDimension);
    }

    #[rstest]
    #[case(1, 0)]
    #[case(2, 1)]
    #[case(3, 1)]
    #[case(4, 2)]
    #[case(5, 2)]
    fn half_extents_truncate(#[case] extent: usize, #[case] half: usize) {
        let spec = KernelSpec::new(extent, extent, 1, 1).unwrap();
        assert_eq!(spec.half_height(), half);
        assert_eq!(spec.half_width(), half);
    }

    #[test]
    fn wire_header_round_trips() {
        let spec = KernelSpec::new(3, 5, 2, 4).unwrap();
        let header = spec.wire_header();
        assert_eq!(header, [3, 5, 2, 4]);
        assert_eq!(KernelSpec::from_wire_header(header).unwrap(), spec);
        assert!(KernelSpec::from_wire_header([0, 5, 2, 4]).is_err());
    }

    #[rstest]
    #[case(4, 4, 1, 1, (4, 4))]
    #[case(4, 4, 2, 2, (2, 2))]
    #[case(5, 4, 2, 3, (3, 2))]
    #[case(1, 1, 7, 7, (1, 1))]
    fn output_dims_round_up(
        #[case] h: usize,
        #[case] w: usize,
        #[case] sh: usize,
        #[case] sw: usize,
        #[case] expected: (usize, usize),
    ) {
        let spec = KernelSpec::new(1, 1, sh, sw).unwrap();
        assert_eq!(output_dims(h, w, &spec), expected);
    }

    #[test]
    fn identity_kernel_copies_the_input() {
        let pool = create_thread_pool_for_test();
        let input = iota(5, 4);
        let spec = KernelSpec::new(1, 1, 1, 1).unwrap();
        let (out, flops) = conv2d_slab(&pool, input.as_view(), ones(1, 1).as_view(), &spec, 0, 5);
        assert_eq!(out.as_slice(), input.as_slice());
        assert_eq!(flops, 2 * 20);
    }

    #[test]
    fn clips_windows_at_corners() {
        // 4x4 input holding 1..=16, 3x3 kernel of ones: every output cell is
        // the unnormalized sum of its clipped 3x3 neighborhood.
        let pool = create_thread_pool_for_test();
        let input = iota(4, 4);
        let spec = KernelSpec::new(3, 3, 1, 1).unwrap();
        let (out, flops) = conv2d_slab(&pool, input.as_view(), ones(3, 3).as_view(), &spec, 0, 4);

        assert_eq!(out.row(0), &[14.0, 24.0, 30.0, 22.0]);
        assert_eq!(out.row(1), &[33.0, 54.0, 63.0, 45.0]);
        assert_eq!(out.row(2), &[57.0, 90.0, 99.0, 69.0]);
        assert_eq!(out.row(3), &[46.0, 72.0, 78.0, 54.0]);

        // Tap census: 4 corners with 4 taps, 8 edge cells with 6, 4 interior
        // cells with 9; two FLOPs per tap.
        assert_eq!(flops, 2 * (4 * 4 + 8 * 6 + 4 * 9));
    }

    #[test]
    fn flops_are_counted_for_zero_values_too() {
        let pool = create_thread_pool_for_test();
        let input = iota(4, 4);
        let spec = KernelSpec::new(3, 3, 1, 1).unwrap();
        let zeros = Matrix::<f32>::zeros(3, 3);
        let (out, flops) = conv2d_slab(&pool, input.as_view(), zeros.as_view(), &spec, 0, 4);
        assert!(out.as_slice().iter().all(|&v| v == 0.0));
        assert_eq!(flops, 200);
    }

    #[test]
    fn even_kernel_window_biases_top_left() {
        let pool = create_thread_pool_for_test();
        let input = iota(3, 3);
        let spec = KernelSpec::new(2, 2, 1, 1).unwrap();
        let (out, flops) = conv2d_slab(&pool, input.as_view(), ones(2, 2).as_view(), &spec, 0, 3);

        // A 2x2 kernel has half-extents of 1 and the tap clip drops the +1
        // row/column, so cell (r, c) sums the 2x2 block ending at (r, c).
        assert_eq!(out.row(0), &[1.0, 3.0, 5.0]);
        assert_eq!(out.row(1), &[5.0, 12.0, 16.0]);
        assert_eq!(out.row(2), &[11.0, 24.0, 28.0]);
        assert_eq!(flops, 2 * (1 + 2 + 2 + 2 + 4 + 4 + 2 + 4 + 4));
    }

    #[test]
    fn stride_two_samples_alternate_cells() {
        let pool = create_thread_pool_for_test();
        let input = iota(4, 4);
        let spec = KernelSpec::new(1, 1, 2, 2).unwrap();
        let (out, flops) = conv2d_slab(&pool, input.as_view(), ones(1, 1).as_view(), &spec, 0, 2);

        assert_eq!(out.nrows(), 2);
        assert_eq!(out.ncols(), 2);
        assert_eq!(out.row(0), &[input[0][0], input[0][2]]);
        assert_eq!(out.row(1), &[input[2][0], input[2][2]]);
        assert_eq!(flops, 8);
    }

    #[test]
    fn offset_shifts_the_first_center() {
        let pool = create_thread_pool_for_test();
        let input = iota(4, 1);
        let spec = KernelSpec::new(1, 1, 2, 1).unwrap();
        let (out, _) = conv2d_slab(&pool, input.as_view(), ones(1, 1).as_view(), &spec, 1, 2);
        assert_eq!(out.as_slice(), &[input[1][0], input[3][0]]);
    }

    #[test]
    fn single_row_input_clips_to_one_row() {
        let pool = create_thread_pool_for_test();
        let input = iota(1, 5);
        let spec = KernelSpec::new(3, 3, 1, 1).unwrap();
        let (out, flops) = conv2d_slab(&pool, input.as_view(), ones(3, 3).as_view(), &spec, 0, 1);

        // Row taps clip to the single row; columns clip at both ends.
        assert_eq!(out.row(0), &[3.0, 6.0, 9.0, 12.0, 9.0]);
        assert_eq!(flops, 2 * (2 + 3 + 3 + 3 + 2));
    }

    #[test]
    fn kernel_larger_than_slab_still_clips() {
        let pool = create_thread_pool_for_test();
        let input = iota(2, 2);
        let spec = KernelSpec::new(5, 5, 1, 1).unwrap();
        let (out, flops) = conv2d_slab(&pool, input.as_view(), ones(5, 5).as_view(), &spec, 0, 2);

        // Every window clips to the full 2x2 slab.
        assert!(out.as_slice().iter().all(|&v| v == 10.0));
        assert_eq!(flops, 2 * 4 * 4);
    }

    #[test]
    fn flop_total_is_thread_count_independent() {
        let single = gridconv_utils::pool::create_thread_pool(1).unwrap();
        let wide = gridconv_utils::pool::create_thread_pool(4).unwrap();
        let input = iota(33, 17);
        let weights = iota(3, 5);
        let spec = KernelSpec::new(3, 5, 2, 3).unwrap();
        let rows = 33usize.div_ceil(2);

        let (out_a, flops_a) =
            conv2d_slab(&single, input.as_view(), weights.as_view(), &spec, 0, rows);
        let (out_b, flops_b) = conv2d_slab(&wide, input.as_view(), weights.as_view(), &spec, 0, rows);

        assert_eq!(flops_a, flops_b);
        assert_eq!(out_a, out_b);
    }

    #[test]
    #[should_panic(expected = "centers on slab row")]
    fn rejects_centers_past_the_slab() {
        let pool = create_thread_pool_for_test();
        let input = iota(3, 3);
        let spec = KernelSpec::new(1, 1, 2, 1).unwrap();
        let _ = conv2d_slab(&pool, input.as_view(), ones(1, 1).as_view(), &spec, 0, 3);
    }
}

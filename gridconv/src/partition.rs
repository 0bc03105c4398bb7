/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Row-band work partitioning.
//!
//! The coordinator splits the output rows into one contiguous band per rank:
//! `rows / ranks` each, with the first `rows % ranks` ranks taking one extra
//! row. Each band's input range covers its centers, extended by the kernel
//! half-height on both sides (the halo) and clipped to the feature map.

use crate::error::conv_error::{ConvError, ConvResult};
use crate::kernel::KernelSpec;

/// One rank's share of the output, with the input slab that produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkAssignment {
    pub rank: usize,
    /// First output row owned by this rank.
    pub output_row_start: usize,
    /// Number of output rows owned by this rank.
    pub output_row_count: usize,
    /// First feature-map row of the halo-extended slab.
    pub input_row_start: usize,
    /// Rows in the halo-extended slab.
    pub input_row_count: usize,
    /// Slab-local row of the first output center.
    pub stride_align_offset: usize,
}

impl WorkAssignment {
    /// Surplus ranks own no rows but still join every collective step.
    pub fn is_noop(&self) -> bool {
        self.output_row_count == 0
    }
}

/// Slab-local row of the first stride-visited center.
///
/// `send_start` is the slab's first row in feature-map coordinates and
/// `top_halo` the number of slab rows preceding the band's first center
/// (after edge clipping, this can be smaller than the kernel half-height).
/// The first center sits at the next stride multiple at or past
/// `send_start + top_halo`; the returned offset is that row made slab-local.
pub fn align_to_stride(send_start: usize, top_halo: usize, stride_h: usize) -> usize {
    let border = send_start + top_halo;
    let next_hop = border.div_ceil(stride_h) * stride_h;
    next_hop - send_start
}

/// Partition `input_height` feature-map rows across `ranks` processes.
///
/// Assignments come back in rank order. Ranks beyond the output row count
/// receive zero-row assignments; only a zero rank count is infeasible.
pub fn plan(
    input_height: usize,
    spec: &KernelSpec,
    ranks: usize,
) -> ConvResult<Vec<WorkAssignment>> {
    if ranks == 0 {
        return Err(ConvError::partition_infeasible(
            "work partitioning requires at least one rank",
        ));
    }
    if input_height == 0 {
        return Err(ConvError::invalid_dimension(
            "input height must be at least 1",
        ));
    }

    let output_rows = input_height.div_ceil(spec.stride_h());
    let base = output_rows / ranks;
    let extra = output_rows % ranks;
    let diff_h = spec.half_height();

    let mut assignments = Vec::with_capacity(ranks);
    let mut cursor = 0;
    for rank in 0..ranks {
        let count = base + usize::from(rank < extra);
        if count == 0 {
            assignments.push(WorkAssignment {
                rank,
                output_row_start: cursor,
                output_row_count: 0,
                input_row_start: 0,
                input_row_count: 0,
                stride_align_offset: 0,
            });
            continue;
        }

        let input_first = cursor * spec.stride_h();
        let input_last = (cursor + count - 1) * spec.stride_h();
        let send_start = input_first.saturating_sub(diff_h);
        let send_end = (input_last + diff_h).min(input_height - 1);
        let offset = align_to_stride(send_start, input_first - send_start, spec.stride_h());

        assignments.push(WorkAssignment {
            rank,
            output_row_start: cursor,
            output_row_count: count,
            input_row_start: send_start,
            input_row_count: send_end - send_start + 1,
            stride_align_offset: offset,
        });
        cursor += count;
    }

    Ok(assignments)
}

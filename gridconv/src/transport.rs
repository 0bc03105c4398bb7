/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Rank-to-rank messaging.
//!
//! All exchanges are blocking and strictly ordered. The kernel header and
//! kernel data are broadcast from the coordinator; assignment headers and
//! input slabs go point-to-point to each worker in ascending rank order;
//! result bands come back point-to-point and land directly in the assembled
//! output. Any MPI-level failure aborts the job, matching the run-to-first-
//! failure contract of the benchmark; size validation on the result path is
//! the one place a mismatch is turned into an error instead.

use mpi::collective::SystemOperation;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;
use mpi::Rank;

use crate::error::conv_error::{ConvError, ConvResult};

/// The coordinator is always rank 0 of the world communicator.
pub const COORDINATOR_RANK: usize = 0;

const TAG_ASSIGNMENT_HEADER: i32 = 1;
const TAG_SLAB_DATA: i32 = 2;
const TAG_RESULT_DATA: i32 = 3;

/// Per-rank assignment header, sent ahead of the input slab.
///
/// `stride_align_offset` travels with the header because a worker cannot
/// re-derive it: once the top halo has been clipped by the feature-map edge,
/// two slabs with the same start row can need different offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentHeader {
    pub slab_rows: usize,
    pub slab_cols: usize,
    pub slab_start_row: usize,
    pub expected_output_rows: usize,
    pub stride_align_offset: usize,
}

impl AssignmentHeader {
    fn to_wire(self) -> [u64; 5] {
        [
            self.slab_rows as u64,
            self.slab_cols as u64,
            self.slab_start_row as u64,
            self.expected_output_rows as u64,
            self.stride_align_offset as u64,
        ]
    }

    fn from_wire(wire: [u64; 5]) -> Self {
        Self {
            slab_rows: wire[0] as usize,
            slab_cols: wire[1] as usize,
            slab_start_row: wire[2] as usize,
            expected_output_rows: wire[3] as usize,
            stride_align_offset: wire[4] as usize,
        }
    }
}

/// The world communicator with this process's place in it.
pub struct Cluster {
    world: SimpleCommunicator,
    rank: usize,
    size: usize,
}

impl Cluster {
    pub fn new(world: SimpleCommunicator) -> Self {
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        Self { world, rank, size }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_coordinator(&self) -> bool {
        self.rank == COORDINATOR_RANK
    }

    pub fn barrier(&self) {
        self.world.barrier();
    }

    /// Tear the whole job down. A failed rank cannot recover locally because
    /// the others are blocked on messages it will never send.
    pub fn abort(&self, code: i32) -> ! {
        self.world.abort(code)
    }

    /// Broadcast the kernel header from the coordinator; every rank calls
    /// this with its own buffer, the coordinator's holds the payload.
    pub fn broadcast_kernel_header(&self, header: &mut [u64; 4]) {
        self.world
            .process_at_rank(COORDINATOR_RANK as Rank)
            .broadcast_into(&mut header[..]);
    }

    /// Broadcast the kernel weights from the coordinator.
    pub fn broadcast_weights(&self, weights: &mut [f32]) {
        self.world
            .process_at_rank(COORDINATOR_RANK as Rank)
            .broadcast_into(weights);
    }

    pub fn send_assignment_header(&self, to: usize, header: AssignmentHeader) {
        debug_assert_ne!(to, self.rank, "assignment headers never go to self");
        let wire = header.to_wire();
        self.world
            .process_at_rank(to as Rank)
            .send_with_tag(&wire[..], TAG_ASSIGNMENT_HEADER);
    }

    pub fn receive_assignment_header(&self) -> AssignmentHeader {
        let mut wire = [0u64; 5];
        self.world
            .process_at_rank(COORDINATOR_RANK as Rank)
            .receive_into_with_tag(&mut wire[..], TAG_ASSIGNMENT_HEADER);
        AssignmentHeader::from_wire(wire)
    }

    /// Ship one input slab. Zero-length slabs are legal; surplus ranks get
    /// them so the message sequence stays uniform.
    pub fn send_slab(&self, to: usize, slab: &[f32]) {
        debug_assert_ne!(to, self.rank, "slabs never go to self");
        self.world
            .process_at_rank(to as Rank)
            .send_with_tag(slab, TAG_SLAB_DATA);
    }

    pub fn receive_slab_into(&self, slab: &mut [f32]) {
        self.world
            .process_at_rank(COORDINATOR_RANK as Rank)
            .receive_into_with_tag(slab, TAG_SLAB_DATA);
    }

    /// Return this rank's output band to the coordinator as one message.
    pub fn send_result(&self, band: &[f32]) {
        self.world
            .process_at_rank(COORDINATOR_RANK as Rank)
            .send_with_tag(band, TAG_RESULT_DATA);
    }

    /// Receive a worker's output band straight into `band`, normally a row
    /// span of the assembled output.
    pub fn receive_result_into(&self, from: usize, band: &mut [f32]) -> ConvResult<()> {
        let status = self
            .world
            .process_at_rank(from as Rank)
            .receive_into_with_tag(band, TAG_RESULT_DATA);
        let received = status.count(f32::equivalent_datatype()) as usize;
        if received != band.len() {
            return Err(ConvError::communication(format!(
                "rank {from} returned {received} output values, expected {}",
                band.len()
            )));
        }
        Ok(())
    }

    /// Sum per-rank FLOP counts onto the coordinator.
    pub fn reduce_flops(&self, local: i64) -> Option<i64> {
        let root = self.world.process_at_rank(COORDINATOR_RANK as Rank);
        if self.is_coordinator() {
            let mut total = 0i64;
            root.reduce_into_root(&local, &mut total, SystemOperation::sum());
            Some(total)
        } else {
            root.reduce_into(&local, SystemOperation::sum());
            None
        }
    }

    /// Take the maximum per-rank compute time onto the coordinator.
    pub fn reduce_compute_seconds(&self, local: f64) -> Option<f64> {
        let root = self.world.process_at_rank(COORDINATOR_RANK as Rank);
        if self.is_coordinator() {
            let mut slowest = 0f64;
            root.reduce_into_root(&local, &mut slowest, SystemOperation::max());
            Some(slowest)
        } else {
            root.reduce_into(&local, SystemOperation::max());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_header_round_trips() {
        let header = AssignmentHeader {
            slab_rows: 6,
            slab_cols: 128,
            slab_start_row: 41,
            expected_output_rows: 4,
            stride_align_offset: 1,
        };
        assert_eq!(AssignmentHeader::from_wire(header.to_wire()), header);
    }

    #[test]
    fn zero_row_header_keeps_its_width() {
        // Surplus ranks get an empty slab but the real column count, so the
        // receiving side can build a zero-row matrix without a special case.
        let header = AssignmentHeader {
            slab_rows: 0,
            slab_cols: 17,
            slab_start_row: 0,
            expected_output_rows: 0,
            stride_align_offset: 0,
        };
        assert_eq!(header.to_wire(), [0, 17, 0, 0, 0]);
        assert_eq!(AssignmentHeader::from_wire(header.to_wire()), header);
    }
}

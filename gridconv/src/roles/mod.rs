/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Rank roles for the distributed convolution.
//!
//! Every rank is a [`Participant`]: it picks up an assignment, convolves its
//! slab, and hands the band back. Rank 0 additionally acts as the
//! [`Coordinator`], which owns partitioning before the common phases and
//! reassembly after them. All other ranks run as a [`Worker`].
//!
//! The two roles execute the same phase sequence in lock step, separated by
//! barriers so that the timed compute phase starts and ends together on all
//! ranks. Collective calls therefore appear in identical order on both sides.

pub mod coordinator;
pub mod worker;

pub use coordinator::{BenchOutcome, Coordinator};
pub use worker::Worker;

use crate::error::conv_error::ConvResult;

/// The per-rank phases common to every participant in a convolution job.
///
/// The coordinator fulfils these against its own in-memory slab while workers
/// fulfil them against the wire, but the ordering contract is shared: an
/// assignment is picked up, computed, and returned exactly once, in that
/// order, with the compute phase fenced by barriers on both sides.
pub trait Participant {
    /// Obtain this rank's work: kernel, weights, and the halo-extended slab.
    fn receive_assignment(&mut self) -> ConvResult<()>;

    /// Convolve the local slab. This is the only timed phase; ranks with an
    /// empty band still pass through it and record zero FLOPs.
    fn compute_local(&mut self) -> ConvResult<()>;

    /// Surrender the computed band to the output.
    fn return_result(&mut self) -> ConvResult<()>;
}

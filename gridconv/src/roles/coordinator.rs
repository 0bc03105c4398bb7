/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Rank 0's side of the job.
//!
//! The coordinator owns the full feature map and the kernel. It plans the
//! row bands, broadcasts the kernel, ships each worker its halo-extended
//! slab, then joins the common compute phases against its own band. Workers'
//! bands are received straight into row spans of the assembled output, so
//! reassembly never copies through a staging buffer.

use tracing::{debug, info};

use gridconv_utils::{Matrix, RayonThreadPool, Timer};

use crate::error::conv_error::{ConvError, ConvResult};
use crate::kernel::{conv2d_slab, output_dims, KernelSpec};
use crate::metrics::{BenchReport, ComputeMetrics};
use crate::partition::{plan, WorkAssignment};
use crate::roles::Participant;
use crate::transport::{AssignmentHeader, Cluster, COORDINATOR_RANK};

/// What a completed job leaves on the coordinator: the assembled output and
/// the reduced report.
#[derive(Debug)]
pub struct BenchOutcome {
    pub output: Matrix<f32>,
    pub report: BenchReport,
}

/// The rank 0 role. Construct it with the full input and kernel, then drive
/// the whole job with [`Coordinator::run`].
pub struct Coordinator<'a> {
    cluster: &'a Cluster,
    pool: &'a RayonThreadPool,
    input: Matrix<f32>,
    weights: Matrix<f32>,
    spec: KernelSpec,
    assignments: Vec<WorkAssignment>,
    local_band: Option<Matrix<f32>>,
    metrics: ComputeMetrics,
    output: Matrix<f32>,
}

impl<'a> Coordinator<'a> {
    pub fn new(
        cluster: &'a Cluster,
        pool: &'a RayonThreadPool,
        input: Matrix<f32>,
        weights: Matrix<f32>,
        spec: KernelSpec,
    ) -> ConvResult<Self> {
        assert!(
            cluster.is_coordinator(),
            "the coordinator role belongs to rank {COORDINATOR_RANK}"
        );
        if (weights.nrows(), weights.ncols()) != (spec.kernel_h(), spec.kernel_w()) {
            return Err(ConvError::invalid_dimension(format!(
                "kernel data is {} x {} but the header says {} x {}",
                weights.nrows(),
                weights.ncols(),
                spec.kernel_h(),
                spec.kernel_w()
            )));
        }

        let (out_h, out_w) = output_dims(input.nrows(), input.ncols(), &spec);
        let output = Matrix::zeros(out_h, out_w);
        Ok(Self {
            cluster,
            pool,
            input,
            weights,
            spec,
            assignments: Vec::new(),
            local_band: None,
            metrics: ComputeMetrics::default(),
            output,
        })
    }

    /// Run the job end to end and return the assembled output with its
    /// report. Every other rank must be running [`crate::roles::Worker::run`];
    /// the two sides make the same collective calls in the same order.
    pub fn run(mut self) -> ConvResult<BenchOutcome> {
        self.partition_work()?;
        self.receive_assignment()?;
        self.cluster.barrier();
        self.compute_local()?;
        self.cluster.barrier();
        self.return_result()?;
        self.assemble_output()?;
        let report = self.collect_report()?;
        Ok(BenchOutcome {
            output: self.output,
            report,
        })
    }

    /// Plan the row bands and distribute: kernel header and weights by
    /// broadcast, then each worker's assignment header and slab in rank
    /// order.
    fn partition_work(&mut self) -> ConvResult<()> {
        self.assignments = plan(self.input.nrows(), &self.spec, self.cluster.size())?;
        info!(
            ranks = self.cluster.size(),
            output_rows = self.output.nrows(),
            output_cols = self.output.ncols(),
            "distributing work"
        );

        let mut header = self.spec.wire_header();
        self.cluster.broadcast_kernel_header(&mut header);
        self.cluster.broadcast_weights(self.weights.as_mut_slice());

        for a in &self.assignments[1..] {
            let header = AssignmentHeader {
                slab_rows: a.input_row_count,
                slab_cols: self.input.ncols(),
                slab_start_row: a.input_row_start,
                expected_output_rows: a.output_row_count,
                stride_align_offset: a.stride_align_offset,
            };
            self.cluster.send_assignment_header(a.rank, header);
            let slab = self.input.row_span(a.input_row_start, a.input_row_count);
            self.cluster.send_slab(a.rank, slab.as_slice());
            debug!(
                rank = a.rank,
                slab_rows = a.input_row_count,
                output_rows = a.output_row_count,
                "shipped slab"
            );
        }
        Ok(())
    }

    /// Collect every worker band, in rank order, directly into the output.
    fn assemble_output(&mut self) -> ConvResult<()> {
        for idx in 1..self.assignments.len() {
            let a = self.assignments[idx];
            let mut span = self.output.row_span_mut(a.output_row_start, a.output_row_count);
            self.cluster.receive_result_into(a.rank, span.as_mut_slice())?;
        }
        info!(rows = self.output.nrows(), "assembled output");
        Ok(())
    }

    fn collect_report(&self) -> ConvResult<BenchReport> {
        let total = self.cluster.reduce_flops(self.metrics.flops);
        let slowest = self.cluster.reduce_compute_seconds(self.metrics.seconds);
        match (total, slowest) {
            (Some(total_flops), Some(max_compute_seconds)) => Ok(BenchReport {
                total_flops,
                max_compute_seconds,
            }),
            _ => Err(ConvError::communication(
                "metric reductions did not deliver to the coordinator",
            )),
        }
    }

    fn own_assignment(&self) -> ConvResult<WorkAssignment> {
        self.assignments
            .get(COORDINATOR_RANK)
            .copied()
            .ok_or_else(|| ConvError::communication("no work on record; partitioning has not run"))
    }
}

impl Participant for Coordinator<'_> {
    /// The coordinator's slab never leaves memory; adopting the rank 0 band
    /// from the plan is all the pickup there is.
    fn receive_assignment(&mut self) -> ConvResult<()> {
        let a = self.own_assignment()?;
        debug!(
            output_rows = a.output_row_count,
            slab_rows = a.input_row_count,
            "adopted local band"
        );
        Ok(())
    }

    fn compute_local(&mut self) -> ConvResult<()> {
        let a = self.own_assignment()?;
        let timer = Timer::new();
        let (band, flops) = if a.is_noop() {
            (None, 0)
        } else {
            let slab = self.input.row_span(a.input_row_start, a.input_row_count);
            let (band, flops) = conv2d_slab(
                self.pool,
                slab,
                self.weights.as_view(),
                &self.spec,
                a.stride_align_offset,
                a.output_row_count,
            );
            (Some(band), flops)
        };
        self.metrics = ComputeMetrics {
            flops,
            seconds: timer.elapsed_seconds(),
        };
        self.local_band = band;
        debug!(
            flops = self.metrics.flops,
            seconds = self.metrics.seconds,
            "local compute done"
        );
        Ok(())
    }

    /// Blit the rank 0 band into its output span; nothing goes on the wire.
    fn return_result(&mut self) -> ConvResult<()> {
        let a = self.own_assignment()?;
        if let Some(band) = self.local_band.take() {
            let mut span = self.output.row_span_mut(a.output_row_start, a.output_row_count);
            span.as_mut_slice().copy_from_slice(band.as_slice());
        }
        Ok(())
    }
}

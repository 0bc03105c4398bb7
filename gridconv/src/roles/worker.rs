/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Worker ranks.
//!
//! A worker owns nothing until the coordinator ships it: kernel by
//! broadcast, then its assignment header and slab point to point. It
//! convolves the slab, returns the band, and joins the metric reductions.
//! Surplus ranks receive a zero-row slab and go through every phase anyway
//! so the collective sequence stays identical across ranks.

use tracing::debug;

use gridconv_utils::{Matrix, RayonThreadPool, Timer};

use crate::error::conv_error::{ConvError, ConvResult};
use crate::kernel::{conv2d_slab, KernelSpec};
use crate::metrics::ComputeMetrics;
use crate::roles::Participant;
use crate::transport::{AssignmentHeader, Cluster};

/// Everything distribution leaves on a worker.
struct LocalJob {
    spec: KernelSpec,
    weights: Matrix<f32>,
    header: AssignmentHeader,
    slab: Matrix<f32>,
}

/// A non-zero rank. Drive one job with [`Worker::run`].
pub struct Worker<'a> {
    cluster: &'a Cluster,
    pool: &'a RayonThreadPool,
    job: Option<LocalJob>,
    band: Option<Matrix<f32>>,
    metrics: ComputeMetrics,
}

impl<'a> Worker<'a> {
    pub fn new(cluster: &'a Cluster, pool: &'a RayonThreadPool) -> Self {
        assert!(
            !cluster.is_coordinator(),
            "rank 0 runs the coordinator role"
        );
        Self {
            cluster,
            pool,
            job: None,
            band: None,
            metrics: ComputeMetrics::default(),
        }
    }

    /// Run the worker's side of one job, mirroring the coordinator's
    /// collective order phase for phase.
    pub fn run(mut self) -> ConvResult<()> {
        self.receive_assignment()?;
        self.cluster.barrier();
        self.compute_local()?;
        self.cluster.barrier();
        self.return_result()?;
        self.cluster.reduce_flops(self.metrics.flops);
        self.cluster.reduce_compute_seconds(self.metrics.seconds);
        Ok(())
    }

    fn job(&self) -> ConvResult<&LocalJob> {
        self.job.as_ref().ok_or_else(|| {
            ConvError::communication("no assignment on record; distribution has not run")
        })
    }
}

impl Participant for Worker<'_> {
    fn receive_assignment(&mut self) -> ConvResult<()> {
        let mut kernel_header = [0u64; 4];
        self.cluster.broadcast_kernel_header(&mut kernel_header);
        let spec = KernelSpec::from_wire_header(kernel_header)?;
        let mut weights = Matrix::<f32>::zeros(spec.kernel_h(), spec.kernel_w());
        self.cluster.broadcast_weights(weights.as_mut_slice());

        let header = self.cluster.receive_assignment_header();
        let mut slab_data = vec![0f32; header.slab_rows * header.slab_cols];
        self.cluster.receive_slab_into(&mut slab_data);
        let slab = Matrix::from_vec(slab_data, header.slab_rows, header.slab_cols)?;

        debug!(
            rank = self.cluster.rank(),
            slab_rows = header.slab_rows,
            output_rows = header.expected_output_rows,
            "assignment received"
        );
        self.job = Some(LocalJob {
            spec,
            weights,
            header,
            slab,
        });
        Ok(())
    }

    fn compute_local(&mut self) -> ConvResult<()> {
        let job = self.job()?;
        let rows = job.header.expected_output_rows;
        let timer = Timer::new();
        let (band, flops) = if rows == 0 {
            (None, 0)
        } else {
            let (band, flops) = conv2d_slab(
                self.pool,
                job.slab.as_view(),
                job.weights.as_view(),
                &job.spec,
                job.header.stride_align_offset,
                rows,
            );
            (Some(band), flops)
        };
        self.metrics = ComputeMetrics {
            flops,
            seconds: timer.elapsed_seconds(),
        };
        self.band = band;
        debug!(
            rank = self.cluster.rank(),
            flops = self.metrics.flops,
            seconds = self.metrics.seconds,
            "local compute done"
        );
        Ok(())
    }

    fn return_result(&mut self) -> ConvResult<()> {
        let expected = self.job()?.header.expected_output_rows;
        let band = self.band.take();
        let rows = band.as_ref().map_or(0, |b| b.nrows());
        if rows != expected {
            return Err(ConvError::communication(format!(
                "computed {rows} output rows but the assignment expects {expected}"
            )));
        }
        let data: &[f32] = band.as_ref().map_or(&[], |b| b.as_slice());
        self.cluster.send_result(data);
        Ok(())
    }
}

/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use gridconv::kernel::KernelSpec;
use gridconv::roles::{Coordinator, Worker};
use gridconv::transport::Cluster;
use gridconv_tools::utils::{
    init_subscriber, load_bench_matrices, resolve_matrix_source, CMDResult, CMDToolError,
};
use gridconv_utils::{create_thread_pool, write_matrix, RayonThreadPool};

/// Distributed 2D convolution benchmark. Launch one process per rank with
/// `mpirun`; rank 0 coordinates and prints `<total flops> <max seconds>`.
#[derive(Debug, Parser)]
struct ConvBenchArgs {
    /// Feature map height for generated input (0 = read from -f)
    #[arg(short = 'H', default_value_t = 0)]
    pub height: usize,

    /// Feature map width for generated input
    #[arg(short = 'W', default_value_t = 0)]
    pub width: usize,

    /// Feature map text file, required unless all dimensions are given
    #[arg(short = 'f')]
    pub input_path: Option<PathBuf>,

    /// Kernel text file, required unless all dimensions are given
    #[arg(short = 'g')]
    pub kernel_path: Option<PathBuf>,

    /// Destination for the assembled output; omit to skip writing
    #[arg(short = 'o')]
    pub output_path: Option<PathBuf>,

    /// Kernel height for generated kernels (0 = read from -g)
    #[arg(long = "kH", default_value_t = 0)]
    pub kernel_height: usize,

    /// Kernel width for generated kernels
    #[arg(long = "kW", default_value_t = 0)]
    pub kernel_width: usize,

    /// Output stride along rows
    #[arg(long = "sH", default_value_t = 1)]
    pub stride_h: usize,

    /// Output stride along columns
    #[arg(long = "sW", default_value_t = 1)]
    pub stride_w: usize,

    /// Rayon pool width per rank (0 = one thread per core)
    #[arg(long = "threads", default_value_t = 0)]
    pub threads: usize,

    /// RNG seed for generation; omitted means OS entropy
    #[arg(long = "seed")]
    pub seed: Option<u64>,
}

fn main() -> CMDResult<()> {
    init_subscriber();

    let args = ConvBenchArgs::parse();

    let _universe = mpi::initialize().ok_or_else(|| CMDToolError {
        details: "Error: MPI initialization failed".to_string(),
    })?;
    let cluster = Cluster::new(_universe.world());

    let pool = match create_thread_pool(args.threads) {
        Ok(pool) => pool,
        Err(err) => {
            eprintln!("Error: failed to build the rayon pool: {err}");
            cluster.abort(1)
        }
    };

    let result = if cluster.is_coordinator() {
        run_coordinator(&args, &cluster, &pool)
    } else {
        Worker::new(&cluster, &pool).run().map_err(CMDToolError::from)
    };

    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            eprintln!("Error: {:?}", err);
            // A lone failed rank would leave the rest blocked forever.
            cluster.abort(1)
        }
    }
}

fn run_coordinator(
    args: &ConvBenchArgs,
    cluster: &Cluster,
    pool: &RayonThreadPool,
) -> CMDResult<()> {
    let source = resolve_matrix_source(
        args.height,
        args.width,
        args.kernel_height,
        args.kernel_width,
        args.input_path.clone(),
        args.kernel_path.clone(),
    )?;
    let (input, weights) = load_bench_matrices(&source, args.seed)?;
    let spec = KernelSpec::new(
        weights.nrows(),
        weights.ncols(),
        args.stride_h,
        args.stride_w,
    )?;
    info!(
        input_rows = input.nrows(),
        input_cols = input.ncols(),
        kernel_rows = spec.kernel_h(),
        kernel_cols = spec.kernel_w(),
        stride_h = spec.stride_h(),
        stride_w = spec.stride_w(),
        threads = pool.current_num_threads(),
        "starting convolution benchmark"
    );

    let outcome = Coordinator::new(cluster, pool, input, weights, spec)?.run()?;
    println!("{}", outcome.report.report_line());

    if let Some(path) = &args.output_path {
        write_matrix(path, &outcome.output).map_err(|err| CMDToolError {
            details: format!("failed to write {}: {err}", path.display()),
        })?;
        info!(path = %path.display(), "wrote assembled output");
    }
    Ok(())
}

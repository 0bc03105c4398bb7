/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Resolution of the benchmark's input matrices from command line options.
//!
//! The rule matches the CLI contract: when all four of the feature map and
//! kernel dimensions are non-zero the matrices are generated, and any paths
//! given alongside become write-back destinations so the run can be repeated
//! from files. Otherwise both paths are required and the matrices are read.

use std::path::{Path, PathBuf};

use gridconv_utils::{
    create_rnd, create_rnd_from_seed, random_matrix, read_matrix, write_matrix, Matrix,
};

use crate::utils::{CMDResult, CMDToolError};

/// How the coordinator obtains the feature map and kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixSource {
    /// Generate matrices of the given shapes, writing them back to the paths
    /// when supplied.
    Generate {
        height: usize,
        width: usize,
        kernel_height: usize,
        kernel_width: usize,
        input_path: Option<PathBuf>,
        kernel_path: Option<PathBuf>,
    },
    /// Read both matrices from existing files.
    Read {
        input_path: PathBuf,
        kernel_path: PathBuf,
    },
}

/// Decide between generation and file input.
pub fn resolve_matrix_source(
    height: usize,
    width: usize,
    kernel_height: usize,
    kernel_width: usize,
    input_path: Option<PathBuf>,
    kernel_path: Option<PathBuf>,
) -> CMDResult<MatrixSource> {
    if height != 0 && width != 0 && kernel_height != 0 && kernel_width != 0 {
        return Ok(MatrixSource::Generate {
            height,
            width,
            kernel_height,
            kernel_width,
            input_path,
            kernel_path,
        });
    }
    match (input_path, kernel_path) {
        (Some(input_path), Some(kernel_path)) => Ok(MatrixSource::Read {
            input_path,
            kernel_path,
        }),
        _ => Err(CMDToolError {
            details: "Error: without all of -H, -W, --kH and --kW, both -f and -g are required"
                .to_string(),
        }),
    }
}

/// Produce the feature map and kernel for one run.
///
/// `seed` only matters for generation; `None` draws from OS entropy.
pub fn load_bench_matrices(
    source: &MatrixSource,
    seed: Option<u64>,
) -> CMDResult<(Matrix<f32>, Matrix<f32>)> {
    match source {
        MatrixSource::Generate {
            height,
            width,
            kernel_height,
            kernel_width,
            input_path,
            kernel_path,
        } => {
            let mut rng = match seed {
                Some(seed) => create_rnd_from_seed(seed),
                None => create_rnd(),
            };
            let input = random_matrix(*height, *width, &mut rng);
            let weights = random_matrix(*kernel_height, *kernel_width, &mut rng);
            if let Some(path) = input_path {
                write_back(path, &input)?;
            }
            if let Some(path) = kernel_path {
                write_back(path, &weights)?;
            }
            Ok((input, weights))
        }
        MatrixSource::Read {
            input_path,
            kernel_path,
        } => {
            let input = read_from(input_path)?;
            let weights = read_from(kernel_path)?;
            Ok((input, weights))
        }
    }
}

fn read_from(path: &Path) -> CMDResult<Matrix<f32>> {
    read_matrix(path).map_err(|err| CMDToolError {
        details: format!("failed to read {}: {err}", path.display()),
    })
}

fn write_back(path: &Path, matrix: &Matrix<f32>) -> CMDResult<()> {
    write_matrix(path, matrix).map_err(|err| CMDToolError {
        details: format!("failed to write {}: {err}", path.display()),
    })
}

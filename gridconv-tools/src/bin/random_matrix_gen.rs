/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::path::PathBuf;

use clap::Parser;
use gridconv_tools::utils::{CMDResult, CMDToolError};
use gridconv_utils::{create_rnd, create_rnd_from_seed, random_matrix, write_matrix};

/// Generate a random matrix text file for benchmark input.
#[derive(Debug, Parser)]
struct RandomMatrixGenArgs {
    /// Number of rows
    #[arg(long = "height", required = true)]
    pub height: usize,

    /// Number of columns
    #[arg(long = "width", required = true)]
    pub width: usize,

    /// File name for saving the matrix
    #[arg(long = "output", required = true)]
    pub output: PathBuf,

    /// RNG seed; omitted means OS entropy
    #[arg(long = "seed")]
    pub seed: Option<u64>,
}

fn main() -> CMDResult<()> {
    let args: RandomMatrixGenArgs = RandomMatrixGenArgs::parse();

    if args.height == 0 || args.width == 0 {
        return Err(CMDToolError {
            details: "Error: height and width must be positive".to_string(),
        });
    }

    let mut rng = match args.seed {
        Some(seed) => create_rnd_from_seed(seed),
        None => create_rnd(),
    };
    let matrix = random_matrix(args.height, args.width, &mut rng);
    match write_matrix(&args.output, &matrix) {
        Ok(()) => {
            println!("Successfully generated random matrix");
            Ok(())
        }
        Err(err) => {
            let err = CMDToolError {
                details: format!("failed to write {}: {err}", args.output.display()),
            };
            eprintln!("Error: {:?}", err);
            Err(err)
        }
    }
}

/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Shared building blocks for the gridconv benchmark: dense matrix views,
//! the text matrix file format, RNG helpers, a wall-clock timer, and rayon
//! pool construction.

pub mod io;
#[cfg(feature = "rayon")]
pub mod pool;
pub mod random;
pub mod timer;
pub mod views;

pub use io::{read_matrix, write_matrix, ReadMatrixError, WriteMatrixError};
#[cfg(feature = "rayon")]
pub use pool::{
    create_thread_pool, create_thread_pool_for_bench, create_thread_pool_for_test, RayonThreadPool,
};
pub use random::{create_rnd, create_rnd_from_seed, create_rnd_in_tests, random_matrix, StandardRng};
pub use timer::Timer;
pub use views::{Matrix, MatrixBase, MatrixView, MutMatrixView, ShapeError};

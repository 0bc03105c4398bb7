/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::views::Matrix;

/// The RNG used whenever the benchmark generates data.
pub type StandardRng = StdRng;

/// Seed for deterministic fixtures in tests.
pub const DEFAULT_SEED_FOR_TESTS: u64 = 42;

pub fn create_rnd_from_seed(seed: u64) -> StandardRng {
    StandardRng::seed_from_u64(seed)
}

pub fn create_rnd() -> StandardRng {
    StandardRng::from_os_rng()
}

pub fn create_rnd_in_tests() -> StandardRng {
    create_rnd_from_seed(DEFAULT_SEED_FOR_TESTS)
}

/// A `rows x cols` matrix of uniform `[0, 1)` values drawn from `rng`.
pub fn random_matrix(nrows: usize, ncols: usize, rng: &mut StandardRng) -> Matrix<f32> {
    Matrix::from_fn(nrows, ncols, |_, _| rng.random::<f32>())
}

/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// A dedicated rayon pool; every parallel section of the convolution runs
/// inside one so the per-rank thread count is controlled by configuration
/// rather than the global pool.
pub struct RayonThreadPool(ThreadPool);

impl RayonThreadPool {
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.0.install(op)
    }

    pub fn current_num_threads(&self) -> usize {
        self.0.current_num_threads()
    }
}

/// Build a pool with `num_threads` workers. `0` delegates the choice to
/// rayon (one thread per core).
pub fn create_thread_pool(num_threads: usize) -> Result<RayonThreadPool, ThreadPoolBuildError> {
    let pool = ThreadPoolBuilder::new().num_threads(num_threads).build()?;
    Ok(RayonThreadPool(pool))
}

/// Pool for tests. `GRIDCONV_TEST_POOL_THREADS` overrides the width.
pub fn create_thread_pool_for_test() -> RayonThreadPool {
    let num_threads = std::env::var("GRIDCONV_TEST_POOL_THREADS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3);
    create_thread_pool(num_threads).expect("failed to build the test thread pool")
}

/// Full-width pool for benchmarks.
pub fn create_thread_pool_for_bench() -> RayonThreadPool {
    create_thread_pool(0).expect("failed to build the bench thread pool")
}

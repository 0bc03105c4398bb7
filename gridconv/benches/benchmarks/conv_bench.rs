/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use criterion::{black_box, Criterion};
use gridconv::kernel::{conv2d_slab, KernelSpec};
use gridconv_utils::{create_rnd_from_seed, create_thread_pool_for_bench, random_matrix};

const SLAB_ROWS: usize = 512;
const SLAB_COLS: usize = 512;
const KERNEL_SIDE: usize = 9;

pub fn benchmark_conv2d_slab(c: &mut Criterion) {
    let rng = &mut create_rnd_from_seed(42);
    let pool = create_thread_pool_for_bench();
    let slab = random_matrix(SLAB_ROWS, SLAB_COLS, rng);
    let weights = random_matrix(KERNEL_SIDE, KERNEL_SIDE, rng);
    let spec = KernelSpec::new(KERNEL_SIDE, KERNEL_SIDE, 1, 1).unwrap();

    let mut group = c.benchmark_group("conv2d-slab");
    group.sample_size(50);

    group.bench_function("9x9 unit stride", |f| {
        f.iter(|| {
            black_box(conv2d_slab(
                &pool,
                black_box(slab.as_view()),
                weights.as_view(),
                &spec,
                0,
                SLAB_ROWS,
            ))
        })
    });
}

pub fn benchmark_strided_conv2d_slab(c: &mut Criterion) {
    let rng = &mut create_rnd_from_seed(42);
    let pool = create_thread_pool_for_bench();
    let slab = random_matrix(SLAB_ROWS, SLAB_COLS, rng);
    let weights = random_matrix(KERNEL_SIDE, KERNEL_SIDE, rng);
    let spec = KernelSpec::new(KERNEL_SIDE, KERNEL_SIDE, 2, 2).unwrap();
    let output_rows = SLAB_ROWS.div_ceil(2);

    let mut group = c.benchmark_group("conv2d-slab");
    group.sample_size(50);

    group.bench_function("9x9 stride 2", |f| {
        f.iter(|| {
            black_box(conv2d_slab(
                &pool,
                black_box(slab.as_view()),
                weights.as_view(),
                &spec,
                0,
                output_rows,
            ))
        })
    });
}

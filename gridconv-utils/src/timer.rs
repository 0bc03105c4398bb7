/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::time::{Duration, Instant};

/// Wall-clock stopwatch for the timed compute phase.
#[derive(Debug, Clone)]
pub struct Timer {
    check_point: Instant,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        Self {
            check_point: Instant::now(),
        }
    }

    pub fn reset(&mut self) {
        self.check_point = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        Instant::now() - self.check_point
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }
}

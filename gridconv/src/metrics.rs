/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! FLOP and wall-clock accounting.
//!
//! Each rank counts floating point operations (two per kernel tap) and times
//! the compute phase alone; distribution and reassembly are excluded. The
//! coordinator reduces the counts to a total and the times to the slowest
//! rank, which together make the benchmark's figure of merit.

/// One rank's compute-phase measurements.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ComputeMetrics {
    pub flops: i64,
    pub seconds: f64,
}

/// The reduced, job-wide result the coordinator reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchReport {
    pub total_flops: i64,
    pub max_compute_seconds: f64,
}

impl BenchReport {
    /// The benchmark's output line: total FLOPs, a space, and the slowest
    /// rank's seconds with six decimals.
    pub fn report_line(&self) -> String {
        format!("{} {:.6}", self.total_flops, self.max_compute_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_line_is_flops_space_seconds() {
        let report = BenchReport {
            total_flops: 123_456,
            max_compute_seconds: 0.123_456_7,
        };
        assert_eq!(report.report_line(), "123456 0.123457");
    }

    #[test]
    fn report_line_pads_to_six_decimals() {
        let report = BenchReport {
            total_flops: 0,
            max_compute_seconds: 0.0,
        };
        assert_eq!(report.report_line(), "0 0.000000");

        let report = BenchReport {
            total_flops: 9_000_000_000,
            max_compute_seconds: 12.5,
        };
        assert_eq!(report.report_line(), "9000000000 12.500000");
    }
}

//! Throughput benchmark runner
//!
//! Filter and skip patterns are explicit configuration, never read from the
//! ambient process environment.

use crate::application::constants::{
    BENCH_CALIBRATION, BENCH_ROUNDS, BENCH_ROUND_DURATION, BENCH_WARMUP,
};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Benchmark runner configuration
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Only run benchmarks whose name contains this pattern
    pub filter: Option<String>,
    /// Skip benchmarks whose name contains this pattern
    pub skip: Option<String>,
    /// Idle time before measuring, to let noisy neighbours settle
    pub warmup: Duration,
    /// Time spent estimating the per-round step size
    pub calibration: Duration,
    pub rounds: usize,
    pub round_duration: Duration,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            filter: None,
            skip: None,
            warmup: BENCH_WARMUP,
            calibration: BENCH_CALIBRATION,
            rounds: BENCH_ROUNDS,
            round_duration: BENCH_ROUND_DURATION,
        }
    }
}

/// Throughput of one benchmark (operations per second)
#[derive(Debug, Clone, PartialEq)]
pub struct BenchResult {
    pub name: String,
    pub mean: f64,
    pub stddev: f64,
}

pub struct BenchRunner {
    config: BenchConfig,
}

impl BenchRunner {
    pub fn new(config: BenchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// True if `name` passes the filter and is not skipped
    pub fn should_run(&self, name: &str) -> bool {
        let filter = self.config.filter.as_deref().filter(|p| !p.is_empty());
        let skip = self.config.skip.as_deref().filter(|p| !p.is_empty());

        filter.map_or(true, |pattern| name.contains(pattern))
            && !skip.map_or(false, |pattern| name.contains(pattern))
    }

    /// Measure `f` and return its throughput, or `None` if filtered out
    pub fn timeit<F: FnMut()>(&self, name: &str, multiplier: f64, mut f: F) -> Option<BenchResult> {
        if !self.should_run(name) {
            debug!(name = %name, "Benchmark filtered out");
            return None;
        }
        std::thread::sleep(self.config.warmup);

        let start = Instant::now();
        let mut count = 0usize;
        while start.elapsed() < self.config.calibration {
            f();
            count += 1;
        }
        let step = count / 10 + 1;

        let mut samples = Vec::with_capacity(self.config.rounds);
        for _ in 0..self.config.rounds {
            let start = Instant::now();
            let mut count = 0usize;
            while start.elapsed() < self.config.round_duration {
                for _ in 0..step {
                    f();
                }
                count += step;
            }
            samples.push(multiplier * count as f64 / start.elapsed().as_secs_f64());
        }

        Some(summarize(name, &samples))
    }

    /// Async variant of [`timeit`](Self::timeit); the warmup yields instead of blocking
    pub async fn timeit_async<F, Fut>(
        &self,
        name: &str,
        multiplier: f64,
        mut f: F,
    ) -> Option<BenchResult>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        if !self.should_run(name) {
            debug!(name = %name, "Benchmark filtered out");
            return None;
        }
        tokio::time::sleep(self.config.warmup).await;

        let start = Instant::now();
        let mut count = 0usize;
        while start.elapsed() < self.config.calibration {
            f().await;
            count += 1;
        }
        let step = count / 10 + 1;

        let mut samples = Vec::with_capacity(self.config.rounds);
        for _ in 0..self.config.rounds {
            let start = Instant::now();
            let mut count = 0usize;
            while start.elapsed() < self.config.round_duration {
                for _ in 0..step {
                    f().await;
                }
                count += step;
            }
            samples.push(multiplier * count as f64 / start.elapsed().as_secs_f64());
        }

        Some(summarize(name, &samples))
    }
}

/// Mean and population standard deviation of the round throughputs
fn summarize(name: &str, samples: &[f64]) -> BenchResult {
    let n = samples.len().max(1) as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    info!(
        name = %name,
        per_second = mean,
        stddev = stddev,
        "Benchmark finished"
    );

    BenchResult {
        name: name.to_string(),
        mean,
        stddev,
    }
}

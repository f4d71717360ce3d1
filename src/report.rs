use std::{
    fmt,
    future::Future,
    io::{self, Write},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    config::{RunConfig, TrafficPattern},
    engine::RunOutcome,
    error::ReportError,
    tracker::{ExecutionSnapshot, ExecutionTracker, LatencySnapshot, LatencyTracker},
};

/// Final figures of one run, derived from the trackers once every worker has
/// resolved.
///
/// A report is plain data: it does no I/O and can be serialized, compared or
/// handed to any [`Reporter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub name: String,
    pub pattern: TrafficPattern,
    pub workers: usize,
    pub elapsed: Duration,
    pub counts: ExecutionSnapshot,
    /// Successful operations per second of wall-clock time.
    pub qps: f64,
    pub latency: LatencySnapshot,
    /// Workers that terminated before the stop signal.
    pub failed_workers: usize,
}

impl RunReport {
    pub fn collect(
        config: &RunConfig,
        execution: &ExecutionTracker,
        latency: &LatencyTracker,
        outcome: &RunOutcome,
    ) -> Self {
        let counts = execution.snapshot();
        let secs = outcome.elapsed.as_secs_f64();
        let qps = if secs > 0.0 {
            counts.success as f64 / secs
        } else {
            0.0
        };

        Self {
            name: config.name.clone(),
            pattern: config.pattern,
            workers: config.workers,
            elapsed: outcome.elapsed,
            counts,
            qps,
            latency: latency.snapshot(),
            failed_workers: outcome.failed_workers(),
        }
    }

    /// Share of reported outcomes that were errors, in `[0, 1]`.
    pub fn error_ratio(&self) -> f64 {
        match self.counts.total() {
            0 => 0.0,
            total => self.counts.errors as f64 / total as f64,
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "scenario:       {}", self.name)?;
        writeln!(f, "pattern:        {}", self.pattern.name())?;
        writeln!(
            f,
            "workers:        {} ({} ended early)",
            self.workers, self.failed_workers
        )?;
        writeln!(f, "elapsed:        {:?}", self.elapsed)?;
        writeln!(f, "qps:            {:.1}", self.qps)?;
        writeln!(f, "success:        {}", self.counts.success)?;
        writeln!(f, "misses:         {}", self.counts.misses)?;
        writeln!(
            f,
            "errors:         {} ({:.2}%)",
            self.counts.errors,
            self.error_ratio() * 100.0
        )?;
        writeln!(f, "latency count:  {}", self.latency.count)?;
        writeln!(
            f,
            "latency:        mean {:?}, p50 {:?}, p95 {:?}, p99 {:?}, max {:?}",
            self.latency.mean, self.latency.p50, self.latency.p95, self.latency.p99, self.latency.max
        )
    }
}

/// Sends a [`RunReport`] somewhere: a terminal, a file, a metrics backend.
pub trait Reporter {
    fn report(&self, report: &RunReport) -> impl Future<Output = Result<(), ReportError>> + Send;
}

/// Human-readable report on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextReporter;

impl Reporter for TextReporter {
    async fn report(&self, report: &RunReport) -> Result<(), ReportError> {
        write!(io::stdout().lock(), "{report}")?;
        Ok(())
    }
}

/// JSON report on stdout, one document per run.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReporter {
    pub pretty: bool,
}

impl JsonReporter {
    pub fn render(&self, report: &RunReport) -> Result<String, ReportError> {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };
        Ok(rendered)
    }
}

impl Reporter for JsonReporter {
    async fn report(&self, report: &RunReport) -> Result<(), ReportError> {
        let rendered = self.render(report)?;
        writeln!(io::stdout().lock(), "{rendered}")?;
        Ok(())
    }
}

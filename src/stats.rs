//! Statistics collection and export for simulation runs.
//!
//! The kernel maintains a [`KernelStats`] while running; [`SimulationStats`]
//! wraps it with run metadata and wall-clock figures and exports to JSON or
//! CSV for analysis.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use crate::types::SimTime;

/// Aggregate statistics for a simulation run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SimulationStats {
    /// Run metadata
    pub metadata: SimulationMetadata,

    /// Kernel-level statistics
    pub kernel: KernelStats,

    /// Wall-clock performance
    pub perf: PerfStats,
}

/// Metadata about the simulation run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SimulationMetadata {
    /// Run name/description
    pub name: String,

    /// Start time (wall clock)
    pub start_time: Option<String>,

    /// End time (wall clock)
    pub end_time: Option<String>,

    /// Crate version
    pub version: String,
}

/// Counters maintained by the event kernel.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct KernelStats {
    /// Final simulated time
    pub final_time: SimTime,

    /// Timestamp batches executed
    pub batches: u64,

    /// Events popped and applied
    pub events_processed: u64,

    /// Events inserted into the queue
    pub events_scheduled: u64,

    /// Lenient propagations dropped against an equal pending value
    pub events_coalesced: u64,

    /// Pending propagations cancelled by an earlier contamination
    pub events_superseded: u64,

    /// Contamination-phase device evaluations
    pub contamination_evals: u64,

    /// Propagation-phase device evaluations
    pub propagation_evals: u64,

    /// Largest queue length observed
    pub peak_queue_len: usize,

    /// Nodes in the finalized graph
    pub node_count: usize,

    /// Devices in the finalized graph
    pub device_count: usize,
}

/// Wall-clock performance figures.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PerfStats {
    /// Total wall-clock time in milliseconds
    pub total_wall_time_ms: f64,

    /// Simulated nanoseconds per wall-clock second
    pub sim_time_per_second: f64,

    /// Events processed per wall-clock second
    pub events_per_second: f64,
}

impl SimulationStats {
    /// Creates a new empty statistics container.
    pub fn new() -> Self {
        SimulationStats {
            metadata: SimulationMetadata {
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Sets the run name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.metadata.name = name.into();
        self
    }

    /// Records the start time.
    pub fn record_start(&mut self) {
        self.metadata.start_time = Some(wall_clock_now());
    }

    /// Records the end time.
    pub fn record_end(&mut self) {
        self.metadata.end_time = Some(wall_clock_now());
    }

    /// Updates performance figures from elapsed wall-clock time.
    pub fn compute_perf(&mut self, wall_time_ms: f64) {
        self.perf.total_wall_time_ms = wall_time_ms;
        if wall_time_ms > 0.0 {
            let seconds = wall_time_ms / 1000.0;
            self.perf.sim_time_per_second = self.kernel.final_time / seconds;
            self.perf.events_per_second = self.kernel.events_processed as f64 / seconds;
        }
    }

    /// Exports statistics to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Exports statistics to a JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Exports summary statistics to CSV.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();
        csv.push_str("metric,value\n");
        csv.push_str(&format!("final_time,{}\n", self.kernel.final_time));
        csv.push_str(&format!("batches,{}\n", self.kernel.batches));
        csv.push_str(&format!("events_processed,{}\n", self.kernel.events_processed));
        csv.push_str(&format!("events_scheduled,{}\n", self.kernel.events_scheduled));
        csv.push_str(&format!("events_coalesced,{}\n", self.kernel.events_coalesced));
        csv.push_str(&format!("events_superseded,{}\n", self.kernel.events_superseded));
        csv.push_str(&format!("contamination_evals,{}\n", self.kernel.contamination_evals));
        csv.push_str(&format!("propagation_evals,{}\n", self.kernel.propagation_evals));
        csv.push_str(&format!("peak_queue_len,{}\n", self.kernel.peak_queue_len));
        csv.push_str(&format!("node_count,{}\n", self.kernel.node_count));
        csv.push_str(&format!("device_count,{}\n", self.kernel.device_count));
        csv.push_str(&format!("wall_time_ms,{:.2}\n", self.perf.total_wall_time_ms));
        csv.push_str(&format!("events_per_second,{:.2}\n", self.perf.events_per_second));
        csv
    }

    /// Exports summary statistics to a CSV file.
    pub fn to_csv_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        std::fs::write(path, self.to_csv())
    }

    /// Writes a human-readable summary to a writer.
    pub fn write_summary<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        writeln!(w, "=== Simulation Statistics ===")?;
        writeln!(w)?;

        if !self.metadata.name.is_empty() {
            writeln!(w, "Name: {}", self.metadata.name)?;
        }
        if let Some(ref start) = self.metadata.start_time {
            writeln!(w, "Started: {}", start)?;
        }
        if let Some(ref end) = self.metadata.end_time {
            writeln!(w, "Ended: {}", end)?;
        }
        writeln!(w)?;

        writeln!(w, "--- Kernel ---")?;
        writeln!(w, "Final time: {} ns", self.kernel.final_time)?;
        writeln!(w, "Batches: {}", self.kernel.batches)?;
        writeln!(w, "Events processed: {}", self.kernel.events_processed)?;
        writeln!(w, "Events scheduled: {}", self.kernel.events_scheduled)?;
        writeln!(w, "Events coalesced: {}", self.kernel.events_coalesced)?;
        writeln!(w, "Events superseded: {}", self.kernel.events_superseded)?;
        writeln!(
            w,
            "Device evals: {} contamination, {} propagation",
            self.kernel.contamination_evals, self.kernel.propagation_evals
        )?;
        writeln!(w, "Peak queue length: {}", self.kernel.peak_queue_len)?;
        writeln!(
            w,
            "Graph: {} nodes, {} devices",
            self.kernel.node_count, self.kernel.device_count
        )?;
        writeln!(w)?;

        writeln!(w, "--- Performance ---")?;
        writeln!(w, "Wall time: {:.2} ms", self.perf.total_wall_time_ms)?;
        writeln!(w, "Sim ns/sec: {:.2}", self.perf.sim_time_per_second)?;
        writeln!(w, "Events/sec: {:.2}", self.perf.events_per_second)?;

        Ok(())
    }

    /// Returns a summary string.
    pub fn summary(&self) -> String {
        let mut buf = Vec::new();
        // writing to a Vec cannot fail
        let _ = self.write_summary(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// A simple timer for measuring wall-clock time.
#[derive(Debug)]
pub struct Timer {
    start: std::time::Instant,
}

impl Timer {
    /// Starts a new timer.
    pub fn start() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }

    /// Returns elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns elapsed time in seconds.
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::start()
    }
}

/// Returns the current timestamp as a string.
fn wall_clock_now() -> String {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}s", duration.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_creation() {
        let stats = SimulationStats::new().with_name("adder sweep");
        assert_eq!(stats.metadata.name, "adder sweep");
        assert!(!stats.metadata.version.is_empty());
    }

    #[test]
    fn test_stats_json_export() {
        let mut stats = SimulationStats::new();
        stats.kernel.final_time = 1000.0;
        stats.kernel.events_processed = 42;

        let json = stats.to_json().unwrap();
        assert!(json.contains("1000"));
        assert!(json.contains("42"));
    }

    #[test]
    fn test_stats_csv_export() {
        let mut stats = SimulationStats::new();
        stats.kernel.events_processed = 500;
        stats.kernel.events_coalesced = 7;

        let csv = stats.to_csv();
        assert!(csv.contains("events_processed,500"));
        assert!(csv.contains("events_coalesced,7"));
    }

    #[test]
    fn test_compute_perf() {
        let mut stats = SimulationStats::new();
        stats.kernel.final_time = 2000.0;
        stats.kernel.events_processed = 1000;
        stats.compute_perf(500.0);
        assert_eq!(stats.perf.sim_time_per_second, 4000.0);
        assert_eq!(stats.perf.events_per_second, 2000.0);
    }

    #[test]
    fn test_timer() {
        let timer = Timer::start();
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 10.0);
    }

    #[test]
    fn test_summary_output() {
        let mut stats = SimulationStats::new().with_name("summary test");
        stats.kernel.final_time = 100.0;
        let summary = stats.summary();
        assert!(summary.contains("summary test"));
        assert!(summary.contains("100"));
    }
}

/*
 * Created on Sat Nov 25 2023
 *
 * This file is a part of ttl-bench
 * ttl-bench is a mixed-workload benchmark runner for TTL-enabled
 * MySQL-compatible databases, built alongside Skytable by Sayan Nandan
 * ("the Author").
 *
 * Copyright (c) 2023, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # Final report
//!
//! Built once after the workers have drained, persisted as pretty-printed JSON and summarized on
//! stdout.

use {
    crate::{
        bench::StopReason,
        config::{BenchConfig, DatabaseConfig, WorkloadConfig},
        error::BenchResult,
        metrics::MetricsSnapshot,
        runtime::reporter::DataCountSample,
        util::{fmt_signed, fmt_u64},
    },
    chrono::{Local, Utc},
    serde::Serialize,
    std::{
        fs::{self, File, OpenOptions},
        io::{self, BufWriter, ErrorKind, Write},
        path::{Path, PathBuf},
        time::Duration,
    },
};

const REPORT_FILE_PREFIX: &str = "ttl_benchmark_report";
/// A run counts as stabilized when it ends within this fraction of its starting row count
const STABILIZED_FRACTION: f64 = 0.1;

/*
    ttl effectiveness
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStatus {
    InsufficientData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TtlSummary {
    pub initial_count: u64,
    pub final_count: u64,
    pub max_count: u64,
    pub net_change: i64,
    pub peak_growth: i64,
    pub ttl_working: bool,
    pub data_stabilized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TtlEffectiveness {
    Insufficient { status: SampleStatus },
    Measured(TtlSummary),
}

impl TtlEffectiveness {
    /// Needs at least two samples
    pub fn from_samples(samples: &[DataCountSample]) -> Self {
        let (Some(first), Some(last), true) = (samples.first(), samples.last(), samples.len() >= 2)
        else {
            return Self::Insufficient {
                status: SampleStatus::InsufficientData,
            };
        };
        let (initial_count, final_count) = (first.count, last.count);
        let max_count = samples.iter().map(|s| s.count).max().unwrap_or(final_count);
        Self::Measured(TtlSummary {
            initial_count,
            final_count,
            max_count,
            net_change: final_count as i64 - initial_count as i64,
            peak_growth: max_count as i64 - initial_count as i64,
            ttl_working: final_count < max_count,
            data_stabilized: (final_count.abs_diff(initial_count) as f64)
                < initial_count as f64 * STABILIZED_FRACTION,
        })
    }
    pub fn summary(&self) -> Option<&TtlSummary> {
        match self {
            Self::Measured(s) => Some(s),
            Self::Insufficient { .. } => None,
        }
    }
}

/*
    report
*/

#[derive(Debug, Clone, Serialize)]
pub struct RunResults {
    pub duration_seconds: f64,
    pub stop_reason: StopReason,
    pub total_writes: u64,
    pub total_inserts: u64,
    pub total_updates: u64,
    pub total_single_row_ops: u64,
    pub total_reads: u64,
    pub write_tps: f64,
    pub read_tps: f64,
    pub avg_write_latency_ms: f64,
    pub avg_read_latency_ms: f64,
    pub max_write_latency_ms: f64,
    pub max_read_latency_ms: f64,
    pub write_errors: u64,
    pub read_errors: u64,
    pub ttl_effectiveness: TtlEffectiveness,
}

impl RunResults {
    pub fn new(
        snap: &MetricsSnapshot,
        elapsed: Duration,
        stop_reason: StopReason,
        samples: &[DataCountSample],
    ) -> Self {
        Self {
            duration_seconds: elapsed.as_secs_f64(),
            stop_reason,
            total_writes: snap.total_writes,
            total_inserts: snap.total_inserts,
            total_updates: snap.total_updates,
            total_single_row_ops: snap.total_single_row_ops,
            total_reads: snap.total_reads,
            write_tps: snap.write_tps(elapsed),
            read_tps: snap.read_tps(elapsed),
            avg_write_latency_ms: snap.avg_write_latency_ms,
            avg_read_latency_ms: snap.avg_read_latency_ms,
            max_write_latency_ms: snap.max_write_latency_ms,
            max_read_latency_ms: snap.max_read_latency_ms,
            write_errors: snap.write_errors,
            read_errors: snap.read_errors,
            ttl_effectiveness: TtlEffectiveness::from_samples(samples),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalReport {
    pub benchmark_config: WorkloadConfig,
    pub database_config: DatabaseConfig,
    pub results: RunResults,
    pub data_count_timeline: Vec<DataCountSample>,
    pub timestamp: String,
}

impl FinalReport {
    pub fn new(cfg: &BenchConfig, results: RunResults, timeline: Vec<DataCountSample>) -> Self {
        Self {
            benchmark_config: cfg.workload.clone(),
            database_config: cfg.db.clone(),
            results,
            data_count_timeline: timeline,
            timestamp: Local::now()
                .naive_local()
                .format("%Y-%m-%dT%H:%M:%S%.6f")
                .to_string(),
        }
    }
    /// Writes the report into `dir` as `ttl_benchmark_report_<unix time>.json`, adding a numeric
    /// suffix if a report of that name already exists. Returns the path written to
    pub fn persist(&self, dir: &Path) -> BenchResult<PathBuf> {
        fs::create_dir_all(dir)?;
        let stem = format!("{REPORT_FILE_PREFIX}_{}", Utc::now().timestamp());
        let (path, file) = create_unique(dir, &stem)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(path)
    }
    pub fn print_summary(&self) {
        let r = &self.results;
        let rule = "=".repeat(80);
        println!("\n{rule}");
        println!("TTL Benchmark Results Summary");
        println!("{rule}");
        println!("Duration:           {:.1} seconds ({})", r.duration_seconds, r.stop_reason);
        println!(
            "Write Operations:   {} ({:.1} TPS)",
            fmt_u64(r.total_writes),
            r.write_tps
        );
        println!("  - Inserts:        {}", fmt_u64(r.total_inserts));
        println!("  - Updates:        {}", fmt_u64(r.total_updates));
        println!(
            "  - Single-row ops: {} (async commit candidates)",
            fmt_u64(r.total_single_row_ops)
        );
        println!(
            "Read Operations:    {} ({:.1} TPS)",
            fmt_u64(r.total_reads),
            r.read_tps
        );
        println!(
            "Write Latency:      {:.2} ms (max {:.2} ms)",
            r.avg_write_latency_ms, r.max_write_latency_ms
        );
        println!(
            "Read Latency:       {:.2} ms (max {:.2} ms)",
            r.avg_read_latency_ms, r.max_read_latency_ms
        );
        println!(
            "Errors:             Write: {}, Read: {}",
            r.write_errors, r.read_errors
        );
        if let Some(ttl) = r.ttl_effectiveness.summary() {
            println!("\nTTL Effectiveness:");
            println!("Initial Data Count: {}", fmt_u64(ttl.initial_count));
            println!("Final Data Count:   {}", fmt_u64(ttl.final_count));
            println!("Peak Data Count:    {}", fmt_u64(ttl.max_count));
            println!("Net Change:         {}", fmt_signed(ttl.net_change));
            println!("TTL Working:        {}", yes_no(ttl.ttl_working));
            println!("Data Stabilized:    {}", yes_no(ttl.data_stabilized));
        }
        println!("{rule}");
    }
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "Yes"
    } else {
        "No"
    }
}

fn create_unique(dir: &Path, stem: &str) -> io::Result<(PathBuf, File)> {
    let mut attempt = 0usize;
    loop {
        let name = match attempt {
            0 => format!("{stem}.json"),
            n => format!("{stem}_{n}.json"),
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => return Ok((path, f)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

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

//! # Metrics
//!
//! Shared counters that every worker adds to. All updates are relaxed atomic adds: nothing reads a
//! counter to decide what to do next, and readers only need each counter to be exact once the
//! workers are done.

use {
    crate::{runtime::rate, workload::WriteTally},
    std::{
        sync::atomic::{AtomicU64, Ordering},
        time::Duration,
    },
};

const NANOS_PER_MILLI: f64 = 1_000_000.0;

#[derive(Debug, Default)]
pub struct Metrics {
    writes: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    single_row: AtomicU64,
    reads: AtomicU64,
    write_errors: AtomicU64,
    read_errors: AtomicU64,
    write_latency: LatencyTracker,
    read_latency: LatencyTracker,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn record_write(&self, tally: &WriteTally, latency: Duration) {
        add(&self.writes, tally.writes);
        add(&self.inserts, tally.inserts);
        add(&self.updates, tally.updates);
        add(&self.single_row, tally.single_row);
        self.write_latency.record(latency);
    }
    pub fn record_write_error(&self) {
        add(&self.write_errors, 1);
    }
    pub fn record_read(&self, latency: Duration) {
        add(&self.reads, 1);
        self.read_latency.record(latency);
    }
    pub fn record_read_error(&self) {
        add(&self.read_errors, 1);
    }
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_writes: load(&self.writes),
            total_inserts: load(&self.inserts),
            total_updates: load(&self.updates),
            total_single_row_ops: load(&self.single_row),
            total_reads: load(&self.reads),
            write_errors: load(&self.write_errors),
            read_errors: load(&self.read_errors),
            avg_write_latency_ms: self.write_latency.avg_ms(),
            avg_read_latency_ms: self.read_latency.avg_ms(),
            max_write_latency_ms: self.write_latency.max_ms(),
            max_read_latency_ms: self.read_latency.max_ms(),
        }
    }
}

fn add(counter: &AtomicU64, by: u64) {
    if by != 0 {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

fn load(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}

/// Latency sum, sample count and slowest sample, all in nanoseconds
#[derive(Debug, Default)]
struct LatencyTracker {
    sum: AtomicU64,
    count: AtomicU64,
    max: AtomicU64,
}

impl LatencyTracker {
    fn record(&self, latency: Duration) {
        let nanos = latency.as_nanos().min(u64::MAX as u128) as u64;
        self.sum.fetch_add(nanos, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.max.fetch_max(nanos, Ordering::Relaxed);
    }
    fn avg_ms(&self) -> f64 {
        match load(&self.count) {
            0 => 0.0,
            count => load(&self.sum) as f64 / count as f64 / NANOS_PER_MILLI,
        }
    }
    fn max_ms(&self) -> f64 {
        load(&self.max) as f64 / NANOS_PER_MILLI
    }
}

/// A point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetricsSnapshot {
    pub total_writes: u64,
    pub total_inserts: u64,
    pub total_updates: u64,
    pub total_single_row_ops: u64,
    pub total_reads: u64,
    pub write_errors: u64,
    pub read_errors: u64,
    pub avg_write_latency_ms: f64,
    pub avg_read_latency_ms: f64,
    pub max_write_latency_ms: f64,
    pub max_read_latency_ms: f64,
}

impl MetricsSnapshot {
    pub fn write_tps(&self, elapsed: Duration) -> f64 {
        rate(self.total_writes, elapsed)
    }
    pub fn read_tps(&self, elapsed: Duration) -> f64 {
        rate(self.total_reads, elapsed)
    }
}

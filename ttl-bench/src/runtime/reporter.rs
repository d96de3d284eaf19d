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

//! # Stats reporter
//!
//! A single task that, once per stats interval, counts the rows of every benchmark table, records
//! the total in the [`CountHistory`] and logs a progress line. It runs alongside the workers and
//! stops with them.

use {
    super::pool::WorkerContext,
    crate::{
        db::{self, Connector, DbResult},
        metrics::MetricsSnapshot,
        statement::Statement,
    },
    chrono::Utc,
    serde::{Serialize, Serializer},
    std::{
        collections::VecDeque,
        sync::{Arc, Mutex, MutexGuard, PoisonError},
        time::Duration,
    },
    tokio::{
        task::JoinHandle,
        time::{self, Instant},
    },
};

/// The number of row count samples kept. Older samples are evicted first
pub const HISTORY_CAPACITY: usize = 100;

/// The total row count of all benchmark tables at a point in time (unix seconds)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataCountSample {
    pub timestamp: f64,
    pub count: u64,
}

impl DataCountSample {
    pub fn now(count: u64) -> Self {
        Self {
            timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
            count,
        }
    }
}

impl Serialize for DataCountSample {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        (self.timestamp, self.count).serialize(s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CountHistory {
    samples: Arc<Mutex<VecDeque<DataCountSample>>>,
}

impl CountHistory {
    pub fn new() -> Self {
        Self {
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY))),
        }
    }
    fn lock(&self) -> MutexGuard<'_, VecDeque<DataCountSample>> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }
    pub fn push(&self, sample: DataCountSample) {
        let mut samples = self.lock();
        if samples.len() == HISTORY_CAPACITY {
            samples.pop_front();
        }
        samples.push_back(sample);
    }
    pub fn latest(&self) -> Option<DataCountSample> {
        self.lock().back().copied()
    }
    /// Oldest first
    pub fn samples(&self) -> Vec<DataCountSample> {
        self.lock().iter().copied().collect()
    }
}

pub struct StatsReporter {
    handle: JoinHandle<()>,
}

impl StatsReporter {
    pub fn start<C: Connector>(ctx: &WorkerContext<C>, history: CountHistory, started: Instant) -> Self {
        let ctx = ctx.clone();
        let handle = tokio::spawn(async move { reporter_svc(ctx, history, started).await });
        Self { handle }
    }
    /// Waits for the reporter to exit. Returns `false` if it was still running at `deadline`
    pub async fn drain(self, deadline: Instant) -> bool {
        match time::timeout_at(deadline, self.handle).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!("stats reporter exited abnormally: {e}");
                true
            }
            Err(_) => {
                warn!("stats reporter did not stop within the grace period. abandoning it");
                false
            }
        }
    }
}

async fn reporter_svc<C: Connector>(ctx: WorkerContext<C>, history: CountHistory, started: Instant) {
    debug!("stats reporter started");
    let interval = ctx.workload.stats_interval;
    loop {
        match count_all(&ctx).await {
            Ok(count) => history.push(DataCountSample::now(count)),
            Err(e) => error!("failed to count rows, skipping this sample: {e}"),
        }
        let line = progress_line(
            started.elapsed(),
            &ctx.metrics.snapshot(),
            history.latest().map(|s| s.count),
        );
        info!("{line}");
        if ctx.stop.sleep(interval).await {
            break;
        }
    }
    debug!("stats reporter stopped");
}

async fn count_all<C: Connector>(ctx: &WorkerContext<C>) -> DbResult<u64> {
    let mut total = 0;
    for table in ctx.tables.iter() {
        total += db::count(&*ctx.connector, &Statement::count_all(table)).await?;
    }
    Ok(total)
}

pub fn progress_line(elapsed: Duration, snap: &MetricsSnapshot, data_count: Option<u64>) -> String {
    format!(
        "[{:6.1}s] Writes: {:8} ({:7.1} TPS) | I:{:6}/U:{:6}/S:{:6} | Reads: {:7} ({:6.1} TPS) | \
        Data: {:>8} | Errors: W{}/R{} | Latency: W{:.1}ms/R{:.1}ms",
        elapsed.as_secs_f64(),
        snap.total_writes,
        snap.write_tps(elapsed),
        snap.total_inserts,
        snap.total_updates,
        snap.total_single_row_ops,
        snap.total_reads,
        snap.read_tps(elapsed),
        data_count.map_or_else(|| "-".to_owned(), |c| c.to_string()),
        snap.write_errors,
        snap.read_errors,
        snap.avg_write_latency_ms,
        snap.avg_read_latency_ms,
    )
}

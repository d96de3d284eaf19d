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

use {
    super::StopSignal,
    crate::{
        config::WorkloadConfig,
        db::{self, Connector},
        metrics::Metrics,
        statement::Table,
        workload::{choose_operation, ReadKind, WritePlan},
    },
    rand::{rngs::SmallRng, Rng, SeedableRng},
    std::{sync::Arc, time::Duration},
    tokio::{task::JoinHandle, time::Instant},
};

/// How long a worker waits after a failed operation
const ERROR_BACKOFF: Duration = Duration::from_millis(100);
/// How long a read worker waits after every read
const READ_PAUSE: Duration = Duration::from_millis(10);

/// Everything a worker needs. Workers only hold references into the run's state
pub struct WorkerContext<C> {
    pub connector: Arc<C>,
    pub metrics: Arc<Metrics>,
    pub workload: Arc<WorkloadConfig>,
    pub tables: Arc<[Table]>,
    pub stop: StopSignal,
}

impl<C> Clone for WorkerContext<C> {
    fn clone(&self) -> Self {
        Self {
            connector: self.connector.clone(),
            metrics: self.metrics.clone(),
            workload: self.workload.clone(),
            tables: self.tables.clone(),
            stop: self.stop.clone(),
        }
    }
}

impl<C> WorkerContext<C> {
    fn pick_table(&self, rng: &mut impl Rng) -> &Table {
        &self.tables[rng.gen_range(0..self.tables.len())]
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainOutcome {
    pub joined: usize,
    pub abandoned: usize,
}

/// The fixed set of write and read workers of a run
pub struct WorkerPool {
    workers: Vec<(String, JoinHandle<()>)>,
}

impl WorkerPool {
    pub fn start<C: Connector>(ctx: &WorkerContext<C>) -> Self {
        let mut workers = Vec::with_capacity(ctx.workload.write_threads + ctx.workload.read_threads);
        for id in 0..ctx.workload.write_threads {
            let ctx = ctx.clone();
            workers.push((
                format!("write-worker-{id}"),
                tokio::spawn(async move { write_worker(id, ctx).await }),
            ));
        }
        for id in 0..ctx.workload.read_threads {
            let ctx = ctx.clone();
            workers.push((
                format!("read-worker-{id}"),
                tokio::spawn(async move { read_worker(id, ctx).await }),
            ));
        }
        info!(
            "started {} write workers and {} read workers",
            ctx.workload.write_threads, ctx.workload.read_threads
        );
        Self { workers }
    }
    /// Waits for every worker to exit, giving up on the ones still running at `deadline`. Those
    /// are left to finish on their own
    pub async fn drain(self, deadline: Instant) -> DrainOutcome {
        let mut outcome = DrainOutcome::default();
        for (name, worker) in self.workers {
            match tokio::time::timeout_at(deadline, worker).await {
                Ok(Ok(())) => outcome.joined += 1,
                Ok(Err(e)) => {
                    error!("{name} exited abnormally: {e}");
                    outcome.joined += 1;
                }
                Err(_) => {
                    warn!("{name} did not stop within the grace period. abandoning it");
                    outcome.abandoned += 1;
                }
            }
        }
        outcome
    }
}

async fn write_worker<C: Connector>(id: usize, ctx: WorkerContext<C>) {
    info!("write-worker-{id} started");
    let mut rng = SmallRng::from_entropy();
    let pause = ctx.workload.write_pause();
    while !ctx.stop.is_set() {
        let table = ctx.pick_table(&mut rng);
        let op = choose_operation(&ctx.workload.ratios, &mut rng);
        let plan = WritePlan::generate(op, table, &ctx.workload, &mut rng);
        let wait = match db::timed_execute(&*ctx.connector, &plan.statements).await {
            Ok(latency) => {
                ctx.metrics.record_write(&plan.tally, latency);
                pause
            }
            Err(e) => {
                ctx.metrics.record_write_error();
                warn!(
                    "write-worker-{id} failed to run {:?} on {}: {e}",
                    plan.kind,
                    table.name()
                );
                ERROR_BACKOFF
            }
        };
        if ctx.stop.sleep(wait).await {
            break;
        }
    }
    info!("write-worker-{id} stopped");
}

async fn read_worker<C: Connector>(id: usize, ctx: WorkerContext<C>) {
    info!("read-worker-{id} started");
    let mut rng = SmallRng::from_entropy();
    while !ctx.stop.is_set() {
        let table = ctx.pick_table(&mut rng);
        let kind = ReadKind::choose(&mut rng);
        let stmt = kind.statement(table, &mut rng);
        let wait = match db::timed_query(&*ctx.connector, &stmt).await {
            Ok((_, latency)) => {
                ctx.metrics.record_read(latency);
                READ_PAUSE
            }
            Err(e) => {
                ctx.metrics.record_read_error();
                warn!("read-worker-{id} failed to run {kind:?} on {}: {e}", table.name());
                ERROR_BACKOFF
            }
        };
        if ctx.stop.sleep(wait).await {
            break;
        }
    }
    info!("read-worker-{id} stopped");
}

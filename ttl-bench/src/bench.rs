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

//! # Benchmark controller
//!
//! Drives a run through its phases:
//!
//! ```text
//! Idle -> SchemaSetup -> DataLoad -> Running -> Draining -> Reported -> Terminal
//! ```
//!
//! Setup failures end the run before any worker starts. Once running, the run stops when the
//! configured duration elapses or the interrupt future resolves, whichever happens first.

use {
    crate::{
        config::BenchConfig,
        db::{self, Connector},
        error::BenchResult,
        metrics::Metrics,
        report::{FinalReport, RunResults},
        runtime::{
            pool::{DrainOutcome, WorkerContext, WorkerPool},
            reporter::{CountHistory, StatsReporter},
            StopSignal,
        },
        statement::{Statement, Table},
        util::fmt_u64,
        workload::SyntheticRow,
    },
    chrono::Local,
    rand::{rngs::SmallRng, SeedableRng},
    serde::Serialize,
    std::{fmt, future::Future, path::PathBuf, sync::Arc},
    tokio::time::{self, Instant},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    SchemaSetup,
    DataLoad,
    Running,
    Draining,
    Reported,
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    DurationElapsed,
    Interrupted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DurationElapsed => write!(f, "duration elapsed"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// What a completed run left behind
#[derive(Debug)]
pub struct RunOutcome {
    pub report: FinalReport,
    pub report_path: PathBuf,
    pub drain: DrainOutcome,
    pub reporter_stopped: bool,
    pub phases: Vec<Phase>,
}

pub struct Controller<C> {
    cfg: BenchConfig,
    connector: Arc<C>,
    tables: Arc<[Table]>,
    phase: Phase,
    visited: Vec<Phase>,
}

impl<C: Connector> Controller<C> {
    pub fn new(cfg: BenchConfig, connector: C) -> Self {
        let tables = cfg.workload.tables().into();
        Self {
            cfg,
            connector: Arc::new(connector),
            tables,
            phase: Phase::Idle,
            visited: vec![Phase::Idle],
        }
    }
    fn enter(&mut self, next: Phase) {
        debug!("phase {:?} -> {:?}", self.phase, next);
        self.phase = next;
        self.visited.push(next);
    }
    /// Runs the benchmark to completion. `interrupt` is only watched while the workers run
    pub async fn run(mut self, interrupt: impl Future<Output = ()>) -> BenchResult<RunOutcome> {
        let ret = self.run_phases(interrupt).await;
        self.connector.shutdown().await;
        if let Err(e) = &ret {
            debug!("run failed in phase {:?}: {e}", self.phase);
        }
        self.enter(Phase::Terminal);
        let mut outcome = ret?;
        outcome.phases = self.visited;
        Ok(outcome)
    }
    /// Everything up to `Reported`. The phases are filled in by [`Self::run`]
    async fn run_phases(&mut self, interrupt: impl Future<Output = ()>) -> BenchResult<RunOutcome> {
        self.enter(Phase::SchemaSetup);
        self.setup_schema().await?;
        self.enter(Phase::DataLoad);
        self.load_initial_data().await?;
        // start workers
        let ctx = WorkerContext {
            connector: self.connector.clone(),
            metrics: Arc::new(Metrics::new()),
            workload: Arc::new(self.cfg.workload.clone()),
            tables: self.tables.clone(),
            stop: StopSignal::new(),
        };
        let history = CountHistory::new();
        let started = Instant::now();
        let reporter = StatsReporter::start(&ctx, history.clone(), started);
        let pool = WorkerPool::start(&ctx);
        self.enter(Phase::Running);
        info!(
            "benchmark running for {}s",
            self.cfg.workload.duration.as_secs_f64()
        );
        let stop_reason = tokio::select! {
            _ = time::sleep(self.cfg.workload.duration) => StopReason::DurationElapsed,
            _ = interrupt => {
                warn!("received interrupt. stopping workers");
                StopReason::Interrupted
            }
        };
        let elapsed = started.elapsed();
        // drain
        self.enter(Phase::Draining);
        ctx.stop.fire();
        let deadline = Instant::now() + self.cfg.workload.grace_period;
        let drain = pool.drain(deadline).await;
        let reporter_stopped = reporter.drain(deadline).await;
        if drain.abandoned == 0 {
            info!("all {} workers stopped", drain.joined);
        } else {
            warn!(
                "{} workers stopped, {} abandoned after the grace period",
                drain.joined, drain.abandoned
            );
        }
        // report
        let snapshot = ctx.metrics.snapshot();
        info!(
            "{} writes and {} reads completed in {:.1}s ({stop_reason})",
            fmt_u64(snapshot.total_writes),
            fmt_u64(snapshot.total_reads),
            elapsed.as_secs_f64()
        );
        let timeline = history.samples();
        let results = RunResults::new(&snapshot, elapsed, stop_reason, &timeline);
        let report = FinalReport::new(&self.cfg, results, timeline);
        let persisted = report.persist(&self.cfg.output_dir);
        report.print_summary();
        let report_path = persisted?;
        info!("report saved to {}", report_path.display());
        self.enter(Phase::Reported);
        Ok(RunOutcome {
            report,
            report_path,
            drain,
            reporter_stopped,
            phases: vec![],
        })
    }
    async fn setup_schema(&self) -> BenchResult<()> {
        let db_cfg = &self.cfg.db;
        info!("running sanity check on {}:{}", db_cfg.host, db_cfg.port);
        db::execute_on_server(&*self.connector, &[Statement::ping()]).await?;
        info!("creating database {} if it doesn't exist", db_cfg.database);
        db::execute_on_server(
            &*self.connector,
            &[Statement::create_database(&db_cfg.database)],
        )
        .await?;
        let ttl = &self.cfg.workload.ttl;
        for table in self.tables.iter() {
            warn!(
                "recreating table {} (TTL {} on {}, job interval {}, enabled: {})",
                table.name(),
                ttl.expire_after,
                ttl.column,
                ttl.job_interval,
                ttl.enabled
            );
            db::timed_execute(
                &*self.connector,
                &[Statement::drop_table(table), Statement::create_table(table, ttl)],
            )
            .await?;
        }
        Ok(())
    }
    async fn load_initial_data(&self) -> BenchResult<()> {
        let workload = &self.cfg.workload;
        // rows are aged up to twice the expiration interval, so about half start out expired
        let max_age = workload.ttl.expire_after.as_duration() * 2;
        let mut rng = SmallRng::from_entropy();
        for table in self.tables.iter() {
            info!(
                "loading {} rows into {}",
                fmt_u64(workload.initial_rows as u64),
                table.name()
            );
            let mut remaining = workload.initial_rows;
            while remaining != 0 {
                let batch = remaining.min(workload.batch_size);
                let now = Local::now().naive_local();
                let rows: Vec<_> = (0..batch)
                    .map(|_| SyntheticRow::aged(&mut rng, workload.record_size, now, max_age))
                    .collect();
                db::timed_execute(&*self.connector, &Statement::insert_chunks(table, &rows))
                    .await?;
                remaining -= batch;
            }
        }
        Ok(())
    }
}

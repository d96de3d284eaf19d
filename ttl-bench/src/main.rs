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

//! A mixed read/write benchmark runner for TTL-enabled MySQL-compatible databases. It seeds a set
//! of TTL tables, hammers them from a fixed pool of write and read workers, tracks how the row
//! count evolves while the TTL job runs and writes a JSON report at the end.

#[macro_use]
extern crate log;
mod bench;
mod cli;
mod config;
mod db;
mod error;
mod metrics;
mod report;
mod runtime;
mod statement;
#[cfg(test)]
mod tests;
mod util;
mod workload;

use {
    crate::{
        bench::Controller,
        cli::Cli,
        config::BenchConfig,
        db::mysql::MySqlConnector,
        error::{BenchError, BenchResult},
    },
    clap::Parser,
    env_logger::Builder,
    std::{env, future, process},
};

fn main() {
    Builder::new()
        .parse_filters(&env::var("TTLBENCH_LOG").unwrap_or_else(|_| "info".to_owned()))
        .init();
    if let Err(e) = run() {
        error!("ttl-bench failed with: {}", e);
        process::exit(0x01);
    }
}

fn run() -> BenchResult<()> {
    let cfg = BenchConfig::from_cli(Cli::parse())?;
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .enable_all()
        .build()
        .map_err(|e| BenchError::Runtime(format!("failed to start runtime: {e}")))?;
    rt.block_on(async move {
        let connector = MySqlConnector::new(&cfg.db);
        Controller::new(cfg, connector)
            .run(interrupted())
            .await
            .map(|_| ())
    })
}

/// Resolves on ctrl+c. If the handler can't be installed the run simply goes the full duration
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for interrupts: {e}");
        future::pending::<()>().await;
    }
}

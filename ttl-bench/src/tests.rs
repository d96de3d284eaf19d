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
    crate::{
        bench::{Controller, Phase, StopReason},
        cli::Cli,
        config::BenchConfig,
        db::{memory::MemoryConnector, mysql::MySqlConnector},
        error::BenchError,
        report::TtlEffectiveness,
        statement::StatementKind,
    },
    clap::Parser,
    serde_json::Value,
    std::{env, fs, future, path::Path, time::Duration},
};

fn config(out: &Path, args: &[&str]) -> BenchConfig {
    let out = out.to_str().unwrap();
    let mut argv = vec!["ttl-bench", "--output-dir", out, "--grace-period", "5"];
    argv.extend_from_slice(args);
    BenchConfig::from_cli(Cli::try_parse_from(argv).unwrap()).unwrap()
}

fn read_report(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

const SINGLE_ROW_ONLY: &[&str] = &[
    "--duration",
    "5",
    "--write-threads",
    "2",
    "--read-threads",
    "1",
    "--writes-per-second",
    "100",
    "--single-row-ratio",
    "1.0",
    "--update-ratio",
    "0",
    "--small-write-ratio",
    "0",
    "--initial-rows",
    "0",
    "--stats-interval",
    "1",
];

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_row_workload() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MemoryConnector::new();
    let outcome = Controller::new(config(dir.path(), SINGLE_ROW_ONLY), connector.clone())
        .run(future::pending())
        .await
        .unwrap();
    assert_eq!(
        outcome.phases,
        [
            Phase::Idle,
            Phase::SchemaSetup,
            Phase::DataLoad,
            Phase::Running,
            Phase::Draining,
            Phase::Reported,
            Phase::Terminal
        ]
    );
    let results = &outcome.report.results;
    assert_eq!(results.stop_reason, StopReason::DurationElapsed);
    assert!(results.total_writes > 0);
    assert_eq!(results.total_single_row_ops, results.total_writes);
    assert_eq!(results.total_inserts + results.total_updates, results.total_writes);
    assert_eq!(results.write_errors, 0);
    assert_eq!(results.read_errors, 0);
    assert!(results.total_reads > 0);
    assert!((4.9..6.0).contains(&results.duration_seconds));
    // 2 workers sharing 100 writes/sec can't do much more than 100/sec
    assert!(results.write_tps < 150.0, "{}", results.write_tps);
    assert_eq!(outcome.drain.abandoned, 0);
    assert!(outcome.reporter_stopped);
    assert!(connector.has_database("ttl_benchmark"));
    assert_eq!(connector.opened(), connector.closed());
    // the persisted report agrees with the aggregator
    let json = read_report(&outcome.report_path);
    assert_eq!(json["results"]["total_writes"], results.total_writes);
    assert_eq!(json["results"]["total_single_row_ops"], results.total_writes);
    assert_eq!(json["results"]["stop_reason"], "duration_elapsed");
    assert!(json["data_count_timeline"].as_array().unwrap().len() >= 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ttl_job_shrinks_seeded_rows() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MemoryConnector::new();
    let cfg = config(
        dir.path(),
        &[
            "--duration",
            "3",
            "--write-threads",
            "0",
            "--read-threads",
            "1",
            "--initial-rows",
            "1000",
            "--batch-size",
            "100",
            "--ttl-interval",
            "1 MINUTE",
            "--ttl-job-interval",
            "1s",
            "--stats-interval",
            "1",
        ],
    );
    let outcome = Controller::new(cfg, connector.clone())
        .run(future::pending())
        .await
        .unwrap();
    let TtlEffectiveness::Measured(ttl) = outcome.report.results.ttl_effectiveness else {
        panic!("expected at least two row count samples");
    };
    assert_eq!(ttl.initial_count, 1000);
    assert_eq!(ttl.max_count, 1000);
    assert!(ttl.final_count < ttl.max_count);
    assert!(ttl.ttl_working);
    assert!(ttl.net_change < 0);
    assert!(connector.row_count("ttl_test_table").unwrap() < 1000);
    let json = read_report(&outcome.report_path);
    assert_eq!(json["results"]["ttl_effectiveness"]["ttl_working"], true);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interrupt_stops_run_early() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(
        dir.path(),
        &["--duration", "60", "--write-threads", "2", "--read-threads", "1"],
    );
    let outcome = Controller::new(cfg, MemoryConnector::new())
        .run(tokio::time::sleep(Duration::from_secs(2)))
        .await
        .unwrap();
    let results = &outcome.report.results;
    assert_eq!(results.stop_reason, StopReason::Interrupted);
    assert!(
        (1.5..10.0).contains(&results.duration_seconds),
        "{}",
        results.duration_seconds
    );
    assert_eq!(outcome.drain.abandoned, 0);
    assert!(outcome.phases.contains(&Phase::Reported));
    assert_eq!(read_report(&outcome.report_path)["results"]["stop_reason"], "interrupted");
}

#[tokio::test]
async fn unreachable_database_fails_setup() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MemoryConnector::new();
    connector.fail_connect(true);
    let ret = Controller::new(config(dir.path(), SINGLE_ROW_ONLY), connector.clone())
        .run(future::pending())
        .await;
    assert!(matches!(ret, Err(BenchError::Setup(_))));
    assert_eq!(connector.opened(), 0);
    assert_eq!(connector.statements(), 0);
    // nothing ran, so nothing was reported
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_writes_still_complete() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MemoryConnector::new();
    let cfg = config(
        dir.path(),
        &[
            "--duration",
            "2",
            "--write-threads",
            "2",
            "--read-threads",
            "1",
            "--initial-rows",
            "100",
        ],
    );
    let failer = {
        let connector = connector.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            connector.fail_writes(true);
        })
    };
    let outcome = Controller::new(cfg, connector.clone())
        .run(future::pending())
        .await
        .unwrap();
    failer.await.unwrap();
    let results = &outcome.report.results;
    assert!(results.write_errors > 0);
    assert_eq!(results.read_errors, 0);
    assert_eq!(
        read_report(&outcome.report_path)["results"]["write_errors"],
        results.write_errors
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn multiple_tables_and_failed_counts() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MemoryConnector::new();
    connector.fail_counts(true);
    let cfg = config(
        dir.path(),
        &[
            "--duration",
            "4",
            "--table-count",
            "3",
            "--table-name",
            "bench",
            "--write-threads",
            "3",
            "--read-threads",
            "2",
            "--initial-rows",
            "10",
            "--stats-interval",
            "1",
        ],
    );
    let recover = {
        let connector = connector.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            connector.fail_counts(false);
        })
    };
    let outcome = Controller::new(cfg, connector.clone())
        .run(future::pending())
        .await
        .unwrap();
    recover.await.unwrap();
    for table in ["bench_0", "bench_1", "bench_2"] {
        assert!(connector.row_count(table).unwrap() >= 10, "{table}");
    }
    assert!(connector.row_count("bench").is_none());
    // the ticks at 0s and 1s fail and are skipped; later ticks land once counts recover
    let timeline = &outcome.report.data_count_timeline;
    assert!((1..=3).contains(&timeline.len()), "{}", timeline.len());
    let json = read_report(&outcome.report_path);
    assert_eq!(
        json["data_count_timeline"].as_array().unwrap().len(),
        timeline.len()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn counts_that_never_recover_leave_no_timeline() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MemoryConnector::new();
    connector.fail_counts(true);
    let cfg = config(
        dir.path(),
        &["--duration", "2", "--initial-rows", "10", "--stats-interval", "1"],
    );
    let outcome = Controller::new(cfg, connector.clone())
        .run(future::pending())
        .await
        .unwrap();
    assert!(outcome.report.data_count_timeline.is_empty());
    assert_eq!(
        read_report(&outcome.report_path)["results"]["ttl_effectiveness"],
        serde_json::json!({"status": "insufficient_data"})
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn manual_commit_persists_writes() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MemoryConnector::new();
    connector.set_autocommit(false);
    let args = [
        "--duration",
        "1",
        "--writes-per-second",
        "100",
        "--single-row-ratio",
        "1.0",
        "--update-ratio",
        "0",
        "--small-write-ratio",
        "0",
        "--initial-rows",
        "20",
        "--no-autocommit",
    ];
    let outcome = Controller::new(config(dir.path(), &args), connector.clone())
        .run(future::pending())
        .await
        .unwrap();
    assert!(outcome.report.results.total_writes > 0);
    assert!(connector.row_count("ttl_test_table").unwrap() >= 20);
    let log = connector.statement_log();
    let commits = log
        .iter()
        .filter(|k| **k == StatementKind::Commit)
        .count() as u64;
    // one for the seed batch plus one per single-row write
    assert!(commits > outcome.report.results.total_writes, "{commits}");
    assert!(log.iter().any(|k| matches!(k, StatementKind::InsertRows { .. })));
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs a running MySQL-compatible server (TTLBENCH_TEST_HOST, TTLBENCH_TEST_PORT)"]
async fn live_single_row_workload() {
    let host = env::var("TTLBENCH_TEST_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
    let port = env::var("TTLBENCH_TEST_PORT").unwrap_or_else(|_| "4000".to_owned());
    let dir = tempfile::tempdir().unwrap();
    let mut args = vec!["--host", host.as_str(), "--port", port.as_str()];
    args.extend_from_slice(SINGLE_ROW_ONLY);
    let cfg = config(dir.path(), &args);
    let connector = MySqlConnector::new(&cfg.db);
    let outcome = Controller::new(cfg, connector)
        .run(future::pending())
        .await
        .unwrap();
    let results = &outcome.report.results;
    assert!(results.total_writes > 0);
    assert_eq!(results.total_single_row_ops, results.total_writes);
    assert_eq!(results.write_errors, 0);
    assert_eq!(
        read_report(&outcome.report_path)["results"]["total_writes"],
        results.total_writes
    );
}

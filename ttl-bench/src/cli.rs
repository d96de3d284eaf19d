/*
 * Created on Tue Nov 08 2022
 *
 * This file is a part of ttl-bench
 * ttl-bench is a mixed-workload benchmark runner for TTL-enabled
 * MySQL-compatible databases, built alongside Skytable by Sayan Nandan
 * ("the Author").
 *
 * Copyright (c) 2022, Sayan Nandan <ohsayan@outlook.com>
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
    clap::{ArgAction, Parser, ValueEnum},
    serde::Serialize,
    std::path::PathBuf,
};

const HELP_TEMPLATE: &str = r#"
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
"#;

/// How workers obtain database connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    /// Open and close a new connection for every operation
    Fresh,
    /// Check connections out of a shared pool
    Pooled,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about=None, disable_help_flag=true, help_template=HELP_TEMPLATE)]
pub struct Cli {
    // connection
    #[arg(
        short,
        long,
        help = "Sets the remote host to connect to",
        default_value = "127.0.0.1",
        value_name = "HOST"
    )]
    pub host: String,

    #[arg(
        short = 'P',
        long,
        help = "Sets the remote port to connect to",
        default_value_t = 4000,
        value_name = "PORT"
    )]
    pub port: u16,

    #[arg(
        short,
        long,
        help = "Sets the user to authenticate as",
        default_value = "root",
        value_name = "USER"
    )]
    pub user: String,

    #[arg(
        short,
        long,
        env = "TTLBENCH_PASSWORD",
        help = "Sets the password to authenticate with",
        default_value = "",
        hide_default_value = true,
        value_name = "PASSWORD"
    )]
    pub password: String,

    #[arg(
        short,
        long,
        help = "Sets the database that holds the benchmark tables",
        default_value = "ttl_benchmark",
        value_name = "DATABASE"
    )]
    pub database: String,

    #[arg(
        long,
        help = "Sets the connection character set",
        default_value = "utf8mb4",
        value_name = "CHARSET"
    )]
    pub charset: String,

    #[arg(
        long = "connect-timeout",
        help = "Sets the connect timeout for every new connection",
        default_value_t = 10,
        value_name = "SECONDS"
    )]
    pub connect_timeout: u64,

    #[arg(
        long = "no-autocommit",
        help = "Disables autocommit on benchmark connections",
        default_value_t = false
    )]
    pub no_autocommit: bool,

    #[arg(
        long = "connection-mode",
        help = "Sets how workers obtain connections",
        value_enum,
        default_value_t = ConnectionMode::Fresh
    )]
    pub connection_mode: ConnectionMode,

    // tables
    #[arg(
        long = "table-name",
        help = "Sets the name (or name prefix) of the benchmark tables",
        default_value = "ttl_test_table",
        value_name = "NAME"
    )]
    pub table_name: String,

    #[arg(
        long = "table-count",
        help = "Sets the number of benchmark tables",
        default_value_t = 1,
        value_name = "COUNT"
    )]
    pub table_count: usize,

    #[arg(
        long = "initial-rows",
        help = "Sets the number of rows loaded into every table before the run",
        default_value_t = 10_000,
        value_name = "ROWS"
    )]
    pub initial_rows: usize,

    #[arg(
        long = "record-size",
        help = "Sets the payload size of a normal record",
        default_value_t = 128,
        value_name = "BYTES"
    )]
    pub record_size: usize,

    #[arg(
        long = "tiny-record-size",
        help = "Sets the payload size of a single-row record",
        default_value_t = 32,
        value_name = "BYTES"
    )]
    pub tiny_record_size: usize,

    #[arg(
        long = "batch-size",
        help = "Sets the number of rows in a batch insert",
        default_value_t = 50,
        value_name = "ROWS"
    )]
    pub batch_size: usize,

    // workload
    #[arg(
        long,
        help = "Sets the benchmark duration",
        default_value_t = 60,
        value_name = "SECONDS"
    )]
    pub duration: u64,

    #[arg(
        long = "write-threads",
        help = "Sets the number of write workers",
        default_value_t = 20,
        value_name = "COUNT"
    )]
    pub write_threads: usize,

    #[arg(
        long = "read-threads",
        help = "Sets the number of read workers",
        default_value_t = 10,
        value_name = "COUNT"
    )]
    pub read_threads: usize,

    #[arg(
        long = "writes-per-second",
        help = "Sets the target write rate across all write workers",
        default_value_t = 1000,
        value_name = "RATE"
    )]
    pub writes_per_second: u64,

    #[arg(
        long = "update-ratio",
        help = "Sets the share of write operations that are range updates (0.0-1.0)",
        default_value_t = 0.3,
        value_name = "RATIO"
    )]
    pub update_ratio: f64,

    #[arg(
        long = "small-write-ratio",
        help = "Sets the share of write operations that are small inserts (0.0-1.0)",
        default_value_t = 0.2,
        value_name = "RATIO"
    )]
    pub small_write_ratio: f64,

    #[arg(
        long = "single-row-ratio",
        help = "Sets the share of write operations that are single-row transactions (0.0-1.0)",
        default_value_t = 0.1,
        value_name = "RATIO"
    )]
    pub single_row_ratio: f64,

    #[arg(
        long = "stats-interval",
        help = "Sets the interval between progress reports",
        default_value_t = 2,
        value_name = "SECONDS"
    )]
    pub stats_interval: u64,

    #[arg(
        long = "grace-period",
        help = "Sets how long to wait for workers to exit once the run stops",
        default_value_t = 10,
        value_name = "SECONDS"
    )]
    pub grace_period: u64,

    // ttl
    #[arg(
        long = "ttl-column",
        help = "Sets the timestamp column the TTL policy is keyed on",
        default_value = "created_at",
        value_name = "COLUMN"
    )]
    pub ttl_column: String,

    #[arg(
        long = "ttl-interval",
        help = "Sets the TTL expiration interval (for example `5 MINUTE`)",
        default_value = "5 MINUTE",
        value_name = "INTERVAL"
    )]
    pub ttl_interval: String,

    #[arg(
        long = "ttl-job-interval",
        help = "Sets the TTL background job interval (for example `1h`, `30m`)",
        default_value = "1h",
        value_name = "INTERVAL"
    )]
    pub ttl_job_interval: String,

    #[arg(
        long = "no-ttl",
        help = "Creates the tables with the TTL policy disabled",
        default_value_t = false
    )]
    pub no_ttl: bool,

    // output
    #[arg(
        short,
        long = "output-dir",
        help = "Sets the directory the final report is written to",
        default_value = ".",
        value_name = "DIR"
    )]
    pub output_dir: PathBuf,

    #[arg(long, help="Print help information", action=ArgAction::Help)]
    pub help: Option<bool>,
}

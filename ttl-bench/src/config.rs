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
    crate::{
        cli::{Cli, ConnectionMode},
        error::{BenchError, BenchResult},
        statement::{Ident, Table},
        workload::Ratios,
    },
    serde::{Serialize, Serializer},
    std::{fmt, path::PathBuf, str::FromStr, time::Duration},
};

/// The largest payload a row can carry (`data_field VARCHAR(1024)`)
pub const MAX_RECORD_SIZE: usize = 1024;
/// Seeded rows are aged up to twice the TTL interval, which must stay representable as a timestamp
const MAX_TTL_SECS: u64 = 100 * 365 * 86_400;

fn as_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/*
    ttl policy
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl IntervalUnit {
    fn as_sql(&self) -> &'static str {
        match self {
            Self::Second => "SECOND",
            Self::Minute => "MINUTE",
            Self::Hour => "HOUR",
            Self::Day => "DAY",
            Self::Week => "WEEK",
            Self::Month => "MONTH",
            Self::Year => "YEAR",
        }
    }
    /// Seconds in one unit. Months and years are approximated as 30 and 365 days
    fn seconds(&self) -> u64 {
        match self {
            Self::Second => 1,
            Self::Minute => 60,
            Self::Hour => 3600,
            Self::Day => 86_400,
            Self::Week => 7 * 86_400,
            Self::Month => 30 * 86_400,
            Self::Year => 365 * 86_400,
        }
    }
}

/// The expiration interval of a TTL table, rendered as `<n> <UNIT>` (for example `5 MINUTE`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlInterval {
    amount: u32,
    unit: IntervalUnit,
}

impl TtlInterval {
    pub const fn new(amount: u32, unit: IntervalUnit) -> Self {
        Self { amount, unit }
    }
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.amount as u64 * self.unit.seconds())
    }
}

impl FromStr for TtlInterval {
    type Err = BenchError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || {
            BenchError::Config(format!(
                "bad TTL interval `{s}`. expected `<n> <UNIT>` of at most 100 years (for example `5 MINUTE`)"
            ))
        };
        let mut parts = s.split_whitespace();
        let (Some(amount), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(err());
        };
        let amount: u32 = amount.parse().map_err(|_| err())?;
        let unit = unit.to_ascii_uppercase();
        let unit = match unit.strip_suffix('S').unwrap_or(unit.as_str()) {
            "SECOND" => IntervalUnit::Second,
            "MINUTE" => IntervalUnit::Minute,
            "HOUR" => IntervalUnit::Hour,
            "DAY" => IntervalUnit::Day,
            "WEEK" => IntervalUnit::Week,
            "MONTH" => IntervalUnit::Month,
            "YEAR" => IntervalUnit::Year,
            _ => return Err(err()),
        };
        if amount == 0 || amount as u64 * unit.seconds() > MAX_TTL_SECS {
            return Err(err());
        }
        Ok(Self::new(amount, unit))
    }
}

impl fmt::Display for TtlInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.unit.as_sql())
    }
}

impl Serialize for TtlInterval {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// How often the server's TTL background job runs (`1h`, `30m`, `90s`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobInterval(Duration);

impl JobInterval {
    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }
    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl FromStr for JobInterval {
    type Err = BenchError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || {
            BenchError::Config(format!(
                "bad TTL job interval `{s}`. expected a value like `1h`, `30m` or `90s`"
            ))
        };
        let s = s.trim().to_ascii_lowercase();
        if s.len() < 2 {
            return Err(err());
        }
        let (amount, unit) = s.split_at(s.len() - 1);
        let amount: u64 = amount.parse().map_err(|_| err())?;
        let multiplier = match unit {
            "s" => 1,
            "m" => 60,
            "h" => 3600,
            _ => return Err(err()),
        };
        if amount == 0 {
            return Err(err());
        }
        Ok(Self::from_secs(amount * multiplier))
    }
}

impl fmt::Display for JobInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        if secs % 3600 == 0 {
            write!(f, "{}h", secs / 3600)
        } else if secs % 60 == 0 {
            write!(f, "{}m", secs / 60)
        } else {
            write!(f, "{secs}s")
        }
    }
}

impl Serialize for JobInterval {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// The TTL options applied when the benchmark tables are created
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TtlPolicy {
    #[serde(rename = "ttl_column")]
    pub column: Ident,
    #[serde(rename = "ttl_interval")]
    pub expire_after: TtlInterval,
    #[serde(rename = "ttl_job_interval")]
    pub job_interval: JobInterval,
    #[serde(rename = "ttl_enable")]
    pub enabled: bool,
}

/*
    database config
*/

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub database: Ident,
    pub charset: String,
    #[serde(serialize_with = "as_secs")]
    pub connect_timeout: Duration,
    pub autocommit: bool,
    pub connection_mode: ConnectionMode,
}

/*
    workload config
*/

#[derive(Debug, Clone, Serialize)]
pub struct WorkloadConfig {
    pub table_name: Ident,
    pub table_count: usize,
    #[serde(rename = "initial_data_count")]
    pub initial_rows: usize,
    pub record_size: usize,
    pub tiny_record_size: usize,
    #[serde(serialize_with = "as_secs")]
    pub duration: Duration,
    pub write_threads: usize,
    pub read_threads: usize,
    #[serde(rename = "write_batch_size")]
    pub batch_size: usize,
    pub writes_per_second: u64,
    #[serde(flatten)]
    pub ratios: Ratios,
    #[serde(serialize_with = "as_secs")]
    pub stats_interval: Duration,
    #[serde(serialize_with = "as_secs")]
    pub grace_period: Duration,
    pub ttl: TtlPolicy,
}

impl WorkloadConfig {
    /// Returns the tables managed by this run. A single table keeps the configured name,
    /// multiple tables are suffixed with their index
    pub fn tables(&self) -> Vec<Table> {
        if self.table_count == 1 {
            return vec![Table::new(self.table_name.clone(), self.ttl.column.clone())];
        }
        (0..self.table_count)
            .map(|i| {
                Table::new(
                    self.table_name.with_suffix(i),
                    self.ttl.column.clone(),
                )
            })
            .collect()
    }
    /// The pause a write worker takes after every operation so that all write workers together
    /// approach `writes_per_second`
    pub fn write_pause(&self) -> Duration {
        if self.write_threads == 0 || self.writes_per_second == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.write_threads as f64 / self.writes_per_second as f64)
    }
    pub fn validate(&self) -> BenchResult<()> {
        if self.table_count == 0 {
            return Err(cfg_err("`--table-count` must be a nonzero value"));
        }
        if self.batch_size == 0 {
            return Err(cfg_err("`--batch-size` must be a nonzero value"));
        }
        for (flag, size) in [
            ("--record-size", self.record_size),
            ("--tiny-record-size", self.tiny_record_size),
        ] {
            if size == 0 || size > MAX_RECORD_SIZE {
                return Err(cfg_err(format!(
                    "`{flag}` must be in the range 1-{MAX_RECORD_SIZE}"
                )));
            }
        }
        if self.duration.is_zero() {
            return Err(cfg_err("`--duration` must be a nonzero value"));
        }
        if self.stats_interval.is_zero() {
            return Err(cfg_err("`--stats-interval` must be a nonzero value"));
        }
        if self.write_threads != 0 && self.writes_per_second == 0 {
            return Err(cfg_err(
                "`--writes-per-second` must be a nonzero value when write threads are configured",
            ));
        }
        if self.table_count > 1 {
            // the widest suffixed name must still be a valid identifier
            self.table_name.with_suffix(self.table_count - 1).check()?;
        }
        Ok(())
    }
}

fn cfg_err(msg: impl ToString) -> BenchError {
    BenchError::Config(msg.to_string())
}

/*
    assembled config
*/

#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub db: DatabaseConfig,
    pub workload: WorkloadConfig,
    pub output_dir: PathBuf,
}

impl BenchConfig {
    pub fn from_cli(cli: Cli) -> BenchResult<Self> {
        if cli.charset.is_empty()
            || !cli
                .charset
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(cfg_err(format!("bad value for `--charset`: `{}`", cli.charset)));
        }
        let db = DatabaseConfig {
            host: cli.host,
            port: cli.port,
            user: cli.user,
            password: cli.password,
            database: Ident::new(cli.database)?,
            charset: cli.charset,
            connect_timeout: Duration::from_secs(cli.connect_timeout),
            autocommit: !cli.no_autocommit,
            connection_mode: cli.connection_mode,
        };
        let ttl = TtlPolicy {
            column: Ident::new(cli.ttl_column)?,
            expire_after: cli.ttl_interval.parse()?,
            job_interval: cli.ttl_job_interval.parse()?,
            enabled: !cli.no_ttl,
        };
        let workload = WorkloadConfig {
            table_name: Ident::new(cli.table_name)?,
            table_count: cli.table_count,
            initial_rows: cli.initial_rows,
            record_size: cli.record_size,
            tiny_record_size: cli.tiny_record_size,
            duration: Duration::from_secs(cli.duration),
            write_threads: cli.write_threads,
            read_threads: cli.read_threads,
            batch_size: cli.batch_size,
            writes_per_second: cli.writes_per_second,
            ratios: Ratios::new(cli.update_ratio, cli.small_write_ratio, cli.single_row_ratio)?,
            stats_interval: Duration::from_secs(cli.stats_interval),
            grace_period: Duration::from_secs(cli.grace_period),
            ttl,
        };
        workload.validate()?;
        Ok(Self {
            db,
            workload,
            output_dir: cli.output_dir,
        })
    }
}

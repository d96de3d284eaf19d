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

//! Operation generator
//!
//! Picks the next write variant from the configured ratios and turns it into the concrete
//! statements a worker runs on its connection, along with the counters those statements
//! contribute to.

use {
    crate::{
        config::WorkloadConfig,
        error::{BenchError, BenchResult},
        statement::{Statement, Table},
    },
    chrono::{Local, NaiveDateTime},
    rand::{distributions::Alphanumeric, Rng},
    serde::Serialize,
    std::time::Duration,
};

const RATIO_EPSILON: f64 = 1e-9;
/// `random_int` of generated rows is drawn from `1..=RANDOM_INT_MAX`
const RANDOM_INT_MAX: i64 = 100_000;
/// Updates target the lower half of the `random_int` space
const UPDATE_KEY_MAX: i64 = 50_000;
const RANDOM_FLOAT_MAX: f64 = 1000.0;
const RANGE_UPDATES_MAX: usize = 10;
const RANGE_UPDATE_SPAN_MAX: i64 = 100;
const SMALL_INSERT_ROWS_MAX: usize = 5;
/// Range selects look at rows written within this window
const RANGE_SELECT_WINDOW: Duration = Duration::from_secs(600);

/*
    ratios
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    SingleRow,
    Update,
    SmallInsert,
    BatchInsert,
}

/// The write mix. Whatever the three ratios leave over goes to batch inserts
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ratios {
    #[serde(rename = "update_ratio")]
    update: f64,
    #[serde(rename = "small_write_ratio")]
    small_write: f64,
    #[serde(rename = "single_row_ratio")]
    single_row: f64,
}

impl Ratios {
    pub fn new(update: f64, small_write: f64, single_row: f64) -> BenchResult<Self> {
        for (name, ratio) in [
            ("--update-ratio", update),
            ("--small-write-ratio", small_write),
            ("--single-row-ratio", single_row),
        ] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(BenchError::Config(format!(
                    "`{name}` must be in the range 0.0-1.0 (got {ratio})"
                )));
            }
        }
        let sum = update + small_write + single_row;
        if sum > 1.0 + RATIO_EPSILON {
            return Err(BenchError::Config(format!(
                "the update, small write and single row ratios add up to {sum}, which is more than 1.0"
            )));
        }
        Ok(Self {
            update,
            small_write,
            single_row,
        })
    }
    /// Maps a uniform draw in `[0, 1)` onto the cumulative partition
    /// `single row | update | small insert | batch insert`
    pub fn choose(&self, draw: f64) -> OperationKind {
        let mut bound = self.single_row;
        if draw < bound {
            return OperationKind::SingleRow;
        }
        bound += self.update;
        if draw < bound {
            return OperationKind::Update;
        }
        bound += self.small_write;
        if draw < bound {
            return OperationKind::SmallInsert;
        }
        OperationKind::BatchInsert
    }
}

pub fn choose_operation(ratios: &Ratios, rng: &mut impl Rng) -> OperationKind {
    ratios.choose(rng.gen::<f64>())
}

/*
    rows
*/

/// A generated row, in insert column order
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticRow {
    pub created_at: NaiveDateTime,
    pub data: String,
    pub random_int: i64,
    pub random_float: f64,
    pub status: i64,
}

impl SyntheticRow {
    pub fn generate(rng: &mut impl Rng, size: usize, created_at: NaiveDateTime) -> Self {
        Self {
            created_at,
            data: random_string(rng, size),
            random_int: rng.gen_range(1..=RANDOM_INT_MAX),
            random_float: random_float(rng),
            status: rng.gen_range(0..=1),
        }
    }
    /// A row whose TTL timestamp lies anywhere in `[now - max_age, now]`
    pub fn aged(rng: &mut impl Rng, size: usize, now: NaiveDateTime, max_age: Duration) -> Self {
        let age_ms = rng.gen_range(0..=max_age.as_millis() as i64);
        Self::generate(rng, size, now - chrono::Duration::milliseconds(age_ms))
    }
}

pub fn random_string(rng: &mut impl Rng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn random_float(rng: &mut impl Rng) -> f64 {
    rng.gen_range(0.0..RANDOM_FLOAT_MAX)
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/*
    write plans
*/

/// What a write plan contributes to the aggregate counters once it succeeds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteTally {
    pub writes: u64,
    pub inserts: u64,
    pub updates: u64,
    pub single_row: u64,
}

/// The statements of one write operation. They run in order on a single connection and produce
/// a single latency sample
#[derive(Debug)]
pub struct WritePlan {
    pub kind: OperationKind,
    pub statements: Vec<Statement>,
    pub tally: WriteTally,
}

impl WritePlan {
    pub fn generate(
        kind: OperationKind,
        table: &Table,
        cfg: &WorkloadConfig,
        rng: &mut impl Rng,
    ) -> Self {
        let half_record = (cfg.record_size / 2).max(1);
        let (statements, tally) = match kind {
            OperationKind::SingleRow => {
                let (stmt, is_insert) = if rng.gen_bool(0.5) {
                    let row = SyntheticRow::generate(rng, cfg.tiny_record_size, now());
                    (Statement::insert_rows(table, &[row]), true)
                } else {
                    let data = random_string(rng, cfg.tiny_record_size);
                    let f = random_float(rng);
                    let key = rng.gen_range(1..=UPDATE_KEY_MAX);
                    (Statement::update_single_row(table, data, f, key), false)
                };
                (
                    vec![stmt],
                    WriteTally {
                        writes: 1,
                        inserts: is_insert as u64,
                        updates: (!is_insert) as u64,
                        single_row: 1,
                    },
                )
            }
            OperationKind::Update => {
                let count = rng.gen_range(1..=RANGE_UPDATES_MAX);
                let statements = (0..count)
                    .map(|_| {
                        let data = random_string(rng, half_record);
                        let status = rng.gen_range(0..=1);
                        let f = random_float(rng);
                        let lo = rng.gen_range(1..=UPDATE_KEY_MAX);
                        let hi = lo + rng.gen_range(1..=RANGE_UPDATE_SPAN_MAX);
                        Statement::update_range(table, data, status, f, (lo, hi))
                    })
                    .collect();
                (
                    statements,
                    WriteTally {
                        writes: count as u64,
                        updates: count as u64,
                        ..Default::default()
                    },
                )
            }
            OperationKind::SmallInsert => {
                let count = rng.gen_range(1..=SMALL_INSERT_ROWS_MAX);
                Self::inserts(table, rng, count, half_record)
            }
            OperationKind::BatchInsert => {
                Self::inserts(table, rng, cfg.batch_size, cfg.record_size)
            }
        };
        Self {
            kind,
            statements,
            tally,
        }
    }
    fn inserts(
        table: &Table,
        rng: &mut impl Rng,
        count: usize,
        size: usize,
    ) -> (Vec<Statement>, WriteTally) {
        let now = now();
        let rows: Vec<_> = (0..count)
            .map(|_| SyntheticRow::generate(rng, size, now))
            .collect();
        (
            Statement::insert_chunks(table, &rows),
            WriteTally {
                writes: count as u64,
                inserts: count as u64,
                ..Default::default()
            },
        )
    }
}

/*
    reads
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadKind {
    PointSelect,
    RangeSelect,
    Count,
}

impl ReadKind {
    pub fn choose(rng: &mut impl Rng) -> Self {
        match rng.gen_range(0..3) {
            0 => Self::PointSelect,
            1 => Self::RangeSelect,
            _ => Self::Count,
        }
    }
    pub fn statement(&self, table: &Table, rng: &mut impl Rng) -> Statement {
        match self {
            Self::PointSelect => {
                Statement::point_select(table, rng.gen_range(1..=RANDOM_INT_MAX))
            }
            Self::RangeSelect => Statement::range_select(
                table,
                now() - chrono::Duration::seconds(RANGE_SELECT_WINDOW.as_secs() as i64),
            ),
            Self::Count => Statement::count_filtered(table),
        }
    }
}

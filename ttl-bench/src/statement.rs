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

//! Typed statement builder
//!
//! Every statement the runner sends is built here from an [`Ident`] (never from raw user input) so
//! that table and column names are validated once and the generated SQL keeps a fixed shape per
//! operation. The [`StatementKind`] travels with the SQL so that a [`Connection`](crate::db::Connection)
//! can tell what it is running without parsing it.

use {
    crate::{
        config::TtlPolicy,
        db::SqlValue,
        error::{BenchError, BenchResult},
        workload::SyntheticRow,
    },
    chrono::NaiveDateTime,
    serde::Serialize,
    std::fmt,
};

const MAX_IDENT_LEN: usize = 64;
/// The columns written by every insert, in order (the TTL column comes first)
const INSERT_COLUMNS: usize = 5;
/// MySQL rejects statements binding more than 65535 placeholders
pub const MAX_ROWS_PER_INSERT: usize = u16::MAX as usize / INSERT_COLUMNS;

/*
    identifiers
*/

/// A plain SQL identifier: `[A-Za-z_][A-Za-z0-9_]*`, at most 64 bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Ident(String);

impl Ident {
    pub fn new(ident: impl Into<String>) -> BenchResult<Self> {
        let ident = Self(ident.into());
        ident.check()?;
        Ok(ident)
    }
    pub fn check(&self) -> BenchResult<()> {
        let mut chars = self.0.chars();
        let valid = match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        };
        if valid && self.0.len() <= MAX_IDENT_LEN {
            Ok(())
        } else {
            Err(BenchError::Config(format!(
                "`{}` is not a valid identifier. use at most {MAX_IDENT_LEN} letters, digits or underscores",
                self.0
            )))
        }
    }
    /// Returns `<self>_<suffix>`. The result is not re-validated
    pub fn with_suffix(&self, suffix: usize) -> Self {
        Self(format!("{}_{suffix}", self.0))
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`", self.0)
    }
}

/// A benchmark table together with its TTL column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: Ident,
    ttl_column: Ident,
}

impl Table {
    pub fn new(name: Ident, ttl_column: Ident) -> Self {
        Self { name, ttl_column }
    }
    pub fn name(&self) -> &Ident {
        &self.name
    }
}

/*
    statements
*/

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Ping,
    CreateDatabase { database: Ident },
    DropTable { table: Ident },
    CreateTable { table: Ident, ttl: TtlPolicy },
    InsertRows { table: Ident, rows: usize },
    UpdateSingleRow { table: Ident },
    UpdateRange { table: Ident },
    PointSelect { table: Ident },
    RangeSelect { table: Ident },
    CountFiltered { table: Ident },
    CountAll { table: Ident },
    Commit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    kind: StatementKind,
    sql: String,
    params: Vec<SqlValue>,
}

impl Statement {
    fn new(kind: StatementKind, sql: String, params: Vec<SqlValue>) -> Self {
        Self { kind, sql, params }
    }
    pub fn kind(&self) -> &StatementKind {
        &self.kind
    }
    pub fn sql(&self) -> &str {
        &self.sql
    }
    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }
    /// `SELECT 1`
    pub fn ping() -> Self {
        Self::new(StatementKind::Ping, "SELECT 1".into(), vec![])
    }
    pub fn commit() -> Self {
        Self::new(StatementKind::Commit, "COMMIT".into(), vec![])
    }
    pub fn create_database(database: &Ident) -> Self {
        Self::new(
            StatementKind::CreateDatabase {
                database: database.clone(),
            },
            format!("CREATE DATABASE IF NOT EXISTS {database}"),
            vec![],
        )
    }
    pub fn drop_table(table: &Table) -> Self {
        Self::new(
            StatementKind::DropTable {
                table: table.name.clone(),
            },
            format!("DROP TABLE IF EXISTS {}", table.name),
            vec![],
        )
    }
    pub fn create_table(table: &Table, ttl: &TtlPolicy) -> Self {
        let col = &ttl.column;
        let sql = format!(
            "CREATE TABLE {name} (\
                id BIGINT AUTO_INCREMENT PRIMARY KEY, \
                {col} TIMESTAMP DEFAULT CURRENT_TIMESTAMP, \
                data_field VARCHAR(1024), \
                random_int INT, \
                random_float DOUBLE, \
                status TINYINT DEFAULT 1, \
                INDEX idx_ttl_column ({col}), \
                INDEX idx_random_int (random_int)\
            ) TTL = {col} + INTERVAL {interval} TTL_ENABLE = '{enable}' TTL_JOB_INTERVAL = '{job}'",
            name = table.name,
            interval = ttl.expire_after,
            enable = if ttl.enabled { "ON" } else { "OFF" },
            job = ttl.job_interval,
        );
        Self::new(
            StatementKind::CreateTable {
                table: table.name.clone(),
                ttl: ttl.clone(),
            },
            sql,
            vec![],
        )
    }
    /// Multi-row inserts of at most [`MAX_ROWS_PER_INSERT`] rows each, covering `rows` in order
    pub fn insert_chunks(table: &Table, rows: &[SyntheticRow]) -> Vec<Self> {
        rows.chunks(MAX_ROWS_PER_INSERT)
            .map(|chunk| Self::insert_rows(table, chunk))
            .collect()
    }
    /// A single multi-row insert. Each row binds its TTL timestamp, payload, `random_int`,
    /// `random_float` and `status`
    pub fn insert_rows(table: &Table, rows: &[SyntheticRow]) -> Self {
        let mut sql = format!(
            "INSERT INTO {} ({}, data_field, random_int, random_float, status) VALUES ",
            table.name, table.ttl_column
        );
        let mut params = Vec::with_capacity(rows.len() * INSERT_COLUMNS);
        for (i, row) in rows.iter().enumerate() {
            if i != 0 {
                sql.push_str(", ");
            }
            sql.push_str("(?, ?, ?, ?, ?)");
            params.push(SqlValue::Timestamp(row.created_at));
            params.push(SqlValue::Text(row.data.clone()));
            params.push(SqlValue::Int(row.random_int));
            params.push(SqlValue::Float(row.random_float));
            params.push(SqlValue::Int(row.status));
        }
        Self::new(
            StatementKind::InsertRows {
                table: table.name.clone(),
                rows: rows.len(),
            },
            sql,
            params,
        )
    }
    pub fn update_single_row(table: &Table, data: String, random_float: f64, random_int: i64) -> Self {
        Self::new(
            StatementKind::UpdateSingleRow {
                table: table.name.clone(),
            },
            format!(
                "UPDATE {} SET data_field = ?, random_float = ? WHERE random_int = ? LIMIT 1",
                table.name
            ),
            vec![
                SqlValue::Text(data),
                SqlValue::Float(random_float),
                SqlValue::Int(random_int),
            ],
        )
    }
    pub fn update_range(
        table: &Table,
        data: String,
        status: i64,
        random_float: f64,
        (lo, hi): (i64, i64),
    ) -> Self {
        Self::new(
            StatementKind::UpdateRange {
                table: table.name.clone(),
            },
            format!(
                "UPDATE {} SET data_field = ?, status = ?, random_float = ? \
                WHERE random_int BETWEEN ? AND ? LIMIT 5",
                table.name
            ),
            vec![
                SqlValue::Text(data),
                SqlValue::Int(status),
                SqlValue::Float(random_float),
                SqlValue::Int(lo),
                SqlValue::Int(hi),
            ],
        )
    }
    pub fn point_select(table: &Table, random_int: i64) -> Self {
        Self::new(
            StatementKind::PointSelect {
                table: table.name.clone(),
            },
            format!("SELECT * FROM {} WHERE random_int = ? LIMIT 10", table.name),
            vec![SqlValue::Int(random_int)],
        )
    }
    pub fn range_select(table: &Table, since: NaiveDateTime) -> Self {
        Self::new(
            StatementKind::RangeSelect {
                table: table.name.clone(),
            },
            format!(
                "SELECT * FROM {} WHERE {} >= ? LIMIT 50",
                table.name, table.ttl_column
            ),
            vec![SqlValue::Timestamp(since)],
        )
    }
    pub fn count_filtered(table: &Table) -> Self {
        Self::new(
            StatementKind::CountFiltered {
                table: table.name.clone(),
            },
            format!("SELECT COUNT(*) FROM {} WHERE status = 1", table.name),
            vec![],
        )
    }
    pub fn count_all(table: &Table) -> Self {
        Self::new(
            StatementKind::CountAll {
                table: table.name.clone(),
            },
            format!("SELECT COUNT(*) FROM {}", table.name),
            vec![],
        )
    }
}

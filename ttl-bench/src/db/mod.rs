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

//! # Database seam
//!
//! The runner only talks to the database through [`Connector`] and [`Connection`]. Workers never
//! share a connection: every operation opens its own through the connector, runs its statements
//! and closes it again (see [`timed_execute`] and [`timed_query`]).

pub mod mysql;
#[cfg(test)]
pub mod memory;

use {
    crate::statement::Statement,
    async_trait::async_trait,
    chrono::NaiveDateTime,
    std::{
        fmt,
        time::{Duration, Instant},
    },
};

/*
    values
*/

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl SqlValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Text(t) => t.parse().ok(),
            _ => None,
        }
    }
}

pub type Row = Vec<SqlValue>;

/*
    errors
*/

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    /// The connection could not be established
    Connect(String),
    /// The connection was not established within the connect timeout
    Timeout(Duration),
    /// The server rejected a statement or the connection broke while running it
    Statement(String),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(e) => write!(f, "failed to connect. {e}"),
            Self::Timeout(t) => write!(f, "timed out connecting after {}s", t.as_secs_f64()),
            Self::Statement(e) => write!(f, "statement failed. {e}"),
        }
    }
}

impl std::error::Error for DbError {}

/*
    seams
*/

#[async_trait]
pub trait Connection: Send + Sized {
    /// Runs a statement, returning the number of affected rows
    async fn execute(&mut self, stmt: &Statement) -> DbResult<u64>;
    async fn query(&mut self, stmt: &Statement) -> DbResult<Vec<Row>>;
    async fn close(self) -> DbResult<()>;
}

#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Conn: Connection;
    /// Opens a connection to the benchmark database
    async fn connect(&self) -> DbResult<Self::Conn>;
    /// Opens a connection without selecting a database (used before the database exists)
    async fn connect_server(&self) -> DbResult<Self::Conn>;
    /// Whether the server commits every statement on its own. Otherwise [`timed_execute`]
    /// commits explicitly after the last statement
    fn autocommit(&self) -> bool {
        true
    }
    /// Releases anything the connector holds on to once the run is over
    async fn shutdown(&self) {}
}

/*
    helpers
*/

async fn close<C: Connection>(conn: C) {
    if let Err(e) = conn.close().await {
        debug!("failed to close connection cleanly: {e}");
    }
}

/// Runs `stmts` in order on a fresh connection and returns the time taken from opening the
/// connection until the last statement completed (and was committed, without autocommit)
pub async fn timed_execute<C: Connector>(connector: &C, stmts: &[Statement]) -> DbResult<Duration> {
    let start = Instant::now();
    let mut conn = connector.connect().await?;
    let mut ret = Ok(());
    for stmt in stmts {
        if let Err(e) = conn.execute(stmt).await {
            ret = Err(e);
            break;
        }
    }
    if ret.is_ok() && !connector.autocommit() {
        ret = conn.execute(&Statement::commit()).await.map(|_| ());
    }
    let elapsed = start.elapsed();
    close(conn).await;
    ret.map(|()| elapsed)
}

/// Runs a query on a fresh connection, returning the rows and the time taken from opening the
/// connection until the result set was read
pub async fn timed_query<C: Connector>(
    connector: &C,
    stmt: &Statement,
) -> DbResult<(Vec<Row>, Duration)> {
    let start = Instant::now();
    let mut conn = connector.connect().await?;
    let ret = conn.query(stmt).await;
    let elapsed = start.elapsed();
    close(conn).await;
    ret.map(|rows| (rows, elapsed))
}

/// Runs `SELECT COUNT(*)`-shaped statement on a fresh connection and reads the count
pub async fn count<C: Connector>(connector: &C, stmt: &Statement) -> DbResult<u64> {
    let (rows, _) = timed_query(connector, stmt).await?;
    rows.first()
        .and_then(|row| row.first())
        .and_then(SqlValue::as_i64)
        .map(|c| c as u64)
        .ok_or_else(|| DbError::Statement(format!("`{}` returned no count", stmt.sql())))
}

/// Runs `stmts` in order on one connection to the server (no database selected)
pub async fn execute_on_server<C: Connector>(connector: &C, stmts: &[Statement]) -> DbResult<()> {
    let mut conn = connector.connect_server().await?;
    let mut ret = Ok(());
    for stmt in stmts {
        trace!("running `{}`", stmt.sql());
        if let Err(e) = conn.execute(stmt).await {
            ret = Err(e);
            break;
        }
    }
    close(conn).await;
    ret
}

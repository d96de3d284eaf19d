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

//! [`Connector`] over `mysql_async`, for MySQL and TiDB servers

use {
    super::{Connection, Connector, DbError, DbResult, Row, SqlValue},
    crate::{
        cli::ConnectionMode,
        config::DatabaseConfig,
        statement::Statement,
    },
    async_trait::async_trait,
    chrono::{Datelike, NaiveDate, Timelike},
    mysql_async::{prelude::Queryable, Conn, Opts, OptsBuilder, Params, Pool, Value},
    std::time::Duration,
};

pub struct MySqlConnector {
    server_opts: Opts,
    db_opts: Opts,
    pool: Option<Pool>,
    connect_timeout: Duration,
    autocommit: bool,
}

impl MySqlConnector {
    pub fn new(cfg: &DatabaseConfig) -> Self {
        let base = OptsBuilder::default()
            .ip_or_hostname(cfg.host.clone())
            .tcp_port(cfg.port)
            .user(Some(cfg.user.clone()))
            .pass(Some(cfg.password.clone()))
            .init(vec![
                format!("SET NAMES {}", cfg.charset),
                format!("SET autocommit = {}", cfg.autocommit as u8),
            ]);
        let server_opts = Opts::from(base.clone());
        let db_opts = Opts::from(base.db_name(Some(cfg.database.as_str())));
        let pool = match cfg.connection_mode {
            ConnectionMode::Fresh => None,
            ConnectionMode::Pooled => Some(Pool::new(db_opts.clone())),
        };
        Self {
            server_opts,
            db_opts,
            pool,
            connect_timeout: cfg.connect_timeout,
            autocommit: cfg.autocommit,
        }
    }
    async fn open(&self, opts: &Opts) -> DbResult<Conn> {
        match tokio::time::timeout(self.connect_timeout, Conn::new(opts.clone())).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(DbError::Connect(e.to_string())),
            Err(_) => Err(DbError::Timeout(self.connect_timeout)),
        }
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    type Conn = MySqlConnection;
    async fn connect(&self) -> DbResult<MySqlConnection> {
        match &self.pool {
            None => Ok(MySqlConnection::fresh(self.open(&self.db_opts).await?)),
            Some(pool) => {
                match tokio::time::timeout(self.connect_timeout, pool.get_conn()).await {
                    Ok(Ok(conn)) => Ok(MySqlConnection::pooled(conn)),
                    Ok(Err(e)) => Err(DbError::Connect(e.to_string())),
                    Err(_) => Err(DbError::Timeout(self.connect_timeout)),
                }
            }
        }
    }
    async fn connect_server(&self) -> DbResult<MySqlConnection> {
        Ok(MySqlConnection::fresh(self.open(&self.server_opts).await?))
    }
    fn autocommit(&self) -> bool {
        self.autocommit
    }
    async fn shutdown(&self) {
        if let Some(pool) = self.pool.clone() {
            if let Err(e) = pool.disconnect().await {
                warn!("failed to disconnect connection pool: {e}");
            }
        }
    }
}

pub struct MySqlConnection {
    conn: Conn,
    pooled: bool,
}

impl MySqlConnection {
    fn fresh(conn: Conn) -> Self {
        Self {
            conn,
            pooled: false,
        }
    }
    fn pooled(conn: Conn) -> Self {
        Self { conn, pooled: true }
    }
}

fn stmt_err(e: mysql_async::Error) -> DbError {
    DbError::Statement(e.to_string())
}

#[async_trait]
impl Connection for MySqlConnection {
    async fn execute(&mut self, stmt: &Statement) -> DbResult<u64> {
        trace!("executing {:?}", stmt.kind());
        if stmt.params().is_empty() {
            self.conn.query_drop(stmt.sql()).await.map_err(stmt_err)?;
        } else {
            self.conn
                .exec_drop(stmt.sql(), params(stmt))
                .await
                .map_err(stmt_err)?;
        }
        Ok(self.conn.affected_rows())
    }
    async fn query(&mut self, stmt: &Statement) -> DbResult<Vec<Row>> {
        let rows = if stmt.params().is_empty() {
            self.conn.query::<mysql_async::Row, _>(stmt.sql()).await
        } else {
            self.conn
                .exec::<mysql_async::Row, _, _>(stmt.sql(), params(stmt))
                .await
        };
        let rows = rows.map_err(stmt_err)?;
        Ok(rows.into_iter().map(read_row).collect())
    }
    async fn close(self) -> DbResult<()> {
        if self.pooled {
            // dropping hands the connection back to the pool
            return Ok(());
        }
        self.conn.disconnect().await.map_err(stmt_err)
    }
}

/*
    value conversion
*/

fn params(stmt: &Statement) -> Params {
    Params::Positional(stmt.params().iter().map(to_mysql).collect())
}

fn to_mysql(v: &SqlValue) -> Value {
    match v {
        SqlValue::Null => Value::NULL,
        SqlValue::Int(i) => Value::Int(*i),
        SqlValue::Float(f) => Value::Double(*f),
        SqlValue::Text(t) => Value::Bytes(t.as_bytes().to_vec()),
        SqlValue::Timestamp(ts) => Value::Date(
            ts.year() as u16,
            ts.month() as u8,
            ts.day() as u8,
            ts.hour() as u8,
            ts.minute() as u8,
            ts.second() as u8,
            ts.nanosecond() / 1000,
        ),
    }
}

fn read_row(mut row: mysql_async::Row) -> Row {
    (0..row.len())
        .map(|i| row.take::<Value, _>(i).map_or(SqlValue::Null, from_mysql))
        .collect()
}

fn from_mysql(v: Value) -> SqlValue {
    match v {
        Value::NULL => SqlValue::Null,
        Value::Int(i) => SqlValue::Int(i),
        Value::UInt(u) => SqlValue::Int(u as i64),
        Value::Float(f) => SqlValue::Float(f as f64),
        Value::Double(f) => SqlValue::Float(f),
        Value::Bytes(b) => SqlValue::Text(String::from_utf8_lossy(&b).into_owned()),
        Value::Date(y, m, d, h, mi, s, us) => NaiveDate::from_ymd_opt(y as i32, m as u32, d as u32)
            .and_then(|date| date.and_hms_micro_opt(h as u32, mi as u32, s as u32, us))
            .map_or(SqlValue::Null, SqlValue::Timestamp),
        time @ Value::Time(..) => SqlValue::Text(time.as_sql(true)),
    }
}

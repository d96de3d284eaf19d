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

//! An in-memory stand-in for a TTL-enabled server, used by the tests. It interprets statements by
//! their [`StatementKind`] and runs the TTL job lazily whenever a statement touches the engine.

use {
    super::{Connection, Connector, DbError, DbResult, Row, SqlValue},
    crate::{
        config::TtlPolicy,
        statement::{Statement, StatementKind},
    },
    async_trait::async_trait,
    chrono::{Local, NaiveDateTime},
    std::{
        collections::{HashMap, HashSet},
        sync::{
            atomic::{AtomicBool, AtomicU64, Ordering},
            Arc, Mutex, PoisonError,
        },
        time::{Duration, Instant},
    },
};

struct MemRow {
    created_at: NaiveDateTime,
    random_int: i64,
    status: i64,
}

struct MemTable {
    ttl: TtlPolicy,
    rows: Vec<MemRow>,
    last_purge: Instant,
}

impl MemTable {
    fn run_ttl_job(&mut self) {
        if !self.ttl.enabled || self.last_purge.elapsed() < self.ttl.job_interval.as_duration() {
            return;
        }
        let expire_after = self.ttl.expire_after.as_duration();
        let now = Local::now().naive_local();
        self.rows.retain(|row| {
            (now - row.created_at)
                .to_std()
                .map_or(true, |age| age < expire_after)
        });
        self.last_purge = Instant::now();
    }
}

#[derive(Default)]
struct Engine {
    databases: HashSet<String>,
    tables: HashMap<String, MemTable>,
}

#[derive(Default)]
struct Shared {
    engine: Mutex<Engine>,
    opened: AtomicU64,
    closed: AtomicU64,
    statements: AtomicU64,
    fail_connect: AtomicBool,
    fail_writes: AtomicBool,
    fail_counts: AtomicBool,
    fail_reads: AtomicBool,
    manual_commit: AtomicBool,
    latency_ms: AtomicU64,
    log: Mutex<Vec<StatementKind>>,
}

#[derive(Clone, Default)]
pub struct MemoryConnector {
    shared: Arc<Shared>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn fail_connect(&self, fail: bool) {
        self.shared.fail_connect.store(fail, Ordering::Release)
    }
    pub fn fail_writes(&self, fail: bool) {
        self.shared.fail_writes.store(fail, Ordering::Release)
    }
    pub fn fail_counts(&self, fail: bool) {
        self.shared.fail_counts.store(fail, Ordering::Release)
    }
    /// Fails point selects, range selects and filtered counts
    pub fn fail_reads(&self, fail: bool) {
        self.shared.fail_reads.store(fail, Ordering::Release)
    }
    pub fn set_autocommit(&self, autocommit: bool) {
        self.shared.manual_commit.store(!autocommit, Ordering::Release)
    }
    /// Every statement takes at least this long
    pub fn set_latency(&self, latency: Duration) {
        self.shared
            .latency_ms
            .store(latency.as_millis() as u64, Ordering::Release)
    }
    pub fn opened(&self) -> u64 {
        self.shared.opened.load(Ordering::Acquire)
    }
    pub fn closed(&self) -> u64 {
        self.shared.closed.load(Ordering::Acquire)
    }
    pub fn statements(&self) -> u64 {
        self.shared.statements.load(Ordering::Acquire)
    }
    /// The kind of every statement run so far, in order
    pub fn statement_log(&self) -> Vec<StatementKind> {
        self.shared
            .log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
    pub fn has_database(&self, name: &str) -> bool {
        self.engine(|e| e.databases.contains(name))
    }
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.engine(|e| e.tables.get(table).map(|t| t.rows.len()))
    }
    fn engine<T>(&self, f: impl FnOnce(&mut Engine) -> T) -> T {
        let mut engine = self
            .shared
            .engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut engine)
    }
    fn open(&self) -> DbResult<MemoryConnection> {
        if self.shared.fail_connect.load(Ordering::Acquire) {
            return Err(DbError::Connect("connection refused".into()));
        }
        self.shared.opened.fetch_add(1, Ordering::AcqRel);
        Ok(MemoryConnection {
            connector: self.clone(),
        })
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Conn = MemoryConnection;
    async fn connect(&self) -> DbResult<MemoryConnection> {
        self.open()
    }
    async fn connect_server(&self) -> DbResult<MemoryConnection> {
        self.open()
    }
    fn autocommit(&self) -> bool {
        !self.shared.manual_commit.load(Ordering::Acquire)
    }
}

pub struct MemoryConnection {
    connector: MemoryConnector,
}

impl MemoryConnection {
    async fn run(&self, stmt: &Statement) -> DbResult<(u64, Vec<Row>)> {
        let shared = &self.connector.shared;
        let latency = shared.latency_ms.load(Ordering::Acquire);
        if latency != 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        shared.statements.fetch_add(1, Ordering::AcqRel);
        shared
            .log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(stmt.kind().clone());
        let faults = Faults {
            writes: shared.fail_writes.load(Ordering::Acquire),
            counts: shared.fail_counts.load(Ordering::Acquire),
            reads: shared.fail_reads.load(Ordering::Acquire),
        };
        self.connector.engine(|engine| apply(engine, stmt, faults))
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn execute(&mut self, stmt: &Statement) -> DbResult<u64> {
        self.run(stmt).await.map(|(affected, _)| affected)
    }
    async fn query(&mut self, stmt: &Statement) -> DbResult<Vec<Row>> {
        self.run(stmt).await.map(|(_, rows)| rows)
    }
    async fn close(self) -> DbResult<()> {
        self.connector.shared.closed.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

#[derive(Clone, Copy)]
struct Faults {
    writes: bool,
    counts: bool,
    reads: bool,
}

fn apply(engine: &mut Engine, stmt: &Statement, faults: Faults) -> DbResult<(u64, Vec<Row>)> {
    engine.tables.values_mut().for_each(MemTable::run_ttl_job);
    let params = stmt.params();
    let int_at = |i: usize| params.get(i).and_then(SqlValue::as_i64).unwrap_or_default();
    if faults.reads
        && matches!(
            stmt.kind(),
            StatementKind::PointSelect { .. }
                | StatementKind::RangeSelect { .. }
                | StatementKind::CountFiltered { .. }
        )
    {
        return Err(DbError::Statement("read rejected".into()));
    }
    match stmt.kind() {
        StatementKind::Ping => Ok((0, vec![vec![SqlValue::Int(1)]])),
        // every statement is applied right away
        StatementKind::Commit => Ok((0, vec![])),
        StatementKind::CreateDatabase { database } => {
            engine.databases.insert(database.as_str().to_owned());
            Ok((1, vec![]))
        }
        StatementKind::DropTable { table } => {
            engine.tables.remove(table.as_str());
            Ok((0, vec![]))
        }
        StatementKind::CreateTable { table, ttl } => {
            if engine.tables.contains_key(table.as_str()) {
                return Err(DbError::Statement(format!("table {table} already exists")));
            }
            engine.tables.insert(
                table.as_str().to_owned(),
                MemTable {
                    ttl: ttl.clone(),
                    rows: vec![],
                    last_purge: Instant::now(),
                },
            );
            Ok((0, vec![]))
        }
        kind @ (StatementKind::InsertRows { table, .. }
        | StatementKind::UpdateSingleRow { table }
        | StatementKind::UpdateRange { table }) => {
            if faults.writes {
                return Err(DbError::Statement("write rejected".into()));
            }
            let t = table_mut(engine, table.as_str())?;
            let affected = match kind {
                StatementKind::InsertRows { .. } => {
                    for row in params.chunks(5) {
                        let SqlValue::Timestamp(created_at) = row[0] else {
                            return Err(DbError::Statement("bad ttl column value".into()));
                        };
                        t.rows.push(MemRow {
                            created_at,
                            random_int: row[2].as_i64().unwrap_or_default(),
                            status: row[4].as_i64().unwrap_or_default(),
                        });
                    }
                    params.len() / 5
                }
                StatementKind::UpdateSingleRow { .. } => {
                    let key = int_at(2);
                    t.rows.iter().any(|r| r.random_int == key) as usize
                }
                _ => {
                    let (status, lo, hi) = (int_at(1), int_at(3), int_at(4));
                    let mut updated = 0;
                    for row in t
                        .rows
                        .iter_mut()
                        .filter(|r| (lo..=hi).contains(&r.random_int))
                        .take(5)
                    {
                        row.status = status;
                        updated += 1;
                    }
                    updated
                }
            };
            Ok((affected as u64, vec![]))
        }
        StatementKind::PointSelect { table } => {
            let key = int_at(0);
            let t = table_mut(engine, table.as_str())?;
            let rows = t
                .rows
                .iter()
                .filter(|r| r.random_int == key)
                .take(10)
                .map(row_of)
                .collect();
            Ok((0, rows))
        }
        StatementKind::RangeSelect { table } => {
            let Some(SqlValue::Timestamp(since)) = params.first() else {
                return Err(DbError::Statement("bad range bound".into()));
            };
            let t = table_mut(engine, table.as_str())?;
            let rows = t
                .rows
                .iter()
                .filter(|r| r.created_at >= *since)
                .take(50)
                .map(row_of)
                .collect();
            Ok((0, rows))
        }
        StatementKind::CountFiltered { table } => {
            let t = table_mut(engine, table.as_str())?;
            let count = t.rows.iter().filter(|r| r.status == 1).count();
            Ok((0, vec![vec![SqlValue::Int(count as i64)]]))
        }
        StatementKind::CountAll { table } => {
            if faults.counts {
                return Err(DbError::Statement("count rejected".into()));
            }
            let t = table_mut(engine, table.as_str())?;
            Ok((0, vec![vec![SqlValue::Int(t.rows.len() as i64)]]))
        }
    }
}

fn table_mut<'a>(engine: &'a mut Engine, name: &str) -> DbResult<&'a mut MemTable> {
    engine
        .tables
        .get_mut(name)
        .ok_or_else(|| DbError::Statement(format!("table `{name}` doesn't exist")))
}

fn row_of(r: &MemRow) -> Row {
    vec![
        SqlValue::Timestamp(r.created_at),
        SqlValue::Int(r.random_int),
        SqlValue::Int(r.status),
    ]
}

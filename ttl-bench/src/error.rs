/*
 * Created on Mon Aug 08 2022
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
    crate::db::DbError,
    std::{fmt, io},
};

pub type BenchResult<T> = Result<T, BenchError>;

/// Benchmark tool errors
#[derive(Debug)]
pub enum BenchError {
    /// An error originating from the CLI arguments or the derived configuration
    Config(String),
    /// The database could not be prepared for the run
    Setup(DbError),
    /// The final report could not be persisted
    Report(String),
    /// A runtime error
    Runtime(String),
}

impl From<DbError> for BenchError {
    fn from(e: DbError) -> Self {
        Self::Setup(e)
    }
}

impl From<io::Error> for BenchError {
    fn from(e: io::Error) -> Self {
        Self::Report(format!("i/o error: {e}"))
    }
}

impl From<serde_json::Error> for BenchError {
    fn from(e: serde_json::Error) -> Self {
        Self::Report(format!("serialization error: {e}"))
    }
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config error: {e}"),
            Self::Setup(e) => write!(f, "setup error: {e}"),
            Self::Report(e) => write!(f, "report error: {e}"),
            Self::Runtime(e) => write!(f, "runtime error: {e}"),
        }
    }
}

impl std::error::Error for BenchError {}

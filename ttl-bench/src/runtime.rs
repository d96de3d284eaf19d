/*
 * Created on Mon Nov 21 2022
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

pub mod pool;
pub mod reporter;

use {
    std::{sync::Arc, time::Duration},
    tokio::sync::watch,
};

/// Operations per second, zero if no time has elapsed
pub fn rate(count: u64, elapsed: Duration) -> f64 {
    const NANOS_PER_SECOND: f64 = 1_000_000_000.0;
    let elapsed_nanos = elapsed.as_nanos() as f64;
    if elapsed_nanos == 0.0 {
        return 0.0;
    }
    (count as f64 / elapsed_nanos) * NANOS_PER_SECOND
}

/*
    stop signal
*/

/// The cancellation token handed to every worker and the reporter. Once fired it stays fired
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }
    pub fn fire(&self) {
        self.tx.send_replace(true);
    }
    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }
    /// Sleeps for `dur` or until the signal fires, whichever comes first. Returns `true` if the
    /// signal fired
    pub async fn sleep(&self, dur: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        let already_set = *rx.borrow_and_update();
        if already_set {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(dur) => self.is_set(),
            _ = rx.changed() => true,
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

// Copyright 2025 Assistance Micro Design
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Write pacing for the knowledge-base vendor rate limit.
//!
//! Ensures a minimum gap between successive page writes of one batch.
//! One pacer instance per batch; cross-batch coordination is not required.

use super::MIN_WRITE_SPACING_MS;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

/// Paces successive writes within one batch.
///
/// Thread-safe; clones share the same last-write timestamp.
#[derive(Clone)]
pub struct WritePacer {
    /// Timestamp of the last write
    last_call: Arc<Mutex<Option<Instant>>>,
    /// Minimum gap between writes
    min_gap: Duration,
}

impl WritePacer {
    /// Creates a pacer with the default ≥200 ms gap.
    pub fn new() -> Self {
        Self::with_gap(MIN_WRITE_SPACING_MS)
    }

    /// Creates a pacer with a custom gap in milliseconds.
    pub fn with_gap(min_gap_ms: u64) -> Self {
        Self {
            last_call: Arc::new(Mutex::new(None)),
            min_gap: Duration::from_millis(min_gap_ms),
        }
    }

    /// Waits until the minimum gap since the previous write has elapsed,
    /// then stamps the current instant. The first call never waits.
    pub async fn wait_if_needed(&self) {
        let mut last = self.last_call.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_gap {
                let wait_time = self.min_gap - elapsed;
                debug!(
                    wait_ms = wait_time.as_millis() as u64,
                    "Pacing knowledge-base write"
                );
                sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }

    /// Returns the configured minimum gap.
    pub fn min_gap(&self) -> Duration {
        self.min_gap
    }
}

impl Default for WritePacer {
    fn default() -> Self {
        Self::new()
    }
}

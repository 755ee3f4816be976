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

//! Content-hash analysis cache.
//!
//! Key = SHA-256 of the concatenated message contents; TTL one hour;
//! single-process and bounded. Eviction is strict TTL plus an
//! opportunistic sweep whenever the hit/miss path encounters an expired
//! entry. Correctness never depends on this cache; it only short-circuits
//! identical re-analysis within the TTL window.

use crate::models::{TaskDetection, Thread, ThreadSummary};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Default entry lifetime.
pub const CACHE_TTL_SECS: u64 = 3600;

/// Bound on resident entries; oldest-expiry entries are swept first when
/// full.
pub const CACHE_MAX_ENTRIES: usize = 256;

#[derive(Clone)]
struct CacheEntry {
    summary: ThreadSummary,
    detection: TaskDetection,
    expires_at: Instant,
}

/// Bounded TTL cache for analysis results.
pub struct AnalysisCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(CACHE_TTL_SECS), CACHE_MAX_ENTRIES)
    }
}

impl AnalysisCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries,
        }
    }

    /// Deterministic cache key for a thread: SHA-256 over every message
    /// content in order.
    pub fn key_for(thread: &Thread) -> String {
        let mut hasher = Sha256::new();
        for message in thread.messages() {
            hasher.update(message.content.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }

    /// Returns the cached analysis if present and fresh. Finding an
    /// expired entry triggers an opportunistic sweep.
    pub async fn get(&self, key: &str) -> Option<(ThreadSummary, TaskDetection)> {
        let expired_hit = {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    debug!(key = %key, "Analysis cache hit");
                    return Some((entry.summary.clone(), entry.detection.clone()));
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired_hit {
            self.sweep().await;
        }
        None
    }

    /// Stores an analysis result under the key.
    pub async fn insert(&self, key: String, summary: ThreadSummary, detection: TaskDetection) {
        let mut entries = self.entries.write().await;
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            let now = Instant::now();
            entries.retain(|_, e| e.expires_at > now);
            // Still full of fresh entries: drop the one closest to expiry
            if entries.len() >= self.max_entries {
                if let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, e)| e.expires_at)
                    .map(|(k, _)| k.clone())
                {
                    entries.remove(&oldest);
                }
            }
        }
        entries.insert(
            key,
            CacheEntry {
                summary,
                detection,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Drops every expired entry.
    pub async fn sweep(&self) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed = removed, "Swept expired analysis cache entries");
        }
    }

    /// Number of resident entries (fresh or not).
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

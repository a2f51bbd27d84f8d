// Copyright 2025 Sushanth (https://github.com/sushanthpy)
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

//! Process-wide registry of per-document mutexes.
//!
//! Every mutation to a document's repository (commit, branch create, merge,
//! tag) must hold that document's lock for its entire duration, so two
//! concurrent writers against the same document serialize instead of racing
//! on the ref store.

use dashmap::DashMap;
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use std::sync::Arc;

/// Holds one `Arc<Mutex<()>>` per document id, created lazily on first use
/// and kept alive for the process lifetime.
pub struct LockRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

pub type DocumentGuard = ArcMutexGuard<RawMutex, ()>;

impl LockRegistry {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    fn entry(&self, document_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(document_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquire the lock for `document_id`, blocking the calling thread until
    /// it's free. The returned guard must be held for the whole mutating
    /// operation.
    pub fn lock(&self, document_id: &str) -> DocumentGuard {
        Mutex::lock_arc(&self.entry(document_id))
    }
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    #[test]
    fn same_document_serializes_across_threads() {
        let registry = Arc::new(LockRegistry::new());
        let counter = Arc::new(AtomicU32::new(0));
        let max_concurrent = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let counter = counter.clone();
                let max_concurrent = max_concurrent.clone();
                thread::spawn(move || {
                    let _guard = registry.lock("doc-1");
                    let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    max_concurrent.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(std::time::Duration::from_millis(5));
                    counter.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn different_documents_do_not_block_each_other() {
        let registry = LockRegistry::new();
        let guard_a = registry.lock("doc-a");
        let guard_b = registry.lock("doc-b");
        drop(guard_a);
        drop(guard_b);
    }
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Per-`(sessionId, model)` cache of the most recent `thoughtSignature`, so a
//! later turn in the same session can replay it without the client having
//! had to echo it back.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::Mutex;

use crate::pressure::{PressureHint, PressureLevel, PressureTable};

const TTL: Duration = Duration::from_secs(30 * 60);

const CAPACITY: PressureTable<usize> =
    PressureTable { low: 256, medium: 128, high: 64, critical: 0 };

type Key = (String, String);

struct Entry {
    signature: String,
    inserted_at: Instant,
}

pub struct SignatureCache {
    inner: Mutex<LruCache<Key, Entry>>,
    hint: Arc<dyn PressureHint>,
}

impl SignatureCache {
    pub fn new(hint: Arc<dyn PressureHint>) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(NonZeroUsize::new(CAPACITY.low).unwrap())),
            hint,
        }
    }

    pub async fn put(&self, session_id: &str, model: &str, signature: String) {
        let cap = CAPACITY.get(self.hint.level());
        let mut guard = self.inner.lock().await;
        if cap == 0 {
            guard.clear();
            return;
        }
        resize(&mut guard, cap);
        guard.put((session_id.to_string(), model.to_string()), Entry {
            signature,
            inserted_at: Instant::now(),
        });
    }

    /// Returns the cached signature if present and not older than 30 minutes.
    /// An expired entry is evicted on the way out, not left to linger.
    pub async fn get(&self, session_id: &str, model: &str) -> Option<String> {
        let cap = CAPACITY.get(self.hint.level());
        let mut guard = self.inner.lock().await;
        if cap == 0 {
            guard.clear();
            return None;
        }
        resize(&mut guard, cap);
        let key = (session_id.to_string(), model.to_string());
        let expired = guard.get(&key).map(|e| e.inserted_at.elapsed() >= TTL).unwrap_or(false);
        if expired {
            guard.pop(&key);
            return None;
        }
        guard.get(&key).map(|e| e.signature.clone())
    }
}

fn resize(cache: &mut LruCache<Key, Entry>, cap: usize) {
    if let Some(nz) = NonZeroUsize::new(cap) {
        if nz.get() != cache.cap().get() {
            cache.resize(nz);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pressure::AlwaysLow;

    fn cache() -> SignatureCache {
        SignatureCache::new(Arc::new(AlwaysLow))
    }

    #[tokio::test]
    async fn stores_and_retrieves_by_session_and_model() {
        let c = cache();
        c.put("s1", "gemini-pro", "sig-a".into()).await;
        assert_eq!(c.get("s1", "gemini-pro").await, Some("sig-a".into()));
        assert_eq!(c.get("s1", "other-model").await, None);
    }

    #[tokio::test]
    async fn critical_pressure_disables_the_cache() {
        let (tx, hint) = crate::pressure::WatchPressureHint::new(PressureLevel::Low);
        let c = SignatureCache::new(Arc::new(hint));
        c.put("s1", "m", "sig".into()).await;
        tx.send(PressureLevel::Critical).unwrap();
        assert_eq!(c.get("s1", "m").await, None);
    }
}

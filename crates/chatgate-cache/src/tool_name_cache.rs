// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Per-`(sessionId, model, sanitizedName)` cache mapping a tool name back to
//! the original name the client declared it under, so a `functionCall`
//! returned by the upstream can be rendered back into the client's naming.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::Mutex;

use crate::pressure::{PressureHint, PressureLevel, PressureTable};

const TTL: Duration = Duration::from_secs(30 * 60);

const CAPACITY: PressureTable<usize> =
    PressureTable { low: 512, medium: 256, high: 128, critical: 32 };

type Key = (String, String, String);

struct Entry {
    original_name: String,
    inserted_at: Instant,
}

pub struct ToolNameCache {
    inner: Mutex<LruCache<Key, Entry>>,
    hint: Arc<dyn PressureHint>,
}

impl ToolNameCache {
    pub fn new(hint: Arc<dyn PressureHint>) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(NonZeroUsize::new(CAPACITY.low).unwrap())),
            hint,
        }
    }

    pub async fn put(&self, session_id: &str, model: &str, sanitized_name: &str, original_name: String) {
        let cap = CAPACITY.get(self.hint.level());
        let mut guard = self.inner.lock().await;
        resize(&mut guard, cap);
        guard.put(
            (session_id.to_string(), model.to_string(), sanitized_name.to_string()),
            Entry { original_name, inserted_at: Instant::now() },
        );
    }

    pub async fn get(&self, session_id: &str, model: &str, sanitized_name: &str) -> Option<String> {
        let cap = CAPACITY.get(self.hint.level());
        let mut guard = self.inner.lock().await;
        resize(&mut guard, cap);
        let key = (session_id.to_string(), model.to_string(), sanitized_name.to_string());
        let expired = guard.get(&key).map(|e| e.inserted_at.elapsed() >= TTL).unwrap_or(false);
        if expired {
            guard.pop(&key);
            return None;
        }
        guard.get(&key).map(|e| e.original_name.clone())
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

    #[tokio::test]
    async fn round_trips_sanitized_to_original_name() {
        let c = ToolNameCache::new(Arc::new(AlwaysLow));
        c.put("s1", "gpt-4o", "weather_lookup", "weather-lookup!".into()).await;
        assert_eq!(
            c.get("s1", "gpt-4o", "weather_lookup").await,
            Some("weather-lookup!".into())
        );
    }

    #[tokio::test]
    async fn miss_for_unknown_key() {
        let c = ToolNameCache::new(Arc::new(AlwaysLow));
        assert_eq!(c.get("s1", "gpt-4o", "nope").await, None);
    }
}

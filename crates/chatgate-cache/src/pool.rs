// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Pressure-indexed object pools for the allocation-heavy objects on the
//! streaming hot path: SSE line buffers, tool-call-in-progress skeletons,
//! and outbound chunk skeletons. Reuse avoids a fresh allocation per event
//! on every streamed token; the retained count shrinks as pressure rises so
//! the pools themselves don't become the memory problem they exist to avoid.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::pressure::{PressureHint, PressureTable};

/// A bounded free-list of reusable `T`s. `acquire` hands out a fresh
/// default-constructed value when the free-list is empty; `release`
/// returns a value for reuse, or drops it once the pressure-scaled cap for
/// the current level has been reached.
pub struct ObjectPool<T> {
    free: Mutex<Vec<T>>,
    cap: PressureTable<usize>,
    hint: Arc<dyn PressureHint>,
}

impl<T: Default> ObjectPool<T> {
    pub fn new(cap: PressureTable<usize>, hint: Arc<dyn PressureHint>) -> Self {
        Self { free: Mutex::new(Vec::new()), cap, hint }
    }

    pub async fn acquire(&self) -> T {
        let mut guard = self.free.lock().await;
        guard.pop().unwrap_or_default()
    }

    pub async fn release(&self, mut item: T)
    where
        T: Resettable,
    {
        let cap = self.cap.get(self.hint.level());
        let mut guard = self.free.lock().await;
        if guard.len() < cap {
            item.reset();
            guard.push(item);
        }
    }

    pub async fn len(&self) -> usize {
        self.free.lock().await.len()
    }
}

/// Clears a pooled object's contents without deallocating its backing
/// storage, so a reused `String`/`Vec` keeps its capacity across checkouts.
pub trait Resettable {
    fn reset(&mut self);
}

impl Resettable for String {
    fn reset(&mut self) {
        self.clear();
    }
}

impl<T> Resettable for Vec<T> {
    fn reset(&mut self) {
        self.clear();
    }
}

/// Capacity table for the SSE line-buffer pool (`chatgate-transport`'s
/// Stream Framer checks one out per connection).
pub const LINE_BUFFER_CAPS: PressureTable<usize> =
    PressureTable { low: 30, medium: 20, high: 10, critical: 5 };

/// Capacity table for the in-progress tool-call skeleton pool (one checked
/// out per parallel tool call while its arguments are still streaming).
pub const TOOL_CALL_SKELETON_CAPS: PressureTable<usize> =
    PressureTable { low: 15, medium: 10, high: 5, critical: 3 };

/// Capacity table for the outbound per-dialect chunk-skeleton pool.
pub const CHUNK_SKELETON_CAPS: PressureTable<usize> =
    PressureTable { low: 5, medium: 3, high: 2, critical: 1 };

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pressure::{AlwaysLow, PressureLevel, WatchPressureHint};

    #[tokio::test]
    async fn acquire_without_prior_release_yields_default() {
        let pool: ObjectPool<String> = ObjectPool::new(LINE_BUFFER_CAPS, Arc::new(AlwaysLow));
        let buf = pool.acquire().await;
        assert_eq!(buf, "");
    }

    #[tokio::test]
    async fn released_object_is_reused_and_cleared() {
        let pool: ObjectPool<String> = ObjectPool::new(LINE_BUFFER_CAPS, Arc::new(AlwaysLow));
        let mut buf = pool.acquire().await;
        buf.push_str("leftover");
        pool.release(buf).await;
        assert_eq!(pool.len().await, 1);
        let reused = pool.acquire().await;
        assert_eq!(reused, "");
    }

    #[tokio::test]
    async fn release_beyond_pressure_cap_is_dropped() {
        let (tx, hint) = WatchPressureHint::new(PressureLevel::Low);
        let pool: ObjectPool<String> = ObjectPool::new(
            PressureTable { low: 1, medium: 1, high: 0, critical: 0 },
            Arc::new(hint),
        );
        tx.send(PressureLevel::Critical).unwrap();
        pool.release(String::from("x")).await;
        assert_eq!(pool.len().await, 0);
    }
}

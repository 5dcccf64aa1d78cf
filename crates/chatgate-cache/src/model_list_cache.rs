// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Single-slot cache for the rendered `/v1/models` (and `/v1beta/models`)
//! response body. Refreshing it means one upstream round trip, so every
//! caller shares whatever is already cached rather than racing to refetch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::pressure::{PressureHint, PressureLevel};

const BASE_TTL: Duration = Duration::from_secs(15 * 60);
const PRESSURE_TTL: Duration = Duration::from_secs(5 * 60);

struct Slot {
    body: String,
    cached_at: Instant,
}

/// Caches one rendered model-list body with a configured base TTL, except
/// under `High`/`Critical` pressure where the effective TTL is clamped down
/// to 5 minutes regardless of what was configured — a stale catalog is
/// preferable to holding it for the full period while memory is tight.
pub struct ModelListCache {
    slot: RwLock<Option<Slot>>,
    configured_ttl: Duration,
    hint: Arc<dyn PressureHint>,
}

impl ModelListCache {
    pub fn new(configured_ttl: Option<Duration>, hint: Arc<dyn PressureHint>) -> Self {
        Self {
            slot: RwLock::new(None),
            configured_ttl: configured_ttl.unwrap_or(BASE_TTL).min(BASE_TTL),
            hint,
        }
    }

    fn effective_ttl(&self) -> Duration {
        match self.hint.level() {
            PressureLevel::High | PressureLevel::Critical => self.configured_ttl.min(PRESSURE_TTL),
            PressureLevel::Low | PressureLevel::Medium => self.configured_ttl,
        }
    }

    pub async fn get(&self) -> Option<String> {
        let guard = self.slot.read().await;
        let slot = guard.as_ref()?;
        if slot.cached_at.elapsed() >= self.effective_ttl() {
            return None;
        }
        Some(slot.body.clone())
    }

    pub async fn set(&self, body: String) {
        let mut guard = self.slot.write().await;
        *guard = Some(Slot { body, cached_at: Instant::now() });
    }

    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }
}

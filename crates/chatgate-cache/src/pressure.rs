// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Memory-pressure signal shared by every cache and pool in this crate.

use tokio::sync::watch;

/// Coarse memory-pressure bucket. Caches shrink their capacity and pools
/// shrink their retained-object ceiling as pressure rises; nothing here
/// measures pressure itself — that's left to whoever owns the watch
/// channel (the server crate, typically driven off RSS sampling).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PressureLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Read-only subscription to the current pressure level. Implemented by
/// anything that can report a level on demand; callers that also want to be
/// notified of changes use [`PressureLevel::watch`] channels directly
/// instead of polling.
pub trait PressureHint: Send + Sync {
    fn level(&self) -> PressureLevel;
}

/// A [`PressureHint`] backed by a `tokio::sync::watch` channel, so a single
/// background sampler can push updates to every cache/pool at once.
#[derive(Clone)]
pub struct WatchPressureHint {
    rx: watch::Receiver<PressureLevel>,
}

impl WatchPressureHint {
    pub fn new(initial: PressureLevel) -> (watch::Sender<PressureLevel>, Self) {
        let (tx, rx) = watch::channel(initial);
        (tx, Self { rx })
    }
}

impl PressureHint for WatchPressureHint {
    fn level(&self) -> PressureLevel {
        *self.rx.borrow()
    }
}

/// A hint that never reports anything but [`PressureLevel::Low`]. Used in
/// tests and as the default before a real sampler is wired up.
pub struct AlwaysLow;

impl PressureHint for AlwaysLow {
    fn level(&self) -> PressureLevel {
        PressureLevel::Low
    }
}

/// A table of four values, one per [`PressureLevel`], used to size caches
/// and pools without repeating a four-armed match at every call site.
#[derive(Debug, Clone, Copy)]
pub struct PressureTable<T> {
    pub low: T,
    pub medium: T,
    pub high: T,
    pub critical: T,
}

impl<T: Copy> PressureTable<T> {
    pub fn get(&self, level: PressureLevel) -> T {
        match level {
            PressureLevel::Low => self.low,
            PressureLevel::Medium => self.medium,
            PressureLevel::High => self.high,
            PressureLevel::Critical => self.critical,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_hint_reflects_latest_sent_value() {
        let (tx, hint) = WatchPressureHint::new(PressureLevel::Low);
        assert_eq!(hint.level(), PressureLevel::Low);
        tx.send(PressureLevel::Critical).unwrap();
        assert_eq!(hint.level(), PressureLevel::Critical);
    }

    #[test]
    fn pressure_table_selects_matching_arm() {
        let table = PressureTable { low: 30, medium: 20, high: 10, critical: 5 };
        assert_eq!(table.get(PressureLevel::High), 10);
    }
}

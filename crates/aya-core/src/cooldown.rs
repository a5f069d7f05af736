//! Per-command cooldowns, shared by every sender.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{sync::Mutex, time::Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CooldownEntry {
    pub last_invoked_at: Instant,
    pub duration: Duration,
}

impl CooldownEntry {
    fn remaining_at(&self, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.last_invoked_at);
        self.duration.saturating_sub(elapsed)
    }
}

/// Last-used timestamps keyed by command name as typed (lower-cased), so an
/// alias and its primary name run separate cooldowns.
///
/// There is no sender dimension: one user's invocation puts the command on
/// cooldown for everyone.
#[derive(Default)]
pub struct CooldownLedger {
    entries: Mutex<HashMap<String, Arc<Mutex<Option<CooldownEntry>>>>>,
}

impl CooldownLedger {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, command: &str) -> Arc<Mutex<Option<CooldownEntry>>> {
        let mut map = self.entries.lock().await;
        map.entry(command.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Remaining cooldown for `command`, `Duration::ZERO` when it may run.
    pub async fn check(&self, command: &str) -> Duration {
        self.check_at(command, Instant::now()).await
    }

    pub async fn check_at(&self, command: &str, now: Instant) -> Duration {
        let slot = {
            let map = self.entries.lock().await;
            match map.get(command) {
                Some(slot) => slot.clone(),
                None => return Duration::ZERO,
            }
        };
        let entry = *slot.lock().await;
        entry.map(|e| e.remaining_at(now)).unwrap_or(Duration::ZERO)
    }

    /// Record a successful invocation at the current time.
    pub async fn touch(&self, command: &str, duration: Duration) {
        self.touch_at(command, duration, Instant::now()).await
    }

    pub async fn touch_at(&self, command: &str, duration: Duration, now: Instant) {
        let slot = self.slot(command).await;
        *slot.lock().await = Some(CooldownEntry {
            last_invoked_at: now,
            duration,
        });
    }

    pub async fn entry(&self, command: &str) -> Option<CooldownEntry> {
        let slot = self.entries.lock().await.get(command).cloned()?;
        let entry = *slot.lock().await;
        entry
    }
}

/// Whole seconds left, rounded up (`1ms` → `1`).
pub fn ceil_secs(d: Duration) -> u64 {
    d.as_millis().div_ceil(1000) as u64
}

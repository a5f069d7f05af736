use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::SenderId;

// ============== Ownership ==============

/// A sender is the owner when the numeric part of its id equals the configured
/// owner number. An unset owner number matches nobody.
pub fn is_owner(sender: &SenderId, owner_number: &str) -> bool {
    let owner = owner_number.trim().trim_start_matches('+');
    !owner.is_empty() && sender.number() == owner
}

// ============== Spam Window ==============

/// Rolling window length; the count restarts once a message lands past it.
pub const SPAM_WINDOW: Duration = Duration::from_secs(60);
/// More than this many messages inside one window is spam.
pub const MAX_MESSAGES_PER_WINDOW: u32 = 10;
/// More than this many messages is spam when they arrive in a burst.
pub const BURST_THRESHOLD: u32 = 5;
/// Two messages closer than this count as a burst.
pub const BURST_GAP: Duration = Duration::from_secs(3);
/// Sender records idle for longer than this are evicted by the sweep.
pub const IDLE_EVICTION: Duration = Duration::from_secs(10 * 60);
/// How often the background sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpamWindow {
    pub count: u32,
    pub window_started_at: Instant,
    pub last_message_at: Instant,
    /// Set when a message in the current window was flagged. Informational only:
    /// every check recomputes the verdict.
    pub blocked: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpamVerdict {
    pub is_spam: bool,
    pub remaining: Duration,
}

impl SpamVerdict {
    const CLEAN: Self = Self {
        is_spam: false,
        remaining: Duration::ZERO,
    };
}

impl SpamWindow {
    fn start(now: Instant) -> Self {
        Self {
            count: 0,
            window_started_at: now,
            last_message_at: now,
            blocked: false,
        }
    }

    /// Record one message at `now` and classify it.
    fn observe(&mut self, now: Instant, antispam_duration: Duration) -> SpamVerdict {
        let gap = now.saturating_duration_since(self.last_message_at);

        if now.saturating_duration_since(self.window_started_at) > SPAM_WINDOW {
            self.count = 0;
            self.window_started_at = now;
            self.blocked = false;
        }

        self.count += 1;
        let burst = self.count > 1 && gap < BURST_GAP;
        self.last_message_at = now;

        let is_spam = self.count > MAX_MESSAGES_PER_WINDOW || (self.count > BURST_THRESHOLD && burst);
        if !is_spam {
            return SpamVerdict::CLEAN;
        }

        self.blocked = true;
        // Penalty runs from `last_message_at`, which is this message.
        SpamVerdict {
            is_spam: true,
            remaining: antispam_duration.saturating_sub(now - self.last_message_at),
        }
    }
}

// ============== Abuse Tracker ==============

/// Per-sender spam detection plus the administrative block-list.
///
/// Each sender's window sits behind its own lock; the map lock is only held to
/// find or insert that lock, so different senders never wait on each other.
pub struct AbuseTracker {
    antispam_duration: Duration,
    windows: Mutex<HashMap<SenderId, Arc<Mutex<SpamWindow>>>>,
    blocked: RwLock<HashSet<SenderId>>,
}

impl AbuseTracker {
    pub fn new(antispam_duration: Duration) -> Self {
        Self {
            antispam_duration,
            windows: Mutex::new(HashMap::new()),
            blocked: RwLock::new(HashSet::new()),
        }
    }

    pub async fn check(&self, sender: &SenderId) -> SpamVerdict {
        self.check_at(sender, Instant::now()).await
    }

    pub async fn check_at(&self, sender: &SenderId, now: Instant) -> SpamVerdict {
        let window = {
            let mut map = self.windows.lock().await;
            map.entry(sender.clone())
                .or_insert_with(|| Arc::new(Mutex::new(SpamWindow::start(now))))
                .clone()
        };

        let verdict = window.lock().await.observe(now, self.antispam_duration);
        if verdict.is_spam {
            debug!(sender = %sender, remaining_ms = verdict.remaining.as_millis() as u64, "spam detected");
        }
        verdict
    }

    /// Snapshot of a sender's window, if one is tracked.
    pub async fn window(&self, sender: &SenderId) -> Option<SpamWindow> {
        let window = self.windows.lock().await.get(sender).cloned()?;
        let snapshot = window.lock().await.clone();
        Some(snapshot)
    }

    pub async fn tracked_senders(&self) -> usize {
        self.windows.lock().await.len()
    }

    /// Evict windows idle for longer than [`IDLE_EVICTION`]. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Instant::now()).await
    }

    pub async fn sweep_at(&self, now: Instant) -> usize {
        let mut map = self.windows.lock().await;
        let before = map.len();
        map.retain(|_, window| {
            // A clone outside the map means a check is in flight for this sender.
            if Arc::strong_count(window) > 1 {
                return true;
            }
            match window.try_lock() {
                Ok(w) => now.saturating_duration_since(w.last_message_at) <= IDLE_EVICTION,
                Err(_) => true,
            }
        });
        before - map.len()
    }

    /// Run [`Self::sweep`] every `every` until `cancel` fires.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            // The first tick completes immediately; nothing is stale yet.
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {
                        let evicted = self.sweep().await;
                        if evicted > 0 {
                            debug!(evicted, "abuse tracker sweep");
                        }
                    }
                }
            }
        })
    }

    // ============== Block List ==============

    /// Returns `false` if the sender was already blocked.
    pub async fn block(&self, sender: &SenderId) -> bool {
        let added = self.blocked.write().await.insert(sender.clone());
        if added {
            warn!(sender = %sender, "user blocked");
        }
        added
    }

    /// Returns `false` if the sender was not blocked.
    pub async fn unblock(&self, sender: &SenderId) -> bool {
        let removed = self.blocked.write().await.remove(sender);
        if removed {
            info!(sender = %sender, "user unblocked");
        }
        removed
    }

    pub async fn is_blocked(&self, sender: &SenderId) -> bool {
        self.blocked.read().await.contains(sender)
    }

    pub async fn blocked_senders(&self) -> Vec<SenderId> {
        let mut out: Vec<_> = self.blocked.read().await.iter().cloned().collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PENALTY: Duration = Duration::from_millis(5000);

    fn sender(n: &str) -> SenderId {
        SenderId::from_number(n)
    }

    #[test]
    fn owner_matches_number_part_only() {
        let owner = sender("212600000000");
        assert!(is_owner(&owner, "212600000000"));
        assert!(is_owner(&owner, "+212600000000"));
        assert!(!is_owner(&sender("1212600000000"), "212600000000"));
        assert!(!is_owner(&owner, ""));
    }

    #[tokio::test]
    async fn eleven_messages_in_a_minute_flags_the_eleventh() {
        let tracker = AbuseTracker::new(PENALTY);
        let u = sender("1");
        let start = Instant::now();

        // 5s apart: never a burst, so only the count rule can fire.
        for i in 0..10u64 {
            let v = tracker.check_at(&u, start + Duration::from_secs(i * 5)).await;
            assert!(!v.is_spam, "message {} flagged early", i + 1);
        }
        let v = tracker.check_at(&u, start + Duration::from_secs(52)).await;
        assert!(v.is_spam);
        assert_eq!(v.remaining, PENALTY);
        assert!(tracker.window(&u).await.unwrap().blocked);
    }

    #[tokio::test]
    async fn five_spaced_messages_are_never_flagged() {
        let tracker = AbuseTracker::new(PENALTY);
        let u = sender("1");
        let start = Instant::now();
        for i in 0..5u64 {
            let v = tracker.check_at(&u, start + Duration::from_millis(i * 3500)).await;
            assert!(!v.is_spam);
        }
    }

    #[tokio::test]
    async fn burst_after_five_messages_is_flagged() {
        let tracker = AbuseTracker::new(PENALTY);
        let u = sender("1");
        let start = Instant::now();
        for i in 0..5u64 {
            let v = tracker.check_at(&u, start + Duration::from_millis(i * 500)).await;
            assert!(!v.is_spam, "burst rule needs more than five messages");
        }
        let v = tracker.check_at(&u, start + Duration::from_millis(2600)).await;
        assert!(v.is_spam);
    }

    #[tokio::test]
    async fn sixth_message_after_a_pause_is_not_a_burst() {
        let tracker = AbuseTracker::new(PENALTY);
        let u = sender("1");
        let start = Instant::now();
        for i in 0..5u64 {
            tracker.check_at(&u, start + Duration::from_millis(i * 500)).await;
        }
        let v = tracker.check_at(&u, start + Duration::from_secs(10)).await;
        assert!(!v.is_spam);
    }

    #[tokio::test]
    async fn window_resets_after_sixty_seconds() {
        let tracker = AbuseTracker::new(PENALTY);
        let u = sender("1");
        let start = Instant::now();
        for i in 0..10u64 {
            tracker.check_at(&u, start + Duration::from_secs(i * 5)).await;
        }
        let later = start + Duration::from_secs(61);
        let v = tracker.check_at(&u, later).await;
        assert!(!v.is_spam);

        let w = tracker.window(&u).await.unwrap();
        assert_eq!(w.count, 1);
        assert_eq!(w.window_started_at, later);
        assert!(!w.blocked);
    }

    #[tokio::test]
    async fn flag_is_recomputed_on_every_check() {
        let tracker = AbuseTracker::new(PENALTY);
        let u = sender("1");
        let start = Instant::now();
        for i in 0..6u64 {
            tracker.check_at(&u, start + Duration::from_millis(i * 100)).await;
        }
        // Same window, but a slow message is judged on its own gap.
        let v = tracker.check_at(&u, start + Duration::from_secs(5)).await;
        assert!(!v.is_spam);
    }

    #[tokio::test]
    async fn senders_are_tracked_independently() {
        let tracker = AbuseTracker::new(PENALTY);
        let start = Instant::now();
        for i in 0..11u64 {
            tracker.check_at(&sender("1"), start + Duration::from_secs(i)).await;
        }
        let v = tracker.check_at(&sender("2"), start + Duration::from_secs(11)).await;
        assert!(!v.is_spam);
        assert_eq!(tracker.tracked_senders().await, 2);
    }

    #[tokio::test]
    async fn sweep_evicts_idle_windows_only() {
        let tracker = AbuseTracker::new(PENALTY);
        let start = Instant::now();
        tracker.check_at(&sender("idle"), start).await;
        tracker
            .check_at(&sender("active"), start + Duration::from_secs(5 * 60))
            .await;

        let evicted = tracker.sweep_at(start + IDLE_EVICTION + Duration::from_secs(1)).await;
        assert_eq!(evicted, 1);
        assert!(tracker.window(&sender("idle")).await.is_none());
        assert!(tracker.window(&sender("active")).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn background_sweeper_evicts_after_idle_period() {
        let tracker = Arc::new(AbuseTracker::new(PENALTY));
        let u = sender("1");
        tracker.check(&u).await;

        let cancel = CancellationToken::new();
        let handle = tracker
            .clone()
            .spawn_sweeper(SWEEP_INTERVAL, cancel.clone());

        // First sweep at 5 min: still fresh.
        tokio::time::sleep(SWEEP_INTERVAL + Duration::from_millis(1)).await;
        assert_eq!(tracker.tracked_senders().await, 1);

        // Third sweep at 15 min: idle for more than 10 min.
        tokio::time::sleep(SWEEP_INTERVAL * 2).await;
        assert_eq!(tracker.tracked_senders().await, 0);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checks_for_one_sender_are_serialized() {
        const N: usize = 32;
        let tracker = Arc::new(AbuseTracker::new(PENALTY));
        let u = sender("1");
        let now = Instant::now();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..N {
            let tracker = tracker.clone();
            let u = u.clone();
            tasks.spawn(async move { tracker.check_at(&u, now).await });
        }
        let mut flagged = 0;
        while let Some(v) = tasks.join_next().await {
            if v.unwrap().is_spam {
                flagged += 1;
            }
        }

        // Same instant, so every message after the fifth is a burst.
        assert_eq!(flagged, N - BURST_THRESHOLD as usize);
        assert_eq!(tracker.window(&u).await.unwrap().count as usize, N);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn sweep_racing_checks_loses_no_increment() {
        const N: usize = 64;
        let tracker = Arc::new(AbuseTracker::new(PENALTY));
        let start = Instant::now();
        for i in 0..16 {
            tracker.check_at(&sender(&format!("idle{i}")), start).await;
        }
        let active = sender("active");
        let later = start + IDLE_EVICTION + Duration::from_secs(1);

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..N {
            let tracker = tracker.clone();
            let active = active.clone();
            tasks.spawn(async move {
                if i % 4 == 0 {
                    tracker.sweep_at(later).await;
                }
                tracker.check_at(&active, later).await;
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap();
        }
        tracker.sweep_at(later).await;

        assert_eq!(tracker.window(&active).await.unwrap().count as usize, N);
        assert_eq!(tracker.tracked_senders().await, 1);
    }

    #[tokio::test]
    async fn block_list_round_trip() {
        let tracker = AbuseTracker::new(PENALTY);
        let u = sender("1");
        assert!(!tracker.is_blocked(&u).await);
        assert!(tracker.block(&u).await);
        assert!(!tracker.block(&u).await);
        assert!(tracker.is_blocked(&u).await);
        assert_eq!(tracker.blocked_senders().await, vec![u.clone()]);
        assert!(tracker.unblock(&u).await);
        assert!(!tracker.unblock(&u).await);
        assert!(!tracker.is_blocked(&u).await);
    }
}

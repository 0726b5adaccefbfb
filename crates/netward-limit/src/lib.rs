//! Sliding-window rate limiting keyed by arbitrary strings.
//!
//! One [`RateLimiter`] holds many independent windows — one per key.
//! Callers pick the key granularity: the gateway keys raw traffic by
//! connection id, the dispatcher keys per-action windows by
//! `"<connection>:<event>"`, and admission checks key by remote IP.
//! Distinct limiter instances never share storage, so connection-level
//! and action-level policies cannot interfere.
//!
//! Windows are pruned lazily on each admission check, so a key's memory
//! is bounded by its `max_events`; [`RateLimiter::release`] and
//! [`RateLimiter::release_prefix`] drop state eagerly when a connection
//! closes. Nothing persists across a restart.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

/// A declared window/limit pair, attached to handlers and admission
/// checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    /// How far back the window reaches.
    pub window: Duration,
    /// Maximum admitted events per rolling window.
    pub max_events: u32,
}

impl RatePolicy {
    /// Convenience constructor: `max_events` per `window`.
    pub const fn per(window: Duration, max_events: u32) -> Self {
        Self { window, max_events }
    }
}

/// Sliding-window counter over string keys.
///
/// Each key holds the timestamps of its recently admitted events. An
/// admission check prunes timestamps older than the window, then admits
/// only if the retained count is strictly below the limit. The first
/// call for an unseen key therefore always admits (for any limit > 0).
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<String, VecDeque<Instant>>>>,
    rejected: Arc<AtomicU64>,
}

impl RateLimiter {
    /// Creates an empty limiter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the current instant as a candidate event under `key` and
    /// admits it if the window has capacity.
    ///
    /// Returns `true` (and commits the timestamp) when fewer than
    /// `max_events` admitted events remain inside `window`; returns
    /// `false` (committing nothing) otherwise.
    pub async fn allow(
        &self,
        key: &str,
        window: Duration,
        max_events: u32,
    ) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.write().await;
        let entries = windows.entry(key.to_string()).or_default();

        // Drop everything that has aged out of the window.
        while entries
            .front()
            .is_some_and(|t| now.duration_since(*t) >= window)
        {
            entries.pop_front();
        }

        if (entries.len() as u64) < u64::from(max_events) {
            entries.push_back(now);
            true
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key, "rate limit exceeded");
            false
        }
    }

    /// [`allow`](Self::allow) with the window and limit of a policy.
    pub async fn allow_policy(&self, key: &str, policy: &RatePolicy) -> bool {
        self.allow(key, policy.window, policy.max_events).await
    }

    /// Drops all state for an exact key.
    pub async fn release(&self, key: &str) {
        self.windows.write().await.remove(key);
    }

    /// Drops all state for keys starting with `prefix`.
    ///
    /// Used on connection close to free every `"<connection>:<action>"`
    /// window at once.
    pub async fn release_prefix(&self, prefix: &str) {
        self.windows
            .write()
            .await
            .retain(|key, _| !key.starts_with(prefix));
    }

    /// Total admission checks rejected since startup.
    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Removes keys whose newest event is older than `max_idle`.
    ///
    /// Call periodically to reclaim windows for keys that stopped
    /// arriving without an explicit release.
    pub async fn purge_idle(&self, max_idle: Duration) {
        let now = Instant::now();
        self.windows.write().await.retain(|_, entries| {
            entries
                .back()
                .is_some_and(|t| now.duration_since(*t) < max_idle)
        });
    }

    /// Number of keys currently holding state.
    pub async fn tracked_keys(&self) -> usize {
        self.windows.read().await.len()
    }
}

// =========================================================================
// Tests
// =========================================================================

//! The session store seam: shared key/value truth with expiry.
//!
//! In deployment the store is an external shared service (so several
//! gateway processes agree on who is live); this crate ships
//! [`MemoryStore`] for single-process servers and tests. The trait is
//! deliberately tiny — get/put/delete with TTL — and every operation can
//! fail with [`SessionError::StoreUnavailable`], which callers must
//! treat as fatal during authentication and as ignorable during cleanup.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use netward_protocol::PlayerId;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::{SessionError, SessionRecord};

/// Cross-process session truth, keyed by player.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Writes (or overwrites) the record for a player with a fresh TTL.
    async fn put(
        &self,
        player_id: &PlayerId,
        record: SessionRecord,
        ttl: Duration,
    ) -> Result<(), SessionError>;

    /// Reads the record for a player. `Ok(None)` means no live session
    /// (absent or expired).
    async fn get(
        &self,
        player_id: &PlayerId,
    ) -> Result<Option<SessionRecord>, SessionError>;

    /// Removes the record for a player. Removing an absent record is
    /// not an error.
    async fn delete(&self, player_id: &PlayerId) -> Result<(), SessionError>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-process [`SessionStore`] with per-record expiry.
///
/// Expired records are dropped lazily on access and in bulk via
/// [`purge_expired`](Self::purge_expired).
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<PlayerId, (SessionRecord, Instant)>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every expired record, returning how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, (_, deadline)| *deadline > now);
        before - records.len()
    }

    /// Number of records currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Returns `true` if no records are held.
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn put(
        &self,
        player_id: &PlayerId,
        record: SessionRecord,
        ttl: Duration,
    ) -> Result<(), SessionError> {
        let deadline = Instant::now() + ttl;
        self.records
            .lock()
            .await
            .insert(player_id.clone(), (record, deadline));
        Ok(())
    }

    async fn get(
        &self,
        player_id: &PlayerId,
    ) -> Result<Option<SessionRecord>, SessionError> {
        let mut records = self.records.lock().await;
        match records.get(player_id) {
            Some((_, deadline)) if *deadline <= Instant::now() => {
                records.remove(player_id);
                Ok(None)
            }
            Some((record, _)) => Ok(Some(record.clone())),
            None => Ok(None),
        }
    }

    async fn delete(&self, player_id: &PlayerId) -> Result<(), SessionError> {
        self.records.lock().await.remove(player_id);
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================

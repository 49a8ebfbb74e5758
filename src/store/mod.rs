//! Delivery-status persistence.
//!
//! The orchestrator records which side effects already happened for a
//! message identifier so retried deliveries do not repeat them. Records
//! only ever grow within a delivery lifecycle and expire after a fixed
//! retention window; there is no explicit deletion.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Per-message delivery status, keyed by message identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStatus {
    /// Recipients already forwarded to, in forwarding order.
    #[serde(default)]
    pub forwarded_to: Vec<String>,
    /// Whether a notification was already attempted for this message.
    #[serde(default)]
    pub notified: bool,
}

impl DeliveryStatus {
    pub fn has_forwarded(&self, recipient: &str) -> bool {
        self.forwarded_to.iter().any(|r| r == recipient)
    }

    /// Record a successful forward, preserving insertion order and never
    /// duplicating an entry.
    pub fn record_forwarded(&mut self, recipient: &str) {
        if !self.has_forwarded(recipient) {
            self.forwarded_to.push(recipient.to_string());
        }
    }
}

/// Key-value store for [`DeliveryStatus`] records.
///
/// When guardian mode is disabled, `load` returns a fresh empty record
/// every time and the orchestrator never calls `save`; idempotency across
/// retried deliveries is then not guaranteed.
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn load(&self, key: &str, guardian: bool) -> Result<DeliveryStatus, StoreError>;

    async fn save(
        &self,
        key: &str,
        status: &DeliveryStatus,
        ttl: Duration,
    ) -> Result<(), StoreError>;
}

/// In-process store with per-entry TTL. The default wiring for single-node
/// deployments and the injected fake in tests.
#[derive(Default)]
pub struct MemoryStatusStore {
    entries: Mutex<HashMap<String, (DeliveryStatus, Instant)>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn load(&self, key: &str, guardian: bool) -> Result<DeliveryStatus, StoreError> {
        if !guardian {
            return Ok(DeliveryStatus::default());
        }

        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        match entries.get(key) {
            Some((status, deadline)) if *deadline > Instant::now() => Ok(status.clone()),
            Some(_) => {
                // Expired; evict lazily.
                entries.remove(key);
                Ok(DeliveryStatus::default())
            }
            None => Ok(DeliveryStatus::default()),
        }
    }

    async fn save(
        &self,
        key: &str,
        status: &DeliveryStatus,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        entries.insert(key.to_string(), (status.clone(), Instant::now() + ttl));
        Ok(())
    }
}

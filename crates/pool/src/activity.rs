// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity log: store append plus in-process fan-out.
//!
//! Subscribers run synchronously under the registration lock, each
//! inside a failure boundary so one bad callback cannot poison the
//! emitter or its peers. Every ~100th insert trims the stream to the
//! configured cap.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use hearth_core::clock::{Clock, SystemClock};
use hearth_core::event::{ActivityEvent, ActivityKind};
use hearth_core::id::{ContainerId, PoolId, TenantId};
use hearth_store::{ActivityFilter, Store, StoreError};

/// Inserts between auto-trims.
const TRIM_EVERY: u64 = 100;

pub type ActivitySubscriber = Arc<dyn Fn(&ActivityEvent) + Send + Sync>;

/// Shared activity sink. Cheap to clone via `Arc`.
pub struct ActivityLog {
    store: Store,
    clock: Arc<dyn Clock>,
    subscribers: RwLock<Vec<ActivitySubscriber>>,
    max_events: u32,
    inserts: AtomicU64,
}

impl ActivityLog {
    pub fn new(store: Store, max_events: u32) -> Self {
        Self::with_clock(store, max_events, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Store, max_events: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            subscribers: RwLock::new(Vec::new()),
            max_events,
            inserts: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self, subscriber: ActivitySubscriber) {
        self.subscribers.write().push(subscriber);
    }

    /// Start building one event.
    pub fn event(&self, kind: ActivityKind, message: impl Into<String>) -> EventBuilder<'_> {
        EventBuilder {
            log: self,
            kind,
            message: message.into(),
            pool_id: None,
            container_id: None,
            tenant_id: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub async fn recent(&self, filter: &ActivityFilter) -> Result<Vec<ActivityEvent>, StoreError> {
        self.store.recent_activity(filter).await
    }

    async fn emit(&self, builder: EventBuilder<'_>) -> Result<ActivityEvent, StoreError> {
        let now = self.clock.epoch_ms();
        let metadata = if builder.metadata.is_null() {
            serde_json::json!({})
        } else {
            builder.metadata
        };
        let id = self
            .store
            .append_activity(
                builder.kind,
                builder.pool_id.as_ref(),
                builder.container_id.as_ref(),
                builder.tenant_id.as_ref(),
                &builder.message,
                &metadata,
                now,
            )
            .await?;

        let event = ActivityEvent {
            id,
            kind: builder.kind,
            pool_id: builder.pool_id,
            container_id: builder.container_id,
            tenant_id: builder.tenant_id,
            message: builder.message,
            timestamp_ms: now,
            metadata,
        };

        {
            let subscribers = self.subscribers.read();
            for subscriber in subscribers.iter() {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    subscriber(&event)
                }));
                if result.is_err() {
                    warn!(kind = %event.kind, "activity subscriber panicked");
                }
            }
        }

        let count = self.inserts.fetch_add(1, Ordering::Relaxed) + 1;
        if count % TRIM_EVERY == 0 {
            if let Err(e) = self.store.trim_activity(self.max_events).await {
                warn!(error = %e, "activity trim failed");
            }
        }

        Ok(event)
    }
}

/// Builder returned by [`ActivityLog::event`].
pub struct EventBuilder<'a> {
    log: &'a ActivityLog,
    kind: ActivityKind,
    message: String,
    pool_id: Option<PoolId>,
    container_id: Option<ContainerId>,
    tenant_id: Option<TenantId>,
    metadata: serde_json::Value,
}

impl EventBuilder<'_> {
    pub fn pool(mut self, pool_id: &PoolId) -> Self {
        self.pool_id = Some(*pool_id);
        self
    }

    pub fn container(mut self, container_id: &ContainerId) -> Self {
        self.container_id = Some(*container_id);
        self
    }

    pub fn tenant(mut self, tenant_id: &TenantId) -> Self {
        self.tenant_id = Some(tenant_id.clone());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Append to the store and fan out. Callers that must not fail on a
    /// logging problem use [`EventBuilder::emit_logged`].
    pub async fn emit(self) -> Result<ActivityEvent, StoreError> {
        let log = self.log;
        log.emit(self).await
    }

    /// Emit, downgrading store failures to a warning.
    pub async fn emit_logged(self) {
        let kind = self.kind;
        if let Err(e) = self.emit().await {
            warn!(kind = %kind, error = %e, "activity append failed");
        }
    }
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;

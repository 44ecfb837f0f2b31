//! The binding cache and the fold orchestrator.
//!
//! [`DomainEventApplier`] is the crate's entry point: it owns the
//! process-wide cache of resolved fold bindings and drives
//! [`apply_all`](DomainEventApplier::apply_all), the one operation
//! exposed to callers such as read-model repositories.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::binding::{HandlerBinding, resolve};
use crate::error::ApplyError;
use crate::event::DomainEvent;
use crate::read_model::{ReadModel, ReadModelContext};

/// Binding cache keyed by `(read-model TypeId, payload TypeId)`.
///
/// `None` is the "no compatible fold" sentinel: a miss on the read-model
/// side of dispatch, cached so the handler table is never re-scanned for
/// an event type the read model ignores. The payload type is the entire
/// inner key: the identity triple observed by the first event of a
/// payload type is baked into the cached result for all later events
/// sharing that payload. Entries live for the process lifetime; the key
/// space is bounded by the type pairs the program compiles against.
type BindingCache = HashMap<(TypeId, TypeId), Option<HandlerBinding>>;

/// Applies ordered batches of domain events to in-memory read models.
///
/// Dispatch is type-driven: for each event the applier looks up (or
/// lazily resolves) the fold binding for the (read-model type, payload
/// type) pair, invokes it, and moves on. Resolution runs at most once
/// per pair; after that every event of the same type is a cache hit.
///
/// `Clone` is cheap -- the cache is `Arc`-shared, so clones dispatch
/// against the same set of resolved bindings. Concurrent `apply_all`
/// calls on *different* read-model instances are independent; the cache
/// is the only shared state and tolerates racing first-time resolutions
/// because resolution is pure and its results are interchangeable.
#[derive(Debug, Clone, Default)]
pub struct DomainEventApplier {
    bindings: Arc<RwLock<BindingCache>>,
}

impl DomainEventApplier {
    /// Create an applier with an empty binding cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold an ordered batch of events into one read model.
    ///
    /// Events are processed strictly in slice order; each fold is awaited
    /// to completion before the next event starts, so read-model mutation
    /// order matches event order. Events with no matching fold are
    /// skipped silently. The cancellation token is handed to every fold;
    /// observing it is the fold's responsibility.
    ///
    /// # Returns
    ///
    /// `true` iff at least one event was folded -- the signal callers use
    /// to decide whether the mutated read model needs persisting. `false`
    /// for an empty batch or a batch of only unhandled events.
    ///
    /// # Errors
    ///
    /// A fold failure ([`ApplyError::Fold`]) or resolution failure
    /// ([`ApplyError::AmbiguousHandler`]) stops the batch at that event.
    /// Folds already applied are not rolled back: the read model is in an
    /// indeterminate partial state and must not be persisted.
    pub async fn apply_all<R: ReadModel>(
        &self,
        read_model: &mut R,
        events: &[DomainEvent],
        ctx: &ReadModelContext,
        cancel: &CancellationToken,
    ) -> Result<bool, ApplyError> {
        let mut applied_any = false;

        for event in events {
            let Some(binding) = self.binding_for::<R>(event).await? else {
                tracing::trace!(
                    read_model = R::NAME,
                    event_type = event.event_type(),
                    "no fold handler, event skipped"
                );
                continue;
            };

            binding.invoke(read_model, ctx, event, cancel).await?;
            applied_any = true;

            tracing::trace!(
                read_model = R::NAME,
                event_type = event.event_type(),
                global_position = event.metadata().global_position,
                "event folded"
            );
        }

        Ok(applied_any)
    }

    /// Look up the binding for `(R, event payload type)`, resolving and
    /// publishing it on a miss.
    ///
    /// The resolve step runs outside any lock: resolution is a pure
    /// function of type metadata, so threads racing on the same first-time
    /// key may each compute a binding, and whichever publishes first wins.
    /// All results are equivalent, so the losers' work is simply
    /// discarded. Resolution errors are returned without being cached.
    ///
    /// The key carries no identity component, so the first event of a
    /// payload type decides dispatch for that key. A later event with a
    /// different identity type hits the cached result unchanged: skipped
    /// if the sentinel was cached, or [`ApplyError::EventTypeMismatch`]
    /// when a binding was cached and the typed view fails.
    async fn binding_for<R: ReadModel>(
        &self,
        event: &DomainEvent,
    ) -> Result<Option<HandlerBinding>, ApplyError> {
        let key = (TypeId::of::<R>(), event.payload_type());

        {
            let cache = self.bindings.read().await;
            if let Some(entry) = cache.get(&key) {
                return Ok(*entry);
            }
        }

        let resolved = resolve::<R>(event)?;

        let mut cache = self.bindings.write().await;
        Ok(*cache.entry(key).or_insert(resolved))
    }
}

//! Read-model contract: the fold trait, the handler registration table,
//! and the pass-through context.
//!
//! Instead of discovering fold methods by signature inspection at runtime,
//! each read-model type enumerates its folds once in
//! [`ReadModel::handlers`]: one [`HandlerSet`] entry per exact
//! (aggregate, identity, payload) triple the type knows how to fold. The
//! dispatcher consults that table lazily and caches what it finds, so the
//! enumeration runs at most once per (read model, payload type) pair.

use std::any::Any;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::binding::{BoxFuture, FoldFn};
use crate::error::{ApplyError, BoxError};
use crate::event::{Aggregate, DomainEvent, EventPayload, EventSignature, EventView, Identity};

/// A read model: a mutable, query-optimized projection of aggregate state,
/// rebuilt by folding domain events.
///
/// Instances are exclusively owned by the caller. This crate never
/// persists or copies them; it only mutates them in place through
/// resolved fold bindings.
///
/// # Contract
///
/// - [`handlers`](ReadModel::handlers) must be deterministic: the same
///   set of entries on every call. It is invoked lazily, at most once per
///   event payload type the process dispatches against this read model.
/// - An event type with no entry is not an error -- the dispatcher skips
///   it silently, so read models ignore event types they do not care about.
pub trait ReadModel: Send + 'static {
    /// Human-readable name, used in logging and error messages.
    const NAME: &'static str;

    /// Enumerate the fold handlers this read model defines.
    fn handlers() -> HandlerSet<Self>
    where
        Self: Sized;
}

/// A single fold: mutate the read model in response to one domain event
/// carrying exactly the triple `(A, I, E)`.
///
/// A read model implements `Apply` once per event type it folds; the impl
/// becomes dispatchable by listing it in [`ReadModel::handlers`] via
/// [`HandlerSet::on`]. Folds may suspend (e.g. for lookups) and must
/// observe the cancellation token cooperatively -- the dispatcher never
/// aborts an in-flight fold itself.
#[async_trait]
pub trait Apply<A, I, E>: ReadModel
where
    A: Aggregate,
    I: Identity,
    E: EventPayload,
{
    /// Fold one event into this read model's state.
    ///
    /// # Errors
    ///
    /// A returned error stops the batch: the dispatcher wraps it in
    /// [`ApplyError::Fold`] and propagates without rolling back folds
    /// already applied earlier in the batch.
    async fn apply(
        &mut self,
        ctx: &ReadModelContext,
        event: EventView<'_, A, I, E>,
        cancel: &CancellationToken,
    ) -> Result<(), BoxError>;
}

/// Cross-cutting metadata passed through to every fold invocation.
///
/// Supplied by the caller (typically a read-model repository), never
/// inspected or modified by the dispatcher.
///
/// # Examples
///
/// ```
/// use readfold::ReadModelContext;
/// use serde_json::json;
///
/// let ctx = ReadModelContext::default()
///     .with_read_model_id("order-totals/o-1")
///     .with_metadata(json!({"source": "catch-up"}));
///
/// assert_eq!(ctx.read_model_id.as_deref(), Some("order-totals/o-1"));
/// assert!(ctx.metadata.is_some());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadModelContext {
    /// Identifier of the read-model instance being updated, if the caller
    /// tracks one.
    pub read_model_id: Option<String>,
    /// Arbitrary caller-supplied metadata, forwarded untouched.
    pub metadata: Option<Value>,
}

impl ReadModelContext {
    /// Set the read-model instance identifier.
    pub fn with_read_model_id(mut self, id: impl Into<String>) -> Self {
        self.read_model_id = Some(id.into());
        self
    }

    /// Set arbitrary metadata.
    pub fn with_metadata(mut self, meta: Value) -> Self {
        self.metadata = Some(meta);
        self
    }
}

/// One registered fold: the exact signature triple it matches plus the
/// type-erased invocation path for it.
pub(crate) struct HandlerEntry {
    pub(crate) signature: EventSignature,
    pub(crate) event_type: &'static str,
    pub(crate) fold: FoldFn,
}

/// The registration table a read-model type builds in
/// [`ReadModel::handlers`].
///
/// Each [`on`](HandlerSet::on) call records one (aggregate, identity,
/// payload) triple together with a monomorphized, type-erased fold
/// function. The set is consumed by the resolver on cache misses and then
/// discarded; only the matched entry survives as a cached binding.
pub struct HandlerSet<R> {
    entries: Vec<HandlerEntry>,
    _read_model: PhantomData<fn(&mut R)>,
}

impl<R: ReadModel> HandlerSet<R> {
    /// An empty handler set.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            _read_model: PhantomData,
        }
    }

    /// Register the fold `R: Apply<A, I, E>` for exact-signature dispatch.
    ///
    /// Registering the identical triple twice is reported as
    /// [`ApplyError::AmbiguousHandler`] at resolution time, not here, so
    /// that `handlers` stays infallible.
    pub fn on<A, I, E>(mut self) -> Self
    where
        A: Aggregate,
        I: Identity,
        E: EventPayload,
        R: Apply<A, I, E>,
    {
        self.entries.push(HandlerEntry {
            signature: EventSignature::of::<A, I, E>(),
            event_type: E::EVENT_TYPE,
            fold: erased_apply::<R, A, I, E>,
        });
        self
    }

    pub(crate) fn entries(&self) -> &[HandlerEntry] {
        &self.entries
    }
}

impl<R: ReadModel> Default for HandlerSet<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// The uniform invocation path stored behind every binding.
///
/// Downcasts the erased read model and event back to their concrete
/// types, then delegates to the statically-checked `Apply` impl. The
/// downcasts cannot fail for bindings produced by the resolver (the cache
/// key pins both types), but a failure surfaces as an error rather than a
/// panic.
fn erased_apply<'a, R, A, I, E>(
    model: &'a mut (dyn Any + Send),
    ctx: &'a ReadModelContext,
    event: &'a DomainEvent,
    cancel: &'a CancellationToken,
) -> BoxFuture<'a, Result<(), ApplyError>>
where
    R: Apply<A, I, E>,
    A: Aggregate,
    I: Identity,
    E: EventPayload,
{
    Box::pin(async move {
        let read_model = model
            .downcast_mut::<R>()
            .ok_or(ApplyError::ReadModelTypeMismatch { expected: R::NAME })?;
        let view = event
            .view::<A, I, E>()
            .ok_or(ApplyError::EventTypeMismatch {
                expected: E::EVENT_TYPE,
                actual: event.event_type(),
            })?;
        <R as Apply<A, I, E>>::apply(read_model, ctx, view, cancel)
            .await
            .map_err(|source| ApplyError::Fold {
                read_model: R::NAME,
                event_type: E::EVENT_TYPE,
                source,
            })
    })
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use super::*;
    use std::fmt;

    /// Aggregate marker for the order domain used across the crate's tests.
    pub(crate) struct Order;

    impl Aggregate for Order {
        const AGGREGATE_TYPE: &'static str = "order";
    }

    /// Plain order identity.
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct OrderId(pub String);

    impl fmt::Display for OrderId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl Identity for OrderId {}

    /// Tenant-scoped order identity. Exercises polymorphic identities:
    /// same aggregate and payload types, different identity type.
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct TenantOrderId {
        pub tenant: String,
        pub order: String,
    }

    impl fmt::Display for TenantOrderId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}/{}", self.tenant, self.order)
        }
    }

    impl Identity for TenantOrderId {}

    /// An order was placed with the given total.
    pub(crate) struct OrderPlaced {
        pub total: i64,
    }

    impl EventPayload for OrderPlaced {
        const EVENT_TYPE: &'static str = "OrderPlaced";
    }

    /// An order was cancelled.
    pub(crate) struct OrderCancelled;

    impl EventPayload for OrderCancelled {
        const EVENT_TYPE: &'static str = "OrderCancelled";
    }

    /// A shipment event no test read model folds.
    pub(crate) struct ItemShipped;

    impl EventPayload for ItemShipped {
        const EVENT_TYPE: &'static str = "ItemShipped";
    }

    /// The worked-example read model: folds `OrderPlaced` and
    /// `OrderCancelled`, ignores everything else.
    #[derive(Debug, Default, PartialEq)]
    pub(crate) struct OrderTotals {
        pub total: i64,
        pub cancelled: u64,
        /// Event type tags in fold order, for ordering assertions.
        pub seen: Vec<&'static str>,
    }

    impl ReadModel for OrderTotals {
        const NAME: &'static str = "order-totals";

        fn handlers() -> HandlerSet<Self> {
            HandlerSet::new()
                .on::<Order, OrderId, OrderPlaced>()
                .on::<Order, OrderId, OrderCancelled>()
        }
    }

    #[async_trait]
    impl Apply<Order, OrderId, OrderPlaced> for OrderTotals {
        async fn apply(
            &mut self,
            _ctx: &ReadModelContext,
            event: EventView<'_, Order, OrderId, OrderPlaced>,
            _cancel: &CancellationToken,
        ) -> Result<(), BoxError> {
            self.total += event.payload().total;
            self.seen.push(OrderPlaced::EVENT_TYPE);
            Ok(())
        }
    }

    #[async_trait]
    impl Apply<Order, OrderId, OrderCancelled> for OrderTotals {
        async fn apply(
            &mut self,
            _ctx: &ReadModelContext,
            _event: EventView<'_, Order, OrderId, OrderCancelled>,
            _cancel: &CancellationToken,
        ) -> Result<(), BoxError> {
            self.cancelled += 1;
            self.seen.push(OrderCancelled::EVENT_TYPE);
            Ok(())
        }
    }
}

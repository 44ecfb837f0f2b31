//! Domain events and the runtime type metadata that drives dispatch.
//!
//! A [`DomainEvent`] is an erased, immutable record: the payload and the
//! aggregate identity are stored behind `Arc<dyn Any>`, alongside the
//! aggregate's `TypeId` and human-readable type names. Dispatch never
//! inspects payload contents -- it keys entirely off the runtime
//! (aggregate, identity, payload) type triple, which this module exposes
//! as an [`EventSignature`].

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Marker for an aggregate type whose events a read model may fold.
///
/// The aggregate itself is never instantiated by this crate; it exists so
/// events can carry their owning aggregate's type and so fold registrations
/// can name it. Two aggregates sharing an event payload type still produce
/// distinct dispatch signatures.
pub trait Aggregate: Send + Sync + 'static {
    /// Identifies this aggregate type (e.g. "order"). Used in logging.
    const AGGREGATE_TYPE: &'static str;
}

/// An aggregate identity value carried on every domain event.
///
/// Identity types are runtime values, not static declarations: a system
/// supporting polymorphic identities may attach a different identity type
/// to different instances of the same aggregate. Dispatch therefore reads
/// the identity type from the value stored on the event, never from a
/// type parameter.
pub trait Identity: Any + Send + Sync + fmt::Display {}

/// An event payload type.
///
/// Payload types are the inner key of the binding cache: a read model
/// materializes at most one fold binding per exact
/// (aggregate, identity, payload) triple.
pub trait EventPayload: Any + Send + Sync {
    /// Event type tag (e.g. "OrderPlaced"). Used in logging and errors.
    const EVENT_TYPE: &'static str;
}

/// Record metadata stamped on every domain event by the event store.
///
/// Carried through to fold methods via [`EventView::metadata`] so read
/// models can track positions or timestamps without consulting anything
/// outside the event itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Store-assigned event ID.
    pub event_id: Uuid,
    /// Zero-based version within the aggregate's stream.
    pub stream_version: u64,
    /// Zero-based position in the global log.
    pub global_position: u64,
    /// Store-assigned timestamp (Unix epoch milliseconds).
    pub recorded_at: u64,
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self {
            event_id: Uuid::new_v4(),
            stream_version: 0,
            global_position: 0,
            recorded_at: 0,
        }
    }
}

/// The exact runtime type triple an event dispatches on.
///
/// Equality of signatures is the whole dispatch rule: a fold registered
/// for a merely "compatible" triple never matches. The identity component
/// is always read from the identity value stored on the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventSignature {
    pub(crate) aggregate: TypeId,
    pub(crate) identity: TypeId,
    pub(crate) payload: TypeId,
}

impl EventSignature {
    /// The signature a fold registration for the triple `(A, I, E)` matches.
    pub(crate) fn of<A, I, E>() -> Self
    where
        A: Aggregate,
        I: Identity,
        E: EventPayload,
    {
        Self {
            aggregate: TypeId::of::<A>(),
            identity: TypeId::of::<I>(),
            payload: TypeId::of::<E>(),
        }
    }
}

/// An immutable domain event as delivered to the dispatcher.
///
/// Produced by the surrounding event store, read-only to this crate.
/// `Clone` is cheap -- payload and identity are `Arc`-shared.
///
/// # Examples
///
/// ```
/// use readfold::{Aggregate, DomainEvent, EventPayload, Identity};
///
/// struct Order;
/// impl Aggregate for Order {
///     const AGGREGATE_TYPE: &'static str = "order";
/// }
///
/// #[derive(Debug)]
/// struct OrderId(String);
/// impl std::fmt::Display for OrderId {
///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
///         write!(f, "{}", self.0)
///     }
/// }
/// impl Identity for OrderId {}
///
/// struct OrderPlaced {
///     total: i64,
/// }
/// impl EventPayload for OrderPlaced {
///     const EVENT_TYPE: &'static str = "OrderPlaced";
/// }
///
/// let event = DomainEvent::new::<Order, _, _>(
///     OrderId("o-1".into()),
///     OrderPlaced { total: 10 },
/// );
/// assert_eq!(event.event_type(), "OrderPlaced");
/// assert_eq!(event.aggregate_type(), "order");
/// ```
#[derive(Clone)]
pub struct DomainEvent {
    /// `TypeId` of the owning aggregate marker type.
    aggregate: TypeId,
    /// Aggregate type name for logging (e.g. "order").
    aggregate_type: &'static str,
    /// The identity value. Its concrete type is recovered at dispatch time.
    identity: Arc<dyn Any + Send + Sync>,
    /// Identity type name for logging.
    identity_type: &'static str,
    /// The payload value. Its concrete type is the inner cache key.
    payload: Arc<dyn Any + Send + Sync>,
    /// Event type tag (e.g. "OrderPlaced").
    event_type: &'static str,
    /// Store-assigned record metadata.
    metadata: EventMetadata,
}

// Manual `Debug` because `dyn Any` is not `Debug`; the type names and
// metadata are what matters when an event shows up in logs.
impl fmt::Debug for DomainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainEvent")
            .field("aggregate_type", &self.aggregate_type)
            .field("identity_type", &self.identity_type)
            .field("event_type", &self.event_type)
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl DomainEvent {
    /// Wrap an identity and payload into an erased domain event.
    ///
    /// The aggregate type `A` is given explicitly; the identity and payload
    /// types are captured from the values. Metadata defaults to a fresh
    /// event ID at position zero -- event stores overwrite it via
    /// [`with_metadata`](DomainEvent::with_metadata).
    pub fn new<A, I, E>(identity: I, payload: E) -> Self
    where
        A: Aggregate,
        I: Identity,
        E: EventPayload,
    {
        Self {
            aggregate: TypeId::of::<A>(),
            aggregate_type: A::AGGREGATE_TYPE,
            identity: Arc::new(identity),
            identity_type: std::any::type_name::<I>(),
            payload: Arc::new(payload),
            event_type: E::EVENT_TYPE,
            metadata: EventMetadata::default(),
        }
    }

    /// Replace the record metadata.
    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Event type tag of the payload (e.g. "OrderPlaced").
    pub fn event_type(&self) -> &'static str {
        self.event_type
    }

    /// Name of the owning aggregate type (e.g. "order").
    pub fn aggregate_type(&self) -> &'static str {
        self.aggregate_type
    }

    /// Name of the identity's concrete type.
    pub fn identity_type(&self) -> &'static str {
        self.identity_type
    }

    /// Store-assigned record metadata.
    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    /// `TypeId` of the payload value, read from the value itself.
    ///
    /// This is the inner key of the binding cache.
    pub fn payload_type(&self) -> TypeId {
        self.payload.as_ref().type_id()
    }

    /// The exact runtime signature this event dispatches on.
    ///
    /// The identity component comes from the stored identity *value*, so
    /// two events for the same aggregate and payload can still carry
    /// different signatures under polymorphic identities.
    pub(crate) fn signature(&self) -> EventSignature {
        EventSignature {
            aggregate: self.aggregate,
            identity: self.identity.as_ref().type_id(),
            payload: self.payload.as_ref().type_id(),
        }
    }

    /// Borrow this event as the exact typed triple `(A, I, E)`.
    ///
    /// Returns `None` unless the aggregate `TypeId` and both stored values
    /// match exactly. There is no covariant fallback; a mismatch on any
    /// component means "not this handler".
    pub fn view<A, I, E>(&self) -> Option<EventView<'_, A, I, E>>
    where
        A: Aggregate,
        I: Identity,
        E: EventPayload,
    {
        if self.aggregate != TypeId::of::<A>() {
            return None;
        }
        let identity = self.identity.downcast_ref::<I>()?;
        let payload = self.payload.downcast_ref::<E>()?;
        Some(EventView {
            identity,
            payload,
            metadata: &self.metadata,
            _aggregate: PhantomData,
        })
    }
}

/// A typed borrow of a [`DomainEvent`], handed to fold methods.
///
/// Obtained via [`DomainEvent::view`] once dispatch has established that
/// the event carries exactly the triple `(A, I, E)`.
pub struct EventView<'a, A, I, E> {
    identity: &'a I,
    payload: &'a E,
    metadata: &'a EventMetadata,
    _aggregate: PhantomData<fn() -> A>,
}

impl<'a, A, I, E> EventView<'a, A, I, E> {
    /// The typed aggregate identity.
    pub fn identity(&self) -> &'a I {
        self.identity
    }

    /// The typed event payload.
    pub fn payload(&self) -> &'a E {
        self.payload
    }

    /// Store-assigned record metadata of the underlying event.
    pub fn metadata(&self) -> &'a EventMetadata {
        self.metadata
    }
}

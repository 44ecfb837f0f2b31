//! Type-driven dispatch of domain events into in-memory read models.
//!
//! Given a read model and an ordered batch of [`DomainEvent`]s, the
//! [`DomainEventApplier`] decides per event whether the read model
//! defines a fold for the event's exact runtime
//! (aggregate, identity, payload) type triple and, if so, invokes it,
//! mutating the read model in place. Resolved bindings are cached
//! process-wide, so the per-event cost after warm-up is one map lookup.
//!
//! Everything around this -- the event store, read-model persistence,
//! subscriptions, checkpoints -- lives outside this crate.

mod applier;
pub use applier::DomainEventApplier;
mod binding;
pub use binding::HandlerBinding;
mod error;
pub use error::{ApplyError, BoxError};
mod event;
pub use event::{
    Aggregate, DomainEvent, EventMetadata, EventPayload, EventSignature, EventView, Identity,
};
mod read_model;
pub use read_model::{Apply, HandlerSet, ReadModel, ReadModelContext};

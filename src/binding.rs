//! Resolved handler bindings and the signature resolver.
//!
//! A [`HandlerBinding`] is the unit the binding cache stores: the exact
//! signature triple a fold was resolved for plus a type-erased function
//! pointer that invokes it. Resolution is a pure function of type
//! metadata -- given the same read-model type and event signature it
//! always produces an interchangeable binding, which is what lets the
//! cache tolerate duplicate concurrent resolution without locking around
//! the compute step.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::error::ApplyError;
use crate::event::{DomainEvent, EventSignature};
use crate::read_model::{ReadModel, ReadModelContext};

/// Boxed future used at type-erasure seams.
pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The uniform call signature every fold is erased to: one single-shot
/// call-through accepting (read model, context, event, cancellation) and
/// completing when the fold does. No buffering, no retry.
pub(crate) type FoldFn = for<'a> fn(
    &'a mut (dyn Any + Send),
    &'a ReadModelContext,
    &'a DomainEvent,
    &'a CancellationToken,
) -> BoxFuture<'a, Result<(), ApplyError>>;

/// A resolved association between one (read model, event signature) pair
/// and the fold that handles it.
///
/// Immutable once created; `Copy` because it is a `TypeId` triple and a
/// function pointer. The cache stores `Option<HandlerBinding>`, with
/// `None` as the "no compatible fold" sentinel.
#[derive(Clone, Copy)]
pub struct HandlerBinding {
    signature: EventSignature,
    event_type: &'static str,
    fold: FoldFn,
}

// Manual `Debug` to skip the fold function pointer.
impl std::fmt::Debug for HandlerBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerBinding")
            .field("event_type", &self.event_type)
            .field("signature", &self.signature)
            .finish()
    }
}

impl HandlerBinding {
    /// The exact signature triple this binding was resolved for.
    pub fn signature(&self) -> EventSignature {
        self.signature
    }

    /// Event type tag of the payload this binding folds.
    pub fn event_type(&self) -> &'static str {
        self.event_type
    }

    /// Invoke the bound fold against `model` for `event`.
    pub(crate) fn invoke<'a>(
        &self,
        model: &'a mut (dyn Any + Send),
        ctx: &'a ReadModelContext,
        event: &'a DomainEvent,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), ApplyError>> {
        (self.fold)(model, ctx, event, cancel)
    }
}

/// Resolve the fold binding for read model `R` and one event.
///
/// Reads the exact (aggregate, identity, payload) triple from the event
/// -- the identity type from the event's stored identity value -- and
/// scans `R`'s handler table for an entry whose registered triple equals
/// it. Anything less than exact equality is not a match.
///
/// Returns `Ok(None)` when no entry matches; that is the "unhandled"
/// sentinel, not an error, and the caller caches it.
///
/// # Errors
///
/// Returns [`ApplyError::AmbiguousHandler`] if more than one entry
/// carries the identical triple. The error propagates without being
/// cached, so a corrected registration takes effect on the next call.
pub(crate) fn resolve<R: ReadModel>(
    event: &DomainEvent,
) -> Result<Option<HandlerBinding>, ApplyError> {
    let wanted = event.signature();
    let set = R::handlers();

    let mut resolved: Option<HandlerBinding> = None;
    for entry in set.entries() {
        if entry.signature != wanted {
            continue;
        }
        if resolved.is_some() {
            return Err(ApplyError::AmbiguousHandler {
                read_model: R::NAME,
                event_type: event.event_type(),
            });
        }
        resolved = Some(HandlerBinding {
            signature: entry.signature,
            event_type: entry.event_type,
            fold: entry.fold,
        });
    }

    match &resolved {
        Some(binding) => tracing::debug!(
            read_model = R::NAME,
            event_type = binding.event_type,
            "fold binding resolved"
        ),
        None => tracing::debug!(
            read_model = R::NAME,
            event_type = event.event_type(),
            "no matching fold handler"
        ),
    }

    Ok(resolved)
}

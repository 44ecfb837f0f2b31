//! Crate-level error types for event dispatch.

/// Boxed domain error returned by fold methods.
///
/// Read models surface their own failure types through this alias; the
/// dispatcher wraps them in [`ApplyError::Fold`] without interpreting
/// them.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error returned when applying a batch of events to a read model fails.
///
/// An unhandled event is never an error -- it is skipped silently. Every
/// variant here stops the batch at the failing event, leaving the read
/// model mutated by the folds that already completed. Callers must treat
/// that as "indeterminate partial state, do not persist".
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// A bound fold method failed.
    ///
    /// Wraps the domain-specific error the fold returned. The dispatcher
    /// performs no compensation or retry; replaying from a clean read
    /// model is the caller's responsibility.
    #[error("fold for {event_type} on {read_model} failed: {source}")]
    Fold {
        /// Name of the read model whose fold failed.
        read_model: &'static str,
        /// Event type tag of the event being folded.
        event_type: &'static str,
        /// The fold's own error.
        #[source]
        source: BoxError,
    },

    /// A read model registered more than one fold for the identical
    /// signature triple.
    ///
    /// Resolution failures are never cached, so fixing the registration
    /// takes effect on the next call.
    #[error("ambiguous registration on {read_model}: multiple folds share the exact signature for {event_type}")]
    AmbiguousHandler {
        /// Name of the read model with the duplicate registration.
        read_model: &'static str,
        /// Event type tag the duplicates were registered for.
        event_type: &'static str,
    },

    /// The read-model instance handed to a binding is not the type the
    /// binding was resolved for.
    ///
    /// Cannot occur when bindings come from the cache (the cache key pins
    /// the type); surfaced instead of panicking for direct misuse.
    #[error("read model instance is not a {expected}")]
    ReadModelTypeMismatch {
        /// Name of the read model the binding expects.
        expected: &'static str,
    },

    /// The event handed to a binding does not carry the signature triple
    /// the binding was resolved for.
    ///
    /// Also surfaces through `apply_all` when a cached binding is hit by
    /// an event whose identity type differs from the one the binding was
    /// resolved for -- the event-type tags then match, but the triple
    /// does not.
    #[error("event {actual} does not carry the exact signature the {expected} fold was bound for")]
    EventTypeMismatch {
        /// Event type tag the binding expects.
        expected: &'static str,
        /// Event type tag actually carried by the event.
        actual: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("projection lookup failed")]
    struct TestFoldError;

    #[test]
    fn fold_error_displays_read_model_event_and_source() {
        let err = ApplyError::Fold {
            read_model: "order-totals",
            event_type: "OrderPlaced",
            source: Box::new(TestFoldError),
        };
        let msg = err.to_string();
        assert!(msg.contains("order-totals"));
        assert!(msg.contains("OrderPlaced"));
        assert!(msg.contains("projection lookup failed"));
    }

    #[test]
    fn fold_error_exposes_source() {
        let err = ApplyError::Fold {
            read_model: "order-totals",
            event_type: "OrderPlaced",
            source: Box::new(TestFoldError),
        };
        let source = std::error::Error::source(&err).expect("source should be set");
        assert_eq!(source.to_string(), "projection lookup failed");
    }

    #[test]
    fn ambiguous_handler_display() {
        let err = ApplyError::AmbiguousHandler {
            read_model: "order-totals",
            event_type: "OrderPlaced",
        };
        assert!(err.to_string().contains("ambiguous registration"));
    }

    #[test]
    fn type_mismatch_displays_expected_and_actual() {
        let err = ApplyError::EventTypeMismatch {
            expected: "OrderPlaced",
            actual: "ItemShipped",
        };
        let msg = err.to_string();
        assert!(msg.contains("OrderPlaced"));
        assert!(msg.contains("ItemShipped"));
    }

    // Verify `Send + Sync` bounds are satisfied so errors can cross task
    // boundaries.
    const _: () = {
        #[allow(dead_code)]
        fn assert_send_sync<T: Send + Sync>() {}

        #[allow(dead_code)]
        fn check() {
            assert_send_sync::<ApplyError>();
        }
    };
}

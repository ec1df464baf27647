//! Event callback registry
//!
//! Tracks which event kinds are registered with the broker for one plugin
//! instance and routes dispatched events to the handler stored for the kind.
//! An entry exists only while the broker has confirmed the registration.

use crate::broker::BrokerApi;
use crate::panic_guard::panic_message;
use mosqbridge_core::{
    BridgeError, BridgeResult, DispatchOutcome, EventHandler, EventKind, EventPayload,
    PluginContext, PluginIdentifier,
};
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// One confirmed broker registration
#[derive(Clone)]
pub struct EventRegistration {
    pub kind: EventKind,
    pub handler: Arc<dyn EventHandler>,
}

impl std::fmt::Debug for EventRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistration")
            .field("kind", &self.kind)
            .field("handler", &self.handler.name())
            .finish()
    }
}

/// Registration table for one plugin instance
///
/// At most one registration per kind. Attach order is remembered so that
/// [`EventRegistry::detach_all`] can undo registrations in reverse.
pub struct EventRegistry {
    identifier: PluginIdentifier,
    broker: Arc<dyn BrokerApi>,
    entries: BTreeMap<EventKind, EventRegistration>,
    order: Vec<EventKind>,
}

impl EventRegistry {
    pub fn new(identifier: PluginIdentifier, broker: Arc<dyn BrokerApi>) -> Self {
        Self {
            identifier,
            broker,
            entries: BTreeMap::new(),
            order: Vec::new(),
        }
    }

    /// Register `kind` with the broker and route it to `handler`
    ///
    /// The entry is stored only after the broker reports success. Attaching a
    /// kind that is already registered swaps the handler without another
    /// broker call.
    pub fn attach(&mut self, kind: EventKind, handler: Arc<dyn EventHandler>) -> BridgeResult<()> {
        if let Some(existing) = self.entries.get_mut(&kind) {
            tracing::debug!(%kind, handler = handler.name(), "replacing event handler");
            existing.handler = handler;
            return Ok(());
        }

        let status = self.broker.register_event(self.identifier, kind);
        if !status.is_success() {
            return Err(BridgeError::Registration { kind, status });
        }

        tracing::debug!(%kind, handler = handler.name(), "event registered");
        self.entries.insert(kind, EventRegistration { kind, handler });
        self.order.push(kind);
        Ok(())
    }

    /// Unregister `kind`
    ///
    /// Detaching a kind that is not registered succeeds without a broker call.
    /// If the broker refuses, the entry is still dropped locally (the bridge
    /// will not route that kind again) and the failure is returned.
    pub fn detach(&mut self, kind: EventKind) -> BridgeResult<()> {
        if self.entries.remove(&kind).is_none() {
            return Ok(());
        }
        self.order.retain(|k| *k != kind);

        let status = self.broker.unregister_event(self.identifier, kind);
        if !status.is_success() {
            return Err(BridgeError::Registration { kind, status });
        }

        tracing::debug!(%kind, "event unregistered");
        Ok(())
    }

    /// Detach everything in reverse attach order, continuing past failures
    ///
    /// Returns the failures; the table is empty afterwards either way.
    pub fn detach_all(&mut self) -> Vec<BridgeError> {
        let kinds: Vec<EventKind> = self.order.iter().rev().copied().collect();
        kinds
            .into_iter()
            .filter_map(|kind| self.detach(kind).err())
            .collect()
    }

    pub fn handler(&self, kind: EventKind) -> Option<Arc<dyn EventHandler>> {
        self.entries.get(&kind).map(|r| r.handler.clone())
    }

    pub fn is_registered(&self, kind: EventKind) -> bool {
        self.entries.contains_key(&kind)
    }

    /// Registered kinds in attach order
    pub fn kinds(&self) -> &[EventKind] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Route one event to the handler registered for its kind
    pub fn dispatch(&self, ctx: &PluginContext, event: &EventPayload<'_>) -> DispatchOutcome {
        invoke(self.handler(event.kind()).as_deref(), ctx, event)
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("identifier", &self.identifier)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

/// Invoke a handler with panic containment and stats accounting
pub(crate) fn invoke(
    handler: Option<&dyn EventHandler>,
    ctx: &PluginContext,
    event: &EventPayload<'_>,
) -> DispatchOutcome {
    let stats = ctx.stats();
    stats.record_dispatched();

    let kind = event.kind();
    let Some(handler) = handler else {
        stats.record_not_handled();
        return DispatchOutcome::not_handled(kind);
    };

    match catch_unwind(AssertUnwindSafe(|| handler.handle_event(ctx, event))) {
        Ok(Ok(reply)) => {
            stats.record_handled();
            DispatchOutcome::handled(reply)
        }
        Ok(Err(BridgeError::NotHandled(_))) => {
            stats.record_not_handled();
            DispatchOutcome::not_handled(kind)
        }
        Ok(Err(e)) => {
            stats.record_failed();
            tracing::warn!(handler = handler.name(), %kind, error = %e, "event handler failed");
            DispatchOutcome::failed(e.status_code())
        }
        Err(payload) => {
            stats.record_failed();
            tracing::error!(
                handler = handler.name(),
                %kind,
                "{}",
                panic_message(payload.as_ref())
            );
            DispatchOutcome::failed(mosqbridge_core::StatusCode::Unknown)
        }
    }
}

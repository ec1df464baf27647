//! Plugin instance lifecycle and instance management

use crate::broker::BrokerApi;
use crate::panic_guard::contain_panic;
use crate::registry::{EventRegistry, invoke};
use dashmap::DashMap;
use mosqbridge_core::{
    BridgeError, BridgeResult, DispatchGate, DispatchOutcome, EventHandler, EventKind,
    EventPayload, LifecycleState, OptionEntry, OptionKind, OptionSpec, OptionTable,
    PluginContext, PluginIdentifier, StatusCode, UnknownKeyPolicy,
};
use mosqbridge_logging::LogForwarder;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Options every plugin instance understands
pub const BRIDGE_OPTIONS: &[OptionSpec] = &[
    OptionSpec::new(
        PluginContext::LOG_LEVEL_KEY,
        OptionKind::Choice(&["trace", "debug", "info", "warn", "warning", "error", "off"]),
    )
    .with_default("info"),
    OptionSpec::new(PluginContext::DRAIN_TIMEOUT_KEY, OptionKind::Millis).with_default("5000"),
];

/// Global instance manager
static INSTANCE_MANAGER: OnceCell<InstanceManager> = OnceCell::new();

/// Live plugin instances keyed by broker identifier
///
/// The broker hands back only opaque pointers (`userdata`), so every entry
/// point looks its instance up here.
pub struct InstanceManager {
    instances: DashMap<PluginIdentifier, Arc<PluginInstance>>,
}

impl InstanceManager {
    pub fn new() -> Self {
        Self {
            instances: DashMap::new(),
        }
    }

    pub fn global() -> &'static InstanceManager {
        INSTANCE_MANAGER.get_or_init(InstanceManager::new)
    }

    /// Add an instance, returning any previous one with the same identifier
    pub fn insert(&self, instance: Arc<PluginInstance>) -> Option<Arc<PluginInstance>> {
        self.instances.insert(instance.identifier(), instance)
    }

    pub fn get(&self, identifier: PluginIdentifier) -> Option<Arc<PluginInstance>> {
        self.instances.get(&identifier).map(|r| r.clone())
    }

    pub fn remove(&self, identifier: PluginIdentifier) -> Option<Arc<PluginInstance>> {
        self.instances.remove(&identifier).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl Default for InstanceManager {
    fn default() -> Self {
        Self::new()
    }
}

/// One loaded plugin instance and its lifecycle
///
/// Drives `Uninitialized -> Initializing -> Active -> CleaningUp ->
/// Terminated`. Init and cleanup are serialized by compare-and-swap on the
/// state; dispatch may run concurrently from any broker thread while
/// `Active`.
pub struct PluginInstance {
    identifier: PluginIdentifier,
    handler: Arc<dyn EventHandler>,
    state: AtomicU8,
    context: RwLock<Option<Arc<PluginContext>>>,
    registry: RwLock<EventRegistry>,
    gate: DispatchGate,
}

impl PluginInstance {
    pub fn new(
        identifier: PluginIdentifier,
        broker: Arc<dyn BrokerApi>,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        Self {
            identifier,
            handler,
            state: AtomicU8::new(LifecycleState::Uninitialized as u8),
            context: RwLock::new(None),
            registry: RwLock::new(EventRegistry::new(identifier, broker)),
            gate: DispatchGate::new(),
        }
    }

    pub fn identifier(&self) -> PluginIdentifier {
        self.identifier
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn handler_name(&self) -> &'static str {
        self.handler.name()
    }

    /// Shared context; `None` before init and after cleanup
    pub fn context(&self) -> Option<Arc<PluginContext>> {
        self.context.read().clone()
    }

    /// Registered kinds in attach order
    pub fn registered_kinds(&self) -> Vec<EventKind> {
        self.registry.read().kinds().to_vec()
    }

    pub fn in_flight(&self) -> usize {
        self.gate.in_flight()
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> BridgeResult<()> {
        debug_assert!(from.can_transition_to(to));
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|actual| BridgeError::InvalidState {
                expected: from.to_string(),
                actual: LifecycleState::from_u8(actual).to_string(),
            })
    }

    /// Initialize the instance and attach every event the handler declares
    ///
    /// Any failure, including a panic in the handler's hooks or the broker,
    /// detaches the kinds attached so far in reverse order, runs the
    /// handler's cleanup hook if its init hook had succeeded, releases the
    /// context and leaves the instance `Terminated`.
    pub fn on_init(&self, options: &[OptionEntry]) -> StatusCode {
        if let Err(e) = self.transition(LifecycleState::Uninitialized, LifecycleState::Initializing)
        {
            tracing::warn!(plugin = self.handler.name(), error = %e, "init rejected");
            return e.status_code();
        }

        match contain_panic(|| self.initialize(options)) {
            Ok(()) => {
                self.state
                    .store(LifecycleState::Active as u8, Ordering::SeqCst);
                self.gate.open();
                tracing::info!(
                    plugin = self.handler.name(),
                    events = ?self.registered_kinds(),
                    "plugin initialized"
                );
                StatusCode::Success
            }
            Err(e) => {
                self.roll_back();
                self.state
                    .store(LifecycleState::Terminated as u8, Ordering::SeqCst);
                tracing::error!(plugin = self.handler.name(), error = %e, "plugin init failed");
                e.status_code()
            }
        }
    }

    fn initialize(&self, options: &[OptionEntry]) -> BridgeResult<()> {
        let table = OptionTable::new(UnknownKeyPolicy::Ignore)
            .extend(BRIDGE_OPTIONS)
            .extend(self.handler.options());
        let options = table.parse(options)?;

        let ctx = Arc::new(PluginContext::new(self.identifier, options));
        // Process-wide: the forwarder has one level, so the last instance
        // initialized decides it for every loaded plugin
        LogForwarder::global().set_level(ctx.log_level());

        contain_panic(|| self.handler.on_init(&ctx))?;
        *self.context.write() = Some(ctx);

        let mut registry = self.registry.write();
        for &kind in self.handler.events() {
            if let Err(e) = registry.attach(kind, self.handler.clone()) {
                tracing::warn!(%kind, error = %e, "attach failed, rolling back");
                return Err(e);
            }
        }

        Ok(())
    }

    /// Undo a partial init
    ///
    /// The context is only set once the handler's init hook succeeded, so
    /// its cleanup hook runs exactly when there is something to clean up.
    fn roll_back(&self) {
        for failure in self.registry.write().detach_all() {
            tracing::warn!(error = %failure, "rollback detach failed");
        }
        let ctx = self.context.write().take();
        if let Some(ctx) = ctx {
            if let Err(e) = contain_panic(|| self.handler.on_cleanup(&ctx)) {
                tracing::warn!(error = %e, "handler cleanup failed during rollback");
            }
        }
    }

    /// Detach everything, wait for in-flight dispatches, release the context
    ///
    /// Only valid from `Active`. Detach failures and handler cleanup errors
    /// or panics are logged and do not stop the teardown; the instance always
    /// ends `Terminated`.
    pub fn on_cleanup(&self) -> StatusCode {
        if let Err(e) = self.transition(LifecycleState::Active, LifecycleState::CleaningUp) {
            tracing::warn!(plugin = self.handler.name(), error = %e, "cleanup rejected");
            return e.status_code();
        }

        if let Err(e) = contain_panic(|| {
            self.tear_down();
            Ok(())
        }) {
            tracing::error!(plugin = self.handler.name(), error = %e, "cleanup interrupted");
        }
        *self.context.write() = None;

        self.state
            .store(LifecycleState::Terminated as u8, Ordering::SeqCst);
        StatusCode::Success
    }

    fn tear_down(&self) {
        let ctx = self.context();
        let timeout = ctx
            .as_ref()
            .map_or(PluginContext::DEFAULT_DRAIN_TIMEOUT, |c| c.drain_timeout());
        if !self.gate.close_and_drain(timeout) {
            tracing::warn!(
                in_flight = self.gate.in_flight(),
                ?timeout,
                "dispatches still running after drain timeout"
            );
        }

        for failure in self.registry.write().detach_all() {
            tracing::warn!(error = %failure, "detach failed during cleanup");
        }

        if let Some(ctx) = &ctx {
            if let Err(e) = contain_panic(|| self.handler.on_cleanup(ctx)) {
                tracing::warn!(error = %e, "handler cleanup failed");
            }
            let stats = ctx.stats();
            tracing::info!(
                plugin = self.handler.name(),
                dispatched = stats.dispatched(),
                handled = stats.handled(),
                not_handled = stats.not_handled(),
                failed = stats.failed(),
                uptime_ms = ctx.uptime().as_millis() as u64,
                "plugin cleaned up"
            );
        }
    }

    /// Route one broker event to its handler
    ///
    /// Outside `Active`, or for kinds without a registration, the event is
    /// reported as not handled.
    pub fn dispatch(&self, event: &EventPayload<'_>) -> DispatchOutcome {
        let Some(_guard) = self.gate.enter() else {
            tracing::debug!(kind = %event.kind(), state = %self.state(), "dispatch outside active state");
            return DispatchOutcome::not_handled(event.kind());
        };
        let Some(ctx) = self.context() else {
            return DispatchOutcome::not_handled(event.kind());
        };

        // Look the handler up, then run it without holding the registry lock
        let handler = self.registry.read().handler(event.kind());
        invoke(handler.as_deref(), &ctx, event)
    }
}

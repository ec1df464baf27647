//! Event handler trait implemented by plugins

use crate::{BridgeResult, EventKind, EventPayload, EventReply, OptionSpec, PluginContext};

/// Main trait for implementing broker plugins
///
/// The bridge calls `handle_event` from whatever broker thread delivers the
/// event, possibly from several threads at once, so implementations must be
/// `Send + Sync` and keep their own state behind atomics or locks.
///
/// # Example
///
/// ```
/// use mosqbridge_core::prelude::*;
///
/// struct Audit;
///
/// impl EventHandler for Audit {
///     fn name(&self) -> &'static str {
///         "audit"
///     }
///
///     fn events(&self) -> &[EventKind] {
///         &[EventKind::Connect]
///     }
///
///     fn handle_event(
///         &self,
///         _ctx: &PluginContext,
///         event: &EventPayload<'_>,
///     ) -> BridgeResult<EventReply> {
///         if let Some(client) = event.client() {
///             tracing::info!(client_id = client.client_id, "client connected");
///         }
///         Ok(EventReply::accept())
///     }
/// }
///
/// assert_eq!(Audit.events(), &[EventKind::Connect]);
/// ```
pub trait EventHandler: Send + Sync + 'static {
    /// Short name used in log lines
    fn name(&self) -> &'static str;

    /// Event kinds to attach, in attach order
    ///
    /// Detach happens in the reverse order.
    fn events(&self) -> &[EventKind];

    /// Options this plugin understands, merged over the bridge's own
    fn options(&self) -> &[OptionSpec] {
        &[]
    }

    /// Called once after options are parsed and before any event is attached
    ///
    /// An error aborts init; nothing has been registered with the broker yet.
    fn on_init(&self, _ctx: &PluginContext) -> BridgeResult<()> {
        Ok(())
    }

    /// Handle one broker event
    fn handle_event(&self, ctx: &PluginContext, event: &EventPayload<'_>)
    -> BridgeResult<EventReply>;

    /// Called once after every registration is removed
    ///
    /// Also runs when init is rolled back after `on_init` succeeded.
    fn on_cleanup(&self, _ctx: &PluginContext) -> BridgeResult<()> {
        Ok(())
    }
}

//! queue-forward - Mosquitto plugin forwarding messages to a queue
//!
//! Every published message with a JSON payload is wrapped in a
//! [`QueueMessage`] envelope and handed to a bounded background
//! [`Dispatcher`]. The broker thread never waits on the publisher; when the
//! message cannot be queued the configured [`FailMode`] decides what the
//! broker is told.

use mosqbridge::prelude::*;
use parking_lot::RwLock;
use std::sync::Arc;

pub mod config;
pub mod dispatcher;
pub mod envelope;

pub use config::{FailMode, QueueConfig};
pub use dispatcher::{Dispatcher, EnqueueError, LogPublisher, Publisher};
pub use envelope::{PayloadError, QueueMessage, filter_topic, parse_payload};

const SAMPLE_EVERY: u64 = 128;

/// Configuration and dispatcher of an initialized instance
#[derive(Debug)]
struct Running {
    config: QueueConfig,
    dispatcher: Dispatcher,
}

/// Message forwarding plugin
pub struct QueueForward {
    publisher: Arc<dyn Publisher>,
    running: RwLock<Option<Arc<Running>>>,
    filtered: Sampler,
    published: Sampler,
    backpressure: Sampler,
}

impl QueueForward {
    pub fn new() -> Self {
        Self::with_publisher(Arc::new(LogPublisher))
    }

    pub fn with_publisher(publisher: Arc<dyn Publisher>) -> Self {
        Self {
            publisher,
            running: RwLock::new(None),
            filtered: Sampler::new(SAMPLE_EVERY),
            published: Sampler::new(SAMPLE_EVERY),
            backpressure: Sampler::new(SAMPLE_EVERY),
        }
    }

    /// Active configuration, once initialized
    pub fn config(&self) -> Option<QueueConfig> {
        self.running.read().as_ref().map(|r| r.config.clone())
    }

    /// Reply for a message that could not be forwarded
    fn fail(&self, config: &QueueConfig, error: &dyn std::fmt::Display, backpressure: bool) -> EventReply {
        let mode = config.fail_mode;
        if !backpressure {
            tracing::warn!(error = %error, fail_mode = %mode, "queue-forward: publish failed");
        } else if self.backpressure.should_sample() {
            if mode == FailMode::Drop {
                tracing::debug!(error = %error, fail_mode = %mode, "queue-forward: publish backpressure");
            } else {
                tracing::warn!(error = %error, fail_mode = %mode, "queue-forward: publish backpressure");
            }
        }

        match mode.status() {
            StatusCode::Success => EventReply::accept(),
            status => EventReply::reject(status),
        }
    }

    fn forward(&self, running: &Running, event: &EventPayload<'_>) -> BridgeResult<EventReply> {
        let EventPayload::Message {
            client,
            topic,
            payload,
            qos,
            retain,
            user_properties,
        } = *event
        else {
            return Err(BridgeError::NotHandled(event.kind()));
        };

        if let Some(reason) = filter_topic(topic) {
            if self.filtered.should_sample() {
                tracing::debug!(topic, reason, "queue-forward: filtered");
            }
            return Ok(EventReply::accept());
        }

        let payload = match parse_payload(payload) {
            Ok(value) => value,
            Err(e) => return Ok(self.fail(&running.config, &e, false)),
        };
        let message = QueueMessage::new(topic, payload, qos, retain, client.as_ref())
            .with_user_properties(user_properties);
        let body = match message.to_bytes() {
            Ok(body) => body,
            Err(e) => return Ok(self.fail(&running.config, &e, false)),
        };

        if self.published.should_sample() {
            tracing::debug!(
                topic,
                qos,
                retain,
                len = body.len(),
                client_id = %message.client_id,
                user_props = message.user_properties.len(),
                "queue-forward: publish"
            );
        }

        let config = &running.config;
        Ok(
            match running
                .dispatcher
                .enqueue(body, config.fail_mode, config.enqueue_timeout)
            {
                Ok(()) => EventReply::accept(),
                Err(e) => self.fail(config, &e, true),
            },
        )
    }
}

impl Default for QueueForward {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for QueueForward {
    fn name(&self) -> &'static str {
        "queue-forward"
    }

    fn events(&self) -> &[EventKind] {
        &[EventKind::Message]
    }

    fn options(&self) -> &[OptionSpec] {
        config::OPTIONS
    }

    fn on_init(&self, ctx: &PluginContext) -> BridgeResult<()> {
        let config = QueueConfig::from_options(ctx.options())?;
        let dispatcher = Dispatcher::start(config.buffer, self.publisher.clone())?;

        tracing::info!(
            backend = %config.backend,
            publisher = self.publisher.name(),
            buffer = config.buffer,
            enqueue_timeout_ms = config.enqueue_timeout.as_millis() as u64,
            stop_timeout_ms = config.stop_timeout.as_millis() as u64,
            fail_mode = %config.fail_mode,
            "queue-forward: init"
        );
        *self.running.write() = Some(Arc::new(Running { config, dispatcher }));
        Ok(())
    }

    fn handle_event(&self, _ctx: &PluginContext, event: &EventPayload<'_>) -> BridgeResult<EventReply> {
        let Some(running) = self.running.read().clone() else {
            return Err(BridgeError::NotHandled(event.kind()));
        };

        self.forward(&running, event)
    }

    fn on_cleanup(&self, _ctx: &PluginContext) -> BridgeResult<()> {
        let Some(running) = self.running.write().take() else {
            return Ok(());
        };
        let drained = running.dispatcher.stop(running.config.stop_timeout);
        tracing::info!(drained, "queue-forward: plugin cleaned up");
        Ok(())
    }
}

mosqbridge::mosquitto_plugin!(QueueForward::new);

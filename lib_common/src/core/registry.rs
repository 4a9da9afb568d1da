//! # Plugin Registry
//!
//! Routes inbound messages to the handler registered under the name found in
//! `pluginArg.name`. Handlers are registered once at startup and looked up
//! concurrently afterwards, so the table sits behind an `RwLock` and lookups
//! clone the handler's `Arc` before calling it. No lock is held while a
//! handler runs.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use super::dispatcher::{ConnectionId, Outbox};
use super::request::target_name;

/// A service that answers messages addressed to its name.
pub trait PluginHandler: Send + Sync {
    /// Routing name, matched against `pluginArg.name`.
    fn name(&self) -> &str;

    /// Handles one message from `connection`, replying through `outbox`.
    fn handle(&self, connection: ConnectionId, message: Value, outbox: &dyn Outbox);
}

/// What happened to a routed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A handler took the message.
    Delivered,
    /// The message named a service nobody registered.
    UnknownTarget(String),
    /// The message had no `pluginArg.name`.
    Unaddressed,
}

#[derive(Default)]
pub struct PluginRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn PluginHandler>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under its own name, replacing any earlier one.
    pub fn register(&self, handler: Arc<dyn PluginHandler>) {
        let name = handler.name().to_string();
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        if handlers.insert(name.clone(), handler).is_some() {
            tracing::warn!(plugin = %name, "Plugin handler replaced");
        } else {
            tracing::info!(plugin = %name, "Plugin handler registered");
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    fn lookup(&self, name: &str) -> Option<Arc<dyn PluginHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Hands `message` to the handler named in `pluginArg.name`.
    pub fn route(&self, connection: ConnectionId, message: Value, outbox: &dyn Outbox) -> RouteOutcome {
        let Some(name) = target_name(&message).map(str::to_owned) else {
            tracing::debug!(%connection, "Dropping message without pluginArg.name");
            return RouteOutcome::Unaddressed;
        };

        match self.lookup(&name) {
            Some(handler) => {
                handler.handle(connection, message, outbox);
                RouteOutcome::Delivered
            }
            None => {
                // The desktop client's keep-alive ("ping") lands here too.
                tracing::debug!(%connection, plugin = %name, "No handler registered");
                RouteOutcome::UnknownTarget(name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dispatcher::SendError;
    use crate::core::response::OutboundResponse;
    use serde_json::json;
    use std::sync::Mutex;

    struct Echo;

    impl PluginHandler for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn handle(&self, connection: ConnectionId, _message: Value, outbox: &dyn Outbox) {
            let _ = outbox.send(connection, &OutboundResponse::empty("echo", None));
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ConnectionId>>);

    impl Outbox for Recorder {
        fn send(&self, connection: ConnectionId, _response: &OutboundResponse) -> Result<(), SendError> {
            self.0.lock().unwrap().push(connection);
            Ok(())
        }
    }

    #[test]
    fn routes_by_plugin_name() {
        let registry = PluginRegistry::new();
        registry.register(Arc::new(Echo));
        assert!(registry.is_registered("echo"));

        let outbox = Recorder::default();
        let outcome = registry.route(ConnectionId(7), json!({"pluginArg": {"name": "echo"}}), &outbox);
        assert_eq!(outcome, RouteOutcome::Delivered);
        assert_eq!(*outbox.0.lock().unwrap(), vec![ConnectionId(7)]);
    }

    #[test]
    fn unknown_and_unaddressed_messages_are_dropped() {
        let registry = PluginRegistry::new();
        registry.register(Arc::new(Echo));
        let outbox = Recorder::default();

        let ping = json!({"arg": {"topic": "ping"}, "data": "", "pluginArg": {"name": "ping", "instanceId": "ping"}});
        assert_eq!(
            registry.route(ConnectionId(1), ping, &outbox),
            RouteOutcome::UnknownTarget("ping".into())
        );
        assert_eq!(
            registry.route(ConnectionId(1), json!({"startDate": "20250101"}), &outbox),
            RouteOutcome::Unaddressed
        );
        assert!(outbox.0.lock().unwrap().is_empty());
    }
}

//! # Exchange-Rate Query Handler
//!
//! Answers date-range queries from the cache. The handler is built with an
//! explicit `Arc<CacheStore>` and receives the send capability per call, so
//! it owns no transport state of its own.
//!
//! ## Request lifecycle
//!
//! 1.  Capture the correlation token before anything can fail.
//! 2.  Resolve and validate the date range ([`resolve_range`]).
//! 3.  Filter the cache snapshot ([`query`]).
//! 4.  Build the reply. Any error or panic from steps 2-3 becomes the
//!     empty-data reply carrying the token from step 1.
//! 5.  Queue the reply. A failed send is logged and dropped.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;

use super::cache_store::CacheStore;
use super::dispatcher::{ConnectionId, Outbox};
use super::query_engine::{query, DateRange};
use super::record::Record;
use super::registry::PluginHandler;
use super::request::{correlation_token, resolve_range, RequestError};
use super::response::OutboundResponse;

/// How many records are echoed to the debug log per reply.
const SAMPLE_RECORDS: usize = 5;

pub struct RateQueryHandler {
    store: Arc<CacheStore>,
    source_name: String,
}

impl RateQueryHandler {
    pub fn new(store: Arc<CacheStore>, source_name: impl Into<String>) -> Self {
        Self {
            store,
            source_name: source_name.into(),
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    fn run_query(&self, message: &Value) -> Result<Vec<Record>, RequestError> {
        let range: DateRange = resolve_range(message)?;
        if range.is_inverted() {
            tracing::warn!(%range, "Inverted date range; nothing can match");
        }
        tracing::info!(%range, "Filtering exchange-rate cache");
        Ok(query(&self.store, &range))
    }

    /// Builds the reply for one message. Never fails: every error, and any
    /// panic while interpreting or filtering, turns into an empty-data reply
    /// that still carries the caller's token.
    pub fn answer(&self, message: &Value) -> OutboundResponse {
        let token = correlation_token(message);

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.run_query(message))) {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!(instance_id = ?token, "Request handling panicked; replying with empty data");
                return OutboundResponse::empty(&self.source_name, token);
            }
        };

        match outcome {
            Ok(data) => {
                tracing::info!(records = data.len(), instance_id = ?token, "Filtered records from cache");
                for (idx, rec) in data.iter().take(SAMPLE_RECORDS).enumerate() {
                    let sample = Value::Object(rec.clone());
                    tracing::debug!(idx, record = %sample, "Filtered sample record");
                }
                OutboundResponse::success(&self.source_name, token, data)
            }
            Err(e) => {
                tracing::error!(error = %e, instance_id = ?token, "Rejecting request; replying with empty data");
                OutboundResponse::empty(&self.source_name, token)
            }
        }
    }
}

impl PluginHandler for RateQueryHandler {
    fn name(&self) -> &str {
        &self.source_name
    }

    fn handle(&self, connection: ConnectionId, message: Value, outbox: &dyn Outbox) {
        tracing::debug!(%connection, %message, "Request received");
        let reply = self.answer(&message);
        if let Err(e) = outbox.send(connection, &reply) {
            tracing::warn!(%connection, error = %e, "Failed to send reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dispatcher::{Dispatcher, SendError};
    use serde_json::json;

    fn store_with(values: Value) -> Arc<CacheStore> {
        let store = Arc::new(CacheStore::new());
        let rows = values
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect();
        store.replace_all(rows);
        store
    }

    fn sample_handler() -> RateQueryHandler {
        let store = store_with(json!([
            {"tradeDateKey": "20250105", "rate": 7.8},
            {"tradeDateKey": "20250201", "rate": 7.9}
        ]));
        RateQueryHandler::new(store, "Exchange_rate")
    }

    fn wire(resp: &OutboundResponse) -> Value {
        serde_json::to_value(resp).unwrap()
    }

    #[test]
    fn january_query_returns_january_rows() {
        let resp = sample_handler().answer(&json!({"startDate": "20250101", "endDate": "20250131"}));
        assert_eq!(
            wire(&resp),
            json!({
                "pluginArg": {"name": "Exchange_rate"},
                "data": [{"tradeDateKey": "20250105", "rate": 7.8}]
            })
        );
    }

    #[test]
    fn empty_start_date_yields_empty_data() {
        let resp = sample_handler().answer(&json!({"startDate": "", "endDate": "20250131"}));
        assert!(resp.data.is_empty());
        assert_eq!(resp.plugin_arg.name, "Exchange_rate");
    }

    #[test]
    fn token_survives_success_and_error() {
        let handler = sample_handler();
        let ok = handler.answer(&json!({
            "startDate": "20250101", "endDate": "20251231",
            "pluginArg": {"name": "Exchange_rate", "instanceId": "abc123"}
        }));
        assert_eq!(ok.correlation_token(), Some("abc123"));
        assert_eq!(ok.data.len(), 2);

        let err = handler.answer(&json!({
            "endDate": "20251231",
            "pluginArg": {"name": "Exchange_rate", "instanceId": "abc123"}
        }));
        assert_eq!(err.correlation_token(), Some("abc123"));
        assert!(err.data.is_empty());

        let anon = handler.answer(&json!({"startDate": "20250101", "endDate": "20251231"}));
        assert_eq!(anon.correlation_token(), None);
    }

    #[test]
    fn non_object_messages_get_an_empty_reply() {
        let resp = sample_handler().answer(&json!(["20250101", "20250131"]));
        assert!(resp.data.is_empty());
        assert_eq!(resp.correlation_token(), None);
    }

    #[test]
    fn nested_arg_bounds_are_honoured() {
        let resp = sample_handler().answer(&json!({"arg": {"startDate": 20250201, "endDate": 20250228}}));
        assert_eq!(resp.data.len(), 1);
        assert_eq!(resp.data[0]["rate"], json!(7.9));
    }

    #[test]
    fn handle_queues_reply_on_the_dispatcher() {
        let handler = sample_handler();
        let dispatcher = Dispatcher::new();
        let conn = ConnectionId(42);
        let mut rx = dispatcher.add_client(conn);

        handler.handle(
            conn,
            json!({"startDate": "20250101", "endDate": "20250131", "pluginArg": {"instanceId": "x"}}),
            &dispatcher,
        );
        let frame: Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame["pluginArg"]["instanceId"], "x");
        assert_eq!(frame["data"].as_array().unwrap().len(), 1);
    }

    struct Broken;

    impl Outbox for Broken {
        fn send(&self, connection: ConnectionId, _response: &OutboundResponse) -> Result<(), SendError> {
            Err(SendError::Closed(connection))
        }
    }

    #[test]
    fn send_failures_are_swallowed() {
        let handler = sample_handler();
        handler.handle(ConnectionId(1), json!({"startDate": "20250101"}), &Broken);
        handler.handle(ConnectionId(1), json!({"startDate": "20250101", "endDate": "20250131"}), &Broken);
        // Still serving afterwards.
        assert_eq!(handler.answer(&json!({"startDate": "20250101", "endDate": "20250131"})).data.len(), 1);
    }
}

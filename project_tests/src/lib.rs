//! Shared fixtures for the end-to-end tests: an in-memory range source and
//! a helper that runs the real gateway on an ephemeral port.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use lib_common::core::{
    CacheStore, Dispatcher, PluginRegistry, RangeQuery, RangeSource, RateQueryHandler, Record, SourceError,
};
use lib_common::gateway::{self, GatewayState};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const PLUGIN_NAME: &str = "Exchange_rate";

/// A [`RangeSource`] that answers from a fixed row set, applying the
/// window's bounds the way the database would for string keys.
pub struct FixtureSource {
    rows: Result<Vec<Record>, SourceError>,
    calls: AtomicUsize,
}

impl FixtureSource {
    pub fn with_rows(rows: Vec<Record>) -> Self {
        Self {
            rows: Ok(rows),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: SourceError) -> Self {
        Self {
            rows: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RangeSource for FixtureSource {
    async fn range_query(&self, query: &RangeQuery) -> Result<Vec<Record>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.clone()?;
        let bound = |op: &str| {
            query
                .predicates
                .iter()
                .find(|p| p.expression.contains(op))
                .map(|p| p.bound.clone())
        };
        let (low, high) = (bound(">="), bound("<="));
        Ok(rows
            .into_iter()
            .filter(|row| {
                let Some(key) = row.get("tradeDateKey").map(key_text) else {
                    return false;
                };
                low.as_ref().is_none_or(|l| &key >= l) && high.as_ref().is_none_or(|h| &key <= h)
            })
            .collect())
    }
}

fn key_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Builds a record from a JSON object literal.
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture record must be an object, got {}", other),
    }
}

/// A month of rates straddling the turn of January 2025, with mixed key
/// types the way real tables come back.
pub fn sample_records() -> Vec<Record> {
    vec![
        record(json!({"tradeDateKey": "20241231", "currency": "USD", "rate": 7.77})),
        record(json!({"tradeDateKey": "20250102", "currency": "USD", "rate": 7.78})),
        record(json!({"tradeDateKey": 20250105, "currency": "USD", "rate": 7.8})),
        record(json!({"tradeDateKey": "20250131", "currency": "USD", "rate": 7.79})),
        record(json!({"tradeDateKey": "20250201", "currency": "USD", "rate": 7.9})),
        record(json!({"currency": "USD", "rate": 0.0})),
    ]
}

/// A gateway running in the background on `127.0.0.1:<ephemeral>`.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub store: Arc<CacheStore>,
    pub dispatcher: Arc<Dispatcher>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl TestGateway {
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn health_url(&self) -> String {
        format!("http://{}/health", self.addr)
    }

    /// Triggers graceful shutdown and waits for the server task.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        (&mut self.handle).await??;
        Ok(())
    }
}

/// Starts the gateway over `store` with the rate handler registered as
/// [`PLUGIN_NAME`].
pub async fn spawn_gateway(store: Arc<CacheStore>) -> Result<TestGateway> {
    let registry = Arc::new(PluginRegistry::new());
    registry.register(Arc::new(RateQueryHandler::new(Arc::clone(&store), PLUGIN_NAME)));
    let dispatcher = Arc::new(Dispatcher::new());

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = GatewayState::new(registry, Arc::clone(&dispatcher), Arc::clone(&store));

    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(gateway::serve(listener, state, async move {
        let _ = rx.await;
    }));

    Ok(TestGateway {
        addr,
        store,
        dispatcher,
        shutdown: Some(tx),
        handle,
    })
}

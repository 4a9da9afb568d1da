//! # Cache Loader
//!
//! One-shot, startup-time population of the [`CacheStore`] from an external
//! range-query service. The loader issues exactly one query for a fixed,
//! inclusive window on the date key and installs whatever comes back.
//!
//! ## Failure policy
//!
//! A failed load is never fatal. If the source is unreachable, rejects the
//! query, returns malformed rows, panics, or does not answer within the
//! optional timeout, the failure is logged, an empty snapshot is installed,
//! and the service goes on answering every query with empty data. There is
//! no retry.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde_json::Value;
use thiserror::Error;

use super::cache_store::CacheStore;
use super::record::{Record, TRADE_DATE_KEY};

/// How many loaded records are echoed to the debug log.
const SAMPLE_RECORDS: usize = 5;

/// Failures reported by a [`RangeSource`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The source could not be reached (pool, network, missing settings).
    #[error("data source unavailable: {0}")]
    Unavailable(String),
    /// The query itself was rejected before it was sent.
    #[error("invalid range query: {0}")]
    InvalidQuery(String),
    /// The source accepted the query but failed to run it.
    #[error("range query failed: {0}")]
    Query(String),
    /// The source answered with something that is not a list of records.
    #[error("malformed payload: {0}")]
    Malformed(String),
    /// No answer within the configured time.
    #[error("range query timed out after {0:?}")]
    Timeout(Duration),
    /// The source panicked while answering.
    #[error("data source panicked: {0}")]
    Panicked(String),
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

/// One filter clause: an expression with a single `%s` placeholder and the
/// value substituted for it (e.g. `"tradeDateKey" >= %s`, `20250101`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangePredicate {
    pub expression: String,
    pub bound: String,
}

impl RangePredicate {
    pub fn new(expression: impl Into<String>, bound: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            bound: bound.into(),
        }
    }
}

/// A keyed range query: dataset, table and ANDed predicates, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    pub dataset: String,
    pub table: String,
    pub predicates: Vec<RangePredicate>,
}

/// Anything that can answer a [`RangeQuery`] with records.
pub trait RangeSource: Send + Sync {
    fn range_query(&self, query: &RangeQuery) -> impl Future<Output = Result<Vec<Record>, SourceError>> + Send;
}

/// Converts a decoded JSON payload into records, rejecting anything that is
/// not an array of objects.
pub fn records_from_value(payload: Value) -> Result<Vec<Record>, SourceError> {
    let Value::Array(items) = payload else {
        return Err(SourceError::Malformed("expected a JSON array of records".into()));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Object(map) => Ok(map),
            other => Err(SourceError::Malformed(format!(
                "record {} is not an object: {}",
                idx, other
            ))),
        })
        .collect()
}

/// The fixed window preloaded at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadWindow {
    pub dataset: String,
    pub table: String,
    /// Column expression used in the predicates. Quoted by default so that
    /// the camel-case column name survives SQL case folding.
    pub key_column: String,
    /// Inclusive lower bound, `YYYYMMDD`.
    pub start: String,
    /// Inclusive upper bound, `YYYYMMDD`.
    pub end: String,
}

impl PreloadWindow {
    pub fn new(
        dataset: impl Into<String>,
        table: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Self {
            dataset: dataset.into(),
            table: table.into(),
            key_column: format!("\"{}\"", TRADE_DATE_KEY),
            start: start.into(),
            end: end.into(),
        }
    }

    /// The `key >= start AND key <= end` query for this window.
    pub fn to_query(&self) -> RangeQuery {
        RangeQuery {
            dataset: self.dataset.clone(),
            table: self.table.clone(),
            predicates: vec![
                RangePredicate::new(format!("{} >= %s", self.key_column), self.start.clone()),
                RangePredicate::new(format!("{} <= %s", self.key_column), self.end.clone()),
            ],
        }
    }
}

/// Outcome of a preload, for the caller's own logging or health reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Records installed in the store (0 on failure).
    pub records: usize,
    /// Why the load failed, if it did.
    pub failure: Option<SourceError>,
}

impl LoadReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Runs the one-time preload of `window` from `source` into `store`.
///
/// Always leaves the store in a defined state: the fetched rows on success,
/// an empty snapshot on failure.
pub async fn preload<S>(
    source: &S,
    store: &Arc<CacheStore>,
    window: &PreloadWindow,
    timeout: Option<Duration>,
) -> LoadReport
where
    S: RangeSource,
{
    tracing::info!(
        dataset = %window.dataset,
        table = %window.table,
        start = %window.start,
        end = %window.end,
        "Loading exchange rate data"
    );

    let query = window.to_query();
    let fetch = async {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, source.range_query(&query)).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::Timeout(limit)),
            },
            None => source.range_query(&query).await,
        }
    };
    let fetched = match AssertUnwindSafe(fetch).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(SourceError::Panicked(panic_message(payload.as_ref()))),
    };

    match fetched {
        Ok(records) => {
            let count = records.len();
            for (idx, rec) in records.iter().take(SAMPLE_RECORDS).enumerate() {
                let sample = Value::Object(rec.clone());
                tracing::debug!(idx, record = %sample, "Cached sample record");
            }
            store.replace_all(records);
            tracing::info!(records = count, "Cached exchange rate records");
            LoadReport {
                records: count,
                failure: None,
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load exchange rate data; serving an empty cache");
            store.replace_all(Vec::new());
            LoadReport {
                records: 0,
                failure: Some(e),
            }
        }
    }
}

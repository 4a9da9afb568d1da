use std::sync::Arc;

use lib_common::connections::PostgresSource;
use lib_common::core::{preload, CacheStore, LoadReport, PluginRegistry, RateQueryHandler, SourceError};

use crate::exchange_rate_logic::config::Settings;

/// Fills `store` from the configured database. Every failure, including a
/// missing connection string, ends with an empty cache and a failed report.
pub async fn load_cache(settings: &Settings, store: &Arc<CacheStore>) -> LoadReport {
    let failure = match settings.database_url.as_deref() {
        None => SourceError::Unavailable("no database url configured".to_string()),
        Some(url) => match PostgresSource::new(url, settings.db_pool_size) {
            Ok(source) => return preload(&source, store, &settings.window, settings.load_timeout).await,
            Err(e) => e,
        },
    };

    tracing::error!(error = %failure, "Exchange rate preload skipped; serving an empty cache");
    store.replace_all(Vec::new());
    LoadReport {
        records: 0,
        failure: Some(failure),
    }
}

/// Registry with the exchange rate handler under the configured name.
pub fn build_registry(settings: &Settings, store: &Arc<CacheStore>) -> Arc<PluginRegistry> {
    let registry = Arc::new(PluginRegistry::new());
    registry.register(Arc::new(RateQueryHandler::new(
        Arc::clone(store),
        settings.plugin_name.clone(),
    )));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange_rate_logic::config::Config;

    #[tokio::test]
    async fn missing_database_url_is_a_load_failure() {
        let settings = Config::defaults().resolve().unwrap();
        let store = Arc::new(CacheStore::new());

        let report = load_cache(&settings, &store).await;
        assert!(!report.is_success());
        assert!(matches!(report.failure, Some(SourceError::Unavailable(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn registry_uses_configured_name() {
        let settings = Config {
            plugin_name: Some("FX".into()),
            ..Config::defaults()
        }
        .resolve()
        .unwrap();
        let registry = build_registry(&settings, &Arc::new(CacheStore::new()));
        assert!(registry.is_registered("FX"));
        assert!(!registry.is_registered("Exchange_rate"));
    }
}

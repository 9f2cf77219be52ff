// Services module - providers, normalization and the aggregation pipelines

pub mod http;
pub mod images;
pub mod metadata;
pub mod normalize;
pub mod retry;
pub mod single_flight;
pub mod source;

// Providers
pub mod fanart;
pub mod imdb;
pub mod omdb;
pub mod tmdb;
pub mod url_cleanup;

use std::sync::Arc;

use crate::config::ProvidersConfig;
use http::HttpClient;
use source::SourceAdapter;

/// Every adapter this build knows, keyed by the name used in priority lists
pub struct AdapterSet {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl AdapterSet {
    pub fn from_config(providers: &ProvidersConfig, http: HttpClient) -> Self {
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(tmdb::TmdbAdapter::new(
                http.clone(),
                providers.tmdb_api_key.clone(),
                providers.tmdb_base_url.clone(),
            )),
            Arc::new(omdb::OmdbAdapter::new(
                http.clone(),
                providers.omdb_api_key.clone(),
                providers.omdb_base_url.clone(),
            )),
            Arc::new(imdb::ImdbAdapter::new(
                http.clone(),
                providers.imdb_base_url.clone(),
            )),
            Arc::new(fanart::FanartAdapter::new(
                http.clone(),
                providers.fanart_api_key.clone(),
                providers.fanart_base_url.clone(),
            )),
            Arc::new(url_cleanup::UrlCleanupAdapter::new(http)),
        ];
        Self { adapters }
    }

    /// Adapters in the given priority order. Unknown names are logged and
    /// skipped.
    pub fn ordered(&self, names: &[String]) -> Vec<Arc<dyn SourceAdapter>> {
        names
            .iter()
            .filter_map(|name| {
                let found = self
                    .adapters
                    .iter()
                    .find(|a| a.name().eq_ignore_ascii_case(name.trim()))
                    .cloned();
                if found.is_none() {
                    tracing::warn!("Unknown provider in priority list: {}", name);
                }
                found
            })
            .collect()
    }
}

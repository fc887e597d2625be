//! Debounced city search with a stale-response guard.

use crate::{
    core::config::SearchConfig,
    data::City,
    runtime::{lock, Debouncer},
    traits::SelectorBackend,
    Result,
};
use std::sync::{Arc, Mutex};

/// How one keystroke's search ended
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Below the minimum length; nothing was sent and suggestions should clear.
    TooShort,
    /// A later keystroke arrived inside the quiet window; nothing was sent.
    Superseded,
    /// Sent, but the search box moved on before the answer came back.
    Stale { query: String },
    /// The answer for the current search box content.
    Cities { query: String, cities: Vec<City> },
}

/// Issues city queries on behalf of the search box.
///
/// Each [`GeoSearchClient::search`] call is one keystroke. The returned
/// future is lazy and may be dropped to abandon it; it converges to exactly
/// one [`SearchOutcome`] or an error. The client never notifies the user.
pub struct GeoSearchClient {
    backend: Arc<dyn SelectorBackend>,
    debouncer: Debouncer,
    current_query: Mutex<String>,
    min_chars: usize,
    limit: u32,
}

impl GeoSearchClient {
    pub fn new(backend: Arc<dyn SelectorBackend>, config: &SearchConfig) -> Self {
        Self {
            backend,
            debouncer: Debouncer::new(config.debounce()),
            current_query: Mutex::new(String::new()),
            min_chars: config.min_query_chars,
            limit: config.city_limit,
        }
    }

    /// The search box content as of the latest keystroke.
    pub fn current_query(&self) -> String {
        lock(&self.current_query).clone()
    }

    fn is_current(&self, query: &str) -> bool {
        *lock(&self.current_query) == query
    }

    /// Records `query` as the search box content and, once the quiet window
    /// passes without a newer keystroke, sends it.
    pub async fn search(&self, query: &str) -> Result<SearchOutcome> {
        *lock(&self.current_query) = query.to_string();

        if query.chars().count() < self.min_chars {
            self.debouncer.cancel();
            return Ok(SearchOutcome::TooShort);
        }

        if !self.debouncer.wait().await {
            log::trace!("city search {query:?} superseded before dispatch");
            return Ok(SearchOutcome::Superseded);
        }

        log::debug!("city search dispatch {query:?}");
        let result = self.backend.search_cities(query, self.limit).await;

        if !self.is_current(query) {
            log::debug!("discarding stale city search response for {query:?}");
            return Ok(SearchOutcome::Stale {
                query: query.to_string(),
            });
        }

        let cities = result?;
        Ok(SearchOutcome::Cities {
            query: query.to_string(),
            cities,
        })
    }

    /// Resolves a known city name to its top-ranked match, without debounce.
    pub async fn resolve_top(&self, name: &str, limit: u32) -> Result<Option<City>> {
        let cities = self.backend.search_cities(name, limit.max(1)).await?;
        Ok(cities.into_iter().next())
    }

    /// Replaces the search box content without searching, e.g. when a
    /// suggestion is chosen. Pending and in-flight searches go stale.
    pub fn set_query(&self, text: &str) {
        *lock(&self.current_query) = text.to_string();
        self.debouncer.cancel();
    }

    /// Drops any pending dispatch; used on teardown.
    pub fn cancel(&self) {
        self.debouncer.cancel();
    }
}

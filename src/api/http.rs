//! reqwest-backed [`SelectorBackend`] speaking JSON-RPC to the shop.

use super::{
    endpoints, rpc::RpcRequest, rpc::RpcResponse, CitySearchRequest, DeliveryUpdate,
    PointSearchRequest,
};
use crate::{
    core::config::HttpBackendConfig,
    data::{City, PickupPoint},
    traits::SelectorBackend,
    Result, SelectorError,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// HTTP client for the checkout JSON endpoints.
///
/// Non-2xx statuses and network failures surface as
/// [`SelectorError::Network`]; server-side faults in the JSON-RPC envelope as
/// [`SelectorError::Rpc`]; application error payloads as
/// [`SelectorError::Search`]. Nothing is retried here: a retry is always a
/// repeated user action.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct UpdateResult {
    #[serde(default)]
    success: bool,
}

#[derive(Debug, Serialize)]
struct Empty {}

impl HttpBackend {
    /// # Errors
    ///
    /// Returns [`SelectorError::Network`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(config: &HttpBackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn call<P, T>(&self, path: &str, params: &P) -> Result<T>
    where
        P: Serialize + Sync,
        T: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let url = self.url(path);
        log::debug!("rpc #{id} -> {url}");

        let response = self
            .client
            .post(&url)
            .json(&RpcRequest::call(params, id))
            .send()
            .await?
            .error_for_status()?;

        let envelope: RpcResponse = response.json().await?;
        let payload = envelope.into_payload();
        if let Err(e) = &payload {
            log::warn!("rpc #{id} {path} failed: {e}");
        }
        payload
    }
}

#[async_trait]
impl SelectorBackend for HttpBackend {
    async fn search_cities(&self, query: &str, limit: u32) -> Result<Vec<City>> {
        let request = CitySearchRequest {
            query: query.to_string(),
            limit,
        };
        let cities: Vec<City> = self.call(endpoints::CITY_SEARCH, &request).await?;
        log::debug!("city search {query:?}: {} candidates", cities.len());
        Ok(cities)
    }

    async fn search_points(&self, request: &PointSearchRequest) -> Result<Vec<PickupPoint>> {
        let points: Vec<PickupPoint> = self.call(endpoints::POINT_SEARCH, request).await?;
        log::debug!("point search {}: {} points", request.city_code, points.len());
        Ok(points)
    }

    async fn map_api_key(&self) -> Result<Option<String>> {
        let key: Option<String> = self.call(endpoints::MAP_API_KEY, &Empty {}).await?;
        Ok(key.filter(|k| !k.trim().is_empty()))
    }

    async fn update_delivery(&self, update: &DeliveryUpdate) -> Result<()> {
        let result: UpdateResult = self.call(endpoints::UPDATE_DELIVERY, update).await?;
        if result.success {
            Ok(())
        } else {
            Err(SelectorError::Persist("Failed to update order.".to_string()))
        }
    }
}

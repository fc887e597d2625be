//! Request shapes for the backend calls and the JSON-RPC transport.

pub mod http;
pub mod rpc;

pub use http::HttpBackend;

use serde::{Deserialize, Serialize};

/// Endpoint paths, relative to the backend base URL.
pub mod endpoints {
    pub const CITY_SEARCH: &str = "/cdek/city/search";
    pub const POINT_SEARCH: &str = "/cdek/pvz/search";
    pub const MAP_API_KEY: &str = "/cdek/config/yandex_key";
    pub const UPDATE_DELIVERY: &str = "/shop/cdek/update_delivery";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitySearchRequest {
    pub query: String,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSearchRequest {
    pub city_code: String,
    pub delivery_type: String,
    pub limit: u32,
}

/// The order update written when a point is chosen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryUpdate {
    pub order_id: i64,
    pub carrier_id: i64,
    pub delivery_type: String,
    #[serde(rename = "cdek_city_code")]
    pub city_code: String,
    #[serde(rename = "cdek_city_name")]
    pub city_name: String,
    #[serde(rename = "cdek_pvz_code")]
    pub point_code: String,
    #[serde(rename = "cdek_pvz_address")]
    pub point_address: String,
}

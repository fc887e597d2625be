//! Configuration for the selector, its backend, and the mount-time context.
//!
//! `SelectorConfig` groups the viewport, clustering, search, and marker
//! settings. Every field has a default, so a JSON file only needs to name the
//! values it overrides.

use crate::core::constants::*;
use crate::core::geo::{LatLng, Point};
use crate::{Result, SelectorError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub viewport: ViewportConfig,
    pub clustering: ClusterConfig,
    pub search: SearchConfig,
    pub markers: MarkerConfig,
    pub map_api_url_template: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            viewport: ViewportConfig::default(),
            clustering: ClusterConfig::default(),
            search: SearchConfig::default(),
            markers: MarkerConfig::default(),
            map_api_url_template: DEFAULT_MAP_API_URL_TEMPLATE.to_string(),
        }
    }
}

impl SelectorConfig {
    /// Loads a config from a JSON file; missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            SelectorError::ConfigMissing(format!("{}: {e}", path.as_ref().display()))
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the viewport policy cannot work with.
    pub fn validate(&self) -> Result<()> {
        let vp = &self.viewport;
        if vp.min_zoom > vp.max_zoom {
            return Err(SelectorError::ConfigMissing(format!(
                "min_zoom {} exceeds max_zoom {}",
                vp.min_zoom, vp.max_zoom
            )));
        }
        if vp.single_point_zoom <= vp.initial_zoom {
            return Err(SelectorError::ConfigMissing(
                "single_point_zoom must be tighter than initial_zoom".to_string(),
            ));
        }
        if self.clustering.grid_size == 0 {
            return Err(SelectorError::ConfigMissing(
                "cluster grid_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Map script URL for the given key.
    pub fn map_api_url(&self, api_key: &str) -> String {
        self.map_api_url_template.replace("{apikey}", api_key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub initial_zoom: f64,
    pub single_point_zoom: f64,
    pub fit_margin_px: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub default_center: LatLng,
    pub map_size: Point,
    pub settle_delay_ms: u64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            initial_zoom: DEFAULT_INITIAL_ZOOM,
            single_point_zoom: DEFAULT_SINGLE_POINT_ZOOM,
            fit_margin_px: DEFAULT_FIT_MARGIN_PX,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            default_center: DEFAULT_CENTER.into(),
            map_size: Point::new(DEFAULT_MAP_SIZE.0, DEFAULT_MAP_SIZE.1),
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
        }
    }
}

impl ViewportConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Options handed to the map widget's clustering collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub clusterize: bool,
    pub grid_size: u32,
    pub disable_click_zoom: bool,
    pub icon_layout: String,
    pub pie_chart_radius: u32,
    pub pie_chart_core_radius: u32,
    pub pie_chart_stroke_width: u32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            clusterize: true,
            grid_size: DEFAULT_CLUSTER_GRID_SIZE,
            disable_click_zoom: true,
            icon_layout: DEFAULT_CLUSTER_ICON_LAYOUT.to_string(),
            pie_chart_radius: 15,
            pie_chart_core_radius: 8,
            pie_chart_stroke_width: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub debounce_ms: u64,
    pub min_query_chars: usize,
    pub city_limit: u32,
    pub initial_city_limit: u32,
    pub point_limit: u32,
    pub point_delivery_type: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            min_query_chars: DEFAULT_MIN_QUERY_CHARS,
            city_limit: DEFAULT_CITY_SEARCH_LIMIT,
            initial_city_limit: DEFAULT_INITIAL_CITY_SEARCH_LIMIT,
            point_limit: DEFAULT_POINT_SEARCH_LIMIT,
            point_delivery_type: DEFAULT_POINT_DELIVERY_TYPE.to_string(),
        }
    }
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub preset: String,
    pub selected_preset: String,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            preset: DEFAULT_MARKER_PRESET.to_string(),
            selected_preset: DEFAULT_SELECTED_MARKER_PRESET.to_string(),
        }
    }
}

/// Where the JSON-RPC endpoints live and how to reach them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8069".to_string(),
            timeout_secs: 30,
            user_agent: concat!("pickup-map/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpBackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}

/// Inputs read once from the hosting page when the selector mounts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MountContext {
    pub order_id: Option<i64>,
    pub carrier_id: Option<i64>,
    pub partner_shipping_id: Option<i64>,
    pub partner_shipping_city: Option<String>,
    pub current_point_code: Option<String>,
}

impl MountContext {
    /// Parses the container's `data-*` attributes. Unparsable ids count as absent.
    pub fn from_attributes(attrs: &HashMap<String, String>) -> Self {
        let id = |key: &str| attrs.get(key).and_then(|v| v.trim().parse::<i64>().ok());
        let text = |key: &str| {
            attrs
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            order_id: id("data-order-id"),
            carrier_id: id("data-carrier-id"),
            partner_shipping_id: id("data-partner-shipping-id"),
            partner_shipping_city: text("data-partner-shipping-city"),
            current_point_code: text("data-current-pvz-code"),
        }
    }

    /// The carrier id is the one input the selector cannot start without.
    pub fn require_carrier(&self) -> Result<i64> {
        self.carrier_id
            .ok_or_else(|| SelectorError::ConfigMissing("carrier id is absent".to_string()))
    }

    /// City name and saved point code, when both are known.
    pub fn known_selection(&self) -> Option<(&str, &str)> {
        match (&self.partner_shipping_city, &self.current_point_code) {
            (Some(city), Some(code)) => Some((city.as_str(), code.as_str())),
            _ => None,
        }
    }
}

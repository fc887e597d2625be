//! Map side of the selector: marker projection, the viewport policy, and the
//! controller that owns the widget instance.

pub mod clustering;
pub mod controller;
pub mod headless;
pub mod marker;
pub mod policy;

use crate::core::geo::LatLng;
use serde::{Deserialize, Serialize};

/// Events the map widget reports back. Ids are pickup point codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MapEvent {
    /// A single marker was clicked.
    MarkerClick { id: String },
    /// The "Select" action inside a marker's balloon was used.
    BalloonSelect { id: String },
    /// A marker's balloon opened.
    BalloonOpen { id: String },
    /// A cluster icon was clicked. Never zooms.
    ClusterClick {
        cluster_id: String,
        member_ids: Vec<String>,
    },
}

/// Options handed to [`crate::traits::MapService::create_map`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapInitOptions {
    pub container_id: String,
    pub center: LatLng,
    pub zoom: f64,
    pub controls: Vec<String>,
}

/// Options for a bounds fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    /// Pixels kept free around the bounds on every side
    pub margin_px: f64,
    /// Keep the resulting zoom inside the map's zoom range
    pub check_zoom_range: bool,
}

impl FitOptions {
    pub fn with_margin(margin_px: f64) -> Self {
        Self {
            margin_px,
            check_zoom_range: true,
        }
    }
}

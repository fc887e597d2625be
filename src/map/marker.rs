use crate::{
    core::{config::MarkerConfig, geo::LatLng},
    data::PickupPoint,
};
use serde::{Deserialize, Serialize};

/// Tooltip used for points that came without a name.
const UNNAMED_POINT: &str = "Pickup Point";

/// Balloon content shown when a marker is opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balloon {
    pub title: String,
    pub address: String,
    pub work_time: Option<String>,
    pub phone: Option<String>,
    pub payment: Option<String>,
}

/// One marker as handed to the map widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerRecord {
    /// Pickup point code
    pub id: String,
    pub coordinates: LatLng,
    pub selected: bool,
    pub tooltip: String,
    pub preset: String,
    pub balloon: Balloon,
}

impl MarkerRecord {
    pub fn from_point(point: &PickupPoint, selected: bool, config: &MarkerConfig) -> Option<Self> {
        let coordinates = point.coordinates()?;
        let tooltip = if point.name.trim().is_empty() {
            UNNAMED_POINT.to_string()
        } else {
            point.name.clone()
        };
        let payment = point.payment_summary();

        Some(Self {
            id: point.code.clone(),
            coordinates,
            selected,
            preset: if selected {
                config.selected_preset.clone()
            } else {
                config.preset.clone()
            },
            balloon: Balloon {
                title: tooltip.clone(),
                address: point.full_address().to_string(),
                work_time: point.work_time.clone().filter(|s| !s.is_empty()),
                phone: point.phone.clone().filter(|s| !s.is_empty()),
                payment: (!payment.is_empty()).then_some(payment),
            },
            tooltip,
        })
    }
}

/// Projects the visible points onto markers. Points without usable
/// coordinates stay list-only; at most one marker is selected.
pub fn project_markers(
    points: &[PickupPoint],
    selected_code: Option<&str>,
    config: &MarkerConfig,
) -> Vec<MarkerRecord> {
    points
        .iter()
        .filter_map(|point| {
            let selected = selected_code == Some(point.code.as_str());
            MarkerRecord::from_point(point, selected, config)
        })
        .collect()
}

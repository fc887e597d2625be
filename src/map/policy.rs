//! Where the map should look after the point set, the selection, or the
//! active city changed.
//!
//! [`plan_viewport`] is pure; the controller applies the returned plan and
//! remembers which city it last fitted for.

use super::marker::MarkerRecord;
use crate::{
    core::{
        config::ViewportConfig,
        geo::{LatLng, LatLngBounds},
    },
    data::City,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ViewportPlan {
    /// Leave the view alone.
    Keep,
    Center { center: LatLng, zoom: f64 },
    Fit { bounds: LatLngBounds, margin: f64 },
    /// Recenter now, fit once the recenter has settled.
    CenterThenFit {
        center: LatLng,
        zoom: f64,
        bounds: LatLngBounds,
        margin: f64,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct PolicyInput<'a> {
    pub city: Option<&'a City>,
    pub markers: &'a [MarkerRecord],
    pub last_fitted_city: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDecision {
    pub plan: ViewportPlan,
    /// City code to remember as fitted after applying the plan.
    pub fitted_city: Option<String>,
}

/// Decides the next viewport move.
///
/// Rules, first match wins:
/// 1. no markers: center on the city at the initial zoom;
/// 2. one marker, and it is the selected one: center on it at the single
///    point zoom;
/// 3. every marker at one coordinate: as rule 2 if one of them is selected,
///    otherwise as rule 1, using that coordinate when the city has none;
/// 4. city changed since the last fit: recenter on the city, then fit;
/// 5. otherwise fit the markers with the configured margin.
pub fn plan_viewport(input: PolicyInput<'_>, config: &ViewportConfig) -> PolicyDecision {
    let city_code = input.city.map(|c| c.code.clone());
    let city_center = input.city.and_then(City::coordinates);
    let keep_fitted = input.last_fitted_city.map(str::to_string);

    let center_on_city = |fallback: Option<LatLng>| match city_center.or(fallback) {
        Some(center) => ViewportPlan::Center {
            center,
            zoom: config.initial_zoom,
        },
        None => ViewportPlan::Keep,
    };

    let markers = input.markers;
    if markers.is_empty() {
        // No city means nothing to anchor on yet.
        return PolicyDecision {
            plan: center_on_city(None),
            fitted_city: city_code.or(keep_fitted),
        };
    }

    if let [only] = markers {
        if only.selected {
            return PolicyDecision {
                plan: ViewportPlan::Center {
                    center: only.coordinates,
                    zoom: config.single_point_zoom,
                },
                fitted_city: city_code.or(keep_fitted),
            };
        }
    }

    let Some(bounds) = LatLngBounds::from_points(markers.iter().map(|m| &m.coordinates)) else {
        return PolicyDecision {
            plan: ViewportPlan::Keep,
            fitted_city: keep_fitted,
        };
    };

    if bounds.is_degenerate() {
        let plan = match markers.iter().find(|m| m.selected) {
            Some(selected) => ViewportPlan::Center {
                center: selected.coordinates,
                zoom: config.single_point_zoom,
            },
            None => center_on_city(Some(bounds.center())),
        };
        return PolicyDecision {
            plan,
            fitted_city: city_code.or(keep_fitted),
        };
    }

    let city_changed = city_code.is_some() && city_code.as_deref() != input.last_fitted_city;
    let margin = config.fit_margin_px;
    let plan = match (city_changed, city_center) {
        (true, Some(center)) => ViewportPlan::CenterThenFit {
            center,
            zoom: config.initial_zoom,
            bounds,
            margin,
        },
        _ => ViewportPlan::Fit { bounds, margin },
    };

    PolicyDecision {
        plan,
        fitted_city: city_code.or(keep_fitted),
    }
}

use super::state::{PersistStatus, SelectionPhase, SelectionState};
use crate::{
    core::config::MarkerConfig,
    data::{filter_points, City, PickupPoint},
    map::marker::{project_markers, MarkerRecord},
};
use serde::Serialize;

/// Everything the list and the map render, recomputed from
/// [`SelectionState`] after each mutation.
///
/// The list and the markers come from the same filtered slice, so a point
/// hidden by the filter is hidden in both.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionView {
    pub city: Option<City>,
    /// Filtered points, in backend order.
    pub points: Vec<PickupPoint>,
    pub total_points: usize,
    pub selected: Option<PickupPoint>,
    pub markers: Vec<MarkerRecord>,
    pub filter_text: String,
    pub phase: SelectionPhase,
    pub cities_loading: bool,
    pub points_loading: bool,
    pub persist_error: Option<String>,
}

impl SelectionView {
    pub fn derive(state: &SelectionState, markers: &MarkerConfig) -> Self {
        let points = filter_points(&state.available_points, &state.filter_text).into_owned();
        let selected_code = state.selected_point.as_ref().map(|p| p.code.as_str());
        let markers = project_markers(&points, selected_code, markers);

        Self {
            city: state.selected_city.clone(),
            total_points: state.available_points.len(),
            selected: state.selected_point.clone(),
            markers,
            points,
            filter_text: state.filter_text.clone(),
            phase: state.phase(),
            cities_loading: state.cities_loading,
            points_loading: state.points_loading(),
            persist_error: match &state.persist {
                PersistStatus::Failed(message) => Some(message.clone()),
                _ => None,
            },
        }
    }

    pub fn selected_code(&self) -> Option<&str> {
        self.selected.as_ref().map(|p| p.code.as_str())
    }

    pub fn is_selected(&self, code: &str) -> bool {
        self.selected_code() == Some(code)
    }

    /// Shown instead of the list when a city is chosen but nothing matches.
    pub fn empty_message(&self) -> Option<&'static str> {
        if self.city.is_none() || self.points_loading || !self.points.is_empty() {
            return None;
        }
        if self.total_points == 0 {
            Some("No pickup points found for this city.")
        } else {
            Some("No pickup points match your search.")
        }
    }
}

use crate::data::{City, PickupPoint};
use serde::{Deserialize, Serialize};

/// Progress of the point fetch for the selected city
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchStatus {
    #[default]
    NotStarted,
    Loading,
    Loaded,
    Failed,
}

/// Progress of saving the chosen point on the order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersistStatus {
    #[default]
    Idle,
    Persisting,
    Persisted,
    Failed(String),
}

/// Identifies one point fetch: the city it was issued for and its sequence
/// number. A response applies only while both still match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FetchTag {
    pub city_code: String,
    pub seq: u64,
}

/// Coarse phase of the selector, derived from [`SelectionState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionPhase {
    Idle,
    CitySelected,
    PointsLoading,
    PointsLoaded,
    PointsFailed,
    PointSelected,
    Persisting,
    Persisted,
    PersistFailed,
}

/// The selector's single source of truth. Only the orchestrator mutates it.
///
/// Invariants held after every transition:
/// - `selected_point`, when set, is one of `available_points`;
/// - `available_points` always belong to `selected_city`;
/// - a city change clears the list, the selection, and the filter.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SelectionState {
    pub selected_city: Option<City>,
    pub available_points: Vec<PickupPoint>,
    pub selected_point: Option<PickupPoint>,
    pub filter_text: String,
    pub cities_loading: bool,
    pub points_status: FetchStatus,
    pub persist: PersistStatus,
    #[serde(skip)]
    pub(crate) active_fetch: Option<FetchTag>,
}

impl SelectionState {
    pub fn points_loading(&self) -> bool {
        self.points_status == FetchStatus::Loading
    }

    pub fn contains_point(&self, code: &str) -> bool {
        self.available_points.iter().any(|p| p.code == code)
    }

    pub fn find_point(&self, code: &str) -> Option<&PickupPoint> {
        self.available_points.iter().find(|p| p.code == code)
    }

    /// Switches to `city`: list, selection, filter, and persist state reset;
    /// a fetch tagged `tag` becomes the only one whose response applies.
    pub(crate) fn reset_for_city(&mut self, city: City, tag: FetchTag) {
        self.selected_city = Some(city);
        self.available_points.clear();
        self.selected_point = None;
        self.filter_text.clear();
        self.points_status = FetchStatus::Loading;
        self.persist = PersistStatus::Idle;
        self.active_fetch = Some(tag);
    }

    pub(crate) fn is_active_fetch(&self, tag: &FetchTag) -> bool {
        self.active_fetch.as_ref() == Some(tag)
            && self.selected_city.as_ref().map(|c| c.code.as_str()) == Some(tag.city_code.as_str())
    }

    pub fn phase(&self) -> SelectionPhase {
        match (&self.persist, &self.selected_point) {
            (PersistStatus::Persisting, _) => return SelectionPhase::Persisting,
            (PersistStatus::Persisted, Some(_)) => return SelectionPhase::Persisted,
            (PersistStatus::Failed(_), Some(_)) => return SelectionPhase::PersistFailed,
            (_, Some(_)) => return SelectionPhase::PointSelected,
            _ => {}
        }
        if self.selected_city.is_none() {
            return SelectionPhase::Idle;
        }
        match self.points_status {
            FetchStatus::NotStarted => SelectionPhase::CitySelected,
            FetchStatus::Loading => SelectionPhase::PointsLoading,
            FetchStatus::Loaded => SelectionPhase::PointsLoaded,
            FetchStatus::Failed => SelectionPhase::PointsFailed,
        }
    }
}

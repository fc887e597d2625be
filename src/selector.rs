//! The mounted pickup selector: search box, point list, and map wired to one
//! [`SelectionOrchestrator`].

use crate::{
    core::config::{MountContext, SelectorConfig},
    data::City,
    map::controller::{MapIntent, MapStatus, MapViewportController},
    runtime::lock,
    selection::{
        orchestrator::{CitySuggestions, FetchOutcome, PersistOutcome, SelectionOrchestrator},
        view::SelectionView,
    },
    traits::{MapService, Notifier, SelectorBackend},
    Result,
};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// What the city search box currently shows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchBox {
    pub term: String,
    pub suggestions: Vec<City>,
    pub show_suggestions: bool,
}

/// One mounted selector.
///
/// Every intent re-derives the view and hands it to the map, so the list and
/// the markers never disagree. The map is optional: when it fails to load
/// the selector keeps working as a list.
pub struct PickupSelector {
    orchestrator: Arc<SelectionOrchestrator>,
    map: Mutex<MapViewportController>,
    search_box: Mutex<SearchBox>,
    context: MountContext,
}

impl PickupSelector {
    /// Mounts the selector for an order.
    ///
    /// # Errors
    ///
    /// [`crate::SelectorError::ConfigMissing`] when the context has no
    /// carrier. Map and key failures are not errors here; they only show up
    /// in [`Self::map_status`].
    pub async fn mount(
        context: MountContext,
        backend: Arc<dyn SelectorBackend>,
        map_service: Option<&dyn MapService>,
        notifier: Arc<dyn Notifier>,
        config: SelectorConfig,
    ) -> Result<Self> {
        let carrier_id = context.require_carrier().map_err(|e| {
            log::error!("pickup selector cannot mount: {e}");
            e
        })?;
        log::info!(
            "mounting pickup selector for order {:?}, carrier {carrier_id}",
            context.order_id
        );

        let orchestrator = Arc::new(SelectionOrchestrator::new(
            backend.clone(),
            notifier,
            &context,
            config.clone(),
        ));

        // The key and the saved city are independent; fetch them together.
        let (api_key, restored) = futures::join!(
            async {
                match backend.map_api_key().await {
                    Ok(key) => key,
                    Err(e) => {
                        log::warn!("could not fetch the map API key: {e}");
                        None
                    }
                }
            },
            async {
                match context.known_selection() {
                    Some((city_name, point_code)) => orchestrator
                        .initialize_from_known_city(city_name, Some(point_code))
                        .await
                        .map(Some),
                    None => Ok(None),
                }
            }
        );
        match restored {
            Ok(Some(outcome)) => log::debug!("saved selection restore: {outcome:?}"),
            Ok(None) => {}
            Err(e) => log::warn!("saved selection not restored: {e}"),
        }

        let mut search_box = SearchBox::default();
        let city = orchestrator.snapshot().selected_city;
        if let Some(city) = &city {
            search_box.term = city.display_label();
        }

        let mut map = MapViewportController::new(config);
        match map_service {
            Some(service) => {
                if let Err(e) = map.create(service, api_key.as_deref(), city.as_ref()).await {
                    log::warn!("continuing without the map: {e}");
                }
            }
            None => log::info!("no map service, list only"),
        }

        let selector = Self {
            orchestrator,
            map: Mutex::new(map),
            search_box: Mutex::new(search_box),
            context,
        };
        selector.refresh();
        Ok(selector)
    }

    pub fn context(&self) -> &MountContext {
        &self.context
    }

    pub fn orchestrator(&self) -> &Arc<SelectionOrchestrator> {
        &self.orchestrator
    }

    pub fn view(&self) -> SelectionView {
        self.orchestrator.view()
    }

    pub fn search_box(&self) -> SearchBox {
        lock(&self.search_box).clone()
    }

    pub fn map_status(&self) -> MapStatus {
        lock(&self.map).status().clone()
    }

    /// Runs `f` against the map controller.
    pub fn with_map<R>(&self, f: impl FnOnce(&MapViewportController) -> R) -> R {
        f(&lock(&self.map))
    }

    /// Re-renders the map from the current state.
    pub fn refresh(&self) {
        let view = self.orchestrator.view();
        lock(&self.map).update(&view);
    }

    /// One keystroke in the city search box.
    pub async fn input_search(&self, text: &str) -> CitySuggestions {
        lock(&self.search_box).term = text.to_string();
        let suggestions = self.orchestrator.search_cities(text).await;

        let mut search_box = lock(&self.search_box);
        match &suggestions {
            CitySuggestions::Suggestions(cities) => {
                search_box.suggestions = cities.clone();
                search_box.show_suggestions = !cities.is_empty();
            }
            CitySuggestions::Clear => {
                search_box.suggestions.clear();
                search_box.show_suggestions = false;
            }
            CitySuggestions::Unchanged => {}
        }
        suggestions
    }

    /// Picks a suggestion and loads the city's points.
    pub async fn choose_suggestion(&self, city: City) -> Result<FetchOutcome> {
        let label = city.display_label();
        self.orchestrator.search_client().set_query(&label);
        {
            let mut search_box = lock(&self.search_box);
            search_box.term = label;
            search_box.suggestions.clear();
            search_box.show_suggestions = false;
        }

        let fetch = self.orchestrator.begin_city(city)?;
        // The cleared list and the recenter show while the fetch runs.
        self.refresh();
        let outcome = self.orchestrator.load_points(fetch, None).await;
        self.refresh();
        Ok(outcome)
    }

    /// Picks a point from the list or the map and saves it.
    pub async fn choose_point(&self, code: &str) -> Result<PersistOutcome> {
        let ticket = self.orchestrator.begin_selection(code)?;
        self.refresh();
        let outcome = self.orchestrator.persist(ticket).await;
        self.refresh();
        Ok(outcome)
    }

    pub fn set_filter(&self, text: &str) {
        self.orchestrator.set_filter_text(text);
        self.refresh();
    }

    /// Handles pending map gestures. Marker clicks and balloon selects choose
    /// the point; the other intents are returned for the host to show.
    pub async fn process_map_events(&self) -> Vec<MapIntent> {
        let intents = lock(&self.map).drain_intents();
        let mut unhandled = Vec::new();
        for intent in intents {
            match intent {
                MapIntent::PointChosen(point) => {
                    if let Err(e) = self.choose_point(&point.code).await {
                        log::warn!("map selection of {} ignored: {e}", point.code);
                    }
                }
                other => unhandled.push(other),
            }
        }
        unhandled
    }

    /// Waits for a deferred fit after a city recenter and applies it.
    pub async fn settle_map(&self) -> bool {
        let due = lock(&self.map).pending_fit_due();
        let Some(due) = due else {
            return false;
        };
        tokio::time::sleep_until(due).await;
        lock(&self.map).apply_due_fit(Instant::now())
    }

    /// Tears the selector down: pending search and fetch are abandoned and
    /// the map instance is released.
    pub fn unmount(self) {
        self.orchestrator.cancel_pending();
        lock(&self.map).destroy();
        log::info!("pickup selector unmounted");
    }
}

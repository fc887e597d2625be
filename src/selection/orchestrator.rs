//! The selector's state machine.

use super::{
    state::{FetchStatus, FetchTag, PersistStatus, SelectionState},
    view::SelectionView,
};
use crate::{
    api::{DeliveryUpdate, PointSearchRequest},
    constants::PERSIST_DELIVERY_TYPE,
    core::config::{MountContext, SelectorConfig},
    data::{City, PickupPoint},
    notify::Notification,
    runtime::lock,
    search::{GeoSearchClient, SearchOutcome},
    traits::{Notifier, SelectorBackend},
    Result, SelectorError,
};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};

const MSG_FETCH_POINTS_FAILED: &str = "Error fetching pickup points.";
const MSG_INITIAL_CITY_FAILED: &str = "Error searching for initial city.";
const MSG_CITY_SEARCH_FAILED: &str = "Error searching cities.";
const MSG_PERSISTED: &str = "Pickup point selected and order updated.";
const MSG_PERSIST_REJECTED: &str = "Failed to update order.";
const MSG_PERSIST_FAILED: &str = "Error saving selection.";

/// How a point fetch ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response was for the active city and is now in the state.
    Applied { count: usize, preselected: bool },
    /// The city changed while the fetch (or the startup lookup) was in
    /// flight; nothing was applied.
    Stale,
    /// The fetch failed; the user was notified and the list is empty.
    Failed { message: String },
    /// Startup only: the known city name matched nothing.
    CityNotFound,
}

/// A point fetch for the city that was just made active
#[derive(Debug)]
pub struct PointFetch {
    tag: FetchTag,
}

impl PointFetch {
    pub fn city_code(&self) -> &str {
        &self.tag.city_code
    }
}

/// A selection that has been applied and still needs saving
#[derive(Debug, Clone)]
pub struct PersistTicket {
    seq: u64,
    point: PickupPoint,
    city: Option<City>,
}

impl PersistTicket {
    pub fn point(&self) -> &PickupPoint {
        &self.point
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Persisted,
    /// Saving failed; the selection is kept.
    Failed(String),
    /// No order or city to save against.
    Skipped,
}

/// What the search box should show after a keystroke
#[derive(Debug, Clone, PartialEq)]
pub enum CitySuggestions {
    Suggestions(Vec<City>),
    Clear,
    /// Superseded or stale; keep whatever is shown.
    Unchanged,
}

/// Owns [`SelectionState`] and every transition on it.
///
/// Operations take `&self` and may run concurrently on one event loop. The
/// state lock is never held across a suspension point; each async operation
/// re-checks its tag after resuming and drops its result if it went stale.
pub struct SelectionOrchestrator {
    state: Mutex<SelectionState>,
    fetch_seq: AtomicU64,
    persist_seq: AtomicU64,
    backend: Arc<dyn SelectorBackend>,
    search: GeoSearchClient,
    notifier: Arc<dyn Notifier>,
    order_id: Option<i64>,
    carrier_id: Option<i64>,
    config: SelectorConfig,
}

impl SelectionOrchestrator {
    pub fn new(
        backend: Arc<dyn SelectorBackend>,
        notifier: Arc<dyn Notifier>,
        context: &MountContext,
        config: SelectorConfig,
    ) -> Self {
        Self {
            state: Mutex::new(SelectionState::default()),
            fetch_seq: AtomicU64::new(0),
            persist_seq: AtomicU64::new(0),
            search: GeoSearchClient::new(backend.clone(), &config.search),
            backend,
            notifier,
            order_id: context.order_id,
            carrier_id: context.carrier_id,
            config,
        }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn search_client(&self) -> &GeoSearchClient {
        &self.search
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> SelectionState {
        lock(&self.state).clone()
    }

    /// The derived list and marker view of the current state.
    pub fn view(&self) -> SelectionView {
        SelectionView::derive(&lock(&self.state), &self.config.markers)
    }

    fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }

    /// Makes `city` the active city and loads its points.
    ///
    /// The list, selection, and filter are cleared before the fetch starts.
    /// If `preselect` names a point in the response it becomes the selection
    /// (without being persisted again).
    pub async fn select_city(&self, city: City, preselect: Option<&str>) -> Result<FetchOutcome> {
        let fetch = self.begin_city(city)?;
        Ok(self.load_points(fetch, preselect).await)
    }

    /// The synchronous half of [`Self::select_city`]: switches the state to
    /// `city` and returns the fetch that must be awaited next.
    ///
    /// # Errors
    ///
    /// [`SelectorError::InvalidCity`] for a city without a code; the state
    /// is left untouched.
    pub fn begin_city(&self, city: City) -> Result<PointFetch> {
        if city.code.trim().is_empty() {
            return Err(SelectorError::InvalidCity(city.name));
        }

        let tag = FetchTag {
            city_code: city.code.clone(),
            seq: self.fetch_seq.fetch_add(1, Ordering::SeqCst) + 1,
        };
        log::info!("city selected: {} ({})", city.name, city.code);
        lock(&self.state).reset_for_city(city, tag.clone());
        Ok(PointFetch { tag })
    }

    /// Fetches the points for a city switched to by [`Self::begin_city`].
    /// The response is applied only if that city is still the active one.
    pub async fn load_points(&self, fetch: PointFetch, preselect: Option<&str>) -> FetchOutcome {
        let tag = fetch.tag;
        let request = PointSearchRequest {
            city_code: tag.city_code.clone(),
            delivery_type: self.config.search.point_delivery_type.clone(),
            limit: self.config.search.point_limit,
        };
        let result = self.backend.search_points(&request).await;

        let mut state = lock(&self.state);
        if !state.is_active_fetch(&tag) {
            log::debug!(
                "discarding stale point list for {} (fetch #{})",
                tag.city_code,
                tag.seq
            );
            return FetchOutcome::Stale;
        }
        state.active_fetch = None;

        match result {
            Ok(points) => {
                let preselected = preselect
                    .and_then(|code| points.iter().find(|p| p.code == code))
                    .cloned();
                let outcome = FetchOutcome::Applied {
                    count: points.len(),
                    preselected: preselected.is_some(),
                };
                log::debug!("{} pickup points for {}", points.len(), tag.city_code);
                state.available_points = points;
                state.selected_point = preselected;
                state.points_status = FetchStatus::Loaded;
                outcome
            }
            Err(e) => {
                log::error!("point search for {} failed: {e}", tag.city_code);
                state.available_points.clear();
                state.points_status = FetchStatus::Failed;
                drop(state);

                let message = user_message(&e, MSG_FETCH_POINTS_FAILED);
                self.notify(Notification::danger(message.clone()));
                FetchOutcome::Failed { message }
            }
        }
    }

    /// Applies the selection of `code` right away and hands back the ticket
    /// for saving it.
    ///
    /// # Errors
    ///
    /// [`SelectorError::PointNotAvailable`] if `code` is not among the
    /// available points; the state is left untouched.
    pub fn begin_selection(&self, code: &str) -> Result<PersistTicket> {
        let mut state = lock(&self.state);
        let point = state
            .find_point(code)
            .cloned()
            .ok_or_else(|| SelectorError::PointNotAvailable(code.to_string()))?;

        state.selected_point = Some(point.clone());
        state.persist = PersistStatus::Idle;
        let seq = self.persist_seq.fetch_add(1, Ordering::SeqCst) + 1;
        log::info!("pickup point selected: {}", point.code);

        Ok(PersistTicket {
            seq,
            point,
            city: state.selected_city.clone(),
        })
    }

    /// Saves a selection on the order. A failure is notified and recorded;
    /// the selection itself stays.
    pub async fn persist(&self, ticket: PersistTicket) -> PersistOutcome {
        let (Some(order_id), Some(carrier_id), Some(city)) =
            (self.order_id, self.carrier_id, ticket.city.as_ref())
        else {
            log::debug!("no order context, selection of {} not saved", ticket.point.code);
            return PersistOutcome::Skipped;
        };

        self.set_persist_status(ticket.seq, PersistStatus::Persisting);
        let update = DeliveryUpdate {
            order_id,
            carrier_id,
            delivery_type: PERSIST_DELIVERY_TYPE.to_string(),
            city_code: city.code.clone(),
            city_name: city.name.clone(),
            point_code: ticket.point.code.clone(),
            point_address: ticket.point.full_address().to_string(),
        };

        match self.backend.update_delivery(&update).await {
            Ok(()) => {
                self.set_persist_status(ticket.seq, PersistStatus::Persisted);
                self.notify(Notification::success(MSG_PERSISTED));
                PersistOutcome::Persisted
            }
            Err(e) => {
                log::error!("saving pickup point {} failed: {e}", ticket.point.code);
                let fallback = if e.is_transport() {
                    MSG_PERSIST_FAILED
                } else {
                    MSG_PERSIST_REJECTED
                };
                let message = user_message(&e, fallback);
                self.set_persist_status(ticket.seq, PersistStatus::Failed(message.clone()));
                self.notify(Notification::danger(message.clone()));
                PersistOutcome::Failed(message)
            }
        }
    }

    /// Only the latest selection's save may move the persist status.
    fn set_persist_status(&self, seq: u64, status: PersistStatus) {
        if self.persist_seq.load(Ordering::SeqCst) != seq {
            log::debug!("save #{seq} superseded, status {status:?} not recorded");
            return;
        }
        lock(&self.state).persist = status;
    }

    /// Selects `code` and saves it.
    pub async fn select_point(&self, code: &str) -> Result<PersistOutcome> {
        let ticket = self.begin_selection(code)?;
        Ok(self.persist(ticket).await)
    }

    pub fn set_filter_text(&self, text: &str) {
        lock(&self.state).filter_text = text.to_string();
    }

    /// Resolves a city known from the shipping address and loads its points,
    /// restoring the saved point if it is still offered.
    ///
    /// A city the user picked during the lookup wins. A top match without a
    /// code counts as no match.
    pub async fn initialize_from_known_city(
        &self,
        city_name: &str,
        preselect: Option<&str>,
    ) -> Result<FetchOutcome> {
        lock(&self.state).cities_loading = true;
        let resolved = self
            .search
            .resolve_top(city_name, self.config.search.initial_city_limit)
            .await;
        lock(&self.state).cities_loading = false;

        let chosen = lock(&self.state)
            .selected_city
            .as_ref()
            .map(|c| c.code.clone());
        if let Some(code) = chosen {
            log::debug!("known city {city_name:?} resolved after {code} was chosen, not restored");
            return Ok(FetchOutcome::Stale);
        }

        match resolved {
            Ok(Some(city)) if !city.code.trim().is_empty() => {
                self.select_city(city, preselect).await
            }
            Ok(Some(_)) | Ok(None) => {
                log::warn!("known city {city_name:?} did not match any city");
                Ok(FetchOutcome::CityNotFound)
            }
            Err(e) => {
                log::error!("resolving known city {city_name:?} failed: {e}");
                let message = user_message(&e, MSG_INITIAL_CITY_FAILED);
                self.notify(Notification::danger(message.clone()));
                Ok(FetchOutcome::Failed { message })
            }
        }
    }

    /// One keystroke in the city search box.
    pub async fn search_cities(&self, query: &str) -> CitySuggestions {
        match self.search.search(query).await {
            Ok(SearchOutcome::TooShort) => CitySuggestions::Clear,
            Ok(SearchOutcome::Superseded) | Ok(SearchOutcome::Stale { .. }) => {
                CitySuggestions::Unchanged
            }
            Ok(SearchOutcome::Cities { cities, .. }) => CitySuggestions::Suggestions(cities),
            Err(e) => {
                log::error!("city search {query:?} failed: {e}");
                if e.is_transport() {
                    self.notify(Notification::danger(MSG_CITY_SEARCH_FAILED));
                } else {
                    self.notify(Notification::warning(user_message(&e, MSG_CITY_SEARCH_FAILED)));
                }
                CitySuggestions::Clear
            }
        }
    }

    /// Cancels the pending search and orphans any in-flight point fetch.
    pub fn cancel_pending(&self) {
        self.search.cancel();
        let mut state = lock(&self.state);
        if state.active_fetch.take().is_some() && state.points_loading() {
            state.points_status = FetchStatus::NotStarted;
        }
    }
}

/// The backend's own message for application errors, `fallback` otherwise.
fn user_message(error: &SelectorError, fallback: &str) -> String {
    match error {
        SelectorError::Search(message) | SelectorError::Persist(message)
            if !message.trim().is_empty() =>
        {
            message.clone()
        }
        _ => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotificationKind;
    use async_trait::async_trait;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Notification>>);

    impl Notifier for Recorder {
        fn notify(&self, notification: Notification) {
            lock(&self.0).push(notification);
        }
    }

    #[derive(Default)]
    struct FixedBackend {
        fail_points: bool,
        reject_update: bool,
        updates: Mutex<Vec<DeliveryUpdate>>,
    }

    #[async_trait]
    impl SelectorBackend for FixedBackend {
        async fn search_cities(&self, query: &str, _limit: u32) -> Result<Vec<City>> {
            if query == "Нигде" {
                return Ok(Vec::new());
            }
            if query == "Безымянный" {
                return Ok(vec![City::new("", "Безымянный")]);
            }
            Ok(vec![City::new("MOW", "Москва").with_coords(55.75, 37.62)])
        }

        async fn search_points(&self, request: &PointSearchRequest) -> Result<Vec<PickupPoint>> {
            if self.fail_points {
                return Err(SelectorError::Search("CDEK API is unavailable.".into()));
            }
            Ok(vec![
                PickupPoint::new(format!("{}1", request.city_code), "Тверская")
                    .with_coords(55.76, 37.60)
                    .with_address("ул. Тверская, 1"),
                PickupPoint::new(format!("{}2", request.city_code), "Арбат").with_coords(55.74, 37.58),
            ])
        }

        async fn map_api_key(&self) -> Result<Option<String>> {
            Ok(None)
        }

        async fn update_delivery(&self, update: &DeliveryUpdate) -> Result<()> {
            lock(&self.updates).push(update.clone());
            if self.reject_update {
                return Err(SelectorError::Search("Invalid carrier.".into()));
            }
            Ok(())
        }
    }

    fn context() -> MountContext {
        MountContext {
            order_id: Some(7),
            carrier_id: Some(3),
            ..Default::default()
        }
    }

    fn orchestrator(backend: FixedBackend) -> (SelectionOrchestrator, Arc<FixedBackend>, Arc<Recorder>) {
        let backend = Arc::new(backend);
        let recorder = Arc::new(Recorder::default());
        let orchestrator = SelectionOrchestrator::new(
            backend.clone(),
            recorder.clone(),
            &context(),
            SelectorConfig::default(),
        );
        (orchestrator, backend, recorder)
    }

    fn moscow() -> City {
        City::new("MOW", "Москва").with_coords(55.75, 37.62)
    }

    #[tokio::test]
    async fn test_select_city_loads_points() {
        let (orch, _, _) = orchestrator(FixedBackend::default());
        let outcome = orch.select_city(moscow(), None).await.unwrap();

        assert_eq!(outcome, FetchOutcome::Applied { count: 2, preselected: false });
        let state = orch.snapshot();
        assert_eq!(state.points_status, FetchStatus::Loaded);
        assert!(state.selected_point.is_none());
    }

    #[tokio::test]
    async fn test_empty_city_code_is_rejected() {
        let (orch, _, _) = orchestrator(FixedBackend::default());
        let err = orch.select_city(City::new("", "Москва"), None).await.unwrap_err();
        assert!(matches!(err, SelectorError::InvalidCity(_)));
        assert!(orch.snapshot().selected_city.is_none());
    }

    #[tokio::test]
    async fn test_fetch_failure_notifies_backend_message() {
        let (orch, _, recorder) = orchestrator(FixedBackend {
            fail_points: true,
            ..Default::default()
        });
        let outcome = orch.select_city(moscow(), None).await.unwrap();

        assert!(matches!(outcome, FetchOutcome::Failed { .. }));
        assert_eq!(orch.snapshot().points_status, FetchStatus::Failed);
        let notes = lock(&recorder.0);
        assert_eq!(notes[0].kind, NotificationKind::Danger);
        assert_eq!(notes[0].message, "CDEK API is unavailable.");
    }

    #[tokio::test]
    async fn test_unknown_point_is_rejected_without_change() {
        let (orch, _, _) = orchestrator(FixedBackend::default());
        orch.select_city(moscow(), None).await.unwrap();

        let err = orch.begin_selection("P404").unwrap_err();
        assert!(matches!(err, SelectorError::PointNotAvailable(_)));
        assert!(orch.snapshot().selected_point.is_none());
    }

    #[tokio::test]
    async fn test_select_point_persists_with_full_payload() {
        let (orch, backend, recorder) = orchestrator(FixedBackend::default());
        orch.select_city(moscow(), None).await.unwrap();

        let outcome = orch.select_point("MOW1").await.unwrap();
        assert_eq!(outcome, PersistOutcome::Persisted);

        let updates = lock(&backend.updates);
        assert_eq!(updates[0].order_id, 7);
        assert_eq!(updates[0].carrier_id, 3);
        assert_eq!(updates[0].delivery_type, "pvz");
        assert_eq!(updates[0].city_name, "Москва");
        assert_eq!(updates[0].point_address, "ул. Тверская, 1");
        assert_eq!(lock(&recorder.0)[0].message, MSG_PERSISTED);
    }

    #[tokio::test]
    async fn test_rejected_save_keeps_selection() {
        let (orch, _, recorder) = orchestrator(FixedBackend {
            reject_update: true,
            ..Default::default()
        });
        orch.select_city(moscow(), None).await.unwrap();

        let outcome = orch.select_point("MOW2").await.unwrap();
        assert_eq!(outcome, PersistOutcome::Failed("Invalid carrier.".into()));

        let state = orch.snapshot();
        assert_eq!(state.selected_point.unwrap().code, "MOW2");
        assert_eq!(state.persist, PersistStatus::Failed("Invalid carrier.".into()));
        assert_eq!(lock(&recorder.0)[0].kind, NotificationKind::Danger);
    }

    #[tokio::test]
    async fn test_without_order_nothing_is_saved() {
        let backend = Arc::new(FixedBackend::default());
        let orch = SelectionOrchestrator::new(
            backend.clone(),
            Arc::new(Recorder::default()),
            &MountContext {
                carrier_id: Some(3),
                ..Default::default()
            },
            SelectorConfig::default(),
        );
        orch.select_city(moscow(), None).await.unwrap();

        assert_eq!(orch.select_point("MOW1").await.unwrap(), PersistOutcome::Skipped);
        assert!(lock(&backend.updates).is_empty());
        assert_eq!(orch.snapshot().selected_point.unwrap().code, "MOW1");
    }

    #[tokio::test]
    async fn test_known_city_restores_saved_point() {
        let (orch, backend, _) = orchestrator(FixedBackend::default());
        let outcome = orch
            .initialize_from_known_city("Москва", Some("MOW2"))
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::Applied { count: 2, preselected: true });
        let state = orch.snapshot();
        assert_eq!(state.selected_point.unwrap().code, "MOW2");
        assert!(!state.cities_loading);
        assert!(lock(&backend.updates).is_empty());
    }

    #[tokio::test]
    async fn test_known_city_not_found() {
        let (orch, _, _) = orchestrator(FixedBackend::default());
        let outcome = orch.initialize_from_known_city("Нигде", None).await.unwrap();
        assert_eq!(outcome, FetchOutcome::CityNotFound);
        assert!(orch.snapshot().selected_city.is_none());
    }

    #[tokio::test]
    async fn test_filter_keeps_selection() {
        let (orch, _, _) = orchestrator(FixedBackend::default());
        orch.select_city(moscow(), None).await.unwrap();
        orch.begin_selection("MOW1").unwrap();

        orch.set_filter_text("арбат");
        let view = orch.view();
        assert_eq!(view.points.len(), 1);
        assert_eq!(view.selected_code(), Some("MOW1"));
    }

    #[tokio::test]
    async fn test_known_city_without_code_is_not_found() {
        let (orch, backend, recorder) = orchestrator(FixedBackend::default());
        let outcome = orch
            .initialize_from_known_city("Безымянный", Some("MOW1"))
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::CityNotFound);
        let state = orch.snapshot();
        assert!(state.selected_city.is_none());
        assert!(!state.cities_loading);
        assert!(lock(&backend.updates).is_empty());
        assert!(lock(&recorder.0).is_empty());
    }

    #[tokio::test]
    async fn test_known_city_does_not_override_chosen_city() {
        let (orch, _, _) = orchestrator(FixedBackend::default());
        orch.select_city(City::new("SPB", "Санкт-Петербург"), None)
            .await
            .unwrap();

        let outcome = orch
            .initialize_from_known_city("Москва", Some("MOW1"))
            .await
            .unwrap();

        assert_eq!(outcome, FetchOutcome::Stale);
        let state = orch.snapshot();
        assert_eq!(state.selected_city.unwrap().code, "SPB");
        assert!(state.selected_point.is_none());
    }
}

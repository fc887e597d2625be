//! End-to-end flows through `PickupSelector` with a scripted backend and
//! the headless map.
//!
//! Point fetches can be held back per city with a gate, which is how the
//! out-of-order response scenarios are staged.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

use pickup_map::api::{DeliveryUpdate, PointSearchRequest};
use pickup_map::core::config::{MountContext, SelectorConfig};
use pickup_map::map::headless::{HeadlessFailures, HeadlessMapService};
use pickup_map::notify::{Notification, NotificationKind};
use pickup_map::selection::{CitySuggestions, FetchOutcome, PersistOutcome, SelectionPhase};
use pickup_map::traits::{Notifier, SelectorBackend};
use pickup_map::{
    City, ErrorKind, LatLng, MapIntent, MapStatus, PickupPoint, PickupSelector, Result,
    SelectorError, ViewportPlan,
};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ScriptedBackend {
    cities: HashMap<String, Vec<City>>,
    points: HashMap<String, Vec<PickupPoint>>,
    map_key: Option<String>,
    fail_update: bool,
    city_latency: Duration,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    city_queries: Mutex<Vec<String>>,
    point_requests: Mutex<Vec<String>>,
    updates: Mutex<Vec<DeliveryUpdate>>,
}

impl ScriptedBackend {
    /// Holds the next point fetch for `city_code` until the returned sender fires.
    fn gate(&self, city_code: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(city_code.to_string(), rx);
        tx
    }

    fn city_queries(&self) -> Vec<String> {
        self.city_queries.lock().unwrap().clone()
    }

    fn point_requests(&self) -> Vec<String> {
        self.point_requests.lock().unwrap().clone()
    }

    fn updates(&self) -> Vec<DeliveryUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl SelectorBackend for ScriptedBackend {
    async fn search_cities(&self, query: &str, _limit: u32) -> Result<Vec<City>> {
        self.city_queries.lock().unwrap().push(query.to_string());
        if !self.city_latency.is_zero() {
            tokio::time::sleep(self.city_latency).await;
        }
        Ok(self.cities.get(query).cloned().unwrap_or_default())
    }

    async fn search_points(&self, request: &PointSearchRequest) -> Result<Vec<PickupPoint>> {
        self.point_requests
            .lock()
            .unwrap()
            .push(request.city_code.clone());
        let gate = self.gates.lock().unwrap().remove(&request.city_code);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(self
            .points
            .get(&request.city_code)
            .cloned()
            .unwrap_or_default())
    }

    async fn map_api_key(&self) -> Result<Option<String>> {
        Ok(self.map_key.clone())
    }

    async fn update_delivery(&self, update: &DeliveryUpdate) -> Result<()> {
        self.updates.lock().unwrap().push(update.clone());
        if self.fail_update {
            return Err(SelectorError::Search("Order not found.".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingNotifier(Mutex<Vec<Notification>>);

impl RecordingNotifier {
    fn all(&self) -> Vec<Notification> {
        self.0.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.0.lock().unwrap().push(notification);
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn moscow() -> City {
    City::new("MOW", "Moscow").with_coords(55.75, 37.62)
}

fn petersburg() -> City {
    City::new("SPB", "Saint Petersburg").with_coords(59.93, 30.33)
}

fn backend() -> ScriptedBackend {
    let mut backend = ScriptedBackend {
        map_key: Some("test-key".into()),
        ..Default::default()
    };
    backend.cities.insert("Moscow".into(), vec![moscow()]);
    backend.cities.insert("Saint".into(), vec![petersburg()]);
    backend.points.insert(
        "MOW".into(),
        vec![PickupPoint::new("P1", "Tverskaya")
            .with_coords(55.7, 37.6)
            .with_address("Tverskaya 1")],
    );
    backend.points.insert(
        "SPB".into(),
        vec![
            PickupPoint::new("S1", "Nevsky").with_coords(59.93, 30.34),
            PickupPoint::new("S2", "Vasilievsky").with_coords(59.94, 30.27),
            PickupPoint::new("S3", "No coordinates"),
        ],
    );
    backend
}

fn context() -> MountContext {
    MountContext {
        order_id: Some(42),
        carrier_id: Some(7),
        ..Default::default()
    }
}

struct Harness {
    selector: PickupSelector,
    backend: Arc<ScriptedBackend>,
    notifier: Arc<RecordingNotifier>,
    map: HeadlessMapService,
}

async fn mount_with(backend: ScriptedBackend, map: HeadlessMapService, context: MountContext) -> Harness {
    let backend = Arc::new(backend);
    let notifier = Arc::new(RecordingNotifier::default());
    let selector = PickupSelector::mount(
        context,
        backend.clone(),
        Some(&map),
        notifier.clone(),
        SelectorConfig::default(),
    )
    .await
    .expect("mount should succeed");
    Harness {
        selector,
        backend,
        notifier,
        map,
    }
}

async fn mount(backend: ScriptedBackend) -> Harness {
    mount_with(backend, HeadlessMapService::new(), context()).await
}

/// Lets spawned tasks run until `done` holds.
async fn run_until(mut done: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never reached");
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn typing_burst_sends_one_query_after_quiet_window() {
    let h = mount(backend()).await;

    let (a, b, c) = futures::join!(
        h.selector.input_search("Mo"),
        async {
            tokio::time::sleep(Duration::from_millis(120)).await;
            h.selector.input_search("Mosc").await
        },
        async {
            tokio::time::sleep(Duration::from_millis(240)).await;
            h.selector.input_search("Moscow").await
        },
    );

    assert_eq!(a, CitySuggestions::Unchanged);
    assert_eq!(b, CitySuggestions::Unchanged);
    assert_eq!(c, CitySuggestions::Suggestions(vec![moscow()]));
    assert_eq!(h.backend.city_queries(), vec!["Moscow".to_string()]);

    let search_box = h.selector.search_box();
    assert!(search_box.show_suggestions);
    assert_eq!(search_box.term, "Moscow");
}

#[tokio::test(start_paused = true)]
async fn single_character_clears_suggestions_without_request() {
    let h = mount(backend()).await;

    h.selector.input_search("Moscow").await;
    assert!(h.selector.search_box().show_suggestions);

    assert_eq!(h.selector.input_search("M").await, CitySuggestions::Clear);
    assert!(!h.selector.search_box().show_suggestions);
    assert_eq!(h.backend.city_queries().len(), 1);
}

// ---------------------------------------------------------------------------
// City and point selection
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn moscow_search_to_single_unselected_marker() {
    let h = mount(backend()).await;

    let CitySuggestions::Suggestions(cities) = h.selector.input_search("Moscow").await else {
        panic!("expected suggestions");
    };
    let outcome = h.selector.choose_suggestion(cities[0].clone()).await.unwrap();

    assert_eq!(outcome, FetchOutcome::Applied { count: 1, preselected: false });
    let view = h.selector.view();
    assert_eq!(view.points.len(), 1);
    assert_eq!(view.phase, SelectionPhase::PointsLoaded);
    assert_eq!(h.backend.point_requests(), vec!["MOW".to_string()]);

    let markers = h.map.last_map().unwrap().markers();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].id, "P1");
    assert!(!markers[0].selected);
    assert_eq!(h.selector.search_box().term, "Moscow");
}

#[tokio::test(start_paused = true)]
async fn city_change_clears_list_selection_and_filter_immediately() {
    let h = mount(backend()).await;
    h.selector.choose_suggestion(moscow()).await.unwrap();
    h.selector.choose_point("P1").await.unwrap();
    h.selector.set_filter("tver");

    let orchestrator = h.selector.orchestrator();
    let _release = h.backend.gate("SPB");
    let _fetch = orchestrator.begin_city(petersburg()).unwrap();

    let state = orchestrator.snapshot();
    assert_eq!(state.selected_city.as_ref().unwrap().code, "SPB");
    assert!(state.available_points.is_empty());
    assert!(state.selected_point.is_none());
    assert!(state.filter_text.is_empty());
    assert!(state.points_loading());
}

#[tokio::test(start_paused = true)]
async fn late_response_for_previous_city_is_discarded() {
    let h = mount(backend()).await;
    let orchestrator = h.selector.orchestrator().clone();
    let release_mow = h.backend.gate("MOW");
    let release_spb = h.backend.gate("SPB");

    let mow = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.select_city(moscow(), None).await }
    });
    run_until(|| h.backend.point_requests().contains(&"MOW".to_string())).await;

    let spb = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.select_city(petersburg(), None).await }
    });
    run_until(|| h.backend.point_requests().contains(&"SPB".to_string())).await;

    // MOW answers first, after the switch: dropped.
    release_mow.send(()).unwrap();
    assert_eq!(mow.await.unwrap().unwrap(), FetchOutcome::Stale);
    let state = orchestrator.snapshot();
    assert_eq!(state.selected_city.as_ref().unwrap().code, "SPB");
    assert!(state.available_points.is_empty());

    release_spb.send(()).unwrap();
    assert!(matches!(
        spb.await.unwrap().unwrap(),
        FetchOutcome::Applied { count: 3, .. }
    ));
    let codes: Vec<_> = orchestrator
        .snapshot()
        .available_points
        .into_iter()
        .map(|p| p.code)
        .collect();
    assert_eq!(codes, vec!["S1", "S2", "S3"]);
}

#[tokio::test(start_paused = true)]
async fn selection_survives_failed_save() {
    let mut backend = backend();
    backend.fail_update = true;
    let h = mount(backend).await;
    h.selector.choose_suggestion(moscow()).await.unwrap();

    let ticket = h.selector.orchestrator().begin_selection("P1").unwrap();
    assert_eq!(
        h.selector.view().selected_code(),
        Some("P1"),
        "selection applies before the save"
    );

    let outcome = h.selector.orchestrator().persist(ticket).await;
    assert_eq!(outcome, PersistOutcome::Failed("Order not found.".into()));

    let view = h.selector.view();
    assert_eq!(view.selected_code(), Some("P1"));
    assert_eq!(view.phase, SelectionPhase::PersistFailed);

    let notes = h.notifier.all();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, NotificationKind::Danger);
    assert_eq!(notes[0].message, "Order not found.");
}

#[tokio::test(start_paused = true)]
async fn successful_save_writes_order_and_notifies() {
    let h = mount(backend()).await;
    h.selector.choose_suggestion(moscow()).await.unwrap();

    let outcome = h.selector.choose_point("P1").await.unwrap();
    assert_eq!(outcome, PersistOutcome::Persisted);

    let updates = h.backend.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].order_id, 42);
    assert_eq!(updates[0].carrier_id, 7);
    assert_eq!(updates[0].city_code, "MOW");
    assert_eq!(updates[0].point_code, "P1");
    assert_eq!(updates[0].point_address, "Tverskaya 1");
    assert_eq!(h.notifier.all()[0].kind, NotificationKind::Success);
    assert_eq!(h.selector.view().phase, SelectionPhase::Persisted);
}

#[tokio::test(start_paused = true)]
async fn unknown_point_is_rejected() {
    let h = mount(backend()).await;
    h.selector.choose_suggestion(moscow()).await.unwrap();

    let err = h.selector.choose_point("S1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert!(h.selector.view().selected.is_none());
    assert!(h.backend.updates().is_empty());
}

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn single_selected_point_centers_close() {
    let h = mount(backend()).await;
    h.selector.choose_suggestion(moscow()).await.unwrap();
    h.selector.choose_point("P1").await.unwrap();

    let map = h.map.last_map().unwrap();
    assert_eq!(map.center(), LatLng::new(55.7, 37.6));
    assert_eq!(map.zoom(), 15.0);
}

#[tokio::test(start_paused = true)]
async fn empty_city_centers_on_city_at_initial_zoom() {
    let mut backend = backend();
    backend.points.insert("MOW".into(), Vec::new());
    let h = mount(backend).await;

    h.selector.choose_suggestion(moscow()).await.unwrap();

    let map = h.map.last_map().unwrap();
    assert_eq!(map.center(), LatLng::new(55.75, 37.62));
    assert_eq!(map.zoom(), 12.0);
    assert_eq!(
        h.selector.view().empty_message(),
        Some("No pickup points found for this city.")
    );
}

#[tokio::test(start_paused = true)]
async fn chosen_city_points_are_fitted() {
    let h = mount(backend()).await;
    h.selector.choose_suggestion(petersburg()).await.unwrap();

    let map = h.map.last_map().unwrap();
    assert_eq!(
        map.markers().len(),
        2,
        "the point without coordinates stays list-only"
    );

    // The empty list shown while loading already recentered on the city, so
    // the arriving points are fitted right away.
    assert!(matches!(
        h.selector.with_map(|m| m.last_plan().clone()),
        ViewportPlan::Fit { margin, .. } if margin == 35.0
    ));
    assert!(!h.selector.settle_map().await);

    let center = map.center();
    assert!((59.93..=59.94).contains(&center.lat), "center {center:?}");
    assert!((30.27..=30.34).contains(&center.lng), "center {center:?}");
    assert!(map.zoom() > 12.0);
}

#[tokio::test(start_paused = true)]
async fn restored_city_recenters_then_fits_after_settle() {
    let mut ctx = context();
    ctx.partner_shipping_city = Some("Saint".into());
    ctx.current_point_code = Some("S1".into());
    let h = mount_with(backend(), HeadlessMapService::new(), ctx).await;

    let map = h.map.last_map().unwrap();
    assert!(matches!(
        h.selector.with_map(|m| m.last_plan().clone()),
        ViewportPlan::CenterThenFit { .. }
    ));
    assert_eq!(map.center(), LatLng::new(59.93, 30.33));
    assert_eq!(map.zoom(), 12.0);

    assert!(h.selector.settle_map().await);
    assert!(map.zoom() > 12.0);
    let center = map.center();
    assert!((30.27..=30.34).contains(&center.lng), "center {center:?}");
}

#[tokio::test(start_paused = true)]
async fn marker_click_and_balloon_select_choose_point() {
    let h = mount(backend()).await;
    h.selector.choose_suggestion(petersburg()).await.unwrap();
    let map = h.map.last_map().unwrap();

    assert!(map.click_marker("S2"));
    let unhandled = h.selector.process_map_events().await;
    assert!(unhandled.is_empty());
    assert_eq!(h.selector.view().selected_code(), Some("S2"));

    assert!(map.select_from_balloon("S1"));
    h.selector.process_map_events().await;
    assert_eq!(h.selector.view().selected_code(), Some("S1"));
    assert_eq!(h.backend.updates().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn cluster_click_inspects_without_zoom() {
    let mut backend = backend();
    backend.points.insert(
        "MOW".into(),
        vec![
            PickupPoint::new("P1", "a").with_coords(55.7512, 37.6201),
            PickupPoint::new("P2", "b").with_coords(55.7512, 37.6201),
        ],
    );
    let h = mount(backend).await;
    h.selector.choose_suggestion(moscow()).await.unwrap();
    h.selector.settle_map().await;

    let map = h.map.last_map().unwrap();
    let clusters = map.clusters();
    assert_eq!(clusters.len(), 1);
    let zoom = map.zoom();

    assert!(map.click_cluster(&clusters[0].id));
    let unhandled = h.selector.process_map_events().await;

    assert_eq!(map.zoom(), zoom);
    assert!(matches!(
        &unhandled[..],
        [MapIntent::ClusterInspected { points, .. }] if points.len() == 2
    ));
    assert!(h.selector.view().selected.is_none());
}

#[tokio::test(start_paused = true)]
async fn missing_key_leaves_list_working() {
    let mut backend = backend();
    backend.map_key = None;
    let h = mount(backend).await;

    assert!(matches!(h.selector.map_status(), MapStatus::LoadFailed(_)));
    assert!(h.map.loaded_from().is_none());

    h.selector.choose_suggestion(moscow()).await.unwrap();
    assert_eq!(
        h.selector.choose_point("P1").await.unwrap(),
        PersistOutcome::Persisted
    );
}

#[tokio::test(start_paused = true)]
async fn map_construction_failure_leaves_list_working() {
    let map = HeadlessMapService::new().with_failures(HeadlessFailures {
        create: true,
        ..Default::default()
    });
    let h = mount_with(backend(), map, context()).await;

    assert!(matches!(h.selector.map_status(), MapStatus::InitFailed(_)));
    h.selector.choose_suggestion(moscow()).await.unwrap();
    assert_eq!(h.selector.view().points.len(), 1);
}

// ---------------------------------------------------------------------------
// Mount and unmount
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mount_without_carrier_is_config_missing() {
    let map = HeadlessMapService::new();
    let result = PickupSelector::mount(
        MountContext {
            order_id: Some(42),
            ..Default::default()
        },
        Arc::new(backend()),
        Some(&map),
        Arc::new(RecordingNotifier::default()),
        SelectorConfig::default(),
    )
    .await;

    let err = result.err().expect("mount must fail");
    assert_eq!(err.kind(), ErrorKind::ConfigMissing);
    assert_eq!(map.created_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn mount_restores_saved_point() {
    let mut ctx = context();
    ctx.partner_shipping_city = Some("Moscow".into());
    ctx.current_point_code = Some("P1".into());

    let h = mount_with(backend(), HeadlessMapService::new(), ctx).await;

    let view = h.selector.view();
    assert_eq!(view.city.as_ref().unwrap().code, "MOW");
    assert_eq!(view.selected_code(), Some("P1"));
    assert!(h.backend.updates().is_empty(), "restoring is not a new save");
    assert_eq!(h.selector.search_box().term, "Moscow");
    assert!(h.map.last_map().unwrap().markers()[0].selected);
}

#[tokio::test(start_paused = true)]
async fn unmount_releases_map_once() {
    let h = mount(backend()).await;
    let map = h.map.last_map().unwrap();

    h.selector.unmount();
    assert_eq!(map.destroy_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn unmount_cancels_pending_search() {
    let h = mount(backend()).await;
    let orchestrator = h.selector.orchestrator().clone();

    let pending = tokio::spawn(async move { orchestrator.search_cities("Moscow").await });
    run_until(|| h.selector.orchestrator().search_client().current_query() == "Moscow").await;

    h.selector.unmount();
    assert_eq!(pending.await.unwrap(), CitySuggestions::Unchanged);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.backend.city_queries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn choosing_a_city_discards_in_flight_suggestions() {
    let mut backend = backend();
    backend.city_latency = Duration::from_millis(1_000);
    let h = mount(backend).await;

    let (outcome, chosen) = futures::join!(h.selector.input_search("Moscow"), async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        h.selector.choose_suggestion(petersburg()).await
    });

    assert!(matches!(chosen.unwrap(), FetchOutcome::Applied { count: 3, .. }));
    assert_eq!(outcome, CitySuggestions::Unchanged);
    assert_eq!(h.backend.city_queries(), vec!["Moscow".to_string()]);

    let search_box = h.selector.search_box();
    assert_eq!(search_box.term, "Saint Petersburg");
    assert!(!search_box.show_suggestions);
    assert!(search_box.suggestions.is_empty());
    assert_eq!(h.selector.view().city.unwrap().code, "SPB");
}

#[tokio::test(start_paused = true)]
async fn mount_survives_known_city_without_code() {
    let mut backend = backend();
    backend
        .cities
        .insert("Nowhere".into(), vec![City::new("", "Nowhere")]);
    let mut ctx = context();
    ctx.partner_shipping_city = Some("Nowhere".into());
    ctx.current_point_code = Some("P1".into());

    let h = mount_with(backend, HeadlessMapService::new(), ctx).await;

    let view = h.selector.view();
    assert!(view.city.is_none());
    assert!(view.selected.is_none());
    assert!(h.backend.point_requests().is_empty());
    assert!(h.selector.map_status().is_ready());
}

#[tokio::test(start_paused = true)]
async fn late_known_city_lookup_yields_to_chosen_city() {
    let mut backend = backend();
    backend.city_latency = Duration::from_millis(1_000);
    let h = mount(backend).await;
    let orchestrator = h.selector.orchestrator();

    let (restored, chosen) = futures::join!(
        orchestrator.initialize_from_known_city("Saint", Some("S1")),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            h.selector.choose_suggestion(moscow()).await
        }
    );

    assert!(matches!(chosen.unwrap(), FetchOutcome::Applied { count: 1, .. }));
    assert_eq!(restored.unwrap(), FetchOutcome::Stale);
    let view = h.selector.view();
    assert_eq!(view.city.unwrap().code, "MOW");
    assert!(view.selected.is_none());
    assert_eq!(h.backend.point_requests(), vec!["MOW".to_string()]);
}

//! Owns the map widget instance for one mount.

use super::{
    marker::MarkerRecord,
    policy::{plan_viewport, PolicyInput, ViewportPlan},
    FitOptions, MapEvent, MapInitOptions,
};
use crate::{
    constants::MAP_CONTROLS,
    core::{config::SelectorConfig, geo::LatLngBounds, viewport::Viewport},
    data::{City, PickupPoint},
    prelude::HashMap,
    selection::view::SelectionView,
    traits::{MapInstance, MapService},
    Result, SelectorError,
};
use crossbeam_channel::{Receiver, Sender};
use tokio::time::Instant;

/// Container id handed to the map widget.
pub const MAP_CONTAINER_ID: &str = "cdek-pvz-map";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapStatus {
    /// `create` has not run yet.
    Absent,
    Loading,
    Ready,
    LoadFailed(String),
    InitFailed(String),
    Destroyed,
}

impl MapStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// User-facing error text for the map region, if any.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::LoadFailed(message) | Self::InitFailed(message) => Some(message),
            _ => None,
        }
    }
}

/// What a map gesture asks the selector to do
#[derive(Debug, Clone, PartialEq)]
pub enum MapIntent {
    /// A marker was clicked or selected from its balloon.
    PointChosen(PickupPoint),
    /// A cluster was clicked; the view stays where it is.
    ClusterInspected {
        cluster_id: String,
        points: Vec<PickupPoint>,
    },
    BalloonOpened(PickupPoint),
}

#[derive(Debug, Clone)]
struct DeferredFit {
    due: Instant,
    bounds: LatLngBounds,
    margin: f64,
}

/// Drives one map widget instance: lifecycle, marker set, and viewport.
///
/// The controller is the only owner of the instance. [`Self::destroy`] runs
/// at most once per instance and also runs on drop.
pub struct MapViewportController {
    config: SelectorConfig,
    instance: Option<Box<dyn MapInstance>>,
    events_tx: Sender<MapEvent>,
    events_rx: Receiver<MapEvent>,
    status: MapStatus,
    viewport: Viewport,
    rendered: HashMap<String, PickupPoint>,
    markers: Vec<MarkerRecord>,
    last_fitted_city: Option<String>,
    deferred_fit: Option<DeferredFit>,
    last_plan: ViewportPlan,
}

impl MapViewportController {
    pub fn new(config: SelectorConfig) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let mut viewport = Viewport::new(
            config.viewport.default_center,
            config.viewport.initial_zoom,
            config.viewport.map_size,
        );
        viewport.set_zoom_limits(config.viewport.min_zoom, config.viewport.max_zoom);

        Self {
            config,
            instance: None,
            events_tx,
            events_rx,
            status: MapStatus::Absent,
            viewport,
            rendered: HashMap::default(),
            markers: Vec::new(),
            last_fitted_city: None,
            deferred_fit: None,
            last_plan: ViewportPlan::Keep,
        }
    }

    pub fn status(&self) -> &MapStatus {
        &self.status
    }

    pub fn is_initialized(&self) -> bool {
        self.status.is_ready() && self.instance.is_some()
    }

    /// The view the controller last asked the widget for.
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn markers(&self) -> &[MarkerRecord] {
        &self.markers
    }

    pub fn last_plan(&self) -> &ViewportPlan {
        &self.last_plan
    }

    pub fn last_fitted_city(&self) -> Option<&str> {
        self.last_fitted_city.as_deref()
    }

    pub fn has_pending_fit(&self) -> bool {
        self.deferred_fit.is_some()
    }

    /// Loads the widget and builds the instance.
    ///
    /// Without an API key nothing is loaded. A failed load or a failed
    /// instance construction leaves the controller without an instance;
    /// the error is recorded in [`Self::status`] and returned.
    pub async fn create(
        &mut self,
        service: &dyn MapService,
        api_key: Option<&str>,
        city: Option<&City>,
    ) -> Result<()> {
        if self.instance.is_some() {
            return Ok(());
        }

        let Some(api_key) = api_key.filter(|k| !k.trim().is_empty()) else {
            let message = "Yandex Maps API key is not configured.".to_string();
            self.status = MapStatus::LoadFailed(message.clone());
            return Err(SelectorError::MapLoad(message));
        };

        self.status = MapStatus::Loading;
        let script_url = self.config.map_api_url(api_key);
        let loaded = match service.load(&script_url).await {
            Ok(()) => service.ready().await,
            Err(e) => Err(e),
        };
        if let Err(e) = loaded {
            log::error!("map script failed to load: {e}");
            self.status = MapStatus::LoadFailed("Failed to load Yandex Maps API.".into());
            return Err(match e {
                SelectorError::MapLoad(_) => e,
                other => SelectorError::MapLoad(other.to_string()),
            });
        }

        let center = city
            .and_then(City::coordinates)
            .unwrap_or(self.config.viewport.default_center);
        let options = MapInitOptions {
            container_id: MAP_CONTAINER_ID.to_string(),
            center,
            zoom: self.config.viewport.initial_zoom,
            controls: MAP_CONTROLS.iter().map(|c| c.to_string()).collect(),
        };

        let mut instance = match service.create_map(&options, self.events_tx.clone()) {
            Ok(instance) => instance,
            Err(e) => {
                log::error!("map instance construction failed: {e}");
                self.status = MapStatus::InitFailed("Failed to initialize the map.".into());
                return Err(match e {
                    SelectorError::MapInit(_) => e,
                    other => SelectorError::MapInit(other.to_string()),
                });
            }
        };

        if let Err(e) = instance.attach_collection(&self.config.clustering) {
            log::error!("marker collection could not be attached: {e}");
            instance.destroy();
            self.status = MapStatus::InitFailed("Failed to initialize the map.".into());
            return Err(SelectorError::MapInit(e.to_string()));
        }

        self.viewport.set_view(center, options.zoom);
        self.instance = Some(instance);
        self.status = MapStatus::Ready;
        log::info!("map ready at {center:?}");
        Ok(())
    }

    /// Re-renders markers and applies the viewport policy for `view`.
    ///
    /// A no-op until the map is ready. Widget call failures are logged and
    /// never propagate: the map only adds to the list.
    pub fn update(&mut self, view: &SelectionView) {
        if !self.is_initialized() {
            return;
        }
        let Some(instance) = self.instance.as_mut() else {
            return;
        };

        // A newer state supersedes a fit that has not fired yet.
        self.deferred_fit = None;

        self.rendered = view
            .points
            .iter()
            .filter(|p| p.coordinates().is_some())
            .map(|p| (p.code.clone(), p.clone()))
            .collect();
        self.markers = view.markers.clone();
        if let Err(e) = instance.set_markers(&self.markers) {
            log::warn!("map set_markers error: {e}");
        }

        let decision = plan_viewport(
            PolicyInput {
                city: view.city.as_ref(),
                markers: &self.markers,
                last_fitted_city: self.last_fitted_city.as_deref(),
            },
            &self.config.viewport,
        );
        self.last_fitted_city = decision.fitted_city;
        self.apply(decision.plan);
    }

    fn apply(&mut self, plan: ViewportPlan) {
        let Some(instance) = self.instance.as_mut() else {
            return;
        };

        match &plan {
            ViewportPlan::Keep => {}
            ViewportPlan::Center { center, zoom } => {
                self.viewport.set_view(*center, *zoom);
                if let Err(e) = instance.set_center(*center, *zoom) {
                    log::warn!("map set_center error: {e}");
                }
            }
            ViewportPlan::Fit { bounds, margin } => {
                self.viewport.fit_bounds(bounds, *margin);
                if let Err(e) = instance.set_bounds(bounds, &FitOptions::with_margin(*margin)) {
                    log::warn!("map set_bounds error: {e}");
                }
            }
            ViewportPlan::CenterThenFit {
                center,
                zoom,
                bounds,
                margin,
            } => {
                self.viewport.set_view(*center, *zoom);
                if let Err(e) = instance.set_center(*center, *zoom) {
                    log::warn!("map set_center error: {e}");
                }
                self.deferred_fit = Some(DeferredFit {
                    due: Instant::now() + self.config.viewport.settle_delay(),
                    bounds: bounds.clone(),
                    margin: *margin,
                });
            }
        }
        log::debug!("viewport plan applied: {plan:?}");
        self.last_plan = plan;
    }

    /// When the fit deferred by a city recenter is due.
    pub fn pending_fit_due(&self) -> Option<Instant> {
        self.deferred_fit.as_ref().map(|f| f.due)
    }

    /// Waits for a pending post-recenter fit and applies it. Returns whether
    /// a fit was applied.
    pub async fn settle(&mut self) -> bool {
        let Some(due) = self.pending_fit_due() else {
            return false;
        };
        tokio::time::sleep_until(due).await;
        self.apply_due_fit(Instant::now())
    }

    /// Applies the pending fit if it is due at `now`.
    pub fn apply_due_fit(&mut self, now: Instant) -> bool {
        match &self.deferred_fit {
            Some(fit) if fit.due <= now => {}
            _ => return false,
        }
        let Some(fit) = self.deferred_fit.take() else {
            return false;
        };
        let Some(instance) = self.instance.as_mut() else {
            return false;
        };

        self.viewport.fit_bounds(&fit.bounds, fit.margin);
        if let Err(e) = instance.set_bounds(&fit.bounds, &FitOptions::with_margin(fit.margin)) {
            log::warn!("map set_bounds (after city change) error: {e}");
        }
        true
    }

    /// Turns pending widget events into selector intents. Events naming a
    /// point that is no longer rendered are dropped.
    pub fn drain_intents(&mut self) -> Vec<MapIntent> {
        let mut intents = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            let intent = match event {
                MapEvent::MarkerClick { id } | MapEvent::BalloonSelect { id } => {
                    self.rendered.get(&id).cloned().map(MapIntent::PointChosen)
                }
                MapEvent::BalloonOpen { id } => {
                    self.rendered.get(&id).cloned().map(MapIntent::BalloonOpened)
                }
                MapEvent::ClusterClick {
                    cluster_id,
                    member_ids,
                } => Some(MapIntent::ClusterInspected {
                    cluster_id,
                    points: member_ids
                        .iter()
                        .filter_map(|id| self.rendered.get(id).cloned())
                        .collect(),
                }),
            };
            match intent {
                Some(intent) => intents.push(intent),
                None => log::debug!("map event for a point that is no longer shown"),
            }
        }
        intents
    }

    /// Releases the instance and cancels any pending fit. Safe to call more
    /// than once.
    pub fn destroy(&mut self) {
        self.deferred_fit = None;
        if let Some(mut instance) = self.instance.take() {
            instance.destroy();
            log::debug!("map instance destroyed");
        }
        self.rendered.clear();
        self.markers.clear();
        if self.status.is_ready() || self.status == MapStatus::Loading {
            self.status = MapStatus::Destroyed;
        }
    }
}

impl Drop for MapViewportController {
    fn drop(&mut self) {
        self.destroy();
    }
}

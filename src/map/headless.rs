//! In-process map widget.
//!
//! Stands in for the browser map SDK: it keeps the view the controller asked
//! for, projects bounds fits through [`Viewport`], clusters markers on the
//! configured grid, and lets a driver or a test click markers, balloons, and
//! clusters.

use super::{
    clustering::{Cluster, GridClusterer},
    marker::MarkerRecord,
    FitOptions, MapEvent, MapInitOptions,
};
use crate::{
    core::{
        config::ClusterConfig,
        geo::{LatLng, LatLngBounds, Point},
        viewport::Viewport,
    },
    runtime::lock,
    traits::{MapInstance, MapService},
    Result, SelectorError,
};
use async_trait::async_trait;
use crossbeam_channel::Sender;
use std::sync::{Arc, Mutex};

/// Every call the controller made on a headless map, in order
#[derive(Debug, Clone, PartialEq)]
pub enum MapCall {
    AttachCollection { grid_size: u32 },
    SetMarkers { count: usize },
    SetCenter { center: LatLng, zoom: f64 },
    SetBounds { bounds: LatLngBounds, margin: f64 },
    Destroy,
}

#[derive(Debug)]
struct HeadlessState {
    options: MapInitOptions,
    viewport: Viewport,
    markers: Vec<MarkerRecord>,
    clustering: Option<ClusterConfig>,
    calls: Vec<MapCall>,
    destroyed: usize,
}

/// Failure switches for exercising the load and init error paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessFailures {
    pub load: bool,
    pub ready: bool,
    pub create: bool,
    /// The created instance refuses its marker collection.
    pub attach: bool,
}

/// [`MapService`] that builds [`HeadlessMap`] instances.
#[derive(Default)]
pub struct HeadlessMapService {
    failures: HeadlessFailures,
    size: Option<Point>,
    loaded_from: Mutex<Option<String>>,
    created: Mutex<Vec<HeadlessMapHandle>>,
}

impl HeadlessMapService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failures(mut self, failures: HeadlessFailures) -> Self {
        self.failures = failures;
        self
    }

    /// Pixel size of created maps; defaults to the viewport default.
    pub fn with_size(mut self, size: Point) -> Self {
        self.size = Some(size);
        self
    }

    /// Script URL of the last successful load.
    pub fn loaded_from(&self) -> Option<String> {
        lock(&self.loaded_from).clone()
    }

    /// Handle to the most recently created map.
    pub fn last_map(&self) -> Option<HeadlessMapHandle> {
        lock(&self.created).last().cloned()
    }

    pub fn created_count(&self) -> usize {
        lock(&self.created).len()
    }
}

#[async_trait]
impl MapService for HeadlessMapService {
    async fn load(&self, script_url: &str) -> Result<()> {
        if self.failures.load {
            return Err(SelectorError::MapLoad(format!(
                "failed to load map script from {script_url}"
            )));
        }
        log::debug!("headless map: script {script_url}");
        *lock(&self.loaded_from) = Some(script_url.to_string());
        Ok(())
    }

    async fn ready(&self) -> Result<()> {
        if self.failures.ready {
            return Err(SelectorError::MapLoad("map API never became ready".into()));
        }
        Ok(())
    }

    fn create_map(
        &self,
        options: &MapInitOptions,
        events: Sender<MapEvent>,
    ) -> Result<Box<dyn MapInstance>> {
        if self.failures.create {
            return Err(SelectorError::MapInit(format!(
                "container #{} is not available",
                options.container_id
            )));
        }

        let mut viewport = Viewport::default();
        if let Some(size) = self.size {
            viewport.size = size;
        }
        viewport.set_view(options.center, options.zoom);

        let state = Arc::new(Mutex::new(HeadlessState {
            options: options.clone(),
            viewport,
            markers: Vec::new(),
            clustering: None,
            calls: Vec::new(),
            destroyed: 0,
        }));
        let handle = HeadlessMapHandle {
            state: state.clone(),
            events,
        };
        lock(&self.created).push(handle);

        Ok(Box::new(HeadlessMap {
            state,
            fail_attach: self.failures.attach,
        }))
    }
}

/// One headless map instance.
pub struct HeadlessMap {
    state: Arc<Mutex<HeadlessState>>,
    fail_attach: bool,
}

impl HeadlessMap {
    fn live(&self) -> Result<std::sync::MutexGuard<'_, HeadlessState>> {
        let state = lock(&self.state);
        if state.destroyed > 0 {
            return Err(SelectorError::MapInit("map instance already destroyed".into()));
        }
        Ok(state)
    }
}

impl MapInstance for HeadlessMap {
    fn attach_collection(&mut self, options: &ClusterConfig) -> Result<()> {
        if self.fail_attach {
            return Err(SelectorError::MapInit("clusterer module is unavailable".into()));
        }
        let mut state = self.live()?;
        state.calls.push(MapCall::AttachCollection {
            grid_size: options.grid_size,
        });
        state.clustering = Some(options.clone());
        Ok(())
    }

    fn set_markers(&mut self, markers: &[MarkerRecord]) -> Result<()> {
        let mut state = self.live()?;
        state.calls.push(MapCall::SetMarkers {
            count: markers.len(),
        });
        state.markers = markers.to_vec();
        Ok(())
    }

    fn set_center(&mut self, center: LatLng, zoom: f64) -> Result<()> {
        let mut state = self.live()?;
        state.calls.push(MapCall::SetCenter { center, zoom });
        state.viewport.set_view(center, zoom);
        Ok(())
    }

    fn set_bounds(&mut self, bounds: &LatLngBounds, options: &FitOptions) -> Result<()> {
        let mut state = self.live()?;
        state.calls.push(MapCall::SetBounds {
            bounds: bounds.clone(),
            margin: options.margin_px,
        });
        if !options.check_zoom_range {
            state.viewport.set_zoom_limits(0.0, 23.0);
        }
        state.viewport.fit_bounds(bounds, options.margin_px);
        Ok(())
    }

    fn destroy(&mut self) {
        let mut state = lock(&self.state);
        state.destroyed += 1;
        state.calls.push(MapCall::Destroy);
        state.markers.clear();
    }
}

/// Inspects a headless map and plays user gestures on it.
#[derive(Clone)]
pub struct HeadlessMapHandle {
    state: Arc<Mutex<HeadlessState>>,
    events: Sender<MapEvent>,
}

impl std::fmt::Debug for HeadlessMapHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessMapHandle")
            .field("state", &*lock(&self.state))
            .finish()
    }
}

impl HeadlessMapHandle {
    pub fn center(&self) -> LatLng {
        lock(&self.state).viewport.center
    }

    pub fn zoom(&self) -> f64 {
        lock(&self.state).viewport.zoom
    }

    pub fn init_options(&self) -> MapInitOptions {
        lock(&self.state).options.clone()
    }

    pub fn markers(&self) -> Vec<MarkerRecord> {
        lock(&self.state).markers.clone()
    }

    pub fn calls(&self) -> Vec<MapCall> {
        lock(&self.state).calls.clone()
    }

    pub fn clustering(&self) -> Option<ClusterConfig> {
        lock(&self.state).clustering.clone()
    }

    /// How many times `destroy` was called on the instance.
    pub fn destroy_count(&self) -> usize {
        lock(&self.state).destroyed
    }

    /// Markers grouped on the attached collection's grid at the current zoom.
    pub fn clusters(&self) -> Vec<Cluster> {
        let state = lock(&self.state);
        match &state.clustering {
            Some(config) if config.clusterize => {
                GridClusterer::new(config.grid_size).cluster(&state.markers, &state.viewport)
            }
            _ => Vec::new(),
        }
    }

    fn has_marker(&self, id: &str) -> bool {
        lock(&self.state).markers.iter().any(|m| m.id == id)
    }

    fn emit(&self, event: MapEvent) -> bool {
        if self.events.send(event).is_err() {
            log::debug!("headless map: event dropped, controller is gone");
            return false;
        }
        true
    }

    /// Clicks a marker. Returns false when no such marker is shown.
    pub fn click_marker(&self, id: &str) -> bool {
        self.has_marker(id) && self.emit(MapEvent::MarkerClick { id: id.to_string() })
    }

    pub fn open_balloon(&self, id: &str) -> bool {
        self.has_marker(id) && self.emit(MapEvent::BalloonOpen { id: id.to_string() })
    }

    /// Uses the "Select" button inside a marker's balloon.
    pub fn select_from_balloon(&self, id: &str) -> bool {
        self.has_marker(id) && self.emit(MapEvent::BalloonSelect { id: id.to_string() })
    }

    /// Clicks a cluster icon. The view only zooms in when the collection was
    /// attached with click zoom enabled.
    pub fn click_cluster(&self, cluster_id: &str) -> bool {
        let Some(cluster) = self.clusters().into_iter().find(|c| c.id == cluster_id) else {
            return false;
        };

        {
            let mut state = lock(&self.state);
            let zoom_on_click = state
                .clustering
                .as_ref()
                .map_or(false, |c| !c.disable_click_zoom);
            if zoom_on_click {
                let coords: Vec<LatLng> = state
                    .markers
                    .iter()
                    .filter(|m| cluster.member_ids.contains(&m.id))
                    .map(|m| m.coordinates)
                    .collect();
                if let Some(bounds) = LatLngBounds::from_points(coords.iter()) {
                    state.viewport.fit_bounds(&bounds, 0.0);
                }
            }
        }

        self.emit(MapEvent::ClusterClick {
            cluster_id: cluster.id,
            member_ids: cluster.member_ids,
        })
    }
}

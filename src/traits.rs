//! Collaborator seams.
//!
//! The selector never talks to the network, the notification surface, or the
//! map widget directly; it goes through these traits so each can be swapped
//! for an HTTP client, a headless map, or a test double.

use crate::{
    api::{DeliveryUpdate, PointSearchRequest},
    core::{
        config::ClusterConfig,
        geo::{LatLng, LatLngBounds},
    },
    data::{City, PickupPoint},
    map::{marker::MarkerRecord, FitOptions, MapEvent, MapInitOptions},
    notify::Notification,
    Result,
};
use async_trait::async_trait;
use crossbeam_channel::Sender;

/// The four backend calls the selector consumes.
///
/// Application-level error payloads (`{"error": true, "message": ...}`) come
/// back as [`crate::SelectorError::Search`]; transport failures keep their
/// own variants so callers can tell the two apart.
#[async_trait]
pub trait SelectorBackend: Send + Sync {
    /// Ranked city candidates for a free-text query.
    async fn search_cities(&self, query: &str, limit: u32) -> Result<Vec<City>>;

    /// Pickup points for a city.
    async fn search_points(&self, request: &PointSearchRequest) -> Result<Vec<PickupPoint>>;

    /// Map API key; `None` when none is configured.
    async fn map_api_key(&self) -> Result<Option<String>>;

    /// Persists the chosen point against the order.
    async fn update_delivery(&self, update: &DeliveryUpdate) -> Result<()>;
}

/// User-facing transient notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// The map widget's loader: fetch the script, wait for readiness, build maps.
#[async_trait]
pub trait MapService: Send + Sync {
    /// Loads the map script from a URL that already carries the API key.
    async fn load(&self, script_url: &str) -> Result<()>;

    /// Resolves once the widget API is usable.
    async fn ready(&self) -> Result<()>;

    /// Builds a map instance. Click, balloon, and cluster events are sent on
    /// `events` for as long as the instance lives.
    fn create_map(
        &self,
        options: &MapInitOptions,
        events: Sender<MapEvent>,
    ) -> Result<Box<dyn MapInstance>>;
}

/// One live map instance, exclusively owned by a
/// [`crate::map::controller::MapViewportController`].
pub trait MapInstance: Send {
    /// Attaches the marker collection with the widget's clustering enabled.
    fn attach_collection(&mut self, options: &ClusterConfig) -> Result<()>;

    /// Replaces every marker in the collection.
    fn set_markers(&mut self, markers: &[MarkerRecord]) -> Result<()>;

    fn set_center(&mut self, center: LatLng, zoom: f64) -> Result<()>;

    fn set_bounds(&mut self, bounds: &LatLngBounds, options: &FitOptions) -> Result<()>;

    /// Releases the instance. Called exactly once.
    fn destroy(&mut self);
}

//! Prelude module for common pickup-map types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use pickup_map::prelude::*;`

pub use crate::core::{
    config::{
        ClusterConfig, HttpBackendConfig, MarkerConfig, MountContext, SearchConfig,
        SelectorConfig, ViewportConfig,
    },
    geo::{LatLng, LatLngBounds, Point},
    viewport::Viewport,
};

pub use crate::data::{filter_points, City, PickupPoint};

pub use crate::api::{DeliveryUpdate, HttpBackend, PointSearchRequest};

pub use crate::map::{
    clustering::{Cluster, GridClusterer},
    controller::{MapIntent, MapStatus, MapViewportController},
    headless::{HeadlessMapHandle, HeadlessMapService},
    marker::{project_markers, MarkerRecord},
    policy::{plan_viewport, ViewportPlan},
    FitOptions, MapEvent, MapInitOptions,
};

pub use crate::notify::{LogNotifier, Notification, NotificationKind};

pub use crate::search::{GeoSearchClient, SearchOutcome};

pub use crate::selection::{
    orchestrator::{FetchOutcome, PersistOutcome, SelectionOrchestrator},
    state::{FetchStatus, PersistStatus, SelectionPhase, SelectionState},
    view::SelectionView,
};

pub use crate::selector::PickupSelector;

pub use crate::traits::{MapInstance, MapService, Notifier, SelectorBackend};

pub use crate::{ErrorKind, Result, SelectorError};

// Use fxhash for better performance
pub use fxhash::FxHashMap as HashMap;
pub use fxhash::FxHashSet as HashSet;

//! # Pickup-Map
//!
//! Checkout-side engine for choosing a parcel pickup point: debounced city
//! search, point fetching with stale-response guards, free-text filtering,
//! and the map viewport policy that decides how the map recenters, fits,
//! and clusters as the point set changes.
//!
//! The transport, the notification surface, and the map widget are
//! collaborators injected through the traits in [`traits`].

pub mod api;
pub mod core;
pub mod data;
pub mod map;
pub mod notify;
pub mod prelude;
pub mod runtime;
pub mod search;
pub mod selection;
pub mod selector;
pub mod traits;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    config::{MountContext, SelectorConfig},
    geo::{LatLng, LatLngBounds},
    viewport::Viewport,
};

pub use data::{filter::filter_points, City, PickupPoint};

pub use map::{
    controller::{MapIntent, MapStatus, MapViewportController},
    policy::{plan_viewport, ViewportPlan},
};

pub use search::{GeoSearchClient, SearchOutcome};

pub use selection::{
    orchestrator::SelectionOrchestrator,
    state::{SelectionPhase, SelectionState},
    view::SelectionView,
};

pub use selector::PickupSelector;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, SelectorError>;

/// The error kinds the selector reports to its host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// City or point lookup failed or returned an application-level error
    Search,
    /// Saving the selection failed
    Persist,
    /// Map asset or API key unavailable, or the load failed
    MapLoad,
    /// The map widget threw while constructing its instance
    MapInit,
    /// No carrier/order context at mount
    ConfigMissing,
    /// An intent was rejected before any state changed
    Precondition,
}

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum SelectorError {
    #[error("Search error: {0}")]
    Search(String),

    #[error("Persist error: {0}")]
    Persist(String),

    #[error("Map load error: {0}")]
    MapLoad(String),

    #[error("Map init error: {0}")]
    MapInit(String),

    #[error("Configuration missing: {0}")]
    ConfigMissing(String),

    #[error("Point {0} is not among the available points")]
    PointNotAvailable(String),

    #[error("Invalid city: {0}")]
    InvalidCity(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
}

impl SelectorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Search(_) | Self::Network(_) | Self::Serialization(_) | Self::Rpc { .. } => {
                ErrorKind::Search
            }
            Self::Persist(_) => ErrorKind::Persist,
            Self::MapLoad(_) => ErrorKind::MapLoad,
            Self::MapInit(_) => ErrorKind::MapInit,
            Self::ConfigMissing(_) => ErrorKind::ConfigMissing,
            Self::PointNotAvailable(_) | Self::InvalidCity(_) => ErrorKind::Precondition,
        }
    }

    /// True for failures of the transport itself rather than an error payload
    /// the backend answered with.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Serialization(_) | Self::Rpc { .. }
        )
    }

    /// Reclassifies a backend failure as a save failure.
    pub fn into_persist(self) -> Self {
        match self {
            Self::Search(message) => Self::Persist(message),
            other if other.is_transport() => Self::Persist(other.to_string()),
            other => other,
        }
    }
}

/// Error type alias for convenience
pub type Error = SelectorError;

//! Selector-wide defaults taken from the checkout widget's behaviour.
//! Keeping them in a single place makes it easier to tweak the magic numbers.

/// Zoom used when centering on a city.
pub const DEFAULT_INITIAL_ZOOM: f64 = 12.0;

/// Tighter zoom used when a single chosen point is the only marker.
pub const DEFAULT_SINGLE_POINT_ZOOM: f64 = 15.0;

/// Pixel margin kept around markers when fitting bounds.
pub const DEFAULT_FIT_MARGIN_PX: f64 = 35.0;

/// Map widget zoom range.
pub const DEFAULT_MIN_ZOOM: f64 = 0.0;
pub const DEFAULT_MAX_ZOOM: f64 = 19.0;

/// Clustering grid cell size in pixels.
pub const DEFAULT_CLUSTER_GRID_SIZE: u32 = 64;

/// Quiet window before a city query is dispatched.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Delay between the city recenter and the follow-up bounds fit.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 300;

/// Suggestions requested per city query.
pub const DEFAULT_CITY_SEARCH_LIMIT: u32 = 10;

/// Startup resolution of a known city only needs the top match.
pub const DEFAULT_INITIAL_CITY_SEARCH_LIMIT: u32 = 1;

/// Queries shorter than this (in characters) are never sent.
pub const DEFAULT_MIN_QUERY_CHARS: usize = 2;

/// Pickup points requested per city.
pub const DEFAULT_POINT_SEARCH_LIMIT: u32 = 300;

/// Delivery type sent with point searches.
pub const DEFAULT_POINT_DELIVERY_TYPE: &str = "PVZ";

/// Map center used when no city is known yet (Moscow).
pub const DEFAULT_CENTER: (f64, f64) = (55.751244, 37.618423);

/// Pixel size of the map region used for bounds fitting.
pub const DEFAULT_MAP_SIZE: (f64, f64) = (600.0, 400.0);

/// Marker presets.
pub const DEFAULT_MARKER_PRESET: &str = "islands#blueRapidTransitIcon";
pub const DEFAULT_SELECTED_MARKER_PRESET: &str = "islands#greenRapidTransitIcon";

/// Cluster icon layout understood by the map widget.
pub const DEFAULT_CLUSTER_ICON_LAYOUT: &str = "default#pieChart";

/// Map script location; `{apikey}` is substituted at load time.
pub const DEFAULT_MAP_API_URL_TEMPLATE: &str =
    "https://api-maps.yandex.ru/2.1/?apikey={apikey}&lang=ru_RU&coordorder=latlong";

/// Controls added to every map instance.
pub const MAP_CONTROLS: [&str; 4] = ["zoomControl", "fullscreenControl", "typeSelector", "rulerControl"];

/// Delivery type written to the order on persistence.
pub const PERSIST_DELIVERY_TYPE: &str = "pvz";

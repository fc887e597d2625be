use crate::core::geo::{LatLng, LatLngBounds, Point};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const EARTH_RADIUS: f64 = 6378137.0;

/// Pixel width of the whole world at zoom 0.
const WORLD_TILE_SIZE: f64 = 256.0;

/// Tracks the map view the controller has asked for: center, zoom, and the
/// pixel size of the map region. Used to resolve bounds fits into a concrete
/// center/zoom pair the same way the map widget does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// The center of the map view in geographical coordinates
    pub center: LatLng,
    /// The current zoom level
    pub zoom: f64,
    /// The size of the viewport in pixels
    pub size: Point,
    /// The minimum allowed zoom level
    pub min_zoom: f64,
    /// The maximum allowed zoom level
    pub max_zoom: f64,
}

impl Viewport {
    /// Creates a new viewport
    pub fn new(center: LatLng, zoom: f64, size: Point) -> Self {
        Self {
            center,
            zoom: zoom.clamp(0.0, 19.0),
            size,
            min_zoom: 0.0,
            max_zoom: 19.0,
        }
    }

    /// Sets the center of the viewport, clamped to the projectable world
    pub fn set_center(&mut self, center: LatLng) {
        self.center = LatLng::new(
            LatLng::clamp_lat(center.lat),
            center.lng.clamp(-180.0, 180.0),
        );
    }

    /// Sets the zoom level, clamping to valid range
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    /// Sets both center and zoom
    pub fn set_view(&mut self, center: LatLng, zoom: f64) {
        self.set_center(center);
        self.set_zoom(zoom);
    }

    /// Sets the zoom limits
    pub fn set_zoom_limits(&mut self, min_zoom: f64, max_zoom: f64) {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self.zoom = self.zoom.clamp(min_zoom, max_zoom);
    }

    /// Projects a LatLng to world pixel coordinates at the given zoom level
    /// (Web Mercator, EPSG:3857)
    pub fn project(&self, lat_lng: &LatLng, zoom: Option<f64>) -> Point {
        let z = zoom.unwrap_or(self.zoom);
        let scale = WORLD_TILE_SIZE * 2_f64.powf(z);
        let mercator = lat_lng.to_mercator();

        let pixel_x = (mercator.x + PI * EARTH_RADIUS) / (2.0 * PI * EARTH_RADIUS) * scale;
        let pixel_y = (-mercator.y + PI * EARTH_RADIUS) / (2.0 * PI * EARTH_RADIUS) * scale;

        Point::new(pixel_x, pixel_y)
    }

    /// Unprojects world pixel coordinates back to LatLng at the given zoom level
    pub fn unproject(&self, pixel: &Point, zoom: Option<f64>) -> LatLng {
        let z = zoom.unwrap_or(self.zoom);
        let scale = WORLD_TILE_SIZE * 2_f64.powf(z);

        let x = (pixel.x / scale) * (2.0 * PI * EARTH_RADIUS) - PI * EARTH_RADIUS;
        let y = PI * EARTH_RADIUS - (pixel.y / scale) * (2.0 * PI * EARTH_RADIUS);

        LatLng::from_mercator(Point::new(x, y))
    }

    /// Largest integer zoom inside the zoom range at which `bounds` fits the
    /// viewport with `margin` pixels kept free on every side.
    pub fn zoom_for_bounds(&self, bounds: &LatLngBounds, margin: f64) -> f64 {
        let available = Point::new(
            (self.size.x - 2.0 * margin).max(1.0),
            (self.size.y - 2.0 * margin).max(1.0),
        );

        let mut best_zoom = self.min_zoom.ceil();
        for test_zoom in (self.min_zoom.ceil() as i32)..=(self.max_zoom.floor() as i32) {
            let zoom = test_zoom as f64;
            let nw = self.project(&bounds.north_west(), Some(zoom));
            let se = self.project(&bounds.south_east(), Some(zoom));

            let bounds_width = (se.x - nw.x).abs();
            let bounds_height = (se.y - nw.y).abs();

            if bounds_width <= available.x && bounds_height <= available.y {
                best_zoom = zoom;
            } else {
                break;
            }
        }

        best_zoom.clamp(self.min_zoom, self.max_zoom)
    }

    /// Fits the viewport to contain the given bounds. The center is the
    /// projected midpoint so it matches what the map widget shows.
    pub fn fit_bounds(&mut self, bounds: &LatLngBounds, margin: f64) {
        let zoom = self.zoom_for_bounds(bounds, margin);
        let nw = self.project(&bounds.north_west(), Some(zoom));
        let se = self.project(&bounds.south_east(), Some(zoom));
        let center = self.unproject(&nw.midpoint(&se), Some(zoom));

        self.set_center(center);
        self.set_zoom(zoom);
    }

    /// Gets the current viewport bounds in geographical coordinates
    pub fn bounds(&self) -> LatLngBounds {
        let center_px = self.project(&self.center, None);
        let half = Point::new(self.size.x / 2.0, self.size.y / 2.0);
        let nw = self.unproject(&center_px.subtract(&half), None);
        let se = self.unproject(&Point::new(center_px.x + half.x, center_px.y + half.y), None);

        LatLngBounds::new(LatLng::new(se.lat, nw.lng), LatLng::new(nw.lat, se.lng))
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(LatLng::new(0.0, 0.0), 0.0, Point::new(600.0, 400.0))
    }
}

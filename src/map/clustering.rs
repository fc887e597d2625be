use super::marker::MarkerRecord;
use crate::prelude::HashMap;
use crate::core::{
    geo::{LatLng, Point},
    viewport::Viewport,
};
use serde::{Deserialize, Serialize};

/// Represents a cluster of markers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Grid cell identifier, `cluster_{x}_{y}`
    pub id: String,
    /// Average position of the members
    pub center: LatLng,
    /// Marker ids in input order
    pub member_ids: Vec<String>,
}

impl Cluster {
    pub fn count(&self) -> usize {
        self.member_ids.len()
    }

    pub fn is_single(&self) -> bool {
        self.member_ids.len() == 1
    }
}

/// Grid clustering the way the map widget does it: markers whose projected
/// pixel positions fall into the same `grid_size` square at the current zoom
/// share a cluster.
pub struct GridClusterer {
    grid_size: f64,
}

impl GridClusterer {
    pub fn new(grid_size: u32) -> Self {
        Self {
            grid_size: f64::from(grid_size.max(1)),
        }
    }

    fn cell_of(&self, pixel: &Point) -> (i32, i32) {
        (
            (pixel.x / self.grid_size).floor() as i32,
            (pixel.y / self.grid_size).floor() as i32,
        )
    }

    /// Groups `markers` at the viewport's zoom. Output is ordered by grid
    /// cell, rows first.
    pub fn cluster(&self, markers: &[MarkerRecord], viewport: &Viewport) -> Vec<Cluster> {
        let mut grid: HashMap<(i32, i32), Vec<&MarkerRecord>> = HashMap::default();
        for marker in markers {
            let pixel = viewport.project(&marker.coordinates, None);
            grid.entry(self.cell_of(&pixel)).or_default().push(marker);
        }

        let mut cells: Vec<_> = grid.into_iter().collect();
        cells.sort_by_key(|((x, y), _)| (*y, *x));

        cells
            .into_iter()
            .map(|((x, y), members)| {
                let count = members.len() as f64;
                let (lat, lng) = members.iter().fold((0.0, 0.0), |(lat, lng), m| {
                    (lat + m.coordinates.lat, lng + m.coordinates.lng)
                });
                Cluster {
                    id: format!("cluster_{x}_{y}"),
                    center: LatLng::new(lat / count, lng / count),
                    member_ids: members.iter().map(|m| m.id.clone()).collect(),
                }
            })
            .collect()
    }
}

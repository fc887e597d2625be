pub mod filter;
pub mod model;

pub use filter::filter_points;
pub use model::{City, PickupPoint};

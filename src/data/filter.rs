//! Free-text filtering of a fetched point set.
//!
//! The filter is a pure view: it never touches the input and is cheap enough
//! to run on every state recomputation.

use crate::data::model::PickupPoint;
use std::borrow::Cow;

/// Points whose name, address, full address, or code contains `text`,
/// ignoring case. A blank `text` borrows the input as is.
pub fn filter_points<'a>(points: &'a [PickupPoint], text: &str) -> Cow<'a, [PickupPoint]> {
    let needle = text.trim();
    if needle.is_empty() {
        return Cow::Borrowed(points);
    }

    let needle = needle.to_lowercase();
    Cow::Owned(
        points
            .iter()
            .filter(|point| matches_point(point, &needle))
            .cloned()
            .collect(),
    )
}

/// `needle` must already be lowercase.
fn matches_point(point: &PickupPoint, needle: &str) -> bool {
    let contains = |field: &str| field.to_lowercase().contains(needle);

    contains(&point.name)
        || point.address.as_deref().is_some_and(contains)
        || point.address_full.as_deref().is_some_and(contains)
        || contains(&point.code)
}

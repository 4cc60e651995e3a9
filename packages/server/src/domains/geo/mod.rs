//! Geo domain - ZIP geocoding and distance math for coverage matching

pub mod distance;
pub mod geocoder;

pub use distance::{distance_between_zips, haversine_miles, normalize_zip, within_radius};
pub use geocoder::{Coordinates, PgGeocoder, ZipCode};

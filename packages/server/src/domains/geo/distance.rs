//! Great-circle distance between ZIP centroids, with a documented fallback:
//! when either ZIP cannot be geocoded, radius checks degrade to exact string
//! equality between the two codes instead of failing.

use anyhow::Result;
use tracing::warn;

use crate::domains::geo::Coordinates;
use crate::kernel::BaseGeocoder;

const EARTH_RADIUS_MI: f64 = 3959.0;

/// Normalize a ZIP token: strip spaces and dashes, keep the first five chars
/// (drops ZIP+4 suffixes).
pub fn normalize_zip(zip: &str) -> String {
    let cleaned: String = zip.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
    cleaned.chars().take(5).collect()
}

/// Haversine distance between two coordinates, in miles.
pub fn haversine_miles(a: &Coordinates, b: &Coordinates) -> f64 {
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlng = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (dlng / 2.0).sin().powi(2);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_MI * c
}

/// Distance between two ZIP codes in miles, `None` if either is unresolved.
pub async fn distance_between_zips(
    geocoder: &dyn BaseGeocoder,
    zip_a: &str,
    zip_b: &str,
) -> Result<Option<f64>> {
    let a = geocoder.coordinates_of(&normalize_zip(zip_a)).await?;
    let b = geocoder.coordinates_of(&normalize_zip(zip_b)).await?;

    match (a, b) {
        (Some(a), Some(b)) => Ok(Some(haversine_miles(&a, &b))),
        _ => Ok(None),
    }
}

/// Whether `lead_zip` lies within `radius_miles` of `provider_zip`.
///
/// Identical codes always match. If either code cannot be geocoded (or the
/// lookup itself fails) the check degrades to that exact-equality result,
/// a documented precision loss, not an error.
pub async fn within_radius(
    geocoder: &dyn BaseGeocoder,
    provider_zip: &str,
    lead_zip: &str,
    radius_miles: f64,
) -> bool {
    let provider_zip = normalize_zip(provider_zip);
    let lead_zip = normalize_zip(lead_zip);

    if provider_zip == lead_zip {
        return true;
    }

    match distance_between_zips(geocoder, &provider_zip, &lead_zip).await {
        Ok(Some(distance)) => distance <= radius_miles,
        Ok(None) => false,
        Err(error) => {
            warn!(%error, %provider_zip, %lead_zip, "geocode lookup failed, falling back to exact ZIP match");
            false
        }
    }
}

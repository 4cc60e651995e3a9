use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::domains::geo::distance::normalize_zip;
use crate::kernel::BaseGeocoder;

/// Centroid coordinates for a ZIP code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Reference row for ZIP centroid lookups.
///
/// The `zip_codes` table is seeded from an offline US ZIP dataset (~40k
/// entries) rather than a hardcoded partial map, so lookups behave the same
/// in every metro.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ZipCode {
    pub zip_code: String,
    pub city: String,
    pub state: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl ZipCode {
    pub async fn find_by_code(zip: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM zip_codes WHERE zip_code = $1")
            .bind(zip)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }
}

/// Geocoder backed by the `zip_codes` reference table.
#[derive(Clone)]
pub struct PgGeocoder {
    pool: PgPool,
}

impl PgGeocoder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseGeocoder for PgGeocoder {
    async fn coordinates_of(&self, zip: &str) -> Result<Option<Coordinates>> {
        let normalized = normalize_zip(zip);
        let row = ZipCode::find_by_code(&normalized, &self.pool).await?;
        Ok(row.map(|z| Coordinates {
            latitude: z.latitude,
            longitude: z.longitude,
        }))
    }
}

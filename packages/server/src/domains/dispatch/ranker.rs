//! Candidate ordering strategies.
//!
//! Ordering is pluggable and decoupled from the cascade loop. `random` keeps
//! distribution fair by chance; `nearest` prefers providers whose primary ZIP
//! geocodes closest to the lead.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::domains::geo::distance_between_zips;
use crate::domains::providers::Provider;
use crate::kernel::BaseGeocoder;

#[async_trait]
pub trait CandidateRanker: Send + Sync {
    /// Order eligible candidates for the cascade. Must return a permutation
    /// of the input.
    async fn order(&self, lead_zip: &str, candidates: Vec<Provider>) -> Vec<Provider>;
}

/// Fair-by-chance ordering: a uniform shuffle.
pub struct RandomRanker;

#[async_trait]
impl CandidateRanker for RandomRanker {
    async fn order(&self, _lead_zip: &str, mut candidates: Vec<Provider>) -> Vec<Provider> {
        // Fisher-Yates
        for i in (1..candidates.len()).rev() {
            candidates.swap(i, fastrand::usize(..=i));
        }
        candidates
    }
}

/// Closest-first ordering by geocoded distance from the lead ZIP to each
/// provider's primary ZIP. Providers with unresolved distance sort last, in
/// their incoming order.
pub struct NearestFirstRanker {
    geocoder: Arc<dyn BaseGeocoder>,
}

impl NearestFirstRanker {
    pub fn new(geocoder: Arc<dyn BaseGeocoder>) -> Self {
        Self { geocoder }
    }
}

#[async_trait]
impl CandidateRanker for NearestFirstRanker {
    async fn order(&self, lead_zip: &str, candidates: Vec<Provider>) -> Vec<Provider> {
        let mut keyed: Vec<(f64, Provider)> = Vec::with_capacity(candidates.len());
        for provider in candidates {
            let distance = match provider.primary_zip() {
                Some(primary_zip) => {
                    match distance_between_zips(self.geocoder.as_ref(), lead_zip, &primary_zip)
                        .await
                    {
                        Ok(distance) => distance,
                        Err(error) => {
                            warn!(provider_id = %provider.id, %error,
                                "Distance lookup failed while ranking");
                            None
                        }
                    }
                }
                None => None,
            };
            keyed.push((distance.unwrap_or(f64::MAX), provider));
        }

        keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        keyed.into_iter().map(|(_, provider)| provider).collect()
    }
}

/// Resolve the configured strategy name. Unknown names fall back to random.
pub fn ranker_from_config(name: &str, geocoder: Arc<dyn BaseGeocoder>) -> Arc<dyn CandidateRanker> {
    match name {
        "nearest" => Arc::new(NearestFirstRanker::new(geocoder)),
        "random" => Arc::new(RandomRanker),
        other => {
            warn!(strategy = %other, "Unknown ranker strategy, using random");
            Arc::new(RandomRanker)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ProviderId;
    use crate::kernel::test_dependencies::{provider_fixture, StaticGeocoder};
    use std::collections::HashSet;

    #[tokio::test]
    async fn random_ranker_returns_a_permutation() {
        let candidates: Vec<Provider> = (0..8)
            .map(|i| provider_fixture(&format!("Provider {}", i), "90210"))
            .collect();
        let ids: HashSet<ProviderId> = candidates.iter().map(|p| p.id).collect();

        let ordered = RandomRanker.order("90210", candidates).await;

        assert_eq!(ordered.len(), 8);
        assert_eq!(ordered.iter().map(|p| p.id).collect::<HashSet<_>>(), ids);
    }

    #[tokio::test]
    async fn nearest_first_sorts_by_distance_with_unresolved_last() {
        let geocoder = Arc::new(
            StaticGeocoder::new()
                .with_zip("10001", 40.7506, -73.9971)
                .with_zip("10002", 40.7157, -73.9877)
                .with_zip("90210", 34.1030, -118.4105),
        );

        let far = provider_fixture("Far Coast", "90210");
        let near = provider_fixture("Next Block", "10002");
        let unresolved = provider_fixture("Unknown ZIP", "99999");
        let expected = vec![near.id, far.id, unresolved.id];

        let ranker = NearestFirstRanker::new(geocoder);
        let ordered = ranker.order("10001", vec![unresolved, far, near]).await;

        assert_eq!(ordered.iter().map(|p| p.id).collect::<Vec<_>>(), expected);
    }
}

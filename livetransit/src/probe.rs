//! Which routes through a stop have a live vehicle right now.
//!
//! A route is active iff at least one of its trips reports a usable
//! position. Routes are checked concurrently; within a route the trip list
//! is fetched first (through the shared cache), then the trips' positions
//! are fanned out. A route with no trips, a failed trip list, or no usable
//! position is inactive.
//!
//! Results are kept per stop in a bounded moka cache and reused until the
//! caller forces a new probe.

use std::sync::Arc;

use moka::future::Cache as MokaCache;
use tracing::debug;

use crate::cache::TransitCacheClient;
use crate::fanout::FanoutJoin;
use crate::model::Route;
use crate::service::ServiceResult;
use crate::telemetry::EngineMetrics;

/// Routes of a stop that had a live vehicle when probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRoutes {
    pub stop_id: String,
    /// In the order of the probed candidate list.
    pub route_ids: Vec<String>,
}

impl ActiveRoutes {
    pub fn contains(&self, route_id: &str) -> bool {
        self.route_ids.iter().any(|id| id == route_id)
    }
}

/// Probes candidate routes for live vehicles.
pub struct ActiveRouteProbe {
    cache: Arc<TransitCacheClient>,
    results: MokaCache<String, Arc<ActiveRoutes>>,
    metrics: Arc<EngineMetrics>,
    freshness_secs: u64,
    concurrency: usize,
}

impl ActiveRouteProbe {
    /// Create a probe.
    ///
    /// # Arguments
    ///
    /// * `cache` - Shared transit cache (trip lists are memoized there)
    /// * `capacity` - Number of stops whose results are kept
    /// * `freshness_secs` - Freshness passed to position lookups
    /// * `concurrency` - Per-route fan-out concurrency (0 = unbounded)
    /// * `metrics` - Metrics for probe reporting
    pub fn new(
        cache: Arc<TransitCacheClient>,
        capacity: u64,
        freshness_secs: u64,
        concurrency: usize,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            cache,
            results: MokaCache::builder().max_capacity(capacity).build(),
            metrics,
            freshness_secs,
            concurrency,
        }
    }

    /// Active routes among `routes` for `stop_id`.
    ///
    /// Reuses the stored result for the stop unless `force` is set.
    pub async fn probe(&self, stop_id: &str, routes: &[Route], force: bool) -> Arc<ActiveRoutes> {
        if !force {
            if let Some(found) = self.results.get(stop_id).await {
                self.metrics.probe_reused();
                debug!(stop_id, active = found.route_ids.len(), "Reusing probe result");
                return found;
            }
        }

        self.metrics.probe_run();
        let result = Arc::new(self.evaluate(stop_id, routes).await);
        self.results
            .insert(stop_id.to_string(), Arc::clone(&result))
            .await;
        result
    }

    /// The stored result for a stop, if any.
    pub async fn cached(&self, stop_id: &str) -> Option<Arc<ActiveRoutes>> {
        self.results.get(stop_id).await
    }

    pub async fn invalidate(&self, stop_id: &str) {
        self.results.invalidate(stop_id).await;
    }

    async fn evaluate(&self, stop_id: &str, routes: &[Route]) -> ActiveRoutes {
        if routes.is_empty() {
            return ActiveRoutes {
                stop_id: stop_id.to_string(),
                route_ids: Vec::new(),
            };
        }

        let join = FanoutJoin::run(
            routes.iter().map(|route| self.route_is_active(&route.route_id)),
            0,
        )
        .await;
        self.metrics.fanout_completed(join.len(), join.failures());

        let route_ids: Vec<String> = routes
            .iter()
            .zip(join.into_outcomes())
            .filter(|(_, active)| *active == Some(true))
            .map(|(route, _)| route.route_id.clone())
            .collect();

        debug!(
            stop_id,
            candidates = routes.len(),
            active = route_ids.len(),
            "Probed active routes"
        );
        ActiveRoutes {
            stop_id: stop_id.to_string(),
            route_ids,
        }
    }

    async fn route_is_active(&self, route_id: &str) -> ServiceResult<bool> {
        let trips = self.cache.trips_by_route(route_id).await?;
        if trips.is_empty() {
            return Ok(false);
        }

        let join = FanoutJoin::run(
            self.cache.vehicle_position_lookups(&trips, self.freshness_secs),
            self.concurrency,
        )
        .await;
        self.metrics.fanout_completed(join.len(), join.failures());
        Ok(join.into_values().any(|position| position.is_usable()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachePolicy;
    use crate::model::VehiclePosition;
    use crate::service::scripted::{self, ScriptedService};

    fn probe(service: &Arc<ScriptedService>) -> (ActiveRouteProbe, Arc<EngineMetrics>) {
        let metrics = Arc::new(EngineMetrics::new());
        let cache = Arc::new(TransitCacheClient::new(
            service.clone(),
            CachePolicy::default(),
            5,
            Arc::clone(&metrics),
        ));
        (
            ActiveRouteProbe::new(cache, 16, 84_600, 0, Arc::clone(&metrics)),
            metrics,
        )
    }

    #[tokio::test]
    async fn test_route_without_trips_is_inactive() {
        let service = ScriptedService::new();
        service.set_trips("R1", Ok(vec![]));
        service.set_trips("R2", Ok(vec![scripted::trip("T2")]));
        service.set_position("T2", Ok(VehiclePosition::at("T2", 59.3, 18.0)));
        let (probe, _) = probe(&service);

        let routes = vec![scripted::route("R1"), scripted::route("R2")];
        let active = probe.probe("S1", &routes, false).await;
        assert_eq!(active.route_ids, vec!["R2"]);
        assert!(active.contains("R2"));
        assert!(!active.contains("R1"));
    }

    #[tokio::test]
    async fn test_failed_lookups_make_route_inactive() {
        let service = ScriptedService::new();
        service.set_trips("R1", Err(scripted::unavailable()));
        service.set_trips("R2", Ok(vec![scripted::trip("T2"), scripted::trip("T3")]));
        service.set_position("T2", Err(scripted::unavailable()));
        service.set_trips("R3", Ok(vec![scripted::trip("T4"), scripted::trip("T5")]));
        service.set_position("T5", Ok(VehiclePosition::at("T5", 59.3, 18.0)));
        let (probe, _) = probe(&service);

        let routes = vec![
            scripted::route("R1"),
            scripted::route("R2"),
            scripted::route("R3"),
        ];
        let active = probe.probe("S1", &routes, false).await;
        assert_eq!(active.route_ids, vec!["R3"]);
    }

    #[tokio::test]
    async fn test_second_probe_reuses_result_unless_forced() {
        let service = ScriptedService::new();
        service.set_trips("R1", Ok(vec![scripted::trip("T1")]));
        service.set_position("T1", Ok(VehiclePosition::at("T1", 59.3, 18.0)));
        let (probe, metrics) = probe(&service);
        let routes = vec![scripted::route("R1")];

        probe.probe("S1", &routes, false).await;
        let calls = service.total_calls();
        let again = probe.probe("S1", &routes, false).await;
        assert_eq!(service.total_calls(), calls);
        assert_eq!(again.route_ids, vec!["R1"]);

        service.set_position("T1", Ok(VehiclePosition::unknown("T1")));
        let forced = probe.probe("S1", &routes, true).await;
        assert!(forced.route_ids.is_empty());
        assert_eq!(service.calls("position:T1"), 2);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.probes_run, 2);
        assert_eq!(snapshot.probes_reused, 1);
    }

    #[tokio::test]
    async fn test_empty_candidates_issue_no_calls() {
        let service = ScriptedService::new();
        let (probe, _) = probe(&service);
        let active = probe.probe("S1", &[], false).await;
        assert!(active.route_ids.is_empty());
        assert_eq!(service.total_calls(), 0);
    }
}

//! HTTP implementation of the transit data service.

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{BoxFuture, ServiceError, ServiceResult, TransitService};
use crate::model::{
    BoundingBox, Route, RouteGeometry, RouteSchedule, Stop, Trip, TripShape, TripStops,
    VehiclePosition,
};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Transit data service backed by the REST backend.
///
/// Endpoints are resolved relative to `base_url`, e.g. with a base of
/// `http://localhost:8080/api` trips of route `1A` are fetched from
/// `http://localhost:8080/api/routes/1A/trips`.
#[derive(Debug, Clone)]
pub struct HttpTransitService {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransitService {
    /// Creates a service with the default timeout.
    pub fn new(base_url: &str) -> ServiceResult<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a service with a custom request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> ServiceResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ServiceError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::InvalidUrl(format!(
                "{} cannot be used as a base URL",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds an endpoint URL from path segments and query parameters.
    ///
    /// Segments are percent-encoded, so identifiers containing `/` or spaces
    /// stay within their segment.
    fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> ServiceResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ServiceError::InvalidUrl(self.base_url.to_string()))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> ServiceResult<T> {
        debug!(url = %url, "GET");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| map_transport_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| map_transport_error(&url, e))?;

        serde_json::from_slice(&body).map_err(|e| ServiceError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

fn map_transport_error(url: &Url, err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        ServiceError::Timeout {
            url: url.to_string(),
        }
    } else {
        ServiceError::Transport(err.to_string())
    }
}

impl TransitService for HttpTransitService {
    fn stops_in_rect(&self, bbox: BoundingBox) -> BoxFuture<'_, ServiceResult<Vec<Stop>>> {
        Box::pin(async move {
            let url = self.endpoint(
                &["stops", "in-rect"],
                &[
                    ("topLeftLat", bbox.top_left_lat.to_string()),
                    ("topLeftLon", bbox.top_left_lon.to_string()),
                    ("bottomRightLat", bbox.bottom_right_lat.to_string()),
                    ("bottomRightLon", bbox.bottom_right_lon.to_string()),
                ],
            )?;
            self.get_json(url).await
        })
    }

    fn routes_through_stop<'a>(
        &'a self,
        stop_id: &'a str,
    ) -> BoxFuture<'a, ServiceResult<Vec<Route>>> {
        Box::pin(async move {
            let url = self.endpoint(&["stops", stop_id, "routes"], &[])?;
            self.get_json(url).await
        })
    }

    fn route_schedule_at_stop<'a>(
        &'a self,
        stop_id: &'a str,
        route_id: &'a str,
        date: NaiveDate,
    ) -> BoxFuture<'a, ServiceResult<RouteSchedule>> {
        Box::pin(async move {
            let url = self.endpoint(
                &["stops", stop_id, "routes", route_id, "times"],
                &[("date", date.format("%Y-%m-%d").to_string())],
            )?;
            self.get_json(url).await
        })
    }

    fn route_geometry<'a>(
        &'a self,
        route_id: &'a str,
    ) -> BoxFuture<'a, ServiceResult<RouteGeometry>> {
        Box::pin(async move {
            let url = self.endpoint(&["routes", route_id, "geometry"], &[])?;
            self.get_json(url).await
        })
    }

    fn trips_by_route<'a>(&'a self, route_id: &'a str) -> BoxFuture<'a, ServiceResult<Vec<Trip>>> {
        Box::pin(async move {
            let url = self.endpoint(&["routes", route_id, "trips"], &[])?;
            self.get_json(url).await
        })
    }

    fn vehicle_position<'a>(
        &'a self,
        trip_id: &'a str,
        freshness_secs: u64,
    ) -> BoxFuture<'a, ServiceResult<VehiclePosition>> {
        Box::pin(async move {
            let url = self.endpoint(
                &["position_redis", trip_id],
                &[("freshSeconds", freshness_secs.to_string())],
            )?;
            self.get_json(url).await
        })
    }

    fn trip_shape<'a>(&'a self, trip_id: &'a str) -> BoxFuture<'a, ServiceResult<TripShape>> {
        Box::pin(async move {
            let url = self.endpoint(&["trips", trip_id, "shape"], &[])?;
            self.get_json(url).await
        })
    }

    fn trip_stops<'a>(&'a self, trip_id: &'a str) -> BoxFuture<'a, ServiceResult<TripStops>> {
        Box::pin(async move {
            let url = self.endpoint(&["trips", trip_id, "stops"], &[])?;
            self.get_json(url).await
        })
    }
}

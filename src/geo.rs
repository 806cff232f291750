//! Delivery-radius validation backed by a geocoding/routing service.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

use crate::{AddressSide, Error, Result};

pub const DEFAULT_RADIUS_METERS: u64 = 5_000;

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct Coordinate {
    pub lng: f64,
    pub lat: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("map service returned status {0}")]
    Status(String),
    #[error("map request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed map response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait MapClient: Send + Sync {
    async fn geocode(&self, address: &str) -> std::result::Result<Coordinate, MapError>;

    /// Driving distance in meters.
    async fn route(&self, origin: Coordinate, destination: Coordinate) -> std::result::Result<u64, MapError>;
}

#[derive(Clone)]
pub struct GeoValidator {
    client: Arc<dyn MapClient>,
    max_radius_m: u64,
}

impl GeoValidator {
    pub fn new(client: Arc<dyn MapClient>, max_radius_m: u64) -> Self { Self { client, max_radius_m } }

    /// Resolves both addresses and checks the routed distance. Returns the
    /// distance in meters when the customer is inside the radius.
    #[instrument(skip(self))]
    pub async fn validate_deliverable(&self, shop_address: &str, customer_address: &str) -> Result<u64> {
        let shop = self.client.geocode(shop_address).await.map_err(|e| {
            warn!(error = %e, "shop address geocoding failed");
            Error::AddressUnresolvable(AddressSide::Shop)
        })?;
        let customer = self.client.geocode(customer_address).await.map_err(|e| {
            warn!(error = %e, "customer address geocoding failed");
            Error::AddressUnresolvable(AddressSide::Customer)
        })?;
        let distance_m = self.client.route(shop, customer).await.map_err(|e| {
            warn!(error = %e, "route planning failed");
            Error::RoutingFailed
        })?;
        if distance_m > self.max_radius_m {
            return Err(Error::OutOfRange { distance_m, limit_m: self.max_radius_m });
        }
        Ok(distance_m)
    }
}

/// Client for the Baidu map web API (geocoding v3 and lite driving directions).
#[derive(Clone)]
pub struct BaiduMapClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct Envelope<T> {
    status: serde_json::Value,
    result: Option<T>,
}

#[derive(Deserialize)]
struct GeocodeResult {
    location: Coordinate,
}

#[derive(Deserialize)]
struct RouteResult {
    routes: Vec<Route>,
}

#[derive(Deserialize)]
struct Route {
    distance: u64,
}

impl<T> Envelope<T> {
    fn into_result(self) -> std::result::Result<T, MapError> {
        let ok = self.status.as_i64() == Some(0) || self.status.as_str() == Some("0");
        if !ok { return Err(MapError::Status(self.status.to_string())); }
        self.result.ok_or_else(|| MapError::Malformed("missing result".into()))
    }
}

impl BaiduMapClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> std::result::Result<Self, MapError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url: base_url.into().trim_end_matches('/').to_string(), api_key: api_key.into() })
    }
}

#[async_trait]
impl MapClient for BaiduMapClient {
    async fn geocode(&self, address: &str) -> std::result::Result<Coordinate, MapError> {
        let envelope: Envelope<GeocodeResult> = self
            .http
            .get(format!("{}/geocoding/v3", self.base_url))
            .query(&[("address", address), ("output", "json"), ("ak", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(envelope.into_result()?.location)
    }

    async fn route(&self, origin: Coordinate, destination: Coordinate) -> std::result::Result<u64, MapError> {
        let origin = format!("{},{}", origin.lat, origin.lng);
        let destination = format!("{},{}", destination.lat, destination.lng);
        let envelope: Envelope<RouteResult> = self
            .http
            .get(format!("{}/directionlite/v1/driving", self.base_url))
            .query(&[
                ("origin", origin.as_str()),
                ("destination", destination.as_str()),
                ("steps_info", "0"),
                ("ak", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        envelope
            .into_result()?
            .routes
            .first()
            .map(|r| r.distance)
            .ok_or_else(|| MapError::Malformed("no routes".into()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Map fake keyed by address text; unknown addresses fail to resolve.
    pub(crate) struct FakeMap {
        pub coords: HashMap<String, Coordinate>,
        pub distance_m: Option<u64>,
    }

    impl FakeMap {
        pub(crate) fn with(shop: &str, customer: &str, distance_m: Option<u64>) -> Self {
            let mut coords = HashMap::new();
            coords.insert(shop.to_string(), Coordinate { lng: 116.30, lat: 39.98 });
            coords.insert(customer.to_string(), Coordinate { lng: 116.31, lat: 39.99 });
            Self { coords, distance_m }
        }
    }

    #[async_trait]
    impl MapClient for FakeMap {
        async fn geocode(&self, address: &str) -> std::result::Result<Coordinate, MapError> {
            self.coords.get(address).copied().ok_or_else(|| MapError::Status("1".into()))
        }

        async fn route(&self, _: Coordinate, _: Coordinate) -> std::result::Result<u64, MapError> {
            self.distance_m.ok_or_else(|| MapError::Status("2".into()))
        }
    }

    fn validator(map: FakeMap) -> GeoValidator { GeoValidator::new(Arc::new(map), DEFAULT_RADIUS_METERS) }

    #[tokio::test]
    async fn test_inside_radius() {
        let v = validator(FakeMap::with("shop", "home", Some(5_000)));
        assert_eq!(v.validate_deliverable("shop", "home").await.unwrap(), 5_000);
    }

    #[tokio::test]
    async fn test_out_of_range() {
        let v = validator(FakeMap::with("shop", "home", Some(5_001)));
        let err = v.validate_deliverable("shop", "home").await.unwrap_err();
        assert!(matches!(err, Error::OutOfRange { distance_m: 5_001, limit_m: 5_000 }));
    }

    #[tokio::test]
    async fn test_unresolvable_sides() {
        let v = validator(FakeMap::with("shop", "home", Some(10)));
        assert!(matches!(
            v.validate_deliverable("nowhere", "home").await,
            Err(Error::AddressUnresolvable(AddressSide::Shop))
        ));
        assert!(matches!(
            v.validate_deliverable("shop", "moon").await,
            Err(Error::AddressUnresolvable(AddressSide::Customer))
        ));
    }

    #[tokio::test]
    async fn test_routing_failure() {
        let v = validator(FakeMap::with("shop", "home", None));
        assert!(matches!(v.validate_deliverable("shop", "home").await, Err(Error::RoutingFailed)));
    }

    #[test]
    fn test_envelope_status() {
        let ok: Envelope<GeocodeResult> =
            serde_json::from_str(r#"{"status":0,"result":{"location":{"lng":1.5,"lat":2.5}}}"#).unwrap();
        assert_eq!(ok.into_result().unwrap().location, Coordinate { lng: 1.5, lat: 2.5 });
        let bad: Envelope<GeocodeResult> = serde_json::from_str(r#"{"status":302,"message":"quota"}"#).unwrap();
        assert!(matches!(bad.into_result(), Err(MapError::Status(_))));
    }
}

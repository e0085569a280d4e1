//! services/api/src/adapters/geocoder.rs
//!
//! This module contains the adapter for the Nominatim (OpenStreetMap) search API.
//! It implements the `GeocodingService` port from the `core` crate.

use async_trait::async_trait;
use resource_board_core::ports::{GeocodingService, PortError, PortResult};
use resource_board_core::Coordinates;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `GeocodingService` port using a Nominatim search endpoint.
#[derive(Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    endpoint: String,
}

impl NominatimGeocoder {
    /// Creates a new `NominatimGeocoder`. Nominatim's usage policy requires an
    /// identifying user agent.
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

/// One search hit. Nominatim returns coordinates as decimal strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

/// Converts search hits to coordinates, keeping their order and skipping
/// hits whose coordinates don't parse.
fn to_coordinates(places: Vec<Place>) -> Vec<Coordinates> {
    places
        .into_iter()
        .filter_map(|place| {
            let lat = place.lat.trim().parse().ok()?;
            let lng = place.lon.trim().parse().ok()?;
            Some(Coordinates::new(lat, lng)).filter(Coordinates::is_valid)
        })
        .collect()
}

//=========================================================================================
// `GeocodingService` Trait Implementation
//=========================================================================================

#[async_trait]
impl GeocodingService for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> PortResult<Vec<Coordinates>> {
        let lookup_failed = |e: reqwest::Error| PortError::ExternalLookupFailed(e.to_string());

        let places: Vec<Place> = self
            .client
            .get(&self.endpoint)
            .query(&[("format", "json"), ("q", address)])
            .send()
            .await
            .map_err(lookup_failed)?
            .error_for_status()
            .map_err(lookup_failed)?
            .json()
            .await
            .map_err(lookup_failed)?;

        let candidates = to_coordinates(places);
        debug!(address, candidates = candidates.len(), "Geocoding finished");
        Ok(candidates)
    }
}

//! Address to coordinate lookup.
//!
//! The rest of the crate only sees the [`Geocoder`] trait: a lookup that
//! either yields a valid [`Position`] or nothing. Failures are logged here and
//! never propagate, so a bad address only ever drops its own row.

use std::time::Duration;

use log::{debug, warn};
use reqwest::blocking::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::GeocoderConfig;
use crate::core::geo::Position;

/// Errors that can occur during a single lookup.
#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("no API key configured (set `geocoder.api_key` or ${0})")]
    MissingApiKey(String),

    #[error("address is empty")]
    EmptyAddress,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("geocoder returned status {status}{}", detail_suffix(.detail))]
    Status {
        status: String,
        detail: Option<String>,
    },

    #[error("geocoder returned no results")]
    NoResults,

    #[error("geocoder returned invalid coordinates ({lat}, {lng})")]
    InvalidCoordinates { lat: f64, lng: f64 },
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

/// Result type for geocoding operations.
pub type Result<T> = std::result::Result<T, GeocodeError>;

/// Opaque address → coordinate lookup.
pub trait Geocoder: Send + Sync {
    /// Resolve an address, returning `None` when it cannot be located.
    fn resolve(&self, address: &str) -> Option<Position>;
}

impl<F> Geocoder for F
where
    F: Fn(&str) -> Option<Position> + Send + Sync,
{
    fn resolve(&self, address: &str) -> Option<Position> {
        self(address)
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Position,
}

/// Extract the first result's location from a Geocoding API response body.
fn parse_response(response: GeocodeResponse) -> Result<Position> {
    if response.status != "OK" {
        return Err(GeocodeError::Status {
            status: response.status,
            detail: response.error_message,
        });
    }
    let location = response
        .results
        .into_iter()
        .next()
        .map(|r| r.geometry.location)
        .ok_or(GeocodeError::NoResults)?;

    Position::checked(location.lat, location.lng).ok_or(GeocodeError::InvalidCoordinates {
        lat: location.lat,
        lng: location.lng,
    })
}

/// Client for the Google Maps Geocoding JSON API.
pub struct GoogleGeocoder {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GoogleGeocoder {
    /// Build a client from configuration.
    ///
    /// The key is taken from `config.api_key`, falling back to the environment
    /// variable named by `config.api_key_env`.
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty()))
            .ok_or_else(|| GeocodeError::MissingApiKey(config.api_key_env.clone()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
        })
    }

    /// Look up one address, reporting why it failed.
    pub fn lookup(&self, address: &str) -> Result<Position> {
        let address = address.trim();
        if address.is_empty() {
            return Err(GeocodeError::EmptyAddress);
        }

        let response: GeocodeResponse = self
            .client
            .get(&self.endpoint)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()?
            .error_for_status()?
            .json()?;

        parse_response(response)
    }
}

impl Geocoder for GoogleGeocoder {
    fn resolve(&self, address: &str) -> Option<Position> {
        match self.lookup(address) {
            Ok(position) => {
                debug!("geocoded '{}' -> ({}, {})", address, position.lat, position.lng);
                Some(position)
            }
            Err(e) => {
                warn!("could not geocode '{}': {}", address, e);
                None
            }
        }
    }
}

//! HTTP client for the Google Elevation API.
//!
//! Implements [`ElevationSource`] with:
//! - a pooled `reqwest` client with request timeout and TCP keepalive
//! - single-location lookups (`locations=lat,lng`)
//! - path lookups sent as an encoded polyline (`path=enc:...&samples=N`)
//!
//! Failures are reported once and never retried; the caller decides what to
//! show and whether to ask again.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, Request};
use serde::Deserialize;

use crate::elevation::{ElevationSampler, ElevationServiceError, ElevationSource};
use crate::geo_utils::encode_polyline;
use crate::{ElevationConfig, ElevationProfile, GeoPoint};

const STATUS_OK: &str = "OK";

/// API response for the elevation endpoint
#[derive(Debug, Deserialize)]
struct ElevationApiResponse {
    status: String,
    #[serde(default)]
    results: Vec<ElevationApiResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ElevationApiResult {
    elevation: f64,
}

/// Elevation lookups against `maps.googleapis.com` (or a compatible endpoint).
pub struct GoogleElevationClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GoogleElevationClient {
    /// Create a client from `config`.
    pub fn new(config: &ElevationConfig) -> Result<Self, ElevationServiceError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ElevationServiceError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/json", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
        })
    }

    /// Sampler backed by a client built from `config`, using its sample count.
    pub fn sampler(config: &ElevationConfig) -> Result<ElevationSampler<Self>, ElevationServiceError> {
        let client = Self::new(config)?;
        Ok(ElevationSampler::with_trace_samples(client, config.trace_samples as usize))
    }

    fn single_request(&self, point: &GeoPoint) -> Result<Request, ElevationServiceError> {
        self.client
            .get(&self.endpoint)
            .query(&[
                ("locations", format!("{},{}", point.latitude, point.longitude)),
                ("key", self.api_key.clone()),
            ])
            .build()
            .map_err(|e| ElevationServiceError::Request(e.to_string()))
    }

    fn path_request(&self, path: &[GeoPoint], samples: usize) -> Result<Request, ElevationServiceError> {
        let encoded = encode_polyline(path).map_err(ElevationServiceError::Encoding)?;
        self.client
            .get(&self.endpoint)
            .query(&[
                ("path", format!("enc:{}", encoded)),
                ("samples", samples.to_string()),
                ("key", self.api_key.clone()),
            ])
            .build()
            .map_err(|e| ElevationServiceError::Request(e.to_string()))
    }

    async fn execute(&self, request: Request) -> Result<Vec<f64>, ElevationServiceError> {
        let req_start = Instant::now();

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| ElevationServiceError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("[ElevationClient] HTTP {} after {:?}", status, req_start.elapsed());
            return Err(ElevationServiceError::Http { status: status.as_u16() });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ElevationServiceError::Request(format!("Body download error: {}", e)))?;

        let elevations = parse_response(&bytes)?;

        info!(
            "[ElevationClient] {} elevations ({:.1}KB) in {:?}",
            elevations.len(),
            bytes.len() as f64 / 1024.0,
            req_start.elapsed()
        );

        Ok(elevations)
    }
}

#[async_trait]
impl ElevationSource for GoogleElevationClient {
    async fn elevation_at(&self, point: GeoPoint) -> Result<f64, ElevationServiceError> {
        let request = self.single_request(&point)?;
        let elevations = self.execute(request).await?;
        elevations
            .first()
            .copied()
            .ok_or(ElevationServiceError::MissingSamples { expected: 1, received: 0 })
    }

    async fn elevations_along(
        &self,
        path: &[GeoPoint],
        samples: usize,
    ) -> Result<Vec<f64>, ElevationServiceError> {
        let request = self.path_request(path, samples)?;
        debug!("[ElevationClient] path request for {} points, {} samples", path.len(), samples);
        self.execute(request).await
    }
}

/// Parse an elevation API body into elevations in meters, in result order.
fn parse_response(bytes: &[u8]) -> Result<Vec<f64>, ElevationServiceError> {
    let data: ElevationApiResponse = serde_json::from_slice(bytes)
        .map_err(|e| ElevationServiceError::Parse(format!("JSON parse error: {}", e)))?;

    if data.status != STATUS_OK {
        let message = data.error_message.unwrap_or_default();
        warn!("[ElevationClient] provider error {}: {}", data.status, message);
        return Err(ElevationServiceError::Provider { status: data.status, message });
    }

    Ok(data.results.into_iter().map(|r| r.elevation).collect())
}

/// Synchronous wrapper for FFI - builds a client and runs the lookup on a fresh runtime.
pub fn fetch_elevation_profile_sync(
    config: &ElevationConfig,
    points: &[GeoPoint],
) -> Result<ElevationProfile, ElevationServiceError> {
    let sampler = GoogleElevationClient::sampler(config)?;
    crate::elevation::sample_trace_blocking(&sampler, points)
}

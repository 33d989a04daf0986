//! # Elevation Sampling
//!
//! Elevation lookups for a trace, with a per-point cache and background dispatch.
//!
//! The sampler talks to an [`ElevationSource`] (the Google Elevation API client in
//! [`crate::http`], or a test double) and derives an [`ElevationProfile`]:
//!
//! - no points: an empty profile, no request
//! - one point: a single-location lookup, answered from the cache when possible
//! - two or more points: one path request for a fixed number of evenly spaced
//!   samples along the trace
//!
//! Remote lookups must not run on the foreground (UI) sequence. [`spawn_profile`]
//! runs a request on a tokio worker and posts the [`ElevationUpdate`] back over a
//! channel the foreground drains, unless the request's [`ActiveFlag`] was
//! cleared in the meantime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::GeoPoint;

/// Number of evenly spaced samples requested along a path.
pub const DEFAULT_TRACE_SAMPLES: usize = 20;

/// Failure of an elevation lookup. Any error aborts the whole sampling call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ElevationServiceError {
    /// The request could not be sent or the body could not be read.
    #[error("elevation request failed: {0}")]
    Request(String),

    /// The service answered with a non-success HTTP status.
    #[error("elevation service returned HTTP {status}")]
    Http { status: u16 },

    /// The service answered but reported an error of its own.
    #[error("elevation service error {status}: {message}")]
    Provider { status: String, message: String },

    /// The response body was not what the service documents.
    #[error("malformed elevation response: {0}")]
    Parse(String),

    /// A path lookup returned a different number of samples than requested.
    #[error("expected {expected} elevation samples, received {received}")]
    MissingSamples { expected: usize, received: usize },

    /// The path could not be encoded for the request.
    #[error("cannot encode path: {0}")]
    Encoding(String),

    /// No async runtime was available to run the lookup.
    #[error("cannot start elevation runtime: {0}")]
    Runtime(String),
}

/// Remote elevation lookups.
#[async_trait]
pub trait ElevationSource: Send + Sync {
    /// Elevation in meters at a single location.
    async fn elevation_at(&self, point: GeoPoint) -> Result<f64, ElevationServiceError>;

    /// `samples` elevations in meters, evenly spaced along `path` from its first
    /// to its last point.
    async fn elevations_along(
        &self,
        path: &[GeoPoint],
        samples: usize,
    ) -> Result<Vec<f64>, ElevationServiceError>;
}

/// Elevation samples along a trace with the cumulative climb and drop.
///
/// Both `total_ascent` and `total_descent` are non-negative magnitudes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ElevationProfile {
    /// Elevations in meters, in path order
    pub samples: Vec<f64>,
    /// Sum of all rises between consecutive samples
    pub total_ascent: f64,
    /// Sum of all drops between consecutive samples
    pub total_descent: f64,
}

impl ElevationProfile {
    /// Build a profile from ordered samples, aggregating ascent and descent.
    pub fn from_samples(samples: Vec<f64>) -> Self {
        let (total_ascent, total_descent) = samples
            .windows(2)
            .map(|w| w[1] - w[0])
            .fold((0.0, 0.0), |(up, down), diff| {
                if diff > 0.0 {
                    (up + diff, down)
                } else {
                    (up, down - diff)
                }
            });
        Self { samples, total_ascent, total_descent }
    }

    /// Elevation at the end of the path, if any sample exists.
    pub fn last_elevation(&self) -> Option<f64> {
        self.samples.last().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Cache key: the exact bit pattern of both coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PointKey(u64, u64);

impl From<&GeoPoint> for PointKey {
    fn from(p: &GeoPoint) -> Self {
        PointKey(p.latitude.to_bits(), p.longitude.to_bits())
    }
}

/// Samples elevations from an [`ElevationSource`], caching single-point results.
///
/// The cache is unbounded: keys are points a person tapped on a map, and
/// elevation data does not go stale.
pub struct ElevationSampler<S> {
    source: S,
    cache: Mutex<HashMap<PointKey, f64>>,
    trace_samples: usize,
}

impl<S: ElevationSource> ElevationSampler<S> {
    pub fn new(source: S) -> Self {
        Self::with_trace_samples(source, DEFAULT_TRACE_SAMPLES)
    }

    /// Use `trace_samples` samples for path lookups instead of the default 20.
    pub fn with_trace_samples(source: S, trace_samples: usize) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
            trace_samples: trace_samples.max(2),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn trace_samples(&self) -> usize {
        self.trace_samples
    }

    /// Number of cached single-point elevations.
    pub fn cached_len(&self) -> usize {
        self.lock_cache().len()
    }

    /// Cached elevation for `point`, without touching the network.
    pub fn cached(&self, point: &GeoPoint) -> Option<f64> {
        self.lock_cache().get(&PointKey::from(point)).copied()
    }

    // Entries are plain values, so a poisoned lock is still usable
    fn lock_cache(&self) -> MutexGuard<'_, HashMap<PointKey, f64>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Elevation in meters at `point`; a cache hit skips the network entirely.
    pub async fn sample_single(&self, point: GeoPoint) -> Result<f64, ElevationServiceError> {
        if let Some(elevation) = self.cached(&point) {
            debug!(
                "[ElevationSampler] cache hit ({:.6}, {:.6}) -> {:.1}m",
                point.latitude, point.longitude, elevation
            );
            return Ok(elevation);
        }

        let elevation = self.source.elevation_at(point).await?;
        // Racing lookups for the same point write the same value
        self.lock_cache().insert(PointKey::from(&point), elevation);

        debug!(
            "[ElevationSampler] fetched ({:.6}, {:.6}) -> {:.1}m",
            point.latitude, point.longitude, elevation
        );
        Ok(elevation)
    }

    /// Elevation profile of a trace. All or nothing: any error discards the call.
    pub async fn sample_trace(&self, points: &[GeoPoint]) -> Result<ElevationProfile, ElevationServiceError> {
        match points {
            [] => Ok(ElevationProfile::default()),
            [single] => {
                let elevation = self.sample_single(*single).await?;
                Ok(ElevationProfile::from_samples(vec![elevation]))
            }
            path => {
                let start = Instant::now();
                let samples = self.source.elevations_along(path, self.trace_samples).await?;
                if samples.len() != self.trace_samples {
                    return Err(ElevationServiceError::MissingSamples {
                        expected: self.trace_samples,
                        received: samples.len(),
                    });
                }
                let profile = ElevationProfile::from_samples(samples);
                info!(
                    "[ElevationSampler] {} points -> {} samples, +{:.1}m/-{:.1}m in {:?}",
                    path.len(),
                    profile.samples.len(),
                    profile.total_ascent,
                    profile.total_descent,
                    start.elapsed()
                );
                Ok(profile)
            }
        }
    }
}

// ============================================================================
// Background Dispatch
// ============================================================================

/// Liveness of whoever will receive an elevation result.
///
/// Cleared when the receiving session is torn down; results for a cleared
/// flag are dropped instead of delivered.
#[derive(Debug, Clone)]
pub struct ActiveFlag(Arc<AtomicBool>);

impl ActiveFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn deactivate(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for ActiveFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of the trace to sample, tagged with the trace generation it was taken at.
#[derive(Debug, Clone)]
pub struct ElevationRequest {
    pub points: Vec<GeoPoint>,
    pub generation: u64,
    pub active: ActiveFlag,
}

/// Result of an [`ElevationRequest`], posted back to the foreground.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationUpdate {
    pub generation: u64,
    pub result: Result<ElevationProfile, ElevationServiceError>,
}

/// Run `request` on `runtime` and post the outcome to `sender`.
///
/// Nothing is sent if the request's [`ActiveFlag`] has been cleared by the
/// time the lookup finishes, or if the receiver is gone.
pub fn spawn_profile<S>(
    sampler: Arc<ElevationSampler<S>>,
    runtime: &Handle,
    request: ElevationRequest,
    sender: UnboundedSender<ElevationUpdate>,
) -> JoinHandle<()>
where
    S: ElevationSource + 'static,
{
    runtime.spawn(async move {
        let result = sampler.sample_trace(&request.points).await;
        if let Err(ref e) = result {
            warn!("[ElevationSampler] generation {} failed: {}", request.generation, e);
        }

        if !request.active.is_active() {
            debug!(
                "[ElevationSampler] dropping result for generation {}, receiver inactive",
                request.generation
            );
            return;
        }

        let update = ElevationUpdate { generation: request.generation, result };
        if sender.send(update).is_err() {
            debug!("[ElevationSampler] receiver closed before generation {} arrived", request.generation);
        }
    })
}

/// Synchronous wrapper for callers without a runtime (FFI).
///
/// Must not be called from async code: inside a tokio runtime this returns
/// [`ElevationServiceError::Runtime`] instead of blocking a worker.
pub fn sample_trace_blocking<S: ElevationSource>(
    sampler: &ElevationSampler<S>,
    points: &[GeoPoint],
) -> Result<ElevationProfile, ElevationServiceError> {
    use tokio::runtime::Builder;

    if Handle::try_current().is_ok() {
        return Err(ElevationServiceError::Runtime(
            "blocking elevation lookup called from within an async runtime".to_string(),
        ));
    }

    let rt = Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|e| ElevationServiceError::Runtime(e.to_string()))?;

    rt.block_on(sampler.sample_trace(points))
}

// ============================================================================
// Tests
// ============================================================================

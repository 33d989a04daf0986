//! # Maps Measure
//!
//! Measurement core for map tracing apps: tap points on a map, get the
//! distance along them, the area they enclose and the elevation gained and
//! lost along the way.
//!
//! This library provides:
//! - Spherical geometry (haversine distance, polygon area, destination point)
//! - A point stack with incrementally maintained path length
//! - Metric/imperial display strings with automatic scale selection
//! - Cached elevation sampling with background dispatch
//! - Trace file persistence and user settings
//!
//! ## Features
//!
//! - **`http`** - Enable the Google Elevation API client
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use maps_measure::{GeoPoint, MeasureSession, MeasureType, Settings};
//!
//! let mut session = MeasureSession::new(Settings::default());
//! session.add_point(GeoPoint::new(51.5000, -0.1300));
//! session.add_point(GeoPoint::new(51.5000, -0.1200));
//! session.add_point(GeoPoint::new(51.5060, -0.1250));
//!
//! println!("Distance: {}", session.display_text());
//!
//! session.set_measure_type(MeasureType::Area).unwrap();
//! println!("Area: {}", session.display_text());
//! ```

use geo::{Coord, Point};
use serde::{Deserialize, Serialize};

pub mod geo_utils;

pub mod trace;
pub use trace::{NoopRenderer, Trace, TraceError, TraceRenderer};

pub mod format;
pub use format::{ConversionTable, MeasurementFormatter, MeasurementUnit, NumberLocale};

pub mod elevation;
pub use elevation::{
    spawn_profile, ActiveFlag, ElevationProfile, ElevationRequest, ElevationSampler,
    ElevationServiceError, ElevationSource, ElevationUpdate,
};

pub mod trace_file;
pub use trace_file::TraceFileError;

pub mod settings;
pub use settings::{CameraPosition, MapType, Settings, SettingsError};

pub mod session;
pub use session::{ElevationOutcome, ElevationState, MeasureSession, SessionError, SessionState};

// HTTP module for elevation lookups
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::GoogleElevationClient;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("MapsMeasureRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A geographic coordinate with latitude and longitude in degrees.
///
/// # Example
/// ```
/// use maps_measure::GeoPoint;
/// let point = GeoPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

impl From<GeoPoint> for Coord<f64> {
    fn from(p: GeoPoint) -> Self {
        Coord { x: p.longitude, y: p.latitude }
    }
}

impl From<Coord<f64>> for GeoPoint {
    fn from(c: Coord<f64>) -> Self {
        GeoPoint::new(c.y, c.x)
    }
}

impl From<GeoPoint> for Point<f64> {
    fn from(p: GeoPoint) -> Self {
        Point::new(p.longitude, p.latitude)
    }
}

/// What the session is currently measuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum MeasureType {
    #[default]
    Distance,
    Area,
    Elevation,
}

/// Configuration for elevation lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct ElevationConfig {
    /// Base URL of the elevation service; `/json` is appended.
    /// Default: Google Maps Elevation API
    pub base_url: String,

    /// API key sent with every request.
    pub api_key: String,

    /// Number of evenly spaced samples requested along a path.
    /// Default: 20
    pub trace_samples: u32,

    /// Request timeout in seconds.
    /// Default: 30
    pub timeout_secs: u64,
}

impl Default for ElevationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://maps.googleapis.com/maps/api/elevation".to_string(),
            api_key: String::new(),
            trace_samples: elevation::DEFAULT_TRACE_SAMPLES as u32,
            timeout_secs: 30,
        }
    }
}

// ============================================================================
// FFI Exports (only when feature enabled)
// ============================================================================

#[cfg(feature = "ffi")]
mod ffi {
    use super::*;
    use log::{info, warn};

    /// Great-circle distance between two points in meters.
    #[uniffi::export]
    pub fn ffi_distance(a: GeoPoint, b: GeoPoint) -> f64 {
        geo_utils::haversine_distance(&a, &b)
    }

    /// Length of a path in meters.
    #[uniffi::export]
    pub fn ffi_path_length(points: Vec<GeoPoint>) -> f64 {
        geo_utils::polyline_length(&points)
    }

    /// Area enclosed by a closed polygon in square meters (absolute value).
    #[uniffi::export]
    pub fn ffi_polygon_area(points: Vec<GeoPoint>) -> f64 {
        geo_utils::polygon_area_abs(&points)
    }

    /// Ring of points for drawing a circle marker.
    #[uniffi::export]
    pub fn ffi_circle_points(center: GeoPoint, radius_meters: f64, segments: u32) -> Vec<GeoPoint> {
        geo_utils::circle_points(&center, radius_meters, segments as usize)
    }

    /// Display string for a distance, using the given locale tag for separators.
    #[uniffi::export]
    pub fn ffi_format_distance(meters: f64, unit: MeasurementUnit, locale_tag: String) -> String {
        MeasurementFormatter::new(NumberLocale::for_tag(&locale_tag)).format_distance(meters, unit)
    }

    /// Display string for an area, using the given locale tag for separators.
    #[uniffi::export]
    pub fn ffi_format_area(sq_meters: f64, unit: MeasurementUnit, locale_tag: String) -> String {
        MeasurementFormatter::new(NumberLocale::for_tag(&locale_tag)).format_area(sq_meters, unit)
    }

    /// Display string for an elevation profile.
    #[uniffi::export]
    pub fn ffi_format_elevation(profile: ElevationProfile, unit: MeasurementUnit, locale_tag: String) -> String {
        MeasurementFormatter::new(NumberLocale::for_tag(&locale_tag)).format_elevation(&profile, unit)
    }

    /// Default measurement unit for a locale tag.
    #[uniffi::export]
    pub fn ffi_default_unit(locale_tag: String) -> MeasurementUnit {
        MeasurementUnit::default_for_locale(&locale_tag)
    }

    /// Parse trace file contents, skipping malformed lines.
    #[uniffi::export]
    pub fn ffi_parse_trace(text: String) -> Vec<GeoPoint> {
        init_logging();
        match trace_file::trace_from_str(&text) {
            Ok(points) => points,
            Err(e) => {
                warn!("[MapsMeasureRust] parse_trace failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Serialize points to trace file contents.
    #[uniffi::export]
    pub fn ffi_serialize_trace(points: Vec<GeoPoint>) -> String {
        trace_file::trace_to_string(&points).unwrap_or_default()
    }

    /// Get default elevation configuration.
    #[uniffi::export]
    pub fn default_elevation_config() -> ElevationConfig {
        ElevationConfig::default()
    }

    /// Result of an elevation lookup for the mobile shell.
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct FfiElevationResult {
        pub profile: Option<ElevationProfile>,
        pub success: bool,
        pub error: Option<String>,
    }

    /// Fetch the elevation profile of a trace. Blocks; call from a worker thread.
    #[uniffi::export]
    pub fn fetch_elevation_profile(config: ElevationConfig, points: Vec<GeoPoint>) -> FfiElevationResult {
        init_logging();
        info!("[MapsMeasureRust] fetch_elevation_profile for {} points", points.len());

        match crate::http::fetch_elevation_profile_sync(&config, &points) {
            Ok(profile) => FfiElevationResult {
                profile: Some(profile),
                success: true,
                error: None,
            },
            Err(e) => {
                warn!("[MapsMeasureRust] elevation lookup failed: {}", e);
                FfiElevationResult {
                    profile: None,
                    success: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_validation() {
        assert!(GeoPoint::new(51.5074, -0.1278).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, 181.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn test_geo_point_coord_conversion() {
        let p = GeoPoint::new(51.5, -0.12);
        let c: Coord<f64> = p.into();
        assert_eq!(c.x, -0.12);
        assert_eq!(c.y, 51.5);
        assert_eq!(GeoPoint::from(c), p);
    }

    #[test]
    fn test_geo_point_json() {
        let p = GeoPoint::new(51.5, -0.12);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#"{"latitude":51.5,"longitude":-0.12}"#);
        assert_eq!(serde_json::from_str::<GeoPoint>(&json).unwrap(), p);
    }

    #[test]
    fn test_elevation_config_defaults() {
        let config = ElevationConfig::default();
        assert_eq!(config.trace_samples, 20);
        assert!(config.base_url.starts_with("https://maps.googleapis.com"));

        let partial: ElevationConfig = serde_json::from_str(r#"{"api_key": "abc"}"#).unwrap();
        assert_eq!(partial.api_key, "abc");
        assert_eq!(partial.timeout_secs, 30);
    }
}

//! # Measure Session
//!
//! The foreground state of one measuring screen: the trace, the user's
//! settings, the number formatter and the last elevation result.
//!
//! Everything here runs on the single foreground sequence and never blocks.
//! Elevation lookups are handed out as [`ElevationRequest`]s for a worker to
//! run (see [`crate::elevation::spawn_profile`]); their results come back
//! through [`MeasureSession::apply_elevation`], which drops anything computed
//! for an older version of the trace or for a session that has shut down.
//!
//! ```rust
//! use maps_measure::{ElevationProfile, ElevationUpdate, GeoPoint, MeasureSession, MeasureType, Settings};
//!
//! let mut session = MeasureSession::new(Settings { pro: true, ..Settings::default() });
//! session.add_point(GeoPoint::new(46.50, 7.90));
//! session.add_point(GeoPoint::new(46.51, 7.92));
//!
//! session.set_measure_type(MeasureType::Elevation).unwrap();
//! assert_eq!(session.display_text(), "Loading...");
//!
//! let request = session.elevation_request();
//! // ... a worker samples request.points ...
//! let update = ElevationUpdate {
//!     generation: request.generation,
//!     result: Ok(ElevationProfile::from_samples(vec![560.0, 610.0, 590.0])),
//! };
//! session.apply_elevation(update);
//! assert_eq!(session.display_text(), "50 m⬆, 20 m⬇\n590 m");
//! ```

use std::path::Path;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::elevation::{ActiveFlag, ElevationProfile, ElevationRequest, ElevationServiceError, ElevationUpdate};
use crate::format::{ConversionTable, MeasurementFormatter, MeasurementUnit};
use crate::settings::{write_json, Settings, SettingsError};
use crate::trace::{NoopRenderer, Trace, TraceError, TraceRenderer};
use crate::{GeoPoint, MeasureType};

/// Shown while an elevation lookup for the current trace is outstanding.
pub const LOADING_TEXT: &str = "Loading...";

/// Errors raised by [`MeasureSession`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Elevation measurement was requested without the pro entitlement.
    #[error("elevation measurement requires the pro version")]
    NotEntitled,

    #[error(transparent)]
    Trace(#[from] TraceError),
}

/// Where the elevation result for the current trace stands.
#[derive(Debug, Clone, PartialEq)]
pub enum ElevationState {
    /// Nothing requested for the current trace.
    Idle,
    /// A request for `generation` is in flight.
    Pending { generation: u64 },
    /// The profile for `generation` has arrived.
    Ready { generation: u64, profile: ElevationProfile },
    /// The lookup for `generation` failed.
    Failed { generation: u64, error: ElevationServiceError },
}

/// What [`MeasureSession::apply_elevation`] did with an update.
#[derive(Debug, Clone, PartialEq)]
pub enum ElevationOutcome {
    /// The profile now backs the elevation display.
    Applied,
    /// The update was for an older trace or a shut-down session and was ignored.
    Stale,
    /// The lookup failed; the session fell back to distance measurement.
    Failed(ElevationServiceError),
}

/// What survives a process restart.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    pub points: Vec<GeoPoint>,
    pub unit: MeasurementUnit,
    pub measure_type: MeasureType,
}

impl SessionState {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SettingsError> {
        write_json(path.as_ref(), self)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let bytes = std::fs::read(path.as_ref())?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Foreground measuring context: trace, settings, formatter and elevation state.
pub struct MeasureSession<R: TraceRenderer = NoopRenderer> {
    trace: Trace<R>,
    settings: Settings,
    formatter: MeasurementFormatter,
    elevation: ElevationState,
    /// Bumped on every trace mutation
    generation: u64,
    active: ActiveFlag,
}

impl MeasureSession<NoopRenderer> {
    /// Headless session with the default number formatter.
    pub fn new(settings: Settings) -> Self {
        Self::with_renderer(NoopRenderer, settings, MeasurementFormatter::default())
    }
}

impl<R: TraceRenderer> MeasureSession<R> {
    pub fn with_renderer(renderer: R, settings: Settings, formatter: MeasurementFormatter) -> Self {
        let mut settings = settings;
        if settings.measure_type == MeasureType::Elevation && !settings.pro {
            settings.measure_type = MeasureType::Distance;
        }
        Self {
            trace: Trace::with_renderer(renderer),
            settings,
            formatter,
            elevation: ElevationState::Idle,
            generation: 0,
            active: ActiveFlag::new(),
        }
    }

    /// Rebuild a session from persisted state.
    pub fn restore(renderer: R, state: SessionState, settings: Settings, formatter: MeasurementFormatter) -> Self {
        let settings = Settings {
            unit: state.unit,
            measure_type: state.measure_type,
            ..settings
        };
        let mut session = Self::with_renderer(renderer, settings, formatter);
        session.load_points(state.points);
        session
    }

    /// Snapshot of what should survive a restart.
    pub fn state(&self) -> SessionState {
        SessionState {
            points: self.trace.to_vec(),
            unit: self.settings.unit,
            measure_type: self.settings.measure_type,
        }
    }

    pub fn trace(&self) -> &Trace<R> {
        &self.trace
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn formatter(&self) -> &MeasurementFormatter {
        &self.formatter
    }

    pub fn unit(&self) -> MeasurementUnit {
        self.settings.unit
    }

    pub fn measure_type(&self) -> MeasureType {
        self.settings.measure_type
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn elevation_state(&self) -> &ElevationState {
        &self.elevation
    }

    /// Flag handed to elevation workers; cleared by [`shutdown`](Self::shutdown).
    pub fn active_flag(&self) -> ActiveFlag {
        self.active.clone()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_active()
    }

    // ------------------------------------------------------------------------
    // Trace editing
    // ------------------------------------------------------------------------

    fn trace_changed(&mut self) {
        self.generation += 1;
        self.elevation = ElevationState::Idle;
    }

    pub fn add_point(&mut self, point: GeoPoint) {
        self.trace.push(point);
        self.trace_changed();
    }

    /// Remove the last point. Removing from an empty trace is a no-op.
    pub fn remove_last(&mut self) -> Option<GeoPoint> {
        match self.trace.pop() {
            Ok(point) => {
                self.trace_changed();
                Some(point)
            }
            Err(TraceError::Empty) => None,
        }
    }

    pub fn clear(&mut self) {
        self.trace.clear();
        self.trace_changed();
    }

    /// Replace the trace, e.g. with points loaded from a file.
    pub fn load_points<I>(&mut self, points: I)
    where
        I: IntoIterator<Item = GeoPoint>,
    {
        self.trace.replace_with(points);
        self.trace_changed();
        info!("[MeasureSession] loaded {} points", self.trace.len());
    }

    // ------------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------------

    pub fn set_unit(&mut self, unit: MeasurementUnit) {
        self.settings.unit = unit;
    }

    pub fn toggle_unit(&mut self) -> MeasurementUnit {
        self.settings.unit = self.settings.unit.toggled();
        self.settings.unit
    }

    /// Grant or revoke the elevation entitlement. Revoking leaves elevation mode.
    pub fn set_pro(&mut self, pro: bool) {
        self.settings.pro = pro;
        if !pro && self.settings.measure_type == MeasureType::Elevation {
            self.settings.measure_type = MeasureType::Distance;
        }
    }

    /// Switch what is measured. Elevation requires the pro entitlement.
    pub fn set_measure_type(&mut self, measure_type: MeasureType) -> Result<(), SessionError> {
        if measure_type == MeasureType::Elevation && !self.settings.pro {
            return Err(SessionError::NotEntitled);
        }
        if measure_type != self.settings.measure_type {
            debug!("[MeasureSession] {:?} -> {:?}", self.settings.measure_type, measure_type);
            self.settings.measure_type = measure_type;
        }
        // Re-entering elevation mode after a failure asks again
        if measure_type == MeasureType::Elevation && matches!(self.elevation, ElevationState::Failed { .. }) {
            self.elevation = ElevationState::Idle;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Display
    // ------------------------------------------------------------------------

    /// The measurement text for the current mode and unit.
    pub fn display_text(&self) -> String {
        let unit = self.settings.unit;
        match self.settings.measure_type {
            MeasureType::Distance => self.formatter.format_distance(self.trace.total_distance(), unit),
            MeasureType::Area => self.formatter.format_area(self.trace.current_area(), unit),
            MeasureType::Elevation => match &self.elevation {
                ElevationState::Ready { generation, profile } if *generation == self.generation => {
                    self.formatter.format_elevation(profile, unit)
                }
                _ => LOADING_TEXT.to_string(),
            },
        }
    }

    /// Current distance and area in every supported unit.
    pub fn conversion_table(&self) -> ConversionTable {
        self.formatter
            .conversion_table(self.trace.total_distance(), self.trace.current_area())
    }

    // ------------------------------------------------------------------------
    // Elevation
    // ------------------------------------------------------------------------

    /// Whether elevation mode is showing and nothing has been requested for the current trace.
    pub fn needs_elevation(&self) -> bool {
        self.settings.measure_type == MeasureType::Elevation && self.elevation == ElevationState::Idle
    }

    /// Snapshot the trace for a background lookup and mark the lookup pending.
    pub fn elevation_request(&mut self) -> ElevationRequest {
        self.elevation = ElevationState::Pending { generation: self.generation };
        ElevationRequest {
            points: self.trace.to_vec(),
            generation: self.generation,
            active: self.active.clone(),
        }
    }

    /// Apply a result posted back by an elevation worker.
    pub fn apply_elevation(&mut self, update: ElevationUpdate) -> ElevationOutcome {
        if !self.active.is_active() || update.generation != self.generation {
            debug!(
                "[MeasureSession] ignoring elevation for generation {} (current {}, active {})",
                update.generation,
                self.generation,
                self.active.is_active()
            );
            return ElevationOutcome::Stale;
        }

        match update.result {
            Ok(profile) => {
                self.elevation = ElevationState::Ready { generation: update.generation, profile };
                ElevationOutcome::Applied
            }
            Err(error) => {
                warn!("[MeasureSession] elevation lookup failed: {}", error);
                self.elevation = ElevationState::Failed {
                    generation: update.generation,
                    error: error.clone(),
                };
                if self.settings.measure_type == MeasureType::Elevation {
                    self.settings.measure_type = MeasureType::Distance;
                }
                ElevationOutcome::Failed(error)
            }
        }
    }

    /// Tear down: results of in-flight lookups will be dropped.
    pub fn shutdown(&mut self) {
        self.active.deactivate();
    }
}

impl<R: TraceRenderer> Drop for MeasureSession<R> {
    fn drop(&mut self) {
        self.active.deactivate();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pro_settings() -> Settings {
        Settings { pro: true, ..Settings::default() }
    }

    fn square() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 0.001),
            GeoPoint::new(0.001, 0.001),
            GeoPoint::new(0.001, 0.0),
        ]
    }

    fn ok_update(generation: u64) -> ElevationUpdate {
        ElevationUpdate {
            generation,
            result: Ok(ElevationProfile::from_samples(vec![100.0, 150.0, 120.0])),
        }
    }

    #[test]
    fn test_distance_display() {
        let mut session = MeasureSession::new(Settings::default());
        assert_eq!(session.display_text(), "0 m");
        session.add_point(GeoPoint::new(0.0, 0.0));
        session.add_point(GeoPoint::new(0.01, 0.0));
        assert_eq!(session.display_text(), "1.11 km");

        session.toggle_unit();
        assert_eq!(session.display_text(), "3,648.13 ft");
    }

    #[test]
    fn test_area_display() {
        let mut session = MeasureSession::new(Settings::default());
        session.set_measure_type(MeasureType::Area).unwrap();
        session.add_point(GeoPoint::new(0.0, 0.0));
        session.add_point(GeoPoint::new(0.0, 0.001));
        assert_eq!(session.display_text(), "0 m²");

        session.load_points(square());
        let text = session.display_text();
        assert!(text.starts_with("12,36"), "{}", text);
        assert!(text.ends_with(" m²"), "{}", text);
    }

    #[test]
    fn test_remove_last_on_empty_is_noop() {
        let mut session = MeasureSession::new(Settings::default());
        let generation = session.generation();
        assert_eq!(session.remove_last(), None);
        assert_eq!(session.generation(), generation);
    }

    #[test]
    fn test_elevation_requires_entitlement() {
        let mut session = MeasureSession::new(Settings::default());
        assert_eq!(session.set_measure_type(MeasureType::Elevation), Err(SessionError::NotEntitled));
        assert_eq!(session.measure_type(), MeasureType::Distance);

        session.set_pro(true);
        assert!(session.set_measure_type(MeasureType::Elevation).is_ok());

        session.set_pro(false);
        assert_eq!(session.measure_type(), MeasureType::Distance);
    }

    #[test]
    fn test_elevation_round_trip() {
        let mut session = MeasureSession::new(pro_settings());
        session.load_points(square());
        session.set_measure_type(MeasureType::Elevation).unwrap();

        assert!(session.needs_elevation());
        let request = session.elevation_request();
        assert!(!session.needs_elevation());
        assert_eq!(request.points, square());
        assert_eq!(session.display_text(), LOADING_TEXT);

        assert_eq!(session.apply_elevation(ok_update(request.generation)), ElevationOutcome::Applied);
        assert_eq!(session.display_text(), "50 m⬆, 30 m⬇\n120 m");
    }

    #[test]
    fn test_stale_elevation_is_ignored() {
        let mut session = MeasureSession::new(pro_settings());
        session.load_points(square());
        session.set_measure_type(MeasureType::Elevation).unwrap();

        let request = session.elevation_request();
        session.add_point(GeoPoint::new(0.002, 0.0));

        assert_eq!(session.apply_elevation(ok_update(request.generation)), ElevationOutcome::Stale);
        assert_eq!(session.elevation_state(), &ElevationState::Idle);
        assert!(session.needs_elevation());
    }

    #[test]
    fn test_elevation_after_shutdown_is_ignored() {
        let mut session = MeasureSession::new(pro_settings());
        session.load_points(square());
        let request = session.elevation_request();
        session.shutdown();

        assert!(!request.active.is_active());
        assert_eq!(session.apply_elevation(ok_update(request.generation)), ElevationOutcome::Stale);
    }

    #[test]
    fn test_drop_deactivates_flag() {
        let session = MeasureSession::new(pro_settings());
        let flag = session.active_flag();
        assert!(flag.is_active());
        drop(session);
        assert!(!flag.is_active());
    }

    #[test]
    fn test_elevation_failure_falls_back_to_distance() {
        let mut session = MeasureSession::new(pro_settings());
        session.load_points(square());
        session.set_measure_type(MeasureType::Elevation).unwrap();
        let request = session.elevation_request();

        let error = ElevationServiceError::Http { status: 503 };
        let outcome = session.apply_elevation(ElevationUpdate {
            generation: request.generation,
            result: Err(error.clone()),
        });

        assert_eq!(outcome, ElevationOutcome::Failed(error));
        assert_eq!(session.measure_type(), MeasureType::Distance);
        assert!(session.display_text().ends_with(" m"));
    }

    #[test]
    fn test_reenter_elevation_after_failure() {
        let mut session = MeasureSession::new(pro_settings());
        session.load_points(square());
        session.set_measure_type(MeasureType::Elevation).unwrap();
        let request = session.elevation_request();
        session.apply_elevation(ElevationUpdate {
            generation: request.generation,
            result: Err(ElevationServiceError::Http { status: 503 }),
        });
        assert_eq!(session.measure_type(), MeasureType::Distance);

        session.set_measure_type(MeasureType::Elevation).unwrap();
        assert_eq!(session.elevation_state(), &ElevationState::Idle);
        assert!(session.needs_elevation());

        let retry = session.elevation_request();
        assert_eq!(retry.generation, request.generation);
        assert_eq!(session.apply_elevation(ok_update(retry.generation)), ElevationOutcome::Applied);
        assert_eq!(session.display_text(), "50 m⬆, 30 m⬇\n120 m");
    }

    #[test]
    fn test_state_round_trip() {
        let mut session = MeasureSession::new(pro_settings());
        session.load_points(square());
        session.set_unit(MeasurementUnit::Imperial);
        session.set_measure_type(MeasureType::Area).unwrap();

        let state = session.state();
        let json = serde_json::to_string(&state).unwrap();
        let restored_state: SessionState = serde_json::from_str(&json).unwrap();

        let restored = MeasureSession::restore(
            NoopRenderer,
            restored_state,
            pro_settings(),
            MeasurementFormatter::default(),
        );
        assert_eq!(restored.trace().to_vec(), square());
        assert_eq!(restored.unit(), MeasurementUnit::Imperial);
        assert_eq!(restored.measure_type(), MeasureType::Area);
        assert_eq!(restored.display_text(), session.display_text());
    }

    #[test]
    fn test_restore_elevation_without_entitlement() {
        let state = SessionState {
            points: square(),
            unit: MeasurementUnit::Metric,
            measure_type: MeasureType::Elevation,
        };
        let session = MeasureSession::restore(
            NoopRenderer,
            state,
            Settings::default(),
            MeasurementFormatter::default(),
        );
        assert_eq!(session.measure_type(), MeasureType::Distance);
    }

    #[test]
    fn test_state_file() {
        let path = std::env::temp_dir()
            .join(format!("maps-measure-session-{}", std::process::id()))
            .join("state.json");
        let state = SessionState {
            points: square(),
            unit: MeasurementUnit::Imperial,
            measure_type: MeasureType::Area,
        };
        state.save(&path).unwrap();
        let loaded = SessionState::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_conversion_table() {
        let mut session = MeasureSession::new(Settings::default());
        session.add_point(GeoPoint::new(0.0, 0.0));
        session.add_point(GeoPoint::new(0.0, 0.001));
        let table = session.conversion_table();
        assert_eq!(table.distance[0], "111.19 m");
        assert_eq!(table.area[0], "0 m²");
    }
}

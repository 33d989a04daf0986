//! Persisted user settings.
//!
//! A small JSON document holding the unit preference, the last measure type,
//! map type and camera position, the entitlement flag, and an optional
//! elevation API key override. Missing fields fall back to their defaults so
//! files written by older versions keep loading.

use std::fs;
use std::io;
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ElevationConfig, GeoPoint, MeasureType, MeasurementUnit};

/// Errors while loading or saving settings or session state.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("settings JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Base map style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapType {
    #[default]
    Normal,
    Satellite,
    Terrain,
    Hybrid,
}

/// Last camera position of the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPosition {
    pub target: GeoPoint,
    pub zoom: f32,
    #[serde(default)]
    pub tilt: f32,
    #[serde(default)]
    pub bearing: f32,
}

/// User settings persisted between sessions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub unit: MeasurementUnit,
    pub measure_type: MeasureType,
    pub map_type: MapType,
    pub camera: Option<CameraPosition>,
    /// Whether the elevation feature is unlocked
    pub pro: bool,
    /// Overrides the built-in elevation API key when set
    pub elevation_api_key: Option<String>,
}

impl Settings {
    /// Defaults for a fresh install in the given locale.
    pub fn for_locale(locale_tag: &str) -> Self {
        Self {
            unit: MeasurementUnit::default_for_locale(locale_tag),
            ..Self::default()
        }
    }

    /// Load settings from `path`; a missing file yields locale defaults.
    pub fn load<P: AsRef<Path>>(path: P, locale_tag: &str) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        match fs::read(path) {
            Ok(bytes) => {
                let settings = serde_json::from_slice(&bytes)?;
                debug!("[Settings] loaded {}", path.display());
                Ok(settings)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("[Settings] no settings at {}, using defaults for {}", path.display(), locale_tag);
                Ok(Self::for_locale(locale_tag))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write settings to `path`, creating parent directories as needed.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SettingsError> {
        write_json(path.as_ref(), self)
    }

    /// `base` with the API key override applied.
    pub fn elevation_config(&self, base: &ElevationConfig) -> ElevationConfig {
        let mut config = base.clone();
        if let Some(key) = self.elevation_api_key.as_ref().filter(|k| !k.is_empty()) {
            config.api_key = key.clone();
        }
        config
    }
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(value)?;
    fs::write(path, json)?;
    debug!("[Settings] wrote {}", path.display());
    Ok(())
}

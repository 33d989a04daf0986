//! # Measurement Formatting
//!
//! Turns raw metric measurements into the strings shown to the user.
//!
//! The unit system picks the physical units; the magnitude picks the scale
//! within it:
//!
//! | Measure | Metric | Imperial |
//! |---------|--------|----------|
//! | Distance | m up to 1000 m, then km | ft up to 1609 m, then mi |
//! | Area | m² up to 1 km², then km² | ft² below 2,589,989 m², then mi² |
//!
//! Square meters and square feet are shown without decimals, everything else
//! with at most two. Magnitudes are clamped to zero first, so floating-point
//! noise never renders as a negative number.
//!
//! ```rust
//! use maps_measure::{MeasurementFormatter, MeasurementUnit};
//!
//! let formatter = MeasurementFormatter::default();
//! assert_eq!(formatter.format_distance(999.99, MeasurementUnit::Metric), "999.99 m");
//! assert_eq!(formatter.format_distance(1500.0, MeasurementUnit::Metric), "1.5 km");
//! assert_eq!(formatter.format_area(1234.4, MeasurementUnit::Metric), "1,234 m²");
//! ```

use serde::{Deserialize, Serialize};

use crate::elevation::ElevationProfile;

// Unit conversion factors (meters / square meters per unit)
const METERS_PER_KILOMETER: f64 = 1000.0;
const METERS_PER_FOOT: f64 = 0.3048;
const METERS_PER_YARD: f64 = 0.9144;
const METERS_PER_MILE: f64 = 1609.344;
const METERS_PER_NAUTICAL_MILE: f64 = 1852.0;
const SQ_METERS_PER_SQ_FOOT: f64 = 0.09290304;
const SQ_METERS_PER_HECTARE: f64 = 10_000.0;
const SQ_METERS_PER_ACRE: f64 = 4046.8726099;
const SQ_METERS_PER_SQ_KILOMETER: f64 = 1_000_000.0;
const SQ_METERS_PER_SQ_MILE: f64 = 2_589_988.110336;

// Scale switch thresholds
const METRIC_DISTANCE_THRESHOLD: f64 = 1000.0;
const IMPERIAL_DISTANCE_THRESHOLD: f64 = 1609.0;
const METRIC_AREA_THRESHOLD: f64 = 1_000_000.0;
const IMPERIAL_AREA_THRESHOLD: f64 = 2_589_989.0;

/// Unit system used for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum MeasurementUnit {
    #[default]
    Metric,
    Imperial,
}

impl MeasurementUnit {
    /// Metric everywhere except the United States English locale.
    ///
    /// Accepts both `en_US` and `en-US` spellings, ignoring any encoding
    /// suffix such as `en_US.UTF-8`.
    pub fn default_for_locale(tag: &str) -> Self {
        let tag = tag.split('.').next().unwrap_or(tag).replace('-', "_");
        if tag.eq_ignore_ascii_case("en_US") {
            MeasurementUnit::Imperial
        } else {
            MeasurementUnit::Metric
        }
    }

    /// The other unit system.
    pub fn toggled(self) -> Self {
        match self {
            MeasurementUnit::Metric => MeasurementUnit::Imperial,
            MeasurementUnit::Imperial => MeasurementUnit::Metric,
        }
    }
}

/// Decimal and grouping separators used when rendering numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberLocale {
    pub decimal_separator: char,
    pub grouping_separator: Option<char>,
}

impl Default for NumberLocale {
    fn default() -> Self {
        Self {
            decimal_separator: '.',
            grouping_separator: Some(','),
        }
    }
}

impl NumberLocale {
    pub fn new(decimal_separator: char, grouping_separator: Option<char>) -> Self {
        Self { decimal_separator, grouping_separator }
    }

    /// Separators for a locale tag such as `de_DE` or `fr-FR`.
    ///
    /// Only the language part is considered; unknown languages use the
    /// English convention.
    pub fn for_tag(tag: &str) -> Self {
        let language = tag
            .split(['_', '-', '.'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match language.as_str() {
            "de" | "es" | "it" | "nl" | "pt" | "da" | "id" | "tr" => Self::new(',', Some('.')),
            "fr" | "ru" | "pl" | "cs" | "sv" | "fi" | "nb" | "uk" => Self::new(',', Some('\u{a0}')),
            _ => Self::default(),
        }
    }
}

/// Formats distances, areas and elevation summaries for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeasurementFormatter {
    locale: NumberLocale,
}

/// One distance and one area rendered in every supported unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionTable {
    /// m, km, ft, yd, mi, nautical miles
    pub distance: Vec<String>,
    /// m², ha, km², ft², ac (U.S. survey), mi²
    pub area: Vec<String>,
}

impl MeasurementFormatter {
    pub fn new(locale: NumberLocale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> NumberLocale {
        self.locale
    }

    /// Format a path length given in meters.
    pub fn format_distance(&self, meters: f64, unit: MeasurementUnit) -> String {
        let meters = clamp_non_negative(meters);
        match unit {
            MeasurementUnit::Metric => {
                if meters > METRIC_DISTANCE_THRESHOLD {
                    format!("{} km", self.format_number(meters / METERS_PER_KILOMETER, 2))
                } else {
                    format!("{} m", self.format_number(meters, 2))
                }
            }
            MeasurementUnit::Imperial => {
                if meters > IMPERIAL_DISTANCE_THRESHOLD {
                    format!("{} mi", self.format_number(meters / METERS_PER_MILE, 2))
                } else {
                    format!("{} ft", self.format_number(meters / METERS_PER_FOOT, 2))
                }
            }
        }
    }

    /// Format an enclosed area given in square meters.
    pub fn format_area(&self, sq_meters: f64, unit: MeasurementUnit) -> String {
        let sq_meters = clamp_non_negative(sq_meters);
        match unit {
            MeasurementUnit::Metric => {
                if sq_meters > METRIC_AREA_THRESHOLD {
                    format!("{} km²", self.format_number(sq_meters / SQ_METERS_PER_SQ_KILOMETER, 2))
                } else {
                    format!("{} m²", self.format_number(sq_meters, 0))
                }
            }
            MeasurementUnit::Imperial => {
                if sq_meters >= IMPERIAL_AREA_THRESHOLD {
                    format!("{} mi²", self.format_number(sq_meters / SQ_METERS_PER_SQ_MILE, 2))
                } else {
                    format!("{} ft²", self.format_number(sq_meters / SQ_METERS_PER_SQ_FOOT, 0))
                }
            }
        }
    }

    /// Ascent and descent of a profile, followed by the elevation at the end
    /// of the trace on a second line when known.
    ///
    /// ```rust
    /// use maps_measure::{ElevationProfile, MeasurementFormatter, MeasurementUnit};
    ///
    /// let profile = ElevationProfile::from_samples(vec![100.0, 120.5, 110.0]);
    /// let text = MeasurementFormatter::default().format_elevation(&profile, MeasurementUnit::Metric);
    /// assert_eq!(text, "20.5 m⬆, 10.5 m⬇\n110 m");
    /// ```
    pub fn format_elevation(&self, profile: &ElevationProfile, unit: MeasurementUnit) -> String {
        let (scale, suffix) = match unit {
            MeasurementUnit::Metric => (1.0, "m"),
            MeasurementUnit::Imperial => (METERS_PER_FOOT, "ft"),
        };
        let mut text = format!(
            "{} {suffix}\u{2B06}, {} {suffix}\u{2B07}",
            self.format_number(profile.total_ascent / scale, 2),
            self.format_number(profile.total_descent / scale, 2),
        );
        if let Some(last) = profile.last_elevation() {
            text.push('\n');
            text.push_str(&self.format_signed(last / scale, 2));
            text.push(' ');
            text.push_str(suffix);
        }
        text
    }

    /// Render `distance` and `area` in every supported unit.
    pub fn conversion_table(&self, distance_meters: f64, area_sq_meters: f64) -> ConversionTable {
        let d = clamp_non_negative(distance_meters);
        let a = clamp_non_negative(area_sq_meters);
        let distance = [
            (d, "m"),
            (d / METERS_PER_KILOMETER, "km"),
            (d / METERS_PER_FOOT, "ft"),
            (d / METERS_PER_YARD, "yd"),
            (d / METERS_PER_MILE, "mi"),
            (d / METERS_PER_NAUTICAL_MILE, "nautical miles"),
        ];
        let area = [
            (a, "m²"),
            (a / SQ_METERS_PER_HECTARE, "ha"),
            (a / SQ_METERS_PER_SQ_KILOMETER, "km²"),
            (a / SQ_METERS_PER_SQ_FOOT, "ft²"),
            (a / SQ_METERS_PER_ACRE, "ac (U.S. Survey)"),
            (a / SQ_METERS_PER_SQ_MILE, "mi²"),
        ];
        let render = |rows: &[(f64, &str)]| -> Vec<String> {
            rows.iter()
                .map(|(value, unit)| format!("{} {}", self.format_number(*value, 2), unit))
                .collect()
        };
        ConversionTable {
            distance: render(&distance),
            area: render(&area),
        }
    }

    /// Render a non-negative number with at most `max_fraction_digits` decimals.
    pub fn format_number(&self, value: f64, max_fraction_digits: usize) -> String {
        self.render(clamp_non_negative(value), max_fraction_digits)
    }

    /// Like [`format_number`](Self::format_number) but keeps the sign.
    fn format_signed(&self, value: f64, max_fraction_digits: usize) -> String {
        if !value.is_finite() {
            return self.render(0.0, max_fraction_digits);
        }
        let rendered = self.render(value.abs(), max_fraction_digits);
        // Values that round to zero lose their sign
        if value < 0.0 && rendered.chars().any(|c| c.is_ascii_digit() && c != '0') {
            format!("-{}", rendered)
        } else {
            rendered
        }
    }

    fn render(&self, value: f64, max_fraction_digits: usize) -> String {
        let fixed = format!("{:.*}", max_fraction_digits, value);
        let (int_part, frac_part) = match fixed.split_once('.') {
            Some((int_part, frac_part)) => (int_part, frac_part.trim_end_matches('0')),
            None => (fixed.as_str(), ""),
        };

        let mut out = group_digits(int_part, self.locale.grouping_separator);
        if !frac_part.is_empty() {
            out.push(self.locale.decimal_separator);
            out.push_str(frac_part);
        }
        out
    }
}

/// Negative values, negative zero and NaN all become 0.
#[inline]
fn clamp_non_negative(value: f64) -> f64 {
    if value > 0.0 {
        value
    } else {
        0.0
    }
}

fn group_digits(digits: &str, separator: Option<char>) -> String {
    let Some(separator) = separator else {
        return digits.to_string();
    };
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(c);
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

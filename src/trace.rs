//! # Trace
//!
//! The ordered stack of points a user has placed on the map.
//!
//! Points are only ever appended to or removed from the end. The total path
//! length is maintained incrementally: every entry remembers the length of the
//! segment that led to it, so removing a point subtracts exactly what adding
//! it contributed. The enclosed area depends on the whole polygon and is
//! recomputed on demand.
//!
//! Drawing is delegated to a [`TraceRenderer`]. The trace keeps each point
//! together with the overlay handles the renderer returned for it, so the
//! geometry and what is on screen can never drift apart.
//!
//! ```rust
//! use maps_measure::{GeoPoint, Trace};
//!
//! let mut trace = Trace::new();
//! trace.push(GeoPoint::new(51.5000, -0.1300));
//! trace.push(GeoPoint::new(51.5010, -0.1300));
//! assert!(trace.total_distance() > 100.0);
//!
//! trace.pop().unwrap();
//! assert_eq!(trace.total_distance(), 0.0);
//! ```

use std::fmt;

use log::debug;
use thiserror::Error;

use crate::geo_utils::{haversine_distance, polygon_area_abs};
use crate::GeoPoint;

/// Errors raised by [`Trace`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TraceError {
    /// `pop` was called on a trace without points.
    #[error("cannot remove a point from an empty trace")]
    Empty,
}

/// Draws trace overlays on whatever map surface hosts the trace.
///
/// Handles returned by the draw calls are handed back to [`remove`](Self::remove)
/// when the corresponding point is removed from the trace.
pub trait TraceRenderer {
    /// Opaque reference to something drawn on the map.
    type Handle;

    /// Draw the marker for a newly added point.
    fn draw_point(&mut self, point: &GeoPoint) -> Self::Handle;

    /// Draw the line segment leading from the previous point to a new one.
    fn draw_segment(&mut self, from: &GeoPoint, to: &GeoPoint) -> Self::Handle;

    /// Remove a previously drawn overlay.
    fn remove(&mut self, handle: Self::Handle);
}

/// Renderer for headless use; draws nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRenderer;

impl TraceRenderer for NoopRenderer {
    type Handle = ();

    fn draw_point(&mut self, _point: &GeoPoint) {}

    fn draw_segment(&mut self, _from: &GeoPoint, _to: &GeoPoint) {}

    fn remove(&mut self, _handle: ()) {}
}

struct TraceEntry<H> {
    point: GeoPoint,
    /// Distance from the previous point (0 for the first one)
    segment_distance: f64,
    marker: H,
    segment: Option<H>,
}

/// Append/remove-at-end collection of points with a running total distance.
pub struct Trace<R: TraceRenderer = NoopRenderer> {
    entries: Vec<TraceEntry<R::Handle>>,
    total_distance: f64,
    renderer: R,
}

impl Trace<NoopRenderer> {
    /// Create an empty trace that draws nothing.
    pub fn new() -> Self {
        Self::with_renderer(NoopRenderer)
    }
}

impl Default for Trace<NoopRenderer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: TraceRenderer> Trace<R> {
    /// Create an empty trace drawing through `renderer`.
    pub fn with_renderer(renderer: R) -> Self {
        Self {
            entries: Vec::new(),
            total_distance: 0.0,
            renderer,
        }
    }

    /// Append a point, adding the segment from the previous last point to the
    /// running distance.
    pub fn push(&mut self, point: GeoPoint) {
        let (segment_distance, segment) = match self.entries.last() {
            Some(prev) => {
                let distance = haversine_distance(&prev.point, &point);
                let handle = self.renderer.draw_segment(&prev.point, &point);
                (distance, Some(handle))
            }
            None => (0.0, None),
        };
        let marker = self.renderer.draw_point(&point);

        self.total_distance += segment_distance;
        self.entries.push(TraceEntry {
            point,
            segment_distance,
            marker,
            segment,
        });

        debug!(
            "[Trace] push ({:.6}, {:.6}) +{:.2}m -> {} points, {:.2}m",
            point.latitude,
            point.longitude,
            segment_distance,
            self.entries.len(),
            self.total_distance
        );
    }

    /// Remove and return the last point.
    ///
    /// Subtracts exactly the increment the matching `push` added. Returns
    /// [`TraceError::Empty`] when there is nothing to remove.
    pub fn pop(&mut self) -> Result<GeoPoint, TraceError> {
        let entry = self.entries.pop().ok_or(TraceError::Empty)?;

        self.renderer.remove(entry.marker);
        if let Some(segment) = entry.segment {
            self.renderer.remove(segment);
        }

        if self.entries.is_empty() {
            self.total_distance = 0.0;
        } else {
            self.total_distance -= entry.segment_distance;
        }

        debug!(
            "[Trace] pop -{:.2}m -> {} points, {:.2}m",
            entry.segment_distance,
            self.entries.len(),
            self.total_distance
        );

        Ok(entry.point)
    }

    /// Remove every point and overlay.
    pub fn clear(&mut self) {
        for entry in self.entries.drain(..) {
            self.renderer.remove(entry.marker);
            if let Some(segment) = entry.segment {
                self.renderer.remove(segment);
            }
        }
        self.total_distance = 0.0;
    }

    /// Replace the whole trace with `points`, as when loading a saved file.
    pub fn replace_with<I>(&mut self, points: I)
    where
        I: IntoIterator<Item = GeoPoint>,
    {
        self.clear();
        for point in points {
            self.push(point);
        }
    }

    /// Length of the path in meters. O(1).
    #[inline]
    pub fn total_distance(&self) -> f64 {
        self.total_distance
    }

    /// Area enclosed by the trace in square meters, treating it as a closed polygon.
    ///
    /// Zero below 3 points. Recomputed on every call.
    pub fn current_area(&self) -> f64 {
        if self.entries.len() < 3 {
            return 0.0;
        }
        polygon_area_abs(&self.to_vec())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first(&self) -> Option<GeoPoint> {
        self.entries.first().map(|e| e.point)
    }

    pub fn last(&self) -> Option<GeoPoint> {
        self.entries.last().map(|e| e.point)
    }

    /// Points in insertion order.
    pub fn points(&self) -> impl Iterator<Item = GeoPoint> + '_ {
        self.entries.iter().map(|e| e.point)
    }

    pub fn to_vec(&self) -> Vec<GeoPoint> {
        self.points().collect()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
}

impl<R: TraceRenderer> fmt::Debug for Trace<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trace")
            .field("points", &self.to_vec())
            .field("total_distance", &self.total_distance)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

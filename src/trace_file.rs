//! # Trace Files
//!
//! Plain-text persistence of a trace: one `latitude,longitude` pair per line,
//! no header. Older files used `;` between the coordinates, so the reader tries
//! a comma first and falls back to a semicolon.
//!
//! Loading is best-effort. A line that does not hold two finite, in-range
//! coordinates is logged and skipped; the remaining lines still load.
//!
//! ```rust
//! use maps_measure::{trace_file, GeoPoint};
//!
//! let text = "51.5074,-0.1278\n51.508;-0.129\nnot,a point\n51.509,-0.13\n";
//! let points = trace_file::trace_from_str(text).unwrap();
//! assert_eq!(points.len(), 3);
//! assert_eq!(points[1], GeoPoint::new(51.508, -0.129));
//! ```

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Terminator, Trim, WriterBuilder};
use log::{info, warn};
use thiserror::Error;

use crate::GeoPoint;

const LEGACY_SEPARATOR: char = ';';

/// Errors while reading or writing a whole trace file.
///
/// Malformed lines are not errors; they are skipped.
#[derive(Debug, Error)]
pub enum TraceFileError {
    #[error("trace file I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("trace file CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("trace file is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Write `points` as comma-separated lines with full `f64` precision.
pub fn write_trace<W: Write>(writer: W, points: &[GeoPoint]) -> Result<(), TraceFileError> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(writer);

    for p in points {
        // Display for f64 is the shortest string that parses back to the same value
        wtr.write_record([p.latitude.to_string(), p.longitude.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read points from `reader`, skipping malformed lines.
pub fn read_trace<R: Read>(reader: R) -> Result<Vec<GeoPoint>, TraceFileError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut points = Vec::new();
    let mut skipped = 0usize;

    for record in rdr.records() {
        match record {
            Ok(record) => match parse_record(&record) {
                Some(point) => points.push(point),
                None => {
                    skipped += 1;
                    let line = record.position().map_or(0, |p| p.line());
                    warn!("[TraceFile] skipping malformed line {}: {:?}", line, record.as_slice());
                }
            },
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                skipped += 1;
                warn!("[TraceFile] skipping unreadable line: {}", e);
            }
        }
    }

    info!("[TraceFile] read {} points ({} lines skipped)", points.len(), skipped);
    Ok(points)
}

/// Parse one record: two comma-separated fields, or one field holding a
/// semicolon-separated pair.
fn parse_record(record: &StringRecord) -> Option<GeoPoint> {
    let (lat, lng) = match record.len() {
        2 => (record.get(0)?, record.get(1)?),
        1 => {
            let (lat, lng) = record.get(0)?.split_once(LEGACY_SEPARATOR)?;
            if lng.contains(LEGACY_SEPARATOR) {
                return None;
            }
            (lat.trim(), lng.trim())
        }
        _ => return None,
    };

    let point = GeoPoint::new(lat.parse().ok()?, lng.parse().ok()?);
    point.is_valid().then_some(point)
}

/// Serialize `points` to the trace file text format.
pub fn trace_to_string(points: &[GeoPoint]) -> Result<String, TraceFileError> {
    let mut buf = Vec::new();
    write_trace(&mut buf, points)?;
    Ok(String::from_utf8(buf)?)
}

/// Parse trace file text, skipping malformed lines.
pub fn trace_from_str(text: &str) -> Result<Vec<GeoPoint>, TraceFileError> {
    read_trace(text.as_bytes())
}

/// Write `points` to the file at `path`, replacing its contents.
pub fn save_trace<P: AsRef<Path>>(path: P, points: &[GeoPoint]) -> Result<(), TraceFileError> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_trace(BufWriter::new(file), points)?;
    info!("[TraceFile] saved {} points to {}", points.len(), path.display());
    Ok(())
}

/// Read the points stored in the file at `path`.
pub fn load_trace<P: AsRef<Path>>(path: P) -> Result<Vec<GeoPoint>, TraceFileError> {
    let file = File::open(path.as_ref())?;
    read_trace(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_points() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(51.5074, -0.1278),
            GeoPoint::new(-33.868820000000014, 151.20929999999998),
            GeoPoint::new(0.1 + 0.2, -179.99999999999997),
            GeoPoint::new(89.99999, 1e-12),
        ]
    }

    #[test]
    fn test_write_format() {
        let text = trace_to_string(&[GeoPoint::new(51.5, -0.12), GeoPoint::new(1.0, 2.25)]).unwrap();
        assert_eq!(text, "51.5,-0.12\n1,2.25\n");
    }

    #[test]
    fn test_round_trip_is_exact() {
        let points = sample_points();
        let text = trace_to_string(&points).unwrap();
        let read = trace_from_str(&text).unwrap();
        assert_eq!(read.len(), points.len());
        for (a, b) in points.iter().zip(&read) {
            assert_eq!(a.latitude.to_bits(), b.latitude.to_bits());
            assert_eq!(a.longitude.to_bits(), b.longitude.to_bits());
        }
    }

    #[test]
    fn test_semicolon_fallback() {
        let points = trace_from_str("51.5;-0.12\n 52.0 ; 13.4 \n").unwrap();
        assert_eq!(points, vec![GeoPoint::new(51.5, -0.12), GeoPoint::new(52.0, 13.4)]);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let text = "51.5,-0.12\n51.6,abc\n51.7,-0.14\n1,2,3\n;\n91,0\nNaN,1\n51.8,-0.15";
        let points = trace_from_str(text).unwrap();
        assert_eq!(
            points,
            vec![
                GeoPoint::new(51.5, -0.12),
                GeoPoint::new(51.7, -0.14),
                GeoPoint::new(51.8, -0.15),
            ]
        );
    }

    #[test]
    fn test_blank_and_empty_input() {
        assert!(trace_from_str("").unwrap().is_empty());
        let points = trace_from_str("\n51.5,-0.12\n\n").unwrap();
        assert_eq!(points, vec![GeoPoint::new(51.5, -0.12)]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let points = trace_from_str("51.5,-0.12\r\n52.5;13.4\r\n").unwrap();
        assert_eq!(points, vec![GeoPoint::new(51.5, -0.12), GeoPoint::new(52.5, 13.4)]);
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join(format!("maps-measure-trace-{}.csv", std::process::id()));
        let points = sample_points();

        save_trace(&path, &points).unwrap();
        let loaded = load_trace(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded, points);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let path = std::env::temp_dir().join("maps-measure-does-not-exist.csv");
        assert!(matches!(load_trace(&path), Err(TraceFileError::Io(_))));
    }
}

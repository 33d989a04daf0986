//! Basic example of measuring a trace.
//!
//! Run with: cargo run --example measure_trace

use maps_measure::{
    trace_file, GeoPoint, MeasureSession, MeasureType, MeasurementFormatter, MeasurementUnit,
    NoopRenderer, NumberLocale, Settings,
};

fn main() {
    // A walk around a block in central London
    let walk = vec![
        GeoPoint::new(51.5007, -0.1246), // Start
        GeoPoint::new(51.5014, -0.1419),
        GeoPoint::new(51.5073, -0.1416),
        GeoPoint::new(51.5081, -0.1281),
    ];

    let mut session = MeasureSession::new(Settings::for_locale("en_GB"));
    for point in &walk {
        session.add_point(*point);
        println!("+ ({:.4}, {:.4})  distance {}", point.latitude, point.longitude, session.display_text());
    }

    println!("\nDistance in every unit:");
    for row in session.conversion_table().distance {
        println!("  {}", row);
    }

    if let Err(e) = session.set_measure_type(MeasureType::Area) {
        println!("Cannot switch to area: {}", e);
        return;
    }
    println!("\nEnclosed area: {}", session.display_text());
    session.toggle_unit();
    println!("Enclosed area (imperial): {}", session.display_text());

    // Elevation needs the pro version
    match session.set_measure_type(MeasureType::Elevation) {
        Ok(()) => println!("\nElevation mode enabled"),
        Err(e) => println!("\nElevation mode refused: {}", e),
    }

    // Undo the last point
    if let Some(removed) = session.remove_last() {
        println!("\nRemoved ({:.4}, {:.4}), area now {}", removed.latitude, removed.longitude, session.display_text());
    }

    // Save and reload the trace
    let path = std::env::temp_dir().join("measure_trace_demo.csv");
    match trace_file::save_trace(&path, &session.trace().to_vec()) {
        Ok(()) => println!("\nSaved trace to {}", path.display()),
        Err(e) => {
            println!("\nSave failed: {}", e);
            return;
        }
    }

    let loaded = match trace_file::load_trace(&path) {
        Ok(points) => points,
        Err(e) => {
            println!("Load failed: {}", e);
            return;
        }
    };

    let german = MeasurementFormatter::new(NumberLocale::for_tag("de_DE"));
    let mut restored = MeasureSession::with_renderer(NoopRenderer, Settings::default(), german);
    restored.load_points(loaded);
    restored.set_unit(MeasurementUnit::Metric);
    println!("Reloaded {} points, distance {}", restored.trace().len(), restored.display_text());

    let _ = std::fs::remove_file(&path);
}

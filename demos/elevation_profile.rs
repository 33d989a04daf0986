//! Fetch the elevation profile of a trace from the Google Elevation API.
//!
//! Run with: ELEVATION_API_KEY=... cargo run --example elevation_profile --features http

use std::sync::Arc;

use maps_measure::{
    spawn_profile, ElevationConfig, ElevationOutcome, GeoPoint, GoogleElevationClient,
    MeasureSession, MeasureType, Settings,
};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() {
    let api_key = match std::env::var("ELEVATION_API_KEY") {
        Ok(key) => key,
        Err(_) => {
            println!("Set ELEVATION_API_KEY to run this example");
            return;
        }
    };

    let config = ElevationConfig {
        api_key,
        ..ElevationConfig::default()
    };
    let sampler = match GoogleElevationClient::sampler(&config) {
        Ok(sampler) => Arc::new(sampler),
        Err(e) => {
            println!("Cannot create client: {}", e);
            return;
        }
    };

    // Up the Kleine Scheidegg path towards the Eiger
    let mut session = MeasureSession::new(Settings { pro: true, ..Settings::default() });
    session.add_point(GeoPoint::new(46.6241, 7.9612));
    session.add_point(GeoPoint::new(46.5853, 7.9608));
    session.add_point(GeoPoint::new(46.5768, 7.9854));

    if let Err(e) = session.set_measure_type(MeasureType::Elevation) {
        println!("Cannot switch to elevation: {}", e);
        return;
    }
    println!("Distance: {} points, {:.0}m", session.trace().len(), session.trace().total_distance());
    println!("Elevation: {}", session.display_text());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let request = session.elevation_request();
    spawn_profile(Arc::clone(&sampler), &tokio::runtime::Handle::current(), request, tx);

    match rx.recv().await {
        Some(update) => match session.apply_elevation(update) {
            ElevationOutcome::Applied => println!("Elevation:\n{}", session.display_text()),
            ElevationOutcome::Stale => println!("Result was for an older trace"),
            ElevationOutcome::Failed(e) => {
                println!("Lookup failed: {}", e);
                println!("Back to distance: {}", session.display_text());
            }
        },
        None => println!("No result delivered"),
    }

    // Single-point lookups are cached
    let summit = GeoPoint::new(46.5776, 8.0053);
    for attempt in 1..=2 {
        match sampler.sample_single(summit).await {
            Ok(elevation) => println!("Attempt {}: {:.1} m ({} cached)", attempt, elevation, sampler.cached_len()),
            Err(e) => println!("Attempt {}: {}", attempt, e),
        }
    }
}

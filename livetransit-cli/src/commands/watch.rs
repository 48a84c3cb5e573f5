//! `watch` - follow a route's vehicles live until Ctrl+C.

use std::time::Duration;

use livetransit::{ActionOutcome, MapSnapshot};
use tokio_util::sync::CancellationToken;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the watch command.
pub struct WatchArgs {
    pub route_id: String,
    pub trip_id: Option<String>,
    pub interval: Option<u64>,
    pub duration: Option<u64>,
}

pub fn run(runner: &CliRunner, args: WatchArgs) -> Result<(), CliError> {
    runner.log_startup("watch");

    let mut engine_config = runner.config().engine_config().with_live_polling(true);
    if let Some(secs) = args.interval {
        engine_config = engine_config.with_poll_interval(Duration::from_secs(secs.max(1)));
    }
    let poll_interval = engine_config.poll_interval;
    let engine = runner.engine(engine_config)?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    ctrlc::set_handler(move || {
        println!();
        println!("Received shutdown signal, stopping...");
        signal.cancel();
    })
    .map_err(|e| CliError::Runtime(format!("Failed to set signal handler: {}", e)))?;

    println!("LiveTransit v{}", livetransit::VERSION);
    println!("Backend: {}", runner.config().backend.url);
    println!("Route:   {}", args.route_id);
    if let Some(trip_id) = &args.trip_id {
        println!("Trip:    {}", trip_id);
    }
    println!("Refresh: every {}s", poll_interval.as_secs());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    runner.runtime().block_on(async {
        let mut updates = engine.subscribe();

        if let ActionOutcome::Failed(message) = engine.select_route(&args.route_id).await {
            return Err(CliError::Action(message));
        }
        if let Some(trip_id) = &args.trip_id {
            if let ActionOutcome::Failed(message) = engine.select_trip(trip_id).await? {
                println!("Warning: {}", message);
            }
        }
        print_vehicles(&engine.snapshot());

        let deadline = async {
            match args.duration {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);

        let mut last_shown = vehicle_signature(&engine.snapshot());
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = &mut deadline => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = updates.borrow_and_update().clone();
                    if let Some(error) = &snapshot.live.error {
                        println!("Warning: {}", error);
                    }
                    let signature = vehicle_signature(&snapshot);
                    if signature != last_shown {
                        print_vehicles(&snapshot);
                        last_shown = signature;
                    }
                }
            }
        }
        Ok(())
    })?;

    engine.shutdown();

    let metrics = engine.metrics();
    println!();
    println!("Session Summary");
    println!("───────────────");
    println!("  Poll ticks:      {} ({} failed)", metrics.poll_ticks, metrics.poll_batches_failed);
    println!(
        "  Lookups:         {} ({:.0}% failed)",
        metrics.fanout_items,
        metrics.fanout_failure_rate() * 100.0
    );
    println!("  Cache hit rate:  {:.0}%", metrics.cache_hit_rate() * 100.0);
    println!("  Stale discarded: {}", metrics.stale_discards);
    Ok(())
}

fn vehicle_signature(snapshot: &MapSnapshot) -> Vec<(String, Option<f64>, Option<f64>)> {
    snapshot
        .displayed_vehicles()
        .iter()
        .map(|v| (v.trip_id.clone(), v.lat, v.lon))
        .collect()
}

fn print_vehicles(snapshot: &MapSnapshot) {
    if let Some(error) = &snapshot.route.error {
        println!("Route error: {}", error);
        return;
    }

    let vehicles = snapshot.displayed_vehicles();
    println!(
        "[{}] {} vehicles on {} trips",
        chrono::Local::now().format("%H:%M:%S"),
        vehicles.len(),
        snapshot.route.trips.len()
    );
    for vehicle in vehicles {
        if let Some(point) = vehicle.point() {
            println!(
                "  {:<24} {:>9.5}, {:>9.5}  {}",
                vehicle.trip_id,
                point.lat,
                point.lon,
                vehicle.status.as_deref().unwrap_or("")
            );
        }
    }
}

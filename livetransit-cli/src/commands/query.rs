//! One-shot queries: stops in a viewport, routes through a stop, active
//! routes and timetables.

use chrono::{Local, NaiveDate};
use livetransit::model::{LatLon, Viewport};
use livetransit::{ActionOutcome, StopsUpdate};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the stops command.
pub struct StopsArgs {
    pub lat: f64,
    pub lon: f64,
    pub span: f64,
    pub zoom: Option<u8>,
}

pub fn run_stops(runner: &CliRunner, args: StopsArgs) -> Result<(), CliError> {
    let engine_config = runner.config().engine_config();
    let zoom = args.zoom.unwrap_or(engine_config.min_stop_zoom);
    let engine = runner.engine(engine_config)?;
    let viewport = Viewport::around(
        LatLon {
            lat: args.lat,
            lon: args.lon,
        },
        args.span,
        zoom,
    );

    match runner.runtime().block_on(engine.viewport_changed(viewport)) {
        StopsUpdate::ZoomIn => {
            println!(
                "Zoom {} is below the minimum stop zoom ({}). Zoom in to see stops.",
                zoom,
                engine.config().min_stop_zoom
            );
            Ok(())
        }
        StopsUpdate::Stops(stops) => {
            println!("{} stops", stops.len());
            for stop in stops.iter() {
                println!("  {:<20} {:<32} {:.5}, {:.5}", stop.id, stop.name, stop.lat, stop.lon);
            }
            Ok(())
        }
        StopsUpdate::Failed(message) => Err(CliError::Action(message)),
        StopsUpdate::Superseded => Ok(()),
    }
}

pub fn run_routes(runner: &CliRunner, stop_id: &str) -> Result<(), CliError> {
    let engine = runner.engine(runner.config().engine_config())?;
    runner.runtime().block_on(async {
        applied(engine.open_stop(stop_id).await)?;
        let snapshot = engine.snapshot();

        println!("Routes through stop {}", stop_id);
        for route in snapshot.stop_panel.routes.iter() {
            println!("  {:<12} {}", route.route_id, route.label());
        }
        Ok(())
    })
}

pub fn run_active(runner: &CliRunner, stop_id: &str) -> Result<(), CliError> {
    let engine = runner.engine(runner.config().engine_config())?;
    runner.runtime().block_on(async {
        applied(engine.open_stop(stop_id).await)?;
        applied(engine.probe_active_routes(stop_id, true).await?)?;
        let snapshot = engine.snapshot();

        let active = snapshot.stop_panel.active_routes();
        println!(
            "{} of {} routes through stop {} have vehicles now",
            active.len(),
            snapshot.stop_panel.routes.len(),
            stop_id
        );
        for route in active {
            println!("  {:<12} {}", route.route_id, route.label());
        }
        Ok(())
    })
}

pub fn run_schedule(
    runner: &CliRunner,
    stop_id: &str,
    route_id: &str,
    date: Option<NaiveDate>,
) -> Result<(), CliError> {
    let engine = runner.engine(runner.config().engine_config())?;
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let schedule = runner
        .runtime()
        .block_on(engine.schedule_at_stop(stop_id, route_id, date))?;

    println!(
        "Route {} at stop {} on {}",
        schedule.short_name, stop_id, schedule.date
    );
    if schedule.times.is_empty() {
        println!("  (no departures)");
    }
    for time in &schedule.times {
        println!("  {}", time);
    }
    Ok(())
}

fn applied(outcome: ActionOutcome) -> Result<(), CliError> {
    match outcome {
        ActionOutcome::Failed(message) => Err(CliError::Action(message)),
        ActionOutcome::Applied | ActionOutcome::Superseded => Ok(()),
    }
}

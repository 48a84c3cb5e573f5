//! LiveTransit CLI - command-line front end for the LiveTransit engine.

mod commands;
mod error;
mod runner;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::query::StopsArgs;
use commands::watch::WatchArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Debug, Parser)]
#[command(name = "livetransit", version, about = "Live transit map data from the command line")]
struct Cli {
    /// Backend URL (overrides backend.url from the config file)
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write a config file with default settings
    Init,

    /// View or change configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// List stops around a point
    Stops {
        /// Latitude of the viewport center
        #[arg(allow_negative_numbers = true)]
        lat: f64,

        /// Longitude of the viewport center
        #[arg(allow_negative_numbers = true)]
        lon: f64,

        /// Half the viewport height and width in degrees
        #[arg(long, default_value_t = 0.005)]
        span: f64,

        /// Map zoom level (defaults to the minimum stop zoom)
        #[arg(long)]
        zoom: Option<u8>,
    },

    /// List routes serving a stop
    Routes {
        stop_id: String,
    },

    /// List routes through a stop that have a vehicle right now
    Active {
        stop_id: String,
    },

    /// Show a route's departures at a stop
    Schedule {
        stop_id: String,
        route_id: String,

        /// Service date as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Follow a route's vehicles live
    Watch {
        route_id: String,

        /// Restrict to one trip of the route
        #[arg(long)]
        trip: Option<String>,

        /// Refresh interval in seconds (overrides live.poll_interval)
        #[arg(long)]
        interval: Option<u64>,

        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Init => commands::init::run(),
        Commands::Config { command } => commands::config::run(command),
        Commands::Stops {
            lat,
            lon,
            span,
            zoom,
        } => {
            let runner = CliRunner::new(cli.backend, cli.verbose)?;
            runner.log_startup("stops");
            commands::query::run_stops(
                &runner,
                StopsArgs {
                    lat,
                    lon,
                    span,
                    zoom,
                },
            )
        }
        Commands::Routes { stop_id } => {
            let runner = CliRunner::new(cli.backend, cli.verbose)?;
            runner.log_startup("routes");
            commands::query::run_routes(&runner, &stop_id)
        }
        Commands::Active { stop_id } => {
            let runner = CliRunner::new(cli.backend, cli.verbose)?;
            runner.log_startup("active");
            commands::query::run_active(&runner, &stop_id)
        }
        Commands::Schedule {
            stop_id,
            route_id,
            date,
        } => {
            let runner = CliRunner::new(cli.backend, cli.verbose)?;
            runner.log_startup("schedule");
            commands::query::run_schedule(&runner, &stop_id, &route_id, date)
        }
        Commands::Watch {
            route_id,
            trip,
            interval,
            duration,
        } => {
            let runner = CliRunner::new(cli.backend, cli.verbose)?;
            commands::watch::run(
                &runner,
                WatchArgs {
                    route_id,
                    trip_id: trip,
                    interval,
                    duration,
                },
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_watch_with_trip() {
        let cli = Cli::parse_from(["livetransit", "watch", "1A", "--trip", "T1", "--duration", "30"]);
        match cli.command {
            Commands::Watch {
                route_id,
                trip,
                duration,
                ..
            } => {
                assert_eq!(route_id, "1A");
                assert_eq!(trip.as_deref(), Some("T1"));
                assert_eq!(duration, Some(30));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_stops_negative_longitude() {
        let cli = Cli::parse_from(["livetransit", "stops", "40.7", "-74.0", "--zoom", "17"]);
        assert!(matches!(
            cli.command,
            Commands::Stops { lon, zoom: Some(17), .. } if lon == -74.0
        ));
    }

    #[test]
    fn test_parse_schedule_date() {
        let cli = Cli::parse_from(["livetransit", "schedule", "S1", "R1", "--date", "2025-03-14"]);
        assert!(matches!(
            cli.command,
            Commands::Schedule { date: Some(d), .. } if d == NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
        ));
    }
}

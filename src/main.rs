use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use deltasync::{
    AppConfig, DashboardStats, DeltaSyncError, FileBasedLapStore, Ingestor, LapId,
    LapIdGenerator, LapStore, LapSummary, format_lap_time,
};
use log::{error, info};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Lap store directory, overrides the config file
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest a telemetry JSON file and add it to the lap log
    Ingest {
        #[arg(short, long)]
        input: PathBuf,

        /// Print the summary without storing the lap
        #[arg(long)]
        no_save: bool,
    },
    /// List stored laps and dashboard statistics
    Laps,
    /// Print the telemetry of a stored lap
    Show {
        #[arg(short, long)]
        id: u64,

        #[arg(short, long)]
        rows: Option<usize>,
    },
    /// Remove a stored lap
    Delete {
        #[arg(short, long)]
        id: u64,
    },
    /// Print the configuration, storing any values given
    Config {
        #[arg(long)]
        max_display_rows: Option<usize>,

        #[arg(long)]
        recent_laps: Option<usize>,

        /// Store the --data-dir given on this invocation
        #[arg(long)]
        save_data_dir: bool,
    },
}

fn ingest(config: &AppConfig, input: &Path, no_save: bool) -> Result<(), DeltaSyncError> {
    let mut store = if no_save {
        None
    } else {
        Some(config.open_lap_store()?)
    };
    let ids = match store.as_ref().and_then(FileBasedLapStore::last_id) {
        Some(last_id) => LapIdGenerator::starting_after(last_id),
        None => LapIdGenerator::new(),
    };
    let mut ingestor = Ingestor::with_ids(ids);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|e| DeltaSyncError::TelemetryLoaderError { source: e })?;
    let lap = runtime.block_on(ingestor.ingest_file_async(input))?;

    print_summary(&lap.summary);
    if let Some(store) = store.as_mut() {
        store.save_lap(&lap)?;
        info!("Stored lap {} in {:?}", lap.summary.id, store.storage_path());
    }
    Ok(())
}

fn laps(config: &AppConfig) -> Result<(), DeltaSyncError> {
    let store = config.open_lap_store()?;
    let laps = store.list_laps()?;
    if laps.is_empty() {
        println!("No laps recorded yet. Ingest your first telemetry file to get started!");
        return Ok(());
    }

    let stats = DashboardStats::from_laps(&laps, config.recent_laps);
    println!("Total laps:       {}", stats.total_laps);
    match stats.best_lap {
        Some(best) => println!(
            "Best lap time:    {} ({} / {})",
            format_lap_time(best.lap_time),
            best.track_name,
            best.car_model
        ),
        None => println!("Best lap time:    --:--"),
    }
    println!(
        "Average lap time: {}",
        format_lap_time(stats.average_lap_time_ms.round() as u64)
    );
    println!("Tracks:           {}", stats.unique_tracks);

    println!("\nRecent laps:");
    for lap in &stats.recent_laps {
        println!(
            "  {:>18}  {:<24} {:<24} {:>10}  top {:>6.1} km/h  avg {:>6.1} km/h",
            lap.id,
            lap.track_name,
            lap.car_model,
            format_lap_time(lap.lap_time),
            lap.top_speed,
            lap.average_speed
        );
    }

    println!("\nBest lap per track:");
    for lap in DashboardStats::best_laps_by_track(&laps) {
        println!(
            "  {:<24} {:>10}  {}",
            lap.track_name,
            format_lap_time(lap.lap_time),
            lap.car_model
        );
    }
    Ok(())
}

fn show(config: &AppConfig, id: LapId, rows: Option<usize>) -> Result<(), DeltaSyncError> {
    let store = config.open_lap_store()?;
    let summary = store
        .get_lap(id)
        .ok_or_else(|| DeltaSyncError::LapNotFound { id: id.to_string() })?;
    print_summary(summary);

    let telemetry = store.stored_telemetry(id)?;
    let max_rows = rows.unwrap_or(config.max_display_rows);

    println!(
        "\n{:>6}  {:>12}  {:>4}  {:>8}  {:>6}",
        "#", "Speed (km/h)", "Gear", "Throttle", "Brake"
    );
    let fmt_pct = |value: Option<f64>| {
        value
            .map(|v| format!("{:.0}%", v * 100.))
            .unwrap_or_else(|| "-".to_string())
    };
    for (i, sample) in telemetry.iter().take(max_rows).enumerate() {
        println!(
            "{:>6}  {:>12}  {:>4}  {:>8}  {:>6}",
            i + 1,
            sample
                .speed
                .map(|s| format!("{:.1}", s))
                .unwrap_or_else(|| "-".to_string()),
            sample
                .gear
                .map(|g| g.to_string())
                .unwrap_or_else(|| "-".to_string()),
            fmt_pct(sample.throttle),
            fmt_pct(sample.brake)
        );
    }
    if telemetry.len() > max_rows {
        println!("Showing first {} of {} rows.", max_rows, telemetry.len());
    }
    Ok(())
}

fn delete(config: &AppConfig, id: LapId) -> Result<(), DeltaSyncError> {
    let mut store = config.open_lap_store()?;
    store.delete_lap(id)?;
    println!("Deleted lap {}", id);
    Ok(())
}

fn configure(
    config: &mut AppConfig,
    max_display_rows: Option<usize>,
    recent_laps: Option<usize>,
    save_data_dir: bool,
) -> Result<(), DeltaSyncError> {
    let changed = max_display_rows.is_some() || recent_laps.is_some() || save_data_dir;
    if let Some(max_display_rows) = max_display_rows {
        config.max_display_rows = max_display_rows;
    }
    if let Some(recent_laps) = recent_laps {
        config.recent_laps = recent_laps;
    }
    if changed {
        config.save()?;
        info!("Saved config to {:?}", AppConfig::config_path()?);
    }

    let data_dir = match &config.data_dir {
        Some(data_dir) => data_dir.clone(),
        None => FileBasedLapStore::default_storage_path()?,
    };
    println!("Config file:      {:?}", AppConfig::config_path()?);
    println!("Lap store:        {:?}", data_dir);
    println!("Max display rows: {}", config.max_display_rows);
    println!("Recent laps:      {}", config.recent_laps);
    Ok(())
}

fn print_summary(summary: &LapSummary) {
    println!("Lap {}", summary.id);
    println!("  Track:         {}", summary.track_name);
    println!("  Car:           {}", summary.car_model);
    println!("  Best lap:      {}", format_lap_time(summary.lap_time));
    println!("  Top speed:     {:.1} km/h", summary.top_speed);
    println!("  Average speed: {:.1} km/h", summary.average_speed);
    println!(
        "  Pedals:        throttle {:.0}% / brake {:.0}%",
        summary.average_throttle * 100.,
        summary.average_brake * 100.
    );
    if let Some(samples_logged) = summary.samples_logged {
        println!("  Samples:       {}", samples_logged);
    }
    if let Some(last_save_timestamp) = &summary.last_save_timestamp {
        println!("  Logged at:     {}", last_save_timestamp);
    }
}

fn main() -> ExitCode {
    colog::init();

    let cli = Args::parse();
    let mut config = AppConfig::load_or_default();
    let stored_data_dir = config.data_dir.clone();
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = Some(data_dir);
    }

    let result = match &cli.command {
        Commands::Ingest { input, no_save } => ingest(&config, input, *no_save),
        Commands::Laps => laps(&config),
        Commands::Show { id, rows } => show(&config, LapId(*id), *rows),
        Commands::Delete { id } => delete(&config, LapId(*id)),
        Commands::Config {
            max_display_rows,
            recent_laps,
            save_data_dir,
        } => {
            // a one-off --data-dir only sticks when asked to
            if !*save_data_dir {
                config.data_dir = stored_data_dir;
            }
            configure(&mut config, *max_display_rows, *recent_laps, *save_data_dir)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

use std::process::ExitCode;

use tracing::{error, info};

use defmon_service::config::{config_path_from_env, load_config, Config};
use defmon_service::logging::{init_logging, Stage};
use defmon_service::query::{map_view, ColorMode, OrbitFilter};
use defmon_service::{DefmonError, MonitorContext};

fn main() -> ExitCode {
    let config_path = config_path_from_env();
    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load {}: {}", config_path.display(), e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }
    info!(stage = %Stage::System, config = %config_path.display(), "starting defmon");

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(stage = %Stage::System, error = %e, "defmon stopped");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<(), DefmonError> {
    let ctx = MonitorContext::load(config)?;
    let summary = ctx.summary();

    eprintln!("════════════════════════════════════════════════");
    eprintln!("DISPLACEMENT DATASET");
    eprintln!("════════════════════════════════════════════════");
    eprintln!("Registered points:   {}", summary.registered_points);
    eprintln!(
        "Observed points:     {} ({} samples)",
        summary.observed_points, summary.samples
    );
    eprintln!("Provenance labels:   {}", summary.labels.join(", "));
    if let (Some(first), Some(last)) = (summary.first_date, summary.last_date) {
        eprintln!("Date span:           {} .. {}", first, last);
    }
    eprintln!(
        "Anomaly sources:     {} points ({:?} bands)",
        summary.points_with_anomaly_source, summary.band_mode
    );
    eprintln!();

    let view = map_view(
        &ctx,
        Default::default(),
        &OrbitFilter::All,
        ColorMode::AnomalyType,
    );
    let json = serde_json::json!({ "summary": summary, "map": view });
    let text = serde_json::to_string_pretty(&json)
        .map_err(|e| DefmonError::Config(format!("cannot serialize output: {}", e)))?;
    println!("{}", text);
    Ok(())
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use lte_survey::export::SurveyExport;
use lte_survey::screencast::RecognitionBatch;
use lte_survey::track::load_fixes;
use lte_survey::SurveyConfig;

#[derive(Parser, Debug)]
#[command(name = "lte_survey")]
#[command(about = "Align a GPS track with a recognized diagnostics screencast", long_about = None)]
struct Args {
    /// Survey configuration (JSON); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// GPS track: .gpx, or a JSON array of {time, lat, lon} (either may be .gz)
    #[arg(long)]
    gps: PathBuf,

    /// Recognizer output: directory of lte_/tim_ files or a JSON batch
    #[arg(long)]
    frames: PathBuf,

    /// Output file (.json, .json.gz or .csv)
    #[arg(long, default_value = "survey.json")]
    output: PathBuf,

    /// Override the configured survey id
    #[arg(long)]
    survey_id: Option<i64>,

    /// Debug logging
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = match &args.config {
        Some(path) => SurveyConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SurveyConfig::default(),
    };
    if let Some(id) = args.survey_id {
        config.survey_id = id;
    }

    let fixes = load_fixes(&args.gps)
        .with_context(|| format!("loading GPS fixes {}", args.gps.display()))?;
    let batch = RecognitionBatch::load(&args.frames)
        .with_context(|| format!("loading recognition batch {}", args.frames.display()))?;

    let output = lte_survey::run(&config, &fixes, &batch)
        .with_context(|| format!("processing survey {}", config.survey_id))?;

    if let Some(stage) = output.report.first_empty_stage() {
        anyhow::bail!(
            "survey {}: {} produced no valid records",
            config.survey_id,
            stage
        );
    }

    let rows = output.rows.len();
    let export = SurveyExport::new(&config, output);
    export
        .write(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;

    log::info!(
        "survey {}: {} rows written to {}",
        config.survey_id,
        rows,
        args.output.display()
    );
    Ok(())
}

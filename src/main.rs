use anyhow::{Context, Result};
use flairprep::cli::commands::{RunCommand, ScanCommand, ValidateCommand};
use flairprep::cli::output::*;
use flairprep::cli::{Cli, Command};
use flairprep::execution::{BatchEngine, DatasetScanner, ExecutionEvent};
use flairprep::report::SUMMARY_FILE_NAME;
use flairprep::{InputVolume, RunConfig, RunSettings, SubprocessRunner};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_batch(cmd).await?,
        Command::Scan(cmd) => scan_dataset(cmd)?,
        Command::Validate(cmd) => validate_settings(cmd)?,
    }

    Ok(())
}

/// File config (explicit or default location) overlaid with CLI flags
fn load_settings(config: Option<&Path>, overrides: RunConfig) -> Result<RunSettings> {
    RunConfig::load(config)?
        .overlay(overrides)
        .resolve()
        .context("Invalid run settings")
}

fn discover(dataset_dir: &Path, settings: &RunSettings) -> Result<Vec<InputVolume>> {
    let scanner =
        DatasetScanner::new(dataset_dir).with_pattern(settings.name_pattern.clone());
    let inputs = scanner.scan().context("Input discovery failed")?.collect();
    Ok(inputs)
}

async fn run_batch(cmd: &RunCommand) -> Result<()> {
    let settings = load_settings(cmd.config.as_deref(), cmd.overrides())?;
    settings.check_reference()?;

    std::fs::create_dir_all(&settings.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            settings.output_dir.display()
        )
    })?;

    let inputs = discover(&cmd.dataset_dir, &settings)?;
    if inputs.is_empty() {
        println!(
            "{} No FLAIR volumes found in {}",
            WARN,
            style(cmd.dataset_dir.join("images").display()).bold()
        );
        return Ok(());
    }

    println!(
        "{} Reference: {}",
        INFO,
        style(settings.reference_template.display()).bold()
    );
    println!(
        "{} Output: {} ({} mm, f={}, {} job(s))",
        INFO,
        style(settings.output_dir.display()).bold(),
        settings.processing.voxel_size_mm(),
        settings.processing.bet_fraction(),
        settings.jobs
    );

    let runner = Arc::new(SubprocessRunner::new(settings.tool_timeout()));
    let mut engine = BatchEngine::new(runner, &settings);

    // Set up event handler for console output
    let progress = create_progress_bar(inputs.len());
    let bar = progress.clone();
    engine.add_event_handler(move |event| {
        match &event {
            ExecutionEvent::VolumeStarted { stem, .. } => bar.set_message(stem.clone()),
            ExecutionEvent::StageCompleted { stem, state, .. } => {
                bar.set_message(format!("{} {}", stem, format_volume_state(state)))
            }
            _ => {}
        }
        if matches!(
            event,
            ExecutionEvent::VolumeCompleted { .. } | ExecutionEvent::VolumeFailed { .. }
        ) {
            bar.inc(1);
        }
        if let Some(line) = format_execution_event(&event) {
            bar.println(line);
        }
    });

    let summary = engine.run(inputs).await;
    progress.finish_and_clear();

    println!();
    println!("{}", format_summary(&summary));

    if !cmd.no_summary {
        let path = settings.output_dir.join(SUMMARY_FILE_NAME);
        summary.save(&path)?;
        info!("Batch summary written to {}", path.display());
        println!(
            "{} Summary saved to {}",
            INFO,
            style(path.display()).dim()
        );
    }

    if !summary.all_succeeded() {
        error!("{} of {} volume(s) failed", summary.failed, summary.total);
        std::process::exit(1);
    }

    Ok(())
}

fn scan_dataset(cmd: &ScanCommand) -> Result<()> {
    let settings = load_settings(cmd.config.as_deref(), RunConfig::default())?;
    let inputs = discover(&cmd.dataset_dir, &settings)?;

    if cmd.json {
        let entries: Vec<serde_json::Value> = inputs
            .iter()
            .map(|input| {
                serde_json::json!({
                    "input": input.path(),
                    "stem": input.stem(),
                    "output": settings.output_dir.join(input.output_file_name()),
                })
            })
            .collect();
        let data = serde_json::json!({ "inputs": entries });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if inputs.is_empty() {
        println!("{} No FLAIR volumes found", INFO);
        return Ok(());
    }

    println!("{} {} candidate volume(s):", INFO, style(inputs.len()).cyan());
    for input in &inputs {
        println!(
            "  {} → {}",
            style(input.path().display()).bold(),
            style(settings.output_dir.join(input.output_file_name()).display()).dim()
        );
    }
    Ok(())
}

fn validate_settings(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating settings...", INFO);

    let result = load_settings(cmd.config.as_deref(), RunConfig::default())
        .and_then(|settings| settings.check_reference().map(|_| settings));

    match result {
        Ok(settings) => {
            println!("{} Settings are valid!", CHECK);
            println!(
                "  Reference: {}",
                style(settings.reference_template.display()).bold()
            );
            println!("  Output: {}", style(settings.output_dir.display()).cyan());
            println!(
                "  Voxel size: {} mm",
                style(settings.processing.voxel_size_mm()).cyan()
            );
            println!(
                "  bet fraction: {}",
                style(settings.processing.bet_fraction()).cyan()
            );
            println!("  Jobs: {}", style(settings.jobs).cyan());
            println!("  Mask: {:?}", settings.mask_policy);

            if cmd.json {
                let json = serde_json::to_string_pretty(&settings)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

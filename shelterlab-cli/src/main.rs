//! ShelterLab CLI: search, calibrate and inspect commands.
//!
//! Commands:
//! - `prepare`: resolve subgroup labels and write the panel as Parquet
//! - `search`: run the Bayesian hyperparameter search and store the winners
//! - `calibrate`: fit per-subgroup thresholds for a stored model
//! - `inspect`: list stored model artifacts

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shelterlab_core::data::write_parquet;
use shelterlab_core::{build_lagged, split_at, BoostedTrees, BoostedTreesTrainer, Trainer};
use shelterlab_runner::{
    load_panel, run_search, save_calibration, ArtifactStore, ModelArtifact, SearchProgress,
    SelectionMetric, ShelterConfig, SubgroupCalibrator, TrialData,
};

#[derive(Parser)]
#[command(
    name = "shelterlab",
    about = "ShelterLab CLI: predict rising shelter demand with subgroup-calibrated thresholds"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve subgroup label columns and write the prepared panel to Parquet.
    Prepare {
        /// Path to the TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Panel file (.csv or .parquet).
        #[arg(long)]
        panel: PathBuf,

        /// Output Parquet file.
        #[arg(long)]
        output: PathBuf,
    },
    /// Search hyperparameters and save the best model per selection metric.
    Search {
        /// Path to the TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Panel file (.csv or .parquet).
        #[arg(long)]
        panel: PathBuf,

        /// Directory for model artifacts.
        #[arg(long, default_value = "models")]
        models_dir: PathBuf,

        /// Override the configured number of trials.
        #[arg(long)]
        n_calls: Option<usize>,

        /// Override the configured seed.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Calibrate per-subgroup thresholds for a stored model.
    Calibrate {
        /// Path to the TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Panel file (.csv or .parquet).
        #[arg(long)]
        panel: PathBuf,

        /// Directory holding model artifacts.
        #[arg(long, default_value = "models")]
        models_dir: PathBuf,

        /// Which stored winner to calibrate: f1, f2 or combined.
        #[arg(long, default_value = "combined")]
        metric: SelectionMetric,

        /// Output directory for thresholds.json and subgroup_report.csv.
        #[arg(long, default_value = "calibration")]
        output_dir: PathBuf,
    },
    /// List stored model artifacts.
    Inspect {
        /// Directory holding model artifacts.
        #[arg(long, default_value = "models")]
        models_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Prepare {
            config,
            panel,
            output,
        } => run_prepare(&config, &panel, &output),
        Commands::Search {
            config,
            panel,
            models_dir,
            n_calls,
            seed,
        } => run_search_cmd(&config, &panel, &models_dir, n_calls, seed),
        Commands::Calibrate {
            config,
            panel,
            models_dir,
            metric,
            output_dir,
        } => run_calibrate_cmd(&config, &panel, &models_dir, metric, &output_dir),
        Commands::Inspect { models_dir } => run_inspect(&models_dir),
    }
}

fn load_config(path: &Path) -> Result<ShelterConfig> {
    ShelterConfig::from_path(path).with_context(|| format!("loading {}", path.display()))
}

fn run_prepare(config_path: &Path, panel_path: &Path, output: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let prepared = load_panel(panel_path, &config)
        .with_context(|| format!("preparing {}", panel_path.display()))?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    write_parquet(
        &prepared.table,
        &config.schema.entity_column,
        &config.schema.period_column,
        output,
    )?;
    for (dimension, column) in &prepared.dimension_columns {
        println!("{dimension:<10} -> {column}");
    }
    println!(
        "wrote {} rows ({} features) to {}",
        prepared.table.len(),
        prepared.schema.features.len(),
        output.display()
    );
    Ok(())
}

fn run_search_cmd(
    config_path: &Path,
    panel_path: &Path,
    models_dir: &Path,
    n_calls: Option<usize>,
    seed: Option<u64>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(n) = n_calls {
        config.search.n_calls = n;
    }
    if let Some(s) = seed {
        config.search.seed = s;
    }

    let prepared = load_panel(panel_path, &config)
        .with_context(|| format!("preparing {}", panel_path.display()))?;
    let data = TrialData::new(&prepared.table, &prepared.schema, config.search.cutoff);
    let trainer = BoostedTreesTrainer::default();

    let progress = |p: &SearchProgress| {
        let tag = p.degenerate.map(|d| format!(" ({d})")).unwrap_or_default();
        println!(
            "[{:>3}/{}] {}  objective {:.4}  best {:.4}{tag}",
            p.trial + 1,
            p.n_calls,
            p.params,
            p.objective,
            p.best_objective
        );
    };
    let outcome = run_search(&config.search, &data, &trainer, Some(&progress))?;

    println!();
    println!(
        "{} trials ({} degenerate) in {:.1}s{}",
        outcome.trials_run,
        outcome.degenerate_trials,
        outcome.elapsed_secs,
        if outcome.stopped_early {
            ", search space exhausted"
        } else {
            ""
        }
    );
    for metric in SelectionMetric::ALL {
        match outcome.best_result(metric) {
            Some(r) => println!(
                "best {:<8} {}  eval F1 {:.4}  eval F2 {:.4}",
                metric, r.params, r.scores.eval_f1, r.scores.eval_f2
            ),
            None => println!("best {metric:<8} none (no scored trial)"),
        }
    }

    let store = ArtifactStore::new(models_dir);
    for path in store.save_outcome(&outcome, trainer.name(), data.cutoff)? {
        println!("saved {}", path.display());
    }
    Ok(())
}

fn run_calibrate_cmd(
    config_path: &Path,
    panel_path: &Path,
    models_dir: &Path,
    metric: SelectionMetric,
    output_dir: &Path,
) -> Result<()> {
    let config = load_config(config_path)?;
    let prepared = load_panel(panel_path, &config)
        .with_context(|| format!("preparing {}", panel_path.display()))?;

    let artifact: ModelArtifact<BoostedTrees> =
        ArtifactStore::new(models_dir).load_by_metric(metric)?;
    println!(
        "calibrating {} model {} (cutoff {})",
        artifact.metric, artifact.params, artifact.cutoff
    );

    let frame = build_lagged(&prepared.table, &prepared.schema, artifact.params.lags)?;
    if frame.feature_names != artifact.feature_names {
        anyhow::bail!(
            "panel features {:?} do not match the stored model's {:?}",
            frame.feature_names,
            artifact.feature_names
        );
    }
    let eval = split_at(&frame, artifact.cutoff).eval;
    if eval.is_empty() {
        anyhow::bail!("no evaluation rows at period {}", artifact.cutoff);
    }

    let calibration = SubgroupCalibrator::new(config.calibration.beta)?.calibrate_frame(
        &artifact.model,
        &artifact.normalizer,
        &eval,
        &prepared.dimension_columns,
    )?;

    for r in calibration.reports() {
        let threshold = r
            .threshold
            .map(|t| format!("{t:.4}"))
            .unwrap_or_else(|| "default".into());
        println!(
            "{:<10} {:<20} n={:<5} threshold {:<8} F1 {:.4} -> {:.4}  F2 {:.4} -> {:.4}",
            r.dimension,
            r.subgroup,
            r.n_rows,
            threshold,
            r.f1_before,
            r.f1_after,
            r.f2_before,
            r.f2_after
        );
    }

    for path in save_calibration(&calibration, output_dir)? {
        println!("saved {}", path.display());
    }
    Ok(())
}

fn run_inspect(models_dir: &Path) -> Result<()> {
    let store = ArtifactStore::new(models_dir);
    let paths = store.list()?;
    if paths.is_empty() {
        println!("no artifacts in {}", models_dir.display());
        return Ok(());
    }
    for path in paths {
        let artifact: ModelArtifact<BoostedTrees> = store.load(&path)?;
        println!(
            "{:<9} {} [{}]  eval F1 {:.4}  eval F2 {:.4}  trees {}  created {}",
            artifact.metric.as_str(),
            artifact.params,
            artifact.fingerprint.get(..12).unwrap_or(&artifact.fingerprint),
            artifact.scores.eval_f1,
            artifact.scores.eval_f2,
            artifact.model.n_trees(),
            artifact.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

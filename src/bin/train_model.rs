//! Offline training for the scaler/model artifact pair.
//!
//! # Usage
//!
//! ```bash
//! train_model <dataset.csv> [--out <artifact_dir>] [--config <training.json>]
//! ```
//!
//! The dataset is a headered CSV with the thirteen clinical features and a
//! binary `target` column. Artifacts are written to `--out`, or to
//! `CARDIORISK_ARTIFACT_DIR` when omitted. Run `sign_artifacts sign` afterwards
//! if deployments require signed artifacts.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};

use cardiorisk::adapters::FsArtifactStore;
use cardiorisk::config::{RuntimeConfig, TrainingConfig};
use cardiorisk::{logging, Trainer};

const USAGE: &str =
    "Usage: train_model <dataset.csv> [--out <artifact_dir>] [--config <training.json>]";

struct Args {
    dataset: PathBuf,
    out: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut dataset: Option<PathBuf> = None;
    let mut out: Option<PathBuf> = None;
    let mut config: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--out" => out = Some(args.next().ok_or_else(|| anyhow!(USAGE))?.into()),
            "--config" => config = Some(args.next().ok_or_else(|| anyhow!(USAGE))?.into()),
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other if other.starts_with("--") => bail!("Unknown arg: {other}\n{USAGE}"),
            other => {
                if dataset.is_some() {
                    bail!(USAGE);
                }
                dataset = Some(other.into());
            }
        }
    }

    Ok(Args {
        dataset: dataset.ok_or_else(|| anyhow!(USAGE))?,
        out,
        config,
    })
}

fn main() -> Result<()> {
    let args = parse_args()?;
    let mut runtime = RuntimeConfig::from_env();
    if let Some(out) = args.out {
        runtime.artifact_dir = out;
    }
    let _guard = logging::init_tracing(&runtime)?;

    let training = match &args.config {
        Some(path) => TrainingConfig::from_json_file(path)?,
        None => TrainingConfig::default(),
    };
    tracing::info!(
        "Training on {:?} (seed={}, test_fraction={}, folds={})",
        args.dataset,
        training.seed,
        training.test_fraction,
        training.calibration_folds
    );

    let store = FsArtifactStore::new(&runtime.artifact_dir);
    let outcome = Trainer::new(training).train_into(&args.dataset, &store)?;

    println!("Artifacts written to {:?}", runtime.artifact_dir);
    println!(
        "Train/test: {}/{}  accuracy={:.3}  roc_auc={}  brier={:.3}",
        outcome.train_size,
        outcome.test_size,
        outcome.metrics.accuracy,
        outcome
            .metrics
            .roc_auc
            .map_or_else(|| "n/a".to_string(), |v| format!("{v:.3}")),
        outcome.metrics.brier_score
    );
    for reference in &outcome.reference_scores {
        println!(
            "{}: raw {:.1}%  risk {:.1}%",
            reference.name,
            reference.raw_probability * 100.0,
            reference.risk * 100.0
        );
    }
    Ok(())
}

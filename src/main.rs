//! CardioRisk: heart-disease risk scoring from the command line.
//!
//! Reads one patient record as JSON (from a file, or stdin when no path or
//! `-` is given), scores it against the artifacts in `CARDIORISK_ARTIFACT_DIR`
//! and prints the assessment as JSON on stdout. Logs go to stderr by default.

use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};

use cardiorisk::adapters::FsArtifactStore;
use cardiorisk::config::RuntimeConfig;
use cardiorisk::domain::{validate, PartialFeatureRecord};
use cardiorisk::{logging, AssessmentService};

const USAGE: &str = "Usage: cardiorisk [--validate] [--artifacts <dir>] [<record.json> | -]";

struct Args {
    validate_only: bool,
    artifact_dir: Option<PathBuf>,
    input: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut parsed = Args {
        validate_only: false,
        artifact_dir: None,
        input: None,
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--validate" => parsed.validate_only = true,
            "--artifacts" => {
                parsed.artifact_dir = Some(args.next().ok_or_else(|| anyhow!(USAGE))?.into());
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            "-" => parsed.input = None,
            other if other.starts_with("--") => bail!("Unknown arg: {other}\n{USAGE}"),
            other => {
                if parsed.input.is_some() {
                    bail!(USAGE);
                }
                parsed.input = Some(other.into());
            }
        }
    }
    Ok(parsed)
}

fn read_record(input: Option<&PathBuf>) -> Result<PartialFeatureRecord> {
    let text = match input {
        Some(path) => fs::read_to_string(path).with_context(|| format!("Failed to read {path:?}"))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read record from stdin")?;
            buf
        }
    };
    serde_json::from_str(&text).context("Record is not valid JSON")
}

fn main() -> Result<ExitCode> {
    let args = parse_args()?;
    let mut config = RuntimeConfig::from_env();
    if let Some(dir) = args.artifact_dir.clone() {
        config.artifact_dir = dir;
    }
    let _guard = logging::init_tracing(&config)?;

    let partial = read_record(args.input.as_ref())?;

    if args.validate_only {
        let report = validate(&partial);
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(if report.valid {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let record = partial.validate_complete()?;

    tracing::info!("Loading artifacts from {:?}", config.artifact_dir);
    let store = FsArtifactStore::from_config(&config)?;
    let service = AssessmentService::load(&store)?;

    let assessment = service.score_and_recommend(&record)?;
    println!("{}", serde_json::to_string_pretty(&assessment)?);
    Ok(ExitCode::SUCCESS)
}

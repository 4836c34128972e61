use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use morph_contracts::{EventLog, WorkflowSnapshot, WorkflowState};
use morph_engine::{
    estimate, open_source, DryrunTransformer, GeminiTransformer, Session, TransformConfig,
    TransformProvider,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "morph-rs",
    version,
    about = "Turn a photo into a manga-style illustration"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Transform(TransformArgs),
    Estimate(EstimateArgs),
}

#[derive(Debug, Parser)]
struct TransformArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    api_base: Option<String>,
    /// Skip the network and return a placeholder image.
    #[arg(long)]
    dryrun: bool,
    /// Print the final workflow snapshot as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Parser)]
struct EstimateArgs {
    #[arg(long)]
    input: PathBuf,
}

fn main() {
    // A missing .env file is the normal case.
    dotenvy::dotenv().ok();
    init_tracing();

    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("morph-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Transform(args) => run_transform(args),
        Command::Estimate(args) => run_estimate(args),
    }
}

fn run_transform(args: TransformArgs) -> Result<i32> {
    let provider = build_provider(&args);
    let events = args
        .events
        .as_deref()
        .map(|path| EventLog::open(path, uuid::Uuid::new_v4().to_string()))
        .transpose()?;
    let session = Session::new(provider, events);
    tracing::info!(
        provider = session.provider_name(),
        input = %args.input.display(),
        "starting transform"
    );

    let source = open_source(&args.input)
        .with_context(|| format!("failed to load {}", args.input.display()))?;
    session.select_file(source);

    let worker = session
        .start_transform()
        .context("transform did not start")?;
    worker
        .join()
        .map_err(|_| anyhow!("transform worker panicked"))?;

    let snapshot = session.snapshot();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot_report(&snapshot))?);
    }
    match snapshot.state {
        WorkflowState::Success => {
            let image = snapshot
                .result
                .as_ref()
                .context("workflow reported success without an image")?;
            let bytes = image.decode_bytes()?;
            write_output(&args.out, &bytes)?;
            if !args.json {
                println!("Saved {}", args.out.display());
            }
            Ok(0)
        }
        WorkflowState::Error => {
            let message = snapshot
                .error
                .as_deref()
                .unwrap_or("Something went wrong during transformation.");
            eprintln!("Transform failed: {message}");
            if snapshot.credential_error {
                eprintln!(
                    "Set {} (or put it in a .env file) and try again.",
                    TransformConfig::credential_env_keys().join(" or ")
                );
            }
            Ok(1)
        }
        other => Err(anyhow!("transform ended in unexpected state {other}")),
    }
}

fn run_estimate(args: EstimateArgs) -> Result<i32> {
    let source = open_source(&args.input)
        .with_context(|| format!("failed to load {}", args.input.display()))?;
    let tag = estimate(&source)?;
    println!(
        "{}x{} {} -> {}",
        source.width(),
        source.height(),
        source.mime_type(),
        tag
    );
    Ok(0)
}

fn build_provider(args: &TransformArgs) -> Arc<dyn TransformProvider> {
    if args.dryrun {
        return Arc::new(DryrunTransformer);
    }
    let mut config = TransformConfig::from_env();
    if let Some(model) = args.model.as_deref() {
        config = config.with_model(model);
    }
    if let Some(api_base) = args.api_base.as_deref() {
        config = config.with_api_base(api_base);
    }
    Arc::new(GeminiTransformer::new(config))
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

/// Snapshot without the (large) base64 payload.
fn snapshot_report(snapshot: &WorkflowSnapshot) -> serde_json::Value {
    json!({
        "state": snapshot.state,
        "source": snapshot.source,
        "attempt": snapshot.attempt,
        "error": snapshot.error,
        "credential_error": snapshot.credential_error,
        "result_mime_type": snapshot.result.as_ref().map(|image| image.mime_type.clone()),
        "result_payload_chars": snapshot.result.as_ref().map(|image| image.data.len()),
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use clap::Parser;
    use morph_contracts::{GeneratedImage, WorkflowSnapshot, WorkflowState};

    use super::{snapshot_report, write_output, Cli, Command};

    #[test]
    fn transform_args_parse_with_overrides() {
        let cli = Cli::try_parse_from([
            "morph-rs",
            "transform",
            "--input",
            "photo.jpg",
            "--out",
            "out/manga.png",
            "--model",
            "gemini-3-pro-image-preview",
            "--dryrun",
        ])
        .expect("arguments parse");
        let Command::Transform(args) = cli.command else {
            panic!("expected transform command");
        };
        assert_eq!(args.input.to_string_lossy(), "photo.jpg");
        assert_eq!(args.model.as_deref(), Some("gemini-3-pro-image-preview"));
        assert!(args.dryrun);
        assert!(args.events.is_none());
    }

    #[test]
    fn report_omits_image_payload() {
        let snapshot = WorkflowSnapshot {
            state: WorkflowState::Success,
            result: Some(GeneratedImage::png("SU1HU0VDUkVU")),
            ..WorkflowSnapshot::default()
        };
        let report = snapshot_report(&snapshot);
        assert_eq!(report["state"], serde_json::json!("SUCCESS"));
        assert_eq!(report["result_mime_type"], serde_json::json!("image/png"));
        assert_eq!(report["result_payload_chars"], serde_json::json!(12));
        assert!(!report.to_string().contains("SU1HU0VDUkVU"));
    }

    #[test]
    fn write_output_creates_parent_dirs() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("manga.png");
        write_output(&path, b"png")?;
        assert_eq!(fs::read(&path)?, b"png".to_vec());
        Ok(())
    }
}

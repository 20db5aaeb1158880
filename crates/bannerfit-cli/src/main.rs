use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bannerfit_contracts::events::EventLog;
use bannerfit_contracts::image::{ImagePayload, SourceImage};
use bannerfit_contracts::ratios::AspectRatio;
use bannerfit_contracts::summary::{now_utc_iso, write_summary, BatchSummary};
use bannerfit_contracts::variants::{BatchResult, ModelDiscovery, VariantResult};
use bannerfit_engine::config::api_key_from_env;
use bannerfit_engine::{discover_models, BatchOrchestrator, EngineConfig, GeminiTransport};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};

const DEFAULT_PROMPT: &str = "Do not change the content at all. Keep every person, object and color exactly as it is. Only rework the layout so it fits the new frame nicely.";

/// Uploads larger than this are refused before any request is built.
const MAX_SOURCE_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Parser)]
#[command(
    name = "bannerfit",
    version,
    about = "Re-frame one banner image into several aspect ratios"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Generate(GenerateArgs),
    Ratios,
    Models(ModelsArgs),
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long, default_value = DEFAULT_PROMPT)]
    prompt: String,
    /// Repeatable; combined with --ratios.
    #[arg(long = "ratio")]
    ratio: Vec<String>,
    /// Comma separated list, e.g. "16:9,1:1".
    #[arg(long)]
    ratios: Option<String>,
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    pacing_ms: Option<u64>,
}

#[derive(Debug, Parser)]
struct ModelsArgs {
    #[arg(long)]
    api_key: Option<String>,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("bannerfit error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Ratios => {
            print_ratios();
            Ok(0)
        }
        Command::Models(args) => run_models(args),
    }
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let mut config = EngineConfig::from_env();
    if let Some(pacing_ms) = args.pacing_ms {
        config = config.with_pacing_delay(std::time::Duration::from_millis(pacing_ms));
    }
    let api_key = args.api_key.clone().or_else(api_key_from_env);
    let source = load_source_image(&args.image)?;
    let ratios = selected_ratios(&args.ratio, args.ratios.as_deref());
    for ratio in ratios.iter().filter(|ratio| !ratio.is_supported()) {
        eprintln!("note: ratio {ratio} is not in the supported list; sending it as-is");
    }

    let batch_id = format!("batch-{}", compact_timestamp());
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    println!(
        "Generating {} variant(s) with {} (pacing {} ms)...",
        ratios.len(),
        config.model,
        config.pacing_delay.as_millis()
    );

    let orchestrator = BatchOrchestrator::new(GeminiTransport::new(&config), config)
        .with_events(EventLog::new(&events_path, batch_id.clone()));
    let started_at = now_utc_iso();
    let batch = orchestrator
        .generate_batch(Some(&source), &ratios, api_key.as_deref(), &args.prompt)
        .context("batch was not started")?;
    let finished_at = now_utc_iso();

    let written = write_variants(&args.out, &batch)?;
    for (variant, file) in batch.iter().zip(&written.files) {
        println!("{}", describe_variant(variant, file.as_deref()));
    }
    for failure in &written.errors {
        eprintln!("warning: {failure}");
    }
    let files = written.files;

    let summary = BatchSummary::from_batch(&batch_id, started_at, finished_at, &batch, &files);
    let mut extra = Map::new();
    extra.insert("prompt".to_string(), Value::String(args.prompt.clone()));
    extra.insert(
        "model".to_string(),
        Value::String(orchestrator.config().model.clone()),
    );
    extra.insert(
        "events".to_string(),
        Value::String(events_path.display().to_string()),
    );
    if !written.errors.is_empty() {
        extra.insert("write_errors".to_string(), json!(written.errors));
    }
    let summary_path = args.out.join("summary.json");
    write_summary(&summary_path, &summary, Some(&extra))?;

    println!(
        "{} of {} variant(s) succeeded. Summary: {}",
        batch.succeeded(),
        batch.len(),
        summary_path.display()
    );
    Ok(if batch.all_succeeded() && written.errors.is_empty() {
        0
    } else {
        1
    })
}

fn run_models(args: ModelsArgs) -> Result<i32> {
    let Some(api_key) = args.api_key.or_else(api_key_from_env) else {
        bail!("--api-key, GEMINI_API_KEY or GOOGLE_API_KEY not set");
    };
    let config = EngineConfig::from_env();
    match discover_models(&GeminiTransport::new(&config), &api_key) {
        ModelDiscovery::Listed { models } => {
            for model in &models {
                let marker = if model.trim_start_matches("models/") == config.model {
                    "*"
                } else {
                    " "
                };
                println!("{marker} {model}");
            }
            println!("{} model(s) listed.", models.len());
            Ok(0)
        }
        ModelDiscovery::Failed { message } => {
            eprintln!("model listing failed: {message}");
            Ok(1)
        }
    }
}

fn print_ratios() {
    let defaults = AspectRatio::default_selection();
    for ratio in AspectRatio::supported() {
        let marker = if defaults.contains(&ratio) { "*" } else { " " };
        println!(
            "{marker} {:<5} {}",
            ratio.as_str(),
            ratio.label().unwrap_or_default()
        );
    }
    println!("(* selected when no --ratio is given)");
}

/// Reads a PNG or JPEG file into a data URI.
fn load_source_image(path: &Path) -> Result<String> {
    let Some(mime) = mime_for_path(path) else {
        bail!("{} is not a PNG or JPEG image", path.display());
    };
    let size = fs::metadata(path)
        .with_context(|| format!("failed reading {}", path.display()))?
        .len();
    if size > MAX_SOURCE_BYTES {
        bail!(
            "{} is {} bytes; the limit is {} bytes",
            path.display(),
            size,
            MAX_SOURCE_BYTES
        );
    }
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    Ok(SourceImage::from_bytes(mime, &bytes).to_data_uri())
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

fn selected_ratios(repeated: &[String], list: Option<&str>) -> Vec<AspectRatio> {
    let mut ratios: Vec<AspectRatio> = repeated
        .iter()
        .flat_map(|raw| AspectRatio::parse_list(raw))
        .collect();
    if let Some(list) = list {
        ratios.extend(AspectRatio::parse_list(list));
    }
    if ratios.is_empty() {
        return AspectRatio::default_selection();
    }
    ratios
}

#[derive(Debug, Default)]
struct WrittenVariants {
    /// Lines up with `batch.variants`; `None` when nothing was saved.
    files: Vec<Option<String>>,
    errors: Vec<String>,
}

/// Writes every successful variant under `out_dir`. A variant that cannot be
/// saved is reported and skipped; the rest are still written.
fn write_variants(out_dir: &Path, batch: &BatchResult) -> Result<WrittenVariants> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    let mut written = WrittenVariants::default();
    for (idx, variant) in batch.iter().enumerate() {
        let Some(image_url) = variant.image_url() else {
            written.files.push(None);
            continue;
        };
        match write_variant(out_dir, idx, variant.ratio(), image_url) {
            Ok(name) => written.files.push(Some(name)),
            Err(err) => {
                written.files.push(None);
                let ratio = variant.ratio();
                written
                    .errors
                    .push(format!("variant {} ({ratio}) not saved: {err:#}", idx + 1));
            }
        }
    }
    Ok(written)
}

fn write_variant(
    out_dir: &Path,
    idx: usize,
    ratio: &AspectRatio,
    image_url: &str,
) -> Result<String> {
    let payload = ImagePayload::from_data_uri(image_url)?;
    let bytes = payload.decode_bytes()?;
    let name = variant_file_name(idx, ratio, payload.extension());
    let path = out_dir.join(&name);
    fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(name)
}

fn variant_file_name(idx: usize, ratio: &AspectRatio, ext: &str) -> String {
    format!("variant-{:02}-{}.{}", idx + 1, ratio.file_stem(), ext)
}

fn describe_variant(variant: &VariantResult, file: Option<&str>) -> String {
    match variant {
        VariantResult::Success { ratio, .. } => {
            format!("[ok]     {:<5} -> {}", ratio.as_str(), file.unwrap_or("-"))
        }
        VariantResult::Failure {
            ratio,
            kind,
            message,
            discovery,
            ..
        } => {
            let mut line = format!("[failed] {:<5} {}: {}", ratio.as_str(), kind.as_str(), message);
            if let Some(ModelDiscovery::Listed { models }) = discovery {
                let listing = json!(models);
                line.push_str(&format!("\n         available models: {listing}"));
            }
            line
        }
    }
}

fn compact_timestamp() -> String {
    chrono::Utc::now().format("%Y%m%dT%H%M%S").to_string()
}

use crate::{
    classify::{Category, LogClassifier, LogEvent},
    config::Config,
    events::PipelineEvent,
    invoker::ProcessInvoker,
    pipeline::Coordinator,
    report::EventCounts,
    util::ensure_dir,
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "sheet-mend")]
#[command(about = "Spreadsheet validation pipeline (external correction engine + log classification)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./sheet-mend.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check the engine deployment and print a diagnostic.
    Doctor {},
    /// Classify an existing engine log file and print the events.
    Classify {
        #[arg(long)]
        input: PathBuf,
    },
    /// Run the full pipeline on one spreadsheet.
    Run {
        #[arg(long)]
        input: PathBuf,
        /// Override the configured engine executable.
        #[arg(long)]
        engine: Option<PathBuf>,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg_path = resolve_config_path(args.config.as_deref())?;
    let cfg = Config::load(&cfg_path)?;
    let _guard = init_logging(&args, &cfg)?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Classify { input } => classify(&cfg, input),
        Command::Run { input, engine } => run(&cfg, input, engine.as_deref()),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = user {
        return Ok(p.to_path_buf());
    }
    let default = PathBuf::from("sheet-mend.toml");
    if default.exists() {
        Ok(default)
    } else {
        Ok(PathBuf::from("sheet-mend.example.toml"))
    }
}

fn init_logging(args: &Args, cfg: &Config) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .boxed()
    };

    let (file_layer, guard) = if cfg.logging.write_to_file {
        let path = if cfg.logging.file_path.is_empty() {
            PathBuf::from("sheet-mend.log")
        } else {
            PathBuf::from(&cfg.logging.file_path)
        };
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(&path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn doctor(cfg: &Config) -> Result<()> {
    let path = PathBuf::from(&cfg.engine.path);
    let meta = std::fs::metadata(&path).ok();
    let exists = meta.as_ref().is_some_and(|m| m.is_file());
    let executable = exists && meta.as_ref().is_some_and(is_executable);

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "engine_path": &cfg.engine.path,
            "exists": exists,
            "executable": executable,
            "timeout_seconds": cfg.engine.timeout_seconds,
            "valid_output_filename": &cfg.engine.valid_output_filename,
            "ok": exists && executable,
        }))?
    );
    Ok(())
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    true
}

fn classify(cfg: &Config, input: &Path) -> Result<()> {
    let classifier = LogClassifier::from_config(cfg)?;
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("reading log file: {}", input.display()))?;

    let events: Vec<LogEvent> = classifier.classify(text.lines()).collect();
    let mut counts = EventCounts::default();
    for event in &events {
        counts.record(event.category);
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "file": input,
            "counts": counts,
            "events": events,
        }))?
    );
    Ok(())
}

fn run(cfg: &Config, input: &Path, engine_override: Option<&Path>) -> Result<()> {
    validate_input(input)?;

    let mut cfg = cfg.clone();
    if let Some(engine) = engine_override {
        cfg.engine.path = engine.display().to_string();
    }

    let coordinator = Coordinator::new(cfg.clone(), ProcessInvoker);
    let handle = coordinator.spawn(input)?;
    info!("job_id={} input={}", handle.id, input.display());

    for event in handle.events().iter() {
        match event {
            PipelineEvent::Progress {
                percent, message, ..
            } => info!("[{percent:>3}%] {message}"),
            PipelineEvent::Log(ev) => match ev.category {
                Category::Error => error!("{}", ev.raw),
                Category::Warning => warn!("{}", ev.raw),
                Category::Correction | Category::Success | Category::Info => info!("{}", ev.raw),
            },
            PipelineEvent::Finished(_) => {}
        }
    }

    let summary = handle.join();

    if !cfg.output.report_path.is_empty() {
        std::fs::write(
            &cfg.output.report_path,
            serde_json::to_string_pretty(&summary)?,
        )
        .with_context(|| format!("writing report: {}", cfg.output.report_path))?;
    }

    if cfg.global.print_summary {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    if summary.ok {
        Ok(())
    } else {
        Err(anyhow!(summary.message))
    }
}

fn validate_input(input: &Path) -> Result<()> {
    if !input.exists() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }

    match input.extension().and_then(|s| s.to_str()) {
        Some(ext)
            if ["xlsx", "xls", "csv"]
                .iter()
                .any(|k| ext.eq_ignore_ascii_case(k)) => {}
        Some(ext) => warn!("unrecognized input extension '{ext}'; attempting anyway"),
        None => warn!("input has no extension; attempting anyway"),
    }

    Ok(())
}

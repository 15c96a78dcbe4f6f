use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use webui_state::emit::{emit_store_scripts, inject_scripts};
use webui_state::{ScopedStateStore, StateConfiguration};

/// Compile an exported state snapshot (read from stdin) into client scripts.
#[derive(Debug, Parser)]
#[command(name = "webui-state", version)]
struct Cli {
    /// Site output directory; scripts land in `<out-dir>/scripts/`.
    #[arg(long = "out-dir", value_name = "DIR")]
    out_dir: PathBuf,

    /// JSON configuration file (camelCase fields).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Emit a single `state.js` instead of one script per scope.
    #[arg(long)]
    combined: bool,

    /// HTML documents (relative to the output directory) to reference the
    /// emitted scripts from.
    #[arg(long = "inject", value_name = "HTML")]
    inject: Vec<PathBuf>,

    #[arg(long = "log-level", value_enum, default_value = "warn")]
    log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level);
    if let Err(err) = run(&cli) {
        eprintln!("[webui-state] {:#}", err);
        process::exit(1);
    }
}

fn init_logging(level: LogLevel) {
    // RUST_LOG overrides the flag.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,webui_state={}", level.as_str()))
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: &Cli) -> Result<()> {
    let mut stdin_payload = String::new();
    io::stdin()
        .read_to_string(&mut stdin_payload)
        .context("failed to read stdin")?;
    if stdin_payload.trim().is_empty() {
        bail!("stdin payload is empty");
    }

    let config = match &cli.config {
        Some(path) => StateConfiguration::from_json_file(path)
            .with_context(|| format!("failed to load config '{}'", path.display()))?,
        None => StateConfiguration::default(),
    };

    let store = ScopedStateStore::with_config(config.clone());
    store
        .try_import_json(&stdin_payload)
        .context("invalid state payload")?;

    fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("failed to create output dir '{}'", cli.out_dir.display()))?;

    let targets = emit_store_scripts(&store, &cli.out_dir, &config, cli.combined)
        .context("failed to write state scripts")?;
    tracing::info!(
        scripts = targets.len(),
        out_dir = %cli.out_dir.display(),
        "emitted state scripts"
    );

    for rel in &cli.inject {
        let path = cli.out_dir.join(rel);
        let html = fs::read_to_string(&path)
            .with_context(|| format!("failed to read html '{}'", path.display()))?;
        fs::write(&path, inject_scripts(&html, &targets))
            .with_context(|| format!("failed to write html '{}'", path.display()))?;
        tracing::debug!(path = %path.display(), "referenced state scripts");
    }

    Ok(())
}

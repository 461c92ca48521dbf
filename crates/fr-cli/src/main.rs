//! FluxReader CLI

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fr_core::Parameters;
use fr_spectra::{Combiner, OutputDir};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "fluxreader")]
#[command(about = "FluxReader - weighted neutrino flux spectra from decay records")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill spectra from flux files
    Read {
        /// Run configuration (YAML, or JSON by extension)
        #[arg(short, long)]
        config: PathBuf,

        /// Output file; overrides `output` in the config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Add flavor- and parent-summed histograms to a result file
    Combine {
        /// Result file written by `read`
        #[arg(short, long)]
        file: PathBuf,

        /// Which sums to add
        #[arg(long, value_enum, default_value = "all")]
        what: CombineWhat,

        /// Write here instead of overwriting the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a parameter set and its histogram names
    Params {
        /// Distinguish particles from antiparticles
        #[arg(long)]
        sign_sensitive: bool,

        /// Detector names to include
        #[arg(long = "detector")]
        detectors: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CombineWhat {
    All,
    Flavors,
    Parents,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Read { config, output } => cmd_read(&config, output.as_deref()),
        Commands::Combine { file, what, output } => cmd_combine(&file, what, output.as_deref()),
        Commands::Params { sign_sensitive, detectors } => cmd_params(sign_sensitive, &detectors),
    }
}

fn cmd_read(config: &Path, output: Option<&Path>) -> Result<()> {
    let mut cfg = config::read_run_config(config)?;
    if let Some(base) = config.parent() {
        cfg.rebase(base);
    }
    if let Some(out) = output {
        cfg.output = out.to_path_buf();
    }

    let mut reader = cfg.build_reader()?;
    tracing::info!("reading {} files", reader.files().len());

    let mut out = OutputDir::new();
    let summary = reader.read_flux(&mut out).context("flux reading failed")?;
    out.save(&cfg.output).with_context(|| format!("failed to write {}", cfg.output.display()))?;

    let report = serde_json::json!({
        "files": summary.files,
        "entries": summary.entries,
        "pot": summary.pot,
        "output": cfg.output,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_combine(file: &Path, what: CombineWhat, output: Option<&Path>) -> Result<()> {
    let mut combiner =
        Combiner::open(file).with_context(|| format!("failed to open {}", file.display()))?;
    match what {
        CombineWhat::All => combiner.combine_all()?,
        CombineWhat::Flavors => combiner.combine_nu_flavs()?,
        CombineWhat::Parents => combiner.combine_parents()?,
    }
    match output {
        Some(path) => combiner.save_as(path)?,
        None => combiner.save()?,
    }
    tracing::info!("combined {} spectra", combiner.spectra().count());
    Ok(())
}

fn cmd_params(sign_sensitive: bool, detectors: &[String]) -> Result<()> {
    let mut params = Parameters::new(sign_sensitive);
    for d in detectors {
        params.add_detector(fr_core::Detector::placeholder(d.as_str()));
    }
    let names: Vec<String> = (0..params.max_master()).filter_map(|m| params.name_tag(m)).collect();
    let report = serde_json::json!({
        "nu_flavs": params.nu_flavs().iter().map(|p| p.name()).collect::<Vec<_>>(),
        "parents": params.parents().iter().map(|p| p.name()).collect::<Vec<_>>(),
        "xsecs": params.xsecs(),
        "detectors": params.detectors().iter().map(|d| d.name()).collect::<Vec<_>>(),
        "max_master": params.max_master(),
        "names": names,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

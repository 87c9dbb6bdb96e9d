// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workflow export CLI
//!
//! Exports workflow JSON files to runnable programs.
//!
//! Usage:
//!
//! ```text
//! flowgen-export export --workflow <path> [--output <path>] [--manifest <path>] [--secrets <path>]
//! flowgen-export schema
//! flowgen-export batch --workflows <paths>... --output-dir <dir>
//! ```
//!
//! Example:
//!
//! ```text
//! flowgen-export export --workflow poem.json --output poem.py --manifest poem.manifest.json
//! ```

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use flowgen_export::{ExportConfig, ExportOutput, export};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "flowgen-export", version)]
#[command(about = "Export multi-agent workflow graphs to runnable programs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export one workflow
    Export(ExportArgs),
    /// Print the JSON Schema of the workflow format
    Schema,
    /// Export many workflows into one directory
    Batch(BatchArgs),
}

/// Overrides for values otherwise read from FLOWGEN_* environment variables
#[derive(Args, Debug)]
struct ConfigArgs {
    /// Maximum identifier length (minimum 8)
    #[arg(long)]
    max_name_length: Option<usize>,

    /// Package name of the orchestration runtime
    #[arg(long)]
    runtime_package: Option<String>,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Path to workflow JSON file
    #[arg(long)]
    workflow: PathBuf,

    /// Program output path (default: stdout)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write the JSON manifest here
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Write the secrets loader here (if the workflow has secrets)
    #[arg(long)]
    secrets: Option<PathBuf>,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Paths to workflow JSON files
    #[arg(long, num_args = 1.., required = true)]
    workflows: Vec<PathBuf>,

    /// Directory receiving `<name>.py` and `<name>.manifest.json` per workflow
    #[arg(long)]
    output_dir: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,
}

fn main() -> ExitCode {
    // Initialize minimal logging (default to warn if RUST_LOG not set)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Export(args) => run_export(args),
        Command::Schema => run_schema(),
        Command::Batch(args) => run_batch(args),
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &ConfigArgs) -> Result<ExportConfig> {
    let mut config = ExportConfig::from_env().context("Invalid environment configuration")?;
    if let Some(length) = args.max_name_length {
        config = config
            .with_max_name_length(length)
            .context("Invalid --max-name-length")?;
    }
    if let Some(package) = &args.runtime_package {
        config = config
            .with_runtime_package(package)
            .context("Invalid --runtime-package")?;
    }
    Ok(config)
}

fn export_file(path: &Path, config: &ExportConfig) -> Result<ExportOutput> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Error reading workflow file {:?}", path))?;
    let graph = flowgen_dsl::parse_workflow(&json).map_err(|e| anyhow!(e))?;
    export(&graph, config).with_context(|| format!("Export of workflow '{}' failed", graph.id))
}

fn run_export(args: ExportArgs) -> Result<ExitCode> {
    let config = load_config(&args.config)?;
    let output = export_file(&args.workflow, &config)?;

    match &args.output {
        Some(path) => {
            fs::write(path, &output.program)
                .with_context(|| format!("Error writing program to {:?}", path))?;
        }
        None => print!("{}", output.program),
    }
    if let Some(path) = &args.manifest {
        let manifest = output.manifest_json()?;
        fs::write(path, manifest)
            .with_context(|| format!("Error writing manifest to {:?}", path))?;
    }
    if let (Some(path), Some(text)) = (&args.secrets, &output.standalone_text) {
        fs::write(path, format!("{}\n", text))
            .with_context(|| format!("Error writing secrets loader to {:?}", path))?;
    }

    eprintln!("Export successful:");
    eprintln!("  Identifiers: {}", output.names.len());
    eprintln!("  Environment variables: {}", output.env_vars.len());
    eprintln!("  Checksum: {}", output.checksum);
    if let Some(path) = &args.output {
        // Print final path to stdout for scripts to capture
        println!("{}", path.display());
    }

    Ok(ExitCode::SUCCESS)
}

fn run_schema() -> Result<ExitCode> {
    let schema = flowgen_dsl::workflow_schema()?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(ExitCode::SUCCESS)
}

/// Artifact stem per workflow, in input order.
///
/// A stem shared by several inputs would make their exports overwrite each
/// other, so every input sharing it gets an error instead.
fn output_stems(paths: &[PathBuf]) -> Vec<Result<String>> {
    let stems: Vec<String> = paths
        .iter()
        .map(|path| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("workflow")
                .to_string()
        })
        .collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for stem in &stems {
        *counts.entry(stem.as_str()).or_default() += 1;
    }

    stems
        .iter()
        .map(|stem| match counts[stem.as_str()] {
            1 => Ok(stem.clone()),
            shared => Err(anyhow!(
                "output name '{}' is shared by {} workflows; rename the inputs",
                stem,
                shared
            )),
        })
        .collect()
}

fn run_batch(args: BatchArgs) -> Result<ExitCode> {
    let config = load_config(&args.config)?;
    let output_dir = args.output_dir.as_path();
    let stems = output_stems(&args.workflows);

    let outcomes: Vec<(&Path, Result<PathBuf>)> = std::thread::scope(|scope| {
        let handles: Vec<_> = args
            .workflows
            .iter()
            .zip(stems)
            .map(|(path, stem)| {
                let config = &config;
                let handle = stem.map(|stem| {
                    scope.spawn(move || -> Result<PathBuf> {
                        let output = export_file(path, config)?;
                        let artifacts = output
                            .write_to(output_dir, &stem)
                            .with_context(|| format!("Error writing artifacts for {:?}", path))?;
                        Ok(artifacts.program_path)
                    })
                });
                (path, handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(path, handle)| {
                let result = match handle {
                    Ok(handle) => handle
                        .join()
                        .unwrap_or_else(|_| Err(anyhow!("export thread panicked"))),
                    Err(e) => Err(e),
                };
                (path.as_path(), result)
            })
            .collect()
    });

    let mut failures = 0;
    for (path, result) in &outcomes {
        match result {
            Ok(program_path) => println!("{}", program_path.display()),
            Err(e) => {
                failures += 1;
                eprintln!("Error exporting {:?}: {:#}", path, e);
            }
        }
    }

    eprintln!(
        "Exported {} of {} workflows",
        outcomes.len() - failures,
        outcomes.len()
    );
    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

//! `aisentry` — CLI shell over the scan engine.
//!
//! Thin by design: argument parsing, config overrides, report rendering,
//! and the exit-code contract. All analysis lives in the library.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use aisentry_scan_engine::diff::SbomDiff;
use aisentry_scan_engine::mockgen::{
    write_demo_diff_sboms, write_mock_gguf, write_mock_malware_pt,
    write_mock_restricted_safetensors,
};
use aisentry_scan_engine::remote::is_remote_target;
use aisentry_scan_engine::{reporter, ScanConfig, ScanEngine, ScanReport};

#[derive(Parser)]
#[command(name = "aisentry", version, about = "Static analyzer for ML model artifacts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory or remote repository for model artifacts.
    Scan {
        /// Directory or URL (`http(s)://`, `hf://org/repo`) to scan.
        #[arg(default_value = ".")]
        target: String,

        /// Output file path (defaults per format).
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format.
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// CycloneDX schema version (1.5 or 1.6).
        #[arg(long, default_value = "1.6")]
        schema_version: String,

        /// Do not exit 2 on CRITICAL findings.
        #[arg(long)]
        no_fail_on_risk: bool,

        /// Strict allowlist mode: flag any unknown import.
        #[arg(long)]
        strict: bool,

        /// Attach a migration-lint report to PyTorch records.
        #[arg(long)]
        lint: bool,

        /// Additional exclusion patterns (repeatable).
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// Compare two SBOM files (CycloneDX JSON) and detect drift.
    Diff {
        /// Baseline SBOM path.
        old_file: PathBuf,

        /// New SBOM path.
        new_file: PathBuf,

        /// Do not exit 1 when risk increases or hashes drift.
        #[arg(long)]
        no_fail_on_risk_increase: bool,
    },

    /// Generate harmless mock artifacts for testing the scanner.
    GenerateTestArtifacts {
        /// Directory to generate test files in.
        #[arg(default_value = ".")]
        directory: PathBuf,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Neutral inventory document.
    Json,
    /// CycloneDX component list.
    Cyclonedx,
    /// SPDX 2.3 document.
    Spdx,
    /// Markdown table report.
    Markdown,
}

impl OutputFormat {
    fn default_output(self) -> &'static str {
        match self {
            Self::Json => "inventory.json",
            Self::Cyclonedx => "sbom.json",
            Self::Spdx => "sbom.spdx.json",
            Self::Markdown => "aisentry-report.md",
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Command::Scan {
            target,
            output,
            format,
            schema_version,
            no_fail_on_risk,
            strict,
            lint,
            exclude,
        } => run_scan(
            &target,
            output,
            format,
            &schema_version,
            !no_fail_on_risk,
            strict,
            lint,
            exclude,
        )?,
        Command::Diff {
            old_file,
            new_file,
            no_fail_on_risk_increase,
        } => run_diff(&old_file, &new_file, !no_fail_on_risk_increase)?,
        Command::GenerateTestArtifacts { directory } => {
            run_generate(&directory)?;
            0
        }
    };

    std::process::exit(exit_code);
}

#[allow(clippy::too_many_arguments)]
fn run_scan(
    target: &str,
    output: Option<PathBuf>,
    format: OutputFormat,
    schema_version: &str,
    fail_on_risk: bool,
    strict: bool,
    lint: bool,
    exclude: Vec<String>,
) -> anyhow::Result<i32> {
    let mut config = if is_remote_target(target) {
        ScanConfig::default()
    } else {
        ScanConfig::load(Path::new(target)).context("loading aisentry.toml")?
    };
    config.strict_mode |= strict;
    config.lint |= lint;
    config.fail_on_risk = fail_on_risk;
    config.exclude.extend(exclude);

    println!("AIsentry scanning: {target}");
    let engine = ScanEngine::new(config);
    let report = engine.scan(target);

    print_scan_summary(&report);

    let rendered = match format {
        OutputFormat::Json => reporter::to_json(&report),
        OutputFormat::Cyclonedx => reporter::to_cyclonedx(&report, schema_version),
        OutputFormat::Spdx => reporter::to_spdx(&report),
        OutputFormat::Markdown => Ok(reporter::to_markdown(&report)),
    }
    .map_err(anyhow::Error::msg)?;

    let output = output.unwrap_or_else(|| PathBuf::from(format.default_output()));
    std::fs::write(&output, rendered)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("Report written: {}", output.display());

    let exit_code = report.exit_code(engine.config().fail_on_risk);
    if exit_code == 2 {
        println!("CRITICAL risks detected. Exiting with code 2.");
    } else if exit_code == 1 {
        println!("Errors encountered during scan. Exiting with code 1.");
    }
    Ok(exit_code)
}

fn print_scan_summary(report: &ScanReport) {
    if report.artifacts.is_empty() {
        println!("No AI model artifacts found.");
    } else {
        println!("Artifacts:");
        for artifact in &report.artifacts {
            println!(
                "  {:<40} {:<18} risk={:<40} legal={}",
                artifact.name,
                artifact.framework.to_string(),
                artifact.risk_level.to_string(),
                artifact.legal_status
            );
        }
    }

    if !report.dependencies.is_empty() {
        println!("Found {} library dependencies.", report.dependencies.len());
    }

    for error in &report.errors {
        println!("error: could not parse {}: {}", error.file, error.error);
    }
}

fn run_diff(old_file: &Path, new_file: &Path, fail_on_risk_increase: bool) -> anyhow::Result<i32> {
    let differ = SbomDiff::from_files(old_file, new_file).context("loading SBOM documents")?;
    let result = differ.compare();

    println!(
        "Comparing {} -> {}",
        old_file.display(),
        new_file.display()
    );

    for item in &result.added {
        println!("  added:    {} (risk={})", item.name, item.risk());
    }
    for item in &result.removed {
        println!("  removed:  {}", item.name);
    }
    for change in &result.changed {
        let mut details = Vec::new();
        if let Some((old, new)) = &change.risk_diff {
            details.push(format!("risk {old} -> {new}"));
        }
        if let Some((old, new)) = &change.legal_status_diff {
            details.push(format!("legal {old} -> {new}"));
        }
        if let Some((old, new)) = &change.license_diff {
            details.push(format!("license {old} -> {new}"));
        }
        if let Some((old, new)) = &change.version_diff {
            details.push(format!("version {old} -> {new}"));
        }
        if let Some((old, new)) = &change.hash_diff {
            details.push(format!(
                "hash {}... -> {}... (integrity fail)",
                &old[..old.len().min(8)],
                &new[..new.len().min(8)]
            ));
        }
        println!("  modified: {} ({})", change.name, details.join(", "));
    }

    if result.added.is_empty() && result.removed.is_empty() && result.changed.is_empty() {
        println!("No changes detected.");
    }

    if fail_on_risk_increase && (result.risk_increased || result.hash_drifted) {
        println!("FAILURE: critical risk increase or hash drift detected.");
        return Ok(1);
    }
    println!("Success: no critical regression detected.");
    Ok(0)
}

fn run_generate(directory: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(directory)
        .with_context(|| format!("creating {}", directory.display()))?;

    let malware = write_mock_malware_pt(directory)?;
    println!("Created: {} (simulates pickle RCE)", malware.display());

    let restricted = write_mock_restricted_safetensors(directory)?;
    println!(
        "Created: {} (simulates restrictive license)",
        restricted.display()
    );

    let gguf = write_mock_gguf(directory)?;
    println!("Created: {} (simulates GGUF license risk)", gguf.display());

    let (baseline, drifted) = write_demo_diff_sboms(directory)?;
    println!(
        "Created: {} and {} (baseline and drifted SBOMs for diff)",
        baseline.display(),
        drifted.display()
    );

    println!("Done. Now run: aisentry scan {}", directory.display());
    Ok(())
}

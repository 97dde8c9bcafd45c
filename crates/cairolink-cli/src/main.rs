use anyhow::Result;
use clap::{Parser, ValueEnum};
use colored::*;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use cairolink_core::{AnalyzeOptions, ContractAnalysis, ContractAnalyzer};
use cairolink_link::{LinkOptions, LinkOutput, LinkPipeline};
use cairolink_report::{build_report, render_json, render_summary, render_yaml};

#[derive(Parser)]
#[command(name = "cairolink")]
#[command(about = "Link and analyze Cairo smart contracts without the compiler")]
#[command(version)]
struct Cli {
    /// Cairo files or directories to scan
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    #[arg(long, value_enum, default_value = "summary")]
    format: Format,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Fail on missing imports instead of creating stubs
    #[arg(long)]
    no_stub: bool,

    /// Include test files in the scan
    #[arg(long)]
    include_tests: bool,

    /// Include the stub report section in the summary output
    #[arg(long)]
    stub_report: bool,

    /// Run control flow and dataflow analysis
    #[arg(long)]
    analyze: bool,

    /// Separate output file for analysis results
    #[arg(long)]
    analysis_output: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "json")]
    analysis_format: AnalysisFormat,

    /// Cap on CFG path enumeration per function
    #[arg(long, default_value_t = 100)]
    max_paths: usize,

    /// Display analysis warnings in the summary output
    #[arg(long)]
    show_warnings: bool,

    /// Suppress progress messages
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Summary,
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AnalysisFormat {
    Json,
    Yaml,
}

fn main() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("warn"));
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{} {err:#}", "error:".bright_red().bold());
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let start = Instant::now();

    let options = LinkOptions {
        stub_missing: !cli.no_stub,
        exclude_tests: !cli.include_tests,
    };

    if !cli.quiet {
        println!("{}", " cairolink".bright_blue().bold());
        println!("{}", "=".repeat(50).bright_blue());
        for path in &cli.paths {
            println!(" Input: {}", path.display());
        }
        println!();
    }

    let output = LinkPipeline::new(options).run(&cli.paths)?;

    if !cli.quiet {
        println!(
            " Linked {} files, {} symbols, {} stubs",
            output.total_files(),
            output.stub_report.total_symbols,
            output.stub_report.total_stubs
        );
    }

    let analyses = if cli.analyze {
        let analyzer = ContractAnalyzer::new(AnalyzeOptions {
            max_paths: cli.max_paths,
        });
        let results = analyzer.analyze_contracts(output.contracts());
        if !cli.quiet {
            let stats = cairolink_core::summarize(&results);
            println!(
                " Analyzed {} functions, {} warnings",
                stats.functions_with_body, stats.total_warnings
            );
        }
        Some(results)
    } else {
        None
    };

    if let Some(path) = &cli.analysis_output {
        let results = analyses.as_deref().unwrap_or(&[]);
        let value = serde_value(results)?;
        let text = match cli.analysis_format {
            AnalysisFormat::Json => render_json(&value)?,
            AnalysisFormat::Yaml => render_yaml(&value)?,
        };
        fs::write(path, text)?;
        if !cli.quiet {
            println!(" Analysis results written to {}", path.display());
        }
    }

    let rendered = match cli.format {
        Format::Summary => render_summary(
            &output,
            analyses.as_deref(),
            cli.stub_report,
            cli.show_warnings,
        ),
        Format::Json => render_json(&build_report(&output, analyses.as_deref())?)?,
        Format::Yaml => render_yaml(&build_report(&output, analyses.as_deref())?)?,
    };

    match &cli.output {
        Some(path) => {
            fs::write(path, &rendered)?;
            if !cli.quiet {
                println!(
                    "\n {} Output written to {} in {:.3}s",
                    "done:".bright_green().bold(),
                    path.display(),
                    start.elapsed().as_secs_f64()
                );
            }
        }
        None => println!("{rendered}"),
    }

    Ok(exit_code(&output, cli.no_stub))
}

fn serde_value(results: &[ContractAnalysis]) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(results)?)
}

/// Stubbed imports count as success; a run only fails when stubbing is
/// disabled and imports stay unresolved, or when an input file could not
/// be read.
fn exit_code(output: &LinkOutput, no_stub: bool) -> i32 {
    if no_stub && output.has_unresolved_imports() {
        return 1;
    }
    if !output.io_errors.is_empty() {
        return 1;
    }
    0
}

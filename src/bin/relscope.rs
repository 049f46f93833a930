//! relscope — the relationship & schema auditor CLI.
//!
//! # Usage
//!
//! ```bash
//! # Full analysis against the configured database
//! relscope analyze --database-url sqlite://database/database.sqlite
//!
//! # Machine-readable report for CI
//! relscope analyze --json --strict
//!
//! # Condensed health report
//! relscope health
//!
//! # What did the scanner find?
//! relscope models
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::*;

use relscope::extractor::RelationshipExtractor;
use relscope::prelude::*;
use relscope::report;
use relscope::scanner::ModelScanner;

#[derive(Parser)]
#[command(name = "relscope")]
#[command(version)]
#[command(about = "Audit Eloquent relationships against your database schema", long_about = None)]
#[command(after_help = "EXAMPLES:
    relscope analyze
    relscope analyze --model User --model Post --json
    relscope health --database-url mysql://root@localhost/app
    relscope models")]
struct Cli {
    /// Database connection URL (sqlite:// or mysql://)
    #[arg(long, env = "RELSCOPE_DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Path to a relscope.toml configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis
    Analyze {
        /// Only analyze these models (short or fully-qualified names)
        #[arg(short, long)]
        model: Vec<String>,

        /// Emit the JSON report instead of the console view
        #[arg(long)]
        json: bool,

        /// Treat warnings as failures in the exit code
        #[arg(long)]
        strict: bool,
    },

    /// Show the condensed health report
    Health {
        /// Emit the JSON report instead of the console view
        #[arg(long)]
        json: bool,
    },

    /// List the scanned models and their relationships
    Models {
        /// Emit JSON instead of the table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e}", "Error:".red().bold());
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = AnalyzerConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.database_url {
        config.database_url = Some(url);
    }

    match cli.command {
        Commands::Analyze {
            model,
            json,
            strict,
        } => {
            let strict = strict || config.strict || strict_from_env();
            let analyzer = ModelAnalyzer::connect(config).await?;
            let only = (!model.is_empty()).then_some(model);
            let result = analyzer.analyze_with(only.as_deref(), &mut |_| {}).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&result.to_json())?);
            } else {
                report::print_analysis(&result);
            }
            Ok(exit_code(&result, strict))
        }

        Commands::Health { json } => {
            let strict = config.strict || strict_from_env();
            let analyzer = ModelAnalyzer::connect(config).await?;
            let result = analyzer.analyze().await;

            if json {
                println!("{}", serde_json::to_string_pretty(&result.to_json())?);
            } else {
                report::print_health_report(&result);
            }
            Ok(exit_code(&result, strict))
        }

        // Listing models needs no database at all.
        Commands::Models { json } => {
            let scanner = ModelScanner::new(
                config.model_paths.clone(),
                config.excluded_models.clone(),
            );
            let (registry, classes) = scanner.scan();
            let mut extractor = RelationshipExtractor::new(&registry);

            let mut models = Vec::new();
            for class in &classes {
                let Some(php_class) = registry.get(class) else {
                    continue;
                };
                let Some(table) = registry.table_of(class) else {
                    continue;
                };
                let mut info = ModelInfo::new(class.clone(), table);
                info.relationships = extractor.extract(php_class);
                extractor.take_errors();
                models.push(info);
            }

            if json {
                let value: Vec<_> = models.iter().map(ModelInfo::to_json).collect();
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                report::print_models(&models);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn strict_from_env() -> bool {
    std::env::var("RELSCOPE_STRICT")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Errors always fail the run; warnings only under strict mode.
fn exit_code(result: &AnalysisResult, strict: bool) -> ExitCode {
    if !result.errors().is_empty() || (strict && !result.warnings().is_empty()) {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

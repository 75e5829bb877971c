//! linkage-checker - CLI for finding JVM linkage errors
//!
//! Checks that every class, method and field reference in a classpath resolves, without
//! running any code.
//!
//! # Usage
//!
//! ```bash
//! # Check the artifacts managed by a BOM
//! linkage-checker check --bom com.google.cloud:libraries-bom:26.1.0
//!
//! # Check explicit artifacts and their dependencies
//! linkage-checker check --artifacts io.grpc:grpc-core:1.50.0,com.google.guava:guava:31.1-jre
//!
//! # Check jar files as they are
//! linkage-checker check --jars app.jar,lib.jar
//!
//! # Count problems introduced by combining artifacts
//! linkage-checker pairs --artifacts a:b:1,c:d:2,e:f:3
//! ```
//!
//! # Output
//!
//! - `--json` flag outputs machine-readable JSON
//! - Errors and logs go to stderr, reports to stdout
//! - Exit codes: 0 = no problems, 1 = linkage problems found, 2 = error

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use linkage_checker::compatibility::{self, PairResult};
use linkage_checker::report::{self, LinkageReport};
use linkage_checker::{
    CauseDiagnoser, CheckerConfig, CheckerError, ClasspathBuilder, Coordinate, ExcludedErrors,
    ExclusionFile, LinkageCheckFailed, LinkageChecker, LocalRepositoryResolver,
    MediationStrategy,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "linkage-checker")]
#[command(version)]
#[command(about = "Finds binary incompatibilities in JVM classpaths")]
#[command(long_about = r#"
linkage-checker finds linkage errors in a classpath before they happen at runtime.

It reports:
  - Missing classes, methods and fields
  - Inaccessible classes and members
  - Incompatible class changes and changed return types
  - Unimplemented abstract methods

Designed for automation: use --json for machine-readable output.
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Local Maven repository to resolve artifacts from (repeatable)
    #[arg(short = 'r', long = "repository", global = true)]
    repositories: Vec<PathBuf>,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check one classpath for linkage problems
    #[command(group(ArgGroup::new("input").required(true).args(["bom", "artifacts", "jars"])))]
    Check {
        /// BOM whose managed artifacts form the roots
        #[arg(long)]
        bom: Option<String>,

        /// Root artifact coordinates
        #[arg(long, value_delimiter = ',')]
        artifacts: Vec<String>,

        /// Jar files forming the classpath, in order
        #[arg(long, value_delimiter = ',')]
        jars: Vec<PathBuf>,

        /// Report only problems reachable from the root artifacts
        #[arg(long)]
        reachable_only: bool,

        /// Exclusion rules to apply on top of the built-in ones
        #[arg(long)]
        exclusion_file: Option<PathBuf>,

        /// Write the found problems as an exclusion file
        #[arg(long)]
        write_exclusion_file: Option<PathBuf>,

        /// Version mediation: maven or gradle
        #[arg(long)]
        mediation: Option<MediationStrategy>,
    },

    /// Count linkage problems introduced by each pair of artifacts
    Pairs {
        /// Artifact coordinates to combine
        #[arg(long, value_delimiter = ',', required = true)]
        artifacts: Vec<String>,

        /// Maximum analyses running at once
        #[arg(long, default_value = "4")]
        concurrency: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (only to stderr to keep stdout clean)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    match run_command(&cli).await {
        Ok(output) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_human_readable(&output);
            }
            if let Err(failed) = output.outcome() {
                report_error(cli.json, "linkage_problems", &failed.to_string())?;
                std::process::exit(1);
            }
            Ok(())
        }
        Err(e) => {
            report_error(cli.json, error_code(&e), &format!("{:#}", e))?;
            std::process::exit(2);
        }
    }
}

fn report_error(json: bool, code: &str, message: &str) -> Result<()> {
    if json {
        let err = serde_json::json!({
            "ok": false,
            "error": { "code": code, "message": message }
        });
        eprintln!("{}", serde_json::to_string_pretty(&err)?);
    } else {
        eprintln!("Error: {}", message);
    }
    Ok(())
}

fn error_code(error: &anyhow::Error) -> &'static str {
    match error.downcast_ref::<CheckerError>() {
        Some(CheckerError::EmptyClasspath) => "empty_classpath",
        Some(CheckerError::Io { .. }) | Some(CheckerError::Zip { .. }) => "io",
        Some(CheckerError::ClassFormat { .. }) => "class_format",
        Some(CheckerError::InvalidCoordinate(_)) => "invalid_coordinate",
        Some(CheckerError::InvalidExclusionFile { .. }) => "invalid_exclusion_file",
        Some(CheckerError::InvalidPom { .. }) => "invalid_pom",
        Some(CheckerError::ArtifactNotFound(_)) => "artifact_not_found",
        None => "error",
    }
}

async fn run_command(cli: &Cli) -> Result<Output> {
    let mut config = match &cli.config {
        Some(path) => CheckerConfig::load(path)?,
        None => CheckerConfig::default(),
    };
    if !cli.repositories.is_empty() {
        config.repositories = cli.repositories.clone();
    }

    match &cli.command {
        Commands::Check {
            bom,
            artifacts,
            jars,
            reachable_only,
            exclusion_file,
            write_exclusion_file,
            mediation,
        } => {
            config.report_only_reachable |= *reachable_only;
            if let Some(path) = exclusion_file {
                config.exclusion_file = Some(path.clone());
            }
            if let Some(mediation) = mediation {
                config.mediation = *mediation;
            }
            let builder = classpath_builder(&config)?;

            let classpath = if !jars.is_empty() {
                ClasspathBuilder::from_jars(jars)
            } else {
                let roots = match bom {
                    Some(bom) => {
                        let bom: Coordinate = bom.parse()?;
                        builder
                            .resolver()
                            .read_bom(&bom)
                            .with_context(|| format!("Failed to read BOM {}", bom))?
                    }
                    None => parse_coordinates(artifacts)?,
                };
                builder.resolve(&roots)?
            };

            let excluded = match &config.exclusion_file {
                Some(path) => ExcludedErrors::from_file(path)?,
                None => ExcludedErrors::default(),
            };
            let checker = LinkageChecker::create(&classpath, &config, excluded)?;
            let problems = if config.report_only_reachable {
                checker.find_reachable_problems()?
            } else {
                checker.find_linkage_problems()?
            };

            if let Some(path) = write_exclusion_file {
                ExclusionFile::write(path, &problems)?;
            }

            let problems = if jars.is_empty() {
                CauseDiagnoser::new(builder, config.clone()).annotate(problems, &classpath)
            } else {
                problems
            };

            Ok(Output::Check {
                classpath_size: classpath.classpath.len(),
                report: report::build_report(&problems, &classpath.artifact_problems),
                text: report::format_report(&problems, &classpath),
            })
        }
        Commands::Pairs {
            artifacts,
            concurrency,
        } => {
            let artifacts = parse_coordinates(artifacts)?;
            let builder = classpath_builder(&config)?;
            let results =
                compatibility::check_pairs(builder, config, artifacts, *concurrency).await?;
            Ok(Output::Pairs { results })
        }
    }
}

fn classpath_builder(config: &CheckerConfig) -> Result<ClasspathBuilder> {
    let resolver = Arc::new(LocalRepositoryResolver::new(config.repositories.clone()));
    let mediation = config.mediation.build(config.enforced_platform_keys()?);
    Ok(ClasspathBuilder::new(resolver, mediation))
}

fn parse_coordinates(values: &[String]) -> Result<Vec<Coordinate>> {
    values
        .iter()
        .map(|value| value.parse::<Coordinate>().map_err(Into::into))
        .collect()
}

#[derive(serde::Serialize)]
#[serde(tag = "type")]
enum Output {
    Check {
        classpath_size: usize,
        report: LinkageReport,
        #[serde(skip)]
        text: String,
    },
    Pairs {
        results: Vec<PairResult>,
    },
}

impl Output {
    fn outcome(&self) -> Result<(), LinkageCheckFailed> {
        match self {
            Output::Check { report, .. } if report.problem_count > 0 => Err(LinkageCheckFailed {
                problem_count: report.problem_count,
            }),
            _ => Ok(()),
        }
    }
}

fn print_human_readable(output: &Output) {
    match output {
        Output::Check {
            classpath_size,
            text,
            ..
        } => {
            println!("Checked {} classpath entries", classpath_size);
            print!("{}", text);
        }
        Output::Pairs { results } => {
            println!("Checked {} pairs:", results.len());
            for r in results {
                println!(
                    "  {} + {}: {} new problem{}",
                    r.first,
                    r.second,
                    r.problem_count,
                    if r.problem_count == 1 { "" } else { "s" }
                );
            }
        }
    }
}

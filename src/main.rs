use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{self, filter::EnvFilter};

use layerfix::{
    config::{FixerConfig, global_state_dir},
    learning::{Finding, parse_findings},
    orchestrator::TransformOptions,
    project_config::{ProjectConfig, validate_layers},
    runner::display_path,
    service::FixService,
};

/// Layered, self-learning code fixer for React and Next.js projects
#[derive(Parser, Debug)]
#[command(name = "layerfix")]
#[command(about = "Apply layered fixes to React/Next.js sources and learn new ones")]
#[command(version)]
struct Args {
    /// Project root (default: current directory)
    #[arg(short = 'd', long = "root-dir", global = true, value_name = "PATH")]
    root_directory: Option<PathBuf>,

    /// Directory for rules, transformation log and replay ledger
    #[arg(long = "state-dir", global = true, value_name = "PATH")]
    state_dir: Option<PathBuf>,

    /// Share rules and the transformation log across projects (~/.layerfix)
    #[arg(long = "global-state", global = true, conflicts_with = "state_dir")]
    global_state: bool,

    /// Log every layer decision
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the layers over project files
    Fix {
        /// Files or directories (default: the project root)
        paths: Vec<PathBuf>,

        /// Comma separated layer ids, e.g. 2,5,7
        #[arg(long, value_delimiter = ',')]
        layers: Option<Vec<u8>>,

        /// Report what would change without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of files processed concurrently
        #[arg(long = "max-concurrency")]
        max_concurrency: Option<usize>,

        /// JSON file of security scanner findings
        #[arg(long, value_name = "FILE")]
        findings: Option<PathBuf>,
    },
    /// Inspect and maintain the learned rules
    Rules {
        #[command(subcommand)]
        action: RulesCommand,
    },
    /// Learn from the transformation log without touching files
    Learn {
        /// JSON file of security scanner findings
        #[arg(long, value_name = "FILE")]
        findings: Option<PathBuf>,
    },
    /// Record or verify file hashes
    Baseline {
        #[command(subcommand)]
        action: BaselineCommand,
    },
}

#[derive(Subcommand, Debug)]
enum RulesCommand {
    List,
    Delete { index: usize },
    Reset,
    /// Write the rule store as JSON to stdout
    Export,
    /// Merge rules from a JSON file
    Import { file: PathBuf },
}

#[derive(Subcommand, Debug)]
enum BaselineCommand {
    Create { paths: Vec<PathBuf> },
    Check { paths: Vec<PathBuf> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let mut config = create_config_from_args(&args)?;

    match args.command {
        Command::Fix {
            paths,
            layers,
            dry_run,
            max_concurrency,
            findings,
        } => {
            if let Some(layers) = &layers {
                validate_layers(layers)?;
            }
            if let Some(max_concurrency) = max_concurrency {
                config.max_concurrency = max_concurrency.max(1);
            }

            let root = project_root(&config);
            let service = FixService::with_config(config);
            let options = TransformOptions {
                dry_run,
                verbose: args.verbose,
                layers: layers.or_else(|| service.config().layers.clone()),
                findings: load_findings(findings.as_deref())?,
                ..TransformOptions::default()
            };

            let summary = service.fix(&paths, options).await?;
            for outcome in &summary.outcomes {
                if let Some(error) = &outcome.error {
                    println!("error    {}: {}", display_path(&root, &outcome.path), error);
                } else if outcome.skipped {
                    println!("skipped  {}", display_path(&root, &outcome.path));
                } else if outcome.modified {
                    println!(
                        "{} {} ({} changes)",
                        if dry_run { "would fix" } else { "fixed   " },
                        display_path(&root, &outcome.path),
                        outcome.change_count
                    );
                }
                for change in outcome.changes.iter().filter(|c| args.verbose || c.kind.is_applied()) {
                    println!("    [{:?}] {}", change.kind, change.description);
                }
            }
            println!(
                "{} files scanned, {} modified, {} skipped, {} failed, {} changes{}",
                summary.files_scanned,
                summary.files_modified,
                summary.files_skipped,
                summary.files_failed,
                summary.total_changes,
                if summary.dry_run { " (dry run)" } else { "" }
            );
        }
        Command::Rules { action } => {
            let service = FixService::with_config(config);
            let mut store = service.store().lock().unwrap_or_else(|e| e.into_inner());
            match action {
                RulesCommand::List => {
                    for rule in store.rules() {
                        println!(
                            "{:>4}  {:.2}  x{:<4} {}{}",
                            rule.id,
                            rule.confidence,
                            rule.frequency,
                            if rule.security_related { "[security] " } else { "" },
                            rule.description
                        );
                        println!("      {} -> {:?}", rule.pattern, rule.replacement);
                    }
                    for warning in store.warnings() {
                        eprintln!("warning: {warning}");
                    }
                }
                RulesCommand::Delete { index } => {
                    if !store.delete_rule(index) {
                        bail!("No rule at index {index}");
                    }
                    println!("Deleted rule {index}");
                }
                RulesCommand::Reset => {
                    store.reset_rules()?;
                    println!("All rules removed");
                }
                RulesCommand::Export => {
                    println!("{}", store.export_json()?);
                }
                RulesCommand::Import { file } => {
                    let json = std::fs::read_to_string(&file)
                        .with_context(|| format!("Failed to read {}", file.display()))?;
                    let imported = store.import_json(&json)?;
                    println!("Imported {imported} rules");
                }
            }
        }
        Command::Learn { findings } => {
            let service = FixService::with_config(config);
            let report = service.learn(&load_findings(findings.as_deref())?);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Baseline { action } => {
            let service = FixService::with_config(config);
            match action {
                BaselineCommand::Create { paths } => {
                    let baseline = service.create_baseline(&paths)?;
                    println!("Recorded {} files", baseline.files.len());
                }
                BaselineCommand::Check { paths } => {
                    let report = service.check_baseline(&paths)?;
                    for path in &report.modified {
                        println!("modified {path}");
                    }
                    for path in &report.added {
                        println!("added    {path}");
                    }
                    for path in &report.removed {
                        println!("removed  {path}");
                    }
                    if !report.is_clean() {
                        std::process::exit(1);
                    }
                    println!("Baseline matches");
                }
            }
        }
    }

    Ok(())
}

/// Defaults, then `layerfix.yml`, then command line flags.
fn create_config_from_args(args: &Args) -> Result<FixerConfig> {
    let root = match &args.root_directory {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };

    let mut config = FixerConfig::for_project(&root);
    if let Some((path, project)) = ProjectConfig::discover(&root)? {
        tracing::debug!("Using project config {}", path.display());
        project.apply_to(&mut config)?;
    }
    if let Some(state_dir) = &args.state_dir {
        config.state_directory = state_dir.clone();
    } else if args.global_state {
        config.state_directory = global_state_dir();
    }
    Ok(config)
}

fn project_root(config: &FixerConfig) -> PathBuf {
    config
        .root_directories
        .first()
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."))
}

fn load_findings(path: Option<&Path>) -> Result<Vec<Finding>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read findings from {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Findings file {} is not JSON", path.display()))?;
    Ok(parse_findings(&value))
}

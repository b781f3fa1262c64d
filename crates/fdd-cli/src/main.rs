//! AHU Fault Detection - Command Line Entry Point

mod report;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rule_model::{ColumnMap, UnitSystem};
use rule_runner::{EngineConfig, RuleRunner};
use std::fs;
use std::path::{Path, PathBuf};
use timeseries::Table;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "fdd", version, about = "Config-driven AHU fault detection")]
struct Cli {
    /// Engine configuration file (defaults to ./fdd.{toml,yaml,json} if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a rule directory and report the rules it declares
    Validate(RuleArgs),
    /// Run a rule set over a JSON table and print outcomes and summaries
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RuleArgs {
    /// Directory of *.yaml rule declarations (overrides `rules_dir`)
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Unit system for bounds
    #[arg(long)]
    units: Option<UnitSystem>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    rules: RuleArgs,

    /// Sensor table as JSON
    #[arg(long)]
    table: PathBuf,

    /// Column map as a JSON object of role/BRICK class to column
    #[arg(long)]
    column_map: Option<PathBuf>,

    /// Record failing rules and continue
    #[arg(long)]
    lenient: bool,

    /// Skip rules whose required columns are missing
    #[arg(long)]
    skip_missing: bool,

    /// Evaluate rules in parallel
    #[arg(long)]
    parallel: bool,

    /// Motor speed column for runtime statistics
    #[arg(long)]
    motor_col: Option<String>,

    /// Include per-flag fault episodes in the output
    #[arg(long)]
    episodes: bool,

    /// Write the flagged table here as JSON
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Initialize logging on stderr; stdout carries the JSON results
fn init_logging(config: &EngineConfig) -> Result<()> {
    let level: Level = config
        .log_level
        .parse()
        .with_context(|| format!("invalid log level '{}'", config.log_level))?;

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    if config.log_json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn engine_config(cli: &Cli, rules: &RuleArgs) -> Result<EngineConfig> {
    let mut config = EngineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(units) = rules.units {
        config.units = units;
    }
    if let Some(dir) = &rules.rules {
        config.rules_dir = Some(dir.clone());
    }
    Ok(config)
}

fn load_runner(config: &EngineConfig) -> Result<RuleRunner> {
    let Some(dir) = config.rules_dir.as_deref() else {
        bail!("no rule directory: pass --rules or set rules_dir");
    };
    RuleRunner::from_dir(dir, config.load_options())
        .with_context(|| format!("loading rules from {}", dir.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn validate(config: &EngineConfig) -> Result<()> {
    let runner = load_runner(config)?;
    let rules: Vec<_> = runner
        .rules()
        .iter()
        .map(|rule| {
            serde_json::json!({
                "name": rule.name(),
                "type": rule.check_type().as_str(),
                "flag": rule.flag_name(),
                "inputs": rule.inputs().iter().map(|i| i.role.as_str()).collect::<Vec<_>>(),
            })
        })
        .collect();

    info!("{} rules valid for {} units", rules.len(), config.units);
    println!("{}", serde_json::to_string_pretty(&rules)?);
    Ok(())
}

fn run(config: &EngineConfig, args: &RunArgs) -> Result<()> {
    let runner = load_runner(config)?;
    let table: Table = read_json(&args.table)?;
    let map: ColumnMap = match &args.column_map {
        Some(path) => read_json(path)?,
        None => ColumnMap::new(),
    };

    let mut options = config.run_options();
    options.strict &= !args.lenient;
    options.skip_missing_columns |= args.skip_missing;
    options.parallel |= args.parallel;

    info!(
        "Running {} rules over {} rows",
        runner.rules().len(),
        table.len()
    );
    let report = runner.run(&table, &map, &options)?;

    if let Some(path) = &args.output {
        fs::write(path, serde_json::to_string(&report.table)?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Flagged table written to {}", path.display());
    }

    let output = report::build_output(
        runner.rules(),
        report,
        &map,
        &options,
        args.motor_col.as_deref(),
        args.episodes,
    )?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let rule_args = match &cli.command {
        Command::Validate(rules) => rules,
        Command::Run(args) => &args.rules,
    };
    let config = engine_config(&cli, rule_args)?;
    init_logging(&config)?;

    info!("=== AHU FDD v{} ===", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Command::Validate(_) => validate(&config),
        Command::Run(args) => run(&config, args),
    }
}

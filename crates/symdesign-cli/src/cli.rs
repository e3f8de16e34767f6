use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "SymDesign Developers",
    version,
    about = "SymDesign CLI - Explore the design space of part-based vehicles against physical and mission constraints.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search the design space of a problem file and write the valid designs as CSV.
    Explore(ExploreArgs),
    /// Resolve a mission file and print every stage quantity, known or symbolic.
    Mission(MissionArgs),
}

/// Arguments for the `explore` subcommand.
#[derive(Args, Debug)]
pub struct ExploreArgs {
    /// Path to the problem description in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub problem: PathBuf,

    /// Path for the output CSV design table.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Start from a known design (TOML table of `name = value`) instead of uniform sampling.
    #[arg(long, value_name = "PATH")]
    pub seed_file: Option<PathBuf>,

    /// Seed the random number generator for a reproducible run.
    #[arg(long, value_name = "INT")]
    pub rng_seed: Option<u64>,

    /// Set a specific solver value, overriding the problem file.
    /// Can be used multiple times. Example: -S solver.sample-size=5000
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `mission` subcommand.
#[derive(Args, Debug)]
pub struct MissionArgs {
    /// Path to the mission description in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub mission: PathBuf,
}

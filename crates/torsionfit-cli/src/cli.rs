use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use torsionfit::engine::config::PhasePolicy;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "TorsionFit CLI - build Bayesian torsion-parameter models against QM torsion scans.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the model and print the selected torsions and latent parameters.
    Inspect(InspectArgs),
    /// Build the model and write the completed, updated parameter set.
    Export(ExportArgs),
}

/// Options shared by every command that builds a model.
#[derive(Args, Debug, Clone, Default)]
pub struct ModelArgs {
    /// Path to the model configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Override the phase policy from the config file.
    #[arg(long, value_enum, value_name = "POLICY")]
    pub phase_policy: Option<PhasePolicyArg>,

    /// Ignore multiplicity bitstrings and fit every candidate periodicity.
    #[arg(long)]
    pub decouple_n: bool,

    /// Also sample periodicity 5 (phase-eliminated policy only).
    #[arg(long)]
    pub sample_n5: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S model.phase-policy=continuous-phase
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `inspect` subcommand.
#[derive(Args, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub model: ModelArgs,
}

/// Arguments for the `export` subcommand.
#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Path for the output parameter file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhasePolicyArg {
    Standard,
    ContinuousPhase,
    PhaseEliminated,
}

impl From<PhasePolicyArg> for PhasePolicy {
    fn from(arg: PhasePolicyArg) -> Self {
        match arg {
            PhasePolicyArg::Standard => PhasePolicy::Standard,
            PhasePolicyArg::ContinuousPhase => PhasePolicy::ContinuousPhase,
            PhasePolicyArg::PhaseEliminated => PhasePolicy::PhaseEliminated,
        }
    }
}

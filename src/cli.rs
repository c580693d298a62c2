use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(
    name = "labmerge",
    version,
    about = "Rebuild lab-result tables from extracted report text and merge them into one longitudinal table"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Inventory(InventoryArgs),
    Merge(MergeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(long, default_value = ".")]
    pub input_dir: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    #[arg(long, default_value = ".")]
    pub input_dir: PathBuf,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    pub output_format: OutputFormat,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub conflict_policy: Option<ConflictPolicy>,

    /// Appended to out-of-range values in CSV output.
    #[arg(long)]
    pub flag_suffix: Option<String>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
    Sqlite,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Sqlite => "sqlite",
        }
    }

    pub fn extension(self) -> &'static str {
        self.as_str()
    }
}

/// How the reconciler resolves two rows supplying a value for the same date.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    #[default]
    FirstWins,
    LastWins,
    Error,
}

impl ConflictPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstWins => "first-wins",
            Self::LastWins => "last-wins",
            Self::Error => "error",
        }
    }
}

use super::commands;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Show runtime logs on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict 3Di sequences and print them as FASTA
    Predict(PredictArgs),
    /// List the devices usable with --device
    Devices,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Model directory, or the encoder weights file inside it
    #[arg(long, required_unless_present = "hub", conflicts_with = "hub")]
    pub model: Option<PathBuf>,

    /// HuggingFace repository to fetch the model directory from
    #[arg(long)]
    pub hub: Option<String>,

    #[arg(long, default_value = "main")]
    pub revision: String,

    /// Comma-separated GPU devices, or `none`
    #[arg(long, default_value = "none")]
    pub device: String,

    #[arg(long, default_value_t = 1)]
    pub threads: usize,

    /// FASTA file with amino acid sequences
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Amino acid sequence; may be repeated
    #[arg(short, long)]
    pub sequence: Vec<String>,

    /// Print runtime performance counters to stderr when done
    #[arg(long)]
    pub perf: bool,
}

impl Cli {
    pub fn execute(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Predict(args) => commands::predict::execute(args, self.verbose),
            Commands::Devices => commands::devices::execute(self.verbose),
        }
    }
}

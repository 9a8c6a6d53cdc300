use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod formatters;

use crate::config::Overrides;
use crate::export::OutputFormat;

#[derive(Parser)]
#[command(name = "corretagem")]
#[command(
    version,
    about = "Extract trades from Brazilian brokerage notes (notas de corretagem)"
)]
#[command(
    long_about = "Read B3 brokerage note PDFs (loose, in folders or inside ZIP archives), resolve each traded asset to its ticker and export the trades to CSV, XLSX or JSON. The mapping tools maintain the description→ticker file used by the resolver."
)]
pub struct Cli {
    /// Config file (application.properties or *.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract trades from every note under the input and export them
    Extract {
        /// Only process documents whose file name carries this year
        #[arg(short, long)]
        year: Option<i32>,

        /// PDF, ZIP or folder (defaults to the configured input folder)
        #[arg(short, long, value_name = "PATH")]
        input: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_parser = parse_format, value_name = "csv|xlsx|json")]
        format: Option<OutputFormat>,

        /// Password for protected PDFs
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Maintain the description→ticker mapping files
    Mapping {
        #[command(subcommand)]
        action: MappingCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum MappingCommands {
    /// List every asset description found in the notes
    Collect {
        #[arg(short, long)]
        year: Option<i32>,

        #[arg(short, long, value_name = "PATH")]
        input: Option<PathBuf>,

        /// Also write the descriptions to this file, one per line
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Add tickers for new descriptions to the mapping file
    Generate {
        #[arg(short, long)]
        year: Option<i32>,

        #[arg(short, long, value_name = "PATH")]
        input: Option<PathBuf>,

        /// Look companies up in the B3 instruments list
        #[arg(long)]
        online: bool,

        /// Use these descriptions instead of collecting them from the notes
        descriptions: Vec<String>,
    },

    /// Validate mapped tickers against their share class
    Sanitize {
        /// Rewrite the mapping file with the suggested corrections
        #[arg(long)]
        fix: bool,

        /// Write a CSV report next to the mapping file
        #[arg(long)]
        report: bool,

        /// Look companies up in the B3 instruments list
        #[arg(long)]
        online: bool,
    },

    /// Import manually filled entries from the unmapped file
    Review,
}

fn parse_format(value: &str) -> Result<OutputFormat, String> {
    value.parse().map_err(|e: anyhow::Error| e.to_string())
}

impl Commands {
    /// Config values this command overrides.
    pub fn overrides(&self) -> Overrides {
        match self {
            Commands::Extract {
                input,
                format,
                password,
                ..
            } => Overrides {
                password: password.clone(),
                output_format: *format,
                input: input.clone(),
            },
            Commands::Mapping { action } => match action {
                MappingCommands::Collect { input, .. } | MappingCommands::Generate { input, .. } => {
                    Overrides {
                        input: input.clone(),
                        ..Overrides::default()
                    }
                }
                MappingCommands::Sanitize { .. } | MappingCommands::Review => Overrides::default(),
            },
        }
    }
}

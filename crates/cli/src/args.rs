//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// summary-notifier: synthesize and operate the feed summary notification stack
#[derive(Parser, Debug)]
#[command(name = "summary-notifier")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the deployment configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synthesize the CloudFormation template
    Synth(SynthArgs),

    /// Crawl one notifier's feeds locally without writing anywhere
    Crawl(CrawlArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and show status
    Doctor(DoctorArgs),
}

#[derive(Args, Debug)]
pub struct SynthArgs {
    /// Write the template to this file instead of stdout
    #[arg(long, short)]
    pub out: Option<PathBuf>,

    /// Do not verify that referenced parameters exist in Parameter Store
    #[arg(long)]
    pub skip_parameter_check: bool,
}

#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// Notifier to crawl
    #[arg(long)]
    pub notifier: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./summary-notifier.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

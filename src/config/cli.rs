use crate::utils::error::{EnhanceError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_range, validate_url, Validate,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "page-enhance")]
#[command(about = "Send manga pages to a remote enhancement server")]
pub struct CliConfig {
    #[arg(long, global = true, default_value = "./page-enhance.toml")]
    pub config: PathBuf,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Enhance one page image; the original is written if enhancement fails
    Enhance(EnhanceArgs),
    /// Inspect or change stored preferences
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    Show,
    Set { key: String, value: String },
}

#[derive(Debug, Clone, Args)]
pub struct EnhanceArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long)]
    pub output: PathBuf,

    #[arg(long, help = "Override the stored base URL for this run")]
    pub base_url: Option<String>,

    #[arg(long, help = "Trust any certificate and hostname (self-signed servers)")]
    pub accept_invalid_certs: bool,

    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[arg(long, help = "Image name sent to the server (defaults to the file name)")]
    pub name: Option<String>,

    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub source: Option<String>,

    #[arg(long, default_value = "")]
    pub title: String,

    #[arg(long, default_value = "")]
    pub chapter: String,
}

impl Validate for EnhanceArgs {
    fn validate(&self) -> Result<()> {
        if !self.input.is_file() {
            return Err(EnhanceError::InvalidConfigValueError {
                field: "input".to_string(),
                value: self.input.display().to_string(),
                reason: "Input file does not exist".to_string(),
            });
        }

        if let Some(base_url) = &self.base_url {
            validate_url("base_url", base_url)?;
        }

        if let Some(name) = &self.name {
            validate_non_empty_string("name", name)?;
        }

        if let Some(timeout) = self.timeout_secs {
            validate_range("timeout_secs", timeout, 1, 3600)?;
        }

        Ok(())
    }
}

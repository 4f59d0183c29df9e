use clap::Subcommand;
use serde_json::Value;

use super::loan::{resolve_params, LoanArgs};
use crate::input;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Write a parameter file from the defaults and any flags given
    Init {
        /// Destination of the YAML file
        #[arg(long, default_value = "homeroi.yaml")]
        path: String,

        /// Replace an existing file
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        loan: LoanArgs,
    },
    /// Load, validate and print a parameter file
    Show {
        /// YAML file to read
        path: String,
    },
}

pub fn run_config(cmd: ConfigCommand) -> Result<Value, Box<dyn std::error::Error>> {
    match cmd {
        ConfigCommand::Init { path, force, loan } => {
            let params = resolve_params(&loan)?;
            input::file::write_params(&path, &params, force)?;
            Ok(serde_json::json!({
                "path": path,
                "parameters": params,
            }))
        }
        ConfigCommand::Show { path } => {
            let params = input::file::read_params(&path)?;
            Ok(serde_json::to_value(params)?)
        }
    }
}

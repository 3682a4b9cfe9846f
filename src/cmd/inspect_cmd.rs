use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use crate::command::inspect::Inspect;
use crate::command::inspect::InspectParams;


/// Commandline option: summarize one file and optionally check its
/// signal decodes
#[derive(Args)]
pub struct InspectCmd {
    #[arg(short = 'i', value_parser = clap::value_parser!(PathBuf))]
    pub path_in: PathBuf,

    // Decode every signal row, not just the footer
    #[arg(long = "verify-signal")]
    pub verify_signal: bool,
}

impl InspectCmd {
    /// Run the commandline option
    pub fn try_execute(&mut self) -> Result<()> {
        let params = InspectParams {
            path_in: self.path_in.clone(),
            verify_signal: self.verify_signal,
        };

        Inspect::run(&Arc::new(params))?;
        Ok(())
    }
}

//! Command pattern interfaces for the CLI

use crate::pipeline::errors::PipelineResult;
use crate::utils::logger::Logger;

/// An executable CLI operation
pub trait Command {
    fn execute(&self) -> PipelineResult<()>;
}

/// Chooses and builds the command for a set of CLI arguments
pub trait CommandFactory<'a> {
    fn create_command(&self, args: &clap::ArgMatches, logger: &'a Logger) -> PipelineResult<Box<dyn Command + 'a>>;
}

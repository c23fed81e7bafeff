//! Full tiling run

use clap::ArgMatches;
use log::{info, warn};

use crate::commands::command_traits::Command;
use crate::commands::config_from_args;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::driver::PipelineDriver;
use crate::pipeline::errors::PipelineResult;
use crate::utils::logger::Logger;

/// Loads, aligns and exports all tiles, then prints the run summary
pub struct TileCommand<'a> {
    config: PipelineConfig,
    logger: &'a Logger,
}

impl<'a> TileCommand<'a> {
    pub fn new(args: &ArgMatches, logger: &'a Logger) -> PipelineResult<Self> {
        Ok(TileCommand { config: config_from_args(args)?, logger })
    }
}

impl<'a> Command for TileCommand<'a> {
    fn execute(&self) -> PipelineResult<()> {
        info!("Tiling with {} tiles, {} worker(s), CRS {}, compression {}",
              self.config.tile_size, self.config.workers, self.config.crs, self.config.compression);

        let mut driver = PipelineDriver::new(self.config.clone(), self.logger);
        let summary = driver.run()?;

        println!("{}", summary);
        if summary.failed > 0 {
            warn!("{} tile(s) were not fully exported", summary.failed);
        }
        Ok(())
    }
}

//! Dry run: the tile plan without writing files

use clap::ArgMatches;
use log::info;

use crate::commands::command_traits::Command;
use crate::commands::config_from_args;
use crate::export::exporter::tile_path;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::driver::PipelineDriver;
use crate::pipeline::errors::PipelineResult;
use crate::tiling::extract::Role;
use crate::utils::logger::Logger;
use crate::utils::string_utils;

/// Loads and aligns the sources, then lists the tile boxes and output
/// directories
pub struct PlanCommand<'a> {
    config: PipelineConfig,
    logger: &'a Logger,
}

impl<'a> PlanCommand<'a> {
    pub fn new(args: &ArgMatches, logger: &'a Logger) -> PipelineResult<Self> {
        Ok(PlanCommand { config: config_from_args(args)?, logger })
    }
}

impl<'a> Command for PlanCommand<'a> {
    fn execute(&self) -> PipelineResult<()> {
        let mut driver = PipelineDriver::new(self.config.clone(), self.logger);
        driver.load_sources()?;
        driver.align()?;
        let boxes = driver.plan()?;
        info!("Dry run: {} tile(s) planned", boxes.len());

        if let Some(aligned) = driver.aligned() {
            let [ms, p, pan] = aligned.band_counts();
            println!("Aligned grid: {}x{} (bands MS {}, P {}, PAN {})", aligned.width(), aligned.height(), ms, p, pan);
        }
        println!("Tile size:    {}", self.config.tile_size);
        println!("Tiles:        {} ({} files)", boxes.len(), boxes.len() * Role::ALL.len());

        let stem = string_utils::file_stem(&self.config.multispectral);
        for role in Role::ALL {
            let example = tile_path(&self.config.destination, &stem, role, "<id>");
            println!("  {:<3} -> {}", role, example.display());
        }
        for tile in &boxes {
            println!("  {}", tile);
        }
        Ok(())
    }
}

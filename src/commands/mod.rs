//! CLI commands
//!
//! `TileCommand` runs the pipeline; `PlanCommand` stops after alignment and
//! prints what a run would produce.

pub mod command_traits;
pub mod plan_command;
pub mod tile_command;

pub use command_traits::{Command, CommandFactory};
pub use plan_command::PlanCommand;
pub use tile_command::TileCommand;

use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command as ClapCommand};

use crate::compression::CompressionKind;
use crate::pipeline::config::{CrsMode, PipelineConfig, TileSize};
use crate::pipeline::errors::{PipelineError, PipelineResult};
use crate::utils::logger::Logger;

/// Command line definition
pub fn build_cli() -> ClapCommand {
    ClapCommand::new("pantile")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Cut aligned multispectral / panchromatic / pansharpened tiles for pansharpening training")
        .arg(
            Arg::new("multispectral")
                .help("Multispectral source raster")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("panchromatic")
                .help("Panchromatic source raster; defines the output pixel grid")
                .required(true)
                .index(2),
        )
        .arg(
            Arg::new("pansharpened")
                .help("Pansharpened reference raster")
                .required(true)
                .index(3),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("Destination root directory [default: current directory]")
                .value_name("DIR"),
        )
        .arg(
            Arg::new("tile-size")
                .short('t')
                .long("tile-size")
                .help("Tile size as WIDTHxHEIGHT [default: 256x256]")
                .value_name("WxH"),
        )
        .arg(
            Arg::new("workers")
                .short('j')
                .long("workers")
                .help("Worker threads for tile export, 0 for one per core [default: 1]")
                .value_name("N"),
        )
        .arg(
            Arg::new("crs")
                .long("crs")
                .help("Coordinate reference of the tiles: wgs84 or source [default: wgs84]")
                .value_name("MODE"),
        )
        .arg(
            Arg::new("compression-name")
                .long("compression-name")
                .help("Tile compression by name (none, deflate, zstd) [default: none]")
                .value_name("NAME"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("TOML file with default settings")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Load and align the sources and print the tile plan without writing")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-progress")
                .long("no-progress")
                .help("Do not draw a progress bar")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Echo debug messages to the console")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .help("Journal file")
                .value_name("FILE")
                .default_value("pantile.log"),
        )
}

/// Builds the pipeline configuration from CLI arguments
///
/// Values from `--config` are applied first; explicit flags override them.
pub fn config_from_args(args: &ArgMatches) -> PipelineResult<PipelineConfig> {
    let source = |name: &str| -> PipelineResult<PathBuf> {
        args.get_one::<String>(name)
            .map(PathBuf::from)
            .ok_or_else(|| PipelineError::InvalidConfiguration(format!("missing {} source", name)))
    };

    let mut config = PipelineConfig::new(source("multispectral")?, source("panchromatic")?, source("pansharpened")?);

    if let Some(path) = args.get_one::<String>("config") {
        config = config.with_toml_file(&PathBuf::from(path))?;
    }
    if let Some(output) = args.get_one::<String>("output") {
        config = config.with_destination(output);
    }
    if let Some(size) = args.get_one::<String>("tile-size") {
        config = config.with_tile_size(TileSize::parse_or_default(size));
    }
    if let Some(workers) = args.get_one::<String>("workers") {
        let workers = workers.parse::<usize>().map_err(|_| PipelineError::InvalidConfiguration(
            format!("invalid worker count '{}'", workers)))?;
        config = config.with_workers(workers);
    }
    if let Some(crs) = args.get_one::<String>("crs") {
        config = config.with_crs(CrsMode::from_name(crs)?);
    }
    if let Some(name) = args.get_one::<String>("compression-name") {
        let compression = CompressionKind::from_name(name)
            .map_err(|e| PipelineError::InvalidConfiguration(e.to_string()))?;
        config = config.with_compression(compression);
    }
    if args.get_flag("no-progress") {
        config = config.with_progress(false);
    }

    Ok(config)
}

/// Picks the command for the parsed arguments
pub struct PantileCommandFactory;

impl PantileCommandFactory {
    pub fn new() -> Self {
        PantileCommandFactory
    }
}

impl Default for PantileCommandFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> CommandFactory<'a> for PantileCommandFactory {
    fn create_command(&self, args: &ArgMatches, logger: &'a Logger) -> PipelineResult<Box<dyn Command + 'a>> {
        if args.get_flag("dry-run") {
            Ok(Box::new(PlanCommand::new(args, logger)?))
        } else {
            Ok(Box::new(TileCommand::new(args, logger)?))
        }
    }
}

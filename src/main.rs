use std::path::Path;
use std::process;

use log::{error, LevelFilter};

use pantile::commands::{build_cli, CommandFactory, PantileCommandFactory};
use pantile::utils::logger::Logger;

/// `run.log` -> `run-global.log`
fn global_log_path(log_file: &str) -> String {
    let path = Path::new(log_file);
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "pantile".to_string());
    path.with_file_name(format!("{}-global.log", stem)).to_string_lossy().into_owned()
}

fn main() {
    let matches = build_cli().get_matches();

    let console_level = if matches.get_flag("verbose") { LevelFilter::Debug } else { LevelFilter::Warn };
    let log_file = matches.get_one::<String>("log-file").map(String::as_str).unwrap_or("pantile.log");

    let logger = match Logger::new(log_file) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Error initializing logger: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = Logger::init_global_logger(&global_log_path(log_file), console_level) {
        eprintln!("Error setting up global logger: {}", e);
        process::exit(1);
    }

    let factory = PantileCommandFactory::new();
    match factory.create_command(&matches, &logger) {
        Ok(command) => {
            if let Err(e) = command.execute() {
                error!("Command execution error: {}", e);
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
        Err(e) => {
            error!("Failed to create command: {}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
}

// Fork simulator - CLI

use clap::Parser;
use fork_sim::{Cli, CliHandler};

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let handler = match CliHandler::new(&cli.options) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Error initializing: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = handler.handle(cli.command) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

//! elmterm: an interactive diagnostic terminal for ELM327/STN OBD-II
//! adapters over serial TTYs or TCP, with a live protocol analyzer.

mod cli;
mod config;
mod error;
mod history;
mod session;
mod theme;
mod transport;

use std::process::ExitCode;

use clap::Parser;
use log::error;

use cli::Args;
use config::Settings;
use error::Error;
use transport::Transport;

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("elmterm: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Error> {
    let settings = Settings::resolve(args)?;
    let transport = Transport::dial(&settings.target, settings.timeout)?;
    session::run(settings, transport)
}

use clap::Parser;
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Prints the formatted message in red to stderr and exits with the given code.
macro_rules! fatal_error {
    ($code:expr, $($arg:tt)*) => {{
        eprintln!("{}", format!($($arg)*).red().bold());
        std::process::exit($code)
    }};
}

mod commands;
use commands::Command;

/// Command line interface of the grid simulation engine.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    Cli::parse().command.run();
}

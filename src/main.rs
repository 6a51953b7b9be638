use clap::Parser;
use fundscreen::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}

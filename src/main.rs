//! Binary entry point: parse the command line, then either run one
//! subcommand or launch the template browser.
use clap::Parser;
use emstencil::Cli;

fn main() -> anyhow::Result<()> {
    Cli::parse().execute()
}

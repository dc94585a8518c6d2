use clap::Parser;
use l3_binner::cli::{run, Cli};
use l3_binner::error::Result;

fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

use anyhow::Result;
use clap::Parser;

use censuslink::cli::{Cli, Commands};
use censuslink::commands::{borders, canonical, crosswalk, link, ocr, run};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match &cli.command {
        Commands::Link(args) => link::run(&cli, args),
        Commands::Borders(args) => borders::run(&cli, args),
        Commands::Canonical(args) => canonical::run(&cli, args),
        Commands::OcrCandidates(args) => ocr::run(&cli, args),
        Commands::Crosswalk(args) => crosswalk::run(&cli, args),
        Commands::Run(args) => run::run(&cli, args),
    }
}

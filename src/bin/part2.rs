use anyhow::{Context, Result};
use clap::Parser;
use day21::{CLIArgs, Limit};

fn main() -> Result<()> {
    env_logger::init();
    let args = CLIArgs::parse();
    let transform = args.transform.transform();
    let cycle = transform.cycle(Limit::unbounded()).with_context(|| {
        format!(
            "Failed to detect cycle with reseed({}) and multiplier({}).",
            transform.reseed(),
            transform.multiplier()
        )
    })?;

    println!(
        "Found {} distinct value(s) before {} repeats from index {}.",
        cycle.len(),
        cycle.repeated(),
        cycle.cycle_start()
    );
    println!(
        "Set register 0 to {}, can halt program and cost the most steps.",
        cycle.last_unique()
    );

    Ok(())
}

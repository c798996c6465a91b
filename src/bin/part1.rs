use anyhow::{Context, Result};
use clap::Parser;
use day21::{CLIArgs, Limit, Matcher, SearchMode, Target};

fn main() -> Result<()> {
    env_logger::init();
    let args = CLIArgs::parse();
    let transform = args.transform.transform();
    let first = transform
        .sequence()
        .next()
        .map(|round| round.accumulator())
        .context("Accumulator sequence should never be empty.")?;

    // Feeding the first value back must stop right after the first round.
    let target = Target::try_from(first)?;
    let matcher = Matcher::new(
        transform,
        SearchMode::Naive,
        Limit::unbounded().with_max_rounds(1),
    );
    let found = matcher
        .search(target)
        .with_context(|| format!("Failed to match first value({}) in one round.", first))?;
    println!(
        "Set register 0 to {}, can halt program after {} round(s) and cost the least steps.",
        first,
        found.index()
    );

    Ok(())
}

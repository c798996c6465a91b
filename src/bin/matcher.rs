use anyhow::{Context, Result};
use clap::Parser;
use day21::{Matcher, MatcherCLIArgs};

fn main() -> Result<()> {
    env_logger::init();
    let args = MatcherCLIArgs::parse();
    let matcher = Matcher::new(args.transform.transform(), args.mode, args.limit());
    let found = matcher.search(args.target).with_context(|| {
        format!(
            "Failed to find target({}) in the accumulator sequence.",
            args.target
        )
    })?;

    println!(
        "r0 {} r1 {} r4 {}",
        args.target,
        found.round().accumulator(),
        found.round().working()
    );
    println!("Target matched after {} round(s).", found.index());

    Ok(())
}

use std::{
    collections::HashSet,
    error,
    fmt::Display,
    str::FromStr,
    time::{Duration, Instant},
};

use clap::{Args, Parser, ValueEnum};
use log::{debug, trace, warn};

pub const ACCUMULATOR_MASK: u64 = 0xFF_FFFF;
pub const WORKING_SEED_BITS: u64 = 0x1_0000;
pub const DEFAULT_RESEED: u64 = 16298264;
pub const DEFAULT_MULTIPLIER: u64 = 65899;

const BYTE_MASK: u64 = 0xFF;
const BYTE_BASE: u64 = 256;

#[derive(Debug)]
pub enum Error {
    InvalidTarget(String),
    TargetOutOfRange(u64),
    TargetUnreachable { rounds: usize },
    RoundLimitReached(usize),
    DeadlineExceeded(usize),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidTarget(s) => {
                write!(f, "Invalid target({}), expect non-negative number", s)
            }
            Error::TargetOutOfRange(n) => write!(
                f,
                "Target({}) is out of range, expect at most {}",
                n, ACCUMULATOR_MASK
            ),
            Error::TargetUnreachable { rounds } => write!(
                f,
                "Target never appears, the sequence repeats after {} round(s)",
                rounds
            ),
            Error::RoundLimitReached(rounds) => {
                write!(f, "Gave up after reaching round limit({})", rounds)
            }
            Error::DeadlineExceeded(rounds) => {
                write!(f, "Gave up after deadline exceeded at round {}", rounds)
            }
        }
    }
}

impl error::Error for Error {}

#[derive(Debug, Args)]
pub struct TransformArgs {
    /// Constant the accumulator is reset to at the start of every round.
    #[arg(long, default_value_t = DEFAULT_RESEED)]
    pub reseed: u64,
    /// Factor applied to the accumulator in every mixing step.
    #[arg(long, default_value_t = DEFAULT_MULTIPLIER)]
    pub multiplier: u64,
}

impl TransformArgs {
    pub fn transform(&self) -> Transform {
        Transform::new(self.reseed, self.multiplier)
    }
}

#[derive(Debug, Parser)]
pub struct CLIArgs {
    #[command(flatten)]
    pub transform: TransformArgs,
}

#[derive(Debug, Parser)]
pub struct MatcherCLIArgs {
    pub target: Target,
    /// Naive mode may never return for a target missing from the sequence
    /// unless --max-rounds or --timeout-ms is given.
    #[arg(long, value_enum, default_value_t = SearchMode::Naive)]
    pub mode: SearchMode,
    #[arg(long)]
    pub max_rounds: Option<usize>,
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    #[command(flatten)]
    pub transform: TransformArgs,
}

impl MatcherCLIArgs {
    pub fn limit(&self) -> Limit {
        let mut limit = Limit::unbounded();
        if let Some(max_rounds) = self.max_rounds {
            limit = limit.with_max_rounds(max_rounds);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            limit = limit.with_timeout(Duration::from_millis(timeout_ms));
        }

        limit
    }
}

/// A value the accumulator can be compared against, always within 24 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target(u64);

impl Target {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for Target {
    type Error = Error;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > ACCUMULATOR_MASK {
            Err(Error::TargetOutOfRange(value))
        } else {
            Ok(Target(value))
        }
    }
}

impl TryFrom<&str> for Target {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let n = value
            .trim()
            .parse::<u64>()
            .map_err(|_| Error::InvalidTarget(value.to_string()))?;
        Target::try_from(n)
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Target::try_from(s)
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The result of one outer iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Round {
    accumulator: u64,
    working: u64,
    mix_steps: usize,
}

impl Round {
    pub fn accumulator(&self) -> u64 {
        self.accumulator
    }

    pub fn working(&self) -> u64 {
        self.working
    }

    pub fn mix_steps(&self) -> usize {
        self.mix_steps
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transform {
    reseed: u64,
    multiplier: u64,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(DEFAULT_RESEED, DEFAULT_MULTIPLIER)
    }
}

impl Transform {
    pub fn new(reseed: u64, multiplier: u64) -> Self {
        Self {
            reseed: reseed & ACCUMULATOR_MASK,
            multiplier: multiplier & ACCUMULATOR_MASK,
        }
    }

    pub fn reseed(&self) -> u64 {
        self.reseed
    }

    pub fn multiplier(&self) -> u64 {
        self.multiplier
    }

    pub fn round(&self, accumulator: u64) -> Round {
        let mut working = accumulator | WORKING_SEED_BITS;
        let mut accumulator = self.reseed;
        let mut mix_steps = 0;
        loop {
            accumulator += working & BYTE_MASK;
            accumulator &= ACCUMULATOR_MASK;
            accumulator *= self.multiplier;
            accumulator &= ACCUMULATOR_MASK;
            mix_steps += 1;

            if working < BYTE_BASE {
                break;
            }
            working /= BYTE_BASE;
        }

        Round {
            accumulator,
            working,
            mix_steps,
        }
    }

    pub fn sequence(&self) -> Sequence {
        Sequence {
            transform: *self,
            accumulator: 0,
        }
    }

    /// Collects distinct accumulator values in emission order until one repeats.
    pub fn cycle(&self, limit: Limit) -> Result<Cycle, Error> {
        debug!(
            "Detecting cycle with reseed({}) and multiplier({}).",
            self.reseed, self.multiplier
        );
        let guard = limit.start();
        let mut seen = HashSet::new();
        let mut values = Vec::new();
        for round in self.sequence() {
            guard.check(values.len())?;
            let value = round.accumulator();
            if !seen.insert(value) {
                let cycle_start = values
                    .iter()
                    .position(|v| *v == value)
                    .unwrap_or_default();
                debug!(
                    "Value {} repeats after {} distinct value(s), first seen at index {}.",
                    value,
                    values.len(),
                    cycle_start
                );
                return Ok(Cycle {
                    values,
                    repeated: value,
                    cycle_start,
                });
            }
            values.push(value);
        }

        unreachable!("Accumulator sequence is infinite.")
    }
}

/// Yields successive rounds forever, starting from accumulator 0.
#[derive(Debug, Clone)]
pub struct Sequence {
    transform: Transform,
    accumulator: u64,
}

impl Iterator for Sequence {
    type Item = Round;

    fn next(&mut self) -> Option<Self::Item> {
        let round = self.transform.round(self.accumulator);
        self.accumulator = round.accumulator();

        Some(round)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    values: Vec<u64>,
    repeated: u64,
    cycle_start: usize,
}

impl Cycle {
    pub fn values(&self) -> &[u64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The target that halts after the fewest rounds.
    pub fn first_match(&self) -> u64 {
        // Never empty, a repeat needs at least one value seen before.
        self.values[0]
    }

    /// The target that halts after the most rounds while still halting.
    pub fn last_unique(&self) -> u64 {
        self.values[self.values.len() - 1]
    }

    pub fn repeated(&self) -> u64 {
        self.repeated
    }

    pub fn cycle_start(&self) -> usize {
        self.cycle_start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SearchMode {
    /// Run until the target shows up, never returns if it is missing.
    Naive,
    /// Give up as soon as the sequence starts repeating.
    CycleAware,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Limit {
    max_rounds: Option<usize>,
    timeout: Option<Duration>,
}

impl Limit {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = Some(max_rounds);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn start(&self) -> LimitGuard {
        LimitGuard {
            max_rounds: self.max_rounds,
            deadline: self.timeout.and_then(|t| Instant::now().checked_add(t)),
        }
    }
}

struct LimitGuard {
    max_rounds: Option<usize>,
    deadline: Option<Instant>,
}

impl LimitGuard {
    // Called before each round with the count of rounds already run.
    fn check(&self, rounds: usize) -> Result<(), Error> {
        if self.max_rounds.is_some_and(|max| rounds >= max) {
            warn!("Round limit reached after {} round(s).", rounds);
            return Err(Error::RoundLimitReached(rounds));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            warn!("Deadline exceeded after {} round(s).", rounds);
            return Err(Error::DeadlineExceeded(rounds));
        }

        Ok(())
    }
}

/// A round whose accumulator equals the target, with its 1-based index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    index: usize,
    round: Round,
}

impl Match {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn round(&self) -> &Round {
        &self.round
    }
}

#[derive(Debug, Clone)]
pub struct Matcher {
    transform: Transform,
    mode: SearchMode,
    limit: Limit,
}

impl Matcher {
    pub fn new(transform: Transform, mode: SearchMode, limit: Limit) -> Self {
        Self {
            transform,
            mode,
            limit,
        }
    }

    pub fn search(&self, target: Target) -> Result<Match, Error> {
        debug!("Searching for target({}) in {:?} mode.", target, self.mode);
        let guard = self.limit.start();
        let mut seen = HashSet::new();
        for (ind, round) in self.transform.sequence().enumerate() {
            guard.check(ind)?;
            let index = ind + 1;
            trace!(
                "Round#{}: r1 = {}, r4 = {}",
                index,
                round.accumulator(),
                round.working()
            );
            if round.accumulator() == target.value() {
                debug!("Target({}) found at round#{}.", target, index);
                return Ok(Match { index, round });
            }
            if self.mode == SearchMode::CycleAware && !seen.insert(round.accumulator()) {
                return Err(Error::TargetUnreachable { rounds: index });
            }
        }

        unreachable!("Accumulator sequence is infinite.")
    }
}

use anyhow::bail;
use clap::{ArgAction, Parser};
use core::fmt;
use core::time::Duration;
use std::path::PathBuf;
use std::sync::Arc;

/// Runtime configuration for the `pfn-collector` binary.
///
/// These settings control how many draw sets are generated, how the work is
/// chunked across workers, which representations are persisted, and how the
/// write queue batches output. All values are parsed from CLI arguments or
/// environment variables (a `.env` file is honored).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "pfn-collector",
    version,
    about = "Bulk-generates provably-fair draw sets into append-only text files",
    after_help = "Example: pfn-collector -c 100"
)]
pub struct CliArgs {
    /// Total number of indices (draw sets) to generate.
    ///
    /// Environment variable: `PFN_COUNT`
    #[arg(short, long, env = "PFN_COUNT")]
    pub count: u64,

    /// Number of indices processed by one worker invocation.
    ///
    /// Clamped to `count` when larger.
    ///
    /// Environment variable: `PFN_CHUNK_SIZE`
    #[arg(short = 'k', long = "chunk", env = "PFN_CHUNK_SIZE", default_value_t = 50)]
    pub chunk_size: u64,

    /// Number of distinct values drawn per index.
    ///
    /// Environment variable: `PFN_SET_SIZE`
    #[arg(long, env = "PFN_SET_SIZE", default_value_t = 90)]
    pub size: usize,

    /// Smallest integer a draw can be scaled to.
    ///
    /// Environment variable: `PFN_MIN`
    #[arg(long, env = "PFN_MIN", default_value_t = 1, allow_negative_numbers = true)]
    pub min: i64,

    /// Largest integer a draw can be scaled to.
    ///
    /// Environment variable: `PFN_MAX`
    #[arg(long, env = "PFN_MAX", default_value_t = 90, allow_negative_numbers = true)]
    pub max: i64,

    /// Save the scaled integer sets to `scaled.txt`.
    ///
    /// Environment variable: `PFN_SAVE_SCALED`
    #[arg(short = 's', long, env = "PFN_SAVE_SCALED", default_value_t = true, action = ArgAction::Set)]
    pub save_scaled: bool,

    /// Save the draws behind each accepted integer to `unscaled.txt`.
    ///
    /// Environment variable: `PFN_SAVE_UNSCALED`
    #[arg(short = 'u', long, env = "PFN_SAVE_UNSCALED", default_value_t = true, action = ArgAction::Set)]
    pub save_unscaled: bool,

    /// Save `draw × 2^256` for each accepted integer to `undivided.txt`.
    ///
    /// Environment variable: `PFN_SAVE_UNDIVIDED`
    #[arg(short = 'd', long, env = "PFN_SAVE_UNDIVIDED", default_value_t = false, action = ArgAction::Set)]
    pub save_undivided: bool,

    /// Save every draw, including rejected duplicates, to `raw.txt`.
    ///
    /// Environment variable: `PFN_SAVE_RAW`
    #[arg(short = 'r', long, env = "PFN_SAVE_RAW", default_value_t = true, action = ArgAction::Set)]
    pub save_raw: bool,

    /// Prefix every line with `serverSeed clientSeed`.
    ///
    /// Environment variable: `PFN_INCLUDE_SEEDS`
    #[arg(long, env = "PFN_INCLUDE_SEEDS", default_value_t = true, action = ArgAction::Set)]
    pub include_seeds: bool,

    /// Render undivided values as exact 256-bit integers instead of floats.
    ///
    /// Environment variable: `PFN_HIGH_PRECISION`
    #[arg(long, env = "PFN_HIGH_PRECISION", default_value_t = false, action = ArgAction::Set)]
    pub high_precision: bool,

    /// Log the elapsed time of every unit.
    ///
    /// Environment variable: `PFN_LOG_TIMER`
    #[arg(short = 't', long, env = "PFN_LOG_TIMER", default_value_t = true, action = ArgAction::Set)]
    pub log_timer: bool,

    /// Number of parallel workers. Defaults to half the available CPUs.
    ///
    /// Environment variable: `PFN_NUM_WORKERS`
    #[arg(short = 'w', long = "workers", env = "PFN_NUM_WORKERS")]
    pub num_workers: Option<usize>,

    /// Output name; the run directory is `<output-dir>/<name>`. Defaults to
    /// the current Unix time in milliseconds.
    ///
    /// Environment variable: `PFN_OUTPUT_NAME`
    #[arg(short, long, env = "PFN_OUTPUT_NAME")]
    pub name: Option<String>,

    /// Directory that holds one sub-directory per run.
    ///
    /// Environment variable: `PFN_OUTPUT_DIR`
    #[arg(short, long, env = "PFN_OUTPUT_DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// Maximum number of completed units appended per write batch.
    ///
    /// Environment variable: `PFN_BATCH_SIZE`
    #[arg(long, env = "PFN_BATCH_SIZE", default_value_t = 10)]
    pub batch_size: usize,

    /// Capacity of the completion queue between workers and the writer.
    /// Workers wait once this many results are pending. Defaults to the
    /// number of CPUs.
    ///
    /// Environment variable: `PFN_QUEUE_CAPACITY`
    #[arg(long, env = "PFN_QUEUE_CAPACITY")]
    pub queue_capacity: Option<usize>,

    /// Write results strictly in unit order instead of completion order.
    ///
    /// Environment variable: `PFN_ORDERED`
    #[arg(long, env = "PFN_ORDERED", default_value_t = false, action = ArgAction::Set)]
    pub ordered: bool,

    /// Seconds to wait for workers to acknowledge shutdown.
    ///
    /// Environment variable: `PFN_SHUTDOWN_TIMEOUT`
    #[arg(long, env = "PFN_SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,
}

/// One of the four persisted representations of a draw set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputKind {
    /// Distinct integers in `[min, max]`, in first-seen order.
    Scaled,
    /// The draw behind each accepted integer.
    Unscaled,
    /// `draw × 2^256` for each accepted integer.
    Undivided,
    /// Every draw made, duplicates included.
    Raw,
}

impl OutputKind {
    /// All kinds, in the fixed order they are appended.
    pub const ALL: [Self; 4] = [Self::Scaled, Self::Unscaled, Self::Undivided, Self::Raw];

    /// Position of this kind in [`OutputKind::ALL`].
    pub const fn index(self) -> usize {
        match self {
            Self::Scaled => 0,
            Self::Unscaled => 1,
            Self::Undivided => 2,
            Self::Raw => 3,
        }
    }

    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Scaled => "scaled.txt",
            Self::Unscaled => "unscaled.txt",
            Self::Undivided => "undivided.txt",
            Self::Raw => "raw.txt",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scaled => write!(f, "scaled"),
            Self::Unscaled => write!(f, "unscaled"),
            Self::Undivided => write!(f, "undivided"),
            Self::Raw => write!(f, "raw"),
        }
    }
}

/// Which [`OutputKind`]s are produced and persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputSelectors {
    pub scaled: bool,
    pub unscaled: bool,
    pub undivided: bool,
    pub raw: bool,
}

impl OutputSelectors {
    pub const fn all() -> Self {
        Self {
            scaled: true,
            unscaled: true,
            undivided: true,
            raw: true,
        }
    }

    pub const fn is_enabled(&self, kind: OutputKind) -> bool {
        match kind {
            OutputKind::Scaled => self.scaled,
            OutputKind::Unscaled => self.unscaled,
            OutputKind::Undivided => self.undivided,
            OutputKind::Raw => self.raw,
        }
    }

    pub const fn any(&self) -> bool {
        self.scaled || self.unscaled || self.undivided || self.raw
    }

    pub fn enabled(&self) -> impl Iterator<Item = OutputKind> + '_ {
        OutputKind::ALL.into_iter().filter(|kind| self.is_enabled(*kind))
    }
}

impl Default for OutputSelectors {
    fn default() -> Self {
        Self {
            scaled: true,
            unscaled: true,
            undivided: false,
            raw: true,
        }
    }
}

/// Immutable options consumed by unit processing.
///
/// Shared read-only across all workers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationConfig {
    /// Target number of distinct scaled values per index.
    pub size: usize,
    pub min: i64,
    pub max: i64,
    /// Render undivided values as exact integers.
    pub high_precision: bool,
    /// Prefix lines with `serverSeed clientSeed`.
    pub include_seeds: bool,
    pub log_timing: bool,
    pub outputs: OutputSelectors,
}

impl GenerationConfig {
    /// The number of distinct values each index actually collects.
    ///
    /// A range narrower than `size` can never produce `size` distinct values,
    /// so the target is capped at the width of `[min, max]`.
    pub fn target_size(&self) -> usize {
        let width = i128::from(self.max) - i128::from(self.min) + 1;
        if width <= 0 {
            // Inverted bounds; surfaced as an error on the first draw.
            return self.size;
        }
        usize::try_from(width).map_or(self.size, |width| self.size.min(width))
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            size: 90,
            min: 1,
            max: 90,
            high_precision: false,
            include_seeds: true,
            log_timing: false,
            outputs: OutputSelectors::default(),
        }
    }
}

/// Validated configuration for a whole collection run.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub count: u64,
    /// Indices per unit, already clamped to `count`.
    pub chunk_size: u64,
    pub num_workers: usize,
    pub batch_size: usize,
    pub queue_capacity: usize,
    pub ordered: bool,
    pub shutdown_timeout: Duration,
    pub output_dir: PathBuf,
    pub name: String,
    pub generation: Arc<GenerationConfig>,
}

impl CollectorConfig {
    /// Directory this run writes into: `<output_dir>/<name>`.
    pub fn run_dir(&self) -> PathBuf {
        self.output_dir.join(&self.name)
    }

    /// Builds a configuration for library use, with defaults for everything
    /// but the count and chunk size.
    pub fn new(count: u64, chunk_size: u64, generation: GenerationConfig) -> Self {
        Self {
            count,
            chunk_size: chunk_size.clamp(1, count.max(1)),
            num_workers: default_num_workers(),
            batch_size: 10,
            queue_capacity: num_cpus::get().max(1),
            ordered: false,
            shutdown_timeout: Duration::from_secs(3),
            output_dir: PathBuf::from("output"),
            name: default_output_name(),
            generation: Arc::new(generation),
        }
    }
}

impl TryFrom<CliArgs> for CollectorConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.count == 0 {
            bail!("PFN_COUNT must be greater than 0");
        }
        if args.chunk_size == 0 {
            bail!("PFN_CHUNK_SIZE must be greater than 0");
        }
        if args.size == 0 {
            bail!("PFN_SET_SIZE must be greater than 0");
        }
        if args.min > args.max {
            bail!(
                "PFN_MIN ({}) must not be greater than PFN_MAX ({})",
                args.min,
                args.max
            );
        }
        if args.batch_size == 0 {
            bail!("PFN_BATCH_SIZE must be greater than 0");
        }

        let num_workers = args.num_workers.unwrap_or_else(default_num_workers);
        if num_workers == 0 {
            bail!("PFN_NUM_WORKERS must be greater than 0");
        }

        let queue_capacity = args
            .queue_capacity
            .unwrap_or_else(|| num_cpus::get().max(1));
        if queue_capacity == 0 {
            bail!("PFN_QUEUE_CAPACITY must be greater than 0");
        }

        let name = match args.name {
            Some(name) if name.trim().is_empty() => bail!("PFN_OUTPUT_NAME must not be blank"),
            Some(name) => name,
            None => default_output_name(),
        };

        let generation = GenerationConfig {
            size: args.size,
            min: args.min,
            max: args.max,
            high_precision: args.high_precision,
            include_seeds: args.include_seeds,
            log_timing: args.log_timer,
            outputs: OutputSelectors {
                scaled: args.save_scaled,
                unscaled: args.save_unscaled,
                undivided: args.save_undivided,
                raw: args.save_raw,
            },
        };

        Ok(Self {
            count: args.count,
            chunk_size: args.chunk_size.min(args.count),
            num_workers,
            batch_size: args.batch_size,
            queue_capacity,
            ordered: args.ordered,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
            output_dir: args.output_dir,
            name,
            generation: Arc::new(generation),
        })
    }
}

/// Half the available CPUs, at least one.
pub fn default_num_workers() -> usize {
    (num_cpus::get() / 2).max(1)
}

fn default_output_name() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis().to_string())
        .unwrap_or_else(|_| String::from("0"))
}

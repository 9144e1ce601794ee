use std::path::PathBuf;
use std::process;

use clap::Parser;

mod commands;
mod config;
mod logging;

#[derive(Parser)]
#[command(version, about = "Generate passwords from character-range specifications.")]
enum Args {
    /// Generate one or more passwords.
    #[command(alias = "gen")]
    Generate {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        chars: CharArgs,
        /// Number of characters in each password.
        #[arg(short, long)]
        length: Option<usize>,
        /// Number of passwords to generate.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
        /// Where to draw entropy from.
        #[arg(long, value_enum)]
        entropy: Option<Entropy>,
        /// Read strong entropy from this device instead of the OS generator.
        #[arg(long)]
        device: Option<PathBuf>,
        /// Number of random bytes drawn per round.
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show the set of characters a specification resolves to.
    Charset {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        chars: CharArgs,
    },
}

#[derive(clap::Args)]
struct CommonArgs {
    /// Configuration file (YAML). Defaults to $PWRANGE_CONFIG, then
    /// ~/.config/pwrange/config.yaml.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log more; repeat for even more.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(clap::Args)]
pub(crate) struct CharArgs {
    /// Characters to draw from, e.g. `A-Za-z0-9`.
    #[arg(short, long, conflicts_with = "preset")]
    include: Option<String>,
    /// A named character set to draw from.
    #[arg(long, value_enum)]
    preset: Option<Preset>,
    /// Characters never to use, e.g. `0O1lI`.
    #[arg(short = 'x', long)]
    exclude: Option<String>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub(crate) enum Entropy {
    /// The OS generator (or --device), or fail.
    Strong,
    /// A non-cryptographic PRNG. Not for real secrets.
    Weak,
    /// The strong source if available, otherwise the weak PRNG with a warning.
    Fallback,
}

impl From<Entropy> for pwrange::EntropyStrategy {
    fn from(entropy: Entropy) -> pwrange::EntropyStrategy {
        match entropy {
            Entropy::Strong => pwrange::EntropyStrategy::Strong,
            Entropy::Weak => pwrange::EntropyStrategy::Weak,
            Entropy::Fallback => pwrange::EntropyStrategy::Fallback,
        }
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub(crate) enum Preset {
    /// A-Za-z0-9
    Alnum,
    /// Every printable ASCII character except space.
    Printable,
    /// 0-9a-f
    Hex,
    /// 0-9
    Digits,
}

impl Preset {
    pub(crate) fn spec(self) -> &'static str {
        match self {
            Preset::Alnum => "A-Za-z0-9",
            Preset::Printable => "!-~",
            Preset::Hex => "0-9a-f",
            Preset::Digits => "0-9",
        }
    }
}

fn run() -> Result<(), ProgError> {
    let args = Args::parse();

    match args {
        Args::Generate {
            common,
            chars,
            length,
            count,
            entropy,
            device,
            chunk_size,
            json,
        } => {
            logging::init(common.verbose);
            let config = config::load(common.config)?;
            let request = commands::GenerateRequest {
                config,
                chars,
                length,
                count,
                entropy: entropy.map(pwrange::EntropyStrategy::from),
                device,
                chunk_size,
                json,
            };
            commands::generate(request)?;
        }
        Args::Charset { common, chars } => {
            logging::init(common.verbose);
            let config = config::load(common.config)?;
            commands::show_charset(&config, chars)?;
        }
    }

    Ok(())
}

fn main() {
    match run() {
        Ok(()) => (),
        Err(ProgError::Other(err)) => {
            eprintln!("error: {err:?}");
            process::exit(2);
        }
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(1);
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum ProgError {
    #[error("{0}")]
    Generate(pwrange::GenerateError),
    #[error(transparent)]
    Other(anyhow::Error),
}

impl From<anyhow::Error> for ProgError {
    fn from(err: anyhow::Error) -> ProgError {
        ProgError::Other(err)
    }
}

impl From<pwrange::GenerateError> for ProgError {
    fn from(err: pwrange::GenerateError) -> ProgError {
        ProgError::Generate(err)
    }
}

//! Generate passwords from a character-range specification such as `A-Za-z0-9`.
//!
//! ```no_run
//! let generated = pwrange::generate(32, "A-Za-z0-9", None)?;
//! if let Some(warning) = &generated.warning {
//!     eprintln!("warning: {}", warning);
//! }
//! println!("{}", generated.password.as_str());
//! # Ok::<(), pwrange::GenerateError>(())
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

pub mod charset;
pub mod entropy;
pub mod generator;

pub use charset::{CharSet, SpecError};
pub use entropy::{EntropySource, EntropyStrategy, Strength};
pub use generator::{Generated, Generator, GeneratorOptions, InsecureEntropyWarning};

/// Generate a password of exactly `length` characters drawn from `include`, minus `exclude`.
///
/// Uses the OS CSPRNG, falling back to a weak PRNG if it is unavailable; in that case the
/// result carries an [`InsecureEntropyWarning`].
pub fn generate(
    length: usize,
    include: &str,
    exclude: Option<&str>,
) -> Result<Generated, GenerateError> {
    Generator::new(GeneratorOptions::default()).generate(length, include, exclude)
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("invalid {which} specification: {source}")]
    InvalidSpec {
        which: SpecRole,
        #[source]
        source: SpecError,
    },
    #[error("the allowed character set is empty (every included character is also excluded)")]
    EmptyAllowedSet,
    #[error("entropy source unavailable: {0}")]
    EntropyUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("gave up after drawing {rounds} chunks of entropy")]
    RoundLimitExceeded { rounds: usize },
}

/// Which of the two specifications an error refers to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SpecRole {
    Include,
    Exclude,
}

impl fmt::Display for SpecRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecRole::Include => f.write_str("include"),
            SpecRole::Exclude => f.write_str("exclude"),
        }
    }
}

/// A generated password. Its `Debug` output never shows the contents, and it is wiped on drop.
#[derive(Clone, Eq, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Secret(String);

opaque_debug::implement!(Secret);

impl Secret {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Secret {
    fn from(s: String) -> Secret {
        Secret(s)
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

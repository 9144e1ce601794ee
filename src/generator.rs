//! Rejection-sampling password generation.
//!
//! Raw bytes are pulled from an [`EntropySource`] a chunk at a time, and every byte that is not
//! in the allowed [`CharSet`] is thrown away. Because each raw byte is uniform over 0..=255,
//! the survivors are uniform over the allowed set: there is no modulo bias to correct for.

use std::fmt;
use std::path::PathBuf;

use zeroize::Zeroize;

use crate::charset::CharSet;
use crate::entropy::{EntropySource, EntropyStrategy, Strength};
use crate::{GenerateError, Secret, SpecRole};

pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Collects accepted bytes from successive entropy chunks.
///
/// `buffer[..boundary]` holds bytes that passed the filter; anything past `boundary` is a raw
/// chunk that has not been filtered yet.
struct Accumulator<'a> {
    allowed: &'a CharSet,
    buffer: Vec<u8>,
    boundary: usize,
    rounds: usize,
}

impl<'a> Accumulator<'a> {
    fn new(allowed: &'a CharSet, length: usize, chunk_size: usize) -> Accumulator<'a> {
        Accumulator {
            allowed,
            buffer: Vec::with_capacity(length + chunk_size),
            boundary: 0,
            rounds: 0,
        }
    }

    /// Pull chunks from `source` until at least `length` bytes have been accepted.
    fn fill<S: EntropySource + ?Sized>(
        &mut self,
        source: &mut S,
        length: usize,
        chunk_size: usize,
        max_rounds: Option<usize>,
    ) -> Result<(), GenerateError> {
        while self.boundary < length {
            if max_rounds.map_or(false, |max| self.rounds >= max) {
                return Err(GenerateError::RoundLimitExceeded {
                    rounds: self.rounds,
                });
            }
            let mut chunk = source.next_chunk(chunk_size)?;
            self.rounds += 1;
            self.buffer.extend_from_slice(&chunk);
            chunk.zeroize();
            self.filter_pending();
        }
        Ok(())
    }

    /// Compact the accepted bytes of the unfiltered tail down onto `boundary`.
    fn filter_pending(&mut self) {
        let mut write = self.boundary;
        for read in self.boundary..self.buffer.len() {
            let byte = self.buffer[read];
            if self.allowed.contains(byte) {
                self.buffer[write] = byte;
                write += 1;
            }
        }
        self.buffer[write..].zeroize();
        self.buffer.truncate(write);
        self.boundary = write;
    }

    fn into_accepted(self) -> Vec<u8> {
        debug_assert_eq!(self.boundary, self.buffer.len());
        self.buffer
    }
}

/// Draw `length` bytes from `source`, keeping only members of `allowed`.
///
/// A zero `length` returns at once. Otherwise fails with [`GenerateError::EmptyAllowedSet`]
/// before touching the source if `allowed` is empty, since no amount of sampling could ever
/// finish.
pub fn accumulate<S: EntropySource + ?Sized>(
    source: &mut S,
    allowed: &CharSet,
    length: usize,
    chunk_size: usize,
    max_rounds: Option<usize>,
) -> Result<Vec<u8>, GenerateError> {
    if length == 0 {
        return Ok(Vec::new());
    }
    if allowed.is_empty() {
        return Err(GenerateError::EmptyAllowedSet);
    }
    let chunk_size = chunk_size.max(1);
    let mut acc = Accumulator::new(allowed, length, chunk_size);
    acc.fill(source, length, chunk_size, max_rounds)?;
    tracing::debug!(
        length,
        rounds = acc.rounds,
        source = source.name(),
        "sampling finished"
    );
    Ok(acc.into_accepted())
}

/// Keep the first `length` accepted bytes and decode them, one char per byte.
///
/// The bytes past `length` are wiped, not kept for a later call.
pub fn assemble(mut buffer: Vec<u8>, length: usize) -> Secret {
    assert!(
        buffer.len() >= length,
        "accumulated {} bytes, but {} were requested",
        buffer.len(),
        length
    );
    let password: String = buffer[..length].iter().copied().map(char::from).collect();
    buffer.zeroize();
    Secret::from(password)
}

#[derive(Clone, Debug)]
pub struct GeneratorOptions {
    pub strategy: EntropyStrategy,
    /// Read this device for strong entropy instead of asking the OS CSPRNG.
    pub device: Option<PathBuf>,
    pub chunk_size: usize,
    /// Give up after this many chunks for a single password.
    pub max_rounds: Option<usize>,
}

impl Default for GeneratorOptions {
    fn default() -> GeneratorOptions {
        GeneratorOptions {
            strategy: EntropyStrategy::default(),
            device: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_rounds: None,
        }
    }
}

/// Raised whenever a password was made, in whole or in part, from weak entropy.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InsecureEntropyWarning {
    pub source: String,
}

impl fmt::Display for InsecureEntropyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "generated using the {} entropy source, which is not cryptographically secure; do \
             not use this output as a secret",
            self.source
        )
    }
}

/// A generated password, plus the warning if it came from weak entropy.
#[derive(Debug)]
pub struct Generated {
    pub password: Secret,
    pub warning: Option<InsecureEntropyWarning>,
    /// Estimated entropy in bits, assuming a strong source.
    pub entropy_bits: f64,
}

impl Generated {
    pub fn is_insecure(&self) -> bool {
        self.warning.is_some()
    }
}

pub struct Generator {
    options: GeneratorOptions,
}

impl Generator {
    pub fn new(options: GeneratorOptions) -> Generator {
        Generator { options }
    }

    /// Generate one password of `length` characters from `include` minus `exclude`.
    pub fn generate(
        &self,
        length: usize,
        include: &str,
        exclude: Option<&str>,
    ) -> Result<Generated, GenerateError> {
        let mut passwords = self.generate_many(1, length, include, exclude)?;
        Ok(passwords.remove(0))
    }

    /// Generate `count` passwords, compiling the allowed set and opening the source once.
    pub fn generate_many(
        &self,
        count: usize,
        length: usize,
        include: &str,
        exclude: Option<&str>,
    ) -> Result<Vec<Generated>, GenerateError> {
        let allowed = allowed_set(include, exclude)?;
        if length == 0 {
            return Ok((0..count)
                .map(|_| Generated {
                    password: Secret::from(String::new()),
                    warning: None,
                    entropy_bits: 0.0,
                })
                .collect());
        }
        if allowed.is_empty() {
            return Err(GenerateError::EmptyAllowedSet);
        }
        let mut source = self
            .options
            .strategy
            .open(self.options.device.as_deref())?;
        (0..count)
            .map(|_| self.generate_from(&mut source, &allowed, length))
            .collect()
    }

    /// Generate one password from an already compiled set and an already opened source.
    pub fn generate_from<S: EntropySource + ?Sized>(
        &self,
        source: &mut S,
        allowed: &CharSet,
        length: usize,
    ) -> Result<Generated, GenerateError> {
        let accepted = accumulate(
            source,
            allowed,
            length,
            self.options.chunk_size,
            self.options.max_rounds,
        )?;
        let warning = match source.strength() {
            Strength::Weak if length > 0 => Some(InsecureEntropyWarning {
                source: source.name().to_owned(),
            }),
            _ => None,
        };
        Ok(Generated {
            password: assemble(accepted, length),
            warning,
            entropy_bits: allowed.bits_per_char() * length as f64,
        })
    }
}

/// Compile `include` minus `exclude`.
pub fn allowed_set(include: &str, exclude: Option<&str>) -> Result<CharSet, GenerateError> {
    let include = CharSet::compile(include).map_err(|source| GenerateError::InvalidSpec {
        which: SpecRole::Include,
        source,
    })?;
    match exclude {
        Some(exclude) => {
            let exclude =
                CharSet::compile_exclude(exclude).map_err(|source| GenerateError::InvalidSpec {
                    which: SpecRole::Exclude,
                    source,
                })?;
            Ok(include.difference(&exclude))
        }
        None => Ok(include),
    }
}

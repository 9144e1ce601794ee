//! Sources of raw random bytes.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::{OsRng, SmallRng};
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::GenerateError;

/// Whether the bytes from a source are fit for secrets.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Strength {
    Strong,
    Weak,
}

/// Something that hands out raw random bytes, a chunk at a time.
pub trait EntropySource {
    /// Produce exactly `n` random bytes.
    fn next_chunk(&mut self, n: usize) -> Result<Vec<u8>, GenerateError>;

    fn strength(&self) -> Strength;

    /// A short human-readable name, for logs.
    fn name(&self) -> &str;
}

impl<S: EntropySource + ?Sized> EntropySource for Box<S> {
    fn next_chunk(&mut self, n: usize) -> Result<Vec<u8>, GenerateError> {
        (**self).next_chunk(n)
    }

    fn strength(&self) -> Strength {
        (**self).strength()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// The operating system's CSPRNG.
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn next_chunk(&mut self, n: usize) -> Result<Vec<u8>, GenerateError> {
        let mut chunk = vec![0u8; n];
        OsRng
            .try_fill_bytes(&mut chunk)
            .map_err(|err| GenerateError::EntropyUnavailable(Box::new(err)))?;
        Ok(chunk)
    }

    fn strength(&self) -> Strength {
        Strength::Strong
    }

    fn name(&self) -> &str {
        "os"
    }
}

/// An entropy device such as `/dev/urandom`, read directly.
pub struct DeviceEntropy {
    path: PathBuf,
    file: File,
}

impl DeviceEntropy {
    pub const DEFAULT_PATH: &'static str = "/dev/urandom";

    /// Open the device at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<DeviceEntropy, GenerateError> {
        let path = path.as_ref().to_owned();
        let file =
            File::open(&path).map_err(|err| GenerateError::EntropyUnavailable(Box::new(err)))?;
        Ok(DeviceEntropy { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EntropySource for DeviceEntropy {
    fn next_chunk(&mut self, n: usize) -> Result<Vec<u8>, GenerateError> {
        let mut chunk = vec![0u8; n];
        self.file
            .read_exact(&mut chunk)
            .map_err(|err| GenerateError::EntropyUnavailable(Box::new(err)))?;
        Ok(chunk)
    }

    fn strength(&self) -> Strength {
        Strength::Strong
    }

    fn name(&self) -> &str {
        "device"
    }
}

/// A non-cryptographic PRNG. Only used when nothing better is around.
///
/// Every chunk it hands out is logged as a warning and counted; [`WeakEntropy::chunks_served`]
/// lets callers see how much of their output came from here.
pub struct WeakEntropy {
    rng: SmallRng,
    chunks_served: usize,
}

impl WeakEntropy {
    /// Seeded from the clock and the process id.
    pub fn new() -> WeakEntropy {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        WeakEntropy::from_seed(nanos ^ (u64::from(std::process::id()) << 32))
    }

    /// A reproducible stream; two sources with the same seed produce the same bytes.
    pub fn from_seed(seed: u64) -> WeakEntropy {
        WeakEntropy {
            rng: SmallRng::seed_from_u64(seed),
            chunks_served: 0,
        }
    }

    pub fn chunks_served(&self) -> usize {
        self.chunks_served
    }
}

impl Default for WeakEntropy {
    fn default() -> WeakEntropy {
        WeakEntropy::new()
    }
}

impl EntropySource for WeakEntropy {
    fn next_chunk(&mut self, n: usize) -> Result<Vec<u8>, GenerateError> {
        tracing::warn!(
            bytes = n,
            "drawing from a non-cryptographic PRNG; output is not suitable for secrets"
        );
        self.chunks_served += 1;
        let mut chunk = vec![0u8; n];
        self.rng.fill_bytes(&mut chunk);
        Ok(chunk)
    }

    fn strength(&self) -> Strength {
        Strength::Weak
    }

    fn name(&self) -> &str {
        "weak-prng"
    }
}

/// Which source a generation call should draw from.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntropyStrategy {
    /// The strong source, or fail.
    Strong,
    /// The weak PRNG, always.
    Weak,
    /// The strong source if it can be opened, otherwise the weak PRNG.
    #[default]
    Fallback,
}

impl EntropyStrategy {
    /// Open a source according to this strategy.
    ///
    /// With `device` set, the strong source reads that device. Otherwise it is the OS CSPRNG,
    /// probed with a one-byte read so that an unavailable generator is detected here rather
    /// than midway through generation; if the probe fails, [`DeviceEntropy::DEFAULT_PATH`] is
    /// tried next.
    pub fn open(&self, device: Option<&Path>) -> Result<Box<dyn EntropySource>, GenerateError> {
        match self {
            EntropyStrategy::Strong => open_strong(device),
            EntropyStrategy::Weak => Ok(Box::new(WeakEntropy::new())),
            EntropyStrategy::Fallback => match open_strong(device) {
                Ok(source) => Ok(source),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        "strong entropy source unavailable; falling back to a weak PRNG"
                    );
                    Ok(Box::new(WeakEntropy::new()))
                }
            },
        }
    }
}

fn open_strong(device: Option<&Path>) -> Result<Box<dyn EntropySource>, GenerateError> {
    match device {
        Some(path) => Ok(Box::new(DeviceEntropy::open(path)?)),
        None => os_or_device(probe_os(), Path::new(DeviceEntropy::DEFAULT_PATH)),
    }
}

fn probe_os() -> Result<Box<dyn EntropySource>, GenerateError> {
    let mut os = OsEntropy;
    os.next_chunk(1)?;
    Ok(Box::new(os))
}

fn os_or_device(
    os: Result<Box<dyn EntropySource>, GenerateError>,
    device: &Path,
) -> Result<Box<dyn EntropySource>, GenerateError> {
    match os {
        Ok(source) => Ok(source),
        Err(err) => {
            tracing::warn!(
                error = %err,
                "OS random generator unavailable; trying the entropy device"
            );
            let source = DeviceEntropy::open(device)?;
            tracing::debug!(path = %source.path().display(), "reading the entropy device");
            Ok(Box::new(source))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_source_fills_requested_size() {
        let mut source = OsEntropy;
        assert_eq!(source.next_chunk(100).unwrap().len(), 100);
        assert_eq!(source.next_chunk(0).unwrap().len(), 0);
        assert_eq!(source.strength(), Strength::Strong);
    }

    #[test]
    fn weak_source_is_reproducible_and_counted() {
        let mut a = WeakEntropy::from_seed(7);
        let mut b = WeakEntropy::from_seed(7);
        assert_eq!(a.next_chunk(64).unwrap(), b.next_chunk(64).unwrap());
        a.next_chunk(8).unwrap();
        assert_eq!(a.chunks_served(), 2);
        assert_eq!(b.chunks_served(), 1);
        assert_eq!(a.strength(), Strength::Weak);
    }

    #[test]
    fn missing_device_is_unavailable() {
        let err = DeviceEntropy::open("/nonexistent/entropy-device")
            .err()
            .unwrap();
        assert!(matches!(err, GenerateError::EntropyUnavailable(_)));
    }

    #[test]
    fn short_device_read_is_unavailable() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), [1u8, 2, 3]).unwrap();
        let mut source = DeviceEntropy::open(file.path()).unwrap();
        assert_eq!(source.next_chunk(3).unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            source.next_chunk(1),
            Err(GenerateError::EntropyUnavailable(_))
        ));
    }

    #[test]
    fn strict_strategy_does_not_fall_back() {
        let missing = Path::new("/nonexistent/entropy-device");
        assert!(matches!(
            EntropyStrategy::Strong.open(Some(missing)),
            Err(GenerateError::EntropyUnavailable(_))
        ));
        let source = EntropyStrategy::Fallback.open(Some(missing)).unwrap();
        assert_eq!(source.strength(), Strength::Weak);
    }

    #[test]
    fn failed_os_probe_uses_device() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), [9u8; 16]).unwrap();
        let os_down = || -> Result<Box<dyn EntropySource>, GenerateError> {
            Err(GenerateError::EntropyUnavailable("no getrandom".into()))
        };

        let mut source = os_or_device(os_down(), file.path()).unwrap();
        assert_eq!(source.name(), "device");
        assert_eq!(source.strength(), Strength::Strong);
        assert_eq!(source.next_chunk(4).unwrap(), vec![9; 4]);

        let missing = Path::new("/nonexistent/entropy-device");
        assert!(matches!(
            os_or_device(os_down(), missing),
            Err(GenerateError::EntropyUnavailable(_))
        ));
        assert_eq!(
            os_or_device(probe_os(), missing).unwrap().name(),
            "os"
        );
    }

    #[test]
    fn strategies_pick_expected_strength() {
        assert_eq!(
            EntropyStrategy::Weak.open(None).unwrap().strength(),
            Strength::Weak
        );
        assert_eq!(
            EntropyStrategy::Strong.open(None).unwrap().strength(),
            Strength::Strong
        );
    }
}

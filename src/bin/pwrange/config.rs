//! The optional YAML configuration file.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Settings read from the configuration file. Anything left out falls back to the command line,
/// and then to the built-in defaults.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    pub length: Option<usize>,
    pub include: Option<String>,
    pub exclude: Option<String>,
    pub chunk_size: Option<usize>,
    pub entropy: Option<pwrange::EntropyStrategy>,
    pub device: Option<PathBuf>,
    pub max_rounds: Option<usize>,
}

pub(crate) const DEFAULT_LENGTH: usize = 16;
pub(crate) const DEFAULT_INCLUDE: &str = "!-~";

/// Load the configuration.
///
/// A file named on the command line or in `$PWRANGE_CONFIG` has to exist; the default location
/// is only read if something is there.
pub(crate) fn load(explicit: Option<PathBuf>) -> anyhow::Result<Config> {
    load_with(
        explicit,
        env::var_os("PWRANGE_CONFIG").map(PathBuf::from),
        env::var_os("HOME").map(PathBuf::from),
    )
}

fn load_with(
    explicit: Option<PathBuf>,
    env_path: Option<PathBuf>,
    home: Option<PathBuf>,
) -> anyhow::Result<Config> {
    match explicit.or(env_path) {
        Some(path) => load_from(&path),
        None => match home.map(default_config_path) {
            Some(path) => match load_from(&path) {
                Ok(config) => Ok(config),
                Err(err) if is_not_found(&err) => Ok(Config::default()),
                Err(err) => Err(err),
            },
            None => Ok(Config::default()),
        },
    }
}

pub(crate) fn load_from(path: &Path) -> anyhow::Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    // An empty file is a valid, if pointless, config.
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let config = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

fn default_config_path(home: PathBuf) -> PathBuf {
    let mut p = home;
    p.push(".config");
    p.push("pwrange");
    p.push("config.yaml");
    p
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<io::Error>()
        .map(|e| e.kind() == io::ErrorKind::NotFound)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn full_config() {
        let file = write_config(
            "length: 24\n\
             include: A-Za-z0-9\n\
             exclude: 0O1lI\n\
             chunk_size: 64\n\
             entropy: strong\n\
             device: /dev/random\n\
             max_rounds: 1000\n",
        );
        let config = load_from(file.path()).unwrap();
        assert_eq!(
            config,
            Config {
                length: Some(24),
                include: Some("A-Za-z0-9".to_owned()),
                exclude: Some("0O1lI".to_owned()),
                chunk_size: Some(64),
                entropy: Some(pwrange::EntropyStrategy::Strong),
                device: Some(PathBuf::from("/dev/random")),
                max_rounds: Some(1000),
            }
        );
    }

    #[test]
    fn empty_file_is_default() {
        let file = write_config("");
        assert_eq!(load_from(file.path()).unwrap(), Config::default());
    }

    #[test]
    fn caret_exclusion_survives_yaml() {
        let file = write_config("exclude: '^'\n");
        assert_eq!(
            load_from(file.path()).unwrap().exclude.as_deref(),
            Some("^")
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = write_config("lenght: 12\n");
        assert!(load_from(file.path()).is_err());
    }

    #[test]
    fn missing_default_file_is_default() {
        let home = tempfile::tempdir().unwrap();
        let config = load_with(None, None, Some(home.path().to_owned())).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(load_with(None, None, None).unwrap(), Config::default());
    }

    #[test]
    fn default_file_under_home_is_read() {
        let home = tempfile::tempdir().unwrap();
        let dir = home.path().join(".config").join("pwrange");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.yaml"), "length: 40\n").unwrap();
        let config = load_with(None, None, Some(home.path().to_owned())).unwrap();
        assert_eq!(config.length, Some(40));
    }

    #[test]
    fn env_path_beats_home() {
        let home = tempfile::tempdir().unwrap();
        let dir = home.path().join(".config").join("pwrange");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.yaml"), "length: 40\n").unwrap();
        let env_file = write_config("length: 8\n");
        let config = load_with(
            None,
            Some(env_file.path().to_owned()),
            Some(home.path().to_owned()),
        )
        .unwrap();
        assert_eq!(config.length, Some(8));

        let explicit = write_config("length: 12\n");
        let config = load_with(
            Some(explicit.path().to_owned()),
            Some(env_file.path().to_owned()),
            Some(home.path().to_owned()),
        )
        .unwrap();
        assert_eq!(config.length, Some(12));
    }

    #[test]
    fn missing_env_file_is_an_error() {
        let home = tempfile::tempdir().unwrap();
        let err = load_with(
            None,
            Some(PathBuf::from("/nonexistent/pwrange.yaml")),
            Some(home.path().to_owned()),
        )
        .unwrap_err();
        assert!(is_not_found(&err));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = load(Some(PathBuf::from("/nonexistent/pwrange.yaml"))).unwrap_err();
        assert!(is_not_found(&err));
    }
}

//! The subcommands: turning arguments plus config into a generator call, and printing the result.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use serde::Serialize;

use crate::config::{Config, DEFAULT_INCLUDE, DEFAULT_LENGTH};
use crate::{CharArgs, ProgError};
use pwrange::{Generated, Generator, GeneratorOptions, Secret};

pub(crate) struct GenerateRequest {
    pub config: Config,
    pub chars: CharArgs,
    pub length: Option<usize>,
    pub count: usize,
    pub entropy: Option<pwrange::EntropyStrategy>,
    pub device: Option<PathBuf>,
    pub chunk_size: Option<usize>,
    pub json: bool,
}

/// Include and exclude specs after applying command line, then config, then defaults.
fn resolve_specs(config: &Config, chars: CharArgs) -> (String, Option<String>) {
    let include = chars
        .include
        .or_else(|| chars.preset.map(|p| p.spec().to_owned()))
        .or_else(|| config.include.clone())
        .unwrap_or_else(|| DEFAULT_INCLUDE.to_owned());
    let exclude = chars.exclude.or_else(|| config.exclude.clone());
    (include, exclude)
}

pub(crate) fn generate(request: GenerateRequest) -> Result<(), ProgError> {
    let GenerateRequest {
        config,
        chars,
        length,
        count,
        entropy,
        device,
        chunk_size,
        json,
    } = request;
    let (include, exclude) = resolve_specs(&config, chars);
    let length = length.or(config.length).unwrap_or(DEFAULT_LENGTH);
    let options = GeneratorOptions {
        strategy: entropy.or(config.entropy).unwrap_or_default(),
        device: device.or(config.device),
        chunk_size: chunk_size
            .or(config.chunk_size)
            .unwrap_or(pwrange::generator::DEFAULT_CHUNK_SIZE),
        max_rounds: config.max_rounds,
    };
    tracing::debug!(?options, %include, ?exclude, length, count, "generating");

    let generator = Generator::new(options);
    let passwords = generator.generate_many(count, length, &include, exclude.as_deref())?;

    for generated in &passwords {
        if let Some(warning) = &generated.warning {
            eprintln!("{} {}", console::style("warning:").yellow().bold(), warning);
        }
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        write_json(&mut out, &passwords).context("failed to write passwords as JSON")?;
    } else {
        for generated in &passwords {
            writeln!(out, "{}", generated.password.as_str())
                .context("failed to write password")?;
        }
    }
    out.flush().context("failed to flush stdout")?;
    Ok(())
}

#[derive(Serialize)]
struct JsonPassword<'a> {
    password: &'a Secret,
    entropy_bits: f64,
    insecure: bool,
}

fn write_json(mut out: impl Write, passwords: &[Generated]) -> anyhow::Result<()> {
    let rows = passwords
        .iter()
        .map(|g| JsonPassword {
            password: &g.password,
            entropy_bits: g.entropy_bits,
            insecure: g.is_insecure(),
        })
        .collect::<Vec<_>>();
    serde_json::to_writer_pretty(&mut out, &rows)?;
    writeln!(out)?;
    Ok(())
}

pub(crate) fn show_charset(config: &Config, chars: CharArgs) -> Result<(), ProgError> {
    let (include, exclude) = resolve_specs(config, chars);
    let allowed = pwrange::generator::allowed_set(&include, exclude.as_deref())?;
    println!("{}", allowed);
    eprintln!(
        "{} characters, {:.2} bits per character",
        allowed.len(),
        allowed.bits_per_char()
    );
    if allowed.is_empty() {
        return Err(pwrange::GenerateError::EmptyAllowedSet.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Preset;

    fn chars(include: Option<&str>, preset: Option<Preset>, exclude: Option<&str>) -> CharArgs {
        CharArgs {
            include: include.map(str::to_owned),
            preset,
            exclude: exclude.map(str::to_owned),
        }
    }

    #[test]
    fn command_line_beats_config() {
        let config = Config {
            include: Some("a-z".to_owned()),
            exclude: Some("x".to_owned()),
            ..Config::default()
        };
        let (include, exclude) = resolve_specs(&config, chars(Some("0-9"), None, Some("5")));
        assert_eq!(include, "0-9");
        assert_eq!(exclude.as_deref(), Some("5"));
    }

    #[test]
    fn preset_beats_config() {
        let config = Config {
            include: Some("a-z".to_owned()),
            ..Config::default()
        };
        let (include, exclude) = resolve_specs(&config, chars(None, Some(Preset::Hex), None));
        assert_eq!(include, "0-9a-f");
        assert_eq!(exclude, None);
    }

    #[test]
    fn defaults_apply_last() {
        let (include, exclude) = resolve_specs(&Config::default(), chars(None, None, None));
        assert_eq!(include, DEFAULT_INCLUDE);
        assert_eq!(exclude, None);
    }

    #[test]
    fn json_rows() {
        let generated = Generator::new(GeneratorOptions {
            strategy: pwrange::EntropyStrategy::Weak,
            ..GeneratorOptions::default()
        })
        .generate(8, "0-9", None)
        .unwrap();
        let mut buf = Vec::new();
        write_json(&mut buf, std::slice::from_ref(&generated)).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value[0]["password"], generated.password.as_str());
        assert_eq!(value[0]["insecure"], true);
    }
}

use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Init tracing on stderr. `RUST_LOG` wins; otherwise the level is `WARN`, raised by each `-v`.
pub(crate) fn init(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    if let Err(err) = tracing_subscriber::fmt()
        .compact()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("failed to set up logging: {err}");
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn second_init_reports_instead_of_panicking() {
        super::init(0);
        super::init(2);
        tracing::warn!("still logging");
    }
}

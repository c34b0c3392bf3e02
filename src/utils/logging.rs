use std::path::Path;

use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::{
    fmt::{format::FmtSpan, writer::MakeWriterExt},
    EnvFilter,
};

pub const CLI_PREFIX: &str = "cli";
const LOG_DIR: &str = "logs";
const KEPT_LOG_FILES: usize = 7;
const DEFAULT_LEVEL: &str = "info";

/// Filter directive for this crate's spans and events. An explicit level wins over `RUST_LOG`.
fn crate_directive(log_level: Option<LevelFilter>, env_level: Option<String>) -> String {
    let level = log_level
        .map(|v| v.to_string())
        .or(env_level)
        .unwrap_or_else(|| DEFAULT_LEVEL.into());
    format!("{}={level}", env!("CARGO_PKG_NAME").replace('-', "_"))
}

/// Every run appends to a daily log file under `<state_dir>/logs`. With `echo_to_stderr` the same
/// events are mirrored to stderr; stdout stays reserved for the JSON a command prints.
pub fn enable_logging(
    prefix: &str,
    state_dir: &Path,
    log_level: Option<LevelFilter>,
    echo_to_stderr: bool,
) -> Result<()> {
    let appender = Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(KEPT_LOG_FILES)
        .filename_prefix(prefix)
        .build(state_dir.join(LOG_DIR))?;

    let stderr = std::io::stderr.with_filter(move |_| echo_to_stderr);
    let directive = crate_directive(log_level, std::env::var("RUST_LOG").ok());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directive))
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(stderr.and(appender))
        .with_ansi(false)
        .init();
    Ok(())
}

#[cfg(test)]
pub static TEST_LOGGING: std::sync::LazyLock<()> = std::sync::LazyLock::new(|| {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .pretty()
        .init()
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_directive() {
        assert_eq!(crate_directive(None, None), "lifevault=info");
        assert_eq!(
            crate_directive(None, Some("warn".into())),
            "lifevault=warn"
        );
        assert_eq!(
            crate_directive(Some(LevelFilter::TRACE), Some("warn".into())),
            "lifevault=trace"
        );
    }
}

//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, after the config is loaded. Output goes to
//! stderr so the console channel owns stdout.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// HTTP stack crates are pinned to `warn` unless `RUST_LOG` says otherwise.
const QUIET_DIRECTIVES: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "rustls=warn"];

/// Build the filter directive string for `level`.
fn directives(level: &str) -> String {
    let mut out = level.to_string();
    for d in QUIET_DIRECTIVES {
        out.push(',');
        out.push_str(d);
    }
    out
}

/// Initialise the global tracing subscriber.
///
/// `level` is the configured level (`"error"` .. `"trace"`). When it does
/// not parse, `RUST_LOG` is tried before giving up.
pub fn init(level: &str) -> Result<(), AppError> {
    let filter = match parse_level(level) {
        Ok(_) => EnvFilter::try_new(directives(level))
            .map_err(|e| AppError::Logger(format!("invalid log level '{level}': {e}")))?,
        Err(level_err) => EnvFilter::try_from_default_env().map_err(|env_err| {
            AppError::Logger(format!("{level_err}; RUST_LOG parse failed: {env_err}"))
        })?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))?;

    Ok(())
}

/// Parse a log level string into a [`LevelFilter`], returning an error on
/// unrecognised values.
pub fn parse_level(level: &str) -> Result<LevelFilter, AppError> {
    if level.is_empty() {
        return Err(AppError::Logger("log level must not be empty".into()));
    }
    level
        .parse::<LevelFilter>()
        .map_err(|_| AppError::Logger(format!("unrecognised log level: '{level}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_levels_parse() {
        for l in &["error", "warn", "info", "debug", "trace"] {
            assert!(parse_level(l).is_ok(), "expected '{l}' to be valid");
        }
    }

    #[test]
    fn invalid_level_errors() {
        assert!(parse_level("verbose").is_err());
        assert!(parse_level("").is_err());
    }

    #[test]
    fn directives_quiet_http_stack() {
        let d = directives("debug");
        assert!(d.starts_with("debug,"));
        assert!(d.contains("reqwest=warn"));
    }

    #[test]
    fn init_info_succeeds_or_already_init() {
        // Another test in the same process may have installed a subscriber first.
        match init("info") {
            Ok(()) => {}
            Err(AppError::Logger(msg)) if msg.contains("set subscriber") => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}

// src/dev/logging.rs
use stderrlog::Timestamp;

/// Sets up stderr logging for the binaries.
///
/// `DFASCAN_LOG` picks the verbosity: 0 = off, 1 = error, 2 = warn (default),
/// 3 = info, 4 = debug, 5+ = trace. `DFASCAN_LOG_TS=1` adds timestamps.
pub fn setup_logging(default: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let level = std::env::var("DFASCAN_LOG")
        .ok()
        .and_then(|s| s.trim().parse::<u8>().ok())
        .unwrap_or(default);

    let log_level = match level {
        0 => stderrlog::LogLevelNum::Off,
        1 => stderrlog::LogLevelNum::Error,
        2 => stderrlog::LogLevelNum::Warn,
        3 => stderrlog::LogLevelNum::Info,
        4 => stderrlog::LogLevelNum::Debug,
        _ => stderrlog::LogLevelNum::Trace,
    };
    let timestamps = crate::lexer::config::env_flag_true("DFASCAN_LOG_TS", false);

    stderrlog::new()
        .verbosity(log_level)
        .timestamp(if timestamps {
            Timestamp::Second
        } else {
            Timestamp::Off
        })
        .init()?;

    Ok(())
}

// src/lexer/config.rs
use log::warn;
use serde::{Deserialize, Serialize};

use super::position::PositionConfig;

pub const DEFAULT_BUFFER_SIZE: usize = 16384;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Initial capacity of the character buffer. It doubles whenever a match outgrows it.
    pub buffer_size: usize,
    pub count_chars: bool,
    pub count_lines: bool,
    pub count_columns: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            count_chars: true,
            count_lines: true,
            count_columns: true,
        }
    }
}

impl ScannerConfig {
    /// Defaults overridden by `DFASCAN_BUFFER_SIZE`, `DFASCAN_COUNT_CHARS`,
    /// `DFASCAN_COUNT_LINES` and `DFASCAN_COUNT_COLUMNS`.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            buffer_size: env_usize("DFASCAN_BUFFER_SIZE", d.buffer_size),
            count_chars: env_flag_true("DFASCAN_COUNT_CHARS", d.count_chars),
            count_lines: env_flag_true("DFASCAN_COUNT_LINES", d.count_lines),
            count_columns: env_flag_true("DFASCAN_COUNT_COLUMNS", d.count_columns),
        }
    }

    pub fn position(&self) -> PositionConfig {
        PositionConfig {
            chars: self.count_chars,
            lines: self.count_lines,
            columns: self.count_columns,
        }
    }

    pub(crate) fn effective_buffer_size(&self) -> usize {
        if self.buffer_size == 0 {
            warn!("buffer_size 0 is unusable; falling back to 1");
            1
        } else {
            self.buffer_size
        }
    }
}

pub fn env_flag_true(var: &str, default: bool) -> bool {
    std::env::var(var)
        .map(|v| !(v == "0" || v.eq_ignore_ascii_case("false")))
        .unwrap_or(default)
}

fn env_usize(var: &str, default: usize) -> usize {
    match std::env::var(var) {
        Ok(s) => s.trim().parse::<usize>().unwrap_or_else(|_| {
            warn!("ignoring {var}={s:?}: not a number");
            default
        }),
        Err(_) => default,
    }
}

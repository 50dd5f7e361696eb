// src/lexer/position.rs
//! Line/column/char accounting, applied once per accepted match.
//!
//! Counting is a pure function of the finished span. The only cross-span rule is
//! CR LF: a span ending in CR counts a line, and if the character after the span
//! turns out to be LF the scanner takes that line back with [`merge_crlf`].

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters {
    pub char_offset: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionConfig {
    pub chars: bool,
    pub lines: bool,
    pub columns: bool,
}

impl PositionConfig {
    pub const ALL: PositionConfig = PositionConfig {
        chars: true,
        lines: true,
        columns: true,
    };
    pub const NONE: PositionConfig = PositionConfig {
        chars: false,
        lines: false,
        columns: false,
    };
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self::ALL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanEnd {
    pub counters: Counters,
    /// The span ended in CR; a following LF must not count again.
    pub pending_cr: bool,
}

#[inline]
pub fn is_line_terminator(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\u{000B}' | '\u{000C}' | '\u{0085}' | '\u{2028}' | '\u{2029}'
    )
}

pub fn advance(counters: Counters, span: &[char], cfg: PositionConfig) -> SpanEnd {
    let mut out = counters;
    if cfg.chars {
        out.char_offset += span.len();
    }
    let mut pending_cr = false;
    if !(cfg.lines || cfg.columns) {
        return SpanEnd {
            counters: out,
            pending_cr: span.last() == Some(&'\r'),
        };
    }
    for &c in span {
        match c {
            '\r' => {
                new_line(&mut out, cfg);
                pending_cr = true;
            }
            '\n' if pending_cr => pending_cr = false,
            c if is_line_terminator(c) => {
                new_line(&mut out, cfg);
                pending_cr = false;
            }
            _ => {
                pending_cr = false;
                if cfg.columns {
                    out.column += 1;
                }
            }
        }
    }
    SpanEnd {
        counters: out,
        pending_cr,
    }
}

fn new_line(c: &mut Counters, cfg: PositionConfig) {
    if cfg.lines {
        c.line += 1;
    }
    c.column = 0;
}

/// Undoes the line counted for a trailing CR when the next character is LF.
pub fn merge_crlf(counters: &mut Counters, cfg: PositionConfig, next: Option<char>) {
    if cfg.lines && next == Some('\n') {
        counters.line = counters.line.saturating_sub(1);
    }
}

/// Whether the match after a span ending in `last` starts a line.
/// `None` when the span was empty and the previous answer stands.
pub fn ends_line(last: Option<char>, next: Option<char>) -> Option<bool> {
    let last = last?;
    Some(match last {
        '\r' => matches!(next, Some(c) if c != '\n'),
        c => is_line_terminator(c),
    })
}

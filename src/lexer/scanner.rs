// src/lexer/scanner.rs
//! Table-driven longest-match scanner.
//!
//! Each call to [`Scanner::next_token`] runs the DFA from the entry state of the
//! current lexical state, remembers the last accepting position, trims trailing
//! context, and hands the match to [`Actions::on_match`]. Actions either produce
//! a token or ask the scanner to keep going.

use std::sync::Arc;

use log::{debug, trace};

use super::{
    buffer::{CharSource, Cursors, ScanBuffer},
    config::ScannerConfig,
    error::{ScanError, TableError},
    position::{self, Counters, PositionConfig},
    tables::{ActionId, DfaTable, LexState, Lookahead, LookaheadPair},
};

/// What an action wants the scanner to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    Token(T),
    Continue,
}

/// User code attached to the rules of a table.
pub trait Actions {
    type Token;

    /// Runs for every accepted match, and for EOF actions (with an empty match).
    ///
    /// Returning [`Step::Continue`] for an empty match without switching the lexical
    /// state makes no progress: the scanner reports [`ScanError::NoMatch`] for a rule
    /// match and ends the stream for an EOF action.
    fn on_match(&mut self, action: ActionId, yy: &mut ScanState) -> Result<Step<Self::Token>, ScanError>;

    /// Runs once, the first time the input is exhausted.
    fn end_of_stream(&mut self, yy: &mut ScanState) -> Result<(), ScanError> {
        let _ = yy;
        Ok(())
    }
}

impl<T, F> Actions for F
where
    F: FnMut(ActionId, &mut ScanState) -> Result<Step<T>, ScanError>,
{
    type Token = T;

    fn on_match(&mut self, action: ActionId, yy: &mut ScanState) -> Result<Step<T>, ScanError> {
        self(action, yy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Scanning,
    /// `end_of_stream` already ran.
    EofHookDone,
    Closed,
}

/// Mutable scanner state, visible to actions.
#[derive(Debug)]
pub struct ScanState {
    buffer: ScanBuffer,
    lexical_state: LexState,
    n_lex_states: usize,
    at_bol: bool,
    lifecycle: Lifecycle,
    counters: Counters,
    position: PositionConfig,
    // fin[i]: the forward lookahead automaton accepted the prefix ending at i
    fin: Vec<bool>,
}

enum Outcome {
    Matched(ActionId),
    Eof,
    NoMatch,
}

impl ScanState {
    fn new(source: Box<dyn CharSource>, n_lex_states: usize, config: &ScannerConfig) -> Self {
        Self {
            buffer: ScanBuffer::new(source, config.effective_buffer_size()),
            lexical_state: LexState::INITIAL,
            n_lex_states,
            at_bol: true,
            lifecycle: Lifecycle::Scanning,
            counters: Counters::default(),
            position: config.position(),
            fin: Vec::new(),
        }
    }

    /// The current match.
    pub fn matched(&self) -> &[char] {
        let c = self.buffer.cursors();
        self.buffer.span(c.start_read, c.marked_pos)
    }

    pub fn text(&self) -> String {
        self.matched().iter().collect()
    }

    pub fn len(&self) -> usize {
        self.matched().len()
    }

    pub fn is_empty(&self) -> bool {
        self.matched().is_empty()
    }

    pub fn char_at(&self, i: usize) -> Option<char> {
        self.matched().get(i).copied()
    }

    /// Gives the last `n` characters of the match back to the input.
    pub fn pushback(&mut self, n: usize) -> Result<(), ScanError> {
        let len = self.len();
        if n > len {
            return Err(ScanError::InvalidArgument(format!(
                "cannot push back {n} characters of a {len}-character match"
            )));
        }
        self.buffer.cur.marked_pos -= n;
        Ok(())
    }

    pub fn begin(&mut self, state: LexState) -> Result<(), ScanError> {
        if state.0 >= self.n_lex_states {
            return Err(ScanError::InvalidArgument(format!(
                "unknown lexical state {} (table has {})",
                state.0, self.n_lex_states
            )));
        }
        self.lexical_state = state;
        Ok(())
    }

    pub fn lexical_state(&self) -> LexState {
        self.lexical_state
    }

    /// Line of the match start, 0-based.
    pub fn line(&self) -> usize {
        self.counters.line
    }

    /// Column of the match start, 0-based, in code points.
    pub fn column(&self) -> usize {
        self.counters.column
    }

    /// Code points before the match start.
    pub fn char_offset(&self) -> usize {
        self.counters.char_offset
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn at_bol(&self) -> bool {
        self.at_bol
    }

    pub fn at_eof(&self) -> bool {
        self.buffer.at_eof()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Closes the source; further scanning fails with [`ScanError::Closed`].
    pub fn close(&mut self) -> Result<(), ScanError> {
        self.lifecycle = Lifecycle::Closed;
        self.buffer.close()?;
        Ok(())
    }

    fn reset(&mut self, source: Box<dyn CharSource>) {
        self.buffer.reset(source);
        self.lexical_state = LexState::INITIAL;
        self.at_bol = true;
        self.lifecycle = Lifecycle::Scanning;
        self.counters = Counters::default();
    }

    // Applies the finished match `[start_read, marked_pos)` to the counters and BOL flag,
    // then marks it consumed.
    fn settle(&mut self) -> Result<(), ScanError> {
        let Cursors {
            start_read,
            marked_pos,
            ..
        } = self.buffer.cursors();
        if marked_pos == start_read {
            return Ok(());
        }
        let span = self.buffer.span(start_read, marked_pos);
        let last = span.last().copied();
        let end = position::advance(self.counters, span, self.position);
        self.counters = end.counters;

        let next = if last == Some('\r') {
            self.buffer.peek_marked()?
        } else {
            None
        };
        if end.pending_cr {
            position::merge_crlf(&mut self.counters, self.position, next);
        }
        if let Some(bol) = position::ends_line(last, next) {
            self.at_bol = bol;
        }
        // a peek may have compacted the buffer; read the cursor again
        self.buffer.cur.start_read = self.buffer.cur.marked_pos;
        Ok(())
    }

    fn longest_match(&mut self, table: &DfaTable) -> Result<Outcome, ScanError> {
        let start = self.buffer.cur.marked_pos;
        self.buffer.cur.start_read = start;
        self.buffer.cur.current_pos = start;

        let entry = table
            .lexical_state(self.lexical_state)
            .ok_or(ScanError::Table(TableError::NoLexicalStates))?;
        let mut state = if self.at_bol { entry.bol } else { entry.normal };
        let mut action = table.action_of(state);
        let mut input_ended = false;

        loop {
            let Some(ch) = self.buffer.next_char()? else {
                input_ended = true;
                break;
            };
            let Some(next) = table.next_state(state, ch) else {
                break;
            };
            state = next;
            if table.is_final(state) {
                if let Some(a) = table.action_of(state) {
                    action = Some(a);
                    self.buffer.cur.marked_pos = self.buffer.cur.current_pos;
                }
                if table.is_no_lookahead(state) {
                    break;
                }
            }
        }

        let c = self.buffer.cursors();
        if input_ended && c.start_read == c.current_pos {
            return Ok(Outcome::Eof);
        }
        Ok(action.map_or(Outcome::NoMatch, Outcome::Matched))
    }

    fn resolve_lookahead(&mut self, table: &DfaTable, action: ActionId) -> Result<(), ScanError> {
        let spec = table.action(action).ok_or(ScanError::Table(TableError::UnknownAction {
            what: "accepting state",
            action,
        }))?;
        let Cursors {
            start_read,
            marked_pos,
            ..
        } = self.buffer.cursors();
        let broken = ScanError::BrokenLookahead { action };
        let marked = match spec.lookahead {
            Lookahead::None => return Ok(()),
            Lookahead::FixedBase(n) => start_read
                .checked_add(n)
                .filter(|&m| m <= marked_pos)
                .ok_or(broken)?,
            Lookahead::FixedLook(n) | Lookahead::FiniteChoice(n) => marked_pos
                .checked_sub(n)
                .filter(|&m| m >= start_read)
                .ok_or(broken)?,
            Lookahead::General(id) => {
                let pair = table.lookahead(id).ok_or(ScanError::Table(TableError::UnknownLookahead {
                    action,
                    id,
                }))?;
                self.general_lookahead(table, pair, action)?
            }
        };
        self.buffer.cur.marked_pos = marked;
        Ok(())
    }

    // Forward pass marks every position where `r1` could end; the backward pass walks
    // `reverse(r2)` from the match end until it reaches such a position while accepting.
    fn general_lookahead(
        &mut self,
        table: &DfaTable,
        pair: LookaheadPair,
        action: ActionId,
    ) -> Result<usize, ScanError> {
        let Cursors {
            start_read: start,
            marked_pos: end,
            ..
        } = self.buffer.cursors();
        let needed = self.buffer.capacity() + 1;
        if self.fin.len() < needed {
            let grown = needed.max(self.fin.len() * 2);
            self.fin.resize(grown, false);
        }
        let chars = self.buffer.chars();
        let fin = &mut self.fin;

        let mut pos = start;
        let mut fstate = Some(pair.forward);
        while let Some(s) = fstate {
            if pos >= end {
                break;
            }
            fin[pos] = table.is_final(s);
            fstate = table.next_state(s, chars[pos]);
            pos += 1;
        }
        if let Some(s) = fstate {
            fin[pos] = table.is_final(s);
            pos += 1;
        }
        while pos <= end {
            fin[pos] = false;
            pos += 1;
        }

        let mut pos = end;
        let mut bstate = pair.backward;
        while !(fin[pos] && table.is_final(bstate)) {
            if pos == start {
                return Err(ScanError::BrokenLookahead { action });
            }
            pos -= 1;
            bstate = table
                .next_state(bstate, chars[pos])
                .ok_or(ScanError::BrokenLookahead { action })?;
        }
        Ok(pos)
    }
}

fn no_match(c: Counters) -> ScanError {
    ScanError::NoMatch {
        line: c.line,
        column: c.column,
        char_offset: c.char_offset,
    }
}

/// Longest-match scanner over one input.
pub struct Scanner<A> {
    table: Arc<DfaTable>,
    state: ScanState,
    actions: A,
    finished: bool,
    // the last next_token call failed with NoMatch
    unmatched: bool,
}

impl<A: Actions> Scanner<A> {
    pub fn new(table: Arc<DfaTable>, source: impl CharSource + 'static, actions: A) -> Self {
        Self::with_config(table, source, actions, &ScannerConfig::default())
    }

    pub fn with_config(
        table: Arc<DfaTable>,
        source: impl CharSource + 'static,
        actions: A,
        config: &ScannerConfig,
    ) -> Self {
        let state = ScanState::new(Box::new(source), table.n_lex_states(), config);
        Self {
            table,
            state,
            actions,
            finished: false,
            unmatched: false,
        }
    }

    pub fn table(&self) -> &Arc<DfaTable> {
        &self.table
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ScanState {
        &mut self.state
    }

    pub fn actions(&self) -> &A {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut A {
        &mut self.actions
    }

    pub fn into_actions(self) -> A {
        self.actions
    }

    /// Next token, or `None` once the input and every EOF action are done.
    pub fn next_token(&mut self) -> Result<Option<A::Token>, ScanError> {
        if self.state.lifecycle == Lifecycle::Closed {
            return Err(ScanError::Closed);
        }
        self.unmatched = false;
        let table: &DfaTable = &self.table;
        loop {
            self.state.settle()?;
            match self.state.longest_match(table)? {
                Outcome::Matched(action) => {
                    self.state.resolve_lookahead(table, action)?;
                    trace!(
                        "action {} matched {:?} at {}:{}",
                        action,
                        self.state.text(),
                        self.state.line(),
                        self.state.column()
                    );
                    let lexical_state = self.state.lexical_state;
                    if let Step::Token(t) = self.actions.on_match(action, &mut self.state)? {
                        return Ok(Some(t));
                    }
                    if self.state.is_empty() && self.state.lexical_state == lexical_state {
                        debug!("action {action} skipped an empty match; no progress possible");
                        self.unmatched = true;
                        return Err(no_match(self.state.counters));
                    }
                }
                Outcome::Eof => {
                    if self.state.lifecycle == Lifecycle::Scanning {
                        self.state.lifecycle = Lifecycle::EofHookDone;
                        debug!(
                            "end of input after {} chars, {} line(s)",
                            self.state.counters.char_offset,
                            self.state.counters.line + 1
                        );
                        self.actions.end_of_stream(&mut self.state)?;
                    }
                    if self.state.lifecycle == Lifecycle::Closed {
                        return Ok(None);
                    }
                    let Some(action) = table.eof_action(self.state.lexical_state) else {
                        return Ok(None);
                    };
                    let lexical_state = self.state.lexical_state;
                    debug!("running eof action {action} in {lexical_state:?}");
                    if let Step::Token(t) = self.actions.on_match(action, &mut self.state)? {
                        return Ok(Some(t));
                    }
                    if self.state.lifecycle != Lifecycle::Closed
                        && self.state.lexical_state == lexical_state
                    {
                        return Ok(None);
                    }
                }
                Outcome::NoMatch => {
                    self.unmatched = true;
                    return Err(no_match(self.state.counters));
                }
            }
        }
    }

    /// After [`ScanError::NoMatch`], consumes the offending character so scanning can go on.
    /// Returns `None` unless the previous call failed with `NoMatch`.
    pub fn skip_unmatched(&mut self) -> Option<char> {
        if !self.unmatched {
            return None;
        }
        let c = self.state.buffer.cursors();
        let ch = self.state.buffer.get(c.start_read)?;
        self.unmatched = false;
        self.state.buffer.cur.marked_pos = c.start_read + 1;
        Some(ch)
    }

    pub fn close(&mut self) -> Result<(), ScanError> {
        self.state.close()
    }

    /// Starts over on `source`, keeping table, actions and buffer allocation.
    pub fn reset(&mut self, source: impl CharSource + 'static) {
        self.state.reset(Box::new(source));
        self.finished = false;
        self.unmatched = false;
    }
}

impl<A: Actions> Iterator for Scanner<A> {
    type Item = Result<A::Token, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_token() {
            Ok(Some(t)) => Some(Ok(t)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

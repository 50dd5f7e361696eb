// src/lexer/tables/build.rs
use std::{ops::RangeInclusive, time::Instant};

use hashbrown::HashMap;

use super::{
    ActionId,
    ActionSpec,
    DfaParts,
    DfaTable,
    EofActions,
    FINAL,
    LexEntry,
    LexState,
    Lookahead,
    LookaheadId,
    LookaheadPair,
    NO_LOOKAHEAD,
    NO_TARGET,
    StateId,
};
use crate::lexer::error::TableError;

/// Assembles a [`DfaTable`] from per-state transition rows.
///
/// Class 0 is "every character not assigned elsewhere". Classes must be declared
/// before `edges_except` is used, since it covers the classes known at that point.
#[derive(Debug, Clone)]
pub struct DfaBuilder {
    n_classes: usize,
    cmap: Vec<u16>,
    rows: Vec<Vec<i32>>,
    attributes: Vec<u8>,
    state_action: Vec<Option<ActionId>>,
    lex_states: Vec<LexEntry>,
    lookahead: Vec<LookaheadPair>,
    actions: Vec<ActionSpec>,
    eof: EofActions,
}

impl Default for DfaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DfaBuilder {
    pub fn new() -> Self {
        Self {
            n_classes: 1,
            cmap: Vec::new(),
            rows: Vec::new(),
            attributes: Vec::new(),
            state_action: Vec::new(),
            lex_states: Vec::new(),
            lookahead: Vec::new(),
            actions: Vec::new(),
            eof: EofActions::default(),
        }
    }

    /// New character class covering `ranges`. Characters move out of any earlier class.
    pub fn class<I>(&mut self, ranges: I) -> usize
    where
        I: IntoIterator<Item = RangeInclusive<char>>,
    {
        let id = self.n_classes;
        self.n_classes += 1;
        let tag = u16::try_from(id).unwrap_or(u16::MAX);
        for r in ranges {
            let (lo, hi) = (*r.start() as usize, *r.end() as usize);
            if lo > hi {
                continue;
            }
            if self.cmap.len() <= hi {
                self.cmap.resize(hi + 1, 0);
            }
            self.cmap[lo..=hi].fill(tag);
        }
        id
    }

    /// Class made of the individual characters of `chars`.
    pub fn chars(&mut self, chars: &str) -> usize {
        self.class(chars.chars().map(|c| c..=c))
    }

    pub fn state(&mut self) -> StateId {
        self.rows.push(Vec::new());
        self.attributes.push(0);
        self.state_action.push(None);
        self.rows.len() - 1
    }

    pub fn edge(&mut self, from: StateId, class: usize, to: StateId) -> &mut Self {
        let row = &mut self.rows[from];
        if row.len() <= class {
            row.resize(class + 1, NO_TARGET);
        }
        row[class] = to as i32;
        self
    }

    pub fn edges(&mut self, from: StateId, classes: &[usize], to: StateId) -> &mut Self {
        for &c in classes {
            self.edge(from, c, to);
        }
        self
    }

    /// Edges on every class declared so far except `except` (class 0 included).
    pub fn edges_except(&mut self, from: StateId, except: &[usize], to: StateId) -> &mut Self {
        for c in 0..self.n_classes {
            if !except.contains(&c) {
                self.edge(from, c, to);
            }
        }
        self
    }

    /// Declares a rule action; ids and priorities follow declaration order.
    pub fn action(&mut self, lookahead: Lookahead) -> ActionId {
        let id = self.actions.len();
        self.actions.push(ActionSpec {
            priority: id as u32,
            lookahead,
        });
        id
    }

    /// Makes `state` accepting for `action`. A state accepted by several rules keeps the
    /// one declared first.
    pub fn accept(&mut self, state: StateId, action: ActionId) -> &mut Self {
        self.attributes[state] |= FINAL;
        let slot = &mut self.state_action[state];
        *slot = Some(slot.map_or(action, |prev| prev.min(action)));
        self
    }

    /// Accepting state without an action (states of lookahead automata).
    pub fn mark_final(&mut self, state: StateId) -> &mut Self {
        self.attributes[state] |= FINAL;
        self
    }

    /// Declares the next lexical state; the first one declared is [`LexState::INITIAL`].
    pub fn lexical_state(&mut self, normal: StateId, bol: StateId) -> LexState {
        self.lex_states.push(LexEntry { normal, bol });
        LexState(self.lex_states.len() - 1)
    }

    pub fn lookahead_pair(&mut self, forward: StateId, backward: StateId) -> LookaheadId {
        self.lookahead.push(LookaheadPair { forward, backward });
        self.lookahead.len() - 1
    }

    pub fn eof_action(&mut self, state: LexState, action: ActionId) -> &mut Self {
        if self.eof.per_state.len() <= state.0 {
            self.eof.per_state.resize(state.0 + 1, None);
        }
        self.eof.per_state[state.0] = Some(action);
        self
    }

    pub fn eof_default(&mut self, action: ActionId) -> &mut Self {
        self.eof.default = Some(action);
        self
    }

    /// Pads rows to full width, shares identical rows and flags final states
    /// without outgoing edges as [`NO_LOOKAHEAD`].
    pub fn build(self) -> Result<DfaTable, TableError> {
        let instant = Instant::now();
        if self.n_classes > usize::from(u16::MAX) + 1 {
            return Err(TableError::TooManyClasses(self.n_classes));
        }
        let n_classes = self.n_classes;
        let n_states = self.rows.len();
        let mut attributes = self.attributes;
        let mut trans = Vec::<i32>::new();
        let mut row_map = Vec::<u32>::with_capacity(n_states);
        let mut offsets: HashMap<Vec<i32>, u32> = HashMap::new();

        for (s, mut row) in self.rows.into_iter().enumerate() {
            row.resize(n_classes, NO_TARGET);
            if attributes[s] & FINAL != 0 && row.iter().all(|&t| t == NO_TARGET) {
                attributes[s] |= NO_LOOKAHEAD;
            }
            let offset = match offsets.get(&row) {
                Some(&o) => o,
                None => {
                    let o = trans.len() as u32;
                    trans.extend_from_slice(&row);
                    offsets.insert(row, o);
                    o
                }
            };
            row_map.push(offset);
        }

        log::debug!(
            "[dfa_build] {} states, {} classes, {} distinct rows ({} trans entries) in {:.3}ms",
            n_states,
            n_classes,
            offsets.len(),
            trans.len(),
            instant.elapsed().as_secs_f64() * 1e3
        );

        DfaTable::new(DfaParts {
            n_classes,
            trans,
            row_map,
            attributes,
            cmap: self.cmap,
            state_action: self.state_action,
            lex_states: self.lex_states,
            lookahead: self.lookahead,
            actions: self.actions,
            eof: self.eof,
        })
    }
}

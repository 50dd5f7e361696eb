// src/lexer/tables/mod.rs
//! Immutable DFA description consumed by the scanner.
//!
//! Layout follows the classic compressed scanner tables:
//!  - `cmap[code point]` gives the character class (code points past the map are class 0)
//!  - `row_map[state]` is an offset into the flat `trans` array; the row is `n_classes` wide
//!  - `trans[row + class]` is the next state or [`NO_TARGET`]
//!  - `attributes[state]` carries [`FINAL`] / [`NO_LOOKAHEAD`]
//!  - `state_action[state]` names the action of an accepting state

pub mod build;
pub mod io;
pub mod pack;

use serde::{Deserialize, Serialize};

pub use build::DfaBuilder;
pub use io::{EmbeddedArray, EmbeddedTables, PackedTables, TablesMeta};
pub use pack::{Encoding, PackedArray, PackedChunk};

use super::error::TableError;

/// `trans` entry meaning "no outgoing edge".
pub const NO_TARGET: i32 = -1;
/// The state accepts.
pub const FINAL: u8 = 0x01;
/// Accepting state without outgoing edges: the match cannot get any longer.
pub const NO_LOOKAHEAD: u8 = 0x08;

pub type StateId = usize;
pub type ActionId = usize;
pub type LookaheadId = usize;

/// Index of a lexical state (start condition). `LexState::INITIAL` is always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LexState(pub usize);

impl LexState {
    pub const INITIAL: LexState = LexState(0);
}

/// Entry states of one lexical state; `bol` is used when the previous match ended a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexEntry {
    pub normal: StateId,
    pub bol: StateId,
}

/// Two automata resolving a general trailing context `r1/r2`:
/// `forward` recognizes `r1`, `backward` recognizes the reverse of `r2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookaheadPair {
    pub forward: StateId,
    pub backward: StateId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Lookahead {
    #[default]
    None,
    /// `r1` has a fixed length: the token is the first `n` characters.
    FixedBase(usize),
    /// `r2` has a fixed length: give back the last `n` characters.
    FixedLook(usize),
    /// Both sides are finite; the generator worked out the trailing length.
    FiniteChoice(usize),
    General(LookaheadId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Declaration order; lower wins when several rules accept in one state.
    pub priority: u32,
    #[serde(default)]
    pub lookahead: Lookahead,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EofActions {
    #[serde(default)]
    pub per_state: Vec<Option<ActionId>>,
    #[serde(default)]
    pub default: Option<ActionId>,
}

impl EofActions {
    pub fn lookup(&self, state: LexState) -> Option<ActionId> {
        self.per_state
            .get(state.0)
            .copied()
            .flatten()
            .or(self.default)
    }
}

/// Raw arrays of a table, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DfaParts {
    pub n_classes: usize,
    pub trans: Vec<i32>,
    pub row_map: Vec<u32>,
    pub attributes: Vec<u8>,
    pub cmap: Vec<u16>,
    pub state_action: Vec<Option<ActionId>>,
    pub lex_states: Vec<LexEntry>,
    pub lookahead: Vec<LookaheadPair>,
    pub actions: Vec<ActionSpec>,
    pub eof: EofActions,
}

#[derive(Debug, Clone)]
pub struct DfaTable {
    parts: DfaParts,
}

impl DfaTable {
    pub fn new(parts: DfaParts) -> Result<Self, TableError> {
        validate(&parts)?;
        Ok(Self { parts })
    }

    pub fn parts(&self) -> &DfaParts {
        &self.parts
    }

    pub fn into_parts(self) -> DfaParts {
        self.parts
    }

    pub fn n_states(&self) -> usize {
        self.parts.row_map.len()
    }

    pub fn n_classes(&self) -> usize {
        self.parts.n_classes
    }

    pub fn n_lex_states(&self) -> usize {
        self.parts.lex_states.len()
    }

    #[inline]
    pub fn class_of(&self, ch: char) -> usize {
        self.parts.cmap.get(ch as usize).map_or(0, |&c| usize::from(c))
    }

    #[inline]
    pub fn next_state_by_class(&self, state: StateId, class: usize) -> Option<StateId> {
        let t = self.parts.trans[self.parts.row_map[state] as usize + class];
        if t == NO_TARGET { None } else { Some(t as StateId) }
    }

    #[inline]
    pub fn next_state(&self, state: StateId, ch: char) -> Option<StateId> {
        self.next_state_by_class(state, self.class_of(ch))
    }

    #[inline]
    pub fn is_final(&self, state: StateId) -> bool {
        self.parts.attributes[state] & FINAL != 0
    }

    #[inline]
    pub fn is_no_lookahead(&self, state: StateId) -> bool {
        self.parts.attributes[state] & NO_LOOKAHEAD != 0
    }

    /// Action of an accepting state. States of lookahead automata accept without one.
    #[inline]
    pub fn action_of(&self, state: StateId) -> Option<ActionId> {
        if self.is_final(state) {
            self.parts.state_action[state]
        } else {
            None
        }
    }

    pub fn lexical_state(&self, state: LexState) -> Option<LexEntry> {
        self.parts.lex_states.get(state.0).copied()
    }

    pub fn lookahead(&self, id: LookaheadId) -> Option<LookaheadPair> {
        self.parts.lookahead.get(id).copied()
    }

    pub fn action(&self, id: ActionId) -> Option<&ActionSpec> {
        self.parts.actions.get(id)
    }

    pub fn actions(&self) -> &[ActionSpec] {
        &self.parts.actions
    }

    pub fn eof_action(&self, state: LexState) -> Option<ActionId> {
        self.parts.eof.lookup(state)
    }
}

fn validate(p: &DfaParts) -> Result<(), TableError> {
    let n_states = p.row_map.len();
    if n_states == 0 {
        return Err(TableError::NoStates);
    }
    if p.lex_states.is_empty() {
        return Err(TableError::NoLexicalStates);
    }
    for (what, actual) in [
        ("attributes", p.attributes.len()),
        ("state_action", p.state_action.len()),
    ] {
        if actual != n_states {
            return Err(TableError::LengthMismatch {
                what,
                expected: n_states,
                actual,
            });
        }
    }
    if p.n_classes > usize::from(u16::MAX) + 1 {
        return Err(TableError::TooManyClasses(p.n_classes));
    }
    if let Some((code, &class)) = p
        .cmap
        .iter()
        .enumerate()
        .find(|&(_, &c)| usize::from(c) >= p.n_classes.max(1))
    {
        return Err(TableError::BadClass {
            code,
            class: usize::from(class),
            n_classes: p.n_classes,
        });
    }
    let n_classes = p.n_classes.max(1);
    for (state, &offset) in p.row_map.iter().enumerate() {
        let offset = offset as usize;
        if offset + n_classes > p.trans.len() {
            return Err(TableError::RowOutOfRange {
                state,
                offset,
                len: p.trans.len(),
            });
        }
    }
    if let Some((index, &target)) = p
        .trans
        .iter()
        .enumerate()
        .find(|&(_, &t)| t != NO_TARGET && (t < 0 || t as usize >= n_states))
    {
        return Err(TableError::BadTarget {
            index,
            target: i64::from(target),
        });
    }

    let check_state = |what: &'static str, state: StateId| {
        if state < n_states {
            Ok(())
        } else {
            Err(TableError::UnknownState { what, state })
        }
    };
    for e in &p.lex_states {
        check_state("lexical state entry", e.normal)?;
        check_state("lexical state entry", e.bol)?;
    }
    for pair in &p.lookahead {
        check_state("lookahead automaton", pair.forward)?;
        check_state("lookahead automaton", pair.backward)?;
    }

    let check_action = |what: &'static str, action: ActionId| {
        if action < p.actions.len() {
            Ok(())
        } else {
            Err(TableError::UnknownAction { what, action })
        }
    };
    for a in p.state_action.iter().flatten() {
        check_action("state_action", *a)?;
    }
    for a in p.eof.per_state.iter().flatten() {
        check_action("eof action", *a)?;
    }
    if let Some(a) = p.eof.default {
        check_action("default eof action", a)?;
    }
    for (action, spec) in p.actions.iter().enumerate() {
        if let Lookahead::General(id) = spec.lookahead {
            if id >= p.lookahead.len() {
                return Err(TableError::UnknownLookahead { action, id });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // one state, one class, loops on itself
    fn tiny() -> DfaParts {
        DfaParts {
            n_classes: 1,
            trans: vec![0],
            row_map: vec![0],
            attributes: vec![FINAL],
            cmap: vec![],
            state_action: vec![Some(0)],
            lex_states: vec![LexEntry { normal: 0, bol: 0 }],
            lookahead: vec![],
            actions: vec![ActionSpec {
                priority: 0,
                lookahead: Lookahead::None,
            }],
            eof: EofActions::default(),
        }
    }

    #[test]
    fn accepts_minimal_table() {
        let t = DfaTable::new(tiny()).expect("valid");
        assert_eq!(t.next_state(0, 'x'), Some(0));
        assert_eq!(t.action_of(0), Some(0));
        assert_eq!(t.class_of('\u{10FFFF}'), 0);
    }

    #[test]
    fn rejects_bad_target() {
        let mut p = tiny();
        p.trans = vec![3];
        assert!(matches!(DfaTable::new(p), Err(TableError::BadTarget { target: 3, .. })));
    }

    #[test]
    fn rejects_row_past_end() {
        let mut p = tiny();
        p.n_classes = 2;
        p.cmap = vec![1];
        assert!(matches!(DfaTable::new(p), Err(TableError::RowOutOfRange { .. })));
    }

    #[test]
    fn rejects_unknown_action_and_lookahead() {
        let mut p = tiny();
        p.state_action = vec![Some(5)];
        assert!(matches!(DfaTable::new(p), Err(TableError::UnknownAction { action: 5, .. })));

        let mut p = tiny();
        p.actions[0].lookahead = Lookahead::General(0);
        assert!(matches!(DfaTable::new(p), Err(TableError::UnknownLookahead { .. })));
    }

    #[test]
    fn eof_lookup_falls_back_to_default() {
        let eof = EofActions {
            per_state: vec![None, Some(2)],
            default: Some(1),
        };
        assert_eq!(eof.lookup(LexState(0)), Some(1));
        assert_eq!(eof.lookup(LexState(1)), Some(2));
        assert_eq!(eof.lookup(LexState(7)), Some(1));
    }
}

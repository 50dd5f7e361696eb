// src/dev/grammars.rs
//! Hand-built tables for the demo binaries and the tests.

use crate::lexer::{
    error::{ScanError, TableError},
    scanner::{Actions, ScanState, Step},
    tables::{ActionId, DfaBuilder, DfaTable, LexState, Lookahead},
};

/// Matched text plus the position of its first character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub action: ActionId,
    pub text: String,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Lexeme {
    pub fn of(action: ActionId, yy: &ScanState) -> Self {
        Self {
            action,
            text: yy.text(),
            line: yy.line(),
            column: yy.column(),
            offset: yy.char_offset(),
        }
    }
}

/// Turns every match into a [`Lexeme`], except for the actions in `skip`.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    pub skip: Vec<ActionId>,
    pub eof_hooks: usize,
}

impl Recorder {
    pub fn skipping(skip: &[ActionId]) -> Self {
        Self {
            skip: skip.to_vec(),
            eof_hooks: 0,
        }
    }
}

impl Actions for Recorder {
    type Token = Lexeme;

    fn on_match(&mut self, action: ActionId, yy: &mut ScanState) -> Result<Step<Lexeme>, ScanError> {
        if self.skip.contains(&action) {
            Ok(Step::Continue)
        } else {
            Ok(Step::Token(Lexeme::of(action, yy)))
        }
    }

    fn end_of_stream(&mut self, _yy: &mut ScanState) -> Result<(), ScanError> {
        self.eof_hooks += 1;
        Ok(())
    }
}

/// `"a"` (action 0) and `"a"+` (action 1).
pub fn a_runs() -> Result<DfaTable, TableError> {
    let mut b = DfaBuilder::new();
    let a = b.chars("a");
    let one = b.action(Lookahead::None);
    let many = b.action(Lookahead::None);
    let s0 = b.state();
    let s1 = b.state();
    let s2 = b.state();
    b.edge(s0, a, s1).edge(s1, a, s2).edge(s2, a, s2);
    b.accept(s1, one).accept(s2, many);
    b.lexical_state(s0, s0);
    b.build()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailKind {
    General,
    FixedLook,
    FiniteChoice,
}

/// `"a"+ / "b"` (action 0), optionally followed by a plain `"a"+` rule (action 1).
pub fn a_before_b(kind: TrailKind, with_fallback: bool) -> Result<DfaTable, TableError> {
    let mut b = DfaBuilder::new();
    let a = b.chars("a");
    let bee = b.chars("b");

    let m0 = b.state();
    let m1 = b.state();
    let m2 = b.state();
    b.edge(m0, a, m1).edge(m1, a, m1).edge(m1, bee, m2);

    let lookahead = match kind {
        TrailKind::General => {
            // forward: a+, backward: reverse("b")
            let f0 = b.state();
            let f1 = b.state();
            b.edge(f0, a, f1).edge(f1, a, f1).mark_final(f1);
            let k0 = b.state();
            let k1 = b.state();
            b.edge(k0, bee, k1).mark_final(k1);
            Lookahead::General(b.lookahead_pair(f0, k0))
        }
        TrailKind::FixedLook => Lookahead::FixedLook(1),
        TrailKind::FiniteChoice => Lookahead::FiniteChoice(1),
    };
    let trail = b.action(lookahead);
    b.accept(m2, trail);
    if with_fallback {
        let plain = b.action(Lookahead::None);
        b.accept(m1, plain);
    }
    b.lexical_state(m0, m0);
    b.build()
}

/// `"ab" / "c"+` (action 0, fixed base of 2) and `"c"` (action 1).
pub fn ab_before_cs() -> Result<DfaTable, TableError> {
    let mut b = DfaBuilder::new();
    let a = b.chars("a");
    let bee = b.chars("b");
    let c = b.chars("c");
    let head = b.action(Lookahead::FixedBase(2));
    let single = b.action(Lookahead::None);
    let s0 = b.state();
    let s1 = b.state();
    let s2 = b.state();
    let s3 = b.state();
    let s4 = b.state();
    b.edge(s0, a, s1).edge(s1, bee, s2).edge(s2, c, s3).edge(s3, c, s3);
    b.edge(s0, c, s4);
    b.accept(s3, head).accept(s4, single);
    b.lexical_state(s0, s0);
    b.build()
}

/// Action ids of [`line_breaks`].
pub mod line_action {
    use crate::lexer::tables::ActionId;

    pub const WORD: ActionId = 0;
    pub const CR: ActionId = 1;
    pub const LF: ActionId = 2;
    pub const OTHER_BREAK: ActionId = 3;
    pub const SPACE: ActionId = 4;
    pub const BOL_HASH: ActionId = 5;
    pub const HASH: ActionId = 6;
}

/// Words, single CR, single LF, the other line terminators, spaces, and `#`
/// (a different action when it starts a line).
pub fn line_breaks() -> Result<DfaTable, TableError> {
    let mut b = DfaBuilder::new();
    let letter = b.class(['a'..='z', 'A'..='Z']);
    let cr = b.chars("\r");
    let lf = b.chars("\n");
    let other = b.chars("\u{000B}\u{000C}\u{0085}\u{2028}\u{2029}");
    let space = b.chars(" ");
    let hash = b.chars("#");

    let word = b.action(Lookahead::None);
    let a_cr = b.action(Lookahead::None);
    let a_lf = b.action(Lookahead::None);
    let a_other = b.action(Lookahead::None);
    let a_space = b.action(Lookahead::None);
    let bol_hash = b.action(Lookahead::None);
    let plain_hash = b.action(Lookahead::None);

    let normal = b.state();
    let bol = b.state();
    let w = b.state();
    let c = b.state();
    let l = b.state();
    let o = b.state();
    let sp = b.state();
    let hb = b.state();
    let hn = b.state();
    for entry in [normal, bol] {
        b.edge(entry, letter, w)
            .edge(entry, cr, c)
            .edge(entry, lf, l)
            .edge(entry, other, o)
            .edge(entry, space, sp);
    }
    b.edge(bol, hash, hb).edge(normal, hash, hn);
    b.edge(w, letter, w).edge(sp, space, sp);
    b.accept(w, word)
        .accept(c, a_cr)
        .accept(l, a_lf)
        .accept(o, a_other)
        .accept(sp, a_space)
        .accept(hb, bol_hash)
        .accept(hn, plain_hash);
    b.lexical_state(normal, bol);
    b.build()
}

pub const INITIAL: LexState = LexState::INITIAL;
pub const COMMENT: LexState = LexState(1);

/// Action ids of [`calc_table`].
pub mod calc_action {
    use crate::lexer::tables::ActionId;

    pub const IDENT: ActionId = 0;
    pub const CALL: ActionId = 1;
    pub const INT: ActionId = 2;
    pub const SPACE: ActionId = 3;
    pub const NEWLINE: ActionId = 4;
    pub const PLUS: ActionId = 5;
    pub const MINUS: ActionId = 6;
    pub const STAR: ActionId = 7;
    pub const SLASH: ActionId = 8;
    pub const ASSIGN: ActionId = 9;
    pub const LPAREN: ActionId = 10;
    pub const RPAREN: ActionId = 11;
    pub const COMMENT_OPEN: ActionId = 12;
    pub const COMMENT_CLOSE: ActionId = 13;
    pub const COMMENT_BODY: ActionId = 14;
    pub const DIRECTIVE: ActionId = 15;
    pub const COMMENT_EOF: ActionId = 16;
}

/// A small expression language:
///   identifiers, integers, `+ - * / = ( )`, newlines (`\n`, `\r\n`, `\r`),
///   `name(` reported as a call of `name` (trailing context),
///   `#...` directives at the start of a line,
///   `/* ... */` comments scanned in their own lexical state.
pub fn calc_table() -> Result<DfaTable, TableError> {
    use calc_action as act;

    let mut b = DfaBuilder::new();
    let letter = b.class(['a'..='z', 'A'..='Z', '_'..='_']);
    let digit = b.class(['0'..='9']);
    let space = b.chars(" \t");
    let cr = b.chars("\r");
    let lf = b.chars("\n");
    let plus = b.chars("+");
    let minus = b.chars("-");
    let star = b.chars("*");
    let slash = b.chars("/");
    let eq = b.chars("=");
    let lp = b.chars("(");
    let rp = b.chars(")");
    let hash = b.chars("#");

    // identifier followed by "(": forward automaton for the name, backward for "("
    let f0 = b.state();
    let f1 = b.state();
    b.edge(f0, letter, f1).edges(f1, &[letter, digit], f1).mark_final(f1);
    let k0 = b.state();
    let k1 = b.state();
    b.edge(k0, lp, k1).mark_final(k1);
    let call_ctx = b.lookahead_pair(f0, k0);

    for (id, lookahead) in [
        (act::IDENT, Lookahead::None),
        (act::CALL, Lookahead::General(call_ctx)),
    ]
    .into_iter()
    .chain((act::INT..=act::COMMENT_EOF).map(|id| (id, Lookahead::None)))
    {
        let got = b.action(lookahead);
        debug_assert_eq!(got, id);
    }

    let normal = b.state();
    let bol = b.state();
    let ident = b.state();
    let call = b.state();
    let int = b.state();
    let ws = b.state();
    let cr1 = b.state();
    let nl = b.state();
    let p = b.state();
    let m = b.state();
    let st = b.state();
    let sl = b.state();
    let e = b.state();
    let l = b.state();
    let r = b.state();
    let open = b.state();
    let dir = b.state();
    for entry in [normal, bol] {
        b.edge(entry, letter, ident)
            .edge(entry, digit, int)
            .edge(entry, space, ws)
            .edge(entry, cr, cr1)
            .edge(entry, lf, nl)
            .edge(entry, plus, p)
            .edge(entry, minus, m)
            .edge(entry, star, st)
            .edge(entry, slash, sl)
            .edge(entry, eq, e)
            .edge(entry, lp, l)
            .edge(entry, rp, r);
    }
    b.edge(bol, hash, dir);
    b.edges(ident, &[letter, digit], ident).edge(ident, lp, call);
    b.edge(int, digit, int);
    b.edge(ws, space, ws);
    b.edge(cr1, lf, nl);
    b.edge(sl, star, open);
    b.edges_except(dir, &[cr, lf], dir);
    b.accept(ident, act::IDENT)
        .accept(call, act::CALL)
        .accept(int, act::INT)
        .accept(ws, act::SPACE)
        .accept(cr1, act::NEWLINE)
        .accept(nl, act::NEWLINE)
        .accept(p, act::PLUS)
        .accept(m, act::MINUS)
        .accept(st, act::STAR)
        .accept(sl, act::SLASH)
        .accept(e, act::ASSIGN)
        .accept(l, act::LPAREN)
        .accept(r, act::RPAREN)
        .accept(open, act::COMMENT_OPEN)
        .accept(dir, act::DIRECTIVE);

    let c0 = b.state();
    let cstar = b.state();
    let cbody = b.state();
    let close = b.state();
    b.edges_except(c0, &[star], cbody).edge(c0, star, cstar);
    b.edge(cstar, slash, close);
    b.accept(cbody, act::COMMENT_BODY)
        .accept(cstar, act::COMMENT_BODY)
        .accept(close, act::COMMENT_CLOSE);

    let initial = b.lexical_state(normal, bol);
    let comment = b.lexical_state(c0, c0);
    debug_assert_eq!((initial, comment), (INITIAL, COMMENT));
    b.eof_action(COMMENT, act::COMMENT_EOF);
    b.build()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalcKind {
    Ident,
    Call,
    Int,
    Newline,
    Plus,
    Minus,
    Star,
    Slash,
    Assign,
    LParen,
    RParen,
    Directive,
    UnterminatedComment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalcToken {
    pub kind: CalcKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

/// Actions for [`calc_table`]: skips blanks and comments, reports everything else.
#[derive(Debug, Clone, Default)]
pub struct CalcActions {
    pub comments: usize,
    pub eof_hooks: usize,
}

impl Actions for CalcActions {
    type Token = CalcToken;

    fn on_match(&mut self, action: ActionId, yy: &mut ScanState) -> Result<Step<CalcToken>, ScanError> {
        use calc_action as act;
        let kind = match action {
            act::IDENT => CalcKind::Ident,
            act::CALL => CalcKind::Call,
            act::INT => CalcKind::Int,
            act::NEWLINE => CalcKind::Newline,
            act::PLUS => CalcKind::Plus,
            act::MINUS => CalcKind::Minus,
            act::STAR => CalcKind::Star,
            act::SLASH => CalcKind::Slash,
            act::ASSIGN => CalcKind::Assign,
            act::LPAREN => CalcKind::LParen,
            act::RPAREN => CalcKind::RParen,
            act::DIRECTIVE => CalcKind::Directive,
            act::SPACE | act::COMMENT_BODY => return Ok(Step::Continue),
            act::COMMENT_OPEN => {
                self.comments += 1;
                yy.begin(COMMENT)?;
                return Ok(Step::Continue);
            }
            act::COMMENT_CLOSE => {
                yy.begin(INITIAL)?;
                return Ok(Step::Continue);
            }
            act::COMMENT_EOF => {
                // back to INITIAL so the next call ends the stream
                yy.begin(INITIAL)?;
                CalcKind::UnterminatedComment
            }
            other => {
                return Err(ScanError::InvalidArgument(format!(
                    "calc table has no action {other}"
                )));
            }
        };
        Ok(Step::Token(CalcToken {
            kind,
            text: yy.text(),
            line: yy.line(),
            column: yy.column(),
            offset: yy.char_offset(),
        }))
    }

    fn end_of_stream(&mut self, _yy: &mut ScanState) -> Result<(), ScanError> {
        self.eof_hooks += 1;
        Ok(())
    }
}

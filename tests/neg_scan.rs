// Failure paths: inputs no rule covers, misuse from inside actions, closed
// scanners, failing sources and tables that cannot be loaded.

use std::{io, sync::Arc};

use dfascan::{
    dev::grammars::{Lexeme, Recorder, a_runs, line_action, line_breaks},
    lexer::{
        ActionId,
        Actions,
        CharSource,
        DfaTable,
        LexState,
        ScanError,
        ScanState,
        Scanner,
        Step,
        StrSource,
        TableError,
        tables::{DfaBuilder, Lookahead, io::load_tables_json_bytes},
    },
};

fn lines() -> Arc<DfaTable> {
    Arc::new(line_breaks().expect("table"))
}

#[test]
fn no_match_reports_position() {
    let mut s = Scanner::new(lines(), StrSource::new("ab\n cd\n  %"), Recorder::default());
    let mut seen = 0;
    let err = loop {
        match s.next_token() {
            Ok(Some(_)) => seen += 1,
            Ok(None) => panic!("'%' has no rule"),
            Err(e) => break e,
        }
    };
    assert_eq!(seen, 6);
    match err {
        ScanError::NoMatch {
            line,
            column,
            char_offset,
        } => assert_eq!((line, column, char_offset), (2, 2, 9)),
        other => panic!("expected NoMatch, got {other:?}"),
    }
}

#[test]
fn skip_unmatched_recovers() {
    let mut s = Scanner::new(lines(), StrSource::new("ab%cd"), Recorder::default());
    assert!(s.skip_unmatched().is_none(), "nothing buffered yet");
    let ab = s.next_token().expect("scan").expect("token");
    assert_eq!(ab.text, "ab");
    assert!(s.skip_unmatched().is_none(), "last call matched");

    assert!(matches!(s.next_token(), Err(ScanError::NoMatch { char_offset: 2, .. })));
    assert_eq!(s.skip_unmatched(), Some('%'));

    let cd: Lexeme = s.next_token().expect("scan").expect("token");
    assert_eq!((cd.action, cd.text.as_str()), (line_action::WORD, "cd"));
    assert_eq!((cd.column, cd.offset), (3, 3));
    assert!(s.next_token().expect("scan").is_none());
}

#[test]
fn iterator_stops_after_first_error() {
    let s = Scanner::new(lines(), StrSource::new("a%b"), Recorder::default());
    let items: Vec<Result<Lexeme, ScanError>> = s.collect();
    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert!(matches!(items[1], Err(ScanError::NoMatch { .. })));
}

#[test]
fn pushback_longer_than_match_is_rejected() {
    let actions = |_id: ActionId, yy: &mut ScanState| -> Result<Step<()>, ScanError> {
        let n = yy.len();
        yy.pushback(n + 1)?;
        Ok(Step::Token(()))
    };
    let mut s = Scanner::new(Arc::new(a_runs().expect("table")), StrSource::new("aa"), actions);
    assert!(matches!(s.next_token(), Err(ScanError::InvalidArgument(_))));
}

#[test]
fn begin_rejects_unknown_lexical_state() {
    let actions = |_id: ActionId, yy: &mut ScanState| -> Result<Step<()>, ScanError> {
        yy.begin(LexState(7))?;
        Ok(Step::Token(()))
    };
    let mut s = Scanner::new(Arc::new(a_runs().expect("table")), StrSource::new("a"), actions);
    match s.next_token() {
        Err(ScanError::InvalidArgument(msg)) => assert!(msg.contains("lexical state 7"), "{msg}"),
        other => panic!("expected InvalidArgument, got {other:?}"),
    }
    assert_eq!(s.state().lexical_state(), LexState::INITIAL);
}

#[test]
fn closed_scanner_refuses_to_scan() {
    let mut s = Scanner::new(lines(), StrSource::new("ab cd"), Recorder::default());
    assert!(s.next_token().expect("scan").is_some());
    s.close().expect("close");
    assert!(matches!(s.next_token(), Err(ScanError::Closed)));
    assert!(matches!(s.next_token(), Err(ScanError::Closed)));

    // closing from inside an action
    let actions = |_id: ActionId, yy: &mut ScanState| -> Result<Step<String>, ScanError> {
        let t = yy.text();
        yy.close()?;
        Ok(Step::Token(t))
    };
    let mut s = Scanner::new(lines(), StrSource::new("ab cd"), actions);
    assert_eq!(s.next_token().expect("scan").as_deref(), Some("ab"));
    assert!(s.state().at_eof());
    let rest: Vec<Result<String, ScanError>> = s.collect();
    assert!(matches!(rest.as_slice(), [Err(ScanError::Closed)]));
}

struct FailAfter {
    text: Vec<char>,
    served: bool,
}

impl CharSource for FailAfter {
    fn read(&mut self, buf: &mut [char]) -> io::Result<usize> {
        if self.served {
            return Err(io::Error::other("device gone"));
        }
        self.served = true;
        let n = buf.len().min(self.text.len());
        buf[..n].copy_from_slice(&self.text[..n]);
        Ok(n)
    }
}

#[test]
fn source_errors_surface_as_io() {
    let src = FailAfter {
        text: "ab".chars().collect(),
        served: false,
    };
    let mut s = Scanner::new(lines(), src, Recorder::default());
    match s.next_token() {
        Err(ScanError::Io(e)) => assert_eq!(e.to_string(), "device gone"),
        other => panic!("expected an I/O error, got {other:?}"),
    }
}

#[test]
fn end_of_stream_error_is_not_retried() {
    struct Grumpy {
        hooks: usize,
    }
    impl Actions for Grumpy {
        type Token = String;
        fn on_match(&mut self, _id: ActionId, yy: &mut ScanState) -> Result<Step<String>, ScanError> {
            Ok(Step::Token(yy.text()))
        }
        fn end_of_stream(&mut self, _yy: &mut ScanState) -> Result<(), ScanError> {
            self.hooks += 1;
            Err(ScanError::InvalidArgument("unexpected end of input".to_string()))
        }
    }
    let mut s = Scanner::new(Arc::new(a_runs().expect("table")), StrSource::new("aa"), Grumpy { hooks: 0 });
    assert_eq!(s.next_token().expect("scan").as_deref(), Some("aa"));
    assert!(matches!(s.next_token(), Err(ScanError::InvalidArgument(_))));
    assert!(s.next_token().expect("scan").is_none());
    assert_eq!(s.actions().hooks, 1);
}

#[test]
fn impossible_trailing_context_is_reported() {
    // "ab" with a fixed base of 5: the base is longer than anything the rule matches
    let mut b = DfaBuilder::new();
    let a = b.chars("a");
    let bee = b.chars("b");
    let broken = b.action(Lookahead::FixedBase(5));
    let s0 = b.state();
    let s1 = b.state();
    let s2 = b.state();
    b.edge(s0, a, s1).edge(s1, bee, s2).accept(s2, broken);
    b.lexical_state(s0, s0);
    let table = Arc::new(b.build().expect("table"));

    let mut s = Scanner::new(table, StrSource::new("ab"), Recorder::default());
    assert!(matches!(
        s.next_token(),
        Err(ScanError::BrokenLookahead { action }) if action == broken
    ));
}

#[test]
fn huge_fixed_base_after_earlier_tokens_is_reported() {
    let mut b = DfaBuilder::new();
    let a = b.chars("a");
    let x = b.chars("x");
    let huge = b.action(Lookahead::FixedBase(usize::MAX));
    let plain = b.action(Lookahead::None);
    let s0 = b.state();
    let s1 = b.state();
    let s2 = b.state();
    b.edge(s0, a, s1).accept(s1, huge);
    b.edge(s0, x, s2).accept(s2, plain);
    b.lexical_state(s0, s0);
    let table = Arc::new(b.build().expect("table"));

    let mut s = Scanner::new(table, StrSource::new("xa"), Recorder::default());
    assert_eq!(s.next_token().expect("scan").map(|t| t.action), Some(plain));
    assert!(matches!(
        s.next_token(),
        Err(ScanError::BrokenLookahead { action }) if action == huge
    ));
}

// `"a"*`: the entry state accepts the empty match
fn a_star() -> Arc<DfaTable> {
    let mut b = DfaBuilder::new();
    let a = b.chars("a");
    let star = b.action(Lookahead::None);
    let s0 = b.state();
    let s1 = b.state();
    b.edge(s0, a, s1).edge(s1, a, s1);
    b.accept(s0, star).accept(s1, star);
    b.lexical_state(s0, s0);
    b.eof_default(star);
    Arc::new(b.build().expect("table"))
}

#[test]
fn skipping_an_empty_match_reports_no_match() {
    let skip_all = |_id: ActionId, _yy: &mut ScanState| -> Result<Step<()>, ScanError> { Ok(Step::Continue) };
    let mut s = Scanner::new(a_star(), StrSource::new("aab"), skip_all);
    assert!(matches!(s.next_token(), Err(ScanError::NoMatch { char_offset: 2, .. })));
    assert_eq!(s.skip_unmatched(), Some('b'));
    // the eof action skips too and nothing switches state: the stream ends
    assert!(s.next_token().expect("scan").is_none());
}

#[test]
fn skip_unmatched_needs_a_failed_call() {
    // the first match is given back whole but still reported
    let mut calls = 0;
    let actions = move |_id: ActionId, yy: &mut ScanState| -> Result<Step<String>, ScanError> {
        calls += 1;
        if calls == 1 {
            let n = yy.len();
            yy.pushback(n)?;
        }
        Ok(Step::Token(yy.text()))
    };
    let mut s = Scanner::new(lines(), StrSource::new("ab"), actions);
    assert_eq!(s.next_token().expect("scan").as_deref(), Some(""));
    assert_eq!(s.skip_unmatched(), None);
    assert_eq!(s.next_token().expect("scan").as_deref(), Some("ab"));
}

#[test]
fn table_without_lexical_states_is_rejected() {
    let mut b = DfaBuilder::new();
    let a = b.chars("a");
    let s0 = b.state();
    b.edge(s0, a, s0);
    assert!(matches!(b.build(), Err(TableError::NoLexicalStates)));
}

#[test]
fn garbage_json_is_rejected() {
    assert!(matches!(
        load_tables_json_bytes(b"{\"n_classes\": 2"),
        Err(TableError::Json(_))
    ));
    assert!(matches!(load_tables_json_bytes(b"[]"), Err(TableError::Json(_))));
}

// src/dev/generator.rs
// Random-but-valid inputs for the calc grammar in `dev::grammars`.
// Every output scans without a NoMatch error: '#' only ever starts a line and
// comments only contain characters the comment state accepts.

use rand::Rng;

pub fn gen_valid_source<R: Rng>(rng: &mut R, target_len: usize) -> String {
    let mut out = String::with_capacity(target_len + target_len / 8);

    while out.len() < target_len {
        let at_line_start = out.is_empty() || out.ends_with('\n') || out.ends_with('\r');
        let roll = rng.random_range(0u32..100);

        match roll {
            0..=21 => push_ident(rng, &mut out),          // ~22%
            22..=29 => push_call(rng, &mut out),          // ~8%
            30..=41 => push_int(rng, &mut out),           // ~12%
            42..=54 => push_ws(rng, &mut out),            // ~13%
            55..=64 => push_newline(rng, &mut out),       // ~10%
            65..=71 => push_block_comment(rng, &mut out), // ~7%
            72..=76 if at_line_start => push_directive(rng, &mut out),
            72..=76 => push_newline(rng, &mut out),
            77..=99 => push_operator(rng, &mut out), // ~23%
            _ => unreachable!(),
        }
    }
    out
}

fn push_ident<R: Rng>(rng: &mut R, out: &mut String) {
    let len = rng.random_range(1..=12);
    out.push(random_alpha(rng));
    for _ in 1..len {
        if rng.random_bool(0.6) {
            out.push(random_alpha(rng));
        } else {
            out.push(random_digit(rng));
        }
    }
}

fn push_call<R: Rng>(rng: &mut R, out: &mut String) {
    push_ident(rng, out);
    out.push('(');
    if rng.random_bool(0.5) {
        push_int(rng, out);
    }
    out.push(')');
}

fn push_int<R: Rng>(rng: &mut R, out: &mut String) {
    let len = rng.random_range(1..=8);
    for _ in 0..len {
        out.push(random_digit(rng));
    }
}

fn push_ws<R: Rng>(rng: &mut R, out: &mut String) {
    let len = rng.random_range(1..=6);
    for _ in 0..len {
        out.push(if rng.random_bool(0.8) { ' ' } else { '\t' });
    }
}

fn push_newline<R: Rng>(rng: &mut R, out: &mut String) {
    let opts = ["\n", "\r\n", "\r"];
    out.push_str(opts[rng.random_range(0..opts.len())]);
}

fn push_directive<R: Rng>(rng: &mut R, out: &mut String) {
    out.push('#');
    let len = rng.random_range(0..=24);
    for _ in 0..len {
        out.push(random_text_char(rng));
    }
    push_newline(rng, out);
}

fn push_block_comment<R: Rng>(rng: &mut R, out: &mut String) {
    out.push_str("/*");
    let chunks = rng.random_range(0..=10);
    for _ in 0..chunks {
        let k = rng.random_range(1..=8);
        for _ in 0..k {
            out.push(random_text_char(rng));
        }
        if rng.random_bool(0.2) {
            out.push('*');
        }
        if rng.random_bool(0.2) {
            push_newline(rng, out);
        }
    }
    out.push_str("*/");
}

fn push_operator<R: Rng>(rng: &mut R, out: &mut String) {
    let ops = ["(", ")", "+", "-", "*", "=", "/"];
    let op = ops[rng.random_range(0..ops.len())];
    out.push_str(op);
    // keep a lone '/' from opening a comment
    if op == "/" || rng.random_bool(0.25) {
        out.push(' ');
    }
}

// letters, digits, a few symbols, and characters outside the BMP
fn random_text_char<R: Rng>(rng: &mut R) -> char {
    const SET: &[char] = &[
        'a', 'b', 'x', 'Z', '0', '7', ' ', '+', '(', '#', '\u{e9}', '\u{3bb}', '\u{2713}',
        '\u{1d11e}',
    ];
    SET[rng.random_range(0..SET.len())]
}

fn random_alpha<R: Rng>(rng: &mut R) -> char {
    let set = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_";
    set[rng.random_range(0..set.len())] as char
}

fn random_digit<R: Rng>(rng: &mut R) -> char {
    let set = b"0123456789";
    set[rng.random_range(0..set.len())] as char
}

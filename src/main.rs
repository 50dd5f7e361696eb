// src/main.rs
use std::sync::Arc;

use anyhow::{Result, anyhow};
use dfascan::{
    dev::{
        grammars::{CalcActions, calc_table},
        logging::setup_logging,
    },
    lexer::{ScannerConfig, Scanner, StrSource, tables::PackedTables},
};

fn main() -> Result<()> {
    setup_logging(2).map_err(|e| anyhow!("logging setup failed: {e}"))?;

    // Pack and decode the table the way generated code would at start-up.
    let packed = PackedTables::pack(&calc_table()?)?;
    let table = Arc::new(packed.unpack()?);
    println!(
        "[dfascan] {} states, {} classes, {} packed chunk(s)",
        table.n_states(),
        table.n_classes(),
        packed.chunk_count()
    );

    // Identifiers, calls, ints, a directive, CRLF line ends and a comment spanning lines.
    let src = "#pragma demo\r\nfoo = 12 + bar(7)\r\nbaz=3/*multi\nline*/+qux\n";

    let mut scanner = Scanner::with_config(
        table,
        StrSource::new(src),
        CalcActions::default(),
        &ScannerConfig::from_env(),
    );
    println!("TOKENS:");
    for tok in &mut scanner {
        match tok {
            Ok(t) => println!("{:>3}:{:<3} {:?}  {:?}", t.line + 1, t.column + 1, t.kind, t.text),
            Err(e) => {
                eprintln!("scan error: {e}");
                break;
            }
        }
    }
    println!(
        "[dfascan] {} line(s), {} comment(s)",
        scanner.state().line() + 1,
        scanner.actions().comments
    );
    Ok(())
}

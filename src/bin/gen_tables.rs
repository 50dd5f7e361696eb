// src/bin/gen_tables.rs
// Pack a scanner table description into a Rust module of string constants.
// Usage:
//   cargo run --bin gen_tables -- <tables.json> [out.rs]   # default out: tables/scanner_tables.rs
//   cargo run --bin gen_tables -- calc [out.rs]            # the built-in sample grammar
//   GEN_TABLES_JSON=path.json also writes the (unpacked) JSON description.

use std::{env, fs, path::Path};

use anyhow::{Context, Result, anyhow, bail};
use dfascan::{
    dev::{grammars::calc_table, logging::setup_logging},
    lexer::tables::{
        DfaTable,
        PackedTables,
        io::{load_tables_json_bytes, render_rust_module, save_tables_json},
    },
};

fn load_input(arg: &str) -> Result<DfaTable> {
    if arg == "calc" {
        return Ok(calc_table()?);
    }
    let bytes = fs::read(arg).with_context(|| format!("failed to read {arg}"))?;
    load_tables_json_bytes(&bytes).with_context(|| format!("invalid table description in {arg}"))
}

fn main() -> Result<()> {
    setup_logging(2).map_err(|e| anyhow!("logging setup failed: {e}"))?;

    let mut args = env::args().skip(1);
    let Some(input) = args.next() else {
        bail!("usage: gen_tables <tables.json|calc> [out.rs]");
    };
    let out = args
        .next()
        .unwrap_or_else(|| "tables/scanner_tables.rs".to_string());
    let out_path = Path::new(&out);

    println!("[gen_tables] loading {input}…");
    let table = load_input(&input)?;

    if let Ok(json_out) = env::var("GEN_TABLES_JSON") {
        save_tables_json(Path::new(&json_out), &table)
            .with_context(|| format!("failed to write {json_out}"))?;
        println!("[gen_tables] wrote {json_out}");
    }

    let packed = PackedTables::pack(&table)?;
    let module = render_rust_module(&packed)?;
    println!(
        "[gen_tables] {} states, {} classes, {} trans entries -> {} chunk(s), {} bytes of source",
        table.n_states(),
        table.n_classes(),
        table.parts().trans.len(),
        packed.chunk_count(),
        module.len()
    );

    // sanity: what we emit must decode to the same table
    if packed.unpack()?.parts() != table.parts() {
        bail!("packed tables do not decode back to the input");
    }

    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    fs::write(out_path, module).with_context(|| format!("failed to write {}", out_path.display()))?;
    println!("[gen_tables] wrote {}", out_path.display());
    Ok(())
}

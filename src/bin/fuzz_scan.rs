// src/bin/fuzz_scan.rs
// Generate random-but-valid calc inputs and scan each one twice: once from memory
// with the default buffer, once through a source that hands out a few characters
// per read into a tiny buffer. Both token streams must be identical.
// Extras:
//   - FUZZ_LEN / FUZZ_ITERS / FUZZ_SEED   size, iteration count, rng seed
//   - FUZZ_SAVE=1 and FUZZ_DIR=...        save every generated case
//   - FUZZ_INPUT=path                     replay a saved case

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use anyhow::{Context, Result, anyhow, bail};
use dfascan::{
    dev::{
        generator::gen_valid_source,
        grammars::{CalcActions, CalcToken, calc_table},
        logging::setup_logging,
    },
    lexer::{ChunkedSource, DfaTable, ScanError, Scanner, ScannerConfig, StrSource},
};
use rand::{Rng, SeedableRng, rngs::StdRng};

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn scan_all(
    table: &Arc<DfaTable>,
    src: &str,
    per_read: Option<usize>,
    buffer_size: usize,
) -> Result<Vec<CalcToken>, ScanError> {
    let config = ScannerConfig {
        buffer_size,
        ..Default::default()
    };
    let actions = CalcActions::default();
    match per_read {
        None => Scanner::with_config(table.clone(), StrSource::new(src), actions, &config).collect(),
        Some(n) => Scanner::with_config(
            table.clone(),
            ChunkedSource::new(StrSource::new(src), n),
            actions,
            &config,
        )
        .collect(),
    }
}

fn first_divergence_idx(a: &[CalcToken], b: &[CalcToken]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn run_once(table: &Arc<DfaTable>, src: &str, per_read: usize, buffer_size: usize) -> Result<bool> {
    let t0 = Instant::now();
    let whole = scan_all(table, src, None, 16384).context("whole-input scan failed")?;
    let t1 = Instant::now();
    let streamed =
        scan_all(table, src, Some(per_read), buffer_size).context("streamed scan failed")?;
    let t2 = Instant::now();

    let eq = whole == streamed;
    eprintln!(
        "[fuzz] {} chars | whole {} ms | streamed ({}/read, buffer {}) {} ms | tokens = {} -> {}",
        src.chars().count(),
        (t1 - t0).as_millis(),
        per_read,
        buffer_size,
        (t2 - t1).as_millis(),
        whole.len(),
        if eq { "OK" } else { "MISMATCH!" }
    );
    if !eq {
        let i = first_divergence_idx(&whole, &streamed);
        let lo = i.saturating_sub(2);
        eprintln!("--- divergence at token {i} ---");
        for j in lo..(i + 3) {
            eprintln!(
                "#{j:06} whole={:?}\n        streamed={:?}",
                whole.get(j),
                streamed.get(j)
            );
        }
    }
    Ok(eq)
}

fn save_case(dir: &str, seed: u64, iter: usize, src: &str) -> Result<PathBuf> {
    let path = Path::new(dir).join(format!("case_s{seed}_i{iter}_n{}.calc", src.len()));
    fs::write(&path, src).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

fn main() -> Result<()> {
    setup_logging(2).map_err(|e| anyhow!("logging setup failed: {e}"))?;
    let table = Arc::new(calc_table()?);

    if let Ok(path) = std::env::var("FUZZ_INPUT") {
        eprintln!("[replay] reading {path}");
        let src = fs::read_to_string(&path).with_context(|| format!("failed to read {path}"))?;
        if !run_once(&table, &src, 1, 1)? {
            bail!("replay mismatch");
        }
        return Ok(());
    }

    let save_cases = std::env::var("FUZZ_SAVE").ok().as_deref() == Some("1");
    let out_dir = std::env::var("FUZZ_DIR").unwrap_or_else(|_| "fuzz-cases".to_string());
    let len: usize = env_parse("FUZZ_LEN", 200_000);
    let iters: usize = env_parse("FUZZ_ITERS", 3);
    let seed: u64 = env_parse("FUZZ_SEED", 42);

    eprintln!("[fuzz] len={len} iters={iters} seed={seed}");
    let mut rng = StdRng::seed_from_u64(seed);
    if save_cases {
        fs::create_dir_all(&out_dir).with_context(|| format!("failed to create {out_dir}"))?;
    }

    for i in 0..iters {
        let src = gen_valid_source(&mut rng, len);
        if save_cases {
            let path = save_case(&out_dir, seed, i, &src)?;
            eprintln!("[save] wrote {}", path.display());
        }
        let per_read = rng.random_range(1..=7);
        let buffer_size = rng.random_range(1..=16);
        if !run_once(&table, &src, per_read, buffer_size)? {
            bail!("iteration {i} (seed {seed}) diverged");
        }
    }
    eprintln!("[fuzz] all iterations matched");
    Ok(())
}

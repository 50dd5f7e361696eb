// src/lexer/tables/io.rs
use std::{
    fmt::Write as _,
    io::{BufWriter, Write},
    time::Instant,
};

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use super::{
    ActionId,
    ActionSpec,
    DfaParts,
    DfaTable,
    EofActions,
    LexEntry,
    LookaheadPair,
    pack::{Encoding, PackedArray, pack_count_value, pack_hi_low},
};
use crate::lexer::error::{CodecError, TableError};

// Translations applied when packing: -1 entries (no target, no action) become 0.
pub const TRANS_TRANSLATE: i64 = 1;
pub const ACTION_TRANSLATE: i64 = 1;

// -------------------- JSON (de)serialization --------------------

/// Everything besides the five big arrays. Small, kept as JSON even in generated code.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablesMeta {
    pub n_classes: usize,
    pub lex_states: Vec<LexEntry>,
    #[serde(default)]
    pub lookahead: Vec<LookaheadPair>,
    pub actions: Vec<ActionSpec>,
    #[serde(default)]
    pub eof_actions: Vec<Option<ActionId>>,
    pub eof_default: Option<ActionId>,
}

impl TablesMeta {
    fn of(p: &DfaParts) -> Self {
        Self {
            n_classes: p.n_classes,
            lex_states: p.lex_states.clone(),
            lookahead: p.lookahead.clone(),
            actions: p.actions.clone(),
            eof_actions: p.eof.per_state.clone(),
            eof_default: p.eof.default,
        }
    }

    fn into_parts(
        self,
        trans: Vec<i32>,
        row_map: Vec<u32>,
        attributes: Vec<u8>,
        cmap: Vec<u16>,
        state_action: Vec<Option<ActionId>>,
    ) -> DfaParts {
        DfaParts {
            n_classes: self.n_classes,
            trans,
            row_map,
            attributes,
            cmap,
            state_action,
            lex_states: self.lex_states,
            lookahead: self.lookahead,
            actions: self.actions,
            eof: EofActions {
                per_state: self.eof_actions,
                default: self.eof_default,
            },
        }
    }
}

/// Run of consecutive code points sharing one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct ClassRun {
    first: u32,
    last: u32,
    class: u16,
}

#[derive(Serialize, Deserialize)]
struct TablesDisk {
    #[serde(flatten)]
    meta: TablesMeta,
    trans: Vec<i32>,
    row_map: Vec<u32>,
    attributes: Vec<u8>,
    cmap: Vec<ClassRun>,
    state_action: Vec<Option<ActionId>>,
}

impl From<&DfaTable> for TablesDisk {
    fn from(t: &DfaTable) -> Self {
        let p = t.parts();
        Self {
            meta: TablesMeta::of(p),
            trans: p.trans.clone(),
            row_map: p.row_map.clone(),
            attributes: p.attributes.clone(),
            cmap: class_runs(&p.cmap),
            state_action: p.state_action.clone(),
        }
    }
}

impl TablesDisk {
    fn into_table(self) -> Result<DfaTable, TableError> {
        let mut cmap = Vec::new();
        for run in &self.cmap {
            let (first, last) = (run.first as usize, run.last as usize);
            if first != cmap.len() || last < first {
                return Err(TableError::LengthMismatch {
                    what: "cmap run start",
                    expected: cmap.len(),
                    actual: first,
                });
            }
            cmap.resize(last + 1, run.class);
        }
        DfaTable::new(self.meta.into_parts(
            self.trans,
            self.row_map,
            self.attributes,
            cmap,
            self.state_action,
        ))
    }
}

fn class_runs(cmap: &[u16]) -> Vec<ClassRun> {
    let mut runs: Vec<ClassRun> = Vec::new();
    for (cp, &class) in cmap.iter().enumerate() {
        match runs.last_mut() {
            Some(r) if r.class == class => r.last = cp as u32,
            _ => runs.push(ClassRun {
                first: cp as u32,
                last: cp as u32,
                class,
            }),
        }
    }
    runs
}

pub fn save_tables_json(path: &std::path::Path, t: &DfaTable) -> std::io::Result<()> {
    let f = std::fs::File::create(path)?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer(&mut w, &TablesDisk::from(t))?;
    w.flush()
}

pub fn tables_to_json(t: &DfaTable) -> Result<String, TableError> {
    Ok(serde_json::to_string_pretty(&TablesDisk::from(t))?)
}

pub fn load_tables_json_bytes(data: &[u8]) -> Result<DfaTable, TableError> {
    serde_json::from_slice::<TablesDisk>(data)?.into_table()
}

// -------------------- Packed form --------------------

/// Every big array of a table run through the packed-array codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedTables {
    pub trans: PackedArray,
    pub row_map: PackedArray,
    pub attributes: PackedArray,
    pub cmap: PackedArray,
    pub state_action: PackedArray,
    pub meta: TablesMeta,
}

impl PackedTables {
    pub fn pack(t: &DfaTable) -> Result<Self, CodecError> {
        let p = t.parts();
        let action: Vec<i64> = p
            .state_action
            .iter()
            .map(|a| a.map_or(-1, |a| a as i64))
            .collect();
        Ok(Self {
            trans: pack_count_value(&widen(&p.trans), TRANS_TRANSLATE)?,
            row_map: pack_hi_low(&widen(&p.row_map))?,
            attributes: pack_count_value(&widen(&p.attributes), 0)?,
            cmap: pack_count_value(&widen(&p.cmap), 0)?,
            state_action: pack_count_value(&action, ACTION_TRANSLATE)?,
            meta: TablesMeta::of(p),
        })
    }

    pub fn unpack(&self) -> Result<DfaTable, TableError> {
        let state_action = self
            .state_action
            .unpack()?
            .into_iter()
            .map(|a| {
                if a < 0 {
                    Ok(None)
                } else {
                    usize::try_from(a)
                        .map(Some)
                        .map_err(|_| CodecError::Overflow { value: a })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DfaTable::new(self.meta.clone().into_parts(
            self.trans.unpack_as()?,
            self.row_map.unpack_as()?,
            self.attributes.unpack_as()?,
            self.cmap.unpack_as()?,
            state_action,
        ))?)
    }

    pub fn chunk_count(&self) -> usize {
        [
            &self.trans,
            &self.row_map,
            &self.attributes,
            &self.cmap,
            &self.state_action,
        ]
        .iter()
        .map(|a| a.chunks().len())
        .sum()
    }
}

fn widen<T: Copy + Into<i64>>(v: &[T]) -> Vec<i64> {
    v.iter().map(|&x| x.into()).collect()
}

// -------------------- Generated source --------------------

/// One packed array as embedded in generated source.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedArray<'a> {
    pub len: usize,
    pub chunks: &'a [&'a str],
}

/// Packed tables compiled into a binary by [`render_rust_module`]; decoded at start-up.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedTables<'a> {
    pub trans: EmbeddedArray<'a>,
    pub row_map: EmbeddedArray<'a>,
    pub attributes: EmbeddedArray<'a>,
    pub cmap: EmbeddedArray<'a>,
    pub state_action: EmbeddedArray<'a>,
    pub meta_json: &'a str,
}

impl EmbeddedTables<'_> {
    pub fn to_packed(&self) -> Result<PackedTables, TableError> {
        let arr = |e: &EmbeddedArray<'_>, encoding, translate| {
            PackedArray::from_escaped(encoding, translate, e.len, e.chunks)
        };
        Ok(PackedTables {
            trans: arr(&self.trans, Encoding::CountValue, TRANS_TRANSLATE)?,
            row_map: arr(&self.row_map, Encoding::HiLow, 0)?,
            attributes: arr(&self.attributes, Encoding::CountValue, 0)?,
            cmap: arr(&self.cmap, Encoding::CountValue, 0)?,
            state_action: arr(&self.state_action, Encoding::CountValue, ACTION_TRANSLATE)?,
            meta: serde_json::from_str(self.meta_json)?,
        })
    }

    pub fn load(&self) -> Result<DfaTable, TableError> {
        let instant = Instant::now();
        let table = self.to_packed()?.unpack()?;
        log::debug!(
            "[tables] decoded {} states / {} classes in {:.3}ms",
            table.n_states(),
            table.n_classes(),
            instant.elapsed().as_secs_f64() * 1e3
        );
        Ok(table)
    }
}

// Units per source line inside one chunk constant.
const UNITS_PER_LINE: usize = 16;

/// Renders `packed` as a Rust module exposing `pub const TABLES: EmbeddedTables`.
pub fn render_rust_module(packed: &PackedTables) -> Result<String, TableError> {
    let mut out = String::new();
    out.push_str("// Packed scanner tables. Generated by gen_tables; do not edit.\n\n");
    out.push_str("use dfascan::lexer::tables::io::{EmbeddedArray, EmbeddedTables};\n");

    let arrays = [
        ("ZZ_TRANS", &packed.trans),
        ("ZZ_ROWMAP", &packed.row_map),
        ("ZZ_ATTRIBUTE", &packed.attributes),
        ("ZZ_CMAP", &packed.cmap),
        ("ZZ_ACTION", &packed.state_action),
    ];
    for (name, arr) in arrays {
        render_array(&mut out, name, arr);
    }

    let meta = serde_json::to_string(&packed.meta)?;
    let _ = write!(out, "\npub const ZZ_META: &str = r#\"{meta}\"#;\n");
    out.push_str(
        "\npub const TABLES: EmbeddedTables<'static> = EmbeddedTables {\n    \
         trans: ZZ_TRANS,\n    \
         row_map: ZZ_ROWMAP,\n    \
         attributes: ZZ_ATTRIBUTE,\n    \
         cmap: ZZ_CMAP,\n    \
         state_action: ZZ_ACTION,\n    \
         meta_json: ZZ_META,\n};\n",
    );
    Ok(out)
}

fn render_array(out: &mut String, name: &str, arr: &PackedArray) {
    out.push('\n');
    let mut names = Vec::with_capacity(arr.chunks().len());
    for (i, chunk) in arr.chunks().iter().enumerate() {
        let chunk_name = format!("{name}_PACKED_{i}");
        let _ = writeln!(out, "const {chunk_name}: &str = concat!(");
        if chunk.is_empty() {
            out.push_str("    \"\",\n");
        }
        for line in chunk.units().chunks(UNITS_PER_LINE) {
            let text = super::pack::PackedChunk::from_units(line.to_vec()).escaped();
            let _ = writeln!(out, "    r\"{text}\",");
        }
        out.push_str(");\n");
        names.push(chunk_name);
    }
    let _ = writeln!(
        out,
        "pub const {name}: EmbeddedArray<'static> = EmbeddedArray {{ len: {}, chunks: &[{}] }};",
        arr.len(),
        names.join(", ")
    );
}

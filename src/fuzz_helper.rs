use strum::IntoEnumIterator;

use crate::{
    aggregate::{AggregationKind, AggregationRequest, ColumnRef, SemanticType, compile_aggregation},
    dialect::Dialect,
    translate::{CompileOptions, LiteralMode, ResolvedColumn, compile_formula_with},
};

// Every identifier resolves, so the fuzzer gets past name lookup
fn resolve_any(name: &str) -> Option<ResolvedColumn> {
    match name {
        "due" | "Due" => Some(ResolvedColumn::name(name).with_type(SemanticType::Date)),
        _ => Some(ResolvedColumn::name(name)),
    }
}

/// Compiles `text` for every dialect in both literal modes. Errors are
///  expected, panics are not.
pub fn compile_everywhere(text: &str) {
    let inline = CompileOptions::default().with_max_depth(256);
    let bound = inline.clone().with_literal_mode(LiteralMode::Bound);
    for dialect in Dialect::iter() {
        for options in [&inline, &bound] {
            if let Ok(fragment) = compile_formula_with(text, dialect, &resolve_any, None, options) {
                let placeholders = fragment.params.len();
                if options.literal_mode == LiteralMode::Inline {
                    assert_eq!(placeholders, 0, "inline mode bound values for {text:?}");
                }
            }
        }
    }
}

/// Builds an aggregation request from raw bytes and compiles it for every
///  dialect.
pub fn aggregate_everywhere(data: &[u8]) {
    let [ty, kind, rest @ ..] = data else {
        return;
    };
    let types: Vec<_> = SemanticType::iter().collect();
    let kinds: Vec<_> = AggregationKind::iter().collect();
    let ty = types[*ty as usize % types.len()];
    let kind = kinds[*kind as usize % kinds.len()];
    let query = String::from_utf8_lossy(rest);

    for dialect in Dialect::iter() {
        let request = AggregationRequest::new(ColumnRef::new("fuzz", ty), kind, query.as_ref())
            .with_source_table(dialect.quote_ident("fuzz_table"));
        if let Some(fragment) = compile_aggregation(&request, dialect) {
            assert!(fragment.sql.ends_with(&dialect.quote_ident("fuzz")));
        }
    }
}

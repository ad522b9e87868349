use std::sync::LazyLock;

use super::{Compiler, EmitError, Error, Side, negate};
use crate::{
    ast::{BinaryOp, Expr},
    functions::{CanonicalFunction as F, FunctionTable, MappingEntry::*},
};

/// Function mapping for MySQL 8.
pub static FUNCTIONS: LazyLock<FunctionTable> = LazyLock::new(|| {
    FunctionTable::from([
        (F::LEN, Rename("CHAR_LENGTH")),
        (F::MIN, Rename("LEAST")),
        (F::MAX, Rename("GREATEST")),
        (F::REGEX_EXTRACT, Rename("REGEXP_SUBSTR")),
        (F::REGEX_REPLACE, Rename("REGEXP_REPLACE")),
        (F::NOW, PassThrough),
        (F::SEARCH, Emitter(search)),
        (F::INT, Emitter(int)),
        (F::FLOAT, Emitter(float)),
        (F::LEFT, Emitter(left)),
        (F::RIGHT, Emitter(right)),
        (F::LOG, Emitter(log)),
        (F::DATEADD, Emitter(date_add)),
        (F::REGEX_MATCH, Emitter(regex_match)),
    ])
});

// SEARCH(str, searchStr) => LOCATE(searchStr, str)
fn search(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::SEARCH, args, 2..=2)?;
    let needle = cx.compile(&args[1])?;
    let haystack = cx.compile(&args[0])?;
    Ok(format!("LOCATE({needle}, {haystack})"))
}

fn int(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::INT, args, 1..=1)?;
    Ok(format!("CAST({} AS SIGNED)", cx.compile(&args[0])?))
}

fn float(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::FLOAT, args, 1..=1)?;
    let x = cx.compile(&args[0])?;
    Ok(format!("CAST({x} AS {})", cx.dialect().float_type()))
}

// LEFT(str, n) => SUBSTR(str, 1, n)
fn left(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::LEFT, args, 2..=2)?;
    let s = cx.compile(&args[0])?;
    let n = cx.compile(&args[1])?;
    Ok(format!("SUBSTR({s}, 1, {n})"))
}

// RIGHT(str, n) => SUBSTR(str, -n), empty unless n is positive
fn right(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::RIGHT, args, 2..=2)?;
    let test = cx.compile_operand(&args[1], BinaryOp::Gt, Side::Left)?;
    let s = cx.compile(&args[0])?;
    let n = cx.compile_operand(&args[1], BinaryOp::Mul, Side::Right)?;
    Ok(format!("CASE WHEN {test} > 0 THEN SUBSTR({s}, {}) ELSE '' END", negate(&n)))
}

fn log(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    match args {
        [x] => Ok(format!("LN({})", cx.compile(x)?)),
        [base, x] => {
            let base = cx.compile(base)?;
            let x = cx.compile(x)?;
            Ok(format!("LOG({base}, {x})"))
        }
        _ => Err(cx.emission(F::LOG, EmitError::IncorrectArgCount(args.len()))),
    }
}

// DATEADD(d, n, 'unit') => DATE_ADD(d, INTERVAL n UNIT)
fn date_add(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::DATEADD, args, 3..=3)?;
    let unit = cx.interval_unit(F::DATEADD, args, 2)?;
    let date = cx.compile(&args[0])?;
    let count = cx.compile_operand(&args[1], BinaryOp::Mul, Side::Left)?;
    Ok(format!(
        "DATE_ADD({date}, INTERVAL {count} {})",
        unit.to_string().to_uppercase()
    ))
}

fn regex_match(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::REGEX_MATCH, args, 2..=2)?;
    let s = cx.compile(&args[0])?;
    let pattern = cx.compile(&args[1])?;
    Ok(format!("({s} REGEXP {pattern})"))
}

use std::sync::LazyLock;

use super::{Compiler, EmitError, Error, IntervalUnit, Side, negate};
use crate::{
    ast::{BinaryOp, Expr},
    functions::{CanonicalFunction as F, FunctionTable, MappingEntry::*},
};

/// Function mapping for SQLite (with the math functions compiled in).
pub static FUNCTIONS: LazyLock<FunctionTable> = LazyLock::new(|| {
    FunctionTable::from([
        (F::LEN, Rename("LENGTH")),
        (F::NOW, Rename("DATE")),
        (F::SEARCH, Rename("INSTR")),
        (F::CEILING, Emitter(ceiling)),
        (F::FLOOR, Emitter(floor)),
        (F::MOD, Emitter(modulo)),
        (F::REPEAT, Emitter(repeat)),
        (F::INT, Emitter(int)),
        (F::FLOAT, Emitter(float)),
        (F::LEFT, Emitter(left)),
        (F::RIGHT, Emitter(right)),
        (F::LOG, Emitter(log)),
        (F::DATEADD, Emitter(date_add)),
        // REGEXP calls a user function SQLite doesn't ship
        (F::REGEX_MATCH, Unsupported),
        (F::REGEX_EXTRACT, Unsupported),
        (F::REGEX_REPLACE, Unsupported),
    ])
});

// CEILING(x) => CAST(x AS INTEGER) + (x > CAST(x AS INTEGER))
fn ceiling(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::CEILING, args, 1..=1)?;
    let a = cx.compile(&args[0])?;
    let b = cx.compile_operand(&args[0], BinaryOp::Gt, Side::Left)?;
    let c = cx.compile(&args[0])?;
    Ok(format!(
        "(CAST({a} AS INTEGER) + ({b} > CAST({c} AS INTEGER)))"
    ))
}

// FLOOR(x) => CAST(x AS INTEGER) - (x < CAST(x AS INTEGER))
fn floor(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::FLOOR, args, 1..=1)?;
    let a = cx.compile(&args[0])?;
    let b = cx.compile_operand(&args[0], BinaryOp::Lt, Side::Left)?;
    let c = cx.compile(&args[0])?;
    Ok(format!(
        "(CAST({a} AS INTEGER) - ({b} < CAST({c} AS INTEGER)))"
    ))
}

// MOD(a, b) => (a % b)
fn modulo(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::MOD, args, 2..=2)?;
    let a = cx.compile_operand(&args[0], BinaryOp::Mod, Side::Left)?;
    let b = cx.compile_operand(&args[1], BinaryOp::Mod, Side::Right)?;
    Ok(format!("({a} % {b})"))
}

// There is no REPEAT: format n copies of '/' and replace each with str
fn repeat(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::REPEAT, args, 2..=2)?;
    let count = cx.compile_operand(&args[1], BinaryOp::Concat, Side::Right)?;
    let s = cx.compile(&args[0])?;
    Ok(format!(
        "REPLACE(PRINTF('%.' || {count} || 'c', '/'), '/', {s})"
    ))
}

fn int(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::INT, args, 1..=1)?;
    Ok(format!("CAST({} AS INTEGER)", cx.compile(&args[0])?))
}

fn float(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::FLOAT, args, 1..=1)?;
    let x = cx.compile(&args[0])?;
    Ok(format!("CAST({x} AS {})", cx.dialect().float_type()))
}

fn left(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::LEFT, args, 2..=2)?;
    let s = cx.compile(&args[0])?;
    let n = cx.compile(&args[1])?;
    Ok(format!("SUBSTR({s}, 1, {n})"))
}

// SUBSTR(str, -0) is the whole string, not an empty one
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

// DATEADD(d, n, 'unit') => DATETIME(d, n || ' units'). Weeks aren't a
//  modifier, they become 7 days.
fn date_add(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::DATEADD, args, 3..=3)?;
    let unit = cx.interval_unit(F::DATEADD, args, 2)?;
    let date = cx.compile(&args[0])?;
    let modifier = match unit {
        IntervalUnit::Week => {
            let count = cx.compile_operand(&args[1], BinaryOp::Mul, Side::Left)?;
            format!("({count} * 7) || ' days'")
        }
        unit => {
            let count = cx.compile_operand(&args[1], BinaryOp::Concat, Side::Left)?;
            format!("{count} || ' {unit}s'")
        }
    };
    Ok(format!("DATETIME({date}, {modifier})"))
}

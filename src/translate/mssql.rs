use std::sync::LazyLock;

use super::{Compiler, EmitError, Error, Side};
use crate::{
    ast::{BinaryOp, Expr},
    functions::{CanonicalFunction as F, FunctionTable, MappingEntry::*},
};

/// Function mapping for SQL Server.
pub static FUNCTIONS: LazyLock<FunctionTable> = LazyLock::new(|| {
    FunctionTable::from([
        (F::CEILING, PassThrough),
        (F::LEN, PassThrough),
        (F::REPEAT, Rename("REPLICATE")),
        (F::NOW, Rename("getdate")),
        (F::MIN, Emitter(min)),
        (F::MAX, Emitter(max)),
        (F::MOD, Emitter(modulo)),
        (F::SEARCH, Emitter(search)),
        (F::INT, Emitter(int)),
        (F::FLOAT, Emitter(float)),
        (F::LOG, Emitter(log)),
        (F::SUBSTR, Emitter(substr)),
        (F::DATEADD, Emitter(date_add)),
        (F::REGEX_MATCH, Unsupported),
        (F::REGEX_EXTRACT, Unsupported),
        (F::REGEX_REPLACE, Unsupported),
    ])
});

// There's no LEAST/GREATEST before SQL Server 2022, so pick the winner with a
//  CASE chain:
//   MIN(a, b, c) => CASE WHEN a < b AND a < c THEN a WHEN b < c THEN b ELSE c END
fn extreme(cx: &mut Compiler<'_>, function: F, op: BinaryOp, args: &[Expr]) -> Result<String, Error> {
    let Some((last, candidates)) = args.split_last() else {
        return Err(cx.emission(function, EmitError::IncorrectArgCount(0)));
    };
    if candidates.is_empty() {
        return cx.compile(last);
    }

    let mut sql = String::from("CASE");
    for (i, candidate) in candidates.iter().enumerate() {
        let mut tests = Vec::with_capacity(args.len() - i - 1);
        for other in &args[i + 1..] {
            let l = cx.compile_operand(candidate, op, Side::Left)?;
            let r = cx.compile_operand(other, op, Side::Right)?;
            tests.push(format!("{l} {op} {r}"));
        }
        let then = cx.compile(candidate)?;
        sql.push_str(&format!(" WHEN {} THEN {then}", tests.join(" AND ")));
    }
    sql.push_str(&format!(" ELSE {} END", cx.compile(last)?));
    Ok(sql)
}

fn min(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    extreme(cx, F::MIN, BinaryOp::Lt, args)
}

fn max(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    extreme(cx, F::MAX, BinaryOp::Gt, args)
}

fn modulo(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::MOD, args, 2..=2)?;
    let a = cx.compile_operand(&args[0], BinaryOp::Mod, Side::Left)?;
    let b = cx.compile_operand(&args[1], BinaryOp::Mod, Side::Right)?;
    Ok(format!("({a} % {b})"))
}

// SEARCH(str, searchStr) => CHARINDEX(searchStr, str)
fn search(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::SEARCH, args, 2..=2)?;
    let needle = cx.compile(&args[1])?;
    let haystack = cx.compile(&args[0])?;
    Ok(format!("CHARINDEX({needle}, {haystack})"))
}

fn int(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::INT, args, 1..=1)?;
    let test = cx.compile(&args[0])?;
    let value = cx.compile(&args[0])?;
    Ok(format!(
        "CASE WHEN ISNUMERIC({test}) = 1 THEN FLOOR({value}) ELSE 0 END"
    ))
}

fn float(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::FLOAT, args, 1..=1)?;
    let x = cx.compile(&args[0])?;
    Ok(format!("CAST({x} AS {})", cx.dialect().float_type()))
}

// LOG(base, x) => LOG(x, base)
fn log(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    match args {
        [x] => Ok(format!("LOG({})", cx.compile(x)?)),
        [base, x] => {
            let x = cx.compile(x)?;
            let base = cx.compile(base)?;
            Ok(format!("LOG({x}, {base})"))
        }
        _ => Err(cx.emission(F::LOG, EmitError::IncorrectArgCount(args.len()))),
    }
}

// SUBSTRING requires a length: SUBSTR(s, p) => SUBSTRING(s, p, LEN(s))
fn substr(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::SUBSTR, args, 2..=3)?;
    let s = cx.compile(&args[0])?;
    let start = cx.compile(&args[1])?;
    let len = match args.get(2) {
        Some(len) => cx.compile(len)?,
        None => format!("LEN({})", cx.compile(&args[0])?),
    };
    Ok(format!("SUBSTRING({s}, {start}, {len})"))
}

// DATEADD(d, n, 'unit') => DATEADD(unit, n, d)
fn date_add(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::DATEADD, args, 3..=3)?;
    let unit = cx.interval_unit(F::DATEADD, args, 2)?;
    let count = cx.compile(&args[1])?;
    let date = cx.compile(&args[0])?;
    Ok(format!("DATEADD({unit}, {count}, {date})"))
}

//! Logical, blank-test and concatenation functions shared by every dialect.
//! The dialect tables are consulted first.

use std::sync::LazyLock;

use super::{Compiler, Error, Side};
use crate::{
    ast::{BinaryOp, Expr},
    dialect::Dialect,
    functions::{CanonicalFunction as F, FunctionTable, MappingEntry::*},
};

pub static FUNCTIONS: LazyLock<FunctionTable> = LazyLock::new(|| {
    FunctionTable::from([
        (F::AND, Emitter(and)),
        (F::OR, Emitter(or)),
        (F::NOT, Emitter(not)),
        (F::TRUE, Emitter(true_)),
        (F::FALSE, Emitter(false_)),
        (F::BLANK, Emitter(blank)),
        (F::ISBLANK, Emitter(is_blank)),
        (F::ISNOTBLANK, Emitter(is_not_blank)),
        (F::CONCAT, Emitter(concat)),
    ])
});

// AND(a, b, c) => (a AND b AND c)
fn logical(cx: &mut Compiler<'_>, function: F, op: BinaryOp, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(function, args, 1..)?;
    let parts = args
        .iter()
        .map(|arg| cx.compile_operand(arg, op, Side::Left))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("({})", parts.join(&format!(" {op} "))))
}

fn and(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    logical(cx, F::AND, BinaryOp::And, args)
}

fn or(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    logical(cx, F::OR, BinaryOp::Or, args)
}

fn not(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::NOT, args, 1..=1)?;
    Ok(format!("NOT ({})", cx.compile_condition(&args[0])?))
}

// CONCAT ignores NULL arguments, as Postgres and SQL Server do natively.
//  MySQL's CONCAT_WS with an empty separator skips them; SQLite chains `||`
//  over coalesced operands. One argument is coalesced to text, since SQL
//  Server before 2022 rejects a single-argument CONCAT.
fn concat(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::CONCAT, args, 1..)?;
    let dialect = cx.dialect();
    if let [arg] = args {
        let x = cx.compile(arg)?;
        return Ok(format!("COALESCE(CAST({x} AS {}), '')", dialect.text_type()));
    }
    match dialect {
        Dialect::Postgres | Dialect::MsSql => cx.call_named("CONCAT", args),
        Dialect::MySql => {
            let args = args
                .iter()
                .map(|arg| cx.compile(arg))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!("CONCAT_WS('', {})", args.join(", ")))
        }
        Dialect::Sqlite => {
            let parts = args
                .iter()
                .map(|arg| match arg.as_string_literal() {
                    Some(_) => cx.compile(arg),
                    None => cx.compile(arg).map(|x| format!("COALESCE({x}, '')")),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!("({})", parts.join(" || ")))
        }
    }
}

fn true_(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::TRUE, args, 0..=0)?;
    Ok(cx.dialect().bool_literal(true).to_string())
}

fn false_(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::FALSE, args, 0..=0)?;
    Ok(cx.dialect().bool_literal(false).to_string())
}

fn blank(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::BLANK, args, 0..=0)?;
    Ok("NULL".to_string())
}

fn is_blank(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::ISBLANK, args, 1..=1)?;
    let text = cx.dialect().text_type();
    let x = cx.compile(&args[0])?;
    let y = cx.compile(&args[0])?;
    Ok(format!("({x} IS NULL OR CAST({y} AS {text}) = '')"))
}

fn is_not_blank(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::ISNOTBLANK, args, 1..=1)?;
    let text = cx.dialect().text_type();
    let x = cx.compile(&args[0])?;
    let y = cx.compile(&args[0])?;
    Ok(format!("({x} IS NOT NULL AND CAST({y} AS {text}) != '')"))
}

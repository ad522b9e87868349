use std::sync::LazyLock;

use super::{Compiler, EmitError, Error, Side};
use crate::{
    ast::{BinaryOp, Expr},
    functions::{CanonicalFunction as F, FunctionTable, MappingEntry::*},
};

/// Function mapping for PostgreSQL.
pub static FUNCTIONS: LazyLock<FunctionTable> = LazyLock::new(|| {
    FunctionTable::from([
        (F::LEN, Rename("length")),
        (F::MIN, Rename("least")),
        (F::MAX, Rename("greatest")),
        (F::CEILING, Rename("ceil")),
        (F::POWER, Rename("pow")),
        (F::SQRT, Rename("sqrt")),
        (F::NOW, PassThrough),
        (F::SEARCH, Emitter(search)),
        (F::INT, Emitter(int)),
        (F::FLOAT, Emitter(float)),
        (F::ROUND, Emitter(round)),
        (F::LOG, Emitter(log)),
        (F::DATEADD, Emitter(date_add)),
        (F::REGEX_MATCH, Emitter(regex_match)),
        (F::REGEX_EXTRACT, Emitter(regex_extract)),
        (F::REGEX_REPLACE, Emitter(regex_replace)),
    ])
});

// SEARCH(str, searchStr) => POSITION(searchStr IN str)
fn search(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::SEARCH, args, 2..=2)?;
    let needle = cx.compile(&args[1])?;
    let haystack = cx.compile(&args[0])?;
    Ok(format!("POSITION({needle} IN {haystack})"))
}

// INT(x) keeps the leading integer digits of the value's text, 0 if there
//  are none
fn int(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::INT, args, 1..=1)?;
    let x = cx.compile(&args[0])?;
    Ok(format!(
        "CAST(COALESCE(SUBSTRING(CAST({x} AS TEXT) FROM '^-?[0-9]+'), '0') AS INTEGER)"
    ))
}

fn float(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::FLOAT, args, 1..=1)?;
    let x = cx.compile(&args[0])?;
    Ok(format!("CAST({x} AS {})", cx.dialect().float_type()))
}

// ROUND(x[, p]) => ROUND(CAST(x AS NUMERIC), p), p defaults to 0. Postgres
//  only rounds to a precision for NUMERIC.
fn round(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::ROUND, args, 1..=2)?;
    let x = cx.compile(&args[0])?;
    let precision = match args.get(1) {
        Some(p) => cx.compile(p)?,
        None => "0".to_string(),
    };
    Ok(format!("ROUND(CAST({x} AS NUMERIC), {precision})"))
}

// LOG([base], x): natural log without a base
fn log(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    match args {
        [x] => Ok(format!("ln({})", cx.compile(x)?)),
        [base, x] => {
            let base = cx.compile(base)?;
            let x = cx.compile(x)?;
            Ok(format!("log(CAST({base} AS NUMERIC), CAST({x} AS NUMERIC))"))
        }
        _ => Err(cx.emission(F::LOG, EmitError::IncorrectArgCount(args.len()))),
    }
}

// DATEADD(d, n, 'unit') => (CAST(d AS TIMESTAMP) + n * INTERVAL '1 unit')
fn date_add(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::DATEADD, args, 3..=3)?;
    let unit = cx.interval_unit(F::DATEADD, args, 2)?;
    let date = cx.compile(&args[0])?;
    let count = cx.compile_operand(&args[1], BinaryOp::Mul, Side::Left)?;
    Ok(format!(
        "(CAST({date} AS TIMESTAMP) + {count} * INTERVAL '1 {unit}')"
    ))
}

fn regex_match(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::REGEX_MATCH, args, 2..=2)?;
    let s = cx.compile(&args[0])?;
    let pattern = cx.compile(&args[1])?;
    Ok(format!("({s} ~ {pattern})"))
}

fn regex_extract(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::REGEX_EXTRACT, args, 2..=2)?;
    let s = cx.compile(&args[0])?;
    let pattern = cx.compile(&args[1])?;
    Ok(format!("SUBSTRING({s} FROM {pattern})"))
}

fn regex_replace(cx: &mut Compiler<'_>, args: &[Expr]) -> Result<String, Error> {
    cx.expect_args(F::REGEX_REPLACE, args, 3..=3)?;
    let s = cx.compile(&args[0])?;
    let pattern = cx.compile(&args[1])?;
    let replacement = cx.compile(&args[2])?;
    Ok(format!("REGEXP_REPLACE({s}, {pattern}, {replacement}, 'g')"))
}

#[cfg(test)]
mod tests {
    use crate::{
        ast::Literal,
        dialect::Dialect,
        translate::{EmitError, Error, compile_formula, tests::{bound, columns, sql}},
    };
    use pretty_assertions::assert_eq;

    fn pg(text: &str) -> String {
        sql(text, Dialect::Postgres)
    }

    #[test]
    fn renames() {
        assert_eq!(pg("LEN(s)"), r#"length("s")"#);
        assert_eq!(pg("MIN(a, b, c)"), r#"least("a", "b", "c")"#);
        assert_eq!(pg("MAX(a, 1)"), r#"greatest("a", 1)"#);
        assert_eq!(pg("CEILING(a)"), r#"ceil("a")"#);
        assert_eq!(pg("POWER(a, 2)"), r#"pow("a", 2)"#);
        assert_eq!(pg("SQRT(a)"), r#"sqrt("a")"#);
        assert_eq!(pg("NOW()"), "NOW()");
        assert_eq!(pg("UPPER(s)"), r#"UPPER("s")"#);
    }

    #[test]
    fn search() {
        assert_eq!(pg(r#"SEARCH(s, "lo")"#), r#"POSITION('lo' IN "s")"#);

        let fragment = bound(r#"SEARCH("hay", "n")"#, Dialect::Postgres);
        assert_eq!(fragment.sql, "POSITION($1 IN $2)");
        assert_eq!(
            fragment.params,
            vec![Literal::String("n".into()), Literal::String("hay".into())]
        );
    }

    #[test]
    fn numeric_functions() {
        assert_eq!(
            pg("INT(a)"),
            r#"CAST(COALESCE(SUBSTRING(CAST("a" AS TEXT) FROM '^-?[0-9]+'), '0') AS INTEGER)"#
        );
        assert_eq!(pg("ROUND(a)"), r#"ROUND(CAST("a" AS NUMERIC), 0)"#);
        assert_eq!(pg("ROUND(a, 2)"), r#"ROUND(CAST("a" AS NUMERIC), 2)"#);
        assert_eq!(pg("LOG(a)"), r#"ln("a")"#);
        assert_eq!(
            pg("LOG(2, a)"),
            r#"log(CAST(2 AS NUMERIC), CAST("a" AS NUMERIC))"#
        );
        assert_eq!(pg("FLOAT(a)"), r#"CAST("a" AS DOUBLE PRECISION)"#);
    }

    #[test]
    fn date_add() {
        assert_eq!(
            pg(r#"DATEADD(Due, 2, "day")"#),
            r#"(CAST("due_date" AS TIMESTAMP) + 2 * INTERVAL '1 day')"#
        );
        assert_eq!(
            pg(r#"DATEADD(Due, a + 1, "month")"#),
            r#"(CAST("due_date" AS TIMESTAMP) + ("a" + 1) * INTERVAL '1 month')"#
        );
        assert_eq!(
            compile_formula("DATEADD(Due, 2, s)", Dialect::Postgres, &columns(), None),
            Err(Error::FunctionEmission {
                function: "DATEADD".into(),
                dialect: Dialect::Postgres,
                reason: EmitError::ExpectedStringLiteral(2),
            })
        );
        assert_eq!(
            compile_formula(r#"DATEADD(Due, 2, "fortnight")"#, Dialect::Postgres, &columns(), None),
            Err(Error::FunctionEmission {
                function: "DATEADD".into(),
                dialect: Dialect::Postgres,
                reason: EmitError::UnknownUnit("fortnight".into()),
            })
        );
    }

    #[test]
    fn regex() {
        assert_eq!(
            pg(r#"REGEX_MATCH(s, "^a")"#),
            r#"CASE WHEN ("s" ~ '^a') THEN true ELSE false END"#
        );
        assert_eq!(
            pg(r#"IF(REGEX_MATCH(s, "^a"), 1, 0)"#),
            r#"CASE WHEN ("s" ~ '^a') THEN 1 ELSE 0 END"#
        );
        assert_eq!(pg(r#"REGEX_EXTRACT(s, "[0-9]+")"#), r#"SUBSTRING("s" FROM '[0-9]+')"#);
        assert_eq!(
            pg(r#"REGEX_REPLACE(s, "a", "b")"#),
            r#"REGEXP_REPLACE("s", 'a', 'b', 'g')"#
        );
    }
}

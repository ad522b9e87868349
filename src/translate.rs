use std::{
    collections::HashMap,
    fmt,
    ops::RangeBounds,
    sync::LazyLock,
};

use regex::Regex;
use tracing::{debug, trace};

use crate::{
    aggregate::SemanticType,
    ast::{BinaryOp, Expr, Literal},
    dialect::Dialect,
    functions::{CanonicalFunction as F, MappingEntry},
    parser,
    to_sql::{self, ToSQL},
};

pub mod common;
pub mod mssql;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("valid number regex")
});

static SQL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid name regex"));

/// How literal values reach the SQL text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LiteralMode {
    /// Escaped SQL literals written into the text
    #[default]
    Inline,
    /// Dialect placeholders, values collected in `Fragment::params`
    Bound,
}

/// What to do with a function name the formula language doesn't define.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnknownFunctionPolicy {
    /// Emit the call unchanged and let the database decide
    #[default]
    Permissive,
    Strict,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CompileOptions {
    pub literal_mode: LiteralMode,
    pub unknown_functions: UnknownFunctionPolicy,
    /// Formulas nesting deeper than this are rejected before compilation.
    ///  Formula text is always parsed with a limit, [parser::DEFAULT_MAX_DEPTH]
    ///  when this is unset.
    pub max_depth: Option<usize>,
}

impl CompileOptions {
    pub fn with_literal_mode(mut self, mode: LiteralMode) -> Self {
        self.literal_mode = mode;
        self
    }

    pub fn with_unknown_functions(mut self, policy: UnknownFunctionPolicy) -> Self {
        self.unknown_functions = policy;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSql {
    /// A physical column, quoted on output
    Name(String),
    /// A pre-built SQL expression (nested formula, lookup), parenthesized on
    ///  output
    Expr(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub sql: ColumnSql,
    pub semantic_type: Option<SemanticType>,
}

impl ResolvedColumn {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            sql: ColumnSql::Name(name.into()),
            semantic_type: None,
        }
    }

    pub fn expr(sql: impl Into<String>) -> Self {
        Self {
            sql: ColumnSql::Expr(sql.into()),
            semantic_type: None,
        }
    }

    pub fn with_type(mut self, ty: SemanticType) -> Self {
        self.semantic_type = Some(ty);
        self
    }
}

/// Maps the identifiers of a formula to columns. Implemented for alias maps
///  and for closures so callers can resolve lazily.
pub trait ColumnResolver {
    fn resolve(&self, name: &str) -> Option<ResolvedColumn>;
}

impl ColumnResolver for HashMap<String, ResolvedColumn> {
    fn resolve(&self, name: &str) -> Option<ResolvedColumn> {
        self.get(name).cloned()
    }
}

impl<Func> ColumnResolver for Func
where
    Func: Fn(&str) -> Option<ResolvedColumn>,
{
    fn resolve(&self, name: &str) -> Option<ResolvedColumn> {
        self(name)
    }
}

/// Compiled SQL text plus the values bound to its placeholders, in
///  placeholder order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub sql: String,
    pub params: Vec<Literal>,
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] parser::Error),
    #[error("Unresolved identifier: {0}")]
    UnresolvedIdentifier(String),
    #[error("Cannot emit {function} for {dialect}: {reason}")]
    FunctionEmission {
        function: String,
        dialect: Dialect,
        reason: EmitError,
    },
    #[error("Unsupported function: {0}")]
    UnsupportedFunction(String),
    #[error("Invalid literal: {0}")]
    InvalidLiteral(String),
    #[error("Invalid name: {0:?}")]
    InvalidName(String),
    #[error("Formula is nested more than {0} levels deep")]
    TooDeep(usize),
}

/// Why an emitter refused a call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    #[error("called with an incorrect number of arguments (got {0})")]
    IncorrectArgCount(usize),
    #[error("argument {0} must be a string literal")]
    ExpectedStringLiteral(usize),
    #[error("unknown interval unit {0:?}")]
    UnknownUnit(String),
    #[error("the engine has no equivalent")]
    NoEquivalent,
}

/// Units accepted by DATEADD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::EnumString, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum IntervalUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// The operator an expression is nested under, if any.
type Enclosing = Option<(BinaryOp, Side)>;

/// Does `child`, appearing on `side` of `parent`, need parentheses to keep
///  its meaning?
fn needs_parens(child: BinaryOp, parent: BinaryOp, side: Side) -> bool {
    let (c, p) = (child.precedence(), parent.precedence());
    // `||` sits at a different level on every engine
    if c != p && (child == BinaryOp::Concat || parent == BinaryOp::Concat) {
        return true;
    }
    match c.cmp(&p) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Greater => false,
        std::cmp::Ordering::Equal => side == Side::Right || parent.is_comparison(),
    }
}

/// Does `expr` compile to a predicate rather than a selectable value?
fn is_predicate(expr: &Expr) -> bool {
    match expr {
        Expr::Binary { op, .. } => op.is_comparison() || op.is_logical(),
        Expr::Call { callee, .. } => matches!(
            callee.parse::<F>(),
            Ok(F::AND | F::OR | F::NOT | F::ISBLANK | F::ISNOTBLANK | F::REGEX_MATCH)
        ),
        Expr::Literal(_) | Expr::Identifier(_) => false,
    }
}

/// Is `expr` known to be text without looking at column types?
fn is_text(expr: &Expr) -> bool {
    match expr {
        Expr::Literal(Literal::String(_)) => true,
        Expr::Binary { op, .. } => *op == BinaryOp::Concat,
        Expr::Call { callee, .. } => matches!(
            callee.parse::<F>(),
            Ok(F::CONCAT
                | F::URL
                | F::LOWER
                | F::UPPER
                | F::TRIM
                | F::REPLACE
                | F::REPEAT
                | F::LEFT
                | F::RIGHT
                | F::MID
                | F::SUBSTR
                | F::REGEX_EXTRACT
                | F::REGEX_REPLACE)
        ),
        _ => false,
    }
}

/// Prefixes a unary minus, keeping `--` from starting a comment.
pub(crate) fn negate(sql: &str) -> String {
    if sql.starts_with('-') {
        format!("-({sql})")
    } else {
        format!("-{sql}")
    }
}

/// Formats the UI accepts for date values.
fn is_date_literal(s: &str) -> bool {
    use chrono::{DateTime, NaiveDate, NaiveDateTime};

    const DATES: [&str; 6] = [
        "%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%d/%m/%Y", "%m-%d-%Y", "%m/%d/%Y",
    ];
    const DATE_TIMES: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];

    let s = s.trim();
    DATES.iter().any(|f| NaiveDate::parse_from_str(s, f).is_ok())
        || DATE_TIMES
            .iter()
            .any(|f| NaiveDateTime::parse_from_str(s, f).is_ok())
        || DateTime::parse_from_rfc3339(s).is_ok()
}

/// Recursive SQL generator for one formula on one dialect. Emitters receive
///  the compiler so they can compile their arguments; they must do so in the
///  order the arguments appear in their output.
pub struct Compiler<'a> {
    dialect: Dialect,
    resolver: &'a dyn ColumnResolver,
    options: CompileOptions,
    params: Vec<Literal>,
}

impl<'a> Compiler<'a> {
    pub fn new(dialect: Dialect, resolver: &'a dyn ColumnResolver, options: CompileOptions) -> Self {
        Self {
            dialect,
            resolver,
            options,
            params: Vec::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Compiles a standalone value (function argument, CASE branch...).
    pub fn compile(&mut self, expr: &Expr) -> Result<String, Error> {
        self.value(expr, None)
    }

    /// Compiles `expr` as the `side` operand of `op`. Operands of AND and OR
    ///  are conditions, all others are values.
    pub fn compile_operand(&mut self, expr: &Expr, op: BinaryOp, side: Side) -> Result<String, Error> {
        if op.is_logical() {
            self.condition(expr, Some((op, side)))
        } else {
            self.value(expr, Some((op, side)))
        }
    }

    /// Compiles a standalone condition (WHEN clause, NOT operand).
    pub fn compile_condition(&mut self, expr: &Expr) -> Result<String, Error> {
        self.condition(expr, None)
    }

    pub fn into_fragment(self, sql: String) -> Fragment {
        Fragment {
            sql,
            params: self.params,
        }
    }

    // A predicate used as a value reads as a two-valued boolean: false
    //  rather than NULL when an operand is NULL. SQL Server can't select a
    //  predicate at all.
    fn value(&mut self, expr: &Expr, enclosing: Enclosing) -> Result<String, Error> {
        if !is_predicate(expr) {
            return self.compile_in(expr, enclosing);
        }
        let predicate = self.compile_in(expr, None)?;
        Ok(match self.dialect {
            Dialect::MySql => format!("IFNULL({predicate}, FALSE)"),
            dialect => format!(
                "CASE WHEN {predicate} THEN {} ELSE {} END",
                dialect.bool_literal(true),
                dialect.bool_literal(false)
            ),
        })
    }

    // SQL Server has no boolean type: values are tested against 1
    fn condition(&mut self, expr: &Expr, enclosing: Enclosing) -> Result<String, Error> {
        if self.dialect != Dialect::MsSql || is_predicate(expr) {
            return self.compile_in(expr, enclosing);
        }
        let value = self.value(expr, Some((BinaryOp::Eq, Side::Left)))?;
        let sql = format!("{value} = 1");
        Ok(match enclosing {
            Some((parent, side)) if needs_parens(BinaryOp::Eq, parent, side) => to_sql::parenthesize(&sql),
            _ => sql,
        })
    }

    fn compile_in(&mut self, expr: &Expr, enclosing: Enclosing) -> Result<String, Error> {
        match expr {
            Expr::Literal(lit) => self.literal(lit),
            Expr::Identifier(name) => self.identifier(name),
            Expr::Call { callee, args } => self.call(callee, args, enclosing),
            Expr::Binary { op, left, right } => self.binary(*op, left, right, enclosing),
        }
    }

    pub fn literal(&mut self, lit: &Literal) -> Result<String, Error> {
        if let Literal::Number(text) = lit {
            if !NUMBER.is_match(text) {
                return Err(Error::InvalidLiteral(text.clone()));
            }
        }
        match (self.options.literal_mode, lit) {
            (_, Literal::Null) | (LiteralMode::Inline, _) => Ok(lit.to_sql(self.dialect)),
            (LiteralMode::Bound, _) => {
                self.params.push(lit.clone());
                Ok(self.dialect.placeholder(self.params.len()))
            }
        }
    }

    fn identifier(&self, name: &str) -> Result<String, Error> {
        let column = self
            .resolver
            .resolve(name)
            .ok_or_else(|| Error::UnresolvedIdentifier(name.to_string()))?;
        Ok(match column.sql {
            ColumnSql::Name(name) => self.dialect.quote_ident(&name),
            ColumnSql::Expr(sql) => to_sql::parenthesize(&sql),
        })
    }

    /// Builds the `FunctionEmission` error for `function` on this dialect.
    pub fn emission(&self, function: F, reason: EmitError) -> Error {
        Error::FunctionEmission {
            function: function.to_string(),
            dialect: self.dialect,
            reason,
        }
    }

    pub fn expect_args(
        &self,
        function: F,
        args: &[Expr],
        count: impl RangeBounds<usize>,
    ) -> Result<(), Error> {
        if count.contains(&args.len()) {
            Ok(())
        } else {
            Err(self.emission(function, EmitError::IncorrectArgCount(args.len())))
        }
    }

    /// Reads the DATEADD unit, which must be a string literal.
    pub fn interval_unit(&self, function: F, args: &[Expr], index: usize) -> Result<IntervalUnit, Error> {
        let unit = args
            .get(index)
            .and_then(Expr::as_string_literal)
            .ok_or_else(|| self.emission(function, EmitError::ExpectedStringLiteral(index)))?;
        unit.to_ascii_lowercase()
            .parse()
            .map_err(|_| self.emission(function, EmitError::UnknownUnit(unit.to_string())))
    }

    /// Emits `name(args...)` after checking `name` is a plain SQL identifier.
    pub fn call_named(&mut self, name: &str, args: &[Expr]) -> Result<String, Error> {
        if !SQL_NAME.is_match(name) {
            return Err(Error::InvalidName(name.to_string()));
        }
        let args = args
            .iter()
            .map(|arg| self.compile(arg))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(to_sql::fn_call(name, &args))
    }

    fn call(&mut self, callee: &str, args: &[Expr], enclosing: Enclosing) -> Result<String, Error> {
        let Ok(function) = callee.parse::<F>() else {
            return match self.options.unknown_functions {
                UnknownFunctionPolicy::Strict => Err(Error::UnsupportedFunction(callee.to_string())),
                UnknownFunctionPolicy::Permissive => {
                    debug!(callee, dialect = %self.dialect, "passing unknown function through");
                    self.call_named(callee, args)
                }
            };
        };

        if let Some(rewritten) = self.rewrite(function, args)? {
            debug!(%function, dialect = %self.dialect, "rewrote call");
            return self.value(&rewritten, enclosing);
        }

        match function {
            F::IF => return self.if_case(args),
            F::SWITCH => return self.switch_case(args),
            _ => {}
        }

        let entry = self
            .dialect
            .functions()
            .get(function)
            .or_else(|| common::FUNCTIONS.get(function));
        let sql = match entry {
            Some(MappingEntry::Emitter(emit)) => emit(self, args)?,
            Some(MappingEntry::Rename(name)) => self.call_named(name, args)?,
            Some(MappingEntry::Unsupported) => return Err(self.emission(function, EmitError::NoEquivalent)),
            Some(MappingEntry::PassThrough) | None => self.call_named(callee, args)?,
        };

        // NOT binds looser than any operator it could sit under
        if function == F::NOT && enclosing.is_some() {
            Ok(to_sql::parenthesize(&sql))
        } else {
            Ok(sql)
        }
    }

    /// Dialect-independent call rewrites into other AST nodes.
    fn rewrite(&self, function: F, args: &[Expr]) -> Result<Option<Expr>, Error> {
        let rewritten = match function {
            F::ADD | F::SUM => {
                self.expect_args(function, args, 1..)?;
                Expr::fold_right(BinaryOp::Add, args)
            }
            F::AVG => {
                self.expect_args(function, args, 1..)?;
                Some(Expr::binary(
                    BinaryOp::Div,
                    Expr::call(F::ADD.to_string(), args.to_vec()),
                    Expr::number(args.len()),
                ))
            }
            F::URL => {
                self.expect_args(function, args, 1..=2)?;
                let mut parts = vec![Expr::string("URI::("), args[0].clone(), Expr::string(")")];
                if let Some(label) = args.get(1) {
                    parts.extend([Expr::string(" LABEL::("), label.clone(), Expr::string(")")]);
                }
                Some(Expr::call(F::CONCAT.to_string(), parts))
            }
            F::MID => Some(Expr::call(F::SUBSTR.to_string(), args.to_vec())),
            _ => None,
        };
        Ok(rewritten)
    }

    // Nested IFs in the else position are flattened into a single CASE:
    //   IF(a, v1, IF(b, v2, v3))
    // is always equivalent to:
    //   CASE WHEN a THEN v1 WHEN b THEN v2 ELSE v3 END
    fn if_case(&mut self, args: &[Expr]) -> Result<String, Error> {
        let mut sql = String::from("CASE");
        let mut current = args;
        loop {
            match current {
                [cond, then] => {
                    self.when_then(&mut sql, cond, then)?;
                    break;
                }
                [cond, then, otherwise] => {
                    self.when_then(&mut sql, cond, then)?;
                    match otherwise {
                        Expr::Call { callee, args } if callee == "IF" && (2..=3).contains(&args.len()) => {
                            current = args;
                        }
                        _ => {
                            sql.push_str(" ELSE ");
                            sql.push_str(&self.compile(otherwise)?);
                            break;
                        }
                    }
                }
                _ => return Err(self.emission(F::IF, EmitError::IncorrectArgCount(current.len()))),
            }
        }
        sql.push_str(" END");
        Ok(sql)
    }

    fn when_then(&mut self, sql: &mut String, cond: &Expr, then: &Expr) -> Result<(), Error> {
        let cond = self.compile_condition(cond)?;
        let then = self.compile(then)?;
        sql.push_str(&format!(" WHEN {cond} THEN {then}"));
        Ok(())
    }

    // SWITCH(expr, pattern1, value1, ..., [default])
    fn switch_case(&mut self, args: &[Expr]) -> Result<String, Error> {
        self.expect_args(F::SWITCH, args, 3..)?;
        let mut sql = format!("CASE {}", self.compile(&args[0])?);
        let pairs = args[1..].chunks_exact(2);
        let default = pairs.remainder().first();
        // the patterns are values compared with the subject
        for pair in pairs {
            let pattern = self.compile(&pair[0])?;
            let then = self.compile(&pair[1])?;
            sql.push_str(&format!(" WHEN {pattern} THEN {then}"));
        }
        if let Some(default) = default {
            sql.push_str(" ELSE ");
            sql.push_str(&self.compile(default)?);
        }
        sql.push_str(" END");
        Ok(sql)
    }

    fn binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, enclosing: Enclosing) -> Result<String, Error> {
        if let Some(sql) = self.comparison_rewrite(op, left, right, enclosing)? {
            return Ok(sql);
        }

        let sql = match op {
            BinaryOp::Concat if !self.dialect.has_concat_operator() => {
                let l = self.compile(left)?;
                let r = self.compile(right)?;
                return Ok(to_sql::fn_call("CONCAT", &[l, r]));
            }
            // Postgres has `||` for text only, one text side is enough
            BinaryOp::Concat if self.dialect == Dialect::Postgres && !is_text(left) && !is_text(right) => {
                let l = self.compile(left)?;
                let r = self.compile_operand(right, op, Side::Right)?;
                format!("CAST({l} AS {}) {} {r}", self.dialect.text_type(), op.to_sql(self.dialect))
            }
            BinaryOp::Div => {
                let l = self.call(&F::FLOAT.to_string(), std::slice::from_ref(left), None)?;
                let r = self.compile_operand(right, op, Side::Right)?;
                format!("{l} / {r}")
            }
            _ => {
                let l = self.compile_operand(left, op, Side::Left)?;
                let r = self.compile_operand(right, op, Side::Right)?;
                format!("{l} {} {r}", op.to_sql(self.dialect))
            }
        };

        Ok(match enclosing {
            Some((parent, side)) if needs_parens(op, parent, side) => to_sql::parenthesize(&sql),
            _ => sql,
        })
    }

    fn is_date_column(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Identifier(name) => self
                .resolver
                .resolve(name)
                .is_some_and(|c| c.semantic_type == Some(SemanticType::Date)),
            _ => false,
        }
    }

    /// Comparisons against string literals that would misbehave if emitted
    ///  as written: blank tests, and on Postgres, Date columns compared with
    ///  text that isn't a date.
    fn comparison_rewrite(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        enclosing: Enclosing,
    ) -> Result<Option<String>, Error> {
        if !op.is_comparison() {
            return Ok(None);
        }
        let (subject, value) = match (left.as_string_literal(), right.as_string_literal()) {
            (None, Some(value)) => (left, value),
            (Some(value), None) => (right, value),
            _ => return Ok(None),
        };

        if self.dialect == Dialect::Postgres && self.is_date_column(subject) {
            let test = if value.is_empty() && op == BinaryOp::Eq {
                "IS NULL"
            } else if value.is_empty() || !is_date_literal(value) {
                "IS NOT NULL"
            } else {
                return Ok(None);
            };
            let x = self.compile(subject)?;
            let sql = format!("{x} {test}");
            return Ok(Some(match enclosing {
                Some(_) => to_sql::parenthesize(&sql),
                None => sql,
            }));
        }

        if !value.is_empty() {
            return Ok(None);
        }
        let text = self.dialect.text_type();
        let sql = match op {
            BinaryOp::Eq => {
                let x = self.compile(subject)?;
                let y = self.compile(subject)?;
                format!("({x} IS NULL OR CAST({y} AS {text}) = '')")
            }
            BinaryOp::Ne => {
                let x = self.compile(subject)?;
                let y = self.compile(subject)?;
                format!("({x} IS NOT NULL AND CAST({y} AS {text}) != '')")
            }
            _ => return Ok(None),
        };
        Ok(Some(sql))
    }
}

/// Compiles an expression tree with default options.
pub fn compile(
    expr: &Expr,
    dialect: Dialect,
    resolver: &dyn ColumnResolver,
    alias: Option<&str>,
) -> Result<Fragment, Error> {
    compile_with(expr, dialect, resolver, alias, &CompileOptions::default())
}

pub fn compile_with(
    expr: &Expr,
    dialect: Dialect,
    resolver: &dyn ColumnResolver,
    alias: Option<&str>,
    options: &CompileOptions,
) -> Result<Fragment, Error> {
    if let Some(max) = options.max_depth {
        if expr.depth() > max {
            return Err(Error::TooDeep(max));
        }
    }

    let mut cx = Compiler::new(dialect, resolver, options.clone());
    let mut sql = cx.compile(expr)?;
    if let Some(alias) = alias {
        if alias.is_empty() || alias.chars().any(char::is_control) {
            return Err(Error::InvalidName(alias.to_string()));
        }
        sql = format!("{sql} AS {}", dialect.quote_ident(alias));
    }
    trace!(%dialect, %sql, "compiled formula");
    Ok(cx.into_fragment(sql))
}

/// Parses and compiles formula text with default options.
pub fn compile_formula(
    text: &str,
    dialect: Dialect,
    resolver: &dyn ColumnResolver,
    alias: Option<&str>,
) -> Result<Fragment, Error> {
    compile_formula_with(text, dialect, resolver, alias, &CompileOptions::default())
}

pub fn compile_formula_with(
    text: &str,
    dialect: Dialect,
    resolver: &dyn ColumnResolver,
    alias: Option<&str>,
    options: &CompileOptions,
) -> Result<Fragment, Error> {
    let max_depth = options.max_depth.unwrap_or(parser::DEFAULT_MAX_DEPTH);
    let expr = parser::parse_with_max_depth(text, max_depth)?;
    compile_with(&expr, dialect, resolver, alias, options)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;

    pub(crate) fn columns() -> HashMap<String, ResolvedColumn> {
        HashMap::from([
            ("a".to_string(), ResolvedColumn::name("a")),
            ("b".to_string(), ResolvedColumn::name("b")),
            ("c".to_string(), ResolvedColumn::name("c")),
            ("x".to_string(), ResolvedColumn::name("x")),
            ("s".to_string(), ResolvedColumn::name("s")),
            (
                "Due".to_string(),
                ResolvedColumn::name("due_date").with_type(SemanticType::Date),
            ),
            (
                "Total".to_string(),
                ResolvedColumn::expr("\"price\" * \"qty\""),
            ),
        ])
    }

    /// Compiles `text` on `dialect` against [columns], inline literals.
    pub(crate) fn sql(text: &str, dialect: Dialect) -> String {
        compile_formula(text, dialect, &columns(), None)
            .expect("formula compiles")
            .sql
    }

    pub(crate) fn bound(text: &str, dialect: Dialect) -> Fragment {
        let options = CompileOptions::default().with_literal_mode(LiteralMode::Bound);
        compile_formula_with(text, dialect, &columns(), None, &options).expect("formula compiles")
    }

    #[test]
    fn add_folds_right() {
        for dialect in Dialect::iter() {
            assert_eq!(sql("ADD(1, 2, 3)", dialect), "1 + (2 + 3)");
            assert_eq!(sql("SUM(7)", dialect), "7");
        }
    }

    #[test]
    fn precedence() {
        assert_eq!(sql("a + b * c", Dialect::Postgres), r#""a" + "b" * "c""#);
        assert_eq!(sql("(a + b) * c", Dialect::Postgres), r#"("a" + "b") * "c""#);
        assert_eq!(sql("a - b - c", Dialect::Postgres), r#""a" - "b" - "c""#);
        assert_eq!(sql("a - (b - c)", Dialect::Postgres), r#""a" - ("b" - "c")"#);
        assert_eq!(
            sql("a > 1 && (b < 2 || c = 3)", Dialect::Postgres),
            r#"CASE WHEN "a" > 1 AND ("b" < 2 OR "c" = 3) THEN true ELSE false END"#
        );
        assert_eq!(sql("ADD(a, b) * c", Dialect::MySql), "(`a` + `b`) * `c`");
    }

    #[test]
    fn division_is_float() {
        assert_eq!(sql("a / b", Dialect::Postgres), r#"CAST("a" AS DOUBLE PRECISION) / "b""#);
        assert_eq!(sql("a / b", Dialect::MySql), "CAST(`a` AS DOUBLE) / `b`");
        assert_eq!(sql("a / b", Dialect::Sqlite), r#"CAST("a" AS REAL) / "b""#);
        assert_eq!(sql("a / b", Dialect::MsSql), "CAST([a] AS FLOAT) / [b]");
        assert_eq!(
            sql("a / (b * c)", Dialect::Sqlite),
            r#"CAST("a" AS REAL) / ("b" * "c")"#
        );
    }

    #[test]
    fn concat() {
        assert_eq!(
            sql("CONCAT(a, b, c)", Dialect::Sqlite),
            r#"(COALESCE("a", '') || COALESCE("b", '') || COALESCE("c", ''))"#
        );
        assert_eq!(sql("CONCAT(a, b, c)", Dialect::MySql), "CONCAT_WS('', `a`, `b`, `c`)");
        assert_eq!(sql("a & 'x'", Dialect::Postgres), r#""a" || 'x'"#);
        assert_eq!(sql("a & 'x'", Dialect::MsSql), "CONCAT([a], N'x')");
        assert_eq!(sql("a & b", Dialect::Sqlite), r#""a" || "b""#);
    }

    #[test]
    fn postgres_concat_needs_text() {
        assert_eq!(sql("1 & 2", Dialect::Postgres), "CAST(1 AS TEXT) || 2");
        assert_eq!(
            sql("a & b + 1", Dialect::Postgres),
            r#"CAST("a" AS TEXT) || ("b" + 1)"#
        );
        assert_eq!(sql("1 & UPPER(s)", Dialect::Postgres), r#"1 || UPPER("s")"#);
        assert_eq!(
            sql("a & b & 'x'", Dialect::Postgres),
            r#"CAST("a" AS TEXT) || "b" || 'x'"#
        );
    }

    #[test]
    fn if_is_case_everywhere() {
        assert_eq!(
            sql(r#"IF(x > 0, "pos", "neg")"#, Dialect::Postgres),
            r#"CASE WHEN "x" > 0 THEN 'pos' ELSE 'neg' END"#
        );
        assert_eq!(
            sql(r#"IF(x > 0, "pos", "neg")"#, Dialect::Sqlite),
            r#"CASE WHEN "x" > 0 THEN 'pos' ELSE 'neg' END"#
        );
        assert_eq!(
            sql(r#"IF(x > 0, "pos", "neg")"#, Dialect::MySql),
            "CASE WHEN `x` > 0 THEN 'pos' ELSE 'neg' END"
        );
        assert_eq!(
            sql(r#"IF(x > 0, "pos", "neg")"#, Dialect::MsSql),
            "CASE WHEN [x] > 0 THEN N'pos' ELSE N'neg' END"
        );
        assert_eq!(
            sql(r#"IF(x > 0, "pos")"#, Dialect::Postgres),
            r#"CASE WHEN "x" > 0 THEN 'pos' END"#
        );
    }

    #[test]
    fn predicates_select_as_booleans() {
        assert_eq!(
            sql("a = 1", Dialect::Postgres),
            r#"CASE WHEN "a" = 1 THEN true ELSE false END"#
        );
        assert_eq!(sql("a = 1", Dialect::Sqlite), r#"CASE WHEN "a" = 1 THEN 1 ELSE 0 END"#);
        assert_eq!(sql("a = 1", Dialect::MySql), "IFNULL(`a` = 1, FALSE)");
        assert_eq!(sql("a = 1", Dialect::MsSql), "CASE WHEN [a] = 1 THEN 1 ELSE 0 END");
        assert_eq!(sql("a > 1", Dialect::MsSql), "CASE WHEN [a] > 1 THEN 1 ELSE 0 END");

        // operands and arguments are values too
        assert_eq!(
            sql("(a > 1) + 1", Dialect::MsSql),
            "CASE WHEN [a] > 1 THEN 1 ELSE 0 END + 1"
        );
        assert_eq!(
            sql("CONCAT(a, b = 2)", Dialect::MsSql),
            "CONCAT([a], CASE WHEN [b] = 2 THEN 1 ELSE 0 END)"
        );

        // conditions stay bare
        assert_eq!(
            sql("IF(a = 1, 'y', 'n')", Dialect::MsSql),
            "CASE WHEN [a] = 1 THEN N'y' ELSE N'n' END"
        );
        assert_eq!(
            compile_formula("a = 1", Dialect::MsSql, &columns(), Some("flag")).map(|f| f.sql),
            Ok("CASE WHEN [a] = 1 THEN 1 ELSE 0 END AS [flag]".to_string())
        );
    }

    #[test]
    fn nested_ifs_flatten() {
        assert_eq!(
            sql(r#"IF(x > 10, "big", IF(x > 0, "small", "none"))"#, Dialect::Postgres),
            r#"CASE WHEN "x" > 10 THEN 'big' WHEN "x" > 0 THEN 'small' ELSE 'none' END"#
        );
        // an IF in the THEN position stays nested
        assert_eq!(
            sql(r#"IF(a, IF(b, 1, 2), 3)"#, Dialect::Sqlite),
            r#"CASE WHEN "a" THEN CASE WHEN "b" THEN 1 ELSE 2 END ELSE 3 END"#
        );
        // SQL Server tests plain values against 1
        assert_eq!(
            sql(r#"IF(a, IF(b, 1, 2), 3)"#, Dialect::MsSql),
            "CASE WHEN [a] = 1 THEN CASE WHEN [b] = 1 THEN 1 ELSE 2 END ELSE 3 END"
        );
    }

    #[test]
    fn switch() {
        assert_eq!(
            sql(r#"SWITCH(x, 1, "one", 2, "two", "many")"#, Dialect::MySql),
            "CASE `x` WHEN 1 THEN 'one' WHEN 2 THEN 'two' ELSE 'many' END"
        );
        assert_eq!(
            sql(r#"SWITCH(x, 1, "one")"#, Dialect::Postgres),
            r#"CASE "x" WHEN 1 THEN 'one' END"#
        );
        // patterns are values, not conditions
        assert_eq!(
            sql(r#"SWITCH(x, 1, "one")"#, Dialect::MsSql),
            "CASE [x] WHEN 1 THEN N'one' END"
        );
        assert!(matches!(
            compile_formula("SWITCH(x, 1)", Dialect::Postgres, &columns(), None),
            Err(Error::FunctionEmission { .. })
        ));
    }

    #[test]
    fn structural_rewrites() {
        assert_eq!(
            sql("AVG(a, b)", Dialect::Postgres),
            r#"CAST("a" + "b" AS DOUBLE PRECISION) / 2"#
        );
        assert_eq!(
            sql("URL(s)", Dialect::MySql),
            "CONCAT_WS('', 'URI::(', `s`, ')')"
        );
        assert_eq!(
            sql(r#"URL(s, "home")"#, Dialect::Sqlite),
            r#"('URI::(' || COALESCE("s", '') || ')' || ' LABEL::(' || 'home' || ')')"#
        );
        assert_eq!(sql("MID(s, 2, 3)", Dialect::Postgres), r#"SUBSTR("s", 2, 3)"#);
    }

    #[test]
    fn literals_inline() {
        assert_eq!(sql("'it\\'s'", Dialect::Postgres), "'it''s'");
        assert_eq!(sql("TRUE", Dialect::Postgres), "true");
        assert_eq!(sql("TRUE", Dialect::MsSql), "1");
        assert_eq!(sql("null", Dialect::MySql), "NULL");
        assert_eq!(sql("-2.5e3", Dialect::Sqlite), "-2.5e3");

        let bad = Expr::Literal(Literal::Number("1; DROP TABLE t".into()));
        assert_eq!(
            compile(&bad, Dialect::Postgres, &columns(), None),
            Err(Error::InvalidLiteral("1; DROP TABLE t".into()))
        );
    }

    #[test]
    fn bound_parameters_follow_placeholders() {
        let fragment = bound(r#"IF(x > 5, "a", "b")"#, Dialect::Postgres);
        assert_eq!(fragment.sql, r#"CASE WHEN "x" > $1 THEN $2 ELSE $3 END"#);
        assert_eq!(
            fragment.params,
            vec![
                Literal::Number("5".into()),
                Literal::String("a".into()),
                Literal::String("b".into()),
            ]
        );

        let fragment = bound(r#"x = null"#, Dialect::MsSql);
        assert_eq!(fragment.sql, "CASE WHEN [x] = NULL THEN 1 ELSE 0 END");
        assert!(fragment.params.is_empty());

        let fragment = bound(r#"a + 1 = 2"#, Dialect::MsSql);
        assert_eq!(fragment.sql, "CASE WHEN [a] + @p1 = @p2 THEN 1 ELSE 0 END");
    }

    #[test]
    fn identifiers() {
        assert_eq!(sql("Total * 2", Dialect::Postgres), r#"("price" * "qty") * 2"#);
        assert_eq!(
            compile_formula("nope + 1", Dialect::Postgres, &columns(), None),
            Err(Error::UnresolvedIdentifier("nope".into()))
        );

        let resolver = |name: &str| Some(ResolvedColumn::name(name.to_uppercase()));
        let fragment = compile_formula("{Unit Price} * 2", Dialect::MsSql, &resolver, None)
            .expect("formula compiles");
        assert_eq!(fragment.sql, "[UNIT PRICE] * 2");
    }

    #[test]
    fn alias() {
        let fragment = compile_formula("a + 1", Dialect::MySql, &columns(), Some("cl_total"))
            .expect("formula compiles");
        assert_eq!(fragment.to_string(), "`a` + 1 AS `cl_total`");
        assert_eq!(
            compile_formula("a", Dialect::MySql, &columns(), Some("")),
            Err(Error::InvalidName(String::new()))
        );
    }

    #[test]
    fn unknown_functions() {
        assert_eq!(sql("FOO(a, 1)", Dialect::Postgres), r#"FOO("a", 1)"#);

        let strict = CompileOptions::default().with_unknown_functions(UnknownFunctionPolicy::Strict);
        assert_eq!(
            compile_formula_with("FOO(a)", Dialect::Postgres, &columns(), None, &strict),
            Err(Error::UnsupportedFunction("FOO".into()))
        );
        // known names without a table entry still pass through in strict mode
        assert_eq!(
            compile_formula_with("UPPER(a)", Dialect::Postgres, &columns(), None, &strict)
                .map(|f| f.sql),
            Ok(r#"UPPER("a")"#.to_string())
        );

        let evil = Expr::call("x; DROP TABLE t", vec![]);
        assert_eq!(
            compile(&evil, Dialect::Sqlite, &columns(), None),
            Err(Error::InvalidName("x; DROP TABLE t".into()))
        );
    }

    #[test]
    fn blank_comparisons() {
        assert_eq!(
            sql("s = ''", Dialect::Postgres),
            r#"CASE WHEN ("s" IS NULL OR CAST("s" AS TEXT) = '') THEN true ELSE false END"#
        );
        assert_eq!(
            sql("'' != s", Dialect::MsSql),
            "CASE WHEN ([s] IS NOT NULL AND CAST([s] AS NVARCHAR(MAX)) != '') THEN 1 ELSE 0 END"
        );
        assert_eq!(
            sql("s = '' || a > 1", Dialect::MySql),
            "IFNULL((`s` IS NULL OR CAST(`s` AS CHAR) = '') OR `a` > 1, FALSE)"
        );
    }

    #[test]
    fn postgres_date_comparisons() {
        let pg = |text: &str| sql(&format!("IF({text}, 1, 0)"), Dialect::Postgres);
        assert_eq!(pg("Due = ''"), r#"CASE WHEN "due_date" IS NULL THEN 1 ELSE 0 END"#);
        assert_eq!(pg("Due != ''"), r#"CASE WHEN "due_date" IS NOT NULL THEN 1 ELSE 0 END"#);
        assert_eq!(pg("Due > 'soon'"), r#"CASE WHEN "due_date" IS NOT NULL THEN 1 ELSE 0 END"#);
        assert_eq!(
            pg("Due > '2024-01-31'"),
            r#"CASE WHEN "due_date" > '2024-01-31' THEN 1 ELSE 0 END"#
        );
        assert_eq!(
            pg("Due = '' && a > 1"),
            r#"CASE WHEN ("due_date" IS NULL) AND "a" > 1 THEN 1 ELSE 0 END"#
        );
        // other engines compare as written
        assert_eq!(
            sql("IF(Due > 'soon', 1, 0)", Dialect::Sqlite),
            r#"CASE WHEN "due_date" > 'soon' THEN 1 ELSE 0 END"#
        );
    }

    #[test]
    fn date_literal_formats() {
        assert!(is_date_literal("2024-01-31"));
        assert!(is_date_literal("31/01/2024"));
        assert!(is_date_literal("2024-01-31 10:30:00"));
        assert!(is_date_literal("2024-01-31T10:30:00+02:00"));
        assert!(!is_date_literal("soon"));
        assert!(!is_date_literal("2024-13-45"));
    }

    #[test]
    fn depth_limit() {
        let text = "ADD(1, ADD(2, ADD(3, 4)))";
        let options = CompileOptions::default().with_max_depth(3);
        assert_eq!(
            compile_formula_with(text, Dialect::Postgres, &columns(), None, &options),
            Err(Error::Parse(parser::Error::TooDeep(3)))
        );

        let expr = parser::parse(text).expect("a valid parse");
        assert_eq!(
            compile_with(&expr, Dialect::Postgres, &columns(), None, &options),
            Err(Error::TooDeep(3))
        );
    }

    #[test]
    fn deep_formulas_are_errors() {
        let deep = format!("{}1{}", "(".repeat(5000), ")".repeat(5000));
        let options = CompileOptions::default().with_max_depth(64);
        assert_eq!(
            compile_formula_with(&deep, Dialect::Postgres, &columns(), None, &options),
            Err(Error::Parse(parser::Error::TooDeep(64)))
        );
        // the parser's own limit applies without one
        assert_eq!(
            compile_formula(&deep, Dialect::MsSql, &columns(), None),
            Err(Error::Parse(parser::Error::TooDeep(parser::DEFAULT_MAX_DEPTH)))
        );
        let chain = vec!["a"; 5000].join(" & ");
        assert!(matches!(
            compile_formula(&chain, Dialect::Sqlite, &columns(), None),
            Err(Error::Parse(parser::Error::TooDeep(_)))
        ));
    }

    const FIXTURES: [&str; 13] = [
        "a + b * c",
        r#"IF(x > 10, "big", IF(x > 0, "small", "none"))"#,
        r#"SWITCH(x, 1, "one", "many")"#,
        r#"CONCAT(a, " ", b)"#,
        "ROUND(a / b, 2)",
        r#"DATEADD(Due, 2, "day")"#,
        "ISBLANK(s) || Due = ''",
        r#"SEARCH(s, "lo") > 0"#,
        "MIN(a, b, c)",
        "RIGHT(s, 2) & LEFT(s, 1)",
        "AVG(a, b, 3)",
        r#"URL(s, "home")"#,
        "NOT(a = 1) && TRUE()",
    ];

    #[test]
    fn compilation_is_deterministic() {
        let modes = [
            CompileOptions::default(),
            CompileOptions::default().with_literal_mode(LiteralMode::Bound),
        ];
        for dialect in Dialect::iter() {
            for text in FIXTURES {
                for options in &modes {
                    let first = compile_formula_with(text, dialect, &columns(), Some("out"), options);
                    let second = compile_formula_with(text, dialect, &columns(), Some("out"), options);
                    assert!(first.is_ok(), "{text} on {dialect}: {first:?}");
                    assert_eq!(first, second, "{text} on {dialect}");
                }
            }
        }
    }

    #[test]
    fn parse_errors_propagate() {
        assert!(matches!(
            compile_formula("a +", Dialect::Postgres, &columns(), None),
            Err(Error::Parse(_))
        ));
    }
}

use crate::{
    ast::{BinaryOp, Literal},
    dialect::Dialect,
};

/// Renders a value as inline SQL text for one dialect.
pub trait ToSQL {
    fn to_sql(&self, dialect: Dialect) -> String;
}

impl ToSQL for BinaryOp {
    fn to_sql(&self, _: Dialect) -> String {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Concat => "||",
        }
        .to_string()
    }
}

/// Number text must already be validated by the caller.
impl ToSQL for Literal {
    fn to_sql(&self, dialect: Dialect) -> String {
        match self {
            Literal::Number(v) => v.clone(),
            Literal::String(v) => quote_string_for(dialect, v),
            Literal::Bool(v) => dialect.bool_literal(*v).to_string(),
            Literal::Null => "NULL".to_string(),
        }
    }
}

/// Standard SQL escaping: a single quote is written twice.
pub fn escape_single_quotes(s: &str) -> String {
    s.replace('\'', "''")
}

pub fn quote_string(s: &str) -> String {
    format!("'{}'", escape_single_quotes(s))
}

/// MySQL treats backslash as an escape character inside string literals.
/// SQL Server literals take the `N` prefix so they stay Unicode.
pub fn quote_string_for(dialect: Dialect, s: &str) -> String {
    match dialect {
        Dialect::MySql => quote_string(&s.replace('\\', "\\\\")),
        Dialect::MsSql => format!("N{}", quote_string(s)),
        _ => quote_string(s),
    }
}

/// `NAME(a, b, c)`
pub fn fn_call<S: AsRef<str>>(name: &str, args: &[S]) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push_str(name);
    out.push('(');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(arg.as_ref());
    }
    out.push(')');
    out
}

pub fn parenthesize(sql: &str) -> String {
    format!("({sql})")
}

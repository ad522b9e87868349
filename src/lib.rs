//! Compiles spreadsheet-style formulas and column aggregations to SQL for
//! PostgreSQL, MySQL, SQLite and SQL Server.

pub mod aggregate;
pub mod ast;
pub mod dialect;
pub mod functions;
#[doc(hidden)]
pub mod fuzz_helper;
pub mod lex;
pub mod parser;
pub mod to_sql;
pub mod translate;

pub use aggregate::{AggregationKind, AggregationRequest, ColumnRef, SemanticType, compile_aggregation};
pub use dialect::Dialect;
pub use translate::{
    ColumnResolver, CompileOptions, Fragment, ResolvedColumn, compile, compile_formula,
    compile_formula_with, compile_with,
};

use crate::{
    aggregate::{self, AggregateIdioms},
    functions::FunctionTable,
    translate,
};

/// The SQL engines a formula can be compiled for. Parses from the driver
///  names used in connection configs (`pg`, `mysql2`, `sqlite3`, `mssql`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[strum(ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Dialect {
    #[strum(to_string = "pg", serialize = "postgres", serialize = "postgresql")]
    Postgres,
    #[strum(to_string = "mysql", serialize = "mysql2")]
    MySql,
    #[strum(to_string = "sqlite", serialize = "sqlite3")]
    Sqlite,
    #[strum(to_string = "mssql", serialize = "sqlserver")]
    MsSql,
}

impl Dialect {
    /// The function mapping table for this engine.
    pub fn functions(self) -> &'static FunctionTable {
        match self {
            Dialect::Postgres => &translate::postgres::FUNCTIONS,
            Dialect::MySql => &translate::mysql::FUNCTIONS,
            Dialect::Sqlite => &translate::sqlite::FUNCTIONS,
            Dialect::MsSql => &translate::mssql::FUNCTIONS,
        }
    }

    /// How this engine spells conditional counts, medians and the like.
    pub fn aggregate_idioms(self) -> &'static dyn AggregateIdioms {
        match self {
            Dialect::Postgres => &aggregate::postgres::Postgres,
            Dialect::MySql => &aggregate::mysql::MySql,
            Dialect::Sqlite => &aggregate::sqlite::Sqlite,
            Dialect::MsSql => &aggregate::mssql::MsSql,
        }
    }

    /// Quotes a column or alias name, doubling any embedded closing quote.
    pub fn quote_ident(self, name: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
            Dialect::MySql => format!("`{}`", name.replace('`', "``")),
            Dialect::MsSql => format!("[{}]", name.replace(']', "]]")),
        }
    }

    /// Placeholder for the `index`th bound value (1-based).
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
            Dialect::MsSql => format!("@p{index}"),
        }
    }

    pub fn bool_literal(self, value: bool) -> &'static str {
        match (self, value) {
            (Dialect::Postgres, true) => "true",
            (Dialect::Postgres, false) => "false",
            (Dialect::MySql, true) => "TRUE",
            (Dialect::MySql, false) => "FALSE",
            (Dialect::Sqlite | Dialect::MsSql, true) => "1",
            (Dialect::Sqlite | Dialect::MsSql, false) => "0",
        }
    }

    /// Target type when a value has to be compared as text.
    pub fn text_type(self) -> &'static str {
        match self {
            Dialect::Postgres | Dialect::Sqlite => "TEXT",
            Dialect::MySql => "CHAR",
            Dialect::MsSql => "NVARCHAR(MAX)",
        }
    }

    /// Target type of the FLOAT cast applied to division operands.
    pub fn float_type(self) -> &'static str {
        match self {
            Dialect::Postgres => "DOUBLE PRECISION",
            Dialect::MySql => "DOUBLE",
            Dialect::Sqlite => "REAL",
            Dialect::MsSql => "FLOAT",
        }
    }

    /// MySQL and SQL Server have no `||` string operator.
    pub fn has_concat_operator(self) -> bool {
        matches!(self, Dialect::Postgres | Dialect::Sqlite)
    }
}

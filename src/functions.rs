use std::{collections::HashMap, fmt};

use crate::{
    ast::Expr,
    translate::{Compiler, Error},
};

/// Canonical names of the formula language's functions. Lookup is
///  case-sensitive: formulas are expected to spell built-ins in upper case.
#[allow(non_camel_case_types, clippy::upper_case_acronyms)]
#[derive(
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::IntoStaticStr,
    strum_macros::EnumIter,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
)]
pub enum CanonicalFunction {
    ABS,
    ADD,
    AND,
    AVG,
    BLANK,
    CEILING,
    CONCAT,
    DATEADD,
    EXP,
    FALSE,
    FLOAT,
    FLOOR,
    IF,
    INT,
    ISBLANK,
    ISNOTBLANK,
    LEFT,
    LEN,
    LOG,
    LOWER,
    MAX,
    MID,
    MIN,
    MOD,
    NOT,
    NOW,
    OR,
    POWER,
    REGEX_EXTRACT,
    REGEX_MATCH,
    REGEX_REPLACE,
    REPEAT,
    REPLACE,
    RIGHT,
    ROUND,
    SEARCH,
    SQRT,
    SUBSTR,
    SUM,
    SWITCH,
    TRIM,
    TRUE,
    UPPER,
    URL,
}

/// Hand-written SQL generation for one function on one dialect. Emitters
///  compile their arguments through the compiler in the order the arguments
///  appear in the output text, so bound parameters line up with placeholders.
pub type Emitter = fn(&mut Compiler<'_>, &[Expr]) -> Result<String, Error>;

#[derive(Clone, Copy)]
pub enum MappingEntry {
    /// Emit `NAME(args...)` unchanged
    PassThrough,
    /// Emit `NEW_NAME(args...)`
    Rename(&'static str),
    Emitter(Emitter),
    /// The engine can't express the function; calls are rejected
    Unsupported,
}

impl fmt::Debug for MappingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingEntry::PassThrough => write!(f, "PassThrough"),
            MappingEntry::Rename(name) => write!(f, "Rename({name})"),
            MappingEntry::Emitter(_) => write!(f, "Emitter"),
            MappingEntry::Unsupported => write!(f, "Unsupported"),
        }
    }
}

/// One dialect's mapping from canonical function to strategy. Functions
///  missing from the table are passed through.
#[derive(Debug, Default)]
pub struct FunctionTable {
    entries: HashMap<CanonicalFunction, MappingEntry>,
}

impl FunctionTable {
    pub fn get(&self, function: CanonicalFunction) -> Option<MappingEntry> {
        self.entries.get(&function).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<const N: usize> From<[(CanonicalFunction, MappingEntry); N]> for FunctionTable {
    fn from(entries: [(CanonicalFunction, MappingEntry); N]) -> Self {
        Self {
            entries: HashMap::from(entries),
        }
    }
}

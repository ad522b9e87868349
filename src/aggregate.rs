//! Column aggregations (the footer statistics of a grid view) compiled to a
//! single aliased SQL expression per dialect.

use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};
use tracing::{debug, trace};

use crate::{dialect::Dialect, translate::Fragment};

pub mod mssql;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

/// The value domain of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SemanticType {
    SingleLineText,
    LongText,
    Email,
    PhoneNumber,
    #[strum(to_string = "URL", serialize = "Url")]
    Url,
    SingleSelect,
    MultiSelect,
    Number,
    Decimal,
    Currency,
    Percent,
    Duration,
    Rating,
    Year,
    Date,
    DateTime,
    Time,
    CreatedTime,
    LastModifiedTime,
    Checkbox,
    #[strum(to_string = "JSON", serialize = "Json")]
    Json,
    Attachment,
    Links,
    LinkToAnotherRecord,
    Lookup,
    Rollup,
    Formula,
    #[strum(to_string = "ID", serialize = "Id")]
    Id,
    User,
}

impl SemanticType {
    fn is_numeric(self) -> bool {
        use SemanticType::*;
        matches!(
            self,
            Number | Decimal | Currency | Percent | Duration | Rating | Year | Rollup | Links
        )
    }

    fn is_date(self) -> bool {
        use SemanticType::*;
        matches!(self, Date | DateTime | CreatedTime | LastModifiedTime)
    }

    // Types whose "empty" is only ever NULL
    fn has_null_empty(self) -> bool {
        use SemanticType::*;
        self.is_date() || matches!(
            self,
            Number | Decimal | Currency | Percent | Duration | Year | Rollup | Links | Time | Id
        )
    }
}

/// The result type of a formula column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FormulaDataType {
    Numeric,
    String,
    Date,
    Boolean,
}

/// What counts as "empty" besides NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyValue {
    Null,
    Zero,
    EmptyString,
}

impl EmptyValue {
    /// The SQL literal compared against, `None` when NULL is the only empty.
    pub fn literal(self) -> Option<&'static str> {
        match self {
            EmptyValue::Null => None,
            EmptyValue::Zero => Some("0"),
            EmptyValue::EmptyString => Some("''"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum AggregationFamily {
    Common,
    Numerical,
    Boolean,
    Date,
    Attachment,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AggregationKind {
    Count,
    CountEmpty,
    CountFilled,
    CountUnique,
    PercentEmpty,
    PercentFilled,
    PercentUnique,
    None,
    Avg,
    Min,
    Max,
    Sum,
    #[strum(to_string = "StdDev", serialize = "StandardDeviation")]
    StdDev,
    Range,
    Median,
    Checked,
    Unchecked,
    PercentChecked,
    PercentUnchecked,
    EarliestDate,
    LatestDate,
    DateRange,
    MonthRange,
    AttachmentSize,
}

impl AggregationKind {
    pub fn family(self) -> AggregationFamily {
        use AggregationKind::*;
        match self {
            Count | CountEmpty | CountFilled | CountUnique | PercentEmpty | PercentFilled
            | PercentUnique | None => AggregationFamily::Common,
            Avg | Min | Max | Sum | StdDev | Range | Median => AggregationFamily::Numerical,
            Checked | Unchecked | PercentChecked | PercentUnchecked => AggregationFamily::Boolean,
            EarliestDate | LatestDate | DateRange | MonthRange => AggregationFamily::Date,
            AttachmentSize => AggregationFamily::Attachment,
        }
    }
}

/// The column being aggregated, as known to the metadata layer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnRef {
    pub id: String,
    pub semantic_type: SemanticType,
    pub formula_type: Option<FormulaDataType>,
}

impl ColumnRef {
    pub fn new(id: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            id: id.into(),
            semantic_type,
            formula_type: None,
        }
    }

    pub fn with_formula_type(mut self, ty: FormulaDataType) -> Self {
        self.formula_type = Some(ty);
        self
    }

    /// The empty convention. A formula result type takes precedence over the
    ///  column's own type.
    pub fn empty_value(&self) -> EmptyValue {
        match self.formula_type {
            Some(FormulaDataType::Numeric | FormulaDataType::Date) => EmptyValue::Null,
            Some(_) => EmptyValue::EmptyString,
            None if self.semantic_type == SemanticType::Rating => EmptyValue::Zero,
            None if self.semantic_type.has_null_empty() => EmptyValue::Null,
            None => EmptyValue::EmptyString,
        }
    }

    // Filled and unique tests skip the comparison against the empty literal
    //  for these: links and lookups hold arrays or ids, never ''.
    fn only_null_is_empty(&self) -> bool {
        self.empty_value() == EmptyValue::Null
            || matches!(
                self.semantic_type,
                SemanticType::LinkToAnotherRecord | SemanticType::Lookup | SemanticType::Json
            )
    }

    /// Whether aggregations of `family` make sense for this column.
    pub fn supports(&self, family: AggregationFamily) -> bool {
        let ty = self.semantic_type;
        match family {
            AggregationFamily::Common => true,
            AggregationFamily::Numerical => match self.formula_type {
                Some(f) => f == FormulaDataType::Numeric,
                None => ty.is_numeric(),
            },
            AggregationFamily::Boolean => match self.formula_type {
                Some(f) => f == FormulaDataType::Boolean,
                None => ty == SemanticType::Checkbox,
            },
            AggregationFamily::Date => match self.formula_type {
                Some(f) => f == FormulaDataType::Date,
                None => ty.is_date(),
            },
            AggregationFamily::Attachment => {
                self.formula_type.is_none() && ty == SemanticType::Attachment
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AggregationRequest {
    pub column: ColumnRef,
    pub aggregation: AggregationKind,
    /// SQL for the column's value, already resolved by the caller.
    pub column_query: String,
    /// Quoted path of the table being aggregated. Only the idioms built on
    ///  correlated subqueries need it.
    pub source_table: Option<String>,
}

impl AggregationRequest {
    pub fn new(
        column: ColumnRef,
        aggregation: AggregationKind,
        column_query: impl Into<String>,
    ) -> Self {
        Self {
            column,
            aggregation,
            column_query: column_query.into(),
            source_table: None,
        }
    }

    pub fn with_source_table(mut self, table: impl Into<String>) -> Self {
        self.source_table = Some(table.into());
        self
    }
}

/// The per-dialect pieces of aggregate SQL. Arguments named `q` are the
///  parenthesized column query.
pub trait AggregateIdioms: Sync {
    fn dialect(&self) -> Dialect;

    /// Number of rows where `cond` holds.
    fn count_where(&self, cond: &str) -> String {
        format!("SUM(CASE WHEN {cond} THEN 1 ELSE 0 END)")
    }

    /// Number of distinct `value`s over the rows where `cond` holds.
    fn count_distinct_where(&self, value: &str, cond: &str) -> String {
        format!("COUNT(DISTINCT CASE WHEN {cond} THEN {value} END)")
    }

    /// `function` applied to `value` over the rows where `cond` holds.
    fn aggregate_where(&self, function: &str, value: &str, cond: &str) -> String {
        format!("{function}(CASE WHEN {cond} THEN {value} ELSE NULL END)")
    }

    /// `count` as a percentage of all rows.
    fn percent_of_rows(&self, count: &str) -> String {
        format!("({count} * 100.0 / NULLIF(COUNT(*), 0))")
    }

    fn json_is_empty(&self, q: &str) -> String {
        format!("{q} IS NULL")
    }

    /// The value AVG is taken over. Engines that average integers as
    ///  integers get a cast here.
    fn avg_operand(&self, q: &str) -> String {
        q.to_string()
    }

    /// Distinct count of a JSON column, whose values can't be compared as is.
    fn json_count_distinct(&self, q: &str) -> String;

    /// Population standard deviation, skipping rows failing `filter`.
    fn std_dev(&self, q: &str, filter: Option<&str>, source_table: Option<&str>) -> Option<String>;

    fn median(&self, q: &str, source_table: Option<&str>) -> Option<String>;

    /// Whole days between the earliest and latest value.
    fn date_range(&self, q: &str) -> String;

    /// Calendar months between the earliest and latest value.
    fn month_range(&self, q: &str) -> String;

    /// Total size of the files in an attachment column.
    fn attachment_size(&self, q: &str, source_table: Option<&str>) -> Option<String>;
}

fn common(idioms: &dyn AggregateIdioms, column: &ColumnRef, kind: AggregationKind, q: &str) -> Option<String> {
    use AggregationKind as K;

    let is_json = column.semantic_type == SemanticType::Json && column.formula_type.is_none();
    let empty = column.empty_value().literal();

    let empty_test = || match empty {
        Some(e) => format!("{q} IS NULL OR {q} = {e}"),
        None => format!("{q} IS NULL"),
    };
    let filled_test = || match empty {
        Some(e) if !column.only_null_is_empty() => format!("{q} IS NOT NULL AND {q} != {e}"),
        _ => format!("{q} IS NOT NULL"),
    };

    let count_empty = || {
        if is_json {
            idioms.count_where(&idioms.json_is_empty(q))
        } else {
            idioms.count_where(&empty_test())
        }
    };
    let count_filled = || idioms.count_where(&filled_test());
    let count_unique = || {
        if is_json {
            idioms.json_count_distinct(q)
        } else {
            idioms.count_distinct_where(q, &filled_test())
        }
    };

    let sql = match kind {
        K::Count => "COUNT(*)".to_string(),
        K::CountEmpty => count_empty(),
        K::CountFilled => count_filled(),
        K::CountUnique => count_unique(),
        K::PercentEmpty => idioms.percent_of_rows(&count_empty()),
        K::PercentFilled => idioms.percent_of_rows(&count_filled()),
        K::PercentUnique => idioms.percent_of_rows(&count_unique()),
        _ => return None,
    };
    Some(sql)
}

fn numerical(
    idioms: &dyn AggregateIdioms,
    column: &ColumnRef,
    kind: AggregationKind,
    q: &str,
    source_table: Option<&str>,
) -> Option<String> {
    use AggregationKind as K;

    // A zero rating means "not rated"
    let skip_zero = (column.empty_value() == EmptyValue::Zero).then(|| format!("{q} != 0"));
    let filtered = |function: &str, value: &str| match &skip_zero {
        Some(cond) => idioms.aggregate_where(function, value, cond),
        None => format!("{function}({value})"),
    };

    let sql = match kind {
        K::Avg => filtered("AVG", &idioms.avg_operand(q)),
        K::Min => filtered("MIN", q),
        K::Max => format!("MAX({q})"),
        K::Sum => format!("SUM({q})"),
        K::StdDev => idioms.std_dev(q, skip_zero.as_deref(), source_table)?,
        K::Range => format!("(MAX({q}) - {})", filtered("MIN", q)),
        K::Median => idioms.median(q, source_table)?,
        _ => return None,
    };
    Some(sql)
}

fn boolean(idioms: &dyn AggregateIdioms, kind: AggregationKind, q: &str) -> Option<String> {
    use AggregationKind as K;

    let dialect = idioms.dialect();
    let checked = || idioms.count_where(&format!("{q} = {}", dialect.bool_literal(true)));
    let unchecked = || {
        idioms.count_where(&format!(
            "{q} = {} OR {q} IS NULL",
            dialect.bool_literal(false)
        ))
    };

    let sql = match kind {
        K::Checked => checked(),
        K::Unchecked => unchecked(),
        K::PercentChecked => idioms.percent_of_rows(&checked()),
        K::PercentUnchecked => idioms.percent_of_rows(&unchecked()),
        _ => return None,
    };
    Some(sql)
}

fn date(idioms: &dyn AggregateIdioms, kind: AggregationKind, q: &str) -> Option<String> {
    use AggregationKind as K;

    let sql = match kind {
        K::EarliestDate => format!("MIN({q})"),
        K::LatestDate => format!("MAX({q})"),
        K::DateRange => idioms.date_range(q),
        K::MonthRange => idioms.month_range(q),
        _ => return None,
    };
    Some(sql)
}

/// Compile one column aggregation to `<expr> AS <column id>`.
///
/// `None` means the aggregation isn't defined for this column type and
///  dialect (or is [`AggregationKind::None`]); callers leave it out of the
///  select list.
pub fn compile_aggregation(request: &AggregationRequest, dialect: Dialect) -> Option<Fragment> {
    let column = &request.column;
    let kind = request.aggregation;
    let family = kind.family();

    if !column.supports(family) {
        debug!(%kind, ty = %column.semantic_type, "aggregation not defined for column type");
        return None;
    }

    let idioms = dialect.aggregate_idioms();
    let q = format!("({})", request.column_query);
    let source_table = request.source_table.as_deref();

    let sql = match family {
        AggregationFamily::Common => common(idioms, column, kind, &q),
        AggregationFamily::Numerical => numerical(idioms, column, kind, &q, source_table),
        AggregationFamily::Boolean => boolean(idioms, kind, &q),
        AggregationFamily::Date => date(idioms, kind, &q),
        AggregationFamily::Attachment => idioms.attachment_size(&q, source_table),
    };
    let Some(sql) = sql else {
        debug!(%kind, %dialect, has_source_table = source_table.is_some(), "no aggregate idiom");
        return None;
    };

    // Empty groups read as 0, except for the dates themselves
    let sql = match kind {
        AggregationKind::EarliestDate | AggregationKind::LatestDate => sql,
        _ => format!("COALESCE({sql}, 0)"),
    };
    let sql = format!("{sql} AS {}", dialect.quote_ident(&column.id));
    trace!(%sql, "compiled aggregation");

    Some(Fragment {
        sql,
        params: Vec::new(),
    })
}

use super::AggregateIdioms;
use crate::dialect::Dialect;

/// SQLite has no FILTER clause and no statistics functions; the missing ones
///  are computed with subqueries over the source table.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl AggregateIdioms for Sqlite {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn percent_of_rows(&self, count: &str) -> String {
        format!("({count} * 100.0 / IFNULL(COUNT(*), 0))")
    }

    fn json_is_empty(&self, q: &str) -> String {
        format!("json_array_length({q}) IS NULL")
    }

    fn json_count_distinct(&self, q: &str) -> String {
        format!("COUNT(DISTINCT json_extract({q}, '$'))")
    }

    fn std_dev(&self, q: &str, filter: Option<&str>, source_table: Option<&str>) -> Option<String> {
        let table = source_table?;
        let filter = filter.map(|cond| format!(" WHERE {cond}")).unwrap_or_default();
        Some(format!(
            "(SELECT SQRT(AVG((stddev_value - stddev_mean) * (stddev_value - stddev_mean))) \
             FROM (SELECT {q} AS stddev_value, (SELECT AVG({q}) FROM {table}{filter}) AS stddev_mean \
             FROM {table}{filter}))"
        ))
    }

    // Skip to the middle row(s) of the ordered values, averaging two of them
    //  for an even count. LIMIT and OFFSET take subqueries here.
    fn median(&self, q: &str, source_table: Option<&str>) -> Option<String> {
        let table = source_table?;
        Some(format!(
            "(SELECT AVG(median_value) FROM (SELECT {q} AS median_value FROM {table} \
             WHERE {q} IS NOT NULL ORDER BY median_value \
             LIMIT 2 - (SELECT COUNT({q}) FROM {table}) % 2 \
             OFFSET (SELECT (COUNT({q}) - 1) / 2 FROM {table})))"
        ))
    }

    fn date_range(&self, q: &str) -> String {
        format!("CAST(JULIANDAY(MAX({q})) - JULIANDAY(MIN({q})) AS INTEGER)")
    }

    fn month_range(&self, q: &str) -> String {
        format!(
            "((strftime('%Y', MAX({q})) * 12 + strftime('%m', MAX({q}))) \
             - (strftime('%Y', MIN({q})) * 12 + strftime('%m', MIN({q}))))"
        )
    }

    fn attachment_size(&self, q: &str, source_table: Option<&str>) -> Option<String> {
        let table = source_table?;
        Some(format!(
            "(SELECT SUM(CAST(json_extract(value, '$.size') AS INTEGER)) FROM {table}, json_each({q}))"
        ))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{
        aggregate::{
            AggregationKind as K, SemanticType as T,
            tests::{aggregate, aggregate_in},
        },
        dialect::Dialect,
    };

    fn sqlite(ty: T, kind: K) -> String {
        aggregate(ty, kind, Dialect::Sqlite).unwrap()
    }

    #[test]
    fn conditional_counts() {
        assert_eq!(
            sqlite(T::Rating, K::CountEmpty),
            r#"COALESCE(SUM(CASE WHEN ("v") IS NULL OR ("v") = 0 THEN 1 ELSE 0 END), 0) AS "c1""#
        );
        assert_eq!(
            sqlite(T::LongText, K::PercentEmpty),
            r#"COALESCE((SUM(CASE WHEN ("v") IS NULL OR ("v") = '' THEN 1 ELSE 0 END) * 100.0 / IFNULL(COUNT(*), 0)), 0) AS "c1""#
        );
        assert_eq!(
            sqlite(T::Year, K::CountUnique),
            r#"COALESCE(COUNT(DISTINCT CASE WHEN ("v") IS NOT NULL THEN ("v") END), 0) AS "c1""#
        );
    }

    #[test]
    fn json() {
        assert_eq!(
            sqlite(T::Json, K::CountEmpty),
            r#"COALESCE(SUM(CASE WHEN json_array_length(("v")) IS NULL THEN 1 ELSE 0 END), 0) AS "c1""#
        );
        assert_eq!(
            sqlite(T::Json, K::CountUnique),
            r#"COALESCE(COUNT(DISTINCT json_extract(("v"), '$')), 0) AS "c1""#
        );
    }

    #[test]
    fn boolean() {
        assert_eq!(
            sqlite(T::Checkbox, K::PercentChecked),
            r#"COALESCE((SUM(CASE WHEN ("v") = 1 THEN 1 ELSE 0 END) * 100.0 / IFNULL(COUNT(*), 0)), 0) AS "c1""#
        );
        assert_eq!(
            sqlite(T::Checkbox, K::Unchecked),
            r#"COALESCE(SUM(CASE WHEN ("v") = 0 OR ("v") IS NULL THEN 1 ELSE 0 END), 0) AS "c1""#
        );
    }

    #[test]
    fn numerical() {
        assert_eq!(
            sqlite(T::Rating, K::Min),
            r#"COALESCE(MIN(CASE WHEN ("v") != 0 THEN ("v") ELSE NULL END), 0) AS "c1""#
        );
        assert_eq!(
            aggregate_in(T::Number, K::StdDev, Dialect::Sqlite, r#""t""#).unwrap(),
            concat!(
                r#"COALESCE((SELECT SQRT(AVG((stddev_value - stddev_mean) * (stddev_value - stddev_mean))) "#,
                r#"FROM (SELECT ("v") AS stddev_value, (SELECT AVG(("v")) FROM "t") AS stddev_mean "#,
                r#"FROM "t")), 0) AS "c1""#,
            )
        );
        assert_eq!(
            aggregate_in(T::Rating, K::StdDev, Dialect::Sqlite, r#""t""#).unwrap(),
            concat!(
                r#"COALESCE((SELECT SQRT(AVG((stddev_value - stddev_mean) * (stddev_value - stddev_mean))) "#,
                r#"FROM (SELECT ("v") AS stddev_value, (SELECT AVG(("v")) FROM "t" WHERE ("v") != 0) AS stddev_mean "#,
                r#"FROM "t" WHERE ("v") != 0)), 0) AS "c1""#,
            )
        );
        assert_eq!(
            aggregate_in(T::Number, K::Median, Dialect::Sqlite, r#""t""#).unwrap(),
            concat!(
                r#"COALESCE((SELECT AVG(median_value) FROM (SELECT ("v") AS median_value FROM "t" "#,
                r#"WHERE ("v") IS NOT NULL ORDER BY median_value "#,
                r#"LIMIT 2 - (SELECT COUNT(("v")) FROM "t") % 2 "#,
                r#"OFFSET (SELECT (COUNT(("v")) - 1) / 2 FROM "t"))), 0) AS "c1""#,
            )
        );
        assert_eq!(aggregate(T::Number, K::StdDev, Dialect::Sqlite), None);
    }

    #[test]
    fn dates() {
        assert_eq!(
            sqlite(T::Date, K::DateRange),
            r#"COALESCE(CAST(JULIANDAY(MAX(("v"))) - JULIANDAY(MIN(("v"))) AS INTEGER), 0) AS "c1""#
        );
        assert_eq!(
            sqlite(T::Date, K::MonthRange),
            concat!(
                r#"COALESCE(((strftime('%Y', MAX(("v"))) * 12 + strftime('%m', MAX(("v")))) "#,
                r#"- (strftime('%Y', MIN(("v"))) * 12 + strftime('%m', MIN(("v"))))), 0) AS "c1""#,
            )
        );
    }

    #[test]
    fn attachment_size() {
        assert_eq!(aggregate(T::Attachment, K::AttachmentSize, Dialect::Sqlite), None);
        assert_eq!(
            aggregate_in(T::Attachment, K::AttachmentSize, Dialect::Sqlite, r#""t""#).unwrap(),
            r#"COALESCE((SELECT SUM(CAST(json_extract(value, '$.size') AS INTEGER)) FROM "t", json_each(("v"))), 0) AS "c1""#
        );
    }
}

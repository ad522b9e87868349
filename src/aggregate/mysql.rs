use super::AggregateIdioms;
use crate::dialect::Dialect;

#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl AggregateIdioms for MySql {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn json_is_empty(&self, q: &str) -> String {
        format!("JSON_LENGTH({q}) IS NULL")
    }

    fn json_count_distinct(&self, q: &str) -> String {
        format!("COUNT(DISTINCT JSON_UNQUOTE(JSON_EXTRACT({q}, '$')))")
    }

    fn std_dev(&self, q: &str, filter: Option<&str>, _: Option<&str>) -> Option<String> {
        Some(match filter {
            Some(cond) => self.aggregate_where("STDDEV", q, cond),
            None => format!("STDDEV({q})"),
        })
    }

    // No MEDIAN or PERCENTILE_CONT, and LIMIT only takes constants, so the
    //  middle row(s) are picked by row number
    fn median(&self, q: &str, source_table: Option<&str>) -> Option<String> {
        let table = source_table?;
        Some(format!(
            "(SELECT AVG(median_value) FROM (SELECT {q} AS median_value, \
             ROW_NUMBER() OVER (ORDER BY {q}) AS median_row, COUNT(*) OVER () AS median_count \
             FROM {table} WHERE {q} IS NOT NULL) AS median_rows \
             WHERE median_row IN (FLOOR((median_count + 1) / 2), FLOOR((median_count + 2) / 2)))"
        ))
    }

    fn date_range(&self, q: &str) -> String {
        format!("TIMESTAMPDIFF(DAY, MIN({q}), MAX({q}))")
    }

    fn month_range(&self, q: &str) -> String {
        format!("PERIOD_DIFF(DATE_FORMAT(MAX({q}), '%Y%m'), DATE_FORMAT(MIN({q}), '%Y%m'))")
    }

    fn attachment_size(&self, q: &str, source_table: Option<&str>) -> Option<String> {
        let table = source_table?;
        Some(format!(
            "(SELECT SUM(JSON_EXTRACT(json_object, '$.size')) FROM {table} \
             CROSS JOIN JSON_TABLE(CAST({q} AS JSON), '$[*]' COLUMNS (json_object JSON PATH '$')) AS json_array)"
        ))
    }
}

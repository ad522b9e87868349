use super::AggregateIdioms;
use crate::dialect::Dialect;

#[derive(Debug, Clone, Copy)]
pub struct MsSql;

impl AggregateIdioms for MsSql {
    fn dialect(&self) -> Dialect {
        Dialect::MsSql
    }

    // AVG of an INT column is an INT
    fn avg_operand(&self, q: &str) -> String {
        format!("CAST({q} AS FLOAT)")
    }

    // JSON is stored as NVARCHAR(MAX), which DISTINCT can't sort
    fn json_count_distinct(&self, q: &str) -> String {
        format!("COUNT(DISTINCT CAST({q} AS NVARCHAR(4000)))")
    }

    fn std_dev(&self, q: &str, filter: Option<&str>, _: Option<&str>) -> Option<String> {
        Some(match filter {
            Some(cond) => self.aggregate_where("STDEVP", q, cond),
            None => format!("STDEVP({q})"),
        })
    }

    // PERCENTILE_CONT is only a window function here
    fn median(&self, q: &str, source_table: Option<&str>) -> Option<String> {
        let table = source_table?;
        Some(format!(
            "(SELECT TOP 1 PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY {q}) OVER () FROM {table})"
        ))
    }

    fn date_range(&self, q: &str) -> String {
        format!("DATEDIFF(day, MIN({q}), MAX({q}))")
    }

    fn month_range(&self, q: &str) -> String {
        format!("DATEDIFF(month, MIN({q}), MAX({q}))")
    }

    fn attachment_size(&self, q: &str, source_table: Option<&str>) -> Option<String> {
        let table = source_table?;
        Some(format!(
            "(SELECT SUM(CAST(JSON_VALUE(attachment.value, '$.size') AS BIGINT)) \
             FROM {table} CROSS APPLY OPENJSON({q}) AS attachment)"
        ))
    }
}

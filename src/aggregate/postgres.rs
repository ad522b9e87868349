use super::AggregateIdioms;
use crate::dialect::Dialect;

/// PostgreSQL filters aggregates with `FILTER (WHERE ...)` and has the
///  statistics built in.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl AggregateIdioms for Postgres {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn count_where(&self, cond: &str) -> String {
        format!("COUNT(*) FILTER (WHERE {cond})")
    }

    fn count_distinct_where(&self, value: &str, cond: &str) -> String {
        format!("COUNT(DISTINCT {value}) FILTER (WHERE {cond})")
    }

    fn aggregate_where(&self, function: &str, value: &str, cond: &str) -> String {
        format!("{function}({value}) FILTER (WHERE {cond})")
    }

    // json has no equality operator, compare the text instead
    fn json_count_distinct(&self, q: &str) -> String {
        self.count_distinct_where(&format!("({q}::text)"), &format!("{q} IS NOT NULL"))
    }

    fn std_dev(&self, q: &str, filter: Option<&str>, _: Option<&str>) -> Option<String> {
        Some(match filter {
            Some(cond) => self.aggregate_where("stddev_pop", q, cond),
            None => format!("stddev_pop({q})"),
        })
    }

    fn median(&self, q: &str, _: Option<&str>) -> Option<String> {
        Some(format!("percentile_cont(0.5) WITHIN GROUP (ORDER BY {q})"))
    }

    fn date_range(&self, q: &str) -> String {
        format!("(MAX({q}::date) - MIN({q}::date))")
    }

    fn month_range(&self, q: &str) -> String {
        let age = format!("AGE(MAX({q}::date), MIN({q}::date))");
        format!("(DATE_PART('year', {age}) * 12 + DATE_PART('month', {age}))")
    }

    fn attachment_size(&self, q: &str, _: Option<&str>) -> Option<String> {
        Some(format!(
            "SUM((SELECT COALESCE(SUM((json_object ->> 'size')::int), 0) \
             FROM jsonb_array_elements({q}::jsonb) AS json_array(json_object)))"
        ))
    }
}

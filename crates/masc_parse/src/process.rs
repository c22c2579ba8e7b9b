//! `SHOW FULL PROCESSLIST` rows and filtering.

use crate::tabular::{DEFAULT_PROCESS_COLUMNS, Row, parse_rows};
use serde::{Deserialize, Serialize};

/// Session identifier; kept verbatim when it is not numeric
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Number(i64),
    Raw(String),
}

/// One session from the process list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRow {
    pub id: Option<RowId>,
    pub user: Option<String>,
    pub host: Option<String>,
    pub db: Option<String>,
    pub command: Option<String>,
    /// Seconds in the current state
    pub time: Option<i64>,
    pub state: Option<String>,
    pub info: Option<String>,
}

impl ProcessRow {
    fn from_row(mut row: Row) -> Self {
        let mut take = |column: &str| row.remove(column).flatten();
        Self {
            id: take("id").map(|raw| match raw.parse::<i64>() {
                Ok(n) => RowId::Number(n),
                Err(_) => RowId::Raw(raw),
            }),
            user: take("user"),
            host: take("host"),
            db: take("db"),
            command: take("command"),
            time: take("time").map(|raw| raw.parse::<i64>().unwrap_or(0)),
            state: take("state"),
            info: take("info"),
        }
    }

    /// Elapsed seconds, with an unknown time read as zero
    #[must_use]
    pub fn elapsed(&self) -> i64 {
        self.time.unwrap_or(0)
    }
}

/// Parse a process list section.
#[must_use]
pub fn parse_process_list(section: &str) -> Vec<ProcessRow> {
    parse_rows(section, DEFAULT_PROCESS_COLUMNS)
        .into_iter()
        .filter(|row| !row.is_empty())
        .map(ProcessRow::from_row)
        .collect()
}

/// Criteria for narrowing a process list. Text criteria are
/// case-insensitive substring matches; unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessFilter {
    pub user: Option<String>,
    pub state: Option<String>,
    pub min_time: Option<i64>,
    pub query: Option<String>,
}

fn contains_ignore_case(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(&needle.to_lowercase()))
}

impl ProcessFilter {
    #[must_use]
    pub fn matches(&self, row: &ProcessRow) -> bool {
        let text_ok = |criterion: &Option<String>, field: &Option<String>| {
            criterion
                .as_deref()
                .filter(|c| !c.is_empty())
                .is_none_or(|c| contains_ignore_case(field.as_deref(), c))
        };

        text_ok(&self.user, &row.user)
            && text_ok(&self.state, &row.state)
            && text_ok(&self.query, &row.info)
            && self.min_time.is_none_or(|min| row.elapsed() >= min)
    }
}

/// Rows matching every criterion of `filter`, in their original order.
#[must_use]
pub fn filter_processes<'a>(rows: &'a [ProcessRow], filter: &ProcessFilter) -> Vec<&'a ProcessRow> {
    rows.iter().filter(|row| filter.matches(row)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_null_db_is_absent() {
        let rows = parse_process_list(
            "Id\tUser\tHost\tdb\tCommand\tTime\tState\tInfo\n9\tapp\th:1\tNULL\tSleep\t4\t\tNULL\n",
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].db, None);
        assert_eq!(rows[0].info, None);
        assert_eq!(rows[0].state, Some(String::new()));
    }

    #[test]
    fn test_numeric_coercion() {
        let rows = parse_process_list(fixtures::PROCESS_LIST);
        assert_eq!(rows[1].id, Some(RowId::Number(17)));
        assert_eq!(rows[1].time, Some(12));
        assert_eq!(rows[1].user.as_deref(), Some("app"));
    }

    #[test]
    fn test_coercion_failures_are_not_fatal() {
        let rows = parse_process_list("Id\tUser\tTime\nabc\troot\tsoon\n");
        assert_eq!(rows[0].id, Some(RowId::Raw("abc".to_string())));
        assert_eq!(rows[0].time, Some(0));
    }

    #[test]
    fn test_row_id_json_shape() {
        let rows = parse_process_list(fixtures::PROCESS_LIST);
        let json = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(json["id"], serde_json::json!(5));
        assert_eq!(json["db"], serde_json::Value::Null);
    }

    #[test]
    fn test_filter_by_user_and_time() {
        let rows = parse_process_list(fixtures::PROCESS_LIST);

        let filter = ProcessFilter {
            user: Some("APP".to_string()),
            ..ProcessFilter::default()
        };
        assert_eq!(filter_processes(&rows, &filter).len(), 1);

        let filter = ProcessFilter {
            min_time: Some(10),
            ..ProcessFilter::default()
        };
        let slow = filter_processes(&rows, &filter);
        assert_eq!(slow.len(), 2);
        assert_eq!(slow[0].id, Some(RowId::Number(5)));
    }

    #[test]
    fn test_filter_by_query_skips_null_info() {
        let rows = parse_process_list(fixtures::PROCESS_LIST);
        let filter = ProcessFilter {
            query: Some("orders".to_string()),
            ..ProcessFilter::default()
        };
        let hits = filter_processes(&rows, &filter);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].db.as_deref(), Some("shop"));
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let rows = parse_process_list(fixtures::PROCESS_LIST);
        assert_eq!(filter_processes(&rows, &ProcessFilter::default()).len(), 3);
    }
}

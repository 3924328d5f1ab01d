//! Query builder for stored readings.
//!
//! # Example
//!
//! ```
//! use bglink_store::{Store, ReadingQuery};
//! use time::{OffsetDateTime, Duration};
//!
//! let store = Store::open_in_memory()?;
//! let yesterday = OffsetDateTime::now_utc() - Duration::hours(24);
//!
//! let query = ReadingQuery::new()
//!     .source("carelink")
//!     .since(yesterday)
//!     .limit(288);
//!
//! let readings = store.query_readings(&query)?;
//! assert!(readings.is_empty());
//! # Ok::<(), bglink_store::Error>(())
//! ```

use time::OffsetDateTime;

use crate::store::unix_millis;

/// Fluent query builder for readings.
///
/// Use this to construct queries for [`Store::query_readings`](crate::Store::query_readings).
/// By default results are ordered by reading time, newest first.
#[derive(Debug, Default, Clone)]
pub struct ReadingQuery {
    /// Filter by source name.
    pub source: Option<String>,
    /// Filter readings taken at or after this time.
    pub since: Option<OffsetDateTime>,
    /// Filter readings taken at or before this time.
    pub until: Option<OffsetDateTime>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
    /// Order by timestamp descending (newest first).
    pub newest_first: bool,
}

impl ReadingQuery {
    /// Create a new query: all sources, no time range, no limit, newest first.
    pub fn new() -> Self {
        Self {
            newest_first: true,
            ..Default::default()
        }
    }

    /// Only include readings from the given source.
    pub fn source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// Filter to readings taken at or after this time.
    pub fn since(mut self, time: OffsetDateTime) -> Self {
        self.since = Some(time);
        self
    }

    /// Filter to readings taken at or before this time.
    pub fn until(mut self, time: OffsetDateTime) -> Self {
        self.until = Some(time);
        self
    }

    /// Limit the maximum number of results returned.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first N results.
    ///
    /// SQLite only accepts OFFSET after LIMIT, so an offset without a limit
    /// is sent as `LIMIT -1 OFFSET n`.
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Order results oldest first (chronological).
    pub fn oldest_first(mut self) -> Self {
        self.newest_first = false;
        self
    }

    /// Build the SQL WHERE clause and parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref source) = self.source {
            conditions.push("source = ?");
            params.push(Box::new(source.clone()));
        }

        if let Some(since) = self.since {
            conditions.push("timestamp >= ?");
            params.push(Box::new(unix_millis(since)));
        }

        if let Some(until) = self.until {
            conditions.push("timestamp <= ?");
            params.push(Box::new(unix_millis(until)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    /// Build the full SQL query.
    pub(crate) fn build_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        let order = if self.newest_first { "DESC" } else { "ASC" };

        let mut sql = format!(
            "SELECT id, source, timestamp, glucose_value, trend, active_insulin, \
             pump_battery, sensor_duration \
             FROM readings {} ORDER BY timestamp {}, id {}",
            where_clause, order, order
        );

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => {
                sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset))
            }
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }

        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_query() {
        let query = ReadingQuery::new();
        assert!(query.newest_first);
        let sql = query.build_sql();
        assert!(!sql.contains("WHERE"));
        assert!(sql.contains("ORDER BY timestamp DESC, id DESC"));
        assert!(!sql.contains("LIMIT"));
    }

    #[test]
    fn test_filters_and_pagination() {
        let now = OffsetDateTime::now_utc();
        let query = ReadingQuery::new()
            .source("dexcom")
            .since(now)
            .until(now)
            .limit(10)
            .offset(20)
            .oldest_first();

        let (where_clause, params) = query.build_where();
        assert_eq!(
            where_clause,
            "WHERE source = ? AND timestamp >= ? AND timestamp <= ?"
        );
        assert_eq!(params.len(), 3);

        let sql = query.build_sql();
        assert!(sql.contains("ORDER BY timestamp ASC"));
        assert!(sql.ends_with("LIMIT 10 OFFSET 20"));
    }

    #[test]
    fn test_offset_without_limit() {
        let sql = ReadingQuery::new().offset(5).build_sql();
        assert!(sql.ends_with("LIMIT -1 OFFSET 5"));
    }
}

//! Headline counters grouped for charting.

use crate::tabular::CounterMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub current: i64,
    pub running: i64,
    pub created: i64,
    pub cached: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryMetrics {
    pub questions: i64,
    pub slow_queries: i64,
    pub select: i64,
    pub insert: i64,
    pub update: i64,
    pub delete: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnodbMetrics {
    pub buffer_pool_reads: i64,
    pub buffer_pool_read_requests: i64,
    pub row_lock_waits: i64,
    pub rows_read: i64,
    pub rows_inserted: i64,
    pub rows_updated: i64,
    pub rows_deleted: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteMetrics {
    pub received: i64,
    pub sent: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetrics {
    pub open_tables: i64,
    pub opened_tables: i64,
    pub table_locks_waited: i64,
}

/// Selected global status counters. Missing or non-numeric counters read as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMetrics {
    pub connections: ConnectionMetrics,
    pub queries: QueryMetrics,
    pub innodb: InnodbMetrics,
    pub bytes: ByteMetrics,
    pub tables: TableMetrics,
}

impl KeyMetrics {
    #[must_use]
    pub fn from_counters(counters: &CounterMap) -> Self {
        let get = |name: &str| counters.get_i64(name).unwrap_or(0);

        Self {
            connections: ConnectionMetrics {
                current: get("Threads_connected"),
                running: get("Threads_running"),
                created: get("Threads_created"),
                cached: get("Threads_cached"),
            },
            queries: QueryMetrics {
                questions: get("Questions"),
                slow_queries: get("Slow_queries"),
                select: get("Com_select"),
                insert: get("Com_insert"),
                update: get("Com_update"),
                delete: get("Com_delete"),
            },
            innodb: InnodbMetrics {
                buffer_pool_reads: get("Innodb_buffer_pool_reads"),
                buffer_pool_read_requests: get("Innodb_buffer_pool_read_requests"),
                row_lock_waits: get("Innodb_row_lock_waits"),
                rows_read: get("Innodb_rows_read"),
                rows_inserted: get("Innodb_rows_inserted"),
                rows_updated: get("Innodb_rows_updated"),
                rows_deleted: get("Innodb_rows_deleted"),
            },
            bytes: ByteMetrics {
                received: get("Bytes_received"),
                sent: get("Bytes_sent"),
            },
            tables: TableMetrics {
                open_tables: get("Open_tables"),
                opened_tables: get("Opened_tables"),
                table_locks_waited: get("Table_locks_waited"),
            },
        }
    }
}

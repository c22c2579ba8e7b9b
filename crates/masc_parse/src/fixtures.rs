//! Transcript samples shared by the parser tests.

use crate::section::{HEADER_RULE, SECTION_RULE};

pub const ENGINE_STATUS: &str = "=====================================
2024-05-01 10:00:00 0x7f8e2c0a1700 INNODB MONITOR OUTPUT
=====================================
Per second averages calculated from the last 17 seconds
-----------------
BACKGROUND THREAD
-----------------
srv_master_thread loops: 120 srv_active, 0 srv_shutdown, 5400 srv_idle
srv_master_thread log flush and writes: 5520
----------
SEMAPHORES
----------
OS WAIT ARRAY INFO: reservation count 812
OS WAIT ARRAY INFO: signal count 790
RW-shared spins 4, rounds 8, OS waits 2
RW-excl spins 1, rounds 3, OS waits 1
Spin rounds per wait: 2.00 RW-shared, 3.00 RW-excl, 0.00 RW-sx
------------
TRANSACTIONS
------------
Trx id counter 1048612
Purge done for trx's n:o < 1048600 undo n:o < 0 state: running but idle
History list length 12
LIST OF TRANSACTIONS FOR EACH SESSION:
---TRANSACTION 421937468512345, not started
0 lock struct(s), heap size 1128, 0 row lock(s)
---TRANSACTION 1048611, ACTIVE 3 sec
2 lock struct(s), heap size 1128, 1 row lock(s), undo log entries 1
--------
FILE I/O
--------
I/O thread 0 state: waiting for completed aio requests (insert buffer thread)
I/O thread 1 state: waiting for completed aio requests (log thread)
I/O thread 2 state: waiting for completed aio requests (read thread)
I/O thread 3 state: waiting for completed aio requests (read thread)
I/O thread 4 state: waiting for completed aio requests (write thread)
I/O thread 5 state: waiting for completed aio requests (write thread)
Pending normal aio reads: [0, 0] , aio writes: [0, 0] ,
 ibuf aio reads:, log i/o's:
Pending flushes (fsync) log: 0; buffer pool: 0
1544 OS file reads, 30211 OS file writes, 12040 OS fsyncs
0.00 reads/s, 0 avg bytes/read, 4.12 writes/s, 1.76 fsyncs/s
-------------------------------------
INSERT BUFFER AND ADAPTIVE HASH INDEX
-------------------------------------
Ibuf: size 1, free list len 0, seg size 2, 0 merges
merged operations:
 insert 0, delete mark 0, delete 0
Hash table size 34679, node heap has 2 buffer(s)
Hash table size 34679, node heap has 1 buffer(s)
12.50 hash searches/s, 40.25 non-hash searches/s
---
LOG
---
Log sequence number          1000
Log buffer assigned up to    1000
Log flushed up to            990
Last checkpoint at           400
0 pending log flushes, 0 pending chkp writes
327 log i/o's done, 0.24 log i/o's/second
----------------------
BUFFER POOL AND MEMORY
----------------------
Total large memory allocated 137428992
Dictionary memory allocated 416141
Buffer pool size   8192
Free buffers       4096
Database pages     4000
Old database pages 1456
Modified db pages  82
Pending reads      0
Pending writes: LRU 0, flush list 0, single page 0
Pages made young 14, not young 3
0.00 youngs/s, 0.00 non-youngs/s
Pages read 1200, created 2800, written 19000
0.00 reads/s, 0.00 creates/s, 1.12 writes/s
Buffer pool hit rate 998 / 1000, young-making rate 0 / 1000 not 0 / 1000
--------------
ROW OPERATIONS
--------------
0 queries inside InnoDB, 0 queries in queue
0 read views open inside InnoDB
Process ID=1, Main thread ID=140, state=sleeping
Number of rows inserted 5021, updated 311, deleted 12, read 889123
0.50 inserts/s, 0.10 updates/s, 0.00 deletes/s, 120.75 reads/s
----------------------------
END OF INNODB MONITOR OUTPUT
============================";

pub const GLOBAL_STATUS: &str = "Variable_name\tValue
Aborted_clients\t3
Bytes_received\t123456
Bytes_sent\t654321
Com_select\t900
Innodb_buffer_pool_read_requests\t99000
Innodb_buffer_pool_reads\t120
Last_query_cost\t0.000000
Open_table_definitions\t300
Open_tables\t350
Opened_tables\t420
Questions\t5000
Rpl_semi_sync_master_status\tOFF
Slow_queries\t2
Table_open_cache_overflows\t0
Threads_cached\t5
Threads_connected\t42
Threads_created\t60
Threads_running\t3
Uptime\t86400
";

pub const PROCESS_LIST: &str = "Id\tUser\tHost\tdb\tCommand\tTime\tState\tInfo
5\tevent_scheduler\tlocalhost\tNULL\tDaemon\t86400\tWaiting on empty queue\tNULL
17\tapp\t10.0.0.9:51234\tshop\tQuery\t12\tSending data\tSELECT * FROM orders WHERE status = 'open'
18\tobserver\tlocalhost\tNULL\tQuery\t0\tinit\tSHOW FULL PROCESSLIST
";

pub const GLOBAL_VARIABLES: &str = "Variable_name\tValue
innodb_buffer_pool_size\t10737418240
innodb_flush_log_at_trx_commit\t1
INNODB_LOG_FILE_SIZE\t536870912
innodb_read_io_threads\t4
innodb_write_io_threads\t4
max_connections\t151
max_heap_table_size\t16777216
open_files_limit\t5000
sync_binlog\t1
table_definition_cache\t1400
table_open_cache\t2000
thread_cache_size\t9
tmp_table_size\t16777216
transaction_isolation\tREPEATABLE-READ
version\t8.0.36
wait_timeout\t28800
";

pub const REPLICA_STATUS: &str = "Replica_IO_State\tSource_Host\tSource_User\tSource_Port\tReplica_IO_Running\tReplica_SQL_Running\tLast_Error\tSeconds_Behind_Source\tExecuted_Gtid_Set
Waiting for source to send event\t10.0.0.5\trepl\t3306\tYes\tYes\t\t3\t
";

pub const PRIMARY_STATUS: &str = "File\tPosition\tBinlog_Do_DB\tBinlog_Ignore_DB\tExecuted_Gtid_Set
binlog.000042\t157\t\t\t
";

/// Render blocks in the collector's transcript layout.
pub fn render_transcript(blocks: &[(&str, &str)]) -> String {
    let mut lines = vec![
        HEADER_RULE.to_string(),
        "# MySQL Diagnostic Collection".to_string(),
        "# Host: db1.example:3306".to_string(),
        "# User: observer".to_string(),
        "# Started: 2024-05-01 10:00:00".to_string(),
        "# Mode: Parallel (6 concurrent connections)".to_string(),
        HEADER_RULE.to_string(),
    ];
    for (command, output) in blocks {
        lines.push(format!(
            "\n{SECTION_RULE}\n-- {command}\n-- Time: 2024-05-01 10:00:00 -> 2024-05-01 10:00:01 (0.42s)\n{SECTION_RULE}\n{output}"
        ));
    }
    lines.push(format!("\n{HEADER_RULE}"));
    lines.push("# Collection completed: 2024-05-01 10:00:01".to_string());
    lines.push("# Total time: 1.00s (parallel)".to_string());
    lines.push(HEADER_RULE.to_string());
    lines.join("\n")
}

/// Engine status as the client prints it in batch mode: one table cell with
/// escaped newlines.
pub fn tabular_engine_status() -> String {
    format!(
        "Type\tName\tStatus\nInnoDB\t\t{}\n",
        ENGINE_STATUS.replace('\n', "\\n")
    )
}

pub fn sample_transcript() -> String {
    let engine = tabular_engine_status();
    render_transcript(&[
        ("SHOW ENGINE INNODB STATUS", &engine),
        ("SHOW GLOBAL STATUS", GLOBAL_STATUS),
        ("SHOW FULL PROCESSLIST", PROCESS_LIST),
        ("SHOW GLOBAL VARIABLES", GLOBAL_VARIABLES),
        ("SHOW REPLICA STATUS", REPLICA_STATUS),
        ("SHOW MASTER STATUS", PRIMARY_STATUS),
    ])
}

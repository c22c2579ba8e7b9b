//! InnoDB engine status decomposition.
//!
//! The report is split into named subsections, each introduced by a dash
//! rule, the name, and another dash rule. Every known subsection gets its
//! own extractor; fields an extractor cannot find stay at zero so a
//! partially readable report still yields data.

use crate::command::CommandKind;
use crate::section::{SectionSource, extract_section};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

const BACKGROUND_THREAD: &str = "BACKGROUND THREAD";
const SEMAPHORES: &str = "SEMAPHORES";
const LATEST_FOREIGN_KEY_ERROR: &str = "LATEST FOREIGN KEY ERROR";
const LATEST_DETECTED_DEADLOCK: &str = "LATEST DETECTED DEADLOCK";
const TRANSACTIONS: &str = "TRANSACTIONS";
const FILE_IO: &str = "FILE I/O";
const INSERT_BUFFER: &str = "INSERT BUFFER AND ADAPTIVE HASH INDEX";
const LOG: &str = "LOG";
const BUFFER_POOL: &str = "BUFFER POOL AND MEMORY";
const INDIVIDUAL_BUFFER_POOL_INFO: &str = "INDIVIDUAL BUFFER POOL INFO";
const ROW_OPERATIONS: &str = "ROW OPERATIONS";

/// Subsections in report order
pub const SUBSECTIONS: &[&str] = &[
    BACKGROUND_THREAD,
    SEMAPHORES,
    LATEST_FOREIGN_KEY_ERROR,
    LATEST_DETECTED_DEADLOCK,
    TRANSACTIONS,
    FILE_IO,
    INSERT_BUFFER,
    LOG,
    BUFFER_POOL,
    INDIVIDUAL_BUFFER_POOL_INFO,
    ROW_OPERATIONS,
];

const NOT_FOUND: &str = "InnoDB status not found in output.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportHeader {
    pub timestamp: Option<String>,
    /// Window the per-second averages were computed over
    pub averaging_window_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundThread {
    pub srv_active: u64,
    pub srv_shutdown: u64,
    pub srv_idle: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinStats {
    pub spins: u64,
    pub rounds: u64,
    pub os_waits: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Semaphores {
    /// One reservation count per wait array
    pub os_waits: Vec<u64>,
    pub signal_count: u64,
    pub rw_shared: Option<SpinStats>,
    pub rw_excl: Option<SpinStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transactions {
    pub trx_id_counter: u64,
    pub purge_trx_id: u64,
    pub history_list_length: u64,
    pub total_transactions: u64,
    pub not_started: u64,
    pub active: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileIo {
    pub os_file_reads: u64,
    pub os_file_writes: u64,
    pub os_fsyncs: u64,
    pub reads_per_sec: f64,
    pub writes_per_sec: f64,
    pub fsyncs_per_sec: f64,
    pub io_threads: u64,
    pub read_threads: u64,
    pub write_threads: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsertBuffer {
    pub ibuf_size: u64,
    pub ibuf_free_list: u64,
    pub ibuf_seg_size: u64,
    pub ibuf_merges: u64,
    /// Size of the first hash table partition
    pub hash_table_size: u64,
    /// Node heap buffers summed over all partitions
    pub hash_table_buffers: u64,
    pub hash_searches_per_sec: f64,
    pub non_hash_searches_per_sec: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStatus {
    pub log_sequence_number: u64,
    pub log_flushed_up_to: u64,
    pub last_checkpoint: u64,
    pub log_ios_done: u64,
    /// Sequence number minus last checkpoint, when both are known
    pub checkpoint_age: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferPool {
    pub pool_size: u64,
    pub free_buffers: u64,
    pub database_pages: u64,
    pub modified_pages: u64,
    pub pending_reads: u64,
    pub hit_rate_num: u64,
    pub hit_rate_denom: u64,
    pub pages_read: u64,
    pub pages_created: u64,
    pub pages_written: u64,
    pub pages_made_young: u64,
    pub pages_not_made_young: u64,
    pub utilization_pct: Option<f64>,
    pub dirty_pct: Option<f64>,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self {
            pool_size: 0,
            free_buffers: 0,
            database_pages: 0,
            modified_pages: 0,
            pending_reads: 0,
            hit_rate_num: 0,
            hit_rate_denom: 1000,
            pages_read: 0,
            pages_created: 0,
            pages_written: 0,
            pages_made_young: 0,
            pages_not_made_young: 0,
            utilization_pct: None,
            dirty_pct: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowOperations {
    pub queries_inside: u64,
    pub queries_in_queue: u64,
    pub read_views_open: u64,
    pub rows_inserted: u64,
    pub rows_updated: u64,
    pub rows_deleted: u64,
    pub rows_read: u64,
    pub inserts_per_sec: f64,
    pub updates_per_sec: f64,
    pub deletes_per_sec: f64,
    pub reads_per_sec: f64,
}

/// Structured view of `SHOW ENGINE INNODB STATUS`.
///
/// A subsection field is `None` only when the subsection itself is missing
/// from the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStatusReport {
    pub header: ReportHeader,
    pub background_thread: Option<BackgroundThread>,
    pub semaphores: Option<Semaphores>,
    pub transactions: Option<Transactions>,
    pub file_io: Option<FileIo>,
    pub insert_buffer: Option<InsertBuffer>,
    pub log: Option<LogStatus>,
    pub buffer_pool: Option<BufferPool>,
    pub row_operations: Option<RowOperations>,
    /// Raw text of every subsection found, keyed by subsection name
    pub raw_sections: BTreeMap<String, String>,
}

impl EngineStatusReport {
    /// Whether anything at all was recognized
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw_sections.is_empty() && self.header == ReportHeader::default()
    }
}

/// Parse the engine status out of a full transcript. When the section
/// cannot be isolated the whole transcript is searched for subsections.
#[must_use]
pub fn parse_engine_status(transcript: &str) -> EngineStatusReport {
    parse_engine_text(extract_section(transcript, CommandKind::EngineStatus).body)
}

/// Parse an isolated engine status body.
#[must_use]
pub fn parse_engine_text(body: &str) -> EngineStatusReport {
    let text = normalize(body);
    let mut report = EngineStatusReport {
        header: parse_header(&text),
        ..EngineStatusReport::default()
    };

    for name in SUBSECTIONS {
        if let Some(raw) = subsection(&text, name) {
            report.raw_sections.insert((*name).to_string(), raw.to_string());
        }
    }

    let raw = |name: &str| report.raw_sections.get(name).map(String::as_str);
    let background_thread = raw(BACKGROUND_THREAD).map(parse_background_thread);
    let semaphores = raw(SEMAPHORES).map(parse_semaphores);
    let transactions = raw(TRANSACTIONS).map(parse_transactions);
    let file_io = raw(FILE_IO).map(parse_file_io);
    let insert_buffer = raw(INSERT_BUFFER).map(parse_insert_buffer);
    let log = raw(LOG).map(parse_log);
    let buffer_pool = raw(BUFFER_POOL).map(parse_buffer_pool);
    let row_operations = raw(ROW_OPERATIONS).map(parse_row_operations);

    report.background_thread = background_thread;
    report.semaphores = semaphores;
    report.transactions = transactions;
    report.file_io = file_io;
    report.insert_buffer = insert_buffer;
    report.log = log;
    report.buffer_pool = buffer_pool;
    report.row_operations = row_operations;
    report
}

/// Human-readable rendering of the engine status, one block per subsection.
#[must_use]
pub fn render_engine_status(transcript: &str) -> String {
    let section = extract_section(transcript, CommandKind::EngineStatus);
    if section.source == SectionSource::Passthrough || section.body.is_empty() {
        return if transcript.is_empty() {
            NOT_FOUND.to_string()
        } else {
            transcript.to_string()
        };
    }

    let text = normalize(section.body);
    let rule = "=".repeat(60);
    let mut out = vec![
        rule.clone(),
        "INNODB ENGINE STATUS".to_string(),
        rule,
        String::new(),
    ];

    if !SUBSECTIONS.iter().any(|name| text.contains(*name)) {
        out.push(text);
        return out.join("\n");
    }

    let title_lines = out.len();
    for name in SUBSECTIONS {
        if let Some(content) = subsection(&text, name) {
            out.push(format!("### {name}"));
            out.push("-".repeat(40));
            out.push(if content.is_empty() {
                "(empty)".to_string()
            } else {
                content.to_string()
            });
            out.push(String::new());
        }
    }

    if out.len() > title_lines {
        out.join("\n")
    } else {
        text
    }
}

static TABULAR_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Type\tName\tStatus\r?\n\w+\t\w*\t").expect("tabular prefix pattern")
});

/// Opening rule for every known subsection, in report order.
static SUBSECTION_OPENINGS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    SUBSECTIONS
        .iter()
        .map(|name| {
            let pattern = format!(r"(?m)^-+\r?\n{}\r?\n-+\r?\n", regex::escape(name));
            (*name, Regex::new(&pattern).expect("subsection opening pattern"))
        })
        .collect()
});

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($re).expect(concat!("pattern ", stringify!($name))));
    };
}

pattern!(MONITOR_TIMESTAMP, r"(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}).*?INNODB MONITOR OUTPUT");
pattern!(AVERAGING_WINDOW, r"Per second averages calculated from the last (\d+) seconds");

pattern!(
    MASTER_THREAD_LOOPS,
    r"srv_master_thread loops: (\d+) srv_active, (\d+) srv_shutdown, (\d+) srv_idle"
);

pattern!(RESERVATION_COUNT, r"OS WAIT ARRAY INFO: reservation count (\d+)");
pattern!(SIGNAL_COUNT, r"signal count (\d+)");
pattern!(RW_SHARED_SPINS, r"RW-shared spins (\d+), rounds (\d+), OS waits (\d+)");
pattern!(RW_EXCL_SPINS, r"RW-excl spins (\d+), rounds (\d+), OS waits (\d+)");

pattern!(TRANSACTION_ENTRY, r"---TRANSACTION (\d+)");
pattern!(NOT_STARTED, r"not started");
pattern!(TRX_ID_COUNTER, r"Trx id counter (\d+)");
pattern!(PURGE_DONE, r"Purge done for trx's n:o < (\d+)");
pattern!(HISTORY_LIST_LENGTH, r"History list length (\d+)");

pattern!(IO_THREAD_STATE, r"I/O thread \d+ state: (.*?) \((.*?)\)");
pattern!(OS_FILE_READS, r"(\d+) OS file reads");
pattern!(OS_FILE_WRITES, r"(\d+) OS file writes");
pattern!(OS_FSYNCS, r"(\d+) OS fsyncs");
pattern!(READS_PER_SEC, r"([\d.]+) reads/s");
pattern!(WRITES_PER_SEC, r"([\d.]+) writes/s");
pattern!(FSYNCS_PER_SEC, r"([\d.]+) fsyncs/s");

pattern!(IBUF, r"Ibuf: size (\d+), free list len (\d+), seg size (\d+), (\d+) merges");
pattern!(HASH_TABLE, r"Hash table size (\d+), node heap has (\d+) buffer");
pattern!(HASH_SEARCHES, r"([\d.]+) hash searches/s, ([\d.]+) non-hash searches/s");

pattern!(LOG_SEQUENCE_NUMBER, r"Log sequence number\s+(\d+)");
pattern!(LOG_FLUSHED_UP_TO, r"Log flushed up to\s+(\d+)");
pattern!(LAST_CHECKPOINT, r"Last checkpoint at\s+(\d+)");
pattern!(LOG_IOS_DONE, r"(\d+) log i/o's done");

pattern!(HIT_RATE, r"Buffer pool hit rate (\d+) / (\d+)");
pattern!(PAGES_READ, r"Pages read (\d+), created (\d+), written (\d+)");
pattern!(PAGES_YOUNG, r"Pages made young (\d+), not young (\d+)");
pattern!(POOL_SIZE, r"Buffer pool size\s+(\d+)");
pattern!(FREE_BUFFERS, r"Free buffers\s+(\d+)");
pattern!(DATABASE_PAGES, r"Database pages\s+(\d+)");
pattern!(MODIFIED_PAGES, r"Modified db pages\s+(\d+)");
pattern!(PENDING_READS, r"Pending reads\s+(\d+)");

pattern!(QUERIES_INSIDE, r"(\d+) queries inside InnoDB, (\d+) queries in queue");
pattern!(READ_VIEWS, r"(\d+) read views open inside InnoDB");
pattern!(
    ROWS_TOTALS,
    r"Number of rows inserted (\d+), updated (\d+), deleted (\d+), read (\d+)"
);
pattern!(
    ROW_RATES,
    r"([\d.]+) inserts/s, ([\d.]+) updates/s, ([\d.]+) deletes/s, ([\d.]+) reads/s"
);

/// Undo the client's tabular escaping and drop the `Type/Name/Status` row
/// prefix when present.
fn normalize(body: &str) -> String {
    let text = if body.contains("\\n") {
        body.replace("\\n", "\n")
    } else {
        body.to_string()
    };

    TABULAR_PREFIX.replace(&text, "").into_owned()
}

fn subsection<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let (_, opening) = SUBSECTION_OPENINGS.iter().find(|(known, _)| *known == name)?;
    let opening = opening.find(text)?;
    let rest = &text[opening.end()..];
    let end = rest.find("-----").unwrap_or(rest.len());
    Some(rest[..end].trim())
}

fn group<T: std::str::FromStr>(caps: Option<&Captures<'_>>, index: usize) -> Option<T> {
    caps?.get(index)?.as_str().parse().ok()
}

fn first_u64(text: &str, re: &Regex) -> u64 {
    group(re.captures(text).as_ref(), 1).unwrap_or(0)
}

fn first_f64(text: &str, re: &Regex) -> f64 {
    group(re.captures(text).as_ref(), 1).unwrap_or(0.0)
}

fn count_matches(text: &str, re: &Regex) -> u64 {
    re.find_iter(text).count() as u64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, whole: u64) -> Option<f64> {
    (whole > 0).then(|| round2(part as f64 / whole as f64 * 100.0))
}

fn parse_header(text: &str) -> ReportHeader {
    ReportHeader {
        timestamp: MONITOR_TIMESTAMP
            .captures(text)
            .and_then(|c| c.get(1).map(|m| m.as_str().to_string())),
        averaging_window_secs: group(AVERAGING_WINDOW.captures(text).as_ref(), 1),
    }
}

fn parse_background_thread(text: &str) -> BackgroundThread {
    let caps = MASTER_THREAD_LOOPS.captures(text);
    BackgroundThread {
        srv_active: group(caps.as_ref(), 1).unwrap_or(0),
        srv_shutdown: group(caps.as_ref(), 2).unwrap_or(0),
        srv_idle: group(caps.as_ref(), 3).unwrap_or(0),
    }
}

fn spin_stats(text: &str, re: &Regex) -> Option<SpinStats> {
    let caps = re.captures(text)?;
    Some(SpinStats {
        spins: group(Some(&caps), 1).unwrap_or(0),
        rounds: group(Some(&caps), 2).unwrap_or(0),
        os_waits: group(Some(&caps), 3).unwrap_or(0),
    })
}

fn parse_semaphores(text: &str) -> Semaphores {
    let os_waits = RESERVATION_COUNT
        .captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().parse().ok())
        .collect();

    Semaphores {
        os_waits,
        signal_count: first_u64(text, &SIGNAL_COUNT),
        rw_shared: spin_stats(text, &RW_SHARED_SPINS),
        rw_excl: spin_stats(text, &RW_EXCL_SPINS),
    }
}

fn parse_transactions(text: &str) -> Transactions {
    let total = count_matches(text, &TRANSACTION_ENTRY);
    let not_started = count_matches(text, &NOT_STARTED);
    Transactions {
        trx_id_counter: first_u64(text, &TRX_ID_COUNTER),
        purge_trx_id: first_u64(text, &PURGE_DONE),
        history_list_length: first_u64(text, &HISTORY_LIST_LENGTH),
        total_transactions: total,
        not_started,
        active: total.saturating_sub(not_started),
    }
}

fn parse_file_io(text: &str) -> FileIo {
    let thread_kinds: Vec<&str> = IO_THREAD_STATE
        .captures_iter(text)
        .filter_map(|c| c.get(2).map(|m| m.as_str()))
        .collect();
    let threads_of = |kind: &str| thread_kinds.iter().filter(|t| t.contains(kind)).count() as u64;

    FileIo {
        os_file_reads: first_u64(text, &OS_FILE_READS),
        os_file_writes: first_u64(text, &OS_FILE_WRITES),
        os_fsyncs: first_u64(text, &OS_FSYNCS),
        reads_per_sec: first_f64(text, &READS_PER_SEC),
        writes_per_sec: first_f64(text, &WRITES_PER_SEC),
        fsyncs_per_sec: first_f64(text, &FSYNCS_PER_SEC),
        io_threads: thread_kinds.len() as u64,
        read_threads: threads_of("read"),
        write_threads: threads_of("write"),
    }
}

fn parse_insert_buffer(text: &str) -> InsertBuffer {
    let ibuf = IBUF.captures(text);
    let hash_tables: Vec<(u64, u64)> = HASH_TABLE
        .captures_iter(text)
        .map(|c| {
            (
                group(Some(&c), 1).unwrap_or(0),
                group(Some(&c), 2).unwrap_or(0),
            )
        })
        .collect();
    let searches = HASH_SEARCHES.captures(text);

    InsertBuffer {
        ibuf_size: group(ibuf.as_ref(), 1).unwrap_or(0),
        ibuf_free_list: group(ibuf.as_ref(), 2).unwrap_or(0),
        ibuf_seg_size: group(ibuf.as_ref(), 3).unwrap_or(0),
        ibuf_merges: group(ibuf.as_ref(), 4).unwrap_or(0),
        hash_table_size: hash_tables.first().map_or(0, |(size, _)| *size),
        hash_table_buffers: hash_tables.iter().map(|(_, buffers)| buffers).sum(),
        hash_searches_per_sec: group(searches.as_ref(), 1).unwrap_or(0.0),
        non_hash_searches_per_sec: group(searches.as_ref(), 2).unwrap_or(0.0),
    }
}

fn parse_log(text: &str) -> LogStatus {
    let log_sequence_number = first_u64(text, &LOG_SEQUENCE_NUMBER);
    let last_checkpoint = first_u64(text, &LAST_CHECKPOINT);
    let checkpoint_age = if log_sequence_number > 0 && last_checkpoint > 0 {
        log_sequence_number.checked_sub(last_checkpoint)
    } else {
        None
    };

    LogStatus {
        log_sequence_number,
        log_flushed_up_to: first_u64(text, &LOG_FLUSHED_UP_TO),
        last_checkpoint,
        log_ios_done: first_u64(text, &LOG_IOS_DONE),
        checkpoint_age,
    }
}

fn parse_buffer_pool(text: &str) -> BufferPool {
    let hit_rate = HIT_RATE.captures(text);
    let pages = PAGES_READ.captures(text);
    let young = PAGES_YOUNG.captures(text);

    let pool_size = first_u64(text, &POOL_SIZE);
    let database_pages = first_u64(text, &DATABASE_PAGES);
    let modified_pages = first_u64(text, &MODIFIED_PAGES);

    BufferPool {
        pool_size,
        free_buffers: first_u64(text, &FREE_BUFFERS),
        database_pages,
        modified_pages,
        pending_reads: first_u64(text, &PENDING_READS),
        hit_rate_num: group(hit_rate.as_ref(), 1).unwrap_or(0),
        hit_rate_denom: group(hit_rate.as_ref(), 2).unwrap_or(1000),
        pages_read: group(pages.as_ref(), 1).unwrap_or(0),
        pages_created: group(pages.as_ref(), 2).unwrap_or(0),
        pages_written: group(pages.as_ref(), 3).unwrap_or(0),
        pages_made_young: group(young.as_ref(), 1).unwrap_or(0),
        pages_not_made_young: group(young.as_ref(), 2).unwrap_or(0),
        utilization_pct: percent(database_pages, pool_size),
        dirty_pct: percent(modified_pages, pool_size),
    }
}

fn parse_row_operations(text: &str) -> RowOperations {
    let queries = QUERIES_INSIDE.captures(text);
    let rows = ROWS_TOTALS.captures(text);
    let rates = ROW_RATES.captures(text);

    RowOperations {
        queries_inside: group(queries.as_ref(), 1).unwrap_or(0),
        queries_in_queue: group(queries.as_ref(), 2).unwrap_or(0),
        read_views_open: first_u64(text, &READ_VIEWS),
        rows_inserted: group(rows.as_ref(), 1).unwrap_or(0),
        rows_updated: group(rows.as_ref(), 2).unwrap_or(0),
        rows_deleted: group(rows.as_ref(), 3).unwrap_or(0),
        rows_read: group(rows.as_ref(), 4).unwrap_or(0),
        inserts_per_sec: group(rates.as_ref(), 1).unwrap_or(0.0),
        updates_per_sec: group(rates.as_ref(), 2).unwrap_or(0.0),
        deletes_per_sec: group(rates.as_ref(), 3).unwrap_or(0.0),
        reads_per_sec: group(rates.as_ref(), 4).unwrap_or(0.0),
    }
}

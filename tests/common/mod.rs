#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Once;

use masc_config::{MascConfig, Target};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

/// Initialize tracing once for integration tests.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::registry()
            .with(fmt::layer().with_test_writer())
            .with(filter)
            .init();
    });
}

/// Default config with its database and run archive inside `dir`.
pub fn temp_config(dir: &Path) -> MascConfig {
    let mut config = MascConfig::default();
    config.global.db_path = dir.join("masc.duckdb");
    config.global.runs_dir = dir.join("runs");
    config
}

/// Canned server behaviour keyed on the host argument:
/// `down*` refuses connections, `slow*` hangs, anything else answers.
/// Answers exit 1 with only the password advisory on stderr.
#[cfg(unix)]
pub const FAKE_CLIENT: &str = r#"#!/bin/sh
case "$1" in
  -hdown*)
    echo "ERROR 2003 (HY000): Can't connect to MySQL server on '${1#-h}' (111)" >&2
    exit 1
    ;;
  -hslow*)
    exec sleep 30
    ;;
esac
echo 'mysql: [Warning] Using a password on the command line interface can be insecure.' >&2
case "$5" in
  "SHOW ENGINE INNODB STATUS")
    printf 'Type\tName\tStatus\nInnoDB\t\t\\n=====================================\\nINNODB MONITOR OUTPUT\\n=====================================\\n---\\nLOG\\n---\\nLog sequence number          4200\\nLast checkpoint at           4100\\n'
    ;;
  "SHOW GLOBAL STATUS")
    printf 'Variable_name\tValue\nThreads_connected\t4\nUptime\t3600\nOpen_tables\t64\nOpen_table_definitions\t60\n'
    ;;
  "SHOW FULL PROCESSLIST")
    printf 'Id\tUser\tHost\tdb\tCommand\tTime\tState\tInfo\n5\tobserver\tlocalhost\tNULL\tQuery\t0\tinit\tSHOW FULL PROCESSLIST\n'
    ;;
  "SHOW GLOBAL VARIABLES")
    printf 'Variable_name\tValue\nmax_connections\t151\ninnodb_buffer_pool_size\t134217728\nversion\t8.0.36\n'
    ;;
  "SHOW MASTER STATUS")
    printf 'File\tPosition\tBinlog_Do_DB\tBinlog_Ignore_DB\tExecuted_Gtid_Set\nbinlog.000007\t2048\t\t\t\n'
    ;;
esac
exit 1
"#;

/// Write an executable fake client into `dir`.
#[cfg(unix)]
pub fn fake_client(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-mysql");
    std::fs::write(&path, FAKE_CLIENT).expect("write fake client");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake client");
    path
}

pub fn target(id: &str) -> Target {
    Target::new(id, id, "observer").with_password("pw")
}

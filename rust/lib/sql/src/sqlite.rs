use std::ops::Deref;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode};
use tracing::{debug, error, info, warn};

use crate::error::SQLError;
use crate::traits::{Executor, Row, SQLStore, Transaction, Value};

/// Tuning knobs for [`SqliteStore`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Number of pooled connections (forced to 1 for in-memory stores).
    pub pool_size: usize,
    /// How long a caller waits for a free connection.
    pub checkout_timeout: Duration,
    /// How long a writer waits on SQLite's write lock.
    pub busy_timeout: Duration,
    /// Retries for autocommit statements that fail with a connection error.
    pub max_retries: u32,
    /// Fixed delay between retries.
    pub retry_backoff: Duration,
    /// Log every statement at debug level.
    pub log_queries: bool,
    /// Statements slower than this are logged as warnings.
    pub slow_query: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            pool_size: 10,
            checkout_timeout: Duration::from_secs(10),
            busy_timeout: Duration::from_secs(5),
            max_retries: 2,
            retry_backoff: Duration::from_secs(1),
            log_queries: false,
            slow_query: Duration::from_millis(500),
        }
    }
}

/// Result of [`SqliteStore::health_check`].
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub healthy: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
}

/// SqliteStore is a SQLStore implementation backed by rusqlite (bundled SQLite)
/// with a fixed-size connection pool.
///
/// Write transactions start with `BEGIN IMMEDIATE`, so writers are serialized
/// by the database lock and see each other's committed rows.
pub struct SqliteStore {
    pool: Pool,
    options: StoreOptions,
    last_health: Mutex<Option<HealthReport>>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path, options: StoreOptions) -> Result<Self, SQLError> {
        let size = options.pool_size.max(1);
        let mut conns = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open(path).map_err(|e| SQLError::Connection(e.to_string()))?;
            configure(&conn, &options)?;
            // WAL lets readers proceed while a writer holds the lock.
            conn.execute_batch("PRAGMA journal_mode=WAL;")
                .map_err(|e| SQLError::Connection(e.to_string()))?;
            conns.push(conn);
        }
        info!("sqlite store opened at {} (pool={})", path.display(), size);
        Ok(Self {
            pool: Pool::new(conns, options.checkout_timeout),
            options,
            last_health: Mutex::new(None),
        })
    }

    /// Create an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self, SQLError> {
        Self::open_in_memory_with(StoreOptions {
            retry_backoff: Duration::ZERO,
            ..StoreOptions::default()
        })
    }

    /// In-memory database with explicit options. Each in-memory connection is
    /// its own database, so the pool always holds exactly one.
    pub fn open_in_memory_with(options: StoreOptions) -> Result<Self, SQLError> {
        let conn = Connection::open_in_memory().map_err(|e| SQLError::Connection(e.to_string()))?;
        configure(&conn, &options)?;
        Ok(Self {
            pool: Pool::new(vec![conn], options.checkout_timeout),
            options: StoreOptions {
                pool_size: 1,
                ..options
            },
            last_health: Mutex::new(None),
        })
    }

    /// Close the pool. Connections in use are dropped when returned;
    /// later checkouts fail with a connection error.
    pub fn close(&self) {
        self.pool.close();
        info!("sqlite store closed");
    }

    /// Round-trip a trivial statement and record the outcome.
    pub fn health_check(&self) -> HealthReport {
        let started = Instant::now();
        let result = self
            .pool
            .get()
            .and_then(|conn| run_query(&conn, "SELECT 1 AS health", &[]));
        let latency_ms = started.elapsed().as_millis() as u64;
        let report = match result {
            Ok(_) => {
                debug!("health check passed ({}ms)", latency_ms);
                HealthReport { healthy: true, latency_ms, error: None }
            }
            Err(e) => {
                error!("health check failed ({}ms): {}", latency_ms, e);
                HealthReport { healthy: false, latency_ms, error: Some(e.to_string()) }
            }
        };
        if let Ok(mut last) = self.last_health.lock() {
            *last = Some(report.clone());
        }
        report
    }

    /// The last recorded health check, without running a new one.
    pub fn health_status(&self) -> Option<HealthReport> {
        self.last_health.lock().ok().and_then(|last| last.clone())
    }

    /// Run an autocommit statement, retrying connection errors in a bounded loop.
    fn with_retry<T>(
        &self,
        sql: &str,
        params: &[Value],
        op: impl Fn(&Connection) -> Result<T, SQLError>,
    ) -> Result<T, SQLError> {
        let mut attempt = 0;
        loop {
            let started = Instant::now();
            let result = self.pool.get().and_then(|conn| op(&*conn));
            log_statement(&self.options, sql, params, started.elapsed(), result.as_ref().err());
            match result {
                Err(e) if e.is_retryable() && attempt < self.options.max_retries => {
                    attempt += 1;
                    warn!(
                        "retrying statement ({}/{}) after: {}",
                        attempt, self.options.max_retries, e
                    );
                    std::thread::sleep(self.options.retry_backoff);
                }
                other => return other,
            }
        }
    }
}

impl Executor for SqliteStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        self.with_retry(sql, params, |conn| run_query(conn, sql, params))
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        self.with_retry(sql, params, |conn| run_exec(conn, sql, params))
    }
}

impl SQLStore for SqliteStore {
    fn begin(&self) -> Result<Box<dyn Transaction + '_>, SQLError> {
        let conn = self.pool.get()?;
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| classify(e, SQLError::Execution))?;
        if self.options.log_queries {
            debug!("transaction started");
        }
        Ok(Box::new(SqliteTransaction {
            conn,
            options: &self.options,
            started: Instant::now(),
            finished: false,
        }))
    }
}

/// A `BEGIN IMMEDIATE` transaction holding one pooled connection.
struct SqliteTransaction<'a> {
    conn: PooledConnection<'a>,
    options: &'a StoreOptions,
    started: Instant,
    finished: bool,
}

impl SqliteTransaction<'_> {
    fn finish(&mut self, stmt: &str) -> Result<(), SQLError> {
        self.conn
            .execute_batch(stmt)
            .map_err(|e| classify(e, SQLError::Execution))?;
        self.finished = true;
        Ok(())
    }
}

impl Executor for SqliteTransaction<'_> {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        let started = Instant::now();
        let result = run_query(&self.conn, sql, params);
        log_statement(self.options, sql, params, started.elapsed(), result.as_ref().err());
        result
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        let started = Instant::now();
        let result = run_exec(&self.conn, sql, params);
        log_statement(self.options, sql, params, started.elapsed(), result.as_ref().err());
        result
    }
}

impl Transaction for SqliteTransaction<'_> {
    fn commit(mut self: Box<Self>) -> Result<(), SQLError> {
        self.finish("COMMIT")?;
        if self.options.log_queries {
            debug!("transaction committed ({}ms)", self.started.elapsed().as_millis());
        }
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> Result<(), SQLError> {
        self.finish("ROLLBACK")?;
        warn!("transaction rolled back ({}ms)", self.started.elapsed().as_millis());
        Ok(())
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                error!("rollback on drop failed: {}", e);
            } else {
                warn!("transaction dropped without commit, rolled back");
            }
        }
    }
}

// ── Pool ────────────────────────────────────────────────────────────

struct Pool {
    idle: Mutex<Vec<Connection>>,
    available: Condvar,
    closed: AtomicBool,
    checkout_timeout: Duration,
}

impl Pool {
    fn new(conns: Vec<Connection>, checkout_timeout: Duration) -> Self {
        Self {
            idle: Mutex::new(conns),
            available: Condvar::new(),
            closed: AtomicBool::new(false),
            checkout_timeout,
        }
    }

    fn get(&self) -> Result<PooledConnection<'_>, SQLError> {
        let deadline = Instant::now() + self.checkout_timeout;
        let mut idle = self
            .idle
            .lock()
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(SQLError::Connection("store is closed".into()));
            }
            if let Some(conn) = idle.pop() {
                return Ok(PooledConnection { pool: self, conn: Some(conn) });
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(SQLError::Connection("connection pool exhausted".into()));
            }
            let (guard, _) = self
                .available
                .wait_timeout(idle, deadline - now)
                .map_err(|e| SQLError::Connection(e.to_string()))?;
            idle = guard;
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if let Ok(mut idle) = self.idle.lock() {
            idle.clear();
        }
        self.available.notify_all();
    }
}

struct PooledConnection<'a> {
    pool: &'a Pool,
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only taken in Drop.
        self.conn.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if self.pool.closed.load(Ordering::Acquire) {
                return;
            }
            if let Ok(mut idle) = self.pool.idle.lock() {
                idle.push(conn);
            }
            self.pool.available.notify_one();
        }
    }
}

// ── Statement helpers ───────────────────────────────────────────────

fn configure(conn: &Connection, options: &StoreOptions) -> Result<(), SQLError> {
    conn.busy_timeout(options.busy_timeout)
        .map_err(|e| SQLError::Connection(e.to_string()))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|e| SQLError::Connection(e.to_string()))?;
    Ok(())
}

/// Map a rusqlite error, treating lock contention and I/O failures as transient.
fn classify(e: rusqlite::Error, fallback: fn(String) -> SQLError) -> SQLError {
    if let rusqlite::Error::SqliteFailure(ref err, _) = e {
        match err.code {
            ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::CannotOpen
            | ErrorCode::SystemIoFailure => return SQLError::Connection(e.to_string()),
            _ => {}
        }
    }
    fallback(e.to_string())
}

/// Convert our Value enum to rusqlite's ToSql.
fn bind_params(params: &[Value]) -> Vec<Box<dyn rusqlite::types::ToSql + '_>> {
    params
        .iter()
        .map(|v| -> Box<dyn rusqlite::types::ToSql + '_> {
            match v {
                Value::Null => Box::new(rusqlite::types::Null),
                Value::Integer(i) => Box::new(*i),
                Value::Real(f) => Box::new(*f),
                Value::Text(s) => Box::new(s.as_str()),
                Value::Blob(b) => Box::new(b.as_slice()),
            }
        })
        .collect()
}

fn run_query(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
    let bound = bind_params(params);
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = bound.iter().map(|b| b.as_ref()).collect();

    let mut stmt = conn.prepare(sql).map_err(|e| classify(e, SQLError::Query))?;

    let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            let mut columns = Vec::with_capacity(column_names.len());
            for (i, name) in column_names.iter().enumerate() {
                columns.push((name.clone(), row_value_at(row, i)?));
            }
            Ok(Row { columns })
        })
        .map_err(|e| classify(e, SQLError::Query))?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(|e| classify(e, SQLError::Query))?);
    }
    Ok(result)
}

fn run_exec(conn: &Connection, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
    let bound = bind_params(params);
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = bound.iter().map(|b| b.as_ref()).collect();

    let affected = conn
        .execute(sql, param_refs.as_slice())
        .map_err(|e| classify(e, SQLError::Execution))?;
    Ok(affected as u64)
}

/// Extract a Value from a rusqlite row at a given column index.
fn row_value_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Value> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    })
}

// ── Query logging ───────────────────────────────────────────────────

const MAX_LOGGED_SQL: usize = 200;
const MAX_LOGGED_PARAMS: usize = 5;

/// Collapse whitespace and truncate a statement and its params for logs.
fn format_for_log(sql: &str, params: &[Value]) -> String {
    let normalized = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut shown: String = normalized.chars().take(MAX_LOGGED_SQL).collect();
    if normalized.chars().count() > MAX_LOGGED_SQL {
        shown.push_str("...");
    }
    let mut rendered: Vec<String> = params
        .iter()
        .take(MAX_LOGGED_PARAMS)
        .map(|p| format!("{:?}", p))
        .collect();
    if params.len() > MAX_LOGGED_PARAMS {
        rendered.push(format!("(+{} more)", params.len() - MAX_LOGGED_PARAMS));
    }
    format!("{} | params: [{}]", shown, rendered.join(", "))
}

fn log_statement(
    options: &StoreOptions,
    sql: &str,
    params: &[Value],
    elapsed: Duration,
    err: Option<&SQLError>,
) {
    let ms = elapsed.as_millis();
    if let Some(e) = err {
        error!("[db] {}ms | {} | {}", ms, format_for_log(sql, params), e);
    } else if elapsed > options.slow_query {
        warn!("[db slow] {}ms | {}", ms, format_for_log(sql, params));
    } else if options.log_queries {
        debug!("[db] {}ms | {}", ms, format_for_log(sql, params));
    }
}

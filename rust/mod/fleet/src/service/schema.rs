use flashback_sql::SQLStore;

use super::FleetError;

/// SQL DDL statements to initialize the fleet database schema.
///
/// Timestamps are fixed-width UTC RFC 3339 text, so `ORDER BY created_at`
/// is chronological.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS platforms (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive')),
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS usb_types (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        platform_id INTEGER NOT NULL REFERENCES platforms(id),
        name TEXT NOT NULL,
        requires_model INTEGER NOT NULL DEFAULT 0,
        supports_legacy INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive')),
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS models (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        model_number TEXT,
        notes TEXT,
        status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive')),
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS versions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        usb_type_id INTEGER NOT NULL REFERENCES usb_types(id),
        model_id INTEGER REFERENCES models(id),
        version_code TEXT NOT NULL,
        is_current INTEGER NOT NULL DEFAULT 0,
        is_legacy_valid INTEGER NOT NULL DEFAULT 0,
        official_link TEXT,
        internal_link TEXT,
        comments TEXT,
        created_at TEXT NOT NULL,
        marked_current_at TEXT,
        status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive'))
    )",
    "CREATE TABLE IF NOT EXISTS technicians (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        notes TEXT,
        status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive')),
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS usb_drives (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        usb_id TEXT NOT NULL UNIQUE,
        platform_id INTEGER NOT NULL REFERENCES platforms(id),
        usb_type_id INTEGER NOT NULL REFERENCES usb_types(id),
        model_id INTEGER REFERENCES models(id),
        version_id INTEGER NOT NULL REFERENCES versions(id),
        technician_id INTEGER REFERENCES technicians(id),
        custom_text TEXT,
        hardware_model TEXT,
        hardware_serial TEXT,
        capacity_gb REAL,
        status TEXT NOT NULL CHECK (status IN ('assigned', 'ready', 'pending_update', 'lost', 'retired')),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    // usb_id is the drive's numeric id, not its label.
    "CREATE TABLE IF NOT EXISTS event_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        usb_id INTEGER NOT NULL REFERENCES usb_drives(id),
        event_type TEXT NOT NULL,
        details TEXT NOT NULL,
        username TEXT NOT NULL,
        timestamp TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS usb_id_counter (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        value INTEGER NOT NULL
    )",
    "INSERT OR IGNORE INTO usb_id_counter (id, value) VALUES (1, 0)",
    // At most one current version per scope; model 0 never exists.
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_versions_one_current
        ON versions(usb_type_id, COALESCE(model_id, 0)) WHERE is_current = 1",
    "CREATE TRIGGER IF NOT EXISTS trg_event_logs_no_update
        BEFORE UPDATE ON event_logs
        BEGIN SELECT RAISE(ABORT, 'event_logs is append-only'); END",
    "CREATE TRIGGER IF NOT EXISTS trg_event_logs_no_delete
        BEFORE DELETE ON event_logs
        BEGIN SELECT RAISE(ABORT, 'event_logs is append-only'); END",
    // Indexes
    "CREATE INDEX IF NOT EXISTS idx_usb_types_platform ON usb_types(platform_id)",
    "CREATE INDEX IF NOT EXISTS idx_versions_scope ON versions(usb_type_id, model_id)",
    "CREATE INDEX IF NOT EXISTS idx_drives_scope ON usb_drives(usb_type_id, model_id)",
    "CREATE INDEX IF NOT EXISTS idx_drives_status ON usb_drives(status)",
    "CREATE INDEX IF NOT EXISTS idx_drives_technician ON usb_drives(technician_id)",
    "CREATE INDEX IF NOT EXISTS idx_drives_version ON usb_drives(version_id)",
    "CREATE INDEX IF NOT EXISTS idx_events_drive ON event_logs(usb_id)",
];

pub fn init_schema(sql: &dyn SQLStore) -> Result<(), FleetError> {
    for stmt in SCHEMA {
        sql.exec(stmt, &[])
            .map_err(|e| FleetError::Query(format!("schema init failed: {}", e)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use flashback_sql::{Executor, SqliteStore, Value};

    use super::*;

    #[test]
    fn init_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        init_schema(&store).unwrap();
        init_schema(&store).unwrap();
        let row = store
            .query_one("SELECT value FROM usb_id_counter WHERE id = 1", &[])
            .unwrap()
            .unwrap();
        assert_eq!(row.get_i64("value"), Some(0));
    }

    #[test]
    fn event_logs_are_append_only() {
        let store = SqliteStore::open_in_memory().unwrap();
        init_schema(&store).unwrap();
        let now = Value::from("2024-01-01T00:00:00.000000Z");
        store
            .exec("INSERT INTO platforms (name, created_at) VALUES ('P', ?)", &[now.clone()])
            .unwrap();
        store
            .exec(
                "INSERT INTO usb_types (platform_id, name, created_at) VALUES (1, 'T', ?)",
                &[now.clone()],
            )
            .unwrap();
        store
            .exec(
                "INSERT INTO versions (usb_type_id, version_code, created_at) VALUES (1, 'V', ?)",
                &[now.clone()],
            )
            .unwrap();
        store
            .exec(
                "INSERT INTO usb_drives (usb_id, platform_id, usb_type_id, version_id, status, created_at, updated_at)
                 VALUES ('A001', 1, 1, 1, 'ready', ?1, ?1)",
                &[now.clone()],
            )
            .unwrap();
        store
            .exec(
                "INSERT INTO event_logs (usb_id, event_type, details, username, timestamp)
                 VALUES (1, 'created', 'x', 'admin', ?)",
                &[now],
            )
            .unwrap();

        let err = store.exec("UPDATE event_logs SET details = 'y'", &[]).unwrap_err();
        assert!(err.to_string().contains("append-only"));
        let err = store.exec("DELETE FROM event_logs", &[]).unwrap_err();
        assert!(err.to_string().contains("append-only"));
    }

    #[test]
    fn one_current_version_per_scope() {
        let store = SqliteStore::open_in_memory().unwrap();
        init_schema(&store).unwrap();
        let now = Value::from("2024-01-01T00:00:00.000000Z");
        store
            .exec("INSERT INTO platforms (name, created_at) VALUES ('P', ?)", &[now.clone()])
            .unwrap();
        store
            .exec(
                "INSERT INTO usb_types (platform_id, name, created_at) VALUES (1, 'T', ?)",
                &[now.clone()],
            )
            .unwrap();
        let insert = "INSERT INTO versions (usb_type_id, version_code, is_current, created_at)
                      VALUES (1, ?, 1, ?)";
        store.exec(insert, &["V1".into(), now.clone()]).unwrap();
        let err = store.exec(insert, &["V2".into(), now]).unwrap_err();
        assert!(err.is_unique_violation());
    }
}

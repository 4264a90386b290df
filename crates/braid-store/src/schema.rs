/// SQL DDL for the braid database.
/// WAL mode + foreign keys enabled at connection time.
///
/// Two parallel table pairs back the permanent and temporary tracks; the
/// pairs are schema-identical so all repository code is generic over the
/// track. `row_id` is the storage-assigned identifier; `id` on threads is
/// the client-generated external key.
pub const SCHEMA_VERSION: u32 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS threads (
    row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL,
    title TEXT NOT NULL DEFAULT 'New Thread',
    is_public INTEGER NOT NULL DEFAULT 0,
    owner_id TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    thread_id TEXT NOT NULL,
    content TEXT NOT NULL,
    author TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    files TEXT NOT NULL DEFAULT '[]',
    status TEXT NOT NULL DEFAULT 'complete',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS temporary_threads (
    row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL,
    title TEXT NOT NULL DEFAULT 'New Thread',
    is_public INTEGER NOT NULL DEFAULT 0,
    owner_id TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS temporary_messages (
    row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    thread_id TEXT NOT NULL,
    content TEXT NOT NULL,
    author TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    files TEXT NOT NULL DEFAULT '[]',
    status TEXT NOT NULL DEFAULT 'complete',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_threads_id ON threads(id);
CREATE INDEX IF NOT EXISTS idx_threads_owner ON threads(owner_id);
CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(thread_id);
CREATE INDEX IF NOT EXISTS idx_messages_owner ON messages(owner_id);
CREATE INDEX IF NOT EXISTS idx_temporary_threads_id ON temporary_threads(id);
CREATE INDEX IF NOT EXISTS idx_temporary_threads_owner ON temporary_threads(owner_id);
CREATE INDEX IF NOT EXISTS idx_temporary_messages_thread ON temporary_messages(thread_id);
CREATE INDEX IF NOT EXISTS idx_temporary_messages_owner ON temporary_messages(owner_id);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;

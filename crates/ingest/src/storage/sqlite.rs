//! SQLite-based content store

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rusqlite_migration::{M, Migrations};

use super::traits::ContentStore;
use crate::error::StoreError;
use crate::models::{ContentHash, MessageId, ProcessedMessage, UserCredential};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            -- Authorized mailbox users
            CREATE TABLE users (
                id TEXT PRIMARY KEY,
                email TEXT,
                refresh_token TEXT,
                access_token TEXT NOT NULL,
                token_expiry INTEGER NOT NULL
            );

            -- One row per saved attachment
            CREATE TABLE processed_messages (
                message_id TEXT NOT NULL,
                attachment_part_id TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                saved_path TEXT NOT NULL,
                processed_at TEXT NOT NULL,
                PRIMARY KEY (message_id, attachment_part_id)
            );

            CREATE INDEX idx_processed_content_hash
                ON processed_messages(content_hash);
            "#,
        ),
    ])
}

/// SQLite-based content store
///
/// Every write is a single `INSERT ... ON CONFLICT DO UPDATE` statement, so
/// overlapping passes cannot lose updates to a row.
pub struct SqliteContentStore {
    conn: Mutex<Connection>,
}

impl SqliteContentStore {
    /// Open (or create) a store at the given database path
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;
        Self::from_connection(conn, true)
    }

    /// Open a private in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn, false)
    }

    fn from_connection(mut conn: Connection, wal: bool) -> Result<Self> {
        // WAL lets a concurrent reader (e.g. `ingest users`) run during a pass.
        // busy_timeout makes overlapping writers wait instead of failing.
        if wal {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch(
            r#"
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserCredential> {
    Ok(UserCredential {
        id: row.get(0)?,
        email: row.get(1)?,
        refresh_token: row.get(2)?,
        access_token: row.get(3)?,
        token_expiry: row.get(4)?,
    })
}

fn processed_from_row(row: &Row<'_>) -> rusqlite::Result<ProcessedMessage> {
    let processed_at: String = row.get(4)?;
    let processed_at = chrono::DateTime::parse_from_rfc3339(&processed_at)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now());

    Ok(ProcessedMessage {
        message_id: MessageId::new(row.get::<_, String>(0)?),
        attachment_part_id: row.get(1)?,
        content_hash: ContentHash::from_hex(row.get::<_, String>(2)?),
        saved_path: row.get(3)?,
        processed_at,
    })
}

impl ContentStore for SqliteContentStore {
    fn upsert_user(&self, credential: UserCredential) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (id, email, refresh_token, access_token, token_expiry)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                refresh_token = excluded.refresh_token,
                access_token = excluded.access_token,
                token_expiry = excluded.token_expiry",
            params![
                credential.id,
                credential.email,
                credential.refresh_token,
                credential.access_token,
                credential.token_expiry,
            ],
        )
        .with_context(|| format!("Failed to save user {}", credential.id))?;
        Ok(())
    }

    fn list_users(&self) -> Result<Vec<UserCredential>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, email, refresh_token, access_token, token_expiry
             FROM users ORDER BY id",
        )?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn get_user(&self, id: &str) -> Result<UserCredential> {
        let conn = self.conn.lock().unwrap();
        let user = conn
            .query_row(
                "SELECT id, email, refresh_token, access_token, token_expiry
                 FROM users WHERE id = ?",
                [id],
                user_from_row,
            )
            .optional()?;
        user.ok_or_else(|| StoreError::UserNotFound(id.to_string()).into())
    }

    fn upsert_processed(&self, record: ProcessedMessage) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO processed_messages
             (message_id, attachment_part_id, content_hash, saved_path, processed_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(message_id, attachment_part_id) DO UPDATE SET
                content_hash = excluded.content_hash,
                saved_path = excluded.saved_path,
                processed_at = excluded.processed_at",
            params![
                record.message_id.as_str(),
                record.attachment_part_id,
                record.content_hash.as_str(),
                record.saved_path,
                record.processed_at.to_rfc3339(),
            ],
        )
        .with_context(|| {
            format!(
                "Failed to record processed attachment {}/{}",
                record.message_id, record.attachment_part_id
            )
        })?;
        Ok(())
    }

    fn has_content_hash(&self, hash: &ContentHash) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM processed_messages WHERE content_hash = ?)",
            [hash.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn has_message(&self, id: &MessageId) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM processed_messages WHERE message_id = ?)",
            [id.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn list_processed(&self) -> Result<Vec<ProcessedMessage>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT message_id, attachment_part_id, content_hash, saved_path, processed_at
             FROM processed_messages
             ORDER BY message_id, attachment_part_id",
        )?;

        let records = stmt
            .query_map([], processed_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (SqliteContentStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteContentStore::new(dir.path().join("db.sqlite")).unwrap();
        (store, dir)
    }

    fn make_record(msg: &str, part: &str, data: &[u8]) -> ProcessedMessage {
        ProcessedMessage::new(
            MessageId::new(msg),
            part,
            ContentHash::of(data),
            format!("/uploads/{}/{}", msg, part),
        )
    }

    #[test]
    fn test_user_crud() {
        let (store, _dir) = create_test_store();

        let user = UserCredential::new(
            "ops@example.com",
            Some("ops@example.com".into()),
            Some("refresh".into()),
            "access",
            1_700_000_000,
        );
        store.upsert_user(user.clone()).unwrap();

        assert_eq!(store.get_user("ops@example.com").unwrap(), user);
        assert_eq!(store.list_users().unwrap(), vec![user]);
    }

    #[test]
    fn test_upsert_user_replaces_wholesale() {
        let (store, _dir) = create_test_store();

        store
            .upsert_user(UserCredential::new(
                "u",
                Some("u@example.com".into()),
                Some("refresh".into()),
                "old",
                10,
            ))
            .unwrap();
        store
            .upsert_user(UserCredential::new("u", None, None, "new", 20))
            .unwrap();

        let user = store.get_user("u").unwrap();
        assert_eq!(user.access_token, "new");
        assert_eq!(user.token_expiry, 20);
        assert_eq!(user.refresh_token, None);
        assert_eq!(store.list_users().unwrap().len(), 1);
    }

    #[test]
    fn test_get_user_not_found() {
        let (store, _dir) = create_test_store();
        let err = store.get_user("missing").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::UserNotFound(_))
        ));
    }

    #[test]
    fn test_processed_lookups() {
        let (store, _dir) = create_test_store();
        let record = make_record("m1", "1", b"pdf bytes");

        assert!(!store.has_message(&MessageId::new("m1")).unwrap());
        assert!(!store.has_content_hash(&record.content_hash).unwrap());

        store.upsert_processed(record.clone()).unwrap();

        assert!(store.has_message(&MessageId::new("m1")).unwrap());
        assert!(store.has_content_hash(&record.content_hash).unwrap());
        assert!(!store.has_content_hash(&ContentHash::of(b"other")).unwrap());
    }

    #[test]
    fn test_upsert_processed_is_idempotent() {
        let (store, _dir) = create_test_store();
        let record = make_record("m1", "1", b"pdf bytes");

        store.upsert_processed(record.clone()).unwrap();
        store.upsert_processed(record.clone()).unwrap();

        let all = store.list_processed().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content_hash, record.content_hash);
        assert_eq!(all[0].saved_path, record.saved_path);
    }

    #[test]
    fn test_processed_at_round_trips() {
        let (store, _dir) = create_test_store();
        let record = make_record("m1", "1", b"x");
        store.upsert_processed(record.clone()).unwrap();

        let loaded = &store.list_processed().unwrap()[0];
        assert_eq!(
            loaded.processed_at.timestamp(),
            record.processed_at.timestamp()
        );
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.sqlite");

        {
            let store = SqliteContentStore::new(&path).unwrap();
            store.upsert_processed(make_record("m1", "1", b"x")).unwrap();
        }

        let store = SqliteContentStore::new(&path).unwrap();
        assert!(store.has_message(&MessageId::new("m1")).unwrap());
    }

    #[test]
    fn test_in_memory() {
        let store = SqliteContentStore::in_memory().unwrap();
        store.upsert_processed(make_record("m1", "1", b"x")).unwrap();
        assert_eq!(store.list_processed().unwrap().len(), 1);
    }
}

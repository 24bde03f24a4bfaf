//! SQLite-backed `CacheStorage`, so generations survive process restarts.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use super::store::CacheStorage;
use super::types::{RequestKey, Response};
use crate::error::{OffnoteError, Result};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteCacheStorage {
    conn: Mutex<Connection>,
}

impl SqliteCacheStorage {
    /// Open the cache tables inside the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS cache_generations (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS cache_entries (
                generation TEXT NOT NULL
                    REFERENCES cache_generations(name) ON DELETE CASCADE,
                request_key TEXT NOT NULL,
                status INTEGER NOT NULL,
                headers TEXT NOT NULL,
                body BLOB NOT NULL,
                PRIMARY KEY (generation, request_key)
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| OffnoteError::Storage("SQLite connection poisoned".to_string()))
    }
}

fn ensure_generation(conn: &Connection, generation: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO cache_generations (name) VALUES (?1)",
        params![generation],
    )?;
    Ok(())
}

/// Headers are stored as a JSON list of `[name, value]` pairs. Values that are
/// not valid UTF-8 are dropped.
fn encode_headers(headers: &HeaderMap) -> Result<String> {
    let pairs: Vec<(&str, &str)> = headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
        .collect();
    Ok(serde_json::to_string(&pairs)?)
}

fn decode_headers(raw: &str) -> Result<HeaderMap> {
    let pairs: Vec<(String, String)> = serde_json::from_str(raw)?;
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => warn!(header = %name, "skipping malformed cached header"),
        }
    }
    Ok(headers)
}

#[async_trait]
impl CacheStorage for SqliteCacheStorage {
    async fn open(&self, generation: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        ensure_generation(&conn, generation)
    }

    async fn match_request(&self, generation: &str, key: &RequestKey) -> Result<Option<Response>> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                "SELECT status, headers, body FROM cache_entries
                 WHERE generation = ?1 AND request_key = ?2",
                params![generation, key.as_str()],
                |row| {
                    Ok((
                        row.get::<_, u16>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((status, headers, body)) = row else {
            return Ok(None);
        };
        let status = StatusCode::from_u16(status)
            .map_err(|e| OffnoteError::Storage(format!("Invalid cached status {}: {}", status, e)))?;

        Ok(Some(Response {
            status,
            headers: decode_headers(&headers)?,
            body: Bytes::from(body),
        }))
    }

    async fn put(&self, generation: &str, key: &RequestKey, response: &Response) -> Result<()> {
        let headers = encode_headers(&response.headers)?;
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        ensure_generation(&tx, generation)?;
        tx.execute(
            "INSERT INTO cache_entries (generation, request_key, status, headers, body)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(generation, request_key) DO UPDATE SET
                status = excluded.status,
                headers = excluded.headers,
                body = excluded.body",
            params![
                generation,
                key.as_str(),
                response.status.as_u16(),
                headers,
                response.body.as_ref()
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    async fn delete(&self, generation: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let removed = conn.execute(
            "DELETE FROM cache_generations WHERE name = ?1",
            params![generation],
        )?;
        Ok(removed > 0)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT name FROM cache_generations ORDER BY seq")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    async fn entry_count(&self, generation: &str) -> Result<usize> {
        let conn = self.lock_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cache_entries WHERE generation = ?1",
            params![generation],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::types::Request;
    use http::header::CONTENT_TYPE;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let key = Request::get("https://app.test/app.css").key();
        let response = Response::ok("body { }")
            .with_header(CONTENT_TYPE, HeaderValue::from_static("text/css"));

        {
            let storage = SqliteCacheStorage::open(&path).unwrap();
            storage.put("gen-1", &key, &response).await.unwrap();
        }

        let storage = SqliteCacheStorage::open(&path).unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["gen-1"]);
        assert_eq!(storage.match_request("gen-1", &key).await.unwrap(), Some(response));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_entries() {
        let storage = SqliteCacheStorage::open_in_memory().unwrap();
        let key = Request::get("https://app.test/").key();
        storage.put("gen-1", &key, &Response::ok("a")).await.unwrap();
        storage.open("gen-2").await.unwrap();

        assert!(storage.delete("gen-1").await.unwrap());

        assert_eq!(storage.entry_count("gen-1").await.unwrap(), 0);
        assert_eq!(storage.keys().await.unwrap(), vec!["gen-2"]);
        // put after delete recreates the generation from scratch
        storage.put("gen-1", &key, &Response::ok("b")).await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["gen-2", "gen-1"]);
    }
}

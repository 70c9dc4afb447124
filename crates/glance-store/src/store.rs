//! Main store implementation.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::{debug, info};

use glance_types::{Reading, Trend};

use crate::error::{Error, Result};
use crate::schema;

/// SQLite-backed store holding the full reading collection.
///
/// The store remembers the last collection it successfully wrote (or loaded)
/// and skips writes that would not change anything. The database file is
/// only created on the first write, so loading from a path that does not
/// exist yet yields an empty collection instead of an error.
pub struct ReadingStore {
    path: Option<PathBuf>,
    conn: Option<Connection>,
    saved: Vec<Reading>,
}

impl std::fmt::Debug for ReadingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadingStore")
            .field("path", &self.path)
            .field("open", &self.conn.is_some())
            .field("saved", &self.saved.len())
            .finish()
    }
}

impl ReadingStore {
    /// Create a store backed by the file at `path`. Nothing is read or
    /// created until [`load`](Self::load) or [`save`](Self::save).
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            conn: None,
            saved: Vec::new(),
        }
    }

    /// Create a store at the default location.
    pub fn open_default() -> Self {
        Self::new(crate::default_store_path())
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self {
            path: None,
            conn: Some(conn),
            saved: Vec::new(),
        })
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The collection most recently written or loaded.
    pub fn saved(&self) -> &[Reading] {
        &self.saved
    }

    /// Load every stored reading, newest first.
    ///
    /// A missing file is not an error: it means nothing has been saved yet.
    /// Any other failure (not a database, unknown schema, corrupt row) is.
    pub fn load(&mut self) -> Result<Vec<Reading>> {
        if self.conn.is_none() {
            match &self.path {
                Some(path) if !path.exists() => {
                    debug!("No store at {}, starting empty", path.display());
                    self.saved.clear();
                    return Ok(Vec::new());
                }
                _ => {}
            }
        }

        let rows = {
            let conn = self.connection()?;
            let mut stmt = conn.prepare(
                "SELECT timestamp_ms, value, trend FROM readings ORDER BY timestamp_ms DESC",
            )?;
            stmt.query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i32>(1)?, row.get::<_, i64>(2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?
        };

        let readings = rows
            .into_iter()
            .map(|(millis, value, trend)| {
                let trend = Trend::try_from(trend)?;
                Reading::from_unix_millis(value, trend, millis).map_err(Error::from)
            })
            .collect::<Result<Vec<_>>>()?;

        info!("Loaded {} stored readings", readings.len());
        self.saved = readings.clone();
        Ok(readings)
    }

    /// Replace the stored collection with `readings`.
    ///
    /// Returns `Ok(false)` without touching the database when `readings`
    /// equals the last saved collection.
    pub fn save(&mut self, readings: &[Reading]) -> Result<bool> {
        if readings == self.saved.as_slice() {
            debug!("Readings unchanged since last save, skipping write");
            return Ok(false);
        }

        let conn = self.connection()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM readings", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT OR REPLACE INTO readings (timestamp_ms, value, trend) VALUES (?1, ?2, ?3)",
            )?;
            for reading in readings {
                insert.execute(rusqlite::params![
                    reading.unix_millis(),
                    reading.value(),
                    reading.trend().code(),
                ])?;
            }
        }
        tx.commit()?;

        debug!("Saved {} readings", readings.len());
        self.saved = readings.to_vec();
        Ok(true)
    }

    /// Open (creating if needed) the backing database.
    fn connection(&mut self) -> Result<&mut Connection> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => self.open_connection()?,
        };
        Ok(self.conn.insert(conn))
    }

    fn open_connection(&self) -> Result<Connection> {
        let path = self
            .path
            .clone()
            .unwrap_or_else(crate::default_store_path);

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening reading store at {}", path.display());
        let conn = Connection::open(&path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        schema::initialize(&conn)?;
        Ok(conn)
    }
}

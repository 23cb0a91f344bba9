//! Canonical standard, regulation and drawing records.
//!
//! [`RecordLookup`] is the boundary to the authoritative record store;
//! [`SqliteRecordStore`] is the bundled implementation.

use citewise_core::{AppError, AppResult};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Record class held by the lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Standard,
    Regulation,
    Drawing,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Regulation => "regulation",
            Self::Drawing => "drawing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "standard" | "standards" => Some(Self::Standard),
            "regulation" | "regulations" => Some(Self::Regulation),
            "drawing" | "drawings" => Some(Self::Drawing),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authoritative record. Read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: String,
    pub kind: RecordKind,
    pub canonical_name: String,
    /// Standard or drawing number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifying_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_url: Option<String>,
}

/// Resolved records grouped by class, deduplicated and capped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedReferences {
    pub standards: Vec<CanonicalRecord>,
    pub regulations: Vec<CanonicalRecord>,
    pub drawings: Vec<CanonicalRecord>,
}

impl ResolvedReferences {
    pub fn total(&self) -> usize {
        self.standards.len() + self.regulations.len() + self.drawings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Looks up canonical records by free-text name.
#[async_trait::async_trait]
pub trait RecordLookup: Send + Sync {
    async fn find_by_name(
        &self,
        name: &str,
        kind: RecordKind,
        limit: usize,
    ) -> AppResult<Vec<CanonicalRecord>>;
}

/// SQLite-backed record store.
///
/// Queries run on the blocking pool; the connection is shared behind a mutex.
#[derive(Clone)]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Open (creating if needed) the record database at `db_path`.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Lookup(format!("Failed to create records directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Lookup(format!("Failed to open record store: {}", e)))?;
        init_schema(&conn)?;

        tracing::debug!("Opened record store at {:?}", db_path);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store, used by tests and dry runs.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Lookup(format!("Failed to open record store: {}", e)))?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert a record and return its id.
    pub fn insert(
        &self,
        kind: RecordKind,
        name: &str,
        number: Option<&str>,
        status: Option<&str>,
        url: Option<&str>,
    ) -> AppResult<String> {
        let conn = self.lock()?;
        let result = match kind {
            RecordKind::Standard => conn.execute(
                "INSERT INTO standards (standard_number, standard_name, status, file_url)
                 VALUES (?1, ?2, ?3, ?4)",
                params![number.unwrap_or_default(), name, status, url],
            ),
            RecordKind::Regulation => conn.execute(
                "INSERT INTO regulations (legal_name, status, legal_url) VALUES (?1, ?2, ?3)",
                params![name, status, url],
            ),
            RecordKind::Drawing => conn.execute(
                "INSERT INTO drawings (drawing_number, drawing_name, status, file_url)
                 VALUES (?1, ?2, ?3, ?4)",
                params![number, name, status, url],
            ),
        };
        result.map_err(|e| AppError::Lookup(format!("Failed to insert {}: {}", kind, e)))?;
        Ok(conn.last_insert_rowid().to_string())
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Lookup("Record store connection poisoned".to_string()))
    }
}

fn init_schema(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS standards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            standard_number TEXT NOT NULL,
            standard_name TEXT NOT NULL,
            status TEXT,
            file_url TEXT
        );

        CREATE TABLE IF NOT EXISTS regulations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            legal_name TEXT NOT NULL,
            status TEXT,
            legal_url TEXT
        );

        CREATE TABLE IF NOT EXISTS drawings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            drawing_number TEXT,
            drawing_name TEXT NOT NULL,
            status TEXT,
            file_url TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_standards_number ON standards(standard_number);
        "#,
    )
    .map_err(|e| AppError::Lookup(format!("Failed to create record tables: {}", e)))
}

const STANDARDS_SQL: &str = "SELECT id, standard_number, standard_name, status, file_url
     FROM standards
     WHERE standard_name LIKE ?1 OR standard_number LIKE ?1
     ORDER BY
         CASE WHEN standard_name = ?2 THEN 1
              WHEN standard_number = ?2 THEN 2
              ELSE 3 END,
         LENGTH(standard_name)
     LIMIT ?3";

const REGULATIONS_SQL: &str = "SELECT id, legal_name, status, legal_url
     FROM regulations
     WHERE legal_name LIKE ?1
     ORDER BY
         CASE WHEN legal_name = ?2 THEN 1 ELSE 2 END,
         LENGTH(legal_name)
     LIMIT ?3";

const DRAWINGS_SQL: &str = "SELECT id, drawing_number, drawing_name, status, file_url
     FROM drawings
     WHERE drawing_name LIKE ?1 OR drawing_number LIKE ?1
     ORDER BY
         CASE WHEN drawing_name = ?2 THEN 1
              WHEN drawing_number = ?2 THEN 2
              ELSE 3 END,
         LENGTH(drawing_name)
     LIMIT ?3";

fn numbered_record(row: &Row<'_>, kind: RecordKind) -> rusqlite::Result<CanonicalRecord> {
    Ok(CanonicalRecord {
        id: row.get::<_, i64>(0)?.to_string(),
        kind,
        identifying_number: row.get(1)?,
        canonical_name: row.get(2)?,
        status: row.get(3)?,
        resource_url: row.get(4)?,
    })
}

fn regulation_record(row: &Row<'_>) -> rusqlite::Result<CanonicalRecord> {
    Ok(CanonicalRecord {
        id: row.get::<_, i64>(0)?.to_string(),
        kind: RecordKind::Regulation,
        identifying_number: None,
        canonical_name: row.get(1)?,
        status: row.get(2)?,
        resource_url: row.get(3)?,
    })
}

/// LIKE match on name (and number), exact name first, then exact number,
/// then shortest name.
fn query_records(
    conn: &Connection,
    name: &str,
    kind: RecordKind,
    limit: usize,
) -> rusqlite::Result<Vec<CanonicalRecord>> {
    let pattern = format!("%{}%", name);
    let limit = limit as i64;

    let sql = match kind {
        RecordKind::Standard => STANDARDS_SQL,
        RecordKind::Regulation => REGULATIONS_SQL,
        RecordKind::Drawing => DRAWINGS_SQL,
    };

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![pattern, name, limit], |row| match kind {
        RecordKind::Regulation => regulation_record(row),
        _ => numbered_record(row, kind),
    })?;

    let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

#[async_trait::async_trait]
impl RecordLookup for SqliteRecordStore {
    async fn find_by_name(
        &self,
        name: &str,
        kind: RecordKind,
        limit: usize,
    ) -> AppResult<Vec<CanonicalRecord>> {
        let store = self.clone();
        let name = name.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = store.lock()?;
            query_records(&conn, &name, kind, limit)
                .map_err(|e| AppError::Lookup(format!("Failed to query {}s: {}", kind, e)))
        })
        .await
        .map_err(|e| AppError::Lookup(format!("Record lookup task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seeded_store() -> SqliteRecordStore {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        store
            .insert(
                RecordKind::Standard,
                "混凝土结构设计规范（2015年版）",
                Some("GB 50010-2010"),
                Some("现行"),
                Some("https://example.org/gb50010.pdf"),
            )
            .unwrap();
        store
            .insert(
                RecordKind::Standard,
                "混凝土结构工程施工质量验收规范",
                Some("GB 50204-2015"),
                Some("现行"),
                None,
            )
            .unwrap();
        store
            .insert(
                RecordKind::Regulation,
                "建设工程质量管理条例",
                None,
                Some("有效"),
                Some("https://example.org/quality.html"),
            )
            .unwrap();
        store
            .insert(
                RecordKind::Drawing,
                "基础平面布置图",
                Some("结施-01"),
                None,
                Some("https://example.org/s01.pdf"),
            )
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_find_standard_by_number() {
        let store = seeded_store();
        let records = store
            .find_by_name("GB 50010", RecordKind::Standard, 3)
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identifying_number.as_deref(), Some("GB 50010-2010"));
        assert_eq!(records[0].kind, RecordKind::Standard);
    }

    #[tokio::test]
    async fn test_shorter_names_rank_first() {
        let store = seeded_store();
        let records = store
            .find_by_name("混凝土结构", RecordKind::Standard, 3)
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert!(records[0].canonical_name.chars().count() <= records[1].canonical_name.chars().count());
    }

    #[tokio::test]
    async fn test_exact_name_ranks_first_and_limit_applies() {
        let store = seeded_store();
        let records = store
            .find_by_name("混凝土结构工程施工质量验收规范", RecordKind::Standard, 1)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identifying_number.as_deref(), Some("GB 50204-2015"));
    }

    #[tokio::test]
    async fn test_find_regulation_and_drawing() {
        let store = seeded_store();

        let regulations = store
            .find_by_name("质量管理条例", RecordKind::Regulation, 2)
            .await
            .unwrap();
        assert_eq!(regulations.len(), 1);
        assert!(regulations[0].identifying_number.is_none());

        let drawings = store
            .find_by_name("结施-01", RecordKind::Drawing, 3)
            .await
            .unwrap();
        assert_eq!(drawings[0].canonical_name, "基础平面布置图");
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("records.sqlite");
        {
            let store = SqliteRecordStore::open(&path).unwrap();
            store
                .insert(RecordKind::Regulation, "建筑工程施工许可管理办法", None, None, None)
                .unwrap();
        }

        let reopened = SqliteRecordStore::open(&path).unwrap();
        let records = reopened
            .find_by_name("施工许可", RecordKind::Regulation, 3)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(RecordKind::parse("Standards"), Some(RecordKind::Standard));
        assert_eq!(RecordKind::parse("drawing"), Some(RecordKind::Drawing));
        assert_eq!(RecordKind::parse("memo"), None);
    }
}

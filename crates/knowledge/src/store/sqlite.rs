//! SQLite-backed vector store.
//!
//! Vectors are stored as little-endian `f32` blobs and searched brute force.
//! Filters are evaluated on decoded metadata, before ranking.

use super::{batch_dimension, check_query_dimension, rank, Filter, VectorStore};
use crate::metadata::Metadata;
use crate::types::{QueryResult, SearchResult, VectorItem};
use async_trait::async_trait;
use chrono::Utc;
use docindex_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Vector store persisted in a single SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path`.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::VectorStore(format!("Failed to create store directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::VectorStore(format!("Failed to open SQLite store: {}", e)))?;
        init_schema(&conn)?;

        tracing::debug!("Opened SQLite vector store at {:?}", db_path);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::VectorStore(format!("Failed to open SQLite store: {}", e)))?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run blocking database work off the async runtime.
    async fn with_conn<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| AppError::VectorStore("SQLite connection poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| AppError::VectorStore(format!("SQLite task failed: {}", e)))?
    }
}

fn init_schema(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            dimension INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS items (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            metadata TEXT NOT NULL,
            UNIQUE (collection, id),
            FOREIGN KEY (collection) REFERENCES collections(name)
        );

        CREATE INDEX IF NOT EXISTS idx_items_collection ON items(collection);
        "#,
    )
    .map_err(|e| AppError::VectorStore(format!("Failed to create tables: {}", e)))
}

fn collection_dimension(conn: &Connection, collection: &str) -> AppResult<Option<usize>> {
    conn.query_row(
        "SELECT dimension FROM collections WHERE name = ?1",
        params![collection],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .map(|d| d.map(|d| d as usize))
    .map_err(|e| AppError::VectorStore(format!("Failed to read collection: {}", e)))
}

/// Load every item of a collection in insertion order.
fn load_items(conn: &Connection, collection: &str) -> AppResult<Vec<VectorItem>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, text, embedding, metadata FROM items WHERE collection = ?1 ORDER BY seq",
        )
        .map_err(|e| AppError::VectorStore(format!("Failed to prepare query: {}", e)))?;

    let rows = stmt
        .query_map(params![collection], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })
        .map_err(|e| AppError::VectorStore(format!("Failed to query items: {}", e)))?;

    let mut items = Vec::new();
    for row in rows {
        let (id, text, embedding, metadata) =
            row.map_err(|e| AppError::VectorStore(format!("Failed to read item: {}", e)))?;
        let metadata: Metadata = serde_json::from_str(&metadata)?;
        items.push(VectorItem {
            id,
            text,
            vector: bytes_to_embedding(&embedding)?,
            metadata,
        });
    }

    Ok(items)
}

#[async_trait]
impl VectorStore for SqliteStore {
    fn backend_name(&self) -> &str {
        "sqlite"
    }

    async fn has_collection(&self, collection: &str) -> AppResult<bool> {
        let collection = collection.to_string();
        self.with_conn(move |conn| Ok(collection_dimension(conn, &collection)?.is_some()))
            .await
    }

    async fn insert(&self, collection: &str, items: &[VectorItem]) -> AppResult<()> {
        if items.is_empty() {
            return Ok(());
        }

        let collection = collection.to_string();
        let items = items.to_vec();
        self.with_conn(move |conn| {
            let expected = collection_dimension(conn, &collection)?;
            let dimension = batch_dimension(&items, expected)?;

            let tx = conn
                .transaction()
                .map_err(|e| AppError::VectorStore(format!("Failed to begin insert: {}", e)))?;

            if expected.is_none() {
                tx.execute(
                    "INSERT INTO collections (name, dimension, created_at) VALUES (?1, ?2, ?3)",
                    params![collection, dimension as i64, Utc::now().to_rfc3339()],
                )
                .map_err(|e| AppError::VectorStore(format!("Failed to create collection: {}", e)))?;
            }

            {
                let mut stmt = tx
                    .prepare(
                        "INSERT INTO items (collection, id, text, embedding, metadata)
                         VALUES (?1, ?2, ?3, ?4, ?5)
                         ON CONFLICT (collection, id) DO UPDATE SET
                            text = excluded.text,
                            embedding = excluded.embedding,
                            metadata = excluded.metadata",
                    )
                    .map_err(|e| AppError::VectorStore(format!("Failed to prepare insert: {}", e)))?;

                for item in &items {
                    let metadata_json = serde_json::to_string(&item.metadata)?;
                    stmt.execute(params![
                        collection,
                        item.id,
                        item.text,
                        embedding_to_bytes(&item.vector),
                        metadata_json,
                    ])
                    .map_err(|e| AppError::VectorStore(format!("Failed to insert item: {}", e)))?;
                }
            }

            tx.commit()
                .map_err(|e| AppError::VectorStore(format!("Failed to commit insert: {}", e)))?;

            tracing::debug!("Inserted {} items into '{}'", items.len(), collection);
            Ok(())
        })
        .await
    }

    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> AppResult<QueryResult> {
        let collection = collection.to_string();
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let mut result = QueryResult::empty();
            for item in load_items(conn, &collection)?
                .into_iter()
                .filter(|item| filter.matches(&item.metadata))
                .take(limit.unwrap_or(usize::MAX))
            {
                result.ids[0].push(item.id);
                result.documents[0].push(item.text);
                result.metadatas[0].push(item.metadata);
            }
            Ok(result)
        })
        .await
    }

    async fn search(
        &self,
        collection: &str,
        vectors: &[Vec<f32>],
        limit: usize,
        filter: Option<&Filter>,
    ) -> AppResult<SearchResult> {
        let collection = collection.to_string();
        let vectors = vectors.to_vec();
        let filter = filter.cloned().unwrap_or(Filter::All);
        self.with_conn(move |conn| {
            let mut result = SearchResult::default();
            let Some(dimension) = collection_dimension(conn, &collection)? else {
                for _ in &vectors {
                    result.push_group(Vec::new());
                }
                return Ok(result);
            };
            for vector in &vectors {
                check_query_dimension(&collection, vector, dimension)?;
            }

            let items: Vec<VectorItem> = load_items(conn, &collection)?
                .into_iter()
                .filter(|item| filter.matches(&item.metadata))
                .collect();
            for vector in &vectors {
                result.push_group(rank(vector, &items, limit));
            }
            Ok(result)
        })
        .await
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> AppResult<usize> {
        let collection = collection.to_string();
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let doomed: Vec<String> = load_items(conn, &collection)?
                .into_iter()
                .filter(|item| filter.matches(&item.metadata))
                .map(|item| item.id)
                .collect();

            let tx = conn
                .transaction()
                .map_err(|e| AppError::VectorStore(format!("Failed to begin delete: {}", e)))?;
            for id in &doomed {
                tx.execute(
                    "DELETE FROM items WHERE collection = ?1 AND id = ?2",
                    params![collection, id],
                )
                .map_err(|e| AppError::VectorStore(format!("Failed to delete item: {}", e)))?;
            }
            tx.commit()
                .map_err(|e| AppError::VectorStore(format!("Failed to commit delete: {}", e)))?;

            Ok(doomed.len())
        })
        .await
    }

    async fn delete_collection(&self, collection: &str) -> AppResult<()> {
        let collection = collection.to_string();
        self.with_conn(move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| AppError::VectorStore(format!("Failed to begin delete: {}", e)))?;
            tx.execute("DELETE FROM items WHERE collection = ?1", params![collection])
                .map_err(|e| AppError::VectorStore(format!("Failed to delete items: {}", e)))?;
            tx.execute("DELETE FROM collections WHERE name = ?1", params![collection])
                .map_err(|e| {
                    AppError::VectorStore(format!("Failed to delete collection: {}", e))
                })?;
            tx.commit()
                .map_err(|e| AppError::VectorStore(format!("Failed to commit delete: {}", e)))?;

            tracing::info!("Deleted collection '{}'", collection);
            Ok(())
        })
        .await
    }

    async fn reset(&self) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute_batch("DELETE FROM items; DELETE FROM collections;")
                .map_err(|e| AppError::VectorStore(format!("Failed to reset store: {}", e)))?;
            tracing::info!("Reset SQLite vector store");
            Ok(())
        })
        .await
    }
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::VectorStore(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

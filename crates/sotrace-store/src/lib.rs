use std::fs;
use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, params};
use sotrace_core::{BlockId, BlockType, BlockVersion, DiffOperation, DiffRow, PostId, RevisionId};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevisionRow {
    pub revision_id: RevisionId,
    pub is_most_recent: bool,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Read-only queries the lineage engine issues against the block store.
pub trait LineageSource {
    /// Distinct revisions of a post, newest (highest id) first.
    fn revisions_for_post(&self, post_id: PostId) -> Result<Vec<RevisionRow>, StoreError>;

    /// Block versions of one revision, ascending local id.
    fn block_versions_for_revision(
        &self,
        revision_id: RevisionId,
    ) -> Result<Vec<BlockVersion>, StoreError>;

    fn diff_row_count(&self, block_id: BlockId) -> Result<u64, StoreError>;

    fn diff_rows_for_block(&self, block_id: BlockId) -> Result<Vec<DiffRow>, StoreError>;
}

impl<T: LineageSource + ?Sized> LineageSource for &T {
    fn revisions_for_post(&self, post_id: PostId) -> Result<Vec<RevisionRow>, StoreError> {
        (**self).revisions_for_post(post_id)
    }

    fn block_versions_for_revision(
        &self,
        revision_id: RevisionId,
    ) -> Result<Vec<BlockVersion>, StoreError> {
        (**self).block_versions_for_revision(revision_id)
    }

    fn diff_row_count(&self, block_id: BlockId) -> Result<u64, StoreError> {
        (**self).diff_row_count(block_id)
    }

    fn diff_rows_for_block(&self, block_id: BlockId) -> Result<Vec<DiffRow>, StoreError> {
        (**self).diff_rows_for_block(block_id)
    }
}

/// Row layout of a `PostBlockVersion` entry when building fixture databases.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockVersionFixture {
    pub post_id: PostId,
    pub revision_id: RevisionId,
    pub most_recent: bool,
    pub block: BlockVersion,
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens an existing SOTorrent database without write access.
    pub fn open(sqlite_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let sqlite_path = sqlite_path.as_ref().to_path_buf();
        let conn = Connection::open_with_flags(
            &sqlite_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;
        tracing::debug!(path = %sqlite_path.display(), "opened block store read-only");

        Ok(Self { conn })
    }

    /// Creates (or reuses) a writable database with the two block tables.
    pub fn create_fixture(sqlite_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let sqlite_path = sqlite_path.as_ref().to_path_buf();
        if let Some(parent) = sqlite_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&sqlite_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        create_schema(&conn)?;

        Ok(Self { conn })
    }

    pub fn insert_block_version(&self, fixture: &BlockVersionFixture) -> Result<(), StoreError> {
        let block = &fixture.block;
        let type_id: i64 = match block.block_type {
            BlockType::Code => sotrace_core::CODE_BLOCK_TYPE_ID,
            BlockType::Text => 1,
        };

        self.conn.execute(
            r#"
            INSERT INTO PostBlockVersion (
                Id, PostId, PostHistoryId, PostBlockTypeId, LocalId,
                PredPostHistoryId, PredPostBlockVersionId, PredLocalId,
                PredEqual, PredSimilarity, MostRecentVersion
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                block.id,
                fixture.post_id,
                fixture.revision_id,
                type_id,
                block.local_id,
                nullable_id(block.preceding_revision_id),
                nullable_id(block.preceding_block_id),
                nullable_id(block.preceding_local_id),
                block.is_equal_to_predecessor as i64,
                block.has_predecessor().then_some(block.preceding_similarity),
                fixture.most_recent as i64,
            ],
        )?;

        Ok(())
    }

    pub fn insert_diff_row(&self, block_id: BlockId, row: &DiffRow) -> Result<(), StoreError> {
        let tag = match row.operation {
            DiffOperation::Equal => 0,
            DiffOperation::Delete => 1,
            DiffOperation::Insert => -1,
            DiffOperation::Other(tag) => tag,
        };

        self.conn.execute(
            r#"
            INSERT INTO PostBlockDiff (PostBlockVersionId, PostBlockDiffOperationId, Text)
            VALUES (?1, ?2, ?3)
            "#,
            params![block_id, tag, row.text],
        )?;

        Ok(())
    }
}

impl LineageSource for SqliteStore {
    fn revisions_for_post(&self, post_id: PostId) -> Result<Vec<RevisionRow>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT PostHistoryId, MostRecentVersion
            FROM PostBlockVersion
            WHERE PostId = ?1
            GROUP BY PostHistoryId, MostRecentVersion
            ORDER BY PostHistoryId DESC
            "#,
        )?;

        let rows = stmt.query_map(params![post_id], |row| {
            let most_recent: Option<i64> = row.get(1)?;
            Ok(RevisionRow {
                revision_id: row.get(0)?,
                is_most_recent: most_recent == Some(1),
            })
        })?;

        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn block_versions_for_revision(
        &self,
        revision_id: RevisionId,
    ) -> Result<Vec<BlockVersion>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT Id, PostBlockTypeId, LocalId, PredPostHistoryId, PredPostBlockVersionId,
                   PredLocalId, PredEqual, PredSimilarity
            FROM PostBlockVersion
            WHERE PostHistoryId = ?1
            ORDER BY LocalId
            "#,
        )?;

        let rows = stmt.query_map(params![revision_id], |row| {
            let pred_equal: Option<i64> = row.get(6)?;
            Ok(BlockVersion {
                id: row.get(0)?,
                block_type: BlockType::from_type_id(row.get(1)?),
                local_id: row.get(2)?,
                preceding_revision_id: row.get::<_, Option<i64>>(3)?.unwrap_or_default(),
                preceding_block_id: row.get::<_, Option<i64>>(4)?.unwrap_or_default(),
                preceding_local_id: row.get::<_, Option<i64>>(5)?.unwrap_or_default(),
                is_equal_to_predecessor: pred_equal == Some(1),
                preceding_similarity: row.get::<_, Option<f64>>(7)?.unwrap_or_default(),
            })
        })?;

        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn diff_row_count(&self, block_id: BlockId) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM PostBlockDiff WHERE PostBlockVersionId = ?1",
            params![block_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn diff_rows_for_block(&self, block_id: BlockId) -> Result<Vec<DiffRow>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT Text, PostBlockDiffOperationId
            FROM PostBlockDiff
            WHERE PostBlockVersionId = ?1
            ORDER BY Id
            "#,
        )?;

        let rows = stmt.query_map(params![block_id], |row| {
            Ok(DiffRow {
                text: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                operation: DiffOperation::from_tag(row.get(1)?),
            })
        })?;

        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

fn nullable_id(id: i64) -> Option<i64> {
    (id != sotrace_core::NO_PREDECESSOR).then_some(id)
}

/// Column subset of the SOTorrent `PostBlockVersion` and `PostBlockDiff` tables.
pub fn create_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS PostBlockVersion (
            Id INTEGER PRIMARY KEY,
            PostId INTEGER NOT NULL,
            PostHistoryId INTEGER NOT NULL,
            PostBlockTypeId INTEGER NOT NULL,
            LocalId INTEGER NOT NULL,
            PredPostHistoryId INTEGER,
            PredPostBlockVersionId INTEGER,
            PredLocalId INTEGER,
            PredEqual INTEGER,
            PredSimilarity REAL,
            MostRecentVersion INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_post_block_version_post
            ON PostBlockVersion (PostId, PostHistoryId);
        CREATE INDEX IF NOT EXISTS idx_post_block_version_history
            ON PostBlockVersion (PostHistoryId, LocalId);

        CREATE TABLE IF NOT EXISTS PostBlockDiff (
            Id INTEGER PRIMARY KEY AUTOINCREMENT,
            PostId INTEGER,
            PostHistoryId INTEGER,
            LocalId INTEGER,
            PostBlockVersionId INTEGER NOT NULL,
            PredPostHistoryId INTEGER,
            PredLocalId INTEGER,
            PredPostBlockVersionId INTEGER,
            PostBlockDiffOperationId INTEGER NOT NULL,
            Text TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_post_block_diff_version
            ON PostBlockDiff (PostBlockVersionId);
        "#,
    )?;

    Ok(())
}

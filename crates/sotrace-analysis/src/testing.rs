use std::cell::Cell;
use std::collections::HashMap;

use sotrace_core::{BlockId, BlockType, BlockVersion, DiffRow, PostId, RevisionId};
use sotrace_store::{LineageSource, RevisionRow, StoreError};

/// In-memory stand-in for the block tables.
#[derive(Debug, Default)]
pub(crate) struct MemorySource {
    rows: Vec<(PostId, RevisionId, bool, BlockVersion)>,
    diffs: HashMap<BlockId, Vec<DiffRow>>,
    pub(crate) fail_on_post: Option<PostId>,
    pub(crate) diff_queries: Cell<usize>,
}

impl MemorySource {
    pub(crate) fn add(
        &mut self,
        post_id: PostId,
        revision_id: RevisionId,
        most_recent: bool,
        block: BlockVersion,
    ) -> &mut Self {
        self.rows.push((post_id, revision_id, most_recent, block));
        self
    }

    pub(crate) fn add_diff(&mut self, block_id: BlockId, row: DiffRow) -> &mut Self {
        self.diffs.entry(block_id).or_default().push(row);
        self
    }
}

impl LineageSource for MemorySource {
    fn revisions_for_post(&self, post_id: PostId) -> Result<Vec<RevisionRow>, StoreError> {
        if self.fail_on_post == Some(post_id) {
            return Err(StoreError::Io(std::io::Error::other("store unavailable")));
        }

        let mut revisions: Vec<RevisionRow> = Vec::new();
        for (row_post, revision_id, most_recent, _) in &self.rows {
            let row = RevisionRow {
                revision_id: *revision_id,
                is_most_recent: *most_recent,
            };
            if *row_post == post_id && !revisions.contains(&row) {
                revisions.push(row);
            }
        }
        revisions.sort_by(|left, right| right.revision_id.cmp(&left.revision_id));
        Ok(revisions)
    }

    fn block_versions_for_revision(
        &self,
        revision_id: RevisionId,
    ) -> Result<Vec<BlockVersion>, StoreError> {
        let mut blocks: Vec<BlockVersion> = self
            .rows
            .iter()
            .filter(|(_, row_revision, _, _)| *row_revision == revision_id)
            .map(|(_, _, _, block)| block.clone())
            .collect();
        blocks.sort_by_key(|block| block.local_id);
        Ok(blocks)
    }

    fn diff_row_count(&self, block_id: BlockId) -> Result<u64, StoreError> {
        self.diff_queries.set(self.diff_queries.get() + 1);
        Ok(self.diffs.get(&block_id).map_or(0, |rows| rows.len() as u64))
    }

    fn diff_rows_for_block(&self, block_id: BlockId) -> Result<Vec<DiffRow>, StoreError> {
        Ok(self.diffs.get(&block_id).cloned().unwrap_or_default())
    }
}

pub(crate) fn origin(id: BlockId, local_id: i64) -> BlockVersion {
    BlockVersion {
        id,
        block_type: BlockType::Text,
        local_id,
        preceding_revision_id: 0,
        preceding_local_id: 0,
        preceding_block_id: 0,
        is_equal_to_predecessor: false,
        preceding_similarity: 0.0,
    }
}

pub(crate) fn successor(
    id: BlockId,
    local_id: i64,
    predecessor: (RevisionId, BlockId),
    similarity: f64,
) -> BlockVersion {
    BlockVersion {
        id,
        block_type: BlockType::Text,
        local_id,
        preceding_revision_id: predecessor.0,
        preceding_local_id: local_id,
        preceding_block_id: predecessor.1,
        is_equal_to_predecessor: similarity >= 1.0,
        preceding_similarity: similarity,
    }
}

pub(crate) fn code(mut block: BlockVersion) -> BlockVersion {
    block.block_type = BlockType::Code;
    block
}

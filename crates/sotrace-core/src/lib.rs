use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub type PostId = i64;
pub type RevisionId = i64;
pub type BlockId = i64;

/// Predecessor ids use 0 for "no predecessor".
pub const NO_PREDECESSOR: i64 = 0;

/// `PostBlockTypeId` value the store uses for code blocks.
pub const CODE_BLOCK_TYPE_ID: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    #[default]
    Text,
    Code,
}

impl BlockType {
    pub fn from_type_id(type_id: i64) -> Self {
        if type_id == CODE_BLOCK_TYPE_ID {
            Self::Code
        } else {
            Self::Text
        }
    }

    /// Tag written to outputs: 0 for text, 1 for code.
    pub fn tag(self) -> u8 {
        match self {
            Self::Text => 0,
            Self::Code => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Code => "code",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockVersion {
    pub id: BlockId,
    pub block_type: BlockType,
    pub local_id: i64,
    pub preceding_revision_id: RevisionId,
    pub preceding_local_id: i64,
    pub preceding_block_id: BlockId,
    pub is_equal_to_predecessor: bool,
    pub preceding_similarity: f64,
}

impl BlockVersion {
    pub fn has_predecessor(&self) -> bool {
        self.preceding_block_id != NO_PREDECESSOR
    }

    pub fn is_code(&self) -> bool {
        self.block_type == BlockType::Code
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RevisionNode {
    id: RevisionId,
    is_most_recent: bool,
    previous_revision_id: RevisionId,
    blocks: Vec<BlockVersion>,
    block_index: HashMap<BlockId, usize>,
}

impl RevisionNode {
    pub fn new(id: RevisionId, is_most_recent: bool) -> Self {
        Self {
            id,
            is_most_recent,
            previous_revision_id: NO_PREDECESSOR,
            blocks: Vec::new(),
            block_index: HashMap::new(),
        }
    }

    pub fn id(&self) -> RevisionId {
        self.id
    }

    pub fn is_most_recent(&self) -> bool {
        self.is_most_recent
    }

    /// Chronologically previous revision of the same post, 0 for the earliest.
    pub fn previous_revision_id(&self) -> RevisionId {
        self.previous_revision_id
    }

    pub fn blocks(&self) -> &[BlockVersion] {
        &self.blocks
    }

    pub fn block(&self, block_id: BlockId) -> Option<&BlockVersion> {
        self.block_index
            .get(&block_id)
            .map(|&index| &self.blocks[index])
    }

    /// Appends in query order. A repeated id keeps the first occurrence for lookups.
    pub fn push_block(&mut self, block: BlockVersion) {
        self.block_index.entry(block.id).or_insert(self.blocks.len());
        self.blocks.push(block);
    }
}

/// Every revision of one post, newest first, with id-keyed lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct PostLineage {
    post_id: PostId,
    revisions: Vec<RevisionNode>,
    revision_index: HashMap<RevisionId, usize>,
}

impl PostLineage {
    pub fn new(post_id: PostId) -> Self {
        Self {
            post_id,
            revisions: Vec::new(),
            revision_index: HashMap::new(),
        }
    }

    pub fn post_id(&self) -> PostId {
        self.post_id
    }

    pub fn revisions(&self) -> &[RevisionNode] {
        &self.revisions
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    pub fn newest(&self) -> Option<&RevisionNode> {
        self.revisions.first()
    }

    pub fn revision(&self, revision_id: RevisionId) -> Option<&RevisionNode> {
        self.revision_index
            .get(&revision_id)
            .map(|&index| &self.revisions[index])
    }

    pub fn block(&self, revision_id: RevisionId, block_id: BlockId) -> Option<&BlockVersion> {
        self.revision(revision_id)
            .and_then(|revision| revision.block(block_id))
    }

    /// Appends the next older revision and links the previously pushed node to it.
    pub fn push_revision(&mut self, revision: RevisionNode) {
        if let Some(later) = self.revisions.last_mut() {
            later.previous_revision_id = revision.id;
        }
        self.revision_index
            .entry(revision.id)
            .or_insert(self.revisions.len());
        self.revisions.push(revision);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffOperation {
    Equal,
    Delete,
    Insert,
    Other(i64),
}

impl DiffOperation {
    pub fn from_tag(tag: i64) -> Self {
        match tag {
            0 => Self::Equal,
            1 => Self::Delete,
            -1 => Self::Insert,
            other => Self::Other(other),
        }
    }

    pub fn line_prefix(self) -> &'static str {
        match self {
            Self::Equal => "   ",
            Self::Delete => " - ",
            Self::Insert => " + ",
            Self::Other(_) => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffRow {
    pub text: String,
    pub operation: DiffOperation,
}
